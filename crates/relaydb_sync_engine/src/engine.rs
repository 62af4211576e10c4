//! The relay engine.

use crate::ack::{AckProcessor, ChunkContext};
use crate::config::{validate_chunk_size, SyncConfig};
use crate::dispatch::{plan_chunks, ChunkOutcome, DispatchHandle};
use crate::error::{SyncError, SyncResult};
use crate::http::HttpClient;
use crate::listener::SyncListener;
use crate::stats::EngineStats;
use parking_lot::RwLock;
use relaydb_codec::Entry;
use relaydb_core::{QueuedRecord, RecordStore};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, info};

/// Store-and-forward front end: queue records locally, upload them in
/// chunks, apply acknowledgments.
///
/// Cloning is cheap and every clone drives the same store, configuration
/// and listener.
///
/// Store calls (`append`, `clear_all`, `delete_stored`) do file I/O on the
/// calling thread. [`dispatch`](Self::dispatch) must be called inside a
/// tokio runtime; it returns as soon as every chunk is submitted.
pub struct RelayEngine<C: HttpClient> {
    shared: Arc<Shared<C>>,
}

struct Shared<C> {
    config: RwLock<SyncConfig>,
    client: C,
    acks: AckProcessor,
}

impl<C: HttpClient> Clone for RelayEngine<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C: HttpClient> RelayEngine<C> {
    /// Creates an engine over `store`, posting through `client`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfig`] if `config` does not validate.
    pub fn new(config: SyncConfig, store: Arc<RecordStore>, client: C) -> SyncResult<Self> {
        config.validate()?;
        Ok(Self {
            shared: Arc::new(Shared {
                config: RwLock::new(config),
                client,
                acks: AckProcessor::new(store),
            }),
        })
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<RecordStore> {
        self.shared.acks.store()
    }

    /// The transport client.
    #[must_use]
    pub fn client(&self) -> &C {
        &self.shared.client
    }

    /// Queues a payload. Durable when this returns.
    pub fn append(&self, payload: Entry) -> SyncResult<QueuedRecord> {
        let record = self.store().append(payload)?;
        self.log_counts("append");
        Ok(record)
    }

    /// Uploads every unsent record in chunks of the configured size.
    ///
    /// With nothing unsent this submits nothing, unless `send_even_if_empty`
    /// is set, in which case one upload with no records is sent (useful to
    /// refresh the remote count). Chunks are posted concurrently; their
    /// responses are applied in arrival order.
    ///
    /// # Errors
    ///
    /// - [`SyncError::NoRuntime`] outside a tokio runtime
    /// - [`SyncError::InvalidConfig`] if the current configuration is invalid
    /// - [`SyncError::Persistence`] if the store cannot be read
    ///
    /// Nothing is submitted when an error is returned.
    pub fn dispatch(&self, send_even_if_empty: bool) -> SyncResult<DispatchHandle> {
        let runtime = Handle::try_current().map_err(|_| SyncError::NoRuntime)?;
        let config = self.config();
        config.validate()?;

        let chunks = plan_chunks(self.store(), &config, send_even_if_empty)?;
        let sizes: Vec<usize> = chunks.iter().map(|chunk| chunk.records).collect();
        self.shared.acks.stats.record_dispatch(&sizes);
        if chunks.is_empty() {
            debug!("nothing to dispatch");
            return Ok(DispatchHandle::new(sizes, Vec::new()));
        }
        info!(
            chunks = chunks.len(),
            records = sizes.iter().sum::<usize>(),
            chunk_size = config.chunk_size,
            "dispatching"
        );

        let tasks = chunks
            .into_iter()
            .map(|chunk| {
                let shared = Arc::clone(&self.shared);
                let url = config.remote_endpoint.clone();
                let ctx = ChunkContext {
                    chunk: chunk.index,
                    records: chunk.records,
                    delete_after_success: config.delete_after_success,
                    diagnostics: config.diagnostics,
                };
                runtime.spawn(async move { shared.send_chunk(&url, ctx, chunk.body).await })
            })
            .collect();
        Ok(DispatchHandle::new(sizes, tasks))
    }

    /// Removes every record regardless of state. Returns how many.
    pub fn clear_all(&self) -> SyncResult<usize> {
        let removed = self.store().delete_all()?;
        self.log_counts("clear_all");
        Ok(removed)
    }

    /// Removes acknowledged records. Returns how many.
    pub fn delete_stored(&self) -> SyncResult<usize> {
        let removed = self.store().delete_stored()?;
        self.log_counts("delete_stored");
        Ok(removed)
    }

    /// Registers the listener, replacing any previous one.
    pub fn set_listener(&self, listener: Arc<dyn SyncListener>) {
        self.shared.acks.set_listener(Some(listener));
    }

    /// Removes the listener; outcomes are then only logged.
    pub fn clear_listener(&self) {
        self.shared.acks.set_listener(None);
    }

    /// Snapshot of the configuration.
    #[must_use]
    pub fn config(&self) -> SyncConfig {
        self.shared.config.read().clone()
    }

    /// Sets the records per upload.
    ///
    /// # Errors
    ///
    /// Rejects zero with [`SyncError::InvalidConfig`].
    pub fn set_chunk_size(&self, chunk_size: usize) -> SyncResult<()> {
        validate_chunk_size(chunk_size)?;
        self.shared.config.write().chunk_size = chunk_size;
        Ok(())
    }

    /// Records per upload.
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.shared.config.read().chunk_size
    }

    /// Sets whether acknowledged records are deleted right away.
    pub fn set_delete_after_success(&self, enabled: bool) {
        self.shared.config.write().delete_after_success = enabled;
    }

    /// Whether acknowledged records are deleted right away.
    #[must_use]
    pub fn delete_after_success(&self) -> bool {
        self.shared.config.read().delete_after_success
    }

    /// Replaces the overlay.
    pub fn set_overlay(&self, overlay: Entry) {
        self.shared.config.write().overlay = overlay;
    }

    /// Copy of the overlay.
    #[must_use]
    pub fn overlay(&self) -> Entry {
        self.shared.config.read().overlay.clone()
    }

    /// Sets the shared secret.
    pub fn set_shared_secret(&self, secret: impl Into<String>) {
        self.shared.config.write().shared_secret = secret.into();
    }

    /// Sets the device identifier.
    pub fn set_device_id(&self, device_id: impl Into<String>) {
        self.shared.config.write().device_id = device_id.into();
    }

    /// Device identifier.
    #[must_use]
    pub fn device_id(&self) -> String {
        self.shared.config.read().device_id.clone()
    }

    /// Sets the upload URL.
    ///
    /// # Errors
    ///
    /// Rejects a blank URL with [`SyncError::InvalidConfig`].
    pub fn set_remote_endpoint(&self, endpoint: impl Into<String>) -> SyncResult<()> {
        let endpoint = endpoint.into();
        if endpoint.trim().is_empty() {
            return Err(SyncError::InvalidConfig(
                "remote endpoint must not be empty".into(),
            ));
        }
        self.shared.config.write().remote_endpoint = endpoint;
        Ok(())
    }

    /// Upload URL.
    #[must_use]
    pub fn remote_endpoint(&self) -> String {
        self.shared.config.read().remote_endpoint.clone()
    }

    /// Enables or disables diagnostic logging.
    pub fn set_diagnostics(&self, enabled: bool) {
        self.shared.config.write().diagnostics = enabled;
    }

    /// Whether diagnostic logging is on.
    #[must_use]
    pub fn diagnostics(&self) -> bool {
        self.shared.config.read().diagnostics
    }

    /// Records in the store, any state.
    #[must_use]
    pub fn count_all(&self) -> u64 {
        self.store().count_all()
    }

    /// Records not yet acknowledged.
    #[must_use]
    pub fn count_unsent(&self) -> u64 {
        self.store().count_unsent()
    }

    /// Watches [`count_all`](Self::count_all).
    #[must_use]
    pub fn observe_count_all(&self) -> watch::Receiver<u64> {
        self.store().observe_count_all()
    }

    /// Watches [`count_unsent`](Self::count_unsent).
    #[must_use]
    pub fn observe_count_unsent(&self) -> watch::Receiver<u64> {
        self.store().observe_count_unsent()
    }

    /// Last `total_count` the endpoint reported, if any.
    #[must_use]
    pub fn remote_count(&self) -> Option<u64> {
        self.shared.acks.remote_count()
    }

    /// Watches [`remote_count`](Self::remote_count).
    #[must_use]
    pub fn observe_remote_count(&self) -> watch::Receiver<Option<u64>> {
        self.shared.acks.observe_remote_count()
    }

    /// Totals since the engine was created.
    #[must_use]
    pub fn stats(&self) -> EngineStats {
        self.shared.acks.stats.snapshot()
    }

    fn log_counts(&self, operation: &'static str) {
        if self.diagnostics() {
            let counts = self.store().counts();
            debug!(
                operation,
                count_all = counts.all,
                count_unsent = counts.unsent,
                "local counts"
            );
        }
    }
}

impl<C: HttpClient> Shared<C> {
    async fn send_chunk(&self, url: &str, ctx: ChunkContext, body: Vec<u8>) -> ChunkOutcome {
        if ctx.diagnostics {
            debug!(
                chunk = ctx.chunk,
                records = ctx.records,
                body = %String::from_utf8_lossy(&body),
                "posting chunk"
            );
        }
        let result = match self.client.post(url, body).await {
            Ok(response) => self.acks.on_response(&ctx, &response).await,
            Err(failure) => self.acks.on_error(&ctx, failure),
        };
        ChunkOutcome {
            chunk: ctx.chunk,
            records: ctx.records,
            result,
        }
    }
}

impl<C: HttpClient> std::fmt::Debug for RelayEngine<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayEngine")
            .field("config", &*self.shared.config.read())
            .field("store", self.store())
            .finish_non_exhaustive()
    }
}
