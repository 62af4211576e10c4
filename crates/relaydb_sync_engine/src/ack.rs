//! Acknowledgment processing.

use crate::error::{SyncError, SyncResult};
use crate::http::TransportFailure;
use crate::listener::{SyncListener, SyncSuccess};
use crate::stats::StatsCounters;
use parking_lot::RwLock;
use relaydb_core::{CoreResult, RecordStore};
use relaydb_sync_protocol::AckResponse;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Per-chunk values captured at dispatch time.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ChunkContext {
    pub(crate) chunk: usize,
    pub(crate) records: usize,
    pub(crate) delete_after_success: bool,
    pub(crate) diagnostics: bool,
}

/// Turns responses into store transitions and listener calls.
///
/// Each response is handled on its own; order between chunks does not
/// matter because marking is keyed by uuid and idempotent.
pub(crate) struct AckProcessor {
    store: Arc<RecordStore>,
    listener: RwLock<Option<Arc<dyn SyncListener>>>,
    remote_count: watch::Sender<Option<u64>>,
    pub(crate) stats: StatsCounters,
}

impl AckProcessor {
    pub(crate) fn new(store: Arc<RecordStore>) -> Self {
        Self {
            store,
            listener: RwLock::new(None),
            remote_count: watch::Sender::new(None),
            stats: StatsCounters::default(),
        }
    }

    pub(crate) fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    pub(crate) fn set_listener(&self, listener: Option<Arc<dyn SyncListener>>) {
        *self.listener.write() = listener;
    }

    pub(crate) fn remote_count(&self) -> Option<u64> {
        *self.remote_count.borrow()
    }

    pub(crate) fn observe_remote_count(&self) -> watch::Receiver<Option<u64>> {
        self.remote_count.subscribe()
    }

    fn listener(&self) -> Option<Arc<dyn SyncListener>> {
        self.listener.read().clone()
    }

    /// Handles a response body for one chunk.
    pub(crate) async fn on_response(
        &self,
        ctx: &ChunkContext,
        body: &[u8],
    ) -> SyncResult<SyncSuccess> {
        if ctx.diagnostics {
            debug!(
                chunk = ctx.chunk,
                body = %String::from_utf8_lossy(body),
                "response received"
            );
        }

        let ack = match AckResponse::decode(body) {
            Ok(ack) => ack,
            Err(err) => return self.fail(ctx, SyncError::from(err)),
        };
        if !ack.is_ok() {
            return self.fail(
                ctx,
                SyncError::protocol(format!("non-ok status {}", ack.status)),
            );
        }
        if !ack.unparsed_uuids.is_empty() {
            debug!(
                chunk = ctx.chunk,
                skipped = ack.unparsed_uuids.len(),
                "ignoring acknowledged values that are not uuids"
            );
        }

        let store = Arc::clone(&self.store);
        let uuids = ack.stored_uuids.clone();
        let delete = ctx.delete_after_success;
        let applied = tokio::task::spawn_blocking(move || -> CoreResult<(usize, usize)> {
            let transitioned = store.mark_stored(&uuids)?;
            let deleted = if delete { store.delete_stored()? } else { 0 };
            Ok((transitioned, deleted))
        })
        .await;
        let (transitioned, deleted) = match applied {
            Ok(Ok(changes)) => changes,
            Ok(Err(err)) => return self.fail(ctx, SyncError::Persistence(err)),
            Err(join) => return self.fail(ctx, SyncError::Interrupted(join.to_string())),
        };

        if let Some(total) = ack.total_count {
            self.remote_count.send_replace(Some(total));
        }
        self.stats.record_ack(transitioned);
        if ctx.diagnostics {
            let counts = self.store.counts();
            debug!(
                chunk = ctx.chunk,
                transitioned,
                deleted,
                count_all = counts.all,
                count_unsent = counts.unsent,
                remote_count = ?ack.total_count,
                "acknowledgment applied"
            );
        }

        let success = SyncSuccess {
            chunk: ctx.chunk,
            acknowledged: ack.stored_uuids.len(),
            transitioned,
            deleted,
            total_count: ack.total_count,
        };
        if let Some(listener) = self.listener() {
            listener.on_success(&success);
        }
        Ok(success)
    }

    /// Handles a chunk whose request got no response.
    pub(crate) fn on_error(
        &self,
        ctx: &ChunkContext,
        failure: TransportFailure,
    ) -> SyncResult<SyncSuccess> {
        self.fail(ctx, SyncError::Transport(failure))
    }

    fn fail(&self, ctx: &ChunkContext, error: SyncError) -> SyncResult<SyncSuccess> {
        self.stats.record_failure();
        match &error {
            SyncError::Transport(failure) => warn!(
                chunk = ctx.chunk,
                records = ctx.records,
                status = %failure.status.map_or_else(|| "none".to_owned(), |s| s.to_string()),
                message = %failure.message,
                "chunk upload failed"
            ),
            other => warn!(
                chunk = ctx.chunk,
                records = ctx.records,
                kind = ?other.kind(),
                error = %other,
                "chunk not applied"
            ),
        }
        if let Some(listener) = self.listener() {
            listener.on_failure(&error);
        }
        Err(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use relaydb_codec::Entry;
    use uuid::Uuid;

    #[derive(Default)]
    struct Calls {
        successes: Mutex<Vec<SyncSuccess>>,
        failures: Mutex<Vec<String>>,
    }

    impl SyncListener for Calls {
        fn on_success(&self, success: &SyncSuccess) {
            self.successes.lock().push(*success);
        }

        fn on_failure(&self, error: &SyncError) {
            self.failures.lock().push(error.to_string());
        }
    }

    fn ctx() -> ChunkContext {
        ChunkContext {
            chunk: 0,
            records: 3,
            delete_after_success: false,
            diagnostics: true,
        }
    }

    fn setup() -> (AckProcessor, Arc<Calls>, Vec<Uuid>) {
        let store = Arc::new(RecordStore::open_in_memory().unwrap());
        let uuids = (0..3)
            .map(|n| store.append(Entry::new().with("n", n)).unwrap().uuid)
            .collect();
        let processor = AckProcessor::new(store);
        let calls = Arc::new(Calls::default());
        processor.set_listener(Some(calls.clone() as Arc<dyn SyncListener>));
        (processor, calls, uuids)
    }

    #[tokio::test]
    async fn ok_response_marks_and_reports() {
        let (processor, calls, uuids) = setup();
        let body = AckResponse::ok(uuids[..2].iter().copied(), 42).encode().unwrap();
        let success = processor.on_response(&ctx(), &body).await.unwrap();
        assert_eq!(success.transitioned, 2);
        assert_eq!(processor.store().count_unsent(), 1);
        assert_eq!(processor.remote_count(), Some(42));
        assert_eq!(calls.successes.lock().len(), 1);
        assert!(calls.failures.lock().is_empty());
    }

    #[tokio::test]
    async fn rejected_status_leaves_store_alone() {
        let (processor, calls, _) = setup();
        let body = AckResponse::rejected("error").encode().unwrap();
        let err = processor.on_response(&ctx(), &body).await.unwrap_err();
        assert!(matches!(err, SyncError::Protocol { .. }));
        assert_eq!(processor.store().count_unsent(), 3);
        assert_eq!(processor.remote_count(), None);
        assert_eq!(calls.failures.lock().len(), 1);
        assert!(calls.successes.lock().is_empty());
    }

    #[tokio::test]
    async fn garbage_body_is_a_protocol_error() {
        let (processor, calls, _) = setup();
        let err = processor.on_response(&ctx(), b"<html>").await.unwrap_err();
        assert_eq!(err.kind(), crate::FailureKind::Protocol);
        assert_eq!(calls.failures.lock().len(), 1);
    }

    #[test]
    fn transport_failure_reports_once() {
        let (processor, calls, _) = setup();
        let err = processor
            .on_error(&ctx(), TransportFailure::new("offline"))
            .unwrap_err();
        assert_eq!(err.kind(), crate::FailureKind::Transport);
        assert_eq!(*calls.failures.lock(), vec!["transport failure: offline".to_owned()]);
        assert_eq!(processor.stats.snapshot().chunks_failed, 1);
    }

    #[tokio::test]
    async fn missing_listener_is_fine() {
        let (processor, _, uuids) = setup();
        processor.set_listener(None);
        let body = AckResponse::ok(uuids, 3).encode().unwrap();
        processor.on_response(&ctx(), &body).await.unwrap();
        assert_eq!(processor.store().count_unsent(), 0);
    }
}
