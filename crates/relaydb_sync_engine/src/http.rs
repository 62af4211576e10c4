//! HTTP transport seam.
//!
//! The engine never opens sockets itself. It posts JSON bodies through an
//! [`HttpClient`], so any HTTP library (or none, in tests) can carry them.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// A request that produced no usable response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportFailure {
    /// HTTP status, when the failure came with one.
    pub status: Option<u16>,
    /// Human readable cause.
    pub message: String,
}

impl TransportFailure {
    /// A failure without a status, e.g. a refused connection.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    /// A failure reported with an HTTP status.
    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "HTTP {status}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for TransportFailure {}

/// Posts a body and resolves to the response body.
///
/// Implementations enforce their own timeouts; the engine waits as long as
/// the returned future does.
pub trait HttpClient: Send + Sync + 'static {
    /// Sends `body` to `url` with method POST.
    fn post(
        &self,
        url: &str,
        body: Vec<u8>,
    ) -> impl Future<Output = Result<Vec<u8>, TransportFailure>> + Send;
}

impl<C: HttpClient> HttpClient for Arc<C> {
    fn post(
        &self,
        url: &str,
        body: Vec<u8>,
    ) -> impl Future<Output = Result<Vec<u8>, TransportFailure>> + Send {
        (**self).post(url, body)
    }
}

/// An endpoint that answers in-process.
pub trait LoopbackServer: Send + Sync + 'static {
    /// Handles one POST to `url`.
    fn handle_post(&self, url: &str, body: &[u8]) -> Result<Vec<u8>, TransportFailure>;
}

/// An [`HttpClient`] that hands requests straight to a [`LoopbackServer`].
///
/// Each call yields to the scheduler once before answering so concurrent
/// chunks interleave the way network requests would.
pub struct LoopbackClient<S> {
    server: Arc<S>,
}

impl<S: LoopbackServer> LoopbackClient<S> {
    /// Routes requests to `server`.
    pub fn new(server: Arc<S>) -> Self {
        Self { server }
    }

    /// The server behind this client.
    #[must_use]
    pub fn server(&self) -> &Arc<S> {
        &self.server
    }
}

impl<S> Clone for LoopbackClient<S> {
    fn clone(&self) -> Self {
        Self {
            server: Arc::clone(&self.server),
        }
    }
}

impl<S: LoopbackServer> HttpClient for LoopbackClient<S> {
    fn post(
        &self,
        url: &str,
        body: Vec<u8>,
    ) -> impl Future<Output = Result<Vec<u8>, TransportFailure>> + Send {
        let server = Arc::clone(&self.server);
        let url = url.to_owned();
        async move {
            tokio::task::yield_now().await;
            server.handle_post(&url, &body)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Echo {
        seen: Mutex<Vec<String>>,
    }

    impl LoopbackServer for Echo {
        fn handle_post(&self, url: &str, body: &[u8]) -> Result<Vec<u8>, TransportFailure> {
            self.seen.lock().push(url.to_owned());
            if body.is_empty() {
                return Err(TransportFailure::with_status(400, "empty body"));
            }
            Ok(body.to_vec())
        }
    }

    #[tokio::test]
    async fn loopback_routes_to_server() {
        let server = Arc::new(Echo::default());
        let client = LoopbackClient::new(Arc::clone(&server));
        let response = client.post("http://relay/upload", b"{}".to_vec()).await;
        assert_eq!(response.unwrap(), b"{}");
        assert_eq!(*server.seen.lock(), vec!["http://relay/upload".to_owned()]);
    }

    #[tokio::test]
    async fn loopback_passes_failures_through() {
        let client = Arc::new(LoopbackClient::new(Arc::new(Echo::default())));
        let err = client.post("http://relay", Vec::new()).await.unwrap_err();
        assert_eq!(err.status, Some(400));
        assert_eq!(err.to_string(), "HTTP 400: empty body");
    }
}
