//! Listener backend contract.
//!
//! # Responsibilities
//! - Define what every request source provides: start, then hand out one
//!   [`ListenerContext`] per request until stopped
//! - Define the transport half of a context ([`Connection`]) used for the
//!   single final flush
//!
//! # Design Decisions
//! - `wait_for_connection` takes `&self` so any number of pump tasks can wait
//!   on the same listener concurrently
//! - Per-connection failures are handled inside the backend; they never
//!   surface from `wait_for_connection`

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use http::{HeaderMap, StatusCode};

use crate::http::ListenerContext;

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    /// The listener was used before `start_listening`.
    #[error("listener has not been started")]
    NotStarted,
}

/// A source of incoming requests.
pub trait Listener: Send + Sync + 'static {
    /// Bind/prepare the backend. Called once before any pump starts.
    fn start_listening(&self) -> impl Future<Output = Result<(), ListenerError>> + Send;

    /// Wait for the next request.
    ///
    /// Returns `None` once the listener can no longer produce requests.
    fn wait_for_connection(&self) -> impl Future<Output = Option<ListenerContext>> + Send;

    /// Stop accepting new work. Work already accepted is still handed out by
    /// `wait_for_connection`, which then returns `None`.
    fn stop_listening(&self) {}
}

/// A response after the pipeline finished, ready for the transport.
#[derive(Debug, Clone)]
pub struct FinishedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

pub type SendFuture = Pin<Box<dyn Future<Output = std::io::Result<()>> + Send>>;

/// The transport a context was read from.
///
/// Consumed by the final flush; dropping it without sending closes the
/// underlying connection.
pub trait Connection: Send + 'static {
    fn send(self: Box<Self>, response: FinishedResponse) -> SendFuture;
}
