//! In-process listener backend.
//!
//! # Responsibilities
//! - Accept requests from a [`DirectClient`] through an in-memory queue
//! - Build contexts exactly like the socket backend (same header and cookie
//!   normalization), with remote address `0.0.0.0:0`
//! - Deliver the flushed response back to the waiting client
//!
//! # Design Decisions
//! - No sockets: tests and embedders exercise the full pipeline in-process
//! - Each request carries its own oneshot reply channel, so responses can
//!   never be delivered to the wrong caller
//! - The client waits a bounded time (5s by default) for its response
//! - Once stopped, requests already queued are still handed out

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use bytes::Bytes;
use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::StatusCode;
use tokio::sync::{mpsc, oneshot, Mutex};

use crate::http::{ListenerContext, Method, RequestParts, RequestUri};
use crate::lifecycle::Shutdown;
use crate::net::listener::{Connection, FinishedResponse, Listener, ListenerError, SendFuture};

/// How long a client waits for its response by default.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Remote address reported for in-process requests.
pub const DIRECT_REMOTE_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0);

/// Error type for in-process requests.
#[derive(Debug, thiserror::Error)]
pub enum DirectError {
    #[error("invalid header: {0}")]
    InvalidHeader(String),
    #[error("listener is gone")]
    ListenerClosed,
    #[error("request was dropped without a response")]
    NoResponse,
    #[error("no response within {0:?}")]
    Timeout(Duration),
}

/// A request to send through a [`DirectClient`].
#[derive(Debug, Clone)]
pub struct DirectRequest {
    method: Method,
    uri: String,
    headers: HeaderMap,
    body: Bytes,
    error: Option<String>,
}

impl DirectRequest {
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            error: None,
        }
    }

    pub fn get(uri: impl Into<String>) -> Self {
        Self::new(Method::Get, uri)
    }

    pub fn post(uri: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self::new(Method::Post, uri).body(body)
    }

    /// Append a header. Invalid names or values fail the request on send.
    pub fn header<K, V>(mut self, name: K, value: V) -> Self
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: fmt::Display,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: fmt::Display,
    {
        if self.error.is_some() {
            return self;
        }
        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            (Err(e), _) => self.error = Some(e.to_string()),
            (_, Err(e)) => self.error = Some(e.to_string()),
        }
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

/// A response received through a [`DirectClient`].
#[derive(Debug, Clone)]
pub struct DirectResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl DirectResponse {
    /// The body as text; invalid UTF-8 is replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

struct DirectMessage {
    request: DirectRequest,
    reply: oneshot::Sender<DirectResponse>,
}

/// Listener fed by [`DirectClient`]s instead of a socket.
pub struct DirectHttpListener {
    sender: mpsc::UnboundedSender<DirectMessage>,
    queue: Mutex<mpsc::UnboundedReceiver<DirectMessage>>,
    stop: Shutdown,
}

impl DirectHttpListener {
    pub fn new() -> Self {
        let (sender, queue) = mpsc::unbounded_channel();
        Self {
            sender,
            queue: Mutex::new(queue),
            stop: Shutdown::new(),
        }
    }

    /// A client submitting requests to this listener.
    pub fn client(&self) -> DirectClient {
        DirectClient {
            sender: self.sender.clone(),
            default_headers: HeaderMap::new(),
            timeout: DEFAULT_RESPONSE_TIMEOUT,
        }
    }
}

impl Default for DirectHttpListener {
    fn default() -> Self {
        Self::new()
    }
}

impl Listener for DirectHttpListener {
    async fn start_listening(&self) -> Result<(), ListenerError> {
        tracing::info!("Listening for direct requests");
        Ok(())
    }

    async fn wait_for_connection(&self) -> Option<ListenerContext> {
        let message = {
            let mut queue = self.queue.lock().await;
            let mut stop = self.stop.subscribe();
            let received = tokio::select! {
                biased;
                message = queue.recv() => Some(message),
                _ = stop.recv() => None,
            };
            match received {
                Some(message) => message,
                None => queue.try_recv().ok(),
            }
        };
        let DirectMessage { request, reply } = message?;

        let mut headers = request.headers;
        for value in headers.values_mut() {
            *value = trim_value(value);
        }
        if !request.body.is_empty() && !headers.contains_key(header::CONTENT_LENGTH) {
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(request.body.len()));
        }

        let parts = RequestParts {
            remote_addr: DIRECT_REMOTE_ADDR,
            method: request.method,
            uri: RequestUri::parse(&request.uri),
            headers,
            body: request.body,
        };
        Some(ListenerContext::new(parts, Box::new(DirectConnection { reply })))
    }

    fn stop_listening(&self) {
        tracing::info!("Direct listener stopped");
        self.stop.trigger();
    }
}

/// Strip surrounding whitespace, as the socket parser does.
fn trim_value(value: &HeaderValue) -> HeaderValue {
    let bytes = value.as_bytes();
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |last| last + 1);

    HeaderValue::from_bytes(&bytes[start..end]).unwrap_or_else(|_| value.clone())
}

struct DirectConnection {
    reply: oneshot::Sender<DirectResponse>,
}

impl Connection for DirectConnection {
    fn send(self: Box<Self>, response: FinishedResponse) -> SendFuture {
        let delivered = self.reply.send(DirectResponse {
            status: response.status,
            headers: response.headers,
            body: response.body,
        });

        Box::pin(async move {
            delivered.map_err(|_| {
                std::io::Error::new(std::io::ErrorKind::BrokenPipe, "direct client stopped waiting")
            })
        })
    }
}

/// Submits requests to a [`DirectHttpListener`] and waits for responses.
#[derive(Clone)]
pub struct DirectClient {
    sender: mpsc::UnboundedSender<DirectMessage>,
    default_headers: HeaderMap,
    timeout: Duration,
}

impl DirectClient {
    /// Add a header to every request from this client (e.g. an auth token).
    pub fn with_default_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.default_headers.append(name, value);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn send(&self, request: DirectRequest) -> Result<DirectResponse, DirectError> {
        let mut request = request;
        if let Some(error) = request.error.take() {
            return Err(DirectError::InvalidHeader(error));
        }
        for (name, value) in &self.default_headers {
            if !request.headers.contains_key(name) {
                request.headers.append(name.clone(), value.clone());
            }
        }

        let (reply, response) = oneshot::channel();
        self.sender
            .send(DirectMessage { request, reply })
            .map_err(|_| DirectError::ListenerClosed)?;

        match tokio::time::timeout(self.timeout, response).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(DirectError::NoResponse),
            Err(_) => Err(DirectError::Timeout(self.timeout)),
        }
    }

    pub async fn get(&self, uri: &str) -> Result<DirectResponse, DirectError> {
        self.send(DirectRequest::get(uri)).await
    }

    pub async fn post(&self, uri: &str, body: impl Into<Bytes>) -> Result<DirectResponse, DirectError> {
        self.send(DirectRequest::post(uri, body)).await
    }
}

impl fmt::Debug for DirectClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectClient")
            .field("default_headers", &self.default_headers)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
