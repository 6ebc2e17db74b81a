//! Socket listener backend.
//!
//! # Responsibilities
//! - Bind a TCP socket and accept connections
//! - Read one request per connection (with limits and a read deadline)
//! - Resolve the remote address, honoring a forwarded-IP header when enabled
//! - Answer unparseable requests directly (400/413/431/408) and close
//! - Queue parsed contexts for the pumps
//!
//! # Design Decisions
//! - A single accept loop task; each connection is parsed on its own task, so a
//!   slow client never holds up a pump or another connection
//! - A semaphore bounds open connections; the permit travels with the context
//!   and is released when the response is written
//! - One request per connection (`Connection: close`)
//! - Stopping ends the accept loop only; connections already accepted are
//!   still read and queued, and the queue closes once the last one is

use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex as StdMutex, OnceLock};
use std::time::Duration;

use http::{HeaderMap, StatusCode};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex, OwnedSemaphorePermit, Semaphore};

use crate::config::{LimitsConfig, ServerConfig};
use crate::http::{ListenerContext, RequestParts};
use crate::lifecycle::{Shutdown, ShutdownSignal};
use crate::net::listener::{Connection, FinishedResponse, Listener, ListenerError, SendFuture};
use crate::net::parser::{parse_request, ParseError};
use crate::net::wire::{encode_response, error_response};

/// Parsed requests waiting for a pump.
const QUEUE_DEPTH: usize = 1024;

/// Per-connection settings shared by connection tasks.
#[derive(Debug, Clone)]
struct ConnectionSettings {
    limits: LimitsConfig,
    read_timeout: Duration,
    server_name: String,
    forwarded_ip_header: Option<String>,
}

impl ConnectionSettings {
    /// The peer address, or the first address in the forwarded-IP header when
    /// enabled and parseable. The peer port is kept either way.
    fn remote_addr(&self, peer: SocketAddr, headers: &HeaderMap) -> SocketAddr {
        let forwarded = self
            .forwarded_ip_header
            .as_deref()
            .and_then(|name| headers.get(name))
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .and_then(|first| first.trim().parse::<IpAddr>().ok());

        match forwarded {
            Some(ip) => SocketAddr::new(ip, peer.port()),
            None => peer,
        }
    }
}

/// HTTP/1 listener on a TCP socket.
pub struct TcpHttpListener {
    bind_address: String,
    max_connections: usize,
    settings: Arc<ConnectionSettings>,
    local_addr: OnceLock<SocketAddr>,
    sender: StdMutex<Option<mpsc::Sender<ListenerContext>>>,
    queue: Mutex<mpsc::Receiver<ListenerContext>>,
    stop: Shutdown,
}

impl TcpHttpListener {
    pub fn new(config: &ServerConfig) -> Self {
        let (sender, queue) = mpsc::channel(QUEUE_DEPTH);
        let listener = &config.listener;

        Self {
            bind_address: listener.bind_address.clone(),
            max_connections: listener.max_connections,
            settings: Arc::new(ConnectionSettings {
                limits: config.limits.clone(),
                read_timeout: Duration::from_secs(config.timeouts.read_secs),
                server_name: config.server.server_name.clone(),
                forwarded_ip_header: listener
                    .use_forwarded_ip
                    .then(|| listener.forwarded_ip_header.clone()),
            }),
            local_addr: OnceLock::new(),
            sender: StdMutex::new(Some(sender)),
            queue: Mutex::new(queue),
            stop: Shutdown::new(),
        }
    }

    /// The bound address, once listening. Useful with port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }
}

impl Listener for TcpHttpListener {
    async fn start_listening(&self) -> Result<(), ListenerError> {
        let socket = TcpListener::bind(&self.bind_address)
            .await
            .map_err(|source| ListenerError::Bind {
                address: self.bind_address.clone(),
                source,
            })?;
        let local_addr = socket.local_addr().map_err(|source| ListenerError::Bind {
            address: self.bind_address.clone(),
            source,
        })?;

        let sender = self.sender.lock().ok().and_then(|mut sender| sender.take());
        let Some(sender) = sender else {
            tracing::warn!(address = %local_addr, "Listener already started");
            return Ok(());
        };
        let _ = self.local_addr.set(local_addr);

        tracing::info!(address = %local_addr, max_connections = self.max_connections, "Listening");
        tokio::spawn(accept_loop(
            socket,
            sender,
            Arc::clone(&self.settings),
            Arc::new(Semaphore::new(self.max_connections)),
            self.stop.subscribe(),
        ));
        Ok(())
    }

    async fn wait_for_connection(&self) -> Option<ListenerContext> {
        self.queue.lock().await.recv().await
    }

    fn stop_listening(&self) {
        self.stop.trigger();
    }
}

async fn accept_loop(
    socket: TcpListener,
    queue: mpsc::Sender<ListenerContext>,
    settings: Arc<ConnectionSettings>,
    limit: Arc<Semaphore>,
    mut stop: ShutdownSignal,
) {
    loop {
        let permit = tokio::select! {
            _ = stop.recv() => break,
            permit = Arc::clone(&limit).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let (stream, peer) = tokio::select! {
            _ = stop.recv() => break,
            accepted = socket.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to accept connection");
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    continue;
                }
            },
        };

        tracing::trace!(peer = %peer, "Accepted connection");
        let queue = queue.clone();
        let settings = Arc::clone(&settings);
        tokio::spawn(async move {
            if let Some(context) = read_context(stream, peer, &settings, permit).await {
                if queue.send(context).await.is_err() {
                    tracing::debug!(peer = %peer, "Listener stopped before request was picked up");
                }
            }
        });
    }

    tracing::info!("Accept loop stopped");
}

async fn read_context(
    stream: TcpStream,
    peer: SocketAddr,
    settings: &ConnectionSettings,
    permit: OwnedSemaphorePermit,
) -> Option<ListenerContext> {
    let mut reader = BufReader::new(stream);

    let parsed = match tokio::time::timeout(settings.read_timeout, parse_request(&mut reader, &settings.limits)).await {
        Ok(Ok(parsed)) => parsed,
        Ok(Err(ParseError::ConnectionClosed)) => {
            tracing::trace!(peer = %peer, "Connection closed without a request");
            return None;
        }
        Ok(Err(e)) => match e.status() {
            Some(status) => {
                tracing::warn!(peer = %peer, error = %e, status = status.as_u16(), "Rejecting request");
                reject(reader.into_inner(), status, &settings.server_name).await;
                return None;
            }
            None => {
                tracing::debug!(peer = %peer, error = %e, "Failed to read request");
                return None;
            }
        },
        Err(_) => {
            tracing::debug!(peer = %peer, "Timed out reading request");
            reject(reader.into_inner(), StatusCode::REQUEST_TIMEOUT, &settings.server_name).await;
            return None;
        }
    };

    let remote_addr = settings.remote_addr(peer, &parsed.headers);
    let uri = parsed.uri();
    let parts = RequestParts {
        remote_addr,
        method: parsed.method,
        uri,
        headers: parsed.headers,
        body: parsed.body,
    };

    Some(ListenerContext::new(
        parts,
        Box::new(TcpConnection {
            stream: reader.into_inner(),
            _permit: permit,
        }),
    ))
}

/// Best-effort error response written directly by the listener.
async fn reject(mut stream: TcpStream, status: StatusCode, server_name: &str) {
    let bytes = encode_response(&error_response(status, server_name));
    if let Err(e) = stream.write_all(&bytes).await {
        tracing::debug!(error = %e, "Failed to write error response");
        return;
    }
    let _ = stream.shutdown().await;
}

/// The socket half of a context.
struct TcpConnection {
    stream: TcpStream,
    _permit: OwnedSemaphorePermit,
}

impl Connection for TcpConnection {
    fn send(self: Box<Self>, response: FinishedResponse) -> SendFuture {
        let mut connection = *self;
        Box::pin(async move {
            let bytes = encode_response(&response);
            connection.stream.write_all(&bytes).await?;
            connection.stream.shutdown().await
        })
    }
}
