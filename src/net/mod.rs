//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Socket backend (tcp.rs):
//!     accept loop (connection limit)
//!     → per-connection task: parser.rs (limits, read deadline)
//!     → ListenerContext queued for the pumps
//!     → flush: wire.rs encodes, connection closes
//!
//! Direct backend (direct.rs):
//!     DirectClient → in-memory queue → ListenerContext
//!     → flush: response handed back over a oneshot
//!
//! Both: pump → connection.rs (in-flight tracking) → pipeline
//! ```
//!
//! # Design Decisions
//! - Backends share one contract (listener.rs) and one context type
//! - Bounded accept (semaphore) prevents resource exhaustion
//! - Each in-flight request tracked for graceful shutdown

pub mod connection;
pub mod direct;
pub mod listener;
pub mod parser;
pub mod tcp;
pub mod wire;

pub use connection::{ConnectionGuard, ConnectionTracker};
pub use direct::{DirectClient, DirectError, DirectHttpListener, DirectRequest, DirectResponse};
pub use listener::{Connection, FinishedResponse, Listener, ListenerError};
pub use tcp::TcpHttpListener;
