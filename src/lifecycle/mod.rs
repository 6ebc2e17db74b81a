//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (http/server.rs):
//!     Validate config → Initialize collaborators → Compile endpoints
//!     → Start listener → Spawn pumps
//!
//! Shutdown (shutdown.rs):
//!     stop() or signal → Stop listener → Pumps serve what it already accepted → Drain in-flight → Done
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown (opt-in)
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then collaborators, then listeners
//! - Ordered shutdown: stop accept, drain, close
//! - In-flight requests are never pre-empted

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownSignal};
