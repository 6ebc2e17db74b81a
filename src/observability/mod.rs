//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, histograms via the metrics facade)
//!
//! Consumers:
//!     → whatever subscriber / recorder the embedding application installs
//! ```
//!
//! # Design Decisions
//! - Structured fields, never pre-formatted strings
//! - Request ID flows through every per-request event
//! - Metrics are cheap (atomic increments) and can be disabled in config

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
