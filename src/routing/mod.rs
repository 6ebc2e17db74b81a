//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (method, path)
//!     → router.rs (scan routes in registration order)
//!     → matcher.rs (compare segments, capture placeholders)
//!     → Return: first matching Route + RouteParams, or None
//!
//! Route Compilation (at startup):
//!     endpoint declarations (method + template)
//!     → RouteTemplate::parse
//!     → Freeze as immutable Router
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path
//! - Deterministic: same input always matches same route
//! - First match wins (registration order)

pub mod matcher;
pub mod router;

pub use matcher::{RouteParams, RouteTemplate, TemplateError};
pub use router::{Route, RouteMatch, Router};
