//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse into raw table, migrate old versions, rewrite file)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → read as plain values by the server at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Schema versions are migrated explicitly from raw fields to typed structs

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_server_config, ConfigError, VersionedConfig};
pub use schema::{
    DispatchConfig, LimitsConfig, ListenerConfig, ObservabilityConfig, RateLimitConfig,
    ServerConfig, TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
