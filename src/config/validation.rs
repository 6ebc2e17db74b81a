//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (pump count, limits, rate limit window)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before the server is allowed to start

use std::net::SocketAddr;

use crate::config::ServerConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("listener.bind_address {0:?} is not a socket address")]
    InvalidBindAddress(String),
    #[error("listener.pump_count must be at least 1")]
    NoPumps,
    #[error("listener.max_connections must be at least 1")]
    NoConnections,
    #[error("limits.max_body_size must be greater than 0")]
    ZeroBodyLimit,
    #[error("limits.max_header_count must be greater than 0")]
    ZeroHeaderLimit,
    #[error("limits.max_line_length must be greater than 0")]
    ZeroLineLength,
    #[error("rate_limit.max_requests must be greater than 0")]
    ZeroRateLimit,
    #[error("rate_limit.window_secs must be greater than 0")]
    ZeroRateLimitWindow,
}

pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(config.listener.bind_address.clone()));
    }
    if config.listener.pump_count == 0 {
        errors.push(ValidationError::NoPumps);
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::NoConnections);
    }
    if config.limits.max_body_size == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }
    if config.limits.max_header_count == 0 {
        errors.push(ValidationError::ZeroHeaderLimit);
    }
    if config.limits.max_line_length == 0 {
        errors.push(ValidationError::ZeroLineLength);
    }
    if config.rate_limit.max_requests == 0 {
        errors.push(ValidationError::ZeroRateLimit);
    }
    if config.rate_limit.window_secs == 0 {
        errors.push(ValidationError::ZeroRateLimitWindow);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
