//! Crate-level startup errors.

use crate::config::ValidationError;
use crate::net::ListenerError;
use crate::pipeline::{BindingError, EndpointError};
use crate::routing::TemplateError;

/// Error type for [`HttpServer::start`](crate::http::HttpServer::start).
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("invalid configuration: {}", join(.0))]
    InvalidConfig(Vec<ValidationError>),

    #[error("endpoint {endpoint} declares invalid route {route:?}: {source}")]
    InvalidRoute {
        endpoint: String,
        route: String,
        #[source]
        source: TemplateError,
    },

    #[error(transparent)]
    Binding(#[from] BindingError),

    #[error("database provider failed to initialize: {0}")]
    Database(#[source] EndpointError),

    #[error(transparent)]
    Listener(#[from] ListenerError),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_listed() {
        let error = ServerError::InvalidConfig(vec![ValidationError::NoPumps, ValidationError::ZeroBodyLimit]);
        assert_eq!(
            error.to_string(),
            "invalid configuration: listener.pump_count must be at least 1; limits.max_body_size must be greater than 0"
        );
    }
}
