//! Request processing subsystem.
//!
//! # Data Flow
//! ```text
//! ListenerContext (from a pump)
//!     → mod.rs (RequestPipeline: Server header, request scope, panic boundary)
//!     → middleware.rs (last registered runs first, each may call Next once)
//!     → dispatch.rs (route → 403 check → services → binding → handler)
//!     → endpoint output converted to a Response on the context
//!     → mod.rs (close database, 500 on error or panic, log, metrics)
//!     → back to the pump for the single flush
//! ```
//!
//! # Design Decisions
//! - Synchronous: handlers run on the blocking pool, so they may block freely
//! - One boundary owns failures; nothing inside needs to catch anything
//! - Binding plans and routes are compiled once, at server start

pub mod binding;
pub mod dispatch;
pub mod endpoint;
pub mod middleware;
pub mod scope;
pub mod service;

pub use binding::{BindingError, BindingPlan, ConfigRegistry};
pub use dispatch::{DispatchOptions, EndpointDispatch, NotFoundHook};
pub use endpoint::{
    Argument, Arguments, ConfigKey, Endpoint, EndpointBuilder, EndpointError, EndpointResult, Param,
};
pub use middleware::{Middleware, Next};
pub use scope::RequestScope;
pub use service::Service;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use http::header::{self, HeaderValue};
use http::StatusCode;

use crate::database::DatabaseProvider;
use crate::http::{ContentType, ListenerContext, Response};
use crate::observability::metrics;
use crate::security::AuthenticationProvider;

/// Outcome of a middleware or dispatch stage.
pub type PipelineResult = Result<(), EndpointError>;

/// Everything needed to take a context from request to finished response.
pub struct RequestPipeline {
    middlewares: Vec<Arc<dyn Middleware>>,
    dispatch: EndpointDispatch,
    database: Arc<dyn DatabaseProvider>,
    authentication: Arc<dyn AuthenticationProvider>,
    server_name: HeaderValue,
    expose_error_details: bool,
    metrics_enabled: bool,
}

/// Pipeline settings taken from configuration.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub server_name: String,
    pub expose_error_details: bool,
    pub metrics_enabled: bool,
}

impl RequestPipeline {
    pub fn new(
        middlewares: Vec<Arc<dyn Middleware>>,
        dispatch: EndpointDispatch,
        database: Arc<dyn DatabaseProvider>,
        authentication: Arc<dyn AuthenticationProvider>,
        options: PipelineOptions,
    ) -> Self {
        let server_name = HeaderValue::from_str(&options.server_name).unwrap_or_else(|_| {
            tracing::warn!(server_name = %options.server_name, "Server name is not a valid header value");
            HeaderValue::from_static("hearth")
        });

        Self {
            middlewares,
            dispatch,
            database,
            authentication,
            server_name,
            expose_error_details: options.expose_error_details,
            metrics_enabled: options.metrics_enabled,
        }
    }

    pub fn dispatch(&self) -> &EndpointDispatch {
        &self.dispatch
    }

    /// Run the whole pipeline for one request. Never fails; every failure
    /// becomes a response on the context.
    pub fn handle(&self, context: &mut ListenerContext) {
        let started = Instant::now();
        context
            .response_headers_mut()
            .insert(header::SERVER, self.server_name.clone());

        let scope = RequestScope::new(Arc::clone(&self.database), Arc::clone(&self.authentication));
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            Next::new(&self.middlewares, &self.dispatch).run(context, &scope)
        }));

        let mut failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(error)) => Some(error.to_string()),
            Err(payload) => Some(panic_message(&*payload)),
        };

        // The database context is closed whatever happened above, and a panic
        // while closing still ends in a response.
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(move || scope.finish())) {
            let detail = panic_message(&*payload);
            tracing::error!(
                request_id = %context.request_id(),
                error = %detail,
                "Closing the database context failed"
            );
            failure.get_or_insert(detail);
        }

        if let Some(detail) = failure {
            tracing::error!(
                request_id = %context.request_id(),
                path = %context.path(),
                error = %detail,
                "Request handling failed"
            );
            context.respond(self.internal_error(&detail));
        }

        let elapsed = started.elapsed();
        tracing::info!(
            request_id = %context.request_id(),
            remote_addr = %context.remote_addr(),
            status = context.status().as_u16(),
            method = %context.method(),
            path = %context.uri().path_and_query(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Served request"
        );

        if self.metrics_enabled {
            metrics::record_request(context.method(), context.status(), elapsed);
        }
    }

    pub(crate) fn internal_error(&self, detail: &str) -> Response {
        let body = if self.expose_error_details {
            detail.to_string()
        } else {
            "Internal Server Error".to_string()
        };
        Response::new(body, ContentType::Plaintext, StatusCode::INTERNAL_SERVER_ERROR)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}
