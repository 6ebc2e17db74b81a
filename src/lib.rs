//! Embeddable HTTP server core: listeners, routing, middleware and rate limiting.

pub mod config;
pub mod database;
pub mod downcast;
pub mod error;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod pipeline;
pub mod routing;
pub mod security;

pub use crate::config::schema::ServerConfig;
pub use crate::error::ServerError;
pub use crate::http::{ContentType, EndpointOutput, HttpServer, ListenerContext, Method, Response, RunningServer};
pub use crate::lifecycle::Shutdown;
pub use crate::net::{DirectClient, DirectHttpListener, DirectRequest, TcpHttpListener};
pub use crate::pipeline::{Arguments, Endpoint, EndpointError, Middleware, Next, Param, RequestScope, Service};
