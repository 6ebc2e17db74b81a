//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Listener backend
//!     → method.rs / uri.rs (request line vocabulary)
//!     → context.rs (ListenerContext: request data + response being built)
//!     → [pipeline fills in status, headers, body]
//!     → response.rs (endpoint output → Response)
//!     → context.rs flush → back to the backend's Connection
//!
//! server.rs wires listener, pipeline and lifecycle together.
//! ```

pub mod context;
pub mod method;
pub mod response;
pub mod server;
pub mod uri;

pub use context::{parse_cookies, ListenerContext, RequestParts};
pub use method::Method;
pub use response::{ContentType, EndpointOutput, Response, SerializationOptions};
pub use server::{HttpServer, RunningServer};
pub use uri::RequestUri;
