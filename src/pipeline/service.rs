//! Services: hooks that run after routing and before binding.

use crate::http::{ListenerContext, Response};
use crate::pipeline::{Endpoint, RequestScope};

/// A server-wide hook consulted for every matched request.
///
/// Services run in registration order. The first one to return a response
/// short-circuits the endpoint.
pub trait Service: Send + Sync {
    fn name(&self) -> &str;

    /// Called once at server startup.
    fn initialize(&self) {}

    fn on_request_handled(
        &self,
        context: &ListenerContext,
        endpoint: &Endpoint,
        scope: &RequestScope,
    ) -> Option<Response>;
}
