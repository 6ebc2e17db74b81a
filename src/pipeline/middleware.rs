//! Middleware chain.
//!
//! # Responsibilities
//! - Run middlewares around endpoint dispatch, last registered outermost
//! - Hand each middleware a [`Next`] continuation it may run at most once
//!
//! # Design Decisions
//! - `Next` is a cursor into the registered list, not a nest of closures
//! - Running `Next` consumes it, so a middleware cannot invoke the rest of the
//!   chain twice
//! - A middleware that returns without running `Next` short-circuits; whatever
//!   it wrote to the context is the response

use std::sync::Arc;

use crate::http::ListenerContext;
use crate::pipeline::dispatch::EndpointDispatch;
use crate::pipeline::{PipelineResult, RequestScope};

/// Code that wraps the handling of every request.
pub trait Middleware: Send + Sync {
    fn handle(&self, context: &mut ListenerContext, scope: &RequestScope, next: Next<'_>) -> PipelineResult;
}

/// The remainder of the chain.
pub struct Next<'a> {
    middlewares: &'a [Arc<dyn Middleware>],
    remaining: usize,
    dispatch: &'a EndpointDispatch,
}

impl<'a> Next<'a> {
    pub(crate) fn new(middlewares: &'a [Arc<dyn Middleware>], dispatch: &'a EndpointDispatch) -> Self {
        Self {
            middlewares,
            remaining: middlewares.len(),
            dispatch,
        }
    }

    /// Run the next middleware, or endpoint dispatch when none are left.
    pub fn run(self, context: &mut ListenerContext, scope: &RequestScope) -> PipelineResult {
        let Some(index) = self.remaining.checked_sub(1) else {
            return self.dispatch.dispatch(context, scope);
        };

        let next = Next {
            remaining: index,
            ..self
        };
        self.middlewares[index].handle(context, scope, next)
    }
}
