//! Endpoint dispatch: the innermost stage of the pipeline.
//!
//! # Responsibilities
//! - Route the request to an endpoint, or answer 404 and fire the not-found hook
//! - Enforce the endpoint's authentication requirement (403)
//! - Run services, bind parameters, invoke the handler
//! - Turn the handler's output into a response
//!
//! # Design Decisions
//! - Everything is compiled at startup; dispatch itself never fails on
//!   configuration problems
//! - Handler errors propagate to the pipeline boundary, which owns the 500

use std::sync::Arc;

use http::StatusCode;

use crate::error::ServerError;
use crate::http::{ContentType, ListenerContext, Response, SerializationOptions};
use crate::pipeline::binding::{BindingPlan, ConfigRegistry};
use crate::pipeline::endpoint::Endpoint;
use crate::pipeline::{PipelineResult, RequestScope, Service};
use crate::routing::{RouteTemplate, Router};

/// Called after the 404 response has been written.
pub type NotFoundHook = Arc<dyn Fn(&ListenerContext) + Send + Sync>;

struct CompiledEndpoint {
    endpoint: Endpoint,
    plan: BindingPlan,
}

/// Settings that shape how endpoint results become responses.
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchOptions {
    pub assume_authentication_required: bool,
    pub serialization: SerializationOptions,
}

/// The compiled endpoint table.
pub struct EndpointDispatch {
    router: Router<usize>,
    endpoints: Vec<CompiledEndpoint>,
    services: Vec<Arc<dyn Service>>,
    not_found: Option<NotFoundHook>,
    options: DispatchOptions,
}

impl EndpointDispatch {
    pub fn compile(
        endpoints: Vec<Endpoint>,
        configs: &ConfigRegistry,
        services: Vec<Arc<dyn Service>>,
        not_found: Option<NotFoundHook>,
        options: DispatchOptions,
    ) -> Result<Self, ServerError> {
        let mut router = Router::new();
        let mut compiled = Vec::with_capacity(endpoints.len());

        for (index, endpoint) in endpoints.into_iter().enumerate() {
            let mut templates = Vec::with_capacity(endpoint.routes().len());
            for (method, route) in endpoint.routes() {
                let template = RouteTemplate::parse(route).map_err(|source| ServerError::InvalidRoute {
                    endpoint: endpoint.name().to_string(),
                    route: route.clone(),
                    source,
                })?;
                templates.push((*method, template));
            }

            let placeholders: Vec<&str> = templates
                .iter()
                .flat_map(|(_, template)| template.placeholders())
                .collect();
            let plan = BindingPlan::compile(&endpoint, configs, &placeholders)?;

            for (method, template) in templates {
                tracing::debug!(endpoint = %endpoint.name(), method = %method, route = %template, "Registered route");
                router.add(template, vec![method], index);
            }
            compiled.push(CompiledEndpoint { endpoint, plan });
        }

        tracing::info!(endpoints = compiled.len(), routes = router.len(), "Compiled endpoint table");

        Ok(Self {
            router,
            endpoints: compiled,
            services,
            not_found,
            options,
        })
    }

    pub fn endpoints(&self) -> impl Iterator<Item = &Endpoint> {
        self.endpoints.iter().map(|compiled| &compiled.endpoint)
    }

    /// Whether any endpoint needs an authenticated user under current options.
    pub fn requires_authentication(&self) -> bool {
        self.endpoints()
            .any(|endpoint| self.authentication_required(endpoint))
    }

    pub fn dispatch(&self, context: &mut ListenerContext, scope: &RequestScope) -> PipelineResult {
        let found = self
            .router
            .match_request(context.method(), context.path())
            .map(|found| (found.route.target, found.params));

        let Some((index, params)) = found else {
            self.not_found(context);
            return Ok(());
        };

        let compiled = &self.endpoints[index];
        let endpoint = &compiled.endpoint;
        tracing::trace!(endpoint = %endpoint.name(), "Dispatching request");

        if self.authentication_required(endpoint) && scope.user(context).is_none() {
            context.respond(Response::empty(StatusCode::FORBIDDEN));
            return Ok(());
        }

        for service in &self.services {
            if let Some(response) = service.on_request_handled(context, endpoint, scope) {
                tracing::trace!(service = %service.name(), status = %response.status, "Service answered request");
                context.respond(response);
                return Ok(());
            }
        }

        let arguments = match compiled.plan.bind(context, params, scope) {
            Ok(arguments) => arguments,
            Err(response) => {
                context.respond(response);
                return Ok(());
            }
        };

        let output = endpoint.invoke(context, arguments)?;
        let response = output.into_response(
            endpoint.content_type(),
            endpoint.null_status(),
            self.options.serialization,
        )?;
        context.respond(response);
        Ok(())
    }

    fn authentication_required(&self, endpoint: &Endpoint) -> bool {
        endpoint
            .requires_authentication()
            .unwrap_or(self.options.assume_authentication_required)
    }

    fn not_found(&self, context: &mut ListenerContext) {
        let body = format!("Not found: {}", context.path());
        context.respond(Response::new(body, ContentType::Plaintext, StatusCode::NOT_FOUND));
        if let Some(hook) = &self.not_found {
            hook(context);
        }
    }
}
