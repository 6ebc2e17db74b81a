//! Handler parameter binding.
//!
//! # Responsibilities
//! - Compile each endpoint's declared [`Param`]s into a plan at startup
//! - Fail startup when an endpoint asks for configuration nobody registered
//! - Produce the [`Arguments`] for one request, or a 400 when a required body
//!   is missing
//!
//! # Design Decisions
//! - No per-request reflection: binders are resolved once, then applied
//! - Unrecognized parameters bind as absent rather than failing

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use http::StatusCode;

use crate::http::{ListenerContext, Response};
use crate::pipeline::endpoint::{Argument, Arguments, Endpoint, Param};
use crate::pipeline::RequestScope;
use crate::routing::RouteParams;

/// Error type for binding plans that cannot be compiled.
#[derive(Debug, thiserror::Error)]
pub enum BindingError {
    #[error("endpoint {endpoint} takes configuration {type_name}, which was never registered")]
    UnregisteredConfig {
        endpoint: String,
        type_name: &'static str,
    },
}

/// Configuration objects handlers can ask for by type.
#[derive(Clone, Default)]
pub struct ConfigRegistry {
    configs: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl ConfigRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `config`, replacing any earlier value of the same type.
    pub fn insert<T: Any + Send + Sync>(&mut self, config: Arc<T>) {
        self.configs.insert(TypeId::of::<T>(), config);
    }

    pub fn contains<T: Any>(&self) -> bool {
        self.configs.contains_key(&TypeId::of::<T>())
    }

    fn get(&self, type_id: TypeId) -> Option<Arc<dyn Any + Send + Sync>> {
        self.configs.get(&type_id).cloned()
    }
}

impl fmt::Debug for ConfigRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigRegistry")
            .field("len", &self.configs.len())
            .finish()
    }
}

enum Binder {
    Body,
    BodyText,
    User,
    Database,
    Config(Arc<dyn Any + Send + Sync>),
    Route(String),
    Absent,
}

/// How to fill each of an endpoint's parameters.
pub struct BindingPlan {
    binders: Vec<Binder>,
}

impl BindingPlan {
    /// `placeholders` are the names captured by any of the endpoint's routes.
    pub fn compile(
        endpoint: &Endpoint,
        configs: &ConfigRegistry,
        placeholders: &[&str],
    ) -> Result<Self, BindingError> {
        let binders = endpoint
            .params()
            .iter()
            .map(|param| match param {
                Param::Body => Ok(Binder::Body),
                Param::BodyText => Ok(Binder::BodyText),
                Param::User => Ok(Binder::User),
                Param::Database => Ok(Binder::Database),
                Param::Config(key) => configs.get(key.type_id).map(Binder::Config).ok_or_else(|| {
                    BindingError::UnregisteredConfig {
                        endpoint: endpoint.name().to_string(),
                        type_name: key.type_name,
                    }
                }),
                Param::Route(name) => {
                    if !placeholders.contains(&name.as_str()) {
                        tracing::warn!(
                            endpoint = %endpoint.name(),
                            param = %name,
                            "Route parameter is not captured by any route; it will always be absent"
                        );
                    }
                    Ok(Binder::Route(name.clone()))
                }
                Param::Unbound(description) => {
                    tracing::debug!(endpoint = %endpoint.name(), param = %description, "Binding unrecognized parameter as absent");
                    Ok(Binder::Absent)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { binders })
    }

    pub fn len(&self) -> usize {
        self.binders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.binders.is_empty()
    }

    /// Fill the arguments for one request.
    ///
    /// Returns the response to send instead when a required body is missing.
    pub fn bind(
        &self,
        context: &ListenerContext,
        mut params: RouteParams,
        scope: &RequestScope,
    ) -> Result<Arguments, Response> {
        let mut values = Vec::with_capacity(self.binders.len());

        for binder in &self.binders {
            let value = match binder {
                Binder::Body => {
                    if !context.has_body() {
                        return Err(bad_request());
                    }
                    Argument::Body(context.body().clone())
                }
                Binder::BodyText => {
                    if !context.has_body() {
                        return Err(bad_request());
                    }
                    match std::str::from_utf8(context.body()) {
                        Ok(text) => Argument::Text(text.to_string()),
                        Err(_) => return Err(bad_request()),
                    }
                }
                Binder::User => scope.user(context).map(Argument::User).unwrap_or(Argument::Absent),
                Binder::Database => Argument::Database(Arc::clone(scope.database().get())),
                Binder::Config(config) => Argument::Config(Arc::clone(config)),
                Binder::Route(name) => params.remove(name).map(Argument::Text).unwrap_or(Argument::Absent),
                Binder::Absent => Argument::Absent,
            };
            values.push(value);
        }

        Ok(Arguments::new(values))
    }
}

impl fmt::Debug for BindingPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingPlan")
            .field("len", &self.binders.len())
            .finish()
    }
}

fn bad_request() -> Response {
    Response::empty(StatusCode::BAD_REQUEST)
}
