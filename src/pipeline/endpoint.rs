//! Endpoint declarations.
//!
//! # Responsibilities
//! - Describe an endpoint: routes, content type, authentication requirement,
//!   null status code and the parameters its handler receives
//! - Carry the handler itself
//! - Give handlers typed access to bound arguments ([`Arguments`])

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;

use crate::database::DatabaseContext;
use crate::http::{ContentType, EndpointOutput, ListenerContext, Method};
use crate::security::User;

/// Error returned by handlers, middlewares and collaborators.
pub type EndpointError = Box<dyn std::error::Error + Send + Sync>;

/// What a handler returns.
pub type EndpointResult = Result<EndpointOutput, EndpointError>;

static ABSENT: Argument = Argument::Absent;

type Handler = dyn Fn(&mut ListenerContext, Arguments) -> EndpointResult + Send + Sync;

/// A configuration type requested by an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigKey {
    pub type_id: TypeId,
    pub type_name: &'static str,
}

/// A declared handler parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    /// Raw request body. Missing body answers 400.
    Body,
    /// Request body as UTF-8 text. Missing or invalid body answers 400.
    BodyText,
    /// The authenticated user, if any.
    User,
    /// The request's database context.
    Database,
    /// A configuration object registered with the server.
    Config(ConfigKey),
    /// A captured route placeholder.
    Route(String),
    /// Anything else; always bound as absent.
    Unbound(&'static str),
}

impl Param {
    pub fn config<T: Any + Send + Sync>() -> Self {
        Param::Config(ConfigKey {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        })
    }

    pub fn route(name: impl Into<String>) -> Self {
        Param::Route(name.into())
    }
}

/// One bound argument, positionally matching the endpoint's [`Param`]s.
#[derive(Clone)]
pub enum Argument {
    Body(Bytes),
    Text(String),
    User(Arc<dyn User>),
    Database(Arc<dyn DatabaseContext>),
    Config(Arc<dyn Any + Send + Sync>),
    Absent,
}

impl fmt::Debug for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Body(bytes) => f.debug_tuple("Body").field(&bytes.len()).finish(),
            Argument::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Argument::User(user) => f.debug_tuple("User").field(user).finish(),
            Argument::Database(_) => f.write_str("Database"),
            Argument::Config(_) => f.write_str("Config"),
            Argument::Absent => f.write_str("Absent"),
        }
    }
}

/// The arguments a handler is invoked with.
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    values: Vec<Argument>,
}

impl Arguments {
    pub(crate) fn new(values: Vec<Argument>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> &Argument {
        self.values.get(index).unwrap_or(&ABSENT)
    }

    pub fn is_absent(&self, index: usize) -> bool {
        matches!(self.get(index), Argument::Absent)
    }

    pub fn body(&self, index: usize) -> Option<&Bytes> {
        match self.get(index) {
            Argument::Body(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Text arguments: route captures and UTF-8 bodies.
    pub fn text(&self, index: usize) -> Option<&str> {
        match self.get(index) {
            Argument::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn user(&self, index: usize) -> Option<&Arc<dyn User>> {
        match self.get(index) {
            Argument::User(user) => Some(user),
            _ => None,
        }
    }

    pub fn user_as<T: User + 'static>(&self, index: usize) -> Option<&T> {
        self.user(index).and_then(|user| user.downcast_ref::<T>())
    }

    pub fn database<T: DatabaseContext + 'static>(&self, index: usize) -> Option<&T> {
        match self.get(index) {
            Argument::Database(database) => database.downcast_ref::<T>(),
            _ => None,
        }
    }

    pub fn config<T: Any + Send + Sync>(&self, index: usize) -> Option<&T> {
        match self.get(index) {
            Argument::Config(config) => config.downcast_ref::<T>(),
            _ => None,
        }
    }
}

/// A routable request handler plus its metadata.
pub struct Endpoint {
    name: String,
    routes: Vec<(Method, String)>,
    content_type: ContentType,
    requires_authentication: Option<bool>,
    null_status: StatusCode,
    params: Vec<Param>,
    handler: Arc<Handler>,
}

impl Endpoint {
    pub fn builder(method: Method, route: impl Into<String>) -> EndpointBuilder {
        EndpointBuilder {
            name: None,
            routes: vec![(method, route.into())],
            content_type: ContentType::default(),
            requires_authentication: None,
            null_status: StatusCode::NOT_FOUND,
            params: Vec::new(),
        }
    }

    pub fn get(route: impl Into<String>) -> EndpointBuilder {
        Self::builder(Method::Get, route)
    }

    pub fn post(route: impl Into<String>) -> EndpointBuilder {
        Self::builder(Method::Post, route)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn routes(&self) -> &[(Method, String)] {
        &self.routes
    }

    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    /// `None` defers to the server's `assume_authentication_required`.
    pub fn requires_authentication(&self) -> Option<bool> {
        self.requires_authentication
    }

    pub fn null_status(&self) -> StatusCode {
        self.null_status
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub(crate) fn invoke(&self, context: &mut ListenerContext, arguments: Arguments) -> EndpointResult {
        (self.handler)(context, arguments)
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("name", &self.name)
            .field("routes", &self.routes)
            .field("content_type", &self.content_type)
            .field("requires_authentication", &self.requires_authentication)
            .field("null_status", &self.null_status)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Endpoint`]; finished by [`EndpointBuilder::handler`].
#[derive(Debug, Clone)]
pub struct EndpointBuilder {
    name: Option<String>,
    routes: Vec<(Method, String)>,
    content_type: ContentType,
    requires_authentication: Option<bool>,
    null_status: StatusCode,
    params: Vec<Param>,
}

impl EndpointBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Serve the same handler on another route.
    pub fn route(mut self, method: Method, route: impl Into<String>) -> Self {
        self.routes.push((method, route.into()));
        self
    }

    pub fn content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = content_type;
        self
    }

    pub fn authentication(mut self, required: bool) -> Self {
        self.requires_authentication = Some(required);
        self
    }

    /// Status used when the handler returns nothing.
    pub fn null_status(mut self, status: StatusCode) -> Self {
        self.null_status = status;
        self
    }

    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    pub fn handler<F, O>(self, handler: F) -> Endpoint
    where
        F: Fn(&mut ListenerContext, Arguments) -> Result<O, EndpointError> + Send + Sync + 'static,
        O: Into<EndpointOutput>,
    {
        let name = self.name.unwrap_or_else(|| {
            let (method, route) = &self.routes[0];
            format!("{method} {route}")
        });

        Endpoint {
            name,
            routes: self.routes,
            content_type: self.content_type,
            requires_authentication: self.requires_authentication,
            null_status: self.null_status,
            params: self.params,
            handler: Arc::new(move |context, arguments| handler(context, arguments).map(Into::into)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let endpoint = Endpoint::get("/").handler(|_, _| Ok("hi"));
        assert_eq!(endpoint.name(), "GET /");
        assert_eq!(endpoint.content_type(), ContentType::Html);
        assert_eq!(endpoint.null_status(), StatusCode::NOT_FOUND);
        assert_eq!(endpoint.requires_authentication(), None);
        assert!(endpoint.params().is_empty());
    }

    #[test]
    fn builder_collects_routes_and_params() {
        let endpoint = Endpoint::post("/a")
            .route(Method::Put, "/b")
            .name("upload")
            .content_type(ContentType::Json)
            .authentication(true)
            .null_status(StatusCode::BAD_REQUEST)
            .param(Param::Body)
            .param(Param::route("id"))
            .handler(|_, _| Ok(EndpointOutput::Empty));

        assert_eq!(endpoint.name(), "upload");
        assert_eq!(endpoint.routes().len(), 2);
        assert_eq!(endpoint.requires_authentication(), Some(true));
        assert_eq!(endpoint.params(), &[Param::Body, Param::Route("id".into())]);
    }

    #[test]
    fn arguments_are_typed_by_position() {
        let arguments = Arguments::new(vec![
            Argument::Text("abc".into()),
            Argument::Absent,
            Argument::Config(Arc::new(7u32)),
        ]);

        assert_eq!(arguments.text(0), Some("abc"));
        assert!(arguments.is_absent(1));
        assert_eq!(arguments.config::<u32>(2), Some(&7));
        assert_eq!(arguments.config::<u64>(2), None);
        assert!(arguments.is_absent(9));
    }
}
