//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use hearth::database::{DatabaseContext, DatabaseProvider, LazyDatabase};
use hearth::pipeline::PipelineResult;
use hearth::security::{AuthenticationProvider, User};
use hearth::{
    ContentType, DirectClient, DirectHttpListener, Endpoint, HttpServer, ListenerContext, Middleware, Next,
    Param, RequestScope, Response, RunningServer, ServerConfig,
};
use http::StatusCode;

pub const TOKEN_HEADER: &str = "x-test-token";

/// A user authenticated by [`HeaderTokenAuthentication`].
#[derive(Debug)]
pub struct TestUser {
    pub name: String,
}

impl User for TestUser {
    fn user_id(&self) -> String {
        self.name.clone()
    }
}

/// Authenticates any request carrying [`TOKEN_HEADER`]; the header value is the user name.
pub struct HeaderTokenAuthentication;

impl AuthenticationProvider for HeaderTokenAuthentication {
    fn authenticate(&self, context: &ListenerContext, _database: &LazyDatabase) -> Option<Arc<dyn User>> {
        let name = context.header(TOKEN_HEADER)?;
        Some(Arc::new(TestUser { name: name.to_string() }))
    }
}

pub struct TestDatabaseContext {
    pub value: String,
    closed: Arc<AtomicUsize>,
}

impl DatabaseContext for TestDatabaseContext {
    fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Counts how many contexts were opened and closed.
#[derive(Default, Clone)]
pub struct TestDatabaseProvider {
    pub opened: Arc<AtomicUsize>,
    pub closed: Arc<AtomicUsize>,
}

impl DatabaseProvider for TestDatabaseProvider {
    fn open_context(&self) -> Arc<dyn DatabaseContext> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Arc::new(TestDatabaseContext {
            value: "stored".to_string(),
            closed: Arc::clone(&self.closed),
        })
    }
}

/// Appends a fixed marker to the body after the rest of the chain ran.
pub struct MarkerMiddleware(pub &'static str);

impl Middleware for MarkerMiddleware {
    fn handle(&self, context: &mut ListenerContext, scope: &RequestScope, next: Next<'_>) -> PipelineResult {
        next.run(context, scope)?;
        context.write(self.0);
        Ok(())
    }
}

/// Answers 401 without running the chain when the request carries `x-block`.
pub struct BlockingMiddleware;

impl Middleware for BlockingMiddleware {
    fn handle(&self, context: &mut ListenerContext, scope: &RequestScope, next: Next<'_>) -> PipelineResult {
        if context.header("x-block").is_some() {
            context.respond(Response::text("blocked").with_status(StatusCode::UNAUTHORIZED));
            return Ok(());
        }
        next.run(context, scope)
    }
}

/// Typed configuration bound by the `/config` endpoint.
#[derive(Debug)]
pub struct Greeting {
    pub text: String,
}

/// Endpoints exercising routing, binding, output wrapping and failures.
pub fn test_endpoints() -> Vec<Endpoint> {
    vec![
        Endpoint::get("/sw/a").handler(|_, _| Ok("static")),
        Endpoint::get("/sw/{param}")
            .param(Param::route("param"))
            .handler(|_, args| Ok(format!("param {}", args.text(0).unwrap_or("")))),
        Endpoint::get("/param/{text}")
            .content_type(ContentType::Plaintext)
            .param(Param::route("text"))
            .handler(|_, args| Ok(args.text(0).unwrap_or("").to_string())),
        Endpoint::get("/inlineParam/inline{text}")
            .param(Param::route("text"))
            .handler(|_, args| Ok(args.text(0).unwrap_or("").to_string())),
        Endpoint::get("/params/{one}/{two}")
            .param(Param::route("two"))
            .param(Param::route("one"))
            .handler(|_, args| Ok(format!("{}-{}", args.text(1).unwrap_or(""), args.text(0).unwrap_or("")))),
        Endpoint::get("/null")
            .null_status(StatusCode::BAD_REQUEST)
            .handler(|context, _| {
                let value = match context.query("null") {
                    Some("true") => None,
                    _ => Some("not null".to_string()),
                };
                Ok(value)
            }),
        Endpoint::post("/body/string")
            .param(Param::BodyText)
            .handler(|_, args| Ok(format!("got {}", args.text(0).unwrap_or("")))),
        Endpoint::get("/response/responseObjectWithCode")
            .handler(|_, _| Ok(Response::text("accepted").with_status(StatusCode::ACCEPTED))),
        Endpoint::get("/json")
            .content_type(ContentType::Json)
            .handler(|_, _| Ok(serde_json::json!({ "name": "hearth", "ok": true }))),
        Endpoint::get("/auth")
            .authentication(true)
            .param(Param::User)
            .handler(|_, args| {
                let name = args.user_as::<TestUser>(0).map(|user| user.name.clone()).unwrap_or_default();
                Ok(format!("hello {name}"))
            }),
        Endpoint::get("/db/value")
            .param(Param::Database)
            .handler(|_, args| {
                let value = args
                    .database::<TestDatabaseContext>(0)
                    .map(|db| db.value.clone())
                    .ok_or("unexpected database context")?;
                Ok(value)
            }),
        Endpoint::get("/config")
            .param(Param::config::<Greeting>())
            .handler(|_, args| Ok(args.config::<Greeting>(0).map(|g| g.text.clone()))),
        Endpoint::get("/middleware").handler(|_, _| Ok("x")),
        Endpoint::get("/error").handler(|_, _| -> Result<String, hearth::EndpointError> {
            Err("handler failed".into())
        }),
        Endpoint::get("/panic").handler(|_, _| -> Result<String, hearth::EndpointError> {
            panic!("handler panicked")
        }),
    ]
}

/// Config with error details hidden, so 500 bodies are deterministic.
pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.server.expose_error_details = false;
    config
}

/// A server over a direct listener with the test endpoints registered.
pub fn test_server(config: ServerConfig) -> (HttpServer<DirectHttpListener>, DirectClient) {
    let listener = DirectHttpListener::new();
    let client = listener.client();

    let mut server = HttpServer::new(listener, config);
    server
        .add_endpoints(test_endpoints())
        .add_config(Arc::new(Greeting {
            text: "welcome".to_string(),
        }));

    (server, client)
}

/// Start a fully wired test server.
pub async fn start_test_server() -> (RunningServer<DirectHttpListener>, DirectClient, TestDatabaseProvider) {
    let (mut server, client) = test_server(test_config());
    let database = TestDatabaseProvider::default();
    server
        .use_authentication_provider(HeaderTokenAuthentication)
        .use_database_provider(database.clone());

    let running = server.start().await.expect("server should start");
    (running, client, database)
}
