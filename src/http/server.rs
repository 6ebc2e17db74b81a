//! Server assembly and lifecycle.
//!
//! # Responsibilities
//! - Collect endpoints, middlewares, services, collaborators and configs
//! - Validate configuration and compile the endpoint table at startup
//! - Start the listener and spawn the pump tasks
//! - Run each request through the pipeline on the blocking pool, then flush
//! - Stop: halt acceptance, join pumps, drain in-flight requests
//!
//! # Design Decisions
//! - Fail fast: any startup problem is returned before traffic is accepted
//! - Pumps are plain tasks pulling from the listener; each request gets its own
//!   task, so a slow handler never stalls a pump
//! - Stopping closes the listener; pumps keep pulling until it runs dry, so
//!   requests accepted before the stop are still answered

use std::any::Any;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

use crate::config::{validate_config, ServerConfig};
use crate::database::{DatabaseProvider, NullDatabaseProvider};
use crate::error::ServerError;
use crate::health::{health_endpoint, HealthCheck};
use crate::http::{ListenerContext, SerializationOptions};
use crate::lifecycle::signals;
use crate::net::{ConnectionTracker, Listener};
use crate::pipeline::{
    ConfigRegistry, DispatchOptions, Endpoint, EndpointDispatch, Middleware, NotFoundHook,
    PipelineOptions, RequestPipeline, Service,
};
use crate::security::{AuthenticationProvider, NoAuthentication, RateLimitService, RateLimiter};

/// Builder and launcher for a server on listener `L`.
pub struct HttpServer<L: Listener> {
    listener: L,
    config: ServerConfig,
    endpoints: Vec<Endpoint>,
    middlewares: Vec<Arc<dyn Middleware>>,
    services: Vec<Arc<dyn Service>>,
    configs: ConfigRegistry,
    authentication: Option<Arc<dyn AuthenticationProvider>>,
    database: Arc<dyn DatabaseProvider>,
    rate_limiter: Option<Arc<dyn RateLimiter>>,
    not_found: Option<NotFoundHook>,
}

impl<L: Listener> HttpServer<L> {
    pub fn new(listener: L, config: ServerConfig) -> Self {
        let mut configs = ConfigRegistry::new();
        configs.insert(Arc::new(config.clone()));

        Self {
            listener,
            config,
            endpoints: Vec::new(),
            middlewares: Vec::new(),
            services: Vec::new(),
            configs,
            authentication: None,
            database: Arc::new(NullDatabaseProvider),
            rate_limiter: None,
            not_found: None,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn listener(&self) -> &L {
        &self.listener
    }

    pub fn add_endpoint(&mut self, endpoint: Endpoint) -> &mut Self {
        self.endpoints.push(endpoint);
        self
    }

    pub fn add_endpoints(&mut self, endpoints: impl IntoIterator<Item = Endpoint>) -> &mut Self {
        self.endpoints.extend(endpoints);
        self
    }

    /// Register a middleware. The last one registered runs first.
    pub fn add_middleware(&mut self, middleware: impl Middleware + 'static) -> &mut Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// Register a service. Services run in registration order.
    pub fn add_service(&mut self, service: impl Service + 'static) -> &mut Self {
        self.services.push(Arc::new(service));
        self
    }

    /// Register a configuration object endpoints can bind by type.
    pub fn add_config<T: Any + Send + Sync>(&mut self, config: Arc<T>) -> &mut Self {
        self.configs.insert(config);
        self
    }

    pub fn use_authentication_provider(&mut self, provider: impl AuthenticationProvider + 'static) -> &mut Self {
        self.authentication = Some(Arc::new(provider));
        self
    }

    pub fn use_database_provider(&mut self, provider: impl DatabaseProvider + 'static) -> &mut Self {
        self.database = Arc::new(provider);
        self
    }

    /// Rate limit with `limiter` instead of one built from `[rate_limit]`.
    /// Enables rate limiting regardless of `rate_limit.enabled`.
    pub fn use_rate_limiter(&mut self, limiter: Arc<dyn RateLimiter>) -> &mut Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// Serve a health report at `/_health`.
    pub fn add_health_checks(&mut self, checks: Vec<Arc<dyn HealthCheck>>) -> &mut Self {
        self.add_endpoint(health_endpoint(checks))
    }

    /// Called for every request that matched no route, after the 404 was written.
    pub fn on_not_found(&mut self, hook: impl Fn(&ListenerContext) + Send + Sync + 'static) -> &mut Self {
        self.not_found = Some(Arc::new(hook));
        self
    }

    /// Validate, initialize and begin serving.
    pub async fn start(self) -> Result<RunningServer<L>, ServerError> {
        let started = Instant::now();
        let Self {
            listener,
            config,
            endpoints,
            middlewares,
            mut services,
            configs,
            authentication,
            database,
            rate_limiter,
            not_found,
        } = self;

        validate_config(&config).map_err(ServerError::InvalidConfig)?;

        let rate_limit = match rate_limiter {
            Some(limiter) => Some(RateLimitService::new(limiter)),
            None if config.rate_limit.enabled => Some(RateLimitService::from_config(&config.rate_limit)),
            None => None,
        };
        if let Some(service) = rate_limit {
            services.insert(0, Arc::new(service));
        }

        database.initialize().map_err(ServerError::Database)?;
        for service in &services {
            tracing::debug!(service = %service.name(), "Initializing service");
            service.initialize();
        }

        let dispatch = EndpointDispatch::compile(
            endpoints,
            &configs,
            services,
            not_found,
            DispatchOptions {
                assume_authentication_required: config.server.assume_authentication_required,
                serialization: SerializationOptions {
                    pretty_json: config.server.pretty_json,
                },
            },
        )?;

        let authentication: Arc<dyn AuthenticationProvider> = match authentication {
            Some(provider) => provider,
            None => {
                if dispatch.requires_authentication() {
                    tracing::warn!(
                        "Endpoints require authentication but no authentication provider is configured; they will answer 403"
                    );
                }
                Arc::new(NoAuthentication)
            }
        };

        let pipeline = Arc::new(RequestPipeline::new(
            middlewares,
            dispatch,
            database,
            authentication,
            PipelineOptions {
                server_name: config.server.server_name.clone(),
                expose_error_details: config.server.expose_error_details,
                metrics_enabled: config.observability.metrics_enabled,
            },
        ));

        listener.start_listening().await?;

        let listener = Arc::new(listener);
        let tracker = ConnectionTracker::new();
        let pumps = (0..config.listener.pump_count)
            .map(|id| {
                tokio::spawn(pump(
                    id,
                    Arc::clone(&listener),
                    Arc::clone(&pipeline),
                    tracker.clone(),
                ))
            })
            .collect();

        tracing::info!(
            pumps = config.listener.pump_count,
            startup_ms = started.elapsed().as_millis() as u64,
            "Server ready"
        );

        Ok(RunningServer {
            listener,
            tracker,
            pumps,
        })
    }

    /// Like [`HttpServer::start`], but a startup failure is logged and ends
    /// the process with exit status 1.
    pub async fn start_or_exit(self) -> RunningServer<L> {
        match self.start().await {
            Ok(server) => server,
            Err(e) => {
                tracing::error!(error = %e, "Server failed to start");
                std::process::exit(1);
            }
        }
    }
}

/// A started server.
pub struct RunningServer<L: Listener> {
    listener: Arc<L>,
    tracker: ConnectionTracker,
    pumps: Vec<JoinHandle<()>>,
}

impl<L: Listener> RunningServer<L> {
    pub fn listener(&self) -> &L {
        &self.listener
    }

    /// Requests accepted but not yet flushed.
    pub fn in_flight(&self) -> u64 {
        self.tracker.active_count()
    }

    /// Stop accepting, serve what the listener already accepted, then wait
    /// for in-flight requests.
    pub async fn stop(self) {
        tracing::info!("Stopping server");
        let tracker = self.tracker.clone();
        self.stop_pumps().await;
        tracker.wait_for_drain().await;
        tracing::info!("Server stopped");
    }

    /// Like [`RunningServer::stop`], giving up after `limit`.
    /// Returns whether every accepted request finished.
    pub async fn stop_with_timeout(self, limit: Duration) -> bool {
        tracing::info!(limit_ms = limit.as_millis() as u64, "Stopping server");
        let deadline = Instant::now() + limit;
        let tracker = self.tracker.clone();

        let drained = tokio::time::timeout(limit, self.stop_pumps()).await.is_ok()
            && tracker
                .wait_for_drain_timeout(deadline.saturating_duration_since(Instant::now()))
                .await;
        if drained {
            tracing::info!("Server stopped");
        } else {
            tracing::warn!(in_flight = tracker.active_count(), "Drain deadline exceeded");
        }
        drained
    }

    async fn stop_pumps(self) {
        self.listener.stop_listening();
        for pump in self.pumps {
            if let Err(e) = pump.await {
                tracing::error!(error = %e, "Pump task failed");
            }
        }
    }

    /// Serve until SIGINT/SIGTERM, then stop.
    pub async fn run_until_signal(self) {
        signals::wait_for_termination().await;
        self.stop().await;
    }
}

async fn pump<L: Listener>(
    id: usize,
    listener: Arc<L>,
    pipeline: Arc<RequestPipeline>,
    tracker: ConnectionTracker,
) {
    tracing::debug!(pump = id, "Pump started");

    while let Some(context) = listener.wait_for_connection().await {
        let guard = tracker.track();
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move {
            serve(pipeline, context).await;
            drop(guard);
        });
    }

    tracing::debug!(pump = id, "Pump stopped");
}

async fn serve(pipeline: Arc<RequestPipeline>, context: ListenerContext) {
    let request_id = context.request_id();

    // The context stays in the slot while the pipeline runs, so it can still
    // be answered if the blocking task dies.
    let slot = Arc::new(Mutex::new(Some(context)));
    let handled = {
        let slot = Arc::clone(&slot);
        let pipeline = Arc::clone(&pipeline);
        tokio::task::spawn_blocking(move || {
            let mut context = slot.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(context) = context.as_mut() {
                pipeline.handle(context);
            }
        })
        .await
    };

    let context = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
    let Some(mut context) = context else {
        return;
    };

    if let Err(e) = handled {
        tracing::error!(request_id = %request_id, error = %e, "Request task failed");
        context.respond(pipeline.internal_error(&e.to_string()));
    }

    if let Err(e) = context.flush().await {
        tracing::debug!(request_id = %request_id, error = %e, "Failed to send response");
    }
}
