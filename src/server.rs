mod handlers;
pub mod responses;

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use crate::config::Config;
use crate::outbound::store::build_store;
use crate::outbound::webhook::{BatchRunner, WebhookHttpClient};
use crate::server::handlers::{
    health::health_check, process::process_deliveries, root::home,
};
use crate::server::responses::ApiError;
use axum::http::Method;
use axum::{
    Router,
    routing::{get, post},
};
use color_eyre::eyre::{Context, Result};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

#[derive(Clone)]
/// The global application state shared between all request handlers.
pub(crate) struct AppState {
    processor: Processor,
}

#[derive(Clone)]
enum Processor {
    Ready(Arc<BatchRunner>),

    /// The store could not be built; every trigger reports this instead of running.
    Unconfigured(Arc<str>),
}

impl AppState {
    pub(crate) fn runner(&self) -> Result<Arc<BatchRunner>, ApiError> {
        match &self.processor {
            Processor::Ready(runner) => Ok(runner.clone()),
            Processor::Unconfigured(reason) => Err(ApiError::Unconfigured(reason.to_string())),
        }
    }
}

pub struct Server {
    router: Router,
    listener: TcpListener,
}

impl Server {
    /// Creates a new server wired to the store and transport described by `config`.
    pub async fn new(config: &Config) -> Result<Self> {
        let processor = match build_store(&config.store) {
            Ok(store) => {
                let transport = WebhookHttpClient::with_timeout(Duration::from_secs(
                    config.delivery.request_timeout_secs,
                ))
                .wrap_err("Failed to build webhook HTTP client")?;

                Processor::Ready(Arc::new(BatchRunner::from_config(
                    &config.delivery,
                    store,
                    Arc::new(transport),
                )))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Delivery store unavailable, passes will be rejected");
                Processor::Unconfigured(e.to_string().into())
            }
        };

        Self::build(config, processor).await
    }

    /// Creates a new server around an already assembled runner.
    pub async fn with_runner(config: &Config, runner: BatchRunner) -> Result<Self> {
        Self::build(config, Processor::Ready(Arc::new(runner))).await
    }

    async fn build(config: &Config, processor: Processor) -> Result<Self> {
        let trace_layer =
            TraceLayer::new_for_http().make_span_with(|request: &'_ axum::extract::Request<_>| {
                let uri = request.uri().to_string();
                tracing::info_span!("request", method = %request.method(), uri)
            });

        // Manual runs are triggered from the browser
        let cors_layer = CorsLayer::new()
            .allow_origin(Any)
            .allow_headers(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS]);

        let state = AppState { processor };

        let router = Router::new()
            .route("/", get(home))
            .route("/health", get(health_check))
            .route("/process-deliveries", post(process_deliveries))
            .layer(cors_layer)
            .layer(trace_layer)
            .with_state(state);

        let listener = TcpListener::bind(format!("{}:{}", config.server.host, config.server.port))
            .await
            .wrap_err_with(|| format!("Failed to bind to port {}", config.server.port))?;

        Ok(Self { router, listener })
    }

    pub fn port(&self) -> Result<u16> {
        Ok(self.listener.local_addr()?.port())
    }

    /// Runs the server until the process exits.
    pub async fn run(self) -> Result<()> {
        tracing::info!("Server listening on {}", self.listener.local_addr()?);
        axum::serve(self.listener, self.router).await?;
        Ok(())
    }
}
