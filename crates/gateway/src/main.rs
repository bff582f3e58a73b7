//! ScholarLens API Gateway
//!
//! The HTTP surface over the in-memory dataset snapshot.
//! Handles:
//! - Dashboard endpoints (networks, timeline, histograms, listings)
//! - Query tool endpoints and the tool catalogue
//! - Chat turns through the agent loop
//! - Rate limiting and observability (logging, metrics)

mod handlers;
mod middleware;

use anyhow::Context;
use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use scholarlens_common::{
    agent::{self, AgentLoop},
    config::{AppConfig, ObservabilityConfig},
    metrics::{self, LATENCY_BUCKETS, METRICS_PREFIX, REASONING_BUCKETS},
    tools::ToolRegistry,
    Dataset,
};
use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::{signal, sync::oneshot};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub dataset: Arc<Dataset>,
    pub tools: Arc<ToolRegistry>,
    pub agent: Arc<AgentLoop>,
}

impl AppState {
    pub fn new(config: AppConfig, dataset: Dataset) -> Self {
        let dataset = Arc::new(dataset);
        let tools = Arc::new(ToolRegistry::new(dataset.clone()));
        let provider = agent::create_provider(&config.llm);
        let agent = Arc::new(AgentLoop::new(
            provider,
            tools.clone(),
            config.agent.clone(),
            config.llm.clone(),
        ));

        Self {
            config: Arc::new(config),
            dataset,
            tools,
            agent,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;

    init_tracing(&config.observability);
    info!("Starting ScholarLens API Gateway v{}", scholarlens_common::VERSION);

    // Initialize metrics
    init_metrics(config.observability.metrics_port)?;
    metrics::register_metrics();

    // Load the snapshot before binding; a broken table is fatal
    let dataset = Dataset::load(&config.dataset).map_err(|e| {
        error!(error = %e, data_dir = %config.dataset.data_dir.display(), "Failed to load dataset");
        e
    })?;
    metrics::record_dataset(&dataset.load_report());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let grace = config.shutdown_timeout();
    let state = AppState::new(config, dataset);
    info!(
        model = state.agent.model_name(),
        llm_configured = state.config.llm.has_api_key(),
        "Agent ready"
    );

    // Build the router
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    let (signalled_tx, signalled_rx) = oneshot::channel();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown_signal().await;
        let _ = signalled_tx.send(());
    });

    if serve_with_grace(server.into_future(), signalled_rx, grace).await? {
        info!("Server shutdown complete");
    } else {
        warn!(grace_secs = grace.as_secs(), "Shutdown grace period elapsed, abandoning in-flight requests");
    }
    Ok(())
}

/// Drive the server to completion. Once shutdown is signalled, in-flight
/// requests get `grace` to finish; returns `false` if they were cut off.
async fn serve_with_grace<F>(
    server: F,
    signalled: oneshot::Receiver<()>,
    grace: Duration,
) -> std::io::Result<bool>
where
    F: Future<Output = std::io::Result<()>>,
{
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => return result.map(|_| true),
        Ok(()) = signalled => {}
    }

    match tokio::time::timeout(grace, server).await {
        Ok(result) => result.map(|_| true),
        Err(_) => Ok(false),
    }
}

fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.pretty().init();
    }
}

fn init_metrics(port: u16) -> anyhow::Result<()> {
    if port == 0 {
        info!("Metrics exporter disabled");
        return Ok(());
    }

    let fast = ["request_duration_seconds", "tool_duration_seconds"];
    let slow = ["reasoning_duration_seconds", "agent_turn_duration_seconds"];

    let mut builder = PrometheusBuilder::new().with_http_listener(SocketAddr::from(([0, 0, 0, 0], port)));
    for name in fast {
        builder = builder.set_buckets_for_metric(Matcher::Full(format!("{}_{}", METRICS_PREFIX, name)), LATENCY_BUCKETS)?;
    }
    for name in slow {
        builder = builder.set_buckets_for_metric(Matcher::Full(format!("{}_{}", METRICS_PREFIX, name)), REASONING_BUCKETS)?;
    }
    builder.install().context("Failed to install Prometheus exporter")?;

    info!(port, "Metrics exporter listening");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Liveness and readiness stay outside the rate limiter
    let health_routes = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready));

    let mut api_routes = Router::new()
        // Dashboard endpoints
        .route("/citation-network", get(handlers::dashboard::citation_network))
        .route("/collaboration-network", get(handlers::dashboard::collaboration_network))
        .route("/timeline", get(handlers::dashboard::timeline))
        .route("/patent-histogram", get(handlers::dashboard::patent_histogram))
        .route("/papers/{year}", get(handlers::dashboard::papers_by_year))

        // Query tool endpoints
        .route("/data/papers-by-year", get(handlers::data::papers_by_year))
        .route("/data/top-authors", get(handlers::data::top_authors))
        .route("/data/citation-stats", get(handlers::data::citation_stats))
        .route("/data/collaboration-stats", get(handlers::data::collaboration_stats))
        .route("/data/yearly-trend", get(handlers::data::yearly_trend))
        .route("/data/patent-histogram", get(handlers::data::patent_histogram))
        .route("/data/papers", get(handlers::data::papers_with_filters))
        .route("/tools", get(handlers::data::list_tools))
        .route("/tools/{name}", post(handlers::data::invoke_tool))

        // Chat turns carry their own turn timeout
        .route("/chat", post(handlers::chat::chat));

    if state.config.rate_limit.enabled {
        let limiter = middleware::rate_limit::RateLimitState::new(
            state.config.rate_limit.requests_per_second,
            state.config.rate_limit.burst,
        );
        api_routes = api_routes
            .route_layer(from_fn_with_state(limiter, middleware::rate_limit::rate_limit_middleware));
    }

    let api_routes = api_routes
        .merge(health_routes)
        .route_layer(from_fn(middleware::metrics::track_metrics));

    // Compose the app
    Router::new().nest("/api", api_routes).layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .layer(PropagateRequestIdLayer::x_request_id()),
    )
    .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
