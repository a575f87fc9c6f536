//! Paper Curator API
//!
//! HTTP entry point for browsing and searching curated arXiv papers.
//! Handles:
//! - Startup and teardown of the shared services
//! - Request routing under `/api/v1`
//! - Observability (logging, request ids, Prometheus metrics)

mod dependencies;
mod handlers;
mod state;

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use paper_curator_common::{
    arxiv::make_arxiv_client,
    get_settings, metrics,
    opensearch::make_opensearch_client,
    pdf::make_pdf_parser_service,
    Database, OpenSearchClient, Settings,
};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let settings = get_settings().context("Failed to load settings")?;

    init_tracing(&settings);

    info!(
        version = %settings.app_version,
        environment = settings.environment.as_str(),
        "Starting Paper Curator API"
    );

    // Metrics exporter must be installed before descriptions are registered
    let metrics_handle = prometheus_builder()?
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;
    metrics::register_metrics();

    let database = Database::connect(&settings).await?;

    let opensearch = make_opensearch_client(&settings)?;
    prepare_search_index(&opensearch).await;

    let arxiv = make_arxiv_client(&settings)?;
    let pdf_parser = make_pdf_parser_service(&settings);

    let state = AppState::new(settings.clone(), database.clone(), opensearch, arxiv, pdf_parser);
    let app = create_router(state, metrics_handle);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped, releasing resources");
    database.teardown().await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.observability.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if settings.observability.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Prometheus exporter with latency buckets for search timings
fn prometheus_builder() -> anyhow::Result<PrometheusBuilder> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_search_duration_seconds", metrics::METRICS_PREFIX)),
            metrics::LATENCY_BUCKETS,
        )
        .context("Invalid search latency buckets")
}

/// Make sure the papers index exists when the cluster is up
///
/// The API still starts without OpenSearch; search answers 503 until it
/// becomes reachable.
async fn prepare_search_index(opensearch: &OpenSearchClient) {
    if !opensearch.health_check().await {
        warn!(host = opensearch.host(), "OpenSearch is not reachable, search is unavailable");
        return;
    }

    match opensearch.get_cluster_info().await {
        Ok(info) => info!(
            cluster = info["cluster_name"].as_str().unwrap_or("unknown"),
            version = info["version"]["number"].as_str().unwrap_or("unknown"),
            "Connected to OpenSearch"
        ),
        Err(e) => warn!(error = %e, "Failed to read cluster info"),
    }

    match opensearch.create_index(false).await {
        Ok(true) => info!(index = opensearch.index_name(), "Created search index"),
        Ok(false) => info!(index = opensearch.index_name(), "Search index already present"),
        Err(e) => warn!(error = %e, "Failed to ensure search index"),
    }

    match opensearch.get_index_stats().await {
        Ok(stats) => info!(
            index = %stats.index_name,
            documents = stats.document_count,
            health = %stats.health,
            "OpenSearch ready"
        ),
        Err(e) => warn!(error = %e, "Failed to read index stats"),
    }
}

/// Create the main application router
fn create_router(state: AppState, metrics_handle: PrometheusHandle) -> Router {
    let request_timeout = state.settings.request_timeout();

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let api_routes = Router::new()
        .route("/ping", get(handlers::ping::ping))
        .route("/health", get(handlers::health::health))
        .route("/papers", get(handlers::papers::list_papers))
        .route("/papers/{arxiv_id}", get(handlers::papers::get_paper))
        .route("/search/", post(handlers::search::search));

    Router::new()
        .nest("/api/v1", api_routes)
        .route(
            "/metrics",
            get(move || std::future::ready(metrics_handle.render())),
        )
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
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
                warn!(error = %e, "Failed to listen for SIGTERM");
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
