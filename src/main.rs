use std::net::SocketAddr;
use std::sync::Arc;

use axum::{extract::State, routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use spotmatch::config::AppConfig;
use spotmatch::engine::MatchingEngine;
use spotmatch::{api, metrics, websocket, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "spotmatch=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = AppConfig::load()?;

    tracing::info!("Starting spotmatch v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {}", config.environment);

    // Install Prometheus recorder
    let metrics_handle = metrics::init_metrics();

    // Initialize matching engine with configured trading pairs
    let symbols = config.symbol_specs()?;
    let engine = Arc::new(MatchingEngine::with_settings(
        symbols,
        config.recent_trades_cap,
        config.default_depth,
    ));
    tracing::info!(
        "Matching engine initialized for {:?}",
        config.get_trading_pairs()
    );

    // Build application state
    let state = Arc::new(AppState {
        config: config.clone(),
        engine,
        metrics_handle,
    });

    // Build router
    let app = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(render_metrics))
        .nest("/api/v1", api::routes::create_router(state.clone()))
        .nest("/ws", websocket::routes::create_router(state.clone()))
        .layer(axum::middleware::from_fn(api::middleware::track_http))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}

async fn render_metrics(State(state): State<Arc<AppState>>) -> String {
    state.metrics_handle.render()
}
