//! Monsoon Explorer - conversational guide to India's rainy-season destinations
//!
//! A Rust backend that streams replies from a hosted model into a single
//! web page, answering weather questions with a simulated forecast tool.

mod api;
mod chat;
mod config;
mod llm;
mod persona;

use api::{create_router, AppState};
use chat::{ChatRuntime, ConversationStore, TurnLimits, WeatherTool};
use config::Config;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "monsoon_explorer=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let config = Config::from_env().inspect_err(|e| {
        tracing::error!(error = %e, "Invalid configuration");
    })?;

    let session = llm::create_session(&config.llm)?;

    let rng = match config.weather_seed {
        Some(seed) => {
            tracing::info!(seed, "Weather simulation seeded");
            StdRng::seed_from_u64(seed)
        }
        None => StdRng::from_entropy(),
    };

    // Cancelled on shutdown so an in-flight turn stops waiting on the model
    let shutdown = CancellationToken::new();
    let runtime = ChatRuntime::new(
        session,
        Arc::new(ConversationStore::new()),
        WeatherTool::new(rng),
        TurnLimits::new(config.stream_timeout, shutdown.clone()),
    );
    let state = AppState::new(runtime, shutdown.clone());

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .layer(compression),
    );

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(
        model = %config.llm.model,
        stream_timeout_secs = config.stream_timeout.as_secs(),
        "Monsoon Explorer listening on {}",
        addr
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
    shutdown.cancel();
}
