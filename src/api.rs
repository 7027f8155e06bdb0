//! HTTP API for Monsoon Explorer
//!
//! Serves the single page, the conversation snapshot, chat submission and
//! the live event stream.

mod assets;
mod handlers;
mod sse;
mod types;

pub use handlers::create_router;

use crate::chat::ProductionRuntime;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<ProductionRuntime>,
    /// Cancelled on shutdown; ends open event streams
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(runtime: ProductionRuntime, shutdown: CancellationToken) -> Self {
        Self {
            runtime: Arc::new(runtime),
            shutdown,
        }
    }
}
