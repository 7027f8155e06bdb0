//! HTTP request handlers

use super::assets::{get_index_html, serve_static};
use super::sse::sse_stream;
use super::types::{
    ChatRequest, ChatResponse, ConversationResponse, ErrorResponse, SuggestionsResponse,
};
use super::AppState;
use crate::chat::SubmitError;
use crate::persona;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Root serves the page
        .route("/", get(serve_spa))
        .route("/assets/*path", get(serve_static))
        // Conversation snapshot
        .route("/api/conversation", get(get_conversation))
        .route("/api/start", post(start_conversation))
        .route("/api/suggestions", get(list_suggestions))
        // User actions
        .route("/api/chat", post(send_chat))
        // Live updates
        .route("/api/stream", get(stream_conversation))
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Page
// ============================================================

async fn serve_spa() -> impl IntoResponse {
    match get_index_html() {
        Some(content) => Html(content).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Html("<h1>404 - UI not found</h1>".to_string()),
        )
            .into_response(),
    }
}

// ============================================================
// Conversation
// ============================================================

fn conversation_response(state: &AppState) -> ConversationResponse {
    ConversationResponse {
        snapshot: state.runtime.store().snapshot(),
        model: state.runtime.model_id().to_string(),
    }
}

async fn get_conversation(State(state): State<AppState>) -> Json<ConversationResponse> {
    Json(conversation_response(&state))
}

/// Open the conversation, seeding the greeting on first use
async fn start_conversation(State(state): State<AppState>) -> Json<ConversationResponse> {
    if state.runtime.store().start() {
        tracing::info!("Conversation started");
    }
    Json(conversation_response(&state))
}

async fn list_suggestions() -> Json<SuggestionsResponse> {
    Json(SuggestionsResponse {
        suggestions: persona::SUGGESTIONS.to_vec(),
    })
}

// ============================================================
// User Actions
// ============================================================

/// Accept a message and produce the reply in the background.
///
/// Progress reaches the page over the event stream.
async fn send_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<(StatusCode, Json<ChatResponse>), AppError> {
    let ticket = state.runtime.begin_turn(&req.text)?;
    let message_id = ticket.message().id.clone();

    let runtime = Arc::clone(&state.runtime);
    tokio::spawn(async move {
        // Failures already surface in the conversation and the runtime's logs
        let _ = runtime.complete_turn(ticket).await;
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(ChatResponse {
            accepted: true,
            message_id,
        }),
    ))
}

async fn stream_conversation(State(state): State<AppState>) -> impl IntoResponse {
    let (snapshot, broadcast_rx) = state.runtime.store().subscribe();
    sse_stream(snapshot, broadcast_rx, state.shutdown.clone())
}

async fn get_version() -> &'static str {
    concat!("monsoon-explorer ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

enum AppError {
    BadRequest(String),
    Conflict(String),
}

impl From<SubmitError> for AppError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::EmptyMessage => AppError::BadRequest(err.to_string()),
            SubmitError::Busy => AppError::Conflict(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
