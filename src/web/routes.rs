use crate::error::AppResult;
use crate::lifecycle::{Engine, MessageStatus, Phase, RedemptionOutcome};
use crate::web::codec::{decode_share, encode_share};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

/// Shared state for the HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Deserialize)]
pub struct CreateMessageRequest {
    pub creator: String,
    pub message: String,
    pub keyholders: usize,
    pub min_keyholders: usize,
}

#[derive(Serialize)]
pub struct CreateMessageResponse {
    pub message_id: Uuid,
    /// Base64 shares, one per keyholder. Returned once and never stored.
    pub shares: Vec<String>,
}

/// Create a message and hand back its shares
pub async fn create_message(
    State(state): State<AppState>,
    Json(req): Json<CreateMessageRequest>,
) -> AppResult<(StatusCode, Json<CreateMessageResponse>)> {
    let created = state
        .engine
        .create_message(
            &req.creator,
            req.message.as_bytes(),
            req.keyholders,
            req.min_keyholders,
        )
        .await?;

    info!(message_id = %created.message.id, "Message created via API");

    Ok((
        StatusCode::CREATED,
        Json(CreateMessageResponse {
            message_id: created.message.id,
            shares: created.shares.iter().map(encode_share).collect(),
        }),
    ))
}

#[derive(Serialize)]
pub struct MessageStatusResponse {
    pub message_id: Uuid,
    pub creator: String,
    pub filled: usize,
    pub min_shares: usize,
    pub total_shares: usize,
    pub phase: Phase,
}

impl From<MessageStatus> for MessageStatusResponse {
    fn from(status: MessageStatus) -> Self {
        let phase = status.phase();
        Self {
            message_id: status.message_id,
            creator: status.creator_label,
            filled: status.filled,
            min_shares: status.min_shares,
            total_shares: status.total_shares,
            phase,
        }
    }
}

/// Get collection progress for a message
pub async fn get_message(
    Path(message_id): Path<Uuid>,
    State(state): State<AppState>,
) -> AppResult<Json<MessageStatusResponse>> {
    let status = state.engine.get_status(message_id).await?;
    Ok(Json(status.into()))
}

#[derive(Deserialize)]
pub struct SubmitShareRequest {
    /// Base64, or a bracketed decimal byte list
    pub share: String,
    #[serde(default)]
    pub share_id: Option<Uuid>,
}

#[derive(Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmitShareResponse {
    Collecting {
        filled: usize,
        min_shares: usize,
        total_shares: usize,
    },
    Decrypted {
        message: String,
    },
}

/// Submit one keyholder share
pub async fn submit_share(
    Path(message_id): Path<Uuid>,
    State(state): State<AppState>,
    Json(req): Json<SubmitShareRequest>,
) -> AppResult<Json<SubmitShareResponse>> {
    let share = decode_share(&req.share)?;

    let outcome = state
        .engine
        .submit_share(message_id, req.share_id, share.expose())
        .await?;

    let response = match outcome {
        RedemptionOutcome::Collecting {
            filled,
            min_shares,
            total_shares,
        } => SubmitShareResponse::Collecting {
            filled,
            min_shares,
            total_shares,
        },
        RedemptionOutcome::Decrypted { plaintext } => SubmitShareResponse::Decrypted {
            message: String::from_utf8_lossy(plaintext.expose()).into_owned(),
        },
    };
    Ok(Json(response))
}

/// Create the HTTP router
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/messages", post(create_message))
        .route("/api/messages/{message_id}", get(get_message))
        .route("/api/messages/{message_id}/shares", post(submit_share))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
