//! HTTP API endpoints.
//!
//! Stateless request/response handlers: each call validates its body, talks
//! to the AI gateway, and answers with JSON. Failures map to a
//! `{ error, details? }` envelope: 400 for validation, 500 for upstream or
//! empty generations. No conversation state lives at this layer.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::gateway::{
    parse_image_quality, parse_image_size, ChatOptions, GatewayError, ImageOptions,
    DEFAULT_IMAGE_QUALITY, DEFAULT_IMAGE_SIZE, SUPPORTED_IMAGE_QUALITIES, SUPPORTED_IMAGE_SIZES,
};
use crate::session::IDLE_WINDOW;
use crate::state::AppState;
use crate::types::{Message, MessageContent, MessageRole, TokenUsage};

/// JSON error envelope shared by all handlers
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

fn error_response(status: StatusCode, error: &str, details: Option<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: error.to_string(),
            details,
        }),
    )
        .into_response()
}

/// One history entry in a chat completion request
#[derive(Debug, Clone, Deserialize)]
pub struct ChatTurn {
    pub role: MessageRole,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionRequest {
    #[serde(default)]
    pub messages: Vec<ChatTurn>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ChatCompletionResponse {
    pub success: bool,
    pub response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Single-shot chat completion.
///
/// POST /api/ai/chat
pub async fn chat_completion(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ChatCompletionRequest>,
) -> Response {
    if body.messages.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Messages array is required", None);
    }

    let Some(gateway) = state.gateway.clone() else {
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to generate response",
            Some("no AI gateway configured".to_string()),
        );
    };

    let history: Vec<Message> = body
        .messages
        .into_iter()
        .map(|turn| Message::text(turn.role, turn.content))
        .collect();

    let options = ChatOptions {
        model: body.model,
        temperature: body.temperature,
        max_tokens: body.max_tokens,
    };

    match gateway.complete(&history, options).await {
        Ok(reply) => {
            let MessageContent::Text { text } = reply.content else {
                return error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "No response generated",
                    None,
                );
            };

            (
                StatusCode::OK,
                Json(ChatCompletionResponse {
                    success: true,
                    response: text,
                    usage: reply.usage,
                    model: reply.model,
                }),
            )
                .into_response()
        }
        Err(GatewayError::GeneratedEmpty) => {
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "No response generated", None)
        }
        Err(err) => {
            tracing::error!("Chat API error: {}", err);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to generate response",
                Some(err.to_string()),
            )
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageGenerationRequest {
    #[serde(default)]
    pub prompt: String,
    pub size: Option<String>,
    pub quality: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ImageGenerationResponse {
    pub success: bool,
    /// Data URI with the base64 payload
    pub image: String,
    pub prompt: String,
    pub size: String,
    pub quality: String,
}

/// Single-shot image generation.
///
/// POST /api/ai/image
pub async fn generate_image(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ImageGenerationRequest>,
) -> Response {
    if body.prompt.trim().is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Prompt is required and must be a string",
            None,
        );
    }

    let size = body.size.unwrap_or_else(|| DEFAULT_IMAGE_SIZE.to_string());
    if parse_image_size(&size).is_none() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Unsupported image size",
            Some(format!("supported sizes: {}", SUPPORTED_IMAGE_SIZES.join(", "))),
        );
    }

    let quality = body
        .quality
        .unwrap_or_else(|| DEFAULT_IMAGE_QUALITY.to_string());
    if parse_image_quality(&quality).is_none() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Unsupported image quality",
            Some(format!(
                "supported qualities: {}",
                SUPPORTED_IMAGE_QUALITIES.join(", ")
            )),
        );
    }

    let Some(gateway) = state.gateway.clone() else {
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to generate image",
            Some("no AI gateway configured".to_string()),
        );
    };

    let options = ImageOptions {
        size: Some(size.clone()),
        quality: Some(quality.clone()),
    };

    match gateway.generate_image(body.prompt.trim(), options).await {
        Ok(reply) => {
            let MessageContent::Image { prompt, image, .. } = reply.content else {
                return error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "No image generated",
                    None,
                );
            };

            (
                StatusCode::OK,
                Json(ImageGenerationResponse {
                    success: true,
                    image,
                    prompt,
                    size,
                    quality,
                }),
            )
                .into_response()
        }
        Err(GatewayError::GeneratedEmpty) => {
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "No image generated", None)
        }
        Err(err) => {
            tracing::error!("Image generation API error: {}", err);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to generate image",
                Some(err.to_string()),
            )
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatApiInfo {
    pub message: &'static str,
    pub version: &'static str,
    pub endpoints: ApiEndpoints,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiEndpoints {
    pub chat: &'static str,
    pub image: &'static str,
    pub websocket: &'static str,
}

/// Service banner for the chat API.
///
/// GET /api/ai/chat (static payload, safe to poll)
pub async fn chat_info() -> Json<ChatApiInfo> {
    Json(ChatApiInfo {
        message: "FlowChat AI Chat API is running",
        version: env!("CARGO_PKG_VERSION"),
        endpoints: ApiEndpoints {
            chat: "POST /api/ai/chat",
            image: "POST /api/ai/image",
            websocket: "GET /ws",
        },
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageApiInfo {
    pub message: &'static str,
    pub version: &'static str,
    pub supported_sizes: &'static [&'static str],
    pub supported_qualities: &'static [&'static str],
}

/// Service banner for the image API.
///
/// GET /api/ai/image
pub async fn image_info() -> Json<ImageApiInfo> {
    Json(ImageApiInfo {
        message: "FlowChat AI Image Generation API is running",
        version: env!("CARGO_PKG_VERSION"),
        supported_sizes: SUPPORTED_IMAGE_SIZES,
        supported_qualities: SUPPORTED_IMAGE_QUALITIES,
    })
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub active_conversations: usize,
    pub uptime_seconds: u64,
    pub timestamp: DateTime<Utc>,
}

/// Liveness snapshot.
///
/// GET /api/health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "flowchat",
        version: env!("CARGO_PKG_VERSION"),
        active_conversations: state.sessions.count().await,
        uptime_seconds: state.uptime_seconds(),
        timestamp: Utc::now(),
    })
}

#[derive(Debug, Serialize)]
pub struct StoreStatsResponse {
    pub timestamp: DateTime<Utc>,
    pub conversations: usize,
    pub messages: usize,
    pub idle_window_seconds: u64,
}

/// Session store snapshot; the in-memory table is the only data store.
///
/// GET /api/database/stats
pub async fn database_stats(State(state): State<Arc<AppState>>) -> Json<StoreStatsResponse> {
    Json(StoreStatsResponse {
        timestamp: Utc::now(),
        conversations: state.sessions.count().await,
        messages: state.sessions.message_count().await,
        idle_window_seconds: IDLE_WINDOW.as_secs(),
    })
}

#[derive(Debug, Serialize)]
pub struct GatewayStatus {
    pub configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub model: String,
}

#[derive(Debug, Serialize)]
pub struct SystemMetricsResponse {
    pub uptime_seconds: u64,
    pub conversations: usize,
    pub messages: usize,
    pub gateway: GatewayStatus,
    pub last_updated: DateTime<Utc>,
}

/// Process metrics with measured values only.
///
/// GET /api/system/metrics
pub async fn system_metrics(State(state): State<Arc<AppState>>) -> Json<SystemMetricsResponse> {
    Json(SystemMetricsResponse {
        uptime_seconds: state.uptime_seconds(),
        conversations: state.sessions.count().await,
        messages: state.sessions.message_count().await,
        gateway: GatewayStatus {
            configured: state.gateway.is_some(),
            provider: state.gateway.as_ref().map(|g| g.name().to_string()),
            model: state.gateway_config.model.clone(),
        },
        last_updated: Utc::now(),
    })
}
