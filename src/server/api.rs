//! HTTP API server implementation

use axum::{
    extract::{rejection::JsonRejection, Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use utoipa::{OpenApi, ToSchema};

use crate::core::config::TranslatorConfig;
use crate::core::errors::TranslationError;
use crate::core::models::TranslationRequest;
use crate::core::translator::AsyncTranslator;

/// Application state
#[derive(Clone)]
pub struct AppState {
    translator: Arc<AsyncTranslator>,
}

impl AppState {
    /// Wrap a shared translator
    pub fn new(translator: Arc<AsyncTranslator>) -> Self {
        Self { translator }
    }
}

/// Health check response
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    service: String,
    version: String,
    model_loaded: bool,
    /// RFC 3339 timestamp of the model load, if it happened
    loaded_at: Option<String>,
}

/// Translation request body
#[derive(Deserialize, ToSchema)]
pub struct TranslatePayload {
    /// Text to translate; required even though the schema allows null
    pub text: Option<String>,
}

/// Translation response body
#[derive(Serialize, ToSchema)]
pub struct TranslateResponse {
    /// Translated units joined back in input order
    pub translated_text: String,
}

/// Plain status message, as returned by `/load_model`
#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    /// Human-readable status
    pub message: String,
}

/// Error response
#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Error payload
    pub error: ErrorDetail,
}

/// Error payload body
#[derive(Serialize, ToSchema)]
pub struct ErrorDetail {
    /// Human-readable description
    pub message: String,
    /// Machine-readable error code
    pub code: String,
    /// `invalid_request_error` or `api_error`
    #[serde(rename = "type")]
    pub kind: String,
}

impl IntoResponse for TranslationError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let kind = if self.is_client_error() {
            "invalid_request_error"
        } else {
            warn!("Request failed: {}", self);
            "api_error"
        };

        let body = ErrorResponse {
            error: ErrorDetail {
                message: self.to_string(),
                code: self.code().to_string(),
                kind: kind.to_string(),
            },
        };

        (status, Json(body)).into_response()
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(health_check, translate, load_model),
    components(schemas(
        HealthResponse,
        TranslatePayload,
        TranslateResponse,
        MessageResponse,
        ErrorResponse,
        ErrorDetail
    ))
)]
struct ApiDoc;

/// Health check handler
#[utoipa::path(get, path = "/", responses((status = 200, body = HealthResponse)))]
async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let cache = state.translator.cache();
    Json(HealthResponse {
        status: "ok".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model_loaded: cache.is_loaded(),
        loaded_at: cache.loaded_at().map(|t| t.to_rfc3339()),
    })
}

/// Translate text, loading the model on first use
#[utoipa::path(
    post,
    path = "/translate",
    request_body = TranslatePayload,
    responses(
        (status = 200, description = "Translated text", body = TranslateResponse),
        (status = 400, description = "Missing or malformed text", body = ErrorResponse),
        (status = 500, description = "Model unavailable or generation failed", body = ErrorResponse)
    )
)]
async fn translate(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TranslatePayload>, JsonRejection>,
) -> Result<Json<TranslateResponse>, TranslationError> {
    let Json(payload) = payload.map_err(|rejection| TranslationError::InvalidRequest {
        message: rejection.body_text(),
    })?;

    let text = payload.text.ok_or_else(|| TranslationError::MissingField {
        field: "text".to_string(),
    })?;

    let result = state.translator.translate(&TranslationRequest::new(text)).await?;

    Ok(Json(TranslateResponse {
        translated_text: result.translated_text,
    }))
}

/// Eagerly download and load the model
#[utoipa::path(
    post,
    path = "/load_model",
    responses(
        (status = 200, description = "Model ready", body = MessageResponse),
        (status = 500, description = "Download or load failed", body = MessageResponse)
    )
)]
async fn load_model(State(state): State<Arc<AppState>>) -> (StatusCode, Json<MessageResponse>) {
    match state.translator.load_model().await {
        Ok(_) => (
            StatusCode::OK,
            Json(MessageResponse {
                message: "Model and tokenizer successfully loaded.".to_string(),
            }),
        ),
        Err(e) => {
            warn!("Model load failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(MessageResponse {
                    message: format!("Error loading model: {}", e),
                }),
            )
        }
    }
}

async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Build the router over shared state
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/translate", post(translate))
        .route("/load_model", post(load_model))
        .route("/api-docs/openapi.json", get(openapi))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP server
pub async fn run_server(config: TranslatorConfig) -> anyhow::Result<()> {
    let translator = Arc::new(AsyncTranslator::from_config(&config)?);
    let state = Arc::new(AppState::new(translator));
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
