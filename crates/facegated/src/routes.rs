//! HTTP surface: multipart upload parsing and error-to-status mapping.
//!
//! Endpoints:
//! - `GET /`              liveness
//! - `GET /status`        backend and policy summary
//! - `POST /enroll`       `images`, `firstName`, `lastName`, `age`
//! - `POST /authenticate` `image`, optional `top_k`

use axum::extract::multipart::{Multipart, MultipartError};
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use facegate_core::{
    EnrollmentPipeline, IdentityForm, ImageUpload, MatchingPipeline, PipelineError,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Per-process state shared by all requests.
#[derive(Clone)]
pub struct AppState {
    pub enrollment: Arc<EnrollmentPipeline>,
    pub matching: Arc<MatchingPipeline>,
    pub default_top_k: usize,
    /// Backend description for `/status`.
    pub store: String,
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/status", get(status))
        .route("/enroll", post(enroll))
        .route("/authenticate", post(authenticate))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS policy: any origin unless an explicit list is configured.
pub fn cors(origins: &[String]) -> anyhow::Result<CorsLayer> {
    if origins.is_empty() {
        return Ok(CorsLayer::permissive());
    }
    let origins = origins
        .iter()
        .map(|o| o.parse::<HeaderValue>())
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any))
}

/// Error response: `{error, kind}` with a status chosen by failure class.
pub enum ApiError {
    Pipeline(PipelineError),
    Multipart(MultipartError),
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        ApiError::Pipeline(e)
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        ApiError::Multipart(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Multipart(e) => {
                tracing::warn!(error = %e.body_text(), "rejected multipart body");
                (
                    e.status(),
                    Json(json!({ "error": e.body_text(), "kind": "validation_error" })),
                )
                    .into_response()
            }
            ApiError::Pipeline(e) => {
                let status = if e.is_timeout() {
                    StatusCode::GATEWAY_TIMEOUT
                } else {
                    match e {
                        PipelineError::Search(_) => StatusCode::BAD_GATEWAY,
                        _ => StatusCode::BAD_REQUEST,
                    }
                };
                if status.is_server_error() {
                    tracing::error!(error = %e, kind = e.kind(), "request failed");
                } else {
                    tracing::info!(error = %e, kind = e.kind(), "request rejected");
                }
                (status, Json(json!({ "error": e.to_string(), "kind": e.kind() }))).into_response()
            }
        }
    }
}

async fn home() -> Json<serde_json::Value> {
    Json(json!({ "message": "Face Recognition API is running" }))
}

async fn status(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "store": state.store,
        "match_threshold": state.matching.policy().threshold(),
        "default_top_k": state.default_top_k,
    }))
}

async fn enroll(State(state): State<AppState>, mut multipart: Multipart) -> Result<Response, ApiError> {
    let mut identity = IdentityForm::default();
    let mut images = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "images" => {
                let filename = field.file_name().map(String::from);
                let data = field.bytes().await?;
                images.push(ImageUpload::new(filename, data.to_vec()));
            }
            "firstName" => identity.first_name = Some(field.text().await?),
            "lastName" => identity.last_name = Some(field.text().await?),
            "age" => identity.age = Some(field.text().await?),
            _ => {}
        }
    }

    let result = state.enrollment.enroll(identity, images).await?;
    let status = if result.storage_result.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_GATEWAY
    };
    Ok((status, Json(result)).into_response())
}

async fn authenticate(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut image = None;
    let mut top_k = state.default_top_k;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            // First `image` part wins; later ones are ignored.
            "image" if image.is_none() => {
                let filename = field.file_name().map(String::from);
                let data = field.bytes().await?;
                image = Some(ImageUpload::new(filename, data.to_vec()));
            }
            // Unparsable values fall back to the default.
            "top_k" => {
                if let Ok(k) = field.text().await?.trim().parse() {
                    top_k = k;
                }
            }
            _ => {}
        }
    }

    let result = state.matching.authenticate(image, top_k).await?;
    Ok(Json(result.response()).into_response())
}
