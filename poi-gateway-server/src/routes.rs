//! HTTP routes and error mapping.
//!
//! Callers only ever see one of four outcomes: the upstream payload (200), a
//! validation message (400), an unavailability message (503), or a generic
//! server error (500). Mirror identity and retry history stay in the logs.

use std::any::Any;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{debug, error};
use poi_gateway_core::{CachedPayload, QueryRequest};
use poi_gateway_upstream::{Gateway, GatewayError};
use serde::Serialize;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

const INVALID_INPUT_MESSAGE: &str = "rules and center are required";
const UNAVAILABLE_MESSAGE: &str = "Overpass unavailable; try later";
const INTERNAL_MESSAGE: &str = "Server error";

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    gateway: Arc<Gateway>,
}

impl AppState {
    /// Wrap a gateway for sharing between handlers.
    #[must_use]
    pub const fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }
}

/// Build the application router.
///
/// Exposes `POST /api/overpass` and `GET /health`. Panics inside a handler
/// are converted into 500 responses.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/overpass", post(submit_query))
        .route("/health", get(health))
        .with_state(state)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
}

async fn submit_query(
    State(state): State<AppState>,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<PayloadResponse, ApiError> {
    let Json(request) = body.map_err(|rejection| {
        debug!("rejected request body: {rejection}");
        ApiError::InvalidInput
    })?;
    let response = state.gateway.handle(request).await?;
    Ok(PayloadResponse(response.payload))
}

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
    cached_entries: usize,
    mirrors: usize,
}

async fn health(State(state): State<AppState>) -> Json<HealthBody> {
    Json(HealthBody {
        status: "ok",
        cached_entries: state.gateway.cached_entries(),
        mirrors: state.gateway.mirror_count(),
    })
}

/// Upstream JSON written back verbatim.
struct PayloadResponse(CachedPayload);

impl IntoResponse for PayloadResponse {
    fn into_response(self) -> Response {
        match serde_json::to_vec(self.0.as_ref()) {
            Ok(bytes) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/json")],
                bytes,
            )
                .into_response(),
            Err(err) => {
                error!("failed to serialise payload: {err}");
                ApiError::Internal.into_response()
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
}

/// Failures mapped onto HTTP responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ApiError {
    InvalidInput,
    Unavailable,
    Internal,
}

impl ApiError {
    const fn status(self) -> StatusCode {
        match self {
            Self::InvalidInput => StatusCode::BAD_REQUEST,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    const fn message(self) -> &'static str {
        match self {
            Self::InvalidInput => INVALID_INPUT_MESSAGE,
            Self::Unavailable => UNAVAILABLE_MESSAGE,
            Self::Internal => INTERNAL_MESSAGE,
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Validation(_) => Self::InvalidInput,
            GatewayError::Unavailable(_) => Self::Unavailable,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status(),
            Json(ErrorBody {
                error: self.message(),
            }),
        )
            .into_response()
    }
}

#[expect(
    clippy::needless_pass_by_value,
    reason = "CatchPanicLayer hands the panic payload over by value"
)]
fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_owned());
    error!("request handler panicked: {detail}");
    ApiError::Internal.into_response()
}
