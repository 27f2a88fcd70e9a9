//! HTTP API for secondary structure prediction.
//!
//! ## Endpoints
//!
//! - `GET /healthz` - Liveness check, always `{"ok": true}`
//! - `POST /predict` - Predict one Q3 state per residue
//! - `GET /model` - Metadata and artifacts of the loaded model
//!
//! Errors are returned as `{"detail": "..."}`: 422 for a request body of
//! the wrong shape, 400 when no valid amino acids remain after cleaning and
//! 500 when inference fails.
//!
//! ## Example
//!
//! ```rust,no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use sspred::{Predictor, server::{serve, ServerConfig}};
//!
//! let predictor = Predictor::builder().with_weights_dir("weights").build()?;
//! serve(predictor, ServerConfig::default()).await?;
//! # Ok(())
//! # }
//! ```

use std::io;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header::InvalidHeaderValue, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use log::{debug, error, info};

use crate::predictor::{Predictor, PredictorError, PredictorInfo};

/// Origins of the bundled web frontend's development server.
pub const DEFAULT_CORS_ORIGINS: [&str; 2] = ["http://localhost:3000", "http://127.0.0.1:3000"];

/// Settings for the HTTP listener.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cors_origins: DEFAULT_CORS_ORIGINS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Application state shared across handlers
#[derive(Clone, Debug)]
pub struct AppState {
    predictor: Arc<Predictor>,
}

impl AppState {
    pub fn new(predictor: Predictor) -> Self {
        Self {
            predictor: Arc::new(predictor),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub sequence: String,
    #[serde(default = "default_index_start", deserialize_with = "lax_integer")]
    pub index_start: i64,
}

fn default_index_start() -> i64 {
    1
}

/// Accepts an integer, a float without fractional part, or a string holding either.
fn lax_integer<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    parse_integer(&value)
        .ok_or_else(|| de::Error::custom(format!("index_start must be an integer, got {}", value)))
}

fn parse_integer(value: &Value) -> Option<i64> {
    fn from_float(f: f64) -> Option<i64> {
        (f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64).then_some(f as i64)
    }

    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(from_float)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(from_float))
        }
        _ => None,
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PredictResponse {
    pub sequence: String,
    pub index_start: u64,
    pub states: Vec<String>,
}

/// An error rendered as `{"detail": ...}` with its status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

impl From<PredictorError> for ApiError {
    fn from(err: PredictorError) -> Self {
        match err {
            PredictorError::ValidationError(msg) => ApiError::new(StatusCode::BAD_REQUEST, msg),
            PredictorError::LengthMismatch { expected, actual } => {
                error!("Model returned {} states for {} residues", actual, expected);
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Model length mismatch.")
            }
            other => {
                error!("Prediction failed: {}", other);
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
            }
        }
    }
}

/// Checks the request shape before any work is done.
fn validate_request(request: &PredictRequest) -> Result<u64, ApiError> {
    if request.sequence.is_empty() {
        return Err(ApiError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "sequence: String should have at least 1 character",
        ));
    }
    if request.index_start < 1 {
        return Err(ApiError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "index_start: Input should be greater than or equal to 1",
        ));
    }
    Ok(request.index_start as u64)
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "ok": true }))
}

async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let Json(request) =
        payload.map_err(|rejection| ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, rejection.body_text()))?;
    let index_start = validate_request(&request)?;
    debug!("Predict request: {} raw characters", request.sequence.len());

    let predictor = Arc::clone(&state.predictor);
    let prediction = tokio::task::spawn_blocking(move || predictor.predict(&request.sequence, index_start))
        .await
        .map_err(|e| {
            error!("Inference task failed: {}", e);
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Inference task failed.")
        })??;

    Ok(Json(PredictResponse {
        sequence: prediction.sequence,
        index_start: prediction.index_start,
        states: prediction.states,
    }))
}

async fn model_info(State(state): State<AppState>) -> Json<PredictorInfo> {
    Json(state.predictor.info())
}

/// Builds the CORS policy: listed origins, credentials allowed, any method and header.
pub fn cors_layer(origins: &[String]) -> Result<CorsLayer, InvalidHeaderValue> {
    let origins = origins
        .iter()
        .map(|origin| HeaderValue::from_str(origin))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request()))
}

/// Creates the router without CORS, as used in tests.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/predict", post(predict))
        .route("/model", get(model_info))
        .with_state(state)
}

/// Binds the listener and serves until Ctrl-C.
pub async fn serve(predictor: Predictor, config: ServerConfig) -> io::Result<()> {
    let cors = cors_layer(&config.cors_origins)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, format!("Invalid CORS origin: {}", e)))?;
    let app = create_router(AppState::new(predictor)).layer(cors);

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
