//! HTTP surface over the classifier.
//!
//! `POST /classify` takes a batch of readings (and optional thresholds) and
//! returns the annotated readings, the suspicious list and the run digest.

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use meter_client::domain::{AnnotatedReading, SuspiciousMeter};
use serde::{Deserialize, Serialize};

use crate::{
    analysis::{classify_sharded, ClassifyError, Thresholds},
    config::validate_thresholds,
    report::digest,
    schema::SchemaError,
    sources::IncomingReading,
};

/// Upper bound on the JSON body, independent of the reading count limit.
const MAX_BODY_BYTES: usize = 256 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ApiState {
    pub thresholds: Thresholds,
    pub workers: usize,
    pub max_request_readings: usize,
}

#[derive(Debug, Deserialize)]
pub struct ClassifyRequest {
    /// Decoded one by one so a bad element is reported with its row number.
    pub readings: Vec<serde_json::Value>,
    #[serde(default)]
    pub thresholds: Option<Thresholds>,
}

#[derive(Debug, Serialize)]
pub struct ClassifyResponse {
    pub annotated: Vec<AnnotatedReading>,
    pub suspicious: Vec<SuspiciousMeter>,
    pub digest: String,
}

#[derive(Debug)]
pub enum ApiError {
    Schema(SchemaError),
    BadRequest(String),
    Unexpected(String),
}

impl From<ClassifyError> for ApiError {
    fn from(e: ClassifyError) -> Self {
        match e {
            ClassifyError::Schema(s) => ApiError::Schema(s),
            ClassifyError::Unexpected(msg) => ApiError::Unexpected(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Schema(e) => {
                metrics::counter!("tamper_schema_rejections_total").increment(1);
                let body = serde_json::json!({
                    "error": e.to_string(),
                    "missing_columns": e.missing_columns,
                    "invalid": e.invalid,
                });
                (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response()
            }
            ApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, Json(serde_json::json!({ "error": msg }))).into_response()
            }
            ApiError::Unexpected(msg) => {
                tracing::error!(error = %msg, "classification request failed");
                let body = serde_json::json!({ "error": "classification failed unexpectedly; see server logs" });
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/classify", post(classify_handler))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(Arc::new(state))
}

async fn health() -> &'static str {
    "ok"
}

pub async fn classify_handler(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<ClassifyRequest>,
) -> Result<Json<ClassifyResponse>, ApiError> {
    metrics::counter!("http_classify_requests_total").increment(1);

    if request.readings.len() > state.max_request_readings {
        return Err(ApiError::BadRequest(format!(
            "request has {} readings, limit is {}",
            request.readings.len(),
            state.max_request_readings
        )));
    }

    let thresholds = request.thresholds.unwrap_or(state.thresholds);
    validate_thresholds(&thresholds).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let mut readings = Vec::with_capacity(request.readings.len());
    let mut rejected = SchemaError::default();
    for (i, value) in request.readings.into_iter().enumerate() {
        let row = i + 1;
        match IncomingReading::from_json(value, row).and_then(|incoming| incoming.into_raw(row).parse()) {
            Ok(r) => readings.push(r),
            Err(e) => rejected.merge(e),
        }
    }
    if !rejected.is_empty() {
        return Err(ApiError::Schema(rejected));
    }

    let output = classify_sharded(readings, thresholds, state.workers).await?;
    let digest = digest(&output.suspicious);

    Ok(Json(ClassifyResponse {
        annotated: output.annotated,
        suspicious: output.suspicious,
        digest,
    }))
}
