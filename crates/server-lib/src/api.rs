//! HTTP API: predict, retrain, info, health checks and Prometheus metrics
//!
//! Every failure is translated here into a status code plus a `{detail}`
//! body; nothing propagates past the handlers.

use crate::error::{ErrorCategory, ServingError};
use crate::health::{components, ComponentStatus, HealthRegistry};
use crate::inference::{InferenceAdapter, InferenceStats, DEFAULT_SLOW_INFERENCE};
use crate::models::{
    ErrorResponse, FeatureVector, MessageResponse, PredictRequest, PredictResponse,
    RetrainRequest, TrainingBatch,
};
use crate::observability::{ServiceMetrics, StructuredLogger};
use crate::provider::ModelProvider;
use crate::retrain::Retrainer;
use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

pub const INFO_MESSAGE: &str =
    "Welcome to the Prediction Service. Use /predict and /retrain endpoints.";
pub const RETRAIN_SUCCESS_MESSAGE: &str = "Model retrained successfully";
pub const MODEL_UNAVAILABLE_DETAIL: &str = "Model initialization error";

/// Request body cap for `/predict` and `/retrain`
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone, Copy)]
enum Operation {
    Predict,
    Retrain,
}

impl Operation {
    fn name(self) -> &'static str {
        match self {
            Operation::Predict => "predict",
            Operation::Retrain => "retrain",
        }
    }

    fn invalid_prefix(self) -> &'static str {
        match self {
            Operation::Predict => "Invalid input",
            Operation::Retrain => "Invalid training data",
        }
    }

    fn failure_prefix(self) -> &'static str {
        match self {
            Operation::Predict => "Prediction failed",
            Operation::Retrain => "Model retraining failed",
        }
    }
}

/// Error response carrying a status and a `{detail}` body
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse { detail: self.detail })).into_response()
    }
}

/// Shared application state
pub struct AppState {
    provider: Arc<dyn ModelProvider>,
    inference: InferenceAdapter,
    retrainer: Retrainer,
    max_body_bytes: usize,
    pub health_registry: HealthRegistry,
    pub metrics: ServiceMetrics,
    pub logger: StructuredLogger,
}

impl AppState {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        health_registry: HealthRegistry,
        metrics: ServiceMetrics,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            retrainer: Retrainer::new(provider.clone()),
            inference: InferenceAdapter::new(DEFAULT_SLOW_INFERENCE),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            provider,
            health_registry,
            metrics,
            logger,
        }
    }

    pub fn with_slow_inference_threshold(mut self, threshold: Duration) -> Self {
        self.inference = InferenceAdapter::new(threshold);
        self
    }

    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    pub fn provider(&self) -> &Arc<dyn ModelProvider> {
        &self.provider
    }

    pub fn inference_stats(&self) -> InferenceStats {
        self.inference.stats()
    }

    /// Record a model handle the service has successfully used
    async fn note_model_available(&self) {
        let generation = self.provider.generation();
        if !self.health_registry.set_model_loaded(generation).await {
            return;
        }
        // Re-read so a late writer cannot move the gauge backwards
        self.metrics.set_model_generation(self.provider.generation());
        self.logger.log_model_ready(generation);
    }

    fn reject(&self, op: Operation, detail: impl AsRef<str>) -> ApiError {
        let detail = format!("{}: {}", op.invalid_prefix(), detail.as_ref());
        self.logger.log_rejected(op.name(), &detail);
        self.metrics.inc_validation_rejections(op.name());
        ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, detail)
    }

    /// Map an unreadable body: oversized is 413, anything else is invalid input
    fn reject_payload(&self, op: Operation, rejection: JsonRejection) -> ApiError {
        if rejection.status() != StatusCode::PAYLOAD_TOO_LARGE {
            return self.reject(op, rejection.body_text());
        }
        let detail = format!(
            "Request body too large: limit is {} bytes",
            self.max_body_bytes
        );
        self.logger.log_rejected(op.name(), &detail);
        self.metrics.inc_validation_rejections(op.name());
        ApiError::new(StatusCode::PAYLOAD_TOO_LARGE, detail)
    }

    async fn fail(&self, op: Operation, err: ServingError) -> ApiError {
        if let ServingError::ModelLoad { .. } = err {
            let message = err.to_string();
            self.logger.log_model_load_failed(&message);
            self.metrics.inc_internal_failures(op.name());
            self.health_registry
                .set_unhealthy(components::MODEL_PROVIDER, message)
                .await;
            return ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, MODEL_UNAVAILABLE_DETAIL);
        }

        match err.category() {
            ErrorCategory::Validation => self.reject(op, err.to_string()),
            ErrorCategory::Internal => {
                let message = err.to_string();
                self.logger.log_internal_failure(op.name(), &message);
                self.metrics.inc_internal_failures(op.name());
                if let Operation::Retrain = op {
                    self.health_registry
                        .set_degraded(components::RETRAINER, format!("Last retrain failed: {}", message))
                        .await;
                }
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("{}: {}", op.failure_prefix(), message),
                )
            }
        }
    }
}

/// Run CPU-bound model work off the async executor
async fn run_blocking<T, F>(f: F) -> Result<T, ServingError>
where
    F: FnOnce() -> Result<T, ServingError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ServingError::Internal(format!("worker task failed: {}", e)))?
}

/// Load the model ahead of the first request
pub async fn preload_model(state: &Arc<AppState>) -> Result<(), ServingError> {
    let task_state = state.clone();
    match run_blocking(move || task_state.provider.acquire().map(|_| ())).await {
        Ok(()) => {
            state.note_model_available().await;
            Ok(())
        }
        Err(err) => {
            let message = err.to_string();
            state.logger.log_model_load_failed(&message);
            state
                .health_registry
                .set_unhealthy(components::MODEL_PROVIDER, message)
                .await;
            Err(err)
        }
    }
}

async fn root() -> Json<MessageResponse> {
    Json(MessageResponse::new(INFO_MESSAGE))
}

async fn predict(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let op = Operation::Predict;
    let Json(request) = payload.map_err(|rejection| state.reject_payload(op, rejection))?;

    if request.data.is_empty() {
        return Err(state.reject(op, "data must contain at least one value"));
    }

    let vector = FeatureVector::from(request.data);
    let width = vector.width();
    let start = Instant::now();

    let task_state = state.clone();
    let result = run_blocking(move || {
        let model = task_state.provider.acquire()?;
        task_state.inference.infer(model.as_ref(), &vector)
    })
    .await;
    let elapsed = start.elapsed();

    match result {
        Ok(prediction) => {
            state.note_model_available().await;
            state.metrics.observe_inference_latency(elapsed.as_secs_f64());
            state.metrics.inc_predictions();
            state
                .logger
                .log_prediction(width, prediction.values().len(), elapsed.as_micros() as u64);
            Ok(Json(PredictResponse {
                predictions: prediction.into_inner(),
            }))
        }
        Err(err) => Err(state.fail(op, err).await),
    }
}

async fn retrain(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RetrainRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let op = Operation::Retrain;
    let Json(request) = payload.map_err(|rejection| state.reject_payload(op, rejection))?;

    let first_width = match request.data.first() {
        Some(row) => row.len(),
        None => return Err(state.reject(op, "data must contain at least one row")),
    };
    if request.labels.is_empty() {
        return Err(state.reject(op, "labels must contain at least one value"));
    }

    // A table built from these rows is as wide as its widest row
    let declared_width = request.data.iter().map(Vec::len).max().unwrap_or(0);
    if first_width != declared_width {
        return Err(state.reject(op, "Inconsistent input dimensions"));
    }

    let batch = TrainingBatch::new(request.data, request.labels);
    let task_state = state.clone();
    let result = run_blocking(move || task_state.retrainer.retrain(&batch)).await;

    match result {
        Ok(outcome) => {
            state.note_model_available().await;
            state.health_registry.set_healthy(components::RETRAINER).await;
            state
                .metrics
                .observe_retrain_latency(outcome.elapsed.as_secs_f64());
            state.metrics.inc_retrains();
            state.logger.log_retrain(
                outcome.rows,
                outcome.width,
                outcome.generation,
                outcome.elapsed.as_millis() as u64,
            );
            Ok(Json(MessageResponse::new(RETRAIN_SUCCESS_MESSAGE)))
        }
        Err(err) => Err(state.fail(op, err).await),
    }
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still serving
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 once a model is loaded
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to encode metrics: {}", e),
        )
            .into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = DefaultBodyLimit::max(state.max_body_bytes);
    Router::new()
        .route("/", get(root))
        .route("/predict", post(predict))
        .route("/retrain", post(retrain))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .layer(body_limit)
        .with_state(state)
}

/// Serve the API on `listener` until `shutdown` resolves
pub async fn serve(
    listener: tokio::net::TcpListener,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state);
    let addr = listener.local_addr()?;

    info!(addr = %addr, "Starting API server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
