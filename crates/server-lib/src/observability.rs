//! Observability infrastructure for the prediction service
//!
//! Provides:
//! - Prometheus metrics (inference/retrain latency, request outcomes, model generation)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{error, info, warn};

/// Histogram buckets for inference latency (in seconds)
const INFERENCE_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Histogram buckets for retrain latency (in seconds)
const RETRAIN_BUCKETS: &[f64] = &[0.001, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ServiceMetricsInner> = OnceLock::new();

struct ServiceMetricsInner {
    inference_latency_seconds: Histogram,
    retrain_latency_seconds: Histogram,
    predictions_total: IntCounter,
    retrains_total: IntCounter,
    validation_rejections: IntCounterVec,
    internal_failures: IntCounterVec,
    model_generation: IntGauge,
}

impl ServiceMetricsInner {
    fn new() -> Self {
        Self {
            inference_latency_seconds: register_histogram!(
                "prediction_service_inference_latency_seconds",
                "Time spent running model inference for a predict request",
                INFERENCE_BUCKETS.to_vec()
            )
            .expect("Failed to register inference_latency_seconds"),

            retrain_latency_seconds: register_histogram!(
                "prediction_service_retrain_latency_seconds",
                "Time spent validating, fitting and swapping a retrained model",
                RETRAIN_BUCKETS.to_vec()
            )
            .expect("Failed to register retrain_latency_seconds"),

            predictions_total: register_int_counter!(
                "prediction_service_predictions_total",
                "Total number of successful predictions"
            )
            .expect("Failed to register predictions_total"),

            retrains_total: register_int_counter!(
                "prediction_service_retrains_total",
                "Total number of successful retrains"
            )
            .expect("Failed to register retrains_total"),

            validation_rejections: register_int_counter_vec!(
                "prediction_service_validation_rejections_total",
                "Requests rejected as invalid, by operation",
                &["operation"]
            )
            .expect("Failed to register validation_rejections"),

            internal_failures: register_int_counter_vec!(
                "prediction_service_internal_failures_total",
                "Requests that failed inside the service, by operation",
                &["operation"]
            )
            .expect("Failed to register internal_failures"),

            model_generation: register_int_gauge!(
                "prediction_service_model_generation",
                "Generation of the active model handle"
            )
            .expect("Failed to register model_generation"),
        }
    }
}

/// Service metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct ServiceMetrics {
    _private: (),
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ServiceMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ServiceMetricsInner {
        GLOBAL_METRICS.get_or_init(ServiceMetricsInner::new)
    }

    pub fn observe_inference_latency(&self, duration_secs: f64) {
        self.inner().inference_latency_seconds.observe(duration_secs);
    }

    pub fn observe_retrain_latency(&self, duration_secs: f64) {
        self.inner().retrain_latency_seconds.observe(duration_secs);
    }

    pub fn inc_predictions(&self) {
        self.inner().predictions_total.inc();
    }

    pub fn inc_retrains(&self) {
        self.inner().retrains_total.inc();
    }

    pub fn inc_validation_rejections(&self, operation: &str) {
        self.inner()
            .validation_rejections
            .with_label_values(&[operation])
            .inc();
    }

    pub fn inc_internal_failures(&self, operation: &str) {
        self.inner()
            .internal_failures
            .with_label_values(&[operation])
            .inc();
    }

    pub fn set_model_generation(&self, generation: u64) {
        self.inner().model_generation.set(generation as i64);
    }
}

/// Structured logger for service events
///
/// Provides consistent JSON-formatted logging for model loads, predictions,
/// retrains and rejected requests.
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Log service startup
    pub fn log_startup(&self, version: &str, model_path: &str) {
        info!(
            event = "service_started",
            instance = %self.instance,
            service_version = %version,
            model_path = %model_path,
            "Prediction service started"
        );
    }

    /// Log service shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Prediction service shutting down"
        );
    }

    /// Log that a model handle became available
    pub fn log_model_ready(&self, generation: u64) {
        info!(
            event = "model_ready",
            instance = %self.instance,
            generation = generation,
            "Model handle available"
        );
    }

    /// Log a model load failure
    pub fn log_model_load_failed(&self, error: &str) {
        error!(
            event = "model_load_failed",
            instance = %self.instance,
            error = %error,
            "Model initialization error"
        );
    }

    /// Log a served prediction
    pub fn log_prediction(&self, input_width: usize, outputs: usize, elapsed_us: u64) {
        info!(
            event = "prediction_served",
            instance = %self.instance,
            input_width = input_width,
            outputs = outputs,
            elapsed_us = elapsed_us,
            "Prediction served"
        );
    }

    /// Log a completed retrain
    pub fn log_retrain(&self, rows: usize, width: usize, generation: u64, elapsed_ms: u64) {
        info!(
            event = "model_retrained",
            instance = %self.instance,
            rows = rows,
            width = width,
            generation = generation,
            elapsed_ms = elapsed_ms,
            "Model retrained successfully"
        );
    }

    /// Log a request rejected as invalid
    pub fn log_rejected(&self, operation: &str, detail: &str) {
        warn!(
            event = "request_rejected",
            instance = %self.instance,
            operation = %operation,
            detail = %detail,
            "Request failed validation"
        );
    }

    /// Log a request that failed inside the service
    pub fn log_internal_failure(&self, operation: &str, error: &str) {
        error!(
            event = "request_failed",
            instance = %self.instance,
            operation = %operation,
            error = %error,
            "Request failed"
        );
    }
}
