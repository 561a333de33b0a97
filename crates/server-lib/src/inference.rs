//! Inference adapter
//!
//! Shapes a single feature vector into a one-row batch, runs the model and
//! flattens the output. Width problems are caught here and reported as
//! shape errors instead of being forwarded to the backend.

use crate::error::{ServingError, ServingResult};
use crate::model::Model;
use crate::models::{FeatureVector, PredictionResult};
use ndarray::Array2;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Latency above which an inference is logged as slow
pub const DEFAULT_SLOW_INFERENCE: Duration = Duration::from_millis(50);

pub struct InferenceAdapter {
    slow_threshold: Duration,
    inference_count: AtomicU64,
    slow_inference_count: AtomicU64,
}

impl Default for InferenceAdapter {
    fn default() -> Self {
        Self::new(DEFAULT_SLOW_INFERENCE)
    }
}

impl InferenceAdapter {
    pub fn new(slow_threshold: Duration) -> Self {
        Self {
            slow_threshold,
            inference_count: AtomicU64::new(0),
            slow_inference_count: AtomicU64::new(0),
        }
    }

    /// Predict for one feature vector
    pub fn infer(&self, model: &dyn Model, vector: &FeatureVector) -> ServingResult<PredictionResult> {
        let batch = shape_single(model, vector)?;
        let start = Instant::now();

        let output = model.predict(batch.view()).map_err(ServingError::inference)?;

        let elapsed = start.elapsed();
        self.inference_count.fetch_add(1, Ordering::Relaxed);
        if elapsed > self.slow_threshold {
            self.slow_inference_count.fetch_add(1, Ordering::Relaxed);
            warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                threshold_ms = self.slow_threshold.as_millis() as u64,
                "Inference exceeded latency target"
            );
        } else {
            debug!(elapsed_us = elapsed.as_micros() as u64, "Inference completed");
        }

        if output.is_empty() {
            return Err(ServingError::Inference("No output from model".to_string()));
        }
        // JSON has no encoding for inf or NaN
        if output.iter().any(|v| !v.is_finite()) {
            return Err(ServingError::Inference(
                "model produced a non-finite output".to_string(),
            ));
        }
        Ok(PredictionResult(output.iter().copied().collect()))
    }

    /// Get inference statistics
    pub fn stats(&self) -> InferenceStats {
        InferenceStats {
            total_inferences: self.inference_count.load(Ordering::Relaxed),
            slow_inferences: self.slow_inference_count.load(Ordering::Relaxed),
        }
    }
}

/// Inference statistics
#[derive(Debug, Clone)]
pub struct InferenceStats {
    pub total_inferences: u64,
    pub slow_inferences: u64,
}

/// Validate a vector against the model and shape it into a 1×N batch
pub fn shape_single(model: &dyn Model, vector: &FeatureVector) -> ServingResult<Array2<f64>> {
    if vector.is_empty() {
        return Err(ServingError::shape("feature vector must not be empty"));
    }
    if let Some(idx) = vector.values().iter().position(|v| !v.is_finite()) {
        return Err(ServingError::shape(format!(
            "feature {} is not a finite number",
            idx
        )));
    }
    if let Some(expected) = model.input_width() {
        if vector.width() != expected {
            return Err(ServingError::shape(format!(
                "expected {} features, got {}",
                expected,
                vector.width()
            )));
        }
    }

    Array2::from_shape_vec((1, vector.width()), vector.values().to_vec())
        .map_err(|e| ServingError::shape(e.to_string()))
}
