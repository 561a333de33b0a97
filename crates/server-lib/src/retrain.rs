//! Retraining adapter
//!
//! Validates a training batch, fits a fork of the active model and swaps the
//! fork in only when fitting succeeds. Retrains are serialized; inference keeps
//! using the previous handle until the swap.

use crate::error::{ServingError, ServingResult};
use crate::models::TrainingBatch;
use crate::provider::ModelProvider;
use ndarray::{Array1, Array2};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Summary of a successful retrain
#[derive(Debug, Clone)]
pub struct RetrainOutcome {
    pub rows: usize,
    pub width: usize,
    pub generation: u64,
    pub elapsed: Duration,
}

pub struct Retrainer {
    provider: Arc<dyn ModelProvider>,
    writer: Mutex<()>,
}

impl Retrainer {
    pub fn new(provider: Arc<dyn ModelProvider>) -> Self {
        Self {
            provider,
            writer: Mutex::new(()),
        }
    }

    /// Fit the active model on `batch` and install the result
    pub fn retrain(&self, batch: &TrainingBatch) -> ServingResult<RetrainOutcome> {
        let width = validate_batch(batch)?;

        // The guard protects no data, only the acquire-fit-replace sequence
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let start = Instant::now();

        let current = self.provider.acquire()?;
        if let Some(expected) = current.input_width() {
            if width != expected {
                return Err(ServingError::shape(format!(
                    "rows have {} columns, model expects {}",
                    width, expected
                )));
            }
        }

        let (features, labels) = to_arrays(batch, width)?;

        let mut candidate = current.fork();
        candidate
            .fit(features.view(), labels.view())
            .map_err(ServingError::retrain)?;
        debug!(backend = candidate.kind(), "Candidate model fitted");

        self.provider.replace(Arc::from(candidate));

        let outcome = RetrainOutcome {
            rows: batch.len(),
            width,
            generation: self.provider.generation(),
            elapsed: start.elapsed(),
        };

        info!(
            rows = outcome.rows,
            width = outcome.width,
            generation = outcome.generation,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "Model retrained"
        );

        Ok(outcome)
    }
}

/// Check batch consistency and return the shared row width
pub fn validate_batch(batch: &TrainingBatch) -> ServingResult<usize> {
    if batch.is_empty() {
        return Err(ServingError::shape("training batch must contain at least one row"));
    }

    let width = batch.width();
    if width == 0 {
        return Err(ServingError::shape("row 0 has no columns"));
    }

    for (idx, row) in batch.rows.iter().enumerate() {
        if row.len() != width {
            return Err(ServingError::shape(format!(
                "row {} has {} columns, expected {}",
                idx,
                row.len(),
                width
            )));
        }
    }

    if batch.labels.len() != batch.len() {
        return Err(ServingError::shape(format!(
            "labels length {} does not match rows length {}",
            batch.labels.len(),
            batch.len()
        )));
    }

    for (idx, row) in batch.rows.iter().enumerate() {
        if row.iter().any(|v| !v.is_finite()) {
            return Err(ServingError::shape(format!(
                "row {} contains a non-finite value",
                idx
            )));
        }
    }
    if let Some(idx) = batch.labels.iter().position(|v| !v.is_finite()) {
        return Err(ServingError::shape(format!("label {} is not a finite number", idx)));
    }

    Ok(width)
}

fn to_arrays(batch: &TrainingBatch, width: usize) -> ServingResult<(Array2<f64>, Array1<f64>)> {
    let flat: Vec<f64> = batch.rows.iter().flatten().copied().collect();
    let features = Array2::from_shape_vec((batch.len(), width), flat)
        .map_err(|e| ServingError::shape(e.to_string()))?;
    Ok((features, Array1::from(batch.labels.clone())))
}
