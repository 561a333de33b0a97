//! Core data models for the prediction service

use serde::{Deserialize, Serialize};

/// Ordered numeric inputs for a single inference call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector(pub Vec<f64>);

impl FeatureVector {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn width(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }
}

impl From<Vec<f64>> for FeatureVector {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

/// Feature rows paired one-to-one with labels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingBatch {
    pub rows: Vec<Vec<f64>>,
    pub labels: Vec<f64>,
}

impl TrainingBatch {
    pub fn new(rows: Vec<Vec<f64>>, labels: Vec<f64>) -> Self {
        Self { rows, labels }
    }

    /// Column count of the first row, zero for an empty batch
    pub fn width(&self) -> usize {
        self.rows.first().map(Vec::len).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Flat model outputs for one inference call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PredictionResult(pub Vec<f64>);

impl PredictionResult {
    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }
}

/// `POST /predict` request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictRequest {
    pub data: Vec<f64>,
}

/// `POST /predict` response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    pub predictions: Vec<f64>,
}

/// `POST /retrain` request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrainRequest {
    pub data: Vec<Vec<f64>>,
    pub labels: Vec<f64>,
}

/// Plain message body used by `GET /` and `POST /retrain`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error body returned for every 4xx/5xx response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}
