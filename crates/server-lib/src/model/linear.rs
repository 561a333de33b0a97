//! Dense linear model backend
//!
//! Computes `y = x·W + b` and fits by full-batch gradient descent on mean
//! squared error, warm-started from the current parameters.

use super::Model;
use anyhow::{bail, ensure, Context, Result};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default base learning rate, scaled per batch before use
pub const DEFAULT_LEARNING_RATE: f64 = 0.5;

/// Default number of gradient descent passes per retrain
pub const DEFAULT_EPOCHS: usize = 200;

/// On-disk JSON form of a linear model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearArtifact {
    /// One row per input feature, one column per output unit
    pub weights: Vec<Vec<f64>>,
    /// One entry per output unit
    pub bias: Vec<f64>,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    #[serde(default = "default_epochs")]
    pub epochs: usize,
}

fn default_learning_rate() -> f64 {
    DEFAULT_LEARNING_RATE
}

fn default_epochs() -> usize {
    DEFAULT_EPOCHS
}

#[derive(Debug, Clone)]
pub struct LinearModel {
    weights: Array2<f64>,
    bias: Array1<f64>,
    learning_rate: f64,
    epochs: usize,
}

impl LinearModel {
    /// Create a model from a weight matrix (inputs × outputs) and bias
    pub fn new(weights: Array2<f64>, bias: Array1<f64>) -> Result<Self> {
        ensure!(
            weights.nrows() > 0 && weights.ncols() > 0,
            "weights must have at least one input and one output, got {}x{}",
            weights.nrows(),
            weights.ncols()
        );
        ensure!(
            bias.len() == weights.ncols(),
            "bias length {} does not match {} outputs",
            bias.len(),
            weights.ncols()
        );
        let model = Self {
            weights,
            bias,
            learning_rate: DEFAULT_LEARNING_RATE,
            epochs: DEFAULT_EPOCHS,
        };
        ensure!(model.is_finite(), "parameters must be finite");
        Ok(model)
    }

    /// Zero-initialized model with the given shape
    pub fn zeros(input_width: usize, outputs: usize) -> Result<Self> {
        Self::new(Array2::zeros((input_width, outputs)), Array1::zeros(outputs))
    }

    pub fn with_training(mut self, learning_rate: f64, epochs: usize) -> Result<Self> {
        ensure!(
            learning_rate > 0.0 && learning_rate < 1.0,
            "learning_rate must be in (0, 1), got {}",
            learning_rate
        );
        ensure!(epochs > 0, "epochs must be at least 1");
        self.learning_rate = learning_rate;
        self.epochs = epochs;
        Ok(self)
    }

    /// Parse a JSON artifact
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let artifact: LinearArtifact =
            serde_json::from_slice(bytes).context("Failed to parse linear model JSON")?;
        Self::from_artifact(artifact)
    }

    pub fn from_artifact(artifact: LinearArtifact) -> Result<Self> {
        let inputs = artifact.weights.len();
        let outputs = artifact.weights.first().map(Vec::len).unwrap_or(0);

        for (idx, row) in artifact.weights.iter().enumerate() {
            if row.len() != outputs {
                bail!(
                    "weights row {} has {} outputs, expected {}",
                    idx,
                    row.len(),
                    outputs
                );
            }
        }

        let flat: Vec<f64> = artifact.weights.into_iter().flatten().collect();
        let weights = Array2::from_shape_vec((inputs, outputs), flat)
            .context("Failed to build weight matrix")?;

        Self::new(weights, Array1::from(artifact.bias))?
            .with_training(artifact.learning_rate, artifact.epochs)
    }

    pub fn to_artifact(&self) -> LinearArtifact {
        LinearArtifact {
            weights: self.weights.outer_iter().map(|row| row.to_vec()).collect(),
            bias: self.bias.to_vec(),
            learning_rate: self.learning_rate,
            epochs: self.epochs,
        }
    }

    pub fn weights(&self) -> ArrayView2<'_, f64> {
        self.weights.view()
    }

    pub fn bias(&self) -> ArrayView1<'_, f64> {
        self.bias.view()
    }

    pub fn outputs(&self) -> usize {
        self.weights.ncols()
    }

    fn is_finite(&self) -> bool {
        self.weights
            .iter()
            .chain(self.bias.iter())
            .all(|v| v.is_finite())
    }
}

fn max_abs(batch: ArrayView2<'_, f64>) -> f64 {
    batch.iter().fold(0.0, |acc: f64, v| acc.max(v.abs()))
}

impl Model for LinearModel {
    fn kind(&self) -> &'static str {
        "linear"
    }

    fn input_width(&self) -> Option<usize> {
        Some(self.weights.nrows())
    }

    fn predict(&self, batch: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        ensure!(
            batch.ncols() == self.weights.nrows(),
            "batch has {} columns, model expects {}",
            batch.ncols(),
            self.weights.nrows()
        );
        Ok(batch.dot(&self.weights) + &self.bias)
    }

    fn fit(&mut self, batch: ArrayView2<'_, f64>, labels: ArrayView1<'_, f64>) -> Result<()> {
        if self.outputs() != 1 {
            bail!(
                "model has {} outputs but labels provide one value per row",
                self.outputs()
            );
        }
        let rows = batch.nrows();
        ensure!(rows > 0, "cannot fit on an empty batch");
        ensure!(
            batch.ncols() == self.weights.nrows(),
            "batch has {} columns, model expects {}",
            batch.ncols(),
            self.weights.nrows()
        );
        ensure!(
            labels.len() == rows,
            "labels length {} does not match rows length {}",
            labels.len(),
            rows
        );

        // Descend on features divided by their largest magnitude, so squared
        // norms stay below the column count however large the inputs are.
        // The weights move to the matching scale and back afterwards.
        let feature_scale = max_abs(batch).max(1.0);
        let features = batch.mapv(|v| v / feature_scale);
        let mut weights = &self.weights * feature_scale;
        ensure!(
            weights.iter().all(|v| v.is_finite()),
            "current weights cannot be rescaled to features of magnitude {:e}",
            feature_scale
        );

        // 2/n·XᵀX (with the bias column) has its largest eigenvalue bounded by
        // 2·(1 + mean ‖x‖²), so this step keeps gradient descent contracting.
        let mean_sq_norm = features.iter().map(|v| v * v).sum::<f64>() / rows as f64;
        let step = self.learning_rate / (1.0 + mean_sq_norm);
        let scale = 2.0 / rows as f64;
        let targets = labels.insert_axis(Axis(1));
        let mut bias = self.bias.clone();

        for epoch in 0..self.epochs {
            let residual = features.dot(&weights) + &bias - &targets;
            let grad_w = features.t().dot(&residual) * scale;
            let grad_b = residual.sum_axis(Axis(0)) * scale;

            weights.scaled_add(-step, &grad_w);
            bias.scaled_add(-step, &grad_b);

            if !weights.iter().chain(bias.iter()).all(|v| v.is_finite()) {
                bail!(
                    "parameters diverged to non-finite values at epoch {}",
                    epoch + 1
                );
            }
        }

        self.weights = weights.mapv(|v| v / feature_scale);
        self.bias = bias;

        debug!(
            rows,
            epochs = self.epochs,
            step,
            feature_scale,
            "Linear model fitted"
        );
        Ok(())
    }

    fn fork(&self) -> Box<dyn Model> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sum_model() -> LinearModel {
        LinearModel::new(array![[1.0], [1.0], [1.0]], array![0.5]).unwrap()
    }

    #[test]
    fn test_predict_single_row() {
        let model = sum_model();
        let out = model.predict(array![[1.0, 2.0, 3.0]].view()).unwrap();
        assert_eq!(out.shape(), &[1, 1]);
        assert!((out[[0, 0]] - 6.5).abs() < 1e-12);
    }

    #[test]
    fn test_predict_rejects_wrong_width() {
        let model = sum_model();
        assert!(model.predict(array![[1.0, 2.0]].view()).is_err());
    }

    #[test]
    fn test_new_rejects_bias_mismatch() {
        let result = LinearModel::new(array![[1.0, 2.0]], array![0.0]);
        assert!(result.is_err());
    }

    #[test]
    fn test_from_json_defaults_training_params() {
        let json = br#"{"weights": [[0.1], [0.2], [0.3]], "bias": [0.0]}"#;
        let model = LinearModel::from_json(json).unwrap();
        assert_eq!(model.input_width(), Some(3));
        assert_eq!(model.outputs(), 1);
        assert_eq!(model.to_artifact().epochs, DEFAULT_EPOCHS);
    }

    #[test]
    fn test_from_json_rejects_ragged_weights() {
        let json = br#"{"weights": [[0.1, 0.2], [0.3]], "bias": [0.0, 0.0]}"#;
        let err = LinearModel::from_json(json).unwrap_err();
        assert!(err.to_string().contains("weights row 1"));
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(LinearModel::from_json(b"not json").is_err());
    }

    #[test]
    fn test_with_training_rejects_unstable_rate() {
        assert!(sum_model().with_training(1.5, 10).is_err());
        assert!(sum_model().with_training(0.1, 0).is_err());
    }

    #[test]
    fn test_fit_reduces_error() {
        let mut model = LinearModel::zeros(2, 1).unwrap().with_training(0.5, 500).unwrap();
        let x = array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0], [2.0, 1.0]];
        // y = 2a - b + 1
        let y = array![3.0, 0.0, 2.0, 4.0];

        let before = (model.predict(x.view()).unwrap().column(0).to_owned() - &y)
            .mapv(|v| v * v)
            .sum();
        model.fit(x.view(), y.view()).unwrap();
        let after = (model.predict(x.view()).unwrap().column(0).to_owned() - &y)
            .mapv(|v| v * v)
            .sum();

        assert!(after < before);
        assert!(after < 1e-3, "residual {} should be near zero", after);
    }

    #[test]
    fn test_fit_large_features_stays_finite() {
        let mut model = LinearModel::zeros(3, 1).unwrap();
        let x = array![[1.0e4, 2.0e4, 3.0e4], [4.0e4, 5.0e4, 6.0e4]];
        let y = array![0.0, 1.0];
        model.fit(x.view(), y.view()).unwrap();
        assert!(model.is_finite());
    }

    #[test]
    fn test_fit_extreme_features_converges() {
        let mut model = LinearModel::zeros(3, 1).unwrap();
        let x = array![[1.0e200, 2.0e200, 3.0e200], [4.0e200, 5.0e200, 6.0e200]];
        let y = array![0.0, 1.0];

        let before = (model.predict(x.view()).unwrap().column(0).to_owned() - &y)
            .mapv(|v| v * v)
            .sum();
        model.fit(x.view(), y.view()).unwrap();
        assert!(model.is_finite());

        let predictions = model.predict(x.view()).unwrap();
        assert!(predictions.iter().all(|v| v.is_finite()));
        let after = (predictions.column(0).to_owned() - &y).mapv(|v| v * v).sum();
        assert!(after < before, "residual {} should shrink from {}", after, before);
    }

    #[test]
    fn test_fit_small_features_unchanged_by_rescaling() {
        // Inputs within [-1, 1] are used as-is
        let mut model = LinearModel::zeros(1, 1).unwrap().with_training(0.5, 1).unwrap();
        model
            .fit(array![[1.0], [-1.0]].view(), array![2.0, 0.0].view())
            .unwrap();

        // mean ‖x‖² = 1, so step = 0.25; residual = [-2, 0]
        // grad_w = (1·-2 + -1·0)·2/2 = -2, grad_b = -2·2/2 = -2
        assert!((model.weights()[[0, 0]] - 0.5).abs() < 1e-12);
        assert!((model.bias()[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_fit_rejects_multi_output() {
        let mut model = LinearModel::zeros(2, 2).unwrap();
        let err = model
            .fit(array![[1.0, 2.0]].view(), array![1.0].view())
            .unwrap_err();
        assert!(err.to_string().contains("2 outputs"));
    }

    #[test]
    fn test_fork_is_independent() {
        let model = sum_model();
        let mut fork = model.fork();
        fork.fit(array![[1.0, 1.0, 1.0]].view(), array![100.0].view())
            .unwrap();

        let original = model.predict(array![[1.0, 1.0, 1.0]].view()).unwrap();
        assert!((original[[0, 0]] - 3.5).abs() < 1e-12);
    }
}
