//! Model capability interface and its backends
//!
//! Every backend is adapted to the same narrow surface: batch prediction,
//! in-place fitting and forking. Forking lets retraining fit a private copy
//! and swap it in only once the fit succeeds.

mod linear;
mod loader;
mod onnx;

pub use linear::{LinearArtifact, LinearModel, DEFAULT_EPOCHS, DEFAULT_LEARNING_RATE};
pub use loader::{compute_checksum, LoadedModel, ModelFormat, ModelSpec};
pub use onnx::OnnxModel;

use anyhow::Result;
use ndarray::{Array2, ArrayView1, ArrayView2};
use std::sync::Arc;

/// Shared, immutable handle to the active model
pub type ModelHandle = Arc<dyn Model>;

/// Trait for model backends
pub trait Model: Send + Sync {
    /// Short backend name used in logs
    fn kind(&self) -> &'static str;

    /// Number of features per row, if the backend knows it
    fn input_width(&self) -> Option<usize>;

    /// Run inference on a batch of rows, one output row per input row
    fn predict(&self, batch: ArrayView2<'_, f64>) -> Result<Array2<f64>>;

    /// Update the model in place from labeled rows
    fn fit(&mut self, batch: ArrayView2<'_, f64>, labels: ArrayView1<'_, f64>) -> Result<()>;

    /// Independent copy that can be fitted without touching `self`
    fn fork(&self) -> Box<dyn Model>;
}
