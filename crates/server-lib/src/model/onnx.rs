//! ONNX inference using tract
//!
//! The graph is optimized once at load time with a fixed `[1, width]` input,
//! so batches are run one row at a time. ONNX artifacts are inference-only.

use super::Model;
use anyhow::{bail, Context, Result};
use ndarray::{Array2, ArrayView1, ArrayView2};
use std::sync::Arc;
use tract_onnx::prelude::*;

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// ONNX-backed model running on tract
#[derive(Clone)]
pub struct OnnxModel {
    plan: Arc<TractModel>,
    input_width: usize,
}

impl OnnxModel {
    /// Load and optimize an ONNX model from bytes
    pub fn from_bytes(model_bytes: &[u8], input_width: usize) -> Result<Self> {
        if input_width == 0 {
            bail!("ONNX models need an input width of at least 1");
        }
        let plan = tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(model_bytes))
            .context("Failed to parse ONNX model")?
            .with_input_fact(0, f32::fact([1, input_width]).into())
            .context("Failed to set input shape")?
            .into_optimized()
            .context("Failed to optimize model")?
            .into_runnable()
            .context("Failed to create runnable model")?;

        Ok(Self {
            plan: Arc::new(plan),
            input_width,
        })
    }

    fn run_row(&self, row: ArrayView1<'_, f64>) -> Result<Vec<f64>> {
        let data: Vec<f32> = row.iter().map(|v| *v as f32).collect();
        let input: Tensor = tract_ndarray::Array2::from_shape_vec((1, self.input_width), data)
            .context("Failed to shape input row")?
            .into();

        let result = self.plan.run(tvec!(input.into()))?;
        let output = result.get(0).context("No output from model")?;
        let view = output.to_array_view::<f32>()?;
        Ok(view.iter().map(|v| *v as f64).collect())
    }
}

impl Model for OnnxModel {
    fn kind(&self) -> &'static str {
        "onnx"
    }

    fn input_width(&self) -> Option<usize> {
        Some(self.input_width)
    }

    fn predict(&self, batch: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        if batch.ncols() != self.input_width {
            bail!(
                "batch has {} columns, model expects {}",
                batch.ncols(),
                self.input_width
            );
        }

        let mut outputs = Vec::with_capacity(batch.nrows());
        for row in batch.outer_iter() {
            outputs.push(self.run_row(row)?);
        }

        let width = outputs.first().map(Vec::len).unwrap_or(0);
        if outputs.iter().any(|o| o.len() != width) {
            bail!("Model produced outputs of differing lengths");
        }
        let flat: Vec<f64> = outputs.into_iter().flatten().collect();
        Array2::from_shape_vec((batch.nrows(), width), flat).context("Failed to collect outputs")
    }

    fn fit(&mut self, _batch: ArrayView2<'_, f64>, _labels: ArrayView1<'_, f64>) -> Result<()> {
        bail!("ONNX models are inference-only and cannot be retrained")
    }

    fn fork(&self) -> Box<dyn Model> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_bytes() {
        assert!(OnnxModel::from_bytes(b"definitely not onnx", 3).is_err());
    }

    #[test]
    fn test_rejects_zero_width() {
        let err = OnnxModel::from_bytes(b"", 0).err().unwrap();
        assert!(err.to_string().contains("input width"));
    }
}
