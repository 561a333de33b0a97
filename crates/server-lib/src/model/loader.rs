//! Artifact loading for model backends

use super::{LinearModel, Model, OnnxModel};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Serialized artifact format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum ModelFormat {
    /// Pick by file extension
    #[default]
    Auto,
    /// JSON linear model
    Linear,
    /// ONNX graph run through tract
    Onnx,
}

impl fmt::Display for ModelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelFormat::Auto => "auto",
            ModelFormat::Linear => "linear",
            ModelFormat::Onnx => "onnx",
        };
        f.write_str(name)
    }
}

impl FromStr for ModelFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(ModelFormat::Auto),
            "linear" | "json" => Ok(ModelFormat::Linear),
            "onnx" => Ok(ModelFormat::Onnx),
            other => bail!("unknown model format '{}'", other),
        }
    }
}

impl TryFrom<String> for ModelFormat {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// Where a model artifact lives and how to read it
#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub path: PathBuf,
    pub format: ModelFormat,
    /// Required for ONNX artifacts, checked against linear ones
    pub input_width: Option<usize>,
}

/// A freshly loaded model plus artifact details for logging
pub struct LoadedModel {
    pub model: Box<dyn Model>,
    pub format: ModelFormat,
    pub checksum: String,
    pub size_bytes: usize,
}

impl ModelSpec {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            format: ModelFormat::Auto,
            input_width: None,
        }
    }

    pub fn with_format(mut self, format: ModelFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_input_width(mut self, width: usize) -> Self {
        self.input_width = Some(width);
        self
    }

    /// Concrete format, resolving `Auto` from the file extension
    pub fn resolve_format(&self) -> Result<ModelFormat> {
        match self.format {
            ModelFormat::Auto => format_from_extension(&self.path),
            explicit => Ok(explicit),
        }
    }

    /// Read and decode the artifact
    pub fn load(&self) -> Result<LoadedModel> {
        if !self.path.exists() {
            bail!("Model file not found: {:?}", self.path);
        }

        let bytes = std::fs::read(&self.path)
            .with_context(|| format!("Failed to read model file {:?}", self.path))?;
        let format = self.resolve_format()?;

        let model: Box<dyn Model> = match format {
            ModelFormat::Linear => {
                let model = LinearModel::from_json(&bytes)?;
                if let (Some(expected), Some(actual)) = (self.input_width, model.input_width()) {
                    if expected != actual {
                        bail!(
                            "model input width {} does not match configured width {}",
                            actual,
                            expected
                        );
                    }
                }
                Box::new(model)
            }
            ModelFormat::Onnx => {
                let width = self
                    .input_width
                    .context("input_width must be configured for ONNX models")?;
                Box::new(OnnxModel::from_bytes(&bytes, width)?)
            }
            ModelFormat::Auto => bail!("model format could not be resolved"),
        };

        Ok(LoadedModel {
            model,
            format,
            checksum: compute_checksum(&bytes),
            size_bytes: bytes.len(),
        })
    }
}

fn format_from_extension(path: &Path) -> Result<ModelFormat> {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(ModelFormat::Linear),
        Some(ext) if ext.eq_ignore_ascii_case("onnx") => Ok(ModelFormat::Onnx),
        _ => bail!(
            "cannot infer model format from {:?}; set the format explicitly",
            path
        ),
    }
}

/// Compute SHA256 checksum of data
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
