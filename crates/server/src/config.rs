//! Server configuration

use anyhow::{Context, Result};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment};
use serde::Deserialize;
use server_lib::api::DEFAULT_MAX_BODY_BYTES;
use server_lib::{ModelFormat, ModelSpec};
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to bind the HTTP server to
    pub host: String,

    /// Port to bind the HTTP server to
    pub port: u16,

    /// Path to the serialized model artifact
    pub model_path: PathBuf,

    /// Artifact format, `auto` picks by file extension
    pub model_format: ModelFormat,

    /// Feature count; required for ONNX artifacts
    pub input_width: Option<usize>,

    /// Load the model at startup instead of on the first request
    pub preload_model: bool,

    /// Inference latency above which a warning is logged
    pub slow_inference_ms: u64,

    /// Largest accepted request body, in bytes
    pub max_body_bytes: usize,

    /// Name attached to structured log records
    pub instance_name: String,
}

fn default_instance_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "local".to_string())
}

impl ServerConfig {
    /// Load configuration from `PREDICT_*` environment variables over defaults
    pub fn load() -> Result<Self> {
        Self::from_builder(
            Config::builder().add_source(Environment::with_prefix("PREDICT").try_parsing(true)),
        )
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let config = builder
            .set_default("host", "127.0.0.1")?
            .set_default("port", 8000_i64)?
            .set_default("model_path", "models/model.json")?
            .set_default("model_format", "auto")?
            .set_default("preload_model", true)?
            .set_default("slow_inference_ms", 50_i64)?
            .set_default("max_body_bytes", DEFAULT_MAX_BODY_BYTES as i64)?
            .set_default("instance_name", default_instance_name())?
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Invalid server configuration")
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn slow_inference_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_inference_ms)
    }

    pub fn model_spec(&self) -> ModelSpec {
        let spec = ModelSpec::new(&self.model_path).with_format(self.model_format);
        match self.input_width {
            Some(width) => spec.with_input_width(width),
            None => spec,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_builder(Config::builder()).unwrap();
        assert_eq!(config.bind_addr(), "127.0.0.1:8000");
        assert_eq!(config.model_path, PathBuf::from("models/model.json"));
        assert_eq!(config.model_format, ModelFormat::Auto);
        assert!(config.input_width.is_none());
        assert!(config.preload_model);
        assert_eq!(config.slow_inference_threshold(), Duration::from_millis(50));
        assert_eq!(config.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
    }

    #[test]
    fn test_overrides() {
        let builder = Config::builder()
            .set_override("port", 9100_i64)
            .unwrap()
            .set_override("model_path", "/srv/model.onnx")
            .unwrap()
            .set_override("model_format", "onnx")
            .unwrap()
            .set_override("input_width", 12_i64)
            .unwrap()
            .set_override("preload_model", false)
            .unwrap()
            .set_override("max_body_bytes", 1024_i64)
            .unwrap();

        let config = ServerConfig::from_builder(builder).unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.model_format, ModelFormat::Onnx);
        assert!(!config.preload_model);
        assert_eq!(config.max_body_bytes, 1024);

        let spec = config.model_spec();
        assert_eq!(spec.input_width, Some(12));
        assert_eq!(spec.resolve_format().unwrap(), ModelFormat::Onnx);
    }

    #[test]
    fn test_format_accepts_alias_and_any_case() {
        let builder = Config::builder()
            .set_override("model_format", "JSON")
            .unwrap();
        let config = ServerConfig::from_builder(builder).unwrap();
        assert_eq!(config.model_format, ModelFormat::Linear);

        let builder = Config::builder()
            .set_override("model_format", "ONNX")
            .unwrap();
        let config = ServerConfig::from_builder(builder).unwrap();
        assert_eq!(config.model_format, ModelFormat::Onnx);
    }

    #[test]
    fn test_invalid_format_is_rejected() {
        let builder = Config::builder()
            .set_override("model_format", "pickle")
            .unwrap();
        assert!(ServerConfig::from_builder(builder).is_err());
    }
}
