//! Prediction service library
//!
//! This crate provides the core functionality for:
//! - Loading model artifacts behind a narrow capability trait
//! - Single-vector inference with shape validation
//! - Build-then-swap retraining of the shared model handle
//! - The HTTP request service, health checks and observability

pub mod api;
pub mod error;
pub mod health;
pub mod inference;
pub mod model;
pub mod models;
pub mod observability;
pub mod provider;
pub mod retrain;

pub use error::{ErrorCategory, ServingError, ServingResult};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use inference::{InferenceAdapter, InferenceStats};
pub use model::{LinearModel, Model, ModelFormat, ModelHandle, ModelSpec, OnnxModel};
pub use models::*;
pub use observability::{ServiceMetrics, StructuredLogger};
pub use provider::{ArtifactModelProvider, ModelProvider, StaticModelProvider};
pub use retrain::{RetrainOutcome, Retrainer};
