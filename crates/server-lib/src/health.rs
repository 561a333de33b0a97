//! Health tracking for the prediction service
//!
//! Backs the `/healthz` and `/readyz` probes. The service becomes ready the
//! first time a model handle is loaded and stays ready across retrains.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Component is functioning normally
    Healthy,
    /// Last operation failed but the component can still serve
    Degraded,
    /// Component cannot serve
    Unhealthy,
}

/// Information about a component's health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    fn with_status(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn healthy() -> Self {
        Self::with_status(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Unhealthy, Some(message.into()))
    }
}

/// Overall health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_generation: Option<u64>,
    pub components: HashMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// Worst status across all components
    pub fn compute_status(components: &HashMap<String, ComponentHealth>) -> ComponentStatus {
        let mut has_degraded = false;

        for health in components.values() {
            match health.status {
                ComponentStatus::Unhealthy => return ComponentStatus::Unhealthy,
                ComponentStatus::Degraded => has_degraded = true,
                ComponentStatus::Healthy => {}
            }
        }

        if has_degraded {
            ComponentStatus::Degraded
        } else {
            ComponentStatus::Healthy
        }
    }
}

/// Readiness response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Component names for health tracking
pub mod components {
    pub const MODEL_PROVIDER: &str = "model_provider";
    pub const RETRAINER: &str = "retrainer";
}

#[derive(Debug, Default)]
struct HealthState {
    components: HashMap<String, ComponentHealth>,
    model_generation: Option<u64>,
}

/// Health registry for tracking component health
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    state: Arc<RwLock<HealthState>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component with initial healthy status
    pub async fn register(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    /// Update component health status
    pub async fn update(&self, name: &str, health: ComponentHealth) {
        let mut state = self.state.write().await;
        state.components.insert(name.to_string(), health);
    }

    pub async fn set_healthy(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn set_degraded(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::degraded(message)).await;
    }

    pub async fn set_unhealthy(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::unhealthy(message)).await;
    }

    /// Record that a model handle is available, which makes the service ready
    ///
    /// Generations only move forward; returns false when `generation` is not
    /// newer than the one already recorded.
    pub async fn set_model_loaded(&self, generation: u64) -> bool {
        let mut state = self.state.write().await;
        if state.model_generation.is_some_and(|seen| seen >= generation) {
            return false;
        }
        state.model_generation = Some(generation);
        state.components.insert(
            components::MODEL_PROVIDER.to_string(),
            ComponentHealth::healthy(),
        );
        true
    }

    /// Generation of the last model handle seen, if any
    pub async fn model_generation(&self) -> Option<u64> {
        self.state.read().await.model_generation
    }

    pub async fn health(&self) -> HealthResponse {
        let state = self.state.read().await;
        HealthResponse {
            status: HealthResponse::compute_status(&state.components),
            model_generation: state.model_generation,
            components: state.components.clone(),
        }
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        let state = self.state.read().await;

        if state.model_generation.is_none() {
            ReadinessResponse {
                ready: false,
                reason: Some("Model not loaded".to_string()),
            }
        } else if HealthResponse::compute_status(&state.components) == ComponentStatus::Unhealthy {
            ReadinessResponse {
                ready: false,
                reason: Some("Critical component unhealthy".to_string()),
            }
        } else {
            ReadinessResponse {
                ready: true,
                reason: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_registry_initial_state() {
        let registry = HealthRegistry::new();
        let health = registry.health().await;

        assert_eq!(health.status, ComponentStatus::Healthy);
        assert!(health.components.is_empty());
        assert!(health.model_generation.is_none());
    }

    #[tokio::test]
    async fn test_retrain_failure_degrades() {
        let registry = HealthRegistry::new();
        registry.register(components::MODEL_PROVIDER).await;
        registry.register(components::RETRAINER).await;

        registry
            .set_degraded(components::RETRAINER, "Last retrain failed")
            .await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Degraded);
        assert_eq!(
            health.components[components::RETRAINER].message.as_deref(),
            Some("Last retrain failed")
        );
    }

    #[tokio::test]
    async fn test_load_failure_is_unhealthy() {
        let registry = HealthRegistry::new();
        registry.register(components::MODEL_PROVIDER).await;
        registry
            .set_unhealthy(components::MODEL_PROVIDER, "Model file not found")
            .await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_not_ready_until_model_loaded() {
        let registry = HealthRegistry::new();
        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert_eq!(readiness.reason.as_deref(), Some("Model not loaded"));

        registry.set_model_loaded(1).await;
        assert!(registry.readiness().await.ready);
        assert_eq!(registry.model_generation().await, Some(1));
    }

    #[tokio::test]
    async fn test_stale_generation_is_ignored() {
        let registry = HealthRegistry::new();
        assert!(registry.set_model_loaded(3).await);
        assert!(!registry.set_model_loaded(3).await);

        registry
            .set_unhealthy(components::MODEL_PROVIDER, "Model file not found")
            .await;
        assert!(!registry.set_model_loaded(2).await);

        assert_eq!(registry.model_generation().await, Some(3));
        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_model_loaded_clears_unhealthy_provider() {
        let registry = HealthRegistry::new();
        registry
            .set_unhealthy(components::MODEL_PROVIDER, "Model file not found")
            .await;

        registry.set_model_loaded(1).await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Healthy);
        assert!(registry.readiness().await.ready);
    }

    #[tokio::test]
    async fn test_not_ready_when_unhealthy() {
        let registry = HealthRegistry::new();
        registry.set_model_loaded(3).await;
        registry.set_unhealthy(components::RETRAINER, "Failed").await;

        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert_eq!(readiness.reason.as_deref(), Some("Critical component unhealthy"));
    }
}
