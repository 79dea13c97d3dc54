//! Podmender Core - Pod snapshot model for the broken-pod repair controller
//!
//! This crate provides:
//! - A read-only `PodSnapshot` view built from Kubernetes `Pod` objects
//! - Container state mapping that treats ambiguous status as unknown
//! - Error types with miette diagnostics
//! - Manifest loading helpers

pub mod error;
pub mod events;
pub mod snapshot;
pub mod types;

// Re-export commonly used types
pub use error::{MenderError, Result};
pub use events::PodEvent;
pub use snapshot::{ContainerState, ContainerStatus, PodSnapshot};
pub use types::{PodName, PodUid};

// Re-export k8s-openapi types for convenience
pub use k8s_openapi;
pub use k8s_openapi::api::core::v1::Pod;

use std::path::Path;

/// Serialize a value to pretty JSON
pub fn to_json_pretty<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| {
        MenderError::serialization_error(
            format!("Failed to serialize to JSON: {}", e),
            Some(Box::new(e)),
        )
    })
}

/// Deserialize a value from JSON
pub fn from_json<T: for<'de> serde::Deserialize<'de>>(data: &str) -> Result<T> {
    serde_json::from_str(data).map_err(|e| {
        MenderError::serialization_error(
            format!("Failed to deserialize from JSON: {}", e),
            Some(Box::new(e)),
        )
    })
}

/// Deserialize a value from YAML
pub fn from_yaml<T: for<'de> serde::Deserialize<'de>>(data: &str) -> Result<T> {
    serde_yaml::from_str(data).map_err(|e| {
        MenderError::serialization_error(
            format!("Failed to deserialize from YAML: {}", e),
            Some(Box::new(e)),
        )
    })
}

/// Load a Pod manifest from disk. JSON is detected by extension, anything
/// else is parsed as YAML (which also accepts JSON).
pub fn load_pod_manifest(path: &Path) -> Result<Pod> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| MenderError::manifest_read_failed(path.display().to_string(), e.to_string()))?;

    let value: serde_json::Value = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => from_json(&data)?,
        _ => from_yaml(&data)?,
    };

    match value.get("kind").and_then(|k| k.as_str()) {
        Some("Pod") | None => {}
        Some(other) => {
            return Err(MenderError::invalid_pod(
                format!("expected kind Pod, found {}", other),
                "Pass a single v1 Pod manifest, e.g. the output of `kubectl get pod -o yaml`",
            ))
        }
    }

    serde_json::from_value(value).map_err(|e| {
        MenderError::serialization_error(
            format!("Manifest is not a valid Pod: {}", e),
            Some(Box::new(e)),
        )
    })
}
