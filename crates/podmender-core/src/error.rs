// Allow unused assignments for diagnostic fields - they're used by the macros
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Core error type for podmender snapshot handling
#[derive(Error, Debug, Diagnostic)]
pub enum MenderError {
    /// A field required to track the pod is missing
    #[error("Pod is missing required field: {field}")]
    #[diagnostic(
        code(podmender::missing_field),
        help("Pods without a name or UID cannot be tracked for repair. Check that the object came from the API server and not a bare manifest")
    )]
    MissingField {
        #[allow(unused)]
        field: String,
    },

    /// Object could not be read as a Pod
    #[error("Invalid pod object: {reason}")]
    #[diagnostic(code(podmender::invalid_pod), help("{suggestion}"))]
    InvalidPod {
        #[allow(unused)]
        reason: String,
        #[allow(unused)]
        suggestion: String,
    },

    /// Serialization error
    #[error("Serialization error: {message}")]
    #[diagnostic(
        code(podmender::serialization_error),
        help("Ensure the manifest is valid JSON or YAML describing a v1 Pod")
    )]
    SerializationError {
        #[allow(unused)]
        message: String,
        #[source]
        #[allow(unused)]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Manifest file could not be read
    #[error("Failed to read manifest '{path}': {message}")]
    #[diagnostic(
        code(podmender::manifest_read_failed),
        help("Check that the file exists and is readable")
    )]
    ManifestReadFailed {
        #[allow(unused)]
        path: String,
        #[allow(unused)]
        message: String,
    },
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, MenderError>;

impl MenderError {
    /// Create a MissingField error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Create an InvalidPod error
    pub fn invalid_pod(reason: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::InvalidPod {
            reason: reason.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a SerializationError
    pub fn serialization_error(
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::SerializationError {
            message: message.into(),
            source,
        }
    }

    pub fn manifest_read_failed(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ManifestReadFailed {
            path: path.into(),
            message: message.into(),
        }
    }
}
