use miette::Diagnostic;
use thiserror::Error;

/// Runtime error type for classification, reconciliation and pod deletion
#[derive(Error, Debug, Diagnostic)]
pub enum RuntimeError {
    /// API server returned an unexpected status for a delete
    #[error("Delete of pod {namespace}/{name} failed with status {status}: {message}")]
    #[diagnostic(
        code(podmender::runtime::delete_failed),
        help("Check that the controller's service account may delete pods in namespace '{namespace}'. The delete is retried with backoff until the attempt ceiling")
    )]
    DeleteFailed {
        #[allow(unused)]
        namespace: String,
        #[allow(unused)]
        name: String,
        #[allow(unused)]
        status: u16,
        #[allow(unused)]
        message: String,
    },

    /// Delete request did not complete in time
    #[error("Delete of pod {namespace}/{name} timed out")]
    #[diagnostic(
        code(podmender::runtime::delete_timeout),
        help("The API server may be overloaded. The delete is retried with backoff until the attempt ceiling")
    )]
    DeleteTimeout {
        #[allow(unused)]
        namespace: String,
        #[allow(unused)]
        name: String,
    },

    /// Could not talk to the API server
    #[error("API request failed: {message}")]
    #[diagnostic(
        code(podmender::runtime::api_error),
        help("Verify the API server URL is reachable from this node")
    )]
    ApiError {
        #[allow(unused)]
        message: String,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    #[diagnostic(code(podmender::runtime::invalid_config), help("{suggestion}"))]
    InvalidConfig {
        #[allow(unused)]
        message: String,
        #[allow(unused)]
        suggestion: String,
    },

    /// Controller is shutting down
    #[error("Repair controller is shutting down")]
    #[diagnostic(
        code(podmender::runtime::shutting_down),
        help("Events received after shutdown are dropped; they are re-observed on the next start")
    )]
    ShuttingDown,
}

/// Result type alias for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;

impl RuntimeError {
    pub fn delete_failed(
        namespace: impl Into<String>,
        name: impl Into<String>,
        status: u16,
        message: impl Into<String>,
    ) -> Self {
        Self::DeleteFailed {
            namespace: namespace.into(),
            name: name.into(),
            status,
            message: message.into(),
        }
    }

    pub fn delete_timeout(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::DeleteTimeout {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn api_error(message: impl Into<String>) -> Self {
        Self::ApiError {
            message: message.into(),
        }
    }

    pub fn invalid_config(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }
}
