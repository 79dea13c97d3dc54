use crate::error::{Result, RuntimeError};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Default name of the sidecar validation init container
pub const DEFAULT_INIT_CONTAINER_NAME: &str = "istio-validation";
/// Default annotation marking a pod as mesh-managed
pub const DEFAULT_MANAGEMENT_ANNOTATION: &str = "sidecar.istio.io/status";
/// Default exit code the validation container uses for a broken pod network
pub const DEFAULT_VALIDATION_EXIT_CODE: i32 = 126;

/// One `key=value` equality requirement on pod labels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelRequirement {
    pub key: String,
    pub value: String,
}

impl FromStr for LabelRequirement {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => Ok(Self {
                key: key.trim().to_string(),
                value: value.trim().to_string(),
            }),
            _ => Err(RuntimeError::invalid_config(
                format!("invalid label selector '{}'", s),
                "Use the form key=value, e.g. --label-selector app=web",
            )),
        }
    }
}

impl fmt::Display for LabelRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// Which pods the controller manages and what counts as the repairable failure
///
/// The constants are owned by whoever deploys the controller; the defaults
/// match the Istio CNI validation init container.
#[derive(Debug, Clone)]
pub struct RepairPolicy {
    /// Init container whose state is inspected
    pub init_container_name: String,
    /// Annotation key that marks a pod as mesh-managed
    pub management_annotation: String,
    /// Exit code of the recognized validation failure
    pub validation_exit_code: i32,
    /// If set, the terminated message must contain this text as well
    pub termination_message: Option<String>,
    /// If set, only pods scheduled on this node are managed
    pub node_name: Option<String>,
    /// Every requirement must match the pod's labels
    pub label_selector: Vec<LabelRequirement>,
}

impl Default for RepairPolicy {
    fn default() -> Self {
        Self {
            init_container_name: DEFAULT_INIT_CONTAINER_NAME.to_string(),
            management_annotation: DEFAULT_MANAGEMENT_ANNOTATION.to_string(),
            validation_exit_code: DEFAULT_VALIDATION_EXIT_CODE,
            termination_message: None,
            node_name: None,
            label_selector: Vec::new(),
        }
    }
}

impl RepairPolicy {
    /// Reject policies that could match everything or nothing by accident
    pub fn validate(&self) -> Result<()> {
        if self.init_container_name.trim().is_empty() {
            return Err(RuntimeError::invalid_config(
                "init container name is empty",
                "Set --init-container to the name of the validation init container",
            ));
        }
        if self.management_annotation.trim().is_empty() {
            return Err(RuntimeError::invalid_config(
                "management annotation is empty",
                "Set --annotation to the key injected on mesh-managed pods",
            ));
        }
        if self.validation_exit_code == 0 {
            return Err(RuntimeError::invalid_config(
                "validation exit code must not be 0",
                "Exit code 0 means the init container completed; use the code the validator exits with on failure",
            ));
        }
        Ok(())
    }

    /// Whether the pod labels satisfy the selector
    pub fn selector_matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.label_selector
            .iter()
            .all(|req| labels.get(&req.key) == Some(&req.value))
    }
}
