use crate::error::{MenderError, Result};
use crate::types::{PodName, PodUid};
use k8s_openapi::api::core::v1::{
    ContainerState as K8sContainerState, ContainerStatus as K8sContainerStatus, Pod,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Observed state of a single container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ContainerState {
    Waiting {
        reason: Option<String>,
        message: Option<String>,
    },
    Running,
    Terminated {
        exit_code: i32,
        reason: Option<String>,
        message: Option<String>,
    },
}

impl ContainerState {
    /// Map the Kubernetes representation, which allows any combination of the
    /// three sub-states. Anything other than exactly one is indeterminate.
    pub fn from_k8s(state: &K8sContainerState) -> Option<Self> {
        match (&state.waiting, &state.running, &state.terminated) {
            (Some(w), None, None) => Some(Self::Waiting {
                reason: w.reason.clone(),
                message: w.message.clone(),
            }),
            (None, Some(_), None) => Some(Self::Running),
            (None, None, Some(t)) => Some(Self::Terminated {
                exit_code: t.exit_code,
                reason: t.reason.clone(),
                message: t.message.clone(),
            }),
            _ => None,
        }
    }

    /// Exit code if this is a terminated state
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Terminated { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }

    /// Reason if this is a waiting state
    pub fn waiting_reason(&self) -> Option<&str> {
        match self {
            Self::Waiting { reason, .. } => reason.as_deref(),
            _ => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Waiting { message, .. } | Self::Terminated { message, .. } => {
                message.as_deref()
            }
            Self::Running => None,
        }
    }
}

/// Status of one container as observed in a pod snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStatus {
    pub name: String,
    /// Current state; `None` when the API reported no state or an ambiguous one
    pub state: Option<ContainerState>,
    /// `None` means the container has never terminated before
    pub last_termination: Option<ContainerState>,
}

impl From<&K8sContainerStatus> for ContainerStatus {
    fn from(status: &K8sContainerStatus) -> Self {
        Self {
            name: status.name.clone(),
            state: status.state.as_ref().and_then(ContainerState::from_k8s),
            last_termination: status.last_state.as_ref().and_then(ContainerState::from_k8s),
        }
    }
}

/// Read-only view of a Pod at observation time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSnapshot {
    pub uid: PodUid,
    pub name: String,
    pub namespace: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub node_name: Option<String>,
    pub init_container_statuses: Vec<ContainerStatus>,
    pub container_statuses: Vec<ContainerStatus>,
}

impl PodSnapshot {
    pub fn pod_name(&self) -> PodName {
        PodName::new(&self.namespace, &self.name)
    }

    pub fn has_annotation(&self, key: &str) -> bool {
        self.annotations.contains_key(key)
    }

    /// Look up an init container status by name
    pub fn init_container(&self, name: &str) -> Option<&ContainerStatus> {
        self.init_container_statuses.iter().find(|s| s.name == name)
    }
}

impl TryFrom<&Pod> for PodSnapshot {
    type Error = MenderError;

    fn try_from(pod: &Pod) -> Result<Self> {
        let meta = &pod.metadata;
        let name = meta
            .name
            .clone()
            .ok_or_else(|| MenderError::missing_field("metadata.name"))?;
        let uid = meta
            .uid
            .clone()
            .ok_or_else(|| MenderError::missing_field("metadata.uid"))?;

        let status = pod.status.as_ref();
        let collect = |statuses: Option<&Vec<K8sContainerStatus>>| -> Vec<ContainerStatus> {
            statuses
                .map(|s| s.iter().map(ContainerStatus::from).collect())
                .unwrap_or_default()
        };

        Ok(Self {
            uid: PodUid::new(uid),
            name,
            namespace: meta
                .namespace
                .clone()
                .unwrap_or_else(|| "default".to_string()),
            labels: meta.labels.clone().unwrap_or_default(),
            annotations: meta.annotations.clone().unwrap_or_default(),
            node_name: pod.spec.as_ref().and_then(|s| s.node_name.clone()),
            init_container_statuses: collect(status.and_then(|s| s.init_container_statuses.as_ref())),
            container_statuses: collect(status.and_then(|s| s.container_statuses.as_ref())),
        })
    }
}

impl TryFrom<Pod> for PodSnapshot {
    type Error = MenderError;

    fn try_from(pod: Pod) -> Result<Self> {
        PodSnapshot::try_from(&pod)
    }
}
