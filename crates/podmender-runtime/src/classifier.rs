use crate::policy::RepairPolicy;
use podmender_core::{ContainerState, PodSnapshot};
use serde::Serialize;
use std::fmt;

/// Waiting reason the kubelet reports while backing off a failing container
pub const CRASH_LOOP_BACK_OFF: &str = "CrashLoopBackOff";

/// Classification outcome for a pod
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ClassificationKind {
    /// Out of scope for this controller; never acted on
    Ignored,
    /// Managed and not in the recognized failure mode
    Healthy,
    /// Managed and confirmed stuck in the recognized failure mode
    Broken,
}

impl fmt::Display for ClassificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ignored => write!(f, "Ignored"),
            Self::Healthy => write!(f, "Healthy"),
            Self::Broken => write!(f, "Broken"),
        }
    }
}

/// A classification tag with the reason it was chosen
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub kind: ClassificationKind,
    pub reason: String,
}

impl Classification {
    pub fn ignored(reason: impl Into<String>) -> Self {
        Self {
            kind: ClassificationKind::Ignored,
            reason: reason.into(),
        }
    }

    pub fn healthy(reason: impl Into<String>) -> Self {
        Self {
            kind: ClassificationKind::Healthy,
            reason: reason.into(),
        }
    }

    pub fn broken(reason: impl Into<String>) -> Self {
        Self {
            kind: ClassificationKind::Broken,
            reason: reason.into(),
        }
    }

    pub fn is_broken(&self) -> bool {
        self.kind == ClassificationKind::Broken
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.kind, self.reason)
    }
}

/// Maps a pod snapshot to Ignored, Healthy or Broken
///
/// Only the managed init container is inspected. Anything that cannot be
/// determined falls back to Ignored or Healthy, never Broken.
#[derive(Debug, Clone)]
pub struct Classifier {
    policy: RepairPolicy,
}

impl Classifier {
    pub fn new(policy: RepairPolicy) -> Self {
        Self { policy }
    }

    /// Classify a pod. Rules are evaluated in order; the first match wins.
    pub fn classify(&self, pod: &PodSnapshot) -> Classification {
        if !pod.has_annotation(&self.policy.management_annotation) {
            return Classification::ignored("not managed");
        }

        if let Some(node) = &self.policy.node_name {
            if pod.node_name.as_deref() != Some(node.as_str()) {
                return Classification::ignored("scheduled on another node");
            }
        }

        if !self.policy.selector_matches(&pod.labels) {
            return Classification::ignored("excluded by label selector");
        }

        let status = match pod.init_container(&self.policy.init_container_name) {
            Some(s) => s,
            None => return Classification::ignored("no managed init container"),
        };

        let state = match &status.state {
            Some(s) => s,
            None => return Classification::ignored("init container state unknown"),
        };

        if self.is_validation_failure(state) {
            return Classification::broken("init container terminated with validation error");
        }

        if state.waiting_reason() == Some(CRASH_LOOP_BACK_OFF)
            && status
                .last_termination
                .as_ref()
                .is_some_and(|last| self.is_validation_failure(last))
        {
            return Classification::broken("crash-looping after validation failure");
        }

        // Earlier failures in last_termination do not matter once it completed
        if state.exit_code() == Some(0) {
            return Classification::healthy("init container completed");
        }

        Classification::healthy("no confirmed failure")
    }

    fn is_validation_failure(&self, state: &ContainerState) -> bool {
        if state.exit_code() != Some(self.policy.validation_exit_code) {
            return false;
        }
        match &self.policy.termination_message {
            Some(expected) => state.message().is_some_and(|m| m.contains(expected.as_str())),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;
    use crate::policy::{LabelRequirement, DEFAULT_INIT_CONTAINER_NAME};
    use k8s_openapi::api::core::v1::{ContainerState as K8sState, ContainerStatus};

    fn classify(pod: &k8s_openapi::api::core::v1::Pod) -> Classification {
        Classifier::new(RepairPolicy::default()).classify(&snapshot(pod))
    }

    fn managed_with(state: Option<K8sState>, last_state: Option<K8sState>) -> PodSnapshot {
        snapshot(&with_init_status(
            &working_pod(),
            ContainerStatus {
                name: DEFAULT_INIT_CONTAINER_NAME.to_string(),
                state,
                last_state,
                ..Default::default()
            },
        ))
    }

    #[test]
    fn test_broken_pod_waiting_is_broken() {
        let c = classify(&broken_pod_waiting());
        assert_eq!(c.kind, ClassificationKind::Broken);
        assert_eq!(c.reason, "crash-looping after validation failure");
    }

    #[test]
    fn test_broken_pod_terminating_is_broken() {
        let c = classify(&broken_pod_terminating());
        assert_eq!(c.kind, ClassificationKind::Broken);
        assert_eq!(c.reason, "init container terminated with validation error");
    }

    #[test]
    fn test_broken_pod_no_annotation_is_ignored() {
        let c = classify(&broken_pod_no_annotation());
        assert_eq!(c, Classification::ignored("not managed"));
    }

    #[test]
    fn test_working_pod_is_healthy() {
        assert_eq!(classify(&working_pod()).kind, ClassificationKind::Healthy);
    }

    #[test]
    fn test_working_pod_died_previously_is_healthy() {
        let c = classify(&working_pod_died_previously());
        assert_eq!(c, Classification::healthy("init container completed"));
    }

    #[test]
    fn test_unannotated_pod_ignored_for_every_state() {
        let classifier = Classifier::new(RepairPolicy::default());
        let states = [
            Some(terminated(126, "Error", None)),
            Some(waiting("CrashLoopBackOff", None)),
            Some(terminated(0, "Completed", None)),
            Some(K8sState::default()),
            None,
        ];

        for state in states {
            let mut pod = managed_with(state, Some(terminated(126, "Error", None)));
            pod.annotations.clear();
            assert_eq!(classifier.classify(&pod).kind, ClassificationKind::Ignored);
        }
    }

    #[test]
    fn test_crash_loop_without_validation_history_is_healthy() {
        let classifier = Classifier::new(RepairPolicy::default());

        let no_history = managed_with(Some(waiting("CrashLoopBackOff", None)), None);
        assert_eq!(
            classifier.classify(&no_history),
            Classification::healthy("no confirmed failure")
        );

        let other_code = managed_with(
            Some(waiting("CrashLoopBackOff", None)),
            Some(terminated(1, "Error", None)),
        );
        assert_eq!(classifier.classify(&other_code).kind, ClassificationKind::Healthy);
    }

    #[test]
    fn test_validation_history_without_crash_loop_is_healthy() {
        let pod = managed_with(
            Some(waiting("PodInitializing", None)),
            Some(terminated(126, "Error", None)),
        );
        assert_eq!(
            Classifier::new(RepairPolicy::default()).classify(&pod).kind,
            ClassificationKind::Healthy
        );
    }

    #[test]
    fn test_other_exit_codes_are_not_broken() {
        let classifier = Classifier::new(RepairPolicy::default());
        for code in [1, 2, 125, 127, 137] {
            let pod = managed_with(Some(terminated(code, "Error", None)), None);
            assert_eq!(classifier.classify(&pod).kind, ClassificationKind::Healthy);
        }
    }

    #[test]
    fn test_missing_init_container_is_ignored() {
        let mut pod = snapshot(&broken_pod_waiting());
        pod.init_container_statuses[0].name = "istio-init".to_string();
        assert_eq!(
            Classifier::new(RepairPolicy::default()).classify(&pod),
            Classification::ignored("no managed init container")
        );
    }

    #[test]
    fn test_unknown_state_is_ignored() {
        let classifier = Classifier::new(RepairPolicy::default());
        assert_eq!(
            classifier.classify(&managed_with(None, None)),
            Classification::ignored("init container state unknown")
        );
        assert_eq!(
            classifier
                .classify(&managed_with(Some(K8sState::default()), None))
                .kind,
            ClassificationKind::Ignored
        );
    }

    #[test]
    fn test_only_managed_init_container_is_inspected() {
        let mut pod = snapshot(&working_pod());
        let mut other = snapshot(&broken_pod_terminating()).init_container_statuses[0].clone();
        other.name = "istio-init".to_string();
        pod.init_container_statuses.insert(0, other);

        assert_eq!(
            Classifier::new(RepairPolicy::default()).classify(&pod).kind,
            ClassificationKind::Healthy
        );
    }

    #[test]
    fn test_custom_container_name_and_exit_code() {
        let policy = RepairPolicy {
            init_container_name: "cni-check".to_string(),
            validation_exit_code: 42,
            ..Default::default()
        };
        let mut pod = managed_with(Some(terminated(42, "Error", None)), None);
        pod.init_container_statuses[0].name = "cni-check".to_string();

        assert!(Classifier::new(policy).classify(&pod).is_broken());
        // Default policy no longer finds its container
        assert_eq!(
            Classifier::new(RepairPolicy::default()).classify(&pod).kind,
            ClassificationKind::Ignored
        );
    }

    #[test]
    fn test_termination_message_filter() {
        let policy = RepairPolicy {
            termination_message: Some("iptables".to_string()),
            ..Default::default()
        };
        let classifier = Classifier::new(policy);

        let matching = managed_with(
            Some(terminated(126, "Error", Some("iptables validation failed"))),
            None,
        );
        assert!(classifier.classify(&matching).is_broken());

        let other_message = snapshot(&broken_pod_terminating());
        assert_eq!(
            classifier.classify(&other_message).kind,
            ClassificationKind::Healthy
        );

        let mut no_message = snapshot(&broken_pod_waiting());
        no_message.init_container_statuses[0].last_termination =
            Some(podmender_core::ContainerState::Terminated {
                exit_code: 126,
                reason: None,
                message: None,
            });
        assert!(!classifier.classify(&no_message).is_broken());
    }

    #[test]
    fn test_node_filter() {
        let policy = RepairPolicy {
            node_name: Some("TestNode".to_string()),
            ..Default::default()
        };
        let classifier = Classifier::new(policy);

        assert!(classifier.classify(&snapshot(&broken_pod_waiting())).is_broken());

        let mut elsewhere = snapshot(&broken_pod_waiting());
        elsewhere.node_name = Some("OtherNode".to_string());
        assert_eq!(
            classifier.classify(&elsewhere),
            Classification::ignored("scheduled on another node")
        );

        let mut unscheduled = snapshot(&broken_pod_waiting());
        unscheduled.node_name = None;
        assert_eq!(classifier.classify(&unscheduled).kind, ClassificationKind::Ignored);
    }

    #[test]
    fn test_label_selector_filter() {
        let policy = RepairPolicy {
            label_selector: vec![LabelRequirement {
                key: "testlabel".to_string(),
                value: "true".to_string(),
            }],
            ..Default::default()
        };
        let classifier = Classifier::new(policy);

        assert!(classifier
            .classify(&snapshot(&broken_pod_terminating()))
            .is_broken());
        assert_eq!(
            classifier.classify(&snapshot(&broken_pod_waiting())),
            Classification::ignored("excluded by label selector")
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Classification::broken("crash-looping after validation failure").to_string(),
            "Broken (crash-looping after validation failure)"
        );
    }
}
