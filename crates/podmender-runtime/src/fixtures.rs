//! Pod fixtures shared by the unit tests in this crate

use crate::policy::{DEFAULT_INIT_CONTAINER_NAME, DEFAULT_MANAGEMENT_ANNOTATION, DEFAULT_VALIDATION_EXIT_CODE};
use k8s_openapi::api::core::v1::{
    Container, ContainerState, ContainerStateTerminated, ContainerStateWaiting, ContainerStatus,
    Pod, PodSpec, PodStatus,
};
use podmender_core::PodSnapshot;
use std::collections::BTreeMap;

pub(crate) struct MakePodArgs<'a> {
    pub name: &'a str,
    pub namespace: Option<&'a str>,
    pub labels: &'a [(&'a str, &'a str)],
    pub annotations: &'a [(&'a str, &'a str)],
    pub node_name: Option<&'a str>,
    pub init_container_status: ContainerStatus,
}

fn to_map(pairs: &[(&str, &str)]) -> Option<BTreeMap<String, String>> {
    if pairs.is_empty() {
        return None;
    }
    Some(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    )
}

pub(crate) fn make_pod(args: MakePodArgs<'_>) -> Pod {
    let mut pod = Pod::default();
    pod.metadata.name = Some(args.name.to_string());
    pod.metadata.namespace = args.namespace.map(str::to_string);
    pod.metadata.uid = Some(uuid::Uuid::new_v4().to_string());
    pod.metadata.labels = to_map(args.labels);
    pod.metadata.annotations = to_map(args.annotations);
    pod.spec = Some(PodSpec {
        node_name: args.node_name.map(str::to_string),
        init_containers: Some(vec![Container {
            name: args.init_container_status.name.clone(),
            ..Default::default()
        }]),
        containers: vec![Container {
            name: "payload-container".to_string(),
            ..Default::default()
        }],
        ..Default::default()
    });
    pod.status = Some(PodStatus {
        init_container_statuses: Some(vec![args.init_container_status]),
        container_statuses: Some(vec![ContainerStatus {
            name: "payload-container".to_string(),
            state: Some(waiting("PodInitializing", None)),
            ..Default::default()
        }]),
        ..Default::default()
    });
    pod
}

pub(crate) fn waiting(reason: &str, message: Option<&str>) -> ContainerState {
    ContainerState {
        waiting: Some(ContainerStateWaiting {
            reason: Some(reason.to_string()),
            message: message.map(str::to_string),
        }),
        ..Default::default()
    }
}

pub(crate) fn terminated(exit_code: i32, reason: &str, message: Option<&str>) -> ContainerState {
    ContainerState {
        terminated: Some(ContainerStateTerminated {
            exit_code,
            reason: Some(reason.to_string()),
            message: message.map(str::to_string),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn validation_status(state: ContainerState, last_state: Option<ContainerState>) -> ContainerStatus {
    ContainerStatus {
        name: DEFAULT_INIT_CONTAINER_NAME.to_string(),
        state: Some(state),
        last_state,
        ..Default::default()
    }
}

fn validation_error() -> ContainerState {
    terminated(
        DEFAULT_VALIDATION_EXIT_CODE,
        "Error",
        Some("Died for some reason"),
    )
}

pub(crate) fn broken_init_container_waiting() -> ContainerStatus {
    validation_status(
        waiting(
            "CrashLoopBackOff",
            Some("Back-off 5m0s restarting failed container"),
        ),
        Some(validation_error()),
    )
}

pub(crate) fn broken_init_container_terminating() -> ContainerStatus {
    validation_status(validation_error(), Some(validation_error()))
}

pub(crate) fn working_init_container_died_previously() -> ContainerStatus {
    validation_status(
        terminated(0, "Completed", None),
        Some(terminated(126, "Error", Some("Died for some reason"))),
    )
}

pub(crate) fn working_init_container() -> ContainerStatus {
    validation_status(terminated(0, "Completed", None), None)
}

const MANAGED: &[(&str, &str)] = &[(DEFAULT_MANAGEMENT_ANNOTATION, "something")];

pub(crate) fn broken_pod_terminating() -> Pod {
    make_pod(MakePodArgs {
        name: "BrokenPodTerminating",
        namespace: None,
        labels: &[("testlabel", "true")],
        annotations: MANAGED,
        node_name: Some("TestNode"),
        init_container_status: broken_init_container_terminating(),
    })
}

pub(crate) fn broken_pod_waiting() -> Pod {
    make_pod(MakePodArgs {
        name: "BrokenPodWaiting",
        namespace: None,
        labels: &[],
        annotations: MANAGED,
        node_name: Some("TestNode"),
        init_container_status: broken_init_container_waiting(),
    })
}

pub(crate) fn broken_pod_no_annotation() -> Pod {
    make_pod(MakePodArgs {
        name: "BrokenPodNoAnnotation",
        namespace: None,
        labels: &[],
        annotations: &[],
        node_name: None,
        init_container_status: broken_init_container_waiting(),
    })
}

pub(crate) fn working_pod() -> Pod {
    make_pod(MakePodArgs {
        name: "WorkingPod",
        namespace: None,
        labels: &[],
        annotations: MANAGED,
        node_name: None,
        init_container_status: working_init_container(),
    })
}

pub(crate) fn working_pod_died_previously() -> Pod {
    make_pod(MakePodArgs {
        name: "WorkingPodDiedPreviously",
        namespace: None,
        labels: &[],
        annotations: MANAGED,
        node_name: None,
        init_container_status: working_init_container_died_previously(),
    })
}

pub(crate) fn snapshot(pod: &Pod) -> PodSnapshot {
    PodSnapshot::try_from(pod).expect("fixture pods carry name and uid")
}

/// Same pod identity with a different managed init container status
pub(crate) fn with_init_status(pod: &Pod, status: ContainerStatus) -> Pod {
    let mut pod = pod.clone();
    if let Some(s) = pod.status.as_mut() {
        s.init_container_statuses = Some(vec![status]);
    }
    pod
}
