use crate::error::Result;
use crate::traits::DeleteOutcome;
use podmender_core::PodSnapshot;
use tracing::{info, warn};

/// Hook for external observability of repair actions
///
/// Called from the worker lane that owns the pod, after the decision is made.
pub trait RepairObserver: Send + Sync {
    /// A delete call was made for a broken pod, with the platform's answer
    fn on_delete_issued(
        &self,
        pod: &PodSnapshot,
        attempt: u32,
        outcome: &Result<DeleteOutcome>,
    );

    /// The pod stayed broken through every allowed attempt
    fn on_ceiling_reached(&self, pod: &PodSnapshot, attempts: u32);
}

/// Observer that only logs
#[derive(Debug, Default, Clone)]
pub struct TracingObserver;

impl RepairObserver for TracingObserver {
    fn on_delete_issued(
        &self,
        pod: &PodSnapshot,
        attempt: u32,
        outcome: &Result<DeleteOutcome>,
    ) {
        match outcome {
            Ok(outcome) => info!(
                pod = %pod.pod_name(),
                uid = %pod.uid,
                attempt,
                outcome = ?outcome,
                "Deleted broken pod for recreation"
            ),
            Err(e) => warn!(
                pod = %pod.pod_name(),
                uid = %pod.uid,
                attempt,
                error = %e,
                "Delete of broken pod failed"
            ),
        }
    }

    fn on_ceiling_reached(&self, pod: &PodSnapshot, attempts: u32) {
        warn!(
            pod = %pod.pod_name(),
            uid = %pod.uid,
            attempts,
            "Pod still broken after the attempt ceiling, giving up"
        );
    }
}
