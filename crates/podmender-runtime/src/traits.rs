use crate::error::Result;
use async_trait::async_trait;
use podmender_core::PodUid;

/// Successful answers to a delete request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The platform accepted the delete
    Deleted,
    /// No pod with that UID exists any more
    NotFound,
}

/// Trait for the platform operation that removes a pod
///
/// Implementations must be idempotent per UID: deleting a pod that is already
/// gone, or whose name now belongs to a newer pod, returns `NotFound` rather
/// than an error. This enables testing via `MockPodDeleter` without a cluster.
#[async_trait]
pub trait PodDeleter: Send + Sync {
    /// Delete the pod `namespace/name`, but only if it still has `uid`
    async fn delete_pod(&self, namespace: &str, name: &str, uid: &PodUid)
        -> Result<DeleteOutcome>;
}
