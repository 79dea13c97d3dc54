use crate::error::{Result, RuntimeError};
use crate::traits::{DeleteOutcome, PodDeleter};
use async_trait::async_trait;
use podmender_core::{PodName, PodUid};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// Scripted failure for the next delete call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    Timeout,
    Status(u16),
}

/// Mock pod deleter for testing without an API server
///
/// Maintains an in-memory pod registry keyed by UID and records every call.
/// Deleting an unknown UID answers `NotFound`, like the real API does for a
/// UID precondition miss.
#[derive(Clone, Default)]
pub struct MockPodDeleter {
    pods: Arc<RwLock<HashMap<PodUid, PodName>>>,
    calls: Arc<RwLock<Vec<PodUid>>>,
    failures: Arc<RwLock<VecDeque<MockFailure>>>,
    latency: Option<Duration>,
}

impl MockPodDeleter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every delete call sleeps this long before answering
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub async fn add_pod(&self, uid: PodUid, name: PodName) {
        self.pods.write().await.insert(uid, name);
    }

    pub async fn contains(&self, uid: &PodUid) -> bool {
        self.pods.read().await.contains_key(uid)
    }

    /// Queue a failure to be returned by the next call
    pub async fn fail_next(&self, failure: MockFailure) {
        self.failures.write().await.push_back(failure);
    }

    /// UIDs passed to `delete_pod`, in call order
    pub async fn calls(&self) -> Vec<PodUid> {
        self.calls.read().await.clone()
    }

    pub async fn calls_for(&self, uid: &PodUid) -> usize {
        self.calls.read().await.iter().filter(|c| *c == uid).count()
    }
}

#[async_trait]
impl PodDeleter for MockPodDeleter {
    async fn delete_pod(
        &self,
        namespace: &str,
        name: &str,
        uid: &PodUid,
    ) -> Result<DeleteOutcome> {
        self.calls.write().await.push(uid.clone());

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if let Some(failure) = self.failures.write().await.pop_front() {
            debug!("Mock: scripted failure {:?} for {}/{}", failure, namespace, name);
            return Err(match failure {
                MockFailure::Timeout => RuntimeError::delete_timeout(namespace, name),
                MockFailure::Status(status) => {
                    RuntimeError::delete_failed(namespace, name, status, "scripted failure")
                }
            });
        }

        match self.pods.write().await.remove(uid) {
            Some(_) => {
                debug!("Mock: pod deleted: {}/{} ({})", namespace, name, uid);
                Ok(DeleteOutcome::Deleted)
            }
            None => Ok(DeleteOutcome::NotFound),
        }
    }
}
