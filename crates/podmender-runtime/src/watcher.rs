use crate::api_client::ApiClient;
use crate::error::{Result, RuntimeError};
use k8s_openapi::api::core::v1::Pod;
use podmender_core::{PodEvent, PodSnapshot, PodUid};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Configuration for the pod watcher
#[derive(Debug, Clone)]
pub struct PodWatcherConfig {
    /// Interval between pod list polls
    pub poll_interval: Duration,
    /// Only list pods scheduled on this node
    pub node_name: Option<String>,
}

impl Default for PodWatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            node_name: None,
        }
    }
}

impl PodWatcherConfig {
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(RuntimeError::invalid_config(
                "pod poll interval is zero",
                "Set --poll-interval-secs to at least 1",
            ));
        }
        Ok(())
    }
}

/// Turns periodic pod lists into a stream of pod events
///
/// Every listed pod is emitted as `Applied`; a UID that was listed before but
/// is missing now is emitted once as `Deleted`.
pub struct PodWatcher {
    api_client: Arc<ApiClient>,
    config: PodWatcherConfig,
    known: HashSet<PodUid>,
}

impl PodWatcher {
    pub fn new(api_client: Arc<ApiClient>, config: PodWatcherConfig) -> Self {
        Self {
            api_client,
            config,
            known: HashSet::new(),
        }
    }

    /// Spawn the poll loop and return its events as a stream. The stream ends
    /// when the token is cancelled.
    pub fn spawn(self, token: CancellationToken, capacity: usize) -> ReceiverStream<PodEvent> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        tokio::spawn(async move {
            if let Err(e) = self.run(token, tx).await {
                error!("Pod watcher error: {}", e);
            }
        });
        ReceiverStream::new(rx)
    }

    /// Run the poll loop
    pub async fn run(mut self, token: CancellationToken, tx: mpsc::Sender<PodEvent>) -> Result<()> {
        self.config.validate()?;
        info!(
            "Starting pod watcher (interval: {:?}, node: {})",
            self.config.poll_interval,
            self.config.node_name.as_deref().unwrap_or("<all>")
        );

        let mut interval = tokio::time::interval(self.config.poll_interval);

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!("Pod watcher shutting down");
                    return Ok(());
                }
                _ = interval.tick() => {
                    let pods = match self.api_client.list_pods(self.config.node_name.as_deref()).await {
                        Ok(p) => p,
                        Err(e) => {
                            warn!("Pod list failed: {}, will retry", e);
                            continue;
                        }
                    };

                    for event in self.diff(&pods) {
                        if tx.send(event).await.is_err() {
                            debug!("Pod event receiver closed, stopping watcher");
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    /// Compute events for one list result and remember the UIDs seen
    pub fn diff(&mut self, pods: &[Pod]) -> Vec<PodEvent> {
        let mut seen = HashSet::with_capacity(pods.len());
        let mut events = Vec::with_capacity(pods.len());

        for pod in pods {
            match PodSnapshot::try_from(pod) {
                Ok(snapshot) => {
                    seen.insert(snapshot.uid.clone());
                    events.push(PodEvent::Applied(snapshot));
                }
                Err(e) => {
                    let pod_name = pod.metadata.name.as_deref().unwrap_or("<unknown>");
                    warn!("Skipping pod {}: {}", pod_name, e);
                }
            }
        }

        events.extend(
            self.known
                .difference(&seen)
                .cloned()
                .map(PodEvent::Deleted),
        );
        self.known = seen;
        events
    }
}
