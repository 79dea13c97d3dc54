use crate::classifier::Classifier;
use crate::error::Result;
use crate::ledger::RepairLedger;
use crate::observer::RepairObserver;
use crate::queue::{KeyedWorkQueue, LaneReceiver};
use crate::reconciler::{Action, Reconciler};
use crate::traits::{DeleteOutcome, PodDeleter};
use chrono::Utc;
use podmender_core::{PodEvent, PodSnapshot};
use std::sync::Arc;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Configuration for the repair controller
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Number of worker lanes; events are spread over them by pod UID
    pub workers: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self { workers: 4 }
    }
}

/// Repair controller: routes pod events to per-UID worker lanes
pub struct RepairController {
    classifier: Arc<Classifier>,
    reconciler: Arc<Reconciler>,
    deleter: Arc<dyn PodDeleter>,
    observer: Arc<dyn RepairObserver>,
    config: ControllerConfig,
}

impl RepairController {
    pub fn new(
        classifier: Classifier,
        reconciler: Reconciler,
        deleter: Arc<dyn PodDeleter>,
        observer: Arc<dyn RepairObserver>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            classifier: Arc::new(classifier),
            reconciler: Arc::new(reconciler),
            deleter,
            observer,
            config,
        }
    }

    /// Build the worker for one lane
    pub fn worker(&self, lane: usize, token: CancellationToken) -> RepairWorker {
        RepairWorker {
            lane,
            classifier: self.classifier.clone(),
            reconciler: self.reconciler.clone(),
            deleter: self.deleter.clone(),
            observer: self.observer.clone(),
            ledger: RepairLedger::new(),
            token,
        }
    }

    /// Run until the event stream ends or the token is cancelled.
    ///
    /// On cancellation no further events are dispatched; lanes drain what is
    /// already queued without issuing new deletes, and any delete already in
    /// flight runs to completion.
    pub async fn run<S>(&self, token: CancellationToken, mut events: S) -> Result<()>
    where
        S: Stream<Item = PodEvent> + Unpin,
    {
        info!(
            "Starting repair controller with {} worker lane(s)",
            self.config.workers
        );

        let (queue, receivers) = KeyedWorkQueue::new(self.config.workers);

        let handles: Vec<_> = receivers
            .into_iter()
            .enumerate()
            .map(|(lane, rx)| {
                let worker = self.worker(lane, token.clone());
                tokio::spawn(worker.run(rx))
            })
            .collect();

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!("Repair controller shutting down");
                    break;
                }
                event = events.next() => {
                    let Some(event) = event else {
                        debug!("Pod event stream ended");
                        break;
                    };
                    if let Err(e) = queue.dispatch(event) {
                        warn!("Failed to dispatch pod event: {}", e);
                        break;
                    }
                }
            }
        }

        // Closing the queue lets each lane drain and exit
        drop(queue);

        for result in futures_util::future::join_all(handles).await {
            if let Err(e) = result {
                error!("Repair worker terminated abnormally: {}", e);
            }
        }

        info!("Repair controller stopped");
        Ok(())
    }
}

/// Single consumer for one lane; exclusively owns that lane's ledger shard
pub struct RepairWorker {
    lane: usize,
    classifier: Arc<Classifier>,
    reconciler: Arc<Reconciler>,
    deleter: Arc<dyn PodDeleter>,
    observer: Arc<dyn RepairObserver>,
    ledger: RepairLedger,
    token: CancellationToken,
}

impl RepairWorker {
    pub fn ledger(&self) -> &RepairLedger {
        &self.ledger
    }

    /// Consume events until the lane is closed
    pub async fn run(mut self, mut rx: LaneReceiver) -> RepairLedger {
        debug!("Repair worker {} started", self.lane);
        while let Some(event) = rx.recv().await {
            self.handle(event).await;
        }
        debug!(
            "Repair worker {} stopped with {} tracked pod(s)",
            self.lane,
            self.ledger.len()
        );
        self.ledger
    }

    /// Process one event for a pod owned by this lane
    pub async fn handle(&mut self, event: PodEvent) {
        match event {
            PodEvent::Deleted(uid) => {
                if self.reconciler.forget(&mut self.ledger, &uid) {
                    debug!("Pod {} is gone, clearing repair state", uid);
                }
            }
            PodEvent::Applied(pod) => self.reconcile(&pod).await,
        }
    }

    async fn reconcile(&mut self, pod: &PodSnapshot) {
        let classification = self.classifier.classify(pod);
        debug!("Pod {} classified {}", pod.pod_name(), classification);

        if self.token.is_cancelled() && classification.is_broken() {
            debug!(
                "Shutting down, not repairing pod {}",
                pod.pod_name()
            );
            return;
        }

        let decision = self
            .reconciler
            .reconcile(pod, &classification, &mut self.ledger);

        match decision.action {
            Action::Delete => {
                info!(
                    "Deleting broken pod {} (attempt {}): {}",
                    pod.pod_name(),
                    decision.attempt,
                    classification.reason
                );
                let outcome = self
                    .deleter
                    .delete_pod(&pod.namespace, &pod.name, &pod.uid)
                    .await;
                self.reconciler
                    .record_delete(&mut self.ledger, &pod.uid, &outcome, Utc::now());

                match &outcome {
                    Ok(DeleteOutcome::Deleted) => {}
                    Ok(DeleteOutcome::NotFound) => {
                        debug!("Pod {} was already gone", pod.pod_name());
                    }
                    Err(e) => {
                        warn!(
                            "Failed to delete pod {} (attempt {}): {}, will retry",
                            pod.pod_name(),
                            decision.attempt,
                            e
                        );
                    }
                }
                self.observer
                    .on_delete_issued(pod, decision.attempt, &outcome);
            }
            Action::Wait => {
                debug!(
                    "Pod {} still broken after attempt {}, waiting until {:?}",
                    pod.pod_name(),
                    decision.attempt,
                    decision.retry_at
                );
            }
            Action::NoOp => {
                if decision.permanent_failure {
                    self.observer.on_ceiling_reached(pod, decision.attempt);
                }
            }
        }
    }
}
