use crate::backoff::BackoffPolicy;
use crate::classifier::{Classification, ClassificationKind};
use crate::error::{Result, RuntimeError};
use crate::ledger::{LedgerEntry, RepairLedger, RepairPhase};
use crate::traits::DeleteOutcome;
use chrono::{DateTime, Utc};
use podmender_core::{PodSnapshot, PodUid};
use std::fmt;
use tracing::debug;

/// Configuration for the reconciler
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Deletes issued per pod UID before giving up
    pub max_attempts: u32,
    /// Delay between attempts for the same pod
    pub backoff: BackoffPolicy,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: BackoffPolicy::default(),
        }
    }
}

impl ReconcilerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(RuntimeError::invalid_config(
                "max attempts is 0",
                "Set --max-attempts to at least 1, otherwise no pod is ever repaired",
            ));
        }
        self.backoff.validate()
    }
}

/// What the caller should do for a pod after one reconcile pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    NoOp,
    Delete,
    Wait,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoOp => write!(f, "NoOp"),
            Self::Delete => write!(f, "Delete"),
            Self::Wait => write!(f, "Wait"),
        }
    }
}

/// Result of a reconcile pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub action: Action,
    /// Attempt number of the delete (0 when no entry exists)
    pub attempt: u32,
    /// When the next delete may be issued, for `Wait`
    pub retry_at: Option<DateTime<Utc>>,
    /// Set on the single pass that reaches the attempt ceiling
    pub permanent_failure: bool,
}

impl Decision {
    fn no_op() -> Self {
        Self {
            action: Action::NoOp,
            attempt: 0,
            retry_at: None,
            permanent_failure: false,
        }
    }
}

/// Decides per pass whether a classified pod is deleted, left alone or waited on
///
/// Per UID the states are: no entry, Broken with a delete issued, Broken and
/// waiting, then either gone (entry cleared) or ceiling reached. A Healthy or
/// Ignored classification clears the entry at any point.
#[derive(Debug, Clone)]
pub struct Reconciler {
    config: ReconcilerConfig,
}

impl Reconciler {
    pub fn new(config: ReconcilerConfig) -> Self {
        Self { config }
    }

    /// Reconcile against the wall clock
    pub fn reconcile(
        &self,
        pod: &PodSnapshot,
        classification: &Classification,
        ledger: &mut RepairLedger,
    ) -> Decision {
        self.reconcile_at(pod, classification, ledger, Utc::now())
    }

    /// Reconcile as of `now`
    pub fn reconcile_at(
        &self,
        pod: &PodSnapshot,
        classification: &Classification,
        ledger: &mut RepairLedger,
        now: DateTime<Utc>,
    ) -> Decision {
        if classification.kind != ClassificationKind::Broken {
            if let Some(entry) = ledger.remove(&pod.uid) {
                debug!(
                    "Pod {} is now {} after {} attempt(s), clearing repair state",
                    pod.pod_name(),
                    classification.kind,
                    entry.attempts
                );
            }
            return Decision::no_op();
        }

        if !ledger.contains(&pod.uid) {
            // Pessimistically assume the delete goes out; record_delete corrects it
            let retry_at = self.retry_after(now, 1);
            ledger.insert(
                pod.uid.clone(),
                LedgerEntry {
                    last_classification: classification.clone(),
                    attempts: 1,
                    last_action_at: now,
                    phase: RepairPhase::DeleteIssued { retry_at },
                },
            );
            return Decision {
                action: Action::Delete,
                attempt: 1,
                retry_at: Some(retry_at),
                permanent_failure: false,
            };
        }

        let Some(entry) = ledger.get_mut(&pod.uid) else {
            return Decision::no_op();
        };

        entry.last_classification = classification.clone();

        let retry_at = match entry.phase {
            RepairPhase::CeilingReached => {
                return Decision {
                    attempt: entry.attempts,
                    ..Decision::no_op()
                }
            }
            RepairPhase::DeleteIssued { retry_at } | RepairPhase::DeleteFailed { retry_at } => {
                retry_at
            }
        };

        if now < retry_at {
            return Decision {
                action: Action::Wait,
                attempt: entry.attempts,
                retry_at: Some(retry_at),
                permanent_failure: false,
            };
        }

        if entry.attempts >= self.config.max_attempts {
            entry.phase = RepairPhase::CeilingReached;
            return Decision {
                attempt: entry.attempts,
                permanent_failure: true,
                ..Decision::no_op()
            };
        }

        entry.attempts += 1;
        entry.last_action_at = now;
        let retry_at = self.retry_after(now, entry.attempts);
        entry.phase = RepairPhase::DeleteIssued { retry_at };

        Decision {
            action: Action::Delete,
            attempt: entry.attempts,
            retry_at: Some(retry_at),
            permanent_failure: false,
        }
    }

    /// Record the platform's answer to a delete issued for `uid`
    ///
    /// Not-found counts as success. Failures keep the attempt count and are
    /// retried after backoff.
    pub fn record_delete(
        &self,
        ledger: &mut RepairLedger,
        uid: &PodUid,
        outcome: &Result<DeleteOutcome>,
        now: DateTime<Utc>,
    ) {
        let Some(entry) = ledger.get_mut(uid) else {
            return;
        };
        let retry_at = self.retry_after(now, entry.attempts);
        entry.last_action_at = now;
        entry.phase = match outcome {
            Ok(_) => RepairPhase::DeleteIssued { retry_at },
            Err(_) => RepairPhase::DeleteFailed { retry_at },
        };
    }

    /// Drop state for a pod that no longer exists
    pub fn forget(&self, ledger: &mut RepairLedger, uid: &PodUid) -> bool {
        ledger.remove(uid).is_some()
    }

    /// Earliest time the next delete may go out, saturating at the end of time
    fn retry_after(&self, now: DateTime<Utc>, attempt: u32) -> DateTime<Utc> {
        chrono::Duration::from_std(self.config.backoff.delay_for(attempt))
            .ok()
            .and_then(|delay| now.checked_add_signed(delay))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}
