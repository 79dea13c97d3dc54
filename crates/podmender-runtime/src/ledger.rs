use crate::classifier::Classification;
use chrono::{DateTime, Utc};
use podmender_core::PodUid;
use std::collections::HashMap;

/// Where a broken pod is in its repair lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairPhase {
    /// A delete was issued; waiting for the pod to go away
    DeleteIssued { retry_at: DateTime<Utc> },
    /// The last delete call failed; retry after backoff
    DeleteFailed { retry_at: DateTime<Utc> },
    /// Attempt ceiling reached; no further deletes for this UID
    CeilingReached,
}

/// Repair bookkeeping for one pod UID
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    /// Always Broken, since any other classification clears the entry. The
    /// reason tells a terminated failure from a crash loop.
    pub last_classification: Classification,
    pub attempts: u32,
    pub last_action_at: DateTime<Utc>,
    pub phase: RepairPhase,
}

/// In-memory record of repair attempts, keyed by pod UID
///
/// Not persisted. After a restart entries start over at attempt 1, which can
/// only cause one redundant delete per pod.
#[derive(Debug, Default)]
pub struct RepairLedger {
    entries: HashMap<PodUid, LedgerEntry>,
}

impl RepairLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, uid: &PodUid) -> Option<&LedgerEntry> {
        self.entries.get(uid)
    }

    pub(crate) fn get_mut(&mut self, uid: &PodUid) -> Option<&mut LedgerEntry> {
        self.entries.get_mut(uid)
    }

    pub(crate) fn insert(&mut self, uid: PodUid, entry: LedgerEntry) {
        self.entries.insert(uid, entry);
    }

    pub fn remove(&mut self, uid: &PodUid) -> Option<LedgerEntry> {
        self.entries.remove(uid)
    }

    pub fn contains(&self, uid: &PodUid) -> bool {
        self.entries.contains_key(uid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
