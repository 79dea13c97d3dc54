use crate::snapshot::PodSnapshot;
use crate::types::PodUid;
use serde::{Deserialize, Serialize};

/// A pod change delivered to the repair controller
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "object", rename_all = "UPPERCASE")]
pub enum PodEvent {
    /// Pod was created or updated; carries the latest snapshot
    Applied(PodSnapshot),
    /// Pod with this UID no longer exists
    Deleted(PodUid),
}

impl PodEvent {
    /// UID the event refers to, used for routing
    pub fn uid(&self) -> &PodUid {
        match self {
            Self::Applied(snapshot) => &snapshot.uid,
            Self::Deleted(uid) => uid,
        }
    }
}
