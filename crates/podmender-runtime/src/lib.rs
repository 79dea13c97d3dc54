// Allow unused assignments for diagnostic fields - they're used by the thiserror/miette macros
#![allow(unused_assignments)]

pub mod api_client;
pub mod backoff;
pub mod classifier;
pub mod controller;
pub mod error;
#[cfg(test)]
mod fixtures;
pub mod ledger;
pub mod mock;
pub mod observer;
pub mod policy;
pub mod queue;
pub mod reconciler;
pub mod traits;
pub mod watcher;

// Re-export primary types
pub use error::{Result, RuntimeError};
pub use mock::{MockFailure, MockPodDeleter};
pub use traits::{DeleteOutcome, PodDeleter};

// Re-export decision logic
pub use backoff::BackoffPolicy;
pub use classifier::{Classification, ClassificationKind, Classifier};
pub use ledger::{LedgerEntry, RepairLedger, RepairPhase};
pub use policy::{LabelRequirement, RepairPolicy};
pub use reconciler::{Action, Decision, Reconciler, ReconcilerConfig};

// Re-export controller types
pub use api_client::ApiClient;
pub use controller::{ControllerConfig, RepairController, RepairWorker};
pub use observer::{RepairObserver, TracingObserver};
pub use queue::{KeyedWorkQueue, LaneReceiver};
pub use watcher::{PodWatcher, PodWatcherConfig};
