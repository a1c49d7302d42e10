//! Deployment state: fingerprints, snapshots, and plans

mod fingerprint;
mod planner;
mod snapshot;

pub use fingerprint::{fingerprint, Fingerprints};
pub use planner::{plan_changes, Change, ChangeKind, Plan};
pub use snapshot::{Snapshot, SnapshotColumn, SnapshotModel, StateLock, SNAPSHOT_VERSION};
