//! Per-role pod counters.
//!
//! Counters are a full recomputation from the currently observed pod set:
//! the reconciler zeroes a role's counters at the top of each pass and folds
//! in every pod that is visible right now. The watch cache can deliver
//! duplicate, reordered, or missed events, so an incrementally maintained
//! count would drift from ground truth.

use crate::crd::{ReplicaStatus, RoleType, TrainJobStatus};

/// Pod phase as reported by the pod observation feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl From<&str> for PodPhase {
    fn from(s: &str) -> Self {
        match s {
            "Pending" => PodPhase::Pending,
            "Running" => PodPhase::Running,
            "Succeeded" => PodPhase::Succeeded,
            "Failed" => PodPhase::Failed,
            _ => PodPhase::Unknown,
        }
    }
}

/// Zero a role's counters ahead of a fresh fold.
pub fn reset_replica_status(status: &mut TrainJobStatus, role: RoleType) {
    status
        .replica_statuses
        .insert(role, ReplicaStatus::default());
}

/// Fold one observed pod phase into the role's counters. Pending and Unknown
/// pods leave the counters untouched.
pub fn accumulate_pod_phase(status: &mut TrainJobStatus, role: RoleType, phase: PodPhase) {
    let counters = status.replica_statuses.entry(role).or_default();
    match phase {
        PodPhase::Running => counters.active += 1,
        PodPhase::Succeeded => counters.succeeded += 1,
        PodPhase::Failed => counters.failed += 1,
        PodPhase::Pending | PodPhase::Unknown => {}
    }
}
