//! Per-role status evaluation.
//!
//! Roles are evaluated once per pass in [`ROLE_EVALUATION_ORDER`], gating
//! role first, so the scheduler's attested completion is visible to the
//! worker evaluation in the same pass.

use crate::crd::{ConditionStatus, ConditionType, RoleType, TrainJobSpec, TrainJobStatus};
use crate::status::conditions::{
    self, REASON_FAILED, REASON_RESTARTING, REASON_RUNNING, REASON_SUCCEEDED,
};
use crate::{Error, Result};

/// Fixed, deterministic evaluation order: the gating role before the roles
/// that consume its completion signal, the primary role last.
pub const ROLE_EVALUATION_ORDER: [RoleType; 3] =
    [RoleType::Scheduler, RoleType::Server, RoleType::Worker];

/// Signals threaded between role evaluations within a single pass.
#[derive(Debug, Default)]
pub struct PassState {
    /// Set once the gating role's completion has been attested this pass.
    pub gate_done: bool,

    /// Terminal condition already held by the ledger when the pass began.
    pub terminal_at_entry: Option<ConditionType>,
}

impl PassState {
    pub fn for_status(status: &TrainJobStatus) -> Self {
        let terminal_at_entry = if conditions::is_succeeded(status) {
            Some(ConditionType::Succeeded)
        } else if conditions::is_failed(status) {
            Some(ConditionType::Failed)
        } else {
            None
        };
        PassState {
            gate_done: false,
            terminal_at_entry,
        }
    }
}

/// Evaluate one role group's counters into a job-level verdict.
///
/// Decision priority, first match wins: non-retryable failure, retryable
/// failure, gating-role completion, primary-role success, running, no-op.
/// Mutates the condition ledger only; counters are read, never written.
pub fn evaluate_role(
    job_name: &str,
    spec: &TrainJobSpec,
    status: &mut TrainJobStatus,
    role: RoleType,
    expected_replicas: i32,
    gate_signal: bool,
    pass: &mut PassState,
) -> Result<()> {
    if expected_replicas < 0 {
        return Err(Error::Config(format!(
            "TrainJob {} declares a negative replica count ({}) for role {}",
            job_name, expected_replicas, role
        )));
    }
    let replica_spec = spec.replica_specs.get(&role).ok_or_else(|| {
        Error::Config(format!(
            "TrainJob {} has no replica spec for role {}",
            job_name, role
        ))
    })?;
    let counters = status
        .replica_statuses
        .get(&role)
        .cloned()
        .unwrap_or_default();

    // Failures take priority: a single non-retryable failed replica in any
    // role fails the whole job, while a retryable one only marks the job as
    // restarting until the external reconciler recreates the pod.
    if counters.failed > 0 {
        if replica_spec.restart_policy.allows_restart() {
            if !(conditions::is_succeeded(status) || conditions::is_failed(status)) {
                let message = format!(
                    "TrainJob {} has {} failed {} replica(s), waiting for them to be recreated.",
                    job_name, counters.failed, role
                );
                conditions::set_condition(
                    status,
                    ConditionType::Restarting,
                    ConditionStatus::True,
                    REASON_RESTARTING,
                    &message,
                );
            }
        } else {
            let message = format!(
                "TrainJob {} has {} failed {} replica(s), restart policy {:?} does not allow retry.",
                job_name, counters.failed, role, replica_spec.restart_policy
            );
            set_terminal(job_name, status, pass, ConditionType::Failed, REASON_FAILED, &message)?;
        }
        return Ok(());
    }

    // The gating role contributes its attested completion to the roles
    // evaluated after it; it marks the job succeeded itself only when it is
    // the only role group the job declares.
    if role == RoleType::Scheduler && (gate_signal || counters.succeeded == expected_replicas) {
        pass.gate_done = true;
        if only_declared_role(spec, role) {
            let message = format!("TrainJob {} successfully completed.", job_name);
            set_terminal(
                job_name,
                status,
                pass,
                ConditionType::Succeeded,
                REASON_SUCCEEDED,
                &message,
            )?;
        }
        return Ok(());
    }

    // The primary role marks the job succeeded once every replica completed
    // and the gating role, if declared, has been attested complete.
    if role == RoleType::Worker && counters.succeeded == expected_replicas {
        let gating_declared = spec.replica_specs.contains_key(&RoleType::Scheduler);
        if !gating_declared || pass.gate_done {
            let message = format!("TrainJob {} successfully completed.", job_name);
            set_terminal(
                job_name,
                status,
                pass,
                ConditionType::Succeeded,
                REASON_SUCCEEDED,
                &message,
            )?;
            return Ok(());
        }
    }

    // Progress without a verdict. A no-op once a terminal condition holds.
    if counters.active > 0 && !(conditions::is_succeeded(status) || conditions::is_failed(status)) {
        let message = format!("TrainJob {} is running.", job_name);
        conditions::set_condition(
            status,
            ConditionType::Running,
            ConditionStatus::True,
            REASON_RUNNING,
            &message,
        );
    }

    Ok(())
}

/// Only ever called with Succeeded or Failed.
fn opposite_terminal(condition_type: ConditionType) -> ConditionType {
    if condition_type == ConditionType::Succeeded {
        ConditionType::Failed
    } else {
        ConditionType::Succeeded
    }
}

/// Commit a terminal verdict, preserving monotonic terminality.
///
/// A verdict contradicting the terminal state the pass started from is a
/// caller contract violation; a verdict contradicting one set earlier in the
/// same pass is dropped, since role order is the in-pass priority.
fn set_terminal(
    job_name: &str,
    status: &mut TrainJobStatus,
    pass: &PassState,
    condition_type: ConditionType,
    reason: &str,
    message: &str,
) -> Result<()> {
    let opposite = opposite_terminal(condition_type);
    if pass.terminal_at_entry == Some(opposite) {
        return Err(Error::InvalidState(format!(
            "TrainJob {} is already {} and cannot transition to {}",
            job_name, opposite, condition_type
        )));
    }
    if status.condition_is_true(opposite) {
        return Ok(());
    }
    conditions::set_condition(status, condition_type, ConditionStatus::True, reason, message);
    Ok(())
}

fn only_declared_role(spec: &TrainJobSpec, role: RoleType) -> bool {
    spec.replica_specs.keys().all(|r| *r == role)
}
