//! Job condition ledger.
//!
//! Conditions are append-only with in-place supersession: setting a type that
//! already exists updates it, and history is never removed. At most one of
//! {Running, Succeeded, Failed} may be True at a time; once a terminal
//! condition is True the Running condition is flipped to False rather than
//! dropped.

use chrono::Utc;

use crate::crd::{ConditionStatus, ConditionType, JobCondition, TrainJobStatus};

pub const REASON_CREATED: &str = "TrainJobCreated";
pub const REASON_RUNNING: &str = "TrainJobRunning";
pub const REASON_RESTARTING: &str = "TrainJobRestarting";
pub const REASON_SUCCEEDED: &str = "TrainJobSucceeded";
pub const REASON_FAILED: &str = "TrainJobFailed";
pub const REASON_INVALID_SPEC: &str = "InvalidSpec";

/// Set or update the condition of the given type.
///
/// `lastTransitionTime` moves only when the status value actually changes;
/// `lastUpdateTime` moves on every write.
pub fn set_condition(
    status: &mut TrainJobStatus,
    condition_type: ConditionType,
    value: ConditionStatus,
    reason: &str,
    message: &str,
) {
    let now = Utc::now().to_rfc3339();

    if let Some(existing) = status
        .conditions
        .iter_mut()
        .find(|c| c.condition_type == condition_type)
    {
        if existing.status != value {
            existing.last_transition_time = Some(now.clone());
        }
        existing.status = value;
        existing.reason = reason.to_string();
        existing.message = message.to_string();
        existing.last_update_time = Some(now);
    } else {
        status.conditions.push(JobCondition {
            condition_type,
            status: value,
            reason: reason.to_string(),
            message: message.to_string(),
            last_update_time: Some(now.clone()),
            last_transition_time: Some(now),
        });
    }
}

/// Enforce mutual exclusion between Running and the terminal conditions.
///
/// When Succeeded or Failed is True, any Running condition is flipped to
/// False. The entry stays in the ledger: the job stopped progressing because
/// it reached a terminal state, not because it was never running.
pub fn filter_conditions(status: &mut TrainJobStatus) {
    if !(is_succeeded(status) || is_failed(status)) {
        return;
    }
    let now = Utc::now().to_rfc3339();
    for condition in status
        .conditions
        .iter_mut()
        .filter(|c| c.condition_type == ConditionType::Running)
    {
        if condition.status == ConditionStatus::True {
            condition.status = ConditionStatus::False;
            condition.last_transition_time = Some(now.clone());
            condition.last_update_time = Some(now.clone());
        }
    }
}

/// Look up the condition of the given type, if present.
pub fn get_condition(
    status: &TrainJobStatus,
    condition_type: ConditionType,
) -> Option<&JobCondition> {
    status
        .conditions
        .iter()
        .find(|c| c.condition_type == condition_type)
}

pub fn is_succeeded(status: &TrainJobStatus) -> bool {
    status.condition_is_true(ConditionType::Succeeded)
}

pub fn is_failed(status: &TrainJobStatus) -> bool {
    status.condition_is_true(ConditionType::Failed)
}

pub fn is_running(status: &TrainJobStatus) -> bool {
    status.condition_is_true(ConditionType::Running)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::JobPhase;

    #[test]
    fn test_set_condition_appends_then_updates_in_place() {
        let mut status = TrainJobStatus::default();

        set_condition(
            &mut status,
            ConditionType::Running,
            ConditionStatus::True,
            REASON_RUNNING,
            "job is running",
        );
        assert_eq!(status.conditions.len(), 1);
        assert!(is_running(&status));

        set_condition(
            &mut status,
            ConditionType::Running,
            ConditionStatus::True,
            REASON_RUNNING,
            "still running",
        );
        assert_eq!(status.conditions.len(), 1);
        assert_eq!(status.conditions[0].message, "still running");
    }

    #[test]
    fn test_transition_time_moves_only_on_status_change() {
        let mut status = TrainJobStatus::default();

        set_condition(
            &mut status,
            ConditionType::Running,
            ConditionStatus::True,
            REASON_RUNNING,
            "job is running",
        );
        let first_transition = status.conditions[0].last_transition_time.clone();

        set_condition(
            &mut status,
            ConditionType::Running,
            ConditionStatus::True,
            REASON_RUNNING,
            "rewritten message",
        );
        assert_eq!(status.conditions[0].last_transition_time, first_transition);

        set_condition(
            &mut status,
            ConditionType::Running,
            ConditionStatus::False,
            REASON_FAILED,
            "stopped",
        );
        assert_eq!(status.conditions[0].status, ConditionStatus::False);
        assert!(status.conditions[0].last_transition_time.is_some());
    }

    #[test]
    fn test_filter_flips_running_without_dropping_history() {
        let mut status = TrainJobStatus::default();
        set_condition(
            &mut status,
            ConditionType::Running,
            ConditionStatus::True,
            REASON_RUNNING,
            "job is running",
        );
        set_condition(
            &mut status,
            ConditionType::Succeeded,
            ConditionStatus::True,
            REASON_SUCCEEDED,
            "job completed",
        );

        filter_conditions(&mut status);

        assert_eq!(status.conditions.len(), 2);
        assert!(!is_running(&status));
        assert!(is_succeeded(&status));
        let running = get_condition(&status, ConditionType::Running).unwrap();
        assert_eq!(running.status, ConditionStatus::False);
    }

    #[test]
    fn test_filter_is_a_noop_without_terminal_condition() {
        let mut status = TrainJobStatus::default();
        set_condition(
            &mut status,
            ConditionType::Running,
            ConditionStatus::True,
            REASON_RUNNING,
            "job is running",
        );

        filter_conditions(&mut status);

        assert!(is_running(&status));
    }

    #[test]
    fn test_phase_follows_ledger() {
        let mut status = TrainJobStatus::default();
        assert_eq!(status.phase(), JobPhase::Created);

        set_condition(
            &mut status,
            ConditionType::Running,
            ConditionStatus::True,
            REASON_RUNNING,
            "job is running",
        );
        assert_eq!(status.phase(), JobPhase::Running);

        set_condition(
            &mut status,
            ConditionType::Failed,
            ConditionStatus::True,
            REASON_FAILED,
            "job failed",
        );
        filter_conditions(&mut status);
        assert_eq!(status.phase(), JobPhase::Failed);
    }
}
