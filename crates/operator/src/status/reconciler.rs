//! One full status reconciliation pass for a job.
//!
//! The sole entry point the reconcile loop calls per pass. Counters are
//! recomputed from zero out of the observed pod phases, roles are evaluated
//! in fixed order against a scratch copy of the status, and the result is
//! committed only if every role evaluates cleanly.

use chrono::Utc;
use kube::ResourceExt;
use std::collections::BTreeMap;

use crate::crd::{ConditionStatus, ConditionType, RoleType, TrainJob, TrainJobSpec, TrainJobStatus};
use crate::status::conditions::{self, REASON_CREATED, REASON_INVALID_SPEC};
use crate::status::evaluate::{self, PassState, ROLE_EVALUATION_ORDER};
use crate::status::replica;
use crate::{Error, Result};

/// Observed pod phases per role group, pre-fetched by the reconcile loop.
pub type PodObservations = BTreeMap<RoleType, Vec<replica::PodPhase>>;

/// Run one reconciliation pass, mutating `status` in place.
///
/// Idempotent for an unchanged observation set: no new condition entries and
/// no `lastTransitionTime` movement. A pass that errors leaves the status
/// exactly as it was, except that a malformed spec is recorded as a terminal
/// InvalidSpec failure before the error is surfaced.
pub fn reconcile_status(
    job: &TrainJob,
    status: &mut TrainJobStatus,
    observed: &PodObservations,
    gate_signal: bool,
) -> Result<()> {
    let name = job.name_any();

    // A malformed spec is recorded once as a terminal InvalidSpec failure
    // and surfaced to the caller; it is not retried.
    if let Err(e) = validate_spec(&name, &job.spec) {
        if !conditions::is_succeeded(status) {
            if let Error::Config(ref message) = e {
                conditions::set_condition(
                    status,
                    ConditionType::Failed,
                    ConditionStatus::True,
                    REASON_INVALID_SPEC,
                    message,
                );
                conditions::filter_conditions(status);
                if status.completion_time.is_none() {
                    status.completion_time = Some(Utc::now().to_rfc3339());
                }
            }
        }
        return Err(e);
    }

    // The whole pass runs against a scratch copy and commits only if every
    // role evaluates cleanly; an aborted pass leaves the status untouched.
    let mut scratch = status.clone();

    // First observation of the job.
    if scratch.start_time.is_none() {
        scratch.start_time = Some(Utc::now().to_rfc3339());
    }
    if conditions::get_condition(&scratch, ConditionType::Created).is_none() {
        let message = format!("TrainJob {} is created.", name);
        conditions::set_condition(
            &mut scratch,
            ConditionType::Created,
            ConditionStatus::True,
            REASON_CREATED,
            &message,
        );
    }

    // Fresh full recomputation of every declared role's counters.
    for &role in job.spec.replica_specs.keys() {
        replica::reset_replica_status(&mut scratch, role);
        if let Some(phases) = observed.get(&role) {
            for &phase in phases {
                replica::accumulate_pod_phase(&mut scratch, role, phase);
            }
        }
    }

    let mut pass = PassState::for_status(status);
    for role in ROLE_EVALUATION_ORDER {
        let replica_spec = match job.spec.replica_specs.get(&role) {
            Some(replica_spec) => replica_spec,
            None => continue,
        };
        evaluate::evaluate_role(
            &name,
            &job.spec,
            &mut scratch,
            role,
            replica_spec.replicas,
            gate_signal,
            &mut pass,
        )?;
    }

    conditions::filter_conditions(&mut scratch);
    if (conditions::is_succeeded(&scratch) || conditions::is_failed(&scratch))
        && scratch.completion_time.is_none()
    {
        scratch.completion_time = Some(Utc::now().to_rfc3339());
    }

    *status = scratch;
    Ok(())
}

fn validate_spec(job_name: &str, spec: &TrainJobSpec) -> Result<()> {
    if spec.replica_specs.is_empty() {
        return Err(Error::Config(format!(
            "TrainJob {} declares no role groups",
            job_name
        )));
    }
    for (role, replica_spec) in &spec.replica_specs {
        if replica_spec.replicas < 0 {
            return Err(Error::Config(format!(
                "TrainJob {} declares a negative replica count ({}) for role {}",
                job_name, replica_spec.replicas, role
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{JobCondition, ReplicaSpec, RestartPolicy};
    use crate::status::replica::PodPhase;
    use k8s_openapi::api::core::v1::PodTemplateSpec;

    fn new_job(name: &str, roles: &[(RoleType, i32, RestartPolicy)]) -> TrainJob {
        let mut replica_specs = BTreeMap::new();
        for &(role, replicas, restart_policy) in roles {
            replica_specs.insert(
                role,
                ReplicaSpec {
                    replicas,
                    template: PodTemplateSpec::default(),
                    restart_policy,
                },
            );
        }
        TrainJob::new(
            name,
            TrainJobSpec {
                replica_specs,
                enable_gang_scheduling: false,
                clean_pod_policy: None,
            },
        )
    }

    fn transition_snapshot(status: &TrainJobStatus) -> Vec<(ConditionType, ConditionStatus, Option<String>)> {
        status
            .conditions
            .iter()
            .map(|c: &JobCondition| (c.condition_type, c.status, c.last_transition_time.clone()))
            .collect()
    }

    #[test]
    fn test_first_pass_records_created_and_start_time() {
        let job = new_job("first", &[(RoleType::Worker, 1, RestartPolicy::Never)]);
        let mut status = TrainJobStatus::default();

        reconcile_status(&job, &mut status, &PodObservations::new(), false).unwrap();

        assert!(status.start_time.is_some());
        assert!(status.condition_is_true(ConditionType::Created));
        assert!(status.completion_time.is_none());
    }

    #[test]
    fn test_pass_is_idempotent_for_unchanged_observations() {
        let job = new_job("idem", &[(RoleType::Worker, 4, RestartPolicy::Never)]);
        let mut status = TrainJobStatus::default();
        let observed = PodObservations::from([(
            RoleType::Worker,
            vec![PodPhase::Running, PodPhase::Running, PodPhase::Succeeded],
        )]);

        reconcile_status(&job, &mut status, &observed, false).unwrap();
        let first = transition_snapshot(&status);

        reconcile_status(&job, &mut status, &observed, false).unwrap();
        let second = transition_snapshot(&status);

        assert_eq!(first, second);
        assert_eq!(
            status.replica_statuses[&RoleType::Worker].active, 2,
            "counters must not accumulate across passes"
        );
    }

    #[test]
    fn test_terminal_state_is_monotonic() {
        let job = new_job("mono", &[(RoleType::Worker, 4, RestartPolicy::Never)]);
        let mut status = TrainJobStatus::default();

        let observed = PodObservations::from([(
            RoleType::Worker,
            vec![PodPhase::Running, PodPhase::Running, PodPhase::Failed, PodPhase::Failed],
        )]);
        reconcile_status(&job, &mut status, &observed, false).unwrap();
        assert!(conditions::is_failed(&status));
        assert!(!conditions::is_running(&status));

        // Replacement pods come up, but the verdict must not move.
        let observed = PodObservations::from([(
            RoleType::Worker,
            vec![
                PodPhase::Running,
                PodPhase::Running,
                PodPhase::Running,
                PodPhase::Running,
            ],
        )]);
        reconcile_status(&job, &mut status, &observed, false).unwrap();
        assert!(conditions::is_failed(&status));
        assert!(!conditions::is_running(&status));
    }

    #[test]
    fn test_aborted_pass_leaves_ledger_untouched() {
        let job = new_job("abort", &[(RoleType::Worker, 1, RestartPolicy::Never)]);
        let mut status = TrainJobStatus::default();
        conditions::set_condition(
            &mut status,
            ConditionType::Succeeded,
            ConditionStatus::True,
            conditions::REASON_SUCCEEDED,
            "job completed",
        );
        status.start_time = Some("2024-01-01T00:00:00+00:00".to_string());
        let before = transition_snapshot(&status);

        // A failed pod on a succeeded job contradicts the terminal state.
        let observed = PodObservations::from([(RoleType::Worker, vec![PodPhase::Failed])]);
        let err = reconcile_status(&job, &mut status, &observed, false).unwrap_err();

        assert!(matches!(err, Error::InvalidState(_)));
        assert_eq!(transition_snapshot(&status), before);
    }

    #[test]
    fn test_invalid_spec_is_recorded_and_surfaced() {
        let job = new_job("bad", &[(RoleType::Worker, -3, RestartPolicy::Never)]);
        let mut status = TrainJobStatus::default();

        let err = reconcile_status(&job, &mut status, &PodObservations::new(), false).unwrap_err();

        assert!(matches!(err, Error::Config(_)));
        assert!(conditions::is_failed(&status));
        let failed = conditions::get_condition(&status, ConditionType::Failed).unwrap();
        assert_eq!(failed.reason, REASON_INVALID_SPEC);
        assert!(status.completion_time.is_some());
    }

    #[test]
    fn test_empty_spec_is_a_configuration_error() {
        let job = new_job("empty", &[]);
        let mut status = TrainJobStatus::default();

        let err = reconcile_status(&job, &mut status, &PodObservations::new(), false).unwrap_err();

        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_completion_time_is_stamped_once() {
        let job = new_job("done", &[(RoleType::Worker, 1, RestartPolicy::Never)]);
        let mut status = TrainJobStatus::default();
        let observed = PodObservations::from([(RoleType::Worker, vec![PodPhase::Succeeded])]);

        reconcile_status(&job, &mut status, &observed, false).unwrap();
        assert!(conditions::is_succeeded(&status));
        let stamped = status.completion_time.clone();
        assert!(stamped.is_some());

        reconcile_status(&job, &mut status, &observed, false).unwrap();
        assert_eq!(status.completion_time, stamped);
    }
}
