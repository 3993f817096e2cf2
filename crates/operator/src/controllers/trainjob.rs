use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use k8s_openapi::api::core::v1::Pod;
use kube::{
    api::{Api, ListParams, Patch, PatchParams},
    runtime::{
        controller::{Action, Controller},
        watcher::Config,
    },
    Client, ResourceExt,
};
use serde_json::json;
use tracing::{debug, error, info};

use crate::{
    crd::{ConditionType, TrainJob, TrainJobStatus},
    gang::GangAdmission,
    metrics,
    status::{self, conditions, replica::PodPhase, PodObservations},
    Error, Result,
};

/// Labels the pod creator stamps on every replica pod.
pub const JOB_NAME_LABEL: &str = "trainjob.io/job-name";
pub const ROLE_LABEL: &str = "trainjob.io/role";

pub struct TrainJobController {
    client: Client,
    gang: Arc<dyn GangAdmission>,
    namespace: Option<String>,
    requeue_interval: Duration,
}

impl TrainJobController {
    pub fn new(
        client: Client,
        gang: Arc<dyn GangAdmission>,
        namespace: Option<String>,
        requeue_seconds: u64,
    ) -> Self {
        Self {
            client,
            gang,
            namespace,
            requeue_interval: Duration::from_secs(requeue_seconds),
        }
    }

    pub async fn run(self: Arc<Self>) {
        info!("Starting TrainJob controller");

        let jobs: Api<TrainJob> = match &self.namespace {
            Some(namespace) => Api::namespaced(self.client.clone(), namespace),
            None => Api::all(self.client.clone()),
        };

        Controller::new(jobs, Config::default())
            .run(Self::reconcile, Self::error_policy, self)
            .for_each(|res| async move {
                match res {
                    Ok((_job, _action)) => {}
                    Err(e) => error!("Reconciliation error: {}", e),
                }
            })
            .await;
    }

    async fn reconcile(job: Arc<TrainJob>, ctx: Arc<Self>) -> Result<Action> {
        let name = job.name_any();
        let namespace = job.namespace().unwrap_or_else(|| "default".to_string());

        let mut status = job.status.clone().unwrap_or_default();

        // Terminal jobs stop being reconciled; a spec change wakes us up.
        if conditions::is_succeeded(&status) || conditions::is_failed(&status) {
            debug!("TrainJob {}/{} is in a terminal state", namespace, name);
            return Ok(Action::await_change());
        }

        debug!("Reconciling TrainJob: {}/{}", namespace, name);
        metrics::RECONCILE_PASSES_TOTAL.inc();

        let observed = ctx.observe_pods(&job, &namespace, &name).await?;
        let gate_signal = if job.spec.enable_gang_scheduling {
            ctx.gang.group_completed(&namespace, &name).await?
        } else {
            false
        };

        let was_restarting = status.condition_is_true(ConditionType::Restarting);

        match status::reconcile_status(&job, &mut status, &observed, gate_signal) {
            Ok(()) => {}
            Err(e @ Error::Config(_)) => {
                // The InvalidSpec failure was recorded on the status; persist
                // it and surface the error. A malformed job is not retried.
                ctx.patch_status(&namespace, &name, &status).await?;
                metrics::JOBS_FAILED_TOTAL.inc();
                return Err(e);
            }
            Err(e) => {
                // The status was left as it was; nothing to persist.
                return Err(e);
            }
        }

        if conditions::is_succeeded(&status) {
            info!("TrainJob {}/{} completed successfully", namespace, name);
            metrics::JOBS_SUCCEEDED_TOTAL.inc();
        }
        if conditions::is_failed(&status) {
            info!("TrainJob {}/{} failed", namespace, name);
            metrics::JOBS_FAILED_TOTAL.inc();
        }
        if !was_restarting && status.condition_is_true(ConditionType::Restarting) {
            metrics::JOBS_RESTARTED_TOTAL.inc();
        }

        ctx.patch_status(&namespace, &name, &status).await?;

        if conditions::is_succeeded(&status) || conditions::is_failed(&status) {
            Ok(Action::await_change())
        } else {
            Ok(Action::requeue(ctx.requeue_interval))
        }
    }

    /// Fetch the current pod phases for every declared role group.
    async fn observe_pods(
        &self,
        job: &TrainJob,
        namespace: &str,
        name: &str,
    ) -> Result<PodObservations> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let mut observed = PodObservations::new();

        for &role in job.spec.replica_specs.keys() {
            let selector = format!("{}={},{}={}", JOB_NAME_LABEL, name, ROLE_LABEL, role);
            let list = pods
                .list(&ListParams::default().labels(&selector))
                .await
                .map_err(|e| Error::Kubernetes(e.to_string()))?;
            let phases = list
                .items
                .iter()
                .map(|pod| {
                    pod.status
                        .as_ref()
                        .and_then(|s| s.phase.as_deref())
                        .map(PodPhase::from)
                        .unwrap_or(PodPhase::Unknown)
                })
                .collect();
            observed.insert(role, phases);
        }

        Ok(observed)
    }

    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: &TrainJobStatus,
    ) -> Result<()> {
        let api: Api<TrainJob> = Api::namespaced(self.client.clone(), namespace);

        let patch = json!({
            "status": status
        });

        api.patch_status(name, &PatchParams::default(), &Patch::Merge(patch))
            .await
            .map_err(|e| Error::Kubernetes(e.to_string()))?;

        debug!("Updated status for TrainJob {}/{}", namespace, name);
        Ok(())
    }

    fn error_policy(job: Arc<TrainJob>, error: &Error, _ctx: Arc<Self>) -> Action {
        error!("Error reconciling TrainJob {}: {}", job.name_any(), error);
        Action::requeue(Duration::from_secs(30))
    }
}
