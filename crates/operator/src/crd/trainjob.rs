use k8s_openapi::api::core::v1::PodTemplateSpec;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(CustomResource, Debug, Serialize, Deserialize, Clone, JsonSchema)]
#[kube(
    group = "trainjob.io",
    version = "v1alpha1",
    kind = "TrainJob",
    namespaced,
    status = "TrainJobStatus"
)]
pub struct TrainJobSpec {
    /// Role groups that make up the training job, keyed by role
    #[serde(rename = "replicaSpecs")]
    pub replica_specs: BTreeMap<RoleType, ReplicaSpec>,

    /// Gate success of gated roles on the gang scheduler's completion signal
    #[serde(rename = "enableGangScheduling", default)]
    pub enable_gang_scheduling: bool,

    /// Which pods to clean up after the job reaches a terminal state
    #[serde(rename = "cleanPodPolicy", skip_serializing_if = "Option::is_none")]
    pub clean_pod_policy: Option<CleanPodPolicy>,
}

/// Role a replica group plays within the training job.
///
/// Worker is the primary role; Scheduler is the gating role whose completion
/// must be attested before workers can mark the job succeeded.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
pub enum RoleType {
    Scheduler,
    Server,
    Worker,
}

impl fmt::Display for RoleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoleType::Scheduler => write!(f, "scheduler"),
            RoleType::Server => write!(f, "server"),
            RoleType::Worker => write!(f, "worker"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema)]
pub struct ReplicaSpec {
    /// Desired number of replicas for this role group
    pub replicas: i32,

    /// Pod template the replicas are created from
    pub template: PodTemplateSpec,

    /// How a failed pod in this role group is treated
    #[serde(rename = "restartPolicy", default)]
    pub restart_policy: RestartPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum RestartPolicy {
    Always,
    OnFailure,
    Never,
    ExitCode,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        RestartPolicy::Never
    }
}

impl RestartPolicy {
    /// Whether a Failed pod is expected to be recreated rather than failing
    /// the whole job. Always pods are restarted in place by the kubelet, so a
    /// pod-level Failed phase under Always is not an expected retry.
    pub fn allows_restart(&self) -> bool {
        matches!(self, RestartPolicy::OnFailure | RestartPolicy::ExitCode)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum CleanPodPolicy {
    All,
    Running,
    None,
}

/// Pod counters for one role group.
///
/// Recomputed from scratch from the currently observed pod set on every
/// reconciliation pass; never maintained incrementally across passes.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq, JsonSchema)]
pub struct ReplicaStatus {
    #[serde(default)]
    pub active: i32,

    #[serde(default)]
    pub succeeded: i32,

    #[serde(default)]
    pub failed: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ConditionType {
    Created,
    Running,
    Restarting,
    Succeeded,
    Failed,
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionType::Created => write!(f, "Created"),
            ConditionType::Running => write!(f, "Running"),
            ConditionType::Restarting => write!(f, "Restarting"),
            ConditionType::Succeeded => write!(f, "Succeeded"),
            ConditionType::Failed => write!(f, "Failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema)]
pub struct JobCondition {
    #[serde(rename = "type")]
    pub condition_type: ConditionType,

    pub status: ConditionStatus,

    /// Short machine-readable reason for the last transition
    pub reason: String,

    /// Human-readable message describing the condition
    pub message: String,

    /// Updated on every write to this condition
    #[serde(rename = "lastUpdateTime", skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<String>,

    /// Updated only when the status field actually changes
    #[serde(rename = "lastTransitionTime", skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, JsonSchema)]
pub struct TrainJobStatus {
    /// Pod counters per role group
    #[serde(rename = "replicaStatuses", default)]
    pub replica_statuses: BTreeMap<RoleType, ReplicaStatus>,

    /// Ordered condition history; terminal conditions are never removed
    #[serde(default)]
    pub conditions: Vec<JobCondition>,

    /// When the job was first observed
    #[serde(rename = "startTime", skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,

    /// When the job first reached a terminal condition
    #[serde(rename = "completionTime", skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Created,
    Running,
    Restarting,
    Succeeded,
    Failed,
}

impl TrainJobStatus {
    /// Whether a condition of the given type currently has status True.
    pub fn condition_is_true(&self, condition_type: ConditionType) -> bool {
        self.conditions
            .iter()
            .any(|c| c.condition_type == condition_type && c.status == ConditionStatus::True)
    }

    /// Job phase derived from the condition ledger, so phase and conditions
    /// can never disagree. Terminal conditions win over Restarting/Running.
    pub fn phase(&self) -> JobPhase {
        if self.condition_is_true(ConditionType::Failed) {
            JobPhase::Failed
        } else if self.condition_is_true(ConditionType::Succeeded) {
            JobPhase::Succeeded
        } else if self.condition_is_true(ConditionType::Restarting) {
            JobPhase::Restarting
        } else if self.condition_is_true(ConditionType::Running) {
            JobPhase::Running
        } else {
            JobPhase::Created
        }
    }
}
