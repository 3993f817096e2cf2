//! Gang-scheduling admission boundary.
//!
//! The gang scheduler itself is an external collaborator; the operator only
//! consumes its completion signal. A gated role is considered complete once
//! the scheduler attests that all co-scheduled replicas reached a terminal
//! state together.

use async_trait::async_trait;
use kube::{api::Api, Client, CustomResource};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[async_trait]
pub trait GangAdmission: Send + Sync {
    /// Whether the co-scheduled group for the job has completed.
    async fn group_completed(&self, namespace: &str, job_name: &str) -> Result<bool>;
}

/// Gang scheduling disabled: completion is never attested externally, so
/// gated roles fall back to their own replica counters.
pub struct DisabledGangAdmission;

#[async_trait]
impl GangAdmission for DisabledGangAdmission {
    async fn group_completed(&self, _namespace: &str, _job_name: &str) -> Result<bool> {
        Ok(false)
    }
}

/// Partial view of the gang scheduler's PodGroup resource; only the status
/// phase is read.
#[derive(CustomResource, Debug, Serialize, Deserialize, Clone, JsonSchema)]
#[kube(
    group = "scheduling.volcano.sh",
    version = "v1beta1",
    kind = "PodGroup",
    namespaced,
    status = "PodGroupStatus"
)]
pub struct PodGroupSpec {
    /// Minimum number of members the scheduler admits together
    #[serde(rename = "minMember", default)]
    pub min_member: i32,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, JsonSchema)]
pub struct PodGroupStatus {
    #[serde(default)]
    pub phase: String,
}

/// Reads the PodGroup named after the job from the job's namespace.
pub struct PodGroupGangAdmission {
    client: Client,
}

impl PodGroupGangAdmission {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl GangAdmission for PodGroupGangAdmission {
    async fn group_completed(&self, namespace: &str, job_name: &str) -> Result<bool> {
        let api: Api<PodGroup> = Api::namespaced(self.client.clone(), namespace);
        let pod_group = api
            .get_opt(job_name)
            .await
            .map_err(|e| Error::Kubernetes(e.to_string()))?;
        Ok(pod_group
            .and_then(|pg| pg.status)
            .map(|status| status.phase == "Completed")
            .unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_gang_never_attests() {
        let gang = DisabledGangAdmission;
        assert!(!gang.group_completed("default", "job").await.unwrap());
    }
}
