pub mod trainjob;

pub use trainjob::{
    CleanPodPolicy, ConditionStatus, ConditionType, JobCondition, JobPhase, ReplicaSpec,
    ReplicaStatus, RestartPolicy, RoleType, TrainJob, TrainJobSpec, TrainJobStatus,
};
