pub mod conditions;
pub mod evaluate;
pub mod reconciler;
pub mod replica;

pub use conditions::{get_condition, is_failed, is_running, is_succeeded};
pub use reconciler::{reconcile_status, PodObservations};
pub use replica::PodPhase;
