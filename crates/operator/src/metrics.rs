use lazy_static::lazy_static;
use prometheus::{register_int_counter, Encoder, IntCounter, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref RECONCILE_PASSES_TOTAL: IntCounter =
        register_int_counter!(
            "trainjob_reconcile_passes_total",
            "Total number of status reconciliation passes."
        ).unwrap();
    pub static ref JOBS_SUCCEEDED_TOTAL: IntCounter =
        register_int_counter!(
            "trainjob_jobs_succeeded_total",
            "Total number of TrainJobs that reached the Succeeded condition."
        ).unwrap();
    pub static ref JOBS_FAILED_TOTAL: IntCounter =
        register_int_counter!(
            "trainjob_jobs_failed_total",
            "Total number of TrainJobs that reached the Failed condition."
        ).unwrap();
    pub static ref JOBS_RESTARTED_TOTAL: IntCounter =
        register_int_counter!(
            "trainjob_jobs_restarted_total",
            "Total number of TrainJobs that entered the Restarting condition."
        ).unwrap();
}

pub fn register_metrics() {
    REGISTRY
        .register(Box::new(RECONCILE_PASSES_TOTAL.clone()))
        .expect("Failed to register RECONCILE_PASSES_TOTAL");
    REGISTRY
        .register(Box::new(JOBS_SUCCEEDED_TOTAL.clone()))
        .expect("Failed to register JOBS_SUCCEEDED_TOTAL");
    REGISTRY
        .register(Box::new(JOBS_FAILED_TOTAL.clone()))
        .expect("Failed to register JOBS_FAILED_TOTAL");
    REGISTRY
        .register(Box::new(JOBS_RESTARTED_TOTAL.clone()))
        .expect("Failed to register JOBS_RESTARTED_TOTAL");
}

// Gather metrics for exposition on the metrics endpoint.
pub fn gather_metrics() -> String {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    encoder
        .encode(&metric_families, &mut buffer)
        .expect("Failed to encode metrics");
    String::from_utf8(buffer).expect("Failed to convert metrics to string")
}
