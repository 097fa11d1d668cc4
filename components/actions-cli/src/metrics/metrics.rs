// External crates
use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Gauge, register_counter, register_counter_vec, register_gauge,
};

lazy_static! {
    // ======== Invocation Metrics ========

    /// Sub-command dispatches started by the shell
    pub static ref INVOCATIONS_TOTAL: Counter = register_counter!(
        "datahub_actions_invocations_total",
        "Number of sub-command dispatches started by the shell"
    ).unwrap();

    /// Failed dispatches, labelled by failure kind (abort, usage, unhandled)
    pub static ref FAILED_INVOCATIONS_TOTAL: CounterVec = register_counter_vec!(
        "datahub_actions_failed_invocations_total",
        "Number of sub-command dispatches that ended in an error",
        &["kind"]
    ).unwrap();

    /// Time from process start until the sub-command is dispatched
    pub static ref STARTUP_DURATION_SECONDS: Gauge = register_gauge!(
        "datahub_actions_startup_duration_seconds",
        "Bootstrap duration before dispatch (seconds)"
    ).unwrap();

    // ======== Pipeline Metrics ========

    pub static ref RUNNING_PIPELINES: Gauge = register_gauge!(
        "datahub_actions_running_pipelines",
        "Number of action pipelines currently running"
    ).unwrap();

    // ======== Memory Leak Detection ========

    /// Resident memory in bytes at the end of a leak-detected command
    pub static ref MEMORY_BYTES: Gauge = register_gauge!(
        "datahub_actions_memory_bytes",
        "Resident memory usage in bytes after a leak-detected command"
    ).unwrap();

    pub static ref MEMORY_DELTA_BYTES: Gauge = register_gauge!(
        "datahub_actions_memory_delta_bytes",
        "Resident memory growth in bytes over a leak-detected command"
    ).unwrap();
}

/// Register every metric with the default registry so the endpoint lists
/// them even before they are first touched.
pub fn register_all() {
    lazy_static::initialize(&INVOCATIONS_TOTAL);
    lazy_static::initialize(&FAILED_INVOCATIONS_TOTAL);
    lazy_static::initialize(&STARTUP_DURATION_SECONDS);
    lazy_static::initialize(&RUNNING_PIPELINES);
    lazy_static::initialize(&MEMORY_BYTES);
    lazy_static::initialize(&MEMORY_DELTA_BYTES);
}
