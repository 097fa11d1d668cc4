// Local crates
use crate::entrypoint::context::InvocationContext;
use crate::metrics::metrics::{MEMORY_BYTES, MEMORY_DELTA_BYTES};

// External crates
use std::future::Future;
use sysinfo::{Pid, ProcessesToUpdate, System};

/// Samples the resident memory of the current process.
#[derive(Debug)]
pub struct MemorySampler {
    system: System,
    pid: Option<Pid>,
}

impl MemorySampler {
    pub fn new() -> Self {
        Self {
            system: System::new(),
            pid: sysinfo::get_current_pid().ok(),
        }
    }

    /// Resident set size in bytes, `0` when the platform cannot tell.
    pub fn resident_bytes(&mut self) -> u64 {
        let Some(pid) = self.pid else {
            return 0;
        };
        self.system
            .refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        self.system
            .process(pid)
            .map(|process| process.memory())
            .unwrap_or(0)
    }
}

impl Default for MemorySampler {
    fn default() -> Self {
        Self::new()
    }
}

/// Run `work`, and when the invocation asked for leak detection, log how
/// much resident memory it left behind.
pub async fn with_leak_detection<F, T>(ctx: &InvocationContext, label: &str, work: F) -> T
where
    F: Future<Output = T>,
{
    if !ctx.detect_memory_leaks {
        return work.await;
    }

    let mut sampler = MemorySampler::new();
    let before = sampler.resident_bytes();
    tracing::info!("Memory leak detection enabled for {label}, resident memory: {before} bytes");

    let output = work.await;

    let after = sampler.resident_bytes();
    let delta = after as i64 - before as i64;
    MEMORY_BYTES.set(after as f64);
    MEMORY_DELTA_BYTES.set(delta as f64);
    tracing::info!(
        before_bytes = before,
        after_bytes = after,
        "Memory leak detection for {label} finished, resident memory grew by {delta} bytes"
    );

    output
}
