use super::round_to;
use std::time::Duration;
use sysinfo::{CpuExt, System, SystemExt};
use tokio::task::JoinHandle;
use tokio::time;

/// Starts measuring overall CPU load over `interval` in the background.
/// Await the handle to get the percentage (0..100).
pub fn spawn_sampler(interval: Duration) -> JoinHandle<f64> {
    tokio::spawn(async move {
        let mut system = System::new();
        system.refresh_cpu();
        time::sleep(interval).await;
        system.refresh_cpu();
        let usage = system.global_cpu_info().cpu_usage() as f64;
        if usage.is_finite() {
            round_to(usage, 1)
        } else {
            0.0
        }
    })
}
