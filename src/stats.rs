//! C5 — concurrent resource-stats sampling with tolerant peak tracking (§4.5).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bollard::container::StatsOptions;
use bollard::models::ContainerStatsResponse;
use bollard::Docker;
use futures_util::StreamExt;

/// Running peaks collected while a container is alive. Stored behind atomics so the
/// sampling task can update them while the container-wait future reads the finalized
/// values after both have stopped.
#[derive(Default)]
pub struct StatsHandle {
    // CPU percent scaled by 1000 to store as an integer atomic.
    peak_cpu_percent_milli: AtomicU64,
    peak_memory_bytes: AtomicU64,
}

impl StatsHandle {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn record_cpu(&self, percent: f64) {
        let milli = (percent.max(0.0) * 1000.0) as u64;
        self.peak_cpu_percent_milli.fetch_max(milli, Ordering::Relaxed);
    }

    fn record_memory(&self, bytes: u64) {
        self.peak_memory_bytes.fetch_max(bytes, Ordering::Relaxed);
    }

    pub fn peak_cpu_percent(&self) -> f64 {
        self.peak_cpu_percent_milli.load(Ordering::Relaxed) as f64 / 1000.0
    }

    pub fn peak_memory_bytes(&self) -> u64 {
        self.peak_memory_bytes.load(Ordering::Relaxed)
    }

    /// `peak / (memory_mb · 1 MiB) · 100`, finalized once sampling has stopped.
    pub fn memory_percent(&self, memory_limit_mb: i64) -> f64 {
        let limit_bytes = (memory_limit_mb.max(1) as f64) * 1024.0 * 1024.0;
        self.peak_memory_bytes() as f64 / limit_bytes * 100.0
    }
}

/// Samples `container_id`'s resource usage until `cancel` resolves, updating `handle`'s
/// peaks as samples arrive. Tolerant of a container that isn't ready to report stats yet:
/// the first sample is retried up to three times with a 200ms backoff before the
/// continuous stream is attempted.
pub async fn collect(
    docker: Docker,
    container_id: String,
    handle: Arc<StatsHandle>,
    mut cancel: tokio::sync::oneshot::Receiver<()>,
) {
    for attempt in 0..3 {
        if cancel.try_recv().is_ok() {
            return;
        }
        match first_sample(&docker, &container_id).await {
            Ok(Some(sample)) => {
                apply_sample(&handle, &sample);
                break;
            }
            Ok(None) => {}
            Err(e) => {
                log::warn!(
                    "failed to get container stats (attempt {}): {}",
                    attempt + 1,
                    e
                );
            }
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    let options = StatsOptions {
        stream: true,
        one_shot: false,
    };
    let mut stream = docker.stats(&container_id, Some(options));

    loop {
        tokio::select! {
            _ = &mut cancel => return,
            next = stream.next() => {
                match next {
                    Some(Ok(sample)) => apply_sample(&handle, &sample),
                    Some(Err(e)) => {
                        log::debug!("stats stream ended for {}: {}", container_id, e);
                        return;
                    }
                    None => return,
                }
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

async fn first_sample(
    docker: &Docker,
    container_id: &str,
) -> Result<Option<ContainerStatsResponse>, bollard::errors::Error> {
    let options = StatsOptions {
        stream: false,
        one_shot: true,
    };
    let mut stream = docker.stats(container_id, Some(options));
    match stream.next().await {
        Some(res) => res.map(Some),
        None => Ok(None),
    }
}

fn apply_sample(handle: &StatsHandle, sample: &ContainerStatsResponse) {
    if let Some(mem) = sample.memory_stats.as_ref().and_then(|m| m.usage) {
        if mem > 0 {
            handle.record_memory(mem);
        }
    }
    let cpu_percent = calculate_cpu_percent(sample);
    handle.record_cpu(cpu_percent);
}

/// `(cpu_delta / system_delta) · num_cpus · 100`, guarded against zero/missing fields and
/// capped at `num_cpus · 100` — Docker's own CPU percentage formula (§4.5).
fn calculate_cpu_percent(sample: &ContainerStatsResponse) -> f64 {
    let (Some(cpu_stats), Some(precpu_stats)) = (&sample.cpu_stats, &sample.precpu_stats) else {
        return 0.0;
    };

    let total_usage = cpu_stats
        .cpu_usage
        .as_ref()
        .and_then(|u| u.total_usage)
        .unwrap_or(0);
    let pre_total_usage = precpu_stats
        .cpu_usage
        .as_ref()
        .and_then(|u| u.total_usage)
        .unwrap_or(0);
    let system_usage = cpu_stats.system_cpu_usage.unwrap_or(0);
    let pre_system_usage = precpu_stats.system_cpu_usage.unwrap_or(0);

    if total_usage == 0 || pre_total_usage == 0 || system_usage == 0 || pre_system_usage == 0 {
        return 0.0;
    }

    let cpu_delta = total_usage as f64 - pre_total_usage as f64;
    let system_delta = system_usage as f64 - pre_system_usage as f64;
    if cpu_delta <= 0.0 || system_delta <= 0.0 {
        return 0.0;
    }

    let num_cpus = cpu_stats
        .online_cpus
        .filter(|&n| n > 0)
        .or_else(|| {
            cpu_stats
                .cpu_usage
                .as_ref()
                .and_then(|u| u.percpu_usage.as_ref())
                .map(|v| v.len() as u64)
        })
        .unwrap_or(1) as f64;

    let percent = (cpu_delta / system_delta) * num_cpus * 100.0;
    percent.min(num_cpus * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peaks_start_at_zero() {
        let handle = StatsHandle::new();
        assert_eq!(handle.peak_cpu_percent(), 0.0);
        assert_eq!(handle.peak_memory_bytes(), 0);
    }

    #[test]
    fn peaks_never_decrease() {
        let handle = StatsHandle::new();
        handle.record_cpu(40.0);
        handle.record_cpu(10.0);
        assert_eq!(handle.peak_cpu_percent(), 40.0);

        handle.record_memory(1000);
        handle.record_memory(200);
        assert_eq!(handle.peak_memory_bytes(), 1000);
    }

    #[test]
    fn memory_percent_is_relative_to_limit() {
        let handle = StatsHandle::new();
        handle.record_memory(64 * 1024 * 1024);
        assert!((handle.memory_percent(128) - 50.0).abs() < 0.01);
    }
}
