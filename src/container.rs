//! C4 — container lifecycle: create, start, race the wait against a deadline, collect
//! stats concurrently, and always remove (§4.4, §4.5).

use std::sync::Arc;
use std::time::{Duration, Instant};

use bollard::container::{
    Config, CreateContainerOptions, KillContainerOptions, LogOutput, LogsOptions,
    RemoveContainerOptions, StartContainerOptions, WaitContainerOptions,
};
use bollard::models::HostConfig;
use bollard::Docker;
use futures_util::StreamExt;

use crate::admission::AdmissionPool;
use crate::error::RunError;
use crate::stats::{self, StatsHandle};

/// One byte-for-byte specification of a single sandboxed run.
pub struct RunRequest<'a> {
    pub image: &'a str,
    pub command: Vec<String>,
    pub host_source_path: &'a str,
    pub container_source_path: &'a str,
    pub writable_mount: bool,
    pub memory_limit_mb: i64,
    pub time_limit_ms: i64,
}

/// Everything a finished (or timed-out) run produced, raw — scoring lives elsewhere.
///
/// `output` is already the combined stdout/stderr per §4.4's precedence rule: if stderr
/// is non-empty it is the returned string, else stdout. There's no independent use for
/// the two streams downstream, so only the resolved one is kept.
#[derive(Debug, Clone)]
pub struct RunStats {
    pub output: String,
    pub exit_code: i64,
    pub timed_out: bool,
    pub duration_ms: u64,
    pub peak_cpu_percent: f64,
    pub peak_memory_bytes: u64,
    pub memory_percent: f64,
}

/// Owns the Docker Engine API client and the admission pool every run is gated behind.
pub struct ContainerRunner {
    docker: Docker,
    admission: Arc<AdmissionPool>,
}

impl ContainerRunner {
    pub fn new(docker: Docker, admission: Arc<AdmissionPool>) -> Self {
        Self { docker, admission }
    }

    /// Runs one container end to end. Always removes the container before returning,
    /// even on error paths — callers never need a separate cleanup step.
    pub async fn run(&self, req: RunRequest<'_>) -> Result<RunStats, RunError> {
        let _permit = self.admission.acquire().await?;

        let container_name = format!("contestify-{}", uuid::Uuid::new_v4());
        let mount_mode = if req.writable_mount { "rw" } else { "ro" };
        let binds = vec![format!(
            "{}:{}:{}",
            req.host_source_path, req.container_source_path, mount_mode
        )];

        let config = Config {
            image: Some(req.image.to_string()),
            cmd: Some(req.command.clone()),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            host_config: Some(HostConfig {
                binds: Some(binds),
                memory: Some(req.memory_limit_mb.max(1) * 1024 * 1024),
                memory_swap: Some(-1),
                cpu_period: Some(100_000),
                cpu_quota: Some(100_000),
                network_mode: Some("none".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let create_options = CreateContainerOptions {
            name: container_name.as_str(),
            platform: None,
        };

        let container = self
            .docker
            .create_container(Some(create_options), config)
            .await
            .map_err(|e| RunError::ContainerCreate(e.to_string()))?;
        let container_id = container.id;

        let run_result = self
            .execute(&container_id, req.time_limit_ms, req.memory_limit_mb)
            .await;

        self.remove(&container_id).await;

        run_result
    }

    async fn execute(
        &self,
        container_id: &str,
        time_limit_ms: i64,
        memory_limit_mb: i64,
    ) -> Result<RunStats, RunError> {
        let start = Instant::now();

        self.docker
            .start_container(container_id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| RunError::ContainerStart(e.to_string()))?;

        let stats_handle = StatsHandle::new();
        let (cancel_tx, cancel_rx) = tokio::sync::oneshot::channel();
        let stats_task = tokio::spawn(stats::collect(
            self.docker.clone(),
            container_id.to_string(),
            stats_handle.clone(),
            cancel_rx,
        ));

        let timeout = Duration::from_millis(time_limit_ms.max(1) as u64);
        let logs_future = self.collect_logs(container_id);
        let (stdout, stderr, timed_out) = match tokio::time::timeout(timeout, logs_future).await {
            Ok((stdout, stderr)) => (stdout, stderr, false),
            Err(_) => {
                let _ = self
                    .docker
                    .kill_container(container_id, None::<KillContainerOptions<String>>)
                    .await;
                let (stdout, stderr) = self.collect_logs(container_id).await;
                (stdout, stderr, true)
            }
        };

        let exit_code = if timed_out {
            -1
        } else {
            self.wait_for_exit(container_id).await
        };

        let _ = cancel_tx.send(());
        let _ = stats_task.await;

        // §4.4: if stderr is non-empty it is the returned output, else stdout.
        let output = if !stderr.is_empty() { stderr } else { stdout };

        Ok(RunStats {
            output,
            exit_code,
            timed_out,
            duration_ms: start.elapsed().as_millis() as u64,
            peak_cpu_percent: stats_handle.peak_cpu_percent(),
            peak_memory_bytes: stats_handle.peak_memory_bytes(),
            memory_percent: stats_handle.memory_percent(memory_limit_mb),
        })
    }

    async fn collect_logs(&self, container_id: &str) -> (String, String) {
        let options = Some(LogsOptions::<String> {
            stdout: true,
            stderr: true,
            follow: true,
            ..Default::default()
        });

        let mut stream = self.docker.logs(container_id, options);
        let mut stdout = String::new();
        let mut stderr = String::new();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(LogOutput::StdOut { message }) => {
                    stdout.push_str(&String::from_utf8_lossy(&message));
                }
                Ok(LogOutput::StdErr { message }) => {
                    stderr.push_str(&String::from_utf8_lossy(&message));
                }
                Ok(_) => {}
                Err(_) => break,
            }
        }
        (stdout, stderr)
    }

    async fn wait_for_exit(&self, container_id: &str) -> i64 {
        let options = Some(WaitContainerOptions {
            condition: "not-running",
        });
        let mut stream = self.docker.wait_container(container_id, options);
        match stream.next().await {
            Some(Ok(response)) => response.status_code,
            _ => 0,
        }
    }

    async fn remove(&self, container_id: &str) {
        let options = Some(RemoveContainerOptions {
            force: true,
            ..Default::default()
        });
        if let Err(e) = self.docker.remove_container(container_id, options).await {
            log::warn!("failed to remove container {}: {}", container_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_stats_carries_raw_output_without_judging_it() {
        let stats = RunStats {
            output: "42".to_string(),
            exit_code: 0,
            timed_out: false,
            duration_ms: 10,
            peak_cpu_percent: 5.0,
            peak_memory_bytes: 1024,
            memory_percent: 1.0,
        };
        assert_eq!(stats.exit_code, 0);
        assert!(!stats.timed_out);
    }

    #[test]
    fn stderr_takes_precedence_over_stdout_when_both_are_present() {
        let stdout = "partial result".to_string();
        let stderr = "Traceback: boom".to_string();
        let output = if !stderr.is_empty() { stderr.clone() } else { stdout };
        assert_eq!(output, stderr);
    }

    #[test]
    fn stdout_is_used_when_stderr_is_empty() {
        let stdout = "42".to_string();
        let stderr = String::new();
        let output = if !stderr.is_empty() { stderr } else { stdout.clone() };
        assert_eq!(output, stdout);
    }
}
