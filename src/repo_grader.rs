//! C8 — repo-mode grading: clone, inject a test file, run install/test containers, and
//! parse the test runner's summary (§4.8).

use std::path::Path;

use bollard::container::{
    Config, CreateContainerOptions, RemoveContainerOptions, StartContainerOptions,
    WaitContainerOptions,
};
use bollard::models::HostConfig;
use bollard::Docker;
use futures_util::StreamExt;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::GradingError;
use crate::workspace;

#[derive(Debug, Clone)]
pub struct RepoVerdict {
    pub http_status: u16,
    pub passed_count: i64,
    pub failed_count: i64,
    pub score_percent: i64,
    pub passed_all: bool,
}

static SUMMARY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Tests:\s+(?:(\d+)\s+failed,\s+)?(\d+)\s+passed(?:,\s+(\d+)\s+total)?")
        .expect("summary regex is valid")
});

pub struct RepoGrader {
    docker: Docker,
}

impl RepoGrader {
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    pub async fn grade(
        &self,
        repository_url: &str,
        test_file_bytes: &[u8],
        github_access_token: Option<&str>,
    ) -> Result<RepoVerdict, GradingError> {
        let repo_dir = workspace::create_dir()?;

        let clone_result = self
            .clone_repository(repository_url, &repo_dir, github_access_token)
            .await;
        if let Err(e) = clone_result {
            workspace::cleanup(&repo_dir);
            return Err(e);
        }

        let test_file_name = format!("contestifyJestTest{}.test.js", rand::random::<u32>());
        let test_file_path = repo_dir.join(&test_file_name);
        std::fs::write(&test_file_path, test_file_bytes).map_err(|e| {
            GradingError::TempWorkspace(format!("failed to write test file: {}", e))
        })?;

        let run_result = self.run_phases(&repo_dir, &test_file_name).await;
        workspace::cleanup(&repo_dir);

        let combined_output = run_result?;
        Ok(Self::parse_summary(&combined_output))
    }

    async fn clone_repository(
        &self,
        repository_url: &str,
        dest: &Path,
        github_access_token: Option<&str>,
    ) -> Result<(), GradingError> {
        let mut callbacks = git2::RemoteCallbacks::new();
        if let Some(token) = github_access_token {
            let token = token.to_string();
            callbacks.credentials(move |_url, _username, _allowed| {
                git2::Cred::userpass_plaintext("x", &token)
            });
        }

        let mut fetch_options = git2::FetchOptions::new();
        fetch_options.remote_callbacks(callbacks);

        git2::build::RepoBuilder::new()
            .fetch_options(fetch_options)
            .clone(repository_url, dest)
            .map_err(|e| GradingError::CloneFailed(e.to_string()))?;

        Ok(())
    }

    /// Phase 1 installs dependencies with network access; phase 2 runs the test driver
    /// with network disabled. Combined stdout+stderr of phase 2 is returned for parsing.
    async fn run_phases(
        &self,
        repo_dir: &Path,
        test_file_name: &str,
    ) -> Result<String, GradingError> {
        let host_dir = repo_dir.to_string_lossy().to_string();

        self.run_phase(
            &host_dir,
            vec![
                "/bin/sh".to_string(),
                "-c".to_string(),
                "npm install".to_string(),
            ],
            true,
        )
        .await?;

        self.run_phase(
            &host_dir,
            vec![
                "/bin/sh".to_string(),
                "-c".to_string(),
                format!("npx jest {}", test_file_name),
            ],
            false,
        )
        .await
    }

    async fn run_phase(
        &self,
        host_dir: &str,
        command: Vec<String>,
        network_enabled: bool,
    ) -> Result<String, GradingError> {
        let container_name = format!("contestify-repo-{}", uuid::Uuid::new_v4());
        let network_mode = if network_enabled { "bridge" } else { "none" };

        let config = Config {
            image: Some("node:14".to_string()),
            cmd: Some(command),
            working_dir: Some("/app".to_string()),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            host_config: Some(HostConfig {
                binds: Some(vec![format!("{}:/app", host_dir)]),
                network_mode: Some(network_mode.to_string()),
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
            .map_err(|e| GradingError::ContainerCreate(e.to_string()))?;

        let run_result = self.run_created_phase(&container.id).await;

        let remove_options = Some(RemoveContainerOptions {
            force: true,
            ..Default::default()
        });
        if let Err(e) = self.docker.remove_container(&container.id, remove_options).await {
            log::warn!("failed to remove repo-grading container: {}", e);
        }

        run_result
    }

    /// Starts an already-created container and collects its combined output. Split out
    /// from `run_phase` so a start/wait/logs failure can propagate through `?` while the
    /// caller still always reaches the removal step.
    async fn run_created_phase(&self, container_id: &str) -> Result<String, GradingError> {
        self.docker
            .start_container(container_id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| GradingError::ContainerStart(e.to_string()))?;

        let wait_options = Some(WaitContainerOptions {
            condition: "not-running",
        });
        let mut wait_stream = self.docker.wait_container(container_id, wait_options);
        // Exit code 1 is expected from a failing test run; only transport-level errors
        // surface here.
        let _ = wait_stream.next().await;

        let logs_options = Some(bollard::container::LogsOptions::<String> {
            stdout: true,
            stderr: true,
            ..Default::default()
        });
        let mut logs_stream = self.docker.logs(container_id, logs_options);
        let mut output = String::new();
        while let Some(chunk) = logs_stream.next().await {
            match chunk {
                Ok(bollard::container::LogOutput::StdOut { message })
                | Ok(bollard::container::LogOutput::StdErr { message }) => {
                    output.push_str(&String::from_utf8_lossy(&message));
                }
                _ => break,
            }
        }

        Ok(output)
    }

    fn parse_summary(output: &str) -> RepoVerdict {
        let Some(captures) = SUMMARY_RE.captures(output) else {
            log::warn!("repo grading: no match for test-runner summary");
            return RepoVerdict {
                http_status: 200,
                passed_count: 0,
                failed_count: 0,
                score_percent: 0,
                passed_all: false,
            };
        };

        let failed: i64 = captures
            .get(1)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0);
        let passed: i64 = captures
            .get(2)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0);
        let total: Option<i64> = captures.get(3).and_then(|m| m.as_str().parse().ok());

        if let Some(total) = total {
            if total != passed + failed {
                log::warn!(
                    "repo grading: summary total {} disagrees with passed+failed {}",
                    total,
                    passed + failed
                );
            }
        }

        let denom = passed + failed;
        let score_percent = if denom == 0 { 0 } else { passed * 100 / denom };
        let passed_all = failed == 0 && passed > 0;

        RepoVerdict {
            http_status: 200,
            passed_count: passed,
            failed_count: failed,
            score_percent,
            passed_all,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_summary_line() {
        let verdict = RepoGrader::parse_summary("Tests: 2 failed, 3 passed, 5 total");
        assert_eq!(verdict.passed_count, 3);
        assert_eq!(verdict.failed_count, 2);
        assert_eq!(verdict.score_percent, 60);
        assert!(!verdict.passed_all);
    }

    #[test]
    fn parses_summary_with_no_failures() {
        let verdict = RepoGrader::parse_summary("Tests: 4 passed, 4 total");
        assert_eq!(verdict.passed_count, 4);
        assert_eq!(verdict.failed_count, 0);
        assert_eq!(verdict.score_percent, 100);
        assert!(verdict.passed_all);
    }

    #[test]
    fn unparseable_output_scores_zero_and_fails() {
        let verdict = RepoGrader::parse_summary("jest crashed before running any tests");
        assert_eq!(verdict.passed_count, 0);
        assert_eq!(verdict.failed_count, 0);
        assert_eq!(verdict.score_percent, 0);
        assert!(!verdict.passed_all);
    }

    #[test]
    fn disagreeing_total_still_scores_from_passed_plus_failed() {
        let verdict = RepoGrader::parse_summary("Tests: 1 failed, 2 passed, 10 total");
        assert_eq!(verdict.passed_count, 2);
        assert_eq!(verdict.failed_count, 1);
        assert_eq!(verdict.score_percent, 66);
    }
}
