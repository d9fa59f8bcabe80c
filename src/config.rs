//! Process-wide configuration, loaded once at startup from the environment.

use std::env;

/// Default time limit applied when a test case omits or misspecifies one (ms).
pub const DEFAULT_TIME_LIMIT_MS: i64 = 2_000;
/// Upper bound a test case's time limit is clamped to (ms).
pub const MAX_TIME_LIMIT_MS: i64 = 10_000;
/// Default memory limit applied when a test case omits or misspecifies one (MB).
pub const DEFAULT_MEMORY_LIMIT_MB: i64 = 128;
/// Upper bound a test case's memory limit is clamped to (MB).
pub const MAX_MEMORY_LIMIT_MB: i64 = 512;

/// Outer deadline for a whole code-mode submission.
pub const CODE_MODE_BUDGET_SECS: u64 = 60;
/// Outer deadline for a whole repo-mode grading run.
pub const REPO_MODE_BUDGET_SECS: u64 = 120;

#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of containers that may run concurrently.
    pub admission_pool_size: usize,
    /// Address the HTTP shell binds to.
    pub bind_addr: String,
    /// Fallback GitHub token used when a repo-mode request doesn't carry its own.
    pub github_access_token: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        let admission_pool_size = env::var("ADMISSION_POOL_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|&n: &usize| n > 0)
            .unwrap_or(5);

        let port = env::var("PORT").unwrap_or_else(|_| "8000".to_string());
        let bind_addr =
            env::var("BIND_ADDR").unwrap_or_else(|_| format!("0.0.0.0:{}", port));

        let github_access_token = env::var("GITHUB_ACCESS_TOKEN").ok();

        Self {
            admission_pool_size,
            bind_addr,
            github_access_token,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            admission_pool_size: 5,
            bind_addr: "0.0.0.0:8000".to_string(),
            github_access_token: None,
        }
    }
}

/// Clamp a test case's time limit to `[1, MAX_TIME_LIMIT_MS]`, substituting the default
/// for any value outside that range (including zero and negative values).
pub fn coerce_time_limit_ms(value: i64) -> i64 {
    if value <= 0 || value > MAX_TIME_LIMIT_MS {
        DEFAULT_TIME_LIMIT_MS
    } else {
        value
    }
}

/// Clamp a test case's memory limit to `[1, MAX_MEMORY_LIMIT_MB]`, substituting the default
/// for any value outside that range.
pub fn coerce_memory_limit_mb(value: i64) -> i64 {
    if value <= 0 || value > MAX_MEMORY_LIMIT_MB {
        DEFAULT_MEMORY_LIMIT_MB
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_limit_within_range_is_kept() {
        assert_eq!(coerce_time_limit_ms(1), 1);
        assert_eq!(coerce_time_limit_ms(10_000), 10_000);
    }

    #[test]
    fn time_limit_out_of_range_falls_back_to_default() {
        assert_eq!(coerce_time_limit_ms(0), DEFAULT_TIME_LIMIT_MS);
        assert_eq!(coerce_time_limit_ms(-5), DEFAULT_TIME_LIMIT_MS);
        assert_eq!(coerce_time_limit_ms(10_001), DEFAULT_TIME_LIMIT_MS);
    }

    #[test]
    fn memory_limit_out_of_range_falls_back_to_default() {
        assert_eq!(coerce_memory_limit_mb(0), DEFAULT_MEMORY_LIMIT_MB);
        assert_eq!(coerce_memory_limit_mb(513), DEFAULT_MEMORY_LIMIT_MB);
        assert_eq!(coerce_memory_limit_mb(512), 512);
    }

    #[test]
    fn default_config_has_pool_size_five() {
        assert_eq!(Config::default().admission_pool_size, 5);
    }
}
