//! Unified error taxonomy for the execution core (§7, §4.11 of the design).

use actix_web::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GradingError {
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("failed to create temp workspace: {0}")]
    TempWorkspace(String),

    #[error("failed to create container: {0}")]
    ContainerCreate(String),

    #[error("failed to start container: {0}")]
    ContainerStart(String),

    #[error("failed to fetch container logs: {0}")]
    LogsUnavailable(String),

    #[error("failed to remove container: {0}")]
    ContainerRemove(String),

    #[error("admission to the execution pool was cancelled")]
    AdmissionCancelled,

    #[error("failed to clone repository: {0}")]
    CloneFailed(String),

    #[error("failed to parse test-runner summary")]
    SummaryParseFailed,

    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl GradingError {
    /// Maps a failure mode onto the HTTP status the whole submission should carry.
    ///
    /// Per-test-case failures (non-zero exit, timeout) never reach this path — they're
    /// captured on the `TestCaseResult` instead. Only failures that abort the submission
    /// outright are classified here, and they are always infrastructure-shaped (500),
    /// except a malformed request, which the HTTP layer rejects before grading starts.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GradingError::UnsupportedLanguage(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// A single container run's terminal outcome, distinct from `GradingError`: a timeout is
/// an expected result carried on `RunStats`, not a hard error that aborts grading.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to create container: {0}")]
    ContainerCreate(String),
    #[error("failed to start container: {0}")]
    ContainerStart(String),
    #[error("failed to fetch container logs: {0}")]
    LogsUnavailable(String),
    #[error("container exited with non-zero status: {0}")]
    NonZeroExit(i64),
    #[error("admission was cancelled")]
    Cancelled,
}

impl From<RunError> for GradingError {
    fn from(e: RunError) -> Self {
        match e {
            RunError::ContainerCreate(m) => GradingError::ContainerCreate(m),
            RunError::ContainerStart(m) => GradingError::ContainerStart(m),
            RunError::LogsUnavailable(m) => GradingError::LogsUnavailable(m),
            RunError::NonZeroExit(code) => {
                GradingError::Infrastructure(format!("non-zero exit: {}", code))
            }
            RunError::Cancelled => GradingError::AdmissionCancelled,
        }
    }
}
