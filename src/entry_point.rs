//! C4.9 — entry-point identification, kept behind a trait so the AI-assisted oracle this
//! product depends on stays a pluggable, externally-owned concern (§4.9).

use async_trait::async_trait;

/// Identifies the function a submission's test driver should invoke. Implementations are
/// free to call out to an external model; callers never assume the answer is trustworthy
/// and always fall back to `"main"` on error or an empty result.
#[async_trait]
pub trait EntryPointOracle: Send + Sync {
    async fn identify(&self, source: &str) -> Result<String, String>;
}

/// The name substituted whenever an oracle fails, times out, or returns nothing useful.
pub const FALLBACK_ENTRY_POINT: &str = "main";

/// An oracle with no external model wired up. Always reports failure, which pushes every
/// caller onto the `main` fallback — useful in tests and as a safe default before a real
/// oracle is configured.
pub struct NullOracle;

#[async_trait]
impl EntryPointOracle for NullOracle {
    async fn identify(&self, _source: &str) -> Result<String, String> {
        Err("no entry-point oracle configured".to_string())
    }
}

/// Soft budget allotted to the oracle before its answer is discarded.
const ORACLE_BUDGET: std::time::Duration = std::time::Duration::from_secs(1);

/// Resolves the effective entry point: asks `oracle` (dropping it if it doesn't answer
/// within the soft budget), trims the answer, and substitutes the fallback if the oracle
/// errored, timed out, or the trimmed answer is empty.
pub async fn resolve(oracle: &dyn EntryPointOracle, source: &str) -> String {
    let outcome = tokio::time::timeout(ORACLE_BUDGET, oracle.identify(source)).await;
    match outcome {
        Ok(Ok(name)) => {
            let trimmed = name.trim();
            if trimmed.is_empty() {
                FALLBACK_ENTRY_POINT.to_string()
            } else {
                trimmed.to_string()
            }
        }
        Ok(Err(e)) => {
            log::warn!("entry-point oracle failed, falling back to main: {}", e);
            FALLBACK_ENTRY_POINT.to_string()
        }
        Err(_) => {
            log::warn!("entry-point oracle exceeded its soft budget, falling back to main");
            FALLBACK_ENTRY_POINT.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubOracle(Result<&'static str, &'static str>);

    #[async_trait]
    impl EntryPointOracle for StubOracle {
        async fn identify(&self, _source: &str) -> Result<String, String> {
            self.0.map(|s| s.to_string()).map_err(|e| e.to_string())
        }
    }

    #[tokio::test]
    async fn resolves_to_oracle_answer_when_successful() {
        let oracle = StubOracle(Ok("solve"));
        assert_eq!(resolve(&oracle, "code").await, "solve");
    }

    #[tokio::test]
    async fn falls_back_to_main_on_error() {
        let oracle = StubOracle(Err("rate limited"));
        assert_eq!(resolve(&oracle, "code").await, "main");
    }

    #[tokio::test]
    async fn falls_back_to_main_on_empty_answer() {
        let oracle = StubOracle(Ok("   "));
        assert_eq!(resolve(&oracle, "code").await, "main");
    }

    #[tokio::test]
    async fn null_oracle_always_falls_back() {
        assert_eq!(resolve(&NullOracle, "code").await, "main");
    }
}
