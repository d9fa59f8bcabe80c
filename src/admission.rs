//! C6 — bounded counting semaphore gating concurrent container executions (§4.6).

use std::sync::Arc;
use tokio::sync::{Semaphore, SemaphorePermit};

use crate::error::RunError;

/// Process-wide gate on the number of containers that may run at once. `N` is fixed at
/// construction; acquiring a permit is the only way to hold a slot, and dropping the
/// permit is the only way to release one — that mapping is enforced by the borrow
/// checker, not by a manual release call.
pub struct AdmissionPool {
    semaphore: Semaphore,
}

impl AdmissionPool {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            semaphore: Semaphore::new(capacity),
        })
    }

    /// Acquires a slot, or fails with `Cancelled` if the given future is raced against a
    /// cancellation signal by the caller (the caller drives cancellation; this just
    /// exposes a cancellable acquire via `tokio::select!` at the call site).
    pub async fn acquire(&self) -> Result<SemaphorePermit<'_>, RunError> {
        self.semaphore
            .acquire()
            .await
            .map_err(|_| RunError::Cancelled)
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_reduces_and_release_restores_available_permits() {
        let pool = AdmissionPool::new(2);
        assert_eq!(pool.available_permits(), 2);

        let permit = pool.acquire().await.unwrap();
        assert_eq!(pool.available_permits(), 1);

        drop(permit);
        assert_eq!(pool.available_permits(), 2);
    }

    #[tokio::test]
    async fn pool_bounds_concurrent_holders_to_capacity() {
        let pool = AdmissionPool::new(1);
        let _first = pool.acquire().await.unwrap();

        let second = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            pool.acquire(),
        )
        .await;
        assert!(second.is_err(), "second acquire should block while capacity is exhausted");
    }
}
