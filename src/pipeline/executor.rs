//! Bounded executor for blocking parse work.
//!
//! Caps how many blocking operations run at once. Callers `submit` a
//! closure; it waits (without holding a thread) for a slot on a FIFO
//! semaphore, then runs on tokio's blocking pool. The owned permit travels
//! into the blocking closure, so a slot frees only when the operation has
//! actually returned, even if the awaiting future was dropped.

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tokio::sync::Semaphore;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Executor capacity must be at least 1")]
    InvalidCapacity,

    #[error("Executor closed")]
    Closed,

    #[error("Blocking operation '{label}' panicked")]
    Panicked { label: &'static str },
}

/// Counting-semaphore gate in front of `spawn_blocking`.
///
/// Cloning shares the same slots; one executor bounds the whole process.
#[derive(Debug, Clone)]
pub struct BoundedExecutor {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl BoundedExecutor {
    pub fn new(capacity: usize) -> Result<Self, ExecutorError> {
        if capacity == 0 {
            return Err(ExecutorError::InvalidCapacity);
        }
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Operations currently holding a slot.
    pub fn active(&self) -> usize {
        self.capacity - self.available()
    }

    /// Run `op` on the blocking pool once a slot is free and return its value.
    ///
    /// The value is handed back untouched: an `op` returning `Result` keeps its
    /// own error. Only a panic inside `op` becomes an `ExecutorError`.
    pub async fn submit<F, T>(&self, label: &'static str, op: F) -> Result<T, ExecutorError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let start = Instant::now();
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| ExecutorError::Closed)?;

        tracing::debug!(
            op = label,
            active = self.active(),
            capacity = self.capacity,
            "[EXECUTOR] +1 active"
        );

        let semaphore = Arc::clone(&self.semaphore);
        let capacity = self.capacity;
        let joined = tokio::task::spawn_blocking(move || {
            let _slot = permit;
            op()
        })
        .await;

        tracing::debug!(
            op = label,
            active = capacity - semaphore.available_permits(),
            capacity,
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "[EXECUTOR] -1 active"
        );

        match joined {
            Ok(value) => Ok(value),
            Err(e) => {
                tracing::error!(op = label, error = %e, "[EXECUTOR] Blocking operation failed");
                Err(ExecutorError::Panicked { label })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn zero_capacity_rejected() {
        assert!(matches!(BoundedExecutor::new(0), Err(ExecutorError::InvalidCapacity)));
    }

    #[tokio::test]
    async fn returns_operation_value() {
        let executor = BoundedExecutor::new(2).unwrap();
        let value = executor.submit("add", || 40 + 2).await.unwrap();
        assert_eq!(value, 42);
        assert_eq!(executor.active(), 0);
    }

    #[tokio::test]
    async fn operation_error_propagates_unchanged() {
        let executor = BoundedExecutor::new(1).unwrap();
        let result: Result<Result<(), String>, ExecutorError> =
            executor.submit("fail", || Err("boom".to_string())).await;
        assert_eq!(result.unwrap(), Err("boom".to_string()));
        assert_eq!(executor.available(), 1, "slot released after failure");
    }

    #[tokio::test]
    async fn panic_releases_slot() {
        let executor = BoundedExecutor::new(1).unwrap();
        let result = executor.submit("explode", || -> u32 { panic!("parser bug") }).await;
        assert!(matches!(result, Err(ExecutorError::Panicked { label: "explode" })));
        assert_eq!(executor.available(), 1);

        let after = executor.submit("after", || 1).await.unwrap();
        assert_eq!(after, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn never_exceeds_capacity() {
        let executor = BoundedExecutor::new(3).unwrap();
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks = (0..12).map(|_| {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            let executor = executor.clone();
            async move {
                executor
                    .submit("sleep", move || {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        std::thread::sleep(Duration::from_millis(20));
                        running.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await
            }
        });
        let results = futures_util::future::join_all(tasks).await;

        assert!(results.iter().all(|r| r.is_ok()));
        let observed = peak.load(Ordering::SeqCst);
        assert!(observed <= 3, "peak {observed} exceeded capacity");
        assert!(observed >= 2, "expected real overlap, got {observed}");
        assert_eq!(executor.active(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn occupancy_visible_while_running() {
        let executor = BoundedExecutor::new(2).unwrap();
        let (started_tx, started_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

        let background = executor.clone();
        let handle = tokio::spawn(async move {
            background
                .submit("hold", move || {
                    started_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                })
                .await
        });

        tokio::task::spawn_blocking(move || started_rx.recv().unwrap())
            .await
            .unwrap();
        assert_eq!(executor.active(), 1);
        assert_eq!(executor.available(), 1);

        release_tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
        assert_eq!(executor.active(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn dropped_waiter_keeps_slot_until_op_finishes() {
        let executor = BoundedExecutor::new(1).unwrap();
        let (started_tx, started_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

        let background = executor.clone();
        let handle = tokio::spawn(async move {
            background
                .submit("hold", move || {
                    started_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                })
                .await
        });
        tokio::task::spawn_blocking(move || started_rx.recv().unwrap())
            .await
            .unwrap();

        handle.abort();
        let _ = handle.await;
        assert_eq!(executor.active(), 1, "blocking op still owns its slot");

        release_tx.send(()).unwrap();
        let value = executor.submit("next", || 7).await.unwrap();
        assert_eq!(value, 7);
    }
}
