use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::error;

use crate::errors::WorkerError;

/// Spawns one task per unit of work, letting at most `max_concurrency` of
/// them run their work at the same time.
///
/// Each task waits for an admission token before it starts working and gives
/// the token back when the work ends, even if the work panics. Spawning itself
/// is not free, unlike a plain semaphore-per-task pool: a second, larger set of
/// pending slots bounds how many tasks (and therefore how many chunks) can
/// exist at once, and [`WorkerPool::spawn`] waits for a slot. That wait pushes
/// back on whoever is feeding the pool and keeps buffered rows bounded.
pub struct WorkerPool<T> {
    admission: Arc<Semaphore>,
    pending: Arc<Semaphore>,
    tasks: JoinSet<Result<T, WorkerError>>,
}

impl<T: Send + 'static> WorkerPool<T> {
    pub fn new(max_concurrency: usize, max_pending: usize) -> Self {
        Self {
            admission: Arc::new(Semaphore::new(max_concurrency.max(1))),
            pending: Arc::new(Semaphore::new(max_pending.max(1))),
            tasks: JoinSet::new(),
        }
    }

    pub async fn spawn<F, Fut>(&mut self, work: F) -> Result<(), WorkerError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let slot = self
            .pending
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| WorkerError::PoolClosed)?;
        let admission = self.admission.clone();

        self.tasks.spawn(async move {
            let _slot = slot;
            let _token = admission
                .acquire_owned()
                .await
                .map_err(|_| WorkerError::PoolClosed)?;
            Ok(work().await)
        });
        Ok(())
    }

    /// Waits for every spawned task. A task that panicked shows up as
    /// [`WorkerError::Panicked`]; it never takes its siblings down with it.
    pub async fn join_all(&mut self) -> Vec<Result<T, WorkerError>> {
        let mut outputs = Vec::with_capacity(self.tasks.len());
        while let Some(joined) = self.tasks.join_next().await {
            let output = joined.unwrap_or_else(|e| {
                error!(error = %e, "Worker task did not complete");
                Err(WorkerError::Panicked {
                    reason: e.to_string(),
                })
            });
            outputs.push(output);
        }
        outputs
    }

    /// Tasks spawned and not yet joined.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn available_tokens(&self) -> usize {
        self.admission.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct Gauge {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Gauge {
        fn enter(&self) {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
        }

        fn exit(&self) {
            self.current.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_never_exceeds_pool_size() {
        let gauge = Arc::new(Gauge::default());
        let mut pool = WorkerPool::new(3, 64);

        for i in 0..20 {
            let gauge = gauge.clone();
            pool.spawn(move || async move {
                gauge.enter();
                tokio::time::sleep(Duration::from_millis(10)).await;
                gauge.exit();
                i
            })
            .await
            .unwrap();
        }

        let outputs = pool.join_all().await;

        assert_eq!(outputs.len(), 20);
        let peak = gauge.peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak concurrency {peak} exceeded the pool size");
        assert!(peak >= 1);
        assert_eq!(pool.available_tokens(), 3);
    }

    #[tokio::test]
    async fn test_task_is_spawned_before_token_is_available() {
        let mut pool = WorkerPool::new(1, 8);
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        pool.spawn(move || async move {
            let _ = release_rx.await;
            "first"
        })
        .await
        .unwrap();
        tokio::task::yield_now().await;
        assert_eq!(pool.available_tokens(), 0);

        // No token is free, yet spawning returns straight away.
        pool.spawn(|| async { "second" }).await.unwrap();
        assert_eq!(pool.len(), 2);

        release_tx.send(()).unwrap();
        let mut outputs: Vec<&str> = pool
            .join_all()
            .await
            .into_iter()
            .map(Result::unwrap)
            .collect();
        outputs.sort();
        assert_eq!(outputs, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_panicking_task_releases_token_and_spares_siblings() {
        let mut pool: WorkerPool<i32> = WorkerPool::new(1, 8);

        pool.spawn(|| async { panic!("bad chunk") }).await.unwrap();
        pool.spawn(|| async { 7 }).await.unwrap();

        let outputs = pool.join_all().await;

        assert_eq!(outputs.len(), 2);
        assert_eq!(
            outputs.iter().filter(|o| matches!(o, Err(WorkerError::Panicked { .. }))).count(),
            1
        );
        assert!(outputs.iter().any(|o| matches!(o, Ok(7))));
        assert_eq!(pool.available_tokens(), 1);
        assert!(pool.is_empty());
    }

    #[tokio::test]
    async fn test_pending_slots_hold_back_the_caller() {
        let mut pool = WorkerPool::new(1, 1);
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        pool.spawn(move || async move {
            let _ = release_rx.await;
        })
        .await
        .unwrap();

        let blocked = tokio::time::timeout(Duration::from_millis(50), pool.spawn(|| async {})).await;
        assert!(blocked.is_err(), "second spawn should wait for a pending slot");

        release_tx.send(()).unwrap();
        pool.join_all().await;
        pool.spawn(|| async {}).await.unwrap();
        assert_eq!(pool.join_all().await.len(), 1);
    }
}
