//! Bounded worker pool decoupling front ends from the blocking pipeline.

use anyhow::{anyhow, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Fixed-capacity job pool. Each submitted job holds one permit for its
/// whole run; callers await the returned handle for the result. No
/// cancellation and no per-job timeout — a stalled job occupies its slot,
/// the rest of the pool stays usable.
#[derive(Clone)]
pub struct JobPool {
    permits: Arc<Semaphore>,
}

impl JobPool {
    pub fn new(size: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(size.max(1))),
        }
    }

    pub fn submit<F, T>(&self, job: F) -> JoinHandle<Result<T>>
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let permits = self.permits.clone();
        tokio::spawn(async move {
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|_| anyhow!("worker pool is closed"))?;
            job.await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn jobs_complete_and_return_results() {
        let pool = JobPool::new(2);
        let first = pool.submit(async { Ok(1usize) });
        let second = pool.submit(async { Ok(2usize) });
        assert_eq!(first.await.unwrap().unwrap(), 1);
        assert_eq!(second.await.unwrap().unwrap(), 2);
    }

    #[tokio::test]
    async fn single_slot_pool_serializes_jobs() {
        let pool = JobPool::new(1);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let running = running.clone();
            let peak = peak.clone();
            handles.push(pool.submit(async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn job_errors_propagate_to_the_handle() {
        let pool = JobPool::new(1);
        let handle = pool.submit(async { Err::<(), _>(anyhow!("boom")) });
        let err = handle.await.unwrap().unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }
}
