use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{error, warn};

pub const DEFAULT_WORKER_LIMIT: usize = 8;

/// Bounded pool for command jobs. Each job runs in its own task under a
/// supervisor, so a panicking command is logged instead of taking the
/// server down.
#[derive(Clone, Debug)]
pub struct CommandWorkers {
    permits: Arc<Semaphore>,
    limit: usize,
}

impl Default for CommandWorkers {
    fn default() -> Self {
        Self::new(DEFAULT_WORKER_LIMIT)
    }
}

impl CommandWorkers {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self { permits: Arc::new(Semaphore::new(limit)), limit }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Queues `job` behind the concurrency limit. The returned handle
    /// completes once the job has finished or failed; dropping it detaches.
    pub fn spawn<F>(&self, label: impl Into<String>, job: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permits = self.permits.clone();
        let label = label.into();

        tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                warn!(event_name = "workers.closed", job = %label, "worker pool closed");
                return;
            };

            if let Err(join_error) = tokio::spawn(job).await {
                if join_error.is_panic() {
                    error!(event_name = "workers.job_panicked", job = %label, "job panicked");
                } else {
                    warn!(event_name = "workers.job_cancelled", job = %label, "job cancelled");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::CommandWorkers;

    #[tokio::test]
    async fn panicking_job_is_contained() {
        let workers = CommandWorkers::new(2);

        let handle = workers.spawn("boom", async { panic!("command blew up") });
        handle.await.expect("supervisor survives the panic");

        let ran = Arc::new(AtomicUsize::new(0));
        let counter = ran.clone();
        workers
            .spawn("after", async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .expect("join");
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(workers.available(), 2);
    }

    #[tokio::test]
    async fn concurrency_never_exceeds_limit() {
        let workers = CommandWorkers::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles = (0..6)
            .map(|index| {
                let running = running.clone();
                let peak = peak.clone();
                workers.spawn(format!("job-{index}"), async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect::<Vec<_>>();

        for handle in handles {
            handle.await.expect("join");
        }
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn zero_limit_is_raised_to_one() {
        assert_eq!(CommandWorkers::new(0).limit(), 1);
    }
}
