//! # BackgroundExecutor
//!
//! A bounded worker pool servicing comparison-and-transition jobs off
//! the dispatch hot path (`spec.md` §4.8). Queue length and worker count
//! are fixed at startup from [`BackgroundExecutorConfig`]; submission is
//! non-blocking — a full queue drops the job and increments
//! `comparison_dropped` rather than applying backpressure to the
//! dispatcher.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::observability::{metrics, MetricsCollector};

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// A fixed-size pool of tokio tasks pulling jobs off a bounded channel.
pub struct BackgroundExecutor {
    sender: mpsc::Sender<Job>,
}

impl BackgroundExecutor {
    pub fn start(workers: usize, queue_size: usize, metrics: Arc<dyn MetricsCollector>) -> Self {
        let (sender, receiver) = mpsc::channel(queue_size);
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));

        for _ in 0..workers.max(1) {
            let receiver = receiver.clone();
            tokio::spawn(async move {
                loop {
                    let job = {
                        let mut guard = receiver.lock().await;
                        guard.recv().await
                    };
                    match job {
                        Some(job) => job.await,
                        None => break,
                    }
                }
            });
        }

        let _ = &metrics;
        Self { sender }
    }

    /// Non-blocking submission. Returns `false` (and bumps
    /// `comparison_dropped` via `metrics`) if the queue is saturated.
    pub fn submit<F>(&self, metrics: &dyn MetricsCollector, job: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match self.sender.try_send(Box::pin(job)) {
            Ok(()) => true,
            Err(_) => {
                metrics.increment_counter(metrics::COMPARISON_DROPPED, &[]);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::NoopMetricsCollector;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn submitted_jobs_run() {
        let executor = BackgroundExecutor::start(2, 16, Arc::new(NoopMetricsCollector));
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let counter = counter.clone();
            executor.submit(&NoopMetricsCollector, async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn overflow_is_dropped_not_blocked() {
        let executor = BackgroundExecutor::start(1, 1, Arc::new(NoopMetricsCollector));
        // Occupy the single worker with a slow job, fill the 1-slot queue,
        // then overflow it.
        executor.submit(&NoopMetricsCollector, async {
            tokio::time::sleep(Duration::from_millis(200)).await;
        });
        executor.submit(&NoopMetricsCollector, async {});
        let accepted = executor.submit(&NoopMetricsCollector, async {});
        assert!(!accepted);
    }
}
