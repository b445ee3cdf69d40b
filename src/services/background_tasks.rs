// Background task infrastructure
// A bounded fire-and-forget queue for side work dispatched from handlers
// (language imports on household creation) and the periodic token expiry
// sweep.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};
use tracing::{error, info, warn};

use crate::app::AppState;

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Fire-and-forget job queue with bounded concurrency. Handlers enqueue and
/// move on; at most `concurrency` jobs run at once, the rest wait in the
/// channel. A saturated channel drops the job rather than blocking a
/// request handler.
pub struct TaskQueue {
    sender: mpsc::Sender<Job>,
}

impl TaskQueue {
    pub fn new(concurrency: usize) -> Self {
        let (sender, mut receiver) = mpsc::channel::<Job>(64);
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));

        tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                let Ok(permit) = semaphore.clone().acquire_owned().await else {
                    break;
                };
                tokio::spawn(async move {
                    job.await;
                    drop(permit);
                });
            }
        });

        Self { sender }
    }

    pub fn dispatch<F>(&self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.sender.try_send(Box::pin(job)).is_err() {
            warn!("Background task queue full; dropping job");
        }
    }
}

/// Start the periodic token expiry sweep. Runs single-instance per process;
/// a missed tick is delayed, not bunched.
pub fn start_token_sweep(state: AppState) {
    let interval_secs = state.config.security.token_sweep_interval;

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(interval_secs, "Token expiry sweep scheduled");

        loop {
            interval.tick().await;
            if let Err(e) = state.token_service.sweep_expired().await {
                error!("Token expiry sweep failed: {}", e);
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_queue_runs_dispatched_jobs() {
        let queue = TaskQueue::new(2);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            let counter = counter.clone();
            queue.dispatch(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        for _ in 0..50 {
            if counter.load(Ordering::SeqCst) == 5 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("queued jobs did not complete");
    }

    #[tokio::test]
    async fn test_queue_bounds_concurrency() {
        let queue = TaskQueue::new(1);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..4 {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            let done = done.clone();
            queue.dispatch(async move {
                let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(current, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                done.fetch_add(1, Ordering::SeqCst);
            });
        }

        for _ in 0..100 {
            if done.load(Ordering::SeqCst) == 4 {
                assert_eq!(peak.load(Ordering::SeqCst), 1);
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("queued jobs did not complete");
    }
}
