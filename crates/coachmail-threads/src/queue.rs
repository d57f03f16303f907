// SPDX-FileCopyrightText: 2026 Coachmail Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Serialized intake queue.
//!
//! Every private-message event that could trigger thread creation goes
//! through here, and the single worker drains one job to completion before
//! starting the next. Two DMs racing the "any open thread for this user?"
//! check therefore can never both observe no thread and both create one.
//! Survey cancel actions ride the same queue to preserve total ordering
//! with creation. Nothing else does.

use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::warn;

type Job = BoxFuture<'static, ()>;

/// Single-consumer work queue with one spawned worker task.
pub struct IntakeQueue {
    tx: mpsc::UnboundedSender<Job>,
}

impl IntakeQueue {
    /// Create the queue and spawn its worker. Must be called inside a tokio
    /// runtime.
    pub fn spawn() -> Arc<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                job.await;
            }
        });
        Arc::new(Self { tx })
    }

    /// Enqueue a job. Jobs run in push order, one at a time. Safe to call
    /// from inside a running job; the new job is appended, not awaited.
    pub fn push<F>(&self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.tx.send(Box::pin(job)).is_err() {
            warn!("intake queue worker is gone; dropping job");
        }
    }

    /// Wait until every job pushed before this call has completed.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        self.push(async move {
            let _ = done_tx.send(());
        });
        let _ = done_rx.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    #[tokio::test]
    async fn jobs_run_in_push_order() {
        let queue = IntakeQueue::spawn();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..10 {
            let order = order.clone();
            queue.push(async move {
                order.lock().await.push(i);
            });
        }
        queue.flush().await;

        let recorded = order.lock().await.clone();
        assert_eq!(recorded, (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn a_slow_job_blocks_later_jobs() {
        let queue = IntakeQueue::spawn();
        let counter = Arc::new(AtomicUsize::new(0));

        let observed_during_slow = Arc::new(AtomicUsize::new(usize::MAX));
        {
            let counter = counter.clone();
            let observed = observed_during_slow.clone();
            queue.push(async move {
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                observed.store(counter.load(Ordering::SeqCst), Ordering::SeqCst);
            });
        }
        {
            let counter = counter.clone();
            queue.push(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        queue.flush().await;

        // The second job must not have run while the first was sleeping.
        assert_eq!(observed_during_slow.load(Ordering::SeqCst), 0);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn pushing_from_inside_a_job_does_not_deadlock() {
        let queue = IntakeQueue::spawn();
        let hit = Arc::new(AtomicUsize::new(0));

        {
            let queue_inner = queue.clone();
            let hit = hit.clone();
            queue.push(async move {
                let hit = hit.clone();
                queue_inner.push(async move {
                    hit.fetch_add(1, Ordering::SeqCst);
                });
            });
        }
        queue.flush().await;
        // flush was pushed after the outer job but before the inner one ran;
        // flush again to drain the nested push.
        queue.flush().await;

        assert_eq!(hit.load(Ordering::SeqCst), 1);
    }
}
