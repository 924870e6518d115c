/*!
 * Per-user FIFO job queues.
 *
 * Every user gets one queue, created on first use, drained by a single
 * worker task so that one user's jobs run strictly in submission order.
 * Workers of different users run in parallel, bounded by a shared
 * semaphore sized to the worker pool.
 */

use futures::future::join_all;
use log::{debug, error, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Notify, Semaphore, mpsc};
use tokio::task::JoinHandle;

use super::model::QueuedJob;
use super::runner::JobRunner;
use crate::errors::JobError;

/// Job counters of one queue
#[derive(Debug, Default)]
struct QueueCounts {
    waiting: AtomicUsize,
    active: AtomicUsize,
    delayed: AtomicUsize,
    idle: Notify,
}

impl QueueCounts {
    fn is_idle(&self) -> bool {
        self.waiting.load(Ordering::SeqCst) == 0
            && self.active.load(Ordering::SeqCst) == 0
            && self.delayed.load(Ordering::SeqCst) == 0
    }
}

/// FIFO queue of one user
#[derive(Debug)]
pub struct UserQueue {
    user_id: String,
    sender: Mutex<Option<mpsc::UnboundedSender<QueuedJob>>>,
    counts: Arc<QueueCounts>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl UserQueue {
    /// Owner of the queue
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Jobs queued and not yet picked up by the worker
    pub fn waiting_count(&self) -> usize {
        self.counts.waiting.load(Ordering::SeqCst)
    }

    /// Jobs being run (0 or 1)
    pub fn active_count(&self) -> usize {
        self.counts.active.load(Ordering::SeqCst)
    }

    /// Jobs scheduled for later
    pub fn delayed_count(&self) -> usize {
        self.counts.delayed.load(Ordering::SeqCst)
    }

    /// Whether nothing is waiting, running or scheduled
    pub fn is_idle(&self) -> bool {
        self.counts.is_idle()
    }

    /// Append a job to the queue
    pub fn push(&self, job: QueuedJob) -> Result<(), JobError> {
        let sender = self.sender.lock();
        let tx = sender
            .as_ref()
            .ok_or_else(|| JobError::Invalid(format!("queue of user {} is closed", self.user_id)))?;

        self.counts.waiting.fetch_add(1, Ordering::SeqCst);
        if tx.send(job).is_err() {
            self.counts.waiting.fetch_sub(1, Ordering::SeqCst);
            return Err(JobError::Invalid(format!(
                "worker of user {} has stopped",
                self.user_id
            )));
        }
        Ok(())
    }

    /// Append a job to the queue once `delay` has elapsed
    ///
    /// A job whose queue closes before the delay ends is dropped and its
    /// row stays `pending`.
    pub fn push_delayed(self: &Arc<Self>, job: QueuedJob, delay: Duration) {
        self.counts.delayed.fetch_add(1, Ordering::SeqCst);
        let queue = Arc::clone(self);

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.release_delayed(job);
        });
    }

    fn release_delayed(&self, job: QueuedJob) {
        let sender = self.sender.lock();
        match sender.as_ref() {
            Some(tx) => {
                // Counted as waiting before it stops counting as delayed
                self.counts.waiting.fetch_add(1, Ordering::SeqCst);
                self.counts.delayed.fetch_sub(1, Ordering::SeqCst);
                if let Err(mpsc::error::SendError(job)) = tx.send(job) {
                    self.counts.waiting.fetch_sub(1, Ordering::SeqCst);
                    warn!("Dropping delayed job {}: worker has stopped", job.job_id);
                }
            }
            None => {
                self.counts.delayed.fetch_sub(1, Ordering::SeqCst);
                warn!("Dropping delayed job {}: queue is closed", job.job_id);
            }
        }
        drop(sender);
        self.counts.idle.notify_waiters();
    }

    /// Wait until the queue has nothing waiting, running or scheduled
    pub async fn wait_until_idle(&self) {
        loop {
            let notified = self.counts.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }

    fn close(&self) -> Option<JoinHandle<()>> {
        self.sender.lock().take();
        self.worker.lock().take()
    }
}

/// Registry of user queues, keyed by user id
pub struct QueueRegistry {
    queues: Mutex<HashMap<String, Arc<UserQueue>>>,
    runner: JobRunner,
    permits: Arc<Semaphore>,
    closed: AtomicBool,
}

impl QueueRegistry {
    /// Create a registry running at most `max_concurrent_jobs` jobs at once
    pub fn new(runner: JobRunner, max_concurrent_jobs: usize) -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            runner,
            permits: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
            closed: AtomicBool::new(false),
        }
    }

    /// Get the queue of a user, creating it and its worker on first use
    pub fn get_or_create(&self, user_id: &str) -> Result<Arc<UserQueue>, JobError> {
        let mut queues = self.queues.lock();
        if self.closed.load(Ordering::SeqCst) {
            return Err(JobError::Invalid("job service is shut down".to_string()));
        }
        if let Some(queue) = queues.get(user_id) {
            return Ok(Arc::clone(queue));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let counts = Arc::new(QueueCounts::default());
        let worker = tokio::spawn(worker_loop(
            user_id.to_string(),
            rx,
            Arc::clone(&counts),
            self.runner.clone(),
            Arc::clone(&self.permits),
        ));

        let queue = Arc::new(UserQueue {
            user_id: user_id.to_string(),
            sender: Mutex::new(Some(tx)),
            counts,
            worker: Mutex::new(Some(worker)),
        });
        queues.insert(user_id.to_string(), Arc::clone(&queue));
        debug!("Created job queue for user {}", user_id);

        Ok(queue)
    }

    /// Get the queue of a user if one exists
    pub fn get(&self, user_id: &str) -> Option<Arc<UserQueue>> {
        self.queues.lock().get(user_id).cloned()
    }

    /// Number of users with a queue
    pub fn len(&self) -> usize {
        self.queues.lock().len()
    }

    /// Whether no queue was created yet
    pub fn is_empty(&self) -> bool {
        self.queues.lock().is_empty()
    }

    /// Stop accepting jobs, let workers drain their queues and wait for them
    pub async fn shutdown(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let queues = self.queues.lock();
            self.closed.store(true, Ordering::SeqCst);
            queues.values().filter_map(|q| q.close()).collect()
        };

        for result in join_all(handles).await {
            if let Err(e) = result {
                warn!("Job worker ended abnormally: {}", e);
            }
        }
    }
}

async fn worker_loop(
    user_id: String,
    mut rx: mpsc::UnboundedReceiver<QueuedJob>,
    counts: Arc<QueueCounts>,
    runner: JobRunner,
    permits: Arc<Semaphore>,
) {
    while let Some(job) = rx.recv().await {
        let permit = match Arc::clone(&permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                warn!("Worker pool closed, dropping job {}", job.job_id);
                counts.waiting.fetch_sub(1, Ordering::SeqCst);
                counts.idle.notify_waiters();
                continue;
            }
        };

        counts.active.fetch_add(1, Ordering::SeqCst);
        counts.waiting.fetch_sub(1, Ordering::SeqCst);

        // A panicking run must not take the worker down with it
        let run = tokio::spawn({
            let runner = runner.clone();
            let job = job.clone();
            async move { runner.run(job).await }
        });
        let report = match run.await {
            Ok(report) => report,
            Err(e) => {
                error!("User {}: job {} crashed: {}", user_id, job.job_id, e);
                runner.abandon(&job, JobError::Crashed(e.to_string())).await
            }
        };
        debug!(
            "User {}: job {} ended as {}",
            user_id, report.job_id, report.status
        );

        counts.active.fetch_sub(1, Ordering::SeqCst);
        drop(permit);
        counts.idle.notify_waiters();
    }

    debug!("Job queue of user {} closed", user_id);
}
