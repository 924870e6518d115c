/*!
 * Job service: the producer side of the job pipeline.
 *
 * `enqueue` validates a payload, records a `pending` job row and hands the
 * job to its user's queue. Workers report every status and progress change
 * through a broadcast channel obtained with `subscribe`.
 */

use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use super::model::{JobEvent, JobPayload, QueuedJob};
use super::queue::{QueueRegistry, UserQueue};
use super::runner::JobRunner;
use crate::app_config::JobsConfig;
use crate::database::{JobStatus, TranslationJobRecord};
use crate::errors::JobError;
use crate::language_utils::normalize_target_language;
use crate::providers::TranslationClient;
use crate::store::TranslationStore;

/// Capacity of the event channel; slow subscribers skip older events
const EVENT_CAPACITY: usize = 256;

/// Entry point for submitting and following translation jobs
pub struct JobService {
    store: Arc<dyn TranslationStore>,
    registry: QueueRegistry,
    events: broadcast::Sender<JobEvent>,
}

impl JobService {
    /// Create a job service with its queue registry and worker pool
    pub fn new(
        store: Arc<dyn TranslationStore>,
        client: Arc<dyn TranslationClient>,
        config: &JobsConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let runner = JobRunner::new(Arc::clone(&store), client, events.clone())
            .with_max_chunk_size(config.max_chunk_size)
            .with_chunk_timeout(Duration::from_secs(config.chunk_timeout_secs));

        Self {
            store,
            registry: QueueRegistry::new(runner, config.max_concurrent_jobs),
            events,
        }
    }

    /// Queue a job for `user_id` and return its id
    pub async fn enqueue(&self, user_id: &str, payload: JobPayload) -> Result<String, JobError> {
        let user_id = validate_user_id(user_id)?;
        let queue = self.registry.get_or_create(user_id)?;
        let job = self.prepare(user_id, payload).await?;

        self.submit(&queue, job).await
    }

    /// Queue a job for `user_id` once `delay` has elapsed
    pub async fn enqueue_delayed(
        &self,
        user_id: &str,
        payload: JobPayload,
        delay: Duration,
    ) -> Result<String, JobError> {
        let user_id = validate_user_id(user_id)?;
        let queue = self.registry.get_or_create(user_id)?;
        let job = self.prepare(user_id, payload).await?;
        let job_id = job.job_id.clone();

        queue.push_delayed(job, delay);
        Ok(job_id)
    }

    /// Push a prepared job, failing its row when the queue refuses it
    async fn submit(&self, queue: &UserQueue, job: QueuedJob) -> Result<String, JobError> {
        let job_id = job.job_id.clone();
        if let Err(e) = queue.push(job) {
            warn!("Job {} was not queued: {}", job_id, e);
            if let Err(db) = self
                .store
                .update_job_status(&job_id, JobStatus::Failed, 0.0, Some(e.to_string()))
                .await
            {
                error!("Could not record rejection of job {}: {:#}", job_id, db);
            }
            return Err(e);
        }
        Ok(job_id)
    }

    async fn prepare(&self, user_id: &str, mut payload: JobPayload) -> Result<QueuedJob, JobError> {
        if payload.user_id.is_empty() {
            payload.user_id = user_id.to_string();
        } else if payload.user_id != user_id {
            return Err(JobError::Invalid(format!(
                "payload belongs to user {}, not {}",
                payload.user_id, user_id
            )));
        }
        payload.target_language = normalize_target_language(&payload.target_language)
            .map_err(|e| JobError::Invalid(e.to_string()))?;

        let record = TranslationJobRecord::new(
            user_id,
            payload.page_id,
            &payload.target_language,
            &payload.ai_model,
        );
        self.store
            .create_job(&record)
            .await
            .map_err(JobError::persistence)?;

        info!(
            "Queued job {} for user {} (page {}, {})",
            record.id, user_id, payload.page_id, payload.target_language
        );
        Ok(QueuedJob {
            job_id: record.id,
            payload,
        })
    }

    fn queue(&self, user_id: &str) -> Option<Arc<UserQueue>> {
        self.registry.get(user_id)
    }

    /// Jobs of a user waiting for the worker
    pub fn waiting_count(&self, user_id: &str) -> usize {
        self.queue(user_id).map_or(0, |q| q.waiting_count())
    }

    /// Jobs of a user being run
    pub fn active_count(&self, user_id: &str) -> usize {
        self.queue(user_id).map_or(0, |q| q.active_count())
    }

    /// Jobs of a user scheduled for later
    pub fn delayed_count(&self, user_id: &str) -> usize {
        self.queue(user_id).map_or(0, |q| q.delayed_count())
    }

    /// Whether a user has nothing waiting, running or scheduled
    pub fn is_user_idle(&self, user_id: &str) -> bool {
        self.queue(user_id).is_none_or(|q| q.is_idle())
    }

    /// Wait until a user has nothing waiting, running or scheduled
    pub async fn wait_until_idle(&self, user_id: &str) {
        if let Some(queue) = self.queue(user_id) {
            queue.wait_until_idle().await;
        }
    }

    /// Receive every job status and progress change from now on
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    /// Get a job row by id
    pub async fn get_job(&self, job_id: &str) -> Result<Option<TranslationJobRecord>, JobError> {
        self.store.get_job(job_id).await.map_err(JobError::persistence)
    }

    /// Stop accepting jobs and wait for queued jobs to finish
    pub async fn shutdown(&self) {
        info!("Shutting down job service");
        self.registry.shutdown().await;
    }
}

fn validate_user_id(user_id: &str) -> Result<&str, JobError> {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        return Err(JobError::Invalid("user id is empty".to_string()));
    }
    Ok(user_id)
}
