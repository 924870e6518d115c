/*!
 * Common test utilities for the pagetrans test suite
 */

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use pagetrans::app_config::JobsConfig;
use pagetrans::database::{Repository, TranslationJobRecord};
use pagetrans::jobs::{JobEvent, JobPayload, JobRunner, QueuedJob};
use pagetrans::providers::TranslationClient;
use pagetrans::store::TranslationStore;
use pagetrans::translation::NumberedUnit;

// Re-export the fault-injecting store
pub mod failing_store;

/// Install a test logger once; later calls are ignored
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates an in-memory repository with one page
pub async fn repository_with_page(slug: &str) -> (Repository, i64) {
    let repo = Repository::new_in_memory().expect("Failed to create repository");
    let page_id = repo
        .get_or_create_page(slug)
        .await
        .expect("Failed to create page");
    (repo, page_id)
}

/// Builds a payload for the given units, the title is added as unit 0
pub fn payload(user_id: &str, page_id: i64, title: &str, units: &[(u32, &str)]) -> JobPayload {
    JobPayload {
        user_id: user_id.to_string(),
        page_id,
        target_language: "ja".to_string(),
        title: title.to_string(),
        numbered_content: String::new(),
        numbered_elements: units
            .iter()
            .map(|(number, text)| NumberedUnit::new(*number, *text))
            .collect(),
        ai_model: "mock".to_string(),
        api_key: "test-key".to_string(),
    }
}

/// Job settings with a small chunk budget and a short timeout
pub fn jobs_config(max_chunk_size: usize) -> JobsConfig {
    JobsConfig {
        max_chunk_size,
        max_concurrent_jobs: 4,
        chunk_timeout_secs: 5,
    }
}

/// Creates a runner over `store` together with a receiver of its events
pub fn runner(
    store: Arc<dyn TranslationStore>,
    client: Arc<dyn TranslationClient>,
    max_chunk_size: usize,
) -> (JobRunner, broadcast::Receiver<JobEvent>) {
    let (tx, rx) = broadcast::channel(1024);
    let runner = JobRunner::new(store, client, tx).with_max_chunk_size(max_chunk_size);
    (runner, rx)
}

/// Inserts the pending job row for a payload, as enqueueing does
pub async fn queued_job(store: &dyn TranslationStore, payload: JobPayload) -> QueuedJob {
    let record = TranslationJobRecord::new(
        &payload.user_id,
        payload.page_id,
        &payload.target_language,
        &payload.ai_model,
    );
    store
        .create_job(&record)
        .await
        .expect("Failed to create job");
    QueuedJob {
        job_id: record.id,
        payload,
    }
}

/// Drains every event already sent on `rx`
pub fn drain_events(rx: &mut broadcast::Receiver<JobEvent>) -> Vec<JobEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Receives events until `count` jobs reached a terminal state
pub async fn events_until_terminal(
    rx: &mut broadcast::Receiver<JobEvent>,
    count: usize,
) -> Vec<JobEvent> {
    let mut events = Vec::new();
    let mut terminal = 0;
    while terminal < count {
        let event = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("Timed out waiting for job events")
            .expect("Event channel closed");
        if event.is_terminal() {
            terminal += 1;
        }
        events.push(event);
    }
    events
}

/// Progress values of the events of one job, in order
pub fn progress_of(events: &[JobEvent], job_id: &str) -> Vec<f64> {
    events
        .iter()
        .filter(|e| e.job_id == job_id)
        .map(|e| e.progress)
        .collect()
}

/// Number of stored translation candidates
pub fn translation_count(repo: &Repository) -> i64 {
    repo.connection()
        .stats()
        .expect("Failed to read stats")
        .translation_count
}
