/*!
 * Translation job state machine.
 *
 * A run moves the job to `in_progress`, persists the page's source texts,
 * then walks the chunks in document order. Units that already have a
 * translation in the target language are skipped, the rest go to the
 * translation client, and every extracted translation is saved as soon as
 * it arrives. A chunk that fails or yields nothing leaves its units
 * untranslated without stopping the run. Only authentication errors,
 * extraction errors and persistence errors end the run early.
 */

use log::{debug, error, info, warn};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use super::model::{JobEvent, JobPayload, JobReport, QueuedJob};
use crate::database::JobStatus;
use crate::errors::{ExtractionError, JobError, ProviderError};
use crate::extraction::extract_units;
use crate::providers::{BatchRequest, TranslationClient};
use crate::store::TranslationStore;
use crate::translation::chunker::{DEFAULT_MAX_CHUNK_SIZE, split_into_chunks};
use crate::translation::hashing::hash_units;
use crate::translation::prompts::units_to_source_json;
use crate::translation::response::extract_translations;
use crate::translation::units::{NumberedUnit, TranslatedUnit, normalize_units};

/// Default per-chunk timeout for translation calls
pub const DEFAULT_CHUNK_TIMEOUT: Duration = Duration::from_secs(120);

/// Executes queued jobs one at a time
#[derive(Clone)]
pub struct JobRunner {
    store: Arc<dyn TranslationStore>,
    client: Arc<dyn TranslationClient>,
    max_chunk_size: usize,
    chunk_timeout: Duration,
    events: broadcast::Sender<JobEvent>,
}

impl JobRunner {
    /// Create a runner publishing its events on `events`
    pub fn new(
        store: Arc<dyn TranslationStore>,
        client: Arc<dyn TranslationClient>,
        events: broadcast::Sender<JobEvent>,
    ) -> Self {
        Self {
            store,
            client,
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            chunk_timeout: DEFAULT_CHUNK_TIMEOUT,
            events,
        }
    }

    /// Set the character budget of a chunk
    pub fn with_max_chunk_size(mut self, max_chunk_size: usize) -> Self {
        self.max_chunk_size = max_chunk_size.max(1);
        self
    }

    /// Set the timeout of one translation call
    pub fn with_chunk_timeout(mut self, chunk_timeout: Duration) -> Self {
        self.chunk_timeout = chunk_timeout;
        self
    }

    /// Run a job to a terminal state and report the outcome
    ///
    /// Never fails: errors are recorded on the job row and in the report.
    pub async fn run(&self, job: QueuedJob) -> JobReport {
        let mut report = JobReport::new(&job.job_id);
        info!(
            "Starting job {} for user {} (page {}, {})",
            job.job_id, job.payload.user_id, job.payload.page_id, job.payload.target_language
        );

        if let Err(e) = self.execute(&job, &mut report).await {
            self.fail(&job, &mut report, e).await;
        }

        report.remaining.sort_unstable();
        report.remaining.dedup();
        report
    }

    async fn execute(&self, job: &QueuedJob, report: &mut JobReport) -> Result<(), JobError> {
        let payload = &job.payload;
        self.record(job, report, JobStatus::InProgress, 0.0).await?;

        let units = resolve_units(payload)?;
        let records = self
            .store
            .sync_source_texts(payload.page_id, hash_units(&units))
            .await
            .map_err(JobError::persistence)?;
        let source_ids: HashMap<u32, i64> = records
            .iter()
            .filter_map(|r| r.number.map(|number| (number, r.id)))
            .collect();
        if let Some(missing) = units.iter().find(|u| !source_ids.contains_key(&u.number)) {
            return Err(JobError::persistence(anyhow::anyhow!(
                "No source text stored for unit {}",
                missing.number
            )));
        }

        let chunks = split_into_chunks(&units, self.max_chunk_size);
        let total = chunks.len();
        report.chunks_total = total;
        debug!(
            "Job {}: {} units in {} chunks",
            job.job_id,
            units.len(),
            total
        );

        // Chunks that are fully or partly translated; failed chunks never count
        let mut completed = 0;
        for (index, chunk) in chunks.iter().enumerate() {
            let step = index + 1;
            let ids: Vec<i64> = chunk.units.iter().map(|u| source_ids[&u.number]).collect();
            let existing = self
                .store
                .find_translations(ids, &payload.target_language)
                .await
                .map_err(JobError::persistence)?;
            let translated_ids: HashSet<i64> = existing.iter().map(|t| t.source_text_id).collect();

            let pending: Vec<NumberedUnit> = chunk
                .units
                .iter()
                .filter(|u| !translated_ids.contains(&source_ids[&u.number]))
                .cloned()
                .collect();
            report.reused += chunk.len() - pending.len();

            if pending.is_empty() {
                debug!("Job {}: chunk {}/{} already translated", job.job_id, step, total);
                completed += 1;
                self.advance(job, report, completed, total).await?;
                continue;
            }

            let items = match self.translate_chunk(payload, &pending).await {
                Ok(items) => items,
                Err(e) if e.is_fatal_for_job() => {
                    report.remaining.extend(pending.iter().map(|u| u.number));
                    report
                        .remaining
                        .extend(chunks[step..].iter().flat_map(|c| c.numbers()));
                    return Err(JobError::Provider(e));
                }
                Err(e) => {
                    warn!(
                        "Job {}: chunk {}/{} failed: {}",
                        job.job_id, step, total, e
                    );
                    report.chunks_failed += 1;
                    report.remaining.extend(pending.iter().map(|u| u.number));
                    continue;
                }
            };

            let saved = self.save_chunk(payload, &pending, &source_ids, items).await?;
            if saved.is_empty() {
                warn!(
                    "Job {}: chunk {}/{} produced no usable translations",
                    job.job_id, step, total
                );
                report.chunks_failed += 1;
                report.remaining.extend(pending.iter().map(|u| u.number));
                continue;
            }

            report.translated += saved.len();
            report.remaining.extend(
                pending
                    .iter()
                    .map(|u| u.number)
                    .filter(|n| !saved.contains(n)),
            );
            completed += 1;
            self.advance(job, report, completed, total).await?;
        }

        if report.chunks_failed > 0 {
            return Err(JobError::ChunksFailed {
                failed: report.chunks_failed,
                total,
            });
        }

        self.record(job, report, JobStatus::Completed, 100.0).await?;
        info!(
            "Job {} completed: {} translated, {} reused",
            job.job_id, report.translated, report.reused
        );
        Ok(())
    }

    async fn translate_chunk(
        &self,
        payload: &JobPayload,
        pending: &[NumberedUnit],
    ) -> Result<Vec<TranslatedUnit>, ProviderError> {
        let request = BatchRequest {
            api_key: payload.api_key.clone(),
            model: payload.ai_model.clone(),
            title: payload.title.clone(),
            source_json: units_to_source_json(pending),
            target_language: payload.target_language.clone(),
        };

        let raw = tokio::time::timeout(self.chunk_timeout, self.client.translate_batch(&request))
            .await
            .map_err(|_| ProviderError::Timeout(self.chunk_timeout.as_secs()))??;

        Ok(extract_translations(&raw))
    }

    /// Save the translations that belong to `pending`, returning the saved numbers
    async fn save_chunk(
        &self,
        payload: &JobPayload,
        pending: &[NumberedUnit],
        source_ids: &HashMap<u32, i64>,
        items: Vec<TranslatedUnit>,
    ) -> Result<HashSet<u32>, JobError> {
        let wanted: HashSet<u32> = pending.iter().map(|u| u.number).collect();
        let mut saved = HashSet::new();

        for item in items {
            if !wanted.contains(&item.number) || item.text.trim().is_empty() {
                debug!("Ignoring translation for unit {}", item.number);
                continue;
            }
            if !saved.insert(item.number) {
                continue;
            }
            self.store
                .save_translation(
                    source_ids[&item.number],
                    &payload.target_language,
                    &item.text,
                    &payload.user_id,
                )
                .await
                .map_err(JobError::persistence)?;
        }

        Ok(saved)
    }

    async fn advance(
        &self,
        job: &QueuedJob,
        report: &mut JobReport,
        completed: usize,
        total: usize,
    ) -> Result<(), JobError> {
        let progress = (completed as f64 * 100.0) / total as f64;
        if progress <= report.progress {
            return Ok(());
        }
        self.record(job, report, JobStatus::InProgress, progress).await
    }

    async fn record(
        &self,
        job: &QueuedJob,
        report: &mut JobReport,
        status: JobStatus,
        progress: f64,
    ) -> Result<(), JobError> {
        self.store
            .update_job_status(&job.job_id, status, progress, report.error.clone())
            .await
            .map_err(JobError::persistence)?;

        report.status = status;
        report.progress = progress;
        self.emit(job, report);
        Ok(())
    }

    async fn fail(&self, job: &QueuedJob, report: &mut JobReport, cause: JobError) {
        error!("Job {} failed: {}", job.job_id, cause);
        report.error = Some(cause.to_string());

        if let Err(e) = self
            .store
            .update_job_status(
                &job.job_id,
                JobStatus::Failed,
                report.progress,
                report.error.clone(),
            )
            .await
        {
            error!("Could not record failure of job {}: {:#}", job.job_id, e);
        }

        report.status = JobStatus::Failed;
        self.emit(job, report);
    }

    /// Fail a job whose run ended without a report
    pub(crate) async fn abandon(&self, job: &QueuedJob, cause: JobError) -> JobReport {
        let mut report = JobReport::new(&job.job_id);
        if let Ok(Some(row)) = self.store.get_job(&job.job_id).await {
            report.progress = row.progress;
        }
        self.fail(job, &mut report, cause).await;
        report
    }

    fn emit(&self, job: &QueuedJob, report: &JobReport) {
        let event = JobEvent {
            job_id: job.job_id.clone(),
            user_id: job.payload.user_id.clone(),
            status: report.status,
            progress: report.progress,
            error: report.error.clone(),
            report: report.status.is_terminal().then(|| report.clone()),
        };
        // No subscriber is not an error
        let _ = self.events.send(event);
    }
}

/// Units of a payload, re-extracted from the numbered HTML when none were sent
fn resolve_units(payload: &JobPayload) -> Result<Vec<NumberedUnit>, ExtractionError> {
    let units = if payload.numbered_elements.is_empty() {
        if payload.numbered_content.trim().is_empty() {
            return Err(ExtractionError::NoUnits(
                "payload has neither numbered elements nor content".to_string(),
            ));
        }
        extract_units(&payload.numbered_content, &payload.title)?.units
    } else {
        normalize_units(&payload.title, payload.numbered_elements.clone())
    };

    if units.is_empty() {
        return Err(ExtractionError::NoUnits("every unit is blank".to_string()));
    }
    if !units.iter().any(NumberedUnit::is_title) {
        return Err(ExtractionError::EmptyTitle);
    }
    Ok(units)
}
