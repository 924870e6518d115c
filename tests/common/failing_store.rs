/*!
 * Store wrapper that injects persistence failures
 *
 * Every call is delegated to an in-memory repository until the configured
 * failure point is reached.
 */

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

use pagetrans::database::{
    JobStatus, Repository, SourceTextRecord, TranslateTextRecord, TranslationJobRecord,
};
use pagetrans::store::TranslationStore;
use pagetrans::translation::HashedUnit;

/// Persistence operation that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePoint {
    /// Saving translations fails once `after` saves succeeded
    SaveTranslation { after: usize },
    /// Persisting source texts always fails
    SyncSourceTexts,
}

/// Repository wrapper failing at a chosen point
pub struct FailingStore {
    inner: Repository,
    failure: FailurePoint,
    saves: AtomicUsize,
}

impl FailingStore {
    pub fn new(inner: Repository, failure: FailurePoint) -> Self {
        Self {
            inner,
            failure,
            saves: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl TranslationStore for FailingStore {
    async fn get_or_create_page(&self, slug: &str) -> Result<i64> {
        self.inner.get_or_create_page(slug).await
    }

    async fn get_or_create_source_text(
        &self,
        text: &str,
        number: u32,
        page_id: i64,
    ) -> Result<i64> {
        self.inner.get_or_create_source_text(text, number, page_id).await
    }

    async fn sync_source_texts(
        &self,
        page_id: i64,
        units: Vec<HashedUnit>,
    ) -> Result<Vec<SourceTextRecord>> {
        if self.failure == FailurePoint::SyncSourceTexts {
            return Err(anyhow!("simulated disk failure"));
        }
        self.inner.sync_source_texts(page_id, units).await
    }

    async fn find_translations(
        &self,
        source_text_ids: Vec<i64>,
        target_language: &str,
    ) -> Result<Vec<TranslateTextRecord>> {
        self.inner
            .find_translations(source_text_ids, target_language)
            .await
    }

    async fn save_translation(
        &self,
        source_text_id: i64,
        target_language: &str,
        text: &str,
        user_id: &str,
    ) -> Result<i64> {
        if let FailurePoint::SaveTranslation { after } = self.failure {
            if self.saves.fetch_add(1, Ordering::SeqCst) >= after {
                return Err(anyhow!("simulated disk failure"));
            }
        }
        self.inner
            .save_translation(source_text_id, target_language, text, user_id)
            .await
    }

    async fn create_job(&self, job: &TranslationJobRecord) -> Result<()> {
        self.inner.create_job(job).await
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<TranslationJobRecord>> {
        self.inner.get_job(job_id).await
    }

    async fn update_job_status(
        &self,
        job_id: &str,
        status: JobStatus,
        progress: f64,
        error: Option<String>,
    ) -> Result<()> {
        self.inner
            .update_job_status(job_id, status, progress, error)
            .await
    }
}
