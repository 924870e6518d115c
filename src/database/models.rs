/*!
 * Database entity models and DTOs.
 *
 * These structures map directly to database tables and provide
 * type-safe access to persisted data.
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Translation job status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job is queued and waiting for its user's worker
    Pending,
    /// Job is being processed
    InProgress,
    /// Every chunk was translated
    Completed,
    /// Job ended with untranslated units or an error
    Failed,
}

impl JobStatus {
    /// Whether the job can no longer change
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::InProgress => write!(f, "in_progress"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(JobStatus::Pending),
            "in_progress" => Ok(JobStatus::InProgress),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid job status: {}", s)),
        }
    }
}

/// Page record, the owner of source texts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    /// Database ID
    pub id: i64,
    /// Unique page slug
    pub slug: String,
    /// Creation timestamp (ISO 8601)
    pub created_at: String,
}

/// Persisted identity of a unit's content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceTextRecord {
    /// Database ID, stable across re-extractions of unchanged text
    pub id: i64,
    /// Page this text belongs to
    pub page_id: i64,
    /// Occurrence-aware content hash
    pub text_hash: String,
    /// Current unit number, cleared when the text left the page
    pub number: Option<u32>,
    /// Source text
    pub text: String,
    /// Creation timestamp (ISO 8601)
    pub created_at: String,
}

/// A candidate translation of a source text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslateTextRecord {
    /// Database ID
    pub id: i64,
    /// Source text being translated
    pub source_text_id: i64,
    /// Target language tag
    pub target_language: String,
    /// Translated text
    pub text: String,
    /// Vote score used to rank candidates
    pub point: i64,
    /// Author of the candidate
    pub user_id: String,
    /// Creation timestamp (ISO 8601)
    pub created_at: String,
}

/// Translation job record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationJobRecord {
    /// Unique job identifier (UUID)
    pub id: String,
    /// User who requested the job
    pub user_id: String,
    /// Page being translated
    pub page_id: i64,
    /// Target language tag
    pub target_language: String,
    /// Model used for translation
    pub ai_model: String,
    /// Current job status
    pub status: JobStatus,
    /// Completion percentage in `[0, 100]`
    pub progress: f64,
    /// Failure description for failed jobs
    pub error: Option<String>,
    /// Creation timestamp (ISO 8601)
    pub created_at: String,
    /// Last update timestamp (ISO 8601)
    pub updated_at: String,
    /// Completion timestamp (ISO 8601), once terminal
    pub completed_at: Option<String>,
}

impl TranslationJobRecord {
    /// Create a new pending job record with a fresh id
    pub fn new(
        user_id: impl Into<String>,
        page_id: i64,
        target_language: impl Into<String>,
        ai_model: impl Into<String>,
    ) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            page_id,
            target_language: target_language.into(),
            ai_model: ai_model.into(),
            status: JobStatus::Pending,
            progress: 0.0,
            error: None,
            created_at: now.clone(),
            updated_at: now,
            completed_at: None,
        }
    }

    /// Whether the job reached a terminal state
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
