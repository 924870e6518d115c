/*!
 * Job payloads, events and reports.
 */

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::database::JobStatus;
use crate::translation::units::NumberedUnit;

/// Everything a worker needs to run one translation job
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPayload {
    /// User who requested the job
    pub user_id: String,
    /// Page being translated
    pub page_id: i64,
    /// Target language tag
    pub target_language: String,
    /// Document title, unit 0
    pub title: String,
    /// Page HTML with `data-number-id` attributes
    #[serde(default)]
    pub numbered_content: String,
    /// Units of the page; re-extracted from `numbered_content` when empty
    #[serde(default)]
    pub numbered_elements: Vec<NumberedUnit>,
    /// Model used for translation
    pub ai_model: String,
    /// API key forwarded to the provider; the configured key is used when empty
    #[serde(default)]
    pub api_key: String,
}

impl fmt::Debug for JobPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobPayload")
            .field("user_id", &self.user_id)
            .field("page_id", &self.page_id)
            .field("target_language", &self.target_language)
            .field("title", &self.title)
            .field("numbered_elements", &self.numbered_elements.len())
            .field("ai_model", &self.ai_model)
            .field("api_key", &if self.api_key.is_empty() { "" } else { "***" })
            .finish()
    }
}

/// A job waiting in a user queue
#[derive(Debug, Clone)]
pub struct QueuedJob {
    /// Id of the persisted job row
    pub job_id: String,
    /// Job input
    pub payload: JobPayload,
}

/// Summary of a finished job run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobReport {
    /// Job id
    pub job_id: String,
    /// Final status
    pub status: JobStatus,
    /// Last recorded progress
    pub progress: f64,
    /// Number of chunks in the job
    pub chunks_total: usize,
    /// Number of chunks whose translation failed
    pub chunks_failed: usize,
    /// Units translated during this run
    pub translated: usize,
    /// Units skipped because a translation already existed
    pub reused: usize,
    /// Numbers of units still untranslated, ascending
    pub remaining: Vec<u32>,
    /// Failure description
    pub error: Option<String>,
}

impl JobReport {
    pub(crate) fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            status: JobStatus::Pending,
            progress: 0.0,
            chunks_total: 0,
            chunks_failed: 0,
            translated: 0,
            reused: 0,
            remaining: Vec::new(),
            error: None,
        }
    }

    /// Whether the run ended with every unit translated
    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Completed
    }
}

/// Status or progress change broadcast to subscribers
#[derive(Debug, Clone, PartialEq)]
pub struct JobEvent {
    /// Job id
    pub job_id: String,
    /// Owner of the job
    pub user_id: String,
    /// Status after the change
    pub status: JobStatus,
    /// Progress after the change
    pub progress: f64,
    /// Failure description for failed jobs
    pub error: Option<String>,
    /// Final report, attached to the terminal event
    pub report: Option<JobReport>,
}

impl JobEvent {
    /// Whether this is the last event of its job
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
