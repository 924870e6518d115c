/*!
 * Database module for persistent storage of pages, source texts and jobs.
 *
 * This module provides SQLite-based persistence for:
 * - Pages and their deduplicated source texts
 * - Translation candidates per source text and language
 * - Translation jobs with status and progress
 */

pub mod connection;
pub mod models;
pub mod repository;
pub mod schema;

// Re-export main types
pub use connection::{DatabaseConnection, DatabaseStats};
pub use models::{
    JobStatus, PageRecord, SourceTextRecord, TranslateTextRecord, TranslationJobRecord,
};
pub use repository::{ABANDONED_JOB_ERROR, Repository};
