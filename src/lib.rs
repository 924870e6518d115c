/*!
 * # pagetrans - incremental page translation with AI
 *
 * A Rust library that turns HTML pages into numbered translation units and
 * translates them through per-user job queues, chunk by chunk, persisting
 * every translated unit as soon as it is produced.
 *
 * ## Features
 *
 * - Stable unit numbering from sanitized HTML, title as unit 0
 * - Content-addressed deduplication of source texts across edits
 * - Size-bounded chunking of units for LLM calls
 * - Translation providers:
 *   - Anthropic API
 *   - Ollama (local LLM)
 * - Tolerant parsing of model output (JSON first, pattern scan second)
 * - Per-user FIFO job queues with progress tracking and partial-failure recovery
 * - SQLite persistence of pages, source texts, translations and jobs
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `extraction`: Unit extraction and numbered HTML rendering
 * - `translation`: Unit model and the pure pipeline stages:
 *   - `translation::hashing`: Content hashing for deduplication
 *   - `translation::chunker`: Size-bounded batching
 *   - `translation::prompts`: Prompt construction
 *   - `translation::response`: Model output parsing
 * - `providers`: Client implementations for LLM providers
 * - `database`: SQLite persistence
 * - `store`: Persistence seam used by jobs
 * - `jobs`: Job runner, per-user queues and the job service
 * - `language_utils`: ISO language code utilities
 * - `errors`: Custom error types for the application
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod database;
pub mod errors;
pub mod extraction;
pub mod jobs;
pub mod language_utils;
pub mod providers;
pub mod store;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use database::{DatabaseConnection, JobStatus, Repository};
pub use errors::{ExtractionError, JobError, ProviderError};
pub use extraction::{ExtractedDocument, extract_units};
pub use jobs::{JobEvent, JobPayload, JobReport, JobService};
pub use language_utils::{get_language_name, language_codes_match, normalize_target_language};
pub use providers::{BatchRequest, TranslationClient};
pub use store::TranslationStore;
pub use translation::{NumberedUnit, TranslatedUnit, extract_translations, split_into_chunks};
