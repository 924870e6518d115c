/*!
 * Core translation pipeline primitives.
 *
 * This module contains the pieces a translation job is assembled from.
 * It is split into several submodules:
 *
 * - `units`: Numbered source units and translated units
 * - `hashing`: Content hashing for source-text deduplication
 * - `chunker`: Size-bounded batching of units
 * - `prompts`: Prompt templates and builders for a batch
 * - `response`: Tolerant parsing of model output
 */

// Re-export main types for easier usage
pub use self::chunker::{Chunk, DEFAULT_MAX_CHUNK_SIZE, split_into_chunks};
pub use self::hashing::{HashedUnit, hash_text, hash_units, hash_with_occurrence};
pub use self::prompts::{BatchPromptBuilder, PromptTemplate, units_to_source_json};
pub use self::response::{Extraction, extract_translations, parse_response};
pub use self::units::{NumberedUnit, TITLE_NUMBER, TranslatedUnit, normalize_units};

// Submodules
pub mod chunker;
pub mod hashing;
pub mod prompts;
pub mod response;
pub mod units;
