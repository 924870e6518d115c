/*!
 * Error types for the pagetrans library.
 *
 * This module contains custom error types for the different stages of the
 * translation job pipeline, using the thiserror crate for ergonomic error
 * definitions.
 */

use thiserror::Error;

/// Errors that can occur when calling a translation provider
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication (invalid or missing API key)
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// The provider answered but returned no candidate content
    #[error("Provider returned no content")]
    EmptyResponse,

    /// The call did not finish within the per-chunk budget
    #[error("Provider call timed out after {0} seconds")]
    Timeout(u64),
}

impl ProviderError {
    /// Whether a transport-level retry may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ConnectionError(_) | Self::RateLimitExceeded(_) | Self::Timeout(_) => true,
            Self::ApiError { status_code, .. } => *status_code >= 500,
            _ => false,
        }
    }

    /// Whether the error must abort the whole job instead of a single chunk
    pub fn is_fatal_for_job(&self) -> bool {
        matches!(self, Self::AuthenticationError(_))
    }

    /// Map a non-success HTTP status to the matching error variant
    pub fn from_status(status_code: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status_code {
            401 | 403 => Self::AuthenticationError(message),
            429 => Self::RateLimitExceeded(message),
            _ => Self::ApiError { status_code, message },
        }
    }
}

/// Errors that can occur while extracting numbered units from HTML
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ExtractionError {
    /// The document title is blank, so unit 0 cannot exist
    #[error("Document title is empty")]
    EmptyTitle,

    /// Neither the payload nor the numbered content yielded any unit
    #[error("No translatable units found: {0}")]
    NoUnits(String),
}

/// Errors that end a translation job
#[derive(Error, Debug)]
pub enum JobError {
    /// Error from the provider that cannot be confined to one chunk
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error while extracting units
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Error from the persistence layer
    #[error("Persistence error: {0}")]
    Persistence(#[source] anyhow::Error),

    /// One or more chunks could not be translated
    #[error("{failed} of {total} chunks failed to translate")]
    ChunksFailed {
        /// Number of failed chunks
        failed: usize,
        /// Number of chunks in the job
        total: usize,
    },

    /// The job was rejected before it started
    #[error("Invalid job: {0}")]
    Invalid(String),

    /// The task running the job ended abnormally
    #[error("Job worker crashed: {0}")]
    Crashed(String),
}

impl JobError {
    /// Wrap a persistence failure
    pub fn persistence(error: anyhow::Error) -> Self {
        Self::Persistence(error)
    }
}
