//! Error types for filing ingestion and statement extraction.

use thiserror::Error;

use crate::statement::LineItem;

/// Result type for filing operations.
pub type Result<T> = std::result::Result<T, FilingError>;

/// Errors that can occur while turning a filing package into a statement.
#[derive(Debug, Error)]
pub enum FilingError {
    /// The package bytes do not start with a recognized archive signature.
    #[error("not a filing package: {0}")]
    ArchiveFormat(String),

    /// The archive signature matched but decompression failed mid-stream.
    #[error("corrupt filing package: {0}")]
    ArchiveCorrupt(String),

    /// No entry of the package could be parsed into a single fact.
    #[error("no extractable content in package: {0}")]
    NoExtractableContent(String),

    /// No context matched the requested fiscal period.
    #[error("no current-period consolidated context for fiscal year {fiscal_year}")]
    ContextNotFound {
        /// Fiscal year the caller asked for.
        fiscal_year: i32,
    },

    /// More than one context matched the requested fiscal period.
    #[error("ambiguous contexts for fiscal year {fiscal_year}: {candidates:?}")]
    AmbiguousContext {
        /// Fiscal year the caller asked for.
        fiscal_year: i32,
        /// Context ids that all matched the selection rule.
        candidates: Vec<String>,
    },

    /// Two concepts mapped to the same line item with disagreeing values.
    #[error("conflicting facts for line item {line_item:?}")]
    ConflictingFact {
        /// Canonical line item the concepts collided on.
        line_item: LineItem,
    },

    /// The request was cancelled mid-extraction.
    #[error("extraction cancelled")]
    Cancelled,

    /// XML parsing error.
    #[error("XML parsing error: {0}")]
    Xml(String),

    /// CSV rendition parsing error.
    #[error("CSV rendition error: {0}")]
    Csv(#[from] csv::Error),

    /// Text-encoding error in a rendition entry.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Network error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// EDINET API error.
    #[error("EDINET API error: {0}")]
    Api(String),

    /// Filing cache error.
    #[error("cache error: {0}")]
    Cache(#[from] rusqlite::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FilingError {
    /// Whether a retry with the same input could plausibly succeed.
    ///
    /// Parse and resolution failures are deterministic for fixed bytes and
    /// must never be retried; only transport-level failures qualify.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Api(_))
    }
}
