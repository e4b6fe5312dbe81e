//! Error types for metric computation.

use thiserror::Error;

use crate::method::RoicMethod;
use sendai_filing::LineItem;

/// Result type for metric computation.
pub type Result<T> = std::result::Result<T, MetricsError>;

/// Errors that can occur while deriving ROIC from a statement.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// A line item the method requires was not disclosed.
    ///
    /// Substituting a default (a guessed tax rate, a zero lease expense)
    /// would silently corrupt the figure, so the computation fails
    /// instead.
    #[error("method {method} requires {missing:?} which is not disclosed")]
    InsufficientData {
        /// Method that was requested.
        method: RoicMethod,
        /// Line item that is absent from the statement.
        missing: LineItem,
    },

    /// The inputs were present but do not admit a meaningful result.
    #[error("calculation error: {reason}")]
    Calculation {
        /// Why the computation was rejected.
        reason: String,
    },
}
