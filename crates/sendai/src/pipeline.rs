//! End-to-end pipeline for a single (company, fiscal year, method)
//! request.
//!
//! Data flows strictly downward: archive → facts → contexts → statement
//! → ROIC → quality. Every stage failure is surfaced verbatim; no stage
//! substitutes defaults, prior periods, or estimates to mask one.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use sendai_filing::{
    CancelToken, ContextResolver, FilingArchive, FilingError, FinancialStatement,
    StatementBuilder, extract_facts,
};
use sendai_metrics::{MetricsError, RoicMethod, RoicResult, compute_roic, validate_result};

/// One unit of work for the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoicRequest {
    /// Filer identifier (EDINET code).
    pub company_id: String,
    /// Fiscal year whose period ends March 31.
    pub fiscal_year: i32,
    /// ROIC methodology to apply.
    pub method: RoicMethod,
}

impl RoicRequest {
    /// Identity key used for batch result collection.
    pub fn key(&self) -> (String, i32, RoicMethod) {
        (self.company_id.clone(), self.fiscal_year, self.method)
    }
}

/// Errors fatal to a single pipeline request.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Filing-layer failure (archive, extraction, context, statement).
    #[error(transparent)]
    Filing(#[from] FilingError),

    /// Metric-layer failure (insufficient data, calculation).
    #[error(transparent)]
    Metrics(#[from] MetricsError),

    /// The request exceeded its time budget and was abandoned.
    #[error("request timed out for fiscal year {fiscal_year}")]
    Timeout {
        /// Fiscal year of the abandoned request.
        fiscal_year: i32,
    },

    /// A worker failed outside the error taxonomy (task panic).
    #[error("internal worker failure: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Stage label for aggregate reporting.
    pub const fn stage(&self) -> &'static str {
        match self {
            Self::Filing(err) => match err {
                FilingError::ArchiveFormat(_) | FilingError::ArchiveCorrupt(_) => "archive",
                FilingError::NoExtractableContent(_)
                | FilingError::Xml(_)
                | FilingError::Csv(_)
                | FilingError::Encoding(_) => "extraction",
                FilingError::ContextNotFound { .. } | FilingError::AmbiguousContext { .. } => {
                    "context"
                }
                FilingError::ConflictingFact { .. } => "statement",
                FilingError::Network(_) | FilingError::Api(_) => "fetch",
                FilingError::Cache(_) | FilingError::Io(_) => "storage",
                FilingError::Cancelled => "timeout",
            },
            Self::Metrics(_) => "calculation",
            Self::Timeout { .. } => "timeout",
            Self::Internal(_) => "internal",
        }
    }

    /// Whether a retry with the same input could plausibly succeed.
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Filing(err) => err.is_transient(),
            _ => false,
        }
    }
}

/// Durable outputs of one successful request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoicOutcome {
    /// Canonical statement the figures were derived from.
    pub statement: FinancialStatement,
    /// Derived ROIC result with attached warnings.
    pub result: RoicResult,
}

/// Run the pipeline over raw package bytes.
///
/// Deterministic: identical bytes and request yield an identical outcome.
/// The cancel token is checked at stage boundaries and inside the
/// per-fact loops; a tripped token surfaces as [`PipelineError::Timeout`].
pub fn run_pipeline(
    bytes: &[u8],
    request: &RoicRequest,
    cancel: &CancelToken,
) -> Result<RoicOutcome, PipelineError> {
    let outcome = run_stages(bytes, request, cancel);
    match outcome {
        Err(PipelineError::Filing(FilingError::Cancelled)) => Err(PipelineError::Timeout {
            fiscal_year: request.fiscal_year,
        }),
        other => other,
    }
}

fn run_stages(
    bytes: &[u8],
    request: &RoicRequest,
    cancel: &CancelToken,
) -> Result<RoicOutcome, PipelineError> {
    cancel.check().map_err(PipelineError::Filing)?;
    let archive = FilingArchive::from_bytes(bytes)?;

    let facts = extract_facts(&archive, cancel)?;
    tracing::debug!(
        company = %request.company_id,
        fiscal_year = request.fiscal_year,
        facts = facts.len(),
        "facts extracted"
    );

    let resolver = ContextResolver::from_package(&archive, &facts, request.fiscal_year)?;
    let resolved = resolver.resolve_pair(request.fiscal_year)?;

    let statement = StatementBuilder::default().build(
        &facts,
        &resolved,
        &request.company_id,
        request.fiscal_year,
        cancel,
    )?;

    cancel.check().map_err(PipelineError::Filing)?;
    let mut result = compute_roic(&statement, request.method)?;
    result.warnings = validate_result(&statement, &result);

    Ok(RoicOutcome { statement, result })
}
