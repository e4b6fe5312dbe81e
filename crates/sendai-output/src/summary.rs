//! Aggregate summary of a batch run.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use sendai_metrics::RoicResult;

/// Outcome counts and ROIC aggregates across one batch run.
///
/// Accumulated incrementally as per-item results arrive; completion order
/// does not affect the rendered summary because failure stages are kept
/// in an ordered map and the ROIC aggregates are order-free.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BatchSummary {
    /// Requests processed.
    pub total: usize,
    /// Requests that produced a result.
    pub succeeded: usize,
    /// Requests that failed.
    pub failed: usize,
    /// Failure counts keyed by error stage.
    pub failures_by_stage: BTreeMap<String, usize>,
    /// Advisory warnings attached across all successes.
    pub total_warnings: usize,
    /// Mean ROIC over successes.
    pub mean_roic: Option<f64>,
    /// Minimum ROIC over successes.
    pub min_roic: Option<f64>,
    /// Maximum ROIC over successes.
    pub max_roic: Option<f64>,

    #[serde(skip)]
    roic_sum: f64,
}

impl BatchSummary {
    /// Create an empty summary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one successful result.
    pub fn record_success(&mut self, result: &RoicResult) {
        self.total += 1;
        self.succeeded += 1;
        self.total_warnings += result.warnings.len();

        self.roic_sum += result.roic;
        self.mean_roic = Some(self.roic_sum / self.succeeded as f64);
        self.min_roic = Some(self.min_roic.map_or(result.roic, |m| m.min(result.roic)));
        self.max_roic = Some(self.max_roic.map_or(result.roic, |m| m.max(result.roic)));
    }

    /// Record one failed request under its error stage.
    pub fn record_failure(&mut self, stage: &str) {
        self.total += 1;
        self.failed += 1;
        *self.failures_by_stage.entry(stage.to_string()).or_insert(0) += 1;
    }

    /// Fraction of requests that succeeded.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.succeeded as f64 / self.total as f64
        }
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "processed {} requests: {} succeeded, {} failed ({:.1}% success)",
            self.total,
            self.succeeded,
            self.failed,
            self.success_rate() * 100.0
        )?;
        if let (Some(mean), Some(min), Some(max)) =
            (self.mean_roic, self.min_roic, self.max_roic)
        {
            writeln!(
                f,
                "ROIC mean {:.4}, range [{:.4}, {:.4}], {} warnings",
                mean, min, max, self.total_warnings
            )?;
        }
        for (stage, count) in &self.failures_by_stage {
            writeln!(f, "  {stage}: {count}")?;
        }
        Ok(())
    }
}
