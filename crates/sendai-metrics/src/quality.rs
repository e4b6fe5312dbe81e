//! Advisory quality checks over statements and results.
//!
//! Warnings flag figures that are legal but suspicious; they never reject
//! or alter the underlying data. The rule set and its order are fixed so
//! repeated runs emit identical warning sequences.

use serde::{Deserialize, Serialize};

use crate::roic::RoicResult;
use sendai_filing::{FinancialStatement, LineItem};

/// ROIC magnitude beyond which the figure is suspect.
const ROIC_PLAUSIBLE_RANGE: f64 = 1.0;
/// Effective tax rates outside this band are suspect.
const TAX_RATE_PLAUSIBLE_MAX: f64 = 0.6;
/// Invested capital below this share of total assets is a thin
/// denominator.
const THIN_CAPITAL_RATIO: f64 = 0.10;

/// Machine-readable warning classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningCode {
    /// ROIC outside the plausible [−1, 1] band.
    RoicOutOfRange,
    /// Shareholders' equity exceeds total assets.
    EquityExceedsAssets,
    /// Net sales are zero or negative.
    NonPositiveNetSales,
    /// Effective tax rate outside the plausible band.
    TaxRateOutOfRange,
    /// Operating income magnitude exceeds net sales.
    OperatingIncomeExceedsSales,
    /// Invested capital is a small fraction of total assets.
    ThinInvestedCapital,
}

/// One advisory finding attached to a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityWarning {
    /// Classification of the finding.
    pub code: WarningCode,
    /// Human-readable description with the offending figures.
    pub message: String,
}

impl QualityWarning {
    fn new(code: WarningCode, message: String) -> Self {
        Self { code, message }
    }
}

/// Evaluate the statement-level rules, in fixed order.
pub fn validate_statement(statement: &FinancialStatement) -> Vec<QualityWarning> {
    let mut warnings = Vec::new();

    if let (Some(assets), Some(equity)) =
        (statement.total_assets(), statement.shareholders_equity())
        && assets < equity
    {
        warnings.push(QualityWarning::new(
            WarningCode::EquityExceedsAssets,
            format!("total assets {assets} below shareholders' equity {equity}"),
        ));
    }

    if let Some(net_sales) = statement.net_sales()
        && net_sales <= 0.0
    {
        warnings.push(QualityWarning::new(
            WarningCode::NonPositiveNetSales,
            format!("net sales {net_sales} is not positive"),
        ));
    }

    if let Some(rate) = statement.effective_tax_rate()
        && !(0.0..=TAX_RATE_PLAUSIBLE_MAX).contains(&rate)
    {
        warnings.push(QualityWarning::new(
            WarningCode::TaxRateOutOfRange,
            format!("effective tax rate {rate} outside [0, {TAX_RATE_PLAUSIBLE_MAX}]"),
        ));
    }

    if let (Some(operating), Some(net_sales)) =
        (statement.operating_income(), statement.net_sales())
        && net_sales > 0.0
        && operating.abs() > net_sales
    {
        warnings.push(QualityWarning::new(
            WarningCode::OperatingIncomeExceedsSales,
            format!("operating income {operating} exceeds net sales {net_sales}"),
        ));
    }

    warnings
}

/// Evaluate statement rules followed by result rules, in fixed order.
pub fn validate_result(
    statement: &FinancialStatement,
    result: &RoicResult,
) -> Vec<QualityWarning> {
    let mut warnings = validate_statement(statement);

    if result.roic.abs() > ROIC_PLAUSIBLE_RANGE {
        warnings.push(QualityWarning::new(
            WarningCode::RoicOutOfRange,
            format!("ROIC {} outside [-1, 1]", result.roic),
        ));
    }

    if let Some(assets) = statement.get(LineItem::TotalAssets)
        && assets > 0.0
        && result.invested_capital < assets * THIN_CAPITAL_RATIO
    {
        warnings.push(QualityWarning::new(
            WarningCode::ThinInvestedCapital,
            format!(
                "invested capital {} is under {:.0}% of total assets {assets}",
                result.invested_capital,
                THIN_CAPITAL_RATIO * 100.0
            ),
        ));
    }

    warnings
}
