//! NOPAT, invested capital, and ROIC derivation.

use serde::{Deserialize, Serialize};

use crate::error::{MetricsError, Result};
use crate::method::RoicMethod;
use crate::quality::QualityWarning;
use sendai_filing::{FinancialStatement, LineItem};

/// Derived ROIC figures for one (company, fiscal year, method) request.
///
/// Immutable once constructed; warnings are attached by the caller after
/// quality validation and never change the figures themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoicResult {
    /// Filer identifier.
    pub company_id: String,
    /// Fiscal year of the underlying statement.
    pub fiscal_year: i32,
    /// Methodology the figures were derived under.
    pub method: RoicMethod,
    /// Net operating profit after tax.
    pub nopat: f64,
    /// Capital base used as the denominator.
    pub invested_capital: f64,
    /// `nopat / invested_capital`.
    pub roic: f64,
    /// Advisory findings, in rule order.
    pub warnings: Vec<QualityWarning>,
}

/// Derive ROIC from a statement under one method's recipe.
///
/// Every input is sourced from the statement; nothing is defaulted. A
/// missing required item fails with [`MetricsError::InsufficientData`]
/// and a non-positive capital base with [`MetricsError::Calculation`] —
/// the alternative, computing with substituted figures, is precisely the
/// failure mode this engine exists to rule out.
pub fn compute_roic(statement: &FinancialStatement, method: RoicMethod) -> Result<RoicResult> {
    let spec = method.spec();

    let require = |item: LineItem| -> Result<f64> {
        statement
            .get(item)
            .ok_or(MetricsError::InsufficientData {
                method,
                missing: item,
            })
    };

    for &item in spec.required {
        require(item)?;
    }

    let operating_income = require(LineItem::OperatingIncome)?;
    let tax_rate = require(LineItem::EffectiveTaxRate)?;

    let mut pretax = operating_income;
    for &(item, weight) in spec.pretax_adjustments {
        pretax += weight * require(item)?;
    }
    let nopat = pretax * (1.0 - tax_rate);

    let mut invested_capital = require(LineItem::TotalAssets)?
        - require(LineItem::CashAndEquivalents)?
        - (require(LineItem::AccountsPayable)? + require(LineItem::AccruedExpenses)?);
    for &(item, weight) in spec.capital_adjustments {
        invested_capital += weight * require(item)?;
    }
    for &(item, weight) in spec.optional_capital_adjustments {
        if let Some(value) = statement.get(item) {
            invested_capital += weight * value;
        }
    }

    if invested_capital <= 0.0 {
        return Err(MetricsError::Calculation {
            reason: "non-positive invested capital".to_string(),
        });
    }

    let roic = nopat / invested_capital;
    tracing::debug!(
        company = %statement.company_id,
        fiscal_year = statement.fiscal_year,
        %method,
        nopat,
        invested_capital,
        roic,
        "ROIC derived"
    );

    Ok(RoicResult {
        company_id: statement.company_id.clone(),
        fiscal_year: statement.fiscal_year,
        method,
        nopat,
        invested_capital,
        roic,
        warnings: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::collections::BTreeMap;

    fn statement(items: &[(LineItem, f64)]) -> FinancialStatement {
        FinancialStatement {
            company_id: "E00001".to_string(),
            fiscal_year: 2024,
            line_items: items.iter().copied().collect::<BTreeMap<_, _>>(),
        }
    }

    fn base_items() -> Vec<(LineItem, f64)> {
        vec![
            (LineItem::OperatingIncome, 100.0),
            (LineItem::EffectiveTaxRate, 0.3),
            (LineItem::TotalAssets, 1000.0),
            (LineItem::CashAndEquivalents, 100.0),
            (LineItem::AccountsPayable, 50.0),
            (LineItem::AccruedExpenses, 50.0),
        ]
    }

    #[test]
    fn test_standard_worked_example() {
        let result = compute_roic(&statement(&base_items()), RoicMethod::Standard).unwrap();

        assert_relative_eq!(result.nopat, 70.0);
        assert_relative_eq!(result.invested_capital, 800.0);
        assert_relative_eq!(result.roic, 0.0875);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_adjusted_adds_back_lease() {
        let mut items = base_items();
        items.push((LineItem::LeaseExpense, 20.0));
        items.push((LineItem::LeaseDebt, 120.0));

        let result = compute_roic(&statement(&items), RoicMethod::Adjusted).unwrap();
        assert_relative_eq!(result.nopat, 84.0); // (100 + 20) * 0.7
        assert_relative_eq!(result.invested_capital, 920.0); // 800 + 120
    }

    #[test]
    fn test_aggressive_excludes_interest_income() {
        let mut items = base_items();
        items.push((LineItem::LeaseExpense, 20.0));
        items.push((LineItem::LeaseDebt, 120.0));
        items.push((LineItem::InterestIncome, 10.0));

        let result = compute_roic(&statement(&items), RoicMethod::Aggressive).unwrap();
        assert_relative_eq!(result.nopat, 77.0); // (100 + 20 - 10) * 0.7
        assert_relative_eq!(result.invested_capital, 920.0);
    }

    #[test]
    fn test_conservative_charges_lease_and_excludes_goodwill() {
        let mut items = base_items();
        items.push((LineItem::LeaseExpense, 20.0));
        items.push((LineItem::Goodwill, 100.0));

        let result = compute_roic(&statement(&items), RoicMethod::Conservative).unwrap();
        assert_relative_eq!(result.nopat, 56.0); // (100 - 20) * 0.7
        assert_relative_eq!(result.invested_capital, 700.0); // 800 - 100
    }

    #[test]
    fn test_conservative_without_goodwill_still_computes() {
        let mut items = base_items();
        items.push((LineItem::LeaseExpense, 20.0));

        let result = compute_roic(&statement(&items), RoicMethod::Conservative).unwrap();
        assert_relative_eq!(result.invested_capital, 800.0);
    }

    #[test]
    fn test_missing_lease_expense_is_insufficient_data() {
        let result = compute_roic(&statement(&base_items()), RoicMethod::Adjusted);
        assert!(matches!(
            result,
            Err(MetricsError::InsufficientData {
                method: RoicMethod::Adjusted,
                missing: LineItem::LeaseExpense,
            })
        ));
    }

    #[test]
    fn test_missing_tax_rate_is_never_defaulted() {
        let items: Vec<_> = base_items()
            .into_iter()
            .filter(|(item, _)| *item != LineItem::EffectiveTaxRate)
            .collect();
        let result = compute_roic(&statement(&items), RoicMethod::Standard);
        assert!(matches!(
            result,
            Err(MetricsError::InsufficientData {
                missing: LineItem::EffectiveTaxRate,
                ..
            })
        ));
    }

    #[test]
    fn test_non_positive_invested_capital_fails() {
        let mut items = base_items();
        items.retain(|(item, _)| *item != LineItem::CashAndEquivalents);
        items.push((LineItem::CashAndEquivalents, 900.0));

        let result = compute_roic(&statement(&items), RoicMethod::Standard);
        match result {
            Err(MetricsError::Calculation { reason }) => {
                assert_eq!(reason, "non-positive invested capital");
            }
            other => panic!("expected calculation error, got {other:?}"),
        }
    }
}
