//! ROIC method registry.
//!
//! The four methodologies share one evaluation routine; what differs
//! between them is data, not code: which line items they require and
//! which weighted adjustment terms they apply to the pre-tax operating
//! base and to invested capital. Keeping the recipes declarative stops
//! the methods drifting apart as they are maintained.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use sendai_filing::LineItem;

/// ROIC computation methodology.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RoicMethod {
    /// NOPAT over operating capital, no lease treatment.
    Standard,
    /// IFRS16-style full operating-lease add-back.
    Adjusted,
    /// Capitalized-lease-equivalent charge and goodwill exclusion.
    Conservative,
    /// Lease add-back plus exclusion of non-operating interest income.
    Aggressive,
}

impl RoicMethod {
    /// All methods, in registry order.
    pub const ALL: [Self; 4] = [
        Self::Standard,
        Self::Adjusted,
        Self::Conservative,
        Self::Aggressive,
    ];

    /// Registry name of the method.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Adjusted => "adjusted",
            Self::Conservative => "conservative",
            Self::Aggressive => "aggressive",
        }
    }

    /// The method's recipe.
    pub const fn spec(&self) -> &'static MethodSpec {
        match self {
            Self::Standard => &STANDARD,
            Self::Adjusted => &ADJUSTED,
            Self::Conservative => &CONSERVATIVE,
            Self::Aggressive => &AGGRESSIVE,
        }
    }
}

impl fmt::Display for RoicMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RoicMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "adjusted" => Ok(Self::Adjusted),
            "conservative" => Ok(Self::Conservative),
            "aggressive" => Ok(Self::Aggressive),
            other => Err(format!("unknown ROIC method: {other}")),
        }
    }
}

/// A weighted line-item term added to a base figure.
pub type Adjustment = (LineItem, f64);

/// Declarative recipe for one ROIC methodology.
#[derive(Debug, Clone)]
pub struct MethodSpec {
    /// Method this spec describes.
    pub method: RoicMethod,
    /// What the method measures.
    pub description: &'static str,
    /// Line items that must be disclosed for the method to run.
    pub required: &'static [LineItem],
    /// Weighted terms applied to operating income before tax.
    pub pretax_adjustments: &'static [Adjustment],
    /// Weighted terms applied to invested capital.
    pub capital_adjustments: &'static [Adjustment],
    /// Capital terms applied only when the item happens to be disclosed.
    pub optional_capital_adjustments: &'static [Adjustment],
}

/// Inputs every method needs before its own terms.
const BASE_REQUIRED: [LineItem; 6] = [
    LineItem::OperatingIncome,
    LineItem::EffectiveTaxRate,
    LineItem::TotalAssets,
    LineItem::CashAndEquivalents,
    LineItem::AccountsPayable,
    LineItem::AccruedExpenses,
];

static STANDARD: MethodSpec = MethodSpec {
    method: RoicMethod::Standard,
    description: "Operating income after tax over operating invested capital",
    required: &BASE_REQUIRED,
    pretax_adjustments: &[],
    capital_adjustments: &[],
    optional_capital_adjustments: &[],
};

static ADJUSTED: MethodSpec = MethodSpec {
    method: RoicMethod::Adjusted,
    description: "Full operating-lease add-back with capitalized lease liability",
    required: &[
        LineItem::OperatingIncome,
        LineItem::EffectiveTaxRate,
        LineItem::TotalAssets,
        LineItem::CashAndEquivalents,
        LineItem::AccountsPayable,
        LineItem::AccruedExpenses,
        LineItem::LeaseExpense,
        LineItem::LeaseDebt,
    ],
    pretax_adjustments: &[(LineItem::LeaseExpense, 1.0)],
    capital_adjustments: &[(LineItem::LeaseDebt, 1.0)],
    optional_capital_adjustments: &[],
};

static CONSERVATIVE: MethodSpec = MethodSpec {
    method: RoicMethod::Conservative,
    description: "Capitalized-lease-equivalent charge, goodwill excluded when disclosed",
    required: &[
        LineItem::OperatingIncome,
        LineItem::EffectiveTaxRate,
        LineItem::TotalAssets,
        LineItem::CashAndEquivalents,
        LineItem::AccountsPayable,
        LineItem::AccruedExpenses,
        LineItem::LeaseExpense,
    ],
    pretax_adjustments: &[(LineItem::LeaseExpense, -1.0)],
    capital_adjustments: &[],
    optional_capital_adjustments: &[(LineItem::Goodwill, -1.0)],
};

static AGGRESSIVE: MethodSpec = MethodSpec {
    method: RoicMethod::Aggressive,
    description: "Lease add-back, non-operating interest income out of the tax base",
    required: &[
        LineItem::OperatingIncome,
        LineItem::EffectiveTaxRate,
        LineItem::TotalAssets,
        LineItem::CashAndEquivalents,
        LineItem::AccountsPayable,
        LineItem::AccruedExpenses,
        LineItem::LeaseExpense,
        LineItem::LeaseDebt,
        LineItem::InterestIncome,
    ],
    pretax_adjustments: &[
        (LineItem::LeaseExpense, 1.0),
        (LineItem::InterestIncome, -1.0),
    ],
    capital_adjustments: &[(LineItem::LeaseDebt, 1.0)],
    optional_capital_adjustments: &[],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_round_trips_through_names() {
        for method in RoicMethod::ALL {
            assert_eq!(method.name().parse::<RoicMethod>().unwrap(), method);
        }
        assert!("napkin".parse::<RoicMethod>().is_err());
    }

    #[test]
    fn test_every_spec_requires_the_base_inputs() {
        for method in RoicMethod::ALL {
            let spec = method.spec();
            assert_eq!(spec.method, method);
            for item in BASE_REQUIRED {
                assert!(
                    spec.required.contains(&item),
                    "{method} is missing base requirement {item:?}"
                );
            }
        }
    }

    #[test]
    fn test_adjustment_items_are_required_or_optional() {
        for method in RoicMethod::ALL {
            let spec = method.spec();
            for (item, _) in spec.pretax_adjustments.iter().chain(spec.capital_adjustments) {
                assert!(
                    spec.required.contains(item),
                    "{method} adjusts by {item:?} without requiring it"
                );
            }
            for (item, _) in spec.optional_capital_adjustments {
                assert!(
                    !spec.required.contains(item),
                    "{method} lists {item:?} as both required and optional"
                );
            }
        }
    }

    #[test]
    fn test_lease_treatment_differs_by_method() {
        assert!(STANDARD.pretax_adjustments.is_empty());
        assert_eq!(ADJUSTED.pretax_adjustments[0].1, 1.0);
        assert_eq!(CONSERVATIVE.pretax_adjustments[0].1, -1.0);
        assert_eq!(AGGRESSIVE.pretax_adjustments.len(), 2);
    }
}
