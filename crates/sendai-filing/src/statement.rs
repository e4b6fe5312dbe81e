//! Canonical line-item mapping and statement building.
//!
//! Taxonomies spell the same accounting fact a dozen ways; the concept
//! dictionary folds the common EDINET (`jppfs`/`jpcrp`) and IFRS
//! (`jpigp`) variants onto one canonical line item each, the way the
//! statement consumer thinks about them.

use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::context::ResolvedPeriod;
use crate::error::{FilingError, Result};
use crate::facts::FactRecord;

/// Canonical financial-statement line items.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum LineItem {
    /// Net sales / revenue.
    NetSales,
    /// Operating income.
    OperatingIncome,
    /// Gross profit.
    GrossProfit,
    /// Selling, general and administrative expenses.
    SellingGeneralAdmin,
    /// Non-operating interest income.
    InterestIncome,
    /// Total assets.
    TotalAssets,
    /// Cash and cash equivalents / cash and deposits.
    CashAndEquivalents,
    /// Shareholders' equity.
    ShareholdersEquity,
    /// Interest-bearing debt.
    InterestBearingDebt,
    /// Trade accounts payable.
    AccountsPayable,
    /// Accrued expenses.
    AccruedExpenses,
    /// Operating-lease expense.
    LeaseExpense,
    /// Lease obligations / lease liabilities.
    LeaseDebt,
    /// Effective income tax rate (ratio, not an amount).
    EffectiveTaxRate,
    /// Goodwill.
    Goodwill,
    /// Income taxes for the period; used to derive the effective rate.
    IncomeTaxes,
    /// Income before income taxes; used to derive the effective rate.
    PretaxIncome,
}

/// Immutable concept-id → line-item mapping, loaded once per process.
#[derive(Debug)]
pub struct ConceptDictionary {
    mappings: HashMap<&'static str, LineItem>,
}

static DICTIONARY: LazyLock<ConceptDictionary> = LazyLock::new(ConceptDictionary::with_defaults);

impl ConceptDictionary {
    /// The process-wide dictionary; read-only after first use and safely
    /// shared across workers without locking.
    pub fn global() -> &'static Self {
        &DICTIONARY
    }

    /// Build the dictionary with the standard EDINET/IFRS variants.
    fn with_defaults() -> Self {
        use LineItem::*;

        let entries: &[(&'static str, LineItem)] = &[
            ("jppfs_cor:NetSales", NetSales),
            ("jppfs_cor:OperatingRevenue1", NetSales),
            ("jpigp_cor:RevenueIFRS", NetSales),
            ("jppfs_cor:OperatingIncome", OperatingIncome),
            ("jpigp_cor:OperatingProfitLossIFRS", OperatingIncome),
            ("jppfs_cor:GrossProfit", GrossProfit),
            ("jpigp_cor:GrossProfitIFRS", GrossProfit),
            (
                "jppfs_cor:SellingGeneralAndAdministrativeExpenses",
                SellingGeneralAdmin,
            ),
            ("jppfs_cor:InterestIncomeNOI", InterestIncome),
            ("jpigp_cor:InterestIncomeIFRS", InterestIncome),
            ("jppfs_cor:Assets", TotalAssets),
            ("jpigp_cor:AssetsIFRS", TotalAssets),
            ("jppfs_cor:CashAndDeposits", CashAndEquivalents),
            ("jpigp_cor:CashAndCashEquivalentsIFRS", CashAndEquivalents),
            ("jppfs_cor:ShareholdersEquity", ShareholdersEquity),
            (
                "jpigp_cor:EquityAttributableToOwnersOfParentIFRS",
                ShareholdersEquity,
            ),
            ("jppfs_cor:InterestBearingDebt", InterestBearingDebt),
            ("jpigp_cor:BorrowingsIFRS", InterestBearingDebt),
            ("jppfs_cor:AccountsPayableTrade", AccountsPayable),
            ("jppfs_cor:NotesAndAccountsPayableTrade", AccountsPayable),
            ("jpigp_cor:TradeAndOtherPayablesCLIFRS", AccountsPayable),
            ("jppfs_cor:AccruedExpenses", AccruedExpenses),
            ("jpigp_cor:AccruedExpensesCLIFRS", AccruedExpenses),
            ("jppfs_cor:RentExpensesSGA", LeaseExpense),
            (
                "jpcrp_cor:TotalLeasePaymentsUnderOperatingLeases",
                LeaseExpense,
            ),
            ("jppfs_cor:LeaseObligations", LeaseDebt),
            ("jpigp_cor:LeaseLiabilitiesIFRS", LeaseDebt),
            ("jppfs_cor:EffectiveIncomeTaxRate", EffectiveTaxRate),
            (
                "jpcrp_cor:EffectiveIncomeTaxRateAfterApplicationOfTaxEffectAccounting",
                EffectiveTaxRate,
            ),
            ("jppfs_cor:Goodwill", Goodwill),
            ("jpigp_cor:GoodwillIFRS", Goodwill),
            ("jppfs_cor:IncomeTaxes", IncomeTaxes),
            ("jpigp_cor:IncomeTaxExpenseIFRS", IncomeTaxes),
            ("jppfs_cor:IncomeBeforeIncomeTaxes", PretaxIncome),
            ("jpigp_cor:ProfitLossBeforeTaxIFRS", PretaxIncome),
        ];

        Self {
            mappings: entries.iter().copied().collect(),
        }
    }

    /// Canonical line item for a concept id, if one is mapped.
    pub fn lookup(&self, concept_id: &str) -> Option<LineItem> {
        self.mappings.get(concept_id).copied()
    }

    /// Number of mapped concept variants.
    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    /// Whether the dictionary is empty.
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

/// A canonical per-company, per-fiscal-year financial statement.
///
/// Absent line items stay absent — absence is distinct from zero and
/// propagates as such to every consumer. The ordered map keeps repeated
/// runs byte-identical when serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialStatement {
    /// Filer identifier (EDINET code).
    pub company_id: String,
    /// Fiscal year the statement covers (period ends March 31 of it).
    pub fiscal_year: i32,
    /// Canonical line items resolved from exactly one context pair.
    pub line_items: BTreeMap<LineItem, f64>,
}

impl FinancialStatement {
    /// Value of a line item, when disclosed.
    pub fn get(&self, item: LineItem) -> Option<f64> {
        self.line_items.get(&item).copied()
    }

    /// Net sales, when disclosed.
    pub fn net_sales(&self) -> Option<f64> {
        self.get(LineItem::NetSales)
    }

    /// Operating income, when disclosed.
    pub fn operating_income(&self) -> Option<f64> {
        self.get(LineItem::OperatingIncome)
    }

    /// Total assets, when disclosed.
    pub fn total_assets(&self) -> Option<f64> {
        self.get(LineItem::TotalAssets)
    }

    /// Shareholders' equity, when disclosed.
    pub fn shareholders_equity(&self) -> Option<f64> {
        self.get(LineItem::ShareholdersEquity)
    }

    /// Effective tax rate, tagged or derived.
    pub fn effective_tax_rate(&self) -> Option<f64> {
        self.get(LineItem::EffectiveTaxRate)
    }
}

/// Builds a [`FinancialStatement`] from extracted facts and a resolved
/// context pair.
#[derive(Debug)]
pub struct StatementBuilder<'d> {
    dictionary: &'d ConceptDictionary,
}

impl Default for StatementBuilder<'static> {
    fn default() -> Self {
        Self::new(ConceptDictionary::global())
    }
}

impl<'d> StatementBuilder<'d> {
    /// Build over an explicit dictionary (tests may want a narrow one).
    pub const fn new(dictionary: &'d ConceptDictionary) -> Self {
        Self { dictionary }
    }

    /// Map facts bearing the resolved contexts into a statement.
    ///
    /// Two concepts folding onto one line item must agree; disagreement is
    /// [`FilingError::ConflictingFact`], never a silently picked value.
    pub fn build(
        &self,
        facts: &[FactRecord],
        resolved: &ResolvedPeriod,
        company_id: &str,
        fiscal_year: i32,
        cancel: &CancelToken,
    ) -> Result<FinancialStatement> {
        let mut chosen: BTreeMap<LineItem, (String, f64)> = BTreeMap::new();

        for (index, fact) in facts.iter().enumerate() {
            if index % 256 == 0 {
                cancel.check()?;
            }
            if !resolved.covers(&fact.context_id) {
                continue;
            }
            let Some(item) = self.dictionary.lookup(&fact.concept_id) else {
                continue;
            };
            let Some(value) = fact.numeric_value else {
                continue;
            };

            match chosen.get(&item) {
                None => {
                    chosen.insert(item, (fact.concept_id.clone(), value));
                }
                Some((prior_concept, prior_value)) => {
                    if *prior_value != value {
                        tracing::warn!(
                            line_item = ?item,
                            first = %prior_concept,
                            second = %fact.concept_id,
                            "conflicting values for one line item"
                        );
                        return Err(FilingError::ConflictingFact { line_item: item });
                    }
                }
            }
        }

        let mut line_items: BTreeMap<LineItem, f64> =
            chosen.into_iter().map(|(k, (_, v))| (k, v)).collect();
        derive_tax_rate(&mut line_items);

        Ok(FinancialStatement {
            company_id: company_id.to_string(),
            fiscal_year,
            line_items,
        })
    }
}

/// Fill in the effective tax rate from period taxes over pre-tax income
/// when the rate itself is untagged. Derivation from same-context facts,
/// not substitution: with neither source present the item stays absent.
fn derive_tax_rate(line_items: &mut BTreeMap<LineItem, f64>) {
    if line_items.contains_key(&LineItem::EffectiveTaxRate) {
        return;
    }
    let (Some(&taxes), Some(&pretax)) = (
        line_items.get(&LineItem::IncomeTaxes),
        line_items.get(&LineItem::PretaxIncome),
    ) else {
        return;
    };
    if pretax > 0.0 {
        line_items.insert(LineItem::EffectiveTaxRate, taxes / pretax);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::fiscal_period;

    fn fact(concept: &str, context: &str, value: Option<f64>) -> FactRecord {
        FactRecord {
            concept_id: concept.to_string(),
            context_id: context.to_string(),
            unit_id: Some("JPY".to_string()),
            raw_value: value.map(|v| v.to_string()).unwrap_or_default(),
            numeric_value: value,
            decimals: Some(0),
        }
    }

    fn resolved() -> ResolvedPeriod {
        let (period_start, period_end) = fiscal_period(2024);
        ResolvedPeriod {
            duration_id: "CurrentYearDuration".to_string(),
            instant_id: "CurrentYearInstant".to_string(),
            period_start,
            period_end,
        }
    }

    #[test]
    fn test_maps_facts_through_dictionary() {
        let facts = vec![
            fact("jppfs_cor:NetSales", "CurrentYearDuration", Some(5000.0)),
            fact("jppfs_cor:Assets", "CurrentYearInstant", Some(12_000.0)),
            fact("jppfs_cor:UnmappedThing", "CurrentYearDuration", Some(1.0)),
            fact("jppfs_cor:NetSales", "Prior1YearDuration", Some(4000.0)),
        ];
        let statement = StatementBuilder::default()
            .build(&facts, &resolved(), "E00001", 2024, &CancelToken::new())
            .unwrap();

        assert_eq!(statement.net_sales(), Some(5000.0));
        assert_eq!(statement.total_assets(), Some(12_000.0));
        assert_eq!(statement.line_items.len(), 2);
    }

    #[test]
    fn test_conflicting_concepts_fail() {
        let facts = vec![
            fact("jppfs_cor:NetSales", "CurrentYearDuration", Some(5000.0)),
            fact(
                "jppfs_cor:OperatingRevenue1",
                "CurrentYearDuration",
                Some(5100.0),
            ),
        ];
        let result = StatementBuilder::default().build(
            &facts,
            &resolved(),
            "E00001",
            2024,
            &CancelToken::new(),
        );
        assert!(matches!(
            result,
            Err(FilingError::ConflictingFact {
                line_item: LineItem::NetSales
            })
        ));
    }

    #[test]
    fn test_agreeing_duplicates_collapse() {
        let facts = vec![
            fact("jppfs_cor:NetSales", "CurrentYearDuration", Some(5000.0)),
            fact(
                "jppfs_cor:OperatingRevenue1",
                "CurrentYearDuration",
                Some(5000.0),
            ),
        ];
        let statement = StatementBuilder::default()
            .build(&facts, &resolved(), "E00001", 2024, &CancelToken::new())
            .unwrap();
        assert_eq!(statement.net_sales(), Some(5000.0));
    }

    #[test]
    fn test_absent_items_stay_absent() {
        let facts = vec![fact(
            "jppfs_cor:NetSales",
            "CurrentYearDuration",
            Some(5000.0),
        )];
        let statement = StatementBuilder::default()
            .build(&facts, &resolved(), "E00001", 2024, &CancelToken::new())
            .unwrap();
        assert_eq!(statement.get(LineItem::LeaseExpense), None);
        assert_ne!(statement.get(LineItem::LeaseExpense), Some(0.0));
    }

    #[test]
    fn test_tax_rate_derivation() {
        let facts = vec![
            fact("jppfs_cor:IncomeTaxes", "CurrentYearDuration", Some(300.0)),
            fact(
                "jppfs_cor:IncomeBeforeIncomeTaxes",
                "CurrentYearDuration",
                Some(1000.0),
            ),
        ];
        let statement = StatementBuilder::default()
            .build(&facts, &resolved(), "E00001", 2024, &CancelToken::new())
            .unwrap();
        assert_eq!(statement.effective_tax_rate(), Some(0.3));
    }

    #[test]
    fn test_tagged_tax_rate_wins_over_derivation() {
        let facts = vec![
            fact(
                "jppfs_cor:EffectiveIncomeTaxRate",
                "CurrentYearDuration",
                Some(0.28),
            ),
            fact("jppfs_cor:IncomeTaxes", "CurrentYearDuration", Some(300.0)),
            fact(
                "jppfs_cor:IncomeBeforeIncomeTaxes",
                "CurrentYearDuration",
                Some(1000.0),
            ),
        ];
        let statement = StatementBuilder::default()
            .build(&facts, &resolved(), "E00001", 2024, &CancelToken::new())
            .unwrap();
        assert_eq!(statement.effective_tax_rate(), Some(0.28));
    }

    #[test]
    fn test_no_tax_rate_without_sources() {
        let facts = vec![fact(
            "jppfs_cor:NetSales",
            "CurrentYearDuration",
            Some(5000.0),
        )];
        let statement = StatementBuilder::default()
            .build(&facts, &resolved(), "E00001", 2024, &CancelToken::new())
            .unwrap();
        assert_eq!(statement.effective_tax_rate(), None);
    }

    #[test]
    fn test_dictionary_is_shared_and_populated() {
        let dictionary = ConceptDictionary::global();
        assert!(!dictionary.is_empty());
        assert_eq!(
            dictionary.lookup("jppfs_cor:Assets"),
            Some(LineItem::TotalAssets)
        );
        assert_eq!(dictionary.lookup("us-gaap:Assets"), None);
        assert!(std::ptr::eq(dictionary, ConceptDictionary::global()));
    }
}
