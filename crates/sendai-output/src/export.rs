//! Export of statements and ROIC results.
//!
//! CSV rows keep absent line items as empty fields rather than zeros —
//! absence survives the round trip to downstream consumers.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use sendai_filing::{FinancialStatement, LineItem};
use sendai_metrics::RoicResult;

/// Errors that can occur during export operations.
#[derive(Debug, Error)]
pub enum ExportError {
    /// CSV serialization error.
    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid format error.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Export format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Comma-separated values format.
    Csv,

    /// Compact JSON format.
    Json,

    /// Pretty-printed JSON format.
    PrettyJson,
}

impl ExportFormat {
    /// Get the file extension for this format.
    pub const fn extension(&self) -> &str {
        match self {
            Self::Csv => "csv",
            Self::Json | Self::PrettyJson => "json",
        }
    }

    /// Parse a format name (`csv` / `json` / `pretty-json`).
    pub fn parse(name: &str) -> Result<Self, ExportError> {
        match name.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "pretty-json" | "pretty_json" => Ok(Self::PrettyJson),
            other => Err(ExportError::InvalidFormat(other.to_string())),
        }
    }
}

/// Flat export row for one financial statement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatementExport {
    /// Filer identifier.
    pub company_id: String,
    /// Fiscal year.
    pub fiscal_year: i32,
    /// Net sales.
    pub net_sales: Option<f64>,
    /// Operating income.
    pub operating_income: Option<f64>,
    /// Gross profit.
    pub gross_profit: Option<f64>,
    /// Selling, general and administrative expenses.
    pub selling_general_admin: Option<f64>,
    /// Non-operating interest income.
    pub interest_income: Option<f64>,
    /// Total assets.
    pub total_assets: Option<f64>,
    /// Cash and equivalents.
    pub cash_and_equivalents: Option<f64>,
    /// Shareholders' equity.
    pub shareholders_equity: Option<f64>,
    /// Interest-bearing debt.
    pub interest_bearing_debt: Option<f64>,
    /// Trade accounts payable.
    pub accounts_payable: Option<f64>,
    /// Accrued expenses.
    pub accrued_expenses: Option<f64>,
    /// Operating-lease expense.
    pub lease_expense: Option<f64>,
    /// Lease obligations.
    pub lease_debt: Option<f64>,
    /// Effective tax rate.
    pub effective_tax_rate: Option<f64>,
}

impl From<&FinancialStatement> for StatementExport {
    fn from(statement: &FinancialStatement) -> Self {
        Self {
            company_id: statement.company_id.clone(),
            fiscal_year: statement.fiscal_year,
            net_sales: statement.get(LineItem::NetSales),
            operating_income: statement.get(LineItem::OperatingIncome),
            gross_profit: statement.get(LineItem::GrossProfit),
            selling_general_admin: statement.get(LineItem::SellingGeneralAdmin),
            interest_income: statement.get(LineItem::InterestIncome),
            total_assets: statement.get(LineItem::TotalAssets),
            cash_and_equivalents: statement.get(LineItem::CashAndEquivalents),
            shareholders_equity: statement.get(LineItem::ShareholdersEquity),
            interest_bearing_debt: statement.get(LineItem::InterestBearingDebt),
            accounts_payable: statement.get(LineItem::AccountsPayable),
            accrued_expenses: statement.get(LineItem::AccruedExpenses),
            lease_expense: statement.get(LineItem::LeaseExpense),
            lease_debt: statement.get(LineItem::LeaseDebt),
            effective_tax_rate: statement.get(LineItem::EffectiveTaxRate),
        }
    }
}

/// Flat export row for one ROIC result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoicExport {
    /// Filer identifier.
    pub company_id: String,
    /// Fiscal year.
    pub fiscal_year: i32,
    /// Methodology the figures were derived under.
    pub method: String,
    /// Net operating profit after tax.
    pub nopat: f64,
    /// Invested capital.
    pub invested_capital: f64,
    /// ROIC ratio.
    pub roic: f64,
    /// Number of advisory warnings attached.
    pub warning_count: usize,
}

impl From<&RoicResult> for RoicExport {
    fn from(result: &RoicResult) -> Self {
        Self {
            company_id: result.company_id.clone(),
            fiscal_year: result.fiscal_year,
            method: result.method.to_string(),
            nopat: result.nopat,
            invested_capital: result.invested_capital,
            roic: result.roic,
            warning_count: result.warnings.len(),
        }
    }
}

/// Writes statements and results to files in a chosen format.
#[derive(Debug, Clone, Copy)]
pub struct Exporter {
    format: ExportFormat,
}

impl Exporter {
    /// Create an exporter for the given format.
    pub const fn new(format: ExportFormat) -> Self {
        Self { format }
    }

    /// The exporter's format.
    pub const fn format(&self) -> ExportFormat {
        self.format
    }

    /// Export statements to `path`.
    pub fn write_statements<P: AsRef<Path>>(
        &self,
        path: P,
        statements: &[FinancialStatement],
    ) -> Result<(), ExportError> {
        let rows: Vec<StatementExport> = statements.iter().map(StatementExport::from).collect();
        self.write_rows(path, &rows)
    }

    /// Export ROIC results to `path`. The full result set including
    /// warnings is preserved in the JSON formats; CSV keeps the flat
    /// figures plus the warning count.
    pub fn write_results<P: AsRef<Path>>(
        &self,
        path: P,
        results: &[RoicResult],
    ) -> Result<(), ExportError> {
        match self.format {
            ExportFormat::Csv => {
                let rows: Vec<RoicExport> = results.iter().map(RoicExport::from).collect();
                self.write_rows(path, &rows)
            }
            ExportFormat::Json | ExportFormat::PrettyJson => self.write_json(path, results),
        }
    }

    fn write_rows<P: AsRef<Path>, T: Serialize>(
        &self,
        path: P,
        rows: &[T],
    ) -> Result<(), ExportError> {
        match self.format {
            ExportFormat::Csv => {
                let mut writer = csv::Writer::from_path(path)?;
                for row in rows {
                    writer.serialize(row)?;
                }
                writer.flush()?;
                Ok(())
            }
            ExportFormat::Json | ExportFormat::PrettyJson => self.write_json(path, rows),
        }
    }

    fn write_json<P: AsRef<Path>, T: Serialize + ?Sized>(
        &self,
        path: P,
        value: &T,
    ) -> Result<(), ExportError> {
        let json = match self.format {
            ExportFormat::PrettyJson => serde_json::to_string_pretty(value)?,
            _ => serde_json::to_string(value)?,
        };
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
