//! Integration tests for export round trips.

use std::collections::BTreeMap;

use rstest::rstest;
use sendai_filing::{FinancialStatement, LineItem};
use sendai_metrics::{RoicMethod, RoicResult};
use sendai_output::{ExportFormat, Exporter, RoicExport, StatementExport};

fn statement() -> FinancialStatement {
    FinancialStatement {
        company_id: "E00001".to_string(),
        fiscal_year: 2024,
        line_items: [
            (LineItem::NetSales, 5_000_000.0),
            (LineItem::OperatingIncome, 800_000.0),
            (LineItem::TotalAssets, 9_000_000.0),
            (LineItem::EffectiveTaxRate, 0.3),
        ]
        .into_iter()
        .collect::<BTreeMap<_, _>>(),
    }
}

fn result() -> RoicResult {
    RoicResult {
        company_id: "E00001".to_string(),
        fiscal_year: 2024,
        method: RoicMethod::Standard,
        nopat: 560_000.0,
        invested_capital: 6_400_000.0,
        roic: 0.0875,
        warnings: Vec::new(),
    }
}

#[test]
fn test_csv_statement_export_blanks_absent_items() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("statements.csv");

    Exporter::new(ExportFormat::Csv)
        .write_statements(&path, &[statement()])
        .unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let mut lines = text.lines();
    let header = lines.next().unwrap();
    let row = lines.next().unwrap();

    assert!(header.starts_with("company_id,fiscal_year,net_sales"));
    assert!(row.contains("E00001,2024,5000000"));
    // lease_expense and lease_debt are undisclosed: empty fields, not 0.
    assert!(row.contains(",,"));
    assert!(!row.contains(",0,"));
}

#[rstest]
#[case::compact(ExportFormat::Json)]
#[case::pretty(ExportFormat::PrettyJson)]
fn test_json_result_export_round_trips(#[case] format: ExportFormat) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results.json");

    Exporter::new(format)
        .write_results(&path, &[result()])
        .unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let parsed: Vec<RoicResult> = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed, vec![result()]);
}

#[test]
fn test_csv_result_export_has_flat_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results.csv");

    Exporter::new(ExportFormat::Csv)
        .write_results(&path, &[result()])
        .unwrap();

    let mut reader = csv::Reader::from_path(&path).unwrap();
    let rows: Vec<RoicExport> = reader
        .deserialize()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].method, "standard");
    assert_eq!(rows[0].roic, 0.0875);
}

#[test]
fn test_statement_export_from_conversion() {
    let export = StatementExport::from(&statement());
    assert_eq!(export.company_id, "E00001");
    assert_eq!(export.operating_income, Some(800_000.0));
    assert_eq!(export.accounts_payable, None);
}
