//! Fact extraction from the tab-delimited CSV rendition.

use super::{FactRecord, FactSource, decode_entry, parse_numeric};
use crate::cancel::CancelToken;
use crate::error::Result;

/// Fixed rendition column order: display label, concept code, context id,
/// unit, amount.
const COL_CONCEPT: usize = 1;
const COL_CONTEXT: usize = 2;
const COL_UNIT: usize = 3;
const COL_AMOUNT: usize = 4;

/// Fact source backed by one rendition file of the `XBRL_TO_CSV/`
/// directory.
///
/// A blank or non-numeric amount is a text fact, not a parse failure —
/// many rows carry dates, codes, or narrative disclosures.
#[derive(Debug)]
pub struct TabularFactSource {
    text: String,
}

impl TabularFactSource {
    /// Decode a rendition entry (UTF-16LE with BOM, per the EDINET
    /// convention) into a fact source.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(Self {
            text: decode_entry(bytes)?,
        })
    }

    /// Wrap an already-decoded rendition.
    pub fn from_text(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }
}

impl FactSource for TabularFactSource {
    fn facts(&self, cancel: &CancelToken) -> Result<Vec<FactRecord>> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .flexible(true)
            .from_reader(self.text.as_bytes());

        let mut facts = Vec::new();
        for (index, row) in reader.records().enumerate() {
            if index % 256 == 0 {
                cancel.check()?;
            }
            let row = row?;

            let concept_id = row.get(COL_CONCEPT).unwrap_or("").trim();
            let context_id = row.get(COL_CONTEXT).unwrap_or("").trim();
            if concept_id.is_empty() || context_id.is_empty() {
                tracing::debug!(row = index + 1, "rendition row without concept/context");
                continue;
            }

            let unit = row.get(COL_UNIT).unwrap_or("").trim();
            let amount = row.get(COL_AMOUNT).unwrap_or("");

            facts.push(FactRecord {
                concept_id: concept_id.to_string(),
                context_id: context_id.to_string(),
                unit_id: (!unit.is_empty()).then(|| unit.to_string()),
                raw_value: amount.trim().to_string(),
                numeric_value: parse_numeric(amount),
                decimals: None,
            });
        }

        Ok(facts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendition(rows: &[&str]) -> String {
        let mut text =
            String::from("\u{9805}\u{76ee}\u{540d}\tconcept\tcontext\tunit\tamount\n");
        for row in rows {
            text.push_str(row);
            text.push('\n');
        }
        text
    }

    #[test]
    fn test_numeric_rows() {
        let text = rendition(&[
            "NetSales\tjppfs_cor:NetSales\tCurrentYearDuration\tJPY\t1,234,000",
            "Assets\tjppfs_cor:Assets\tCurrentYearInstant\tJPY\t9,000,000",
        ]);
        let facts = TabularFactSource::from_text(&text)
            .facts(&CancelToken::new())
            .unwrap();

        assert_eq!(facts.len(), 2);
        assert_eq!(facts[0].concept_id, "jppfs_cor:NetSales");
        assert_eq!(facts[0].context_id, "CurrentYearDuration");
        assert_eq!(facts[0].unit_id.as_deref(), Some("JPY"));
        assert_eq!(facts[0].numeric_value, Some(1_234_000.0));
        assert!(facts[0].decimals.is_none());
    }

    #[test]
    fn test_blank_amount_is_text_fact() {
        let text = rendition(&[
            "FiscalYearEnd\tjpdei_cor:CurrentFiscalYearEndDateDEI\tFilingDateInstant\t\t2024-03-31",
            "Notes\tjpcrp_cor:NotesConcerningGoingConcern\tCurrentYearDuration\t\t",
        ]);
        let facts = TabularFactSource::from_text(&text)
            .facts(&CancelToken::new())
            .unwrap();

        assert_eq!(facts.len(), 2);
        assert!(facts[0].numeric_value.is_none());
        assert_eq!(facts[0].raw_value, "2024-03-31");
        assert!(facts[1].numeric_value.is_none());
        assert!(facts[1].unit_id.is_none());
    }

    #[test]
    fn test_short_rows_are_skipped() {
        let text = rendition(&["OnlyLabel", "Label\tjppfs_cor:Assets"]);
        let facts = TabularFactSource::from_text(&text)
            .facts(&CancelToken::new())
            .unwrap();
        assert!(facts.is_empty());
    }

    #[test]
    fn test_negative_triangle_amount() {
        let text = rendition(&[
            "OperatingLoss\tjppfs_cor:OperatingIncome\tCurrentYearDuration\tJPY\t\u{25b3}5,500",
        ]);
        let facts = TabularFactSource::from_text(&text)
            .facts(&CancelToken::new())
            .unwrap();
        assert_eq!(facts[0].numeric_value, Some(-5500.0));
    }
}
