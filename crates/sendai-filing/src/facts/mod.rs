//! Fact extraction from filing-package entries.
//!
//! Both source shapes produce the same flat [`FactRecord`] stream: the
//! XBRL instance via [`XmlFactSource`] and the tab-delimited rendition via
//! [`TabularFactSource`]. Precedence between them lives in
//! [`extract_facts`], not in the sources themselves.

pub mod csv;
pub mod xml;

pub use csv::TabularFactSource;
pub use xml::XmlFactSource;

use crate::archive::{EntryKind, FilingArchive};
use crate::cancel::CancelToken;
use crate::error::{FilingError, Result};

/// One extracted fact, uniform across source shapes.
///
/// Records are produced once and never mutated; `(concept_id, context_id)`
/// is the logical key, and duplicates with disagreeing values are a
/// data-quality condition surfaced at statement building rather than
/// resolved last-wins here.
#[derive(Debug, Clone, PartialEq)]
pub struct FactRecord {
    /// Taxonomy concept identifier, e.g. `jppfs_cor:OperatingIncome`.
    pub concept_id: String,
    /// Accounting context the fact is reported under.
    pub context_id: String,
    /// Unit reference when the fact is declared with one.
    pub unit_id: Option<String>,
    /// Verbatim source text of the value.
    pub raw_value: String,
    /// Parsed numeric value; absent for text facts.
    pub numeric_value: Option<f64>,
    /// Declared decimals precision when the source carries it.
    pub decimals: Option<i32>,
}

/// Capability of producing fact records from one package entry.
pub trait FactSource {
    /// Parse the entry into fact records, checking `cancel` at loop
    /// boundaries.
    fn facts(&self, cancel: &CancelToken) -> Result<Vec<FactRecord>>;
}

/// Extract facts from a filing package.
///
/// The CSV rendition is the primary source when it yields facts, since it
/// is the least ambiguous to tabulate; the XBRL instance is the fallback.
/// The two are never merged. Fails with
/// [`FilingError::NoExtractableContent`] when no entry produces a fact.
pub fn extract_facts(archive: &FilingArchive, cancel: &CancelToken) -> Result<Vec<FactRecord>> {
    cancel.check()?;

    if archive.has_csv_rendition() {
        match collect(archive, EntryKind::CsvRendition, cancel) {
            Ok(facts) if !facts.is_empty() => return Ok(facts),
            Ok(_) => tracing::warn!("CSV rendition present but yielded no facts"),
            Err(e @ FilingError::Cancelled) => return Err(e),
            Err(e) => tracing::warn!(error = %e, "CSV rendition unparseable"),
        }
    }

    if archive.has_xbrl_instance() {
        match collect(archive, EntryKind::XbrlInstance, cancel) {
            Ok(facts) if !facts.is_empty() => return Ok(facts),
            Ok(_) => tracing::warn!("XBRL entries present but yielded no facts"),
            Err(e @ FilingError::Cancelled) => return Err(e),
            Err(e) => tracing::warn!(error = %e, "XBRL entries unparseable"),
        }
    }

    Err(FilingError::NoExtractableContent(
        "no package entry produced a fact".to_string(),
    ))
}

fn collect(
    archive: &FilingArchive,
    kind: EntryKind,
    cancel: &CancelToken,
) -> Result<Vec<FactRecord>> {
    let mut facts = Vec::new();
    for entry in archive.entries_of(kind) {
        cancel.check()?;
        let entry_facts = match kind {
            EntryKind::CsvRendition => {
                TabularFactSource::from_bytes(&entry.bytes)?.facts(cancel)?
            }
            EntryKind::XbrlInstance => XmlFactSource::from_bytes(&entry.bytes)?.facts(cancel)?,
            EntryKind::Other => Vec::new(),
        };
        tracing::debug!(entry = %entry.name, count = entry_facts.len(), "facts extracted");
        facts.extend(entry_facts);
    }
    Ok(facts)
}

/// Decode an entry's bytes, honoring a leading byte-order mark.
///
/// EDINET rendition files are UTF-16LE with a BOM; instances are UTF-8.
pub(crate) fn decode_entry(bytes: &[u8]) -> Result<String> {
    let encoding = encoding_rs::Encoding::for_bom(bytes)
        .map(|(encoding, _)| encoding)
        .unwrap_or(encoding_rs::UTF_8);
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(FilingError::Encoding(format!(
            "undecodable bytes for {}",
            encoding.name()
        )));
    }
    Ok(text.into_owned())
}

/// Parse an amount field into a numeric value.
///
/// Blank fields and placeholder dashes are non-numeric facts, not errors.
/// Thousands separators are stripped; `△` marks a negative amount in some
/// renditions.
pub(crate) fn parse_numeric(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "-" || trimmed == "－" || trimmed == "―" {
        return None;
    }
    let (negated, body) = match trimmed.strip_prefix('△') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let cleaned: String = body.chars().filter(|c| *c != ',').collect();
    cleaned
        .parse::<f64>()
        .ok()
        .map(|v| if negated { -v } else { v })
}
