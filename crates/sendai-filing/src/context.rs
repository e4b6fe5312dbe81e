//! Accounting-context resolution.
//!
//! A filing reports every fact under a context scoping the entity, the
//! period, and the consolidation basis. Resolution picks, for a requested
//! fiscal year, the single authoritative current-period consolidated
//! context per period basis — summary and prior-period-comparative
//! contexts carry stale or aggregated figures and are never eligible.

use chrono::NaiveDate;
use quick_xml::Reader;
use quick_xml::events::Event;

use crate::archive::{EntryKind, FilingArchive};
use crate::error::{FilingError, Result};
use crate::facts::FactRecord;

/// Reporting periods run April through March (the EDINET convention).
pub const FISCAL_YEAR_START_MONTH: u32 = 4;
/// Month of the period end.
pub const FISCAL_YEAR_END_MONTH: u32 = 3;
/// Day of the period end.
pub const FISCAL_YEAR_END_DAY: u32 = 31;

/// Suffix marking a non-consolidated context in EDINET context ids.
const NON_CONSOLIDATED_SUFFIX: &str = "_NonConsolidatedMember";

/// Expected reporting period for a fiscal year: April 1 of `Y−1` through
/// March 31 of `Y`.
pub fn fiscal_period(fiscal_year: i32) -> (NaiveDate, NaiveDate) {
    let start = NaiveDate::from_ymd_opt(fiscal_year - 1, FISCAL_YEAR_START_MONTH, 1)
        .expect("fiscal period start is a valid date");
    let end = NaiveDate::from_ymd_opt(fiscal_year, FISCAL_YEAR_END_MONTH, FISCAL_YEAR_END_DAY)
        .expect("fiscal period end is a valid date");
    (start, end)
}

/// Whether a context scopes a point in time or a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodBasis {
    /// Point-in-time context (balance-sheet facts).
    Instant,
    /// Period-span context (income-statement facts).
    Duration,
}

/// A parsed or synthesized context definition.
#[derive(Debug, Clone)]
pub struct PeriodContext {
    /// Context identifier referenced by facts.
    pub context_id: String,
    /// Span start; absent for instant contexts.
    pub period_start: Option<NaiveDate>,
    /// Span end, or the instant itself.
    pub period_end: NaiveDate,
    /// Instant or duration.
    pub basis: PeriodBasis,
    /// False when the context is scoped to non-consolidated figures.
    pub consolidated: bool,
    /// True for summary contexts; never selectable as current.
    pub summary: bool,
    /// True for prior-period comparatives; never selectable as current.
    pub comparative: bool,
    /// True when the context carries segment/member dimensions beyond the
    /// consolidation axis; such breakdowns are not base-statement figures.
    pub dimensioned: bool,
}

/// The authoritative context pair for one fiscal year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPeriod {
    /// Duration context id for flow facts.
    pub duration_id: String,
    /// Instant context id for stock facts.
    pub instant_id: String,
    /// Period start date.
    pub period_start: NaiveDate,
    /// Period end date.
    pub period_end: NaiveDate,
}

impl ResolvedPeriod {
    /// Whether a fact's context is one of the resolved pair.
    pub fn covers(&self, context_id: &str) -> bool {
        context_id == self.duration_id || context_id == self.instant_id
    }
}

/// Resolves the current-period contexts of one filing.
#[derive(Debug)]
pub struct ContextResolver {
    contexts: Vec<PeriodContext>,
}

impl ContextResolver {
    /// Build a resolver over explicit context definitions.
    pub fn new(contexts: Vec<PeriodContext>) -> Self {
        Self { contexts }
    }

    /// Build a resolver for a filing package.
    ///
    /// Context definitions are parsed from the XBRL document entries when
    /// present; a package carrying only the CSV rendition has no
    /// definitions, so contexts are synthesized from the rendition's
    /// context-id naming convention relative to the requested year.
    pub fn from_package(
        archive: &FilingArchive,
        facts: &[FactRecord],
        fiscal_year: i32,
    ) -> Result<Self> {
        let mut contexts = Vec::new();
        for entry in archive.entries_of(EntryKind::XbrlInstance) {
            let text = crate::facts::decode_entry(&entry.bytes)?;
            contexts.extend(parse_contexts(&text)?);
        }
        if contexts.is_empty() {
            contexts = contexts_from_ids(
                facts.iter().map(|f| f.context_id.as_str()),
                fiscal_year,
            );
        }
        Ok(Self::new(contexts))
    }

    /// All known contexts.
    pub fn contexts(&self) -> &[PeriodContext] {
        &self.contexts
    }

    /// Select the single current-period consolidated context for
    /// `fiscal_year` with the given basis.
    ///
    /// Summary, comparative, and dimensioned contexts are excluded first;
    /// among the rest, the context must be consolidated and end exactly on
    /// March 31 of `fiscal_year`. Zero matches fail with
    /// [`FilingError::ContextNotFound`]; several matches fail with
    /// [`FilingError::AmbiguousContext`]. There is deliberately no
    /// nearest-period or non-consolidated fallback — an approximate match
    /// silently corrupts every figure derived downstream.
    pub fn resolve(&self, fiscal_year: i32, basis: PeriodBasis) -> Result<&PeriodContext> {
        let (_, expected_end) = fiscal_period(fiscal_year);
        let mut matches = self
            .contexts
            .iter()
            .filter(|c| !c.summary && !c.comparative && !c.dimensioned)
            .filter(|c| c.basis == basis && c.consolidated && c.period_end == expected_end);

        match (matches.next(), matches.next()) {
            (None, _) => Err(FilingError::ContextNotFound { fiscal_year }),
            (Some(only), None) => Ok(only),
            (Some(first), Some(second)) => {
                let mut candidates = vec![first.context_id.clone(), second.context_id.clone()];
                candidates.extend(matches.map(|c| c.context_id.clone()));
                Err(FilingError::AmbiguousContext {
                    fiscal_year,
                    candidates,
                })
            }
        }
    }

    /// Resolve the (duration, instant) pair used to build a statement.
    pub fn resolve_pair(&self, fiscal_year: i32) -> Result<ResolvedPeriod> {
        let duration = self.resolve(fiscal_year, PeriodBasis::Duration)?;
        let instant = self.resolve(fiscal_year, PeriodBasis::Instant)?;
        let (period_start, period_end) = fiscal_period(fiscal_year);
        Ok(ResolvedPeriod {
            duration_id: duration.context_id.clone(),
            instant_id: instant.context_id.clone(),
            period_start,
            period_end,
        })
    }
}

/// Parse `<xbrli:context>` definitions out of an XBRL document.
pub fn parse_contexts(xml: &str) -> Result<Vec<PeriodContext>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut contexts = Vec::new();
    let mut buf = Vec::new();

    let mut current_id: Option<String> = None;
    let mut start_date: Option<NaiveDate> = None;
    let mut end_date: Option<NaiveDate> = None;
    let mut instant_date: Option<NaiveDate> = None;
    let mut consolidated = true;
    let mut dimensioned = false;
    let mut current_leaf: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if local_name(&name) == "context" {
                    current_id = attribute(e, b"id")?;
                    start_date = None;
                    end_date = None;
                    instant_date = None;
                    consolidated = true;
                    dimensioned = false;
                } else if current_id.is_some() {
                    current_leaf = Some(local_name(&name).to_string());
                }
            }
            Ok(Event::Text(e)) => {
                if current_id.is_some() {
                    let text = e
                        .unescape()
                        .map_err(|err| FilingError::Xml(err.to_string()))?;
                    match current_leaf.as_deref() {
                        Some("startDate") => start_date = parse_date(&text)?,
                        Some("endDate") => end_date = parse_date(&text)?,
                        Some("instant") => instant_date = parse_date(&text)?,
                        Some("explicitMember") => {
                            if text.contains("NonConsolidatedMember") {
                                consolidated = false;
                            } else {
                                dimensioned = true;
                            }
                        }
                        _ => {}
                    }
                }
            }
            Ok(Event::End(ref e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if local_name(&name) == "context" {
                    if let Some(id) = current_id.take() {
                        match classify_period(start_date, end_date, instant_date) {
                            Some((basis, period_start, period_end)) => {
                                contexts.push(PeriodContext {
                                    summary: id.contains("Summary"),
                                    comparative: id.starts_with("Prior"),
                                    context_id: id,
                                    period_start,
                                    period_end,
                                    basis,
                                    consolidated,
                                    dimensioned,
                                });
                            }
                            None => {
                                tracing::warn!(context = %id, "context without a usable period");
                            }
                        }
                    }
                } else {
                    current_leaf = None;
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(FilingError::Xml(e.to_string())),
        }
        buf.clear();
    }

    Ok(contexts)
}

/// Synthesize contexts from EDINET context-id naming for packages that
/// carry only the CSV rendition.
///
/// `CurrentYear…` maps to the requested year, `Prior{n}Year…` to `Y−n`;
/// the `Instant`/`Duration` stem fixes the basis. Ids outside the
/// convention (e.g. `FilingDateInstant`) are skipped.
pub fn contexts_from_ids<'a, I>(ids: I, fiscal_year: i32) -> Vec<PeriodContext>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = std::collections::BTreeSet::new();
    let mut contexts = Vec::new();
    for id in ids {
        if !seen.insert(id.to_string()) {
            continue;
        }
        if let Some(context) = context_from_id(id, fiscal_year) {
            contexts.push(context);
        }
    }
    contexts
}

fn context_from_id(id: &str, fiscal_year: i32) -> Option<PeriodContext> {
    let offset = if id.starts_with("CurrentYear") {
        0
    } else if let Some(rest) = id.strip_prefix("Prior") {
        let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
        digits.parse::<i32>().ok().filter(|_| rest.contains("Year"))?
    } else {
        return None;
    };

    let basis = if id.contains("Instant") {
        PeriodBasis::Instant
    } else if id.contains("Duration") {
        PeriodBasis::Duration
    } else {
        return None;
    };

    let consolidated = !id.contains("NonConsolidated");
    let base = id.strip_suffix(NON_CONSOLIDATED_SUFFIX).unwrap_or(id);
    let dimensioned = base.contains('_');

    let (start, end) = fiscal_period(fiscal_year - offset);
    Some(PeriodContext {
        context_id: id.to_string(),
        period_start: (basis == PeriodBasis::Duration).then_some(start),
        period_end: end,
        basis,
        consolidated,
        summary: id.contains("Summary"),
        comparative: offset > 0,
        dimensioned,
    })
}

fn classify_period(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    instant: Option<NaiveDate>,
) -> Option<(PeriodBasis, Option<NaiveDate>, NaiveDate)> {
    if let Some(instant) = instant {
        Some((PeriodBasis::Instant, None, instant))
    } else if let (Some(start), Some(end)) = (start, end) {
        Some((PeriodBasis::Duration, Some(start), end))
    } else {
        None
    }
}

fn local_name(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

fn attribute(
    e: &quick_xml::events::BytesStart<'_>,
    key: &[u8],
) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| FilingError::Xml(err.to_string()))?;
        if attr.key.as_ref() == key {
            return Ok(Some(String::from_utf8_lossy(&attr.value).into_owned()));
        }
    }
    Ok(None)
}

fn parse_date(text: &str) -> Result<Option<NaiveDate>> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
        .map(Some)
        .map_err(|e| FilingError::Xml(format!("invalid date {text:?}: {e}")))
}
