//! Fact extraction from the XBRL instance document.

use quick_xml::Reader;
use quick_xml::events::Event;

use super::{FactRecord, FactSource, decode_entry, parse_numeric};
use crate::cancel::CancelToken;
use crate::error::{FilingError, Result};

/// Fact source backed by a tagged-markup XBRL document.
///
/// Every leaf element carrying a `contextRef` attribute is a fact; the
/// numeric value is parsed only for facts declared with a `unitRef`
/// (text facts stay non-numeric). Context and unit definitions live in
/// the `xbrli` namespace and carry no `contextRef`, so they fall through
/// untouched.
#[derive(Debug)]
pub struct XmlFactSource {
    xml: String,
}

impl XmlFactSource {
    /// Decode an instance entry into a fact source.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(Self {
            xml: decode_entry(bytes)?,
        })
    }

    /// Wrap an already-decoded document.
    pub fn from_document(xml: &str) -> Self {
        Self {
            xml: xml.to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct PendingFact {
    concept_id: String,
    context_id: String,
    unit_id: Option<String>,
    decimals: Option<i32>,
    raw_value: String,
}

impl PendingFact {
    fn into_record(self) -> FactRecord {
        let numeric_value = self
            .unit_id
            .as_ref()
            .and_then(|_| parse_numeric(&self.raw_value));
        FactRecord {
            concept_id: self.concept_id,
            context_id: self.context_id,
            unit_id: self.unit_id,
            raw_value: self.raw_value,
            numeric_value,
            decimals: self.decimals,
        }
    }
}

fn read_pending(e: &quick_xml::events::BytesStart<'_>) -> Result<Option<PendingFact>> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();

    let mut context_id = None;
    let mut unit_id = None;
    let mut decimals = None;
    for attr in e.attributes() {
        let attr = attr.map_err(|err| FilingError::Xml(err.to_string()))?;
        match attr.key.as_ref() {
            b"contextRef" => {
                context_id = Some(String::from_utf8_lossy(&attr.value).into_owned());
            }
            b"unitRef" => {
                unit_id = Some(String::from_utf8_lossy(&attr.value).into_owned());
            }
            b"decimals" => {
                decimals = String::from_utf8_lossy(&attr.value).parse::<i32>().ok();
            }
            _ => {}
        }
    }

    Ok(context_id.map(|context_id| PendingFact {
        concept_id: name,
        context_id,
        unit_id,
        decimals,
        raw_value: String::new(),
    }))
}

impl FactSource for XmlFactSource {
    fn facts(&self, cancel: &CancelToken) -> Result<Vec<FactRecord>> {
        let mut reader = Reader::from_str(&self.xml);
        reader.config_mut().trim_text(true);

        let mut facts = Vec::new();
        let mut buf = Vec::new();
        let mut pending: Option<PendingFact> = None;
        let mut events = 0usize;

        loop {
            events += 1;
            if events % 512 == 0 {
                cancel.check()?;
            }
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => {
                    if let Some(fact) = read_pending(e)? {
                        pending = Some(fact);
                    }
                }
                Ok(Event::Empty(ref e)) => {
                    // Nil facts: no text content, still a (possibly empty) record.
                    if let Some(fact) = read_pending(e)? {
                        facts.push(fact.into_record());
                    }
                }
                Ok(Event::Text(e)) => {
                    if let Some(fact) = pending.as_mut() {
                        fact.raw_value = e
                            .unescape()
                            .map_err(|err| FilingError::Xml(err.to_string()))?
                            .into_owned();
                    }
                }
                Ok(Event::End(ref e)) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    if let Some(fact) = pending.take() {
                        if fact.concept_id == name {
                            facts.push(fact.into_record());
                        } else {
                            // Closing a wrapper element around the fact; keep waiting.
                            pending = Some(fact);
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => return Err(FilingError::Xml(e.to_string())),
            }
            buf.clear();
        }

        Ok(facts)
    }
}
