#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/sendai/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod archive;
pub mod cache;
pub mod cancel;
pub mod client;
pub mod context;
pub mod error;
pub mod facts;
pub mod statement;

pub use archive::{ArchiveEntry, EntryKind, FilingArchive};
pub use cache::FilingCache;
pub use cancel::CancelToken;
pub use client::{DocumentInfo, EdinetClient, PackageKind};
pub use context::{ContextResolver, PeriodBasis, PeriodContext, ResolvedPeriod, fiscal_period};
pub use error::{FilingError, Result};
pub use facts::{FactRecord, FactSource, TabularFactSource, XmlFactSource, extract_facts};
pub use statement::{ConceptDictionary, FinancialStatement, LineItem, StatementBuilder};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
