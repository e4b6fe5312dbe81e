#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/sendai/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod method;
pub mod quality;
pub mod roic;

pub use error::{MetricsError, Result};
pub use method::{Adjustment, MethodSpec, RoicMethod};
pub use quality::{QualityWarning, WarningCode, validate_result, validate_statement};
pub use roic::{RoicResult, compute_roic};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
