#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/sendai/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod batch;
pub mod pipeline;

// Re-export main types from sub-crates
pub use sendai_filing as filing;
pub use sendai_metrics as metrics;
pub use sendai_output as output;

// Re-export the pipeline surface
pub use batch::{
    BatchConfig, BatchOutcome, BatchRunner, CachedFetcher, DirectoryFetcher, FilingFetcher,
    RequestKey,
};
pub use pipeline::{PipelineError, RoicOutcome, RoicRequest, run_pipeline};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
