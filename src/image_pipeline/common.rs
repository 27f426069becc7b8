//! Common utilities module
//!
//! Error taxonomy, step timings, execution modes and the processing context
//! shared by the filter and stitching pipelines.

pub mod context;
pub mod error;
pub mod execution;
pub mod files;
pub mod timing;

pub use context::{ProcessingContext, ProcessingContextBuilder};
pub use error::{PipelineError, Result};
pub use execution::Execution;
pub use timing::{PipelineTimings, StepKind, StepTiming, Timer};
