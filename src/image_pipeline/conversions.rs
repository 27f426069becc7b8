//! Conversion orchestration
//!
//! [`FilterPipeline`] ties the bitmap reader and writer to a filter
//! operation. [`api`] exposes the per-operation entry points, and
//! [`ExecutionComparison`] reports one operation run both ways.

pub mod api;
mod comparison;
mod filter_pipeline;

#[cfg(test)]
mod tests;

pub use comparison::ExecutionComparison;
pub use filter_pipeline::FilterPipeline;
