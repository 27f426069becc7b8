use crate::image_pipeline::common::PipelineTimings;

/// Timings of one operation run in parallel and then sequentially over the
/// same input.
#[derive(Debug)]
pub struct ExecutionComparison {
    pub parallel: PipelineTimings,
    pub sequential: PipelineTimings,
    /// Whether the reported seconds leave out file reads and writes.
    pub exclude_io: bool,
}

impl ExecutionComparison {
    fn seconds(&self, timings: &PipelineTimings) -> f64 {
        let duration = if self.exclude_io {
            timings.processing_duration()
        } else {
            timings.total_duration()
        };
        duration.as_secs_f64()
    }

    pub fn parallel_seconds(&self) -> f64 {
        self.seconds(&self.parallel)
    }

    pub fn sequential_seconds(&self) -> f64 {
        self.seconds(&self.sequential)
    }

    /// Sequential time over parallel time, 0 when the parallel run was too
    /// fast to measure.
    pub fn speedup(&self) -> f64 {
        let parallel = self.parallel_seconds();
        if parallel > 0.0 { self.sequential_seconds() / parallel } else { 0.0 }
    }
}
