//! Per-call processing context.
//!
//! Carries the worker count and the rayon pool every parallel region runs
//! in, together with the dimension limits applied to decoded images. A
//! context is passed explicitly into each operation so operations stay
//! reentrant and independently testable.

use std::sync::Arc;

use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

use crate::image_pipeline::common::error::{PipelineError, Result};

/// Largest width or height accepted when dimension validation is on.
pub const DEFAULT_MAX_DIMENSION: usize = 50_000;

#[derive(Debug, Clone)]
pub struct ProcessingContext {
    requested_workers: usize,
    pool: Arc<ThreadPool>,
    /// Whether decoded images are checked against `max_dimension`.
    pub validate_dimensions: bool,
    /// Upper bound for width and height, `None` for unbounded.
    pub max_dimension: Option<usize>,
}

impl ProcessingContext {
    /// Context with default settings and one worker per logical CPU.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    pub fn builder() -> ProcessingContextBuilder {
        ProcessingContextBuilder::default()
    }

    /// Number of threads parallel variants run on.
    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Rebuilds the worker pool. `0` selects one worker per logical CPU.
    ///
    /// Operations already holding a clone of this context keep their old
    /// pool until they finish.
    pub fn set_workers(&mut self, workers: usize) -> Result<()> {
        self.pool = Arc::new(build_pool(workers)?);
        self.requested_workers = workers;
        Ok(())
    }

    /// The worker count as it was requested, before `0` was resolved.
    pub fn requested_workers(&self) -> usize {
        self.requested_workers
    }

    pub fn install<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }
}

fn build_pool(workers: usize) -> Result<ThreadPool> {
    let pool = ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("bmp-worker-{i}"))
        .build()
        .map_err(|e| PipelineError::WorkerPool(e.to_string()))?;
    debug!("Worker pool ready with {} threads", pool.current_num_threads());
    Ok(pool)
}

#[derive(Default)]
pub struct ProcessingContextBuilder {
    workers: Option<usize>,
    validate_dimensions: Option<bool>,
    max_dimension: Option<Option<usize>>,
}

impl ProcessingContextBuilder {
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn validate_dimensions(mut self, validate: bool) -> Self {
        self.validate_dimensions = Some(validate);
        self
    }

    pub fn max_dimension(mut self, max: Option<usize>) -> Self {
        self.max_dimension = Some(max);
        self
    }

    pub fn build(self) -> Result<ProcessingContext> {
        let workers = self.workers.unwrap_or(0);
        Ok(ProcessingContext {
            requested_workers: workers,
            pool: Arc::new(build_pool(workers)?),
            validate_dimensions: self.validate_dimensions.unwrap_or(true),
            max_dimension: self.max_dimension.unwrap_or(Some(DEFAULT_MAX_DIMENSION)),
        })
    }
}
