use rayon::prelude::*;

use crate::image_pipeline::common::context::ProcessingContext;

/// How a per-pixel operation is scheduled. Both modes run the same
/// per-pixel code, so their outputs are byte-identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Execution {
    /// Rows are fanned out over the context's worker pool.
    #[default]
    Parallel,
    /// Rows are processed in order on the calling thread.
    Sequential,
}

impl Execution {
    pub fn label(self) -> &'static str {
        match self {
            Execution::Parallel => "parallel",
            Execution::Sequential => "sequential",
        }
    }
}

/// Calls `f(y, row)` for every `stride`-byte row of `buffer`.
pub fn for_each_row<F>(
    ctx: &ProcessingContext,
    execution: Execution,
    buffer: &mut [u8],
    stride: usize,
    f: F,
) where
    F: Fn(usize, &mut [u8]) + Send + Sync,
{
    match execution {
        Execution::Sequential => buffer
            .chunks_mut(stride)
            .enumerate()
            .for_each(|(y, row)| f(y, row)),
        Execution::Parallel => ctx.install(|| {
            buffer
                .par_chunks_mut(stride)
                .enumerate()
                .for_each(|(y, row)| f(y, row))
        }),
    }
}

/// Evaluates `f` for `0..len` and collects the results in index order.
pub fn map_indices<T, F>(ctx: &ProcessingContext, execution: Execution, len: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Send + Sync,
{
    match execution {
        Execution::Sequential => (0..len).map(f).collect(),
        Execution::Parallel => ctx.install(|| (0..len).into_par_iter().map(f).collect()),
    }
}
