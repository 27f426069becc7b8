use std::fs;
use std::path::Path;

use tracing::warn;

use crate::image_pipeline::common::error::{PipelineError, Result};

pub fn read_input_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| PipelineError::Io(format!("cannot read {}: {}", path.display(), e)))
}

/// Writes `bytes` to `path`. A destination left half-written by a failed
/// write is removed.
pub fn write_output_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Err(e) = fs::write(path, bytes) {
        if path.exists() {
            if let Err(cleanup) = fs::remove_file(path) {
                warn!("Could not remove partial output {}: {}", path.display(), cleanup);
            }
        }
        return Err(PipelineError::Io(format!("cannot write {}: {}", path.display(), e)));
    }
    Ok(())
}
