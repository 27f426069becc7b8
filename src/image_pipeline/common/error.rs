use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("I/O failure: {0}")]
    Io(String),

    #[error("Malformed bitmap container: {0}")]
    Format(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid image dimensions: width={0}, height={1}")]
    InvalidDimensions(usize, usize),

    #[error("Insufficient features: {0}")]
    InsufficientFeatures(String),

    #[error("Degenerate geometry: {0}")]
    NumericDegenerate(String),

    #[error("Failed to build worker pool: {0}")]
    WorkerPool(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl PipelineError {
    /// True for the failures that originate in reading or writing files.
    pub fn is_io(&self) -> bool {
        matches!(self, PipelineError::Io(_) | PipelineError::IoError(_))
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
