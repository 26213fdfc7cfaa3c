use thiserror::Error;

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },
    #[error("invalid options: {0}")]
    InvalidOptions(String),
    #[error("allocation of {bytes} bytes failed")]
    Allocation { bytes: usize },
    #[error("matcher is not initialized")]
    NotInitialized,
    #[error("{what} buffer size mismatch: expected {expected}, got {actual}")]
    SizeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("I/O error: {0}")]
    Io(String),
    #[error("config error: {0}")]
    Config(String),
}
