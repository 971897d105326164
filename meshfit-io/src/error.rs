//! Error types for I/O operations

use thiserror::Error;

/// Errors that can occur during I/O operations
#[derive(Error, Debug)]
pub enum IoError {
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid file format: {format}")]
    InvalidFormat { format: String },

    #[error("Parse error in {path}: {message}")]
    ParseError { path: String, message: String },

    #[error("Write error: {message}")]
    WriteError { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<IoError> for meshfit_core::Error {
    fn from(e: IoError) -> Self {
        match e {
            IoError::FileNotFound { path } => meshfit_core::Error::FileNotFound(path),
            IoError::InvalidFormat { format } => meshfit_core::Error::UnsupportedFormat(format),
            IoError::Io(e) => meshfit_core::Error::Io(e),
            other => meshfit_core::Error::InvalidData(other.to_string()),
        }
    }
}
