//! Error types for mesh simplification

use thiserror::Error;

/// Errors that can occur while validating parameters or decimating
#[derive(Debug, Error)]
pub enum SimplifyError {
    #[error("You must specify either target_faces or reduction_ratio")]
    MissingTarget,

    #[error("target_faces and reduction_ratio are mutually exclusive")]
    ConflictingTarget,

    #[error("reduction_ratio must be within [0, 1)")]
    InvalidRatio(f64),

    #[error("target_faces must be greater than 0")]
    InvalidTargetCount(usize),

    #[error("{name} must be a finite, non-negative number (got {value})")]
    InvalidWeight { name: &'static str, value: f64 },

    #[error("quality_threshold must be within [0, 1] (got {0})")]
    InvalidQualityThreshold(f64),

    #[error("Mesh has no faces")]
    EmptyMesh,

    #[error("Invalid mesh: {0}")]
    InvalidMesh(#[from] meshfit_core::Error),
}

impl SimplifyError {
    /// True for errors caused by user-supplied parameters rather than data
    pub fn is_parameter_error(&self) -> bool {
        !matches!(self, Self::EmptyMesh | Self::InvalidMesh(_))
    }
}

/// Result type for simplification operations
pub type Result<T> = std::result::Result<T, SimplifyError>;
