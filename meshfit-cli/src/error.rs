//! CLI error type and exit codes

use meshfit_simplification::SimplifyError;
use std::path::PathBuf;
use thiserror::Error;

/// Exit code for invalid arguments, configuration or input
pub const EXIT_INPUT_ERROR: u8 = 1;
/// Exit code for failures while processing or writing output
pub const EXIT_PROCESSING_ERROR: u8 = 2;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Input file {} not found", .0.display())]
    InputMissing(PathBuf),

    #[error("failed to read config file {}: {source}", path.display())]
    ConfigRead { path: PathBuf, source: std::io::Error },

    #[error("failed to parse config file {}: {source}", path.display())]
    ConfigParse { path: PathBuf, source: toml::de::Error },

    #[error("{0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Simplify(#[from] SimplifyError),

    #[error("failed to load {}: {source}", path.display())]
    Load { path: PathBuf, source: meshfit_core::Error },

    #[error("Mesh {} has no vertices", .0.display())]
    EmptyMesh(PathBuf),

    #[error("cannot resize: the smallest bounding box extent is zero")]
    ZeroExtent,

    #[error("failed to save {}: {source}", path.display())]
    Save { path: PathBuf, source: meshfit_core::Error },

    #[error("viewer failed: {0}")]
    View(meshfit_core::Error),
}

impl CliError {
    /// Process exit code: 1 for validation and input errors, 2 for
    /// processing and output errors
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::InputMissing(_)
            | CliError::ConfigRead { .. }
            | CliError::ConfigParse { .. }
            | CliError::InvalidArgument(_)
            | CliError::Load { .. }
            | CliError::EmptyMesh(_)
            | CliError::ZeroExtent => EXIT_INPUT_ERROR,
            CliError::Simplify(e) if e.is_parameter_error() => EXIT_INPUT_ERROR,
            CliError::Simplify(_) | CliError::Save { .. } | CliError::View(_) => EXIT_PROCESSING_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::InputMissing(PathBuf::from("a.obj")).exit_code(), 1);
        assert_eq!(CliError::Simplify(SimplifyError::MissingTarget).exit_code(), 1);
        assert_eq!(CliError::Simplify(SimplifyError::EmptyMesh).exit_code(), 2);
        let save = CliError::Save {
            path: PathBuf::from("out.obj"),
            source: meshfit_core::Error::UnsupportedFormat("xyz".to_string()),
        };
        assert_eq!(save.exit_code(), 2);
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            CliError::InputMissing(PathBuf::from("models/a.obj")).to_string(),
            "Input file models/a.obj not found"
        );
        assert_eq!(
            CliError::Simplify(SimplifyError::ConflictingTarget).to_string(),
            "target_faces and reduction_ratio are mutually exclusive"
        );
    }
}
