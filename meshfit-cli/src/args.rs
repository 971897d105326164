//! Command-line arguments

use crate::logging::LogLevel;
use clap::{Parser, ValueEnum};
use meshfit_core::BoxKind;
use std::path::PathBuf;

/// Bounding box used to measure and display the mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BboxArg {
    /// Axis-aligned box
    Aabb,
    /// Principal-axis (PCA) box
    Oriented,
}

impl From<BboxArg> for BoxKind {
    fn from(arg: BboxArg) -> Self {
        match arg {
            BboxArg::Aabb => BoxKind::Aabb,
            BboxArg::Oriented => BoxKind::Oriented,
        }
    }
}

/// Simplify textured 3D mesh or resize to real scale
#[derive(Parser, Debug, Clone)]
#[command(
    name = "meshfit",
    version,
    about = "Simplify textured 3D mesh or resize to real scale",
    allow_negative_numbers = true
)]
pub struct Args {
    /// Input mesh file path
    #[arg(short, long, value_name = "FILE")]
    pub input: PathBuf,

    /// Output mesh file path
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    /// Enable mesh decimation (texture-aware) instead of resizing
    #[arg(short, long)]
    pub downsample: bool,

    /// Real-world size along the smallest bounding box extent (meters)
    #[arg(long, value_name = "METERS")]
    pub size: Option<f32>,

    /// Target number of faces for decimation
    #[arg(long, value_name = "N")]
    pub target_faces: Option<usize>,

    /// Decimation ratio in [0,1); 0.8 keeps about 20% of the faces
    #[arg(long, value_name = "RATIO")]
    pub reduction_ratio: Option<f64>,

    /// Weight of texture coordinates in the decimation error
    #[arg(long)]
    pub texture_weight: Option<f64>,

    /// Weight of the boundary preservation constraints
    #[arg(long)]
    pub boundary_weight: Option<f64>,

    /// Penalise collapses creating triangles below this quality (0-1)
    #[arg(long)]
    pub quality_threshold: Option<f64>,

    /// Add planar quadrics to keep flat regions well shaped
    #[arg(long)]
    pub planar: bool,

    /// Place collapsed vertices at an endpoint or midpoint instead of the optimum
    #[arg(long)]
    pub no_optimal_placement: bool,

    /// Let decimation move open boundaries
    #[arg(long)]
    pub no_preserve_boundary: bool,

    /// Bounding box used for measuring and display
    #[arg(long, value_enum)]
    pub bbox: Option<BboxArg>,

    /// Do not open the viewer
    #[arg(long)]
    pub no_view: bool,

    /// Hide the bounding box wireframe in the viewer
    #[arg(long)]
    pub no_bbox: bool,

    /// Path to TOML configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log verbosity
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Suppress the progress report
    #[arg(short, long)]
    pub quiet: bool,
}

/// View a mesh file
#[derive(Parser, Debug, Clone)]
#[command(name = "meshfit-view", version, about = "View a mesh with an axis helper and bounding box")]
pub struct ViewArgs {
    /// Mesh file path
    #[arg(value_name = "FILE")]
    pub path: PathBuf,

    /// Hide the bounding box wireframe
    #[arg(long)]
    pub no_bbox: bool,

    /// Bounding box kind
    #[arg(long, value_enum)]
    pub bbox: Option<BboxArg>,

    /// Log verbosity
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_command_definition() {
        Args::command().debug_assert();
        ViewArgs::command().debug_assert();
    }

    #[test]
    fn test_parse_downsample() {
        let args = Args::try_parse_from([
            "meshfit", "-i", "in.obj", "-o", "out.obj", "-d", "--reduction-ratio", "0.8", "--bbox", "oriented",
        ])
        .unwrap();
        assert!(args.downsample);
        assert_eq!(args.reduction_ratio, Some(0.8));
        assert_eq!(args.target_faces, None);
        assert_eq!(args.bbox.map(BoxKind::from), Some(BoxKind::Oriented));
        assert!(!args.no_view);
    }

    #[test]
    fn test_negative_values_reach_validation() {
        let args =
            Args::try_parse_from(["meshfit", "-i", "in.obj", "-o", "out.obj", "--size", "-2", "--reduction-ratio", "-0.1"])
                .unwrap();
        assert_eq!(args.size, Some(-2.0));
        assert_eq!(args.reduction_ratio, Some(-0.1));
    }

    #[test]
    fn test_input_and_output_required() {
        assert!(Args::try_parse_from(["meshfit", "-i", "in.obj"]).is_err());
        assert!(Args::try_parse_from(["meshfit", "-o", "out.obj"]).is_err());
    }
}
