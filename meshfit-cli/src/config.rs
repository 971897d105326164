//! Optional TOML configuration
//!
//! ```toml
//! log_level = "info"
//!
//! [simplify]
//! texture_weight = 2.0
//! boundary_weight = 3.0
//!
//! [view]
//! show = false
//! bbox_kind = "oriented"
//! ```
//!
//! Command-line flags override values from the file.

use crate::error::CliError;
use crate::logging::LogLevel;
use meshfit_core::BoxKind;
use meshfit_simplification::{SimplifyOptions, Target};
use meshfit_visualization::AXIS_LENGTH;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub log_level: Option<LogLevel>,
    pub simplify: SimplifyConfig,
    pub view: ViewConfig,
}

/// Decimation tuning; the target always comes from the command line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimplifyConfig {
    pub texture_weight: f64,
    pub preserve_boundary: bool,
    pub boundary_weight: f64,
    pub quality_threshold: f64,
    pub planar: bool,
    pub optimal_placement: bool,
    pub preserve_normal: bool,
    pub preserve_seams: bool,
}

impl Default for SimplifyConfig {
    fn default() -> Self {
        let defaults = SimplifyOptions::default();
        Self {
            texture_weight: defaults.texture_weight,
            preserve_boundary: defaults.preserve_boundary,
            boundary_weight: defaults.boundary_weight,
            quality_threshold: defaults.quality_threshold,
            planar: defaults.planar,
            optimal_placement: defaults.optimal_placement,
            preserve_normal: defaults.preserve_normal,
            preserve_seams: defaults.preserve_seams,
        }
    }
}

impl SimplifyConfig {
    pub fn to_options(&self, target: Target) -> SimplifyOptions {
        SimplifyOptions {
            target: Some(target),
            texture_weight: self.texture_weight,
            preserve_boundary: self.preserve_boundary,
            boundary_weight: self.boundary_weight,
            quality_threshold: self.quality_threshold,
            planar: self.planar,
            optimal_placement: self.optimal_placement,
            preserve_normal: self.preserve_normal,
            preserve_seams: self.preserve_seams,
        }
    }
}

/// Viewer behaviour and the box used for display and resizing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewConfig {
    /// Open the viewer after processing
    pub show: bool,
    /// Draw the bounding box wireframe
    pub bbox: bool,
    pub bbox_kind: BoxKind,
    pub axis_length: f32,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            show: true,
            bbox: true,
            bbox_kind: BoxKind::Aabb,
            axis_length: AXIS_LENGTH,
        }
    }
}

impl Config {
    /// Load the config file, or defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self, CliError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = fs::read_to_string(path).map_err(|source| CliError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| CliError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }
}
