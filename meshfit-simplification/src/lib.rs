//! Mesh simplification for textured meshes
//!
//! This crate reduces mesh complexity while keeping the texture mapping
//! usable:
//! - Quadric error metrics extended with texture coordinates
//! - Edge collapse with seam, boundary and normal preservation
//! - Target face counts or reduction ratios

pub mod edge_collapse;
pub mod error;
pub mod options;
pub mod quadric;
pub mod result;

pub use edge_collapse::*;
pub use error::*;
pub use options::*;
pub use result::*;

use meshfit_core::TriangleMesh;

/// Simplify a mesh by reducing the number of faces
pub trait MeshSimplifier {
    /// Simplify `mesh` according to the simplifier's options
    fn simplify(&self, mesh: &TriangleMesh) -> Result<DecimationResult>;
}

/// Decimate with the texture-aware edge collapse simplifier.
pub fn decimate(mesh: &TriangleMesh, options: &SimplifyOptions) -> Result<DecimationResult> {
    EdgeCollapseSimplifier::new(options.clone()).simplify(mesh)
}
