//! Visualization for meshfit meshes
//!
//! This crate provides an interactive viewer built on wgpu and winit:
//! - Scene assembly (textured or coloured mesh, axis helper, box wireframe)
//! - Orbit camera controls
//! - Lambert-shaded rendering

pub mod camera;
pub mod renderer;
pub mod scene;
pub mod shaders;
pub mod viewer;

pub use camera::*;
pub use renderer::*;
pub use scene::*;
pub use viewer::*;

use meshfit_core::{Result, TriangleMesh};

/// Show a mesh in an interactive viewer, blocking until the window closes
pub fn show_mesh(mesh: &TriangleMesh, options: ViewOptions) -> Result<()> {
    log::info!(
        "Opening viewer for {} vertices, {} faces",
        mesh.vertex_count(),
        mesh.face_count()
    );
    Viewer::new(mesh, options).run()
}
