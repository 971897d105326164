//! Core data structures and traits for meshfit
//!
//! This crate provides the textured triangle mesh model shared by the I/O,
//! simplification and visualization crates, together with bounding-box
//! measurement and uniform transforms.

pub mod point;
pub mod mesh;
pub mod bounds;
pub mod traits;
pub mod transform;
pub mod error;

pub use point::*;
pub use mesh::*;
pub use bounds::*;
pub use traits::*;
pub use transform::*;
pub use error::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{Point3, Vector3, Matrix3, Matrix4};

pub type Mesh = TriangleMesh;
