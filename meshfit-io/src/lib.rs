//! I/O operations for textured meshes
//!
//! This crate reads and writes OBJ (with MTL material libraries) and PLY
//! meshes, keeping texture coordinates, materials and texture images intact.

pub mod error;
pub mod obj;
pub mod ply;
pub mod registry;
pub mod texture;

pub use error::*;
pub use crate::obj::{read_mtl, texture_file_name, ObjReader, ObjWriter};
pub use ply::{PlyReader, PlyWriter};
pub use registry::{IoRegistry, MeshReader, MeshWriter};
pub use texture::export_textures;

use meshfit_core::{Result, TriangleMesh};
use std::path::Path;

/// Auto-detect format and read mesh
pub fn read_mesh<P: AsRef<Path>>(path: P) -> Result<TriangleMesh> {
    let path = path.as_ref();
    let mesh = IoRegistry::with_default_formats().read_mesh(path)?;
    mesh.validate()?;
    log::info!(
        "loaded {}: {} vertices, {} faces",
        path.display(),
        mesh.vertex_count(),
        mesh.face_count()
    );
    Ok(mesh)
}

/// Write a mesh in the format implied by the path's extension.
/// Missing parent directories are created.
pub fn write_mesh<P: AsRef<Path>>(mesh: &TriangleMesh, path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    IoRegistry::with_default_formats().write_mesh(mesh, path)?;
    log::info!(
        "saved {}: {} vertices, {} faces",
        path.display(),
        mesh.vertex_count(),
        mesh.face_count()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshfit_core::{Error, Point3f};
    use tempfile::tempdir;

    fn tetrahedron() -> TriangleMesh {
        TriangleMesh::from_vertices_and_faces(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(0.0, 1.0, 0.0),
                Point3f::new(0.0, 0.0, 1.0),
            ],
            vec![[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]],
        )
    }

    #[test]
    fn test_auto_format_roundtrip() {
        let dir = tempdir().unwrap();
        let mesh = tetrahedron();
        for name in ["nested/out.obj", "out.ply"] {
            let path = dir.path().join(name);
            write_mesh(&mesh, &path).unwrap();
            let loaded = read_mesh(&path).unwrap();
            assert_eq!(loaded.vertex_count(), 4);
            assert_eq!(loaded.face_count(), 4);
            assert_eq!(loaded.faces, mesh.faces);
        }
    }

    #[test]
    fn test_read_missing_file() {
        let result = read_mesh("/definitely/not/here.obj");
        assert!(matches!(result, Err(Error::FileNotFound(p)) if p.contains("here.obj")));
    }
}
