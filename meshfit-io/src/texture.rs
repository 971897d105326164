//! Texture file handling for writers
//!
//! Writers reference textures by file name relative to the written mesh, so
//! texture images are copied next to the output file.

use meshfit_core::{Material, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Copy every material texture into `out_dir` and return materials whose
/// texture paths are relative file names.
///
/// A texture that does not exist on disk is kept as a bare file name and a
/// warning is logged; the mesh is still written.
pub fn export_textures(materials: &[Material], out_dir: &Path) -> Result<Vec<Material>> {
    let mut exported = Vec::with_capacity(materials.len());
    for material in materials {
        let mut material = material.clone();
        if let Some(source) = material.diffuse_texture.take() {
            let file_name = match source.file_name() {
                Some(name) => PathBuf::from(name),
                None => {
                    log::warn!("material '{}' has an invalid texture path", material.name);
                    exported.push(material);
                    continue;
                }
            };
            let target = out_dir.join(&file_name);
            if source.is_file() {
                if !same_file(&source, &target) {
                    fs::copy(&source, &target)?;
                    log::debug!("copied texture {} -> {}", source.display(), target.display());
                }
            } else if !target.is_file() {
                log::warn!("texture {} not found; writing reference only", source.display());
            }
            material.diffuse_texture = Some(file_name);
        }
        exported.push(material);
    }
    Ok(exported)
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Resolve a texture reference found in a file located in `base_dir`.
pub(crate) fn resolve_texture(base_dir: &Path, reference: &str) -> PathBuf {
    let reference = reference.trim().replace('\\', "/");
    let path = Path::new(&reference);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_export_copies_texture() {
        let src_dir = tempdir().unwrap();
        let out_dir = tempdir().unwrap();
        let texture = src_dir.path().join("albedo.png");
        fs::write(&texture, b"not really a png").unwrap();

        let materials = vec![
            Material::with_texture("skin", &texture),
            Material::new("plain"),
        ];
        let exported = export_textures(&materials, out_dir.path()).unwrap();
        assert_eq!(exported[0].diffuse_texture.as_deref(), Some(Path::new("albedo.png")));
        assert!(exported[1].diffuse_texture.is_none());
        assert!(out_dir.path().join("albedo.png").is_file());
    }

    #[test]
    fn test_export_missing_texture_keeps_reference() {
        let out_dir = tempdir().unwrap();
        let materials = vec![Material::with_texture("m", "/nonexistent/dir/tex.jpg")];
        let exported = export_textures(&materials, out_dir.path()).unwrap();
        assert_eq!(exported[0].diffuse_texture.as_deref(), Some(Path::new("tex.jpg")));
    }

    #[test]
    fn test_resolve_texture() {
        let base = Path::new("/data/models");
        assert_eq!(resolve_texture(base, "tex\\a.png"), PathBuf::from("/data/models/tex/a.png"));
        assert_eq!(resolve_texture(base, "/abs/b.png"), PathBuf::from("/abs/b.png"));
    }
}
