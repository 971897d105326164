//! Format registry for format-agnostic mesh reading and writing
//!
//! Downstream crates load and save meshes through [`IoRegistry`] without
//! knowing which format handler does the work. Formats are chosen by file
//! extension, with a header sniff as fallback for reading.

use crate::obj::{ObjReader, ObjWriter};
use crate::ply::{PlyReader, PlyWriter};
use meshfit_core::{Error, Result, TriangleMesh};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Trait for reading meshes from files
pub trait MeshReader: Send + Sync {
    /// Read a mesh from the given path
    fn read_mesh(&self, path: &Path) -> Result<TriangleMesh>;

    /// Check if this reader can handle the given file by examining its header
    fn can_read(&self, path: &Path) -> bool;

    /// Get the format name this reader handles
    fn format_name(&self) -> &'static str;
}

/// Trait for writing meshes to files
pub trait MeshWriter: Send + Sync {
    /// Write a mesh to the given path
    fn write_mesh(&self, mesh: &TriangleMesh, path: &Path) -> Result<()>;

    /// Get the format name this writer handles
    fn format_name(&self) -> &'static str;
}

/// IO registry that manages format handlers and provides unified access
pub struct IoRegistry {
    mesh_readers: HashMap<String, Box<dyn MeshReader>>,
    mesh_writers: HashMap<String, Box<dyn MeshWriter>>,
}

impl IoRegistry {
    /// Create a new empty IO registry
    pub fn new() -> Self {
        Self {
            mesh_readers: HashMap::new(),
            mesh_writers: HashMap::new(),
        }
    }

    /// Registry with the OBJ and PLY handlers
    pub fn with_default_formats() -> Self {
        let mut registry = Self::new();
        registry.register_mesh_reader("obj", Box::new(ObjReader));
        registry.register_mesh_writer("obj", Box::new(ObjWriter));
        registry.register_mesh_reader("ply", Box::new(PlyReader));
        registry.register_mesh_writer("ply", Box::new(PlyWriter::new()));
        registry
    }

    /// Register a mesh reader for a file extension
    pub fn register_mesh_reader(&mut self, format: &str, handler: Box<dyn MeshReader>) {
        self.mesh_readers.insert(format.to_lowercase(), handler);
    }

    /// Register a mesh writer for a file extension
    pub fn register_mesh_writer(&mut self, format: &str, handler: Box<dyn MeshWriter>) {
        self.mesh_writers.insert(format.to_lowercase(), handler);
    }

    /// Read a mesh, choosing the handler by extension then by header
    pub fn read_mesh(&self, path: &Path) -> Result<TriangleMesh> {
        if !path.exists() {
            return Err(Error::FileNotFound(path.display().to_string()));
        }
        let hint = extension_of(path);

        if let Some(reader) = hint.as_deref().and_then(|h| self.mesh_readers.get(h)) {
            if reader.can_read(path) {
                log::debug!("reading {} as {}", path.display(), reader.format_name());
                return reader.read_mesh(path);
            }
        }

        if let Some(detected) = self.detect_format_by_header(path) {
            if let Some(reader) = self.mesh_readers.get(&detected) {
                log::debug!("reading {} as detected {}", path.display(), detected);
                return reader.read_mesh(path);
            }
        }

        // Let the extension's reader report its own parse error
        if let Some(reader) = hint.as_deref().and_then(|h| self.mesh_readers.get(h)) {
            return reader.read_mesh(path);
        }

        Err(Error::UnsupportedFormat(format!(
            "No mesh reader found for {}",
            path.display()
        )))
    }

    /// Write a mesh with the handler registered for the path's extension
    pub fn write_mesh(&self, mesh: &TriangleMesh, path: &Path) -> Result<()> {
        let hint = extension_of(path).unwrap_or_default();
        match self.mesh_writers.get(&hint) {
            Some(writer) => {
                log::debug!("writing {} as {}", path.display(), writer.format_name());
                writer.write_mesh(mesh, path)
            }
            None => Err(Error::UnsupportedFormat(format!(
                "No mesh writer found for format: {:?}",
                hint
            ))),
        }
    }

    /// Detect file format by examining the header/magic bytes
    fn detect_format_by_header(&self, path: &Path) -> Option<String> {
        let mut file = File::open(path).ok()?;
        let mut header = [0u8; 16];
        let bytes_read = file.read(&mut header).ok()?;
        if bytes_read < 3 {
            return None;
        }
        if header.starts_with(b"ply") {
            return Some("ply".to_string());
        }
        self.mesh_readers
            .iter()
            .find(|(name, reader)| name.as_str() != "ply" && reader.can_read(path))
            .map(|(name, _)| name.clone())
    }

    /// Formats that can be read
    pub fn supported_mesh_formats(&self) -> Vec<String> {
        let mut formats: Vec<String> = self.mesh_readers.keys().cloned().collect();
        formats.sort();
        formats
    }

    /// Check if a format is supported for reading meshes
    pub fn supports_mesh_reading(&self, format: &str) -> bool {
        self.mesh_readers.contains_key(&format.to_lowercase())
    }

    /// Check if a format is supported for writing meshes
    pub fn supports_mesh_writing(&self, format: &str) -> bool {
        self.mesh_writers.contains_key(&format.to_lowercase())
    }
}

impl Default for IoRegistry {
    fn default() -> Self {
        Self::with_default_formats()
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|s| s.to_str())
        .map(str::to_lowercase)
}
