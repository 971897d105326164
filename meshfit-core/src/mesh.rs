//! Mesh data structures and functionality

use crate::error::{Error, Result};
use crate::point::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Surface material referenced by faces of a mesh
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    /// Diffuse colour (`Kd`) in linear [0, 1] range
    pub diffuse: Option<[f32; 3]>,
    /// Diffuse texture image (`map_Kd` / `TextureFile`)
    pub diffuse_texture: Option<PathBuf>,
}

impl Material {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_texture<S: Into<String>, P: Into<PathBuf>>(name: S, texture: P) -> Self {
        Self {
            name: name.into(),
            diffuse: None,
            diffuse_texture: Some(texture.into()),
        }
    }
}

/// Wedge texture coordinates.
///
/// UVs are stored per face corner so that a vertex sitting on a texture seam
/// can carry one coordinate per adjacent chart. `faces[f][c]` indexes into
/// `coords` for corner `c` of mesh face `f`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UvLayer {
    pub coords: Vec<Uv>,
    pub faces: Vec<[usize; 3]>,
}

impl UvLayer {
    pub fn new(coords: Vec<Uv>, faces: Vec<[usize; 3]>) -> Self {
        Self { coords, faces }
    }

    /// Build a layer from one coordinate per vertex (no seams).
    pub fn per_vertex(coords: Vec<Uv>, mesh_faces: &[[usize; 3]]) -> Self {
        Self {
            coords,
            faces: mesh_faces.to_vec(),
        }
    }

    /// Texture coordinate of corner `corner` of face `face`
    pub fn corner(&self, face: usize, corner: usize) -> Uv {
        self.coords[self.faces[face][corner]]
    }

    /// Make every UV index owned by a single vertex.
    ///
    /// Some files share one `vt` entry between unrelated vertices. Seam
    /// detection needs a (uv -> vertex) mapping, so shared entries are
    /// duplicated. Returns the number of coordinates added.
    pub fn split_shared_wedges(&mut self, mesh_faces: &[[usize; 3]]) -> usize {
        let mut owner: Vec<Option<usize>> = vec![None; self.coords.len()];
        let mut remap: HashMap<(usize, usize), usize> = HashMap::new();
        let mut added = 0;

        for (fi, face) in mesh_faces.iter().enumerate() {
            for c in 0..3 {
                let t = self.faces[fi][c];
                let v = face[c];
                match owner[t] {
                    None => owner[t] = Some(v),
                    Some(o) if o == v => {}
                    Some(_) => {
                        let idx = match remap.get(&(t, v)) {
                            Some(&idx) => idx,
                            None => {
                                let uv = self.coords[t];
                                self.coords.push(uv);
                                let idx = self.coords.len() - 1;
                                remap.insert((t, v), idx);
                                added += 1;
                                idx
                            }
                        };
                        self.faces[fi][c] = idx;
                    }
                }
            }
        }

        if added > 0 {
            log::debug!("split {} shared texture coordinates", added);
        }
        added
    }
}

/// A triangle mesh with optional normals, colours, wedge UVs and materials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriangleMesh {
    pub vertices: Vec<Point3f>,
    pub faces: Vec<[usize; 3]>,
    pub normals: Option<Vec<Vector3f>>,
    pub colors: Option<Vec<[u8; 3]>>,
    #[serde(default)]
    pub uv: Option<UvLayer>,
    #[serde(default)]
    pub materials: Vec<Material>,
    #[serde(default)]
    pub face_materials: Option<Vec<usize>>,
}

impl TriangleMesh {
    /// Create a new empty mesh
    pub fn new() -> Self {
        Self::from_vertices_and_faces(Vec::new(), Vec::new())
    }

    /// Create a mesh from vertices and faces
    pub fn from_vertices_and_faces(vertices: Vec<Point3f>, faces: Vec<[usize; 3]>) -> Self {
        Self {
            vertices,
            faces,
            normals: None,
            colors: None,
            uv: None,
            materials: Vec::new(),
            face_materials: None,
        }
    }

    /// Get the number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Get the number of faces
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Check if the mesh is empty
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.faces.is_empty()
    }

    /// Add a vertex to the mesh
    pub fn add_vertex(&mut self, vertex: Point3f) -> usize {
        let index = self.vertices.len();
        self.vertices.push(vertex);
        index
    }

    /// Add a face to the mesh
    pub fn add_face(&mut self, face: [usize; 3]) {
        self.faces.push(face);
    }

    /// Corner positions of face `face`
    pub fn triangle(&self, face: usize) -> [Point3f; 3] {
        let [a, b, c] = self.faces[face];
        [self.vertices[a], self.vertices[b], self.vertices[c]]
    }

    /// Calculate face normals. Degenerate faces get +Z.
    pub fn calculate_face_normals(&self) -> Vec<Vector3f> {
        self.faces
            .iter()
            .map(|face| {
                let v0 = self.vertices[face[0]];
                let v1 = self.vertices[face[1]];
                let v2 = self.vertices[face[2]];

                let edge1 = v1 - v0;
                let edge2 = v2 - v0;

                edge1
                    .cross(&edge2)
                    .try_normalize(f32::EPSILON)
                    .unwrap_or_else(Vector3f::z)
            })
            .collect()
    }

    /// Recompute per-vertex normals as area-weighted face normal averages.
    pub fn compute_vertex_normals(&mut self) {
        let mut accum = vec![Vector3f::zeros(); self.vertices.len()];
        for face in &self.faces {
            let v0 = self.vertices[face[0]];
            let v1 = self.vertices[face[1]];
            let v2 = self.vertices[face[2]];
            // Unnormalised cross product weights by twice the area
            let n = (v1 - v0).cross(&(v2 - v0));
            for &vi in face {
                accum[vi] += n;
            }
        }
        let normals = accum
            .into_iter()
            .map(|n| n.try_normalize(f32::EPSILON).unwrap_or_else(Vector3f::z))
            .collect();
        self.normals = Some(normals);
    }

    /// Set vertex normals
    pub fn set_normals(&mut self, normals: Vec<Vector3f>) {
        if normals.len() == self.vertices.len() {
            self.normals = Some(normals);
        }
    }

    /// Set vertex colors
    pub fn set_colors(&mut self, colors: Vec<[u8; 3]>) {
        if colors.len() == self.vertices.len() {
            self.colors = Some(colors);
        }
    }

    /// Attach a wedge UV layer
    pub fn set_uv(&mut self, uv: UvLayer) -> Result<()> {
        if uv.faces.len() != self.faces.len() {
            return Err(Error::InvalidData(format!(
                "UV layer has {} faces, mesh has {}",
                uv.faces.len(),
                self.faces.len()
            )));
        }
        self.uv = Some(uv);
        Ok(())
    }

    /// Assign materials and the per-face material table
    pub fn set_materials(&mut self, materials: Vec<Material>, face_materials: Vec<usize>) -> Result<()> {
        if face_materials.len() != self.faces.len() {
            return Err(Error::InvalidData(format!(
                "material table has {} entries, mesh has {} faces",
                face_materials.len(),
                self.faces.len()
            )));
        }
        if let Some(&bad) = face_materials.iter().find(|&&m| m >= materials.len()) {
            return Err(Error::InvalidData(format!(
                "face references material {} but only {} defined",
                bad,
                materials.len()
            )));
        }
        self.materials = materials;
        self.face_materials = Some(face_materials);
        Ok(())
    }

    /// Material of a face, if any
    pub fn face_material(&self, face: usize) -> Option<&Material> {
        let index = match &self.face_materials {
            Some(table) => *table.get(face)?,
            None => 0,
        };
        self.materials.get(index)
    }

    /// True when the mesh has texture coordinates and at least one textured material
    pub fn has_texture(&self) -> bool {
        self.uv.is_some() && self.materials.iter().any(|m| m.diffuse_texture.is_some())
    }

    /// Check index and attribute consistency.
    pub fn validate(&self) -> Result<()> {
        let nv = self.vertices.len();
        for (fi, face) in self.faces.iter().enumerate() {
            if let Some(&bad) = face.iter().find(|&&v| v >= nv) {
                return Err(Error::InvalidData(format!(
                    "face {} references vertex {} (mesh has {})",
                    fi, bad, nv
                )));
            }
        }
        if let Some(normals) = &self.normals {
            if normals.len() != nv {
                return Err(Error::InvalidData(format!(
                    "{} normals for {} vertices",
                    normals.len(),
                    nv
                )));
            }
        }
        if let Some(colors) = &self.colors {
            if colors.len() != nv {
                return Err(Error::InvalidData(format!(
                    "{} colors for {} vertices",
                    colors.len(),
                    nv
                )));
            }
        }
        if let Some(uv) = &self.uv {
            if uv.faces.len() != self.faces.len() {
                return Err(Error::InvalidData(format!(
                    "UV layer has {} faces, mesh has {}",
                    uv.faces.len(),
                    self.faces.len()
                )));
            }
            let nt = uv.coords.len();
            for (fi, face) in uv.faces.iter().enumerate() {
                if let Some(&bad) = face.iter().find(|&&t| t >= nt) {
                    return Err(Error::InvalidData(format!(
                        "face {} references texture coordinate {} (mesh has {})",
                        fi, bad, nt
                    )));
                }
            }
        }
        if let Some(table) = &self.face_materials {
            if table.len() != self.faces.len() {
                return Err(Error::InvalidData(format!(
                    "material table has {} entries, mesh has {} faces",
                    table.len(),
                    self.faces.len()
                )));
            }
            if table.iter().any(|&m| m >= self.materials.len()) {
                return Err(Error::InvalidData("face material out of range".to_string()));
            }
        }
        Ok(())
    }

    /// Clear the mesh
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.faces.clear();
        self.normals = None;
        self.colors = None;
        self.uv = None;
        self.materials.clear();
        self.face_materials = None;
    }
}

impl Default for TriangleMesh {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn quad() -> TriangleMesh {
        TriangleMesh::from_vertices_and_faces(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(1.0, 1.0, 0.0),
                Point3f::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        )
    }

    #[test]
    fn test_vertex_normals_planar() {
        let mut mesh = quad();
        mesh.compute_vertex_normals();
        let normals = mesh.normals.as_ref().unwrap();
        assert_eq!(normals.len(), 4);
        for n in normals {
            assert_relative_eq!(n.z, 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_degenerate_face_normal() {
        let mesh = TriangleMesh::from_vertices_and_faces(
            vec![Point3f::origin(), Point3f::origin(), Point3f::origin()],
            vec![[0, 1, 2]],
        );
        let normals = mesh.calculate_face_normals();
        assert_eq!(normals[0], Vector3f::z());
    }

    #[test]
    fn test_validate_catches_bad_index() {
        let mut mesh = quad();
        assert!(mesh.validate().is_ok());
        mesh.faces.push([0, 1, 9]);
        assert!(mesh.validate().is_err());
    }

    #[test]
    fn test_set_uv_length_mismatch() {
        let mut mesh = quad();
        let uv = UvLayer::new(vec![[0.0, 0.0]], vec![[0, 0, 0]]);
        assert!(mesh.set_uv(uv).is_err());
    }

    #[test]
    fn test_split_shared_wedges() {
        let mesh = quad();
        // UV 0 is used by vertices 0 and 2 (different corners): must be split
        let mut uv = UvLayer::new(
            vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]],
            vec![[0, 1, 0], [0, 0, 2]],
        );
        let added = uv.split_shared_wedges(&mesh.faces);
        assert_eq!(added, 1);
        assert_eq!(uv.coords.len(), 4);
        assert_eq!(uv.faces[0], [0, 1, 3]);
        assert_eq!(uv.faces[1], [0, 3, 2]);
    }

    #[test]
    fn test_materials() {
        let mut mesh = quad();
        let materials = vec![Material::new("a"), Material::with_texture("b", "tex.png")];
        assert!(mesh.set_materials(materials.clone(), vec![0, 2]).is_err());
        mesh.set_materials(materials, vec![0, 1]).unwrap();
        assert_eq!(mesh.face_material(1).unwrap().name, "b");
        assert!(!mesh.has_texture());
        mesh.set_uv(UvLayer::per_vertex(vec![[0.0, 0.0]; 4], &mesh.faces.clone()))
            .unwrap();
        assert!(mesh.has_texture());
        assert!(mesh.validate().is_ok());
    }
}
