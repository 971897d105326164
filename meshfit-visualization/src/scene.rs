//! CPU-side scene assembly: mesh batches, axis helper and box wireframe

use bytemuck::{Pod, Zeroable};
use meshfit_core::{BoundingBox, BoxKind, Point3f, TriangleMesh, BOX_EDGES};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub const AXIS_LENGTH: f32 = 0.1;
pub const BBOX_COLOR: [f32; 3] = [1.0, 0.0, 0.0];
pub const DEFAULT_MESH_COLOR: [f32; 3] = [0.7, 0.7, 0.7];

/// Vertex data for lit, optionally textured triangles
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct SceneVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    pub color: [f32; 3],
}

impl SceneVertex {
    /// Vertex buffer layout descriptor
    pub fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 4] =
            wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2, 3 => Float32x3];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<SceneVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }
}

/// Vertex data for unlit line segments
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct LineVertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
}

impl LineVertex {
    pub fn new(position: Point3f, color: [f32; 3]) -> Self {
        Self {
            position: [position.x, position.y, position.z],
            color,
        }
    }

    pub fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
            wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<LineVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }
}

/// Triangles sharing one material, drawn with a single texture binding
#[derive(Debug, Clone, Default)]
pub struct MeshBatch {
    /// Three vertices per triangle
    pub vertices: Vec<SceneVertex>,
    pub texture: Option<PathBuf>,
}

/// Viewer settings
#[derive(Debug, Clone)]
pub struct ViewOptions {
    pub title: String,
    pub show_bbox: bool,
    pub bbox_kind: BoxKind,
    pub axis_length: f32,
    pub background_color: [f64; 4],
    pub window_size: (u32, u32),
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            title: "meshfit viewer".to_string(),
            show_bbox: true,
            bbox_kind: BoxKind::Aabb,
            axis_length: AXIS_LENGTH,
            background_color: [0.12, 0.12, 0.14, 1.0],
            window_size: (1200, 800),
        }
    }
}

/// Everything the renderer uploads, in world space
#[derive(Debug, Clone)]
pub struct Scene {
    pub batches: Vec<MeshBatch>,
    pub axes: Vec<LineVertex>,
    pub bbox: Vec<LineVertex>,
    pub bounds: Option<BoundingBox>,
}

impl Scene {
    /// Build the scene for a mesh.
    ///
    /// Faces are grouped by material. A batch is textured when its material
    /// has a diffuse texture and the mesh has a UV layer; otherwise it uses
    /// vertex colours, the material's diffuse colour, or grey.
    pub fn from_mesh(mesh: &TriangleMesh, options: &ViewOptions) -> Self {
        let face_normals = mesh.calculate_face_normals();
        let mut groups: BTreeMap<Option<usize>, MeshBatch> = BTreeMap::new();

        for (f, face) in mesh.faces.iter().enumerate() {
            let material_index = mesh.face_materials.as_ref().map(|m| m[f]);
            let material = mesh.face_material(f);
            let texture = material
                .and_then(|m| m.diffuse_texture.clone())
                .filter(|_| mesh.uv.is_some());
            let flat_color = material
                .and_then(|m| m.diffuse)
                .unwrap_or(DEFAULT_MESH_COLOR);

            let batch = groups.entry(material_index).or_insert_with(|| MeshBatch {
                vertices: Vec::new(),
                texture: texture.clone(),
            });

            for (corner, &v) in face.iter().enumerate() {
                let p = mesh.vertices[v];
                let normal = mesh
                    .normals
                    .as_ref()
                    .map(|n| n[v])
                    .unwrap_or(face_normals[f]);
                let uv = mesh
                    .uv
                    .as_ref()
                    .map(|layer| {
                        let [u, v] = layer.corner(f, corner);
                        // Image rows start at the top
                        [u, 1.0 - v]
                    })
                    .unwrap_or([0.0, 0.0]);
                let color = if texture.is_some() {
                    [1.0, 1.0, 1.0]
                } else if let Some(colors) = &mesh.colors {
                    colors[v].map(|c| c as f32 / 255.0)
                } else {
                    flat_color
                };
                batch.vertices.push(SceneVertex {
                    position: [p.x, p.y, p.z],
                    normal: [normal.x, normal.y, normal.z],
                    uv,
                    color,
                });
            }
        }

        let bounds = BoundingBox::of_mesh(mesh, options.bbox_kind);
        let bbox = bounds.as_ref().map(box_lines).unwrap_or_default();

        Self {
            batches: groups.into_values().filter(|b| !b.vertices.is_empty()).collect(),
            axes: axis_lines(options.axis_length),
            bbox,
            bounds,
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.batches.iter().map(|b| b.vertices.len() / 3).sum()
    }

    /// Center and radius of a sphere enclosing the mesh and the axis helper
    pub fn framing(&self) -> (Point3f, f32) {
        match &self.bounds {
            Some(b) => {
                let radius = (b.diagonal() * 0.5).max(self.axis_length());
                (b.center, radius)
            }
            None => (Point3f::origin(), self.axis_length().max(1.0)),
        }
    }

    fn axis_length(&self) -> f32 {
        self.axes
            .iter()
            .map(|v| nalgebra::Vector3::from(v.position).norm())
            .fold(0.0, f32::max)
    }
}

/// Axis helper at the origin: X red, Y green, Z blue
pub fn axis_lines(length: f32) -> Vec<LineVertex> {
    let origin = Point3f::origin();
    [
        (Point3f::new(length, 0.0, 0.0), [1.0, 0.0, 0.0]),
        (Point3f::new(0.0, length, 0.0), [0.0, 1.0, 0.0]),
        (Point3f::new(0.0, 0.0, length), [0.0, 0.0, 1.0]),
    ]
    .into_iter()
    .flat_map(|(end, color)| [LineVertex::new(origin, color), LineVertex::new(end, color)])
    .collect()
}

/// The 12 edges of a box as a line list
pub fn box_lines(bounds: &BoundingBox) -> Vec<LineVertex> {
    let corners = bounds.corners();
    BOX_EDGES
        .iter()
        .flat_map(|&(a, b)| {
            [
                LineVertex::new(corners[a], BBOX_COLOR),
                LineVertex::new(corners[b], BBOX_COLOR),
            ]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use meshfit_core::{Material, UvLayer};

    fn make_quad() -> TriangleMesh {
        TriangleMesh::from_vertices_and_faces(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(2.0, 0.0, 0.0),
                Point3f::new(2.0, 1.0, 0.0),
                Point3f::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        )
    }

    #[test]
    fn test_axis_lines() {
        let axes = axis_lines(AXIS_LENGTH);
        assert_eq!(axes.len(), 6);
        assert_eq!(axes[1].position, [0.1, 0.0, 0.0]);
        assert_eq!(axes[1].color, [1.0, 0.0, 0.0]);
        assert_eq!(axes[3].color, [0.0, 1.0, 0.0]);
        assert_eq!(axes[5].position, [0.0, 0.0, 0.1]);
        assert_eq!(axes[5].color, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_grey_scene_with_box() {
        let scene = Scene::from_mesh(&make_quad(), &ViewOptions::default());
        assert_eq!(scene.batches.len(), 1);
        assert_eq!(scene.triangle_count(), 2);
        assert!(scene.batches[0].texture.is_none());
        assert!(scene.batches[0].vertices.iter().all(|v| v.color == DEFAULT_MESH_COLOR));
        assert!(scene.batches[0].vertices.iter().all(|v| v.normal == [0.0, 0.0, 1.0]));

        assert_eq!(scene.bbox.len(), 24, "12 edges, two vertices each");
        assert!(scene.bbox.iter().all(|v| v.color == BBOX_COLOR));

        let (center, radius) = scene.framing();
        assert_relative_eq!(center.x, 1.0);
        assert_relative_eq!(radius, 5.0f32.sqrt() * 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_textured_batches() {
        let mut mesh = make_quad();
        mesh.set_uv(UvLayer::per_vertex(
            vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
            &mesh.faces,
        ))
        .unwrap();
        let mut plain = Material::new("plain");
        plain.diffuse = Some([0.2, 0.4, 0.6]);
        mesh.set_materials(vec![Material::with_texture("skin", "skin.png"), plain], vec![0, 1])
            .unwrap();

        let scene = Scene::from_mesh(&mesh, &ViewOptions::default());
        assert_eq!(scene.batches.len(), 2);

        let textured = &scene.batches[0];
        assert_eq!(textured.texture.as_deref(), Some(std::path::Path::new("skin.png")));
        assert!(textured.vertices.iter().all(|v| v.color == [1.0, 1.0, 1.0]));
        // Second corner of face 0 is vertex 1 at uv (1, 0), flipped to (1, 1)
        assert_eq!(textured.vertices[1].uv, [1.0, 1.0]);

        let flat = &scene.batches[1];
        assert!(flat.texture.is_none());
        assert!(flat.vertices.iter().all(|v| v.color == [0.2, 0.4, 0.6]));
    }

    #[test]
    fn test_vertex_colors() {
        let mut mesh = make_quad();
        mesh.set_colors(vec![[255, 0, 0], [0, 255, 0], [0, 0, 255], [255, 255, 255]]);
        let scene = Scene::from_mesh(&mesh, &ViewOptions::default());
        assert_eq!(scene.batches[0].vertices[0].color, [1.0, 0.0, 0.0]);
        assert_eq!(scene.batches[0].vertices[1].color, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_texture_needs_uv() {
        let mut mesh = make_quad();
        mesh.set_materials(vec![Material::with_texture("skin", "skin.png")], vec![0, 0])
            .unwrap();
        let scene = Scene::from_mesh(&mesh, &ViewOptions::default());
        assert!(scene.batches[0].texture.is_none());
    }

    #[test]
    fn test_empty_mesh_scene() {
        let scene = Scene::from_mesh(&TriangleMesh::new(), &ViewOptions::default());
        assert!(scene.batches.is_empty());
        assert!(scene.bbox.is_empty());
        assert_eq!(scene.axes.len(), 6);
        let (center, radius) = scene.framing();
        assert_eq!(center, Point3f::origin());
        assert_eq!(radius, 1.0);
    }
}
