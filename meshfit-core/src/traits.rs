//! Core traits for meshfit

use crate::{bounds::*, mesh::*, point::*, transform::Transform3D};

/// Objects with a measurable spatial extent
pub trait Bounded {
    /// Bounding box of the requested kind, `None` when there is no geometry
    fn bounding_box(&self, kind: BoxKind) -> Option<BoundingBox>;

    /// Center of the axis-aligned bounding box
    fn center(&self) -> Point3f {
        self.bounding_box(BoxKind::Aabb)
            .map(|bb| bb.center)
            .unwrap_or_else(Point3f::origin)
    }
}

/// Trait for objects that can be transformed
pub trait Transformable {
    /// Apply a transformation to the object
    fn transform(&mut self, transform: &Transform3D);
}

impl Bounded for TriangleMesh {
    fn bounding_box(&self, kind: BoxKind) -> Option<BoundingBox> {
        BoundingBox::of_mesh(self, kind)
    }
}

impl Transformable for TriangleMesh {
    fn transform(&mut self, transform: &Transform3D) {
        for vertex in &mut self.vertices {
            *vertex = transform.transform_point(vertex);
        }
        if let Some(normals) = &mut self.normals {
            let normal_matrix = transform.normal_matrix();
            for n in normals.iter_mut() {
                *n = (normal_matrix * *n)
                    .try_normalize(f32::EPSILON)
                    .unwrap_or(*n);
            }
        }
    }
}
