//! Bounding boxes and size measurements

use crate::mesh::TriangleMesh;
use crate::point::*;
use nalgebra::{DMatrix, Matrix3, SymmetricEigen};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Corner index pairs forming the 12 edges of a box (see [`BoundingBox::corners`]).
pub const BOX_EDGES: [(usize, usize); 12] = [
    (0, 1), (1, 3), (3, 2), (2, 0),
    (4, 5), (5, 7), (7, 6), (6, 4),
    (0, 4), (1, 5), (2, 6), (3, 7),
];

/// How a bounding box is oriented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoxKind {
    /// Aligned with the coordinate axes
    #[default]
    Aabb,
    /// Aligned with the principal axes of the vertex distribution
    Oriented,
}

/// A box given by its center, full extents along its local axes and the
/// rotation taking local axes to world axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub center: Point3f,
    pub extents: Vector3f,
    pub rotation: Matrix3<f32>,
}

impl BoundingBox {
    /// Axis-aligned box of a point set. `None` for an empty set.
    pub fn axis_aligned(points: &[Point3f]) -> Option<Self> {
        let first = *points.first()?;
        let (min, max) = points.iter().fold((first, first), |(mut min, mut max), p| {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            min.z = min.z.min(p.z);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
            max.z = max.z.max(p.z);
            (min, max)
        });
        Some(Self {
            center: nalgebra::center(&min, &max),
            extents: max - min,
            rotation: Matrix3::identity(),
        })
    }

    /// Box aligned with the principal axes (PCA) of a point set.
    pub fn oriented(points: &[Point3f]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let n = points.len() as f32;
        let mean = points.iter().fold(Vector3f::zeros(), |acc, p| acc + p.coords) / n;
        let mut cov = Matrix3::<f32>::zeros();
        for p in points {
            let d = p.coords - mean;
            cov += d * d.transpose();
        }
        cov /= n;

        let eigen = SymmetricEigen::new(cov);
        let mut axes = eigen.eigenvectors;
        // Keep a right-handed frame
        if axes.determinant() < 0.0 {
            let flipped = -axes.column(2).clone_owned();
            axes.set_column(2, &flipped);
        }

        let local: Vec<Vector3f> = points
            .iter()
            .map(|p| axes.transpose() * (p.coords - mean))
            .collect();
        let mut min = local[0];
        let mut max = local[0];
        for l in &local {
            min = min.inf(l);
            max = max.sup(l);
        }
        let local_center = (min + max) * 0.5;
        Some(Self {
            center: Point3f::from(mean + axes * local_center),
            extents: max - min,
            rotation: axes,
        })
    }

    /// Box of the requested kind around a mesh's vertices
    pub fn of_mesh(mesh: &TriangleMesh, kind: BoxKind) -> Option<Self> {
        match kind {
            BoxKind::Aabb => Self::axis_aligned(&mesh.vertices),
            BoxKind::Oriented => Self::oriented(&mesh.vertices),
        }
    }

    /// Smallest extent
    pub fn min_extent(&self) -> f32 {
        self.extents.min()
    }

    /// Largest extent
    pub fn max_extent(&self) -> f32 {
        self.extents.max()
    }

    /// Length of the box diagonal
    pub fn diagonal(&self) -> f32 {
        self.extents.norm()
    }

    /// The eight corners; bit 0 selects +x, bit 1 +y, bit 2 +z (local axes).
    pub fn corners(&self) -> [Point3f; 8] {
        let half = self.extents * 0.5;
        let mut corners = [Point3f::origin(); 8];
        for (i, corner) in corners.iter_mut().enumerate() {
            let sx = if i & 1 != 0 { 1.0 } else { -1.0 };
            let sy = if i & 2 != 0 { 1.0 } else { -1.0 };
            let sz = if i & 4 != 0 { 1.0 } else { -1.0 };
            let local = Vector3f::new(sx * half.x, sy * half.y, sz * half.z);
            *corner = self.center + self.rotation * local;
        }
        corners
    }
}

/// Diameter of a mesh measured in its principal-axis frame.
///
/// Vertices are centered and decomposed with an SVD; the diameter is the
/// norm of the per-axis spread of the projected coordinates.
pub fn diameter_svd(mesh: &TriangleMesh) -> f32 {
    let n = mesh.vertices.len();
    if n == 0 {
        return 0.0;
    }
    let mean = mesh
        .vertices
        .iter()
        .fold(Vector3d::zeros(), |acc, p| acc + p.coords.cast::<f64>())
        / n as f64;
    let data = DMatrix::<f64>::from_fn(n, 3, |r, c| mesh.vertices[r][c] as f64 - mean[c]);
    let svd = data.svd(true, false);
    let u = match svd.u {
        Some(u) => u,
        None => return 0.0,
    };
    let projected = u * DMatrix::from_diagonal(&svd.singular_values);

    let spread: Vec<f64> = projected
        .column_iter()
        .map(|col| col.max() - col.min())
        .collect();
    spread.iter().map(|s| s * s).sum::<f64>().sqrt() as f32
}

/// Largest pairwise distance over a random sample of up to `n_sample` points.
///
/// With `n_sample == None` every point is used.
pub fn diameter_sampled<R: Rng + ?Sized>(
    points: &[Point3f],
    n_sample: Option<usize>,
    rng: &mut R,
) -> f32 {
    let sample: Vec<Point3f> = match n_sample {
        Some(n) if n < points.len() => rand::seq::index::sample(rng, points.len(), n)
            .into_iter()
            .map(|i| points[i])
            .collect(),
        _ => points.to_vec(),
    };

    let mut best = 0.0f32;
    for (i, a) in sample.iter().enumerate() {
        for b in &sample[i + 1..] {
            best = best.max((a - b).norm());
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn box_points(sx: f32, sy: f32, sz: f32) -> Vec<Point3f> {
        let mut pts = Vec::new();
        for i in 0..8 {
            pts.push(Point3f::new(
                if i & 1 != 0 { sx } else { 0.0 },
                if i & 2 != 0 { sy } else { 0.0 },
                if i & 4 != 0 { sz } else { 0.0 },
            ));
        }
        pts
    }

    #[test]
    fn test_axis_aligned_extents() {
        let bb = BoundingBox::axis_aligned(&box_points(2.0, 1.0, 0.5)).unwrap();
        assert_relative_eq!(bb.extents, Vector3f::new(2.0, 1.0, 0.5));
        assert_relative_eq!(bb.center, Point3f::new(1.0, 0.5, 0.25));
        assert_relative_eq!(bb.min_extent(), 0.5);
        assert_relative_eq!(bb.max_extent(), 2.0);
    }

    #[test]
    fn test_empty_points() {
        assert!(BoundingBox::axis_aligned(&[]).is_none());
        assert!(BoundingBox::oriented(&[]).is_none());
    }

    #[test]
    fn test_oriented_matches_axis_aligned_for_box() {
        let pts = box_points(4.0, 2.0, 1.0);
        let obb = BoundingBox::oriented(&pts).unwrap();
        let mut ext = [obb.extents.x, obb.extents.y, obb.extents.z];
        ext.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_relative_eq!(ext[0], 1.0, epsilon = 1e-4);
        assert_relative_eq!(ext[1], 2.0, epsilon = 1e-4);
        assert_relative_eq!(ext[2], 4.0, epsilon = 1e-4);
        assert_relative_eq!(obb.center, Point3f::new(2.0, 1.0, 0.5), epsilon = 1e-4);
    }

    #[test]
    fn test_oriented_rotated_box_is_tighter() {
        // Thin slab rotated 45 degrees about Z
        let c = std::f32::consts::FRAC_1_SQRT_2;
        let pts: Vec<Point3f> = box_points(4.0, 0.2, 1.0)
            .into_iter()
            .map(|p| Point3f::new(c * p.x - c * p.y, c * p.x + c * p.y, p.z))
            .collect();
        let aabb = BoundingBox::axis_aligned(&pts).unwrap();
        let obb = BoundingBox::oriented(&pts).unwrap();
        assert!(obb.min_extent() < aabb.min_extent());
        assert_relative_eq!(obb.min_extent(), 0.2, epsilon = 1e-3);
    }

    #[test]
    fn test_corners_span_box() {
        let bb = BoundingBox::axis_aligned(&box_points(1.0, 2.0, 3.0)).unwrap();
        let corners = bb.corners();
        assert_relative_eq!(corners[0], Point3f::new(0.0, 0.0, 0.0));
        assert_relative_eq!(corners[7], Point3f::new(1.0, 2.0, 3.0));
        for (a, b) in BOX_EDGES {
            // Each edge differs in exactly one axis
            let d = corners[a] - corners[b];
            let nonzero = d.iter().filter(|x| x.abs() > 1e-6).count();
            assert_eq!(nonzero, 1);
        }
    }

    #[test]
    fn test_diameter_svd_box() {
        let mesh = TriangleMesh::from_vertices_and_faces(box_points(3.0, 4.0, 0.0), vec![]);
        assert_relative_eq!(diameter_svd(&mesh), 5.0, epsilon = 1e-4);
    }

    #[test]
    fn test_diameter_sampled_all_points() {
        let pts = box_points(1.0, 2.0, 2.0);
        let mut rng = StdRng::seed_from_u64(7);
        assert_relative_eq!(diameter_sampled(&pts, None, &mut rng), 3.0, epsilon = 1e-6);
        let sampled = diameter_sampled(&pts, Some(4), &mut rng);
        assert!(sampled <= 3.0 + 1e-6);
    }
}
