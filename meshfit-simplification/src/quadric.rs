//! Quadric error metrics
//!
//! Geometric quadrics are 4x4 homogeneous matrices as in Garland-Heckbert
//! 1997. Texture-aware quadrics live in the 5D space `(x, y, z, w*u, w*v)`
//! following Garland-Heckbert 1998: each triangle spans a 2-plane in that
//! space and the quadric measures squared distance to it.

use meshfit_core::{Point3f, Vector3f};
use nalgebra::{DMatrix, DVector, Matrix4, Matrix5, Vector3, Vector4, Vector5};

/// Errors below this are treated as this value so quality penalties still
/// order zero-error collapses.
pub const QUADRIC_EPSILON: f64 = 1e-15;

/// Weight of the edge-perpendicular quadrics added in planar mode
pub const PLANAR_WEIGHT: f64 = 1e-3;

pub fn to_f64(p: &Point3f) -> Vector3<f64> {
    Vector3::new(p.x as f64, p.y as f64, p.z as f64)
}

/// Plane through a triangle, `None` for degenerate triangles
pub fn triangle_plane(v0: &Point3f, v1: &Point3f, v2: &Point3f) -> Option<Vector4<f64>> {
    let (p0, p1, p2) = (to_f64(v0), to_f64(v1), to_f64(v2));
    let n = (p1 - p0).cross(&(p2 - p0)).try_normalize(1e-20)?;
    Some(Vector4::new(n.x, n.y, n.z, -n.dot(&p0)))
}

/// Plane containing edge `v0 -> v1` and perpendicular to `face_normal`
pub fn edge_perpendicular_plane(
    v0: &Point3f,
    v1: &Point3f,
    face_normal: &Vector3f,
) -> Option<Vector4<f64>> {
    let (p0, p1) = (to_f64(v0), to_f64(v1));
    let fn64 = Vector3::new(face_normal.x as f64, face_normal.y as f64, face_normal.z as f64);
    let n = (p1 - p0).cross(&fn64).try_normalize(1e-20)?;
    Some(Vector4::new(n.x, n.y, n.z, -n.dot(&p0)))
}

pub fn plane_to_quadric(p: &Vector4<f64>) -> Matrix4<f64> {
    p * p.transpose()
}

/// Evaluate a homogeneous quadric at `x`
pub fn eval_quadric(q: &Matrix4<f64>, x: &Vector3<f64>) -> f64 {
    let vh = x.push(1.0);
    (vh.transpose() * q * vh)[0]
}

/// Quadric over `(x, y, z, s, t)`: `E(v) = vᵀAv + 2bᵀv + c`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WedgeQuadric {
    pub a: Matrix5<f64>,
    pub b: Vector5<f64>,
    pub c: f64,
}

impl WedgeQuadric {
    pub fn zeros() -> Self {
        Self {
            a: Matrix5::zeros(),
            b: Vector5::zeros(),
            c: 0.0,
        }
    }

    /// Quadric of the 2-plane through three 5D points. Degenerate triangles
    /// give the zero quadric.
    pub fn from_triangle(p: &Vector5<f64>, q: &Vector5<f64>, r: &Vector5<f64>) -> Self {
        let e1 = match (q - p).try_normalize(1e-20) {
            Some(e) => e,
            None => return Self::zeros(),
        };
        let rp = r - p;
        let e2 = match (rp - e1 * e1.dot(&rp)).try_normalize(1e-20) {
            Some(e) => e,
            None => return Self::zeros(),
        };
        let pe1 = p.dot(&e1);
        let pe2 = p.dot(&e2);
        Self {
            a: Matrix5::identity() - e1 * e1.transpose() - e2 * e2.transpose(),
            b: e1 * pe1 + e2 * pe2 - p,
            c: p.dot(p) - pe1 * pe1 - pe2 * pe2,
        }
    }

    pub fn eval(&self, v: &Vector5<f64>) -> f64 {
        (v.transpose() * self.a * v)[0] + 2.0 * self.b.dot(v) + self.c
    }

    /// Restrict to positions with the texture part fixed at `st`.
    pub fn fold_fixed(&self, st: &[f64; 2]) -> Matrix4<f64> {
        let s = nalgebra::Vector2::new(st[0], st[1]);
        let axs = self.a.fixed_view::<3, 2>(0, 3);
        let ass = self.a.fixed_view::<2, 2>(3, 3);
        let g = axs * s + self.b.fixed_rows::<3>(0);
        let k = (s.transpose() * ass * s)[0] + 2.0 * self.b.fixed_rows::<2>(3).dot(&s) + self.c;
        let mut m = Matrix4::zeros();
        m.fixed_view_mut::<3, 3>(0, 0).copy_from(&self.a.fixed_view::<3, 3>(0, 0));
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(&g);
        m.fixed_view_mut::<1, 3>(3, 0).copy_from(&g.transpose());
        m[(3, 3)] = k;
        m
    }
}

impl std::ops::Add for WedgeQuadric {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            a: self.a + rhs.a,
            b: self.b + rhs.b,
            c: self.c + rhs.c,
        }
    }
}

impl std::ops::AddAssign for WedgeQuadric {
    fn add_assign(&mut self, rhs: Self) {
        self.a += rhs.a;
        self.b += rhs.b;
        self.c += rhs.c;
    }
}

/// Lift a position and texture coordinate into the 5D quadric space
pub fn lift(x: &Vector3<f64>, uv: [f32; 2], texture_weight: f64) -> Vector5<f64> {
    Vector5::new(
        x.x,
        x.y,
        x.z,
        texture_weight * uv[0] as f64,
        texture_weight * uv[1] as f64,
    )
}

/// Jointly minimise a geometric quadric plus wedge quadrics that share the
/// position. Returns the position and one `(s, t)` per wedge quadric, or
/// `None` when the system is ill-conditioned.
pub fn solve_joint(geometric: &Matrix4<f64>, wedges: &[WedgeQuadric]) -> Option<(Vector3<f64>, Vec<[f64; 2]>)> {
    let n = 3 + 2 * wedges.len();
    let mut h = DMatrix::<f64>::zeros(n, n);
    let mut g = DVector::<f64>::zeros(n);

    h.view_mut((0, 0), (3, 3)).copy_from(&geometric.fixed_view::<3, 3>(0, 0));
    g.rows_mut(0, 3).copy_from(&geometric.fixed_view::<3, 1>(0, 3));

    for (j, w) in wedges.iter().enumerate() {
        let off = 3 + 2 * j;
        let mut xx = h.view_mut((0, 0), (3, 3));
        xx += w.a.fixed_view::<3, 3>(0, 0);
        h.view_mut((0, off), (3, 2)).copy_from(&w.a.fixed_view::<3, 2>(0, 3));
        h.view_mut((off, 0), (2, 3)).copy_from(&w.a.fixed_view::<2, 3>(3, 0));
        h.view_mut((off, off), (2, 2)).copy_from(&w.a.fixed_view::<2, 2>(3, 3));
        let mut gx = g.rows_mut(0, 3);
        gx += w.b.fixed_rows::<3>(0);
        g.rows_mut(off, 2).copy_from(&w.b.fixed_rows::<2>(3));
    }

    let svd = h.svd(true, true);
    let max = svd.singular_values.max();
    let min = svd.singular_values.min();
    if max <= 0.0 || min / max < 1e-9 {
        return None;
    }
    let z = svd.solve(&(-g), 0.0).ok()?;
    if !z.iter().all(|v| v.is_finite()) {
        return None;
    }

    let x = Vector3::new(z[0], z[1], z[2]);
    let st = (0..wedges.len())
        .map(|j| [z[3 + 2 * j], z[4 + 2 * j]])
        .collect();
    Some((x, st))
}

/// `4*sqrt(3)*area / sum of squared edge lengths`: 1 for equilateral
/// triangles, 0 for degenerate ones.
pub fn triangle_quality(a: &Vector3<f64>, b: &Vector3<f64>, c: &Vector3<f64>) -> f64 {
    let denom = (b - a).norm_squared() + (c - b).norm_squared() + (a - c).norm_squared();
    if denom <= 0.0 {
        return 0.0;
    }
    // |cross| is twice the area
    2.0 * 3f64.sqrt() * (b - a).cross(&(c - a)).norm() / denom
}
