//! Texture-aware edge collapse simplification
//!
//! Iterative edge collapse driven by quadric error metrics. Meshes with a UV
//! layer carry one extended quadric per wedge so that collapses which distort
//! the texture mapping are expensive. Seams are kept intact by restricting
//! collapses of seam vertices to half-edge collapses along the seam.

use crate::error::{Result, SimplifyError};
use crate::options::SimplifyOptions;
use crate::quadric::*;
use crate::result::DecimationResult;
use crate::MeshSimplifier;
use itertools::Itertools;
use meshfit_core::{Point3f, TriangleMesh, UvLayer};
use nalgebra::{Matrix4, Vector3};
use priority_queue::PriorityQueue;
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::HashMap;

// ============================================================
// Working mesh
// ============================================================

/// Mutable mesh with vertex -> face adjacency used during decimation.
struct CollapseMesh {
    positions: Vec<Point3f>,
    faces: Vec<[usize; 3]>,
    face_alive: Vec<bool>,
    vertex_faces: Vec<Vec<usize>>,
    vertex_alive: Vec<bool>,
    active_face_count: usize,
    /// Constraint quadrics, plus face planes when there is no UV layer
    quadrics: Vec<Matrix4<f64>>,
    uv: Option<WedgeLayer>,
    colors: Option<Vec<[u8; 3]>>,
    face_materials: Option<Vec<usize>>,
    had_normals: bool,
}

struct WedgeLayer {
    coords: Vec<[f32; 2]>,
    faces: Vec<[usize; 3]>,
    quadrics: Vec<WedgeQuadric>,
}

/// A fully evaluated collapse of `remove` into `keep`
#[derive(Debug, Clone)]
struct CollapsePlan {
    keep: usize,
    remove: usize,
    position: Point3f,
    /// (wedge of `remove`, wedge of `keep`, merged coordinate)
    wedge_pairs: Vec<(usize, usize, [f32; 2])>,
    cost: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Rejection {
    NonManifold,
    LinkCondition,
    NormalFlip,
    Seam,
    Duplicate,
}

impl CollapseMesh {
    fn from_triangle_mesh(mesh: &TriangleMesh, options: &SimplifyOptions) -> Self {
        let nv = mesh.vertices.len();
        let nf = mesh.faces.len();

        let face_alive: Vec<bool> = mesh
            .faces
            .iter()
            .map(|f| f[0] != f[1] && f[1] != f[2] && f[2] != f[0])
            .collect();
        let dropped = face_alive.iter().filter(|&&a| !a).count();
        if dropped > 0 {
            log::debug!("ignoring {} faces with repeated vertices", dropped);
        }

        let mut vertex_faces = vec![Vec::new(); nv];
        for (fi, face) in mesh.faces.iter().enumerate() {
            if face_alive[fi] {
                for &v in face {
                    vertex_faces[v].push(fi);
                }
            }
        }
        let vertex_alive = vertex_faces.iter().map(|f| !f.is_empty()).collect();

        let uv = mesh.uv.as_ref().map(|layer| WedgeLayer {
            coords: layer.coords.clone(),
            faces: layer.faces.clone(),
            quadrics: vec![WedgeQuadric::zeros(); layer.coords.len()],
        });

        let mut cm = CollapseMesh {
            positions: mesh.vertices.clone(),
            faces: mesh.faces.clone(),
            face_alive,
            vertex_faces,
            vertex_alive,
            active_face_count: nf - dropped,
            quadrics: vec![Matrix4::zeros(); nv],
            uv,
            colors: mesh.colors.clone(),
            face_materials: mesh.face_materials.clone(),
            had_normals: mesh.normals.is_some(),
        };
        cm.initialize_quadrics(options);
        cm
    }

    fn initialize_quadrics(&mut self, options: &SimplifyOptions) {
        let w = options.texture_weight;

        // Per-face quadrics in parallel, accumulated sequentially
        let face_quadrics: Vec<Option<(Matrix4<f64>, Option<WedgeQuadric>)>> = (0..self.faces.len())
            .into_par_iter()
            .map(|fi| {
                if !self.face_alive[fi] {
                    return None;
                }
                let [a, b, c] = self.triangle(fi);
                let geometric = triangle_plane(&a, &b, &c)
                    .map(|p| plane_to_quadric(&p))
                    .unwrap_or_else(Matrix4::zeros);
                let wedge = self.uv.as_ref().map(|uv| {
                    let t = uv.faces[fi];
                    WedgeQuadric::from_triangle(
                        &lift(&to_f64(&a), uv.coords[t[0]], w),
                        &lift(&to_f64(&b), uv.coords[t[1]], w),
                        &lift(&to_f64(&c), uv.coords[t[2]], w),
                    )
                });
                Some((geometric, wedge))
            })
            .collect();

        for (fi, fq) in face_quadrics.into_iter().enumerate() {
            let Some((geometric, wedge)) = fq else { continue };
            let face = self.faces[fi];
            match (wedge, self.uv.as_mut()) {
                (Some(wq), Some(uv)) => {
                    for &t in &uv.faces[fi] {
                        uv.quadrics[t] += wq;
                    }
                }
                _ => {
                    for &v in &face {
                        self.quadrics[v] += geometric;
                    }
                }
            }
        }

        if options.preserve_boundary || options.planar {
            self.add_edge_constraints(options);
        }
    }

    /// Edge-perpendicular constraint planes: boundary edges when
    /// `preserve_boundary`, every edge with a small weight when `planar`.
    fn add_edge_constraints(&mut self, options: &SimplifyOptions) {
        let mut edge_faces: HashMap<(usize, usize), Vec<usize>> = HashMap::new();
        for (fi, face) in self.faces.iter().enumerate() {
            if !self.face_alive[fi] {
                continue;
            }
            for k in 0..3 {
                edge_faces.entry(edge_key(face[k], face[(k + 1) % 3])).or_default().push(fi);
            }
        }

        for (fi, face) in self.faces.iter().enumerate() {
            if !self.face_alive[fi] {
                continue;
            }
            let [a, b, c] = [self.positions[face[0]], self.positions[face[1]], self.positions[face[2]]];
            let normal = match (b - a).cross(&(c - a)).try_normalize(f32::EPSILON) {
                Some(n) => n,
                None => continue,
            };
            for k in 0..3 {
                let (v0, v1) = (face[k], face[(k + 1) % 3]);
                let is_boundary = edge_faces.get(&edge_key(v0, v1)).map_or(false, |f| f.len() == 1);
                let mut weight = 0.0;
                if options.preserve_boundary && is_boundary {
                    weight += options.boundary_weight;
                }
                if options.planar {
                    weight += PLANAR_WEIGHT;
                }
                if weight == 0.0 {
                    continue;
                }
                if let Some(plane) =
                    edge_perpendicular_plane(&self.positions[v0], &self.positions[v1], &normal)
                {
                    let q = plane_to_quadric(&plane) * weight;
                    self.quadrics[v0] += q;
                    self.quadrics[v1] += q;
                }
            }
        }
    }

    fn triangle(&self, fi: usize) -> [Point3f; 3] {
        let [a, b, c] = self.faces[fi];
        [self.positions[a], self.positions[b], self.positions[c]]
    }

    fn corner_of(&self, fi: usize, v: usize) -> Option<usize> {
        self.faces[fi].iter().position(|&x| x == v)
    }

    fn neighbors(&self, v: usize) -> Vec<usize> {
        self.vertex_faces[v]
            .iter()
            .flat_map(|&f| self.faces[f])
            .filter(|&x| x != v)
            .unique()
            .collect()
    }

    /// Faces containing both endpoints of an edge
    fn edge_faces(&self, a: usize, b: usize) -> Vec<usize> {
        self.vertex_faces[a]
            .iter()
            .copied()
            .filter(|&f| self.faces[f].contains(&b))
            .collect()
    }

    fn is_boundary_vertex(&self, v: usize) -> bool {
        let mut counts: HashMap<usize, usize> = HashMap::new();
        for &f in &self.vertex_faces[v] {
            for x in self.faces[f] {
                if x != v {
                    *counts.entry(x).or_default() += 1;
                }
            }
        }
        counts.values().any(|&c| c == 1)
    }

    /// Distinct UV indices used around a vertex
    fn wedges_of(&self, v: usize) -> Vec<usize> {
        let Some(uv) = &self.uv else { return Vec::new() };
        self.vertex_faces[v]
            .iter()
            .filter_map(|&f| self.corner_of(f, v).map(|c| uv.faces[f][c]))
            .unique()
            .collect()
    }

    fn is_seam_vertex(&self, v: usize) -> bool {
        self.wedges_of(v).len() > 1
    }

    /// Check the link condition: common neighbors must equal exactly the
    /// face apices opposite the edge (2 for interior, 1 for boundary).
    fn check_topology(&self, a: usize, b: usize) -> std::result::Result<(), Rejection> {
        let shared = self.edge_faces(a, b);
        if shared.is_empty() || shared.len() > 2 {
            return Err(Rejection::NonManifold);
        }
        let na = self.neighbors(a);
        let nb = self.neighbors(b);
        let common = na.iter().filter(|x| nb.contains(x)).count();
        if common != shared.len() {
            return Err(Rejection::LinkCondition);
        }
        // An interior edge joining two boundary vertices would pinch the surface
        if shared.len() == 2 && self.is_boundary_vertex(a) && self.is_boundary_vertex(b) {
            return Err(Rejection::LinkCondition);
        }
        Ok(())
    }

    /// Pair the wedges of `remove` with those of `keep` across the edge faces.
    fn pair_wedges(
        &self,
        keep: usize,
        remove: usize,
        shared: &[usize],
        strict: bool,
    ) -> std::result::Result<Vec<(usize, usize)>, Rejection> {
        let Some(uv) = &self.uv else { return Ok(Vec::new()) };
        let mut pairs: Vec<(usize, usize)> = Vec::with_capacity(2);
        for &f in shared {
            let (Some(ck), Some(cr)) = (self.corner_of(f, keep), self.corner_of(f, remove)) else {
                return Err(Rejection::NonManifold);
            };
            let (tk, tr) = (uv.faces[f][ck], uv.faces[f][cr]);
            match pairs.iter().find(|(r, _)| *r == tr) {
                Some(&(_, k)) if k != tk && strict => return Err(Rejection::Seam),
                Some(_) => {}
                None => {
                    if strict && pairs.iter().any(|&(_, k)| k == tk) {
                        return Err(Rejection::Seam);
                    }
                    pairs.push((tr, tk));
                }
            }
        }
        Ok(pairs)
    }

    /// Best legal collapse of edge (u, v)
    fn plan_collapse(&self, u: usize, v: usize, options: &SimplifyOptions) -> std::result::Result<CollapsePlan, Rejection> {
        self.check_topology(u, v)?;
        let shared = self.edge_faces(u, v);

        let seam_u = self.is_seam_vertex(u);
        let seam_v = self.is_seam_vertex(v);
        if !options.preserve_seams || (!seam_u && !seam_v) {
            let (keep, remove) = (u.min(v), u.max(v));
            let pairs = self.pair_wedges(keep, remove, &shared, options.preserve_seams)?;
            let plan = self.free_plan(keep, remove, &pairs, options);
            return self.check_plan(plan, options);
        }

        // Seam vertices only move onto their collapse partner
        let mut best: std::result::Result<CollapsePlan, Rejection> = Err(Rejection::Seam);
        for (keep, remove, seam_keep, seam_remove) in [(u, v, seam_u, seam_v), (v, u, seam_v, seam_u)] {
            if seam_remove && !seam_keep {
                continue;
            }
            if seam_remove && !self.is_seam_edge(keep, remove, &shared) {
                continue;
            }
            let pairs = match self.pair_wedges(keep, remove, &shared, true) {
                Ok(p) => p,
                Err(e) => {
                    if best.is_err() {
                        best = Err(e);
                    }
                    continue;
                }
            };
            if self.wedges_of(remove).iter().any(|t| !pairs.iter().any(|(r, _)| r == t)) {
                continue;
            }
            let plan = self.fixed_plan(keep, remove, &pairs, options);
            match self.check_plan(plan, options) {
                Ok(plan) => {
                    if best.as_ref().map_or(true, |b| plan.cost < b.cost) {
                        best = Ok(plan);
                    }
                }
                Err(e) => {
                    if best.is_err() {
                        best = Err(e);
                    }
                }
            }
        }
        best
    }

    /// An interior edge whose two faces use different wedges at both ends
    fn is_seam_edge(&self, a: usize, b: usize, shared: &[usize]) -> bool {
        let (Some(uv), [f1, f2]) = (&self.uv, shared) else { return false };
        let differs = |v: usize| match (self.corner_of(*f1, v), self.corner_of(*f2, v)) {
            (Some(c1), Some(c2)) => uv.faces[*f1][c1] != uv.faces[*f2][c2],
            _ => false,
        };
        differs(a) && differs(b)
    }

    /// Geometric quadric of the merged vertex with unpaired wedges folded in
    fn merged_geometric(&self, keep: usize, remove: usize, pairs: &[(usize, usize)], w: f64) -> Matrix4<f64> {
        let mut q = self.quadrics[keep] + self.quadrics[remove];
        if let Some(uv) = &self.uv {
            let paired = |t: &usize| pairs.iter().any(|&(r, k)| r == *t || k == *t);
            for t in self.wedges_of(keep).into_iter().chain(self.wedges_of(remove)) {
                if !paired(&t) {
                    let c = uv.coords[t];
                    q += uv.quadrics[t].fold_fixed(&[w * c[0] as f64, w * c[1] as f64]);
                }
            }
        }
        q
    }

    fn plan_cost(
        &self,
        geometric: &Matrix4<f64>,
        merged: &[WedgeQuadric],
        x: &Vector3<f64>,
        uvs: &[[f32; 2]],
        w: f64,
    ) -> f64 {
        let mut cost = eval_quadric(geometric, x);
        for (q, uv) in merged.iter().zip(uvs) {
            cost += q.eval(&lift(x, *uv, w));
        }
        cost.max(0.0)
    }

    /// Collapse with free placement of the merged vertex and its wedges
    fn free_plan(&self, keep: usize, remove: usize, pairs: &[(usize, usize)], options: &SimplifyOptions) -> CollapsePlan {
        let w = options.texture_weight;
        let geometric = self.merged_geometric(keep, remove, pairs, w);
        let merged: Vec<WedgeQuadric> = match &self.uv {
            Some(uv) => pairs.iter().map(|&(r, k)| uv.quadrics[r] + uv.quadrics[k]).collect(),
            None => Vec::new(),
        };
        let coords = |t: usize| self.uv.as_ref().map_or([0.0; 2], |uv| uv.coords[t]);

        let pk = to_f64(&self.positions[keep]);
        let pr = to_f64(&self.positions[remove]);

        let optimal = if options.optimal_placement {
            solve_joint(&geometric, &merged).map(|(x, st)| {
                let uvs: Vec<[f32; 2]> = if w > 1e-12 {
                    st.iter().map(|s| [(s[0] / w) as f32, (s[1] / w) as f32]).collect()
                } else {
                    // No texture term: interpolate along the edge
                    let d = pr - pk;
                    let t = if d.norm_squared() > 0.0 {
                        ((x - pk).dot(&d) / d.norm_squared()).clamp(0.0, 1.0)
                    } else {
                        0.5
                    };
                    pairs.iter().map(|&(r, k)| lerp_uv(coords(k), coords(r), t)).collect()
                };
                (x, uvs)
            })
        } else {
            None
        };

        let (x, uvs, cost) = match optimal {
            Some((x, uvs)) => {
                let cost = self.plan_cost(&geometric, &merged, &x, &uvs, w);
                (x, uvs, cost)
            }
            None => [0.0f64, 1.0, 0.5]
                .iter()
                .map(|&t| {
                    let x = pk + (pr - pk) * t;
                    let uvs: Vec<[f32; 2]> = pairs
                        .iter()
                        .map(|&(r, k)| lerp_uv(coords(k), coords(r), t))
                        .collect();
                    let cost = self.plan_cost(&geometric, &merged, &x, &uvs, w);
                    (x, uvs, cost)
                })
                .min_by(|a, b| a.2.total_cmp(&b.2))
                .unwrap_or((pk, Vec::new(), 0.0)),
        };

        CollapsePlan {
            keep,
            remove,
            position: Point3f::new(x.x as f32, x.y as f32, x.z as f32),
            wedge_pairs: pairs.iter().zip(uvs).map(|(&(r, k), uv)| (r, k, uv)).collect(),
            cost,
        }
    }

    /// Half-edge collapse: `remove` moves onto `keep`, which keeps its wedges
    fn fixed_plan(&self, keep: usize, remove: usize, pairs: &[(usize, usize)], options: &SimplifyOptions) -> CollapsePlan {
        let w = options.texture_weight;
        let geometric = self.merged_geometric(keep, remove, pairs, w);
        let x = to_f64(&self.positions[keep]);
        let (merged, uvs): (Vec<WedgeQuadric>, Vec<[f32; 2]>) = match &self.uv {
            Some(uv) => pairs
                .iter()
                .map(|&(r, k)| (uv.quadrics[r] + uv.quadrics[k], uv.coords[k]))
                .unzip(),
            None => (Vec::new(), Vec::new()),
        };
        let cost = self.plan_cost(&geometric, &merged, &x, &uvs, w);
        CollapsePlan {
            keep,
            remove,
            position: self.positions[keep],
            wedge_pairs: pairs.iter().zip(uvs).map(|(&(r, k), uv)| (r, k, uv)).collect(),
            cost,
        }
    }

    /// Normal flip, duplicate face and quality checks on the faces that survive
    fn check_plan(&self, mut plan: CollapsePlan, options: &SimplifyOptions) -> std::result::Result<CollapsePlan, Rejection> {
        let (keep, remove) = (plan.keep, plan.remove);
        let new_pos = to_f64(&plan.position);
        let mut min_quality = f64::INFINITY;

        let keep_faces: Vec<[usize; 3]> = self.vertex_faces[keep]
            .iter()
            .map(|&f| self.faces[f])
            .filter(|f| !f.contains(&remove))
            .map(sorted)
            .collect();

        let touched: Vec<(usize, usize)> = self.vertex_faces[keep]
            .iter()
            .map(|&f| (f, keep))
            .chain(self.vertex_faces[remove].iter().map(|&f| (f, remove)))
            .collect();

        for (f, moved) in touched {
            let face = self.faces[f];
            if face.contains(&keep) && face.contains(&remove) {
                continue;
            }
            let old: [Vector3<f64>; 3] = face.map(|i| to_f64(&self.positions[i]));
            let new: [Vector3<f64>; 3] = face.map(|i| if i == moved { new_pos } else { to_f64(&self.positions[i]) });

            if moved == remove {
                let mut renamed = face.map(|i| if i == remove { keep } else { i });
                renamed = sorted(renamed);
                if keep_faces.contains(&renamed) {
                    return Err(Rejection::Duplicate);
                }
            }

            let n_old = (old[1] - old[0]).cross(&(old[2] - old[0]));
            let n_new = (new[1] - new[0]).cross(&(new[2] - new[0]));
            if options.preserve_normal && n_old.norm() > 0.0 && n_old.dot(&n_new) <= 0.0 {
                return Err(Rejection::NormalFlip);
            }
            min_quality = min_quality.min(triangle_quality(&new[0], &new[1], &new[2]));
        }

        let mut cost = plan.cost.max(QUADRIC_EPSILON);
        if min_quality < options.quality_threshold {
            cost *= options.quality_threshold / min_quality.max(1e-6);
        }
        plan.cost = cost;
        Ok(plan)
    }

    /// Apply a collapse plan. The plan must come from `plan_collapse` on the
    /// current state.
    fn apply(&mut self, plan: &CollapsePlan) {
        let (keep, remove) = (plan.keep, plan.remove);

        let shared = self.edge_faces(keep, remove);
        for &f in &shared {
            self.face_alive[f] = false;
            self.active_face_count -= 1;
            for v in self.faces[f] {
                self.vertex_faces[v].retain(|&g| g != f);
            }
        }

        let moved: Vec<usize> = std::mem::take(&mut self.vertex_faces[remove]);
        for &f in &moved {
            let c = match self.corner_of(f, remove) {
                Some(c) => c,
                None => continue,
            };
            self.faces[f][c] = keep;
            if let Some(uv) = &mut self.uv {
                let t = uv.faces[f][c];
                if let Some(&(_, k, _)) = plan.wedge_pairs.iter().find(|(r, _, _)| *r == t) {
                    uv.faces[f][c] = k;
                }
            }
            self.vertex_faces[keep].push(f);
        }

        if let Some(uv) = &mut self.uv {
            for &(r, k, coord) in &plan.wedge_pairs {
                uv.coords[k] = coord;
                if r != k {
                    let qr = uv.quadrics[r];
                    uv.quadrics[k] += qr;
                }
            }
        }

        let removed_quadric = self.quadrics[remove];
        self.quadrics[keep] += removed_quadric;
        self.positions[keep] = plan.position;
        self.vertex_alive[remove] = false;

        if let Some(ref mut colors) = self.colors {
            let c1 = colors[keep];
            let c2 = colors[remove];
            colors[keep] = [
                ((c1[0] as u16 + c2[0] as u16) / 2) as u8,
                ((c1[1] as u16 + c2[1] as u16) / 2) as u8,
                ((c1[2] as u16 + c2[2] as u16) / 2) as u8,
            ];
        }
    }

    fn to_triangle_mesh(&self, source: &TriangleMesh) -> meshfit_core::Result<TriangleMesh> {
        let mut old_to_new = vec![usize::MAX; self.positions.len()];
        let mut new_positions = Vec::new();
        let mut new_colors = self.colors.as_ref().map(|_| Vec::new());
        for (i, &alive) in self.vertex_alive.iter().enumerate() {
            if alive && !self.vertex_faces[i].is_empty() {
                old_to_new[i] = new_positions.len();
                new_positions.push(self.positions[i]);
                if let (Some(colors), Some(out)) = (&self.colors, new_colors.as_mut()) {
                    out.push(colors[i]);
                }
            }
        }

        let alive_faces: Vec<usize> = (0..self.faces.len()).filter(|&f| self.face_alive[f]).collect();
        let new_faces = alive_faces
            .iter()
            .map(|&f| self.faces[f].map(|v| old_to_new[v]))
            .collect();

        let mut mesh = TriangleMesh::from_vertices_and_faces(new_positions, new_faces);
        if let Some(colors) = new_colors {
            mesh.set_colors(colors);
        }
        if self.had_normals {
            mesh.compute_vertex_normals();
        }

        if let Some(uv) = &self.uv {
            let mut uv_old_to_new: HashMap<usize, usize> = HashMap::new();
            let mut coords = Vec::new();
            let mut faces = Vec::with_capacity(alive_faces.len());
            for &f in &alive_faces {
                faces.push(uv.faces[f].map(|t| {
                    *uv_old_to_new.entry(t).or_insert_with(|| {
                        coords.push(uv.coords[t]);
                        coords.len() - 1
                    })
                }));
            }
            mesh.set_uv(UvLayer::new(coords, faces))?;
        }

        if !source.materials.is_empty() {
            match &self.face_materials {
                Some(table) => {
                    let table = alive_faces.iter().map(|&f| table[f]).collect();
                    mesh.set_materials(source.materials.clone(), table)?;
                }
                None => mesh.materials = source.materials.clone(),
            }
        }
        Ok(mesh)
    }
}

fn edge_key(a: usize, b: usize) -> (usize, usize) {
    (a.min(b), a.max(b))
}

fn sorted(mut f: [usize; 3]) -> [usize; 3] {
    f.sort_unstable();
    f
}

fn lerp_uv(a: [f32; 2], b: [f32; 2], t: f64) -> [f32; 2] {
    let t = t as f32;
    [a[0] + (b[0] - a[0]) * t, a[1] + (b[1] - a[1]) * t]
}

// ============================================================
// Edge Cost for Priority Queue
// ============================================================

#[derive(Debug, Clone)]
struct EdgeCost {
    cost: f64,
}

impl PartialEq for EdgeCost {
    fn eq(&self, other: &Self) -> bool {
        self.cost.total_cmp(&other.cost) == Ordering::Equal
    }
}
impl Eq for EdgeCost {}

impl PartialOrd for EdgeCost {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EdgeCost {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap: smallest cost first
        other.cost.total_cmp(&self.cost)
    }
}

// ============================================================
// Edge Collapse Simplifier
// ============================================================

/// Texture-aware quadric edge collapse simplifier.
///
/// Candidate edges sit in an updatable priority queue keyed by edge; after
/// each collapse the edges around the surviving vertex are re-evaluated and
/// the edges of the removed vertex are dropped.
#[derive(Debug, Clone)]
pub struct EdgeCollapseSimplifier {
    pub options: SimplifyOptions,
}

impl EdgeCollapseSimplifier {
    pub fn new(options: SimplifyOptions) -> Self {
        Self { options }
    }

    /// Build the priority queue of collapse candidates over all edges.
    fn build_queue(&self, cm: &CollapseMesh) -> PriorityQueue<(usize, usize), EdgeCost> {
        let edges: Vec<(usize, usize)> = cm
            .faces
            .iter()
            .enumerate()
            .filter(|(f, _)| cm.face_alive[*f])
            .flat_map(|(_, face)| (0..3).map(move |k| edge_key(face[k], face[(k + 1) % 3])))
            .unique()
            .collect();

        let costs: Vec<((usize, usize), Option<f64>)> = edges
            .par_iter()
            .map(|&(a, b)| ((a, b), cm.plan_collapse(a, b, &self.options).ok().map(|p| p.cost)))
            .collect();

        let mut queue = PriorityQueue::with_capacity(costs.len());
        for (key, cost) in costs {
            if let Some(cost) = cost {
                queue.push(key, EdgeCost { cost });
            }
        }
        queue
    }

    fn decimate(&self, mesh: &TriangleMesh, target_faces: usize) -> Result<DecimationResult> {
        let original_triangles = mesh.face_count();
        let mut cm = CollapseMesh::from_triangle_mesh(mesh, &self.options);
        let mut queue = self.build_queue(&cm);
        let mut collapses_performed = 0usize;
        let mut collapses_rejected = 0usize;
        let mut rejections: HashMap<Rejection, usize> = HashMap::new();
        let mut since_rebuild = 0usize;

        log::debug!(
            "decimating {} faces to {} ({} candidate edges)",
            original_triangles,
            target_faces,
            queue.len()
        );

        while cm.active_face_count > target_faces {
            let Some(((a, b), _)) = queue.pop() else {
                // Edges skipped earlier may have become legal elsewhere
                if since_rebuild == 0 {
                    break;
                }
                since_rebuild = 0;
                queue = self.build_queue(&cm);
                continue;
            };

            if !cm.vertex_alive[a] || !cm.vertex_alive[b] {
                continue;
            }

            let plan = match cm.plan_collapse(a, b, &self.options) {
                Ok(plan) => plan,
                Err(reason) => {
                    collapses_rejected += 1;
                    *rejections.entry(reason).or_default() += 1;
                    continue;
                }
            };

            let old_neighbors = cm.neighbors(plan.remove);
            cm.apply(&plan);
            collapses_performed += 1;
            since_rebuild += 1;

            for n in old_neighbors {
                queue.remove(&edge_key(plan.remove, n));
            }
            for n in cm.neighbors(plan.keep) {
                let key = edge_key(plan.keep, n);
                match cm.plan_collapse(plan.keep, n, &self.options) {
                    Ok(p) => {
                        queue.push(key, EdgeCost { cost: p.cost });
                    }
                    Err(_) => {
                        queue.remove(&key);
                    }
                }
            }
        }

        if !rejections.is_empty() {
            log::debug!("rejected collapses by reason: {:?}", rejections);
        }

        let simplified = cm.to_triangle_mesh(mesh)?;
        let result = DecimationResult {
            original_triangles,
            final_triangles: simplified.face_count(),
            collapses_performed,
            collapses_rejected,
            mesh: simplified,
        };
        log::info!("{}", result);
        Ok(result)
    }
}

impl Default for EdgeCollapseSimplifier {
    fn default() -> Self {
        Self::new(SimplifyOptions::default())
    }
}

impl MeshSimplifier for EdgeCollapseSimplifier {
    fn simplify(&self, mesh: &TriangleMesh) -> Result<DecimationResult> {
        self.options.validate()?;
        if mesh.faces.is_empty() {
            return Err(SimplifyError::EmptyMesh);
        }
        mesh.validate()?;

        let target_faces = self.options.target_face_count(mesh.face_count())?;
        if target_faces >= mesh.face_count() {
            log::debug!(
                "target {} >= input {} faces, nothing to do",
                target_faces,
                mesh.face_count()
            );
            return Ok(DecimationResult {
                mesh: mesh.clone(),
                original_triangles: mesh.face_count(),
                final_triangles: mesh.face_count(),
                collapses_performed: 0,
                collapses_rejected: 0,
            });
        }
        self.decimate(mesh, target_faces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshfit_core::Material;
    use nalgebra::Point3;
    use std::collections::HashSet;

    fn make_single_triangle() -> TriangleMesh {
        TriangleMesh::from_vertices_and_faces(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.5, 1.0, 0.0),
            ],
            vec![[0, 1, 2]],
        )
    }

    fn make_tetrahedron() -> TriangleMesh {
        // Consistently wound: each shared edge appears in opposite directions
        TriangleMesh::from_vertices_and_faces(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.5, 1.0, 0.0),
                Point3::new(0.5, 0.5, 1.0),
            ],
            vec![[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]],
        )
    }

    fn make_plane_grid(size: usize) -> TriangleMesh {
        let mut vertices = Vec::new();
        for y in 0..size {
            for x in 0..size {
                vertices.push(Point3::new(x as f32, y as f32, 0.0));
            }
        }
        let mut faces = Vec::new();
        for y in 0..(size - 1) {
            for x in 0..(size - 1) {
                let tl = y * size + x;
                let tr = tl + 1;
                let bl = (y + 1) * size + x;
                let br = bl + 1;
                faces.push([tl, tr, bl]);
                faces.push([tr, br, bl]);
            }
        }
        TriangleMesh::from_vertices_and_faces(vertices, faces)
    }

    fn make_curved_surface(size: usize) -> TriangleMesh {
        let mut mesh = make_plane_grid(size);
        for p in &mut mesh.vertices {
            let fx = p.x / (size - 1) as f32 * std::f32::consts::PI;
            let fy = p.y / (size - 1) as f32 * std::f32::consts::PI;
            p.z = (fx.sin() * fy.sin()) * 2.0;
        }
        mesh
    }

    /// Closed octahedron-like sphere built by subdividing a cube's faces
    fn make_sphere(subdivisions: usize) -> TriangleMesh {
        let n = subdivisions;
        let mut vertices = Vec::new();
        let mut faces = Vec::new();
        let mut index: HashMap<(i64, i64, i64), usize> = HashMap::new();
        let mut vid = |p: Vector3<f64>, vertices: &mut Vec<Point3f>| {
            let key = ((p.x * 1e4).round() as i64, (p.y * 1e4).round() as i64, (p.z * 1e4).round() as i64);
            *index.entry(key).or_insert_with(|| {
                let s = p.normalize();
                vertices.push(Point3f::new(s.x as f32, s.y as f32, s.z as f32));
                vertices.len() - 1
            })
        };
        let axes = [
            (Vector3::x(), Vector3::y(), Vector3::z()),
            (-Vector3::x(), Vector3::z(), Vector3::y()),
            (Vector3::y(), Vector3::z(), Vector3::x()),
            (-Vector3::y(), Vector3::x(), Vector3::z()),
            (Vector3::z(), Vector3::x(), Vector3::y()),
            (-Vector3::z(), Vector3::y(), Vector3::x()),
        ];
        for (normal, u, v) in axes {
            let grid: Vec<Vec<usize>> = (0..=n)
                .map(|i| {
                    (0..=n)
                        .map(|j| {
                            let s = 2.0 * i as f64 / n as f64 - 1.0;
                            let t = 2.0 * j as f64 / n as f64 - 1.0;
                            vid(normal + u * s + v * t, &mut vertices)
                        })
                        .collect()
                })
                .collect();
            for i in 0..n {
                for j in 0..n {
                    let (a, b, c, d) = (grid[i][j], grid[i + 1][j], grid[i + 1][j + 1], grid[i][j + 1]);
                    faces.push([a, b, c]);
                    faces.push([a, c, d]);
                }
            }
        }
        // Orient outward
        for f in &mut faces {
            let [a, b, c] = f.map(|i| vertices[i].coords);
            if (b - a).cross(&(c - a)).dot(&a) < 0.0 {
                f.swap(1, 2);
            }
        }
        TriangleMesh::from_vertices_and_faces(vertices, faces)
    }

    /// Grid with a texture seam along x = seam_x: faces left of the seam use
    /// one chart, faces right of it a second chart offset in u.
    fn make_seamed_grid(size: usize, seam_x: usize) -> TriangleMesh {
        let mut mesh = make_plane_grid(size);
        let scale = 1.0 / (size - 1) as f32;
        let mut coords = Vec::new();
        for p in &mesh.vertices {
            coords.push([p.x * scale * 0.5, p.y * scale]);
        }
        let right_offset = coords.len();
        for p in &mesh.vertices {
            coords.push([0.5 + p.x * scale * 0.5, p.y * scale]);
        }
        let uv_faces = mesh
            .faces
            .iter()
            .map(|f| {
                let right = f.iter().all(|&v| mesh.vertices[v].x >= seam_x as f32);
                f.map(|v| if right { v + right_offset } else { v })
            })
            .collect();
        let uv = UvLayer::new(coords, uv_faces);
        mesh.set_uv(uv).unwrap();
        mesh
    }

    fn simplifier(options: SimplifyOptions) -> EdgeCollapseSimplifier {
        EdgeCollapseSimplifier::new(options)
    }

    fn assert_valid(mesh: &TriangleMesh) {
        mesh.validate().unwrap();
        for f in &mesh.faces {
            assert!(f[0] != f[1] && f[1] != f[2] && f[2] != f[0], "degenerate face {:?}", f);
        }
    }

    fn total_area(mesh: &TriangleMesh) -> f32 {
        (0..mesh.face_count())
            .map(|f| {
                let [a, b, c] = mesh.triangle(f);
                (b - a).cross(&(c - a)).norm() * 0.5
            })
            .sum()
    }

    // ---- Construction tests ----

    #[test]
    fn test_working_mesh_construction() {
        let mesh = make_tetrahedron();
        let cm = CollapseMesh::from_triangle_mesh(&mesh, &SimplifyOptions::default());
        assert_eq!(cm.active_face_count, 4);
        for v in 0..4 {
            assert_eq!(cm.neighbors(v).len(), 3, "tetrahedron vertex should have 3 neighbors");
            assert!(!cm.is_boundary_vertex(v));
        }
        assert_eq!(cm.edge_faces(0, 1).len(), 2);
    }

    #[test]
    fn test_boundary_vertices() {
        let mesh = make_single_triangle();
        let cm = CollapseMesh::from_triangle_mesh(&mesh, &SimplifyOptions::default());
        for v in 0..3 {
            assert!(cm.is_boundary_vertex(v));
        }
    }

    #[test]
    fn test_tetrahedron_collapse_rejected() {
        // Any collapse would fold the tetrahedron into two coincident faces
        let mesh = make_tetrahedron();
        let cm = CollapseMesh::from_triangle_mesh(&mesh, &SimplifyOptions::default());
        assert!(cm.plan_collapse(0, 1, &SimplifyOptions::default()).is_err());
    }

    #[test]
    fn test_seam_detection() {
        let mesh = make_seamed_grid(5, 2);
        let cm = CollapseMesh::from_triangle_mesh(&mesh, &SimplifyOptions::default());
        for (v, p) in mesh.vertices.iter().enumerate() {
            assert_eq!(cm.is_seam_vertex(v), p.x == 2.0, "vertex {} at {:?}", v, p);
        }
        // Vertical edge on the seam between (2, 1) and (2, 2)
        let (a, b) = (5 + 2, 10 + 2);
        let shared = cm.edge_faces(a, b);
        assert!(cm.is_seam_edge(a, b, &shared));
    }

    // ---- Simplification tests ----

    #[test]
    fn test_empty_mesh() {
        let s = simplifier(SimplifyOptions::with_reduction_ratio(0.5));
        assert!(matches!(s.simplify(&TriangleMesh::new()), Err(SimplifyError::EmptyMesh)));
    }

    #[test]
    fn test_missing_target() {
        let s = EdgeCollapseSimplifier::default();
        assert!(matches!(s.simplify(&make_tetrahedron()), Err(SimplifyError::MissingTarget)));
    }

    #[test]
    fn test_zero_reduction() {
        let s = simplifier(SimplifyOptions::with_reduction_ratio(0.0));
        let result = s.simplify(&make_plane_grid(4)).unwrap();
        assert_eq!(result.final_triangles, 18);
        assert!(!result.was_decimated());
    }

    #[test]
    fn test_planar_grid_reaches_target() {
        let mesh = make_plane_grid(9);
        let original_faces = mesh.face_count();
        assert_eq!(original_faces, 128);

        let s = simplifier(SimplifyOptions::with_target_faces(40));
        let result = s.simplify(&mesh).unwrap();
        assert!(result.final_triangles <= 40, "got {}", result.final_triangles);
        assert!(result.final_triangles > 0);
        assert_eq!(result.original_triangles, original_faces);
        assert!(result.was_decimated());
        assert_valid(&result.mesh);
    }

    #[test]
    fn test_boundary_preservation() {
        let mesh = make_plane_grid(8);
        let area = total_area(&mesh);
        let s = simplifier(SimplifyOptions::with_reduction_ratio(0.7));
        let result = s.simplify(&mesh).unwrap();
        assert!(result.final_triangles < mesh.face_count());

        // Boundary constraints keep the outline, so the covered area is unchanged
        assert!((total_area(&result.mesh) - area).abs() < 1e-3 * area);
        for p in &result.mesh.vertices {
            assert!(p.x >= -1e-4 && p.x <= 7.0001 && p.y >= -1e-4 && p.y <= 7.0001);
            assert!(p.z.abs() < 1e-4);
        }
        let corners: HashSet<(i32, i32)> = result
            .mesh
            .vertices
            .iter()
            .map(|p| (p.x.round() as i32, p.y.round() as i32))
            .collect();
        for corner in [(0, 0), (7, 0), (0, 7), (7, 7)] {
            assert!(corners.contains(&corner), "corner {:?} lost", corner);
        }
    }

    #[test]
    fn test_curved_surface_simplification() {
        let mesh = make_curved_surface(10);
        let s = simplifier(SimplifyOptions::with_reduction_ratio(0.5));
        let result = s.simplify(&mesh).unwrap();
        assert!(result.final_triangles <= mesh.face_count() / 2);
        assert_valid(&result.mesh);
    }

    #[test]
    fn test_closed_sphere_stays_closed() {
        let mesh = make_sphere(4);
        let s = simplifier(SimplifyOptions::with_reduction_ratio(0.6));
        let result = s.simplify(&mesh).unwrap();
        assert!(result.final_triangles < mesh.face_count());
        assert_valid(&result.mesh);

        // Every edge of a closed manifold is shared by exactly two faces
        let mut edge_count: HashMap<(usize, usize), usize> = HashMap::new();
        for f in &result.mesh.faces {
            for k in 0..3 {
                *edge_count.entry(edge_key(f[k], f[(k + 1) % 3])).or_default() += 1;
            }
        }
        assert!(edge_count.values().all(|&c| c == 2));
    }

    #[test]
    fn test_planar_and_endpoint_placement() {
        let mesh = make_curved_surface(8);
        let options = SimplifyOptions::with_reduction_ratio(0.5)
            .planar(true)
            .optimal_placement(false);
        let result = simplifier(options).simplify(&mesh).unwrap();
        assert!(result.final_triangles < mesh.face_count());
        assert_valid(&result.mesh);
    }

    #[test]
    fn test_face_count_never_increases() {
        let mesh = make_curved_surface(6);
        for target in [1, 10, 49, 50, 500] {
            let result = simplifier(SimplifyOptions::with_target_faces(target))
                .simplify(&mesh)
                .unwrap();
            assert!(result.final_triangles <= mesh.face_count());
        }
    }

    #[test]
    fn test_normals_recomputed() {
        let mut mesh = make_plane_grid(6);
        mesh.compute_vertex_normals();
        let result = simplifier(SimplifyOptions::with_reduction_ratio(0.5))
            .simplify(&mesh)
            .unwrap();
        let normals = result.mesh.normals.as_ref().expect("normals should be kept");
        assert_eq!(normals.len(), result.mesh.vertex_count());
        for n in normals {
            assert!(n.z > 0.99, "normal z should be close to 1.0, got {}", n.z);
        }
    }

    #[test]
    fn test_colors_and_materials_preserved() {
        let mut mesh = make_plane_grid(6);
        let n = mesh.vertex_count();
        mesh.set_colors(vec![[200, 100, 50]; n]);
        let face_materials = (0..mesh.face_count()).map(|f| f % 2).collect();
        mesh.set_materials(
            vec![Material::new("left"), Material::with_texture("right", "skin.png")],
            face_materials,
        )
        .unwrap();

        let result = simplifier(SimplifyOptions::with_reduction_ratio(0.5))
            .simplify(&mesh)
            .unwrap();
        let out = &result.mesh;
        assert_eq!(out.materials.len(), 2);
        assert_eq!(out.face_materials.as_ref().unwrap().len(), out.face_count());
        assert!(out.colors.as_ref().unwrap().iter().all(|&c| c == [200, 100, 50]));
        assert_valid(out);
    }

    #[test]
    fn test_texture_seam_preserved() {
        let mesh = make_seamed_grid(9, 4);
        let result = simplifier(SimplifyOptions::with_reduction_ratio(0.6))
            .simplify(&mesh)
            .unwrap();
        let out = &result.mesh;
        assert!(result.final_triangles < mesh.face_count());
        assert_valid(out);

        let uv = out.uv.as_ref().unwrap();
        assert_eq!(uv.faces.len(), out.face_count());

        // Every vertex that still carries two charts sits on the seam line
        let mut wedges: HashMap<usize, HashSet<usize>> = HashMap::new();
        for (f, face) in out.faces.iter().enumerate() {
            for c in 0..3 {
                wedges.entry(face[c]).or_default().insert(uv.faces[f][c]);
            }
        }
        let seam_vertices: Vec<usize> = wedges
            .iter()
            .filter(|(_, w)| w.len() > 1)
            .map(|(&v, _)| v)
            .collect();
        assert!(!seam_vertices.is_empty(), "seam disappeared");
        for v in seam_vertices {
            assert!((out.vertices[v].x - 4.0).abs() < 1e-5, "seam vertex moved off the seam");
        }

        // Charts stay separated: left faces use u <= 0.25, right faces u >= 0.5
        for (f, face) in out.faces.iter().enumerate() {
            let us: Vec<f32> = (0..3).map(|c| uv.corner(f, c)[0]).collect();
            let left = us.iter().all(|&u| u <= 0.25 + 1e-4);
            let right = us.iter().all(|&u| u >= 0.5 - 1e-4);
            assert!(left || right, "face {:?} mixes charts: {:?}", face, us);
        }
    }

    #[test]
    fn test_seams_ignored_when_disabled() {
        let mesh = make_seamed_grid(7, 3);
        let options = SimplifyOptions::with_target_faces(20).preserve_seams(false);
        let result = simplifier(options).simplify(&mesh).unwrap();
        assert!(result.final_triangles <= 20);
        assert_valid(&result.mesh);
    }

    #[test]
    fn test_tetrahedron_cannot_shrink() {
        let result = simplifier(SimplifyOptions::with_target_faces(2))
            .simplify(&make_tetrahedron())
            .unwrap();
        assert_eq!(result.final_triangles, 4);
        assert_eq!(result.collapses_performed, 0);
        assert_eq!(result.mesh.faces, make_tetrahedron().faces);
    }
}
