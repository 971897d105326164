//! Decimation throughput on plain and textured grids

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use meshfit_core::{Point3f, TriangleMesh, UvLayer};
use meshfit_simplification::{decimate, SimplifyOptions};

fn generate_grid_mesh(size: usize) -> TriangleMesh {
    let mut vertices = Vec::with_capacity(size * size);
    for y in 0..size {
        for x in 0..size {
            let fx = x as f32 / (size - 1) as f32 * std::f32::consts::PI;
            let fy = y as f32 / (size - 1) as f32 * std::f32::consts::PI;
            vertices.push(Point3f::new(x as f32, y as f32, (fx.sin() * fy.sin()) * 2.0));
        }
    }
    let mut faces = Vec::with_capacity((size - 1) * (size - 1) * 2);
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

fn generate_textured_grid(size: usize) -> TriangleMesh {
    let mut mesh = generate_grid_mesh(size);
    let scale = 1.0 / (size - 1) as f32;
    let coords = mesh.vertices.iter().map(|p| [p.x * scale, p.y * scale]).collect();
    let uv = UvLayer::per_vertex(coords, &mesh.faces);
    mesh.set_uv(uv).unwrap();
    mesh
}

fn bench_decimation(c: &mut Criterion) {
    let sizes = [10, 20, 40];
    let ratios = [0.3, 0.5, 0.7];

    let mut group = c.benchmark_group("decimation");

    for &size in &sizes {
        let plain = generate_grid_mesh(size);
        let textured = generate_textured_grid(size);
        let face_count = plain.face_count();

        for &ratio in &ratios {
            let options = SimplifyOptions::with_reduction_ratio(ratio);
            let label = format!("{}f_r{}", face_count, (ratio * 100.0) as u32);

            group.bench_with_input(BenchmarkId::new("plain", &label), &plain, |b, mesh| {
                b.iter(|| black_box(decimate(black_box(mesh), &options).unwrap()));
            });
            group.bench_with_input(BenchmarkId::new("textured", &label), &textured, |b, mesh| {
                b.iter(|| black_box(decimate(black_box(mesh), &options).unwrap()));
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_decimation);
criterion_main!(benches);
