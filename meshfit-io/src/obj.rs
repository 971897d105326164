//! OBJ format support
//!
//! Files are parsed and written with the `obj` crate, material libraries
//! through its `Mtl` support. Polygons are fan-triangulated.

use crate::error::IoError;
use crate::registry::{MeshReader, MeshWriter};
use crate::texture::{export_textures, resolve_texture};
use meshfit_core::{Material, Point3f, Result, TriangleMesh, UvLayer, Vector3f};
use ::obj::{
    Group, IndexTuple, LoadConfig, Material as MtlMaterial, Mtl, Obj, ObjData, ObjError, ObjMaterial, Object,
    SimplePolygon,
};
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Cursor};
use std::path::Path;
use std::sync::Arc;

/// MTL statements the `obj` parser understands; other lines (PBR extensions
/// and the like) are dropped before parsing.
const MTL_KEYWORDS: &[&str] = &[
    "newmtl", "Ka", "Kd", "Ks", "Ke", "Km", "Ns", "Ni", "d", "Tr", "Tf", "illum", "map_Ka", "map_Kd",
    "map_Ks", "map_Ns", "map_d", "map_refl", "refl", "map_bump", "map_Bump", "bump",
];

pub struct ObjReader;
pub struct ObjWriter;

impl MeshReader for ObjReader {
    fn read_mesh(&self, path: &Path) -> Result<TriangleMesh> {
        let mut obj = Obj::load_with_config(path, LoadConfig { strict: false })
            .map_err(|e| parse_error(path, e))?;
        if let Err(failed) = obj.load_mtls_fn(|dir, lib| open_mtl(&resolve_texture(dir, lib))) {
            for (lib, e) in &failed.0 {
                log::warn!("could not read material library {}: {}", lib, e);
            }
        }
        obj_to_mesh(&obj.data, &obj.path)
    }

    fn can_read(&self, path: &Path) -> bool {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(_) => return false,
        };
        BufReader::new(file)
            .lines()
            .take(256)
            .map_while(|l| l.ok())
            .any(|line| {
                let line = line.trim_start();
                line.starts_with("v ") || line.starts_with("f ") || line.starts_with("mtllib")
            })
    }

    fn format_name(&self) -> &'static str {
        "obj"
    }
}

fn parse_error(path: &Path, e: ObjError) -> IoError {
    match e {
        ObjError::Io(e) => IoError::Io(e),
        other => IoError::ParseError {
            path: path.display().to_string(),
            message: other.to_string(),
        },
    }
}

/// Material library contents with unsupported statements removed
fn open_mtl(path: &Path) -> io::Result<Cursor<Vec<u8>>> {
    let text = fs::read_to_string(path)?;
    let mut kept = String::with_capacity(text.len());
    for line in text.lines() {
        let keyword = line.split_whitespace().next();
        match keyword {
            Some(k) if !k.starts_with('#') && !MTL_KEYWORDS.contains(&k) => {
                log::debug!("{}: skipping '{}'", path.display(), k);
            }
            _ => {
                kept.push_str(line);
                kept.push('\n');
            }
        }
    }
    Ok(Cursor::new(kept.into_bytes()))
}

/// File name of a texture map statement, without leading options such as
/// `-s 1 1 1` or `-clamp on`. Names may contain spaces.
pub fn texture_file_name(map: &str) -> Option<String> {
    let tokens: Vec<&str> = map.split_whitespace().collect();
    let mut i = 0;
    while i < tokens.len() && tokens[i].starts_with('-') {
        let (max_args, numeric) = match tokens[i] {
            "-o" | "-s" | "-t" => (3, true),
            "-mm" => (2, true),
            "-blendu" | "-blendv" | "-cc" | "-clamp" | "-bm" | "-boost" | "-imfchan" | "-texres" | "-type" => {
                (1, false)
            }
            _ => (0, false),
        };
        i += 1;
        let mut taken = 0;
        while taken < max_args && i < tokens.len() && (!numeric || tokens[i].parse::<f32>().is_ok()) {
            i += 1;
            taken += 1;
        }
    }
    let name = tokens[i..].join(" ");
    (!name.is_empty()).then_some(name)
}

fn to_material(m: &MtlMaterial, mtl_dir: &Path) -> Material {
    Material {
        name: m.name.clone(),
        diffuse: m.kd,
        diffuse_texture: m
            .map_kd
            .as_deref()
            .and_then(texture_file_name)
            .map(|file| resolve_texture(mtl_dir, &file)),
    }
}

/// Read the materials of a `.mtl` file
pub fn read_mtl(path: &Path) -> Result<Vec<Material>> {
    let input = open_mtl(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => IoError::FileNotFound {
            path: path.display().to_string(),
        },
        _ => IoError::Io(e),
    })?;
    let mut lib = Mtl::new(path.display().to_string());
    lib.reload(input).map_err(|e| IoError::ParseError {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let mtl_dir = path.parent().unwrap_or_else(|| Path::new("."));
    Ok(lib.materials.iter().map(|m| to_material(m, mtl_dir)).collect())
}

fn obj_material_name(material: &ObjMaterial) -> &str {
    match material {
        ObjMaterial::Ref(name) => name,
        ObjMaterial::Mtl(m) => &m.name,
    }
}

fn obj_to_mesh(data: &ObjData, base_dir: &Path) -> Result<TriangleMesh> {
    let vertices: Vec<Point3f> = data.position.iter().map(|&[x, y, z]| Point3f::new(x, y, z)).collect();

    // The first library defining a name wins
    let mut library: Vec<Material> = Vec::new();
    for lib in &data.material_libs {
        let mtl_path = resolve_texture(base_dir, &lib.filename);
        let mtl_dir = mtl_path.parent().unwrap_or(base_dir);
        for m in &lib.materials {
            if !library.iter().any(|existing| existing.name == m.name) {
                library.push(to_material(m, mtl_dir));
            }
        }
    }

    let mut faces = Vec::new();
    let mut corners: Vec<[IndexTuple; 3]> = Vec::new();
    let mut face_material_names: Vec<Option<&str>> = Vec::new();
    for group in data.objects.iter().flat_map(|o| &o.groups) {
        let material = group.material.as_ref().map(obj_material_name);
        for SimplePolygon(ring) in &group.polys {
            if ring.len() < 3 {
                continue;
            }
            for i in 1..ring.len() - 1 {
                let tri = [ring[0], ring[i], ring[i + 1]];
                if let Some(bad) = tri.iter().find(|c| c.0 >= vertices.len()) {
                    return Err(IoError::InvalidFormat {
                        format: format!("OBJ face references missing vertex {}", bad.0.wrapping_add(1)),
                    }
                    .into());
                }
                faces.push([tri[0].0, tri[1].0, tri[2].0]);
                corners.push(tri);
                face_material_names.push(material);
            }
        }
    }

    let mut mesh = TriangleMesh::from_vertices_and_faces(vertices, faces);

    if corners.iter().flatten().any(|c| c.1.is_some()) {
        let mut coords = data.texture.clone();
        // Corners without a `vt` reference share one fallback coordinate
        let fallback = coords.len();
        coords.push([0.0, 0.0]);
        let mut uv_faces = Vec::with_capacity(corners.len());
        for tri in &corners {
            let mut f = [fallback; 3];
            for (slot, corner) in f.iter_mut().zip(tri) {
                if let Some(t) = corner.1 {
                    if t >= fallback {
                        return Err(IoError::InvalidFormat {
                            format: format!("OBJ face references missing texture coordinate {}", t.wrapping_add(1)),
                        }
                        .into());
                    }
                    *slot = t;
                }
            }
            uv_faces.push(f);
        }
        let mut uv = UvLayer::new(coords, uv_faces);
        uv.split_shared_wedges(&mesh.faces);
        mesh.set_uv(uv)?;
    }

    if !data.normal.is_empty() && corners.iter().flatten().any(|c| c.2.is_some()) {
        let mut accum = vec![Vector3f::zeros(); mesh.vertex_count()];
        let mut seen = vec![false; mesh.vertex_count()];
        for corner in corners.iter().flatten() {
            if let Some(&[x, y, z]) = corner.2.and_then(|n| data.normal.get(n)) {
                accum[corner.0] += Vector3f::new(x, y, z);
                seen[corner.0] = true;
            }
        }
        if seen.iter().all(|&s| s) {
            let normals = accum
                .into_iter()
                .map(|n| n.try_normalize(f32::EPSILON).unwrap_or_else(Vector3f::z))
                .collect();
            mesh.set_normals(normals);
        } else {
            mesh.compute_vertex_normals();
        }
    }

    if face_material_names.iter().any(Option::is_some) || !library.is_empty() {
        let (materials, table) = assign_materials(library, &face_material_names);
        mesh.set_materials(materials, table)?;
    }

    log::debug!(
        "parsed OBJ: {} vertices, {} faces, {} materials",
        mesh.vertex_count(),
        mesh.face_count(),
        mesh.materials.len()
    );
    Ok(mesh)
}

/// Map `usemtl` names onto library entries. Names missing from the library
/// become plain materials; faces without `usemtl` use a "default" material.
fn assign_materials(mut library: Vec<Material>, names: &[Option<&str>]) -> (Vec<Material>, Vec<usize>) {
    let mut table = Vec::with_capacity(names.len());
    let mut default_index = None;
    for name in names {
        let index = match name {
            Some(name) if !name.is_empty() => match library.iter().position(|m| m.name == *name) {
                Some(i) => i,
                None => {
                    library.push(Material::new(*name));
                    library.len() - 1
                }
            },
            _ => *default_index.get_or_insert_with(|| {
                match library.iter().position(|m| m.name == "default") {
                    Some(i) => i,
                    None => {
                        library.push(Material::new("default"));
                        library.len() - 1
                    }
                }
            }),
        };
        table.push(index);
    }
    (library, table)
}

fn to_mtl_material(material: &Material) -> MtlMaterial {
    let mut m = MtlMaterial::new(material.name.clone());
    m.kd = Some(material.diffuse.unwrap_or([1.0, 1.0, 1.0]));
    m.map_kd = material
        .diffuse_texture
        .as_ref()
        .map(|texture| texture.to_string_lossy().into_owned());
    m
}

/// One group per run of faces sharing a material
fn material_groups(mesh: &TriangleMesh) -> Vec<Group> {
    let has_normals = mesh.normals.is_some();
    let corner = |fi: usize, c: usize| {
        let v = mesh.faces[fi][c];
        IndexTuple(
            v,
            mesh.uv.as_ref().map(|uv| uv.faces[fi][c]),
            has_normals.then_some(v),
        )
    };

    let mut groups: Vec<Group> = Vec::new();
    let mut current: Option<usize> = None;
    for fi in 0..mesh.faces.len() {
        let material = (!mesh.materials.is_empty())
            .then(|| mesh.face_materials.as_ref().map_or(0, |t| t[fi]));
        if groups.is_empty() || material != current {
            let mut group = Group::new(match material {
                Some(m) => mesh.materials[m].name.clone(),
                None => "mesh".to_string(),
            });
            group.material = material.map(|m| ObjMaterial::Ref(mesh.materials[m].name.clone()));
            groups.push(group);
            current = material;
        }
        if let Some(group) = groups.last_mut() {
            group.polys.push(SimplePolygon((0..3).map(|c| corner(fi, c)).collect()));
        }
    }
    groups
}

impl MeshWriter for ObjWriter {
    fn write_mesh(&self, mesh: &TriangleMesh, path: &Path) -> Result<()> {
        let out_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("mesh")
            .to_string();

        let mut material_libs = Vec::new();
        if !mesh.materials.is_empty() {
            let materials = export_textures(&mesh.materials, out_dir)?;
            let mut lib = Mtl::new(format!("{}.mtl", stem));
            lib.materials = materials.iter().map(|m| Arc::new(to_mtl_material(m))).collect();
            material_libs.push(lib);
        }

        let mut object = Object::new("default".to_string());
        object.groups = material_groups(mesh);
        let data = ObjData {
            position: mesh.vertices.iter().map(|v| [v.x, v.y, v.z]).collect(),
            texture: mesh.uv.as_ref().map(|uv| uv.coords.clone()).unwrap_or_default(),
            normal: mesh
                .normals
                .as_ref()
                .map(|normals| normals.iter().map(|n| [n.x, n.y, n.z]).collect())
                .unwrap_or_default(),
            objects: vec![object],
            material_libs,
        };
        data.save(path).map_err(|e| match e {
            ObjError::Io(e) => IoError::Io(e),
            other => IoError::WriteError {
                message: other.to_string(),
            },
        })?;
        Ok(())
    }

    fn format_name(&self) -> &'static str {
        "obj"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::tempdir;

    const TEXTURED_QUAD: &str = "\
mtllib quad.mtl
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 0 1
usemtl skin
f 1/1/1 2/2/1 3/3/1 4/4/1
";

    const QUAD_MTL: &str = "\
newmtl skin
Kd 0.5 0.25 1.0
map_Kd -s 1 1 1 albedo.png
";

    #[test]
    fn test_read_textured_polygon() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("quad.obj"), TEXTURED_QUAD).unwrap();
        fs::write(dir.path().join("quad.mtl"), QUAD_MTL).unwrap();

        let mesh = ObjReader.read_mesh(&dir.path().join("quad.obj")).unwrap();
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.face_count(), 2);
        assert_eq!(mesh.faces[0], [0, 1, 2]);
        assert_eq!(mesh.faces[1], [0, 2, 3]);

        let uv = mesh.uv.as_ref().unwrap();
        assert_eq!(uv.corner(1, 2), [0.0, 1.0]);
        assert!(mesh.normals.is_some());

        assert_eq!(mesh.materials.len(), 1);
        let material = mesh.face_material(0).unwrap();
        assert_eq!(material.name, "skin");
        assert_eq!(material.diffuse, Some([0.5, 0.25, 1.0]));
        assert_eq!(
            material.diffuse_texture.as_deref(),
            Some(dir.path().join("albedo.png").as_path())
        );
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_missing_mtl_keeps_material_names() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("quad.obj"), TEXTURED_QUAD).unwrap();
        let mesh = ObjReader.read_mesh(&dir.path().join("quad.obj")).unwrap();
        assert_eq!(mesh.materials.len(), 1);
        assert_eq!(mesh.materials[0].name, "skin");
        assert!(!mesh.has_texture());
    }

    #[test]
    fn test_plain_obj_has_no_attributes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tri.obj");
        fs::write(&path, "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();
        assert!(ObjReader.can_read(&path));
        let mesh = ObjReader.read_mesh(&path).unwrap();
        assert_eq!(mesh.face_count(), 1);
        assert!(mesh.uv.is_none());
        assert!(mesh.normals.is_none());
        assert!(mesh.materials.is_empty());
    }

    #[test]
    fn test_write_then_read_textured() {
        let src = tempdir().unwrap();
        fs::write(src.path().join("quad.obj"), TEXTURED_QUAD).unwrap();
        fs::write(src.path().join("quad.mtl"), QUAD_MTL).unwrap();
        fs::write(src.path().join("albedo.png"), b"png").unwrap();
        let mesh = ObjReader.read_mesh(&src.path().join("quad.obj")).unwrap();

        let out = tempdir().unwrap();
        let out_path = out.path().join("result.obj");
        ObjWriter.write_mesh(&mesh, &out_path).unwrap();
        assert!(out.path().join("result.mtl").is_file());
        assert!(out.path().join("albedo.png").is_file());

        let reread = ObjReader.read_mesh(&out_path).unwrap();
        assert_eq!(reread.vertex_count(), mesh.vertex_count());
        assert_eq!(reread.face_count(), mesh.face_count());
        assert_eq!(reread.materials[0].name, "skin");
        assert!(reread.has_texture());
        let uv = reread.uv.as_ref().unwrap();
        assert_relative_eq!(uv.corner(0, 1)[0], 1.0);
    }

    #[test]
    fn test_texture_name_with_spaces_and_pbr_statements() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("quad.obj"), TEXTURED_QUAD).unwrap();
        fs::write(
            dir.path().join("quad.mtl"),
            "# exported\nnewmtl skin\nKd 1 1 1\nPr 0.5\nmap_Pr rough.png\nmap_Kd -s 1 1 1 -clamp on my albedo.png\n",
        )
        .unwrap();

        let mesh = ObjReader.read_mesh(&dir.path().join("quad.obj")).unwrap();
        let material = mesh.face_material(0).unwrap();
        assert_eq!(material.diffuse, Some([1.0, 1.0, 1.0]));
        assert_eq!(
            material.diffuse_texture.as_deref(),
            Some(dir.path().join("my albedo.png").as_path())
        );

        let out = tempdir().unwrap();
        fs::write(dir.path().join("my albedo.png"), b"png").unwrap();
        ObjWriter.write_mesh(&mesh, &out.path().join("copy.obj")).unwrap();
        assert!(out.path().join("my albedo.png").is_file());
        let materials = read_mtl(&out.path().join("copy.mtl")).unwrap();
        assert_eq!(
            materials[0].diffuse_texture.as_deref(),
            Some(out.path().join("my albedo.png").as_path())
        );
    }

    #[test]
    fn test_texture_file_name_options() {
        assert_eq!(texture_file_name("albedo.png").as_deref(), Some("albedo.png"));
        assert_eq!(texture_file_name("-s 2 2 albedo.png").as_deref(), Some("albedo.png"));
        assert_eq!(texture_file_name("-o 0.5 -bm 1 wood grain.jpg").as_deref(), Some("wood grain.jpg"));
        assert_eq!(texture_file_name("-mm 0 1 -imfchan r map.tga").as_deref(), Some("map.tga"));
        assert_eq!(texture_file_name("-clamp on"), None);
    }

    #[test]
    fn test_read_mtl_missing_file() {
        let dir = tempdir().unwrap();
        assert!(read_mtl(&dir.path().join("none.mtl")).is_err());
    }

    #[test]
    fn test_assign_materials_default() {
        let (materials, table) = assign_materials(Vec::new(), &[None, Some("a"), None]);
        assert_eq!(materials.len(), 2);
        assert_eq!(table, vec![0, 1, 0]);
        assert_eq!(materials[0].name, "default");
    }
}
