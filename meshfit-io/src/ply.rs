//! PLY format support
//!
//! Texture information follows the conventions used by common scanners and
//! MeshLab: per-face `texcoord` lists (six floats per triangle), optional
//! per-vertex `s,t` / `u,v` / `texture_u,texture_v`, per-face `texnumber`
//! and `comment TextureFile <name>` header lines.

use crate::error::IoError;
use crate::registry::{MeshReader, MeshWriter};
use crate::texture::{export_textures, resolve_texture};
use meshfit_core::{Material, Point3f, Result, TriangleMesh, UvLayer, Vector3f};
use ply_rs::{
    parser::Parser,
    ply::{
        Addable, DefaultElement, ElementDef, Encoding, Ply, Property, PropertyDef, PropertyType,
        ScalarType,
    },
    writer::Writer,
};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

const TEXTURE_FILE_COMMENT: &str = "TextureFile";

pub struct PlyReader;

/// PLY writer; ASCII by default
#[derive(Debug, Clone, Copy, Default)]
pub struct PlyWriter {
    pub binary: bool,
}

impl PlyWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn binary() -> Self {
        Self { binary: true }
    }
}

impl MeshReader for PlyReader {
    fn read_mesh(&self, path: &Path) -> Result<TriangleMesh> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);

        let parser = Parser::<DefaultElement>::new();
        let ply = parser.read_ply(&mut reader).map_err(|e| IoError::ParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        ply_to_mesh(&ply, base_dir)
    }

    fn can_read(&self, path: &Path) -> bool {
        let mut magic = [0u8; 3];
        File::open(path)
            .and_then(|mut f| f.read_exact(&mut magic))
            .map(|_| &magic == b"ply")
            .unwrap_or(false)
    }

    fn format_name(&self) -> &'static str {
        "ply"
    }
}

fn ply_to_mesh(ply: &Ply<DefaultElement>, base_dir: &Path) -> Result<TriangleMesh> {
    let empty = Vec::new();
    let vertex_rows = ply.payload.get("vertex").unwrap_or(&empty);
    let face_rows = ply.payload.get("face").unwrap_or(&empty);

    let mut vertices = Vec::with_capacity(vertex_rows.len());
    for vertex in vertex_rows {
        let x = extract_property_value(vertex, "x")?;
        let y = extract_property_value(vertex, "y")?;
        let z = extract_property_value(vertex, "z")?;
        vertices.push(Point3f::new(x, y, z));
    }

    // Fan-triangulate, remembering the source row for per-face attributes
    let mut faces = Vec::with_capacity(face_rows.len());
    let mut face_rows_of_tri = Vec::with_capacity(face_rows.len());
    let mut corner_of_tri = Vec::with_capacity(face_rows.len());
    for (row, face) in face_rows.iter().enumerate() {
        let indices = extract_face_indices(face)?;
        if let Some(&bad) = indices.iter().find(|&&i| i >= vertices.len()) {
            return Err(IoError::InvalidFormat {
                format: format!("PLY face references missing vertex {}", bad),
            }
            .into());
        }
        for i in 1..indices.len().saturating_sub(1) {
            faces.push([indices[0], indices[i], indices[i + 1]]);
            face_rows_of_tri.push(row);
            corner_of_tri.push([0, i, i + 1]);
        }
    }

    let mut mesh = TriangleMesh::from_vertices_and_faces(vertices, faces);

    let normals: Option<Vec<Vector3f>> = vertex_rows
        .iter()
        .map(|v| {
            Some(Vector3f::new(
                extract_property_value(v, "nx").ok()?,
                extract_property_value(v, "ny").ok()?,
                extract_property_value(v, "nz").ok()?,
            ))
        })
        .collect();
    if let Some(normals) = normals.filter(|n| !n.is_empty()) {
        mesh.set_normals(normals);
    }

    let colors: Option<Vec<[u8; 3]>> = vertex_rows
        .iter()
        .map(|v| Some([extract_color(v, "red")?, extract_color(v, "green")?, extract_color(v, "blue")?]))
        .collect();
    if let Some(colors) = colors.filter(|c| !c.is_empty()) {
        mesh.set_colors(colors);
    }

    // Per-face wedge coordinates take precedence over per-vertex ones
    let wedge_lists: Option<Vec<Vec<f32>>> = face_rows
        .iter()
        .map(|f| extract_float_list(f, "texcoord"))
        .collect();
    if let Some(lists) = wedge_lists.filter(|l| !l.is_empty()) {
        let mut coords: Vec<[f32; 2]> = Vec::new();
        let mut lookup: HashMap<(usize, u32, u32), usize> = HashMap::new();
        let mut uv_faces = Vec::with_capacity(mesh.face_count());
        for (ti, face) in mesh.faces.iter().enumerate() {
            let list = &lists[face_rows_of_tri[ti]];
            let mut f = [0usize; 3];
            for c in 0..3 {
                let k = corner_of_tri[ti][c];
                let uv = match (list.get(2 * k), list.get(2 * k + 1)) {
                    (Some(&u), Some(&v)) => [u, v],
                    _ => {
                        return Err(IoError::InvalidFormat {
                            format: format!("PLY texcoord list too short on face {}", face_rows_of_tri[ti]),
                        }
                        .into())
                    }
                };
                let key = (face[c], uv[0].to_bits(), uv[1].to_bits());
                f[c] = *lookup.entry(key).or_insert_with(|| {
                    coords.push(uv);
                    coords.len() - 1
                });
            }
            uv_faces.push(f);
        }
        mesh.set_uv(UvLayer::new(coords, uv_faces))?;
    } else if let Some(coords) = per_vertex_uv(vertex_rows) {
        let faces = mesh.faces.clone();
        mesh.set_uv(UvLayer::per_vertex(coords, &faces))?;
    }

    let textures: Vec<&str> = ply
        .header
        .comments
        .iter()
        .filter_map(|c| {
            let c = c.trim();
            let c = c.strip_prefix("comment").map(str::trim_start).unwrap_or(c);
            c.strip_prefix(TEXTURE_FILE_COMMENT).map(str::trim)
        })
        .filter(|name| !name.is_empty())
        .collect();
    if !textures.is_empty() {
        let materials: Vec<Material> = textures
            .iter()
            .enumerate()
            .map(|(i, name)| Material::with_texture(format!("material_{}", i), resolve_texture(base_dir, name)))
            .collect();
        let table: Vec<usize> = face_rows_of_tri
            .iter()
            .map(|&row| {
                extract_index(&face_rows[row], "texnumber")
                    .filter(|&t| t < materials.len())
                    .unwrap_or(0)
            })
            .collect();
        mesh.set_materials(materials, table)?;
    }

    log::debug!(
        "parsed PLY: {} vertices, {} faces, uv: {}, textures: {}",
        mesh.vertex_count(),
        mesh.face_count(),
        mesh.uv.is_some(),
        mesh.materials.len()
    );
    Ok(mesh)
}

fn per_vertex_uv(vertex_rows: &[DefaultElement]) -> Option<Vec<[f32; 2]>> {
    const NAMES: [(&str, &str); 3] = [("s", "t"), ("u", "v"), ("texture_u", "texture_v")];
    let (su, sv) = NAMES
        .iter()
        .find(|(u, v)| vertex_rows.first().map_or(false, |r| r.contains_key(*u) && r.contains_key(*v)))?;
    vertex_rows
        .iter()
        .map(|r| Some([extract_property_value(r, su).ok()?, extract_property_value(r, sv).ok()?]))
        .collect()
}

impl MeshWriter for PlyWriter {
    fn write_mesh(&self, mesh: &TriangleMesh, path: &Path) -> Result<()> {
        let out_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let materials = export_textures(&mesh.materials, out_dir)?;

        let mut ply = Ply::<DefaultElement>::new();
        ply.header.encoding = if self.binary {
            Encoding::BinaryLittleEndian
        } else {
            Encoding::Ascii
        };

        // texture slot per material; untextured materials fall back to slot 0
        let mut texture_slot = vec![0i32; materials.len()];
        let mut texture_count = 0;
        for (slot, material) in texture_slot.iter_mut().zip(&materials) {
            if let Some(texture) = &material.diffuse_texture {
                ply.header
                    .comments
                    .push(format!("{} {}", TEXTURE_FILE_COMMENT, texture.display()));
                *slot = texture_count;
                texture_count += 1;
            }
        }

        let mut vertex_element = ElementDef::new("vertex".to_string());
        vertex_element.count = mesh.vertices.len();
        for name in ["x", "y", "z"] {
            vertex_element
                .properties
                .add(PropertyDef::new(name.to_string(), PropertyType::Scalar(ScalarType::Float)));
        }
        if mesh.normals.is_some() {
            for name in ["nx", "ny", "nz"] {
                vertex_element
                    .properties
                    .add(PropertyDef::new(name.to_string(), PropertyType::Scalar(ScalarType::Float)));
            }
        }
        if mesh.colors.is_some() {
            for name in ["red", "green", "blue"] {
                vertex_element
                    .properties
                    .add(PropertyDef::new(name.to_string(), PropertyType::Scalar(ScalarType::UChar)));
            }
        }
        ply.header.elements.add(vertex_element);

        let mut face_element = ElementDef::new("face".to_string());
        face_element.count = mesh.faces.len();
        face_element.properties.add(PropertyDef::new(
            "vertex_indices".to_string(),
            PropertyType::List(ScalarType::UChar, ScalarType::Int),
        ));
        if mesh.uv.is_some() {
            face_element.properties.add(PropertyDef::new(
                "texcoord".to_string(),
                PropertyType::List(ScalarType::UChar, ScalarType::Float),
            ));
        }
        let write_texnumber = texture_count > 1 && mesh.face_materials.is_some();
        if write_texnumber {
            face_element
                .properties
                .add(PropertyDef::new("texnumber".to_string(), PropertyType::Scalar(ScalarType::Int)));
        }
        ply.header.elements.add(face_element);

        let mut vertices = Vec::with_capacity(mesh.vertices.len());
        for (i, vertex) in mesh.vertices.iter().enumerate() {
            let mut row = DefaultElement::new();
            row.insert("x".to_string(), Property::Float(vertex.x));
            row.insert("y".to_string(), Property::Float(vertex.y));
            row.insert("z".to_string(), Property::Float(vertex.z));
            if let Some(normals) = &mesh.normals {
                row.insert("nx".to_string(), Property::Float(normals[i].x));
                row.insert("ny".to_string(), Property::Float(normals[i].y));
                row.insert("nz".to_string(), Property::Float(normals[i].z));
            }
            if let Some(colors) = &mesh.colors {
                row.insert("red".to_string(), Property::UChar(colors[i][0]));
                row.insert("green".to_string(), Property::UChar(colors[i][1]));
                row.insert("blue".to_string(), Property::UChar(colors[i][2]));
            }
            vertices.push(row);
        }
        ply.payload.insert("vertex".to_string(), vertices);

        let mut faces = Vec::with_capacity(mesh.faces.len());
        for (fi, face) in mesh.faces.iter().enumerate() {
            let mut row = DefaultElement::new();
            let indices = face.iter().map(|&i| i as i32).collect();
            row.insert("vertex_indices".to_string(), Property::ListInt(indices));
            if let Some(uv) = &mesh.uv {
                let list = (0..3).flat_map(|c| uv.corner(fi, c)).collect();
                row.insert("texcoord".to_string(), Property::ListFloat(list));
            }
            if write_texnumber {
                let material = mesh.face_materials.as_ref().map_or(0, |t| t[fi]);
                row.insert("texnumber".to_string(), Property::Int(texture_slot[material]));
            }
            faces.push(row);
        }
        ply.payload.insert("face".to_string(), faces);

        let mut out = BufWriter::new(File::create(path)?);
        let written = if self.binary {
            write_binary(&mut out, &ply)
        } else {
            Writer::new().write_ply(&mut out, &mut ply).map(|_| ())
        };
        written.map_err(|e| IoError::WriteError { message: e.to_string() })?;
        out.flush()?;
        Ok(())
    }

    fn format_name(&self) -> &'static str {
        "ply"
    }
}

/// ply-rs prefixes every binary list with the element count, so face rows
/// are written by `write_binary_rows`.
fn write_binary<W: Write>(out: &mut W, ply: &Ply<DefaultElement>) -> io::Result<()> {
    let writer = Writer::<DefaultElement>::new();
    writer.write_header(out, &ply.header)?;
    for (name, def) in ply.header.elements.iter() {
        let rows = match ply.payload.get(name) {
            Some(rows) => rows,
            None => continue,
        };
        if name == "face" {
            write_binary_rows(out, rows, def)?;
        } else {
            writer.write_payload_of_element(out, rows, def, &ply.header)?;
        }
    }
    Ok(())
}

/// Little-endian face rows, each list prefixed with its own length
fn write_binary_rows<W: Write>(out: &mut W, rows: &[DefaultElement], def: &ElementDef) -> io::Result<()> {
    for row in rows {
        for name in def.properties.keys() {
            match row.get(name) {
                Some(Property::Int(v)) => out.write_all(&v.to_le_bytes())?,
                Some(Property::ListInt(list)) => {
                    out.write_all(&[list_len(list.len())?])?;
                    for v in list {
                        out.write_all(&v.to_le_bytes())?;
                    }
                }
                Some(Property::ListFloat(list)) => {
                    out.write_all(&[list_len(list.len())?])?;
                    for v in list {
                        out.write_all(&v.to_le_bytes())?;
                    }
                }
                _ => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("unsupported face property '{}'", name),
                    ))
                }
            }
        }
    }
    Ok(())
}

fn list_len(len: usize) -> io::Result<u8> {
    u8::try_from(len).map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "list longer than 255 entries"))
}

/// Extract a property value as f32 from a PLY element
fn extract_property_value(element: &DefaultElement, name: &str) -> Result<f32> {
    match element.get(name) {
        Some(Property::Float(val)) => Ok(*val),
        Some(Property::Double(val)) => Ok(*val as f32),
        Some(Property::Int(val)) => Ok(*val as f32),
        Some(Property::UInt(val)) => Ok(*val as f32),
        Some(Property::Short(val)) => Ok(*val as f32),
        Some(Property::UShort(val)) => Ok(*val as f32),
        Some(Property::Char(val)) => Ok(*val as f32),
        Some(Property::UChar(val)) => Ok(*val as f32),
        _ => Err(IoError::InvalidFormat {
            format: format!("PLY property '{}' not found or invalid type", name),
        }
        .into()),
    }
}

/// Colour channel as u8; float channels are taken as [0, 1]
fn extract_color(element: &DefaultElement, name: &str) -> Option<u8> {
    let value = match element.get(name)? {
        Property::UChar(v) => *v,
        Property::Float(v) => (v.clamp(0.0, 1.0) * 255.0).round() as u8,
        Property::Double(v) => (v.clamp(0.0, 1.0) * 255.0).round() as u8,
        Property::Int(v) => (*v).clamp(0, 255) as u8,
        Property::UInt(v) => (*v).min(255) as u8,
        Property::UShort(v) => (*v).min(255) as u8,
        _ => return None,
    };
    Some(value)
}

fn extract_index(element: &DefaultElement, name: &str) -> Option<usize> {
    match element.get(name)? {
        Property::Int(v) => usize::try_from(*v).ok(),
        Property::UInt(v) => Some(*v as usize),
        Property::UChar(v) => Some(*v as usize),
        Property::Char(v) => usize::try_from(*v).ok(),
        Property::Short(v) => usize::try_from(*v).ok(),
        Property::UShort(v) => Some(*v as usize),
        _ => None,
    }
}

fn extract_float_list(element: &DefaultElement, name: &str) -> Option<Vec<f32>> {
    match element.get(name)? {
        Property::ListFloat(v) => Some(v.clone()),
        Property::ListDouble(v) => Some(v.iter().map(|&x| x as f32).collect()),
        _ => None,
    }
}

/// Extract face indices from a PLY face element
fn extract_face_indices(element: &DefaultElement) -> Result<Vec<usize>> {
    let to_index = |i: i64| {
        usize::try_from(i).map_err(|_| IoError::InvalidFormat {
            format: format!("negative PLY vertex index {}", i),
        })
    };
    let indices: std::result::Result<Vec<usize>, IoError> =
        match element.get("vertex_indices").or_else(|| element.get("vertex_index")) {
            Some(Property::ListInt(v)) => v.iter().map(|&i| to_index(i as i64)).collect(),
            Some(Property::ListUInt(v)) => Ok(v.iter().map(|&i| i as usize).collect()),
            Some(Property::ListShort(v)) => v.iter().map(|&i| to_index(i as i64)).collect(),
            Some(Property::ListUShort(v)) => Ok(v.iter().map(|&i| i as usize).collect()),
            Some(Property::ListChar(v)) => v.iter().map(|&i| to_index(i as i64)).collect(),
            Some(Property::ListUChar(v)) => Ok(v.iter().map(|&i| i as usize).collect()),
            _ => Err(IoError::InvalidFormat {
                format: "PLY face indices not found".to_string(),
            }),
        };
    Ok(indices?)
}
