//! The downsample, resize and view operations

use crate::args::{Args, BboxArg, ViewArgs};
use crate::config::{Config, SimplifyConfig, ViewConfig};
use crate::error::CliError;
use meshfit_core::{diameter_svd, Bounded, BoxKind, Transform3D, Transformable, TriangleMesh, Vector3f};
use meshfit_simplification::{decimate, SimplifyOptions, Target};
use meshfit_visualization::{show_mesh, ViewOptions};
use std::io::Write;
use std::path::Path;

/// Outcome of a decimation run
#[derive(Debug, Clone, PartialEq)]
pub struct DownsampleSummary {
    pub input_faces: usize,
    pub target_faces: usize,
    pub output_faces: usize,
}

/// Outcome of a resize run
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeSummary {
    pub scale: f32,
    pub extents_before: Vector3f,
    pub extents_after: Vector3f,
}

/// Merge config values and command-line overrides, then validate
pub fn simplify_options(args: &Args, config: &SimplifyConfig) -> Result<SimplifyOptions, CliError> {
    let target = Target::from_parts(args.target_faces, args.reduction_ratio)?;
    let mut options = config.to_options(target);
    if let Some(weight) = args.texture_weight {
        options.texture_weight = weight;
    }
    if let Some(weight) = args.boundary_weight {
        options.boundary_weight = weight;
    }
    if let Some(threshold) = args.quality_threshold {
        options.quality_threshold = threshold;
    }
    if args.planar {
        options.planar = true;
    }
    if args.no_optimal_placement {
        options.optimal_placement = false;
    }
    if args.no_preserve_boundary {
        options.preserve_boundary = false;
    }
    options.validate()?;
    Ok(options)
}

/// Bounding box kind after the command-line override
pub fn box_kind(bbox: Option<BboxArg>, config: &ViewConfig) -> BoxKind {
    bbox.map(BoxKind::from).unwrap_or(config.bbox_kind)
}

/// Viewer settings, or `None` when viewing is disabled
pub fn view_options(args: &Args, config: &ViewConfig, path: &Path) -> Option<ViewOptions> {
    if args.no_view || !config.show {
        return None;
    }
    Some(build_view_options(config, path, !args.no_bbox, box_kind(args.bbox, config)))
}

fn build_view_options(config: &ViewConfig, path: &Path, show_bbox: bool, kind: BoxKind) -> ViewOptions {
    ViewOptions {
        title: format!("meshfit - {}", file_label(path)),
        show_bbox: config.bbox && show_bbox,
        bbox_kind: kind,
        axis_length: config.axis_length,
        ..Default::default()
    }
}

/// Decimate `args.input` and save the result to `args.output`.
pub fn downsample(args: &Args, config: &Config, out: &mut dyn Write) -> Result<DownsampleSummary, CliError> {
    let options = simplify_options(args, &config.simplify)?;
    ensure_input(&args.input)?;
    let mut report = Report::new(out, args.quiet);

    report.line(format_args!("🟢 Loading mesh: {}", file_label(&args.input)));
    let mesh = load(&args.input)?;
    let input_faces = mesh.face_count();

    let target_faces = options.target_face_count(input_faces)?;
    if let Some(Target::Ratio(ratio)) = options.target {
        report.line(format_args!(
            "📊 Target faces from reduction ratio {:.1}%: {}",
            ratio * 100.0,
            target_faces
        ));
    }
    report.line(format_args!(
        "🔧 Start decimation (target_faces={}, texture_weight={})",
        target_faces, options.texture_weight
    ));

    let result = decimate(&mesh, &options)?;
    log::debug!("{}", result);
    let output_faces = result.mesh.face_count();

    report.line(format_args!("💾 Saving to: {}", args.output.display()));
    save(&result.mesh, &args.output)?;

    let reduced = if input_faces == 0 {
        0.0
    } else {
        (1.0 - output_faces as f64 / input_faces as f64) * 100.0
    };
    report.line(format_args!(
        "✅ Done! Faces: {} → {} (reduced {:.1}%)",
        group_thousands(input_faces),
        group_thousands(output_faces),
        reduced
    ));

    if let Some(view) = view_options(args, &config.view, &args.output) {
        if let Some(saved) = reload(&args.output) {
            preview(&saved, view);
        }
    }

    Ok(DownsampleSummary {
        input_faces,
        target_faces,
        output_faces,
    })
}

/// Scale `args.input` so its smallest box extent equals `args.size`, then
/// export to `args.output`.
pub fn resize(args: &Args, config: &Config, out: &mut dyn Write) -> Result<ResizeSummary, CliError> {
    if let Some(size) = args.size {
        if !(size.is_finite() && size > 0.0) {
            return Err(CliError::InvalidArgument(format!(
                "--size must be a positive number (got {})",
                size
            )));
        }
    }
    ensure_input(&args.input)?;
    let mut report = Report::new(out, args.quiet);
    let kind = box_kind(args.bbox, &config.view);

    let mut mesh = load(&args.input)?;
    let before = mesh
        .bounding_box(kind)
        .ok_or_else(|| CliError::EmptyMesh(args.input.clone()))?;
    let model_size = before.min_extent();
    log::info!("model size {} ({:?} box), diameter {}", model_size, kind, diameter_svd(&mesh));
    report.mesh_info("original info:", &mesh, &before.extents);

    let scale = match args.size {
        Some(_) if model_size <= 0.0 => return Err(CliError::ZeroExtent),
        Some(size) => size / model_size,
        None => 1.0,
    };
    mesh.transform(&Transform3D::uniform_scaling(scale));

    let after = mesh
        .bounding_box(kind)
        .ok_or_else(|| CliError::EmptyMesh(args.input.clone()))?;
    report.mesh_info("resized mesh info:", &mesh, &after.extents);

    if let Some(view) = view_options(args, &config.view, &args.input) {
        preview(&mesh, view);
    }
    save(&mesh, &args.output)?;

    Ok(ResizeSummary {
        scale,
        extents_before: before.extents,
        extents_after: after.extents,
    })
}

/// Open a mesh file in the viewer
pub fn view(args: &ViewArgs) -> Result<(), CliError> {
    ensure_input(&args.path)?;
    let mesh = load(&args.path)?;
    let config = ViewConfig::default();
    let options = build_view_options(&config, &args.path, !args.no_bbox, box_kind(args.bbox, &config));
    show_mesh(&mesh, options).map_err(CliError::View)
}

/// Processing has already succeeded, so a viewer that cannot start (no
/// display, no GPU) only warns.
fn preview(mesh: &TriangleMesh, options: ViewOptions) {
    if let Err(e) = show_mesh(mesh, options) {
        log::warn!("Viewer unavailable: {}", e);
    }
}

/// Read back a written mesh so the preview shows what was saved
fn reload(path: &Path) -> Option<TriangleMesh> {
    match load(path) {
        Ok(mesh) => Some(mesh),
        Err(e) => {
            log::warn!("Cannot reload {} for preview: {}", path.display(), e);
            None
        }
    }
}

fn ensure_input(path: &Path) -> Result<(), CliError> {
    if path.exists() {
        Ok(())
    } else {
        Err(CliError::InputMissing(path.to_path_buf()))
    }
}

fn load(path: &Path) -> Result<TriangleMesh, CliError> {
    meshfit_io::read_mesh(path).map_err(|source| CliError::Load {
        path: path.to_path_buf(),
        source,
    })
}

fn save(mesh: &TriangleMesh, path: &Path) -> Result<(), CliError> {
    meshfit_io::write_mesh(mesh, path).map_err(|source| CliError::Save {
        path: path.to_path_buf(),
        source,
    })
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// `1234567` -> `1,234,567`
pub fn group_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

pub fn format_extents(extents: &Vector3f) -> String {
    format!("[{} {} {}]", extents.x, extents.y, extents.z)
}

/// Progress lines on stdout, silenced by `--quiet`
struct Report<'a> {
    out: &'a mut dyn Write,
    quiet: bool,
}

impl<'a> Report<'a> {
    fn new(out: &'a mut dyn Write, quiet: bool) -> Self {
        Self { out, quiet }
    }

    fn line(&mut self, message: std::fmt::Arguments<'_>) {
        if self.quiet {
            return;
        }
        if let Err(e) = writeln!(self.out, "{}", message) {
            log::debug!("report output failed: {}", e);
        }
    }

    fn mesh_info(&mut self, heading: &str, mesh: &TriangleMesh, extents: &Vector3f) {
        self.line(format_args!("{}", heading));
        self.line(format_args!("  vertices: {}", mesh.vertex_count()));
        self.line(format_args!("  faces: {}", mesh.face_count()));
        self.line(format_args!("  extents: {}", format_extents(extents)));
    }
}
