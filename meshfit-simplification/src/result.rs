//! Result types for decimation operations.

use meshfit_core::TriangleMesh;

/// Result of mesh decimation.
#[derive(Debug, Clone)]
pub struct DecimationResult {
    /// The decimated mesh.
    pub mesh: TriangleMesh,

    /// Number of triangles in the input mesh.
    pub original_triangles: usize,

    /// Number of triangles in the decimated mesh.
    pub final_triangles: usize,

    /// Number of edge collapses performed.
    pub collapses_performed: usize,

    /// Number of queued collapses rejected by the legality checks.
    pub collapses_rejected: usize,
}

impl DecimationResult {
    /// Ratio of final to original triangles
    pub fn reduction_ratio(&self) -> f64 {
        if self.original_triangles == 0 {
            1.0
        } else {
            self.final_triangles as f64 / self.original_triangles as f64
        }
    }

    /// Percentage of triangles removed
    pub fn reduction_percent(&self) -> f64 {
        (1.0 - self.reduction_ratio()) * 100.0
    }

    pub fn was_decimated(&self) -> bool {
        self.collapses_performed > 0
    }
}

impl std::fmt::Display for DecimationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Decimation: {} → {} triangles ({:.1}% reduction, {} collapses, {} rejected)",
            self.original_triangles,
            self.final_triangles,
            self.reduction_percent(),
            self.collapses_performed,
            self.collapses_rejected
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(original: usize, final_: usize, performed: usize) -> DecimationResult {
        DecimationResult {
            mesh: TriangleMesh::new(),
            original_triangles: original,
            final_triangles: final_,
            collapses_performed: performed,
            collapses_rejected: 3,
        }
    }

    #[test]
    fn test_reduction_ratio() {
        let r = result(1000, 250, 380);
        assert!((r.reduction_ratio() - 0.25).abs() < 1e-9);
        assert!((r.reduction_percent() - 75.0).abs() < 1e-9);
        assert!(r.was_decimated());
        assert!(!result(10, 10, 0).was_decimated());
        assert_eq!(result(0, 0, 0).reduction_percent(), 0.0);
    }

    #[test]
    fn test_display() {
        let display = format!("{}", result(1000, 500, 250));
        assert!(display.contains("1000"));
        assert!(display.contains("500"));
        assert!(display.contains("50.0%"));
        assert!(display.contains("3 rejected"));
    }
}
