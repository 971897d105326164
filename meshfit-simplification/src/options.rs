//! Parameters for texture-aware decimation.

use crate::error::{Result, SimplifyError};

/// Smallest face count a ratio-derived target is allowed to reach
pub const MIN_TARGET_FACES: usize = 4;

/// How far to decimate
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Target {
    /// Stop once the mesh has at most this many faces
    Faces(usize),
    /// Remove this fraction of the faces, in [0, 1)
    Ratio(f64),
}

impl Target {
    /// Build a target from the two mutually exclusive user inputs.
    pub fn from_parts(target_faces: Option<usize>, reduction_ratio: Option<f64>) -> Result<Self> {
        let target = match (target_faces, reduction_ratio) {
            (None, None) => return Err(SimplifyError::MissingTarget),
            (Some(_), Some(_)) => return Err(SimplifyError::ConflictingTarget),
            (Some(n), None) => Target::Faces(n),
            (None, Some(r)) => Target::Ratio(r),
        };
        target.validate()?;
        Ok(target)
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            Target::Faces(0) => Err(SimplifyError::InvalidTargetCount(0)),
            Target::Faces(_) => Ok(()),
            // NaN fails the range check too
            Target::Ratio(r) if !(0.0..1.0).contains(&r) => Err(SimplifyError::InvalidRatio(r)),
            Target::Ratio(_) => Ok(()),
        }
    }

    /// Face count to decimate `input_faces` down to.
    ///
    /// Ratios give `max(floor(input_faces * (1 - ratio)), 4)`; explicit
    /// counts are used verbatim.
    pub fn face_count(&self, input_faces: usize) -> usize {
        match *self {
            Target::Faces(n) => n,
            Target::Ratio(r) => {
                let kept = (input_faces as f64 * (1.0 - r)).floor() as usize;
                kept.max(MIN_TARGET_FACES)
            }
        }
    }
}

/// Parameters for texture-aware quadric edge collapse.
#[derive(Debug, Clone, PartialEq)]
pub struct SimplifyOptions {
    /// Required; see [`Target`]
    pub target: Option<Target>,

    /// Weight of the texture coordinates in the extended quadric. Default: 1.5
    pub texture_weight: f64,

    /// Add constraint quadrics along open boundaries. Default: true
    pub preserve_boundary: bool,

    /// Weight of the boundary constraint quadrics. Default: 1.0
    pub boundary_weight: f64,

    /// Collapses producing triangles of lower quality are penalised. Default: 0.3
    pub quality_threshold: f64,

    /// Add a small edge-perpendicular quadric on every edge. Default: false
    pub planar: bool,

    /// Solve for the optimal collapse position; otherwise pick the best of the
    /// endpoints and the midpoint. Default: true
    pub optimal_placement: bool,

    /// Reject collapses that flip a face normal. Default: true
    pub preserve_normal: bool,

    /// Keep texture seams topologically intact. Default: true
    pub preserve_seams: bool,
}

impl Default for SimplifyOptions {
    fn default() -> Self {
        Self {
            target: None,
            texture_weight: 1.5,
            preserve_boundary: true,
            boundary_weight: 1.0,
            quality_threshold: 0.3,
            planar: false,
            optimal_placement: true,
            preserve_normal: true,
            preserve_seams: true,
        }
    }
}

impl SimplifyOptions {
    /// Options targeting a face count
    pub fn with_target_faces(count: usize) -> Self {
        Self {
            target: Some(Target::Faces(count)),
            ..Default::default()
        }
    }

    /// Options targeting a reduction ratio
    pub fn with_reduction_ratio(ratio: f64) -> Self {
        Self {
            target: Some(Target::Ratio(ratio)),
            ..Default::default()
        }
    }

    pub fn texture_weight(mut self, weight: f64) -> Self {
        self.texture_weight = weight;
        self
    }

    pub fn preserve_boundary(mut self, preserve: bool) -> Self {
        self.preserve_boundary = preserve;
        self
    }

    pub fn boundary_weight(mut self, weight: f64) -> Self {
        self.boundary_weight = weight;
        self
    }

    pub fn quality_threshold(mut self, threshold: f64) -> Self {
        self.quality_threshold = threshold;
        self
    }

    pub fn planar(mut self, planar: bool) -> Self {
        self.planar = planar;
        self
    }

    pub fn optimal_placement(mut self, optimal: bool) -> Self {
        self.optimal_placement = optimal;
        self
    }

    pub fn preserve_normal(mut self, preserve: bool) -> Self {
        self.preserve_normal = preserve;
        self
    }

    pub fn preserve_seams(mut self, preserve: bool) -> Self {
        self.preserve_seams = preserve;
        self
    }

    /// Check the target and every weight.
    pub fn validate(&self) -> Result<()> {
        self.target.ok_or(SimplifyError::MissingTarget)?.validate()?;
        for (name, value) in [
            ("texture_weight", self.texture_weight),
            ("boundary_weight", self.boundary_weight),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(SimplifyError::InvalidWeight { name, value });
            }
        }
        if !(0.0..=1.0).contains(&self.quality_threshold) {
            return Err(SimplifyError::InvalidQualityThreshold(self.quality_threshold));
        }
        Ok(())
    }

    /// Face count for a mesh with `input_faces` faces
    pub fn target_face_count(&self, input_faces: usize) -> Result<usize> {
        Ok(self.target.ok_or(SimplifyError::MissingTarget)?.face_count(input_faces))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = SimplifyOptions::default();
        assert!(options.target.is_none());
        assert_eq!(options.texture_weight, 1.5);
        assert!(options.preserve_boundary);
        assert_eq!(options.quality_threshold, 0.3);
        assert!(!options.planar);
        assert!(options.optimal_placement);
        assert!(options.preserve_normal);
        assert!(matches!(options.validate(), Err(SimplifyError::MissingTarget)));
    }

    #[test]
    fn test_target_exclusivity() {
        assert!(matches!(Target::from_parts(None, None), Err(SimplifyError::MissingTarget)));
        assert!(matches!(
            Target::from_parts(Some(100), Some(0.5)),
            Err(SimplifyError::ConflictingTarget)
        ));
        assert_eq!(Target::from_parts(Some(100), None).unwrap(), Target::Faces(100));
        assert_eq!(Target::from_parts(None, Some(0.5)).unwrap(), Target::Ratio(0.5));
    }

    #[test]
    fn test_ratio_range() {
        assert!(Target::from_parts(None, Some(0.0)).is_ok());
        assert!(Target::from_parts(None, Some(0.999)).is_ok());
        for bad in [1.0, 1.5, -0.1, f64::NAN] {
            assert!(matches!(
                Target::from_parts(None, Some(bad)),
                Err(SimplifyError::InvalidRatio(_))
            ));
        }
        assert!(matches!(
            Target::from_parts(Some(0), None),
            Err(SimplifyError::InvalidTargetCount(0))
        ));
    }

    #[test]
    fn test_face_count_from_ratio() {
        assert_eq!(Target::Ratio(0.5).face_count(1000), 500);
        assert_eq!(Target::Ratio(0.75).face_count(1001), 250);
        assert_eq!(Target::Ratio(0.99).face_count(100), MIN_TARGET_FACES);
        assert_eq!(Target::Ratio(0.0).face_count(12), 12);
        assert_eq!(Target::Faces(7).face_count(1000), 7);
    }

    #[test]
    fn test_weight_validation() {
        let options = SimplifyOptions::with_target_faces(10).texture_weight(-1.0);
        assert!(matches!(options.validate(), Err(SimplifyError::InvalidWeight { .. })));
        let options = SimplifyOptions::with_target_faces(10).boundary_weight(f64::INFINITY);
        assert!(options.validate().is_err());
        let options = SimplifyOptions::with_reduction_ratio(0.5).quality_threshold(1.2);
        assert!(matches!(
            options.validate(),
            Err(SimplifyError::InvalidQualityThreshold(_))
        ));
        assert!(SimplifyOptions::with_reduction_ratio(0.5).validate().is_ok());
    }
}
