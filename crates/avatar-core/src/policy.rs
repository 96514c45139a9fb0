use crate::types::MaskType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

pub const DEFAULT_PITCH: AngleRange = AngleRange::new(-10.0, 10.0);
pub const DEFAULT_YAW: AngleRange = AngleRange::new(-10.0, 10.0);
pub const DEFAULT_ROLL: AngleRange = AngleRange::new(-20.0, 20.0);
pub const DEFAULT_MIN_FACE_BOX_SIZE: f32 = 20.0;
pub const DEFAULT_COMPLETENESS_THRESHOLD: f32 = 50.0;
pub const DEFAULT_MAX_ALLOWED_FACES: usize = 1;

#[derive(Error, Debug, PartialEq)]
pub enum PolicyError {
    #[error("{axis} range is inverted: min {min} > max {max}")]
    InvertedRange { axis: Axis, min: f32, max: f32 },
    #[error("{axis} range has a non-finite bound")]
    NonFiniteRange { axis: Axis },
    #[error("completeness threshold {0} is outside 0..=100")]
    ThresholdOutOfRange(f32),
    #[error("minimum face box size {0} must be a non-negative number")]
    InvalidMinBoxSize(f32),
    #[error("max_allowed_faces must be at least 1")]
    ZeroMaxFaces,
}

/// Head rotation axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Pitch,
    Yaw,
    Roll,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Axis::Pitch => "pitch",
            Axis::Yaw => "yaw",
            Axis::Roll => "roll",
        })
    }
}

/// Inclusive range of acceptable angles, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AngleRange {
    pub min: f32,
    pub max: f32,
}

impl AngleRange {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Both bounds are inclusive. NaN is never contained.
    pub fn contains(&self, value: f32) -> bool {
        self.min <= value && value <= self.max
    }
}

fn default_pitch() -> AngleRange {
    DEFAULT_PITCH
}

fn default_yaw() -> AngleRange {
    DEFAULT_YAW
}

fn default_roll() -> AngleRange {
    DEFAULT_ROLL
}

fn default_min_face_box_size() -> f32 {
    DEFAULT_MIN_FACE_BOX_SIZE
}

fn default_max_allowed_faces() -> usize {
    DEFAULT_MAX_ALLOWED_FACES
}

fn default_completeness_threshold() -> f32 {
    DEFAULT_COMPLETENESS_THRESHOLD
}

/// Acceptability rules for one deployment.
///
/// No `Default`: `allowed_mask_types` must always be spelled out, since
/// deployments disagree on whether a correctly worn mask is acceptable.
/// Every other field falls back to its documented default when omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    #[serde(default = "default_pitch")]
    pub pitch: AngleRange,
    #[serde(default = "default_yaw")]
    pub yaw: AngleRange,
    #[serde(default = "default_roll")]
    pub roll: AngleRange,
    pub allowed_mask_types: BTreeSet<MaskType>,
    #[serde(default)]
    pub disallow_sunglasses: bool,
    #[serde(default)]
    pub disallow_closed_eyes: bool,
    #[serde(default)]
    pub disallow_hat: bool,
    /// Minimum width and height of the primary face box, in pixels.
    #[serde(default = "default_min_face_box_size")]
    pub min_face_box_size: f32,
    #[serde(default = "default_max_allowed_faces")]
    pub max_allowed_faces: usize,
    /// Regions scoring strictly below this (0–100) count as occluded.
    #[serde(default = "default_completeness_threshold")]
    pub completeness_threshold: f32,
    /// Stop at the first violation instead of collecting all of them.
    #[serde(default)]
    pub fail_fast: bool,
}

impl PolicyConfig {
    /// Documented defaults with the given mask allow-list. Attribute
    /// prohibitions (sunglasses, closed eyes, hat) start disabled.
    pub fn new(allowed_mask_types: BTreeSet<MaskType>) -> Self {
        Self {
            pitch: DEFAULT_PITCH,
            yaw: DEFAULT_YAW,
            roll: DEFAULT_ROLL,
            allowed_mask_types,
            disallow_sunglasses: false,
            disallow_closed_eyes: false,
            disallow_hat: false,
            min_face_box_size: DEFAULT_MIN_FACE_BOX_SIZE,
            max_allowed_faces: DEFAULT_MAX_ALLOWED_FACES,
            completeness_threshold: DEFAULT_COMPLETENESS_THRESHOLD,
            fail_fast: false,
        }
    }

    pub fn range(&self, axis: Axis) -> AngleRange {
        match axis {
            Axis::Pitch => self.pitch,
            Axis::Yaw => self.yaw,
            Axis::Roll => self.roll,
        }
    }

    pub fn allows_mask(&self, mask: MaskType) -> bool {
        self.allowed_mask_types.contains(&mask)
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        for axis in [Axis::Pitch, Axis::Yaw, Axis::Roll] {
            let range = self.range(axis);
            if !range.min.is_finite() || !range.max.is_finite() {
                return Err(PolicyError::NonFiniteRange { axis });
            }
            if range.min > range.max {
                return Err(PolicyError::InvertedRange { axis, min: range.min, max: range.max });
            }
        }
        if !(0.0..=100.0).contains(&self.completeness_threshold) {
            return Err(PolicyError::ThresholdOutOfRange(self.completeness_threshold));
        }
        if self.min_face_box_size.is_nan() || self.min_face_box_size < 0.0 {
            return Err(PolicyError::InvalidMinBoxSize(self.min_face_box_size));
        }
        if self.max_allowed_faces == 0 {
            return Err(PolicyError::ZeroMaxFaces);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare() -> PolicyConfig {
        PolicyConfig::new(BTreeSet::from([MaskType::None]))
    }

    #[test]
    fn test_range_is_inclusive() {
        let r = AngleRange::new(-10.0, 10.0);
        assert!(r.contains(-10.0));
        assert!(r.contains(10.0));
        assert!(!r.contains(10.001));
        assert!(!r.contains(f32::NAN));
    }

    #[test]
    fn test_documented_defaults() {
        let p = bare();
        assert_eq!(p.range(Axis::Pitch), AngleRange::new(-10.0, 10.0));
        assert_eq!(p.range(Axis::Yaw), AngleRange::new(-10.0, 10.0));
        assert_eq!(p.range(Axis::Roll), AngleRange::new(-20.0, 20.0));
        assert_eq!(p.min_face_box_size, 20.0);
        assert_eq!(p.completeness_threshold, 50.0);
        assert_eq!(p.max_allowed_faces, 1);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut p = bare();
        p.yaw = AngleRange::new(5.0, -5.0);
        assert_eq!(
            p.validate(),
            Err(PolicyError::InvertedRange { axis: Axis::Yaw, min: 5.0, max: -5.0 })
        );

        let mut p = bare();
        p.roll = AngleRange::new(f32::NEG_INFINITY, 0.0);
        assert_eq!(p.validate(), Err(PolicyError::NonFiniteRange { axis: Axis::Roll }));

        let mut p = bare();
        p.completeness_threshold = 120.0;
        assert_eq!(p.validate(), Err(PolicyError::ThresholdOutOfRange(120.0)));

        let mut p = bare();
        p.min_face_box_size = -1.0;
        assert!(matches!(p.validate(), Err(PolicyError::InvalidMinBoxSize(_))));

        let mut p = bare();
        p.max_allowed_faces = 0;
        assert_eq!(p.validate(), Err(PolicyError::ZeroMaxFaces));
    }

    #[test]
    fn test_mask_allow_list_is_required() {
        let err = toml::from_str::<PolicyConfig>("fail_fast = true").unwrap_err();
        assert!(err.to_string().contains("allowed_mask_types"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let p: PolicyConfig = toml::from_str(
            r#"
            allowed_mask_types = ["none", "worn_correctly"]
            pitch = { min = -5.0, max = 5.0 }
            "#,
        )
        .unwrap();
        assert_eq!(p.pitch, AngleRange::new(-5.0, 5.0));
        assert_eq!(p.roll, DEFAULT_ROLL);
        assert!(p.allows_mask(MaskType::WornCorrectly));
        assert!(!p.allows_mask(MaskType::CoversMouth));
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let res = toml::from_str::<PolicyConfig>(
            r#"
            allowed_mask_types = ["none"]
            dissallow_hat = true
            "#,
        );
        assert!(res.is_err());
    }
}
