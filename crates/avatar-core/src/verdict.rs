use crate::policy::{AngleRange, Axis};
use crate::types::{FaceAttributeRecord, MaskType};
use serde::{Serialize, Serializer};
use std::fmt;

/// Facial region scored by the provider's completeness estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    Eyes,
    Mouth,
    Nose,
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Region::Eyes => "eyes",
            Region::Mouth => "mouth",
            Region::Nose => "nose",
        })
    }
}

/// Policy step, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Check {
    Presence,
    Cardinality,
    Geometry,
    Pose,
    Mask,
    Glasses,
    Eyes,
    Hat,
    Occlusion,
}

/// One reason a photo fails the avatar policy.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    NoFace,
    TooManyFaces { count: usize, max: usize },
    FaceBox { width: f32, height: f32, min: f32 },
    Pose { axis: Axis, value: f32, range: AngleRange },
    Mask(MaskType),
    Sunglasses,
    EyesClosed,
    Hat { style_type: i64 },
    Occluded { region: Region, score: f32, threshold: f32 },
}

impl Rejection {
    /// The policy step that produced this rejection.
    pub fn check(&self) -> Check {
        match self {
            Rejection::NoFace => Check::Presence,
            Rejection::TooManyFaces { .. } => Check::Cardinality,
            Rejection::FaceBox { .. } => Check::Geometry,
            Rejection::Pose { .. } => Check::Pose,
            Rejection::Mask(_) => Check::Mask,
            Rejection::Sunglasses => Check::Glasses,
            Rejection::EyesClosed => Check::Eyes,
            Rejection::Hat { .. } => Check::Hat,
            Rejection::Occluded { .. } => Check::Occlusion,
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::NoFace => write!(f, "no face detected"),
            Rejection::TooManyFaces { count, max } => {
                write!(f, "multiple faces detected: {count} found, at most {max} allowed")
            }
            Rejection::FaceBox { width, height, min } => {
                write!(f, "face box too small/invalid: {width}x{height} (minimum {min}px per side)")
            }
            Rejection::Pose { axis, value, range } => write!(
                f,
                "head {axis} out of range: {value}° (allowed {}° to {}°)",
                range.min, range.max
            ),
            Rejection::Mask(mask) => write!(f, "mask not allowed: {mask}"),
            Rejection::Sunglasses => write!(f, "sunglasses detected"),
            Rejection::EyesClosed => write!(f, "eyes closed"),
            Rejection::Hat { style_type } => write!(f, "hat detected (style {style_type})"),
            Rejection::Occluded { region, score, threshold } => {
                write!(f, "{region} occluded: completeness {score} below {threshold}")
            }
        }
    }
}

impl Serialize for Rejection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Outcome of evaluating one detection against a policy.
///
/// `reasons` is empty exactly when the photo is accepted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    accepted: bool,
    face_count: usize,
    reasons: Vec<Rejection>,
    primary_face: Option<FaceAttributeRecord>,
}

impl Verdict {
    pub(crate) fn new(
        face_count: usize,
        reasons: Vec<Rejection>,
        primary_face: Option<FaceAttributeRecord>,
    ) -> Self {
        Self {
            accepted: reasons.is_empty(),
            face_count,
            reasons,
            primary_face,
        }
    }

    pub fn accepted(&self) -> bool {
        self.accepted
    }

    pub fn face_count(&self) -> usize {
        self.face_count
    }

    pub fn reasons(&self) -> &[Rejection] {
        &self.reasons
    }

    /// Set only when the presence and cardinality checks passed.
    pub fn primary_face(&self) -> Option<&FaceAttributeRecord> {
        self.primary_face.as_ref()
    }

    pub fn messages(&self) -> Vec<String> {
        self.reasons.iter().map(ToString::to_string).collect()
    }
}
