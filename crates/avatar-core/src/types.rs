use serde::{Deserialize, Serialize};
use std::fmt;

/// Bounding box of a detected face, in source image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl FaceBox {
    /// A box with a non-positive (or NaN) side cannot describe a face.
    pub fn is_degenerate(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

/// Head orientation in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeadPose {
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
}

/// Mask category as reported by the face-analysis provider (codes 0–4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskType {
    None,
    WornNotCovering,
    CoversChin,
    CoversMouth,
    WornCorrectly,
}

impl MaskType {
    pub fn code(self) -> u8 {
        match self {
            MaskType::None => 0,
            MaskType::WornNotCovering => 1,
            MaskType::CoversChin => 2,
            MaskType::CoversMouth => 3,
            MaskType::WornCorrectly => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MaskType::None => "no mask",
            MaskType::WornNotCovering => "mask worn without covering the face",
            MaskType::CoversChin => "mask covering the chin",
            MaskType::CoversMouth => "mask covering the mouth",
            MaskType::WornCorrectly => "mask worn correctly",
        }
    }
}

impl TryFrom<i64> for MaskType {
    type Error = i64;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(MaskType::None),
            1 => Ok(MaskType::WornNotCovering),
            2 => Ok(MaskType::CoversChin),
            3 => Ok(MaskType::CoversMouth),
            4 => Ok(MaskType::WornCorrectly),
            other => Err(other),
        }
    }
}

impl fmt::Display for MaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaskAttribute {
    #[serde(rename = "type")]
    pub kind: MaskType,
    /// Provider confidence, 0–100.
    pub probability: f32,
}

/// Eyewear category (codes 0–2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlassType {
    None,
    Regular,
    Sunglasses,
}

impl TryFrom<i64> for GlassType {
    type Error = i64;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(GlassType::None),
            1 => Ok(GlassType::Regular),
            2 => Ok(GlassType::Sunglasses),
            other => Err(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlassAttribute {
    #[serde(rename = "type")]
    pub kind: GlassType,
    pub probability: f32,
}

/// Eye state, already normalized by the adapter.
///
/// Providers disagree on which raw code means "open"; the adapter resolves
/// that with an explicit [`EyeOpenEncoding`](crate::adapter::EyeOpenEncoding)
/// so the engine only ever sees `is_closed`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EyeAttribute {
    pub is_closed: bool,
    pub probability: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HatAttribute {
    /// 0 means no hat.
    pub style_type: i64,
}

impl HatAttribute {
    pub fn is_worn(&self) -> bool {
        self.style_type != 0
    }
}

/// Per-region visibility scores, 0 (fully occluded) to 100 (fully visible).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Completeness {
    pub eye: f32,
    pub mouth: f32,
    pub nose: f32,
}

/// Normalized attributes of one detected face.
///
/// `None` means the provider did not return the block, which is different
/// from a block whose values are zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceAttributeRecord {
    #[serde(rename = "box")]
    pub face_box: FaceBox,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pose: Option<HeadPose>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<MaskAttribute>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub glass: Option<GlassAttribute>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eye: Option<EyeAttribute>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hat: Option<HatAttribute>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completeness: Option<Completeness>,
}

impl FaceAttributeRecord {
    /// A record carrying only a box; every attribute block absent.
    pub fn with_box(face_box: FaceBox) -> Self {
        Self {
            face_box,
            pose: None,
            mask: None,
            glass: None,
            eye: None,
            hat: None,
            completeness: None,
        }
    }
}

/// Faces found by one detection call, primary (largest) face first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionOutcome {
    face_count: usize,
    faces: Vec<FaceAttributeRecord>,
}

impl DetectionOutcome {
    pub fn new(face_count: usize, faces: Vec<FaceAttributeRecord>) -> Self {
        Self { face_count, faces }
    }

    /// Outcome whose count is exactly the number of faces returned.
    pub fn from_faces(faces: Vec<FaceAttributeRecord>) -> Self {
        Self::new(faces.len(), faces)
    }

    pub fn empty() -> Self {
        Self::new(0, Vec::new())
    }

    pub fn face_count(&self) -> usize {
        self.face_count
    }

    pub fn faces(&self) -> &[FaceAttributeRecord] {
        &self.faces
    }

    pub fn primary(&self) -> Option<&FaceAttributeRecord> {
        self.faces.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_face_box_degenerate() {
        let ok = FaceBox { x: 0.0, y: 0.0, width: 1.0, height: 1.0 };
        assert!(!ok.is_degenerate());
        let flat = FaceBox { height: 0.0, ..ok };
        assert!(flat.is_degenerate());
        let negative = FaceBox { width: -4.0, ..ok };
        assert!(negative.is_degenerate());
        let nan = FaceBox { width: f32::NAN, ..ok };
        assert!(nan.is_degenerate());
    }

    #[test]
    fn test_mask_codes_are_stable() {
        for code in 0..=4 {
            let mask = MaskType::try_from(code).unwrap();
            assert_eq!(i64::from(mask.code()), code);
        }
        assert_eq!(MaskType::try_from(5), Err(5));
        assert_eq!(MaskType::try_from(-1), Err(-1));
    }

    #[test]
    fn test_glass_codes() {
        assert_eq!(GlassType::try_from(2), Ok(GlassType::Sunglasses));
        assert_eq!(GlassType::try_from(3), Err(3));
    }

    #[test]
    fn test_record_skips_absent_attributes() {
        let record = FaceAttributeRecord::with_box(FaceBox {
            x: 1.0,
            y: 2.0,
            width: 30.0,
            height: 40.0,
        });
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["box"]["width"], 30.0);
        assert!(json.get("pose").is_none());
        assert!(json.get("mask").is_none());
    }

    #[test]
    fn test_mask_serializes_as_name() {
        let mask = MaskAttribute { kind: MaskType::WornCorrectly, probability: 99.0 };
        let json = serde_json::to_value(mask).unwrap();
        assert_eq!(json["type"], "worn_correctly");
    }

    #[test]
    fn test_outcome_primary_is_first() {
        let small = FaceAttributeRecord::with_box(FaceBox { x: 0.0, y: 0.0, width: 10.0, height: 10.0 });
        let large = FaceAttributeRecord::with_box(FaceBox { x: 0.0, y: 0.0, width: 90.0, height: 90.0 });
        let outcome = DetectionOutcome::from_faces(vec![large.clone(), small]);
        assert_eq!(outcome.face_count(), 2);
        assert_eq!(outcome.primary(), Some(&large));
        assert!(DetectionOutcome::empty().primary().is_none());
    }
}
