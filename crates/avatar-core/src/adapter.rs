//! Detection record adapters.
//!
//! Turn a face-analysis provider's response body into a [`DetectionOutcome`].
//! Every provider-specific field name, enum code and quirk stops here; the
//! policy engine only sees the normalized record types.

use crate::policy::PolicyConfig;
use crate::types::{
    Completeness, DetectionOutcome, EyeAttribute, FaceAttributeRecord, FaceBox, GlassAttribute,
    GlassType, HatAttribute, HeadPose, MaskAttribute, MaskType,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Upper bound the provider accepts for faces per request.
const PROVIDER_MAX_FACES: usize = 120;

/// An error reported by the provider itself, passed through untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("provider error {code}: {message}")]
pub struct ProviderError {
    pub code: String,
    pub message: String,
}

#[derive(Error, Debug)]
pub enum AdaptError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("response shape mismatch: {0}")]
    ShapeMismatch(String),
}

impl From<serde_json::Error> for AdaptError {
    fn from(e: serde_json::Error) -> Self {
        AdaptError::ShapeMismatch(e.to_string())
    }
}

/// How a provider encodes its two-valued "eye open" attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EyeOpenEncoding {
    /// 0 = open, 1 = closed.
    ZeroIsOpen,
    /// 0 = closed, 1 = open.
    ZeroIsClosed,
}

impl EyeOpenEncoding {
    fn is_closed(self, code: i64) -> Result<bool, AdaptError> {
        match (self, code) {
            (EyeOpenEncoding::ZeroIsOpen, 0) | (EyeOpenEncoding::ZeroIsClosed, 1) => Ok(false),
            (EyeOpenEncoding::ZeroIsOpen, 1) | (EyeOpenEncoding::ZeroIsClosed, 0) => Ok(true),
            _ => Err(AdaptError::ShapeMismatch(format!("eye-open code {code} is not 0 or 1"))),
        }
    }
}

impl FromStr for EyeOpenEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "zero-open" => Ok(EyeOpenEncoding::ZeroIsOpen),
            "zero-closed" => Ok(EyeOpenEncoding::ZeroIsClosed),
            other => Err(format!("unknown eye encoding '{other}' (expected zero-open or zero-closed)")),
        }
    }
}

/// Attribute blocks a detection request has to ask for so that a policy
/// can be evaluated, plus how many faces to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestedAttributes {
    pub pose: bool,
    pub mask: bool,
    pub eye: bool,
    pub hat: bool,
    pub quality: bool,
    pub max_faces: usize,
}

impl RequestedAttributes {
    /// Everything the engine knows how to check.
    pub fn all() -> Self {
        Self { pose: true, mask: true, eye: true, hat: true, quality: true, max_faces: 2 }
    }

    /// Only what `policy` consumes. One face beyond the allowed count is
    /// requested so that too many faces is observable.
    pub fn for_policy(policy: &PolicyConfig) -> Self {
        Self {
            pose: true,
            mask: true,
            eye: policy.disallow_sunglasses || policy.disallow_closed_eyes,
            hat: policy.disallow_hat,
            quality: policy.completeness_threshold > 0.0,
            max_faces: (policy.max_allowed_faces + 1).min(PROVIDER_MAX_FACES),
        }
    }

    /// Comma-separated attribute type list in the provider's request vocabulary.
    pub fn attribute_types(&self) -> String {
        let mut types = Vec::new();
        if self.pose {
            types.push("Headpose");
        }
        if self.mask {
            types.push("Mask");
        }
        if self.eye {
            types.push("Eye");
        }
        if self.hat {
            types.push("Hat");
        }
        types.join(",")
    }
}

/// Converts a raw provider response body into a detection outcome.
pub trait ProviderAdapter {
    fn name(&self) -> &'static str;

    fn adapt(&self, body: &str) -> Result<DetectionOutcome, AdaptError>;
}

/// Known response layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Generic,
    Iai,
}

impl ProviderKind {
    pub fn adapter(
        self,
        requested: RequestedAttributes,
        eye_encoding: EyeOpenEncoding,
    ) -> Box<dyn ProviderAdapter + Send + Sync> {
        match self {
            ProviderKind::Generic => Box::new(GenericAdapter { eye_encoding }),
            ProviderKind::Iai => Box::new(IaiAdapter { requested, eye_encoding }),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generic" => Ok(ProviderKind::Generic),
            "iai" => Ok(ProviderKind::Iai),
            other => Err(format!("unknown provider '{other}' (expected generic or iai)")),
        }
    }
}

// --- Shared normalization ---

fn mask_attribute(code: i64, probability: f32) -> Result<MaskAttribute, AdaptError> {
    let kind = MaskType::try_from(code)
        .map_err(|c| AdaptError::ShapeMismatch(format!("mask type {c} out of range 0..=4")))?;
    Ok(MaskAttribute { kind, probability })
}

fn glass_attribute(code: i64, probability: f32) -> Result<GlassAttribute, AdaptError> {
    let kind = GlassType::try_from(code)
        .map_err(|c| AdaptError::ShapeMismatch(format!("glass type {c} out of range 0..=2")))?;
    Ok(GlassAttribute { kind, probability })
}

fn eye_attribute(
    encoding: EyeOpenEncoding,
    code: i64,
    probability: f32,
) -> Result<EyeAttribute, AdaptError> {
    Ok(EyeAttribute { is_closed: encoding.is_closed(code)?, probability })
}

/// Reconcile the reported count with the faces actually returned.
fn outcome(
    face_count: Option<usize>,
    faces: Vec<FaceAttributeRecord>,
) -> Result<DetectionOutcome, AdaptError> {
    let count = face_count.unwrap_or(faces.len());
    if count < faces.len() {
        return Err(AdaptError::ShapeMismatch(format!(
            "face count {count} is smaller than the {} faces returned",
            faces.len()
        )));
    }
    if count > 0 && faces.is_empty() {
        return Err(AdaptError::ShapeMismatch(format!(
            "face count {count} reported but no faces returned"
        )));
    }
    tracing::debug!(face_count = count, returned = faces.len(), "adapted detection response");
    Ok(DetectionOutcome::new(count, faces))
}

// --- Generic layout ---

/// Adapter for the provider-neutral layout:
/// `{ "faceCount": n, "faces": [ { "box": {..}, "pose"?: {..}, ... } ] }`
/// or `{ "code": "..", "message": ".." }` on failure.
#[derive(Debug, Clone, Copy)]
pub struct GenericAdapter {
    pub eye_encoding: EyeOpenEncoding,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenericResponse {
    face_count: Option<usize>,
    faces: Option<Vec<GenericFace>>,
    code: Option<String>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct GenericFace {
    #[serde(rename = "box")]
    face_box: FaceBox,
    pose: Option<HeadPose>,
    mask: Option<GenericCoded>,
    glass: Option<GenericCoded>,
    eye: Option<GenericEye>,
    hat: Option<HatAttribute>,
    completeness: Option<Completeness>,
}

#[derive(Deserialize)]
struct GenericCoded {
    #[serde(rename = "type")]
    code: i64,
    #[serde(default)]
    probability: f32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenericEye {
    open_type: i64,
    #[serde(default)]
    probability: f32,
}

impl GenericAdapter {
    fn record(&self, face: GenericFace) -> Result<FaceAttributeRecord, AdaptError> {
        Ok(FaceAttributeRecord {
            face_box: face.face_box,
            pose: face.pose,
            mask: face.mask.map(|m| mask_attribute(m.code, m.probability)).transpose()?,
            glass: face.glass.map(|g| glass_attribute(g.code, g.probability)).transpose()?,
            eye: face
                .eye
                .map(|e| eye_attribute(self.eye_encoding, e.open_type, e.probability))
                .transpose()?,
            hat: face.hat,
            completeness: face.completeness,
        })
    }
}

impl ProviderAdapter for GenericAdapter {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn adapt(&self, body: &str) -> Result<DetectionOutcome, AdaptError> {
        let response: GenericResponse = serde_json::from_str(body)?;
        if let Some(code) = response.code {
            return Err(ProviderError { code, message: response.message.unwrap_or_default() }.into());
        }
        let faces = response
            .faces
            .ok_or_else(|| AdaptError::ShapeMismatch("`faces` missing from response".into()))?;
        let records = faces
            .into_iter()
            .map(|f| self.record(f))
            .collect::<Result<Vec<_>, _>>()?;
        outcome(response.face_count, records)
    }
}

// --- Cloud face-attribute (IAI) layout ---

/// Adapter for the cloud face-attribute detection layout
/// (`Response.FaceDetailInfos[].FaceDetailAttributesInfo`).
///
/// That service fills attribute blocks it was not asked for with default
/// values, so blocks outside `requested` are dropped rather than trusted.
#[derive(Debug, Clone, Copy)]
pub struct IaiAdapter {
    pub requested: RequestedAttributes,
    pub eye_encoding: EyeOpenEncoding,
}

impl Default for IaiAdapter {
    fn default() -> Self {
        Self {
            requested: RequestedAttributes::all(),
            eye_encoding: EyeOpenEncoding::ZeroIsOpen,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct IaiResponse {
    face_detail_infos: Option<Vec<IaiFace>>,
    error: Option<IaiError>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct IaiError {
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct IaiFace {
    face_rect: IaiRect,
    face_detail_attributes_info: Option<IaiAttributes>,
    face_quality_info: Option<IaiQuality>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct IaiRect {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct IaiAttributes {
    head_pose: Option<IaiHeadPose>,
    mask: Option<IaiCoded>,
    eye: Option<IaiEye>,
    hat: Option<IaiHat>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct IaiHeadPose {
    pitch: f32,
    yaw: f32,
    roll: f32,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct IaiCoded {
    #[serde(rename = "Type")]
    code: i64,
    #[serde(default)]
    probability: f32,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct IaiEye {
    eye_open: Option<IaiCoded>,
    glass: Option<IaiCoded>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct IaiHat {
    style: Option<IaiCoded>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct IaiQuality {
    completeness: Option<IaiCompleteness>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct IaiCompleteness {
    eye: f32,
    mouth: f32,
    nose: f32,
}

impl IaiAdapter {
    fn record(&self, face: IaiFace) -> Result<FaceAttributeRecord, AdaptError> {
        let rect = face.face_rect;
        let mut record = FaceAttributeRecord::with_box(FaceBox {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
        });
        let req = &self.requested;

        if let Some(attrs) = face.face_detail_attributes_info {
            if req.pose {
                record.pose = attrs.head_pose.map(|p| HeadPose { pitch: p.pitch, yaw: p.yaw, roll: p.roll });
            }
            if req.mask {
                record.mask = attrs.mask.map(|m| mask_attribute(m.code, m.probability)).transpose()?;
            }
            if let (true, Some(eye)) = (req.eye, attrs.eye) {
                record.eye = eye
                    .eye_open
                    .map(|e| eye_attribute(self.eye_encoding, e.code, e.probability))
                    .transpose()?;
                record.glass = eye.glass.map(|g| glass_attribute(g.code, g.probability)).transpose()?;
            }
            if req.hat {
                record.hat = attrs
                    .hat
                    .and_then(|h| h.style)
                    .map(|s| HatAttribute { style_type: s.code });
            }
        }

        if req.quality {
            record.completeness = face
                .face_quality_info
                .and_then(|q| q.completeness)
                .map(|c| Completeness { eye: c.eye, mouth: c.mouth, nose: c.nose });
        }

        Ok(record)
    }
}

impl ProviderAdapter for IaiAdapter {
    fn name(&self) -> &'static str {
        "iai"
    }

    fn adapt(&self, body: &str) -> Result<DetectionOutcome, AdaptError> {
        let mut value: serde_json::Value = serde_json::from_str(body)?;
        // Accept both the full envelope and the bare response object.
        if let Some(inner) = value.get_mut("Response").map(serde_json::Value::take) {
            value = inner;
        }
        let response: IaiResponse = serde_json::from_value(value)?;

        if let Some(err) = response.error {
            return Err(ProviderError { code: err.code, message: err.message }.into());
        }
        let faces = response.face_detail_infos.ok_or_else(|| {
            AdaptError::ShapeMismatch("`FaceDetailInfos` missing from response".into())
        })?;
        let records = faces
            .into_iter()
            .map(|f| self.record(f))
            .collect::<Result<Vec<_>, _>>()?;
        outcome(None, records)
    }
}
