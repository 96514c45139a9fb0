//! External report for one avatar check.

use crate::adapter::ProviderError;
use crate::reference::{ImageReference, ReferenceKind};
use crate::types::FaceAttributeRecord;
use crate::verdict::Verdict;
use serde::{Deserialize, Serialize};

const ACCEPTED_MESSAGE: &str = "valid avatar detected";
const REASON_SEPARATOR: &str = " | ";

/// Serializable summary of a verdict (or a provider failure) for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvatarReport {
    pub has_valid_avatar: bool,
    pub face_count: usize,
    /// Human-readable summary: the joined reasons, or a success message.
    pub message: String,
    pub reasons: Vec<String>,
    pub primary_face: Option<FaceAttributeRecord>,
    /// The reference handed to the detector.
    pub image_path: String,
    pub image_source: ReferenceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ProviderError>,
}

impl AvatarReport {
    pub fn from_verdict(reference: &ImageReference, verdict: &Verdict) -> Self {
        let reasons = verdict.messages();
        let message = if reasons.is_empty() {
            ACCEPTED_MESSAGE.to_string()
        } else {
            reasons.join(REASON_SEPARATOR)
        };
        Self {
            has_valid_avatar: verdict.accepted(),
            face_count: verdict.face_count(),
            message,
            reasons,
            primary_face: verdict.primary_face().cloned(),
            image_path: reference.target().to_string(),
            image_source: reference.kind,
            error: None,
        }
    }

    /// Report for a detection the provider refused; the policy never ran.
    pub fn provider_failure(reference: &ImageReference, error: &ProviderError) -> Self {
        Self {
            has_valid_avatar: false,
            face_count: 0,
            message: format!("detection failed: {}", error.message),
            reasons: Vec::new(),
            primary_face: None,
            image_path: reference.target().to_string(),
            image_source: reference.kind,
            error: Some(error.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::evaluate;
    use crate::policy::PolicyConfig;
    use crate::reference::classify;
    use crate::types::{DetectionOutcome, FaceBox, MaskType};
    use std::collections::BTreeSet;

    fn policy() -> PolicyConfig {
        PolicyConfig::new(BTreeSet::from([MaskType::None]))
    }

    #[test]
    fn test_accepted_report() {
        let face = FaceAttributeRecord::with_box(FaceBox { x: 0.0, y: 0.0, width: 64.0, height: 64.0 });
        let verdict = evaluate(&DetectionOutcome::from_faces(vec![face]), &policy());
        let report = AvatarReport::from_verdict(&classify("imgs/a.jpg"), &verdict);
        assert!(report.has_valid_avatar);
        assert_eq!(report.message, "valid avatar detected");
        assert_eq!(report.image_source, ReferenceKind::LocalFile);
        assert!(report.primary_face.is_some());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["hasValidAvatar"], true);
        assert_eq!(json["imagePath"], "imgs/a.jpg");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_rejected_report_joins_reasons() {
        let tiny = FaceAttributeRecord::with_box(FaceBox { x: 0.0, y: 0.0, width: 5.0, height: 5.0 });
        let outcome = DetectionOutcome::from_faces(vec![tiny.clone(), tiny]);
        let verdict = evaluate(&outcome, &policy());
        let report = AvatarReport::from_verdict(&classify("http://x/y.jpg"), &verdict);
        assert!(!report.has_valid_avatar);
        assert_eq!(report.reasons.len(), 2);
        assert_eq!(report.message, report.reasons.join(" | "));
        assert!(report.primary_face.is_none());
    }

    #[test]
    fn test_provider_failure_report() {
        let reference = classify("https://www.google.com/imgres?imgurl=https%3A%2F%2Fa.example%2Fb.png");
        let error = ProviderError { code: "FailedOperation.ImageDownloadError".into(), message: "download failed".into() };
        let report = AvatarReport::provider_failure(&reference, &error);
        assert!(!report.has_valid_avatar);
        assert_eq!(report.image_path, "https://a.example/b.png");
        assert_eq!(report.message, "detection failed: download failed");

        let round: AvatarReport = serde_json::from_str(&serde_json::to_string(&report).unwrap()).unwrap();
        assert_eq!(round, report);
    }
}
