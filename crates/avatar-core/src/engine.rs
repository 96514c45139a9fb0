//! Avatar acceptability policy engine.
//!
//! Evaluates a [`DetectionOutcome`] against a [`PolicyConfig`] in a fixed
//! order: presence, cardinality, box geometry, pose, mask, glasses, eyes,
//! hat, occlusion. Attribute checks only run on attributes the provider
//! returned; an absent block passes vacuously.
//!
//! In fail-fast mode evaluation stops at the first violation, so the verdict
//! carries at most one reason. Otherwise every violation is collected in
//! evaluation order.

use crate::policy::{Axis, PolicyConfig};
use crate::types::{DetectionOutcome, FaceAttributeRecord, GlassType};
use crate::verdict::{Region, Rejection, Verdict};
use std::ops::ControlFlow;

/// Collects rejections and decides whether evaluation may continue.
struct Checks {
    fail_fast: bool,
    reasons: Vec<Rejection>,
}

impl Checks {
    fn new(fail_fast: bool) -> Self {
        Self { fail_fast, reasons: Vec::new() }
    }

    fn reject(&mut self, rejection: Rejection) -> ControlFlow<()> {
        tracing::debug!(check = ?rejection.check(), reason = %rejection, "policy check failed");
        self.reasons.push(rejection);
        if self.fail_fast {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }
}

/// Evaluate a detection outcome against `config`.
///
/// Never fails: missing attributes and empty detections produce a
/// (possibly negative) verdict, not an error.
pub fn evaluate(outcome: &DetectionOutcome, config: &PolicyConfig) -> Verdict {
    let face_count = outcome.face_count();

    let primary = match outcome.primary() {
        Some(face) if face_count > 0 => face,
        _ => {
            tracing::debug!(face_count, "no face to evaluate");
            return Verdict::new(face_count, vec![Rejection::NoFace], None);
        }
    };

    let mut checks = Checks::new(config.fail_fast);
    let within_limit = face_count <= config.max_allowed_faces;

    if check_outcome(primary, face_count, config, &mut checks).is_break() {
        tracing::debug!(
            check = ?checks.reasons.last().map(Rejection::check),
            "fail-fast stopped evaluation"
        );
    }

    let verdict = Verdict::new(face_count, checks.reasons, within_limit.then(|| primary.clone()));
    tracing::debug!(
        face_count,
        accepted = verdict.accepted(),
        reasons = verdict.reasons().len(),
        fail_fast = config.fail_fast,
        "avatar policy evaluated"
    );
    verdict
}

fn check_outcome(
    primary: &FaceAttributeRecord,
    face_count: usize,
    config: &PolicyConfig,
    checks: &mut Checks,
) -> ControlFlow<()> {
    if face_count > config.max_allowed_faces {
        checks.reject(Rejection::TooManyFaces { count: face_count, max: config.max_allowed_faces })?;
    }
    check_face(primary, config, checks)
}

fn check_face(
    face: &FaceAttributeRecord,
    config: &PolicyConfig,
    checks: &mut Checks,
) -> ControlFlow<()> {
    check_geometry(face, config, checks)?;
    check_pose(face, config, checks)?;
    check_mask(face, config, checks)?;
    check_glasses(face, config, checks)?;
    check_eyes(face, config, checks)?;
    check_hat(face, config, checks)?;
    check_occlusion(face, config, checks)
}

fn check_geometry(
    face: &FaceAttributeRecord,
    config: &PolicyConfig,
    checks: &mut Checks,
) -> ControlFlow<()> {
    let b = face.face_box;
    let min = config.min_face_box_size;
    if b.is_degenerate() || b.width < min || b.height < min {
        checks.reject(Rejection::FaceBox { width: b.width, height: b.height, min })?;
    }
    ControlFlow::Continue(())
}

fn check_pose(
    face: &FaceAttributeRecord,
    config: &PolicyConfig,
    checks: &mut Checks,
) -> ControlFlow<()> {
    let Some(pose) = face.pose else {
        return ControlFlow::Continue(());
    };
    for (axis, value) in [(Axis::Pitch, pose.pitch), (Axis::Yaw, pose.yaw), (Axis::Roll, pose.roll)] {
        let range = config.range(axis);
        if !range.contains(value) {
            checks.reject(Rejection::Pose { axis, value, range })?;
        }
    }
    ControlFlow::Continue(())
}

fn check_mask(
    face: &FaceAttributeRecord,
    config: &PolicyConfig,
    checks: &mut Checks,
) -> ControlFlow<()> {
    match face.mask {
        Some(mask) if !config.allows_mask(mask.kind) => checks.reject(Rejection::Mask(mask.kind)),
        _ => ControlFlow::Continue(()),
    }
}

fn check_glasses(
    face: &FaceAttributeRecord,
    config: &PolicyConfig,
    checks: &mut Checks,
) -> ControlFlow<()> {
    match face.glass {
        Some(glass) if config.disallow_sunglasses && glass.kind == GlassType::Sunglasses => {
            checks.reject(Rejection::Sunglasses)
        }
        _ => ControlFlow::Continue(()),
    }
}

fn check_eyes(
    face: &FaceAttributeRecord,
    config: &PolicyConfig,
    checks: &mut Checks,
) -> ControlFlow<()> {
    match face.eye {
        Some(eye) if config.disallow_closed_eyes && eye.is_closed => {
            checks.reject(Rejection::EyesClosed)
        }
        _ => ControlFlow::Continue(()),
    }
}

fn check_hat(
    face: &FaceAttributeRecord,
    config: &PolicyConfig,
    checks: &mut Checks,
) -> ControlFlow<()> {
    match face.hat {
        Some(hat) if config.disallow_hat && hat.is_worn() => {
            checks.reject(Rejection::Hat { style_type: hat.style_type })
        }
        _ => ControlFlow::Continue(()),
    }
}

fn check_occlusion(
    face: &FaceAttributeRecord,
    config: &PolicyConfig,
    checks: &mut Checks,
) -> ControlFlow<()> {
    let Some(c) = face.completeness else {
        return ControlFlow::Continue(());
    };
    let threshold = config.completeness_threshold;
    for (region, score) in [(Region::Eyes, c.eye), (Region::Mouth, c.mouth), (Region::Nose, c.nose)] {
        if score < threshold {
            checks.reject(Rejection::Occluded { region, score, threshold })?;
        }
    }
    ControlFlow::Continue(())
}
