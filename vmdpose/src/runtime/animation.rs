use crate::runtime::skeleton::{ProxyBone, ProxySkeleton};
use crate::settings::euler_deg_to_quat;
use crate::{tables, BoneSettings, EasingCurve, CURVE_ROTATION, CURVE_X, CURVE_Y, CURVE_Z};
use glam::{Quat, Vec3};

/// Newton-Raphson iteration cap for inverting the easing curve's X(t).
/// Empirically sufficient for the curves authoring tools export.
pub(crate) const CURVE_NEWTON_STEPS: usize = 8;

/// Maps a linear time fraction through a cubic easing curve.
///
/// The curve is parametric: X(t) maps curve parameter to time fraction, Y(t)
/// to the output ratio. The parameter for the requested time fraction is
/// found by Newton-Raphson; curves with both control points on the diagonal
/// short-circuit to the identity mapping.
pub fn curve_ratio(curve: &EasingCurve, fraction: f32) -> f32 {
    if curve.is_linear() {
        return fraction;
    }
    let fraction = fraction.clamp(0.0, 1.0);
    let mut t = fraction;
    for _ in 0..CURVE_NEWTON_STEPS {
        let x = sample_bezier(curve.p1.x, curve.p2.x, t);
        let slope = sample_bezier_derivative(curve.p1.x, curve.p2.x, t);
        if slope.abs() < 1.0e-5 {
            break;
        }
        t = (t - (x - fraction) / slope).clamp(0.0, 1.0);
    }
    sample_bezier(curve.p1.y, curve.p2.y, t)
}

/// Cubic Bezier through (0,0) and (1,1) with control values `p1`, `p2`.
fn sample_bezier(p1: f32, p2: f32, t: f32) -> f32 {
    let u = 1.0 - t;
    3.0 * u * u * t * p1 + 3.0 * u * t * t * p2 + t * t * t
}

fn sample_bezier_derivative(p1: f32, p2: f32, t: f32) -> f32 {
    let u = 1.0 - t;
    3.0 * u * u * p1 + 6.0 * u * t * (p2 - p1) + 3.0 * t * t
}

/// Runs the forward-kinematics pass: samples every proxy bone's track at
/// `time` and writes the interpolated local transforms.
pub(crate) fn evaluate_pose(skeleton: &mut ProxySkeleton, time: f32, settings: &BoneSettings) {
    for i in 0..skeleton.len() {
        evaluate_bone(skeleton.bone_mut(i), time, settings);
    }
}

/// Samples one bone's track at `time`.
///
/// The cursor only moves forward; a backward jump resets it to zero and
/// re-advances, bounding each call to the distance moved instead of the
/// track length. Bones without samples keep their current pose.
pub(crate) fn evaluate_bone(bone: &mut ProxyBone, time: f32, settings: &BoneSettings) {
    if bone.keyframes.is_empty() {
        return;
    }

    let frames = &bone.keyframes;
    let mut i = bone.cursor;
    if i >= frames.len() - 1 || frames[i].frame as f32 > time {
        i = 0;
    }
    while i < frames.len() - 1 && time >= frames[i + 1].frame as f32 {
        i += 1;
    }
    bone.cursor = i;

    let prev = &frames[i];
    let next = if i < frames.len() - 1 { &frames[i + 1] } else { prev };

    let duration = (next.frame - prev.frame) as f32;
    let fraction = if duration > 1.0e-4 {
        ((time - prev.frame as f32) / duration).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let tx = curve_ratio(&prev.curves[CURVE_X], fraction);
    let ty = curve_ratio(&prev.curves[CURVE_Y], fraction);
    let tz = curve_ratio(&prev.curves[CURVE_Z], fraction);
    let tr = curve_ratio(&prev.curves[CURVE_ROTATION], fraction);

    // Recording-to-proxy handedness conversion flips X and Z; right-side
    // finger bones use a mirrored digit convention and flip Y instead.
    let mirrored = bone.flags.right_side && bone.flags.finger;
    let rot_a = convert_rotation(prev.rotation, mirrored);
    let mut rot_b = convert_rotation(next.rotation, mirrored);
    if rot_a.dot(rot_b) < 0.0 {
        rot_b = -rot_b;
    }
    let mut rotation = rot_a.slerp(rot_b, tr);

    if let Some(adjustment) = settings.adjustment(bone.name()) {
        if adjustment.axis_correction_euler() != Vec3::ZERO {
            let correction = adjustment.axis_correction();
            rotation = correction * rotation * correction.inverse();
        }
        if adjustment.rotation_offset != Vec3::ZERO {
            rotation *= euler_deg_to_quat(adjustment.rotation_offset);
        }
    }
    bone.local_rotation = rotation;

    // Most joints are rotation-only; their recorded position channel is
    // zeros or noise and must not produce spurious translation.
    if !(bone.flags.ik || bone.flags.center || tables::carries_translation(bone.name())) {
        return;
    }

    let a = prev.translation;
    let b = next.translation;
    let interpolated = Vec3::new(
        a.x + (b.x - a.x) * tx,
        a.y + (b.y - a.y) * ty,
        a.z + (b.z - a.z) * tz,
    );
    let mut position = Vec3::new(-interpolated.x, interpolated.y, -interpolated.z)
        * settings.position_scale;

    if settings.leg_width_fix.abs() > 1.0e-4 {
        if bone.name() == tables::LEFT_FOOT_IK || bone.name() == "左足IK" {
            position.x -= settings.leg_width_fix;
        } else if bone.name() == tables::RIGHT_FOOT_IK || bone.name() == "右足IK" {
            position.x += settings.leg_width_fix;
        }
    }

    if bone.flags.center {
        // Recorded center positions are relative to the stage floor; the
        // rest height puts them back at hip level on this model.
        position.y += bone.rest_local_position().y;
        position += settings.global_position_offset;
    }
    if tables::is_ik_parent(bone.name()) {
        // IK parents record deltas from their rest position, not absolutes.
        position += bone.rest_local_position();
    }

    bone.local_position = position;
}

pub(crate) fn convert_rotation(q: Quat, mirrored: bool) -> Quat {
    if mirrored {
        Quat::from_xyzw(-q.x, -q.y, q.z, q.w)
    } else {
        Quat::from_xyzw(-q.x, q.y, -q.z, q.w)
    }
}
