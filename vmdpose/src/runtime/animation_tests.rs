use crate::runtime::animation::{curve_ratio, evaluate_pose};
use crate::runtime::skeleton::ProxySkeleton;
use crate::runtime::target::TargetSkeleton;
use crate::{BoneKeyframe, BoneSettings, EasingCurve};
use glam::{Quat, Vec2, Vec3};
use std::collections::HashMap;

fn assert_approx(actual: f32, expected: f32) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= 1.0e-4,
        "expected {expected}, got {actual} (diff {diff})"
    );
}

fn assert_vec3(actual: Vec3, expected: Vec3) {
    assert!(
        actual.distance(expected) <= 1.0e-4,
        "expected {expected}, got {actual}"
    );
}

fn assert_quat(actual: Quat, expected: Quat) {
    assert!(
        actual.dot(expected).abs() >= 1.0 - 1.0e-5,
        "expected {expected:?}, got {actual:?}"
    );
}

fn keyframe(frame: u32, translation: Vec3, rotation: Quat) -> BoneKeyframe {
    BoneKeyframe {
        frame,
        translation,
        rotation,
        curves: [EasingCurve::LINEAR; 4],
    }
}

fn simple_target() -> TargetSkeleton {
    let mut target = TargetSkeleton::new();
    let root = target
        .push_bone("cf_j_root", None, Vec3::ZERO, Quat::IDENTITY)
        .unwrap();
    target
        .push_bone("cf_j_hips", Some(root), Vec3::new(0.0, 1.0, 0.0), Quat::IDENTITY)
        .unwrap();
    target
}

fn build(tracks: Vec<(&str, Vec<BoneKeyframe>)>) -> ProxySkeleton {
    let map: HashMap<String, Vec<BoneKeyframe>> = tracks
        .into_iter()
        .map(|(name, frames)| (name.to_string(), frames))
        .collect();
    ProxySkeleton::build(&simple_target(), map)
}

#[test]
fn diagonal_curve_is_exactly_linear() {
    for t in [0.0, 0.125, 0.37, 0.5, 0.9, 1.0] {
        assert_eq!(curve_ratio(&EasingCurve::LINEAR, t), t);
    }
    let diagonal = EasingCurve {
        p1: Vec2::new(0.4, 0.4),
        p2: Vec2::new(0.6, 0.6),
    };
    assert_eq!(curve_ratio(&diagonal, 0.73), 0.73);
}

#[test]
fn eased_curve_hits_endpoints_and_bends_inward() {
    let ease_in = EasingCurve {
        p1: Vec2::new(0.9, 0.1),
        p2: Vec2::new(0.95, 0.2),
    };
    assert_approx(curve_ratio(&ease_in, 0.0), 0.0);
    assert_approx(curve_ratio(&ease_in, 1.0), 1.0);
    let mid = curve_ratio(&ease_in, 0.5);
    assert!(mid < 0.25, "ease-in midpoint should lag: {mid}");

    // Monotonic over a coarse sweep.
    let mut last = 0.0;
    for i in 0..=20 {
        let v = curve_ratio(&ease_in, i as f32 / 20.0);
        assert!(v >= last - 1.0e-4, "not monotonic at step {i}: {v} < {last}");
        last = v;
    }
}

#[test]
fn single_keyframe_is_constant_for_all_times() {
    let rotation = Quat::from_rotation_y(30f32.to_radians());
    let skeleton_template = build(vec![(
        "センター",
        vec![keyframe(10, Vec3::new(1.0, 2.0, 3.0), rotation)],
    )]);
    let settings = BoneSettings::new();

    let mut results = Vec::new();
    for time in [0.0, 7.3, 10.0, 500.0] {
        let mut skeleton = skeleton_template.clone();
        evaluate_pose(&mut skeleton, time, &settings);
        let center = skeleton.bone_index("センター").unwrap();
        results.push((
            skeleton.bone(center).local_position,
            skeleton.bone(center).local_rotation,
        ));
    }

    // Recorded axes flip X and Z, positions scale, and the center keeps its
    // rest height.
    let expected_position = Vec3::new(-1.0, 2.0, -3.0) * 0.085 + Vec3::new(0.0, 1.0, 0.0);
    for (position, rot) in results {
        assert_vec3(position, expected_position);
        assert_quat(rot, rotation);
    }
}

#[test]
fn query_outside_range_clamps_to_endpoints() {
    let mut skeleton = build(vec![(
        "センター",
        vec![
            keyframe(10, Vec3::new(0.0, 0.0, 1.0), Quat::IDENTITY),
            keyframe(20, Vec3::new(0.0, 0.0, 3.0), Quat::IDENTITY),
        ],
    )]);
    let settings = BoneSettings::new();
    let center = skeleton.bone_index("センター").unwrap();

    evaluate_pose(&mut skeleton, 0.0, &settings);
    assert_approx(skeleton.bone(center).local_position.z, -1.0 * 0.085);

    evaluate_pose(&mut skeleton, 100.0, &settings);
    assert_approx(skeleton.bone(center).local_position.z, -3.0 * 0.085);
}

#[test]
fn backward_seek_matches_fresh_evaluation() {
    let frames: Vec<BoneKeyframe> = (0..=50)
        .map(|i| {
            keyframe(
                i * 2,
                Vec3::new(0.0, 0.0, i as f32),
                Quat::from_rotation_y((i as f32).to_radians()),
            )
        })
        .collect();
    let settings = BoneSettings::new();

    let mut scrubbed = build(vec![("センター", frames.clone())]);
    evaluate_pose(&mut scrubbed, 100.0, &settings);
    let center = scrubbed.bone_index("センター").unwrap();
    assert_eq!(scrubbed.bone(center).cursor, 50);
    evaluate_pose(&mut scrubbed, 10.0, &settings);

    let mut fresh = build(vec![("センター", frames)]);
    evaluate_pose(&mut fresh, 10.0, &settings);

    assert_eq!(scrubbed.bone(center).cursor, fresh.bone(center).cursor);
    assert_eq!(scrubbed.bone(center).cursor, 5);
    assert_vec3(
        scrubbed.bone(center).local_position,
        fresh.bone(center).local_position,
    );
    assert_quat(
        scrubbed.bone(center).local_rotation,
        fresh.bone(center).local_rotation,
    );
}

#[test]
fn right_side_fingers_use_mirrored_sign_convention() {
    let raw = Quat::from_xyzw(0.1, 0.2, 0.3, 0.9273618).normalize();
    let settings = BoneSettings::new();

    let mut skeleton = build(vec![
        ("右人指１", vec![keyframe(0, Vec3::ZERO, raw)]),
        ("左人指１", vec![keyframe(0, Vec3::ZERO, raw)]),
    ]);
    evaluate_pose(&mut skeleton, 0.0, &settings);

    let right = skeleton.bone_index("右人指１").unwrap();
    let left = skeleton.bone_index("左人指１").unwrap();
    assert_quat(
        skeleton.bone(right).local_rotation,
        Quat::from_xyzw(-raw.x, -raw.y, raw.z, raw.w),
    );
    assert_quat(
        skeleton.bone(left).local_rotation,
        Quat::from_xyzw(-raw.x, raw.y, -raw.z, raw.w),
    );
}

#[test]
fn rotation_only_joints_ignore_position_channel() {
    let mut skeleton = build(vec![(
        "左腕",
        vec![keyframe(0, Vec3::new(5.0, 5.0, 5.0), Quat::IDENTITY)],
    )]);
    let settings = BoneSettings::new();
    let arm = skeleton.bone_index("左腕").unwrap();
    let before = skeleton.bone(arm).local_position;

    evaluate_pose(&mut skeleton, 0.0, &settings);
    assert_vec3(skeleton.bone(arm).local_position, before);
}

#[test]
fn rotation_offset_applies_after_track_rotation() {
    let mut settings = BoneSettings::new();
    settings.set_rotation_offset("センター", Vec3::new(0.0, 90.0, 0.0));

    let mut skeleton = build(vec![(
        "センター",
        vec![keyframe(0, Vec3::ZERO, Quat::IDENTITY)],
    )]);
    evaluate_pose(&mut skeleton, 0.0, &settings);

    let center = skeleton.bone_index("センター").unwrap();
    assert_quat(
        skeleton.bone(center).local_rotation,
        Quat::from_rotation_y(90f32.to_radians()),
    );
}

#[test]
fn axis_correction_conjugates_track_rotation() {
    let mut settings = BoneSettings::new();
    // Conjugating by a 90-degree yaw maps a pitch rotation onto roll.
    settings.set_axis_correction("センター", Vec3::new(0.0, 90.0, 0.0));

    let pitch = Quat::from_rotation_x(40f32.to_radians());
    // Recorded X flips on conversion; feed the negated angle so the proxy
    // sees +40 degrees.
    let raw = Quat::from_rotation_x(-40f32.to_radians());
    let mut skeleton = build(vec![("センター", vec![keyframe(0, Vec3::ZERO, raw)])]);
    evaluate_pose(&mut skeleton, 0.0, &settings);

    let correction = Quat::from_rotation_y(90f32.to_radians());
    let center = skeleton.bone_index("センター").unwrap();
    assert_quat(
        skeleton.bone(center).local_rotation,
        correction * pitch * correction.inverse(),
    );
}
