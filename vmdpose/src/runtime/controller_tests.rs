use crate::{
    tables, BoneKeyframe, EasingCurve, IkSwitchEntry, IkSwitchFrame, MotionData,
    MotionController, MorphKeyframe, TargetSkeleton, UpperBodyMode,
};
use glam::{Quat, Vec3};

fn assert_approx(actual: f32, expected: f32) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= 1.0e-3,
        "expected {expected}, got {actual} (diff {diff})"
    );
}

fn assert_vec3(actual: Vec3, expected: Vec3) {
    assert!(
        actual.distance(expected) <= 1.0e-3,
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

fn full_target() -> TargetSkeleton {
    let mut target = TargetSkeleton::new();
    let root = target
        .push_bone("cf_j_root", None, Vec3::ZERO, Quat::IDENTITY)
        .unwrap();
    let hips = target
        .push_bone("cf_j_hips", Some(root), Vec3::new(0.0, 1.0, 0.0), Quat::IDENTITY)
        .unwrap();
    let waist = target
        .push_bone("cf_j_waist01", Some(hips), Vec3::ZERO, Quat::IDENTITY)
        .unwrap();
    let spine1 = target
        .push_bone("cf_j_spine01", Some(hips), Vec3::new(0.0, 0.1, 0.0), Quat::IDENTITY)
        .unwrap();
    let spine2 = target
        .push_bone("cf_j_spine02", Some(spine1), Vec3::new(0.0, 0.15, 0.0), Quat::IDENTITY)
        .unwrap();
    let shoulder = target
        .push_bone(
            "cf_j_shoulder_L",
            Some(spine2),
            Vec3::new(0.05, 0.1, 0.0),
            Quat::IDENTITY,
        )
        .unwrap();
    let arm = target
        .push_bone("cf_j_arm00_L", Some(shoulder), Vec3::new(0.1, 0.0, 0.0), Quat::IDENTITY)
        .unwrap();
    let forearm = target
        .push_bone(
            "cf_j_forearm01_L",
            Some(arm),
            Vec3::new(0.25, 0.0, 0.0),
            Quat::IDENTITY,
        )
        .unwrap();
    target
        .push_bone("cf_j_hand_L", Some(forearm), Vec3::new(0.25, 0.0, 0.0), Quat::IDENTITY)
        .unwrap();
    for (suffix, x) in [("L", 0.08f32), ("R", -0.08f32)] {
        let thigh = target
            .push_bone(
                &format!("cf_j_thigh00_{suffix}"),
                Some(waist),
                Vec3::new(x, -0.1, 0.0),
                Quat::IDENTITY,
            )
            .unwrap();
        let knee = target
            .push_bone(
                &format!("cf_j_leg01_{suffix}"),
                Some(thigh),
                Vec3::new(0.0, -0.4, 0.0),
                Quat::IDENTITY,
            )
            .unwrap();
        let ankle = target
            .push_bone(
                &format!("cf_j_leg03_{suffix}"),
                Some(knee),
                Vec3::new(0.0, -0.4, 0.0),
                Quat::IDENTITY,
            )
            .unwrap();
        target
            .push_bone(
                &format!("cf_j_toes_{suffix}"),
                Some(ankle),
                Vec3::new(0.0, -0.05, 0.1),
                Quat::IDENTITY,
            )
            .unwrap();
    }
    target
}

#[test]
fn hip_track_scenario_interpolates_midway() {
    let mut controller = MotionController::new(full_target());
    let mut motion = MotionData::new();
    motion.push_bone_keyframe("センター", keyframe(0, Vec3::ZERO, Quat::IDENTITY));
    motion.push_bone_keyframe(
        "センター",
        keyframe(30, Vec3::new(0.0, 0.0, 1.0), Quat::from_rotation_y(90f32.to_radians())),
    );
    controller.load_motion(motion);
    controller.advance(15.0);

    // Midway between the keyframes: 45 degrees of yaw, half the recorded
    // displacement (axis-converted and scaled), resting at hip height.
    let hips = controller.target().bone_index("cf_j_hips").unwrap();
    assert_quat(
        controller.target().bone(hips).local_rotation,
        Quat::from_rotation_y(45f32.to_radians()),
    );
    assert_vec3(
        controller.target().bone(hips).local_position,
        Vec3::new(0.0, 1.0, -0.5 * 0.085),
    );
}

#[test]
fn overreaching_leg_target_is_clamped_horizontally() {
    let mut controller = MotionController::new(full_target());
    controller.settings.position_scale = Vec3::ONE;

    let mut motion = MotionData::new();
    // Lands at (0.98, 0.9, 0): horizontal distance 0.9 from the hip at
    // (0.08, 0.9, 0), against a leg reach of 0.8.
    motion.push_bone_keyframe(
        tables::LEFT_FOOT_IK,
        keyframe(0, Vec3::new(-0.98, 0.9, 0.0), Quat::IDENTITY),
    );
    controller.load_motion(motion);
    controller.advance(0.0);

    let skeleton = controller.skeleton().unwrap();
    let chain = controller
        .chains()
        .iter()
        .find(|c| c.name == tables::LEFT_FOOT_IK)
        .unwrap();
    let hip = Vec3::new(0.08, 0.9, 0.0);
    let corrected = skeleton.world_position(chain.target);

    // 0.98 * (0.4 + 0.4) of horizontal reach, vertical untouched.
    assert_approx(corrected.y, 0.9);
    let horizontal = Vec3::new(corrected.x - hip.x, 0.0, corrected.z - hip.z).length();
    assert_approx(horizontal, 0.784);
    assert!(corrected.distance(hip) <= 0.8 + 1.0e-4);
}

#[test]
fn center_wiggle_becomes_root_travel() {
    let mut controller = MotionController::new(full_target());
    controller.settings.position_scale = Vec3::ONE;

    let mut motion = MotionData::new();
    motion.push_bone_keyframe("センター", keyframe(0, Vec3::ZERO, Quat::IDENTITY));
    motion.push_bone_keyframe("センター", keyframe(30, Vec3::new(0.0, 0.0, 10.0), Quat::IDENTITY));
    controller.load_motion(motion);

    controller.advance(0.0);
    let skeleton = controller.skeleton().unwrap();
    assert_vec3(skeleton.root_position, Vec3::ZERO);

    controller.advance(15.0);
    let skeleton = controller.skeleton().unwrap();
    let center = skeleton.bone_index("センター").unwrap();
    // Half the recorded travel (axis-converted) moved into the root; the
    // bone itself stays put so nothing is counted twice.
    assert_vec3(skeleton.root_position, Vec3::new(0.0, 0.0, -5.0));
    assert_vec3(skeleton.bone(center).local_position, Vec3::new(0.0, 1.0, 0.0));

    // The character actually crosses the stage.
    let hips = controller.target().bone_index("cf_j_hips").unwrap();
    assert_vec3(
        controller.target().bone(hips).local_position,
        Vec3::new(0.0, 1.0, -5.0),
    );

    controller.advance(30.0);
    let skeleton = controller.skeleton().unwrap();
    assert_vec3(skeleton.root_position, Vec3::new(0.0, 0.0, -10.0));
}

#[test]
fn seek_captures_a_fresh_root_motion_baseline() {
    let mut controller = MotionController::new(full_target());
    controller.settings.position_scale = Vec3::ONE;

    let mut motion = MotionData::new();
    motion.push_bone_keyframe("センター", keyframe(0, Vec3::ZERO, Quat::IDENTITY));
    motion.push_bone_keyframe("センター", keyframe(30, Vec3::new(0.0, 0.0, 10.0), Quat::IDENTITY));
    controller.load_motion(motion);
    controller.advance(0.0);
    controller.advance(30.0);
    let travelled = controller.skeleton().unwrap().root_position;
    assert_vec3(travelled, Vec3::new(0.0, 0.0, -10.0));

    // Jumping back must re-baseline, not apply a huge reverse delta.
    controller.seek(0.0);
    let skeleton = controller.skeleton().unwrap();
    assert_vec3(skeleton.root_position, travelled);
}

#[test]
fn stop_restores_the_target_bind_pose() {
    let mut controller = MotionController::new(full_target());
    let mut motion = MotionData::new();
    motion.push_bone_keyframe(
        "センター",
        keyframe(0, Vec3::new(0.0, 0.5, 0.0), Quat::from_rotation_y(90f32.to_radians())),
    );
    controller.load_motion(motion);
    controller.advance(0.0);

    let hips = controller.target().bone_index("cf_j_hips").unwrap();
    assert!(controller.target().bone(hips).local_rotation.dot(Quat::IDENTITY) < 0.99);

    controller.stop();
    assert!(!controller.is_loaded());
    assert_quat(controller.target().bone(hips).local_rotation, Quat::IDENTITY);
    assert_vec3(
        controller.target().bone(hips).local_position,
        Vec3::new(0.0, 1.0, 0.0),
    );

    // Advancing after stop is a no-op.
    controller.advance(10.0);
    assert_quat(controller.target().bone(hips).local_rotation, Quat::IDENTITY);
}

fn switching_motion() -> MotionData {
    let mut motion = MotionData::new();
    for i in 0..=30u32 {
        motion.push_bone_keyframe(
            tables::LEFT_FOOT_IK,
            keyframe(i, Vec3::new(0.5, 0.5, i as f32 * 0.1), Quat::IDENTITY),
        );
    }
    motion
}

#[test]
fn authored_switch_events_toggle_chains() {
    let mut controller = MotionController::new(full_target());
    let mut motion = switching_motion();
    motion.ik_switch_frames = vec![
        IkSwitchFrame {
            frame: 0,
            visible: true,
            entries: vec![IkSwitchEntry {
                name: tables::LEFT_FOOT_IK.to_string(),
                enabled: false,
            }],
        },
        IkSwitchFrame {
            frame: 20,
            visible: true,
            entries: vec![IkSwitchEntry {
                name: tables::LEFT_FOOT_IK.to_string(),
                enabled: true,
            }],
        },
    ];
    controller.load_motion(motion);

    let enabled = |controller: &MotionController, name: &str| {
        controller
            .chains()
            .iter()
            .find(|c| c.name == name)
            .unwrap()
            .enabled_this_frame
    };

    controller.advance(5.0);
    assert!(!enabled(&controller, tables::LEFT_FOOT_IK));
    // Chains without events keep the motion-wide default.
    assert!(enabled(&controller, tables::RIGHT_FOOT_IK));

    controller.advance(25.0);
    assert!(enabled(&controller, tables::LEFT_FOOT_IK));

    controller.force_disable_ik = true;
    controller.advance(26.0);
    assert!(!enabled(&controller, tables::LEFT_FOOT_IK));
    assert!(!enabled(&controller, tables::RIGHT_FOOT_IK));
}

#[test]
fn junk_ik_data_disables_ik_for_the_motion() {
    let mut controller = MotionController::new(full_target());
    let mut motion = MotionData::new();
    // Switch events present, but every IK target is pinned at the origin.
    for i in 0..30u32 {
        motion.push_bone_keyframe(tables::LEFT_FOOT_IK, keyframe(i, Vec3::ZERO, Quat::IDENTITY));
    }
    motion.ik_switch_frames = vec![IkSwitchFrame {
        frame: 0,
        visible: true,
        entries: vec![IkSwitchEntry {
            name: tables::LEFT_FOOT_IK.to_string(),
            enabled: true,
        }],
    }];
    controller.load_motion(motion);
    controller.advance(0.0);

    for chain in controller.chains() {
        assert!(!chain.enabled_this_frame, "chain {} should be off", chain.name);
    }
}

#[test]
fn plain_rotation_tracks_write_through_the_bind_pose() {
    let mut controller = MotionController::new(full_target());
    let mut motion = MotionData::new();
    motion.push_bone_keyframe(
        "左腕",
        keyframe(0, Vec3::ZERO, Quat::from_rotation_y(30f32.to_radians())),
    );
    controller.load_motion(motion);
    controller.advance(0.0);

    let arm = controller.target().bone_index("cf_j_arm00_L").unwrap();
    assert_quat(
        controller.target().bone(arm).local_rotation,
        Quat::from_rotation_y(30f32.to_radians()),
    );
}

#[test]
fn upper_body_cancellation_tracks_the_selected_mode() {
    let mut controller = MotionController::new(full_target());
    let mut motion = MotionData::new();
    motion.push_bone_keyframe(
        "下半身",
        keyframe(0, Vec3::ZERO, Quat::from_rotation_y(40f32.to_radians())),
    );
    motion.push_bone_keyframe(
        "グルーブ",
        keyframe(0, Vec3::ZERO, Quat::from_rotation_y(20f32.to_radians())),
    );
    motion.push_bone_keyframe("上半身", keyframe(0, Vec3::ZERO, Quat::IDENTITY));
    controller.load_motion(motion);

    controller.advance(0.0);
    let target = controller.target();
    let hips = target.bone_index("cf_j_hips").unwrap();
    let spine = target.bone_index("cf_j_spine01").unwrap();
    let waist = target.bone_index("cf_j_waist01").unwrap();

    // Groove and lower body collapse onto the pelvis joint; the waist joint
    // must not repeat them.
    assert_quat(
        target.bone(hips).local_rotation,
        Quat::from_rotation_y(60f32.to_radians()),
    );
    assert_quat(target.bone(waist).local_rotation, Quat::IDENTITY);
    // Follow mode cancels only the lower body.
    assert_quat(
        target.bone(spine).local_rotation,
        Quat::from_rotation_y(-40f32.to_radians()),
    );

    controller.settings.upper_body_mode = UpperBodyMode::Stabilize;
    controller.advance(1.0);
    let target = controller.target();
    assert_quat(
        target.bone(spine).local_rotation,
        Quat::from_rotation_y(-60f32.to_radians()),
    );
}

#[test]
fn max_time_spans_bone_and_morph_tracks() {
    let mut controller = MotionController::new(full_target());
    let mut motion = MotionData::new();
    motion.push_bone_keyframe("センター", keyframe(30, Vec3::ZERO, Quat::IDENTITY));
    motion.push_morph_keyframe("あ", MorphKeyframe { frame: 45, weight: 1.0 });
    controller.load_motion(motion);
    assert_approx(controller.max_time(), 45.0);
    assert_approx(controller.current_time(), 0.0);
}

#[test]
fn advance_before_load_is_a_noop() {
    let mut controller = MotionController::new(full_target());
    controller.advance(10.0);
    assert!(!controller.is_loaded());
    let hips = controller.target().bone_index("cf_j_hips").unwrap();
    assert_quat(controller.target().bone(hips).local_rotation, Quat::IDENTITY);
}
