use crate::runtime::animation::{self, convert_rotation};
use crate::runtime::ik::IkChain;
use crate::runtime::skeleton::ProxySkeleton;
use crate::runtime::target::TargetSkeleton;
use crate::{tables, BoneKeyframe, BoneSettings, IkSwitchFrame, MotionData, RootMotionMode,
            UpperBodyMode};
use glam::{Quat, Vec3};
use std::collections::HashMap;

/// Scrubbing back below this time rewinds the IK switch cursor.
const IK_SWITCH_RESET_TIME: f32 = 0.1;

/// Horizontal overreach tolerated before the leg IK target is pulled in.
const REACH_TRIGGER: f32 = 1.05;
/// Fraction of the maximum reach the clamped target is projected onto.
const REACH_CLAMP: f32 = 0.98;

/// The IK chains the controller drives: target, effector, links
/// (effector-closest first), leg flag.
const CHAIN_DEFS: &[(&str, &str, [&str; 2], bool)] = &[
    (tables::LEFT_FOOT_IK, tables::LEFT_ANKLE, [tables::LEFT_KNEE, tables::LEFT_THIGH], true),
    (tables::RIGHT_FOOT_IK, tables::RIGHT_ANKLE, [tables::RIGHT_KNEE, tables::RIGHT_THIGH], true),
    ("左手ＩＫ", "左手首", ["左ひじ", "左腕"], false),
    ("右手ＩＫ", "右手首", ["右ひじ", "右腕"], false),
];

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum TwistFamily {
    Arm,
    Wrist,
    Other,
}

/// A resolved twist-dispersion rule. Unresolved bones leave the rule inert
/// for the lifetime of the motion.
#[derive(Clone, Debug)]
pub struct TwistRule {
    pub name: &'static str,
    twist_bone: Option<usize>,
    recipient_bone: Option<usize>,
    base_rate: f32,
    enabled: bool,
    family: TwistFamily,
}

impl TwistRule {
    /// Base rate scaled by the runtime multiplier: zero and below disables,
    /// up to 1 scales the base rate linearly, 1 to 2 interpolates from the
    /// base rate to full dispersion.
    fn effective_rate(&self, settings: &BoneSettings) -> f32 {
        let weight = match self.family {
            TwistFamily::Arm => settings.twist_weight_arm,
            TwistFamily::Wrist => settings.twist_weight_wrist,
            TwistFamily::Other => settings.twist_weight_default,
        };
        if weight <= 0.0 {
            0.0
        } else if weight >= 2.0 {
            1.0
        } else if weight <= 1.0 {
            self.base_rate * weight
        } else {
            self.base_rate + (1.0 - self.base_rate) * (weight - 1.0)
        }
    }
}

/// Replays one decoded motion onto a target skeleton.
///
/// The controller owns the proxy hierarchy for the duration of one motion
/// and is the only writer of the target skeleton while playback is active.
/// The caller owns the clock: `advance` takes an absolute time in frames.
#[derive(Clone, Debug)]
pub struct MotionController {
    pub settings: BoneSettings,
    /// Disables every chain regardless of authored switch events.
    pub force_disable_ik: bool,
    target: TargetSkeleton,
    skeleton: Option<ProxySkeleton>,
    chains: Vec<IkChain>,
    twist_rules: Vec<TwistRule>,
    twist_tracks: HashMap<String, Vec<BoneKeyframe>>,
    ik_switch_frames: Vec<IkSwitchFrame>,
    ik_switch_cursor: usize,
    should_enable_ik: bool,
    dirty_ik_data: bool,
    last_center_xz: Option<Vec3>,
    current_time: f32,
    max_time: f32,
}

impl MotionController {
    pub fn new(target: TargetSkeleton) -> Self {
        Self {
            settings: BoneSettings::new(),
            force_disable_ik: false,
            target,
            skeleton: None,
            chains: Vec::new(),
            twist_rules: Vec::new(),
            twist_tracks: HashMap::new(),
            ik_switch_frames: Vec::new(),
            ik_switch_cursor: 0,
            should_enable_ik: false,
            dirty_ik_data: false,
            last_center_xz: None,
            current_time: 0.0,
            max_time: 0.0,
        }
    }

    pub fn target(&self) -> &TargetSkeleton {
        &self.target
    }

    /// The proxy hierarchy of the currently loaded motion, for debug
    /// overlays and tests.
    pub fn skeleton(&self) -> Option<&ProxySkeleton> {
        self.skeleton.as_ref()
    }

    pub fn chains(&self) -> &[IkChain] {
        &self.chains
    }

    pub fn is_loaded(&self) -> bool {
        self.skeleton.is_some()
    }

    pub fn current_time(&self) -> f32 {
        self.current_time
    }

    pub fn max_time(&self) -> f32 {
        self.max_time
    }

    /// Builds the proxy hierarchy, chains and twist rules for `motion` and
    /// leaves the controller at time zero. Any previous motion is torn down
    /// first.
    pub fn load_motion(&mut self, mut motion: MotionData) {
        self.stop();
        motion.sort_keyframes();

        // Decide whether IK runs at all: authored switch events win unless
        // the IK data itself is unusable; otherwise the presence of leg-IK
        // position tracks is the signal.
        let has_switch_frames = !motion.ik_switch_frames.is_empty();
        let has_ik_tracks = motion.bone_tracks.iter().any(|(name, frames)| {
            !frames.is_empty() && (name.contains("足IK") || name.contains("足ＩＫ"))
        });
        self.dirty_ik_data = has_switch_frames && detect_dirty_ik_data(&motion);
        if self.dirty_ik_data {
            log::warn!("motion '{}': leg IK data looks unusable, disabling IK", motion.model_name);
        }
        self.should_enable_ik = if has_switch_frames {
            !self.dirty_ik_data
        } else {
            has_ik_tracks
        };

        self.max_time = motion.max_frame() as f32;

        // Twist tracks are evaluated separately from the regular pass;
        // variant spellings merge into the canonical bones.
        let alias_names: Vec<String> = motion
            .bone_tracks
            .keys()
            .filter(|name| tables::canonical_twist_name(name).is_some())
            .cloned()
            .collect();
        for name in alias_names {
            let Some(canonical) = tables::canonical_twist_name(&name) else {
                continue;
            };
            let frames = motion.bone_tracks.remove(&name).unwrap_or_default();
            self.twist_tracks
                .entry(canonical.to_string())
                .or_default()
                .extend(frames);
        }
        for track in self.twist_tracks.values_mut() {
            track.sort_by_key(|k| k.frame);
        }

        self.ik_switch_frames = std::mem::take(&mut motion.ik_switch_frames);
        self.ik_switch_cursor = 0;

        let mut skeleton =
            ProxySkeleton::build(&self.target, std::mem::take(&mut motion.bone_tracks));
        // Chain geometry is cached from the first-frame pose.
        animation::evaluate_pose(&mut skeleton, 0.0, &self.settings);

        for &(target_name, effector_name, links, is_leg) in CHAIN_DEFS {
            if let Some(mut chain) =
                IkChain::build(&skeleton, target_name, effector_name, &links, is_leg)
            {
                chain.enabled_this_frame = self.should_enable_ik;
                self.chains.push(chain);
            }
        }

        self.twist_rules = tables::TWIST_RULES
            .iter()
            .map(|def| TwistRule {
                name: def.name,
                twist_bone: skeleton.bone_index(def.twist_bone),
                recipient_bone: skeleton.bone_index(def.recipient_bone),
                base_rate: def.base_rate,
                enabled: def.base_rate > 0.0,
                family: if def.twist_bone.contains("腕捩") {
                    TwistFamily::Arm
                } else if def.twist_bone.contains("手捩") {
                    TwistFamily::Wrist
                } else {
                    TwistFamily::Other
                },
            })
            .collect();

        self.skeleton = Some(skeleton);
        self.current_time = 0.0;
        self.last_center_xz = None;
    }

    /// Advances the simulation to an absolute time in frames, running the
    /// full per-frame pipeline and writing the result onto the target
    /// skeleton. The stage order is load-bearing: evaluation, root motion,
    /// reach clamp, twist, hip cancel, IK, write-back.
    pub fn advance(&mut self, time: f32) {
        let Some(skeleton) = self.skeleton.as_mut() else {
            return;
        };
        let time = time.max(0.0);
        self.current_time = time;

        animation::evaluate_pose(skeleton, time, &self.settings);
        update_root_motion(skeleton, self.settings.root_motion_mode, &mut self.last_center_xz);
        clamp_leg_ik_targets(skeleton, &self.chains);
        update_twist_bones(skeleton, &self.twist_tracks, time);
        process_twist_disperse(skeleton, &self.twist_rules, &self.settings);
        update_hip_cancel(skeleton, self.settings.waist_cancel_rate);
        update_ik_switches(
            &mut self.chains,
            &self.ik_switch_frames,
            &mut self.ik_switch_cursor,
            time,
            self.force_disable_ik || self.dirty_ik_data,
            self.should_enable_ik,
        );

        for chain in &mut self.chains {
            if chain.enabled_this_frame {
                chain.solve(skeleton, &self.settings);
            }
        }

        apply_to_target(skeleton, &mut self.target, &self.settings);

        // Ankles follow the IK bone's orientation on the target as well.
        for chain in &self.chains {
            if chain.is_leg && chain.enabled_this_frame {
                if let Some(t) = skeleton.bone(chain.effector).bound_target() {
                    let rotation = skeleton.world_rotation(chain.target);
                    self.target.set_world_rotation(t, rotation);
                }
            }
        }
    }

    /// Like [`advance`](Self::advance) but for arbitrary jumps: solver
    /// damping history is dropped and the root-motion baseline is captured
    /// fresh, since frame-to-frame continuity doesn't hold across a scrub.
    pub fn seek(&mut self, time: f32) {
        for chain in &mut self.chains {
            chain.reset_history();
        }
        self.last_center_xz = None;
        self.advance(time);
    }

    /// Tears down all proxy state and puts the target skeleton back in its
    /// bind pose.
    pub fn stop(&mut self) {
        if self.skeleton.take().is_some() {
            self.target.restore_bind_pose();
        }
        self.chains.clear();
        self.twist_rules.clear();
        self.twist_tracks.clear();
        self.ik_switch_frames.clear();
        self.ik_switch_cursor = 0;
        self.last_center_xz = None;
        self.current_time = 0.0;
    }
}

/// Converts the center bone's horizontal wiggle into whole-skeleton
/// translation: the frame-to-frame XZ delta moves the proxy root and is
/// subtracted back out of the bone so the pose doesn't count it twice.
fn update_root_motion(
    skeleton: &mut ProxySkeleton,
    mode: RootMotionMode,
    last_center_xz: &mut Option<Vec3>,
) {
    if mode == RootMotionMode::Off {
        return;
    }
    let Some(center) = select_root_motion_bone(skeleton, mode) else {
        return;
    };

    let local = skeleton.bone(center).local_position;
    let current_xz = Vec3::new(local.x, 0.0, local.z);

    let Some(last) = *last_center_xz else {
        // First frame after a (re)start: baseline only, no displacement.
        *last_center_xz = Some(current_xz);
        return;
    };

    let delta = current_xz - last;
    if delta.length_squared() > 1.0e-6 {
        skeleton.root_position += delta;
        let bone = skeleton.bone_mut(center);
        bone.local_position.x -= delta.x;
        bone.local_position.z -= delta.z;
        *last_center_xz = Some(current_xz);
    }
}

fn select_root_motion_bone(skeleton: &ProxySkeleton, mode: RootMotionMode) -> Option<usize> {
    let candidates: &[&str] = match mode {
        RootMotionMode::Groove => &[
            tables::ROOT_BONE,
            tables::GROOVE_BONE,
            tables::CENTER_BONE,
            "Center",
        ],
        _ => &[tables::ROOT_BONE, tables::CENTER_BONE, "Center"],
    };
    for name in candidates {
        if let Some(index) = skeleton.bone_index(name) {
            return Some(index);
        }
    }
    // Fall back to any center-class bone, skipping the groove in standard
    // mode so hip sway doesn't read as travel.
    skeleton.bones().iter().position(|bone| {
        bone.flags.center
            && !(mode == RootMotionMode::Standard
                && (bone.name() == tables::GROOVE_BONE || bone.name() == "Groove"))
    })
}

/// Pulls overreaching leg IK targets back toward the hip. Only the
/// horizontal distance is corrected; the recorded vertical is authoritative.
fn clamp_leg_ik_targets(skeleton: &mut ProxySkeleton, chains: &[IkChain]) {
    for chain in chains {
        if !chain.is_leg || chain.links.len() < 2 {
            continue;
        }
        let thigh = chain.links[1];
        let knee = chain.links[0];

        let hip_pos = skeleton.world_position(thigh);
        let knee_pos = skeleton.world_position(knee);
        let foot_pos = skeleton.world_position(chain.effector);
        let max_reach = hip_pos.distance(knee_pos) + knee_pos.distance(foot_pos);
        if max_reach <= 1.0e-6 {
            continue;
        }

        let target_pos = skeleton.world_position(chain.target);
        let to_target = target_pos - hip_pos;
        let horizontal = Vec3::new(to_target.x, 0.0, to_target.z);
        let horizontal_dist = horizontal.length();
        if horizontal_dist <= max_reach * REACH_TRIGGER || horizontal_dist <= 1.0e-6 {
            continue;
        }

        // Project onto the clamped reach while keeping the target's height:
        // the horizontal room left is what the clamped hypotenuse allows.
        let clamp_dist = max_reach * REACH_CLAMP;
        let dy = target_pos.y - hip_pos.y;
        let available = (clamp_dist * clamp_dist - dy * dy).max(0.0).sqrt();
        let direction = horizontal / horizontal_dist;
        let clamped = Vec3::new(hip_pos.x, 0.0, hip_pos.z)
            + direction * available
            + Vec3::new(0.0, target_pos.y, 0.0);
        skeleton.set_world_position(chain.target, clamped);
    }
}

/// Evaluates the twist tracks and writes the interpolated rotation onto the
/// twist proxies. Twist samples interpolate with a smoothstep ramp rather
/// than the per-channel easing curves.
fn update_twist_bones(
    skeleton: &mut ProxySkeleton,
    twist_tracks: &HashMap<String, Vec<BoneKeyframe>>,
    time: f32,
) {
    for (name, frames) in twist_tracks {
        if frames.is_empty() {
            continue;
        }
        let Some(index) = skeleton.bone_index(name) else {
            continue;
        };

        let mut i = 0;
        while i < frames.len() - 1 && time >= frames[i + 1].frame as f32 {
            i += 1;
        }
        let prev = &frames[i];
        let next = if i < frames.len() - 1 { &frames[i + 1] } else { prev };

        let duration = (next.frame - prev.frame) as f32;
        let mut t = if duration > 1.0e-4 {
            ((time - prev.frame as f32) / duration).clamp(0.0, 1.0)
        } else {
            0.0
        };
        t = t * t * (3.0 - 2.0 * t);

        let rot_a = convert_rotation(prev.rotation, false).normalize();
        let mut rot_b = convert_rotation(next.rotation, false).normalize();
        if rot_a.dot(rot_b) < 0.0 {
            rot_b = -rot_b;
        }
        skeleton.bone_mut(index).local_rotation = rot_a.slerp(rot_b, t);
    }
}

/// Splits each twist bone's rotation into pure twist about the reference
/// axis and hands the configured share to the recipient bone. The twist bone
/// keeps only the remaining twist; its swing component is discarded.
fn process_twist_disperse(
    skeleton: &mut ProxySkeleton,
    rules: &[TwistRule],
    settings: &BoneSettings,
) {
    for rule in rules {
        if !rule.enabled {
            continue;
        }
        let (Some(twist_index), Some(recipient_index)) = (rule.twist_bone, rule.recipient_bone)
        else {
            continue;
        };
        let rate = rule.effective_rate(settings);
        if rate <= 0.0 {
            continue;
        }

        let original = skeleton.bone(twist_index).local_rotation;
        let twist = twist_component(original, Vec3::X);
        let remaining = Quat::IDENTITY.slerp(twist, 1.0 - rate);
        let dispersed = twist * remaining.inverse();

        skeleton.bone_mut(twist_index).local_rotation = remaining;
        let recipient = skeleton.bone_mut(recipient_index);
        recipient.local_rotation *= dispersed;
    }
}

/// Projects the rotation's vector part onto `axis`, discarding swing. A zero
/// projection resolves to identity rather than a NaN normalization.
fn twist_component(q: Quat, axis: Vec3) -> Quat {
    let projected = axis * Vec3::new(q.x, q.y, q.z).dot(axis);
    let candidate = Quat::from_xyzw(projected.x, projected.y, projected.z, q.w);
    if candidate.length_squared() < 1.0e-9 {
        Quat::IDENTITY
    } else {
        candidate.normalize()
    }
}

/// Applies the configured inverse fraction of the lower torso's rotation to
/// the hip-cancel bones, damping how much torso twist reaches the thighs.
fn update_hip_cancel(skeleton: &mut ProxySkeleton, rate: f32) {
    let Some(waist) = skeleton.bone_index(tables::LOWER_BODY_BONE) else {
        return;
    };
    let inverse = skeleton.bone(waist).local_rotation.inverse();
    let cancel = Quat::IDENTITY.slerp(inverse, rate.clamp(0.0, 1.0));
    for name in [tables::LEFT_HIP_CANCEL, tables::RIGHT_HIP_CANCEL] {
        if let Some(index) = skeleton.bone_index(name) {
            skeleton.bone_mut(index).local_rotation = cancel;
        }
    }
}

/// Resolves the authored IK on/off events for the current time without
/// resetting anything else in the pipeline.
fn update_ik_switches(
    chains: &mut [IkChain],
    frames: &[IkSwitchFrame],
    cursor: &mut usize,
    time: f32,
    force_disable: bool,
    default_enable: bool,
) {
    if force_disable {
        for chain in chains {
            chain.enabled_this_frame = false;
        }
        return;
    }
    if frames.is_empty() {
        for chain in chains {
            chain.enabled_this_frame = default_enable;
        }
        return;
    }

    if time < IK_SWITCH_RESET_TIME {
        *cursor = 0;
    }
    while *cursor < frames.len() - 1 && frames[*cursor + 1].frame as f32 <= time {
        *cursor += 1;
    }
    let frame = &frames[*cursor];
    if frame.frame as f32 <= time {
        for entry in &frame.entries {
            if let Some(chain) = chains.iter_mut().find(|c| c.name == entry.name) {
                chain.enabled_this_frame = entry.enabled;
            }
        }
    }
}

/// Checks whether a motion's leg-IK data is junk: exported files sometimes
/// carry switch events but targets pinned at the origin or wiggling in a
/// negligible range.
fn detect_dirty_ik_data(motion: &MotionData) -> bool {
    let mut samples = 0usize;
    let mut zero_positions = 0usize;
    let mut min = Vec3::splat(f32::MAX);
    let mut max = Vec3::splat(f32::MIN);
    let mut any_track = false;

    for name in tables::FOOT_IK_TRACK_NAMES {
        let Some(frames) = motion.bone_tracks.get(*name) else {
            continue;
        };
        if frames.is_empty() {
            continue;
        }
        any_track = true;
        for keyframe in frames.iter().step_by(5) {
            let pos = keyframe.translation;
            if pos.length_squared() < 1.0e-4 {
                zero_positions += 1;
            }
            min = min.min(pos);
            max = max.max(pos);
            samples += 1;
        }
    }

    if !any_track {
        return true;
    }
    let zero_ratio = if samples > 0 {
        zero_positions as f32 / samples as f32
    } else {
        0.0
    };
    if zero_ratio > 0.9 {
        return true;
    }
    samples > 20 && min.distance(max) < 0.5
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum TargetKind {
    Pelvis,
    Waist,
    Spine,
    Other,
}

fn classify_target(name: &str) -> TargetKind {
    match name {
        tables::TARGET_PELVIS => TargetKind::Pelvis,
        tables::TARGET_WAIST => TargetKind::Waist,
        tables::TARGET_SPINE => TargetKind::Spine,
        _ => TargetKind::Other,
    }
}

/// Maps the solved proxy pose back onto the target skeleton. Bones without a
/// live binding are skipped; that is the whole recovery for a missing
/// binding.
fn apply_to_target(skeleton: &ProxySkeleton, target: &mut TargetSkeleton, settings: &BoneSettings) {
    let local_rotation_of = |name: &str| {
        skeleton
            .bone_index(name)
            .map(|i| skeleton.bone(i).local_rotation)
            .unwrap_or(Quat::IDENTITY)
    };
    let center_rot = local_rotation_of(tables::CENTER_BONE);
    let groove_rot = local_rotation_of(tables::GROOVE_BONE);
    let waist_rot = local_rotation_of(tables::WAIST_BONE);
    let mass_center_rot = local_rotation_of(tables::MASS_CENTER_BONE);
    let lower_body_rot = local_rotation_of(tables::LOWER_BODY_BONE);

    for &i in skeleton.update_order() {
        let bone = skeleton.bone(i);
        let Some(t) = bone.bound_target() else {
            continue;
        };
        let kind = classify_target(target.bone(t).name());
        let bind = bone.bind_rotation();

        match kind {
            TargetKind::Pelvis => {
                // The whole torso base collapses into one target joint: the
                // recording spreads it across five ancestors this model
                // doesn't have.
                let combined =
                    center_rot * groove_rot * waist_rot * mass_center_rot * lower_body_rot;
                target.bone_mut(t).local_rotation = combined * bind;
            }
            TargetKind::Waist => {
                // The pelvis composition above already carries this
                // rotation; writing it again would double it.
                target.bone_mut(t).local_rotation = bind;
            }
            TargetKind::Spine => {
                let cancellation = match settings.upper_body_mode {
                    UpperBodyMode::Stabilize => {
                        (groove_rot * waist_rot * lower_body_rot).inverse()
                    }
                    UpperBodyMode::FollowHips => lower_body_rot.inverse(),
                };
                target.bone_mut(t).local_rotation = cancellation * bind * bone.local_rotation;
            }
            TargetKind::Other => {
                target.bone_mut(t).local_rotation = bind * bone.local_rotation;
            }
        }

        if bone.flags.center || bone.flags.ik {
            let mut world = skeleton.world_position(i);
            if bone.name() == tables::CENTER_BONE || bone.name() == "Center" {
                // When center and groove share a target joint, the groove's
                // position (which includes its own offset) wins.
                if let Some(g) = skeleton
                    .bone_index(tables::GROOVE_BONE)
                    .or_else(|| skeleton.bone_index("Groove"))
                {
                    if skeleton.bone(g).bound_target() == Some(t) {
                        world = skeleton.world_position(g);
                    }
                }
            }
            target.set_world_position(t, world);
        } else if tables::is_leg_bone(bone.name()) {
            let world = skeleton.world_position(i);
            if bone.name().contains("足首") {
                let offset = skeleton
                    .ankle_ground_offsets
                    .get(bone.name())
                    .copied()
                    .unwrap_or(0.0);
                target.set_world_position(t, world + Vec3::Y * offset);
                target.set_world_rotation(t, skeleton.world_rotation(i));
            } else {
                target.set_world_position(t, world);
                let parent_world = match target.bone(t).parent_index() {
                    Some(p) => target.world_rotation(p),
                    None => Quat::IDENTITY,
                };
                let local = parent_world.inverse() * skeleton.world_rotation(i);
                target.bone_mut(t).local_rotation = bind * local;
            }
        }
    }
}
