use crate::runtime::target::TargetSkeleton;
use crate::{tables, BoneKeyframe};
use glam::{Quat, Vec3};
use std::collections::HashMap;

/// Parent chains deeper than this are treated as broken and cut at the root
/// rather than walked forever.
const MAX_DEPTH: usize = 64;

/// Role flags steering rotation-sign conventions and position-channel
/// eligibility.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct BoneFlags {
    pub ik: bool,
    pub center: bool,
    pub right_side: bool,
    pub finger: bool,
}

impl BoneFlags {
    pub(crate) fn classify(name: &str) -> Self {
        Self {
            ik: tables::is_ik_name(name),
            center: tables::is_center_class(name),
            right_side: tables::is_right_side(name),
            finger: tables::is_finger(name),
        }
    }
}

/// A node of the intermediate skeleton the motion is evaluated on.
///
/// Proxy bones own their track and a monotonically advancing cursor into it.
/// `bound_target` is identity only — an index into the host's
/// [`TargetSkeleton`], never ownership.
#[derive(Clone, Debug)]
pub struct ProxyBone {
    name: String,
    parent: Option<usize>,
    pub local_position: Vec3,
    pub local_rotation: Quat,
    pub(crate) keyframes: Vec<BoneKeyframe>,
    pub(crate) cursor: usize,
    pub flags: BoneFlags,
    pub(crate) bound_target: Option<usize>,
    /// Target-bone bind local rotation/position captured when the binding
    /// was established.
    pub(crate) bind_rotation: Quat,
    pub(crate) bind_position: Vec3,
    /// Local position at build time, before any animation. The evaluator
    /// uses it as the rest-pose base for center heights and IK-parent seeds.
    pub(crate) rest_local_position: Vec3,
}

impl ProxyBone {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent_index(&self) -> Option<usize> {
        self.parent
    }

    pub fn bound_target(&self) -> Option<usize> {
        self.bound_target
    }

    pub fn keyframes(&self) -> &[BoneKeyframe] {
        &self.keyframes
    }

    /// The target bone's bind local rotation, captured when the binding was
    /// established.
    pub fn bind_rotation(&self) -> Quat {
        self.bind_rotation
    }

    /// The target bone's bind local position, captured when the binding was
    /// established.
    pub fn bind_position(&self) -> Vec3 {
        self.bind_position
    }

    pub(crate) fn rest_local_position(&self) -> Vec3 {
        self.rest_local_position
    }
}

/// The intermediate bone hierarchy, stored as an indexed arena with a
/// name lookup map. Hierarchy edges are parent indices so build-time rewiring
/// (hip-cancel insertion reparents the thighs) is an index write.
#[derive(Clone, Debug, Default)]
pub struct ProxySkeleton {
    bones: Vec<ProxyBone>,
    index: HashMap<String, usize>,
    /// Traversal order with parents before children.
    order: Vec<usize>,
    /// World translation of the whole hierarchy, driven by root motion.
    pub root_position: Vec3,
    /// Rest height of each ankle's target bone above the ground plane.
    pub(crate) ankle_ground_offsets: HashMap<String, f32>,
}

impl ProxySkeleton {
    /// Builds the proxy hierarchy for one motion.
    ///
    /// `tracks` is the motion's bone tracks grouped by name, with twist
    /// tracks already extracted. Structural joints and leg IK bones are
    /// force-created even when the motion has no samples for them; names the
    /// hierarchy table does not know attach to the root instead of failing
    /// the build.
    pub(crate) fn build(
        target: &TargetSkeleton,
        mut tracks: HashMap<String, Vec<BoneKeyframe>>,
    ) -> Self {
        for name in tables::ESSENTIAL_IK_BONES {
            tracks.entry(name.to_string()).or_default();
        }
        for name in tables::ESSENTIAL_STRUCTURE_BONES {
            tracks.entry(name.to_string()).or_default();
        }

        let mut skeleton = Self::default();

        // Deterministic bone order regardless of map iteration.
        let mut names: Vec<String> = tracks.keys().cloned().collect();
        names.sort();

        for name in &names {
            let keyframes = tracks.remove(name).unwrap_or_default();
            skeleton.add_bone(name, keyframes, target);
        }

        skeleton.assign_parents();
        skeleton.rebuild_order();
        skeleton.assign_initial_positions(target);
        skeleton.insert_hip_cancel_bones(target);
        skeleton.create_twist_bones();
        skeleton.insert_foot_end_bones(target);
        skeleton.rebuild_order();

        for bone in &mut skeleton.bones {
            bone.rest_local_position = bone.local_position;
        }
        skeleton.record_ankle_ground_offsets(target);
        skeleton
    }

    fn add_bone(&mut self, name: &str, keyframes: Vec<BoneKeyframe>, target: &TargetSkeleton) -> usize {
        let flags = BoneFlags::classify(name);
        let bound_target = tables::target_bone_name(name).and_then(|t| target.bone_index(t));
        let (bind_rotation, bind_position) = match bound_target {
            Some(t) => (target.bone(t).bind_rotation(), target.bone(t).bind_position()),
            None => (Quat::IDENTITY, Vec3::ZERO),
        };
        let index = self.bones.len();
        self.bones.push(ProxyBone {
            name: name.to_string(),
            parent: None,
            local_position: Vec3::ZERO,
            local_rotation: Quat::IDENTITY,
            keyframes,
            cursor: 0,
            flags,
            bound_target,
            bind_rotation,
            bind_position,
            rest_local_position: Vec3::ZERO,
        });
        self.index.insert(name.to_string(), index);
        index
    }

    /// Resolves a bone's parent through the hierarchy table, collapsing over
    /// intermediate joints the motion does not carry.
    fn resolve_parent(&self, name: &str) -> Option<usize> {
        let mut current = tables::hierarchy_parent(name);
        while let Some(parent_name) = current {
            if let Some(&index) = self.index.get(parent_name) {
                return Some(index);
            }
            current = tables::hierarchy_parent(parent_name);
        }
        None
    }

    fn assign_parents(&mut self) {
        let root = self.index.get(tables::ROOT_BONE).copied();
        for i in 0..self.bones.len() {
            let name = self.bones[i].name.clone();
            if tables::is_twist_name(&name) {
                continue;
            }
            let parent = if tables::is_ik_parent(&name) {
                // IK parents live at the very top of the hierarchy so body
                // translation cannot drag the IK targets along.
                None
            } else if tables::is_foot_ik_related(&name) {
                self.resolve_parent(&name).or(root)
            } else {
                self.resolve_parent(&name)
            };
            // A parent index equal to the bone itself would make a cycle;
            // the tables never produce one, but collapse guards against a
            // degenerate single-bone motion.
            self.bones[i].parent = parent.filter(|&p| p != i);
        }
    }

    fn depth(&self, index: usize) -> usize {
        let mut depth = 0;
        let mut current = self.bones[index].parent;
        while let Some(p) = current {
            depth += 1;
            if depth >= MAX_DEPTH {
                break;
            }
            current = self.bones[p].parent;
        }
        depth
    }

    fn rebuild_order(&mut self) {
        let mut order: Vec<usize> = (0..self.bones.len()).collect();
        order.sort_by_key(|&i| self.depth(i));
        self.order = order;
    }

    /// Seeds every bone's local position from the target's rest pose so the
    /// proxy visually matches the model before any animation runs.
    fn assign_initial_positions(&mut self, target: &TargetSkeleton) {
        for i in self.order.clone() {
            let name = self.bones[i].name.clone();
            let parent = self.bones[i].parent;

            if tables::is_foot_ik_related(&name) {
                let left = name.contains('左');
                let ankle = target_ankle(target, left);
                let toe = target_toe(target, left);
                let world = match (ankle, toe) {
                    (Some(a), _) if tables::is_ik_parent(&name) => {
                        // IK parents sit on the ground beneath the ankle.
                        let mut p = target.world_position(a);
                        p.y = 0.0;
                        Some(p)
                    }
                    (Some(a), _) if !name.contains("つま先") => Some(target.world_position(a)),
                    (Some(a), Some(t)) => {
                        let ankle_pos = target.world_position(a);
                        Some(ankle_pos + (target.world_position(t) - ankle_pos) * 1.4)
                    }
                    _ => None,
                };
                if let Some(world) = world {
                    self.set_world_position(i, world);
                    continue;
                }
            }

            if let Some(t) = self.bones[i].bound_target {
                let world = target.world_position(t);
                let local = match parent {
                    Some(p) => match self.bones[p].bound_target {
                        Some(pt) => target.world_to_local_point(pt, world),
                        None => self.world_to_local_point(p, world),
                    },
                    None => world,
                };
                self.bones[i].local_position = local;
            }
        }
    }

    /// Inserts the hip-cancel pair between the lower torso and each thigh.
    /// The cancel bone carries no animation of its own; it absorbs the
    /// configured counter-rotation so torso twist does not leak into the
    /// legs.
    fn insert_hip_cancel_bones(&mut self, target: &TargetSkeleton) {
        let Some(waist) = self.index.get(tables::LOWER_BODY_BONE).copied() else {
            return;
        };
        let pairs = [
            (tables::LEFT_HIP_CANCEL, tables::LEFT_THIGH, tables::LEFT_KNEE, tables::LEFT_ANKLE),
            (
                tables::RIGHT_HIP_CANCEL,
                tables::RIGHT_THIGH,
                tables::RIGHT_KNEE,
                tables::RIGHT_ANKLE,
            ),
        ];
        for (cancel_name, thigh_name, knee_name, ankle_name) in pairs {
            let Some(thigh) = self.index.get(thigh_name).copied() else {
                continue;
            };

            let cancel = match self.index.get(cancel_name).copied() {
                Some(existing) => {
                    self.bones[existing].parent = Some(waist);
                    existing
                }
                None => self.add_bone_synthetic(cancel_name, Some(waist), Vec3::ZERO),
            };
            // Cancel bones are never written back; they share a target bone
            // with the thigh and exist only to absorb counter-rotation.
            self.bones[cancel].bound_target = None;

            // The cancel bone sits where the thigh's target bone rests,
            // expressed in the lower torso's space.
            let position_target = tables::target_bone_name(cancel_name)
                .and_then(|t| target.bone_index(t));
            match position_target {
                Some(pt) => {
                    let world = target.world_position(pt);
                    let local = match self.bones[waist].bound_target {
                        Some(wt) => target.world_to_local_point(wt, world),
                        None => self.world_to_local_point(waist, world),
                    };
                    self.bones[cancel].local_position = local;
                }
                None => {
                    let thigh_world = self.world_position(thigh);
                    self.set_world_position(cancel, thigh_world);
                }
            }
            self.bones[cancel].local_rotation = Quat::IDENTITY;

            // Reroute the leg chain: thigh under the cancel bone at zero
            // offset, knee and ankle restored beneath it.
            self.bones[thigh].parent = Some(cancel);
            self.bones[thigh].local_position = Vec3::ZERO;
            if let Some(knee) = self.index.get(knee_name).copied() {
                self.bones[knee].parent = Some(thigh);
                if let Some(ankle) = self.index.get(ankle_name).copied() {
                    self.bones[ankle].parent = Some(knee);
                }
            } else if let Some(ankle) = self.index.get(ankle_name).copied() {
                self.bones[ankle].parent = Some(thigh);
            }
        }
    }

    /// Twist bones are synthesized next to their dispersion recipients; they
    /// are driven by the separately-evaluated twist tracks, not by the
    /// regular pass.
    fn create_twist_bones(&mut self) {
        for rule in tables::TWIST_RULES {
            if self.index.contains_key(rule.twist_bone) {
                continue;
            }
            let Some(recipient) = self.index.get(rule.recipient_bone).copied() else {
                continue;
            };
            self.add_bone_synthetic(rule.twist_bone, Some(recipient), Vec3::ZERO);
        }
    }

    /// Adds the foot-sole and toe end anchors used as IK geometry endpoints.
    /// Neither is driven by the motion.
    fn insert_foot_end_bones(&mut self, target: &TargetSkeleton) {
        let sides = [
            (
                true,
                tables::LEFT_ANKLE,
                tables::LEFT_TOE,
                tables::LEFT_SOLE_END,
                tables::LEFT_TOE_END,
            ),
            (
                false,
                tables::RIGHT_ANKLE,
                tables::RIGHT_TOE,
                tables::RIGHT_SOLE_END,
                tables::RIGHT_TOE_END,
            ),
        ];
        for (left, ankle_name, toe_name, sole_name, toe_end_name) in sides {
            let Some(ankle) = self.index.get(ankle_name).copied() else {
                continue;
            };

            if !self.index.contains_key(sole_name) {
                // Roughly the center of the sole: a third of the way toward
                // the toes and slightly below the ankle.
                let mut offset = Vec3::new(0.0, -0.02, 0.05);
                if let (Some(at), Some(tt)) = (target_ankle(target, left), target_toe(target, left))
                {
                    let dir = target.world_position(tt) - target.world_position(at);
                    if dir.length_squared() > 1.0e-8 {
                        offset = dir * 0.33;
                        offset.y -= 0.02;
                    }
                }
                let index = self.add_bone_synthetic(sole_name, Some(ankle), offset);
                self.bones[index].flags.ik = true;
            }

            if let Some(toe) = self.index.get(toe_name).copied() {
                if !self.index.contains_key(toe_end_name) {
                    let index =
                        self.add_bone_synthetic(toe_end_name, Some(toe), Vec3::new(0.0, 0.0, 0.05));
                    self.bones[index].flags.ik = true;
                }
            }
        }
    }

    fn add_bone_synthetic(&mut self, name: &str, parent: Option<usize>, local: Vec3) -> usize {
        let index = self.bones.len();
        self.bones.push(ProxyBone {
            name: name.to_string(),
            parent,
            local_position: local,
            local_rotation: Quat::IDENTITY,
            keyframes: Vec::new(),
            cursor: 0,
            flags: BoneFlags::default(),
            bound_target: None,
            bind_rotation: Quat::IDENTITY,
            bind_position: Vec3::ZERO,
            rest_local_position: Vec3::ZERO,
        });
        self.index.insert(name.to_string(), index);
        index
    }

    fn record_ankle_ground_offsets(&mut self, target: &TargetSkeleton) {
        for (proxy_name, left) in [(tables::LEFT_ANKLE, true), (tables::RIGHT_ANKLE, false)] {
            if let Some(ankle) = target_ankle(target, left) {
                self.ankle_ground_offsets
                    .insert(proxy_name.to_string(), target.world_position(ankle).y);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn bone(&self, index: usize) -> &ProxyBone {
        &self.bones[index]
    }

    pub fn bone_mut(&mut self, index: usize) -> &mut ProxyBone {
        &mut self.bones[index]
    }

    pub fn bones(&self) -> &[ProxyBone] {
        &self.bones
    }

    /// Parent-before-child traversal order.
    pub(crate) fn update_order(&self) -> &[usize] {
        &self.order
    }

    /// World rotation by walking the parent chain (the root contributes no
    /// rotation).
    pub fn world_rotation(&self, index: usize) -> Quat {
        let mut rotation = self.bones[index].local_rotation;
        let mut current = self.bones[index].parent;
        let mut hops = 0;
        while let Some(p) = current {
            rotation = self.bones[p].local_rotation * rotation;
            current = self.bones[p].parent;
            hops += 1;
            if hops >= MAX_DEPTH {
                break;
            }
        }
        rotation
    }

    /// World position by walking the parent chain, including the hierarchy's
    /// root translation.
    pub fn world_position(&self, index: usize) -> Vec3 {
        let mut position = self.bones[index].local_position;
        let mut current = self.bones[index].parent;
        let mut hops = 0;
        while let Some(p) = current {
            let parent = &self.bones[p];
            position = parent.local_position + parent.local_rotation * position;
            current = parent.parent;
            hops += 1;
            if hops >= MAX_DEPTH {
                break;
            }
        }
        self.root_position + position
    }

    pub(crate) fn world_to_local_point(&self, index: usize, point: Vec3) -> Vec3 {
        self.world_rotation(index).inverse() * (point - self.world_position(index))
    }

    /// Moves `index` so its world position matches `point`.
    pub(crate) fn set_world_position(&mut self, index: usize, point: Vec3) {
        self.bones[index].local_position = match self.bones[index].parent {
            Some(p) => self.world_to_local_point(p, point),
            None => point - self.root_position,
        };
    }

    /// Rotates `index` so its world rotation matches `rotation`.
    pub(crate) fn set_world_rotation(&mut self, index: usize, rotation: Quat) {
        let parent_rotation = match self.bones[index].parent {
            Some(p) => self.world_rotation(p),
            None => Quat::IDENTITY,
        };
        self.bones[index].local_rotation = parent_rotation.inverse() * rotation;
    }
}

fn target_ankle(target: &TargetSkeleton, left: bool) -> Option<usize> {
    let (primary, fallback) = if left {
        (tables::TARGET_LEFT_ANKLE, tables::TARGET_LEFT_FOOT)
    } else {
        (tables::TARGET_RIGHT_ANKLE, tables::TARGET_RIGHT_FOOT)
    };
    target.bone_index(primary).or_else(|| target.bone_index(fallback))
}

fn target_toe(target: &TargetSkeleton, left: bool) -> Option<usize> {
    target.bone_index(if left {
        tables::TARGET_LEFT_TOES
    } else {
        tables::TARGET_RIGHT_TOES
    })
}
