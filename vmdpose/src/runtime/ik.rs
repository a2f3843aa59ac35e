use crate::runtime::skeleton::ProxySkeleton;
use crate::BoneSettings;
use glam::{Quat, Vec3};

/// Fixed number of aim passes for the leg solve. The second pass compensates
/// for the coupling the knee bend introduces; two is empirically sufficient
/// for a two-link chain.
pub(crate) const LEG_AIM_ITERATIONS: usize = 2;

/// Upper clamp for the knee bend, degrees. Prevents the shin folding through
/// the thigh on very close targets.
const MAX_KNEE_ANGLE: f32 = 170.0;

/// Per-link step scale for the generic cyclic-coordinate-descent solve,
/// degrees of allowed rotation per link per iteration.
const CCD_STEP_DEGREES: f32 = 4.0;
const CCD_STEP_WEIGHT: f32 = 0.5;

/// Squared effector-target distance below which the generic solve stops.
const CCD_MIN_DELTA_SQ: f32 = 1.0e-3;

/// Direction vectors shorter than this (squared) abort the sub-step instead
/// of being normalized.
const DIR_EPSILON_SQ: f32 = 1.0e-6;

/// A 1-2 link inverse-kinematics chain over proxy bones.
///
/// `links` runs from the bone closest to the effector outward (knee, then
/// thigh for a leg). Leg chains use the analytic two-bone solve; everything
/// else runs cyclic coordinate descent.
#[derive(Clone, Debug)]
pub struct IkChain {
    pub name: String,
    pub target: usize,
    pub effector: usize,
    pub links: Vec<usize>,
    pub is_leg: bool,
    pub iterations: u32,
    pub enabled_this_frame: bool,
    /// Per-link local rotations from the previous solve, used for damping.
    /// `None` after a scrub or restart, when continuity doesn't hold.
    history: Option<Vec<Quat>>,
    thigh_length: f32,
    shin_length: f32,
    /// Knee rotation axis in the knee's local space at geometry init.
    bend_axis: Vec3,
    /// Inverse of the rest-pose bend, so a solved angle equal to the rest
    /// bend leaves the knee untouched.
    bend_reference_inverse: Quat,
    /// Desired bend-plane normal for the pole correction.
    bend_normal: Vec3,
}

impl IkChain {
    /// Builds a chain, returning `None` (and logging) when any member is
    /// missing from the proxy hierarchy; a partial chain must stay inert.
    pub(crate) fn build(
        skeleton: &ProxySkeleton,
        name: &str,
        effector_name: &str,
        link_names: &[&str],
        is_leg: bool,
    ) -> Option<Self> {
        let target = skeleton.bone_index(name)?;
        let Some(effector) = skeleton.bone_index(effector_name) else {
            log::warn!("IK chain '{name}': missing effector '{effector_name}'");
            return None;
        };
        let mut links = Vec::with_capacity(link_names.len());
        for link_name in link_names {
            let Some(link) = skeleton.bone_index(link_name) else {
                log::warn!("IK chain '{name}': missing link '{link_name}'");
                return None;
            };
            links.push(link);
        }

        let mut chain = Self {
            name: name.to_string(),
            target,
            effector,
            links,
            is_leg,
            iterations: if is_leg { 20 } else { 10 },
            enabled_this_frame: true,
            history: None,
            thigh_length: 0.0,
            shin_length: 0.0,
            bend_axis: Vec3::X,
            bend_reference_inverse: Quat::IDENTITY,
            bend_normal: Vec3::X,
        };
        if is_leg {
            chain.init_leg_geometry(skeleton);
        }
        Some(chain)
    }

    /// Caches the leg geometry from the current (rest) pose: link lengths,
    /// the knee's bend axis and rest bend, and the preferred bend-plane
    /// normal.
    fn init_leg_geometry(&mut self, skeleton: &ProxySkeleton) {
        if self.links.len() < 2 {
            return;
        }
        let knee = self.links[0];
        let thigh = self.links[1];

        let thigh_pos = skeleton.world_position(thigh);
        let knee_pos = skeleton.world_position(knee);
        let foot_pos = skeleton.world_position(self.effector);

        self.thigh_length = thigh_pos.distance(knee_pos);
        self.shin_length = knee_pos.distance(foot_pos);

        let thigh_dir = knee_pos - thigh_pos;
        let shin_dir = foot_pos - knee_pos;

        // Knees bend forward: the preferred plane normal comes from the leg
        // direction and the character's forward axis, falling back to the
        // world right axis when they are nearly parallel.
        let forward = Vec3::Z;
        let mut normal = Vec3::ZERO;
        if thigh_dir.length_squared() > DIR_EPSILON_SQ {
            normal = thigh_dir.normalize().cross(forward);
        }
        if normal.length_squared() < 1.0e-4 {
            normal = Vec3::X;
        }
        self.bend_normal = normal.normalize();

        // Axis and rest angle of the knee hinge. A straight rest pose has a
        // degenerate cross product; the hinge then derives from the forward
        // axis instead.
        let mut axis = if shin_dir.length_squared() > DIR_EPSILON_SQ {
            thigh_dir.cross(shin_dir)
        } else {
            Vec3::ZERO
        };
        if axis.length_squared() < 1.0e-8 {
            axis = if thigh_dir.length_squared() > DIR_EPSILON_SQ {
                forward.cross(thigh_dir.normalize())
            } else {
                Vec3::X
            };
        }
        if axis.length_squared() < 1.0e-8 {
            axis = Vec3::X;
        }
        let axis_world = axis.normalize();
        let knee_world_rotation = skeleton.world_rotation(knee);
        self.bend_axis = knee_world_rotation.inverse() * axis_world;

        let rest_bend = if thigh_dir.length_squared() > DIR_EPSILON_SQ
            && shin_dir.length_squared() > DIR_EPSILON_SQ
        {
            thigh_dir.normalize().dot(shin_dir.normalize()).clamp(-1.0, 1.0).acos()
        } else {
            0.0
        };
        self.bend_reference_inverse = Quat::from_axis_angle(self.bend_axis, rest_bend).inverse();
    }

    /// Drops the previous-frame damping history. Called on scrubs and
    /// restarts, where blending against the old pose would smear the jump.
    pub(crate) fn reset_history(&mut self) {
        self.history = None;
    }

    pub(crate) fn solve(&mut self, skeleton: &mut ProxySkeleton, settings: &BoneSettings) {
        // Damp against the previous frame before solving, so the solve
        // starts from a pose close to last frame's result.
        if let Some(history) = &self.history {
            for (&link, &previous) in self.links.iter().zip(history.iter()) {
                let current = skeleton.bone(link).local_rotation;
                skeleton.bone_mut(link).local_rotation =
                    current.slerp(previous, settings.smoothing_weight);
            }
        }

        if self.is_leg && self.links.len() >= 2 {
            self.solve_leg(skeleton, settings);
            // The foot tracks the IK bone's orientation, not the solved
            // chain's.
            let target_rotation = skeleton.world_rotation(self.target);
            skeleton.set_world_rotation(self.effector, target_rotation);
        } else {
            self.solve_ccd(skeleton);
        }

        self.history = Some(
            self.links
                .iter()
                .map(|&link| skeleton.bone(link).local_rotation)
                .collect(),
        );
    }

    /// Analytic two-bone solve: law-of-cosines knee bend, then two aim
    /// passes on the thigh, then a pole correction aligning the bend plane.
    fn solve_leg(&self, skeleton: &mut ProxySkeleton, settings: &BoneSettings) {
        let knee = self.links[0];
        let thigh = self.links[1];
        let (l1, l2) = (self.thigh_length, self.shin_length);
        if l1 <= 1.0e-4 || l2 <= 1.0e-4 {
            return;
        }

        let target_pos = skeleton.world_position(self.target);
        let hip_pos = skeleton.world_position(thigh);
        let distance = target_pos.distance(hip_pos);

        // Interior knee angle from the triangle (distance, thigh, shin);
        // the exterior bend is what the joint actually rotates by.
        let min_bend = settings.min_knee_angle.to_radians();
        let max_bend = MAX_KNEE_ANGLE.to_radians();
        let bend = if distance >= l1 + l2 {
            // Unreachable: straight leg, no extrapolation.
            min_bend
        } else {
            let cos_interior =
                ((l1 * l1 + l2 * l2 - distance * distance) / (2.0 * l1 * l2)).clamp(-1.0, 1.0);
            (std::f32::consts::PI - cos_interior.acos()).clamp(min_bend, max_bend)
        };
        skeleton.bone_mut(knee).local_rotation =
            Quat::from_axis_angle(self.bend_axis, bend) * self.bend_reference_inverse;

        for _ in 0..LEG_AIM_ITERATIONS {
            let hip = skeleton.world_position(thigh);
            let to_effector = skeleton.world_position(self.effector) - hip;
            let to_target = target_pos - hip;
            if to_effector.length_squared() < DIR_EPSILON_SQ
                || to_target.length_squared() < DIR_EPSILON_SQ
            {
                break;
            }
            let aim = Quat::from_rotation_arc(to_effector.normalize(), to_target.normalize());
            let rotation = aim * skeleton.world_rotation(thigh);
            skeleton.set_world_rotation(thigh, rotation);
        }

        self.apply_pole_correction(skeleton, thigh, knee, target_pos);
    }

    /// Rotates the thigh about the leg axis so the actual bend plane matches
    /// the preferred one, keeping the knee pointing the right way.
    fn apply_pole_correction(
        &self,
        skeleton: &mut ProxySkeleton,
        thigh: usize,
        knee: usize,
        target_pos: Vec3,
    ) {
        let hip = skeleton.world_position(thigh);
        let leg_dir = target_pos - hip;
        if leg_dir.length_squared() < DIR_EPSILON_SQ {
            return;
        }
        let knee_offset = skeleton.world_position(knee) - hip;
        let current_normal = leg_dir.cross(knee_offset);
        if current_normal.length_squared() < DIR_EPSILON_SQ {
            return;
        }

        let parent_rotation = match skeleton.bone(thigh).parent_index() {
            Some(p) => skeleton.world_rotation(p),
            None => Quat::IDENTITY,
        };
        let mut forward = parent_rotation * Vec3::Z;
        if leg_dir.cross(forward).length_squared() < 1.0e-4 {
            forward = parent_rotation * Vec3::X;
        }
        let desired_normal = leg_dir.cross(forward);
        if desired_normal.length_squared() < DIR_EPSILON_SQ {
            return;
        }

        let align = Quat::from_rotation_arc(
            current_normal.normalize(),
            desired_normal.normalize(),
        );
        let rotation = align * skeleton.world_rotation(thigh);
        skeleton.set_world_rotation(thigh, rotation);
    }

    /// Cyclic coordinate descent for generic chains (arms). Each link takes
    /// the shortest rotation moving the effector toward the target, with a
    /// per-iteration step clamp to keep the motion from snapping.
    fn solve_ccd(&self, skeleton: &mut ProxySkeleton) {
        let target_pos = skeleton.world_position(self.target);
        for _ in 0..self.iterations {
            for (k, &joint) in self.links.iter().enumerate() {
                let joint_pos = skeleton.world_position(joint);
                let to_target = target_pos - joint_pos;
                let to_effector = skeleton.world_position(self.effector) - joint_pos;
                if to_target.length_squared() < DIR_EPSILON_SQ
                    || to_effector.length_squared() < DIR_EPSILON_SQ
                {
                    continue;
                }

                let axis = to_effector.cross(to_target);
                if axis.length_squared() < DIR_EPSILON_SQ {
                    continue;
                }
                let mut angle = to_effector
                    .normalize()
                    .dot(to_target.normalize())
                    .clamp(-1.0, 1.0)
                    .acos();
                let max_step =
                    (CCD_STEP_DEGREES * CCD_STEP_WEIGHT * (k + 1) as f32).to_radians();
                angle = angle.min(max_step);
                if angle < 1.0e-5 {
                    continue;
                }

                let step = Quat::from_axis_angle(axis.normalize(), angle);
                let rotation = step * skeleton.world_rotation(joint);
                skeleton.set_world_rotation(joint, rotation);

                let remaining = target_pos - skeleton.world_position(self.effector);
                if remaining.length_squared() < CCD_MIN_DELTA_SQ {
                    return;
                }
            }
        }
    }
}
