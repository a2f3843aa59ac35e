//! Author-adjustable retargeting configuration.
//!
//! This is process-wide state with an explicit lifecycle: hosts create one
//! store, mutate it from UI commands, and persist it on demand through the
//! line-oriented preset codec. The store itself never touches the
//! filesystem.

use glam::{EulerRot, Quat, Vec3};
use std::collections::HashMap;
use std::fmt::Write as _;

/// Converts degrees Euler angles (applied Y, then X, then Z, matching the
/// recording tools' convention) to a quaternion.
pub(crate) fn euler_deg_to_quat(euler: Vec3) -> Quat {
    Quat::from_euler(
        EulerRot::YXZ,
        euler.y.to_radians(),
        euler.x.to_radians(),
        euler.z.to_radians(),
    )
}

/// Per-bone static correction: an axis-correction conjugation applied to the
/// raw track rotation, and an additive Euler offset applied after it.
#[derive(Clone, Debug)]
pub struct BoneAdjustment {
    /// Additive post-rotation, degrees.
    pub rotation_offset: Vec3,
    axis_correction_euler: Vec3,
    axis_correction: Quat,
}

impl BoneAdjustment {
    pub fn new() -> Self {
        Self {
            rotation_offset: Vec3::ZERO,
            axis_correction_euler: Vec3::ZERO,
            axis_correction: Quat::IDENTITY,
        }
    }

    pub fn set_axis_correction(&mut self, euler: Vec3) {
        self.axis_correction_euler = euler;
        self.axis_correction = euler_deg_to_quat(euler);
    }

    pub fn axis_correction(&self) -> Quat {
        self.axis_correction
    }

    pub fn axis_correction_euler(&self) -> Vec3 {
        self.axis_correction_euler
    }

    fn is_identity(&self) -> bool {
        self.rotation_offset == Vec3::ZERO && self.axis_correction_euler == Vec3::ZERO
    }
}

impl Default for BoneAdjustment {
    fn default() -> Self {
        Self::new()
    }
}

/// How the upper body reacts to hip motion during write-back.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum UpperBodyMode {
    /// Cancel only the lower body; the torso follows groove/waist swings.
    #[default]
    FollowHips,
    /// Cancel groove, waist and lower body; the torso stays level.
    Stabilize,
}

/// Which bone drives whole-body translation across the stage.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum RootMotionMode {
    /// Root, then center. Ignores the groove bone so hip sway does not read
    /// as foot sliding.
    #[default]
    Standard,
    /// Root, then groove, then center. For clips that author their main
    /// displacement on the groove bone.
    Groove,
    Off,
}

/// Bones that ship with an (identity) adjustment entry so UI layers have
/// something to enumerate and edit.
const DEFAULT_ADJUSTED_BONES: &[&str] = &[
    "左腕", "右腕", "左ひじ", "右ひじ", "左肩", "右肩", "左親指０", "左親指１", "左親指２",
    "右親指０", "右親指１", "右親指２", "左人指１", "左中指１", "左薬指１", "左小指１", "右人指１",
    "右中指１", "右薬指１", "右小指１", "上半身2", "首", "左足", "右足", "左ひざ", "右ひざ",
    "センター",
];

#[derive(Clone, Debug)]
pub struct BoneSettings {
    adjustments: HashMap<String, BoneAdjustment>,
    /// World-space additive offset applied to center-class bones.
    pub global_position_offset: Vec3,
    /// Per-axis multiplier converting recorded units to target units.
    pub position_scale: Vec3,
    pub upper_body_mode: UpperBodyMode,
    pub root_motion_mode: RootMotionMode,
    /// Runtime multipliers for twist dispersion, per twist-bone family.
    /// 0 disables, 1 uses the rule's base rate, 2 disperses fully.
    pub twist_weight_arm: f32,
    pub twist_weight_wrist: f32,
    pub twist_weight_default: f32,
    /// Fraction each chain bone keeps of its previous-frame rotation.
    pub smoothing_weight: f32,
    /// Lower clamp for the knee bend, degrees.
    pub min_knee_angle: f32,
    /// Fraction of the lower-body rotation cancelled before the thighs.
    pub waist_cancel_rate: f32,
    /// Lateral push applied to the foot IK targets, widening the stance.
    pub leg_width_fix: f32,
}

impl BoneSettings {
    pub fn new() -> Self {
        let mut adjustments = HashMap::new();
        for name in DEFAULT_ADJUSTED_BONES {
            adjustments.insert(name.to_string(), BoneAdjustment::new());
        }
        Self {
            adjustments,
            global_position_offset: Vec3::ZERO,
            position_scale: Vec3::splat(0.085),
            upper_body_mode: UpperBodyMode::default(),
            root_motion_mode: RootMotionMode::default(),
            twist_weight_arm: 1.0,
            twist_weight_wrist: 1.0,
            twist_weight_default: 1.0,
            smoothing_weight: 0.9,
            min_knee_angle: 0.5,
            waist_cancel_rate: 0.0,
            leg_width_fix: 0.0,
        }
    }

    pub fn adjustment(&self, bone: &str) -> Option<&BoneAdjustment> {
        self.adjustments.get(bone)
    }

    pub fn adjustment_mut(&mut self, bone: &str) -> &mut BoneAdjustment {
        self.adjustments.entry(bone.to_string()).or_default()
    }

    pub fn set_rotation_offset(&mut self, bone: &str, euler: Vec3) {
        self.adjustment_mut(bone).rotation_offset = euler;
    }

    pub fn set_axis_correction(&mut self, bone: &str, euler: Vec3) {
        self.adjustment_mut(bone).set_axis_correction(euler);
    }

    /// Serializes the non-identity adjustments as `key=value` lines:
    /// `GlobalPos=x,y,z` and `bone=r,x,y,z[,a,x,y,z]`.
    pub fn export_preset(&self) -> String {
        let mut out = String::new();
        if self.global_position_offset != Vec3::ZERO {
            let o = self.global_position_offset;
            let _ = writeln!(out, "GlobalPos={},{},{}", o.x, o.y, o.z);
        }
        let mut names: Vec<&String> = self.adjustments.keys().collect();
        names.sort();
        for name in names {
            let adj = &self.adjustments[name];
            if adj.is_identity() {
                continue;
            }
            let mut line = format!("{name}=");
            if adj.rotation_offset != Vec3::ZERO {
                let r = adj.rotation_offset;
                let _ = write!(line, "r,{},{},{},", r.x, r.y, r.z);
            }
            if adj.axis_correction_euler != Vec3::ZERO {
                let a = adj.axis_correction_euler;
                let _ = write!(line, "a,{},{},{},", a.x, a.y, a.z);
            }
            let line = line.trim_end_matches(',');
            let _ = writeln!(out, "{line}");
        }
        out
    }

    /// Parses preset text produced by [`export_preset`](Self::export_preset).
    /// Adjustments reset to defaults first; malformed lines are skipped.
    pub fn import_preset(&mut self, text: &str) {
        self.adjustments.clear();
        for name in DEFAULT_ADJUSTED_BONES {
            self.adjustments
                .insert(name.to_string(), BoneAdjustment::new());
        }
        self.global_position_offset = Vec3::ZERO;

        for line in text.lines() {
            let Some((key, data)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let data = data.trim();
            if key.is_empty() {
                continue;
            }

            if key == "GlobalPos" {
                if let Some(v) = parse_vec3(data.split(',')) {
                    self.global_position_offset = v;
                }
                continue;
            }

            let values: Vec<&str> = data.split(',').collect();
            let mut i = 0;
            while i < values.len() {
                match (values[i].trim(), values.get(i + 1..i + 4)) {
                    ("r", Some(xyz)) => {
                        if let Some(v) = parse_vec3(xyz.iter().copied()) {
                            self.adjustment_mut(key).rotation_offset = v;
                        }
                        i += 4;
                    }
                    ("a", Some(xyz)) => {
                        if let Some(v) = parse_vec3(xyz.iter().copied()) {
                            self.adjustment_mut(key).set_axis_correction(v);
                        }
                        i += 4;
                    }
                    _ => i += 1,
                }
            }
        }
    }
}

impl Default for BoneSettings {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_vec3<'a>(mut parts: impl Iterator<Item = &'a str>) -> Option<Vec3> {
    let x = parts.next()?.trim().parse().ok()?;
    let y = parts.next()?.trim().parse().ok()?;
    let z = parts.next()?.trim().parse().ok()?;
    Some(Vec3::new(x, y, z))
}
