use glam::{Quat, Vec2, Vec3};
use std::collections::HashMap;

/// Cubic easing curve for one interpolation channel: two control points in
/// the unit square, mapping linear time fraction to an eased ratio. The
/// implicit first and last control points are (0,0) and (1,1).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EasingCurve {
    pub p1: Vec2,
    pub p2: Vec2,
}

impl EasingCurve {
    /// Default curve written by most authoring tools: both control points on
    /// the diagonal, which evaluates as exact linear interpolation.
    pub const LINEAR: Self = Self {
        p1: Vec2::new(0.15, 0.15),
        p2: Vec2::new(0.85, 0.85),
    };

    /// Both control points on the diagonal collapse the curve to `y = x`.
    pub fn is_linear(&self) -> bool {
        self.p1.x == self.p1.y && self.p2.x == self.p2.y
    }
}

impl Default for EasingCurve {
    fn default() -> Self {
        Self::LINEAR
    }
}

/// Index of the easing channel for each interpolated quantity.
pub const CURVE_X: usize = 0;
pub const CURVE_Y: usize = 1;
pub const CURVE_Z: usize = 2;
pub const CURVE_ROTATION: usize = 3;

/// One sampled pose of one bone, in the recording's coordinate convention.
#[derive(Copy, Clone, Debug)]
pub struct BoneKeyframe {
    pub frame: u32,
    pub translation: Vec3,
    pub rotation: Quat,
    /// X/Y/Z translation and rotation easing, in that order.
    pub curves: [EasingCurve; 4],
}

#[derive(Copy, Clone, Debug)]
pub struct MorphKeyframe {
    pub frame: u32,
    pub weight: f32,
}

/// Camera cut sample. Decoded as part of the motion-file contract; this
/// crate does not interpolate cameras.
#[derive(Copy, Clone, Debug)]
pub struct CameraKeyframe {
    pub frame: u32,
    pub distance: f32,
    pub look_at: Vec3,
    /// Euler angles in degrees.
    pub rotation: Vec3,
    pub curve: [u8; 24],
    pub fov: f32,
    pub orthographic: bool,
}

#[derive(Clone, Debug)]
pub struct IkSwitchEntry {
    pub name: String,
    pub enabled: bool,
}

/// Authored on/off event for named IK chains, keyed by time code.
#[derive(Clone, Debug)]
pub struct IkSwitchFrame {
    pub frame: u32,
    pub visible: bool,
    pub entries: Vec<IkSwitchEntry>,
}

/// A decoded motion clip: everything the motion decoder delivers, grouped by
/// bone/morph name. Hosts either parse this from VMD bytes (feature
/// `binary`) or construct it programmatically.
#[derive(Clone, Debug, Default)]
pub struct MotionData {
    pub model_name: String,
    pub bone_tracks: HashMap<String, Vec<BoneKeyframe>>,
    pub morph_tracks: HashMap<String, Vec<MorphKeyframe>>,
    pub camera_frames: Vec<CameraKeyframe>,
    pub ik_switch_frames: Vec<IkSwitchFrame>,
}

impl MotionData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_bone_keyframe(&mut self, name: &str, keyframe: BoneKeyframe) {
        self.bone_tracks
            .entry(name.to_string())
            .or_default()
            .push(keyframe);
    }

    pub fn push_morph_keyframe(&mut self, name: &str, keyframe: MorphKeyframe) {
        self.morph_tracks
            .entry(name.to_string())
            .or_default()
            .push(keyframe);
    }

    /// Sorts every track by time code. Time codes are required to be
    /// non-decreasing after this; tracks from the wire are unordered.
    pub fn sort_keyframes(&mut self) {
        for track in self.bone_tracks.values_mut() {
            track.sort_by_key(|k| k.frame);
        }
        for track in self.morph_tracks.values_mut() {
            track.sort_by_key(|k| k.frame);
        }
        self.camera_frames.sort_by_key(|k| k.frame);
        self.ik_switch_frames.sort_by_key(|k| k.frame);
    }

    /// Largest time code across bone and morph tracks.
    pub fn max_frame(&self) -> u32 {
        let bones = self
            .bone_tracks
            .values()
            .flat_map(|track| track.iter().map(|k| k.frame))
            .max()
            .unwrap_or(0);
        let morphs = self
            .morph_tracks
            .values()
            .flat_map(|track| track.iter().map(|k| k.frame))
            .max()
            .unwrap_or(0);
        bones.max(morphs)
    }
}
