//! Static name tables for the standard MMD humanoid rig.
//!
//! These are immutable data, not runtime state: the bone vocabulary of the
//! recording format, the hand-authored proxy hierarchy, and the translation
//! from recording bone names to target-model bone names.

/// Canonical names of the recording's center-class bones.
pub const ROOT_BONE: &str = "全ての親";
pub const CENTER_BONE: &str = "センター";
pub const GROOVE_BONE: &str = "グルーブ";
pub const WAIST_BONE: &str = "腰";
pub const MASS_CENTER_BONE: &str = "体の重心";
pub const LOWER_BODY_BONE: &str = "下半身";
pub const UPPER_BODY_BONE: &str = "上半身";

pub const LEFT_THIGH: &str = "左足";
pub const RIGHT_THIGH: &str = "右足";
pub const LEFT_KNEE: &str = "左ひざ";
pub const RIGHT_KNEE: &str = "右ひざ";
pub const LEFT_ANKLE: &str = "左足首";
pub const RIGHT_ANKLE: &str = "右足首";
pub const LEFT_TOE: &str = "左つま先";
pub const RIGHT_TOE: &str = "右つま先";

pub const LEFT_FOOT_IK: &str = "左足ＩＫ";
pub const RIGHT_FOOT_IK: &str = "右足ＩＫ";
pub const LEFT_TOE_IK: &str = "左つま先ＩＫ";
pub const RIGHT_TOE_IK: &str = "右つま先ＩＫ";
pub const LEFT_FOOT_IK_PARENT: &str = "左足IK親";
pub const RIGHT_FOOT_IK_PARENT: &str = "右足IK親";

pub const LEFT_HIP_CANCEL: &str = "腰キャンセル左";
pub const RIGHT_HIP_CANCEL: &str = "腰キャンセル右";

pub const LEFT_ARM_TWIST: &str = "左腕捩";
pub const RIGHT_ARM_TWIST: &str = "右腕捩";
pub const LEFT_WRIST_TWIST: &str = "左手捩";
pub const RIGHT_WRIST_TWIST: &str = "右手捩";

pub const LEFT_SOLE_END: &str = "左足底End";
pub const RIGHT_SOLE_END: &str = "右足底End";
pub const LEFT_TOE_END: &str = "左つま先End";
pub const RIGHT_TOE_END: &str = "右つま先End";

/// Target-model bone names with model-specific write-back rules.
pub const TARGET_PELVIS: &str = "cf_j_hips";
pub const TARGET_WAIST: &str = "cf_j_waist01";
pub const TARGET_SPINE: &str = "cf_j_spine01";

pub(crate) const TARGET_LEFT_ANKLE: &str = "cf_j_leg03_L";
pub(crate) const TARGET_RIGHT_ANKLE: &str = "cf_j_leg03_R";
pub(crate) const TARGET_LEFT_FOOT: &str = "cf_j_foot_L";
pub(crate) const TARGET_RIGHT_FOOT: &str = "cf_j_foot_R";
pub(crate) const TARGET_LEFT_TOES: &str = "cf_j_toes_L";
pub(crate) const TARGET_RIGHT_TOES: &str = "cf_j_toes_R";

/// Recording bone name -> target-model bone name. A proxy bone is bound to a
/// target bone only when its name appears here AND the target skeleton has
/// that bone.
static BONE_TRANSLATION: &[(&str, &str)] = &[
    ("センター", "cf_j_hips"),
    ("グルーブ", "cf_j_hips"),
    ("下半身", "cf_j_waist01"),
    ("腰", "cf_j_waist01"),
    ("腰キャンセル左", "cf_j_thigh00_L"),
    ("腰キャンセル右", "cf_j_thigh00_R"),
    ("上半身", "cf_j_spine01"),
    ("上半身2", "cf_j_spine02"),
    ("上半身3", "cf_j_spine03"),
    ("首", "cf_j_neck"),
    ("頭", "cf_j_head"),
    ("左肩", "cf_j_shoulder_L"),
    ("左腕", "cf_j_arm00_L"),
    ("左ひじ", "cf_j_forearm01_L"),
    ("左手首", "cf_j_hand_L"),
    ("右肩", "cf_j_shoulder_R"),
    ("右腕", "cf_j_arm00_R"),
    ("右ひじ", "cf_j_forearm01_R"),
    ("右手首", "cf_j_hand_R"),
    ("左足", "cf_j_thigh00_L"),
    ("左ひざ", "cf_j_leg01_L"),
    ("左足首", "cf_j_leg03_L"),
    ("左つま先", "cf_j_toes_L"),
    ("右足", "cf_j_thigh00_R"),
    ("右ひざ", "cf_j_leg01_R"),
    ("右足首", "cf_j_leg03_R"),
    ("右つま先", "cf_j_toes_R"),
    ("左親指０", "cf_j_thumb01_L"),
    ("左親指１", "cf_j_thumb02_L"),
    ("左親指２", "cf_j_thumb03_L"),
    ("右親指０", "cf_j_thumb01_R"),
    ("右親指１", "cf_j_thumb02_R"),
    ("右親指２", "cf_j_thumb03_R"),
    ("左人指１", "cf_j_index01_L"),
    ("左人指２", "cf_j_index02_L"),
    ("左人指３", "cf_j_index03_L"),
    ("左中指１", "cf_j_middle01_L"),
    ("左中指２", "cf_j_middle02_L"),
    ("左中指３", "cf_j_middle03_L"),
    ("左薬指１", "cf_j_ring01_L"),
    ("左薬指２", "cf_j_ring02_L"),
    ("左薬指３", "cf_j_ring03_L"),
    ("左小指１", "cf_j_little01_L"),
    ("左小指２", "cf_j_little02_L"),
    ("左小指３", "cf_j_little03_L"),
    ("右人指１", "cf_j_index01_R"),
    ("右人指２", "cf_j_index02_R"),
    ("右人指３", "cf_j_index03_R"),
    ("右中指１", "cf_j_middle01_R"),
    ("右中指２", "cf_j_middle02_R"),
    ("右中指３", "cf_j_middle03_R"),
    ("右薬指１", "cf_j_ring01_R"),
    ("右薬指２", "cf_j_ring02_R"),
    ("右薬指３", "cf_j_ring03_R"),
    ("右小指１", "cf_j_little01_R"),
    ("右小指２", "cf_j_little02_R"),
    ("右小指３", "cf_j_little03_R"),
    ("Center", "cf_j_hips"),
    ("Hips", "cf_j_hips"),
    ("全ての親", "cf_j_root"),
];

pub(crate) fn target_bone_name(name: &str) -> Option<&'static str> {
    BONE_TRANSLATION
        .iter()
        .find(|(mmd, _)| *mmd == name)
        .map(|(_, target)| *target)
}

/// Hand-authored proxy hierarchy: bone name -> parent name.
///
/// Torso chain: root -> center -> groove -> waist -> mass center, with the
/// lower and upper body both hanging off the mass center. Legs route through
/// the hip-cancel bones. Foot IK bones hang off the IK parents so they stay
/// put under body translation.
static HIERARCHY: &[(&str, &str)] = &[
    ("センター", "全ての親"),
    ("グルーブ", "センター"),
    ("腰", "グルーブ"),
    ("体の重心", "腰"),
    ("下半身", "体の重心"),
    ("上半身", "体の重心"),
    ("上半身2", "上半身"),
    ("上半身3", "上半身2"),
    ("首", "上半身3"),
    ("頭", "首"),
    ("左肩", "上半身2"),
    ("左腕", "左肩"),
    ("左ひじ", "左腕"),
    ("左手首", "左ひじ"),
    ("右肩", "上半身2"),
    ("右腕", "右肩"),
    ("右ひじ", "右腕"),
    ("右手首", "右ひじ"),
    ("腰キャンセル左", "下半身"),
    ("腰キャンセル右", "下半身"),
    ("左足", "腰キャンセル左"),
    ("左ひざ", "左足"),
    ("左足首", "左ひざ"),
    ("左つま先", "左足首"),
    ("右足", "腰キャンセル右"),
    ("右ひざ", "右足"),
    ("右足首", "右ひざ"),
    ("右つま先", "右足首"),
    ("左足IK親", "全ての親"),
    ("右足IK親", "全ての親"),
    ("左足ＩＫ", "左足IK親"),
    ("右足ＩＫ", "右足IK親"),
    ("左つま先ＩＫ", "左足ＩＫ"),
    ("右つま先ＩＫ", "右足ＩＫ"),
    ("左親指０", "左手首"),
    ("左親指１", "左親指０"),
    ("左親指２", "左親指１"),
    ("右親指０", "右手首"),
    ("右親指１", "右親指０"),
    ("右親指２", "右親指１"),
    ("左人指１", "左手首"),
    ("左人指２", "左人指１"),
    ("左人指３", "左人指２"),
    ("左中指１", "左手首"),
    ("左中指２", "左中指１"),
    ("左中指３", "左中指２"),
    ("左薬指１", "左手首"),
    ("左薬指２", "左薬指１"),
    ("左薬指３", "左薬指２"),
    ("左小指１", "左手首"),
    ("左小指２", "左小指１"),
    ("左小指３", "左小指２"),
    ("右人指１", "右手首"),
    ("右人指２", "右人指１"),
    ("右人指３", "右人指２"),
    ("右中指１", "右手首"),
    ("右中指２", "右中指１"),
    ("右中指３", "右中指２"),
    ("右薬指１", "右手首"),
    ("右薬指２", "右薬指１"),
    ("右薬指３", "右薬指２"),
    ("右小指１", "右手首"),
    ("右小指２", "右小指１"),
    ("右小指３", "右小指２"),
];

pub(crate) fn hierarchy_parent(name: &str) -> Option<&'static str> {
    HIERARCHY
        .iter()
        .find(|(bone, _)| *bone == name)
        .map(|(_, parent)| *parent)
}

/// Motion-file twist-track aliases -> canonical twist bone name. Several
/// recordings use abbreviated or variant spellings for the same bone.
static TWIST_TRACK_ALIASES: &[(&str, &str)] = &[
    ("左腕捩", "左腕捩"),
    ("右腕捩", "右腕捩"),
    ("左手捩", "左手捩"),
    ("右手捩", "右手捩"),
    ("左捩", "左腕捩"),
    ("右捩", "右腕捩"),
    ("左腕捻", "左腕捩"),
    ("右腕捻", "右腕捩"),
];

pub(crate) fn canonical_twist_name(name: &str) -> Option<&'static str> {
    TWIST_TRACK_ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, canonical)| *canonical)
}

/// Default twist-dispersion wiring: arm twist feeds the upper arm, wrist
/// twist feeds the forearm.
pub(crate) struct TwistRuleDef {
    pub name: &'static str,
    pub twist_bone: &'static str,
    pub recipient_bone: &'static str,
    pub base_rate: f32,
}

pub(crate) const TWIST_RULES: &[TwistRuleDef] = &[
    TwistRuleDef {
        name: "ARMTWIST_L",
        twist_bone: "左腕捩",
        recipient_bone: "左腕",
        base_rate: 0.6,
    },
    TwistRuleDef {
        name: "ARMTWIST_R",
        twist_bone: "右腕捩",
        recipient_bone: "右腕",
        base_rate: 0.6,
    },
    TwistRuleDef {
        name: "HANDTWIST_L",
        twist_bone: "左手捩",
        recipient_bone: "左ひじ",
        base_rate: 0.6,
    },
    TwistRuleDef {
        name: "HANDTWIST_R",
        twist_bone: "右手捩",
        recipient_bone: "右ひじ",
        base_rate: 0.6,
    },
];

/// IK bones that must exist as proxy nodes even when the motion has no
/// samples for them.
pub(crate) const ESSENTIAL_IK_BONES: &[&str] =
    &[LEFT_FOOT_IK, RIGHT_FOOT_IK, LEFT_TOE_IK, RIGHT_TOE_IK];

/// Structural joints the leg solver rotates; force-created so the chains are
/// usable even when the recording never animates them.
pub(crate) const ESSENTIAL_STRUCTURE_BONES: &[&str] = &[
    LEFT_KNEE,
    RIGHT_KNEE,
    LEFT_THIGH,
    RIGHT_THIGH,
    LEFT_ANKLE,
    RIGHT_ANKLE,
];

/// Names of the leg-IK target tracks across the full-width/half-width/English
/// spellings seen in the wild. Used both for IK auto-enable detection and for
/// data-quality checks.
pub(crate) const FOOT_IK_TRACK_NAMES: &[&str] = &[
    "左足IK",
    "右足IK",
    "左足ＩＫ",
    "右足ＩＫ",
    "Left Leg IK",
    "Right Leg IK",
    "左足Ik",
    "右足Ik",
];

/// Morph name -> target blend-shape name fragments. Part of the decoder
/// contract; the morph player itself lives outside this crate.
pub static MORPH_TRANSLATION: &[(&str, &[&str])] = &[
    ("あ", &["kuti_f00_vo_a", "tooth.f00_def_op", "f00_def_op"]),
    ("a", &["kuti_f00_vo_a", "tooth.f00_def_op", "f00_def_op"]),
    ("い", &["kuti_f00_vo_i", "tooth.f00_def_cl", "f00_def_cl"]),
    ("i", &["kuti_f00_vo_i", "tooth.f00_def_cl", "f00_def_cl"]),
    ("う", &["kuti_f00_vo_u"]),
    ("u", &["kuti_f00_vo_u"]),
    ("え", &["kuti_f00_vo_e", "tooth.f00_def_op", "f00_def_op"]),
    ("e", &["kuti_f00_vo_e", "tooth.f00_def_op", "f00_def_op"]),
    ("お", &["kuti_f00_vo_o", "tooth.f00_def_op", "f00_def_op"]),
    ("o", &["kuti_f00_vo_o", "tooth.f00_def_op", "f00_def_op"]),
    (
        "まばたき",
        &[
            "face.eye_f00_def_cl",
            "eyelash.eye_f00_def_cl",
            "eyelid.eye_f00_def_cl",
        ],
    ),
    (
        "blink",
        &[
            "face.eye_f00_def_cl",
            "eyelash.eye_f00_def_cl",
            "eyelid.eye_f00_def_cl",
        ],
    ),
    (
        "笑い",
        &[
            "face.kuti_f00_egao_cl",
            "face.eye_f00_egao_cl",
            "eyelash.eye_f00_egao_cl",
            "eyelid.eye_f00_egao_cl",
            "tooth.f00_def_cl",
        ],
    ),
    (
        "smile",
        &[
            "face.kuti_f00_egao_cl",
            "face.eye_f00_egao_cl",
            "eyelash.eye_f00_egao_cl",
            "eyelid.eye_f00_egao_cl",
            "tooth.f00_def_cl",
        ],
    ),
    ("困る", &["mayuge.f00_komari", "f00_komari"]),
    ("怒り", &["mayuge.f00_ikari", "f00_ikari"]),
    ("真剣", &["kuti_f00_sinken"]),
];

pub(crate) fn is_ik_name(name: &str) -> bool {
    name.contains("ＩＫ") || name.contains("IK")
}

pub(crate) fn is_center_class(name: &str) -> bool {
    name == CENTER_BONE || name == "Hips" || name == ROOT_BONE || name == GROOVE_BONE
}

pub(crate) fn is_right_side(name: &str) -> bool {
    name.contains('右')
}

pub(crate) fn is_finger(name: &str) -> bool {
    name.contains('指')
}

pub(crate) fn is_foot_ik_related(name: &str) -> bool {
    name.contains("足IK親")
        || name.contains("足ＩＫ親")
        || name.contains("足ＩＫ")
        || name.contains("足IK")
        || name.contains("つま先ＩＫ")
}

pub(crate) fn is_ik_parent(name: &str) -> bool {
    name.contains("足IK親") || name.contains("足ＩＫ親")
}

pub(crate) fn is_twist_name(name: &str) -> bool {
    name.contains('捩') || name.contains('捻')
}

/// Bones whose recorded translation channel is meaningful. Everything else
/// is a rotation-only joint whose position channel carries zeros or noise.
pub(crate) fn carries_translation(name: &str) -> bool {
    name == ROOT_BONE
        || name == CENTER_BONE
        || name == GROOVE_BONE
        || name == MASS_CENTER_BONE
        || name.ends_with("足ＩＫ")
        || name.ends_with("足IK")
        || name.ends_with("つま先ＩＫ")
        || name.contains("足IK親")
        || name.contains("足ＩＫ親")
}

pub(crate) fn is_leg_bone(name: &str) -> bool {
    (name.contains('足') || name.contains("ひざ") || name.contains("つま先")) && !is_ik_name(name)
}
