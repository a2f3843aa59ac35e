//! VMD (Vocaloid Motion Data) loader.
//!
//! The loader is IO-free: it operates on an in-memory byte slice. Records are
//! little-endian; bone and morph names are fixed-width Shift-JIS fields.
//!
//! Sections after the bone frames are optional on the wire — files written by
//! older tools simply stop early — so a missing trailing section yields
//! whatever was decoded up to that point. Truncation inside a record is a
//! parse error.

use crate::{BoneKeyframe, CameraKeyframe, EasingCurve, Error, IkSwitchEntry, IkSwitchFrame,
            MorphKeyframe, MotionData};
use byteorder::{ByteOrder, LittleEndian};
use glam::{Quat, Vec2, Vec3};

const SIGNATURE_V2: &str = "Vocaloid Motion Data 0002";
const SIGNATURE_V1: &str = "Vocaloid Motion Data";

const LIGHT_FRAME_SIZE: usize = 28;
const SHADOW_FRAME_SIZE: usize = 9;

#[derive(Clone, Debug)]
struct BinaryInput<'a> {
    bytes: &'a [u8],
    cursor: usize,
}

impl<'a> BinaryInput<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, cursor: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.cursor)
    }

    fn read_bytes(&mut self, count: usize) -> Result<&'a [u8], Error> {
        if self.remaining() < count {
            return Err(Error::VmdParse {
                message: "unexpected EOF".to_string(),
            });
        }
        let slice = &self.bytes[self.cursor..self.cursor + count];
        self.cursor += count;
        Ok(slice)
    }

    fn skip(&mut self, count: usize) -> Result<(), Error> {
        self.read_bytes(count).map(|_| ())
    }

    fn read_u8(&mut self) -> Result<u8, Error> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_u32(&mut self) -> Result<u32, Error> {
        Ok(LittleEndian::read_u32(self.read_bytes(4)?))
    }

    fn read_f32(&mut self) -> Result<f32, Error> {
        Ok(LittleEndian::read_f32(self.read_bytes(4)?))
    }

    fn read_vec3(&mut self) -> Result<Vec3, Error> {
        Ok(Vec3::new(
            self.read_f32()?,
            self.read_f32()?,
            self.read_f32()?,
        ))
    }

    fn read_quat(&mut self) -> Result<Quat, Error> {
        let x = self.read_f32()?;
        let y = self.read_f32()?;
        let z = self.read_f32()?;
        let w = self.read_f32()?;
        Ok(Quat::from_xyzw(x, y, z, w))
    }

    fn read_string_fixed(&mut self, length: usize) -> Result<String, Error> {
        let bytes = self.read_bytes(length)?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(decode_shift_jis(&bytes[..end]))
    }
}

impl MotionData {
    /// Decodes a VMD file from memory. Bone, morph, camera and IK-switch
    /// sections are read; light and shadow sections are skipped.
    pub fn from_vmd_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let mut input = BinaryInput::new(bytes);
        let mut data = MotionData::new();

        let signature = input.read_string_fixed(30)?;
        let name_len = if signature.starts_with(SIGNATURE_V2) {
            20
        } else if signature.starts_with(SIGNATURE_V1) {
            10
        } else {
            return Err(Error::VmdSignature { value: signature });
        };
        data.model_name = input.read_string_fixed(name_len)?;

        let bone_count = input.read_u32()?;
        for _ in 0..bone_count {
            let name = input.read_string_fixed(15)?;
            let frame = input.read_u32()?;
            let translation = input.read_vec3()?;
            let rotation = input.read_quat()?;
            let curve_block = input.read_bytes(64)?;
            data.push_bone_keyframe(
                &name,
                BoneKeyframe {
                    frame,
                    translation,
                    rotation,
                    curves: parse_curve_block(curve_block),
                },
            );
        }

        'trailing: {
            if input.remaining() == 0 {
                break 'trailing;
            }
            let morph_count = input.read_u32()?;
            for _ in 0..morph_count {
                let name = input.read_string_fixed(15)?;
                let frame = input.read_u32()?;
                let weight = input.read_f32()?;
                data.push_morph_keyframe(&name, MorphKeyframe { frame, weight });
            }

            if input.remaining() == 0 {
                break 'trailing;
            }
            let camera_count = input.read_u32()?;
            for _ in 0..camera_count {
                let frame = input.read_u32()?;
                let distance = input.read_f32()?;
                let look_at = input.read_vec3()?;
                let euler = input.read_vec3()?;
            let rotation = Vec3::new(
                euler.x.to_degrees(),
                euler.y.to_degrees(),
                euler.z.to_degrees(),
            );
                let mut curve = [0u8; 24];
                curve.copy_from_slice(input.read_bytes(24)?);
                let fov = input.read_u32()? as f32;
                let orthographic = input.read_u8()? != 0;
                data.camera_frames.push(CameraKeyframe {
                    frame,
                    distance,
                    look_at,
                    rotation,
                    curve,
                    fov,
                    orthographic,
                });
            }

            if input.remaining() == 0 {
                break 'trailing;
            }
            let light_count = input.read_u32()? as usize;
            input.skip(light_count * LIGHT_FRAME_SIZE)?;

            if input.remaining() == 0 {
                break 'trailing;
            }
            let shadow_count = input.read_u32()? as usize;
            input.skip(shadow_count * SHADOW_FRAME_SIZE)?;

            if input.remaining() == 0 {
                break 'trailing;
            }
            let ik_count = input.read_u32()?;
            for _ in 0..ik_count {
                let frame = input.read_u32()?;
                let visible = input.read_u8()? != 0;
                let entry_count = input.read_u32()?;
                let mut entries = Vec::with_capacity(entry_count as usize);
                for _ in 0..entry_count {
                    let name = input.read_string_fixed(20)?;
                    let enabled = input.read_u8()? != 0;
                    entries.push(IkSwitchEntry { name, enabled });
                }
                data.ik_switch_frames.push(IkSwitchFrame {
                    frame,
                    visible,
                    entries,
                });
            }
        }

        data.sort_keyframes();
        Ok(data)
    }
}

/// Splits a 64-byte interpolation block into the four per-channel curves.
/// Channel layout: X at 0, Y at 16, Z at 32, rotation at 48; control-point
/// coordinates are stored as bytes over 127.
fn parse_curve_block(block: &[u8]) -> [EasingCurve; 4] {
    let mut curves = [EasingCurve::LINEAR; 4];
    for (channel, curve) in curves.iter_mut().enumerate() {
        let offset = channel * 16;
        *curve = EasingCurve {
            p1: Vec2::new(
                block[offset] as f32 / 127.0,
                block[offset + 4] as f32 / 127.0,
            ),
            p2: Vec2::new(
                block[offset + 8] as f32 / 127.0,
                block[offset + 12] as f32 / 127.0,
            ),
        };
    }
    curves
}

/// Decodes a Shift-JIS byte string covering ASCII plus the standard MMD
/// motion vocabulary (bone and morph names). Unmapped multi-byte pairs decode
/// to U+FFFD so an exotic name degrades by itself instead of failing the
/// whole file.
fn decode_shift_jis(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b < 0x80 {
            out.push(b as char);
            i += 1;
        } else if (0x81..=0x9F).contains(&b) || (0xE0..=0xFC).contains(&b) {
            if i + 1 < bytes.len() {
                out.push(jis_pair(b, bytes[i + 1]).unwrap_or('\u{FFFD}'));
                i += 2;
            } else {
                out.push('\u{FFFD}');
                i += 1;
            }
        } else {
            // Half-width katakana and stray lead bytes.
            out.push('\u{FFFD}');
            i += 1;
        }
    }
    out
}

fn jis_pair(hi: u8, lo: u8) -> Option<char> {
    let c = match (hi, lo) {
        (0x81, 0x5B) => 'ー',
        (0x82, 0x4F) => '０',
        (0x82, 0x50) => '１',
        (0x82, 0x51) => '２',
        (0x82, 0x52) => '３',
        (0x82, 0x68) => 'Ｉ',
        (0x82, 0x6A) => 'Ｋ',
        (0x82, 0xA0) => 'あ',
        (0x82, 0xA2) => 'い',
        (0x82, 0xA4) => 'う',
        (0x82, 0xA6) => 'え',
        (0x82, 0xA8) => 'お',
        (0x82, 0xAB) => 'き',
        (0x82, 0xB4) => 'ざ',
        (0x82, 0xB6) => 'じ',
        (0x82, 0xBD) => 'た',
        (0x82, 0xC2) => 'つ',
        (0x82, 0xC4) => 'て',
        (0x82, 0xCC) => 'の',
        (0x82, 0xCE) => 'ば',
        (0x82, 0xD0) => 'ひ',
        (0x82, 0xDC) => 'ま',
        (0x82, 0xE8) => 'り',
        (0x82, 0xE9) => 'る',
        (0x83, 0x4F) => 'グ',
        (0x83, 0x5A) => 'セ',
        (0x83, 0x5E) => 'タ',
        (0x83, 0x75) => 'ブ',
        (0x83, 0x8B) => 'ル',
        (0x83, 0x93) => 'ン',
        (0x83, 0x94) => 'ヴ',
        (0x89, 0x45) => '右',
        (0x89, 0xBA) => '下',
        (0x8C, 0x95) => '剣',
        (0x8C, 0xA8) => '肩',
        (0x8D, 0x98) => '腰',
        (0x8D, 0xA2) => '困',
        (0x8D, 0xB6) => '左',
        (0x8E, 0x77) => '指',
        (0x8E, 0xE8) => '手',
        (0x8E, 0xF1) => '首',
        (0x8F, 0x64) => '重',
        (0x8F, 0xAC) => '小',
        (0x8F, 0xCE) => '笑',
        (0x8F, 0xE3) => '上',
        (0x90, 0x53) => '心',
        (0x90, 0x5E) => '真',
        (0x90, 0x65) => '親',
        (0x90, 0x67) => '身',
        (0x90, 0x6C) => '人',
        (0x90, 0xE6) => '先',
        (0x91, 0x53) => '全',
        (0x91, 0xAB) => '足',
        (0x91, 0xCC) => '体',
        (0x92, 0x86) => '中',
        (0x93, 0x7B) => '怒',
        (0x93, 0xAA) => '頭',
        (0x94, 0x50) => '捻',
        (0x94, 0xBC) => '半',
        (0x96, 0xDA) => '目',
        (0x96, 0xF2) => '薬',
        (0x97, 0xBC) => '両',
        (0x98, 0x72) => '腕',
        (0x9D, 0x80) => '捩',
        _ => return None,
    };
    Some(c)
}
