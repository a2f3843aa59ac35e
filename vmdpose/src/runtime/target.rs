use crate::Error;
use glam::{Quat, Vec3};
use std::collections::HashMap;

/// One joint of the host model's skeleton.
///
/// The bind-pose local transform is captured when the bone is added and is
/// the base the retarget writer composes onto; `restore_bind_pose` puts the
/// skeleton back exactly as the host described it.
#[derive(Clone, Debug)]
pub struct TargetBone {
    name: String,
    parent: Option<usize>,
    pub local_position: Vec3,
    pub local_rotation: Quat,
    bind_position: Vec3,
    bind_rotation: Quat,
}

impl TargetBone {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent_index(&self) -> Option<usize> {
        self.parent
    }

    pub fn bind_position(&self) -> Vec3 {
        self.bind_position
    }

    pub fn bind_rotation(&self) -> Quat {
        self.bind_rotation
    }
}

/// The host model's bone hierarchy, described once by the host before
/// playback. Mutated only by the retarget writer while a motion is active.
#[derive(Clone, Debug, Default)]
pub struct TargetSkeleton {
    bones: Vec<TargetBone>,
    index: HashMap<String, usize>,
}

impl TargetSkeleton {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a bone. Parents must be added before their children, so the
    /// parent index always refers to an existing bone.
    pub fn push_bone(
        &mut self,
        name: &str,
        parent: Option<usize>,
        local_position: Vec3,
        local_rotation: Quat,
    ) -> Result<usize, Error> {
        if let Some(p) = parent {
            if p >= self.bones.len() {
                return Err(Error::UnknownBoneParent {
                    bone: name.to_string(),
                    parent: format!("#{p}"),
                });
            }
        }
        if self.index.contains_key(name) {
            return Err(Error::DuplicateBone {
                name: name.to_string(),
            });
        }
        let index = self.bones.len();
        self.bones.push(TargetBone {
            name: name.to_string(),
            parent,
            local_position,
            local_rotation,
            bind_position: local_position,
            bind_rotation: local_rotation,
        });
        self.index.insert(name.to_string(), index);
        Ok(index)
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

    pub fn bone(&self, index: usize) -> &TargetBone {
        &self.bones[index]
    }

    pub fn bone_mut(&mut self, index: usize) -> &mut TargetBone {
        &mut self.bones[index]
    }

    pub fn bones(&self) -> &[TargetBone] {
        &self.bones
    }

    /// World rotation computed by walking the parent chain.
    pub fn world_rotation(&self, index: usize) -> Quat {
        let mut rotation = self.bones[index].local_rotation;
        let mut current = self.bones[index].parent;
        while let Some(p) = current {
            rotation = self.bones[p].local_rotation * rotation;
            current = self.bones[p].parent;
        }
        rotation
    }

    /// World position computed by walking the parent chain.
    pub fn world_position(&self, index: usize) -> Vec3 {
        let mut position = self.bones[index].local_position;
        let mut current = self.bones[index].parent;
        while let Some(p) = current {
            let parent = &self.bones[p];
            position = parent.local_position + parent.local_rotation * position;
            current = parent.parent;
        }
        position
    }

    /// Expresses a world-space point in the local space of `index`.
    pub fn world_to_local_point(&self, index: usize, point: Vec3) -> Vec3 {
        self.world_rotation(index).inverse() * (point - self.world_position(index))
    }

    /// Moves `index` so its world position matches `point`, leaving the rest
    /// of the hierarchy alone.
    pub(crate) fn set_world_position(&mut self, index: usize, point: Vec3) {
        self.bones[index].local_position = match self.bones[index].parent {
            Some(p) => self.world_to_local_point(p, point),
            None => point,
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

    /// Resets every bone's local transform to the captured bind pose.
    pub fn restore_bind_pose(&mut self) {
        for bone in &mut self.bones {
            bone.local_position = bone.bind_position;
            bone.local_rotation = bone.bind_rotation;
        }
    }
}
