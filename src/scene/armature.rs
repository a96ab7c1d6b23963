use bytemuck::{Pod, Zeroable};
use glam::{Affine3A, Mat4, Vec4};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::ecs::{ComponentManager, Entity, EntityRefs};
use crate::scene::transform::TransformComponent;

/// One skin matrix as the shader reads it: the first three rows of the 4x4
/// matrix. The fourth row of an affine matrix is always `(0, 0, 0, 1)`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct ShaderBone {
    pub pose0: Vec4,
    pub pose1: Vec4,
    pub pose2: Vec4,
}

impl From<&Mat4> for ShaderBone {
    fn from(matrix: &Mat4) -> Self {
        Self {
            pose0: matrix.row(0),
            pose1: matrix.row(1),
            pose2: matrix.row(2),
        }
    }
}

impl ShaderBone {
    /// Rebuilds the full matrix from the three packed rows.
    #[must_use]
    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_cols(self.pose0, self.pose1, self.pose2, Vec4::W).transpose()
    }
}

/// Skeleton bound to a skinned mesh.
///
/// `bones[i]` is joint `i` in the vertex data and pairs with
/// `inverse_bind_matrices[i]`. Bones are weak references; an armature must
/// tolerate any of them being removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmatureComponent {
    pub bones: Vec<Entity>,
    /// Mesh space → bone space at bind time.
    pub inverse_bind_matrices: Vec<Affine3A>,
    /// Applied last, on top of the bone's world matrix (mirroring or axis
    /// conversion).
    pub remap: Affine3A,

    // === Runtime data, rebuilt each tick ===
    #[serde(skip)]
    skin_matrices: Vec<Mat4>,
    #[serde(skip)]
    bone_data: Vec<ShaderBone>,
    #[serde(skip)]
    version: u64,
}

impl Default for ArmatureComponent {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

impl ArmatureComponent {
    #[must_use]
    pub fn new(bones: Vec<Entity>, inverse_bind_matrices: Vec<Affine3A>) -> Self {
        Self {
            bones,
            inverse_bind_matrices,
            remap: Affine3A::IDENTITY,
            skin_matrices: Vec::new(),
            bone_data: Vec::new(),
            version: 0,
        }
    }

    #[inline]
    #[must_use]
    pub fn skin_matrices(&self) -> &[Mat4] {
        &self.skin_matrices
    }

    #[inline]
    #[must_use]
    pub fn bone_data(&self) -> &[ShaderBone] {
        &self.bone_data
    }

    /// Packed bone buffer, ready for upload.
    #[inline]
    #[must_use]
    pub fn bone_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.bone_data)
    }

    /// Bumped whenever the packed bone data changes. Consumers compare it with
    /// the last version they uploaded.
    #[inline]
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Recomputes `remap * bone.world * inverse_bind` for every bone that
    /// still has a transform. Missing bones keep their previous matrix.
    pub fn compute_skin_matrices(&mut self, transforms: &ComponentManager<TransformComponent>) {
        let count = self.bones.len();
        if self.skin_matrices.len() != count {
            self.skin_matrices.resize(count, Mat4::IDENTITY);
            self.bone_data
                .resize(count, ShaderBone::from(&Mat4::IDENTITY));
            self.version += 1;
        }

        let mut changed = false;
        for (i, &bone) in self.bones.iter().enumerate() {
            let Some(transform) = transforms.get(bone) else {
                continue;
            };
            let ibm = self
                .inverse_bind_matrices
                .get(i)
                .copied()
                .unwrap_or(Affine3A::IDENTITY);

            let skin = Mat4::from(self.remap * *transform.world_matrix() * ibm);
            if skin != self.skin_matrices[i] {
                self.skin_matrices[i] = skin;
                self.bone_data[i] = ShaderBone::from(&skin);
                changed = true;
            }
        }

        if changed {
            self.version += 1;
        }
    }
}

impl EntityRefs for ArmatureComponent {
    fn remap_entities(&mut self, map: &mut impl FnMut(Entity) -> Entity) {
        for bone in &mut self.bones {
            *bone = map(*bone);
        }
    }
}

/// Bakes skin matrices for every armature. Armatures only read transforms, so
/// large tables are processed in parallel.
pub fn run_armature_update(
    armatures: &mut ComponentManager<ArmatureComponent>,
    transforms: &ComponentManager<TransformComponent>,
    parallel_threshold: usize,
) {
    let rows = armatures.components_mut();
    if rows.len() >= parallel_threshold {
        rows.par_iter_mut()
            .for_each(|armature| armature.compute_skin_matrices(transforms));
    } else {
        for armature in rows {
            armature.compute_skin_matrices(transforms);
        }
    }
}
