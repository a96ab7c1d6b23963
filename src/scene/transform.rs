use glam::{Affine3A, EulerRot, Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Transform component
///
/// Holds the authoritative local scale / rotation / translation of an entity
/// plus the derived matrices. `local` and `world` are caches: they are only
/// valid after the transform system (and, for parented entities, the
/// hierarchy system) has run since the last edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformComponent {
    pub scale_local: Vec3,
    pub rotation_local: Quat,
    pub translation_local: Vec3,

    // === Derived state (not persisted) ===
    #[serde(skip)]
    pub(crate) local: Affine3A,
    #[serde(skip)]
    pub(crate) world: Affine3A,
    #[serde(skip, default = "dirty_on_load")]
    dirty: bool,
}

fn dirty_on_load() -> bool {
    true
}

impl Default for TransformComponent {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformComponent {
    #[must_use]
    pub fn new() -> Self {
        Self {
            scale_local: Vec3::ONE,
            rotation_local: Quat::IDENTITY,
            translation_local: Vec3::ZERO,
            local: Affine3A::IDENTITY,
            world: Affine3A::IDENTITY,
            dirty: true,
        }
    }

    #[must_use]
    pub fn from_srt(scale: Vec3, rotation: Quat, translation: Vec3) -> Self {
        Self {
            scale_local: scale,
            rotation_local: rotation,
            translation_local: translation,
            ..Self::new()
        }
    }

    // ========================================================================
    // Dirty tracking
    // ========================================================================

    #[inline]
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    #[inline]
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Recomposes the local matrix if dirty and resets the world matrix to it.
    ///
    /// Returns whether anything was recomputed.
    pub fn update_transform(&mut self) -> bool {
        if !self.dirty {
            return false;
        }
        self.local = self.compose_local();
        self.world = self.local;
        self.dirty = false;
        true
    }

    /// world = parent_world * inverse_bind * local
    #[inline]
    pub fn update_transform_parented(&mut self, parent_world: &Affine3A, inverse_bind: &Affine3A) {
        self.world = *parent_world * *inverse_bind * self.local;
    }

    /// Drops any parented result and falls back to the un-parented matrix.
    #[inline]
    pub fn reset_to_local(&mut self) {
        self.world = self.local;
    }

    /// Composition of the authoritative SRT fields, independent of the caches.
    #[must_use]
    pub fn compose_local(&self) -> Affine3A {
        Affine3A::from_scale_rotation_translation(
            self.scale_local,
            self.rotation_local,
            self.translation_local,
        )
    }

    // ========================================================================
    // Setters (all mark dirty)
    // ========================================================================

    pub fn set_translation(&mut self, translation: Vec3) {
        self.translation_local = translation;
        self.mark_dirty();
    }

    pub fn set_rotation(&mut self, rotation: Quat) {
        self.rotation_local = rotation;
        self.mark_dirty();
    }

    pub fn set_scale(&mut self, scale: Vec3) {
        self.scale_local = scale;
        self.mark_dirty();
    }

    pub fn translate(&mut self, delta: Vec3) {
        self.translation_local += delta;
        self.mark_dirty();
    }

    pub fn set_rotation_euler(&mut self, x: f32, y: f32, z: f32) {
        self.set_rotation(Quat::from_euler(EulerRot::XYZ, x, y, z));
    }

    /// Replaces the local SRT by the decomposition of `matrix`.
    ///
    /// Shear is lost in the decomposition.
    pub fn apply_matrix(&mut self, matrix: &Affine3A) {
        let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
        self.scale_local = scale;
        self.rotation_local = rotation;
        self.translation_local = translation;
        self.mark_dirty();
    }

    /// Pre-multiplies the local SRT by `matrix` (used to move an entity into
    /// another coordinate space).
    pub fn matrix_transform(&mut self, matrix: &Affine3A) {
        let combined = *matrix * self.compose_local();
        self.apply_matrix(&combined);
    }

    /// Bakes the current world matrix into the local SRT, so the entity keeps
    /// its visual placement once it is no longer parented.
    pub fn apply_world(&mut self) {
        let world = self.world;
        self.apply_matrix(&world);
    }

    // ========================================================================
    // Getters
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn local_matrix(&self) -> &Affine3A {
        &self.local
    }

    #[inline]
    #[must_use]
    pub fn world_matrix(&self) -> &Affine3A {
        &self.world
    }

    #[inline]
    #[must_use]
    pub fn world_matrix_as_mat4(&self) -> Mat4 {
        Mat4::from(self.world)
    }

    #[inline]
    #[must_use]
    pub fn world_position(&self) -> Vec3 {
        self.world.translation.into()
    }
}
