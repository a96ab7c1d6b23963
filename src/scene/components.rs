//! Asset-level components.
//!
//! These carry little behavior of their own in the update pipeline, but they
//! hold entity references (mesh → material, mesh → armature, object → mesh)
//! that merge and seeded deserialization must rewrite.

use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::ecs::{Entity, EntityRefs};

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NameComponent {
    pub name: String,
}

impl NameComponent {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// PBR material parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialComponent {
    pub base_color: Vec4,
    pub emissive: Vec3,
    pub roughness: f32,
    pub metalness: f32,
    /// Texture names, resolved by the render backend.
    pub textures: Vec<String>,
}

impl Default for MaterialComponent {
    fn default() -> Self {
        Self {
            base_color: Vec4::ONE,
            emissive: Vec3::ZERO,
            roughness: 0.5,
            metalness: 0.0,
            textures: Vec::new(),
        }
    }
}

/// Index range of a mesh drawn with one material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshSubset {
    pub material: Entity,
    pub index_offset: u32,
    pub index_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshComponent {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub indices: Vec<u32>,
    /// Per-vertex joint indices into the armature's bone list.
    pub joints: Vec<[u16; 4]>,
    pub weights: Vec<Vec4>,
    pub subsets: Vec<MeshSubset>,
    /// Skinning armature, `Entity::INVALID` for static meshes.
    pub armature: Entity,
}

impl MeshComponent {
    #[must_use]
    pub fn is_skinned(&self) -> bool {
        self.armature.is_valid()
    }
}

impl EntityRefs for MeshComponent {
    fn remap_entities(&mut self, map: &mut impl FnMut(Entity) -> Entity) {
        for subset in &mut self.subsets {
            subset.material = map(subset.material);
        }
        self.armature = map(self.armature);
    }
}

/// Placed instance of a mesh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectComponent {
    pub mesh: Entity,
    pub color: Vec4,
    pub cast_shadow: bool,
}

impl Default for ObjectComponent {
    fn default() -> Self {
        Self {
            mesh: Entity::INVALID,
            color: Vec4::ONE,
            cast_shadow: true,
        }
    }
}

impl EntityRefs for ObjectComponent {
    fn remap_entities(&mut self, map: &mut impl FnMut(Entity) -> Entity) {
        self.mesh = map(self.mesh);
    }
}

/// Opaque token issued by the physics engine. Never dereferenced here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PhysicsHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CollisionShape {
    Box { half_extents: Vec3 },
    Sphere { radius: f32 },
    Capsule { radius: f32, height: f32 },
}

impl Default for CollisionShape {
    fn default() -> Self {
        CollisionShape::Box {
            half_extents: Vec3::splat(0.5),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RigidBodyPhysicsComponent {
    pub shape: CollisionShape,
    pub mass: f32,
    pub friction: f32,
    pub restitution: f32,
    pub kinematic: bool,

    /// Set by the physics engine once the body exists there. Cleared whenever
    /// the component is copied, merged or reloaded so a stale body is never
    /// shared.
    #[serde(skip)]
    pub physics_handle: Option<PhysicsHandle>,
}

impl Default for RigidBodyPhysicsComponent {
    fn default() -> Self {
        Self {
            shape: CollisionShape::default(),
            mass: 1.0,
            friction: 0.5,
            restitution: 0.0,
            kinematic: false,
            physics_handle: None,
        }
    }
}

impl RigidBodyPhysicsComponent {
    pub fn invalidate_handle(&mut self) {
        self.physics_handle = None;
    }
}
