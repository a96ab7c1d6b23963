//! Scene graph module
//!
//! Component types and the systems that update them:
//! - Transform: local SRT and resolved world matrix
//! - Hierarchy: weak parent links plus bind-time inverse parent matrix
//! - Armature: skin matrices and packed bone buffer
//! - Components: names, materials, meshes, objects, rigid bodies
//! - Scene: table owner, tick ordering, merge, serialization
//! - History: undo/redo snapshots and clipboard

pub mod armature;
pub mod commands;
pub mod components;
pub mod hierarchy;
pub mod history;
pub mod scene;
pub mod serialize;
pub mod settings;
pub mod transform;
pub mod transform_system;

// Re-export common types
pub use armature::{ArmatureComponent, ShaderBone};
pub use commands::{CommandSender, PendingMerge};
pub use components::{
    CollisionShape, MaterialComponent, MeshComponent, MeshSubset, NameComponent, ObjectComponent,
    PhysicsHandle, RigidBodyPhysicsComponent,
};
pub use hierarchy::HierarchyComponent;
pub use history::{Clipboard, PendingEdit, UndoHistory};
pub use scene::Scene;
pub use serialize::EntityRecord;
pub use settings::SceneSettings;
pub use transform::TransformComponent;
