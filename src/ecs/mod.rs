//! Entity-Component Storage
//!
//! - [`Entity`]: opaque row key, issued by [`create_entity`]
//! - [`ComponentManager`]: dense struct-of-arrays table keyed by entity
//! - [`derive_entity`]: pure `(seed, id) -> id` mapping used by seeded
//!   serialization (duplicate, paste, undo/redo)
//! - [`EntityRefs`] / [`EntityRemap`]: rewriting of entity-valued fields on merge

pub mod component_manager;
pub mod entity;

pub use component_manager::ComponentManager;
pub use entity::{Entity, EntityRefs, EntityRemap, create_entity, derive_entity};
