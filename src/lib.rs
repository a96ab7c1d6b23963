#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod animation;
pub mod archive;
pub mod ecs;
pub mod errors;
pub mod scene;

pub use animation::{
    AnimationChannel, AnimationComponent, AnimationFlags, AnimationPath, AnimationSampler,
    SamplerMode,
};
pub use archive::Archive;
pub use ecs::{ComponentManager, Entity, EntityRefs, EntityRemap, create_entity, derive_entity};
pub use errors::{Result, SceneError};
pub use scene::{
    ArmatureComponent, Clipboard, HierarchyComponent, Scene, SceneSettings, TransformComponent,
    UndoHistory,
};
