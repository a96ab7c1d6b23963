//! Keyframe Animation
//!
//! - [`AnimationComponent`]: playback state plus channels and samplers
//! - [`tracks`]: bracketing keyframe search and interpolation over flat arrays
//! - [`run_animation_update`]: advances playing animations and writes into
//!   target transforms (first system of the tick)

pub mod component;
pub mod system;
pub mod tracks;
pub mod values;

pub use component::{
    AnimationChannel, AnimationComponent, AnimationFlags, AnimationPath, AnimationSampler,
};
pub use system::run_animation_update;
pub use tracks::{KeyframeCursor, SamplerMode};
pub use values::Interpolatable;
