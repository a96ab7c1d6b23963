use bitflags::bitflags;
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::animation::tracks::{KeyframeCursor, SamplerMode, sample};
use crate::animation::values::Interpolatable;
use crate::ecs::{ComponentManager, Entity, EntityRefs};
use crate::scene::transform::TransformComponent;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct AnimationFlags: u32 {
        const PLAYING = 1 << 0;
        const LOOPED = 1 << 1;
    }
}

/// Transform field a channel drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnimationPath {
    Translation,
    /// Keyframes are stored as `x, y, z, w` quaternions.
    Rotation,
    Scale,
}

impl AnimationPath {
    /// Floats per keyframe in a sampler driving this path.
    #[must_use]
    pub const fn stride(self) -> usize {
        match self {
            AnimationPath::Translation | AnimationPath::Scale => 3,
            AnimationPath::Rotation => 4,
        }
    }
}

/// Keyframe data: parallel `times` and flat `values` arrays.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnimationSampler {
    pub mode: SamplerMode,
    pub times: Vec<f32>,
    pub values: Vec<f32>,
}

impl AnimationSampler {
    #[must_use]
    pub fn new(mode: SamplerMode, times: Vec<f32>, values: Vec<f32>) -> Self {
        Self {
            mode,
            times,
            values,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Time span covered by the keyframes, `None` when empty.
    #[must_use]
    pub fn time_range(&self) -> Option<(f32, f32)> {
        Some((*self.times.first()?, *self.times.last()?))
    }
}

/// Binds one sampler to one transform field of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationChannel {
    pub target: Entity,
    pub path: AnimationPath,
    pub sampler_index: usize,

    #[serde(skip)]
    cursor: KeyframeCursor,
}

impl AnimationChannel {
    #[must_use]
    pub fn new(target: Entity, path: AnimationPath, sampler_index: usize) -> Self {
        Self {
            target,
            path,
            sampler_index,
            cursor: KeyframeCursor::default(),
        }
    }
}

/// Keyframe animation over `[start, end]`.
///
/// Stopped unless [`PLAYING`](AnimationFlags::PLAYING) is set. While playing,
/// each tick advances `timer` by `dt * speed` and samples every channel into
/// its target transform.
///
/// `amount` blends the sampled value with the target's current local value:
/// 1.0 overwrites it, 0.0 leaves it untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationComponent {
    pub start: f32,
    pub end: f32,
    pub timer: f32,
    pub speed: f32,
    pub amount: f32,
    pub flags: AnimationFlags,
    pub channels: Vec<AnimationChannel>,
    pub samplers: Vec<AnimationSampler>,
}

impl Default for AnimationComponent {
    fn default() -> Self {
        Self {
            start: 0.0,
            end: 0.0,
            timer: 0.0,
            speed: 1.0,
            amount: 1.0,
            flags: AnimationFlags::empty(),
            channels: Vec::new(),
            samplers: Vec::new(),
        }
    }
}

impl AnimationComponent {
    /// Builds a stopped animation and derives `[start, end]` from the sampler
    /// keyframes.
    #[must_use]
    pub fn new(channels: Vec<AnimationChannel>, samplers: Vec<AnimationSampler>) -> Self {
        let mut animation = Self {
            channels,
            samplers,
            ..Self::default()
        };
        animation.fit_range_to_samplers();
        animation
    }

    /// Sets `[start, end]` to the union of all sampler time ranges and rewinds.
    pub fn fit_range_to_samplers(&mut self) {
        let range = self
            .samplers
            .iter()
            .filter_map(AnimationSampler::time_range)
            .reduce(|(a0, a1), (b0, b1)| (a0.min(b0), a1.max(b1)));
        let (start, end) = range.unwrap_or((0.0, 0.0));
        self.start = start;
        self.end = end;
        self.timer = start;
    }

    // ========================================================================
    // Playback state
    // ========================================================================

    pub fn play(&mut self) {
        self.flags.insert(AnimationFlags::PLAYING);
    }

    /// Stops playback and keeps the current time.
    pub fn pause(&mut self) {
        self.flags.remove(AnimationFlags::PLAYING);
    }

    /// Stops playback and resets the timer to 0.
    pub fn stop(&mut self) {
        self.pause();
        self.timer = 0.0;
    }

    pub fn set_looped(&mut self, looped: bool) {
        self.flags.set(AnimationFlags::LOOPED, looped);
    }

    #[inline]
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.flags.contains(AnimationFlags::PLAYING)
    }

    #[inline]
    #[must_use]
    pub fn is_looped(&self) -> bool {
        self.flags.contains(AnimationFlags::LOOPED)
    }

    #[inline]
    #[must_use]
    pub fn duration(&self) -> f32 {
        (self.end - self.start).max(0.0)
    }

    /// Advances the timer by `dt * speed`.
    ///
    /// Past either end of the range a looped animation wraps back into
    /// `[start, end]`; any other animation clamps to the boundary and stops.
    /// Returns whether the channels must be sampled this tick, which is every
    /// tick that began in the playing state.
    pub fn advance(&mut self, dt: f32) -> bool {
        if !self.is_playing() {
            return false;
        }

        self.timer += dt * self.speed;

        if self.timer < self.start && self.speed >= 0.0 {
            // Below the range after `stop()`: play from the first key
            self.timer = self.start;
        } else if self.timer > self.end || self.timer < self.start {
            let duration = self.duration();
            if self.is_looped() && duration > 0.0 {
                self.timer = self.start + (self.timer - self.start).rem_euclid(duration);
            } else if self.is_looped() {
                self.timer = self.start;
            } else {
                self.timer = self.timer.clamp(self.start, self.end.max(self.start));
                self.pause();
            }
        }

        true
    }

    // ========================================================================
    // Sampling
    // ========================================================================

    /// Writes every channel's value at `time` into its target transform,
    /// blended by `amount`.
    ///
    /// Channels whose sampler index is out of range, whose sampler has no
    /// keyframes, or whose target has no transform are skipped.
    pub fn sample_at(&mut self, time: f32, transforms: &mut ComponentManager<TransformComponent>) {
        let amount = self.amount.clamp(0.0, 1.0);
        for channel in &mut self.channels {
            let Some(sampler) = self.samplers.get(channel.sampler_index) else {
                continue;
            };
            let Some(target) = transforms.get_mut(channel.target) else {
                continue;
            };

            let (times, values, mode) = (&sampler.times, &sampler.values, sampler.mode);
            let cursor = &mut channel.cursor;
            match channel.path {
                AnimationPath::Translation => {
                    if let Some(v) = sample::<Vec3>(times, values, mode, time, cursor) {
                        target.set_translation(blend(target.translation_local, v, amount));
                    }
                }
                AnimationPath::Rotation => {
                    if let Some(q) = sample::<Quat>(times, values, mode, time, cursor) {
                        target.set_rotation(blend(target.rotation_local, q, amount));
                    }
                }
                AnimationPath::Scale => {
                    if let Some(v) = sample::<Vec3>(times, values, mode, time, cursor) {
                        target.set_scale(blend(target.scale_local, v, amount));
                    }
                }
            }
        }
    }
}

#[inline]
fn blend<T: Interpolatable>(current: T, sampled: T, amount: f32) -> T {
    if amount >= 1.0 {
        sampled
    } else {
        T::interpolate_linear(current, sampled, amount)
    }
}

impl EntityRefs for AnimationComponent {
    fn remap_entities(&mut self, map: &mut impl FnMut(Entity) -> Entity) {
        for channel in &mut self.channels {
            channel.target = map(channel.target);
        }
    }
}
