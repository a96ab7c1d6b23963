use serde::{Deserialize, Serialize};

use crate::animation::values::Interpolatable;

/// How values between two keyframes are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SamplerMode {
    /// Lerp for vectors, normalized slerp for rotations.
    #[default]
    Linear,
    /// Hold the earlier keyframe until the next one is reached.
    Step,
}

const MAX_SCAN_OFFSET: usize = 3;

/// Last bracketing keyframe found for a channel.
///
/// Playback mostly moves forward by less than one keyframe per tick, so a short
/// linear scan from the cached index usually hits before falling back to a
/// binary search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyframeCursor {
    pub last_index: usize,
}

/// Finds `i` such that `times[i] <= time < times[i + 1]`, clamped to the
/// first and last keyframe. `times` must be non-empty and sorted.
pub fn find_keyframe(times: &[f32], time: f32, cursor: &mut KeyframeCursor) -> usize {
    let len = times.len();
    debug_assert!(len > 0);
    if len == 1 || time <= times[0] {
        cursor.last_index = 0;
        return 0;
    }
    if time >= times[len - 1] {
        cursor.last_index = len - 1;
        return len - 1;
    }

    let i = cursor.last_index.min(len - 1);

    let found = if time >= times[i] {
        // Forward
        (i..(i + MAX_SCAN_OFFSET).min(len - 1)).find(|&idx| time < times[idx + 1])
    } else {
        // Backward (loop wrap or scrubbing)
        (i.saturating_sub(MAX_SCAN_OFFSET)..i)
            .rev()
            .find(|&idx| time >= times[idx])
    };

    let index = found.unwrap_or_else(|| times.partition_point(|&t| t <= time).saturating_sub(1));
    cursor.last_index = index;
    index
}

/// Samples a flat keyframe stream at `time`.
///
/// Returns `None` when there is not a single complete keyframe. Only the
/// keyframes backed by both a time and a full value are considered, so a
/// truncated value array never reads out of bounds. Outside the keyframe range
/// the first or last value is held.
pub fn sample<T: Interpolatable>(
    times: &[f32],
    values: &[f32],
    mode: SamplerMode,
    time: f32,
    cursor: &mut KeyframeCursor,
) -> Option<T> {
    let keys = times.len().min(values.len() / T::STRIDE);
    if keys == 0 {
        return None;
    }
    let times = &times[..keys];

    let index = find_keyframe(times, time, cursor);
    if index + 1 >= keys {
        return Some(T::read(values, index));
    }

    match mode {
        SamplerMode::Step => Some(T::read(values, index)),
        SamplerMode::Linear => {
            let t0 = times[index];
            let t1 = times[index + 1];
            let dt = t1 - t0;
            let t = if dt > 1e-6 { (time - t0) / dt } else { 0.0 };
            Some(T::interpolate_linear(
                T::read(values, index),
                T::read(values, index + 1),
                t.clamp(0.0, 1.0),
            ))
        }
    }
}
