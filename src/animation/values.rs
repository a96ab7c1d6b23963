use glam::{Quat, Vec3};

/// A keyframe value that can be read from a flat `f32` stream and blended.
pub trait Interpolatable: Copy + Sized {
    /// Number of floats one keyframe occupies in the flat value array.
    const STRIDE: usize;

    /// Reads the value stored at keyframe `index`. `values` must hold at least
    /// `(index + 1) * STRIDE` floats.
    fn read(values: &[f32], index: usize) -> Self;

    fn interpolate_linear(start: Self, end: Self, t: f32) -> Self;
}

impl Interpolatable for Vec3 {
    const STRIDE: usize = 3;

    fn read(values: &[f32], index: usize) -> Self {
        Vec3::from_slice(&values[index * 3..index * 3 + 3])
    }

    fn interpolate_linear(start: Self, end: Self, t: f32) -> Self {
        start.lerp(end, t)
    }
}

impl Interpolatable for Quat {
    const STRIDE: usize = 4;

    // Stored as x, y, z, w
    fn read(values: &[f32], index: usize) -> Self {
        Quat::from_slice(&values[index * 4..index * 4 + 4])
    }

    fn interpolate_linear(start: Self, end: Self, t: f32) -> Self {
        start.slerp(end, t).normalize()
    }
}
