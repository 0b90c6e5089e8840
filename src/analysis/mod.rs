pub mod formant;
pub mod sampler;
pub mod stft;
pub mod vocoder;

/// Linear interpolation between `a` and `b` at `t` in [0, 1].
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
  a + (b - a) * t
}
