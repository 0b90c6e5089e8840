//! Engine-wide constants for the vowel morphing pipeline.
//!
//! Frequencies are in Hz, durations in milliseconds unless noted.
//! The reference pitch is middle C; segment offsets are semitones from it.

pub const pi: f32 = std::f32::consts::PI;
pub const pi2: f32 = pi * 2f32;

/// Reference pitch for segment offsets (middle C).
pub const REFERENCE_PITCH_HZ: f32 = 261.0;

// Fundamental-frequency search range for voiced frames.
pub const F0_FLOOR_HZ: f32 = 50.0;
pub const F0_CEIL_HZ: f32 = 800.0;

// Hard bounds for shifted f0. Values past these are clamped and reported
// as warnings; resynthesis outside this range is unstable.
pub const PITCH_MIN_HZ: f32 = 20.0;
pub const PITCH_MAX_HZ: f32 = 5000.0;

/// Default analysis window length in samples.
pub const WINDOW_SIZE: usize = 2048;
/// Default hop between analysis frames (75% overlap).
pub const HOP_SIZE: usize = 512;

/// Number of resonance estimates tracked per frame.
pub const FORMANT_COUNT: usize = 5;
/// Lowest admissible formant frequency.
pub const FORMANT_FLOOR_HZ: f32 = 90.0;
/// Highest admissible formant frequency.
pub const FORMANT_CEIL_HZ: f32 = 5000.0;
/// Linear-prediction order for formant envelope fitting.
pub const LPC_ORDER: usize = 12;
/// First-order pre-emphasis coefficient applied before LPC.
pub const PREEMPH_COEF: f32 = 0.97;

/// Bandwidth of the Gaussian bump applied at each interpolated formant.
pub const FORMANT_BANDWIDTH_HZ: f32 = 50.0;
/// Gain of each formant bump relative to the blended spectrum.
pub const FORMANT_BOOST: f32 = 1.0;

/// Frames with RMS below this are treated as silent.
pub const RMS_GATE: f32 = 1e-4;
/// Minimum normalized correlation for a frame to count as voiced.
pub const VOICING_THRESHOLD: f32 = 0.3;

/// Number of aperiodicity bands stored per frame.
pub const APERIODICITY_BANDS: usize = 5;

/// Edge crossfade between a transition and its adjoining steady material.
pub const EDGE_CROSSFADE_MS: f32 = 10.0;

pub fn ms_to_samples(ms: f32, sample_rate: u32) -> usize {
  ((ms / 1000.0) * sample_rate as f32).round() as usize
}

/// Ratio between two pitches expressed as a semitone distance.
pub fn semitones_to_ratio(semitones: f32) -> f32 {
  2f32.powf(semitones / 12.0)
}

/// Root mean square level of a buffer.
pub fn rms(samples: &[f32]) -> f32 {
  if samples.is_empty() {
    return 0.0;
  }
  let sum: f32 = samples.iter().map(|s| s * s).sum();
  (sum / samples.len() as f32).sqrt()
}
