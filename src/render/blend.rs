use itertools::izip;

use crate::analysis::{formant, lerp, stft, vocoder};
use crate::error::MorphError;
use crate::synth::{ms_to_samples, semitones_to_ratio, EDGE_CROSSFADE_MS, FORMANT_BANDWIDTH_HZ, FORMANT_BOOST};
use crate::types::{linear_weight, FormantTrack, FrameGrid, MorphWarning, Signal, SpectralFrame, WeightCurve};

/// Knobs for one transition render: the four interpolation methods, the
/// shared weight curve, the formant reshaping constants, and the edge
/// crossfade into the adjoining steady material.
#[derive(Clone, Copy)]
pub struct TransitionConfig {
  pub pitch: bool,
  pub magnitude: bool,
  pub phase: bool,
  pub formant: bool,
  pub weight: WeightCurve,
  pub formant_bandwidth_hz: f32,
  pub formant_boost: f32,
  pub crossfade_ms: f32,
}

impl Default for TransitionConfig {
  fn default() -> Self {
    TransitionConfig {
      pitch: true,
      magnitude: true,
      phase: true,
      formant: true,
      weight: linear_weight,
      formant_bandwidth_hz: FORMANT_BANDWIDTH_HZ,
      formant_boost: FORMANT_BOOST,
      crossfade_ms: EDGE_CROSSFADE_MS,
    }
  }
}

/// Tile or trim a vowel sample to `n` samples.
fn fit_length(sample: &Signal, n: usize) -> Signal {
  let src = &sample.samples;
  let samples = (0..n).map(|i| src[i % src.len()]).collect();
  Signal::new(samples, sample.sample_rate)
}

/// Render the steady (non-transition) body of one segment: the vowel sample
/// looped or trimmed to `duration_ms`, pitch-shifted by the segment's
/// constant semitone offset. A zero offset skips the decompose/recompose
/// round trip entirely and stays bit-faithful to the source.
pub fn render_steady(
  sample: &Signal,
  pitch_offset: f32,
  duration_ms: f32,
  grid: &FrameGrid,
) -> (Signal, Vec<MorphWarning>) {
  let n = ms_to_samples(duration_ms, sample.sample_rate);
  let body = fit_length(sample, n);

  let ratio = semitones_to_ratio(pitch_offset);
  if (ratio - 1.0).abs() < 1e-6 {
    return (body, Vec::new());
  }

  let decomposition = vocoder::decompose(&body, grid);
  let contour = vec![ratio; decomposition.frame_count()];
  let (shifted, warnings) = vocoder::shift_pitch(&decomposition, &contour);
  (vocoder::recompose(&shifted), warnings)
}

/// Pitch stage of a transition: shift `signal` along a ratio contour running
/// `from` → `to` over its frames. An all-identity contour returns the input
/// unchanged.
fn shift_along(signal: &Signal, from: f32, to: f32, curve: WeightCurve, grid: &FrameGrid) -> (Signal, Vec<MorphWarning>) {
  if (from - 1.0).abs() < 1e-6 && (to - 1.0).abs() < 1e-6 {
    return (signal.clone(), Vec::new());
  }
  let decomposition = vocoder::decompose(signal, grid);
  let contour = vocoder::ratio_contour(from, to, decomposition.frame_count(), curve);
  let (shifted, warnings) = vocoder::shift_pitch(&decomposition, &contour);
  (vocoder::recompose(&shifted), warnings)
}

/// Weighted per-frame blend of two aligned spectral sequences. At `w = 0`
/// the output frame is A's; at `w = 1` it is B's. Phase blends linearly on
/// the raw values (not circularly) — a documented artifact source the
/// formant reshaping downstream was tuned against.
pub fn blend_spectra(
  spectra_a: &[SpectralFrame],
  spectra_b: &[SpectralFrame],
  config: &TransitionConfig,
) -> Vec<SpectralFrame> {
  let frame_count = spectra_a.len().min(spectra_b.len());
  (0..frame_count)
    .map(|f| {
      let t = if frame_count <= 1 { 0.0 } else { f as f32 / (frame_count - 1) as f32 };
      let w = (config.weight)(t);
      let a = &spectra_a[f];
      let b = &spectra_b[f];

      let magnitude = if config.magnitude {
        izip!(&a.magnitude, &b.magnitude).map(|(&ma, &mb)| lerp(ma, mb, w)).collect()
      } else {
        a.magnitude.clone()
      };
      let phase = if config.phase {
        izip!(&a.phase, &b.phase).map(|(&pa, &pb)| lerp(pa, pb, w)).collect()
      } else {
        a.phase.clone()
      };
      SpectralFrame { magnitude, phase }
    })
    .collect()
}

/// Replace empty frames with the nearest valid neighbor, scanning forward
/// then backward. No extrapolation is invented past the signal boundary: a
/// track with no valid frame at all stays empty.
fn hold_missing(track: &FormantTrack) -> Vec<Vec<f32>> {
  let mut frames = track.frames.clone();
  let mut last_valid: Option<Vec<f32>> = None;
  for frame in frames.iter_mut() {
    if frame.is_empty() {
      if let Some(held) = &last_valid {
        *frame = held.clone();
      }
    } else {
      last_valid = Some(frame.clone());
    }
  }
  let mut next_valid: Option<Vec<f32>> = None;
  for frame in frames.iter_mut().rev() {
    if frame.is_empty() {
      if let Some(held) = &next_valid {
        *frame = held.clone();
      }
    } else {
      next_valid = Some(frame.clone());
    }
  }
  frames
}

/// Index-wise interpolation of two resonance sets; an index one side lacks
/// holds the other side's value.
fn blend_formants(a: &[f32], b: &[f32], w: f32) -> Vec<f32> {
  let count = a.len().max(b.len());
  (0..count)
    .map(|j| match (a.get(j), b.get(j)) {
      (Some(&fa), Some(&fb)) => lerp(fa, fb, w),
      (Some(&fa), None) => fa,
      (None, Some(&fb)) => fb,
      (None, None) => unreachable!(),
    })
    .collect()
}

/// Boost each blended frame's magnitudes with a Gaussian bump at every
/// interpolated resonance, then rescale the frame back to its pre-reshape
/// energy so the boost moves spectral balance, not level.
pub fn reshape_formants(
  frames: &mut [SpectralFrame],
  track_a: &FormantTrack,
  track_b: &FormantTrack,
  grid: &FrameGrid,
  sample_rate: u32,
  config: &TransitionConfig,
) {
  let filled_a = hold_missing(track_a);
  let filled_b = hold_missing(track_b);
  let bin_hz = grid.bin_hz(sample_rate);
  let frame_count = frames.len();
  let bandwidth = config.formant_bandwidth_hz.max(1.0);

  for (f, frame) in frames.iter_mut().enumerate() {
    let t = if frame_count <= 1 { 0.0 } else { f as f32 / (frame_count - 1) as f32 };
    let w = (config.weight)(t);
    let empty = Vec::new();
    let resonances = blend_formants(
      filled_a.get(f).unwrap_or(&empty),
      filled_b.get(f).unwrap_or(&empty),
      w,
    );
    if resonances.is_empty() {
      continue;
    }

    let energy_before: f32 = frame.magnitude.iter().map(|m| m * m).sum();
    for (bin, magnitude) in frame.magnitude.iter_mut().enumerate() {
      let freq = bin as f32 * bin_hz;
      let mut gain = 1.0;
      for &resonance in &resonances {
        let z = (freq - resonance) / bandwidth;
        gain += config.formant_boost * (-0.5 * z * z).exp();
      }
      *magnitude *= gain;
    }
    let energy_after: f32 = frame.magnitude.iter().map(|m| m * m).sum();
    if energy_after > 1e-12 {
      let scale = (energy_before / energy_after).sqrt();
      for magnitude in frame.magnitude.iter_mut() {
        *magnitude *= scale;
      }
    }
  }
}

/// Render the morph between segment A's tail and segment B's head.
///
/// `a_tail` and `b_head` are equal-length spans of the two steady renders;
/// `semitone_delta` is B's pitch offset minus A's. Stages compose in fixed
/// order: pitch shift, spectral blend, formant reshape, inverse transform.
/// A zero-length span is a hard cut and returns an empty signal.
pub fn render_transition(
  a_tail: &Signal,
  b_head: &Signal,
  semitone_delta: f32,
  config: &TransitionConfig,
  grid: &FrameGrid,
) -> Result<(Signal, Vec<MorphWarning>), MorphError> {
  if a_tail.sample_rate != b_head.sample_rate {
    return Err(MorphError::SampleRateMismatch {
      left: a_tail.sample_rate,
      right: b_head.sample_rate,
    });
  }
  let n = a_tail.len().min(b_head.len());
  if n == 0 {
    return Ok((Signal::new(Vec::new(), a_tail.sample_rate), Vec::new()));
  }

  let mut warnings = Vec::new();

  // A glides from its own pitch toward B's; B starts at A's pitch and
  // settles into its own. Both follow the same progress curve.
  let ratio = semitones_to_ratio(semitone_delta);
  let (shifted_a, shifted_b) = if config.pitch {
    let (sa, mut wa) = shift_along(a_tail, 1.0, ratio, config.weight, grid);
    let (sb, mut wb) = shift_along(b_head, 1.0 / ratio, 1.0, config.weight, grid);
    warnings.append(&mut wa);
    warnings.append(&mut wb);
    (sa, sb)
  } else {
    (a_tail.clone(), b_head.clone())
  };

  let spectra_a = stft::analyze(&shifted_a, grid);
  let spectra_b = stft::analyze(&shifted_b, grid);
  let mut blended = blend_spectra(&spectra_a, &spectra_b, config);

  if config.formant {
    // Formant targets come from the pre-shift buffers; the reshape is what
    // carries vowel identity across the morph.
    let track_a = formant::extract(a_tail, grid);
    let track_b = formant::extract(b_head, grid);
    reshape_formants(&mut blended, &track_a, &track_b, grid, a_tail.sample_rate, config);
  }

  let signal = stft::synthesize(&blended, grid, a_tail.sample_rate, n);
  Ok((signal, warnings))
}

/// Length-preserving linear crossfades at both edges of a transition
/// buffer, against the steady material that occupies the same spans.
pub fn crossfade_edges(transition: &mut [f32], steady_before: &[f32], steady_after: &[f32], fade_len: usize) {
  let n = transition.len();
  let k = fade_len.min(n / 2).min(steady_before.len()).min(steady_after.len());
  if k == 0 {
    return;
  }
  for i in 0..k {
    let t = i as f32 / k as f32;
    transition[i] = lerp(steady_before[i], transition[i], t);
  }
  let after_offset = steady_after.len() - k;
  for i in 0..k {
    let t = (i + 1) as f32 / k as f32;
    let idx = n - k + i;
    transition[idx] = lerp(transition[idx], steady_after[after_offset + i], t);
  }
}
