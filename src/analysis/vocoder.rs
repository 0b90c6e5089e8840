use itertools::izip;
use rand::Rng;
use rayon::prelude::*;
use rustfft::num_complex::Complex;

use crate::analysis::stft;
use crate::synth::{
  pi2, rms, APERIODICITY_BANDS, F0_CEIL_HZ, F0_FLOOR_HZ, PITCH_MAX_HZ, PITCH_MIN_HZ, RMS_GATE, VOICING_THRESHOLD,
};
use crate::types::{Decomposition, FrameGrid, MorphWarning, Signal, SpectralFrame, WeightCurve};

/// Gain of the noise excitation relative to the harmonic excitation.
const NOISE_GAIN: f32 = 0.25;

/// Fundamental frequency estimate for one frame: `(f0_hz, voicing)` where
/// voicing is the normalized autocorrelation peak in [0, 1]. Returns
/// `(0, 0)` below the silence gate or when no period clears the voicing
/// threshold.
///
/// Octave robustness: every candidate period within 90% of the best
/// correlation competes, and the shortest wins, so a harmonically rich
/// frame does not lock onto double or triple the true period.
fn frame_f0(frame: &[f32], sample_rate: u32) -> (f32, f32) {
  if rms(frame) < RMS_GATE {
    return (0.0, 0.0);
  }

  let min_period = (sample_rate as f32 / F0_CEIL_HZ).floor() as usize;
  let max_period = (sample_rate as f32 / F0_FLOOR_HZ).ceil() as usize;
  let support = frame.len().min(max_period * 2);
  if support <= max_period || min_period < 2 {
    return (0.0, 0.0);
  }

  let mut scores = vec![0.0f32; max_period + 2];
  for period in min_period..=max_period {
    let n = support - period;
    let mut corr = 0.0f64;
    let mut e0 = 0.0f64;
    let mut e1 = 0.0f64;
    for i in 0..n {
      let a = frame[i] as f64;
      let b = frame[i + period] as f64;
      corr += a * b;
      e0 += a * a;
      e1 += b * b;
    }
    let denom = (e0 * e1).sqrt();
    if denom > 1e-12 {
      scores[period] = (corr / denom) as f32;
    }
  }

  // Candidate periods are local maxima of the correlation curve only;
  // slopes leading into a peak must not shortcut the 90% rule.
  let peaks: Vec<usize> = (min_period..=max_period)
    .filter(|&p| scores[p] >= scores[p - 1] && scores[p] >= scores[p + 1])
    .collect();
  let best = peaks.iter().map(|&p| scores[p]).fold(0.0f32, f32::max);
  if best < VOICING_THRESHOLD {
    return (0.0, 0.0);
  }

  let period = peaks
    .iter()
    .copied()
    .find(|&p| scores[p] >= best * 0.9)
    .unwrap_or(max_period);

  // Parabolic refinement around the integer period.
  let mut refined = period as f32;
  if period > min_period && period < max_period {
    let (a, b, c) = (scores[period - 1], scores[period], scores[period + 1]);
    let denom = a - 2.0 * b + c;
    if denom.abs() > 1e-9 {
      refined += 0.5 * (a - c) / denom;
    }
  }

  (sample_rate as f32 / refined, scores[period].clamp(0.0, 1.0))
}

/// Smooth a magnitude spectrum into a pitch-independent envelope by moving
/// average over a span matched to the harmonic spacing (one f0 on either
/// side), so individual harmonic peaks flatten into the timbre curve.
fn smooth_envelope(magnitude: &[f32], f0: f32, bin_hz: f32) -> Vec<f32> {
  let half_width = if f0 > 0.0 {
    (f0 / bin_hz).round() as usize
  } else {
    (100.0 / bin_hz).round() as usize
  }
  .max(2);

  let bins = magnitude.len();
  (0..bins)
    .map(|k| {
      let lo = k.saturating_sub(half_width);
      let hi = (k + half_width + 1).min(bins);
      magnitude[lo..hi].iter().sum::<f32>() / (hi - lo) as f32
    })
    .collect()
}

/// Estimate f0 contour, spectral envelope, and banded aperiodicity on the
/// shared frame grid. Frame `f` of every field describes the same samples
/// as STFT frame `f` of the same signal.
pub fn decompose(signal: &Signal, grid: &FrameGrid) -> Decomposition {
  let frame_count = grid.frame_count(signal.len());
  let bin_hz = grid.bin_hz(signal.sample_rate);
  let spectra = stft::analyze(signal, grid);

  let pitch: Vec<(f32, f32)> = (0..frame_count)
    .into_par_iter()
    .map(|f| {
      let start = f * grid.hop_size;
      let end = (start + grid.window_size).min(signal.len());
      frame_f0(&signal.samples[start..end], signal.sample_rate)
    })
    .collect();

  let mut f0 = Vec::with_capacity(frame_count);
  let mut envelope = Vec::with_capacity(frame_count);
  let mut aperiodicity = Vec::with_capacity(frame_count);

  for ((hz, voicing), frame) in pitch.iter().zip(spectra.iter()) {
    f0.push(*hz);
    envelope.push(smooth_envelope(&frame.magnitude, *hz, bin_hz));
    let noise_ratio = if *hz > 0.0 { (1.0 - voicing).clamp(0.0, 1.0) } else { 1.0 };
    aperiodicity.push(vec![noise_ratio; APERIODICITY_BANDS]);
  }

  Decomposition {
    f0,
    envelope,
    aperiodicity,
    grid: *grid,
    sample_rate: signal.sample_rate,
    len: signal.len(),
  }
}

/// Scale each voiced frame's f0 by the aligned ratio, clamping into the
/// audible bound and recording a warning per clamped frame. Unvoiced frames
/// (f0 = 0) pass through untouched. The contour must cover every frame;
/// shorter contours hold their last value.
pub fn shift_pitch(decomposition: &Decomposition, ratio_contour: &[f32]) -> (Decomposition, Vec<MorphWarning>) {
  let mut shifted = decomposition.clone();
  let mut warnings = Vec::new();

  for (frame, hz) in shifted.f0.iter_mut().enumerate() {
    if *hz <= 0.0 {
      continue;
    }
    let ratio = ratio_contour
      .get(frame)
      .or(ratio_contour.last())
      .copied()
      .unwrap_or(1.0);
    let requested = *hz * ratio;
    let clamped = requested.clamp(PITCH_MIN_HZ, PITCH_MAX_HZ);
    if (clamped - requested).abs() > f32::EPSILON {
      warnings.push(MorphWarning::PitchOutOfRange {
        frame,
        requested_hz: requested,
        clamped_hz: clamped,
      });
    }
    *hz = clamped;
  }

  (shifted, warnings)
}

/// Per-frame ratio contour for a transition: linear from `from` to `to`,
/// evaluated at the weight curve's normalized progress, one entry per
/// analysis frame.
pub fn ratio_contour(from: f32, to: f32, frame_count: usize, curve: WeightCurve) -> Vec<f32> {
  (0..frame_count)
    .map(|f| {
      let t = if frame_count <= 1 { 0.0 } else { f as f32 / (frame_count - 1) as f32 };
      from + (to - from) * curve(t)
    })
    .collect()
}

fn band_at(bands: &[f32], bin: usize, bins: usize) -> f32 {
  if bands.is_empty() {
    return 1.0;
  }
  let idx = bin * bands.len() / bins.max(1);
  bands[idx.min(bands.len() - 1)]
}

/// Resynthesize a time-domain signal from a (possibly modified)
/// decomposition.
///
/// Each voiced frame gets a harmonic spectrum sampled from the stored
/// envelope at multiples of f0, weighted by `1 - aperiodicity`, plus a
/// noise spectrum with random phase weighted by aperiodicity. Harmonic
/// phase advances with the running f0 so adjacent frames stay coherent
/// through overlap-add; that accumulation is order-dependent and stays
/// serial, while the per-frame spectra build in parallel.
pub fn recompose(decomposition: &Decomposition) -> Signal {
  let grid = decomposition.grid;
  let bins = grid.bins();
  let bin_hz = grid.bin_hz(decomposition.sample_rate);
  let nyquist = decomposition.sample_rate as f32 / 2.0;
  let hop_seconds = grid.hop_size as f32 / decomposition.sample_rate as f32;
  let frame_count = decomposition.frame_count();

  // Cumulative fundamental phase at the start of each frame.
  let mut base_phase = vec![0.0f32; frame_count];
  for f in 1..frame_count {
    base_phase[f] = (base_phase[f - 1] + pi2 * decomposition.f0[f - 1] * hop_seconds) % pi2;
  }

  let frames: Vec<SpectralFrame> = izip!(&decomposition.f0, &decomposition.envelope, &decomposition.aperiodicity, &base_phase)
    .collect::<Vec<_>>()
    .into_par_iter()
    .map(|(&f0, envelope, bands, &phase0)| {
      let mut rng = rand::thread_rng();
      let mut spectrum = vec![Complex::new(0.0f32, 0.0f32); bins];

      if f0 > 0.0 {
        let mut h = 1usize;
        loop {
          let freq = f0 * h as f32;
          if freq >= nyquist {
            break;
          }
          let bin = (freq / bin_hz).round() as usize;
          if bin >= bins {
            break;
          }
          let periodic = envelope[bin] * (1.0 - band_at(bands, bin, bins));
          let phase = (phase0 * h as f32) % pi2;
          spectrum[bin] += Complex::from_polar(periodic, phase);
          h += 1;
        }
      }

      for (bin, value) in spectrum.iter_mut().enumerate() {
        let noise = envelope.get(bin).copied().unwrap_or(0.0) * band_at(bands, bin, bins) * NOISE_GAIN;
        if noise > 0.0 {
          let phase = rng.gen_range(0.0..pi2);
          *value += Complex::from_polar(noise, phase);
        }
      }

      SpectralFrame {
        magnitude: spectrum.iter().map(|c| c.norm()).collect(),
        phase: spectrum.iter().map(|c| c.arg()).collect(),
      }
    })
    .collect();

  stft::synthesize(&frames, &grid, decomposition.sample_rate, decomposition.len)
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::synth::{HOP_SIZE, WINDOW_SIZE};

  fn sine(freq: f32, sample_rate: u32, len: usize) -> Signal {
    let samples = (0..len).map(|i| (pi2 * freq * i as f32 / sample_rate as f32).sin() * 0.5).collect();
    Signal::new(samples, sample_rate)
  }

  fn test_grid() -> FrameGrid {
    FrameGrid::new(WINDOW_SIZE, HOP_SIZE).unwrap()
  }

  #[test]
  fn test_frame_f0_finds_sine_frequency() {
    let signal = sine(261.0, 44100, 4096);
    let (hz, voicing) = frame_f0(&signal.samples[..2048], 44100);
    assert!((hz - 261.0).abs() < 261.0 * 0.03, "estimated {} Hz", hz);
    assert!(voicing > 0.8);
  }

  #[test]
  fn test_frame_f0_silence_is_unvoiced() {
    let silence = vec![0.0f32; 2048];
    assert_eq!(frame_f0(&silence, 44100), (0.0, 0.0));
  }

  #[test]
  fn test_decompose_field_lengths_match_grid() {
    let grid = test_grid();
    let signal = sine(261.0, 44100, 22050);
    let d = decompose(&signal, &grid);
    let expected = grid.frame_count(signal.len());
    assert_eq!(d.f0.len(), expected);
    assert_eq!(d.envelope.len(), expected);
    assert_eq!(d.aperiodicity.len(), expected);
    assert_eq!(d.envelope[0].len(), grid.bins());
    assert_eq!(d.aperiodicity[0].len(), APERIODICITY_BANDS);
  }

  fn manual_decomposition() -> Decomposition {
    let grid = test_grid();
    Decomposition {
      f0: vec![200.0, 0.0, 300.0, 400.0],
      envelope: vec![vec![0.0; grid.bins()]; 4],
      aperiodicity: vec![vec![0.5; APERIODICITY_BANDS]; 4],
      grid,
      sample_rate: 44100,
      len: 4 * grid.hop_size,
    }
  }

  #[test]
  fn test_constant_ratio_scales_voiced_frames_exactly() {
    let d = manual_decomposition();
    let (shifted, warnings) = shift_pitch(&d, &vec![1.5; 4]);
    assert_eq!(shifted.f0, vec![300.0, 0.0, 450.0, 600.0]);
    assert!(warnings.is_empty());
  }

  #[test]
  fn test_out_of_range_shift_clamps_and_warns() {
    let d = manual_decomposition();
    let (shifted, warnings) = shift_pitch(&d, &vec![30.0; 4]);
    assert_eq!(shifted.f0[0], PITCH_MAX_HZ);
    assert_eq!(shifted.f0[1], 0.0);
    assert_eq!(warnings.len(), 3);
    assert_eq!(
      warnings[0],
      MorphWarning::PitchOutOfRange {
        frame: 0,
        requested_hz: 6000.0,
        clamped_hz: PITCH_MAX_HZ
      }
    );
  }

  #[test]
  fn test_downward_clamp() {
    let d = manual_decomposition();
    let (shifted, warnings) = shift_pitch(&d, &vec![0.01; 4]);
    assert!(shifted.f0.iter().all(|&hz| hz == 0.0 || hz >= PITCH_MIN_HZ));
    assert_eq!(warnings.len(), 3);
  }

  #[test]
  fn test_ratio_contour_endpoints() {
    let contour = ratio_contour(1.0, 2.0, 5, crate::types::linear_weight);
    assert_eq!(contour.len(), 5);
    assert!((contour[0] - 1.0).abs() < 1e-6);
    assert!((contour[4] - 2.0).abs() < 1e-6);
    assert!((contour[2] - 1.5).abs() < 1e-6);
  }

  #[test]
  fn test_recompose_octave_shift_moves_pitch() {
    let grid = test_grid();
    let sample_rate = 44100;
    let signal = sine(261.0, sample_rate, 22050);
    let d = decompose(&signal, &grid);
    let (shifted, warnings) = shift_pitch(&d, &vec![2.0; d.frame_count()]);
    assert!(warnings.is_empty());

    let rebuilt = recompose(&shifted);
    assert_eq!(rebuilt.len(), signal.len());

    let mid = rebuilt.len() / 2;
    let (hz, _) = frame_f0(&rebuilt.samples[mid..mid + 2048], sample_rate);
    assert!((hz - 522.0).abs() < 522.0 * 0.1, "estimated {} Hz after shift", hz);
  }
}
