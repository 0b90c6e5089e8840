use biquad::{Biquad, Coefficients, DirectForm1, ToHertz, Type as FilterType, Q_BUTTERWORTH_F32};
use rayon::prelude::*;

use crate::synth::{pi2, rms, FORMANT_CEIL_HZ, FORMANT_COUNT, FORMANT_FLOOR_HZ, LPC_ORDER, PREEMPH_COEF, RMS_GATE};
use crate::types::{FormantTrack, FrameGrid, Signal};

/// Resolution of the LPC envelope sweep used for peak picking.
const ENVELOPE_POINTS: usize = 512;

/// Butterworth low-pass at the formant ceiling. Poles of the LPC fit land
/// where the energy is, so everything above the tracked band is removed
/// first.
fn lowpass(samples: &[f32], sample_rate: u32, cutoff_hz: f32) -> Vec<f32> {
  let nyquist = sample_rate as f32 / 2.0;
  if cutoff_hz >= nyquist {
    return samples.to_vec();
  }
  let coeffs = match Coefficients::<f32>::from_params(
    FilterType::LowPass,
    (sample_rate as f32).hz(),
    cutoff_hz.hz(),
    Q_BUTTERWORTH_F32,
  ) {
    Ok(c) => c,
    Err(_) => return samples.to_vec(),
  };
  let mut filter = DirectForm1::<f32>::new(coeffs);
  samples.iter().map(|&s| filter.run(s)).collect()
}

fn preemphasis(samples: &[f32]) -> Vec<f32> {
  let mut out = Vec::with_capacity(samples.len());
  let mut prev = 0.0f32;
  for &s in samples {
    out.push(s - PREEMPH_COEF * prev);
    prev = s;
  }
  out
}

fn hamming(size: usize) -> Vec<f32> {
  (0..size).map(|i| 0.54 - 0.46 * (pi2 * i as f32 / (size - 1) as f32).cos()).collect()
}

/// Levinson-Durbin recursion: autocorrelation in, prediction coefficients
/// out (a[0] is always 1). Returns None when the frame carries no energy or
/// the recursion goes unstable.
fn levinson_durbin(autocorr: &[f64], order: usize) -> Option<Vec<f64>> {
  if autocorr[0] <= 0.0 {
    return None;
  }

  let mut a = vec![0.0f64; order + 1];
  a[0] = 1.0;
  let mut error = autocorr[0];

  for i in 1..=order {
    let mut lambda = autocorr[i];
    for j in 1..i {
      lambda += a[j] * autocorr[i - j];
    }
    if error.abs() < 1e-12 {
      return None;
    }
    let reflection = -lambda / error;

    for j in 0..=i / 2 {
      let tmp = a[j] + reflection * a[i - j];
      a[i - j] += reflection * a[j];
      if j != i - j {
        a[j] = tmp;
      }
    }
    a[i] = reflection;

    error *= 1.0 - reflection * reflection;
    if error <= 0.0 {
      return None;
    }
  }

  Some(a)
}

/// LPC magnitude response `1 / |A(e^{-j w})|` at one frequency.
fn lpc_response(coeffs: &[f64], freq_hz: f32, sample_rate: u32) -> f64 {
  let omega = pi2 as f64 * freq_hz as f64 / sample_rate as f64;
  let mut re = 0.0f64;
  let mut im = 0.0f64;
  for (k, &a) in coeffs.iter().enumerate() {
    re += a * (omega * k as f64).cos();
    im -= a * (omega * k as f64).sin();
  }
  let denom = (re * re + im * im).sqrt();
  if denom < 1e-12 {
    0.0
  } else {
    1.0 / denom
  }
}

/// Resonances of one pre-processed frame: peaks of the LPC envelope between
/// the formant floor and ceiling, at most `FORMANT_COUNT`, ascending by
/// frequency.
fn frame_formants(frame: &[f32], sample_rate: u32) -> Vec<f32> {
  let window = hamming(frame.len());
  let windowed: Vec<f64> = frame.iter().zip(window.iter()).map(|(s, w)| (s * w) as f64).collect();

  let mut autocorr = vec![0.0f64; LPC_ORDER + 1];
  for (lag, r) in autocorr.iter_mut().enumerate() {
    for i in 0..windowed.len() - lag {
      *r += windowed[i] * windowed[i + lag];
    }
  }

  let coeffs = match levinson_durbin(&autocorr, LPC_ORDER) {
    Some(c) => c,
    None => return Vec::new(),
  };

  let step = FORMANT_CEIL_HZ / ENVELOPE_POINTS as f32;
  let envelope: Vec<f64> = (0..=ENVELOPE_POINTS)
    .map(|i| lpc_response(&coeffs, i as f32 * step, sample_rate))
    .collect();

  let mut formants = Vec::new();
  for i in 1..ENVELOPE_POINTS {
    let freq = i as f32 * step;
    if freq < FORMANT_FLOOR_HZ {
      continue;
    }
    if envelope[i] > envelope[i - 1] && envelope[i] >= envelope[i + 1] {
      formants.push(freq);
      if formants.len() == FORMANT_COUNT {
        break;
      }
    }
  }
  formants
}

/// Per-frame resonance estimates on the shared grid.
///
/// The signal is low-passed at the formant ceiling and pre-emphasized once;
/// each frame is then fit with an order-12 all-pole model and peak-picked.
/// Frames under the silence gate report no resonances; downstream blending
/// holds the nearest valid neighbor instead.
pub fn extract(signal: &Signal, grid: &FrameGrid) -> FormantTrack {
  let frame_count = grid.frame_count(signal.len());
  if frame_count == 0 {
    return FormantTrack::default();
  }

  let filtered = lowpass(&signal.samples, signal.sample_rate, FORMANT_CEIL_HZ);
  let emphasized = preemphasis(&filtered);

  let frames: Vec<Vec<f32>> = (0..frame_count)
    .into_par_iter()
    .map(|f| {
      let start = f * grid.hop_size;
      let end = (start + grid.window_size).min(emphasized.len());
      let frame = &emphasized[start..end];
      if frame.len() < LPC_ORDER * 2 || rms(frame) < RMS_GATE {
        return Vec::new();
      }
      frame_formants(frame, signal.sample_rate)
    })
    .collect();

  FormantTrack { frames }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::synth::{HOP_SIZE, WINDOW_SIZE};

  fn vowel_like(sample_rate: u32, len: usize) -> Signal {
    // Fundamental plus two strong resonances, roughly an /a/ shape.
    let samples = (0..len)
      .map(|i| {
        let t = i as f32 / sample_rate as f32;
        0.3 * (pi2 * 150.0 * t).sin() + 0.5 * (pi2 * 700.0 * t).sin() + 0.4 * (pi2 * 1200.0 * t).sin()
      })
      .collect();
    Signal::new(samples, sample_rate)
  }

  #[test]
  fn test_track_covers_every_frame() {
    let grid = FrameGrid::new(WINDOW_SIZE, HOP_SIZE).unwrap();
    let signal = vowel_like(44100, 22050);
    let track = extract(&signal, &grid);
    assert_eq!(track.frame_count(), grid.frame_count(signal.len()));
  }

  #[test]
  fn test_resonances_near_spectral_peaks() {
    let grid = FrameGrid::new(WINDOW_SIZE, HOP_SIZE).unwrap();
    let signal = vowel_like(44100, 22050);
    let track = extract(&signal, &grid);

    let frame = &track.frames[4];
    assert!(!frame.is_empty());
    assert!(
      frame.iter().any(|&f| (f - 700.0).abs() < 150.0),
      "no resonance near 700 Hz in {:?}",
      frame
    );
    assert!(
      frame.iter().any(|&f| (f - 1200.0).abs() < 150.0),
      "no resonance near 1200 Hz in {:?}",
      frame
    );
  }

  #[test]
  fn test_silent_frames_report_nothing() {
    let grid = FrameGrid::new(WINDOW_SIZE, HOP_SIZE).unwrap();
    let signal = Signal::new(vec![0.0; 8192], 44100);
    let track = extract(&signal, &grid);
    assert!(track.frames.iter().all(|f| f.is_empty()));
  }

  #[test]
  fn test_formants_sorted_and_bounded() {
    let grid = FrameGrid::new(WINDOW_SIZE, HOP_SIZE).unwrap();
    let signal = vowel_like(44100, 22050);
    let track = extract(&signal, &grid);
    for frame in &track.frames {
      assert!(frame.len() <= FORMANT_COUNT);
      assert!(frame.windows(2).all(|p| p[0] < p[1]));
      assert!(frame.iter().all(|&f| (FORMANT_FLOOR_HZ..=FORMANT_CEIL_HZ).contains(&f)));
    }
  }
}
