use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;
use rayon::prelude::*;
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use crate::synth::pi2;
use crate::types::{FrameGrid, SampleBuffer, Signal, SpectralFrame};

/// Shared Hann windows keyed by length. Every stage that frames a signal
/// pulls from here so analysis and synthesis apply the identical window.
static HANN_CACHE: Lazy<Mutex<HashMap<usize, Arc<Vec<f32>>>>> = Lazy::new(|| Mutex::new(HashMap::new()));

pub fn hann_window(size: usize) -> Arc<Vec<f32>> {
  let mut cache = HANN_CACHE.lock().unwrap();
  cache
    .entry(size)
    .or_insert_with(|| {
      let w: Vec<f32> = (0..size).map(|i| 0.5 * (1.0 - (pi2 * i as f32 / size as f32).cos())).collect();
      Arc::new(w)
    })
    .clone()
}

/// Windowed forward transform of every frame on the grid.
///
/// Frame `f` starts at `f * hop_size`; material past the end of the signal
/// is zero-padded. Frames are independent, so the transforms run in
/// parallel; ordering of the returned frames matches the grid.
pub fn analyze(signal: &Signal, grid: &FrameGrid) -> Vec<SpectralFrame> {
  let n = signal.len();
  let frame_count = grid.frame_count(n);
  if frame_count == 0 {
    return Vec::new();
  }

  let window = hann_window(grid.window_size);
  let fft = FftPlanner::<f32>::new().plan_fft_forward(grid.window_size);
  let bins = grid.bins();

  (0..frame_count)
    .into_par_iter()
    .map(|f| {
      let start = f * grid.hop_size;
      let mut buffer: Vec<Complex<f32>> = (0..grid.window_size)
        .map(|i| {
          let sample = signal.samples.get(start + i).copied().unwrap_or(0.0);
          Complex::new(sample * window[i], 0.0)
        })
        .collect();
      fft.process(&mut buffer);

      let mut magnitude = Vec::with_capacity(bins);
      let mut phase = Vec::with_capacity(bins);
      for bin in buffer.iter().take(bins) {
        magnitude.push(bin.norm());
        phase.push(bin.arg());
      }
      SpectralFrame { magnitude, phase }
    })
    .collect()
}

/// Inverse transform with overlap-add reconstruction.
///
/// Each frame is mirrored back to a full Hermitian spectrum (the input was
/// real), inverse transformed, re-windowed, and summed at its hop offset.
/// The accumulated window-sum-of-squares divides the result per sample;
/// skipping that normalization leaves amplitude modulation at the hop rate.
/// `output_len` truncates or zero-pads the final buffer.
pub fn synthesize(frames: &[SpectralFrame], grid: &FrameGrid, sample_rate: u32, output_len: usize) -> Signal {
  if frames.is_empty() {
    return Signal::new(vec![0.0; output_len], sample_rate);
  }

  let window = hann_window(grid.window_size);
  let ifft = FftPlanner::<f32>::new().plan_fft_inverse(grid.window_size);
  let w = grid.window_size;

  // Per-frame inverse transforms are independent; only the accumulation
  // below is order-sensitive.
  let time_frames: Vec<Vec<f32>> = frames
    .par_iter()
    .map(|frame| {
      let mut buffer = vec![Complex::new(0.0, 0.0); w];
      let bins = frame.bins().min(w / 2 + 1);
      for k in 0..bins {
        let c = Complex::from_polar(frame.magnitude[k], frame.phase[k]);
        buffer[k] = c;
        if k != 0 && k != w / 2 {
          buffer[w - k] = c.conj();
        }
      }
      ifft.process(&mut buffer);
      buffer.iter().zip(window.iter()).map(|(c, win)| c.re / w as f32 * win).collect()
    })
    .collect();

  let span = (frames.len() - 1) * grid.hop_size + w;
  let mut acc: SampleBuffer = vec![0.0; span];
  let mut window_power = vec![0.0f32; span];

  for (f, frame) in time_frames.iter().enumerate() {
    let start = f * grid.hop_size;
    for (i, &sample) in frame.iter().enumerate() {
      acc[start + i] += sample;
      window_power[start + i] += window[i] * window[i];
    }
  }

  let mut samples: SampleBuffer = acc
    .iter()
    .zip(window_power.iter())
    .map(|(&sum, &power)| if power > 1e-9 { sum / power } else { 0.0 })
    .collect();
  samples.resize(output_len, 0.0);

  Signal::new(samples, sample_rate)
}
