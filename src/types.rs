use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::MorphError;

/// Sample values in -1 to 1
pub type SampleBuffer = Vec<f32>;

/// Maps normalized transition progress in [0, 1] to a blend weight in [0, 1].
/// Applied identically to pitch, magnitude, phase, and formant blending.
pub type WeightCurve = fn(f32) -> f32;

/// The default weight curve: w = t.
pub fn linear_weight(t: f32) -> f32 {
  t
}

/// A mono buffer with its sampling rate. Each pipeline stage returns a new
/// Signal; none mutates its input.
#[derive(Clone, Debug, PartialEq)]
pub struct Signal {
  pub samples: SampleBuffer,
  pub sample_rate: u32,
}

impl Signal {
  pub fn new(samples: SampleBuffer, sample_rate: u32) -> Self {
    Signal { samples, sample_rate }
  }

  pub fn len(&self) -> usize {
    self.samples.len()
  }

  pub fn is_empty(&self) -> bool {
    self.samples.is_empty()
  }

  pub fn duration_ms(&self) -> f32 {
    1000.0 * self.samples.len() as f32 / self.sample_rate as f32
  }
}

/// The documented vowel sample set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Vowel {
  A,
  E,
  I,
  O,
  U,
}

impl Vowel {
  pub const ALL: [Vowel; 5] = [Vowel::A, Vowel::E, Vowel::I, Vowel::O, Vowel::U];

  pub fn as_str(&self) -> &'static str {
    match self {
      Vowel::A => "A",
      Vowel::E => "E",
      Vowel::I => "I",
      Vowel::O => "O",
      Vowel::U => "U",
    }
  }
}

impl std::fmt::Display for Vowel {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// Read-only shared vowel sample bank. No stage mutates the bank; signals
/// are reference counted so steady and transition renders can hold the same
/// source buffers.
pub type SampleBank = HashMap<Vowel, Arc<Signal>>;

/// One note in the rendered sequence.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
  pub vowel: Vowel,
  /// Semitones from the reference pitch.
  pub pitch_offset: f32,
  /// Sustain length in milliseconds.
  pub duration_ms: f32,
  /// Optional morph length into the following segment. Ignored on the last
  /// segment. Must not exceed the shorter of the two adjacent durations.
  pub transition_ms: Option<f32>,
}

/// Shared frame indexing for every analysis stage. Frame `f` covers samples
/// `[f * hop_size, f * hop_size + window_size)`, zero-padded past the end.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameGrid {
  pub window_size: usize,
  pub hop_size: usize,
}

impl FrameGrid {
  pub fn new(window_size: usize, hop_size: usize) -> Result<Self, MorphError> {
    if window_size == 0 || hop_size == 0 || hop_size >= window_size {
      return Err(MorphError::InvalidWindowConfig { window_size, hop_size });
    }
    Ok(FrameGrid { window_size, hop_size })
  }

  /// Number of analysis frames covering `n_samples`.
  pub fn frame_count(&self, n_samples: usize) -> usize {
    if n_samples == 0 {
      0
    } else {
      (n_samples + self.hop_size - 1) / self.hop_size
    }
  }

  /// Number of non-negative frequency bins per frame.
  pub fn bins(&self) -> usize {
    self.window_size / 2 + 1
  }

  /// Width of one frequency bin in Hz.
  pub fn bin_hz(&self, sample_rate: u32) -> f32 {
    sample_rate as f32 / self.window_size as f32
  }

  /// Normalized progress of frame `f` within a span of `frame_count` frames.
  pub fn progress(&self, frame: usize, frame_count: usize) -> f32 {
    if frame_count <= 1 {
      0.0
    } else {
      frame as f32 / (frame_count - 1) as f32
    }
  }
}

impl Default for FrameGrid {
  fn default() -> Self {
    FrameGrid {
      window_size: crate::synth::WINDOW_SIZE,
      hop_size: crate::synth::HOP_SIZE,
    }
  }
}

/// Polar form of one STFT column, non-negative frequencies only.
#[derive(Clone, Debug, PartialEq)]
pub struct SpectralFrame {
  pub magnitude: Vec<f32>,
  pub phase: Vec<f32>,
}

impl SpectralFrame {
  pub fn silent(bins: usize) -> Self {
    SpectralFrame {
      magnitude: vec![0.0; bins],
      phase: vec![0.0; bins],
    }
  }

  pub fn bins(&self) -> usize {
    self.magnitude.len()
  }
}

/// Source-filter decomposition of a signal. All three sequences share the
/// decomposition's grid: entry `f` describes the same span of samples as
/// STFT frame `f` of the same signal.
#[derive(Clone, Debug)]
pub struct Decomposition {
  /// Fundamental frequency per frame, 0 for unvoiced/silent frames.
  pub f0: Vec<f32>,
  /// Smoothed magnitude-spectrum envelope per frame.
  pub envelope: Vec<Vec<f32>>,
  /// Noise-to-harmonic ratio per frame, banded, each value in [0, 1].
  pub aperiodicity: Vec<Vec<f32>>,
  pub grid: FrameGrid,
  pub sample_rate: u32,
  /// Length in samples of the decomposed signal.
  pub len: usize,
}

impl Decomposition {
  pub fn frame_count(&self) -> usize {
    self.f0.len()
  }
}

/// Per-frame resonance estimates for one analyzed signal. Frames under the
/// silence gate hold an empty set.
#[derive(Clone, Debug, Default)]
pub struct FormantTrack {
  pub frames: Vec<Vec<f32>>,
}

impl FormantTrack {
  pub fn frame_count(&self) -> usize {
    self.frames.len()
  }
}

/// Recoverable numerical guard conditions, recorded during a render rather
/// than aborting it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MorphWarning {
  PitchOutOfRange {
    frame: usize,
    requested_hz: f32,
    clamped_hz: f32,
  },
}

impl std::fmt::Display for MorphWarning {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      MorphWarning::PitchOutOfRange { frame, requested_hz, clamped_hz } => write!(
        f,
        "pitch out of range at frame {}: requested {:.1} Hz, clamped to {:.1} Hz",
        frame, requested_hz, clamped_hz
      ),
    }
  }
}
