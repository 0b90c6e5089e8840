use thiserror::Error;

use crate::types::Vowel;

/// Fatal render errors. All are deterministic functions of the input: the
/// core performs no I/O, so there is no transient/retryable class. Numerical
/// guard conditions (pitch clamping, silent formant frames) recover locally
/// and surface as `MorphWarning`s instead.
#[derive(Error, Debug)]
pub enum MorphError {
  #[error("invalid window config: window_size {window_size}, hop_size {hop_size} (need 0 < hop < window)")]
  InvalidWindowConfig { window_size: usize, hop_size: usize },

  #[error("no sample loaded for vowel {0}")]
  UnknownVowel(Vowel),

  #[error("segment sequence is empty")]
  EmptySequence,

  #[error("sample rate mismatch: {left} Hz vs {right} Hz (resampling is out of scope)")]
  SampleRateMismatch { left: u32, right: u32 },

  #[error("signal too short: {len} samples, need at least one analysis window ({window_size})")]
  SignalTooShort { len: usize, window_size: usize },

  #[error("segment {index}: transition {transition_ms} ms does not fit duration {duration_ms} ms")]
  BadSegment {
    index: usize,
    transition_ms: f32,
    duration_ms: f32,
  },

  #[error("instruction file: {0}")]
  BadInstruction(String),

  #[error(transparent)]
  Io(#[from] std::io::Error),

  #[error("wav: {0}")]
  Wav(#[from] hound::Error),

  #[error("json: {0}")]
  Json(#[from] serde_json::Error),
}
