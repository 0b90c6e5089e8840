pub mod blend;
pub mod engrave;

use std::sync::Arc;

use crate::error::MorphError;
use crate::synth::ms_to_samples;
use crate::types::{FrameGrid, MorphWarning, SampleBank, SampleBuffer, Segment, Signal};

use blend::TransitionConfig;

/// The final concatenated signal plus every recoverable guard condition
/// recorded along the way.
#[derive(Clone, Debug)]
pub struct RenderOutput {
  pub signal: Signal,
  pub warnings: Vec<MorphWarning>,
}

/// Scale the buffer down so its peak sits at ±1. Quiet renders are left
/// untouched; only clipping is prevented.
pub fn normalize(buffer: &mut SampleBuffer) {
  let peak = buffer.iter().map(|s| s.abs()).fold(0.0f32, f32::max);
  if peak > 1.0 {
    buffer.iter_mut().for_each(|s| *s /= peak);
  }
}

fn validate(segments: &[Segment], bank: &SampleBank, grid: &FrameGrid) -> Result<u32, MorphError> {
  if segments.is_empty() {
    return Err(MorphError::EmptySequence);
  }

  let mut sample_rate: Option<u32> = None;
  for segment in segments {
    let signal = bank.get(&segment.vowel).ok_or(MorphError::UnknownVowel(segment.vowel))?;
    if signal.len() < grid.window_size {
      return Err(MorphError::SignalTooShort {
        len: signal.len(),
        window_size: grid.window_size,
      });
    }
    match sample_rate {
      None => sample_rate = Some(signal.sample_rate),
      Some(rate) if rate != signal.sample_rate => {
        return Err(MorphError::SampleRateMismatch {
          left: rate,
          right: signal.sample_rate,
        })
      }
      _ => {}
    }
  }

  // A transition overlaps the tail of one segment and the head of the
  // next; it cannot be longer than either.
  for (i, pair) in segments.windows(2).enumerate() {
    if let Some(transition_ms) = pair[0].transition_ms {
      let shorter = pair[0].duration_ms.min(pair[1].duration_ms);
      if transition_ms < 0.0 || transition_ms > shorter {
        return Err(MorphError::BadSegment {
          index: i,
          transition_ms,
          duration_ms: shorter,
        });
      }
    }
  }

  // A middle segment must also fit its incoming and outgoing overlaps
  // side by side.
  for i in 1..segments.len().saturating_sub(1) {
    let incoming = segments[i - 1].transition_ms.unwrap_or(0.0);
    let outgoing = segments[i].transition_ms.unwrap_or(0.0);
    if incoming + outgoing > segments[i].duration_ms {
      return Err(MorphError::BadSegment {
        index: i,
        transition_ms: incoming + outgoing,
        duration_ms: segments[i].duration_ms,
      });
    }
  }

  Ok(sample_rate.unwrap_or(0))
}

/// Render an ordered segment sequence into one continuous buffer.
///
/// Each segment's steady body is rendered at full duration; each adjacent
/// pair with a nonzero transition is morphed once over the overlapping
/// span. The overlap bookkeeping drops the covered tail and head from the
/// steady buffers, so the total length is the sum of segment durations
/// minus the sum of transition durations. A zero/absent transition is a
/// hard cut with no blending stages and no crossfade.
pub fn render_sequence(
  segments: &[Segment],
  bank: &SampleBank,
  config: &TransitionConfig,
  grid: &FrameGrid,
) -> Result<RenderOutput, MorphError> {
  let sample_rate = validate(segments, bank, grid)?;

  let mut warnings = Vec::new();
  let steady: Vec<Signal> = segments
    .iter()
    .map(|segment| {
      let sample: &Arc<Signal> = &bank[&segment.vowel];
      let (signal, mut segment_warnings) = blend::render_steady(sample, segment.pitch_offset, segment.duration_ms, grid);
      warnings.append(&mut segment_warnings);
      signal
    })
    .collect();

  let fade_len = ms_to_samples(config.crossfade_ms, sample_rate);
  let mut out: SampleBuffer = Vec::new();
  let mut head_consumed = 0usize;

  for (i, segment) in segments.iter().enumerate() {
    let body = &steady[i].samples;
    let is_last = i + 1 == segments.len();
    let transition_len = if is_last {
      0
    } else {
      segment
        .transition_ms
        .map(|ms| ms_to_samples(ms, sample_rate))
        .unwrap_or(0)
        .min(body.len())
        .min(steady[i + 1].len())
    };

    // Rounding ms to samples can leave the consumed head one sample past
    // the cut when both overlaps together span the whole segment.
    let cut = body.len() - transition_len;
    out.extend_from_slice(&body[head_consumed.min(cut)..cut]);

    if transition_len > 0 {
      let a_tail = Signal::new(body[body.len() - transition_len..].to_vec(), sample_rate);
      let b_head = Signal::new(steady[i + 1].samples[..transition_len].to_vec(), sample_rate);
      let delta = segments[i + 1].pitch_offset - segment.pitch_offset;

      let (mut morph, mut morph_warnings) = blend::render_transition(&a_tail, &b_head, delta, config, grid)?;
      warnings.append(&mut morph_warnings);

      blend::crossfade_edges(&mut morph.samples, &a_tail.samples, &b_head.samples, fade_len.min(transition_len / 2));
      out.extend_from_slice(&morph.samples);
    }

    head_consumed = transition_len;
  }

  normalize(&mut out);
  Ok(RenderOutput {
    signal: Signal::new(out, sample_rate),
    warnings,
  })
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::synth::{pi2, HOP_SIZE, WINDOW_SIZE};
  use crate::types::Vowel;
  use std::collections::HashMap;

  fn sine(freq: f32, sample_rate: u32, len: usize) -> Signal {
    let samples = (0..len).map(|i| (pi2 * freq * i as f32 / sample_rate as f32).sin() * 0.5).collect();
    Signal::new(samples, sample_rate)
  }

  fn test_bank() -> SampleBank {
    let mut bank = HashMap::new();
    bank.insert(Vowel::A, Arc::new(sine(261.0, 44100, 44100)));
    bank.insert(Vowel::O, Arc::new(sine(300.0, 44100, 44100)));
    bank
  }

  fn segment(vowel: Vowel, duration_ms: f32, transition_ms: Option<f32>) -> Segment {
    Segment {
      vowel,
      pitch_offset: 0.0,
      duration_ms,
      transition_ms,
    }
  }

  fn test_grid() -> FrameGrid {
    FrameGrid::new(WINDOW_SIZE, HOP_SIZE).unwrap()
  }

  #[test]
  fn test_empty_sequence_is_an_error() {
    let out = render_sequence(&[], &test_bank(), &TransitionConfig::default(), &test_grid());
    assert!(matches!(out, Err(MorphError::EmptySequence)));
  }

  #[test]
  fn test_unknown_vowel_is_an_error() {
    let segments = [segment(Vowel::E, 500.0, None)];
    let out = render_sequence(&segments, &test_bank(), &TransitionConfig::default(), &test_grid());
    assert!(matches!(out, Err(MorphError::UnknownVowel(Vowel::E))));
  }

  #[test]
  fn test_short_sample_is_an_error() {
    let mut bank = test_bank();
    bank.insert(Vowel::A, Arc::new(sine(261.0, 44100, 100)));
    let segments = [segment(Vowel::A, 500.0, None)];
    let out = render_sequence(&segments, &bank, &TransitionConfig::default(), &test_grid());
    assert!(matches!(out, Err(MorphError::SignalTooShort { .. })));
  }

  #[test]
  fn test_mismatched_bank_rates_are_an_error() {
    let mut bank = test_bank();
    bank.insert(Vowel::O, Arc::new(sine(300.0, 48000, 48000)));
    let segments = [segment(Vowel::A, 500.0, Some(100.0)), segment(Vowel::O, 400.0, None)];
    let out = render_sequence(&segments, &bank, &TransitionConfig::default(), &test_grid());
    assert!(matches!(out, Err(MorphError::SampleRateMismatch { .. })));
  }

  #[test]
  fn test_overlong_transition_is_an_error() {
    let segments = [segment(Vowel::A, 500.0, Some(450.0)), segment(Vowel::O, 400.0, None)];
    let out = render_sequence(&segments, &test_bank(), &TransitionConfig::default(), &test_grid());
    assert!(matches!(out, Err(MorphError::BadSegment { index: 0, .. })));
  }

  #[test]
  fn test_overlapping_transitions_are_an_error() {
    // Each transition fits its adjacent pair, but together they exceed the
    // middle segment.
    let segments = [
      segment(Vowel::A, 500.0, Some(300.0)),
      segment(Vowel::O, 400.0, Some(300.0)),
      segment(Vowel::A, 500.0, None),
    ];
    let out = render_sequence(&segments, &test_bank(), &TransitionConfig::default(), &test_grid());
    assert!(matches!(out, Err(MorphError::BadSegment { index: 1, .. })));
  }

  #[test]
  fn test_normalize_only_tames_clipping() {
    let mut loud = vec![0.0, 2.0, -4.0];
    normalize(&mut loud);
    assert_eq!(loud, vec![0.0, 0.5, -1.0]);

    let mut quiet = vec![0.1, -0.2];
    normalize(&mut quiet);
    assert_eq!(quiet, vec![0.1, -0.2]);
  }
}
