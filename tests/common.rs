use std::collections::HashMap;
use std::sync::Arc;

use vowelmorph::{SampleBank, Segment, Signal, Vowel};

pub const SAMPLE_RATE: u32 = 44100;

/// A one-second sine "vowel" at the given frequency.
pub fn tone(freq: f32) -> Signal {
  let samples = (0..SAMPLE_RATE as usize)
    .map(|i| (std::f32::consts::TAU * freq * i as f32 / SAMPLE_RATE as f32).sin() * 0.5)
    .collect();
  Signal::new(samples, SAMPLE_RATE)
}

/// A bank with two distinguishable vowels.
pub fn test_bank() -> SampleBank {
  let mut bank = HashMap::new();
  bank.insert(Vowel::A, Arc::new(tone(261.0)));
  bank.insert(Vowel::O, Arc::new(tone(330.0)));
  bank
}

pub fn segment(vowel: Vowel, pitch_offset: f32, duration_ms: f32, transition_ms: Option<f32>) -> Segment {
  Segment {
    vowel,
    pitch_offset,
    duration_ms,
    transition_ms,
  }
}

pub fn ms_to_samples(ms: f32) -> usize {
  ((ms / 1000.0) * SAMPLE_RATE as f32).round() as usize
}
