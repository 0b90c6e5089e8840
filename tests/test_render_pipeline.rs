mod common;

use common::{ms_to_samples, segment, test_bank, SAMPLE_RATE};
use vowelmorph::render::blend;
use vowelmorph::{render_sequence, FrameGrid, TransitionConfig, Vowel};

fn test_grid() -> FrameGrid {
  FrameGrid::default()
}

#[test]
fn test_duration_accounting() {
  // 500 ms + 400 ms with a 250 ms morph between them: the overlap is
  // rendered once, so the total is 650 ms.
  let segments = [
    segment(Vowel::A, 0.0, 500.0, Some(250.0)),
    segment(Vowel::O, 0.0, 400.0, None),
  ];
  let out = render_sequence(&segments, &test_bank(), &TransitionConfig::default(), &test_grid()).unwrap();
  assert_eq!(out.signal.len(), ms_to_samples(650.0));
  assert_eq!(out.signal.sample_rate, SAMPLE_RATE);
}

#[test]
fn test_zero_transition_is_a_hard_cut() {
  let segments = [
    segment(Vowel::A, 0.0, 300.0, Some(0.0)),
    segment(Vowel::O, 0.0, 200.0, None),
  ];
  let grid = test_grid();
  let config = TransitionConfig::default();
  let out = render_sequence(&segments, &test_bank(), &config, &grid).unwrap();

  let bank = test_bank();
  let (steady_a, _) = blend::render_steady(&bank[&Vowel::A], 0.0, 300.0, &grid);
  let (steady_o, _) = blend::render_steady(&bank[&Vowel::O], 0.0, 200.0, &grid);
  let mut expected = steady_a.samples.clone();
  expected.extend_from_slice(&steady_o.samples);

  assert_eq!(out.signal.samples, expected);
}

#[test]
fn test_absent_transition_matches_zero_transition() {
  let grid = test_grid();
  let config = TransitionConfig::default();
  let bank = test_bank();

  let with_zero = [
    segment(Vowel::A, 0.0, 300.0, Some(0.0)),
    segment(Vowel::O, 0.0, 200.0, None),
  ];
  let with_none = [
    segment(Vowel::A, 0.0, 300.0, None),
    segment(Vowel::O, 0.0, 200.0, None),
  ];
  let a = render_sequence(&with_zero, &bank, &config, &grid).unwrap();
  let b = render_sequence(&with_none, &bank, &config, &grid).unwrap();
  assert_eq!(a.signal.samples, b.signal.samples);
}

#[test]
fn test_transition_boundaries_are_continuous() {
  let segments = [
    segment(Vowel::A, 0.0, 400.0, Some(200.0)),
    segment(Vowel::O, 0.0, 400.0, None),
  ];
  let out = render_sequence(&segments, &test_bank(), &TransitionConfig::default(), &test_grid()).unwrap();

  // A 261-330 Hz sine blend moves a few hundredths per sample; a click at
  // a segment boundary would be an order of magnitude larger.
  let max_step = out
    .signal
    .samples
    .windows(2)
    .map(|p| (p[1] - p[0]).abs())
    .fold(0.0f32, f32::max);
  assert!(max_step < 0.2, "max adjacent-sample step {}", max_step);
}

#[test]
fn test_full_render_with_pitch_offsets() {
  let segments = [
    segment(Vowel::A, 0.0, 300.0, Some(150.0)),
    segment(Vowel::O, 2.0, 300.0, Some(100.0)),
    segment(Vowel::A, -1.0, 250.0, None),
  ];
  let out = render_sequence(&segments, &test_bank(), &TransitionConfig::default(), &test_grid()).unwrap();

  assert_eq!(out.signal.len(), ms_to_samples(300.0 + 300.0 + 250.0 - 150.0 - 100.0));

  let peak = out.signal.samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);
  assert!(peak <= 1.0 + 1e-6, "peak {}", peak);

  let energy: f32 = out.signal.samples.iter().map(|s| s * s).sum();
  let rms = (energy / out.signal.len() as f32).sqrt();
  assert!(rms > 1e-4, "render is silent, rms {}", rms);
}

#[test]
fn test_warnings_surface_for_extreme_offsets() {
  // +60 semitones drives every voiced frame past the 5 kHz bound.
  let segments = [
    segment(Vowel::A, 60.0, 300.0, None),
  ];
  let out = render_sequence(&segments, &test_bank(), &TransitionConfig::default(), &test_grid()).unwrap();
  assert!(!out.warnings.is_empty());
}
