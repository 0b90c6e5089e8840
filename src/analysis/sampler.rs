use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use hound::{SampleFormat, WavReader};

use crate::error::MorphError;
use crate::types::{SampleBank, Signal, Vowel};

/// Read a WAV file into a mono signal. Integer formats are rescaled to
/// [-1, 1]; multi-channel files are averaged down to one channel.
pub fn read_signal<P: AsRef<Path>>(path: P) -> Result<Signal, MorphError> {
  let mut reader = WavReader::open(path)?;
  let spec = reader.spec();

  let interleaved: Vec<f32> = match spec.sample_format {
    SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
    SampleFormat::Int => {
      let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
      reader
        .samples::<i32>()
        .map(|s| s.map(|v| v as f32 / scale))
        .collect::<Result<_, _>>()?
    }
  };

  let channels = spec.channels.max(1) as usize;
  let samples = if channels == 1 {
    interleaved
  } else {
    interleaved
      .chunks(channels)
      .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
      .collect()
  };

  Ok(Signal::new(samples, spec.sample_rate))
}

/// Load the vowel sample bank from a directory holding `A.wav` through
/// `U.wav`. Missing files are simply absent from the bank; the renderer
/// reports `UnknownVowel` if a segment needs one.
pub fn load_sample_bank<P: AsRef<Path>>(dir: P) -> Result<SampleBank, MorphError> {
  let mut bank = HashMap::new();
  for vowel in Vowel::ALL {
    let path = dir.as_ref().join(format!("{}.wav", vowel));
    if path.is_file() {
      bank.insert(vowel, Arc::new(read_signal(&path)?));
    }
  }
  Ok(bank)
}
