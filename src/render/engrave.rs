use std::path::Path;

use crate::error::MorphError;
use crate::types::Signal;

/// Write a signal as a 32-bit float mono WAV file.
pub fn write_signal<P: AsRef<Path>>(path: P, signal: &Signal) -> Result<(), MorphError> {
  let spec = hound::WavSpec {
    channels: 1,
    sample_rate: signal.sample_rate,
    bits_per_sample: 32,
    sample_format: hound::SampleFormat::Float,
  };
  let mut writer = hound::WavWriter::create(path, spec)?;
  for &sample in &signal.samples {
    writer.write_sample(sample)?;
  }
  writer.finalize()?;
  Ok(())
}
