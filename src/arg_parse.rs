use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::MorphError;
use crate::types::{Segment, Vowel};

/// One entry of the JSON instruction file:
/// `{"vowel": "A", "offset": 0, "duration": 500, "transition": 250}`.
/// `offset` is semitones from the reference pitch, durations are in
/// milliseconds, and `transition` (optional) morphs into the next entry.
#[derive(Debug, Serialize, Deserialize)]
pub struct Instruction {
  pub vowel: Vowel,
  #[serde(default)]
  pub offset: f32,
  pub duration: f32,
  #[serde(default)]
  pub transition: Option<f32>,
}

impl Instruction {
  pub fn to_segment(&self) -> Segment {
    Segment {
      vowel: self.vowel,
      pitch_offset: self.offset,
      duration_ms: self.duration,
      transition_ms: self.transition,
    }
  }
}

/// Parse an instruction file into a validated segment sequence.
pub fn load_instructions<P: AsRef<Path>>(path: P) -> Result<Vec<Segment>, MorphError> {
  let contents = fs::read_to_string(path)?;
  let instructions: Vec<Instruction> = serde_json::from_str(&contents)?;

  for (index, instruction) in instructions.iter().enumerate() {
    if !(instruction.duration > 0.0) {
      return Err(MorphError::BadInstruction(format!(
        "instruction {}: duration must be positive, got {}",
        index, instruction.duration
      )));
    }
    if let Some(transition) = instruction.transition {
      if transition < 0.0 {
        return Err(MorphError::BadInstruction(format!(
          "instruction {}: transition must be non-negative, got {}",
          index, transition
        )));
      }
    }
  }

  Ok(instructions.iter().map(Instruction::to_segment).collect())
}
