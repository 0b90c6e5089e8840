use std::env;
use std::process;

use vowelmorph::analysis::sampler;
use vowelmorph::render::engrave;
use vowelmorph::{arg_parse, render_sequence, FrameGrid, MorphError, TransitionConfig};

fn main() {
  let args: Vec<String> = env::args().collect();

  if args.len() < 4 {
    eprintln!(r#"Usage: vowelmorph "/abs/to/instructions.json" "/abs/to/sample_dir" "/abs/to/out.wav""#);
    process::exit(1);
  }

  if let Err(err) = run(&args[1], &args[2], &args[3]) {
    eprintln!("Problem while rendering: {}", err);
    process::exit(1);
  }
}

fn run(instruction_path: &str, sample_dir: &str, out_path: &str) -> Result<(), MorphError> {
  let segments = arg_parse::load_instructions(instruction_path)?;
  let bank = sampler::load_sample_bank(sample_dir)?;

  let grid = FrameGrid::default();
  let config = TransitionConfig::default();
  let output = render_sequence(&segments, &bank, &config, &grid)?;

  for warning in &output.warnings {
    eprintln!("warning: {}", warning);
  }

  engrave::write_signal(out_path, &output.signal)?;
  println!("{}", out_path);
  Ok(())
}
