#![allow(non_upper_case_globals)]
pub mod analysis;
pub mod arg_parse;
pub mod error;
pub mod render;
pub mod synth;
pub mod types;

pub use error::MorphError;
pub use render::blend::TransitionConfig;
pub use render::{render_sequence, RenderOutput};
pub use types::{FrameGrid, SampleBank, Segment, Signal, Vowel};
