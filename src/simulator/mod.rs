//! Simulator module
//!
//! A stand-in decoding engine for the demo binary and tests.

mod engine;
mod stamp;

pub use engine::{EngineCommand, EngineSettings, EngineStats, SimulatedEngine};
pub use stamp::{check_frame, stamp_frame, FrameCheck, MARKER_LEN};
