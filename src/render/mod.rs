//! Render module
//!
//! Per-frame dispatch to consumer code and the RGB adapter for RV32 frames.

mod adapter;
mod dispatcher;

pub use adapter::RenderCallbackAdapter;
pub use dispatcher::{RenderCallback, RenderDispatcher};
