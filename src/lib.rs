//! Direct video frame pipeline
//!
//! Receives decoded frames from a media engine straight into aligned,
//! optionally pinned planes owned by the host, and hands them to consumer
//! code while the engine keeps decoding on its own thread.
//!
//! The engine talks to a [`DirectPlayer`] through five hooks: format, lock,
//! unlock, display and cleanup. A single frame permit serializes the engine
//! writing a frame against consumers reading it.

pub mod buffer;
pub mod config;
pub mod error;
pub mod format;
pub mod player;
pub mod render;
pub mod simulator;
pub mod sync;

pub use buffer::{FrameBufferPool, FramePlanes, FramePlanesMut, MemoryPinner, OsPinner};
pub use config::{NegotiationPolicy, PipelineConfig};
pub use error::{Error, Result};
pub use format::{BufferFormat, BufferFormatNegotiator, Chroma, ExactSize, FixedFormat, SourceSized, MAX_PLANES};
pub use player::{DirectPlayer, NativeCallbacks, ReadGuard, WriteGuard};
pub use render::{RenderCallback, RenderCallbackAdapter};
pub use sync::{Outcome, ParsedCondition, ParsedStatus, ReadinessGate};
