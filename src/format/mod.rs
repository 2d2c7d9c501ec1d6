//! Buffer format module
//!
//! Pixel format tags, buffer geometry and the negotiation policies that turn a
//! source geometry into a buffer layout.

mod buffer_format;
mod chroma;
mod negotiator;

pub use buffer_format::{BufferFormat, MAX_PLANES};
pub use chroma::{Chroma, ChromaLayout, CHROMA_LEN};
pub use negotiator::{BufferFormatNegotiator, ExactSize, FixedFormat, SourceSized};
