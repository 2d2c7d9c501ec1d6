//! Buffer format negotiation
//!
//! The engine reports the source geometry whenever it changes and the
//! negotiator answers with the buffer layout it wants frames delivered in.

use tracing::debug;

use crate::error::{Error, Result};

use super::buffer_format::{packed_bytes_per_pixel, BufferFormat};
use super::chroma::Chroma;

/// Chooses the buffer format for a source geometry.
///
/// Implementations must be deterministic and free of side effects; they are
/// called on the engine's thread once per geometry change.
pub trait BufferFormatNegotiator: Send + Sync {
    fn negotiate(&self, source_width: u32, source_height: u32) -> Result<BufferFormat>;
}

impl<F> BufferFormatNegotiator for F
where
    F: Fn(u32, u32) -> Result<BufferFormat> + Send + Sync,
{
    fn negotiate(&self, source_width: u32, source_height: u32) -> Result<BufferFormat> {
        self(source_width, source_height)
    }
}

/// Always answers with the same format, the engine scales the video to fit.
#[derive(Debug, Clone)]
pub struct FixedFormat {
    format: BufferFormat,
}

impl FixedFormat {
    pub fn new(format: BufferFormat) -> Self {
        Self { format }
    }

    /// Single plane format of exactly the given size and pitch
    pub fn single_plane(chroma: &str, width: u32, height: u32, pitch: u32) -> Result<Self> {
        let format = BufferFormat::new(chroma, width, height, vec![pitch], vec![height])?;
        Ok(Self { format })
    }

    pub fn format(&self) -> &BufferFormat {
        &self.format
    }
}

impl BufferFormatNegotiator for FixedFormat {
    fn negotiate(&self, source_width: u32, source_height: u32) -> Result<BufferFormat> {
        debug!(
            "Source {}x{} mapped to fixed {}x{}",
            source_width,
            source_height,
            self.format.width(),
            self.format.height()
        );
        Ok(self.format.clone())
    }
}

/// Keeps the source geometry and lays planes out tightly for a known chroma.
#[derive(Debug, Clone, Copy)]
pub struct SourceSized {
    chroma: Chroma,
}

impl SourceSized {
    /// Fails for chromas without a known plane layout
    pub fn new(chroma: Chroma) -> Result<Self> {
        if chroma.layout().is_none() {
            return Err(Error::invalid_format(format!("no default plane layout for chroma {}", chroma)));
        }
        Ok(Self { chroma })
    }
}

impl BufferFormatNegotiator for SourceSized {
    fn negotiate(&self, source_width: u32, source_height: u32) -> Result<BufferFormat> {
        BufferFormat::for_chroma(self.chroma, source_width, source_height)
    }
}

/// Single plane buffer matching the source size: pitch = width * bpp, lines = height.
#[derive(Debug, Clone, Copy)]
pub struct ExactSize {
    chroma: Chroma,
    bytes_per_pixel: u32,
}

impl ExactSize {
    /// Exact size policy for a packed chroma
    pub fn new(chroma: Chroma) -> Result<Self> {
        let bytes_per_pixel = packed_bytes_per_pixel(chroma)
            .ok_or_else(|| Error::invalid_format(format!("chroma {} is not a packed format", chroma)))?;
        Ok(Self {
            chroma,
            bytes_per_pixel,
        })
    }

    /// Exact size policy for a chroma this crate does not know
    pub fn with_bytes_per_pixel(chroma: Chroma, bytes_per_pixel: u32) -> Result<Self> {
        if bytes_per_pixel == 0 {
            return Err(Error::invalid_format("zero bytes per pixel"));
        }
        Ok(Self {
            chroma,
            bytes_per_pixel,
        })
    }
}

impl BufferFormatNegotiator for ExactSize {
    fn negotiate(&self, source_width: u32, source_height: u32) -> Result<BufferFormat> {
        let pitch = source_width
            .checked_mul(self.bytes_per_pixel)
            .ok_or_else(|| Error::invalid_format(format!("width {} overflows the pitch", source_width)))?;
        BufferFormat::with_chroma(self.chroma, source_width, source_height, vec![pitch], vec![source_height])
    }
}
