//! Buffer format descriptor
//!
//! Describes the geometry of the planes the engine will write one frame into.

use crate::error::{Error, Result};

use super::chroma::{Chroma, ChromaLayout};

/// Largest number of planes the engine hands over in one lock call.
pub const MAX_PLANES: usize = 5;

/// Immutable description of a frame buffer: chroma, size and per-plane layout.
///
/// A new geometry always produces a new `BufferFormat`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferFormat {
    chroma: Chroma,
    width: u32,
    height: u32,
    pitches: Vec<u32>,
    lines: Vec<u32>,
}

impl BufferFormat {
    /// Create a buffer format from a chroma tag
    ///
    /// # Arguments
    /// * `chroma` - Pixel format tag, e.g. "RV32"
    /// * `width` / `height` - Frame size in pixels
    /// * `pitches` - Bytes per row, one entry per plane
    /// * `lines` - Rows, one entry per plane
    pub fn new(chroma: &str, width: u32, height: u32, pitches: Vec<u32>, lines: Vec<u32>) -> Result<Self> {
        Self::with_chroma(Chroma::new(chroma)?, width, height, pitches, lines)
    }

    /// Create a buffer format from an already parsed chroma
    pub fn with_chroma(
        chroma: Chroma,
        width: u32,
        height: u32,
        pitches: Vec<u32>,
        lines: Vec<u32>,
    ) -> Result<Self> {
        validate(chroma, width, height, &pitches, &lines)?;
        Ok(Self {
            chroma,
            width,
            height,
            pitches,
            lines,
        })
    }

    /// Tightly packed format for a well-known chroma
    ///
    /// Pitches are the minimum row size for each plane.
    pub fn for_chroma(chroma: Chroma, width: u32, height: u32) -> Result<Self> {
        let layout = chroma
            .layout()
            .ok_or_else(|| Error::invalid_format(format!("no default plane layout for chroma {}", chroma)))?;

        let mut pitches = Vec::with_capacity(layout.plane_count());
        let mut lines = Vec::with_capacity(layout.plane_count());
        for plane in 0..layout.plane_count() {
            let pitch = u32::try_from(layout.min_pitch(plane, width))
                .map_err(|_| Error::invalid_format(format!("width {} overflows the pitch", width)))?;
            pitches.push(pitch);
            lines.push(layout.lines(plane, height));
        }

        Self::with_chroma(chroma, width, height, pitches, lines)
    }

    /// Single plane RV32 format, four bytes per pixel
    pub fn rv32(width: u32, height: u32) -> Result<Self> {
        Self::for_chroma(Chroma::RV32, width, height)
    }

    /// Single plane RV24 format, three bytes per pixel
    pub fn rv24(width: u32, height: u32) -> Result<Self> {
        Self::for_chroma(Chroma::RV24, width, height)
    }

    /// Single plane RV16 format, two bytes per pixel
    pub fn rv16(width: u32, height: u32) -> Result<Self> {
        Self::for_chroma(Chroma::RV16, width, height)
    }

    /// Three plane I420 format
    pub fn i420(width: u32, height: u32) -> Result<Self> {
        Self::for_chroma(Chroma::I420, width, height)
    }

    /// Three plane YV12 format
    pub fn yv12(width: u32, height: u32) -> Result<Self> {
        Self::for_chroma(Chroma::YV12, width, height)
    }

    pub fn chroma(&self) -> Chroma {
        self.chroma
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pitches(&self) -> &[u32] {
        &self.pitches
    }

    pub fn lines(&self) -> &[u32] {
        &self.lines
    }

    pub fn plane_count(&self) -> usize {
        self.pitches.len()
    }

    /// Size in bytes of one plane
    ///
    /// Validation guarantees the product fits in `usize`.
    pub fn plane_size(&self, plane: usize) -> usize {
        self.pitches[plane] as usize * self.lines[plane] as usize
    }

    /// Size in bytes of all planes together
    pub fn total_size(&self) -> usize {
        (0..self.plane_count()).map(|plane| self.plane_size(plane)).sum()
    }
}

fn validate(chroma: Chroma, width: u32, height: u32, pitches: &[u32], lines: &[u32]) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(Error::invalid_format(format!("empty frame size {}x{}", width, height)));
    }
    if pitches.is_empty() {
        return Err(Error::invalid_format("zero planes"));
    }
    if pitches.len() != lines.len() {
        return Err(Error::invalid_format(format!(
            "{} pitches but {} line counts",
            pitches.len(),
            lines.len()
        )));
    }
    if pitches.len() > MAX_PLANES {
        return Err(Error::invalid_format(format!(
            "{} planes exceeds the maximum of {}",
            pitches.len(),
            MAX_PLANES
        )));
    }

    let layout = chroma.layout();
    if let Some(layout) = layout {
        if pitches.len() < layout.plane_count() {
            return Err(Error::invalid_format(format!(
                "chroma {} needs {} planes, got {}",
                chroma,
                layout.plane_count(),
                pitches.len()
            )));
        }
    }

    for (plane, (&pitch, &rows)) in pitches.iter().zip(lines).enumerate() {
        if pitch == 0 || rows == 0 {
            return Err(Error::invalid_format(format!("plane {} is empty ({}x{})", plane, pitch, rows)));
        }
        if (pitch as u64 * rows as u64) > isize::MAX as u64 {
            return Err(Error::invalid_format(format!("plane {} is too large", plane)));
        }
        if let Some(layout) = layout.filter(|l| plane < l.plane_count()) {
            let min = layout.min_pitch(plane, width);
            if (pitch as u64) < min {
                return Err(Error::invalid_format(format!(
                    "plane {} pitch {} is below the {} bytes needed for {} pixels of {}",
                    plane, pitch, min, width, chroma
                )));
            }
        }
    }

    Ok(())
}

/// Bytes per pixel of a packed chroma
pub(crate) fn packed_bytes_per_pixel(chroma: Chroma) -> Option<u32> {
    match chroma.layout()? {
        ChromaLayout::Packed { bytes_per_pixel } => Some(bytes_per_pixel),
        _ => None,
    }
}
