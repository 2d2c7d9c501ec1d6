//! Pixel format tags
//!
//! A chroma is the engine's four character code naming a pixel layout.

use std::fmt;

use crate::error::{Error, Result};

/// Maximum length of a chroma tag in bytes.
pub const CHROMA_LEN: usize = 4;

/// How the pixels of a chroma are laid out across planes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChromaLayout {
    /// One plane, fixed bytes per pixel.
    Packed { bytes_per_pixel: u32 },
    /// Three planes, 4:2:0 subsampled (Y, then two half size chroma planes).
    Planar420,
    /// Two planes, 4:2:0 subsampled (Y, then interleaved chroma pairs).
    SemiPlanar420,
}

impl ChromaLayout {
    /// Number of planes the layout needs
    pub fn plane_count(&self) -> usize {
        match self {
            ChromaLayout::Packed { .. } => 1,
            ChromaLayout::Planar420 => 3,
            ChromaLayout::SemiPlanar420 => 2,
        }
    }

    /// Smallest valid pitch of `plane` for a frame `width` pixels wide
    pub fn min_pitch(&self, plane: usize, width: u32) -> u64 {
        let width = width as u64;
        match (self, plane) {
            (ChromaLayout::Packed { bytes_per_pixel }, _) => width * *bytes_per_pixel as u64,
            (_, 0) => width,
            (ChromaLayout::Planar420, _) => width.div_ceil(2),
            (ChromaLayout::SemiPlanar420, _) => width.div_ceil(2) * 2,
        }
    }

    /// Number of rows in `plane` for a frame `height` pixels tall
    pub fn lines(&self, plane: usize, height: u32) -> u32 {
        match (self, plane) {
            (ChromaLayout::Packed { .. }, _) | (_, 0) => height,
            _ => height.div_ceil(2),
        }
    }
}

/// Pixel format tag, at most four bytes, zero padded.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Chroma {
    tag: [u8; CHROMA_LEN],
    len: u8,
}

impl Chroma {
    /// 24-bit depth with 8 bits of padding
    pub const RV32: Chroma = Chroma::fourcc(*b"RV32");
    /// 24-bit depth
    pub const RV24: Chroma = Chroma::fourcc(*b"RV24");
    /// 16-bit depth
    pub const RV16: Chroma = Chroma::fourcc(*b"RV16");
    /// 15-bit depth, 1 bit of padding
    pub const RV15: Chroma = Chroma::fourcc(*b"RV15");
    pub const RGBA: Chroma = Chroma::fourcc(*b"RGBA");
    pub const BGRA: Chroma = Chroma::fourcc(*b"BGRA");
    /// Packed 4:2:2, order YUYV
    pub const YUY2: Chroma = Chroma::fourcc(*b"YUY2");
    /// Packed 4:2:2, order UYVY
    pub const UYVY: Chroma = Chroma::fourcc(*b"UYVY");
    /// Planar 4:2:0, order YUV
    pub const I420: Chroma = Chroma::fourcc(*b"I420");
    /// Planar 4:2:0, order YVU
    pub const YV12: Chroma = Chroma::fourcc(*b"YV12");
    /// Semi-planar 4:2:0
    pub const NV12: Chroma = Chroma::fourcc(*b"NV12");

    const fn fourcc(tag: [u8; CHROMA_LEN]) -> Self {
        Self {
            tag,
            len: CHROMA_LEN as u8,
        }
    }

    /// Parse a chroma tag such as `"RV32"`
    ///
    /// The tag must be 1 to 4 printable ASCII bytes.
    pub fn new(tag: &str) -> Result<Self> {
        let bytes = tag.as_bytes();
        if bytes.is_empty() || bytes.len() > CHROMA_LEN {
            return Err(Error::invalid_format(format!(
                "chroma {:?} must be 1 to {} bytes",
                tag, CHROMA_LEN
            )));
        }
        if !bytes.iter().all(|b| b.is_ascii_graphic()) {
            return Err(Error::invalid_format(format!(
                "chroma {:?} must be printable ASCII",
                tag
            )));
        }

        let mut padded = [0u8; CHROMA_LEN];
        padded[..bytes.len()].copy_from_slice(bytes);
        Ok(Self {
            tag: padded,
            len: bytes.len() as u8,
        })
    }

    /// The tag without padding
    pub fn as_str(&self) -> &str {
        // Constructors only accept ASCII.
        std::str::from_utf8(&self.tag[..self.len as usize]).unwrap_or("")
    }

    /// The tag zero padded to four bytes, as the engine expects it
    pub fn as_fourcc(&self) -> [u8; CHROMA_LEN] {
        self.tag
    }

    /// Layout of a well-known chroma, `None` for tags this crate does not know
    pub fn layout(&self) -> Option<ChromaLayout> {
        let layout = match &self.tag {
            b"RV32" | b"RGBA" | b"BGRA" => ChromaLayout::Packed { bytes_per_pixel: 4 },
            b"RV24" => ChromaLayout::Packed { bytes_per_pixel: 3 },
            b"RV16" | b"RV15" | b"YUY2" | b"UYVY" => ChromaLayout::Packed { bytes_per_pixel: 2 },
            b"I420" | b"YV12" => ChromaLayout::Planar420,
            b"NV12" => ChromaLayout::SemiPlanar420,
            _ => return None,
        };
        Some(layout)
    }
}

impl fmt::Debug for Chroma {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Chroma({})", self.as_str())
    }
}

impl fmt::Display for Chroma {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Chroma {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Chroma::new(s)
    }
}
