//! RGB render adapter
//!
//! Copies an RV32 frame into a tightly packed `u32` buffer, one pixel per
//! element, then hands that buffer to user code.

use tracing::warn;

use crate::buffer::FramePlanes;
use crate::format::{BufferFormat, Chroma};

use super::dispatcher::RenderCallback;

/// Render callback that converts RV32 frames to packed native-endian pixels
/// (`0x00RRGGBB` on little-endian hosts) and calls `on_display` with them.
///
/// Row padding is dropped, so the buffer is exactly `width * height` long.
/// The buffer is sized up front and only reallocated when the frame size
/// changes.
pub struct RenderCallbackAdapter<F> {
    rgb: Vec<u32>,
    width: u32,
    height: u32,
    on_display: F,
}

impl<F> RenderCallbackAdapter<F>
where
    F: FnMut(&[u32], u32, u32) + Send,
{
    /// Create an adapter with a buffer for frames of the given size
    pub fn new(width: u32, height: u32, on_display: F) -> Self {
        Self {
            rgb: vec![0; width as usize * height as usize],
            width,
            height,
            on_display,
        }
    }

    /// The most recently converted frame
    pub fn buffer(&self) -> &[u32] {
        &self.rgb
    }

    fn copy_rv32(&mut self, plane: &[u8], format: &BufferFormat) {
        let width = format.width() as usize;
        let pitch = format.pitches()[0] as usize;
        // The plane may carry fewer rows than the frame is tall
        let rows = format.height().min(format.lines()[0]) as usize;

        let (visible, missing) = self.rgb.split_at_mut(rows * width);
        for (row, dst) in visible.chunks_exact_mut(width).enumerate() {
            let src = &plane[row * pitch..row * pitch + width * 4];
            for (pixel, bytes) in dst.iter_mut().zip(src.chunks_exact(4)) {
                *pixel = u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            }
        }
        missing.fill(0);
    }
}

impl<F> RenderCallback for RenderCallbackAdapter<F>
where
    F: FnMut(&[u32], u32, u32) + Send,
{
    fn display(&mut self, planes: &FramePlanes<'_>, format: &BufferFormat) {
        if format.chroma() != Chroma::RV32 {
            warn!("RGB adapter only handles RV32 frames, got {}", format.chroma());
            return;
        }

        if (format.width(), format.height()) != (self.width, self.height) {
            self.width = format.width();
            self.height = format.height();
            self.rgb.resize(self.width as usize * self.height as usize, 0);
        }

        self.copy_rv32(planes.plane(0), format);
        (self.on_display)(&self.rgb, self.width, self.height);
    }
}
