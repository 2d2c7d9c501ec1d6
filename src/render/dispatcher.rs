//! Render dispatch
//!
//! Hands each completed frame to consumer code, once per frame, in the order
//! the engine produced them.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::trace;

use crate::buffer::FramePlanes;
use crate::format::BufferFormat;

/// Consumer code receiving every completed frame.
///
/// `display` runs on the engine's thread while the frame permit is held, so
/// the planes are stable for the duration of the call. Do not call the
/// player's `lock` from inside `display`; copy what is needed instead and
/// take the read lock from another thread for access outside the call.
pub trait RenderCallback: Send {
    fn display(&mut self, planes: &FramePlanes<'_>, format: &BufferFormat);
}

impl<F> RenderCallback for F
where
    F: FnMut(&FramePlanes<'_>, &BufferFormat) + Send,
{
    fn display(&mut self, planes: &FramePlanes<'_>, format: &BufferFormat) {
        self(planes, format)
    }
}

/// Forwards frames to the render callback and counts them.
pub struct RenderDispatcher {
    callback: Mutex<Box<dyn RenderCallback>>,
    frames: AtomicU64,
}

impl RenderDispatcher {
    pub fn new(callback: Box<dyn RenderCallback>) -> Self {
        Self {
            callback: Mutex::new(callback),
            frames: AtomicU64::new(0),
        }
    }

    /// Invoke the callback for one frame; returns the frame's 1-based number
    pub fn dispatch(&self, planes: &FramePlanes<'_>, format: &BufferFormat) -> u64 {
        let frame = self.frames.fetch_add(1, Ordering::SeqCst) + 1;
        trace!("Dispatching frame {}", frame);
        self.callback.lock().display(planes, format);
        frame
    }

    pub fn frames_dispatched(&self) -> u64 {
        self.frames.load(Ordering::SeqCst)
    }
}
