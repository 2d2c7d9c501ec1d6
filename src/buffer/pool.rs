//! Frame buffer pool
//!
//! Owns the planes of the current buffer format. Planes are replaced in full
//! whenever the format changes and released on teardown; all allocation and
//! pinning happens here, never on the per-frame path.

use std::ptr::NonNull;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::format::BufferFormat;

use super::aligned::AlignedRegion;
use super::pin::{MemoryPinner, OsPinner};

/// The planes allocated for one buffer format.
pub struct FrameBufferSet {
    format: BufferFormat,
    planes: Vec<AlignedRegion>,
    pinned: Vec<bool>,
}

impl FrameBufferSet {
    pub fn format(&self) -> &BufferFormat {
        &self.format
    }

    pub fn plane_count(&self) -> usize {
        self.planes.len()
    }

    /// Base address of a plane, stable until the next configure or teardown
    pub fn base_address(&self, plane: usize) -> NonNull<u8> {
        self.planes[plane].as_ptr()
    }

    /// Size of a plane in bytes (pitch * lines)
    pub fn plane_len(&self, plane: usize) -> usize {
        self.planes[plane].len()
    }

    pub fn is_pinned(&self, plane: usize) -> bool {
        self.pinned[plane]
    }

    /// # Safety
    ///
    /// The caller must hold the frame permit for `'a`, no writer may be active
    /// on the plane, and the set must not be reconfigured or torn down while
    /// the slice lives.
    pub(crate) unsafe fn plane<'a>(&self, plane: usize) -> &'a [u8] {
        let region = &self.planes[plane];
        unsafe { std::slice::from_raw_parts(region.as_ptr().as_ptr(), region.len()) }
    }

    /// # Safety
    ///
    /// The caller must hold the frame permit exclusively for `'a`, and the set
    /// must not be reconfigured or torn down while the slice lives.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn plane_mut<'a>(&self, plane: usize) -> &'a mut [u8] {
        let region = &self.planes[plane];
        unsafe { std::slice::from_raw_parts_mut(region.as_ptr().as_ptr(), region.len()) }
    }

    /// Unpin in pin order, then free
    fn release(self, pinner: &dyn MemoryPinner) {
        for (index, (region, pinned)) in self.planes.iter().zip(&self.pinned).enumerate() {
            if !*pinned {
                continue;
            }
            if let Err(e) = pinner.unpin(region.as_ptr().as_ptr(), region.len()) {
                warn!("Failed to unpin plane {} ({} bytes): {}", index, region.len(), e);
            }
        }
        debug!("Released {} planes ({} bytes)", self.planes.len(), self.format.total_size());
    }
}

/// Allocates, pins and releases the planes frames are written into.
pub struct FrameBufferPool {
    pinner: Arc<dyn MemoryPinner>,
    current: Option<FrameBufferSet>,
}

impl FrameBufferPool {
    /// Pool pinning through the host OS
    pub fn new() -> Self {
        Self::with_pinner(Arc::new(OsPinner))
    }

    pub fn with_pinner(pinner: Arc<dyn MemoryPinner>) -> Self {
        Self { pinner, current: None }
    }

    /// Replace the current planes with new ones for `format`
    ///
    /// Any previous set is unpinned and released first. If `pin` is set each
    /// plane is pinned in allocation order; when a pin fails the planes pinned
    /// so far are unpinned, everything is released and `PinFailed` is returned.
    pub fn configure(&mut self, format: BufferFormat, pin: bool) -> Result<&FrameBufferSet> {
        self.teardown();

        let mut planes = Vec::with_capacity(format.plane_count());
        for plane in 0..format.plane_count() {
            planes.push(AlignedRegion::zeroed(format.plane_size(plane))?);
        }

        let mut pinned = vec![false; planes.len()];
        if pin {
            for (index, region) in planes.iter().enumerate() {
                if let Err(source) = self.pinner.pin(region.as_ptr().as_ptr(), region.len()) {
                    warn!("Failed to pin plane {} ({} bytes): {}", index, region.len(), source);
                    for (undo, region) in planes[..index].iter().enumerate() {
                        if let Err(e) = self.pinner.unpin(region.as_ptr().as_ptr(), region.len()) {
                            warn!("Failed to unpin plane {} after pin failure: {}", undo, e);
                        }
                    }
                    return Err(Error::PinFailed {
                        plane: index,
                        len: region.len(),
                        source,
                    });
                }
                pinned[index] = true;
            }
        }

        info!(
            "Allocated {} {} plane(s) for {}x{} ({} bytes, pinned: {})",
            planes.len(),
            format.chroma(),
            format.width(),
            format.height(),
            format.total_size(),
            pin
        );

        Ok(self.current.insert(FrameBufferSet { format, planes, pinned }))
    }

    /// Unpin and release the current planes; a no-op when there are none
    pub fn teardown(&mut self) {
        if let Some(set) = self.current.take() {
            set.release(self.pinner.as_ref());
        }
    }

    pub fn current(&self) -> Option<&FrameBufferSet> {
        self.current.as_ref()
    }

    pub fn is_configured(&self) -> bool {
        self.current.is_some()
    }
}

impl Default for FrameBufferPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for FrameBufferPool {
    fn drop(&mut self) {
        self.teardown();
    }
}
