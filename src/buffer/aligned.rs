//! Aligned plane memory
//!
//! The engine requires every plane to start on a 32-byte boundary.

use std::alloc::{self, Layout};
use std::ptr::NonNull;

use crate::error::{Error, Result};

/// Alignment of the start of every plane.
pub const PLANE_ALIGNMENT: usize = 32;

/// One zero-initialised, 32-byte aligned heap region.
///
/// The region never moves or resizes; its address is stable until drop.
pub(crate) struct AlignedRegion {
    ptr: NonNull<u8>,
    layout: Layout,
}

// SAFETY: the region is plain bytes owned by this value. Concurrent access to
// the contents is serialized by the frame permit, never by this type.
unsafe impl Send for AlignedRegion {}
unsafe impl Sync for AlignedRegion {}

impl AlignedRegion {
    pub fn zeroed(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::invalid_format("cannot allocate an empty plane"));
        }
        let layout =
            Layout::from_size_align(size, PLANE_ALIGNMENT).map_err(|_| Error::AllocationFailed { size })?;

        // SAFETY: layout has a non-zero size.
        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(ptr).ok_or(Error::AllocationFailed { size })?;

        Ok(Self { ptr, layout })
    }

    pub fn as_ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    pub fn len(&self) -> usize {
        self.layout.size()
    }
}

impl Drop for AlignedRegion {
    fn drop(&mut self) {
        // SAFETY: ptr was allocated with exactly this layout.
        unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) }
    }
}
