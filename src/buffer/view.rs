//! Borrowed plane views
//!
//! Views are only handed out while the frame permit is held and cannot
//! outlive the guard they were borrowed from.

use crate::format::BufferFormat;

use super::pool::FrameBufferSet;

/// Read-only view of the planes of the current frame.
#[derive(Clone, Copy)]
pub struct FramePlanes<'a> {
    set: &'a FrameBufferSet,
}

impl<'a> FramePlanes<'a> {
    /// # Safety
    ///
    /// The frame permit must be held for `'a` and no mutable view may exist.
    pub(crate) unsafe fn new(set: &'a FrameBufferSet) -> Self {
        Self { set }
    }

    pub fn format(&self) -> &'a BufferFormat {
        self.set.format()
    }

    pub fn len(&self) -> usize {
        self.set.plane_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes of one plane, `pitch * lines` long
    pub fn plane(&self, plane: usize) -> &'a [u8] {
        // SAFETY: guaranteed by the constructor contract.
        unsafe { self.set.plane(plane) }
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a [u8]> + 'a {
        let set = self.set;
        // SAFETY: guaranteed by the constructor contract.
        (0..set.plane_count()).map(move |plane| unsafe { set.plane(plane) })
    }
}

/// Writable view of the planes of the current frame.
pub struct FramePlanesMut<'a> {
    set: &'a FrameBufferSet,
}

impl<'a> FramePlanesMut<'a> {
    /// # Safety
    ///
    /// The frame permit must be held exclusively for `'a`.
    pub(crate) unsafe fn new(set: &'a FrameBufferSet) -> Self {
        Self { set }
    }

    pub fn format(&self) -> &'a BufferFormat {
        self.set.format()
    }

    pub fn len(&self) -> usize {
        self.set.plane_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn plane(&self, plane: usize) -> &[u8] {
        // SAFETY: the returned borrow is tied to &self, so no mutable borrow coexists.
        unsafe { self.set.plane(plane) }
    }

    pub fn plane_mut(&mut self, plane: usize) -> &mut [u8] {
        // SAFETY: the permit is held exclusively and the borrow is tied to &mut self.
        unsafe { self.set.plane_mut(plane) }
    }
}
