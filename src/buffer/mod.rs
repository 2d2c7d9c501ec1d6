//! Frame buffer module
//!
//! Aligned plane allocation, optional pinning, the pool that owns the planes
//! and the borrowed views lent out under the frame permit.

mod aligned;
mod pin;
mod pool;
mod view;

pub use aligned::PLANE_ALIGNMENT;
pub use pin::{MemoryPinner, OsPinner};
pub use pool::{FrameBufferPool, FrameBufferSet};
pub use view::{FramePlanes, FramePlanesMut};

#[cfg(test)]
pub(crate) use pin::testing;
