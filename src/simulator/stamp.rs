//! Frame stamping
//!
//! Fills frames with a sequence-dependent pattern so a reader can tell a
//! complete frame from one that was overwritten while being read.

use crate::buffer::{FramePlanes, FramePlanesMut};

/// Bytes of the little-endian sequence marker at each end of a plane
pub const MARKER_LEN: usize = 8;

/// What a reader found in the planes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameCheck {
    /// Nothing written since the planes were allocated
    Blank,
    /// Every plane carries the same sequence number and pattern
    Intact(u64),
    /// Parts of more than one frame
    Torn,
}

fn pattern(offset: usize, seq: u64) -> u8 {
    (offset as u64).wrapping_add(seq) as u8
}

fn has_markers(plane: &[u8]) -> bool {
    plane.len() >= 2 * MARKER_LEN
}

/// Write frame `seq` into every plane
pub fn stamp_frame(planes: &mut FramePlanesMut<'_>, seq: u64) {
    let marker = seq.to_le_bytes();
    for index in 0..planes.len() {
        let plane = planes.plane_mut(index);
        for (offset, byte) in plane.iter_mut().enumerate() {
            *byte = pattern(offset, seq);
        }
        if has_markers(plane) {
            let len = plane.len();
            plane[..MARKER_LEN].copy_from_slice(&marker);
            plane[len - MARKER_LEN..].copy_from_slice(&marker);
        }
    }
}

/// Check that the planes hold exactly one stamped frame
pub fn check_frame(planes: &FramePlanes<'_>) -> FrameCheck {
    if planes.iter().all(|plane| plane.iter().all(|b| *b == 0)) {
        return FrameCheck::Blank;
    }

    let Some(first) = planes.iter().find(|plane| has_markers(plane)) else {
        return FrameCheck::Torn;
    };
    let mut header = [0u8; MARKER_LEN];
    header.copy_from_slice(&first[..MARKER_LEN]);
    let seq = u64::from_le_bytes(header);

    for plane in planes.iter() {
        let body = if has_markers(plane) {
            let len = plane.len();
            if plane[..MARKER_LEN] != header || plane[len - MARKER_LEN..] != header {
                return FrameCheck::Torn;
            }
            MARKER_LEN..len - MARKER_LEN
        } else {
            0..plane.len()
        };
        if plane[body.clone()].iter().zip(body).any(|(b, offset)| *b != pattern(offset, seq)) {
            return FrameCheck::Torn;
        }
    }

    FrameCheck::Intact(seq)
}
