//! Synchronization module
//!
//! The frame permit shared by writer and readers, plus the one-shot readiness
//! gate used to wait for asynchronous engine events.

mod condition;
mod frame_sync;
mod readiness;

pub use condition::{ParsedCondition, ParsedStatus};
pub use frame_sync::{FrameSync, SyncGuard};
pub use readiness::{Outcome, Readiness, ReadinessGate};
