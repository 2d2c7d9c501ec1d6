//! Player module
//!
//! The direct player, its engine hooks and the native trampolines that
//! expose those hooks to a C engine.

mod direct;
mod native;

pub use direct::{DirectPlayer, ReadGuard, WriteGuard};
pub use native::{CleanupCallback, DisplayCallback, FormatCallback, LockCallback, NativeCallbacks, UnlockCallback};
