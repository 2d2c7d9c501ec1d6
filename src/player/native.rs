//! Native callback trampolines
//!
//! `extern "C"` functions with the engine's video callback signatures. Each
//! one resolves the opaque pointer back to the player, forwards to the
//! matching hook and reports failures in the engine's terms. Panics never
//! cross the FFI boundary.

use std::ffi::{c_char, c_uint, c_void};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr;
use std::slice;
use std::sync::Arc;

use tracing::error;

use crate::error::{Error, Result};
use crate::format::{CHROMA_LEN, MAX_PLANES};

use super::direct::DirectPlayer;

/// Negotiate: chroma[4], width, height in/out; pitches[5], lines[5] out. Returns the plane count, 0 on failure.
pub type FormatCallback = unsafe extern "C" fn(
    opaque: *mut *mut c_void,
    chroma: *mut c_char,
    width: *mut c_uint,
    height: *mut c_uint,
    pitches: *mut c_uint,
    lines: *mut c_uint,
) -> c_uint;

pub type CleanupCallback = unsafe extern "C" fn(opaque: *mut c_void);

/// Fills planes[5] and returns a picture handle, null on failure.
pub type LockCallback = unsafe extern "C" fn(opaque: *mut c_void, planes: *mut *mut c_void) -> *mut c_void;

pub type UnlockCallback =
    unsafe extern "C" fn(opaque: *mut c_void, picture: *mut c_void, planes: *const *mut c_void);

pub type DisplayCallback = unsafe extern "C" fn(opaque: *mut c_void, picture: *mut c_void);

/// Registration handed to the engine.
///
/// Holds a strong reference to the player, so the opaque pointer stays valid
/// for as long as this value lives. Keep it alive until the engine has
/// stopped calling back.
pub struct NativeCallbacks {
    player: Arc<DirectPlayer>,
}

impl NativeCallbacks {
    pub fn new(player: Arc<DirectPlayer>) -> Self {
        Self { player }
    }

    pub fn player(&self) -> &Arc<DirectPlayer> {
        &self.player
    }

    /// Opaque pointer to register alongside the callbacks
    pub fn opaque(&self) -> *mut c_void {
        Arc::as_ptr(&self.player).cast_mut().cast()
    }

    pub fn format(&self) -> FormatCallback {
        format_trampoline
    }

    pub fn cleanup(&self) -> CleanupCallback {
        cleanup_trampoline
    }

    pub fn lock(&self) -> LockCallback {
        lock_trampoline
    }

    pub fn unlock(&self) -> UnlockCallback {
        unlock_trampoline
    }

    pub fn display(&self) -> DisplayCallback {
        display_trampoline
    }
}

// Forwards to the hook; errors and panics are logged and mapped to `fallback`.
fn guarded<T, F: FnOnce() -> Result<T>>(hook: &str, fallback: T, f: F) -> T {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => value,
        Ok(Err(e)) => {
            error!("Video {} callback failed: {}", hook, e);
            fallback
        }
        Err(_) => {
            error!("Video {} callback panicked", hook);
            fallback
        }
    }
}

/// # Safety
///
/// `opaque` must be null or come from `NativeCallbacks::opaque` of a value
/// that is still alive.
unsafe fn player<'a>(opaque: *mut c_void) -> Result<&'a DirectPlayer> {
    if opaque.is_null() {
        return Err(Error::NotConfigured);
    }
    Ok(unsafe { &*opaque.cast::<DirectPlayer>() })
}

fn null_argument(name: &str) -> Error {
    Error::invalid_format(format!("engine passed a null {} pointer", name))
}

unsafe extern "C" fn format_trampoline(
    opaque: *mut *mut c_void,
    chroma: *mut c_char,
    width: *mut c_uint,
    height: *mut c_uint,
    pitches: *mut c_uint,
    lines: *mut c_uint,
) -> c_uint {
    guarded("format", 0, || {
        if opaque.is_null() {
            return Err(null_argument("opaque"));
        }
        if chroma.is_null() || width.is_null() || height.is_null() {
            return Err(null_argument("geometry"));
        }
        if pitches.is_null() || lines.is_null() {
            return Err(null_argument("plane array"));
        }

        // SAFETY: the engine passes valid pointers to its own format state,
        // with room for MAX_PLANES pitches and lines.
        unsafe {
            let player = player(*opaque)?;
            let format = player.on_format(*width, *height)?;

            ptr::copy_nonoverlapping(format.chroma().as_fourcc().as_ptr().cast::<c_char>(), chroma, CHROMA_LEN);
            *width = format.width();
            *height = format.height();

            let pitches = slice::from_raw_parts_mut(pitches, MAX_PLANES);
            let lines = slice::from_raw_parts_mut(lines, MAX_PLANES);
            pitches.fill(0);
            lines.fill(0);
            pitches[..format.plane_count()].copy_from_slice(format.pitches());
            lines[..format.plane_count()].copy_from_slice(format.lines());

            Ok(format.plane_count() as c_uint)
        }
    })
}

unsafe extern "C" fn cleanup_trampoline(opaque: *mut c_void) {
    guarded("cleanup", (), || unsafe { player(opaque) }?.on_cleanup())
}

unsafe extern "C" fn lock_trampoline(opaque: *mut c_void, planes: *mut *mut c_void) -> *mut c_void {
    guarded("lock", ptr::null_mut(), || {
        if planes.is_null() {
            return Err(null_argument("plane array"));
        }
        // SAFETY: the engine passes room for MAX_PLANES plane pointers.
        let planes = unsafe { slice::from_raw_parts_mut(planes, MAX_PLANES) };
        let player = unsafe { player(opaque) }?;
        player.on_lock(planes)?;
        // The first plane doubles as the picture handle
        Ok(planes[0])
    })
}

unsafe extern "C" fn unlock_trampoline(opaque: *mut c_void, _picture: *mut c_void, _planes: *const *mut c_void) {
    guarded("unlock", (), || unsafe { player(opaque) }?.on_unlock())
}

unsafe extern "C" fn display_trampoline(opaque: *mut c_void, _picture: *mut c_void) {
    guarded("display", (), || unsafe { player(opaque) }?.on_display().map(|_| ()))
}
