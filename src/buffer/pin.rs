//! Memory pinning
//!
//! Pinned planes are excluded from paging so the engine never stalls on a page
//! fault while writing a frame. The OS call differs per platform; the pool only
//! sees the [`MemoryPinner`] capability.

use std::io;

/// Pins and unpins memory regions.
pub trait MemoryPinner: Send + Sync {
    /// Exclude `len` bytes at `addr` from paging.
    fn pin(&self, addr: *const u8, len: usize) -> io::Result<()>;

    /// Undo a successful [`pin`](MemoryPinner::pin) of the same region.
    fn unpin(&self, addr: *const u8, len: usize) -> io::Result<()>;
}

/// Pins through the host OS: `mlock` on Unix, `VirtualLock` on Windows.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsPinner;

#[cfg(unix)]
impl MemoryPinner for OsPinner {
    fn pin(&self, addr: *const u8, len: usize) -> io::Result<()> {
        // SAFETY: mlock only inspects the address range.
        let ret = unsafe { libc::mlock(addr as *const libc::c_void, len) };
        if ret != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn unpin(&self, addr: *const u8, len: usize) -> io::Result<()> {
        // SAFETY: munlock only inspects the address range.
        let ret = unsafe { libc::munlock(addr as *const libc::c_void, len) };
        if ret != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

#[cfg(windows)]
impl MemoryPinner for OsPinner {
    fn pin(&self, addr: *const u8, len: usize) -> io::Result<()> {
        use windows::Win32::System::Memory::VirtualLock;

        // SAFETY: VirtualLock only inspects the address range.
        unsafe { VirtualLock(addr as *const std::ffi::c_void, len) }.map_err(|_| io::Error::last_os_error())
    }

    fn unpin(&self, addr: *const u8, len: usize) -> io::Result<()> {
        use windows::Win32::System::Memory::VirtualUnlock;

        // SAFETY: VirtualUnlock only inspects the address range.
        unsafe { VirtualUnlock(addr as *const std::ffi::c_void, len) }.map_err(|_| io::Error::last_os_error())
    }
}

#[cfg(not(any(unix, windows)))]
impl MemoryPinner for OsPinner {
    fn pin(&self, _addr: *const u8, _len: usize) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "memory pinning is not supported on this platform"))
    }

    fn unpin(&self, _addr: *const u8, _len: usize) -> io::Result<()> {
        Ok(())
    }
}
