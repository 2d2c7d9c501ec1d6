//! Direct player
//!
//! Receives decoded frames straight into caller-owned planes. The engine
//! drives the hooks below from its own thread; consumers read the planes
//! from theirs under the same frame permit.

use std::cell::UnsafeCell;
use std::ffi::c_void;
use std::sync::Arc;

use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::buffer::{FrameBufferPool, FrameBufferSet, FramePlanes, FramePlanesMut, MemoryPinner};
use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::format::{BufferFormat, BufferFormatNegotiator, FixedFormat};
use crate::render::{RenderCallback, RenderDispatcher};
use crate::sync::{FrameSync, ReadinessGate, SyncGuard};

/// Media player delivering frames into its own frame buffer pool.
///
/// Hook order per frame is `on_lock`, write, `on_unlock`, `on_display`.
/// `on_format` runs before the first frame and on every geometry change,
/// `on_cleanup` once playback has stopped.
pub struct DirectPlayer {
    /// Identifies this player in log lines
    id: Uuid,
    negotiator: Box<dyn BufferFormatNegotiator>,
    /// Pin planes in physical memory when they are allocated
    pin_memory: bool,
    sync: FrameSync,
    /// Only touched while `sync` is held
    pool: UnsafeCell<FrameBufferPool>,
    dispatcher: RenderDispatcher,
    first_frame: ReadinessGate<BufferFormat, ()>,
}

// SAFETY: every access to `pool` happens with the frame permit held, which
// serializes the engine thread against all consumer threads.
unsafe impl Sync for DirectPlayer {}

impl DirectPlayer {
    pub fn new(
        negotiator: Box<dyn BufferFormatNegotiator>,
        render: Box<dyn RenderCallback>,
        pin_memory: bool,
    ) -> Self {
        let id = Uuid::new_v4();
        info!("[{}] Direct player created (pin memory: {})", id, pin_memory);
        Self {
            id,
            negotiator,
            pin_memory,
            sync: FrameSync::new(),
            pool: UnsafeCell::new(FrameBufferPool::new()),
            dispatcher: RenderDispatcher::new(render),
            first_frame: ReadinessGate::new(),
        }
    }

    /// Player with a fixed single plane format, whatever the source size
    pub fn with_format(
        chroma: &str,
        width: u32,
        height: u32,
        pitch: u32,
        render: Box<dyn RenderCallback>,
        pin_memory: bool,
    ) -> Result<Self> {
        let negotiator = FixedFormat::single_plane(chroma, width, height, pitch)?;
        Ok(Self::new(Box::new(negotiator), render, pin_memory))
    }

    pub fn from_config(config: &PipelineConfig, render: Box<dyn RenderCallback>) -> Result<Self> {
        let negotiator = config.negotiator()?;
        Ok(Self::new(negotiator, render, config.pin_memory))
    }

    /// Replace the memory pinner, before any format has been negotiated
    pub fn with_pinner(mut self, pinner: Arc<dyn MemoryPinner>) -> Self {
        self.pool = UnsafeCell::new(FrameBufferPool::with_pinner(pinner));
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    // ---- engine hooks ----

    /// Geometry changed: negotiate a format and reallocate the planes
    ///
    /// A negotiation failure leaves the current planes in place. Allocation
    /// or pin failures leave the player unconfigured.
    pub fn on_format(&self, source_width: u32, source_height: u32) -> Result<BufferFormat> {
        let format = self.negotiator.negotiate(source_width, source_height).map_err(|e| {
            error!("[{}] Format negotiation for {}x{} failed: {}", self.id, source_width, source_height, e);
            e
        })?;

        info!(
            "[{}] Source {}x{} negotiated to {} {}x{} with {} plane(s)",
            self.id,
            source_width,
            source_height,
            format.chroma(),
            format.width(),
            format.height(),
            format.plane_count()
        );

        let _permit = self.sync.lock()?;
        // SAFETY: the permit is held.
        let pool = unsafe { &mut *self.pool.get() };
        let set = pool.configure(format, self.pin_memory)?;
        Ok(set.format().clone())
    }

    /// Take the frame permit and fill `planes` with the plane base addresses
    ///
    /// Returns the number of planes written. The permit stays held until
    /// `on_unlock`. On error the permit is not held.
    pub fn on_lock(&self, planes: &mut [*mut c_void]) -> Result<usize> {
        self.sync.acquire()?;

        // SAFETY: the permit is held.
        let pool = unsafe { &*self.pool.get() };
        let Some(set) = pool.current() else {
            self.sync.release()?;
            warn!("[{}] Frame locked before any format was negotiated", self.id);
            return Err(Error::NotConfigured);
        };

        let count = set.plane_count();
        if planes.len() < count {
            self.sync.release()?;
            return Err(Error::invalid_format(format!(
                "engine offered {} plane slots for {} planes",
                planes.len(),
                count
            )));
        }

        for (plane, slot) in planes.iter_mut().take(count).enumerate() {
            *slot = set.base_address(plane).as_ptr().cast();
        }
        trace!("[{}] Frame locked", self.id);
        Ok(count)
    }

    /// The engine finished writing the frame; returns the permit
    pub fn on_unlock(&self) -> Result<()> {
        trace!("[{}] Frame unlocked", self.id);
        self.sync.release()
    }

    /// A completed frame is ready; hand it to the render callback
    ///
    /// The permit is taken again for the length of the callback. Returns the
    /// 1-based number of the dispatched frame.
    pub fn on_display(&self) -> Result<u64> {
        let _permit = self.sync.lock()?;
        // SAFETY: the permit is held.
        let pool = unsafe { &*self.pool.get() };
        let set = pool.current().ok_or(Error::NotConfigured)?;

        // SAFETY: the permit is held for the lifetime of `planes`.
        let planes = unsafe { FramePlanes::new(set) };
        let frame = self.dispatcher.dispatch(&planes, set.format());
        if frame == 1 && self.first_frame.signal_ready(set.format().clone()) {
            debug!("[{}] First frame displayed", self.id);
        }
        Ok(frame)
    }

    /// Playback stopped: unpin and release the planes
    pub fn on_cleanup(&self) -> Result<()> {
        let _permit = self.sync.lock()?;
        // SAFETY: the permit is held.
        unsafe { &mut *self.pool.get() }.teardown();

        if self.first_frame.signal_failed(()) {
            warn!("[{}] Cleaned up before any frame was displayed", self.id);
        }
        info!("[{}] Frame buffers released after {} frame(s)", self.id, self.frames_dispatched());
        Ok(())
    }

    /// Safe counterpart of `on_lock`/`on_unlock` for engines written in Rust
    pub fn lock_for_write(&self) -> Result<WriteGuard<'_>> {
        let permit = self.sync.lock()?;
        // SAFETY: the permit is held for as long as the guard borrows the set.
        let set = unsafe { &*self.pool.get() }.current().ok_or(Error::NotConfigured)?;
        Ok(WriteGuard { set, _permit: permit })
    }

    // ---- consumer side ----

    /// Read-lock the current frame; the engine blocks until the guard drops
    ///
    /// Must not be called from inside the render callback.
    pub fn lock(&self) -> Result<ReadGuard<'_>> {
        let permit = self.sync.lock()?;
        // SAFETY: the permit is held for as long as the guard borrows the set.
        let set = unsafe { &*self.pool.get() }.current();
        Ok(ReadGuard { set, _permit: permit })
    }

    /// Take the frame permit without a guard; pair with `unlock_after_read`
    pub fn lock_for_read(&self) -> Result<()> {
        self.sync.acquire()
    }

    pub fn unlock_after_read(&self) -> Result<()> {
        self.sync.release()
    }

    /// Planes of the current frame, if a format has been negotiated
    ///
    /// # Safety
    ///
    /// The caller must hold the permit from `lock_for_read` and stop using
    /// the returned view before `unlock_after_read`.
    pub unsafe fn native_buffers(&self) -> Option<FramePlanes<'_>> {
        let set = unsafe { &*self.pool.get() }.current()?;
        Some(unsafe { FramePlanes::new(set) })
    }

    /// The currently negotiated format
    pub fn buffer_format(&self) -> Result<Option<BufferFormat>> {
        Ok(self.lock()?.format().cloned())
    }

    /// Gate signalled with the active format on the first displayed frame
    ///
    /// The gate is one-shot for the lifetime of the player. Once it is ready
    /// or failed it stays that way, even if a later `on_format` starts a new
    /// playback after `on_cleanup`; use a new player per playback to wait again.
    pub fn first_frame(&self) -> ReadinessGate<BufferFormat, ()> {
        self.first_frame.clone()
    }

    pub fn frames_dispatched(&self) -> u64 {
        self.dispatcher.frames_dispatched()
    }

    pub fn pin_memory(&self) -> bool {
        self.pin_memory
    }
}

/// Exclusive access to the planes for writing one frame.
pub struct WriteGuard<'a> {
    set: &'a FrameBufferSet,
    _permit: SyncGuard<'a>,
}

impl WriteGuard<'_> {
    pub fn format(&self) -> &BufferFormat {
        self.set.format()
    }

    pub fn planes_mut(&mut self) -> FramePlanesMut<'_> {
        // SAFETY: the guard holds the permit exclusively and is borrowed mutably.
        unsafe { FramePlanesMut::new(self.set) }
    }

    pub fn plane_mut(&mut self, plane: usize) -> &mut [u8] {
        // SAFETY: as above, the borrow is tied to &mut self.
        unsafe { self.set.plane_mut(plane) }
    }
}

/// Read access to the current frame; the engine cannot write while it lives.
pub struct ReadGuard<'a> {
    set: Option<&'a FrameBufferSet>,
    _permit: SyncGuard<'a>,
}

impl ReadGuard<'_> {
    /// `None` until the first format has been negotiated, and after cleanup
    pub fn planes(&self) -> Option<FramePlanes<'_>> {
        // SAFETY: the guard holds the permit, no writer is active.
        self.set.map(|set| unsafe { FramePlanes::new(set) })
    }

    pub fn format(&self) -> Option<&BufferFormat> {
        self.set.map(FrameBufferSet::format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::testing::CountingPinner;
    use crate::buffer::PLANE_ALIGNMENT;
    use crate::format::{Chroma, MAX_PLANES};
    use crate::sync::{Outcome, Readiness};
    use std::ptr;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    use parking_lot::Mutex;

    fn discard() -> Box<dyn RenderCallback> {
        Box::new(|_: &FramePlanes<'_>, _: &BufferFormat| {})
    }

    fn rv32_player(width: u32, height: u32, render: Box<dyn RenderCallback>) -> DirectPlayer {
        DirectPlayer::with_format("RV32", width, height, width * 4, render, false).unwrap()
    }

    /// Engine side of one frame through the raw hooks
    fn write_frame(player: &DirectPlayer, format: &BufferFormat, fill: u8) {
        let mut slots = [ptr::null_mut(); MAX_PLANES];
        let count = player.on_lock(&mut slots).unwrap();
        for (plane, slot) in slots.iter().copied().take(count).enumerate() {
            // SAFETY: the permit is held between on_lock and on_unlock.
            unsafe { ptr::write_bytes(slot.cast::<u8>(), fill, format.plane_size(plane)) };
        }
        player.on_unlock().unwrap();
        player.on_display().unwrap();
    }

    #[test]
    fn test_rv32_pattern_round_trip() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        let render = Box::new(move |planes: &FramePlanes<'_>, format: &BufferFormat| {
            assert_eq!(format.chroma(), Chroma::RV32);
            sink.lock().extend_from_slice(planes.plane(0));
        });
        let player = rv32_player(720, 480, render);

        let format = player.on_format(1920, 1080).unwrap();
        assert_eq!((format.width(), format.height()), (720, 480));
        assert_eq!(format.total_size(), 1_382_400);

        {
            let mut guard = player.lock_for_write().unwrap();
            for (i, byte) in guard.plane_mut(0).iter_mut().enumerate() {
                *byte = (i % 251) as u8;
            }
        }
        assert_eq!(player.on_display().unwrap(), 1);

        let received = received.lock();
        assert_eq!(received.len(), 1_382_400);
        assert!(received.iter().enumerate().all(|(i, b)| *b == (i % 251) as u8));

        let guard = player.lock().unwrap();
        let planes = guard.planes().unwrap();
        assert_eq!(planes.plane(0), received.as_slice());
    }

    #[test]
    fn test_lock_fills_plane_addresses() {
        let player = DirectPlayer::new(Box::new(FixedFormat::new(BufferFormat::i420(64, 48).unwrap())), discard(), false);
        player.on_format(64, 48).unwrap();

        let mut slots = [ptr::null_mut(); MAX_PLANES];
        assert_eq!(player.on_lock(&mut slots).unwrap(), 3);
        assert!(slots[..3].iter().all(|p| !p.is_null() && *p as usize % PLANE_ALIGNMENT == 0));
        assert!(slots[3..].iter().all(|p| p.is_null()));
        player.on_unlock().unwrap();
    }

    #[test]
    fn test_lock_before_format() {
        let player = rv32_player(4, 4, discard());
        let mut slots = [ptr::null_mut(); 1];
        assert!(matches!(player.on_lock(&mut slots), Err(Error::NotConfigured)));
        assert!(matches!(player.lock_for_write(), Err(Error::NotConfigured)));
        // The permit was returned on failure
        assert!(player.lock().unwrap().planes().is_none());
    }

    #[test]
    fn test_too_few_plane_slots() {
        let player = DirectPlayer::new(Box::new(FixedFormat::new(BufferFormat::i420(8, 8).unwrap())), discard(), false);
        player.on_format(8, 8).unwrap();
        let mut slots = [ptr::null_mut(); 2];
        assert!(matches!(player.on_lock(&mut slots), Err(Error::InvalidFormat(_))));
        assert!(player.lock_for_write().is_ok());
    }

    #[test]
    fn test_failed_negotiation_keeps_planes() {
        let negotiator = |width: u32, height: u32| {
            if width > 1000 {
                return Err(Error::invalid_format("too wide"));
            }
            BufferFormat::rv32(width, height)
        };
        let player = DirectPlayer::new(Box::new(negotiator), discard(), false);

        player.on_format(320, 240).unwrap();
        assert!(player.on_format(4096, 2160).is_err());
        let format = player.buffer_format().unwrap().unwrap();
        assert_eq!((format.width(), format.height()), (320, 240));
    }

    #[test]
    fn test_mismatched_format_keeps_prior_planes() {
        let pinner = Arc::new(CountingPinner::default());
        let negotiator = |width: u32, height: u32| {
            if width == 720 {
                return BufferFormat::new("RV32", 720, 480, vec![2880, 2880], vec![480]);
            }
            BufferFormat::rv32(width, height)
        };
        let player = DirectPlayer::new(Box::new(negotiator), discard(), true).with_pinner(pinner.clone());

        let prior = player.on_format(320, 240).unwrap();
        let mut slots = [ptr::null_mut(); MAX_PLANES];
        player.on_lock(&mut slots).unwrap();
        player.on_unlock().unwrap();
        let (pinned, unpinned) = (pinner.pinned(), pinner.unpinned());

        assert!(matches!(player.on_format(720, 480), Err(Error::InvalidFormat(_))));

        assert_eq!(pinner.pinned(), pinned);
        assert_eq!(pinner.unpinned(), unpinned);
        assert_eq!(player.buffer_format().unwrap(), Some(prior));
        let mut after = [ptr::null_mut(); MAX_PLANES];
        player.on_lock(&mut after).unwrap();
        player.on_unlock().unwrap();
        assert_eq!(slots, after);
    }

    #[test]
    fn test_pinned_planes_released_on_cleanup() {
        let pinner = Arc::new(CountingPinner::default());
        let player = DirectPlayer::new(Box::new(FixedFormat::new(BufferFormat::yv12(32, 32).unwrap())), discard(), true)
            .with_pinner(pinner.clone());

        player.on_format(32, 32).unwrap();
        let format = player.on_format(32, 32).unwrap();
        write_frame(&player, &format, 0x10);
        player.on_cleanup().unwrap();
        player.on_cleanup().unwrap();

        assert_eq!(pinner.pinned(), 6);
        assert_eq!(pinner.unpinned(), 6);
        assert!(player.buffer_format().unwrap().is_none());
    }

    #[test]
    fn test_pin_failure_leaves_unconfigured() {
        let pinner = Arc::new(CountingPinner::failing_on(0));
        let player = DirectPlayer::with_format("RV32", 16, 16, 64, discard(), true)
            .unwrap()
            .with_pinner(pinner.clone());

        assert!(matches!(player.on_format(16, 16), Err(Error::PinFailed { plane: 0, .. })));
        assert!(player.buffer_format().unwrap().is_none());
        assert_eq!(pinner.unpinned(), 0);
    }

    #[test]
    fn test_first_frame_gate() {
        let player = rv32_player(8, 8, discard());
        let gate = player.first_frame();
        assert!(gate.wait_timeout(Duration::ZERO).is_err());

        let format = player.on_format(8, 8).unwrap();
        write_frame(&player, &format, 1);
        write_frame(&player, &format, 2);

        match gate.wait_timeout(Duration::from_secs(1)).unwrap() {
            Outcome::Ready(format) => assert_eq!(format.width(), 8),
            Outcome::Failed(()) => panic!("first frame gate failed"),
        }
        player.on_cleanup().unwrap();
        assert!(matches!(gate.state(), Readiness::Ready(_)));
        assert_eq!(player.frames_dispatched(), 2);
    }

    #[test]
    fn test_cleanup_before_first_frame_fails_gate() {
        let player = rv32_player(8, 8, discard());
        player.on_format(8, 8).unwrap();
        player.on_cleanup().unwrap();
        assert_eq!(player.first_frame().wait(), Outcome::Failed(()));
    }

    #[test]
    fn test_first_frame_gate_is_one_shot() {
        let player = rv32_player(8, 8, discard());
        player.on_format(8, 8).unwrap();
        player.on_cleanup().unwrap();

        // A new playback on the same player does not reopen the gate
        let format = player.on_format(8, 8).unwrap();
        write_frame(&player, &format, 3);
        assert_eq!(player.frames_dispatched(), 1);
        assert_eq!(player.first_frame().state(), Readiness::Failed(()));
    }

    #[cfg(debug_assertions)]
    #[test]
    fn test_reentrant_lock_fails_fast() {
        let player = rv32_player(4, 4, discard());
        player.on_format(4, 4).unwrap();

        let _guard = player.lock().unwrap();
        assert!(matches!(player.lock(), Err(Error::ReentrancyViolation)));
        assert!(matches!(player.lock_for_write(), Err(Error::ReentrancyViolation)));
    }

    #[test]
    fn test_raw_read_lock() {
        let player = rv32_player(4, 2, discard());
        let format = player.on_format(4, 2).unwrap();
        write_frame(&player, &format, 0xab);

        player.lock_for_read().unwrap();
        let planes = unsafe { player.native_buffers() }.unwrap();
        assert!(planes.plane(0).iter().all(|b| *b == 0xab));
        player.unlock_after_read().unwrap();
        assert!(matches!(player.unlock_after_read(), Err(Error::NotHeld)));
    }

    #[test]
    fn test_readers_never_see_torn_frames() {
        const WRITERS: usize = 3;
        const READERS: usize = 4;
        const FRAMES: usize = 200;

        let player = Arc::new(rv32_player(64, 32, discard()));
        player.on_format(64, 32).unwrap();
        let done = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..READERS)
            .map(|_| {
                let player = player.clone();
                let done = done.clone();
                thread::spawn(move || {
                    let mut checked = 0usize;
                    while !done.load(Ordering::SeqCst) {
                        let guard = player.lock().unwrap();
                        let plane = guard.planes().unwrap().plane(0);
                        let first = plane[0];
                        assert!(plane.iter().all(|b| *b == first), "torn frame observed");
                        checked += 1;
                    }
                    checked
                })
            })
            .collect();

        let writers: Vec<_> = (0..WRITERS)
            .map(|writer| {
                let player = player.clone();
                thread::spawn(move || {
                    for frame in 0..FRAMES {
                        let fill = (writer * FRAMES + frame) as u8;
                        let mut guard = player.lock_for_write().unwrap();
                        let plane = guard.plane_mut(0);
                        let half = plane.len() / 2;
                        plane[..half].fill(fill);
                        thread::yield_now();
                        plane[half..].fill(fill);
                    }
                })
            })
            .collect();

        for writer in writers {
            writer.join().unwrap();
        }
        done.store(true, Ordering::SeqCst);
        for reader in readers {
            reader.join().unwrap();
        }
    }
}
