//! Simulated decoding engine
//!
//! Drives a `DirectPlayer` from its own thread the way a real decoder does:
//! format negotiation first, then lock, write, unlock and display for every
//! frame, cleanup when playback stops. Commands arrive over a channel and are
//! handled between frames.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error, info, warn};

use crate::player::DirectPlayer;
use crate::sync::{ParsedCondition, ParsedStatus};

use super::stamp::stamp_frame;

/// Commands accepted by a running engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCommand {
    /// The source geometry changed
    Resize { width: u32, height: u32 },
    Stop,
}

/// Playback parameters
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Source geometry reported to the player
    pub width: u32,
    pub height: u32,
    /// Frames to produce before stopping on its own; `None` runs until stopped
    pub frames: Option<u64>,
    /// Delay between frames
    pub interval: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            width: 720,
            height: 480,
            frames: None,
            interval: Duration::from_millis(40),
        }
    }
}

/// What the engine did before it stopped
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub frames: u64,
    pub format_changes: u32,
    pub failed_frames: u64,
}

/// Engine thread handle
pub struct SimulatedEngine {
    commands: Sender<EngineCommand>,
    handle: Option<JoinHandle<EngineStats>>,
}

impl SimulatedEngine {
    /// Spawn the engine thread
    ///
    /// `parsed` is signalled once the first format negotiation finishes,
    /// `Done` on success and `Failed` otherwise.
    pub fn start(player: Arc<DirectPlayer>, settings: EngineSettings, parsed: ParsedCondition) -> Self {
        let (commands, rx) = unbounded();
        let handle = thread::Builder::new()
            .name("simulated-engine".to_string())
            .spawn(move || run(&player, &settings, &parsed, &rx));

        match handle {
            Ok(handle) => Self {
                commands,
                handle: Some(handle),
            },
            Err(e) => {
                error!("Failed to spawn engine thread: {}", e);
                Self { commands, handle: None }
            }
        }
    }

    /// Sender for commands, usable from any thread including the render callback
    pub fn commands(&self) -> Sender<EngineCommand> {
        self.commands.clone()
    }

    pub fn resize(&self, width: u32, height: u32) {
        let _ = self.commands.send(EngineCommand::Resize { width, height });
    }

    pub fn stop(&self) {
        let _ = self.commands.send(EngineCommand::Stop);
    }

    /// Wait for the engine thread to finish
    pub fn join(mut self) -> thread::Result<EngineStats> {
        match self.handle.take() {
            Some(handle) => handle.join(),
            None => Ok(EngineStats::default()),
        }
    }
}

impl Drop for SimulatedEngine {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.stop();
            let _ = handle.join();
        }
    }
}

fn run(player: &DirectPlayer, settings: &EngineSettings, parsed: &ParsedCondition, rx: &Receiver<EngineCommand>) -> EngineStats {
    let mut stats = EngineStats::default();
    info!("Engine starting at {}x{}", settings.width, settings.height);

    match player.on_format(settings.width, settings.height) {
        Ok(_) => {
            stats.format_changes += 1;
            parsed.media_parsed_changed(ParsedStatus::Done);
        }
        Err(e) => {
            error!("Initial format negotiation failed: {}", e);
            parsed.media_parsed_changed(ParsedStatus::Failed);
            cleanup(player);
            return stats;
        }
    }

    let mut seq = 0u64;
    loop {
        if settings.frames.is_some_and(|limit| stats.frames >= limit) {
            debug!("Frame limit reached");
            break;
        }

        match rx.recv_timeout(settings.interval) {
            Ok(EngineCommand::Resize { width, height }) => {
                match player.on_format(width, height) {
                    Ok(_) => stats.format_changes += 1,
                    Err(e) => warn!("Resize to {}x{} failed: {}", width, height, e),
                }
                continue;
            }
            Ok(EngineCommand::Stop) | Err(RecvTimeoutError::Disconnected) => {
                debug!("Engine stopping");
                break;
            }
            Err(RecvTimeoutError::Timeout) => {}
        }

        match player.lock_for_write() {
            Ok(mut guard) => stamp_frame(&mut guard.planes_mut(), seq),
            Err(e) => {
                warn!("Failed to lock frame {}: {}", seq, e);
                stats.failed_frames += 1;
                continue;
            }
        }

        if let Err(e) = player.on_display() {
            warn!("Failed to display frame {}: {}", seq, e);
            stats.failed_frames += 1;
        }
        stats.frames += 1;
        seq += 1;
    }

    cleanup(player);
    info!(
        "Engine stopped after {} frame(s), {} format change(s)",
        stats.frames, stats.format_changes
    );
    stats
}

fn cleanup(player: &DirectPlayer) {
    if let Err(e) = player.on_cleanup() {
        error!("Cleanup failed: {}", e);
    }
}
