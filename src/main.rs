//! Direct Video Demo
//!
//! Runs the simulated engine against a direct player, checks frames from a
//! consumer thread while the engine writes, and can save the last RV32 frame
//! as a PNG snapshot.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use crossbeam_channel::Sender;
use image::{Rgb, RgbImage};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use direct_video::buffer::FramePlanes;
use direct_video::simulator::{check_frame, EngineCommand, EngineSettings, FrameCheck, SimulatedEngine};
use direct_video::{
    BufferFormat, Chroma, DirectPlayer, Outcome, ParsedCondition, PipelineConfig, RenderCallback,
    RenderCallbackAdapter,
};

const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Direct video frame pipeline demo
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a pipeline configuration JSON file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of frames the engine decodes
    #[arg(short, long, default_value_t = 100)]
    frames: u64,

    /// Source width reported by the engine
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// Source height reported by the engine
    #[arg(long, default_value_t = 720)]
    height: u32,

    /// Delay between frames in milliseconds
    #[arg(long, default_value_t = 10)]
    interval_ms: u64,

    /// Pin frame planes in physical memory
    #[arg(long)]
    pin: bool,

    /// Halve the source geometry after this many frames
    #[arg(long)]
    resize_at: Option<u64>,

    /// Save the last displayed RV32 frame to this PNG file
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

/// Last converted RV32 frame: pixels, width, height
type Snapshot = Arc<Mutex<Option<(Vec<u32>, u32, u32)>>>;

#[derive(Debug, Default)]
struct ConsumerStats {
    intact: u64,
    blank: u64,
    torn: u64,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.debug { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Direct video demo starting...");

    let mut config = match &args.config {
        Some(path) => {
            info!("Loading config from: {:?}", path);
            PipelineConfig::load_from_file(path).with_context(|| format!("failed to load {}", path.display()))?
        }
        None => PipelineConfig::default(),
    };
    if args.pin {
        config.pin_memory = true;
    }
    config.validate().context("invalid pipeline configuration")?;
    info!(
        "Pipeline: {} {}x{}, policy {:?}, pin memory: {}",
        config.pixel_format, config.width, config.height, config.policy, config.pin_memory
    );

    let snapshot: Snapshot = Arc::new(Mutex::new(None));
    let commands: Arc<OnceLock<Sender<EngineCommand>>> = Arc::new(OnceLock::new());
    let render = build_render(&args, config.chroma()?, snapshot.clone(), commands.clone());

    let player = Arc::new(DirectPlayer::from_config(&config, render)?);
    let parsed = ParsedCondition::new();
    let settings = EngineSettings {
        width: args.width,
        height: args.height,
        frames: Some(args.frames),
        interval: Duration::from_millis(args.interval_ms),
    };
    let engine = SimulatedEngine::start(player.clone(), settings, parsed.clone());
    let _ = commands.set(engine.commands());

    match parsed.wait_timeout(WAIT_TIMEOUT)? {
        Outcome::Ready(()) => info!("Media parsed"),
        Outcome::Failed(status) => bail!("media parsing failed: {:?}", status),
    }

    match player.first_frame().wait_timeout(WAIT_TIMEOUT) {
        Ok(Outcome::Ready(format)) => info!(
            "First frame: {} {}x{}, {} bytes",
            format.chroma(),
            format.width(),
            format.height(),
            format.total_size()
        ),
        Ok(Outcome::Failed(())) => warn!("Playback ended before the first frame"),
        Err(e) => warn!("No first frame yet: {}", e),
    }

    let done = Arc::new(AtomicBool::new(false));
    let consumer = {
        let player = player.clone();
        let done = done.clone();
        thread::spawn(move || consume(&player, &done))
    };

    let stats = engine
        .join()
        .map_err(|_| anyhow::anyhow!("engine thread panicked"))?;
    done.store(true, Ordering::SeqCst);
    let checked = consumer
        .join()
        .map_err(|_| anyhow::anyhow!("consumer thread panicked"))?;

    info!(
        "Engine: {} frame(s) displayed ({} dispatched), {} format change(s), {} failed",
        stats.frames,
        player.frames_dispatched(),
        stats.format_changes,
        stats.failed_frames
    );
    info!(
        "Consumer: {} intact, {} blank, {} torn",
        checked.intact, checked.blank, checked.torn
    );
    if checked.torn > 0 {
        bail!("consumer observed {} torn frame(s)", checked.torn);
    }

    if let Some(path) = &args.snapshot {
        save_snapshot(&snapshot, path)?;
    }

    Ok(())
}

/// Render callback for the demo: counts frames, requests the resize and
/// keeps the RGB copy of RV32 frames for the snapshot
fn build_render(
    args: &Args,
    chroma: Chroma,
    snapshot: Snapshot,
    commands: Arc<OnceLock<Sender<EngineCommand>>>,
) -> Box<dyn RenderCallback> {
    let keep_snapshot = args.snapshot.is_some();
    let mut adapter = (chroma == Chroma::RV32).then(|| {
        RenderCallbackAdapter::new(0, 0, move |rgb: &[u32], width, height| {
            if keep_snapshot {
                *snapshot.lock() = Some((rgb.to_vec(), width, height));
            }
        })
    });
    if adapter.is_none() && keep_snapshot {
        warn!("Snapshots need RV32 frames, {} frames will not be saved", chroma);
    }

    let resize_at = args.resize_at;
    let resized = (args.width / 2, args.height / 2);
    let mut frames = 0u64;

    Box::new(move |planes: &FramePlanes<'_>, format: &BufferFormat| {
        frames += 1;
        if Some(frames) == resize_at {
            if let Some(commands) = commands.get() {
                debug!("Requesting resize to {}x{}", resized.0, resized.1);
                let _ = commands.send(EngineCommand::Resize {
                    width: resized.0.max(1),
                    height: resized.1.max(1),
                });
            }
        }
        if let Some(adapter) = adapter.as_mut() {
            adapter.display(planes, format);
        }
    })
}

/// Read-lock and check frames until the engine has finished
fn consume(player: &DirectPlayer, done: &AtomicBool) -> ConsumerStats {
    let mut stats = ConsumerStats::default();
    while !done.load(Ordering::SeqCst) {
        match player.lock() {
            Ok(guard) => {
                if let Some(planes) = guard.planes() {
                    match check_frame(&planes) {
                        FrameCheck::Intact(_) => stats.intact += 1,
                        FrameCheck::Blank => stats.blank += 1,
                        FrameCheck::Torn => {
                            error!("Torn frame observed");
                            stats.torn += 1;
                        }
                    }
                }
            }
            Err(e) => {
                error!("Failed to lock frame: {}", e);
                break;
            }
        }
        thread::sleep(Duration::from_millis(1));
    }
    stats
}

fn save_snapshot(snapshot: &Snapshot, path: &Path) -> Result<()> {
    let guard = snapshot.lock();
    let Some((pixels, width, height)) = guard.as_ref() else {
        warn!("No RV32 frame to save");
        return Ok(());
    };

    let (width, height) = (*width, *height);
    let image = RgbImage::from_fn(width, height, |x, y| {
        let pixel = pixels[(y * width + x) as usize];
        Rgb([(pixel >> 16) as u8, (pixel >> 8) as u8, pixel as u8])
    });
    image
        .save(path)
        .with_context(|| format!("failed to save snapshot to {}", path.display()))?;
    info!("Saved {}x{} snapshot to {}", width, height, path.display());
    Ok(())
}
