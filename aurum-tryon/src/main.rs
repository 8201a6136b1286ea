//! Aurum Try-On - headless replay driver
//!
//! Plays a recorded session (landmarks per frame plus scripted UI actions)
//! through the detector workers in real time and writes every gallery that
//! surfaces to disk as PNG files.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;

use aurum_tryon::autotry::Snapshot;
use aurum_tryon::camera::{FrameSource, StillFrameSource};
use aurum_tryon::pipeline::FramePump;
use aurum_tryon::tracking::replay::{ReplayFaceDetector, ReplayHandDetector, ReplayScript, UiAction};
use aurum_tryon::{AppConfig, AppEvent, TryOnApp};

const DEFAULT_WIDTH: u32 = 1280;
const DEFAULT_HEIGHT: u32 = 720;

#[derive(Parser, Debug)]
#[command(name = "aurum-tryon", version, about = "Replay a recorded try-on session headless")]
struct Args {
    /// JSON config file (defaults are used when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Recorded session to replay
    #[arg(long)]
    replay: PathBuf,

    /// Directory for gallery PNGs
    #[arg(long, default_value = "gallery")]
    out: PathBuf,

    /// Still image used as the camera feed
    #[arg(long)]
    background: Option<PathBuf>,

    /// Simulated inference time per detector call
    #[arg(long, default_value_t = 30)]
    latency_ms: u64,
}

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Aurum Try-On v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(Args::parse()) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = match args.config {
        Some(ref path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    let script = Arc::new(ReplayScript::load(&args.replay)?);
    log::info!(
        "Replaying {} frames at {} fps ({} actions)",
        script.len(),
        script.fps,
        script.actions.len()
    );

    let mut frames = match args.background {
        Some(ref path) => StillFrameSource::open(path)?,
        None => StillFrameSource::solid(DEFAULT_WIDTH, DEFAULT_HEIGHT, [32, 32, 32, 255]),
    };

    let latency = Duration::from_millis(args.latency_ms);
    let mut pump = FramePump::spawn(
        ReplayHandDetector::new(script.clone()).with_latency(latency),
        ReplayFaceDetector::new(script.clone()).with_latency(latency),
    )?;
    let mut app = TryOnApp::from_config(&config);

    std::fs::create_dir_all(&args.out)?;

    // Keep going until the recording and every scripted action are done
    let last_frame = script
        .actions
        .iter()
        .map(|a| a.frame + 1)
        .max()
        .unwrap_or(0)
        .max(script.len());
    let interval = script.frame_interval();
    let mut next_frame_at = Instant::now();
    let mut galleries_written = 0;

    while let Some(frame) = frames.next_frame() {
        let frame_number = frame.frame_number;
        let now = Instant::now();

        for action in script.actions_at(frame_number) {
            apply_action(&mut app, action, now);
        }

        pump.push_frame(frame);
        pump.dispatch(&mut app, now);
        app.update(now);

        handle_events(&mut app, &args.out, &mut galleries_written)?;

        if frame_number + 1 >= last_frame && !app.is_auto_try_running() {
            break;
        }

        next_frame_at += interval;

        // Auto-try captures fire on their own deadline, not the next frame's
        while let Some(due) = app.next_timer().filter(|due| *due < next_frame_at) {
            sleep_until(due);
            app.update(Instant::now());
            handle_events(&mut app, &args.out, &mut galleries_written)?;
        }

        if !sleep_until(next_frame_at) {
            next_frame_at = Instant::now();
        }
    }

    pump.drain(&mut app, Duration::from_secs(2));

    let (dropped_hand, dropped_face) = pump.dropped_frames();
    log::info!(
        "Done: {} galleries written to {:?} (dropped frames: hand {}, face {})",
        galleries_written,
        args.out,
        dropped_hand,
        dropped_face
    );
    Ok(())
}

/// Sleep until `deadline`. Returns `false` if it had already passed.
fn sleep_until(deadline: Instant) -> bool {
    let now = Instant::now();
    if deadline > now {
        std::thread::sleep(deadline - now);
        true
    } else {
        false
    }
}

fn handle_events(app: &mut TryOnApp, out: &Path, galleries_written: &mut usize) -> std::io::Result<()> {
    for event in app.drain_events() {
        match event {
            AppEvent::GalleryReady(count) => {
                write_gallery(out, *galleries_written, app.gallery())?;
                log::info!("Gallery {} ready ({} snapshots)", galleries_written, count);
                *galleries_written += 1;
            }
            AppEvent::Notice(message) => log::warn!("Notice: {}", message),
            AppEvent::GestureAccepted(direction) => log::info!("Navigated {:?}", direction),
            other => log::debug!("{:?}", other),
        }
    }
    Ok(())
}

fn apply_action(app: &mut TryOnApp, action: &UiAction, now: Instant) {
    log::info!("Action: {:?}", action);
    match action {
        UiAction::SetCategory { category } => {
            if let Err(e) = app.set_category(category) {
                log::warn!("{}", e);
            }
        }
        UiAction::Navigate { direction } => {
            if !app.navigate(*direction) {
                log::warn!("Nothing to navigate");
            }
        }
        UiAction::Select { category, index } => {
            if let Err(e) = app.select_explicit(category, *index) {
                log::warn!("{}", e);
            }
        }
        UiAction::TryAll => app.toggle_try_all(now),
        UiAction::Stop => app.stop_auto_try(),
        UiAction::Snapshot => {
            app.capture_single_snapshot();
        }
        UiAction::CloseGallery => app.close_gallery(),
    }
}

fn write_gallery(out: &Path, gallery_index: usize, snapshots: &[Snapshot]) -> std::io::Result<()> {
    for (i, snapshot) in snapshots.iter().enumerate() {
        let path = out.join(format!("gallery_{:02}_{:02}.png", gallery_index, i + 1));
        std::fs::write(&path, &snapshot.png)?;
    }
    Ok(())
}
