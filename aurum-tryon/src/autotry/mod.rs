//! Auto-try sequencer
//!
//! Walks every item of the active category, waits a fixed delay on each so
//! the render loop can draw it, captures the canvas, and ends in a gallery
//! of snapshots.
//!
//! The sequencer is a plain state machine polled from the application
//! loop. The only pending work is a single deadline stored in the session,
//! so `stop()` cancels by dropping it.
//!
//! Captures read whatever the canvas holds at the moment the delay
//! elapses. Nothing forces a render first: if a camera-to-detector-to-
//! render round trip takes longer than the step delay, a snapshot can
//! still show the previous item.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::compositor::{Canvas, CanvasError};
use crate::navigation::NavigationController;

/// Sequencer timing
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoTryConfig {
    /// Time each item stays on screen before its capture
    pub step_delay_ms: u64,
}

impl Default for AutoTryConfig {
    fn default() -> Self {
        Self { step_delay_ms: 1500 }
    }
}

impl AutoTryConfig {
    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AutoTryError {
    #[error("Please select a sub-category (e.g. Gold Earrings) first!")]
    NoActiveCategory,
    #[error("Auto-try is already running")]
    AlreadyRunning,
}

/// One captured canvas
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    /// PNG-encoded pixels
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Snapshot {
    /// Encode the canvas as it is right now
    pub fn capture<C: Canvas + ?Sized>(canvas: &C) -> Result<Self, CanvasError> {
        let (width, height) = match canvas.size() {
            (0, _) | (_, 0) => (1, 1),
            size => size,
        };
        Ok(Self {
            png: canvas.export_png()?,
            width,
            height,
        })
    }
}

/// State of the sequencer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AutoTryState {
    Idle,
    Running,
}

/// A capture waiting for its delay to elapse
#[derive(Clone, Copy, Debug)]
struct PendingCapture {
    due_at: Instant,
}

/// Data of one run
#[derive(Debug, Default)]
struct AutoTrySession {
    step_index: usize,
    snapshots: Vec<Snapshot>,
    pending: Option<PendingCapture>,
}

/// What a call into the sequencer did
#[derive(Debug, PartialEq)]
pub enum StepOutcome {
    /// Item `step` is selected and will be captured at `due_at`
    Scheduled { step: usize, due_at: Instant },
    /// The run ended; carries every snapshot it captured (possibly none)
    Finished { snapshots: Vec<Snapshot> },
}

/// Timed sweep over the active category
#[derive(Debug, Default)]
pub struct AutoTrySequencer {
    config: AutoTryConfig,
    session: Option<AutoTrySession>,
}

impl AutoTrySequencer {
    pub fn new(config: AutoTryConfig) -> Self {
        Self {
            config,
            session: None,
        }
    }

    pub fn state(&self) -> AutoTryState {
        if self.session.is_some() {
            AutoTryState::Running
        } else {
            AutoTryState::Idle
        }
    }

    pub fn is_running(&self) -> bool {
        self.session.is_some()
    }

    /// Index of the item currently on screen
    pub fn step_index(&self) -> Option<usize> {
        self.session.as_ref().map(|s| s.step_index)
    }

    /// Snapshots captured so far in the current run
    pub fn captured(&self) -> usize {
        self.session.as_ref().map(|s| s.snapshots.len()).unwrap_or(0)
    }

    /// When the pending capture fires
    pub fn next_due(&self) -> Option<Instant> {
        self.session.as_ref()?.pending.map(|p| p.due_at)
    }

    /// Begin a run from item 0 and select it right away
    pub fn start(&mut self, nav: &mut NavigationController, now: Instant) -> Result<StepOutcome, AutoTryError> {
        if self.is_running() {
            return Err(AutoTryError::AlreadyRunning);
        }
        let Some(category) = nav.active_category() else {
            return Err(AutoTryError::NoActiveCategory);
        };
        log::info!("Auto-try started for {} ({} items)", category.name, category.item_count);

        self.session = Some(AutoTrySession::default());
        Ok(self.run_step(nav, now))
    }

    /// Fire the pending capture if its delay has elapsed.
    ///
    /// `None` when idle or when nothing is due yet.
    pub fn poll<C: Canvas + ?Sized>(
        &mut self,
        nav: &mut NavigationController,
        canvas: &C,
        now: Instant,
    ) -> Option<StepOutcome> {
        let session = self.session.as_mut()?;
        let pending = session.pending?;
        if now < pending.due_at {
            return None;
        }
        session.pending = None;

        match Snapshot::capture(canvas) {
            Ok(snapshot) => {
                log::info!("Auto-try captured item {}", session.step_index + 1);
                session.snapshots.push(snapshot);
            }
            Err(e) => log::warn!("Auto-try capture failed: {}", e),
        }
        session.step_index += 1;

        Some(self.run_step(nav, now))
    }

    /// Cancel the run. Returns the snapshots captured so far, or `None` if
    /// nothing was running.
    pub fn stop(&mut self) -> Option<Vec<Snapshot>> {
        let mut session = self.session.take()?;
        session.pending = None;
        log::info!("Auto-try stopped after {} snapshots", session.snapshots.len());
        Some(session.snapshots)
    }

    /// Select the current item and arm its capture, or finish the run once
    /// every item has been visited.
    fn run_step(&mut self, nav: &mut NavigationController, now: Instant) -> StepOutcome {
        let Some(session) = self.session.as_mut() else {
            return StepOutcome::Finished { snapshots: Vec::new() };
        };

        let len = nav.active_assets().map(|list| list.len()).unwrap_or(0);
        if session.step_index >= len || !nav.select_index(session.step_index) {
            let snapshots = self.session.take().map(|s| s.snapshots).unwrap_or_default();
            log::info!("Auto-try finished with {} snapshots", snapshots.len());
            return StepOutcome::Finished { snapshots };
        }

        let due_at = now + self.config.step_delay();
        session.pending = Some(PendingCapture { due_at });
        StepOutcome::Scheduled {
            step: session.step_index,
            due_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{AssetCache, AssetError, AssetSource};
    use crate::catalog::{Catalog, Category};
    use crate::compositor::RasterCanvas;
    use crate::gesture::NavDirection;
    use image::RgbaImage;
    use std::sync::Arc;

    struct BlankSource;

    impl AssetSource for BlankSource {
        fn load(&self, _category: &str, _number: usize) -> Result<RgbaImage, AssetError> {
            Ok(RgbaImage::new(1, 1))
        }
    }

    fn nav() -> NavigationController {
        let catalog = Catalog::new(vec![
            Category::new("gold_earrings", 5),
            Category::new("gold_necklaces", 3),
            Category::new("empty_necklaces", 0),
        ]);
        NavigationController::new(catalog, AssetCache::new(Arc::new(BlankSource)))
    }

    const STEP: Duration = Duration::from_millis(1500);

    #[test]
    fn test_start_requires_category() {
        let mut sequencer = AutoTrySequencer::default();
        let mut nav = nav();
        assert!(matches!(
            sequencer.start(&mut nav, Instant::now()),
            Err(AutoTryError::NoActiveCategory)
        ));
        assert_eq!(sequencer.state(), AutoTryState::Idle);
    }

    #[test]
    fn test_start_selects_first_item_immediately() {
        let mut sequencer = AutoTrySequencer::default();
        let mut nav = nav();
        nav.set_category("gold_earrings").unwrap();
        // Something else is on screen before the run
        nav.select_index(3);

        let t0 = Instant::now();
        let outcome = sequencer.start(&mut nav, t0).unwrap();
        assert_eq!(outcome, StepOutcome::Scheduled { step: 0, due_at: t0 + STEP });
        assert_eq!(sequencer.state(), AutoTryState::Running);
        assert_eq!(nav.selection().earring.as_ref().map(|h| h.index()), Some(0));
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let mut sequencer = AutoTrySequencer::default();
        let mut nav = nav();
        nav.set_category("gold_earrings").unwrap();
        let t0 = Instant::now();
        sequencer.start(&mut nav, t0).unwrap();
        assert!(matches!(
            sequencer.start(&mut nav, t0),
            Err(AutoTryError::AlreadyRunning)
        ));
    }

    #[test]
    fn test_full_run_visits_every_item_in_order() {
        let mut sequencer = AutoTrySequencer::default();
        let mut nav = nav();
        let canvas = RasterCanvas::new(4, 4);
        nav.set_category("gold_earrings").unwrap();

        let mut now = Instant::now();
        sequencer.start(&mut nav, now).unwrap();

        let mut visited = Vec::new();
        let mut finished = None;
        while finished.is_none() {
            visited.push(nav.selection().earring.as_ref().unwrap().index());
            // Nothing fires before the delay
            assert!(sequencer.poll(&mut nav, &canvas, now + STEP / 2).is_none());
            now += STEP;
            match sequencer.poll(&mut nav, &canvas, now) {
                Some(StepOutcome::Finished { snapshots }) => finished = Some(snapshots),
                Some(StepOutcome::Scheduled { .. }) => {}
                None => panic!("capture did not fire"),
            }
        }

        assert_eq!(visited, vec![0, 1, 2, 3, 4]);
        let snapshots = finished.unwrap();
        assert_eq!(snapshots.len(), 5);
        assert!(snapshots.iter().all(|s| (s.width, s.height) == (4, 4)));
        assert_eq!(sequencer.state(), AutoTryState::Idle);
    }

    #[test]
    fn test_stop_after_two_steps() {
        let mut sequencer = AutoTrySequencer::default();
        let mut nav = nav();
        let canvas = RasterCanvas::new(2, 2);
        nav.set_category("gold_earrings").unwrap();

        let t0 = Instant::now();
        sequencer.start(&mut nav, t0).unwrap();
        sequencer.poll(&mut nav, &canvas, t0 + STEP).unwrap();
        sequencer.poll(&mut nav, &canvas, t0 + STEP * 2).unwrap();
        assert_eq!(sequencer.captured(), 2);
        assert_eq!(sequencer.step_index(), Some(2));

        let snapshots = sequencer.stop().unwrap();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(sequencer.state(), AutoTryState::Idle);
        assert!(sequencer.next_due().is_none());

        // The cancelled capture never fires
        assert!(sequencer.poll(&mut nav, &canvas, t0 + STEP * 10).is_none());
        assert_eq!(nav.selection().earring.as_ref().map(|h| h.index()), Some(2));
    }

    #[test]
    fn test_stop_when_idle() {
        let mut sequencer = AutoTrySequencer::default();
        assert!(sequencer.stop().is_none());
    }

    #[test]
    fn test_empty_category_finishes_immediately() {
        let mut sequencer = AutoTrySequencer::default();
        let mut nav = nav();
        nav.set_category("empty_necklaces").unwrap();

        let outcome = sequencer.start(&mut nav, Instant::now()).unwrap();
        assert_eq!(outcome, StepOutcome::Finished { snapshots: Vec::new() });
        assert!(!sequencer.is_running());
    }

    #[test]
    fn test_next_step_delay_counts_from_capture() {
        let mut sequencer = AutoTrySequencer::new(AutoTryConfig { step_delay_ms: 100 });
        let mut nav = nav();
        let canvas = RasterCanvas::new(1, 1);
        nav.set_category("gold_necklaces").unwrap();

        let t0 = Instant::now();
        sequencer.start(&mut nav, t0).unwrap();
        // Polled late: the next deadline is measured from this poll
        let late = t0 + Duration::from_millis(250);
        let outcome = sequencer.poll(&mut nav, &canvas, late).unwrap();
        assert_eq!(
            outcome,
            StepOutcome::Scheduled {
                step: 1,
                due_at: late + Duration::from_millis(100)
            }
        );
    }

    #[test]
    fn test_manual_navigation_during_run_is_overwritten() {
        let mut sequencer = AutoTrySequencer::default();
        let mut nav = nav();
        let canvas = RasterCanvas::new(1, 1);
        nav.set_category("gold_necklaces").unwrap();

        let t0 = Instant::now();
        sequencer.start(&mut nav, t0).unwrap();
        nav.navigate(NavDirection::Previous);
        sequencer.poll(&mut nav, &canvas, t0 + STEP).unwrap();
        assert_eq!(nav.selection().necklace.as_ref().map(|h| h.index()), Some(1));
    }

    #[test]
    fn test_zero_sized_canvas_still_captures() {
        let mut sequencer = AutoTrySequencer::default();
        let mut nav = nav();
        let canvas = RasterCanvas::new(0, 0);
        nav.set_category("gold_necklaces").unwrap();

        let t0 = Instant::now();
        sequencer.start(&mut nav, t0).unwrap();
        sequencer.poll(&mut nav, &canvas, t0 + STEP).unwrap();
        assert_eq!(sequencer.captured(), 1);

        let snapshots = sequencer.stop().unwrap();
        assert_eq!((snapshots[0].width, snapshots[0].height), (1, 1));
    }
}
