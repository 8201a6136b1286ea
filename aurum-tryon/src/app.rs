//! Application state for the try-on mirror
//!
//! `TryOnApp` owns every stateful component (navigation, gesture cooldown,
//! auto-try sequencer, canvas, gallery) and is the surface the UI layer
//! talks to. Detector results and timer polls arrive through it; anything
//! the UI should react to is queued as an [`AppEvent`].

use std::sync::Arc;
use std::time::Instant;

use crate::assets::{AssetCache, AssetList, AssetSource, DirectoryAssetSource};
use crate::autotry::{AutoTryError, AutoTrySequencer, Snapshot, StepOutcome};
use crate::camera::CameraFrame;
use crate::catalog::Category;
use crate::compositor::{OverlayCompositor, RasterCanvas};
use crate::config::AppConfig;
use crate::gesture::{GestureClassifier, NavDirection};
use crate::navigation::{NavigationController, NavigationError, Selection};
use crate::tracking::{Detection, FaceLandmarks, HandLandmarks};

/// Something the UI layer should show
#[derive(Clone, Debug, PartialEq)]
pub enum AppEvent {
    /// A gesture moved the selection (indicator flash)
    GestureAccepted(NavDirection),
    /// A snapshot was taken (camera flash)
    SnapshotCaptured,
    /// The gallery should be shown with this many snapshots
    GalleryReady(usize),
    /// Blocking notice for the user
    Notice(String),
    AutoTryStarted,
    AutoTryFinished,
}

/// Main application state
pub struct TryOnApp {
    navigation: NavigationController,
    gestures: GestureClassifier,
    sequencer: AutoTrySequencer,
    compositor: OverlayCompositor,
    /// Last composited frame; snapshots read from here
    canvas: RasterCanvas,

    hand_detected: bool,
    gallery: Vec<Snapshot>,
    gallery_visible: bool,
    events: Vec<AppEvent>,
}

impl TryOnApp {
    /// Create the app with an explicit asset source
    pub fn new(config: &AppConfig, source: Arc<dyn AssetSource>) -> Self {
        let cache = if config.background_asset_loading {
            AssetCache::with_background_loader(source)
        } else {
            AssetCache::new(source)
        };

        Self {
            navigation: NavigationController::new(config.catalog(), cache),
            gestures: GestureClassifier::new(config.gesture.clone()),
            sequencer: AutoTrySequencer::new(config.auto_try.clone()),
            compositor: OverlayCompositor::new(config.overlay.clone()),
            canvas: RasterCanvas::default(),
            hand_detected: false,
            gallery: Vec::new(),
            gallery_visible: false,
            events: Vec::new(),
        }
    }

    /// Create the app reading catalog images from `config.asset_root`
    pub fn from_config(config: &AppConfig) -> Self {
        log::info!("Asset root: {:?}", config.asset_root);
        Self::new(config, Arc::new(DirectoryAssetSource::new(config.asset_root.clone())))
    }

    // ── Detector results ────────────────────────────────────────────────

    /// Handle one hand detector result
    pub fn on_hand_detection(&mut self, detection: &Detection<HandLandmarks>, now: Instant) {
        let hand = detection.primary();
        self.hand_detected = hand.is_some();

        // Automated and manual navigation never interleave
        if self.sequencer.is_running() {
            return;
        }

        if let Some(direction) = self.gestures.classify(hand, now) {
            log::info!("Gesture: {:?}", direction);
            self.navigation.navigate(direction);
            self.events.push(AppEvent::GestureAccepted(direction));
        }
    }

    /// Handle one face detector result by redrawing the canvas
    pub fn on_face_detection(&mut self, frame: &CameraFrame, detection: &Detection<FaceLandmarks>) {
        self.compositor.compose(
            &mut self.canvas,
            frame,
            detection.primary(),
            self.navigation.selection(),
        );
    }

    /// Fire due timers (call once per loop iteration)
    pub fn update(&mut self, now: Instant) {
        let captured_before = self.sequencer.captured();
        let Some(outcome) = self.sequencer.poll(&mut self.navigation, &self.canvas, now) else {
            return;
        };
        match outcome {
            StepOutcome::Scheduled { .. } => {
                if self.sequencer.captured() > captured_before {
                    self.events.push(AppEvent::SnapshotCaptured);
                }
            }
            StepOutcome::Finished { snapshots } => {
                if snapshots.len() > captured_before {
                    self.events.push(AppEvent::SnapshotCaptured);
                }
                self.finish_auto_try(snapshots);
            }
        }
    }

    // ── UI actions ──────────────────────────────────────────────────────

    pub fn set_category(&mut self, name: &str) -> Result<(), NavigationError> {
        self.navigation.set_category(name).map(|_| ())
    }

    /// Step the active slot. `false` if nothing could be navigated.
    pub fn navigate(&mut self, direction: NavDirection) -> bool {
        self.navigation.navigate(direction)
    }

    /// Thumbnail pick (0-based index)
    pub fn select_explicit(&mut self, category: &str, index: usize) -> Result<(), NavigationError> {
        self.navigation.select_explicit(category, index)
    }

    /// The "Try All" button: start a run, or stop the one in progress
    pub fn toggle_try_all(&mut self, now: Instant) {
        if self.navigation.active_category().is_none() {
            self.events
                .push(AppEvent::Notice(AutoTryError::NoActiveCategory.to_string()));
            return;
        }
        if self.sequencer.is_running() {
            self.stop_auto_try();
        } else {
            self.start_auto_try(now);
        }
    }

    /// Begin an auto-try run. Returns `false` if it could not start.
    pub fn start_auto_try(&mut self, now: Instant) -> bool {
        match self.sequencer.start(&mut self.navigation, now) {
            Ok(outcome) => {
                self.gallery.clear();
                self.events.push(AppEvent::AutoTryStarted);
                if let StepOutcome::Finished { snapshots } = outcome {
                    self.finish_auto_try(snapshots);
                }
                true
            }
            Err(AutoTryError::NoActiveCategory) => {
                self.events
                    .push(AppEvent::Notice(AutoTryError::NoActiveCategory.to_string()));
                false
            }
            Err(e) => {
                log::warn!("{}", e);
                false
            }
        }
    }

    /// Cancel a running auto-try; captured snapshots still go to the
    /// gallery.
    pub fn stop_auto_try(&mut self) {
        if let Some(snapshots) = self.sequencer.stop() {
            self.finish_auto_try(snapshots);
        }
    }

    /// Capture the canvas into the gallery and show it
    pub fn capture_single_snapshot(&mut self) -> bool {
        match Snapshot::capture(&self.canvas) {
            Ok(snapshot) => {
                self.gallery.push(snapshot);
                self.events.push(AppEvent::SnapshotCaptured);
                self.show_gallery();
                true
            }
            Err(e) => {
                log::warn!("Snapshot failed: {}", e);
                false
            }
        }
    }

    pub fn close_gallery(&mut self) {
        self.gallery_visible = false;
    }

    fn finish_auto_try(&mut self, snapshots: Vec<Snapshot>) {
        self.events.push(AppEvent::AutoTryFinished);
        if !snapshots.is_empty() {
            self.gallery = snapshots;
            self.show_gallery();
        }
    }

    fn show_gallery(&mut self) {
        self.gallery_visible = true;
        self.events.push(AppEvent::GalleryReady(self.gallery.len()));
    }

    // ── Observable state ────────────────────────────────────────────────

    pub fn hand_detected(&self) -> bool {
        self.hand_detected
    }

    pub fn is_auto_try_running(&self) -> bool {
        self.sequencer.is_running()
    }

    pub fn gallery(&self) -> &[Snapshot] {
        &self.gallery
    }

    pub fn is_gallery_visible(&self) -> bool {
        self.gallery_visible
    }

    pub fn selection(&self) -> &Selection {
        self.navigation.selection()
    }

    pub fn active_category(&self) -> Option<&Category> {
        self.navigation.active_category()
    }

    /// Handles of the active category, for thumbnails
    pub fn thumbnails(&self) -> Option<AssetList> {
        self.navigation.active_assets()
    }

    pub fn canvas(&self) -> &RasterCanvas {
        &self.canvas
    }

    /// When the auto-try sequencer next needs `update`
    pub fn next_timer(&self) -> Option<Instant> {
        self.sequencer.next_due()
    }

    /// Take all queued events
    pub fn drain_events(&mut self) -> Vec<AppEvent> {
        std::mem::take(&mut self.events)
    }
}
