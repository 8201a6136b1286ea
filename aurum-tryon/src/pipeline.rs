//! Frame pump
//!
//! Feeds camera frames to the hand and face detector workers and routes
//! their results into [`TryOnApp`]. The two detectors run independently:
//! each gets a new frame only once its previous result has been consumed,
//! and their results are handled in whatever order they arrive.

use std::time::{Duration, Instant};

use crate::app::TryOnApp;
use crate::camera::CameraFrame;
use crate::tracking::{DetectorWorker, FaceLandmarks, HandLandmarks, LandmarkDetector};

pub struct FramePump {
    hands: DetectorWorker<HandLandmarks>,
    faces: DetectorWorker<FaceLandmarks>,
    /// Most recent camera frame; the face result is drawn over it
    latest_frame: Option<CameraFrame>,
    /// Per-detector frames skipped because the detector was busy
    dropped_hand_frames: u64,
    dropped_face_frames: u64,
}

impl FramePump {
    pub fn new(hands: DetectorWorker<HandLandmarks>, faces: DetectorWorker<FaceLandmarks>) -> Self {
        Self {
            hands,
            faces,
            latest_frame: None,
            dropped_hand_frames: 0,
            dropped_face_frames: 0,
        }
    }

    /// Spawn one worker per detector
    pub fn spawn<H, F>(hand_detector: H, face_detector: F) -> Result<Self, String>
    where
        H: LandmarkDetector<Output = HandLandmarks>,
        F: LandmarkDetector<Output = FaceLandmarks>,
    {
        Ok(Self::new(
            DetectorWorker::spawn(hand_detector)?,
            DetectorWorker::spawn(face_detector)?,
        ))
    }

    /// Offer a new camera frame to both detectors
    pub fn push_frame(&mut self, frame: CameraFrame) {
        if !self.faces.submit(&frame) {
            self.dropped_face_frames += 1;
        }
        if !self.hands.submit(&frame) {
            self.dropped_hand_frames += 1;
        }
        self.latest_frame = Some(frame);
    }

    /// Hand every ready result to the app. Returns how many were handled.
    pub fn dispatch(&mut self, app: &mut TryOnApp, now: Instant) -> usize {
        let mut handled = 0;

        if let Some(detection) = self.faces.try_recv() {
            if let Some(ref frame) = self.latest_frame {
                app.on_face_detection(frame, &detection);
            }
            handled += 1;
        }

        if let Some(detection) = self.hands.try_recv() {
            app.on_hand_detection(&detection, now);
            handled += 1;
        }

        handled
    }

    /// Block until both detectors are idle (or `timeout` passes),
    /// dispatching results as they arrive.
    pub fn drain(&mut self, app: &mut TryOnApp, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        while self.hands.is_busy() || self.faces.is_busy() {
            let now = Instant::now();
            if now >= deadline {
                log::warn!("Detectors still busy after {:?}", timeout);
                break;
            }
            if self.dispatch(app, now) == 0 {
                std::thread::sleep(Duration::from_millis(1));
            }
        }
    }

    pub fn dropped_frames(&self) -> (u64, u64) {
        (self.dropped_hand_frames, self.dropped_face_frames)
    }

    pub fn latest_frame(&self) -> Option<&CameraFrame> {
        self.latest_frame.as_ref()
    }
}
