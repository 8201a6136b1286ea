//! Landmark tracking
//!
//! Hand and face landmark detection are external services: each one gets a
//! frame, thinks for a while, and reports zero or more landmark sets. Every
//! detector runs on its own worker thread behind a [`DetectorWorker`], which
//! accepts a new frame only after the previous result has been collected.
//! Frames that arrive while the detector is busy are dropped, never queued.

pub mod replay;

use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};

use crate::camera::CameraFrame;

/// Normalized landmark (x, y in [0, 1] relative to the frame)
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, z: 0.0 }
    }

    /// Planar distance to another landmark
    pub fn distance_2d(&self, other: &Landmark) -> f32 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

/// Hand landmark indices used by the gesture classifier
pub mod hand_index {
    pub const WRIST: usize = 0;
    pub const INDEX_KNUCKLE: usize = 5;
    pub const INDEX_TIP: usize = 8;
    pub const MIDDLE_KNUCKLE: usize = 9;
}

/// Number of landmarks in a hand
pub const HAND_LANDMARK_COUNT: usize = 21;

/// Minimum number of landmarks in a face mesh
pub const FACE_LANDMARK_MIN: usize = 468;

/// One tracked hand
#[derive(Clone, Debug, PartialEq)]
pub struct HandLandmarks {
    /// 21 landmarks
    pub points: [Landmark; HAND_LANDMARK_COUNT],
    /// Confidence score
    pub confidence: f32,
}

impl HandLandmarks {
    pub fn new(points: [Landmark; HAND_LANDMARK_COUNT]) -> Self {
        Self {
            points,
            confidence: 1.0,
        }
    }

    /// Build from a slice; `None` unless it has exactly 21 points
    pub fn from_slice(points: &[Landmark]) -> Option<Self> {
        let points: [Landmark; HAND_LANDMARK_COUNT] = points.try_into().ok()?;
        Some(Self::new(points))
    }

    pub fn point(&self, index: usize) -> Landmark {
        self.points[index]
    }
}

/// One tracked face mesh (468 points, 478 with iris refinement)
#[derive(Clone, Debug, PartialEq)]
pub struct FaceLandmarks {
    pub points: Vec<Landmark>,
}

impl FaceLandmarks {
    /// `None` if the mesh is smaller than the model's base topology
    pub fn new(points: Vec<Landmark>) -> Option<Self> {
        if points.len() < FACE_LANDMARK_MIN {
            return None;
        }
        Some(Self { points })
    }

    pub fn get(&self, index: usize) -> Option<Landmark> {
        self.points.get(index).copied()
    }
}

/// Result of running one detector on one frame
#[derive(Clone, Debug)]
pub struct Detection<L> {
    /// Frame number this result corresponds to
    pub frame_number: u64,
    /// Everything the detector found, primary detection first
    pub found: Vec<L>,
}

impl<L> Detection<L> {
    pub fn empty(frame_number: u64) -> Self {
        Self {
            frame_number,
            found: Vec::new(),
        }
    }

    /// The only detection the core looks at
    pub fn primary(&self) -> Option<&L> {
        self.found.first()
    }
}

/// A landmark model. Runs on a worker thread, one frame at a time.
pub trait LandmarkDetector: Send + 'static {
    type Output: Send + 'static;

    /// Short name for logs and thread names
    fn name(&self) -> &'static str;

    /// Run the model on one frame
    fn detect(&mut self, frame: &CameraFrame) -> Result<Vec<Self::Output>, String>;
}

/// Submit/consume wrapper around a detector thread
pub struct DetectorWorker<L> {
    name: &'static str,
    /// Channel to send frames to the detector thread
    frame_sender: Option<Sender<CameraFrame>>,
    /// Results in submission order
    result_receiver: Receiver<Detection<L>>,
    /// A frame was submitted and its result has not been consumed yet
    in_flight: bool,
    /// Detector thread handle
    thread_handle: Option<std::thread::JoinHandle<()>>,
}

impl<L: Send + 'static> DetectorWorker<L> {
    /// Spawn a worker thread for `detector`
    pub fn spawn<D>(detector: D) -> Result<Self, String>
    where
        D: LandmarkDetector<Output = L>,
    {
        let name = detector.name();
        let (frame_sender, frame_receiver) = crossbeam_channel::bounded::<CameraFrame>(1);
        let (result_sender, result_receiver) = crossbeam_channel::unbounded::<Detection<L>>();

        let thread_handle = std::thread::Builder::new()
            .name(format!("{}-detector", name))
            .spawn(move || Self::detector_thread(detector, frame_receiver, result_sender))
            .map_err(|e| format!("Failed to spawn {} detector thread: {}", name, e))?;

        Ok(Self {
            name,
            frame_sender: Some(frame_sender),
            result_receiver,
            in_flight: false,
            thread_handle: Some(thread_handle),
        })
    }

    fn detector_thread<D>(
        mut detector: D,
        frame_receiver: Receiver<CameraFrame>,
        result_sender: Sender<Detection<L>>,
    ) where
        D: LandmarkDetector<Output = L>,
    {
        log::info!("{} detector thread started", detector.name());

        while let Ok(frame) = frame_receiver.recv() {
            let detection = match detector.detect(&frame) {
                Ok(found) => Detection {
                    frame_number: frame.frame_number,
                    found,
                },
                Err(e) => {
                    // Reported as "nothing found" so the submit gate reopens
                    log::warn!("{} detector error: {}", detector.name(), e);
                    Detection::empty(frame.frame_number)
                }
            };
            if result_sender.send(detection).is_err() {
                break;
            }
        }

        log::info!("{} detector thread stopped", detector.name());
    }

    /// Detector name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether a submitted frame is still waiting to be consumed
    pub fn is_busy(&self) -> bool {
        self.in_flight
    }

    /// Hand a frame to the detector if it is idle.
    ///
    /// Returns `false` (frame dropped) while the previous result is still
    /// outstanding.
    pub fn submit(&mut self, frame: &CameraFrame) -> bool {
        if self.in_flight {
            return false;
        }
        let Some(ref sender) = self.frame_sender else {
            return false;
        };
        match sender.try_send(frame.clone()) {
            Ok(()) => {
                self.in_flight = true;
                true
            }
            Err(_) => false,
        }
    }

    /// Collect the outstanding result if it is ready (non-blocking)
    pub fn try_recv(&mut self) -> Option<Detection<L>> {
        let detection = self.result_receiver.try_recv().ok()?;
        self.in_flight = false;
        Some(detection)
    }

    /// Wait up to `timeout` for the outstanding result
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<Detection<L>> {
        if !self.in_flight {
            return None;
        }
        let detection = self.result_receiver.recv_timeout(timeout).ok()?;
        self.in_flight = false;
        Some(detection)
    }

}

impl<L> DetectorWorker<L> {
    /// Stop the detector thread
    pub fn stop(&mut self) {
        // Drop sender to signal thread to stop
        self.frame_sender = None;

        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl<L> Drop for DetectorWorker<L> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    use crossbeam_channel::Receiver;
    use image::RgbaImage;

    /// Detector that waits for a go signal before answering
    struct GatedDetector {
        gate: Receiver<()>,
    }

    impl LandmarkDetector for GatedDetector {
        type Output = u64;

        fn name(&self) -> &'static str {
            "gated"
        }

        fn detect(&mut self, frame: &CameraFrame) -> Result<Vec<u64>, String> {
            self.gate.recv().map_err(|e| e.to_string())?;
            Ok(vec![frame.frame_number])
        }
    }

    struct BrokenDetector;

    impl LandmarkDetector for BrokenDetector {
        type Output = u64;

        fn name(&self) -> &'static str {
            "broken"
        }

        fn detect(&mut self, _frame: &CameraFrame) -> Result<Vec<u64>, String> {
            Err("model not loaded".to_string())
        }
    }

    fn frame(n: u64) -> CameraFrame {
        CameraFrame::new(Arc::new(RgbaImage::new(2, 2)), n, Instant::now())
    }

    #[test]
    fn test_landmark_distance() {
        let a = Landmark::new(0.0, 0.0);
        let b = Landmark::new(0.3, 0.4);
        assert!((a.distance_2d(&b) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_hand_from_slice_requires_21_points() {
        let points = vec![Landmark::default(); 21];
        assert!(HandLandmarks::from_slice(&points).is_some());
        assert!(HandLandmarks::from_slice(&points[..20]).is_none());
    }

    #[test]
    fn test_face_requires_full_mesh() {
        assert!(FaceLandmarks::new(vec![Landmark::default(); 467]).is_none());
        assert!(FaceLandmarks::new(vec![Landmark::default(); 478]).is_some());
    }

    #[test]
    fn test_worker_drops_frames_while_busy() {
        let (go, gate) = crossbeam_channel::unbounded();
        let mut worker = DetectorWorker::spawn(GatedDetector { gate }).unwrap();

        assert!(worker.submit(&frame(0)));
        assert!(worker.is_busy());
        // Detector is still working on frame 0
        assert!(!worker.submit(&frame(1)));
        assert!(!worker.submit(&frame(2)));

        go.send(()).unwrap();
        let detection = worker.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(detection.frame_number, 0);
        assert_eq!(detection.primary(), Some(&0));
        assert!(!worker.is_busy());

        // Gate reopens after the result is consumed
        assert!(worker.submit(&frame(3)));
        go.send(()).unwrap();
        let detection = worker.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(detection.frame_number, 3);
    }

    #[test]
    fn test_worker_reports_errors_as_empty() {
        let mut worker = DetectorWorker::spawn(BrokenDetector).unwrap();
        assert!(worker.submit(&frame(7)));
        let detection = worker.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(detection.frame_number, 7);
        assert!(detection.primary().is_none());
    }

    #[test]
    fn test_stopped_worker_refuses_frames() {
        let mut worker = DetectorWorker::spawn(BrokenDetector).unwrap();
        worker.stop();
        assert!(!worker.submit(&frame(0)));
        assert!(!worker.is_busy());
        // Dropping after an explicit stop is fine
        drop(worker);
    }
}
