//! Recorded sessions
//!
//! A replay script is a JSON recording of what the hand and face models
//! reported for each frame, plus the UI actions a user performed and the
//! frame at which they did so. Replay detectors answer from the recording,
//! which lets the whole pipeline run headless.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{FaceLandmarks, HandLandmarks, Landmark, LandmarkDetector};
use crate::camera::CameraFrame;
use crate::gesture::NavDirection;

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("Failed to read replay {0}: {1}")]
    Io(String, #[source] std::io::Error),
    #[error("Failed to parse replay: {0}")]
    Parse(#[from] serde_json::Error),
}

fn default_fps() -> u32 {
    30
}

/// What the models saw in one frame
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ReplayFrame {
    #[serde(default)]
    pub hand: Option<Vec<Landmark>>,
    #[serde(default)]
    pub face: Option<Vec<Landmark>>,
}

/// A UI action performed during the recording
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum UiAction {
    SetCategory { category: String },
    Navigate { direction: NavDirection },
    Select { category: String, index: usize },
    TryAll,
    Stop,
    Snapshot,
    CloseGallery,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScriptedAction {
    pub frame: u64,
    #[serde(flatten)]
    pub action: UiAction,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ReplayScript {
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default)]
    pub frames: Vec<ReplayFrame>,
    #[serde(default)]
    pub actions: Vec<ScriptedAction>,
}

impl ReplayScript {
    pub fn load(path: &Path) -> Result<Self, ReplayError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ReplayError::Io(path.display().to_string(), e))?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ReplayError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Interval between frames
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps.max(1) as f64)
    }

    /// Recorded frame for `frame_number`; the last frame holds once the
    /// recording runs out.
    pub fn frame(&self, frame_number: u64) -> Option<&ReplayFrame> {
        let last = self.frames.len().checked_sub(1)?;
        let index = usize::try_from(frame_number).unwrap_or(usize::MAX).min(last);
        self.frames.get(index)
    }

    /// Actions scheduled for one frame, in script order
    pub fn actions_at(&self, frame_number: u64) -> impl Iterator<Item = &UiAction> + '_ {
        self.actions
            .iter()
            .filter(move |a| a.frame == frame_number)
            .map(|a| &a.action)
    }

    /// Number of recorded frames
    pub fn len(&self) -> u64 {
        self.frames.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Answers hand detection from a recording
pub struct ReplayHandDetector {
    script: Arc<ReplayScript>,
    latency: Duration,
}

impl ReplayHandDetector {
    pub fn new(script: Arc<ReplayScript>) -> Self {
        Self {
            script,
            latency: Duration::ZERO,
        }
    }

    /// Simulated inference time per frame
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

impl LandmarkDetector for ReplayHandDetector {
    type Output = HandLandmarks;

    fn name(&self) -> &'static str {
        "hand"
    }

    fn detect(&mut self, frame: &CameraFrame) -> Result<Vec<HandLandmarks>, String> {
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        let Some(points) = self
            .script
            .frame(frame.frame_number)
            .and_then(|f| f.hand.as_ref())
        else {
            return Ok(Vec::new());
        };
        HandLandmarks::from_slice(points)
            .map(|hand| vec![hand])
            .ok_or_else(|| format!("frame {}: hand needs 21 landmarks, got {}", frame.frame_number, points.len()))
    }
}

/// Answers face detection from a recording
pub struct ReplayFaceDetector {
    script: Arc<ReplayScript>,
    latency: Duration,
}

impl ReplayFaceDetector {
    pub fn new(script: Arc<ReplayScript>) -> Self {
        Self {
            script,
            latency: Duration::ZERO,
        }
    }

    /// Simulated inference time per frame
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

impl LandmarkDetector for ReplayFaceDetector {
    type Output = FaceLandmarks;

    fn name(&self) -> &'static str {
        "face"
    }

    fn detect(&mut self, frame: &CameraFrame) -> Result<Vec<FaceLandmarks>, String> {
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        let Some(points) = self
            .script
            .frame(frame.frame_number)
            .and_then(|f| f.face.as_ref())
        else {
            return Ok(Vec::new());
        };
        FaceLandmarks::new(points.clone())
            .map(|face| vec![face])
            .ok_or_else(|| format!("frame {}: face mesh too small ({} landmarks)", frame.frame_number, points.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;
    use std::time::Instant;

    const SCRIPT: &str = r#"{
        "fps": 20,
        "frames": [
            {},
            { "hand": [] }
        ],
        "actions": [
            { "frame": 0, "action": "set_category", "category": "gold_earrings" },
            { "frame": 0, "action": "try_all" },
            { "frame": 3, "action": "navigate", "direction": "next" },
            { "frame": 4, "action": "select", "category": "gold_necklaces", "index": 2 }
        ]
    }"#;

    fn frame(n: u64) -> CameraFrame {
        CameraFrame::new(Arc::new(RgbaImage::new(1, 1)), n, Instant::now())
    }

    #[test]
    fn test_parse_actions() {
        let script = ReplayScript::from_json(SCRIPT).unwrap();
        assert_eq!(script.fps, 20);
        assert_eq!(script.frame_interval(), Duration::from_millis(50));

        let first: Vec<_> = script.actions_at(0).cloned().collect();
        assert_eq!(
            first,
            vec![
                UiAction::SetCategory {
                    category: "gold_earrings".to_string()
                },
                UiAction::TryAll,
            ]
        );
        assert_eq!(
            script.actions_at(3).next(),
            Some(&UiAction::Navigate {
                direction: NavDirection::Next
            })
        );
        assert_eq!(script.actions_at(1).count(), 0);
    }

    #[test]
    fn test_last_frame_holds() {
        let script = ReplayScript::from_json(SCRIPT).unwrap();
        assert!(script.frame(0).unwrap().hand.is_none());
        assert!(script.frame(1).unwrap().hand.is_some());
        assert!(script.frame(99).unwrap().hand.is_some());
        assert!(ReplayScript::default().frame(0).is_none());
    }

    #[test]
    fn test_hand_detector_from_recording() {
        let mut points = vec![Landmark::new(0.5, 0.5); 21];
        points[8] = Landmark::new(0.9, 0.5);
        let script = Arc::new(ReplayScript {
            fps: 30,
            frames: vec![
                ReplayFrame::default(),
                ReplayFrame {
                    hand: Some(points),
                    face: None,
                },
            ],
            actions: Vec::new(),
        });
        let mut detector = ReplayHandDetector::new(script);

        assert!(detector.detect(&frame(0)).unwrap().is_empty());
        let hands = detector.detect(&frame(1)).unwrap();
        assert_eq!(hands.len(), 1);
        assert_eq!(hands[0].point(8), Landmark::new(0.9, 0.5));
    }

    #[test]
    fn test_malformed_hand_is_an_error() {
        let script = Arc::new(ReplayScript::from_json(SCRIPT).unwrap());
        let mut detector = ReplayHandDetector::new(script);
        assert!(detector.detect(&frame(1)).is_err());
    }

    #[test]
    fn test_face_detector_from_recording() {
        let script = Arc::new(ReplayScript {
            fps: 30,
            frames: vec![ReplayFrame {
                hand: None,
                face: Some(vec![Landmark::new(0.5, 0.5); 478]),
            }],
            actions: Vec::new(),
        });
        let mut detector = ReplayFaceDetector::new(script);
        let faces = detector.detect(&frame(0)).unwrap();
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].points.len(), 478);
    }
}
