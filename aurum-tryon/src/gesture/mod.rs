//! Pointing gesture classifier
//!
//! Turns one frame of hand landmarks into an optional navigation command.
//! The index finger pointing sideways (relative to its own knuckle) past a
//! threshold proportional to the palm size reads as next / previous.
//! Accepted commands are rate limited by a cooldown.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::tracking::{hand_index, HandLandmarks};

/// Navigation command
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NavDirection {
    /// Finger pointing toward screen right
    Next,
    /// Finger pointing toward screen left
    Previous,
}

impl NavDirection {
    /// Index step this direction applies
    pub fn delta(&self) -> isize {
        match self {
            NavDirection::Next => 1,
            NavDirection::Previous => -1,
        }
    }
}

/// Gesture thresholds
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Minimum time between two accepted commands
    pub cooldown_ms: u64,
    /// Finger extension threshold as a fraction of wrist-to-middle-knuckle
    /// distance
    pub threshold_ratio: f32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: 800,
            threshold_ratio: 0.4,
        }
    }
}

impl GestureConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

/// Direction the index finger points in, ignoring the cooldown.
///
/// Vertical pointing never produces a command, however far sideways the
/// fingertip also is.
pub fn classify_pointing(hand: &HandLandmarks, threshold_ratio: f32) -> Option<NavDirection> {
    let wrist = hand.point(hand_index::WRIST);
    let middle_knuckle = hand.point(hand_index::MIDDLE_KNUCKLE);
    let knuckle = hand.point(hand_index::INDEX_KNUCKLE);
    let tip = hand.point(hand_index::INDEX_TIP);

    let hand_scale = wrist.distance_2d(&middle_knuckle);
    let threshold = hand_scale * threshold_ratio;

    let dx = tip.x - knuckle.x;
    let dy = tip.y - knuckle.y;

    if dy.abs() >= threshold {
        return None;
    }

    if dx > threshold {
        Some(NavDirection::Next)
    } else if dx < -threshold {
        Some(NavDirection::Previous)
    } else {
        None
    }
}

/// Classifier with its cooldown gate
#[derive(Debug, Clone)]
pub struct GestureClassifier {
    config: GestureConfig,
    /// When the last command was accepted
    last_accepted: Option<Instant>,
}

impl Default for GestureClassifier {
    fn default() -> Self {
        Self::new(GestureConfig::default())
    }
}

impl GestureClassifier {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            last_accepted: None,
        }
    }

    /// Classify the primary hand of one frame.
    ///
    /// `None` for a frame without a hand (nothing is computed), for a
    /// neutral pose, and for a command that falls inside the cooldown.
    pub fn classify(&mut self, hand: Option<&HandLandmarks>, now: Instant) -> Option<NavDirection> {
        let hand = hand?;
        if !self.cooldown_elapsed(now) {
            return None;
        }

        let direction = classify_pointing(hand, self.config.threshold_ratio)?;
        self.last_accepted = Some(now);
        log::debug!("Gesture accepted: {:?}", direction);
        Some(direction)
    }

    /// Whether a command would be accepted at `now`
    pub fn cooldown_elapsed(&self, now: Instant) -> bool {
        match self.last_accepted {
            Some(last) => now.saturating_duration_since(last) >= self.config.cooldown(),
            None => true,
        }
    }

    /// When the last command was accepted
    pub fn last_accepted(&self) -> Option<Instant> {
        self.last_accepted
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }
}
