//! Aurum Try-On - gesture-driven AR jewelry mirror
//!
//! Tracks a hand and a face in a live camera feed, lets the user browse a
//! jewelry catalog by pointing left or right, draws the selected pieces onto
//! the mirrored video anchored to face landmarks, and can sweep through a
//! whole category on a timer, capturing a snapshot of each item.
//!
//! Landmark models, camera access and the UI itself are outside this crate;
//! they plug in through [`tracking::LandmarkDetector`],
//! [`camera::FrameSource`] and the [`app::TryOnApp`] surface.

pub mod app;
pub mod assets;
pub mod autotry;
pub mod camera;
pub mod catalog;
pub mod compositor;
pub mod config;
pub mod gesture;
pub mod navigation;
pub mod pipeline;
pub mod tracking;

pub use app::{AppEvent, TryOnApp};
pub use config::AppConfig;
