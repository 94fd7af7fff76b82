//! Core library for the Auroral audio-reactive LED controller.
//!
//! The crate covers the device-independent half of the system: turning raw
//! audio spectrum snapshots into smoothed intensity and frequency signals,
//! buffering rendered frames between the animation and output threads, and
//! managing heterogeneous hardware backends through a priority-ordered
//! lifecycle. Concrete animation visuals and wire protocols live in the
//! crates that embed this one.

pub mod analysis;
pub mod animation;
pub mod config;
pub mod error;
pub mod filter;
pub mod output;
pub mod queue;

pub use analysis::{AudioFeatures, FeatureExtractor, ProcessedBand};
pub use animation::{Animation, ColorShift, ReactiveBase, ShiftChannel, COLOR_MAX, COLOR_MIN};
pub use config::{BandBoundaries, DeviceConfig, FrequencyScale};
pub use error::{AuroralError, Result};
pub use filter::ScaledAverage;
pub use output::{
    BackendState, BackendStatus, OutputBackend, OutputManager, RoutingPolicy, StatusObserver,
};
pub use queue::{BlendMode, Frame, FrameQueue, Pixel, BRIGHTNESS_MAX, BRIGHTNESS_MIN};
