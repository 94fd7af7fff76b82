use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::{AuroralError, DeviceConfig, Result};

/// Full brightness for a pixel.
pub const BRIGHTNESS_MAX: u8 = u8::MAX;
/// Darkness; a pixel at minimum brightness shows nothing regardless of
/// color.
pub const BRIGHTNESS_MIN: u8 = u8::MIN;

/// How a dequeued frame should be merged onto the currently displayed
/// state. The renderer defines the math; the queue only tags frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlendMode {
    /// Merge with the existing layer, brighter pixels winning.
    #[default]
    Combine,
    /// Discard the existing layer entirely.
    Replace,
}

/// A single light: RGB color plus brightness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pixel {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub brightness: u8,
}

impl Pixel {
    pub fn new(red: u8, green: u8, blue: u8, brightness: u8) -> Self {
        Self {
            red,
            green,
            blue,
            brightness,
        }
    }

    /// Whether this pixel contributes anything to the output: any color
    /// channel or the brightness is nonzero.
    pub fn has_effect(&self) -> bool {
        self.red > 0 || self.green > 0 || self.blue > 0 || self.brightness > 0
    }
}

/// One complete set of pixels for the whole strand. The length is fixed at
/// device-configuration time and checked on every queue hand-off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pixels: Vec<Pixel>,
    blend_mode: BlendMode,
}

impl Frame {
    /// A dark frame at full brightness, ready for colors to be painted in.
    pub fn blank(light_count: usize) -> Self {
        Self::filled(light_count, Pixel::new(0, 0, 0, BRIGHTNESS_MAX))
    }

    /// A fully dark frame, brightness included.
    pub fn cleared(light_count: usize) -> Self {
        Self::filled(light_count, Pixel::default())
    }

    fn filled(light_count: usize, pixel: Pixel) -> Self {
        Self {
            pixels: vec![pixel; light_count],
            blend_mode: BlendMode::default(),
        }
    }

    pub fn from_pixels(pixels: Vec<Pixel>) -> Self {
        Self {
            pixels,
            blend_mode: BlendMode::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn pixels(&self) -> &[Pixel] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [Pixel] {
        &mut self.pixels
    }

    /// Blend mode stamped by the queue when the frame was dequeued.
    pub fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    fn has_effect(&self) -> bool {
        self.pixels.iter().any(Pixel::has_effect)
    }
}

struct QueueInner {
    pending: VecDeque<Frame>,
    /// Live buffer: the frame an animation is currently building.
    lights: Frame,
    /// Snapshot of the last frame handed to the output system, kept as a
    /// fade baseline.
    last_processed: Frame,
    blend_mode: BlendMode,
    idle_time_ms: u64,
    animation_active: bool,
    force_frame_request: bool,
}

/// Thread-safe FIFO of rendered frames between the animation thread and
/// the output thread.
///
/// The pending queue, live buffer, and last-processed snapshot live behind
/// one mutex, so a multi-pixel copy can never interleave with a concurrent
/// enqueue. No operation blocks on I/O while holding the lock; hardware
/// writes happen outside, in the output layer.
pub struct FrameQueue {
    light_count: usize,
    inner: Mutex<QueueInner>,
}

impl FrameQueue {
    /// Creates a queue of blank frames at full brightness.
    pub fn new(config: &DeviceConfig) -> Result<Self> {
        Self::with_initial_frame(config, Frame::blank(config.light_count))
    }

    /// Creates a queue with all lights off, brightness included.
    pub fn new_cleared(config: &DeviceConfig) -> Result<Self> {
        Self::with_initial_frame(config, Frame::cleared(config.light_count))
    }

    /// Creates a queue seeded from a previously shown frame, so a new
    /// animation can fade out of the old one.
    pub fn from_previous_frame(config: &DeviceConfig, frame: Frame) -> Result<Self> {
        check_length(frame.len(), config.light_count)?;
        Self::with_initial_frame(config, frame)
    }

    fn with_initial_frame(config: &DeviceConfig, frame: Frame) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            light_count: config.light_count,
            inner: Mutex::new(QueueInner {
                pending: VecDeque::new(),
                lights: frame.clone(),
                last_processed: frame,
                blend_mode: BlendMode::default(),
                idle_time_ms: 0,
                animation_active: false,
                force_frame_request: false,
            }),
        })
    }

    /// Number of lights every frame must carry.
    pub fn light_count(&self) -> usize {
        self.light_count
    }

    /// Appends a copy of the given frame to the tail. Fails with
    /// [`AuroralError::SizeMismatch`] when the length is wrong, leaving the
    /// queue untouched.
    pub fn push_frame(&self, frame: &Frame) -> Result<()> {
        check_length(frame.len(), self.light_count)?;
        let mut inner = self.lock();
        inner.pending.push_back(frame.clone());
        inner.idle_time_ms = 0;
        Ok(())
    }

    /// Appends a copy of the current live buffer.
    pub fn push_current(&self) {
        let mut inner = self.lock();
        let frame = inner.lights.clone();
        inner.pending.push_back(frame);
        inner.idle_time_ms = 0;
    }

    /// Appends either the live buffer or, when `use_last_queued` is set and
    /// frames are pending, a copy of the current tail. Lets a running
    /// animation keep building on its own latest frame instead of a
    /// possibly stale live buffer.
    pub fn push_current_or_tail(&self, use_last_queued: bool) {
        let mut inner = self.lock();
        let frame = if use_last_queued {
            inner.pending.back().unwrap_or(&inner.lights).clone()
        } else {
            inner.lights.clone()
        };
        inner.pending.push_back(frame);
        inner.idle_time_ms = 0;
    }

    /// Pops the head frame, stamped with the queue's current blend mode.
    /// Returns `None` when nothing is pending; an empty queue is routine,
    /// not an error.
    pub fn pop(&self) -> Option<Frame> {
        let mut inner = self.lock();
        let blend_mode = inner.blend_mode;
        inner.pending.pop_front().map(|mut frame| {
            frame.blend_mode = blend_mode;
            frame
        })
    }

    /// Copies the live buffer into the last-processed snapshot.
    pub fn mark_processed(&self) {
        let mut inner = self.lock();
        inner.last_processed = inner.lights.clone();
    }

    /// Drops all pending frames. Called on animation switch and on
    /// shutdown, so a stalled output backend cannot hold a backlog of stale
    /// frames.
    pub fn clear(&self) {
        self.lock().pending.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.lock().pending.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    /// Whether the queue would produce any visible output: an active
    /// animation, pending frames, or a live pixel that lights up.
    pub fn has_visible_effect(&self) -> bool {
        let inner = self.lock();
        inner.animation_active || !inner.pending.is_empty() || inner.lights.has_effect()
    }

    /// Caller-owned copy of the live buffer.
    pub fn live_frame(&self) -> Frame {
        self.lock().lights.clone()
    }

    /// Replaces the live buffer with a copy of the given frame.
    pub fn set_live_frame(&self, frame: &Frame) -> Result<()> {
        check_length(frame.len(), self.light_count)?;
        self.lock().lights = frame.clone();
        Ok(())
    }

    /// Caller-owned copy of the last frame handed to the output system.
    pub fn last_processed(&self) -> Frame {
        self.lock().last_processed.clone()
    }

    pub fn blend_mode(&self) -> BlendMode {
        self.lock().blend_mode
    }

    pub fn set_blend_mode(&self, mode: BlendMode) {
        self.lock().blend_mode = mode;
    }

    pub fn animation_active(&self) -> bool {
        self.lock().animation_active
    }

    pub fn set_animation_active(&self, active: bool) {
        self.lock().animation_active = active;
    }

    /// Set when the next output-loop iteration should render a frame even
    /// though nothing is queued.
    pub fn set_force_frame_request(&self, force: bool) {
        self.lock().force_frame_request = force;
    }

    /// Reads and clears the force-frame flag.
    pub fn take_force_frame_request(&self) -> bool {
        let mut inner = self.lock();
        std::mem::take(&mut inner.force_frame_request)
    }

    /// How long the queue has sat idle, in milliseconds.
    pub fn idle_time_ms(&self) -> u64 {
        self.lock().idle_time_ms
    }

    /// Accumulates idle time; the output loop calls this on cycles where
    /// nothing was dequeued. Any enqueue resets the counter.
    pub fn add_idle_time(&self, delta_ms: u64) {
        let mut inner = self.lock();
        inner.idle_time_ms = inner.idle_time_ms.saturating_add(delta_ms);
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        // A poisoned lock means a panic while a buffer was mid-copy; the
        // frame state can no longer be trusted, so abort loudly.
        self.inner.lock().expect("frame queue lock poisoned")
    }
}

impl std::fmt::Debug for FrameQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameQueue")
            .field("light_count", &self.light_count)
            .finish()
    }
}

fn check_length(actual: usize, expected: usize) -> Result<()> {
    if actual != expected {
        return Err(AuroralError::SizeMismatch { actual, expected });
    }
    Ok(())
}
