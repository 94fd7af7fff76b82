use auroral_core::{Frame, OutputBackend, Result};

/// In-memory output backend: keeps the last written frame instead of
/// driving hardware. Used by the demo loop and handy as a standby mirror.
pub struct LoopbackOutput {
    identifier: String,
    priority: i32,
    light_count: usize,
    frames_written: u64,
    last_frame: Option<Frame>,
}

impl LoopbackOutput {
    pub fn new(identifier: &str, priority: i32, light_count: usize) -> Self {
        Self {
            identifier: identifier.to_string(),
            priority,
            light_count,
            frames_written: 0,
            last_frame: None,
        }
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn last_frame(&self) -> Option<&Frame> {
        self.last_frame.as_ref()
    }
}

impl OutputBackend for LoopbackOutput {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn version(&self) -> &str {
        "loopback-1"
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn light_count(&self) -> usize {
        self.light_count
    }

    fn initialize(&mut self) -> bool {
        true
    }

    fn shutdown(&mut self) -> bool {
        self.last_frame = None;
        true
    }

    fn update_color(&mut self, frame: &Frame) -> Result<()> {
        self.update_all(frame)
    }

    fn update_brightness(&mut self, frame: &Frame) -> Result<()> {
        self.update_all(frame)
    }

    fn update_all(&mut self, frame: &Frame) -> Result<()> {
        self.frames_written += 1;
        self.last_frame = Some(frame.clone());
        Ok(())
    }
}
