use std::cmp::Ordering;

use crate::{AuroralError, Frame, Result};

/// Lifecycle state of a single output backend.
///
/// `Uninitialized → Initializing → Ready → (ShuttingDown → Uninitialized)`
/// with `Failed` reachable from `Initializing` and `ShuttingDown`. Each
/// backend's transitions are independent; resetting one never touches
/// another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendState {
    Uninitialized,
    Initializing,
    Ready,
    ShuttingDown,
    Failed,
}

/// Capability contract a concrete hardware backend implements. The core
/// defines only inputs and success/failure; the wire protocol to the
/// controller chip lives entirely in the implementation.
///
/// `initialize` and `shutdown` return `false` for ordinary
/// hardware-not-present conditions rather than erroring; only contract
/// violations are errors.
pub trait OutputBackend: Send {
    /// Stable identifier for this backend, e.g. the connection name.
    fn identifier(&self) -> &str;

    /// Version string reported by the hardware or protocol.
    fn version(&self) -> &str;

    /// Selection priority; lower values are preferred.
    fn priority(&self) -> i32;

    /// Number of lights the attached hardware drives.
    fn light_count(&self) -> usize;

    /// Connects to and prepares the hardware.
    fn initialize(&mut self) -> bool;

    /// Releases the hardware.
    fn shutdown(&mut self) -> bool;

    /// Pushes the color components of a frame, ignoring brightness.
    fn update_color(&mut self, frame: &Frame) -> Result<()>;

    /// Pushes the brightness components of a frame, ignoring color.
    fn update_brightness(&mut self, frame: &Frame) -> Result<()>;

    /// Pushes both color and brightness.
    fn update_all(&mut self, frame: &Frame) -> Result<()>;
}

/// Whether frames go only to the preferred backend or to every backend
/// that is ready. Kept configurable; standby mirrors are a deliberate
/// deployment choice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RoutingPolicy {
    /// Route to the highest-priority ready backend; the rest are standby.
    #[default]
    TopPriority,
    /// Mirror every frame to all ready backends.
    FanOut,
}

/// Callback invoked whenever a backend changes lifecycle state.
pub type StatusObserver = Box<dyn Fn(&str, BackendState) + Send>;

struct ManagedBackend {
    backend: Box<dyn OutputBackend>,
    state: BackendState,
    resetting: bool,
}

impl ManagedBackend {
    fn cmp_priority(&self, other: &Self) -> Ordering {
        self.backend.priority().cmp(&other.backend.priority())
    }
}

/// Read-only view of one managed backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendStatus {
    pub identifier: String,
    pub version: String,
    pub priority: i32,
    pub state: BackendState,
    pub resetting: bool,
}

/// Owns every registered output backend, keeps them in priority order, and
/// drives their lifecycle.
pub struct OutputManager {
    backends: Vec<ManagedBackend>,
    policy: RoutingPolicy,
    observers: Vec<StatusObserver>,
}

impl OutputManager {
    pub fn new(policy: RoutingPolicy) -> Self {
        Self {
            backends: Vec::new(),
            policy,
            observers: Vec::new(),
        }
    }

    pub fn routing_policy(&self) -> RoutingPolicy {
        self.policy
    }

    /// Adds a backend in `Uninitialized` state, keeping the list sorted by
    /// ascending priority. Registration order breaks ties.
    pub fn register(&mut self, backend: Box<dyn OutputBackend>) {
        self.backends.push(ManagedBackend {
            backend,
            state: BackendState::Uninitialized,
            resetting: false,
        });
        self.backends.sort_by(ManagedBackend::cmp_priority);
    }

    /// Registers a callback for backend state changes.
    pub fn subscribe(&mut self, observer: StatusObserver) {
        self.observers.push(observer);
    }

    /// Status of every backend in priority order.
    pub fn statuses(&self) -> Vec<BackendStatus> {
        self.backends
            .iter()
            .map(|entry| BackendStatus {
                identifier: entry.backend.identifier().to_string(),
                version: entry.backend.version().to_string(),
                priority: entry.backend.priority(),
                state: entry.state,
                resetting: entry.resetting,
            })
            .collect()
    }

    /// Identifier of the backend frames currently route to, if any is
    /// ready.
    pub fn selected_backend(&self) -> Option<String> {
        self.backends
            .iter()
            .find(|entry| entry.state == BackendState::Ready)
            .map(|entry| entry.backend.identifier().to_string())
    }

    /// Brings a backend up. Hardware-not-present is recoverable: the
    /// backend is marked `Failed` and [`AuroralError::BackendUnavailable`]
    /// is returned so the caller may retry or fall back.
    pub fn initialize(&mut self, identifier: &str) -> Result<()> {
        let index = self.find(identifier)?;
        self.set_state(index, BackendState::Initializing);
        let up = self.backends[index].backend.initialize();
        if up {
            self.set_state(index, BackendState::Ready);
            Ok(())
        } else {
            self.set_state(index, BackendState::Failed);
            Err(AuroralError::BackendUnavailable {
                identifier: identifier.to_string(),
            })
        }
    }

    /// Takes a backend down, ending in `Uninitialized` on success or
    /// `Failed` when the hardware did not release cleanly.
    pub fn shutdown(&mut self, identifier: &str) -> Result<()> {
        let index = self.find(identifier)?;
        self.set_state(index, BackendState::ShuttingDown);
        let down = self.backends[index].backend.shutdown();
        if down {
            self.set_state(index, BackendState::Uninitialized);
            Ok(())
        } else {
            self.set_state(index, BackendState::Failed);
            Err(AuroralError::BackendUnavailable {
                identifier: identifier.to_string(),
            })
        }
    }

    /// Shutdown followed by initialize. The backend is flagged as
    /// resetting for the whole window so other components can suppress
    /// writes; the flag clears even when either half fails. Safe to invoke
    /// at any time, including while another backend initializes.
    pub fn reset(&mut self, identifier: &str) -> Result<()> {
        let index = self.find(identifier)?;
        self.backends[index].resetting = true;
        let result = self
            .shutdown(identifier)
            .and_then(|_| self.initialize(identifier));
        self.backends[index].resetting = false;
        result
    }

    /// Whether the named backend is mid-reset.
    pub fn is_resetting(&self, identifier: &str) -> Result<bool> {
        let index = self.find(identifier)?;
        Ok(self.backends[index].resetting)
    }

    /// Checks a frame against the routing target's light count without
    /// sending it.
    pub fn validate_frame(&self, frame: &Frame) -> Result<()> {
        let index = self.first_ready()?;
        check_frame(&self.backends[index], frame)
    }

    /// Sends color and brightness to the selected backend(s).
    pub fn write_all(&mut self, frame: &Frame) -> Result<()> {
        self.route(frame, |backend, frame| backend.update_all(frame))
    }

    /// Sends only the color components.
    pub fn write_color(&mut self, frame: &Frame) -> Result<()> {
        self.route(frame, |backend, frame| backend.update_color(frame))
    }

    /// Sends only the brightness components.
    pub fn write_brightness(&mut self, frame: &Frame) -> Result<()> {
        self.route(frame, |backend, frame| backend.update_brightness(frame))
    }

    /// Sends a full frame to one named backend regardless of priority.
    /// Rejected with [`AuroralError::BackendUnavailable`] unless that
    /// backend is `Ready` and not resetting.
    pub fn write_all_to(&mut self, identifier: &str, frame: &Frame) -> Result<()> {
        let index = self.find(identifier)?;
        let entry = &mut self.backends[index];
        if entry.state != BackendState::Ready || entry.resetting {
            return Err(AuroralError::BackendUnavailable {
                identifier: identifier.to_string(),
            });
        }
        check_frame(entry, frame)?;
        entry.backend.update_all(frame)
    }

    /// Shuts down every backend that is still up. Called once at process
    /// exit.
    pub fn shutdown_all(&mut self) {
        let identifiers: Vec<String> = self
            .backends
            .iter()
            .filter(|entry| entry.state == BackendState::Ready)
            .map(|entry| entry.backend.identifier().to_string())
            .collect();
        for identifier in identifiers {
            let _ = self.shutdown(&identifier);
        }
    }

    fn route<F>(&mut self, frame: &Frame, mut send: F) -> Result<()>
    where
        F: FnMut(&mut dyn OutputBackend, &Frame) -> Result<()>,
    {
        match self.policy {
            RoutingPolicy::TopPriority => {
                let index = self.first_ready()?;
                check_frame(&self.backends[index], frame)?;
                send(self.backends[index].backend.as_mut(), frame)
            }
            RoutingPolicy::FanOut => {
                let mut delivered = false;
                for entry in &mut self.backends {
                    if entry.state != BackendState::Ready || entry.resetting {
                        continue;
                    }
                    check_frame(entry, frame)?;
                    send(entry.backend.as_mut(), frame)?;
                    delivered = true;
                }
                if delivered {
                    Ok(())
                } else {
                    Err(AuroralError::BackendUnavailable {
                        identifier: "<none ready>".to_string(),
                    })
                }
            }
        }
    }

    fn first_ready(&self) -> Result<usize> {
        self.backends
            .iter()
            .position(|entry| entry.state == BackendState::Ready && !entry.resetting)
            .ok_or_else(|| AuroralError::BackendUnavailable {
                identifier: "<none ready>".to_string(),
            })
    }

    fn find(&self, identifier: &str) -> Result<usize> {
        self.backends
            .iter()
            .position(|entry| entry.backend.identifier() == identifier)
            .ok_or_else(|| AuroralError::BackendUnavailable {
                identifier: identifier.to_string(),
            })
    }

    fn set_state(&mut self, index: usize, state: BackendState) {
        self.backends[index].state = state;
        let identifier = self.backends[index].backend.identifier().to_string();
        for observer in &self.observers {
            observer(&identifier, state);
        }
    }
}

impl std::fmt::Debug for OutputManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputManager")
            .field("policy", &self.policy)
            .field("backends", &self.backends.len())
            .finish()
    }
}

fn check_frame(entry: &ManagedBackend, frame: &Frame) -> Result<()> {
    let expected = entry.backend.light_count();
    if frame.len() != expected {
        return Err(AuroralError::SizeMismatch {
            actual: frame.len(),
            expected,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::{Arc, Mutex};

    use super::*;

    struct StubBackend {
        identifier: String,
        priority: i32,
        light_count: usize,
        responds: bool,
        frames_written: Arc<AtomicUsize>,
    }

    impl StubBackend {
        fn new(identifier: &str, priority: i32) -> Self {
            Self {
                identifier: identifier.to_string(),
                priority,
                light_count: 4,
                responds: true,
                frames_written: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn counter(&self) -> Arc<AtomicUsize> {
            self.frames_written.clone()
        }
    }

    impl OutputBackend for StubBackend {
        fn identifier(&self) -> &str {
            &self.identifier
        }

        fn version(&self) -> &str {
            "stub-1"
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn light_count(&self) -> usize {
            self.light_count
        }

        fn initialize(&mut self) -> bool {
            self.responds
        }

        fn shutdown(&mut self) -> bool {
            self.responds
        }

        fn update_color(&mut self, _frame: &Frame) -> Result<()> {
            self.frames_written.fetch_add(1, AtomicOrdering::SeqCst);
            Ok(())
        }

        fn update_brightness(&mut self, _frame: &Frame) -> Result<()> {
            self.frames_written.fetch_add(1, AtomicOrdering::SeqCst);
            Ok(())
        }

        fn update_all(&mut self, _frame: &Frame) -> Result<()> {
            self.frames_written.fetch_add(1, AtomicOrdering::SeqCst);
            Ok(())
        }
    }

    fn frame() -> Frame {
        Frame::blank(4)
    }

    #[test]
    fn routes_to_highest_priority_ready_backend() {
        let mut manager = OutputManager::new(RoutingPolicy::TopPriority);
        let preferred = StubBackend::new("usb", 1);
        let preferred_writes = preferred.counter();
        let standby = StubBackend::new("network", 5);
        let standby_writes = standby.counter();

        // Registration order should not matter; priority does.
        manager.register(Box::new(standby));
        manager.register(Box::new(preferred));
        manager.initialize("usb").unwrap();
        manager.initialize("network").unwrap();

        assert_eq!(manager.selected_backend().as_deref(), Some("usb"));
        manager.write_all(&frame()).unwrap();
        assert_eq!(preferred_writes.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(standby_writes.load(AtomicOrdering::SeqCst), 0);
    }

    #[test]
    fn fan_out_mirrors_to_every_ready_backend() {
        let mut manager = OutputManager::new(RoutingPolicy::FanOut);
        let first = StubBackend::new("usb", 1);
        let first_writes = first.counter();
        let second = StubBackend::new("network", 5);
        let second_writes = second.counter();

        manager.register(Box::new(first));
        manager.register(Box::new(second));
        manager.initialize("usb").unwrap();
        manager.initialize("network").unwrap();

        manager.write_all(&frame()).unwrap();
        assert_eq!(first_writes.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(second_writes.load(AtomicOrdering::SeqCst), 1);
    }

    #[test]
    fn unresponsive_hardware_is_recoverable_not_fatal() {
        let mut manager = OutputManager::new(RoutingPolicy::TopPriority);
        let mut backend = StubBackend::new("usb", 1);
        backend.responds = false;
        manager.register(Box::new(backend));

        let err = manager.initialize("usb").unwrap_err();
        assert!(matches!(err, AuroralError::BackendUnavailable { .. }));
        assert_eq!(manager.statuses()[0].state, BackendState::Failed);
    }

    #[test]
    fn reset_walks_the_full_lifecycle() {
        let mut manager = OutputManager::new(RoutingPolicy::TopPriority);
        manager.register(Box::new(StubBackend::new("usb", 1)));

        let transitions = Arc::new(Mutex::new(Vec::new()));
        let log = transitions.clone();
        manager.subscribe(Box::new(move |_, state| {
            log.lock().unwrap().push(state);
        }));

        manager.initialize("usb").unwrap();
        manager.reset("usb").unwrap();

        let seen = transitions.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                BackendState::Initializing,
                BackendState::Ready,
                BackendState::ShuttingDown,
                BackendState::Uninitialized,
                BackendState::Initializing,
                BackendState::Ready,
            ]
        );
        assert!(!manager.is_resetting("usb").unwrap());
    }

    #[test]
    fn frames_are_rejected_while_not_ready() {
        let mut manager = OutputManager::new(RoutingPolicy::TopPriority);
        manager.register(Box::new(StubBackend::new("usb", 1)));

        // Still uninitialized.
        let err = manager.write_all_to("usb", &frame()).unwrap_err();
        assert!(matches!(err, AuroralError::BackendUnavailable { .. }));

        manager.initialize("usb").unwrap();
        manager.shutdown("usb").unwrap();
        let err = manager.write_all(&frame()).unwrap_err();
        assert!(matches!(err, AuroralError::BackendUnavailable { .. }));
    }

    #[test]
    fn size_mismatch_is_reported_never_truncated() {
        let mut manager = OutputManager::new(RoutingPolicy::TopPriority);
        let backend = StubBackend::new("usb", 1);
        let writes = backend.counter();
        manager.register(Box::new(backend));
        manager.initialize("usb").unwrap();

        let err = manager.write_all(&Frame::blank(7)).unwrap_err();
        assert!(matches!(
            err,
            AuroralError::SizeMismatch {
                actual: 7,
                expected: 4
            }
        ));
        assert_eq!(writes.load(AtomicOrdering::SeqCst), 0);
    }

    #[test]
    fn validate_frame_checks_against_selected_backend() {
        let mut manager = OutputManager::new(RoutingPolicy::TopPriority);
        manager.register(Box::new(StubBackend::new("usb", 1)));
        manager.initialize("usb").unwrap();

        assert!(manager.validate_frame(&frame()).is_ok());
        assert!(manager.validate_frame(&Frame::blank(2)).is_err());
    }

    #[test]
    fn resetting_one_backend_leaves_others_untouched() {
        let mut manager = OutputManager::new(RoutingPolicy::TopPriority);
        manager.register(Box::new(StubBackend::new("usb", 1)));
        manager.register(Box::new(StubBackend::new("network", 5)));
        manager.initialize("usb").unwrap();
        manager.initialize("network").unwrap();

        manager.reset("usb").unwrap();
        let statuses = manager.statuses();
        assert_eq!(statuses[1].identifier, "network");
        assert_eq!(statuses[1].state, BackendState::Ready);
        assert!(!statuses[1].resetting);
    }

    #[test]
    fn shutdown_all_returns_backends_to_uninitialized() {
        let mut manager = OutputManager::new(RoutingPolicy::FanOut);
        manager.register(Box::new(StubBackend::new("usb", 1)));
        manager.register(Box::new(StubBackend::new("network", 5)));
        manager.initialize("usb").unwrap();
        manager.initialize("network").unwrap();

        manager.shutdown_all();
        for status in manager.statuses() {
            assert_eq!(status.state, BackendState::Uninitialized);
        }
    }
}
