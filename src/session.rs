use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use tracing::{debug, warn};

use crate::config::TestConfig;
use crate::error::SessionError;
use crate::stop_signal::StopCoordinator;
use crate::worker_pool::{self, WorkerHandle};

/// Cadence of the completion poll while a session is active.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Lifecycle of a test session. Terminal states return to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Starting,
    Running,
    Stopping,
    EmergencyStopping,
    Completed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Starting => "starting",
            SessionState::Running => "running",
            SessionState::Stopping => "stopping",
            SessionState::EmergencyStopping => "emergency-stopping",
            SessionState::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// One line of the operator-facing log stream.
#[derive(Debug, Clone)]
pub struct Event {
    pub timestamp: DateTime<Local>,
    pub message: String,
}

struct Session {
    config: TestConfig,
    coordinator: StopCoordinator,
    workers: Vec<WorkerHandle>,
    started_at: Instant,
}

struct Inner {
    state: SessionState,
    session: Option<Session>,
    events: Sender<Event>,
    state_observer: Option<Box<dyn Fn(SessionState) + Send>>,
}

impl Inner {
    fn emit(&self, message: impl Into<String>) {
        let event = Event {
            timestamp: Local::now(),
            message: message.into(),
        };
        let _ = self.events.send(event);
    }

    fn set_state(&mut self, next: SessionState) {
        if self.state == next {
            return;
        }
        debug!(from = %self.state, to = %next, "state transition");
        self.state = next;
        if let Some(observer) = &self.state_observer {
            observer(next);
        }
    }

    fn poll_completion(&mut self) {
        if !matches!(self.state, SessionState::Running | SessionState::Stopping) {
            return;
        }
        let finished = match self.session.as_mut() {
            Some(session) => worker_pool::all_finished(&mut session.workers),
            None => true,
        };
        if !finished {
            return;
        }

        let stopping = self.state == SessionState::Stopping;
        let session = self.session.take();
        if stopping {
            self.emit("stress test stopped");
            self.set_state(SessionState::Idle);
        } else {
            self.set_state(SessionState::Completed);
            if let Some(session) = &session {
                self.emit(format!(
                    "stress test completed: {} workers ran for {}s",
                    session.config.worker_count,
                    session.started_at.elapsed().as_secs()
                ));
            }
            self.set_state(SessionState::Idle);
        }
    }
}

/// Orchestrates test sessions: validates commands, drives the worker pool
/// and stop coordinator, and emits log events and state transitions for the
/// presentation layer to consume.
///
/// Workers are isolated processes whose exit must be observed
/// asynchronously, so completion detection polls liveness on a fixed
/// cadence instead of blocking on exit; the command surface stays
/// responsive the whole time. All commands are serialized through one
/// mutex-guarded state machine.
pub struct SessionController {
    inner: Arc<Mutex<Inner>>,
    poller_running: Arc<AtomicBool>,
    poller: Option<thread::JoinHandle<()>>,
}

impl SessionController {
    /// Creates a controller plus the receiving end of its event stream.
    pub fn new() -> (Self, Receiver<Event>) {
        Self::with_poll_interval(POLL_INTERVAL)
    }

    /// Same as [`new`](Self::new) with a custom completion-poll cadence.
    pub fn with_poll_interval(poll_interval: Duration) -> (Self, Receiver<Event>) {
        let (events, receiver) = mpsc::channel();
        let inner = Arc::new(Mutex::new(Inner {
            state: SessionState::Idle,
            session: None,
            events,
            state_observer: None,
        }));
        let poller_running = Arc::new(AtomicBool::new(true));

        let poller_inner = Arc::clone(&inner);
        let running = Arc::clone(&poller_running);
        let poller = thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                thread::sleep(poll_interval);
                poller_inner.lock().unwrap().poll_completion();
            }
        });

        let controller = Self {
            inner,
            poller_running,
            poller: Some(poller),
        };
        (controller, receiver)
    }

    /// Registers an observer pushed on every state transition. The callback
    /// runs with the controller's lock held and must not call back in.
    pub fn on_state_change<F>(&self, observer: F)
    where
        F: Fn(SessionState) + Send + 'static,
    {
        self.inner.lock().unwrap().state_observer = Some(Box::new(observer));
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().unwrap().state
    }

    /// Validates the config and launches the session's workers. Exactly one
    /// session may be active at a time.
    pub fn start_session(&self, config: TestConfig) -> Result<(), SessionError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.state != SessionState::Idle {
            return Err(SessionError::AlreadyActive);
        }
        config.validate()?;

        inner.set_state(SessionState::Starting);
        inner.emit(format!(
            "starting stress test: {} workers, max usage {}%, speed {}%, duration {}s",
            config.worker_count, config.max_usage, config.speed_factor, config.duration
        ));

        let coordinator = match StopCoordinator::new() {
            Ok(coordinator) => coordinator,
            Err(err) => {
                inner.emit(format!("failed to start stress test: {err}"));
                inner.set_state(SessionState::Idle);
                return Err(err.into());
            }
        };
        match worker_pool::launch(&config, coordinator.signal()) {
            Ok(workers) => {
                inner.session = Some(Session {
                    config,
                    coordinator,
                    workers,
                    started_at: Instant::now(),
                });
                inner.set_state(SessionState::Running);
                Ok(())
            }
            Err(err) => {
                inner.emit(format!("failed to launch workers: {err}"));
                inner.set_state(SessionState::Idle);
                Err(err.into())
            }
        }
    }

    /// Requests a cooperative stop: workers exit at their next tick boundary
    /// and the completion poll observes them. With nothing running this is
    /// an informational no-op, and it is idempotent while already stopping.
    pub fn request_stop(&self) {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            SessionState::Running => {
                if let Some(session) = &inner.session {
                    session.coordinator.request_graceful_stop();
                }
                inner.emit("stop requested, waiting for workers to wind down");
                inner.set_state(SessionState::Stopping);
            }
            SessionState::Stopping | SessionState::EmergencyStopping => {}
            _ => inner.emit("no stress test is running"),
        }
    }

    /// Terminates every worker immediately, bypassing cooperative exit.
    /// For when releasing the CPU matters more than a clean unwind.
    pub fn request_emergency_stop(&self) {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            SessionState::Running | SessionState::Stopping => {
                inner.set_state(SessionState::EmergencyStopping);
                if let Some(mut session) = inner.session.take() {
                    session.coordinator.request_emergency_stop(&mut session.workers);
                }
                warn!("emergency stop triggered");
                inner.emit("emergency stop: all workers terminated");
                inner.set_state(SessionState::Idle);
            }
            _ => inner.emit("no stress test is running"),
        }
    }

    /// Stops the completion poller and tears the controller down; an active
    /// session is emergency-stopped on drop.
    pub fn shutdown(mut self) {
        self.poller_running.store(false, Ordering::SeqCst);
        if let Some(poller) = self.poller.take() {
            let _ = poller.join();
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.poller_running.store(false, Ordering::SeqCst);
        let mut inner = self.inner.lock().unwrap();
        if let Some(mut session) = inner.session.take() {
            session.coordinator.request_emergency_stop(&mut session.workers);
            inner.state = SessionState::Idle;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;

    #[test]
    fn stop_with_nothing_running_is_informational() {
        let (controller, events) = SessionController::new();
        controller.request_stop();
        let event = events.recv_timeout(Duration::from_secs(1)).unwrap();
        assert!(event.message.contains("no stress test"));
        assert_eq!(controller.state(), SessionState::Idle);
        controller.shutdown();
    }

    #[test]
    fn invalid_config_is_rejected_before_any_launch() {
        let (controller, _events) = SessionController::new();
        let config = TestConfig {
            duration: 0,
            ..TestConfig::default()
        };
        let err = controller.start_session(config).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Validation(ValidationError::DurationNotPositive(0))
        ));
        assert_eq!(controller.state(), SessionState::Idle);
        controller.shutdown();
    }
}
