use std::io;
use std::mem;
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::LaunchError;
use crate::worker_pool::{self, WorkerHandle};

/// Cooperative stop flag shared with every worker in a session.
///
/// Backed by a single `AtomicBool` in anonymous `MAP_SHARED` memory, so the
/// flag stays genuinely shared across `fork`: workers read the same byte the
/// controller writes. Monotonic per session: once set it is never cleared,
/// each new session allocates a fresh signal instead.
pub struct StopSignal {
    flag: *mut AtomicBool,
}

// The mapping stays valid for the signal's lifetime and every access goes
// through the atomic.
unsafe impl Send for StopSignal {}
unsafe impl Sync for StopSignal {}

impl StopSignal {
    pub fn new() -> Result<Self, LaunchError> {
        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                mem::size_of::<AtomicBool>(),
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(LaunchError::SharedFlag(io::Error::last_os_error()));
        }
        let flag = ptr.cast::<AtomicBool>();
        unsafe { flag.write(AtomicBool::new(false)) };
        Ok(Self { flag })
    }

    pub fn set(&self) {
        unsafe { &*self.flag }.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        unsafe { &*self.flag }.load(Ordering::SeqCst)
    }
}

impl Drop for StopSignal {
    fn drop(&mut self) {
        // Children hold their own reference to the mapping; unmapping here
        // only drops the parent's view.
        unsafe {
            libc::munmap(self.flag.cast(), mem::size_of::<AtomicBool>());
        }
    }
}

/// Owns one session's stop signal and both shutdown paths.
pub struct StopCoordinator {
    signal: StopSignal,
}

impl StopCoordinator {
    /// Allocates a fresh signal so a prior session's stop state can never
    /// leak into a new one.
    pub fn new() -> Result<Self, LaunchError> {
        Ok(Self { signal: StopSignal::new()? })
    }

    pub fn signal(&self) -> &StopSignal {
        &self.signal
    }

    /// Sets the signal and lets workers wind down on their own; every
    /// worker observes it within one burner tick.
    pub fn request_graceful_stop(&self) {
        self.signal.set();
    }

    /// Sets the signal and forcibly ends every worker without waiting for
    /// cooperative exit.
    pub fn request_emergency_stop(&self, workers: &mut [WorkerHandle]) {
        self.signal.set();
        worker_pool::terminate_all(workers);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_cleared_and_stays_set() {
        let signal = StopSignal::new().unwrap();
        assert!(!signal.is_set());
        signal.set();
        assert!(signal.is_set());
        signal.set();
        assert!(signal.is_set());
    }

    #[test]
    fn each_coordinator_gets_a_fresh_signal() {
        let first = StopCoordinator::new().unwrap();
        first.request_graceful_stop();
        assert!(first.signal().is_set());

        let second = StopCoordinator::new().unwrap();
        assert!(!second.signal().is_set());
    }
}
