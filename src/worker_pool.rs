use std::io;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::burner;
use crate::config::TestConfig;
use crate::error::LaunchError;
use crate::stop_signal::StopSignal;

/// One forked burner process. Everything outside the pool sees it only as a
/// liveness boolean.
pub struct WorkerHandle {
    pid: libc::pid_t,
    launched_at: Instant,
    reaped: bool,
}

impl WorkerHandle {
    fn new(pid: libc::pid_t) -> Self {
        Self {
            pid,
            launched_at: Instant::now(),
            reaped: false,
        }
    }

    /// Non-blocking liveness check; reaps the child once it has exited.
    pub fn is_alive(&mut self) -> bool {
        if self.reaped {
            return false;
        }
        let mut status = 0;
        match unsafe { libc::waitpid(self.pid, &mut status, libc::WNOHANG) } {
            0 => true,
            _ => {
                debug!(pid = self.pid, elapsed = ?self.launched_at.elapsed(), "worker exited");
                self.reaped = true;
                false
            }
        }
    }

    /// Forcibly ends the worker; a no-op once it has been reaped.
    pub fn terminate(&mut self) {
        if self.reaped {
            return;
        }
        unsafe {
            libc::kill(self.pid, libc::SIGKILL);
            let mut status = 0;
            libc::waitpid(self.pid, &mut status, 0);
        }
        debug!(pid = self.pid, "worker terminated");
        self.reaped = true;
    }
}

/// Forks exactly `config.worker_count` burner processes, all sharing one
/// stop signal and one deadline computed before the first fork so every
/// worker ends at the same wall-clock time.
///
/// If a fork fails, the workers already launched are rolled back (signal
/// set, children terminated and reaped) before the error is surfaced.
pub fn launch(config: &TestConfig, signal: &StopSignal) -> Result<Vec<WorkerHandle>, LaunchError> {
    let deadline = Instant::now() + Duration::from_secs(config.duration);
    let mut workers = Vec::with_capacity(config.worker_count);

    for _ in 0..config.worker_count {
        let pid = unsafe { libc::fork() };
        if pid == 0 {
            // Child: burn until done, then leave without unwinding any
            // parent state.
            burner::run(config.max_usage, config.speed_factor, signal, deadline);
            unsafe { libc::_exit(0) };
        } else if pid > 0 {
            workers.push(WorkerHandle::new(pid));
        } else {
            let err = io::Error::last_os_error();
            signal.set();
            terminate_all(&mut workers);
            return Err(LaunchError::Fork(err));
        }
    }

    debug!(count = workers.len(), "workers launched");
    Ok(workers)
}

/// True iff every worker has exited. Non-blocking; callers poll.
pub fn all_finished(workers: &mut [WorkerHandle]) -> bool {
    workers.iter_mut().all(|worker| !worker.is_alive())
}

/// Forcibly ends every still-alive worker. Idempotent; already-finished
/// workers are skipped.
pub fn terminate_all(workers: &mut [WorkerHandle]) {
    for worker in workers {
        worker.terminate();
    }
}
