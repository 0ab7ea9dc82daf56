use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use sysinfo::System;
use tracing::debug;

/// Default sampling cadence.
pub const SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// Always-on sampler of system-wide CPU utilization.
///
/// Independent of test sessions: it keeps sampling while nothing is running
/// (baseline visibility) and while a session burns, from startup until
/// [`stop`](Self::stop). Each sample is pushed to the observer and cached
/// for pull-style reads.
pub struct UtilizationMonitor {
    running: Arc<AtomicBool>,
    latest: Arc<Mutex<f32>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl UtilizationMonitor {
    /// Starts sampling on the default one-second cadence.
    pub fn start<F>(observer: F) -> Self
    where
        F: Fn(f32) + Send + 'static,
    {
        Self::with_interval(SAMPLE_INTERVAL, observer)
    }

    pub fn with_interval<F>(interval: Duration, observer: F) -> Self
    where
        F: Fn(f32) + Send + 'static,
    {
        // sysinfo needs a minimum gap between refreshes for usable numbers.
        let interval = interval.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        let running = Arc::new(AtomicBool::new(true));
        let latest = Arc::new(Mutex::new(0.0_f32));

        let thread_running = Arc::clone(&running);
        let thread_latest = Arc::clone(&latest);
        let handle = thread::spawn(move || {
            let mut sys = System::new();
            sys.refresh_cpu_usage();
            debug!("utilization monitor started");
            while thread_running.load(Ordering::SeqCst) {
                thread::sleep(interval);
                sys.refresh_cpu_usage();
                let usage = sys.global_cpu_usage();
                *thread_latest.lock().unwrap() = usage;
                observer(usage);
            }
            debug!("utilization monitor stopped");
        });

        Self {
            running,
            latest,
            handle: Some(handle),
        }
    }

    /// Most recent sample.
    pub fn latest(&self) -> f32 {
        *self.latest.lock().unwrap()
    }

    /// Tears the sampler down and waits for its thread to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for UtilizationMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}
