//! CPU stress/burn-in load generator.
//!
//! Forks paced burner processes to saturate cores on demand, coordinates
//! graceful and emergency shutdown across them, and samples system-wide CPU
//! utilization for live feedback. A presentation layer issues commands
//! through [`SessionController`] and consumes its event stream; the
//! [`UtilizationMonitor`] runs independently of any session.
//!
//! Unix-only: workers are forked processes, forced termination is SIGKILL,
//! and the shared stop flag lives in anonymous shared memory.

pub mod burner;
pub mod config;
pub mod cpu_monitor;
pub mod error;
pub mod session;
pub mod stop_signal;
pub mod worker_pool;

pub use config::TestConfig;
pub use cpu_monitor::UtilizationMonitor;
pub use error::{LaunchError, SessionError, ValidationError};
pub use session::{Event, SessionController, SessionState};
pub use stop_signal::{StopCoordinator, StopSignal};
pub use worker_pool::WorkerHandle;
