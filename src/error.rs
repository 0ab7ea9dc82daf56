use std::io;

use thiserror::Error;

/// Rejected configuration input. Raised before any resource is allocated,
/// so the controller stays idle.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("duration is required")]
    DurationMissing,
    #[error("duration must be a whole number of seconds, got {0:?}")]
    DurationNotANumber(String),
    #[error("duration must be greater than zero, got {0}")]
    DurationNotPositive(i64),
    #[error("worker count must be greater than zero")]
    NoWorkers,
    #[error("speed factor must be between 1 and 100, got {0}")]
    SpeedFactorOutOfRange(u32),
    #[error("max usage must be between 1 and 100, got {0}")]
    MaxUsageOutOfRange(u32),
}

/// The worker isolation primitive could not be created. Any workers already
/// launched by the failed attempt are rolled back before this is surfaced.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("failed to map shared stop flag: {0}")]
    SharedFlag(io::Error),
    #[error("failed to fork worker process: {0}")]
    Fork(io::Error),
}

/// Errors surfaced by [`SessionController::start_session`]. All of them are
/// recoverable at the controller boundary.
///
/// [`SessionController::start_session`]: crate::session::SessionController::start_session
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Launch(#[from] LaunchError),
    #[error("a stress test session is already active")]
    AlreadyActive,
}
