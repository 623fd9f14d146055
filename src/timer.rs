use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::utils::clock::Clock;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimerError {
    #[error("a session is already running")]
    AlreadyRunning,
    #[error("no session is running")]
    NotRunning,
}

/// Value handed to the caller when a running session is stopped. The timer
/// itself never touches storage, the caller attaches a category and persists
/// the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedSession {
    pub started_at: DateTime<Utc>,
    pub stopped_at: DateTime<Utc>,
    pub duration: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerState {
    Idle,
    Running { started_at: DateTime<Utc> },
}

/// Wall-clock stopwatch for the session currently in flight. There is one
/// per application and its state is deliberately not persisted, a crash
/// while running loses the in-flight session.
pub struct Timer {
    state: TimerState,
    max_duration: Option<Duration>,
    clock: Box<dyn Clock>,
}

impl Timer {
    pub fn new(clock: Box<dyn Clock>, max_duration: Option<Duration>) -> Self {
        Self {
            state: TimerState::Idle,
            max_duration,
            clock,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, TimerState::Running { .. })
    }

    pub fn start(&mut self) -> Result<(), TimerError> {
        match self.state {
            TimerState::Running { .. } => Err(TimerError::AlreadyRunning),
            TimerState::Idle => {
                self.state = TimerState::Running {
                    started_at: self.clock.time(),
                };
                Ok(())
            }
        }
    }

    pub fn stop(&mut self) -> Result<FinishedSession, TimerError> {
        match self.state {
            TimerState::Idle => Err(TimerError::NotRunning),
            TimerState::Running { started_at } => {
                let stopped_at = self.clock.time();
                self.state = TimerState::Idle;
                Ok(FinishedSession {
                    started_at,
                    stopped_at,
                    // A stopped session can never be negative, even if the
                    // system clock jumped backwards while it ran.
                    duration: (stopped_at - started_at).max(Duration::zero()),
                })
            }
        }
    }

    /// Time the current session has been running. Non-mutating, meant for
    /// the live menu display.
    pub fn elapsed(&self) -> Option<Duration> {
        match self.state {
            TimerState::Idle => None,
            TimerState::Running { started_at } => {
                Some((self.clock.time() - started_at).max(Duration::zero()))
            }
        }
    }

    /// Whether the session has outlived the configured cap. The controller
    /// checks this on every tick and performs the implicit stop.
    pub fn over_limit(&self) -> bool {
        match (self.elapsed(), self.max_duration) {
            (Some(elapsed), Some(max)) => elapsed > max,
            _ => false,
        }
    }
}
