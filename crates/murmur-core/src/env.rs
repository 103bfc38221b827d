//! Environment abstraction for deterministic testing.
//!
//! The protocol stamps every outbound event with a display-formatted local
//! time. Reading the wall clock is pushed behind [`Environment`] so the state
//! machines can be driven with scripted time in tests and simulation.

use std::sync::{Arc, Mutex, PoisonError};

/// Format used for display timestamps (`"14:05"`).
pub const DISPLAY_TIME_FORMAT: &str = "%H:%M";

/// Abstract environment providing display time.
///
/// # Invariants
///
/// - `display_time()` is cheap and infallible.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Current local time formatted for display.
    fn display_time(&self) -> String;
}

/// Production environment backed by the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    fn display_time(&self) -> String {
        chrono::Local::now().format(DISPLAY_TIME_FORMAT).to_string()
    }
}

/// Environment whose clock only moves when told to.
///
/// Clones share the same clock, so a test can hold one handle and advance
/// time under a state machine that owns another.
#[derive(Debug, Clone)]
pub struct FixedEnv {
    time: Arc<Mutex<String>>,
}

impl FixedEnv {
    /// Create an environment frozen at `time`.
    pub fn new(time: impl Into<String>) -> Self {
        Self { time: Arc::new(Mutex::new(time.into())) }
    }

    /// Move the clock to `time`.
    pub fn set(&self, time: impl Into<String>) {
        let mut guard = self.time.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = time.into();
    }
}

impl Environment for FixedEnv {
    fn display_time(&self) -> String {
        self.time.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_time_is_hours_and_minutes() {
        let time = SystemEnv::new().display_time();
        assert_eq!(time.len(), 5);
        assert_eq!(time.as_bytes()[2], b':');
    }

    #[test]
    fn fixed_env_clones_share_clock() {
        let env = FixedEnv::new("10:00");
        let handle = env.clone();

        handle.set("10:05");
        assert_eq!(env.display_time(), "10:05");
    }
}
