//! Gate that holds runtime start-up until a monitor resumes it.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Start-up pause released by a `ResumeRuntime` command.
///
/// Once resumed the gate stays open; later resumes are no-ops.
#[derive(Debug)]
pub struct StartupGate {
    paused: Mutex<bool>,
    resumed: Condvar,
}

impl StartupGate {
    /// Creates a gate, closed when `paused` is `true`.
    #[must_use]
    pub fn new(paused: bool) -> Self {
        Self {
            paused: Mutex::new(paused),
            resumed: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        self.paused.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns `true` while start-up is held.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        *self.lock()
    }

    /// Opens the gate, returning whether a pause was pending.
    pub fn resume(&self) -> bool {
        let was_paused = std::mem::replace(&mut *self.lock(), false);
        self.resumed.notify_all();
        was_paused
    }

    /// Blocks until the gate opens, calling `remind` with the time waited so
    /// far every `interval`.
    pub fn wait(&self, interval: Duration, mut remind: impl FnMut(Duration)) {
        let started = Instant::now();
        let mut paused = self.lock();
        while *paused {
            let (guard, timeout) = self
                .resumed
                .wait_timeout(paused, interval)
                .unwrap_or_else(PoisonError::into_inner);
            paused = guard;
            if *paused && timeout.timed_out() {
                remind(started.elapsed());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn open_gate_does_not_block() {
        let gate = StartupGate::new(false);
        let mut reminders = 0;
        gate.wait(Duration::from_millis(1), |_| reminders += 1);
        assert_eq!(reminders, 0);
        assert!(!gate.resume());
    }

    #[test]
    fn resume_releases_waiter_and_reminds_meanwhile() {
        let gate = Arc::new(StartupGate::new(true));
        let waiter = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || {
                let mut reminders = 0;
                gate.wait(Duration::from_millis(5), |_| reminders += 1);
                reminders
            })
        };

        thread::sleep(Duration::from_millis(40));
        assert!(gate.resume());
        let reminders = waiter.join().expect("join waiter");
        assert!(reminders >= 1);
        assert!(!gate.is_paused());
        assert!(!gate.resume(), "second resume is a no-op");
    }
}
