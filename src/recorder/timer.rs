//! Step timer
//!
//! A one-tick-per-second clock. In countdown mode it is bound to a step's
//! allotted duration and expires at zero; in stopwatch mode it counts up
//! without a limit (free recording).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Idle,
    Running,
    Paused,
    /// Countdown reached zero
    Expired,
    /// Stopped before reaching zero
    Stopped,
}

/// What a tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// The timer was not running; nothing changed
    Ignored,
    /// One second elapsed
    Advanced,
    /// One second elapsed and the countdown hit zero
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepTimer {
    /// `None` for a stopwatch
    allotted: Option<u32>,
    elapsed: u32,
    state: TimerState,
}

impl StepTimer {
    pub fn countdown(allotted_seconds: u32) -> Self {
        Self {
            allotted: Some(allotted_seconds),
            elapsed: 0,
            state: TimerState::Idle,
        }
    }

    pub fn stopwatch() -> Self {
        Self {
            allotted: None,
            elapsed: 0,
            state: TimerState::Idle,
        }
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn allotted(&self) -> Option<u32> {
        self.allotted
    }

    pub fn elapsed(&self) -> u32 {
        self.elapsed
    }

    /// Seconds left on a countdown; zero for a stopwatch
    pub fn remaining(&self) -> u32 {
        self.allotted
            .map(|a| a.saturating_sub(self.elapsed))
            .unwrap_or(0)
    }

    /// The number a UI shows: remaining for countdowns, elapsed otherwise
    pub fn display_seconds(&self) -> u32 {
        match self.allotted {
            Some(_) => self.remaining(),
            None => self.elapsed,
        }
    }

    pub fn start(&mut self) -> bool {
        if self.state != TimerState::Idle {
            return false;
        }
        self.state = TimerState::Running;
        true
    }

    pub fn pause(&mut self) -> bool {
        if self.state != TimerState::Running {
            return false;
        }
        self.state = TimerState::Paused;
        true
    }

    pub fn resume(&mut self) -> bool {
        if self.state != TimerState::Paused {
            return false;
        }
        self.state = TimerState::Running;
        true
    }

    /// Stop a running or paused timer, freezing the elapsed time
    pub fn stop(&mut self) -> bool {
        if !matches!(self.state, TimerState::Running | TimerState::Paused) {
            return false;
        }
        self.state = TimerState::Stopped;
        true
    }

    pub fn tick(&mut self) -> Tick {
        if self.state != TimerState::Running {
            return Tick::Ignored;
        }

        self.elapsed = self.elapsed.saturating_add(1);

        match self.allotted {
            Some(allotted) if self.elapsed >= allotted => {
                self.elapsed = allotted;
                self.state = TimerState::Expired;
                Tick::Expired
            }
            _ => Tick::Advanced,
        }
    }

    /// Back to `Idle` with the full allotment
    pub fn reset(&mut self) {
        self.elapsed = 0;
        self.state = TimerState::Idle;
    }

    /// Rebind a countdown to a new allotment (switching steps)
    pub fn reset_to(&mut self, allotted_seconds: u32) {
        self.allotted = Some(allotted_seconds);
        self.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_countdown_expires_at_zero() {
        let mut timer = StepTimer::countdown(3);
        assert!(timer.start());
        assert_eq!(timer.tick(), Tick::Advanced);
        assert_eq!(timer.tick(), Tick::Advanced);
        assert_eq!(timer.remaining(), 1);
        assert_eq!(timer.tick(), Tick::Expired);
        assert_eq!(timer.state(), TimerState::Expired);
        assert_eq!(timer.remaining(), 0);
        assert_eq!(timer.tick(), Tick::Ignored);
        assert_eq!(timer.elapsed(), 3);
    }

    #[test]
    fn test_paused_timer_does_not_tick() {
        let mut timer = StepTimer::countdown(10);
        timer.start();
        timer.tick();
        timer.pause();
        let remaining_at_pause = timer.remaining();

        for _ in 0..5 {
            assert_eq!(timer.tick(), Tick::Ignored);
        }
        timer.resume();
        assert_eq!(timer.remaining(), remaining_at_pause);
    }

    #[test]
    fn test_invalid_transitions_are_refused() {
        let mut timer = StepTimer::countdown(5);
        assert!(!timer.pause());
        assert!(!timer.resume());
        assert!(!timer.stop());
        timer.start();
        assert!(!timer.start());
        assert!(timer.stop());
        assert!(!timer.resume());
    }

    #[test]
    fn test_reset_to_new_step() {
        let mut timer = StepTimer::countdown(5);
        timer.start();
        timer.tick();
        timer.reset_to(12);
        assert_eq!(timer.state(), TimerState::Idle);
        assert_eq!(timer.remaining(), 12);
    }

    #[test]
    fn test_stopwatch_counts_up() {
        let mut timer = StepTimer::stopwatch();
        timer.start();
        for _ in 0..100 {
            assert_eq!(timer.tick(), Tick::Advanced);
        }
        assert_eq!(timer.display_seconds(), 100);
        assert_eq!(timer.remaining(), 0);
    }
}
