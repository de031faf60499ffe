use std::sync::atomic::{AtomicI64, Ordering};

/// Source of wall-clock time in whole epoch seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

/// Clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Clock that only moves when told to. Used by tests and local tooling.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Start of the fixed window containing `now`, aligned to epoch multiples of `period`.
pub fn window_start(now: i64, period: i64) -> i64 {
    now.div_euclid(period) * period
}

/// A fixed counting window `[start, start + period)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: i64,
    pub period: i64,
}

impl Window {
    /// Window containing `now`. `period` must be positive.
    pub fn containing(now: i64, period: i64) -> Self {
        Self {
            start: window_start(now, period),
            period,
        }
    }

    /// Epoch second at which the next window opens.
    pub fn reset_at(&self) -> i64 {
        self.start + self.period
    }

    /// Seconds until the window closes, never less than one.
    pub fn retry_after(&self, now: i64) -> u64 {
        (self.reset_at() - now).max(1) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_start_is_constant_inside_a_window() {
        let period = 60;
        for t in 120..180 {
            assert_eq!(window_start(t, period), 120);
        }
        assert_eq!(window_start(119, period), 60);
        assert_eq!(window_start(180, period), 180);
    }

    #[test]
    fn window_start_handles_pre_epoch_times() {
        assert_eq!(window_start(-1, 60), -60);
        assert_eq!(window_start(-60, 60), -60);
    }

    #[test]
    fn reset_does_not_depend_on_position_in_window() {
        let early = Window::containing(600, 60);
        let late = Window::containing(659, 60);
        assert_eq!(early.reset_at(), 660);
        assert_eq!(late.reset_at(), 660);
    }

    #[test]
    fn retry_after_is_clamped_to_one_second() {
        let window = Window::containing(5, 60);
        assert_eq!(window.retry_after(5), 55);
        assert_eq!(window.retry_after(60), 1);
    }

    #[test]
    fn manual_clock_moves_on_request() {
        let clock = ManualClock::new(10);
        clock.advance(5);
        assert_eq!(clock.now(), 15);
        clock.set(100);
        assert_eq!(clock.now(), 100);
    }
}
