use std::time::{Duration, Instant};

/// Fixed-period deadline tracker for cooperative event loops.
///
/// The owner polls it with the current time; at most one tick is reported
/// per poll, and missed periods are dropped instead of replayed. A period
/// too long to add to an `Instant` leaves the timer armed without a deadline.
#[derive(Debug, Clone)]
pub struct IntervalTimer {
    period: Duration,
    active: bool,
    next_deadline: Option<Instant>,
}

impl IntervalTimer {
    /// Creates a stopped timer.
    pub fn new(period: Duration) -> Self {
        Self {
            period: clamp_period(period),
            active: false,
            next_deadline: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.next_deadline
    }

    /// Arms the timer so the first tick lands one period after `now`.
    pub fn start(&mut self, now: Instant) {
        self.active = true;
        self.next_deadline = now.checked_add(self.period);
    }

    pub fn stop(&mut self) {
        self.active = false;
        self.next_deadline = None;
    }

    /// Changes the period and re-arms from `now` without firing.
    pub fn restart(&mut self, period: Duration, now: Instant) {
        self.period = clamp_period(period);
        self.start(now);
    }

    /// Updates the period; an active timer is re-armed from `now`.
    pub fn set_period(&mut self, period: Duration, now: Instant) {
        if self.is_active() {
            self.restart(period, now);
        } else {
            self.period = clamp_period(period);
        }
    }

    /// Returns true when a deadline has passed, scheduling the next one.
    pub fn poll(&mut self, now: Instant) -> bool {
        let Some(deadline) = self.next_deadline else {
            return false;
        };
        if now < deadline {
            return false;
        }
        self.next_deadline = match deadline.checked_add(self.period) {
            Some(next) if next > now => Some(next),
            _ => now.checked_add(self.period),
        };
        true
    }
}

fn clamp_period(period: Duration) -> Duration {
    period.max(Duration::from_millis(1))
}
