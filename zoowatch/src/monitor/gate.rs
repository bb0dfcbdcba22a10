//! Alert cooldown gate.

use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

/// Allows at most one alert per cooldown window.
///
/// An alert may fire when none has fired yet, or when strictly more than
/// `cooldown` has elapsed since the last one.
#[derive(Debug, Clone)]
pub struct AlertGate {
    cooldown: Duration,
    last_alert: Option<Instant>,
}

impl AlertGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_alert: None,
        }
    }

    pub fn last_alert(&self) -> Option<Instant> {
        self.last_alert
    }

    /// Whether an alert at `now` would pass.
    pub fn is_open(&self, now: Instant) -> bool {
        match self.last_alert {
            None => true,
            Some(last) => now.saturating_duration_since(last) > self.cooldown,
        }
    }

    /// Claim the gate at `now`.
    ///
    /// Returns `true` and records `now` as the last alert if the gate was open.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        if !self.is_open(now) {
            trace!(remaining = ?self.time_until_open(now), "alert suppressed by cooldown");
            return false;
        }
        self.last_alert = Some(now);
        true
    }

    /// Time left until the gate opens again.
    pub fn time_until_open(&self, now: Instant) -> Duration {
        match self.last_alert {
            None => Duration::ZERO,
            Some(last) => {
                let elapsed = now.saturating_duration_since(last);
                if elapsed > self.cooldown {
                    Duration::ZERO
                } else {
                    self.cooldown - elapsed
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_alert_passes() {
        let mut gate = AlertGate::new(Duration::from_secs(300));
        assert!(gate.is_open(Instant::now()));
        assert!(gate.try_acquire(Instant::now()));
        assert!(gate.last_alert().is_some());
    }

    #[test]
    fn test_worked_example() {
        // Frames at t=0, t=10 and t=301 with a 300s cooldown.
        let t0 = Instant::now();
        let mut gate = AlertGate::new(Duration::from_secs(300));

        assert!(gate.try_acquire(t0));
        assert!(!gate.try_acquire(t0 + Duration::from_secs(10)));
        assert!(gate.try_acquire(t0 + Duration::from_secs(301)));
        assert_eq!(gate.last_alert(), Some(t0 + Duration::from_secs(301)));
    }

    #[test]
    fn test_exact_cooldown_still_closed() {
        let t0 = Instant::now();
        let mut gate = AlertGate::new(Duration::from_secs(300));
        assert!(gate.try_acquire(t0));
        assert!(!gate.try_acquire(t0 + Duration::from_secs(300)));
        assert!(gate.try_acquire(t0 + Duration::from_millis(300_001)));
    }

    #[test]
    fn test_burst_within_window_collapses() {
        let t0 = Instant::now();
        let mut gate = AlertGate::new(Duration::from_secs(60));

        let passed = (0..60)
            .map(|s| t0 + Duration::from_secs(s))
            .filter(|now| gate.try_acquire(*now))
            .count();
        assert_eq!(passed, 1);
    }

    #[test]
    fn test_same_instant_second_claim_fails() {
        let now = Instant::now();
        let mut gate = AlertGate::new(Duration::from_secs(1));
        assert!(gate.try_acquire(now));
        assert!(!gate.try_acquire(now));
    }

    #[test]
    fn test_time_until_open() {
        let t0 = Instant::now();
        let mut gate = AlertGate::new(Duration::from_secs(300));
        assert_eq!(gate.time_until_open(t0), Duration::ZERO);

        gate.try_acquire(t0);
        assert_eq!(
            gate.time_until_open(t0 + Duration::from_secs(100)),
            Duration::from_secs(200)
        );
        assert_eq!(
            gate.time_until_open(t0 + Duration::from_secs(400)),
            Duration::ZERO
        );
    }

    #[test]
    fn test_zero_cooldown_needs_time_to_pass() {
        let t0 = Instant::now();
        let mut gate = AlertGate::new(Duration::ZERO);
        assert!(gate.try_acquire(t0));
        assert!(gate.try_acquire(t0 + Duration::from_millis(1)));
    }
}
