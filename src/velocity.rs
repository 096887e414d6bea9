use std::collections::VecDeque;
use std::time::{Duration, Instant};

const HISTORY_LIMIT: Duration = Duration::from_millis(100);

/// Vertical speed over a trailing 100ms window.
///
/// Keeps a running sum of the window's deltas so the estimate is O(1) per push.
#[derive(Debug, Default)]
pub struct VelocityTracker {
    history: VecDeque<Entry>,
    sum: f64,
    velocity: f64,
    /// Wall-clock time of the newest push. Event timestamps can't be compared to "now".
    last_push: Option<Instant>,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    delta: f64,
    timestamp: Duration,
}

impl VelocityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, delta: f64, timestamp: Duration) {
        if let Some(last) = self.history.back() {
            if timestamp < last.timestamp {
                log::trace!(
                    "ignoring delta with timestamp {timestamp:?} earlier than last {:?}",
                    last.timestamp
                );
                return;
            }
        }

        self.history.push_back(Entry { delta, timestamp });
        self.sum += delta;
        self.last_push = Some(Instant::now());
        self.trim_history(timestamp);

        let (Some(first), Some(last)) = (self.history.front(), self.history.back()) else {
            return;
        };
        let elapsed = (last.timestamp - first.timestamp).as_secs_f64();
        if self.history.len() >= 2 && elapsed > 0.0 {
            self.velocity = self.sum / elapsed;
        }
    }

    #[cfg(test)]
    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    /// Latest estimate in raw units per second, or 0 once the newest entry has aged
    /// out of the window. A finger that stopped before lifting has no speed left.
    pub fn velocity_at(&self, now: Instant) -> f64 {
        match self.last_push {
            Some(last) if now.saturating_duration_since(last) <= HISTORY_LIMIT => self.velocity,
            _ => 0.0,
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn clear(&mut self) {
        self.history.clear();
        self.sum = 0.0;
        self.velocity = 0.0;
        self.last_push = None;
    }

    fn trim_history(&mut self, now: Duration) {
        while let Some(first) = self.history.front() {
            if now <= first.timestamp + HISTORY_LIMIT {
                break;
            }
            self.sum -= first.delta;
            let _ = self.history.pop_front();
        }

        // Keep float error from lingering once the window empties out.
        if self.history.len() == 1 {
            self.sum = self.history[0].delta;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn single_entry_keeps_previous_estimate() {
        let mut t = VelocityTracker::new();
        t.push(10.0, ms(0));
        assert_eq!(t.velocity(), 0.0);
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn constant_rate_is_bounded_and_stable() {
        let mut t = VelocityTracker::new();
        let mut estimates = Vec::new();
        for i in 0..=40 {
            t.push(8.0, ms(i * 5));
            // 5ms spacing means at most 21 entries inside 100ms.
            assert!(t.len() <= 21);
            if i * 5 > 150 {
                estimates.push(t.velocity());
            }
        }

        // 21 entries of 8 over 100ms.
        for v in &estimates {
            assert_abs_diff_eq!(*v, 1680.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn silence_gap_restarts_window() {
        let mut t = VelocityTracker::new();
        for i in 0..10 {
            t.push(5.0, ms(i * 10));
        }
        let before = t.velocity();
        assert!(before > 0.0);

        t.push(-4.0, ms(290));
        assert_eq!(t.len(), 1);
        assert_abs_diff_eq!(t.velocity(), before);

        t.push(-4.0, ms(300));
        assert_eq!(t.len(), 2);
        assert_abs_diff_eq!(t.velocity(), -800.0, epsilon = 1e-9);
    }

    #[test]
    fn zero_elapsed_keeps_previous_estimate() {
        let mut t = VelocityTracker::new();
        t.push(1.0, ms(0));
        t.push(1.0, ms(10));
        let v = t.velocity();
        t.push(50.0, ms(10));
        assert_ne!(t.velocity(), v);

        let mut t = VelocityTracker::new();
        t.push(1.0, ms(10));
        t.push(1.0, ms(10));
        assert_eq!(t.velocity(), 0.0);
    }

    #[test]
    fn stale_window_has_no_speed() {
        let mut t = VelocityTracker::new();
        assert_eq!(t.velocity_at(Instant::now()), 0.0);

        t.push(16.0, ms(0));
        t.push(16.0, ms(8));
        let pushed = Instant::now();
        assert_abs_diff_eq!(t.velocity_at(pushed), 4000.0, epsilon = 1e-9);
        assert_abs_diff_eq!(
            t.velocity_at(pushed + Duration::from_millis(50)),
            4000.0,
            epsilon = 1e-9
        );

        assert_eq!(t.velocity_at(pushed + Duration::from_millis(200)), 0.0);
        // The raw estimate is kept for the next push to build on.
        assert_abs_diff_eq!(t.velocity(), 4000.0, epsilon = 1e-9);
    }

    #[test]
    fn out_of_order_is_ignored() {
        let mut t = VelocityTracker::new();
        t.push(1.0, ms(50));
        t.push(1.0, ms(40));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn clear_zeroes_everything() {
        let mut t = VelocityTracker::new();
        t.push(3.0, ms(0));
        t.push(3.0, ms(10));
        t.clear();
        assert_eq!(t.len(), 0);
        assert_eq!(t.velocity(), 0.0);
        assert_eq!(t.velocity_at(Instant::now()), 0.0);
    }
}
