//! Sliding-window admission gate for the shared TMDB request budget.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Upstream allowance: this many admissions per rolling window.
pub const API_RATE_LIMIT: usize = 40;

/// Length of the rolling window.
pub const API_RATE_WINDOW: Duration = Duration::from_secs(10);

/// How long callers sleep after a rate-limit rejection before retrying.
pub const RATE_LIMIT_PAUSE: Duration = Duration::from_secs(10);

/// Admits at most `capacity` calls within any rolling `window`.
///
/// Admission timestamps are kept in a deque so the ceiling holds for every
/// window position, not only for bursts starting from an idle gate. A
/// depleted gate rejects immediately; it never blocks.
pub struct RateGate {
    capacity: usize,
    window: Duration,
    admitted: Mutex<VecDeque<Instant>>,
}

impl RateGate {
    pub fn new(capacity: usize, window: Duration) -> Self {
        Self {
            capacity,
            window,
            admitted: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Gate with the upstream TMDB allowance.
    pub fn tmdb() -> Self {
        Self::new(API_RATE_LIMIT, API_RATE_WINDOW)
    }

    /// Try to admit one call now. On rejection returns the duration after
    /// which a slot is guaranteed to be free.
    pub fn try_admit(&self) -> Result<(), Duration> {
        let now = Instant::now();
        let mut admitted = self.admitted.lock().unwrap();

        while let Some(&oldest) = admitted.front() {
            if now.duration_since(oldest) >= self.window {
                admitted.pop_front();
            } else {
                break;
            }
        }

        if admitted.len() < self.capacity {
            admitted.push_back(now);
            Ok(())
        } else {
            let oldest = *admitted.front().expect("gate is full");
            Err(self.window.saturating_sub(now.duration_since(oldest)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn admits_up_to_capacity() {
        let gate = RateGate::new(40, Duration::from_secs(10));
        for _ in 0..40 {
            assert!(gate.try_admit().is_ok());
        }
        assert!(gate.try_admit().is_err());
    }

    #[test]
    fn rejection_reports_wait_within_window() {
        let gate = RateGate::new(2, Duration::from_secs(10));
        gate.try_admit().unwrap();
        gate.try_admit().unwrap();
        let wait = gate.try_admit().unwrap_err();
        assert!(wait <= Duration::from_secs(10));
        assert!(wait > Duration::ZERO);
    }

    #[test]
    fn window_expiry_frees_slots() {
        let gate = RateGate::new(3, Duration::from_millis(50));
        for _ in 0..3 {
            gate.try_admit().unwrap();
        }
        assert!(gate.try_admit().is_err());

        thread::sleep(Duration::from_millis(60));
        assert!(gate.try_admit().is_ok());
    }

    #[test]
    fn rolling_window_never_exceeds_capacity() {
        // Admit in two bursts half a window apart; the second burst must be
        // capped by what is still outstanding from the first.
        let gate = RateGate::new(4, Duration::from_millis(100));
        gate.try_admit().unwrap();
        gate.try_admit().unwrap();

        thread::sleep(Duration::from_millis(55));
        gate.try_admit().unwrap();
        gate.try_admit().unwrap();
        // First burst is still inside the window.
        assert!(gate.try_admit().is_err());

        thread::sleep(Duration::from_millis(55));
        // First burst expired, second has not.
        gate.try_admit().unwrap();
        gate.try_admit().unwrap();
        assert!(gate.try_admit().is_err());
    }

    #[test]
    fn concurrent_admissions_respect_the_cap() {
        // 41 callers race for a 40-slot window; exactly one is turned away.
        let gate = Arc::new(RateGate::new(40, Duration::from_secs(10)));
        let handles: Vec<_> = (0..41)
            .map(|_| {
                let gate = Arc::clone(&gate);
                thread::spawn(move || gate.try_admit().is_ok())
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|admitted| *admitted)
            .count();
        assert_eq!(admitted, 40);
    }
}
