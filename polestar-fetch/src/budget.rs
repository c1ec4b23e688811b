//! Request budget for the metered data API.
//!
//! The vendor allows a fixed number of calls per day. The window is anchored
//! at the first reservation rather than at midnight, and a new window starts
//! with the first reservation after the previous one has elapsed.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use polestar_core::SharedClock;
use serde::Serialize;
use tracing::{debug, warn};

/// Vendor daily call limit.
pub const DEFAULT_DAILY_LIMIT: u32 = 10_000;

#[derive(Debug, Default)]
struct BudgetWindow {
    window_start: Option<DateTime<Utc>>,
    count: u32,
}

impl BudgetWindow {
    fn is_expired(&self, now: DateTime<Utc>, period: Duration) -> bool {
        self.window_start.is_some_and(|start| now >= start + period)
    }
}

/// Point-in-time view of the budget, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BudgetSnapshot {
    /// Calls allowed per window.
    pub limit: u32,
    /// Calls reserved in the current window.
    pub used: u32,
    /// Calls left in the current window.
    pub remaining: u32,
    /// When the current window started, if any call was made.
    pub window_start: Option<DateTime<Utc>>,
    /// When the current window ends.
    pub resets_at: Option<DateTime<Utc>>,
}

/// Gate for outgoing data API calls.
///
/// Reservation is an atomic check-and-increment under one lock, so
/// concurrent callers can never push the count past the limit.
pub struct RequestBudget {
    limit: u32,
    period: Duration,
    clock: SharedClock,
    window: Mutex<BudgetWindow>,
}

impl RequestBudget {
    /// Creates a budget of `limit` calls per `period`.
    pub fn new(limit: u32, period: Duration, clock: SharedClock) -> Self {
        Self {
            limit,
            period,
            clock,
            window: Mutex::new(BudgetWindow::default()),
        }
    }

    /// Creates the vendor's default budget: 10,000 calls per 24 hours.
    pub fn daily(clock: SharedClock) -> Self {
        Self::new(DEFAULT_DAILY_LIMIT, Duration::hours(24), clock)
    }

    /// Reserves one call. Returns false, without blocking, if the window's
    /// allowance is used up.
    pub fn try_reserve(&self) -> bool {
        let now = self.clock.now();
        let mut window = self.window.lock().unwrap_or_else(PoisonError::into_inner);

        if window.window_start.is_none() || window.is_expired(now, self.period) {
            if window.window_start.is_some() {
                debug!(used = window.count, "Budget window rolled over");
            }
            window.window_start = Some(now);
            window.count = 0;
        }

        if window.count >= self.limit {
            warn!(limit = self.limit, "Request budget exhausted");
            return false;
        }

        window.count += 1;
        true
    }

    /// Calls left in the current window.
    pub fn remaining(&self) -> u32 {
        self.snapshot().remaining
    }

    /// Calls allowed per window.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Returns a consistent view of the current window.
    pub fn snapshot(&self) -> BudgetSnapshot {
        let now = self.clock.now();
        let window = self.window.lock().unwrap_or_else(PoisonError::into_inner);

        if window.is_expired(now, self.period) {
            return BudgetSnapshot {
                limit: self.limit,
                used: 0,
                remaining: self.limit,
                window_start: None,
                resets_at: None,
            };
        }

        BudgetSnapshot {
            limit: self.limit,
            used: window.count,
            remaining: self.limit.saturating_sub(window.count),
            window_start: window.window_start,
            resets_at: window.window_start.map(|start| start + self.period),
        }
    }
}

impl std::fmt::Debug for RequestBudget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestBudget")
            .field("limit", &self.limit)
            .field("period", &self.period)
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use polestar_core::{Clock, ManualClock};

    fn budget(limit: u32) -> (RequestBudget, ManualClock) {
        let clock = ManualClock::new(Utc::now());
        let budget = RequestBudget::new(limit, Duration::hours(24), Arc::new(clock.clone()));
        (budget, clock)
    }

    #[test]
    fn test_sequential_reservations_stop_at_limit() {
        let (budget, _clock) = budget(3);

        assert!(budget.try_reserve());
        assert!(budget.try_reserve());
        assert!(budget.try_reserve());
        assert!(!budget.try_reserve());
        assert_eq!(budget.remaining(), 0);
        assert_eq!(budget.snapshot().used, 3);
    }

    #[test]
    fn test_window_anchored_at_first_call() {
        let (budget, clock) = budget(1);
        assert!(budget.snapshot().window_start.is_none());

        clock.advance(Duration::hours(5));
        let anchor = clock.now();
        assert!(budget.try_reserve());

        let snapshot = budget.snapshot();
        assert_eq!(snapshot.window_start, Some(anchor));
        assert_eq!(snapshot.resets_at, Some(anchor + Duration::hours(24)));
    }

    #[test]
    fn test_window_rolls_over() {
        let (budget, clock) = budget(1);
        assert!(budget.try_reserve());
        assert!(!budget.try_reserve());

        clock.advance(Duration::hours(23));
        assert!(!budget.try_reserve());

        clock.advance(Duration::hours(1));
        assert_eq!(budget.remaining(), 1);
        assert!(budget.try_reserve());
        assert_eq!(budget.remaining(), 0);
    }

    #[test]
    fn test_concurrent_reservations_never_overshoot() {
        let (budget, _clock) = budget(50);
        let budget = Arc::new(budget);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let budget = Arc::clone(&budget);
                std::thread::spawn(move || (0..20).filter(|_| budget.try_reserve()).count())
            })
            .collect();

        let granted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(granted, 50);
        assert_eq!(budget.remaining(), 0);
    }

    #[test]
    fn test_zero_limit_never_reserves() {
        let (budget, _clock) = budget(0);
        assert!(!budget.try_reserve());
    }
}
