//! Additive cost tracking against an optional cap.
//!
//! The tracker is deliberately passive: it accumulates cost units and
//! answers questions about the cap, while the engine decides *when* to
//! look (only at stage boundaries) and what to do about an overrun.
//! One tracker may be shared across engines to enforce a global cap.

use parking_lot::Mutex;

/// Tracks cost units spent during one or more runs.
#[derive(Debug)]
pub struct BudgetTracker {
    cap: Option<f64>,
    spent: Mutex<f64>,
}

impl BudgetTracker {
    /// Creates a tracker with an optional cap.
    #[must_use]
    pub const fn new(cap: Option<f64>) -> Self {
        Self {
            cap,
            spent: Mutex::new(0.0),
        }
    }

    /// Creates a tracker that never limits spend.
    #[must_use]
    pub const fn uncapped() -> Self {
        Self::new(None)
    }

    /// Adds spent cost units and returns the new total.
    pub fn add(&self, cost_units: f64) -> f64 {
        let mut spent = self.spent.lock();
        *spent += cost_units;
        *spent
    }

    /// Total cost units spent so far.
    #[must_use]
    pub fn total(&self) -> f64 {
        *self.spent.lock()
    }

    /// The configured cap, if any.
    #[must_use]
    pub const fn cap(&self) -> Option<f64> {
        self.cap
    }

    /// Cost units left before the cap, floored at zero.
    ///
    /// Returns `None` for an uncapped tracker.
    #[must_use]
    pub fn remaining(&self) -> Option<f64> {
        self.cap.map(|cap| (cap - self.total()).max(0.0))
    }

    /// Returns `true` once spend strictly exceeds the cap.
    ///
    /// Sitting exactly at the cap is not an overrun.
    #[must_use]
    pub fn is_over_cap(&self) -> bool {
        self.cap.is_some_and(|cap| self.total() > cap)
    }

    /// Percentage of the cap spent, or `None` for an uncapped tracker.
    #[must_use]
    pub fn percent_used(&self) -> Option<f64> {
        self.cap.map(|cap| {
            if cap <= 0.0 {
                100.0
            } else {
                self.total() / cap * 100.0
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_accumulates() {
        let tracker = BudgetTracker::new(Some(10.0));
        assert_eq!(tracker.add(2.5), 2.5);
        assert_eq!(tracker.add(1.5), 4.0);
        assert_eq!(tracker.total(), 4.0);
    }

    #[test]
    fn test_exactly_at_cap_is_not_over() {
        let tracker = BudgetTracker::new(Some(10.0));
        tracker.add(10.0);
        assert!(!tracker.is_over_cap());
        assert_eq!(tracker.remaining(), Some(0.0));

        tracker.add(0.01);
        assert!(tracker.is_over_cap());
    }

    #[test]
    fn test_remaining_floors_at_zero() {
        let tracker = BudgetTracker::new(Some(5.0));
        tracker.add(7.0);
        assert_eq!(tracker.remaining(), Some(0.0));
    }

    #[test]
    fn test_uncapped_never_over() {
        let tracker = BudgetTracker::uncapped();
        tracker.add(1_000_000.0);
        assert!(!tracker.is_over_cap());
        assert_eq!(tracker.remaining(), None);
        assert_eq!(tracker.percent_used(), None);
    }

    #[test]
    fn test_percent_used() {
        let tracker = BudgetTracker::new(Some(10.0));
        tracker.add(8.0);
        assert_eq!(tracker.percent_used(), Some(80.0));
    }
}
