//! Per-tick work admission
//!
//! Each tick starts with a fixed allowance of work units. Callers spend from
//! it as they admit jobs; once it runs out the remaining jobs wait for the
//! next tick.

/// Saturating work allowance for one tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkBudget {
    /// Units available at the start of a tick
    allowed: u32,
    /// Units spent so far this tick
    spent: u32,
}

impl WorkBudget {
    /// Create a budget admitting `allowed` units per tick
    pub fn new(allowed: u32) -> Self {
        Self { allowed, spent: 0 }
    }

    // --- Tracking methods ---

    /// Spend `cost` units if that many remain.
    ///
    /// Returns false and spends nothing when the budget cannot cover the cost.
    pub fn try_spend(&mut self, cost: u32) -> bool {
        if cost > self.remaining() {
            return false;
        }
        self.spent = self.spent.saturating_add(cost);
        true
    }

    /// Give back units, e.g. for a job that turned out to be a no-op
    pub fn refund(&mut self, cost: u32) {
        self.spent = self.spent.saturating_sub(cost);
    }

    /// Start a new tick with the full allowance
    pub fn reset(&mut self) {
        self.spent = 0;
    }

    // --- Query methods ---

    pub fn allowed(&self) -> u32 {
        self.allowed
    }

    pub fn spent(&self) -> u32 {
        self.spent
    }

    pub fn remaining(&self) -> u32 {
        self.allowed.saturating_sub(self.spent)
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_new() {
        let budget = WorkBudget::new(5);
        assert_eq!(budget.allowed(), 5);
        assert_eq!(budget.spent(), 0);
        assert_eq!(budget.remaining(), 5);
        assert!(!budget.is_exhausted());
    }

    #[test]
    fn test_spend_until_exhausted() {
        let mut budget = WorkBudget::new(3);
        assert!(budget.try_spend(1));
        assert!(budget.try_spend(2));
        assert!(budget.is_exhausted());
        assert!(!budget.try_spend(1));
        assert_eq!(budget.spent(), 3);
    }

    #[test]
    fn test_oversized_cost_spends_nothing() {
        let mut budget = WorkBudget::new(4);
        assert!(!budget.try_spend(5));
        assert_eq!(budget.remaining(), 4);
    }

    #[test]
    fn test_refund_saturates() {
        let mut budget = WorkBudget::new(2);
        budget.try_spend(1);
        budget.refund(10);
        assert_eq!(budget.spent(), 0);
        assert_eq!(budget.remaining(), 2);
    }

    #[test]
    fn test_reset() {
        let mut budget = WorkBudget::new(10);
        budget.try_spend(10);
        budget.reset();
        assert_eq!(budget.remaining(), 10);
    }

    #[test]
    fn test_zero_budget_admits_nothing() {
        let mut budget = WorkBudget::new(0);
        assert!(budget.is_exhausted());
        assert!(!budget.try_spend(1));
        assert!(budget.try_spend(0));
    }
}
