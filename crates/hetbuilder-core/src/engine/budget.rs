use super::config::SearchBudget;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

/// Wall-clock checks happen once per this many candidates.
const CLOCK_CHECK_INTERVAL: u64 = 1024;

/// Shared candidate counter and deadline for one search invocation.
///
/// Workers call [`BudgetTracker::try_consume`] before evaluating a candidate;
/// once it returns `false` the budget stays exhausted.
#[derive(Debug)]
pub struct BudgetTracker {
    max_candidates: Option<u64>,
    deadline: Option<Instant>,
    examined: AtomicU64,
    exhausted: AtomicBool,
}

impl BudgetTracker {
    pub fn new(budget: &SearchBudget) -> Self {
        Self {
            max_candidates: budget.max_candidates,
            deadline: budget.time_limit.map(|limit| Instant::now() + limit),
            examined: AtomicU64::new(0),
            exhausted: AtomicBool::new(false),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(&SearchBudget::default())
    }

    pub fn try_consume(&self) -> bool {
        if self.exhausted.load(Ordering::Relaxed) {
            return false;
        }
        let previous = self.examined.fetch_add(1, Ordering::Relaxed);
        if let Some(max) = self.max_candidates {
            if previous >= max {
                self.exhausted.store(true, Ordering::Relaxed);
                return false;
            }
        }
        if let Some(deadline) = self.deadline {
            if previous % CLOCK_CHECK_INTERVAL == 0 && Instant::now() >= deadline {
                self.exhausted.store(true, Ordering::Relaxed);
                return false;
            }
        }
        true
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted.load(Ordering::Relaxed)
    }

    /// Candidates actually evaluated (rejected attempts are not counted).
    pub fn examined(&self) -> u64 {
        let attempts = self.examined.load(Ordering::Relaxed);
        match self.max_candidates {
            Some(max) => attempts.min(max),
            None => attempts,
        }
    }
}
