//! Time-budgeted incremental draining of bulk generation jobs.
//!
//! A job is a list of tile coordinates. Each host step processes whole tiles
//! until the step's wall-clock budget is spent, then resumes on the next step.
//! At least one tile is processed per step so every job makes progress.

use std::time::{Duration, Instant};

use crate::coord::TileCoord;

/// Monotonic time source used to measure step budgets.
pub trait BudgetClock {
    /// Time elapsed since an arbitrary fixed origin.
    fn now(&self) -> Duration;
}

/// [`BudgetClock`] backed by [`Instant`].
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl BudgetClock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Measures one step against its budget.
#[derive(Clone, Copy, Debug)]
pub struct StepBudget {
    started: Duration,
    budget: Duration,
}

impl StepBudget {
    pub fn start(clock: &dyn BudgetClock, budget: Duration) -> Self {
        Self {
            started: clock.now(),
            budget,
        }
    }

    /// `true` once the time since [`StepBudget::start`] reaches the budget.
    pub fn is_exhausted(&self, clock: &dyn BudgetClock) -> bool {
        clock.now().saturating_sub(self.started) >= self.budget
    }
}

/// The single in-flight bulk job of a generator.
#[derive(Clone, Debug)]
pub struct GenerationQueue {
    items: Vec<TileCoord>,
    cursor: usize,
    active: bool,
    budget: Duration,
}

impl GenerationQueue {
    pub fn new(budget: Duration) -> Self {
        Self {
            items: Vec::new(),
            cursor: 0,
            active: false,
            budget,
        }
    }

    /// Starts a job over `items`. Returns `false`, leaving the running job
    /// untouched, if one is already in flight.
    pub fn start(&mut self, items: Vec<TileCoord>) -> bool {
        if self.active {
            return false;
        }
        self.items = items;
        self.cursor = 0;
        self.active = true;
        true
    }

    /// Next coordinate of an active job, advancing the cursor.
    pub fn next_item(&mut self) -> Option<TileCoord> {
        if !self.active {
            return None;
        }
        let item = self.items.get(self.cursor).copied()?;
        self.cursor += 1;
        Some(item)
    }

    /// `(processed, total)` for the current job.
    pub fn progress(&self) -> (usize, usize) {
        (self.cursor, self.items.len())
    }

    /// `true` when an active job has no items left.
    pub fn is_drained(&self) -> bool {
        self.active && self.cursor >= self.items.len()
    }

    /// Ends the job and clears its list.
    pub fn finish(&mut self) {
        self.items.clear();
        self.cursor = 0;
        self.active = false;
    }

    /// Stops draining. Items already processed stay processed.
    pub fn cancel(&mut self) {
        self.finish();
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn set_budget(&mut self, budget: Duration) {
        self.budget = budget;
    }
}

#[cfg(test)]
pub(crate) mod test_clock {
    use std::cell::Cell;
    use std::time::Duration;

    use super::BudgetClock;

    /// Advances by a fixed tick on every read.
    pub struct TickClock {
        now: Cell<Duration>,
        tick: Duration,
    }

    impl TickClock {
        pub fn new(tick: Duration) -> Self {
            Self {
                now: Cell::new(Duration::ZERO),
                tick,
            }
        }
    }

    impl BudgetClock for TickClock {
        fn now(&self) -> Duration {
            let now = self.now.get();
            self.now.set(now + self.tick);
            now
        }
    }
}
