//! Global image budget shared across jobs.
//!
//! Each chapter runs its own image worker pool; every transfer additionally
//! holds a permit from this budget so the total number of image downloads in
//! flight stays under `max_total_image_workers`.

use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

use crate::control::{CancelToken, JobCancelled};

/// Blocked acquirers re-check their cancel token this often.
const CANCEL_RECHECK: Duration = Duration::from_millis(200);

/// Counting semaphore for image transfers.
#[derive(Debug)]
pub struct ImageBudget {
    max_total: usize,
    in_use: Mutex<usize>,
    freed: Condvar,
}

impl ImageBudget {
    /// Create a budget with the given maximum concurrent transfers (at least 1).
    pub fn new(max_total: usize) -> Self {
        Self {
            max_total: max_total.max(1),
            in_use: Mutex::new(0),
            freed: Condvar::new(),
        }
    }

    pub fn max_total(&self) -> usize {
        self.max_total
    }

    /// Number of permits currently held.
    pub fn in_use(&self) -> usize {
        *self.in_use.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn available(&self) -> usize {
        self.max_total.saturating_sub(self.in_use())
    }

    /// Block until a permit is free. Gives up with `JobCancelled` if `cancel`
    /// fires while waiting.
    pub fn acquire(&self, cancel: &CancelToken) -> Result<BudgetPermit<'_>, JobCancelled> {
        let mut in_use = self.in_use.lock().unwrap_or_else(PoisonError::into_inner);
        while *in_use >= self.max_total {
            cancel.check()?;
            in_use = self
                .freed
                .wait_timeout(in_use, CANCEL_RECHECK)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        cancel.check()?;
        *in_use += 1;
        Ok(BudgetPermit { budget: self })
    }

    /// Take a permit only if one is free right now.
    pub fn try_acquire(&self) -> Option<BudgetPermit<'_>> {
        let mut in_use = self.in_use.lock().unwrap_or_else(PoisonError::into_inner);
        if *in_use >= self.max_total {
            return None;
        }
        *in_use += 1;
        Some(BudgetPermit { budget: self })
    }

    fn release(&self) {
        let mut in_use = self.in_use.lock().unwrap_or_else(PoisonError::into_inner);
        *in_use = in_use.saturating_sub(1);
        drop(in_use);
        self.freed.notify_one();
    }
}

/// One image transfer slot; returned to the budget on drop.
#[derive(Debug)]
pub struct BudgetPermit<'a> {
    budget: &'a ImageBudget,
}

impl Drop for BudgetPermit<'_> {
    fn drop(&mut self) {
        self.budget.release();
    }
}
