use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::Instant;

/// Decides, at each iteration boundary, whether a worker may start another iteration.
///
/// With a budget every successful [`IterationGate::next`] claims a distinct index in
/// `0..budget`; without one it only enforces the deadline.
#[derive(Debug)]
pub struct IterationGate {
    counter: AtomicU64,
    budget: Option<u64>,
    duration: Duration,
    deadline: OnceLock<Instant>,
    stopped: AtomicBool,
}

impl IterationGate {
    pub fn new(budget: Option<u64>, duration: Duration) -> Self {
        Self {
            counter: AtomicU64::new(0),
            budget,
            duration,
            deadline: OnceLock::new(),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn start_at(&self, started: Instant) {
        let _ = self.deadline.set(started + self.duration);
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline.get().copied()
    }

    /// Stops handing out iterations regardless of budget or deadline.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    pub fn is_open(&self) -> bool {
        if self.stopped.load(Ordering::Acquire) {
            return false;
        }
        match self.deadline.get() {
            Some(deadline) => Instant::now() < *deadline,
            // Not started yet.
            None => false,
        }
    }

    /// Claims the next iteration. Returns its index, or `None` once the deadline has
    /// passed or the budget is exhausted.
    pub fn next(&self) -> Option<u64> {
        if !self.is_open() {
            return None;
        }

        let idx = self.counter.fetch_add(1, Ordering::Relaxed);
        match self.budget {
            Some(total) if idx >= total => None,
            _ => Some(idx),
        }
    }

    /// Iterations claimed so far (capped at the budget).
    pub fn claimed(&self) -> u64 {
        let n = self.counter.load(Ordering::Relaxed);
        self.budget.map_or(n, |total| n.min(total))
    }

    pub fn budget(&self) -> Option<u64> {
        self.budget
    }
}
