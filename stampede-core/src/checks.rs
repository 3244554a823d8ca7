use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::Serialize;
use stampede_metrics::Rate;

/// Named predicate over a check subject.
pub type Predicate<'a, T> = (&'a str, &'a dyn Fn(&T) -> bool);

#[derive(Debug, Default)]
struct Tally {
    passes: AtomicU64,
    fails: AtomicU64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckSummary {
    pub name: String,
    pub passes: u64,
    pub fails: u64,
}

/// Run-wide check results: the aggregate `checks` rate plus a per-name tally.
#[derive(Debug)]
pub struct Checks {
    rate: Rate,
    by_name: DashMap<Arc<str>, Tally>,
}

impl Checks {
    pub fn new(rate: Rate) -> Self {
        Self {
            rate,
            by_name: DashMap::new(),
        }
    }

    pub fn record(&self, name: &str, passed: bool) {
        self.rate.add(passed);

        let tally = match self.by_name.get(name) {
            Some(t) => t,
            None => self
                .by_name
                .entry(Arc::from(name))
                .or_default()
                .downgrade(),
        };
        if passed {
            tally.passes.fetch_add(1, Ordering::Relaxed);
        } else {
            tally.fails.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Runs every predicate against `subject` in order and records each outcome. A
    /// predicate that panics counts as failed. Returns whether all passed.
    pub fn evaluate<T: ?Sized>(&self, subject: &T, predicates: &[Predicate<'_, T>]) -> bool {
        let mut all = true;
        for (name, predicate) in predicates {
            let passed = run_predicate(|| predicate(subject));
            self.record(name, passed);
            all &= passed;
        }
        all
    }

    /// Builder form of [`Checks::evaluate`].
    pub fn check<'a, T: ?Sized>(&'a self, subject: &'a T) -> Check<'a, T> {
        Check {
            checks: self,
            subject,
            all_passed: true,
        }
    }

    pub fn failed_total(&self) -> u64 {
        self.rate.summary().misses
    }

    /// Per-name tallies sorted by name.
    pub fn summary(&self) -> Vec<CheckSummary> {
        let mut out: Vec<CheckSummary> = self
            .by_name
            .iter()
            .map(|e| CheckSummary {
                name: e.key().to_string(),
                passes: e.value().passes.load(Ordering::Relaxed),
                fails: e.value().fails.load(Ordering::Relaxed),
            })
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }
}

fn run_predicate(f: impl FnOnce() -> bool) -> bool {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or(false)
}

/// Records named predicates against one subject as they are added.
///
/// ```ignore
/// let ok = iter
///     .check(&res)
///     .that("status is 200", |r| r.status == 200)
///     .that("has body", |r| !r.body.is_empty())
///     .passed();
/// ```
#[must_use = "call `.passed()` to learn whether every predicate held"]
pub struct Check<'a, T: ?Sized> {
    checks: &'a Checks,
    subject: &'a T,
    all_passed: bool,
}

impl<T: ?Sized> Check<'_, T> {
    pub fn that(mut self, name: &str, predicate: impl FnOnce(&T) -> bool) -> Self {
        let subject = self.subject;
        let passed = run_predicate(|| predicate(subject));
        self.checks.record(name, passed);
        self.all_passed &= passed;
        self
    }

    pub fn passed(self) -> bool {
        self.all_passed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_outcomes_record_one_sample_each() {
        let rate = Rate::default();
        let checks = Checks::new(rate.clone());

        let all = checks.evaluate(&(), &[("a", &|_: &()| true), ("b", &|_: &()| false)]);

        assert!(!all);
        let s = rate.summary();
        assert_eq!(s.hits, 1);
        assert_eq!(s.misses, 1);
        assert_eq!(s.rate, Some(0.5));
        assert_eq!(
            checks.summary(),
            vec![
                CheckSummary {
                    name: "a".to_string(),
                    passes: 1,
                    fails: 0,
                },
                CheckSummary {
                    name: "b".to_string(),
                    passes: 0,
                    fails: 1,
                },
            ]
        );
    }

    #[test]
    fn panicking_predicate_is_a_failure() {
        let checks = Checks::new(Rate::default());
        let subject: Vec<u32> = Vec::new();

        let ok = checks
            .check(&subject)
            .that("first is 1", |v| v[0] == 1)
            .that("is empty", |v| v.is_empty())
            .passed();

        assert!(!ok);
        assert_eq!(checks.failed_total(), 1);
    }

    #[test]
    fn repeated_names_accumulate() {
        let checks = Checks::new(Rate::default());
        for i in 0..10u32 {
            let _ = checks.check(&i).that("even", |n| n % 2 == 0).passed();
        }
        let s = checks.summary();
        assert_eq!(s.len(), 1);
        assert_eq!(s[0].passes, 5);
        assert_eq!(s[0].fails, 5);
    }
}
