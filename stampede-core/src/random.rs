//! Randomized input helpers for scenario bodies.

use std::ops::RangeInclusive;
use std::time::Duration;

use rand::Rng;

/// Uniform integer in `range`.
pub fn int_in(range: RangeInclusive<u64>) -> u64 {
    if range.is_empty() {
        return *range.start();
    }
    rand::thread_rng().gen_range(range)
}

/// Uniform integer in `[1, n]`.
pub fn one_to(n: u64) -> u64 {
    int_in(1..=n.max(1))
}

/// Uniform pause in `[min_secs, max_secs]` seconds.
pub fn sleep_between(min_secs: f64, max_secs: f64) -> Duration {
    let (lo, hi) = if min_secs <= max_secs {
        (min_secs, max_secs)
    } else {
        (max_secs, min_secs)
    };
    let lo = lo.max(0.0);
    let hi = hi.max(lo);
    let secs = if hi > lo {
        rand::thread_rng().gen_range(lo..=hi)
    } else {
        lo
    };
    Duration::from_secs_f64(secs)
}

/// Uniformly picks one element.
pub fn pick<T>(items: &[T]) -> Option<&T> {
    if items.is_empty() {
        return None;
    }
    Some(&items[rand::thread_rng().gen_range(0..items.len())])
}
