use std::thread;

use proptest::prelude::*;
use stampede_metrics::{Registry, Trend, percentile};

proptest! {
    #[test]
    fn trend_extreme_percentiles_are_min_and_max(
        samples in prop::collection::vec(-1.0e9f64..1.0e9, 1..256)
    ) {
        let t = Trend::default();
        for v in &samples {
            t.add(*v);
        }
        let snap = t.snapshot();

        let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        prop_assert_eq!(snap.percentile(0.0), Some(min));
        prop_assert_eq!(snap.percentile(100.0), Some(max));
        prop_assert_eq!(snap.min(), Some(min));
        prop_assert_eq!(snap.max(), Some(max));
    }

    #[test]
    fn percentile_is_monotonic_in_p(
        mut samples in prop::collection::vec(0.0f64..10_000.0, 1..128),
        a in 0.0f64..100.0,
        b in 0.0f64..100.0,
    ) {
        samples.sort_unstable_by(f64::total_cmp);
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let p_lo = percentile(&samples, lo).unwrap_or(f64::NAN);
        let p_hi = percentile(&samples, hi).unwrap_or(f64::NAN);
        prop_assert!(p_lo <= p_hi, "p({lo})={p_lo} > p({hi})={p_hi}");
    }

    #[test]
    fn concurrent_counter_adds_are_never_lost(
        per_thread in prop::collection::vec(
            prop::collection::vec(0u64..1_000, 0..64),
            1..8,
        )
    ) {
        let reg = Registry::default();
        let counter = reg
            .counter("adds_total")
            .unwrap_or_else(|e| panic!("register counter: {e}"));

        let expected: u64 = per_thread.iter().flatten().sum();

        thread::scope(|s| {
            for increments in &per_thread {
                let c = counter.clone();
                s.spawn(move || {
                    for n in increments {
                        c.add(*n);
                    }
                });
            }
        });

        prop_assert_eq!(counter.get(), expected);
    }

    #[test]
    fn concurrent_trend_appends_are_never_lost(
        threads in 1usize..8,
        per_thread in 0usize..200,
    ) {
        let t = Trend::default();

        thread::scope(|s| {
            for i in 0..threads {
                let t = t.clone();
                s.spawn(move || {
                    for j in 0..per_thread {
                        t.add((i * per_thread + j) as f64);
                    }
                });
            }
        });

        prop_assert_eq!(t.count(), threads * per_thread);
    }
}
