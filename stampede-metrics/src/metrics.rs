use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use crate::trend::{Trend, TrendSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum MetricKind {
    Counter,
    Gauge,
    Rate,
    Trend,
}

/// Monotonic counter. Cloning shares the underlying total.
#[derive(Debug, Clone, Default)]
pub struct Counter(Arc<AtomicU64>);

impl Counter {
    #[inline]
    pub fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment(&self) {
        self.add(1);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Current value plus the highest value ever observed.
#[derive(Debug, Clone, Default)]
pub struct Gauge(Arc<GaugeCell>);

#[derive(Debug, Default)]
pub struct GaugeCell {
    value: AtomicI64,
    peak: AtomicI64,
}

impl Gauge {
    pub fn set(&self, value: i64) {
        self.0.value.store(value, Ordering::Relaxed);
        self.raise_peak(value);
    }

    pub fn increment(&self) -> i64 {
        let now = self.0.value.fetch_add(1, Ordering::Relaxed).saturating_add(1);
        self.raise_peak(now);
        now
    }

    pub fn decrement(&self) -> i64 {
        self.0.value.fetch_sub(1, Ordering::Relaxed).saturating_sub(1)
    }

    pub fn get(&self) -> i64 {
        self.0.value.load(Ordering::Relaxed)
    }

    pub fn peak(&self) -> i64 {
        self.0.peak.load(Ordering::Relaxed)
    }

    fn raise_peak(&self, candidate: i64) {
        // CAS loop to keep the max without races.
        let mut cur = self.0.peak.load(Ordering::Relaxed);
        while candidate > cur {
            match self.0.peak.compare_exchange_weak(
                cur,
                candidate,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => cur = observed,
            }
        }
    }
}

/// Fraction of samples that were hits (`true`).
#[derive(Debug, Clone, Default)]
pub struct Rate(Arc<RateCell>);

#[derive(Debug, Default)]
pub struct RateCell {
    total: AtomicU64,
    hits: AtomicU64,
}

impl Rate {
    #[inline]
    pub fn add(&self, hit: bool) {
        self.add_many(u64::from(hit), 1);
    }

    #[inline]
    pub fn add_many(&self, hits: u64, total: u64) {
        self.0.hits.fetch_add(hits, Ordering::Relaxed);
        self.0.total.fetch_add(total, Ordering::Relaxed);
    }

    pub fn summary(&self) -> RateSummary {
        // Read total first so a concurrent writer can only make hits/total look
        // slightly low, never above 1.
        let total = self.0.total.load(Ordering::Relaxed);
        let hits = self.0.hits.load(Ordering::Relaxed).min(total);
        RateSummary::new(hits, total)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateSummary {
    pub hits: u64,
    pub misses: u64,
    pub total: u64,
    pub rate: Option<f64>,
}

impl RateSummary {
    pub fn new(hits: u64, total: u64) -> Self {
        let rate = (total > 0).then(|| hits as f64 / total as f64);
        Self {
            hits,
            misses: total.saturating_sub(hits),
            total,
            rate,
        }
    }
}

#[derive(Debug, Clone)]
pub enum MetricHandle {
    Counter(Counter),
    Gauge(Gauge),
    Rate(Rate),
    Trend(Trend),
}

impl MetricHandle {
    pub fn new(kind: MetricKind) -> Self {
        match kind {
            MetricKind::Counter => Self::Counter(Counter::default()),
            MetricKind::Gauge => Self::Gauge(Gauge::default()),
            MetricKind::Rate => Self::Rate(Rate::default()),
            MetricKind::Trend => Self::Trend(Trend::default()),
        }
    }

    pub fn kind(&self) -> MetricKind {
        match self {
            Self::Counter(_) => MetricKind::Counter,
            Self::Gauge(_) => MetricKind::Gauge,
            Self::Rate(_) => MetricKind::Rate,
            Self::Trend(_) => MetricKind::Trend,
        }
    }

    pub fn value(&self) -> MetricValue {
        match self {
            Self::Counter(c) => MetricValue::Counter(c.get()),
            Self::Gauge(g) => MetricValue::Gauge {
                value: g.get(),
                max: g.peak(),
            },
            Self::Rate(r) => MetricValue::Rate(r.summary()),
            Self::Trend(t) => MetricValue::Trend(t.snapshot().summary()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricSummary {
    pub name: String,
    pub kind: MetricKind,
    pub value: MetricValue,
}

#[derive(Debug, Clone)]
pub enum MetricValue {
    Counter(u64),
    Gauge { value: i64, max: i64 },
    Rate(RateSummary),
    Trend(TrendSummary),
}
