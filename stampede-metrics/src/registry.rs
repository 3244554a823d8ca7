use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::metrics::{Counter, Gauge, MetricHandle, MetricKind, MetricSummary, Rate};
use crate::trend::Trend;

const MAX_NAME_LEN: usize = 128;

#[derive(Debug)]
struct MetricDef {
    name: Arc<str>,
    handle: MetricHandle,
}

/// Run-wide metric set.
///
/// Metrics are registered while scenarios are being defined. Once [`Registry::seal`]
/// is called the set of names is frozen; handles obtained earlier keep working and
/// are the only write path during the run.
#[derive(Debug, Default)]
pub struct Registry {
    defs: RwLock<Vec<MetricDef>>,
    by_name: DashMap<Arc<str>, usize>,
    sealed: AtomicBool,
}

impl Registry {
    pub fn register(&self, name: &str, kind: MetricKind) -> Result<MetricHandle> {
        validate_name(name)?;

        let mut defs = self.defs.write();

        // Check again under the write lock to avoid a registration race.
        if let Some(idx) = self.by_name.get(name).map(|e| *e.value()) {
            let existing = &defs[idx].handle;
            if existing.kind() != kind {
                return Err(Error::KindMismatch {
                    name: name.to_string(),
                    existing: existing.kind(),
                    requested: kind,
                });
            }
            return Ok(existing.clone());
        }

        if self.is_sealed() {
            return Err(Error::Sealed(name.to_string()));
        }

        let name: Arc<str> = Arc::from(name);
        let handle = MetricHandle::new(kind);
        self.by_name.insert(name.clone(), defs.len());
        defs.push(MetricDef {
            name,
            handle: handle.clone(),
        });

        Ok(handle)
    }

    pub fn counter(&self, name: &str) -> Result<Counter> {
        match self.register(name, MetricKind::Counter)? {
            MetricHandle::Counter(c) => Ok(c),
            other => Err(mismatch(name, other.kind(), MetricKind::Counter)),
        }
    }

    pub fn gauge(&self, name: &str) -> Result<Gauge> {
        match self.register(name, MetricKind::Gauge)? {
            MetricHandle::Gauge(g) => Ok(g),
            other => Err(mismatch(name, other.kind(), MetricKind::Gauge)),
        }
    }

    pub fn rate(&self, name: &str) -> Result<Rate> {
        match self.register(name, MetricKind::Rate)? {
            MetricHandle::Rate(r) => Ok(r),
            other => Err(mismatch(name, other.kind(), MetricKind::Rate)),
        }
    }

    pub fn trend(&self, name: &str) -> Result<Trend> {
        match self.register(name, MetricKind::Trend)? {
            MetricHandle::Trend(t) => Ok(t),
            other => Err(mismatch(name, other.kind(), MetricKind::Trend)),
        }
    }

    pub fn lookup(&self, name: &str) -> Option<MetricHandle> {
        let idx = *self.by_name.get(name)?.value();
        self.defs.read().get(idx).map(|d| d.handle.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Freezes the set of metric names.
    pub fn seal(&self) {
        self.sealed.store(true, Ordering::Release);
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.defs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Point-in-time values of every metric, sorted by name.
    pub fn summarize(&self) -> Vec<MetricSummary> {
        let handles: Vec<(Arc<str>, MetricHandle)> = self
            .defs
            .read()
            .iter()
            .map(|d| (d.name.clone(), d.handle.clone()))
            .collect();

        let mut out: Vec<MetricSummary> = handles
            .into_iter()
            .map(|(name, handle)| MetricSummary {
                name: name.to_string(),
                kind: handle.kind(),
                value: handle.value(),
            })
            .collect();

        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }
}

fn mismatch(name: &str, existing: MetricKind, requested: MetricKind) -> Error {
    Error::KindMismatch {
        name: name.to_string(),
        existing,
        requested,
    }
}

fn validate_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_first = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if !valid_first || !valid_rest || name.len() > MAX_NAME_LEN {
        return Err(Error::InvalidName(name.to_string()));
    }
    Ok(())
}
