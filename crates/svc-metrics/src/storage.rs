use crate::registry::{HistogramSnapshot, MetricValue, SummarySnapshot};
use dashmap::DashMap;
use metrics::{HistogramFn, Key};
use metrics_util::registry::Storage;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Buckets used for histograms recorded through the `metrics` macros
/// without a registered family.
pub const DEFAULT_BUCKETS: [f64; 11] =
    [0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// How observations of a distribution family are aggregated.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Layout {
    Buckets(Arc<[f64]>),
    /// Count and sum only.
    Summary,
}

/// Registry storage that picks the distribution layout by metric name.
#[derive(Debug)]
pub(crate) struct LayoutStorage {
    layouts: Arc<DashMap<String, Layout>>,
}

impl LayoutStorage {
    pub(crate) fn new(layouts: Arc<DashMap<String, Layout>>) -> Self {
        Self { layouts }
    }
}

impl Storage<Key> for LayoutStorage {
    type Counter = Arc<AtomicU64>;
    type Gauge = Arc<AtomicU64>;
    type Histogram = Arc<Distribution>;

    fn counter(&self, _key: &Key) -> Self::Counter {
        Arc::new(AtomicU64::new(0))
    }

    fn gauge(&self, _key: &Key) -> Self::Gauge {
        Arc::new(AtomicU64::new(0))
    }

    fn histogram(&self, key: &Key) -> Self::Histogram {
        let layout = self
            .layouts
            .get(key.name())
            .map(|layout| layout.value().clone())
            .unwrap_or_else(|| Layout::Buckets(Arc::from(DEFAULT_BUCKETS.as_slice())));
        Arc::new(Distribution::new(layout))
    }
}

/// A single distribution time series.
///
/// Each observation lands in exactly one slot: the first bucket whose bound
/// is `>=` the value, or the trailing overflow slot. Summaries only have the
/// overflow slot. The total count is the sum of all slots, so a snapshot
/// never reports `+Inf` below the last finite bucket.
#[derive(Debug)]
pub struct Distribution {
    bounds: Option<Arc<[f64]>>,
    counts: Box<[AtomicU64]>,
    sum: AtomicU64,
}

impl Distribution {
    pub(crate) fn new(layout: Layout) -> Self {
        let bounds = match layout {
            Layout::Buckets(bounds) => Some(bounds),
            Layout::Summary => None,
        };
        let slots = bounds.as_ref().map_or(0, |b| b.len()) + 1;

        Self {
            bounds,
            counts: (0..slots).map(|_| AtomicU64::new(0)).collect(),
            sum: AtomicU64::new(0.0f64.to_bits()),
        }
    }

    pub fn observe(&self, value: f64) {
        let idx = self
            .bounds
            .as_ref()
            .map_or(0, |bounds| bounds.partition_point(|bound| *bound < value));
        if let Some(slot) = self.counts.get(idx) {
            slot.fetch_add(1, Ordering::AcqRel);
        }

        _ = self
            .sum
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                Some((f64::from_bits(bits) + value).to_bits())
            });
    }

    pub(crate) fn snapshot(&self) -> MetricValue {
        let loaded: Vec<u64> = self
            .counts
            .iter()
            .map(|slot| slot.load(Ordering::Acquire))
            .collect();
        let count = loaded.iter().sum();
        let sum = f64::from_bits(self.sum.load(Ordering::Acquire));

        match &self.bounds {
            Some(bounds) => {
                let mut cumulative = 0;
                let buckets = bounds
                    .iter()
                    .zip(&loaded)
                    .map(|(bound, n)| {
                        cumulative += n;
                        (*bound, cumulative)
                    })
                    .collect();
                MetricValue::Histogram(HistogramSnapshot {
                    buckets,
                    count,
                    sum,
                })
            }
            None => MetricValue::Summary(SummarySnapshot { count, sum }),
        }
    }
}

impl HistogramFn for Distribution {
    fn record(&self, value: f64) {
        self.observe(value);
    }
}
