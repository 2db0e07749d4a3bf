use crate::error::RegistrationError;
use crate::registry::{Opts, Pending, Registry};
use metrics::{Key, Label};
use std::time::Instant;

/// A registered metric family.
///
/// Holds the constant labels and the names of the variable labels. Each
/// observation passes the variable label values positionally and gets the
/// time series for constant + variable labels.
#[derive(Debug, Clone)]
pub struct Schema {
    name: String,
    const_labels: Vec<Label>,
    variable_labels: Vec<String>,
    registry: Registry,
}

impl Schema {
    pub(crate) fn new(opts: Opts, registry: Registry) -> Self {
        Self {
            name: opts.name,
            const_labels: opts
                .const_labels
                .into_iter()
                .map(|(name, value)| Label::new(name, value))
                .collect(),
            variable_labels: opts.variable_labels,
            registry,
        }
    }

    /// Builds the time series key for the given variable label values.
    ///
    /// A value count that doesn't match the declared labels is logged;
    /// missing values are recorded as empty strings and extra ones dropped.
    pub fn key(&self, values: &[&str]) -> Key {
        if values.len() != self.variable_labels.len() {
            log::warn!(
                metric = self.name.as_str(),
                expected = self.variable_labels.len(),
                got = values.len();
                "label value count mismatch"
            );
        }

        let mut labels = self.const_labels.clone();
        labels.extend(self.variable_labels.iter().enumerate().map(|(i, name)| {
            let value = values.get(i).copied().unwrap_or_default();
            Label::new(name.clone(), value.to_string())
        }));
        Key::from_parts(self.name.clone(), labels)
    }

    pub fn counter(&self, values: &[&str]) -> metrics::Counter {
        self.registry.counter(&self.key(values))
    }

    pub fn gauge(&self, values: &[&str]) -> metrics::Gauge {
        self.registry.gauge(&self.key(values))
    }

    pub fn histogram(&self, values: &[&str]) -> metrics::Histogram {
        self.registry.histogram(&self.key(values))
    }
}

/// A request counter paired with a latency histogram over the same labels.
///
/// This is the shape shared by the HTTP, SQL, Redis and queue emitters.
#[derive(Debug, Clone)]
pub(crate) struct CountLatency {
    count: Schema,
    latency: Schema,
}

impl CountLatency {
    pub(crate) fn register(
        registry: &Registry,
        count: Opts,
        latency: Opts,
        buckets: &[f64],
    ) -> Result<Self, RegistrationError> {
        let [count, latency] = registry.register_all([
            Pending::counter(count),
            Pending::histogram(latency, buckets.to_vec())?,
        ])?;
        Ok(Self { count, latency })
    }

    pub(crate) fn inc(&self, values: &[&str]) {
        self.count.counter(values).increment(1);
    }

    pub(crate) fn write_timing(&self, start: Instant, values: &[&str]) {
        self.latency
            .histogram(values)
            .record(crate::millis_since(start));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MetricValue;

    #[test]
    fn test_key_orders_const_before_variable() {
        let registry = Registry::new();
        let schema = registry
            .counter_vec(
                Opts::new("queries", "Queries")
                    .const_label("app", "shop")
                    .variable_labels(["query", "success"]),
            )
            .unwrap();

        let key = schema.key(&["select_user", "true"]);
        let labels: Vec<_> = key.labels().map(|l| (l.key(), l.value())).collect();
        assert_eq!(
            labels,
            vec![("app", "shop"), ("query", "select_user"), ("success", "true")]
        );
    }

    #[test]
    fn test_mismatched_value_count() {
        let _ = env_logger::builder().is_test(true).try_init();

        let registry = Registry::new();
        let schema = registry
            .counter_vec(Opts::new("events", "Events").variable_labels(["kind", "source"]))
            .unwrap();

        schema.counter(&["click"]).increment(1);
        schema.counter(&["click", "web", "extra"]).increment(1);

        let collected = registry.collect();
        assert_eq!(collected.len(), 2);
        assert_eq!(collected[0].label("source"), Some(""));
        assert_eq!(collected[1].label("source"), Some("web"));
        assert!(collected.iter().all(|m| m.labels.len() == 2));
    }

    #[test]
    fn test_count_latency() {
        let registry = Registry::new();
        let metrics = CountLatency::register(
            &registry,
            Opts::new("ops_count", "Ops").variable_labels(["op"]),
            Opts::new("ops_latency", "Ops latency").variable_labels(["op"]),
            &[10_000.0],
        )
        .unwrap();

        metrics.inc(&["read"]);
        metrics.write_timing(Instant::now(), &["read"]);

        let collected = registry.collect();
        assert_eq!(collected[0].name, "ops_count");
        assert_eq!(collected[0].value, MetricValue::Counter(1));
        match &collected[1].value {
            MetricValue::Histogram(h) => assert_eq!(h.buckets, vec![(10_000.0, 1)]),
            other => panic!("expected histogram, got {:?}", other),
        }
    }
}
