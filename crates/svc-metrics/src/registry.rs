use crate::error::RegistrationError;
use crate::exposition;
use crate::schema::Schema;
use crate::storage::{Layout, LayoutStorage};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use metrics::{Key, KeyName, Metadata, Recorder, SharedString, Unit};
use metrics_util::registry::Registry as MetricsRegistry;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// The kind of a registered metric family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
    Summary,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Counter => "counter",
            Self::Gauge => "gauge",
            Self::Histogram => "histogram",
            Self::Summary => "summary",
        }
    }
}

/// Options describing a metric family at registration time.
#[derive(Debug, Clone, Default)]
pub struct Opts {
    pub name: String,
    pub help: String,
    /// Labels whose values are fixed for every observation of this family.
    pub const_labels: Vec<(String, String)>,
    /// Labels whose values are given positionally with each observation.
    pub variable_labels: Vec<String>,
}

impl Opts {
    pub fn new(name: impl Into<String>, help: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            ..Default::default()
        }
    }

    pub fn const_label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.const_labels.push((name.into(), value.into()));
        self
    }

    pub fn const_labels<K, V>(mut self, labels: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        for (name, value) in labels {
            self.const_labels.push((name.into(), value.into()));
        }
        self
    }

    pub fn variable_labels<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.variable_labels
            .extend(names.into_iter().map(Into::into));
        self
    }
}

/// What the registry remembers about a family name.
#[derive(Debug)]
struct Family {
    kind: MetricKind,
    help: String,
    /// Constant and variable label names, sorted.
    label_names: Vec<String>,
    /// Constant label sets registered under this name, each sorted by label name.
    const_sets: Vec<Vec<(String, String)>>,
}

/// A family checked and inserted by [`Registry::register_all`].
#[derive(Debug)]
pub(crate) struct Pending {
    opts: Opts,
    kind: MetricKind,
    layout: Option<Layout>,
}

impl Pending {
    pub(crate) fn counter(opts: Opts) -> Self {
        Self {
            opts,
            kind: MetricKind::Counter,
            layout: None,
        }
    }

    pub(crate) fn gauge(opts: Opts) -> Self {
        Self {
            opts,
            kind: MetricKind::Gauge,
            layout: None,
        }
    }

    /// Bucket bounds must be finite and strictly increasing.
    pub(crate) fn histogram(opts: Opts, buckets: Vec<f64>) -> Result<Self, RegistrationError> {
        let valid = buckets.iter().all(|b| b.is_finite())
            && buckets.windows(2).all(|pair| pair[0] < pair[1]);
        if !valid {
            return Err(RegistrationError::InvalidBuckets { metric: opts.name });
        }
        Ok(Self {
            opts,
            kind: MetricKind::Histogram,
            layout: Some(Layout::Buckets(Arc::from(buckets))),
        })
    }

    pub(crate) fn summary(opts: Opts) -> Self {
        Self {
            opts,
            kind: MetricKind::Summary,
            layout: Some(Layout::Summary),
        }
    }
}

/// What to revert when a batch registration fails part way.
enum Undo {
    Family(String),
    ConstSet(String, Vec<(String, String)>),
}

/// Explicit metric registry.
///
/// Families are registered once through [`counter_vec`](Self::counter_vec) and
/// friends; the returned [`Schema`] resolves label values into time series
/// stored here. Cloning is cheap and shares the underlying state.
///
/// The registry also implements [`metrics::Recorder`], so it can be installed
/// as the process-wide recorder with [`install`](Self::install).
#[derive(Clone)]
pub struct Registry {
    inner: Arc<MetricsRegistry<Key, LayoutStorage>>,
    families: Arc<DashMap<String, Family>>,
    layouts: Arc<DashMap<String, Layout>>,
    descriptions: Arc<DashMap<String, String>>,
    registration: Arc<Mutex<()>>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("families", &self.families.len())
            .finish_non_exhaustive()
    }
}

impl Registry {
    pub fn new() -> Self {
        let layouts = Arc::new(DashMap::new());
        Self {
            inner: Arc::new(MetricsRegistry::new(LayoutStorage::new(Arc::clone(
                &layouts,
            )))),
            families: Arc::new(DashMap::new()),
            layouts,
            descriptions: Arc::new(DashMap::new()),
            registration: Arc::new(Mutex::new(())),
        }
    }

    pub fn counter_vec(&self, opts: Opts) -> Result<Schema, RegistrationError> {
        self.register(Pending::counter(opts))
    }

    pub fn gauge_vec(&self, opts: Opts) -> Result<Schema, RegistrationError> {
        self.register(Pending::gauge(opts))
    }

    pub fn histogram_vec(
        &self,
        opts: Opts,
        buckets: Vec<f64>,
    ) -> Result<Schema, RegistrationError> {
        self.register(Pending::histogram(opts, buckets)?)
    }

    pub fn summary_vec(&self, opts: Opts) -> Result<Schema, RegistrationError> {
        self.register(Pending::summary(opts))
    }

    fn register(&self, pending: Pending) -> Result<Schema, RegistrationError> {
        let _guard = self.lock_registration();
        self.insert(&pending)?;
        Ok(Schema::new(pending.opts, self.clone()))
    }

    /// Registers several families at once. Either all of them are added or,
    /// on the first error, none are.
    pub(crate) fn register_all<const N: usize>(
        &self,
        families: [Pending; N],
    ) -> Result<[Schema; N], RegistrationError> {
        let _guard = self.lock_registration();

        let mut inserted = Vec::with_capacity(N);
        for pending in &families {
            match self.insert(pending) {
                Ok(undo) => inserted.push(undo),
                Err(err) => {
                    for undo in inserted.into_iter().rev() {
                        self.undo(undo);
                    }
                    return Err(err);
                }
            }
        }

        Ok(families.map(|pending| Schema::new(pending.opts, self.clone())))
    }

    fn lock_registration(&self) -> MutexGuard<'_, ()> {
        // guards no data, only serializes check-then-insert
        self.registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Checks `pending` against the known families and records it.
    fn insert(&self, pending: &Pending) -> Result<Undo, RegistrationError> {
        let Pending { opts, kind, layout } = pending;
        validate(opts)?;

        let mut label_names: Vec<String> = opts
            .const_labels
            .iter()
            .map(|(name, _)| name.clone())
            .chain(opts.variable_labels.iter().cloned())
            .collect();
        label_names.sort_unstable();

        let mut const_set = opts.const_labels.clone();
        const_set.sort_unstable();

        let undo = match self.families.entry(opts.name.clone()) {
            Entry::Occupied(mut entry) => {
                let family = entry.get_mut();
                let inconsistent = if family.kind != *kind {
                    Some("metric type")
                } else if family.help != opts.help {
                    Some("help text")
                } else if family.label_names != label_names {
                    Some("label-name set")
                } else if layout.is_some()
                    && self.layouts.get(&opts.name).map(|l| l.value().clone()) != *layout
                {
                    Some("bucket layout")
                } else {
                    None
                };
                if let Some(field) = inconsistent {
                    return Err(RegistrationError::Inconsistent {
                        metric: opts.name.clone(),
                        field,
                    });
                }
                if family.const_sets.contains(&const_set) {
                    return Err(RegistrationError::AlreadyRegistered {
                        metric: opts.name.clone(),
                    });
                }
                family.const_sets.push(const_set.clone());
                Undo::ConstSet(opts.name.clone(), const_set)
            }
            Entry::Vacant(entry) => {
                if let Some(layout) = layout {
                    self.layouts.insert(opts.name.clone(), layout.clone());
                }
                entry.insert(Family {
                    kind: *kind,
                    help: opts.help.clone(),
                    label_names,
                    const_sets: vec![const_set],
                });
                Undo::Family(opts.name.clone())
            }
        };

        log::debug!(metric = opts.name.as_str(), kind = kind.as_str(); "registered metric family");
        Ok(undo)
    }

    fn undo(&self, undo: Undo) {
        match undo {
            Undo::Family(name) => {
                self.families.remove(&name);
                self.layouts.remove(&name);
                log::debug!(metric = name.as_str(); "rolled back metric family");
            }
            Undo::ConstSet(name, set) => {
                if let Some(mut family) = self.families.get_mut(&name) {
                    family.const_sets.retain(|s| *s != set);
                }
            }
        }
    }

    /// Returns the counter time series for `key`, creating it on first use.
    pub fn counter(&self, key: &Key) -> metrics::Counter {
        metrics::Counter::from_arc(self.inner.get_or_create_counter(key, |c| c.clone()))
    }

    pub fn gauge(&self, key: &Key) -> metrics::Gauge {
        metrics::Gauge::from_arc(self.inner.get_or_create_gauge(key, |g| g.clone()))
    }

    /// Returns the distribution time series for `key`. Histogram and summary
    /// families share this storage; the registered layout decides which one it is.
    pub fn histogram(&self, key: &Key) -> metrics::Histogram {
        metrics::Histogram::from_arc(self.inner.get_or_create_histogram(key, |h| h.clone()))
    }

    /// Help text of a registered family, falling back to descriptions given
    /// through the `metrics::describe_*` macros.
    pub fn help(&self, name: &str) -> Option<String> {
        self.families
            .get(name)
            .map(|family| family.help.clone())
            .or_else(|| self.descriptions.get(name).map(|d| d.value().clone()))
    }

    /// Snapshot of every time series, sorted by name and then by labels.
    pub fn collect(&self) -> Vec<CollectedMetric> {
        let mut collected = Vec::new();

        self.inner.visit_counters(|key, counter| {
            collected.push(CollectedMetric::new(
                key,
                MetricValue::Counter(counter.load(Ordering::Acquire)),
            ));
        });

        self.inner.visit_gauges(|key, gauge| {
            collected.push(CollectedMetric::new(
                key,
                MetricValue::Gauge(f64::from_bits(gauge.load(Ordering::Acquire))),
            ));
        });

        self.inner.visit_histograms(|key, distribution| {
            collected.push(CollectedMetric::new(key, distribution.snapshot()));
        });

        collected.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.labels.cmp(&b.labels)));
        collected
    }

    /// Renders the current snapshot in the Prometheus text format.
    pub fn render(&self) -> String {
        exposition::render(&self.collect(), |name| self.help(name))
    }

    /// Installs a clone of this registry as the global `metrics` recorder.
    pub fn install(&self) -> Result<(), RegistrationError> {
        metrics::set_global_recorder(self.clone()).map_err(|_| RegistrationError::RecorderInstalled)
    }

    fn describe(&self, key: KeyName, description: SharedString) {
        self.descriptions
            .insert(key.as_str().to_string(), String::from(&*description));
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Recorder for Registry {
    fn describe_counter(&self, key: KeyName, _unit: Option<Unit>, description: SharedString) {
        self.describe(key, description);
    }

    fn describe_gauge(&self, key: KeyName, _unit: Option<Unit>, description: SharedString) {
        self.describe(key, description);
    }

    fn describe_histogram(&self, key: KeyName, _unit: Option<Unit>, description: SharedString) {
        self.describe(key, description);
    }

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> metrics::Counter {
        self.counter(key)
    }

    fn register_gauge(&self, key: &Key, _metadata: &Metadata<'_>) -> metrics::Gauge {
        self.gauge(key)
    }

    fn register_histogram(&self, key: &Key, _metadata: &Metadata<'_>) -> metrics::Histogram {
        self.histogram(key)
    }
}

fn validate(opts: &Opts) -> Result<(), RegistrationError> {
    if !is_valid_name(&opts.name, true) {
        return Err(RegistrationError::InvalidName(opts.name.clone()));
    }

    let mut seen = HashSet::new();
    let names = opts
        .const_labels
        .iter()
        .map(|(name, _)| name)
        .chain(opts.variable_labels.iter());
    for label in names {
        if !is_valid_name(label, false) || label.starts_with("__") {
            return Err(RegistrationError::InvalidLabelName {
                metric: opts.name.clone(),
                label: label.clone(),
            });
        }
        if !seen.insert(label.as_str()) {
            return Err(RegistrationError::DuplicateLabel {
                metric: opts.name.clone(),
                label: label.clone(),
            });
        }
    }
    Ok(())
}

/// Checks `[a-zA-Z_:][a-zA-Z0-9_:]*`; colons are only allowed in metric names.
fn is_valid_name(name: &str, allow_colon: bool) -> bool {
    let valid_char = |c: char| c.is_ascii_alphabetic() || c == '_' || (allow_colon && c == ':');
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if valid_char(first) => chars.all(|c| valid_char(c) || c.is_ascii_digit()),
        _ => false,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSnapshot {
    /// `(upper bound, cumulative count)` pairs, without the `+Inf` bucket.
    pub buckets: Vec<(f64, u64)>,
    pub count: u64,
    pub sum: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummarySnapshot {
    pub count: u64,
    pub sum: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Counter(u64),
    Gauge(f64),
    Histogram(HistogramSnapshot),
    Summary(SummarySnapshot),
}

impl MetricValue {
    pub fn kind(&self) -> MetricKind {
        match self {
            Self::Counter(_) => MetricKind::Counter,
            Self::Gauge(_) => MetricKind::Gauge,
            Self::Histogram(_) => MetricKind::Histogram,
            Self::Summary(_) => MetricKind::Summary,
        }
    }
}

/// One time series in a registry snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectedMetric {
    pub name: String,
    /// Constant labels followed by variable labels, in declaration order.
    pub labels: Vec<(String, String)>,
    pub value: MetricValue,
}

impl CollectedMetric {
    fn new(key: &Key, value: MetricValue) -> Self {
        Self {
            name: key.name().to_string(),
            labels: key
                .labels()
                .map(|label| (label.key().to_string(), label.value().to_string()))
                .collect(),
            value,
        }
    }

    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DEFAULT_BUCKETS;
    use assert_matches::assert_matches;

    fn opts(name: &str) -> Opts {
        Opts::new(name, "test metric")
    }

    #[test]
    fn test_counter_with_const_and_variable_labels() {
        let registry = Registry::new();
        let schema = registry
            .counter_vec(
                opts("requests")
                    .const_label("service", "billing")
                    .variable_labels(["method"]),
            )
            .unwrap();

        schema.counter(&["GET"]).increment(1);
        schema.counter(&["GET"]).increment(2);
        schema.counter(&["POST"]).increment(1);

        let collected = registry.collect();
        assert_eq!(collected.len(), 2);
        assert_eq!(
            collected[0].labels,
            vec![
                ("service".to_string(), "billing".to_string()),
                ("method".to_string(), "GET".to_string()),
            ]
        );
        assert_eq!(collected[0].value, MetricValue::Counter(3));
        assert_eq!(collected[1].label("method"), Some("POST"));
        assert_eq!(collected[1].value, MetricValue::Counter(1));
    }

    #[test]
    fn test_gauge_set_and_add() {
        let registry = Registry::new();
        let schema = registry.gauge_vec(opts("temperature")).unwrap();

        let gauge = schema.gauge(&[]);
        gauge.set(40.0);
        gauge.increment(2.5);

        let collected = registry.collect();
        assert_eq!(collected[0].value, MetricValue::Gauge(42.5));
    }

    #[test]
    fn test_duplicate_registration() {
        let registry = Registry::new();
        let register = |service: &str| {
            registry.counter_vec(
                opts("jobs")
                    .const_label("service", service)
                    .variable_labels(["status"]),
            )
        };

        register("a").unwrap();
        assert_matches!(
            register("a"),
            Err(RegistrationError::AlreadyRegistered { metric }) if metric == "jobs"
        );
        // same family, other constant values
        register("b").unwrap();
    }

    #[test]
    fn test_const_label_order_does_not_matter() {
        let registry = Registry::new();
        registry
            .gauge_vec(opts("pool").const_labels([("host", "h"), ("db", "d")]))
            .unwrap();
        assert_matches!(
            registry.gauge_vec(opts("pool").const_labels([("db", "d"), ("host", "h")])),
            Err(RegistrationError::AlreadyRegistered { .. })
        );
    }

    #[test]
    fn test_inconsistent_registration() {
        let registry = Registry::new();
        registry
            .gauge_vec(opts("gauge").const_label("service", "a"))
            .unwrap();

        assert_matches!(
            registry.gauge_vec(opts("gauge").variable_labels(["value_name"])),
            Err(RegistrationError::Inconsistent { field: "label-name set", .. })
        );
        assert_matches!(
            registry.counter_vec(opts("gauge").const_label("service", "b")),
            Err(RegistrationError::Inconsistent { field: "metric type", .. })
        );
        assert_matches!(
            registry.gauge_vec(Opts::new("gauge", "other help").const_label("service", "b")),
            Err(RegistrationError::Inconsistent { field: "help text", .. })
        );
    }

    #[test]
    fn test_histogram_bucket_layout_must_match() {
        let registry = Registry::new();
        registry
            .histogram_vec(opts("latency").const_label("app", "a"), vec![1.0, 2.0])
            .unwrap();
        assert_matches!(
            registry.histogram_vec(opts("latency").const_label("app", "b"), vec![1.0, 3.0]),
            Err(RegistrationError::Inconsistent { field: "bucket layout", .. })
        );
        registry
            .histogram_vec(opts("latency").const_label("app", "b"), vec![1.0, 2.0])
            .unwrap();
    }

    #[test]
    fn test_invalid_names() {
        let registry = Registry::new();
        assert_matches!(
            registry.counter_vec(opts("1st")),
            Err(RegistrationError::InvalidName(_))
        );
        assert_matches!(
            registry.counter_vec(opts("ok").variable_labels(["bad-label"])),
            Err(RegistrationError::InvalidLabelName { .. })
        );
        assert_matches!(
            registry.counter_vec(opts("ok").variable_labels(["__reserved"])),
            Err(RegistrationError::InvalidLabelName { .. })
        );
        assert_matches!(
            registry.counter_vec(opts("ok").const_label("app", "x").variable_labels(["app"])),
            Err(RegistrationError::DuplicateLabel { .. })
        );
        assert_matches!(
            registry.histogram_vec(opts("ok"), vec![2.0, 1.0]),
            Err(RegistrationError::InvalidBuckets { .. })
        );
        registry.counter_vec(opts("ns:ok_total")).unwrap();
    }

    #[test]
    fn test_recorder_interface() {
        let registry = Registry::new();
        let key = Key::from_parts("macro_counter", vec![metrics::Label::new("k", "v")]);
        let metadata = Metadata::new(module_path!(), metrics::Level::INFO, Some(module_path!()));

        registry.describe_counter(
            KeyName::from("macro_counter"),
            None,
            SharedString::from("Counted by macro"),
        );
        registry.register_counter(&key, &metadata).increment(4);

        let collected = registry.collect();
        assert_eq!(collected[0].name, "macro_counter");
        assert_eq!(collected[0].value, MetricValue::Counter(4));
        assert_eq!(registry.help("macro_counter").as_deref(), Some("Counted by macro"));
    }

    #[test]
    fn test_register_all_rolls_back_new_families() {
        let registry = Registry::new();
        assert_matches!(
            registry.register_all([
                Pending::counter(opts("first")),
                Pending::gauge(opts("second")),
                Pending::counter(opts("first")),
            ]),
            Err(RegistrationError::AlreadyRegistered { metric }) if metric == "first"
        );
        assert_eq!(registry.help("first"), None);
        assert_eq!(registry.help("second"), None);

        let [first, second] = registry
            .register_all([Pending::counter(opts("first")), Pending::gauge(opts("second"))])
            .unwrap();
        first.counter(&[]).increment(1);
        second.gauge(&[]).set(2.0);
        assert_eq!(registry.collect().len(), 2);
    }

    #[test]
    fn test_register_all_rolls_back_const_sets() {
        let registry = Registry::new();
        registry
            .histogram_vec(opts("latency").const_label("app", "a"), vec![1.0])
            .unwrap();
        registry.gauge_vec(opts("taken")).unwrap();

        assert_matches!(
            registry.register_all([
                Pending::histogram(opts("latency").const_label("app", "b"), vec![1.0]).unwrap(),
                Pending::counter(opts("taken")),
            ]),
            Err(RegistrationError::Inconsistent { field: "metric type", .. })
        );

        // the failed batch left no const set behind
        registry
            .histogram_vec(opts("latency").const_label("app", "b"), vec![1.0])
            .unwrap();
        assert_matches!(
            registry.histogram_vec(opts("latency").const_label("app", "a"), vec![1.0]),
            Err(RegistrationError::AlreadyRegistered { .. })
        );
    }

    // The global recorder can be set once per process, so this is the only
    // test that installs one.
    #[test]
    fn test_install() {
        let registry = Registry::new();
        registry.install().unwrap();

        metrics::describe_counter!("installed_jobs", "Jobs handled by the installed recorder");
        metrics::counter!("installed_jobs", "queue" => "mail").increment(2);
        metrics::histogram!("installed_job_seconds").record(0.3);

        let collected = registry.collect();
        let jobs = collected
            .iter()
            .find(|m| m.name == "installed_jobs")
            .expect("counter recorded through the macro");
        assert_eq!(jobs.label("queue"), Some("mail"));
        assert_eq!(jobs.value, MetricValue::Counter(2));
        assert_eq!(
            registry.help("installed_jobs").as_deref(),
            Some("Jobs handled by the installed recorder")
        );

        let seconds = collected
            .iter()
            .find(|m| m.name == "installed_job_seconds")
            .expect("histogram recorded through the macro");
        match &seconds.value {
            MetricValue::Histogram(h) => {
                assert_eq!(h.count, 1);
                assert_eq!(h.buckets.len(), DEFAULT_BUCKETS.len());
                assert!(h.buckets.contains(&(0.25, 0)));
                assert!(h.buckets.contains(&(0.5, 1)));
            }
            other => panic!("expected histogram, got {:?}", other),
        }

        assert_matches!(
            Registry::new().install(),
            Err(RegistrationError::RecorderInstalled)
        );
    }
}
