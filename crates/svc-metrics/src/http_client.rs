use crate::config::ServiceLabels;
use crate::error::RegistrationError;
use crate::paths::{self, PathCuttingConfig};
use crate::registry::{Opts, Registry};
use crate::schema::CountLatency;
use std::time::Instant;

const LABELS: [&str; 3] = ["method", "status", "path"];
const LATENCY_BUCKETS: [f64; 12] = [
    200.0, 300.0, 400.0, 500.0, 600.0, 700.0, 800.0, 900.0, 1000.0, 1200.0, 1500.0, 2000.0,
];

/// Count and latency (ms) of outgoing requests to a remote HTTP service.
#[derive(Debug, Clone)]
pub struct HttpClientMetrics {
    path_cutting: Option<PathCuttingConfig>,
    reqs: CountLatency,
}

impl HttpClientMetrics {
    pub fn new(
        registry: &Registry,
        namespace: &str,
        subsystem: &str,
        service: &str,
        remote_service: &str,
    ) -> Result<Self, RegistrationError> {
        let const_labels = [
            ("namespace", namespace),
            ("subsystem", subsystem),
            ("service", service),
            ("remote_service", remote_service),
        ];
        let reqs = CountLatency::register(
            registry,
            Opts::new("client_reqs_count", "How many HTTP requests processed")
                .const_labels(const_labels)
                .variable_labels(LABELS),
            Opts::new(
                "client_reqs_latency_milliseconds",
                "How long it took to process the request",
            )
            .const_labels(const_labels)
            .variable_labels(LABELS),
            &LATENCY_BUCKETS,
        )?;
        Ok(Self {
            path_cutting: None,
            reqs,
        })
    }

    pub fn for_service(
        registry: &Registry,
        labels: &ServiceLabels,
        remote_service: &str,
    ) -> Result<Self, RegistrationError> {
        Self::new(
            registry,
            &labels.namespace,
            &labels.subsystem,
            &labels.service,
            remote_service,
        )
    }

    /// Normalizes the `path` label of every observation with `config`.
    pub fn with_path_cutting(mut self, config: PathCuttingConfig) -> Self {
        self.path_cutting = Some(config);
        self
    }

    pub fn inc(&self, method: &str, status: &str, path: &str) {
        let path = paths::normalize(path, self.path_cutting.as_ref());
        self.reqs.inc(&[method, status, &*path]);
    }

    /// Records the milliseconds elapsed since `start`.
    pub fn write_timing(&self, start: Instant, method: &str, status: &str, path: &str) {
        let path = paths::normalize(path, self.path_cutting.as_ref());
        self.reqs.write_timing(start, &[method, status, &*path]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MetricValue;
    use crate::testutil::find;
    use assert_matches::assert_matches;

    fn labels() -> ServiceLabels {
        ServiceLabels {
            namespace: "shop".into(),
            subsystem: "checkout".into(),
            service: "api".into(),
            host: String::new(),
        }
    }

    #[test]
    fn test_path_cutting() {
        let registry = Registry::new();
        let metrics = HttpClientMetrics::for_service(&registry, &labels(), "payments")
            .unwrap()
            .with_path_cutting(PathCuttingConfig {
                remove_query: true,
                remove_numeric_segments: true,
                slice_bounds: Some((0, 4)),
            });

        metrics.inc("GET", "200", "/v1/charges/991/refunds/3?expand=all");
        metrics.inc("GET", "200", "/v1/charges/12/refunds");

        let collected = registry.collect();
        let m = find(
            &collected,
            "client_reqs_count",
            &[("path", "/v1/charges"), ("remote_service", "payments")],
        );
        assert_eq!(m.value, MetricValue::Counter(2));
    }

    #[test]
    fn test_write_timing_buckets() {
        let registry = Registry::new();
        let metrics = HttpClientMetrics::new(&registry, "shop", "checkout", "api", "payments").unwrap();
        metrics.write_timing(Instant::now(), "POST", "500", "/v1/charges");

        let collected = registry.collect();
        match &find(&collected, "client_reqs_latency_milliseconds", &[("status", "500")]).value {
            MetricValue::Histogram(h) => {
                assert_eq!(h.count, 1);
                assert_eq!(h.buckets.first(), Some(&(200.0, 1)));
                assert_eq!(h.buckets.last(), Some(&(2000.0, 1)));
            }
            other => panic!("expected histogram, got {:?}", other),
        }
    }

    #[test]
    fn test_one_family_per_remote_service() {
        let registry = Registry::new();
        HttpClientMetrics::for_service(&registry, &labels(), "payments").unwrap();
        HttpClientMetrics::for_service(&registry, &labels(), "inventory").unwrap();
        assert_matches!(
            HttpClientMetrics::for_service(&registry, &labels(), "payments"),
            Err(RegistrationError::AlreadyRegistered { .. })
        );
    }
}
