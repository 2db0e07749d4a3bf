use crate::error::RegistrationError;
use crate::paths::{self, PathCuttingConfig};
use crate::registry::{Opts, Registry};
use crate::schema::CountLatency;
use std::time::Instant;

const LABELS: [&str; 4] = ["method", "status", "path", "client"];
const LATENCY_BUCKETS: [f64; 12] = [
    5.0, 10.0, 20.0, 30.0, 50.0, 70.0, 100.0, 150.0, 200.0, 300.0, 500.0, 1000.0,
];

/// Count and latency (ms) of requests handled by an HTTP server.
#[derive(Debug, Clone)]
pub struct HttpServerMetrics {
    path_cutting: Option<PathCuttingConfig>,
    reqs: CountLatency,
}

impl HttpServerMetrics {
    pub fn new(registry: &Registry, app_name: &str) -> Result<Self, RegistrationError> {
        let reqs = CountLatency::register(
            registry,
            Opts::new("reqs_count", "How many HTTP requests processed")
                .const_label("app", app_name)
                .variable_labels(LABELS),
            Opts::new("reqs_latency", "How long it took to process the request")
                .const_label("app", app_name)
                .variable_labels(LABELS),
            &LATENCY_BUCKETS,
        )?;
        Ok(Self {
            path_cutting: None,
            reqs,
        })
    }

    /// Normalizes the `path` label of every observation with `config`.
    pub fn with_path_cutting(mut self, config: PathCuttingConfig) -> Self {
        self.path_cutting = Some(config);
        self
    }

    pub fn inc(&self, method: &str, status: &str, path: &str, client: &str) {
        let path = paths::normalize(path, self.path_cutting.as_ref());
        self.reqs.inc(&[method, status, &*path, client]);
    }

    /// Records the milliseconds elapsed since `start`.
    pub fn write_timing(&self, start: Instant, method: &str, status: &str, path: &str, client: &str) {
        let path = paths::normalize(path, self.path_cutting.as_ref());
        self.reqs.write_timing(start, &[method, status, &*path, client]);
    }
}
