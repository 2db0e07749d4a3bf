use crate::error::RegistrationError;
use crate::registry::{Opts, Registry};
use crate::schema::CountLatency;
use std::time::Instant;

const LABELS: [&str; 2] = ["query", "success"];
const LATENCY_BUCKETS: [f64; 12] = [
    200.0, 300.0, 400.0, 500.0, 600.0, 700.0, 800.0, 900.0, 1000.0, 1200.0, 1500.0, 2000.0,
];

/// Count and latency (ms) of SQL queries against one database host.
#[derive(Debug, Clone)]
pub struct SqlMetrics {
    queries: CountLatency,
}

impl SqlMetrics {
    pub fn new(registry: &Registry, service: &str, host: &str) -> Result<Self, RegistrationError> {
        let const_labels = [("app", service), ("host", host)];
        let queries = CountLatency::register(
            registry,
            Opts::new("queries_count", "How many queries processed")
                .const_labels(const_labels)
                .variable_labels(LABELS),
            Opts::new("queries_latency", "How long it took to process the query")
                .const_labels(const_labels)
                .variable_labels(LABELS),
            &LATENCY_BUCKETS,
        )?;
        Ok(Self { queries })
    }

    pub fn inc(&self, query: &str, success: &str) {
        self.queries.inc(&[query, success]);
    }

    /// Records the milliseconds elapsed since `start`.
    pub fn write_timing(&self, start: Instant, query: &str, success: &str) {
        self.queries.write_timing(start, &[query, success]);
    }
}
