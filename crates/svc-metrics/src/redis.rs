use crate::error::RegistrationError;
use crate::registry::{Opts, Registry};
use crate::schema::CountLatency;
use std::time::Instant;

const LABELS: [&str; 2] = ["query", "success"];
const LATENCY_BUCKETS: [f64; 16] = [
    1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 20.0,
];

/// Count and latency (ms) of Redis commands.
#[derive(Debug, Clone)]
pub struct RedisMetrics {
    queries: CountLatency,
}

impl RedisMetrics {
    pub fn new(registry: &Registry, service: &str) -> Result<Self, RegistrationError> {
        let queries = CountLatency::register(
            registry,
            Opts::new("redis_queries_count", "How many queries processed")
                .const_label("app", service)
                .variable_labels(LABELS),
            Opts::new("redis_queries_latency", "How long it took to process the query")
                .const_label("app", service)
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
