use crate::error::RegistrationError;
use crate::registry::{Opts, Registry};
use crate::schema::CountLatency;
use std::time::Instant;

const LABELS: [&str; 2] = ["status", "topic"];
const LATENCY_BUCKETS: [f64; 12] = [
    200.0, 300.0, 400.0, 500.0, 600.0, 700.0, 800.0, 900.0, 1000.0, 1200.0, 1500.0, 2000.0,
];

/// Count and processing latency (ms) of messages consumed from a broker.
#[derive(Debug, Clone)]
pub struct MqMetrics {
    msgs: CountLatency,
}

impl MqMetrics {
    pub fn new(
        registry: &Registry,
        app_name: &str,
        host: &str,
        subject: &str,
    ) -> Result<Self, RegistrationError> {
        let const_labels = [("app", app_name), ("host", host), ("subject", subject)];
        let msgs = CountLatency::register(
            registry,
            Opts::new("msgs_count", "How many messages proceeded")
                .const_labels(const_labels)
                .variable_labels(LABELS),
            Opts::new("msgs_latency", "How long it took to process the messages")
                .const_labels(const_labels)
                .variable_labels(LABELS),
            &LATENCY_BUCKETS,
        )?;
        Ok(Self { msgs })
    }

    pub fn inc(&self, status: &str, topic: &str) {
        self.msgs.inc(&[status, topic]);
    }

    /// Records the milliseconds elapsed since `start`.
    pub fn write_timing(&self, start: Instant, status: &str, topic: &str) {
        self.msgs.write_timing(start, &[status, topic]);
    }
}
