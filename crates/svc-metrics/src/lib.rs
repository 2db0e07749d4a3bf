//! Prometheus metrics for backend services.
//!
//! A [`Registry`] holds metric families registered with a fixed schema of
//! constant and variable labels. The emitters in this crate
//! ([`HttpServerMetrics`], [`SqlMetrics`], [`WorkerMetrics`] and friends)
//! register the families a service typically exposes and record
//! observations through them. [`Registry::render`] produces the
//! Prometheus text format for scraping.
//!
//! ```ignore
//! let registry = Registry::new();
//! let sql = SqlMetrics::new(&registry, "orders", "pg-1")?;
//!
//! let start = Instant::now();
//! // run the query
//! sql.inc("select_order", "true");
//! sql.write_timing(start, "select_order", "true");
//! ```

use std::time::Instant;

mod config;
mod counter;
mod db;
mod error;
pub mod exposition;
mod gauge;
mod http_client;
mod http_server;
pub mod middleware;
mod mq;
mod paths;
mod redis;
mod registry;
mod schema;
mod sql;
mod storage;
mod worker;

pub use config::{MetricsConfig, ServiceLabels};
pub use counter::Counter;
pub use db::{DbMetrics, PoolStats, PoolStatsSource};
pub use error::{ConfigError, RegistrationError};
pub use gauge::{DbGauge, Gauge};
pub use http_client::HttpClientMetrics;
pub use http_server::HttpServerMetrics;
pub use mq::MqMetrics;
pub use paths::{normalize, PathCuttingConfig};
pub use redis::RedisMetrics;
pub use registry::{
    CollectedMetric, HistogramSnapshot, MetricKind, MetricValue, Opts, Registry, SummarySnapshot,
};
pub use schema::Schema;
pub use sql::SqlMetrics;
pub use storage::DEFAULT_BUCKETS;
pub use worker::WorkerMetrics;

/// Whole milliseconds elapsed since `start`.
pub fn millis_since(start: Instant) -> f64 {
    start.elapsed().as_millis() as f64
}

/// Elapsed time since `start` in seconds, at millisecond resolution.
pub fn seconds_since(start: Instant) -> f64 {
    millis_since(start) / 1000.0
}
