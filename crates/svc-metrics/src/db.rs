use crate::config::ServiceLabels;
use crate::error::RegistrationError;
use crate::registry::{Opts, Pending, Registry};
use std::fmt;
use std::time::Duration;

/// Point-in-time statistics of a database connection pool.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PoolStats {
    pub max_open_connections: u64,
    /// Established connections, both in use and idle.
    pub open_connections: u64,
    pub in_use: u64,
    /// Total number of connections waited for.
    pub wait_count: u64,
    /// Total time blocked waiting for a new connection.
    pub wait_duration: Duration,
}

/// Anything that can report [`PoolStats`], typically a connection pool.
///
/// Implementations must be safe to call on a closed pool.
pub trait PoolStatsSource {
    fn pool_stats(&self) -> PoolStats;
}

impl PoolStatsSource for PoolStats {
    fn pool_stats(&self) -> PoolStats {
        *self
    }
}

/// Connection-pool gauges of one database.
#[derive(Clone)]
pub struct DbMetrics {
    max_conns: metrics::Gauge,
    open_conns: metrics::Gauge,
    used_conns: metrics::Gauge,
    wait_count: metrics::Gauge,
    wait_duration_sec: metrics::Histogram,
}

impl fmt::Debug for DbMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbMetrics").finish_non_exhaustive()
    }
}

impl DbMetrics {
    pub fn new(
        registry: &Registry,
        namespace: &str,
        subsystem: &str,
        service: &str,
        host: &str,
        db_name: &str,
    ) -> Result<Self, RegistrationError> {
        let opts = |name: &str, help: &str| {
            Opts::new(name, help).const_labels([
                ("namespace", namespace),
                ("subsystem", subsystem),
                ("service", service),
                ("host", host),
                ("db", db_name),
            ])
        };

        let [max_conns, open_conns, used_conns, wait_count, wait_duration_sec] = registry
            .register_all([
                Pending::gauge(opts(
                    "nb_max_conns",
                    "Maximum number of open connections to the database.",
                )),
                Pending::gauge(opts(
                    "nb_open_conns",
                    "The number of established connections both in use and idle.",
                )),
                Pending::gauge(opts(
                    "nb_used_conns",
                    "The number of connections currently in use.",
                )),
                Pending::gauge(opts(
                    "wait_count",
                    "The total number of connections waited for.",
                )),
                Pending::summary(opts(
                    "wait_duration_sec",
                    "The total time blocked waiting for a new connection (in seconds).",
                )),
            ])?;

        Ok(Self {
            max_conns: max_conns.gauge(&[]),
            open_conns: open_conns.gauge(&[]),
            used_conns: used_conns.gauge(&[]),
            wait_count: wait_count.gauge(&[]),
            wait_duration_sec: wait_duration_sec.histogram(&[]),
        })
    }

    pub fn for_service(
        registry: &Registry,
        labels: &ServiceLabels,
        db_name: &str,
    ) -> Result<Self, RegistrationError> {
        Self::new(
            registry,
            &labels.namespace,
            &labels.subsystem,
            &labels.service,
            &labels.host,
            db_name,
        )
    }

    /// Copies the current pool statistics into the gauges and observes the
    /// cumulative wait time in the summary.
    pub fn read_stats(&self, source: &impl PoolStatsSource) {
        let stats = source.pool_stats();

        self.max_conns.set(stats.max_open_connections as f64);
        self.open_conns.set(stats.open_connections as f64);
        self.used_conns.set(stats.in_use as f64);
        self.wait_count.set(stats.wait_count as f64);
        self.wait_duration_sec
            .record(stats.wait_duration.as_secs_f64());
    }
}
