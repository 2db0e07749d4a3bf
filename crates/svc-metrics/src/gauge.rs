use crate::config::ServiceLabels;
use crate::error::RegistrationError;
use crate::registry::{Opts, Registry};
use crate::schema::Schema;
use metrics::Key;
use std::fmt;

const NAME: &str = "gauge";
const HELP: &str = "What is the value of the parameter.";

/// A single named value of a service.
#[derive(Clone)]
pub struct Gauge {
    key: Key,
    gauge: metrics::Gauge,
}

impl fmt::Debug for Gauge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gauge").field("key", &self.key).finish()
    }
}

impl Gauge {
    pub fn new(
        registry: &Registry,
        namespace: &str,
        subsystem: &str,
        service: &str,
        value_name: &str,
    ) -> Result<Self, RegistrationError> {
        let schema = registry.gauge_vec(Opts::new(NAME, HELP).const_labels([
            ("namespace", namespace),
            ("subsystem", subsystem),
            ("service", service),
            ("value_name", value_name),
        ]))?;
        let key = schema.key(&[]);
        Ok(Self {
            gauge: registry.gauge(&key),
            key,
        })
    }

    pub fn add(&self, value: f64) {
        self.gauge.increment(value);
    }

    pub fn set(&self, value: f64) {
        self.gauge.set(value);
    }
}

/// Named values of a database, one time series per `value_name`.
#[derive(Debug, Clone)]
pub struct DbGauge {
    schema: Schema,
}

impl DbGauge {
    pub fn new(
        registry: &Registry,
        namespace: &str,
        subsystem: &str,
        service: &str,
        host: &str,
        db_name: &str,
    ) -> Result<Self, RegistrationError> {
        let schema = registry.gauge_vec(
            Opts::new(NAME, HELP)
                .const_labels([
                    ("namespace", namespace),
                    ("subsystem", subsystem),
                    ("service", service),
                    ("host", host),
                    ("db", db_name),
                ])
                .variable_labels(["value_name"]),
        )?;
        Ok(Self { schema })
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

    pub fn add(&self, value_name: &str, value: f64) {
        self.schema.gauge(&[value_name]).increment(value);
    }

    pub fn set(&self, value_name: &str, value: f64) {
        self.schema.gauge(&[value_name]).set(value);
    }
}
