use crate::error::RegistrationError;
use crate::registry::{Opts, Registry};
use crate::schema::Schema;

const STATUS_CALLED: &str = "called";
const STATUS_FAILED: &str = "failed";
const STATUS_SUCCEED: &str = "succeed";

/// Counts runs of a background worker by outcome.
///
/// Successes can be derived as `called - failed`, or counted directly
/// with [`succeed`](Self::succeed).
#[derive(Debug, Clone)]
pub struct WorkerMetrics {
    schema: Schema,
}

impl WorkerMetrics {
    pub fn new(
        registry: &Registry,
        app_name: &str,
        worker_name: &str,
    ) -> Result<Self, RegistrationError> {
        let schema = registry.counter_vec(
            Opts::new(
                "worker_metric",
                "Number of times worker has the specified in label status",
            )
            .const_labels([("app", app_name), ("worker", worker_name)])
            .variable_labels(["status"]),
        )?;
        Ok(Self { schema })
    }

    pub fn called(&self) {
        self.schema.counter(&[STATUS_CALLED]).increment(1);
    }

    pub fn failed(&self) {
        self.schema.counter(&[STATUS_FAILED]).increment(1);
    }

    pub fn succeed(&self) {
        self.schema.counter(&[STATUS_SUCCEED]).increment(1);
    }
}
