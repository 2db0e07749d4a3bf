use crate::error::RegistrationError;
use crate::registry::{Opts, Registry};
use crate::schema::Schema;

/// Counts application events grouped by caller-defined labels.
#[derive(Debug, Clone)]
pub struct Counter {
    schema: Schema,
}

impl Counter {
    /// Registers a counter named `name` for `app_name`.
    /// `labels` name the dimensions that [`inc`](Self::inc) and
    /// [`add`](Self::add) receive values for.
    pub fn new<S: Into<String>>(
        registry: &Registry,
        app_name: &str,
        name: &str,
        labels: impl IntoIterator<Item = S>,
    ) -> Result<Self, RegistrationError> {
        let schema = registry.counter_vec(
            Opts::new(name, format!("Counts {name}"))
                .const_label("app", app_name)
                .variable_labels(labels),
        )?;
        Ok(Self { schema })
    }

    pub fn inc(&self, label_values: &[&str]) {
        self.schema.counter(label_values).increment(1);
    }

    pub fn add(&self, value: u64, label_values: &[&str]) {
        self.schema.counter(label_values).increment(value);
    }
}
