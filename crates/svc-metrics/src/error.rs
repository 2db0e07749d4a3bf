use thiserror::Error;

/// Error returned when a metric family cannot be added to a [`Registry`](crate::Registry).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("invalid metric name {0:?}")]
    InvalidName(String),

    #[error("metric {metric:?}: invalid label name {label:?}")]
    InvalidLabelName { metric: String, label: String },

    #[error("metric {metric:?}: duplicate label name {label:?}")]
    DuplicateLabel { metric: String, label: String },

    /// Histogram bucket bounds must be finite and strictly increasing.
    #[error("metric {metric:?}: invalid histogram buckets")]
    InvalidBuckets { metric: String },

    /// The name is taken by a family with another type, help text,
    /// label-name set or bucket layout.
    #[error("metric {metric:?} already registered with a different {field}")]
    Inconsistent { metric: String, field: &'static str },

    #[error("metric {metric:?} already registered with the same constant labels")]
    AlreadyRegistered { metric: String },

    #[error("a global metrics recorder is already installed")]
    RecorderInstalled,
}

/// Error type for loading metric configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid metrics config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing environment variable {0}")]
    MissingEnv(&'static str),
}
