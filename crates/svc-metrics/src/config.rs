use crate::error::ConfigError;
use crate::paths::PathCuttingConfig;
use serde::{Deserialize, Serialize};

/// Constant labels identifying the service that owns a set of emitters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceLabels {
    pub namespace: String,
    pub subsystem: String,
    pub service: String,
    pub host: String,
}

impl ServiceLabels {
    pub fn from_json(data: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(data)?)
    }

    /// Reads `METRICS_SERVICE` (required) and the optional
    /// `METRICS_NAMESPACE`, `METRICS_SUBSYSTEM` and `METRICS_HOST`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let service = lookup("METRICS_SERVICE")
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::MissingEnv("METRICS_SERVICE"))?;

        Ok(Self {
            namespace: lookup("METRICS_NAMESPACE").unwrap_or_default(),
            subsystem: lookup("METRICS_SUBSYSTEM").unwrap_or_default(),
            service,
            host: lookup("METRICS_HOST").unwrap_or_default(),
        })
    }
}

/// Metric settings as they appear in a service config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    #[serde(flatten)]
    pub labels: ServiceLabels,
    pub http_server_paths: Option<PathCuttingConfig>,
    pub http_client_paths: Option<PathCuttingConfig>,
}

impl MetricsConfig {
    pub fn from_json(data: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(data)?)
    }
}
