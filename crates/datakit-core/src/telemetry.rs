use crate::error::{DataError, Result};
use serde::{Deserialize, Serialize};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Layer};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

impl LogConfig {
    /// Default filter: every datakit crate at the configured level
    pub fn filter_directives(&self) -> String {
        format!(
            "datakit_core={level},datakit_decorators={level}",
            level = self.level
        )
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level when set.
pub fn init_tracing(config: &LogConfig) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::try_from_default_env()
            .map_err(|e| DataError::invalid_configuration(format!("Invalid RUST_LOG: {e}")))?
    } else {
        EnvFilter::try_new(config.filter_directives())
            .map_err(|e| DataError::invalid_configuration(format!("Invalid log level: {e}")))?
    };

    let fmt_layer = match config.format {
        LogFormat::Full => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .boxed(),
    };

    let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| DataError::internal(format!("Failed to set tracing subscriber: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LogConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Compact);
        assert_eq!(
            config.filter_directives(),
            "datakit_core=info,datakit_decorators=info"
        );
    }

    #[test]
    fn test_partial_config_deserializes() {
        let config: LogConfig = serde_json::from_str(r#"{"format": "full"}"#).unwrap();
        assert_eq!(config.format, LogFormat::Full);
        assert_eq!(config.level, "info");
    }

    #[test]
    fn test_filter_directives_parse() {
        let config = LogConfig {
            level: "debug".to_string(),
            format: LogFormat::Full,
        };
        assert!(EnvFilter::try_new(config.filter_directives()).is_ok());
    }
}
