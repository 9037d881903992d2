use tracing::subscriber;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::LogConfig;
use crate::error::{Result, StsKeepError};

/// Environment variable that overrides the configured filter.
pub const LOG_ENV: &str = "STSKEEP_LOG";

/// Install a global `tracing` subscriber for hosts that don't bring their own.
///
/// Returns `false` when a global subscriber was already set; the existing one is
/// left in place.
pub fn init(config: &LogConfig) -> Result<bool> {
    let filter = match EnvFilter::try_from_env(LOG_ENV) {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.filter).map_err(|e| {
            StsKeepError::InvalidConfig(format!("Invalid log filter '{}': {}", config.filter, e))
        })?,
    };

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true);

    let installed = if config.json {
        subscriber::set_global_default(builder.json().finish())
    } else {
        subscriber::set_global_default(builder.compact().finish())
    };

    Ok(installed.is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_invalid_filter_rejected() {
        std::env::remove_var(LOG_ENV);
        let config = LogConfig {
            filter: "stskeep=notalevel".into(),
            json: false,
        };
        let err = init(&config).unwrap_err();
        assert_eq!(err.error_code(), "invalid_config");
    }

    #[test]
    #[serial]
    fn test_second_init_keeps_existing_subscriber() {
        std::env::remove_var(LOG_ENV);
        let config = LogConfig::default();
        let _ = init(&config).unwrap();
        assert!(!init(&config).unwrap());
    }
}
