use crate::config::LoggingSettings;
use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;

/// Environment variable that overrides the configured filter.
pub const LOG_ENV: &str = "TINYSH_LOG";

/// Installs the global subscriber. Events go to standard error so they never mix
/// with command output.
pub fn init(settings: &LoggingSettings) -> Result<()> {
    let filter = filter(settings)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("cannot initialise logging: {e}"))
}

fn filter(settings: &LoggingSettings) -> Result<EnvFilter> {
    match EnvFilter::try_from_env(LOG_ENV) {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&settings.filter)
            .map_err(|e| anyhow!("invalid logging filter {:?}: {e}", settings.filter)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_filter_is_reported() {
        let settings = LoggingSettings {
            filter: "tinysh=notalevel".to_string(),
        };
        // Only meaningful when the override variable is absent.
        if std::env::var_os(LOG_ENV).is_none() {
            assert!(filter(&settings).is_err());
        }
    }

    #[test]
    fn test_configured_filter_is_used() {
        let settings = LoggingSettings {
            filter: "debug".to_string(),
        };
        if std::env::var_os(LOG_ENV).is_none() {
            assert_eq!(filter(&settings).unwrap().to_string(), "debug");
        }
    }
}
