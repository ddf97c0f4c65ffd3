//! Tracing subscriber setup for the `reel` binary.

use anyhow::anyhow;
use tracing_subscriber::EnvFilter;

use crate::config::{Config, LogFormat};

const DEFAULT_LOG_LEVEL: &str = "info";

/// Install the global subscriber.
///
/// The level comes from the CLI override, then the config file, then
/// `RUST_LOG`, then `info`.
pub fn init(config: &Config, cli_level_override: Option<&str>) -> anyhow::Result<()> {
    let filter = resolve_filter(config, cli_level_override)?;

    match config.logging.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .pretty()
            .try_init(),
    }
    .map_err(|err| anyhow!("initialize logging subscriber: {err}"))?;

    Ok(())
}

fn resolve_filter(config: &Config, cli_level_override: Option<&str>) -> anyhow::Result<EnvFilter> {
    let explicit = cli_level_override.or(config.logging.level.as_deref());
    if let Some(raw_level) = explicit {
        return parse_level(raw_level);
    }

    match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(&directives)
            .map_err(|e| anyhow!("invalid {} `{directives}`: {e}", EnvFilter::DEFAULT_ENV)),
        _ => parse_level(DEFAULT_LOG_LEVEL),
    }
}

fn parse_level(raw_level: &str) -> anyhow::Result<EnvFilter> {
    let normalized = raw_level.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" | "off" => Ok(EnvFilter::new(normalized)),
        _ => Err(anyhow!(
            "invalid log level `{raw_level}`; expected one of trace, debug, info, warn, error, off"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured(level: &str) -> Config {
        let mut config = Config::default();
        config.logging.level = Some(level.to_string());
        config
    }

    #[test]
    fn test_cli_level_wins() {
        let filter = resolve_filter(&configured("warn"), Some("DEBUG")).unwrap();
        assert_eq!(filter.to_string(), "debug");
    }

    #[test]
    fn test_config_level_used_without_override() {
        let filter = resolve_filter(&configured("error"), None).unwrap();
        assert_eq!(filter.to_string(), "error");
    }

    #[test]
    fn test_invalid_level_rejected() {
        let err = resolve_filter(&configured("verbose"), None).unwrap_err();
        assert!(
            err.to_string().contains("invalid log level"),
            "unexpected error: {err}"
        );
    }
}
