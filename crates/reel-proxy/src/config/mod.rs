//! Configuration types for the reel server.

mod hooks;
mod listen;
mod logging;
mod upstream;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::hooks::ModeSetting;
use crate::options::{FallbackMode, MatchingOptions, Options, RecordMode, DEFAULT_NAME};
use crate::scripting::ScriptHooks;

pub use hooks::HookScripts;
pub use listen::{ListenConfig, TlsConfig};
pub use logging::{LogFormat, LoggingConfig};
pub use upstream::ConnectionPoolConfig;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Shown in the 404 body and the summary header
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default)]
    pub listen: ListenConfig,

    /// Upstream base URL, e.g. `http://localhost:9000`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<String>,

    #[serde(default = "default_tapes_path")]
    pub tapes_path: Option<PathBuf>,

    #[serde(default)]
    pub record_mode: RecordMode,
    #[serde(default)]
    pub fallback_mode: FallbackMode,

    #[serde(default)]
    pub matching: MatchingOptions,

    /// Rhai scripts; a record/fallback mode script overrides the fixed mode
    #[serde(default)]
    pub hooks: HookScripts,

    #[serde(default)]
    pub connection_pool: ConnectionPoolConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default = "default_summary")]
    pub summary: bool,
}

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

fn default_tapes_path() -> Option<PathBuf> {
    Some(PathBuf::from("./tapes"))
}

fn default_summary() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: default_name(),
            listen: ListenConfig::default(),
            proxy_url: None,
            tapes_path: default_tapes_path(),
            record_mode: RecordMode::default(),
            fallback_mode: FallbackMode::default(),
            matching: MatchingOptions::default(),
            hooks: HookScripts::default(),
            connection_pool: ConnectionPoolConfig::default(),
            logging: LoggingConfig::default(),
            summary: default_summary(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file {}: {e}", path.display()))?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, anyhow::Error> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if let Some(tls) = &self.listen.tls {
            if tls.cert_path.trim().is_empty() || tls.key_path.trim().is_empty() {
                anyhow::bail!(
                    "TLS configuration requires both 'listen.tls.cert_path' and 'listen.tls.key_path'"
                );
            }
        }
        self.listen.socket_addr()?;

        // Compiles every hook script and checks the upstream URL.
        self.to_options()?;
        Ok(())
    }

    /// Build the runtime options, compiling hook scripts.
    pub fn to_options(&self) -> Result<Options, ConfigError> {
        let scripts = ScriptHooks::compile(&self.hooks)?;

        let record_mode = match scripts.record_mode() {
            Some(hook) => ModeSetting::Dynamic(hook),
            None => ModeSetting::Fixed(self.record_mode),
        };
        let fallback_mode = match scripts.fallback_mode() {
            Some(hook) => ModeSetting::Dynamic(hook),
            None => ModeSetting::Fixed(self.fallback_mode),
        };

        let options = Options {
            name: self.name.clone(),
            proxy_url: self
                .proxy_url
                .as_ref()
                .map(|url| url.trim_end_matches('/').to_string()),
            tapes_path: self.tapes_path.clone(),
            record_mode,
            fallback_mode,
            matching: self.matching.clone(),
            hooks: scripts.hooks(),
            summary: self.summary,
        };
        options.validate()?;
        Ok(options)
    }
}
