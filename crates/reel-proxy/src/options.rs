//! Matching and recording policy shared by every component of a server.
//!
//! An [`Options`] value is built once (usually from the YAML config) and
//! handed around as `Arc<Options>`. Nothing in the core mutates it.

use crate::error::ConfigError;
use crate::hooks::{Hooks, ModeSetting};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_NAME: &str = "reel";

/// Whether and when live upstream calls are made and persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordMode {
    /// Replay matching tapes, record everything else.
    #[default]
    New,
    /// Always call upstream and replace any matching tape.
    Overwrite,
    /// Replay only; unmatched requests go to the fallback mode.
    Disabled,
    /// Pass through without touching tapes.
    Proxy,
}

impl RecordMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordMode::New => "NEW",
            RecordMode::Overwrite => "OVERWRITE",
            RecordMode::Disabled => "DISABLED",
            RecordMode::Proxy => "PROXY",
        }
    }
}

impl FromStr for RecordMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NEW" => Ok(RecordMode::New),
            "OVERWRITE" => Ok(RecordMode::Overwrite),
            "DISABLED" => Ok(RecordMode::Disabled),
            "PROXY" => Ok(RecordMode::Proxy),
            _ => Err(ConfigError::InvalidRecordMode(s.to_string())),
        }
    }
}

impl fmt::Display for RecordMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do under `DISABLED` when no tape matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FallbackMode {
    #[default]
    NotFound,
    Proxy,
}

impl FallbackMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackMode::NotFound => "NOT_FOUND",
            FallbackMode::Proxy => "PROXY",
        }
    }
}

impl FromStr for FallbackMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NOT_FOUND" => Ok(FallbackMode::NotFound),
            "PROXY" => Ok(FallbackMode::Proxy),
            _ => Err(ConfigError::InvalidFallbackMode(s.to_string())),
        }
    }
}

impl fmt::Display for FallbackMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request normalization rules used by the tape matcher.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MatchingOptions {
    /// Header names left out of recorded tapes and of header comparison.
    #[serde(default = "default_ignore_headers")]
    pub ignore_headers: Vec<String>,
    #[serde(default)]
    pub ignore_all_headers: bool,
    /// Query parameter names (percent-decoded) left out of URL comparison.
    #[serde(default)]
    pub ignore_query_params: Vec<String>,
    #[serde(default)]
    pub ignore_all_query_params: bool,
    #[serde(default)]
    pub ignore_body: bool,
}

fn default_ignore_headers() -> Vec<String> {
    vec!["content-length".to_string(), "host".to_string()]
}

impl Default for MatchingOptions {
    fn default() -> Self {
        Self {
            ignore_headers: default_ignore_headers(),
            ignore_all_headers: false,
            ignore_query_params: Vec::new(),
            ignore_all_query_params: false,
            ignore_body: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Options {
    /// Product name used in synthesized responses and the summary.
    pub name: String,
    /// Upstream base URL.
    pub proxy_url: Option<String>,
    /// Directory of the default tape store.
    pub tapes_path: Option<PathBuf>,
    pub record_mode: ModeSetting<RecordMode>,
    pub fallback_mode: ModeSetting<FallbackMode>,
    pub matching: MatchingOptions,
    pub hooks: Hooks,
    /// Log a summary of new and unused tapes on close.
    pub summary: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            proxy_url: None,
            tapes_path: Some(PathBuf::from("./tapes")),
            record_mode: ModeSetting::default(),
            fallback_mode: ModeSetting::default(),
            matching: MatchingOptions::default(),
            hooks: Hooks::default(),
            summary: true,
        }
    }
}

impl Options {
    /// Check what can be checked without a request in hand.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(url) = &self.proxy_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidProxyUrl(url.clone()));
            }
        } else {
            let records = matches!(
                self.record_mode.fixed(),
                Some(RecordMode::New | RecordMode::Overwrite | RecordMode::Proxy)
            );
            let falls_back = self.fallback_mode.fixed() == Some(FallbackMode::Proxy)
                && self.record_mode.fixed() == Some(RecordMode::Disabled);
            if records || falls_back {
                return Err(ConfigError::MissingProxyUrl);
            }
        }
        Ok(())
    }

    /// The upstream base URL, required as soon as a request must be forwarded.
    pub fn upstream_url(&self) -> Result<&str, ConfigError> {
        self.proxy_url
            .as_deref()
            .ok_or(ConfigError::MissingProxyUrl)
    }

    /// Header names removed from recorded requests.
    pub(crate) fn recorded_header_filter(&self) -> &[String] {
        if self.matching.ignore_all_headers {
            &[]
        } else {
            &self.matching.ignore_headers
        }
    }
}
