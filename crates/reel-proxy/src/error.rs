//! Error types for the record/replay core.
//!
//! Each concern gets its own enum so callers can tell a broken configuration
//! apart from a corrupt tape or an unreachable upstream. `ProxyError` is the
//! union the request handler works with.

use std::path::PathBuf;

/// Configuration problems. These are never coerced to a default.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid record mode '{0}': expected one of NEW, OVERWRITE, DISABLED, PROXY")]
    InvalidRecordMode(String),
    #[error("Invalid fallback mode '{0}': expected one of NOT_FOUND, PROXY")]
    InvalidFallbackMode(String),
    #[error("proxy_url is required to forward requests upstream")]
    MissingProxyUrl,
    #[error("Invalid proxy_url '{0}': expected an http:// or https:// URL")]
    InvalidProxyUrl(String),
    #[error("No tape store path: set tapes_path or configure a tape_path hook")]
    NoTapeStorePath,
    #[error("Invalid {hook} script: {message}")]
    Script { hook: &'static str, message: String },
}

/// Failures while decoding or encoding a body payload.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("gzip: {0}")]
    Gzip(#[source] std::io::Error),
    #[error("deflate: {0}")]
    Deflate(#[source] std::io::Error),
    #[error("brotli: {0}")]
    Brotli(#[source] std::io::Error),
    #[error("base64: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Failures reading, writing or interpreting a tape.
#[derive(Debug, thiserror::Error)]
pub enum TapeError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid tape JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Tape is missing required field '{0}'")]
    MissingField(&'static str),
    #[error("Invalid {side} body: {reason}")]
    InvalidBody { side: &'static str, reason: String },
    #[error("Invalid HTTP method '{0}'")]
    InvalidMethod(String),
    #[error("Invalid status code {0}")]
    InvalidStatus(i64),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl TapeError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TapeError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failures talking to the upstream server.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("Invalid upstream URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },
    #[error("Failed to build upstream request: {0}")]
    Build(#[from] hyper::http::Error),
    #[error("Upstream request failed: {0}")]
    Request(#[from] hyper_util::client::legacy::Error),
    #[error("Failed to read upstream response body: {0}")]
    Body(#[from] hyper::Error),
}

/// Everything that can go wrong while handling one request.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Tape(#[from] TapeError),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_messages() {
        let err = ConfigError::InvalidRecordMode("SOMETIMES".to_string());
        assert!(err.to_string().contains("SOMETIMES"));
        assert!(err.to_string().contains("OVERWRITE"));

        let err = ConfigError::Script {
            hook: "tape_matcher",
            message: "unexpected EOF".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid tape_matcher script: unexpected EOF"
        );
    }

    #[test]
    fn test_proxy_error_is_transparent() {
        let err: ProxyError = ConfigError::NoTapeStorePath.into();
        assert_eq!(
            err.to_string(),
            ConfigError::NoTapeStorePath.to_string()
        );
        assert!(matches!(err, ProxyError::Config(_)));
    }
}
