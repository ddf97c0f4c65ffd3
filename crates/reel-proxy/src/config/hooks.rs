//! Rhai hook scripts.

use serde::{Deserialize, Serialize};

/// Script source for each hook. An absent entry leaves the hook unset.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HookScripts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tape_matcher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_matcher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_matcher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tape_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tape_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tape_decorator: Option<String>,
}
