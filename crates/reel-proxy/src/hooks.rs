//! User-supplied hook functions.
//!
//! Hooks are plain shared closures. They can be built in Rust by an embedding
//! application or compiled from Rhai scripts (see [`crate::scripting`]).

use crate::error::ConfigError;
use crate::tape::{Request, Tape};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Computes a record or fallback mode name from the live request.
pub type ModeHook = Arc<dyn Fn(&Request) -> String + Send + Sync>;
/// Decides a match given the stored tape and the live request, in that order.
pub type MatchHook = Arc<dyn Fn(&Tape, &Request) -> bool + Send + Sync>;
/// Names a tape from its serialized form.
pub type NameHook = Arc<dyn Fn(&Value) -> String + Send + Sync>;
/// Picks the tape directory for a request. `None` or an empty string selects
/// the default store.
pub type PathHook = Arc<dyn Fn(&Request) -> Option<String> + Send + Sync>;
/// Rewrites a serialized tape.
pub type DecoratorHook = Arc<dyn Fn(Value) -> Value + Send + Sync>;

#[derive(Clone, Default)]
pub struct Hooks {
    pub tape_matcher: Option<MatchHook>,
    pub body_matcher: Option<MatchHook>,
    pub url_matcher: Option<MatchHook>,
    pub tape_name: Option<NameHook>,
    pub tape_path: Option<PathHook>,
    pub tape_decorator: Option<DecoratorHook>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("tape_matcher", &self.tape_matcher.is_some())
            .field("body_matcher", &self.body_matcher.is_some())
            .field("url_matcher", &self.url_matcher.is_some())
            .field("tape_name", &self.tape_name.is_some())
            .field("tape_path", &self.tape_path.is_some())
            .field("tape_decorator", &self.tape_decorator.is_some())
            .finish()
    }
}

/// A mode that is either fixed or computed per request.
///
/// Dynamic results are parsed on every call and never cached.
#[derive(Clone)]
pub enum ModeSetting<M> {
    Fixed(M),
    Dynamic(ModeHook),
}

impl<M> ModeSetting<M>
where
    M: Copy + FromStr<Err = ConfigError>,
{
    pub fn resolve(&self, request: &Request) -> Result<M, ConfigError> {
        match self {
            ModeSetting::Fixed(mode) => Ok(*mode),
            ModeSetting::Dynamic(hook) => hook(request).parse(),
        }
    }

    /// The fixed value, if this setting is not computed.
    pub fn fixed(&self) -> Option<M> {
        match self {
            ModeSetting::Fixed(mode) => Some(*mode),
            ModeSetting::Dynamic(_) => None,
        }
    }
}

impl<M: Default> Default for ModeSetting<M> {
    fn default() -> Self {
        ModeSetting::Fixed(M::default())
    }
}

impl<M: fmt::Debug> fmt::Debug for ModeSetting<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModeSetting::Fixed(mode) => f.debug_tuple("Fixed").field(mode).finish(),
            ModeSetting::Dynamic(_) => f.write_str("Dynamic(<hook>)"),
        }
    }
}
