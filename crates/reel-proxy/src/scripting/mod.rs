//! Rhai-backed hooks.
//!
//! Each configured script is compiled once into an AST and wrapped in a
//! closure of the matching hook type. Scripts see two variables:
//!
//! - `request`: a map with `method`, `path`, `url`, `query`, `headers` and
//!   `body` (text, or `()` when the body is absent or not UTF-8)
//! - `tape`: the serialized tape, for matcher, name and decorator scripts
//!
//! The value of the last expression is the hook result. A runtime error is
//! logged and degrades to a neutral result: mode scripts yield the error
//! text (which then fails to parse as a mode), matchers yield `false`, the
//! name script yields an empty name, and the decorator leaves the tape as is.

use crate::config::HookScripts;
use crate::error::ConfigError;
use crate::hooks::{DecoratorHook, Hooks, MatchHook, ModeHook, NameHook, PathHook};
use crate::tape::{Request, Tape};
use rhai::{Array, Dynamic, Engine, EvalAltResult, Map, Scope, AST};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, warn};

/// Compiled hook scripts from the configuration file.
#[derive(Default)]
pub struct ScriptHooks {
    hooks: Hooks,
    record_mode: Option<ModeHook>,
    fallback_mode: Option<ModeHook>,
}

impl ScriptHooks {
    pub fn compile(scripts: &HookScripts) -> Result<Self, ConfigError> {
        let engine = Arc::new(Engine::new());
        let compile = |hook: &'static str, source: &Option<String>| {
            source
                .as_deref()
                .map(|source| Script::compile(&engine, hook, source))
                .transpose()
        };

        let record_mode = compile("record_mode", &scripts.record_mode)?.map(Script::into_mode_hook);
        let fallback_mode =
            compile("fallback_mode", &scripts.fallback_mode)?.map(Script::into_mode_hook);
        let hooks = Hooks {
            tape_matcher: compile("tape_matcher", &scripts.tape_matcher)?
                .map(Script::into_match_hook),
            body_matcher: compile("body_matcher", &scripts.body_matcher)?
                .map(Script::into_match_hook),
            url_matcher: compile("url_matcher", &scripts.url_matcher)?.map(Script::into_match_hook),
            tape_name: compile("tape_name", &scripts.tape_name)?.map(Script::into_name_hook),
            tape_path: compile("tape_path", &scripts.tape_path)?.map(Script::into_path_hook),
            tape_decorator: compile("tape_decorator", &scripts.tape_decorator)?
                .map(Script::into_decorator_hook),
        };

        Ok(Self {
            hooks,
            record_mode,
            fallback_mode,
        })
    }

    pub fn hooks(&self) -> Hooks {
        self.hooks.clone()
    }

    pub fn record_mode(&self) -> Option<ModeHook> {
        self.record_mode.clone()
    }

    pub fn fallback_mode(&self) -> Option<ModeHook> {
        self.fallback_mode.clone()
    }
}

struct Script {
    hook: &'static str,
    engine: Arc<Engine>,
    ast: AST,
}

impl Script {
    fn compile(engine: &Arc<Engine>, hook: &'static str, source: &str) -> Result<Self, ConfigError> {
        let ast = engine.compile(source).map_err(|e| ConfigError::Script {
            hook,
            message: e.to_string(),
        })?;
        Ok(Self {
            hook,
            engine: Arc::clone(engine),
            ast,
        })
    }

    fn eval(&self, scope: &mut Scope) -> Result<Dynamic, Box<EvalAltResult>> {
        self.engine.eval_ast_with_scope::<Dynamic>(scope, &self.ast)
    }

    fn into_mode_hook(self) -> ModeHook {
        Arc::new(move |request: &Request| {
            let mut scope = Scope::new();
            scope.push("request", request_to_dynamic(request));
            match self.eval(&mut scope) {
                Ok(result) => dynamic_to_text(result),
                Err(e) => {
                    error!("{} script failed: {}", self.hook, e);
                    e.to_string()
                }
            }
        })
    }

    fn into_match_hook(self) -> MatchHook {
        Arc::new(move |tape: &Tape, request: &Request| {
            let mut scope = Scope::new();
            scope.push("request", request_to_dynamic(request));
            scope.push("tape", json_to_dynamic(&tape.to_json()));
            match self.eval(&mut scope) {
                Ok(result) => result.as_bool().unwrap_or_else(|_| {
                    warn!(
                        "{} script returned {} instead of a bool",
                        self.hook,
                        result.type_name()
                    );
                    false
                }),
                Err(e) => {
                    error!("{} script failed: {}", self.hook, e);
                    false
                }
            }
        })
    }

    fn into_name_hook(self) -> NameHook {
        Arc::new(move |tape: &Value| {
            let mut scope = Scope::new();
            scope.push("tape", json_to_dynamic(tape));
            match self.eval(&mut scope) {
                Ok(result) if result.is_unit() => String::new(),
                Ok(result) => dynamic_to_text(result),
                Err(e) => {
                    error!("{} script failed: {}", self.hook, e);
                    String::new()
                }
            }
        })
    }

    fn into_path_hook(self) -> PathHook {
        Arc::new(move |request: &Request| {
            let mut scope = Scope::new();
            scope.push("request", request_to_dynamic(request));
            match self.eval(&mut scope) {
                Ok(result) if result.is_unit() => None,
                Ok(result) => Some(dynamic_to_text(result)),
                Err(e) => {
                    error!("{} script failed: {}", self.hook, e);
                    None
                }
            }
        })
    }

    /// The script may either return a new tape map or edit `tape` in place.
    fn into_decorator_hook(self) -> DecoratorHook {
        Arc::new(move |tape: Value| {
            let mut scope = Scope::new();
            scope.push("tape", json_to_dynamic(&tape));
            let result = match self.eval(&mut scope) {
                Ok(result) => result,
                Err(e) => {
                    error!("{} script failed: {}", self.hook, e);
                    return tape;
                }
            };

            let decorated = if result.is_map() {
                result
            } else {
                match scope.get_value::<Dynamic>("tape") {
                    Some(edited) => edited,
                    None => return tape,
                }
            };
            match rhai::serde::from_dynamic::<Value>(&decorated) {
                Ok(value) if value.is_object() => value,
                Ok(_) => {
                    warn!("{} script produced a non-map tape; ignoring", self.hook);
                    tape
                }
                Err(e) => {
                    error!("{} script produced an invalid tape: {}", self.hook, e);
                    tape
                }
            }
        })
    }
}

/// Numbers become INT when they fit, FLOAT otherwise.
fn json_to_dynamic(value: &Value) -> Dynamic {
    match value {
        Value::Null => Dynamic::UNIT,
        Value::Bool(b) => Dynamic::from(*b),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(int), _) => Dynamic::from(int),
            (None, Some(float)) => Dynamic::from(float),
            (None, None) => Dynamic::from(n.to_string()),
        },
        Value::String(s) => Dynamic::from(s.clone()),
        Value::Array(items) => Dynamic::from(items.iter().map(json_to_dynamic).collect::<Array>()),
        Value::Object(fields) => Dynamic::from(
            fields
                .iter()
                .map(|(k, v)| (k.as_str().into(), json_to_dynamic(v)))
                .collect::<Map>(),
        ),
    }
}

fn dynamic_to_text(value: Dynamic) -> String {
    if value.is_string() {
        value.into_string().unwrap_or_default()
    } else {
        value.to_string()
    }
}

fn request_to_dynamic(request: &Request) -> Dynamic {
    let mut map = Map::new();
    map.insert("method".into(), Dynamic::from(request.method().to_string()));
    map.insert("path".into(), Dynamic::from(request.path().to_string()));
    map.insert("url".into(), Dynamic::from(request.url()));

    let mut query = Map::new();
    for (key, values) in request.query().iter() {
        let value = match values {
            [single] => Dynamic::from(single.clone()),
            many => Dynamic::from(
                many.iter()
                    .map(|v| Dynamic::from(v.clone()))
                    .collect::<Array>(),
            ),
        };
        query.insert(key.into(), value);
    }
    map.insert("query".into(), Dynamic::from(query));

    let mut headers = Map::new();
    for (name, values) in request.headers().iter() {
        headers.insert(name.into(), Dynamic::from(values.join(",")));
    }
    map.insert("headers".into(), Dynamic::from(headers));

    let body = request
        .body()
        .and_then(|b| std::str::from_utf8(b).ok())
        .map(|text| Dynamic::from(text.to_string()))
        .unwrap_or(Dynamic::UNIT);
    map.insert("body".into(), body);

    Dynamic::from(map)
}
