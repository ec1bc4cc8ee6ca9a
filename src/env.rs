//! Variable resolution: lookup, defaulting, proxying, and casting.

use std::collections::BTreeMap;
use std::env;

use tracing::debug;

use crate::cast::Cast;
use crate::error::EnvError;
use crate::schema::{Schema, VarSpec};
use crate::value::Value;

/// Marker prefix that makes a value a reference to another variable.
const PROXY_PREFIX: &str = "{{";

/// Maximum number of proxy hops followed before failing. Cycles would
/// otherwise recurse forever.
const MAX_PROXY_DEPTH: usize = 10;

/// Resolves environment variables to typed [`Value`]s.
///
/// Resolution runs lookup, defaulting, proxy indirection, and the
/// preprocess/cast/postprocess pipeline, consulting the [`Schema`] for
/// rules the call site leaves unset. The resolver only reads the process
/// environment; see the crate docs for the concurrency contract.
#[derive(Debug, Clone, Default)]
pub struct Env {
    schema: Schema,
    prefix: String,
}

impl Env {
    /// Resolver with no schema and no prefix.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema(schema: Schema) -> Self {
        Self {
            schema,
            prefix: String::new(),
        }
    }

    /// Prepend `prefix` to every looked-up name. Schema rules and proxy
    /// references keep using logical (unprefixed) names; errors report
    /// the prefixed name that was actually looked up.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    fn var_name(&self, var: &str) -> String {
        format!("{}{}", self.prefix, var)
    }

    /// Resolve `var` under `spec`, merged with any schema rule for it.
    pub fn resolve(&self, var: &str, spec: VarSpec) -> Result<Value, EnvError> {
        self.resolve_at_depth(var, spec, 0)
    }

    fn resolve_at_depth(&self, var: &str, spec: VarSpec, depth: usize) -> Result<Value, EnvError> {
        let spec = match self.schema.rule(var) {
            Some(rule) => spec.merge(rule),
            None => spec,
        };
        let name = self.var_name(var);
        debug!(
            "resolving '{}' cast {:?}/{:?} (default: {}, force: {})",
            name,
            spec.cast,
            spec.subcast,
            spec.default.is_some(),
            spec.force
        );

        // Non-Unicode values have no raw string to cast and count as absent.
        let (value, used_default) = match env::var(&name) {
            Ok(raw) => (Value::Str(raw), false),
            Err(_) => match spec.default.clone() {
                Some(default) => (default, true),
                None => return Err(EnvError::NotSet { var: name }),
            },
        };

        if let Value::Str(raw) = &value {
            if let Some(target) = proxy_target(raw) {
                if depth == MAX_PROXY_DEPTH {
                    return Err(EnvError::ProxyDepth {
                        var: name,
                        max_depth: MAX_PROXY_DEPTH,
                    });
                }
                debug!("'{}' proxies to '{}'", name, target);
                // The reference may have come out of `default`, so the
                // hop forces casting; its result is final.
                let mut forwarded = spec;
                forwarded.force = true;
                return self.resolve_at_depth(&target, forwarded, depth + 1);
            }
        }

        // A default is handed back untouched unless the caller forces
        // the pipeline; provenance decides, never value equality.
        if used_default && !spec.force {
            return Ok(value);
        }

        match value {
            Value::Str(raw) => {
                let raw = match &spec.preprocessor {
                    Some(preprocess) => preprocess(&raw),
                    None => raw,
                };
                let cast = spec.cast.as_ref().unwrap_or(&Cast::Str);
                let typed = cast
                    .apply(&raw, spec.subcast.as_ref())
                    .map_err(|message| EnvError::Cast { var: name, message })?;
                Ok(match &spec.postprocessor {
                    Some(postprocess) => postprocess(typed),
                    None => typed,
                })
            }
            // A forced non-string default has no raw form to cast.
            other => Ok(other),
        }
    }

    /// Resolve with the cast registered under `kind`; unknown names fail
    /// with [`EnvError::UnknownCast`] before any lookup happens.
    pub fn cast_named(&self, kind: &str, var: &str, spec: VarSpec) -> Result<Value, EnvError> {
        let cast = Cast::from_name(kind).ok_or_else(|| EnvError::UnknownCast {
            kind: kind.to_string(),
        })?;
        self.resolve(var, spec.with_cast(cast))
    }

    pub fn string(&self, var: &str) -> Result<String, EnvError> {
        match self.resolve(var, VarSpec::from(Cast::Str))? {
            Value::Str(s) => Ok(s),
            other => Err(self.unexpected(var, "string", &other)),
        }
    }

    pub fn bool(&self, var: &str) -> Result<bool, EnvError> {
        match self.resolve(var, VarSpec::from(Cast::Bool))? {
            Value::Bool(b) => Ok(b),
            other => Err(self.unexpected(var, "bool", &other)),
        }
    }

    pub fn int(&self, var: &str) -> Result<i64, EnvError> {
        match self.resolve(var, VarSpec::from(Cast::Int))? {
            Value::Int(i) => Ok(i),
            other => Err(self.unexpected(var, "int", &other)),
        }
    }

    pub fn float(&self, var: &str) -> Result<f64, EnvError> {
        match self.resolve(var, VarSpec::from(Cast::Float))? {
            Value::Float(x) => Ok(x),
            other => Err(self.unexpected(var, "float", &other)),
        }
    }

    pub fn json(&self, var: &str) -> Result<serde_json::Value, EnvError> {
        match self.resolve(var, VarSpec::from(Cast::Json))? {
            Value::Json(json) => Ok(json),
            other => Err(self.unexpected(var, "json", &other)),
        }
    }

    /// URL shortcut. Always forces the cast, so a schema-supplied string
    /// default still comes back parsed.
    pub fn url(&self, var: &str) -> Result<url::Url, EnvError> {
        match self.resolve(var, VarSpec::from(Cast::Url).with_force())? {
            Value::Url(url) => Ok(url),
            other => Err(self.unexpected(var, "url", &other)),
        }
    }

    pub fn list(&self, var: &str, subcast: Option<Cast>) -> Result<Vec<Value>, EnvError> {
        self.sequence(var, Cast::List, subcast)
    }

    pub fn tuple(&self, var: &str, subcast: Option<Cast>) -> Result<Vec<Value>, EnvError> {
        self.sequence(var, Cast::Tuple, subcast)
    }

    pub fn set(&self, var: &str, subcast: Option<Cast>) -> Result<Vec<Value>, EnvError> {
        let mut spec = VarSpec::from(Cast::Set);
        spec.subcast = subcast;
        match self.resolve(var, spec)? {
            Value::Set(items) => Ok(items),
            other => Err(self.unexpected(var, "set", &other)),
        }
    }

    pub fn dict(
        &self,
        var: &str,
        subcast: Option<Cast>,
    ) -> Result<BTreeMap<String, Value>, EnvError> {
        let mut spec = VarSpec::from(Cast::Dict);
        spec.subcast = subcast;
        match self.resolve(var, spec)? {
            Value::Dict(entries) => Ok(entries),
            other => Err(self.unexpected(var, "dict", &other)),
        }
    }

    fn sequence(
        &self,
        var: &str,
        cast: Cast,
        subcast: Option<Cast>,
    ) -> Result<Vec<Value>, EnvError> {
        let mut spec = VarSpec::from(cast);
        spec.subcast = subcast;
        match self.resolve(var, spec)? {
            Value::List(items) => Ok(items),
            other => Err(self.unexpected(var, "list", &other)),
        }
    }

    /// Shortcut result had the wrong variant, e.g. a schema postprocessor
    /// swapped the type out from under the caller.
    fn unexpected(&self, var: &str, expected: &str, got: &Value) -> EnvError {
        EnvError::Cast {
            var: self.var_name(var),
            message: format!("expected {expected}, got {}", got.kind()),
        }
    }
}

/// Extract the referenced variable name when `raw` is a proxied value.
/// The leading brace run and any trailing brace run are stripped, so both
/// `{{NAME}}` and `{{NAME` reference `NAME`.
fn proxy_target(raw: &str) -> Option<String> {
    if raw.starts_with(PROXY_PREFIX) {
        Some(
            raw.trim_start_matches('{')
                .trim_end_matches('}')
                .to_string(),
        )
    } else {
        None
    }
}
