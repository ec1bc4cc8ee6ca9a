//! Declared casting rules: per-variable specs and the schema they live in.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::cast::Cast;
use crate::value::Value;

/// Transformation applied to the raw string before casting.
pub type Preprocessor = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Transformation applied to the typed value after casting.
pub type Postprocessor = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Casting and defaulting rule for one variable.
///
/// Every field is optional; an empty spec resolves to the raw string.
/// When a [`Schema`] also has a rule for the variable, the two are
/// combined by [`VarSpec::merge`] with the call-site spec winning.
#[derive(Clone, Default)]
pub struct VarSpec {
    /// Target type. `None` falls back to the schema's cast, then to
    /// string identity.
    pub cast: Option<Cast>,
    /// Element (or dict value) cast for structured targets.
    pub subcast: Option<Cast>,
    /// Used when the variable is absent. `None` means the variable is
    /// required; `Some(Value::Null)` is an explicit null default.
    pub default: Option<Value>,
    /// Run the cast pipeline even when the value came from `default`.
    pub force: bool,
    /// Runs on the raw string before casting.
    pub preprocessor: Option<Preprocessor>,
    /// Runs on the typed value after casting.
    pub postprocessor: Option<Postprocessor>,
}

impl VarSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cast(mut self, cast: Cast) -> Self {
        self.cast = Some(cast);
        self
    }

    pub fn with_subcast(mut self, subcast: Cast) -> Self {
        self.subcast = Some(subcast);
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_force(mut self) -> Self {
        self.force = true;
        self
    }

    pub fn with_preprocessor(
        mut self,
        preprocessor: impl Fn(&str) -> String + Send + Sync + 'static,
    ) -> Self {
        self.preprocessor = Some(Arc::new(preprocessor));
        self
    }

    pub fn with_postprocessor(
        mut self,
        postprocessor: impl Fn(Value) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.postprocessor = Some(Arc::new(postprocessor));
        self
    }

    /// Fill unset fields from a schema rule. Fields already set here win;
    /// `force` is the OR of both sides.
    pub fn merge(mut self, schema_rule: &VarSpec) -> Self {
        if self.cast.is_none() {
            self.cast = schema_rule.cast.clone();
        }
        if self.subcast.is_none() {
            self.subcast = schema_rule.subcast.clone();
        }
        if self.default.is_none() {
            self.default = schema_rule.default.clone();
        }
        if self.preprocessor.is_none() {
            self.preprocessor = schema_rule.preprocessor.clone();
        }
        if self.postprocessor.is_none() {
            self.postprocessor = schema_rule.postprocessor.clone();
        }
        self.force = self.force || schema_rule.force;
        self
    }
}

impl From<Cast> for VarSpec {
    fn from(cast: Cast) -> Self {
        VarSpec::new().with_cast(cast)
    }
}

impl fmt::Debug for VarSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VarSpec")
            .field("cast", &self.cast)
            .field("subcast", &self.subcast)
            .field("default", &self.default)
            .field("force", &self.force)
            .field("preprocessor", &self.preprocessor.is_some())
            .field("postprocessor", &self.postprocessor.is_some())
            .finish()
    }
}

/// Casting rules keyed by logical (unprefixed) variable name.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    rules: BTreeMap<String, VarSpec>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule, replacing any previous rule for the same name.
    pub fn declare(mut self, name: impl Into<String>, rule: impl Into<VarSpec>) -> Self {
        self.rules.insert(name.into(), rule.into());
        self
    }

    pub fn rule(&self, name: &str) -> Option<&VarSpec> {
        self.rules.get(name)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl<N, R> FromIterator<(N, R)> for Schema
where
    N: Into<String>,
    R: Into<VarSpec>,
{
    fn from_iter<T: IntoIterator<Item = (N, R)>>(iter: T) -> Self {
        Self {
            rules: iter
                .into_iter()
                .map(|(name, rule)| (name.into(), rule.into()))
                .collect(),
        }
    }
}
