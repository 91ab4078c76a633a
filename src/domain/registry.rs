//! Function registry and the calling convention for formula functions.
//!
//! A [`FunctionDescriptor`] carries everything the evaluator needs to dispatch a call:
//! parameter kinds, defaults, output shape and the callable. The evaluator never looks at
//! function names beyond the lookup, so host code can add or override functions freely.
//!
//! The process-wide registry is read through an `Arc` snapshot. Register custom functions
//! during start-up, before evaluation runs concurrently; registering while other threads
//! evaluate is not supported (those threads keep using the snapshot they already hold).

use crate::domain::error::RuntimeError;
use crate::domain::functions;
use crate::domain::series::{Series, broadcast};
use crate::domain::value::{Output, Value};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Technical,
    Mathematical,
    Logical,
    Temporal,
    Statistical,
}

impl Family {
    pub const ALL: [Family; 5] = [
        Family::Technical,
        Family::Mathematical,
        Family::Logical,
        Family::Temporal,
        Family::Statistical,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Family::Technical => "technical",
            Family::Mathematical => "mathematical",
            Family::Logical => "logical",
            Family::Temporal => "temporal",
            Family::Statistical => "statistical",
        }
    }

    pub fn parse(name: &str) -> Option<Family> {
        Family::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Any single-valued expression; scalars are broadcast.
    Series,
    /// A constant number.
    Scalar,
    /// A constant integer lookback, at least the parameter minimum (1 unless raised).
    Period,
    /// A constant integer shift, zero or more.
    Offset,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub kind: ParamKind,
    pub default: Option<f64>,
    pub min: Option<f64>,
}

impl Param {
    fn new(name: &str, kind: ParamKind) -> Self {
        Self {
            name: name.to_uppercase(),
            kind,
            default: None,
            min: None,
        }
    }

    pub fn series(name: &str) -> Self {
        Self::new(name, ParamKind::Series)
    }

    pub fn scalar(name: &str) -> Self {
        Self::new(name, ParamKind::Scalar)
    }

    pub fn period(name: &str) -> Self {
        Self::new(name, ParamKind::Period)
    }

    pub fn offset(name: &str) -> Self {
        Self::new(name, ParamKind::Offset)
    }

    pub fn with_default(mut self, value: f64) -> Self {
        self.default = Some(value);
        self
    }

    pub fn at_least(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    fn lower_bound(&self) -> f64 {
        match (self.min, self.kind) {
            (Some(min), _) => min,
            (None, ParamKind::Period) => 1.0,
            (None, _) => 0.0,
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.default {
            Some(d) => write!(f, "{}={d}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Single,
    Lines(Vec<String>),
}

impl Shape {
    /// The shape `output` actually has.
    pub fn of(output: &Output) -> Self {
        match output {
            Output::Single(_) => Shape::Single,
            Output::Multiple(lines) => Shape::Lines(lines.names()),
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Single => f.write_str("a single series"),
            Shape::Lines(names) => write!(f, "lines {}", names.join(", ")),
        }
    }
}

/// A bound argument as the callable sees it.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Series(Series),
    Scalar(f64),
}

/// Arguments of one call, already checked against the descriptor.
#[derive(Debug, Clone)]
pub struct Args {
    function: String,
    len: usize,
    values: Vec<ArgValue>,
}

impl Args {
    pub fn new(function: &str, len: usize, values: Vec<ArgValue>) -> Self {
        Self {
            function: function.to_string(),
            len,
            values,
        }
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    /// Length every returned series must have.
    pub fn series_len(&self) -> usize {
        self.len
    }

    pub fn count(&self) -> usize {
        self.values.len()
    }

    fn get(&self, index: usize) -> Result<&ArgValue, RuntimeError> {
        self.values.get(index).ok_or_else(|| RuntimeError::Arity {
            function: self.function.clone(),
            expected: format!("at least {}", index + 1),
            found: self.values.len(),
        })
    }

    /// The argument as a series, broadcasting a scalar.
    pub fn series(&self, index: usize) -> Result<Cow<'_, [f64]>, RuntimeError> {
        Ok(match self.get(index)? {
            ArgValue::Series(s) => Cow::Borrowed(s.as_slice()),
            ArgValue::Scalar(v) => Cow::Owned(broadcast(*v, self.len)),
        })
    }

    pub fn scalar(&self, index: usize) -> Result<f64, RuntimeError> {
        match self.get(index)? {
            ArgValue::Scalar(v) => Ok(*v),
            ArgValue::Series(_) => Err(RuntimeError::NotConstant {
                function: self.function.clone(),
                position: index + 1,
            }),
        }
    }

    pub fn period(&self, index: usize) -> Result<usize, RuntimeError> {
        let value = self.scalar(index)?;
        if value.fract() != 0.0 || value < 0.0 || !value.is_finite() {
            return Err(self.domain(format!(
                "argument {} must be a non-negative integer, got {value}",
                index + 1
            )));
        }
        Ok(value as usize)
    }

    pub fn domain(&self, reason: String) -> RuntimeError {
        RuntimeError::Domain {
            function: self.function.clone(),
            reason,
        }
    }
}

pub type Callable = Arc<dyn Fn(&Args) -> Result<Output, RuntimeError> + Send + Sync>;

/// Dispatch contract for one formula function.
#[derive(Clone)]
pub struct FunctionDescriptor {
    pub name: String,
    pub family: Family,
    pub description: String,
    pub params: Vec<Param>,
    pub shape: Shape,
    callable: Callable,
}

impl fmt::Debug for FunctionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDescriptor")
            .field("name", &self.name)
            .field("family", &self.family)
            .field("params", &self.params)
            .field("shape", &self.shape)
            .finish_non_exhaustive()
    }
}

impl FunctionDescriptor {
    pub fn new<F>(name: &str, family: Family, params: Vec<Param>, callable: F) -> Self
    where
        F: Fn(&Args) -> Result<Output, RuntimeError> + Send + Sync + 'static,
    {
        Self {
            name: name.to_uppercase(),
            family,
            description: String::new(),
            params,
            shape: Shape::Single,
            callable: Arc::new(callable),
        }
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Declares a multi-output function with the given line names.
    pub fn lines(mut self, names: &[&str]) -> Self {
        self.shape = Shape::Lines(names.iter().map(|n| n.to_uppercase()).collect());
        self
    }

    pub fn min_arity(&self) -> usize {
        self.params.iter().filter(|p| p.default.is_none()).count()
    }

    pub fn max_arity(&self) -> usize {
        self.params.len()
    }

    /// e.g. `MACD(X, SHORT=12, LONG=26, MID=9) -> DIF, DEA, HIST`
    pub fn signature(&self) -> String {
        let params: Vec<String> = self.params.iter().map(Param::to_string).collect();
        let mut sig = format!("{}({})", self.name, params.join(", "));
        if let Shape::Lines(names) = &self.shape {
            sig.push_str(" -> ");
            sig.push_str(&names.join(", "));
        }
        sig
    }

    pub fn check_arity(&self, found: usize) -> Result<(), RuntimeError> {
        let (min, max) = (self.min_arity(), self.max_arity());
        if found >= min && found <= max {
            return Ok(());
        }
        let expected = if min == max {
            min.to_string()
        } else {
            format!("{min} to {max}")
        };
        Err(RuntimeError::Arity {
            function: self.name.clone(),
            expected,
            found,
        })
    }

    /// Checks evaluated arguments against the parameter kinds and fills defaults.
    pub fn bind(&self, values: Vec<Value>, len: usize) -> Result<Args, RuntimeError> {
        self.check_arity(values.len())?;
        let mut supplied = values.into_iter();
        let mut bound = Vec::with_capacity(self.params.len());

        for (index, param) in self.params.iter().enumerate() {
            let position = index + 1;
            let value = match supplied.next() {
                Some(v) => v,
                None => match param.default {
                    Some(d) => Value::Scalar(d),
                    None => break,
                },
            };
            let arg = match (param.kind, value) {
                (_, Value::Multiple { function, .. }) => {
                    return Err(RuntimeError::MultiOutput { function });
                }
                (ParamKind::Series, Value::Series(s)) if s.len() != len => {
                    return Err(RuntimeError::ArgumentKind {
                        function: self.name.clone(),
                        position,
                        reason: format!("series has {} values, expected {len}", s.len()),
                    });
                }
                (ParamKind::Series, Value::Series(s)) => ArgValue::Series(s),
                (ParamKind::Series, Value::Scalar(v)) => ArgValue::Scalar(v),
                (_, Value::Series(_)) => {
                    return Err(RuntimeError::NotConstant {
                        function: self.name.clone(),
                        position,
                    });
                }
                (ParamKind::Scalar, Value::Scalar(v)) => ArgValue::Scalar(v),
                (ParamKind::Period | ParamKind::Offset, Value::Scalar(v)) => {
                    let min = param.lower_bound();
                    if !v.is_finite() || v.fract() != 0.0 || v < min {
                        return Err(RuntimeError::Domain {
                            function: self.name.clone(),
                            reason: format!(
                                "{} must be an integer >= {min}, got {v}",
                                param.name
                            ),
                        });
                    }
                    ArgValue::Scalar(v)
                }
            };
            bound.push(arg);
        }

        Ok(Args::new(&self.name, len, bound))
    }

    pub fn call(&self, args: &Args) -> Result<Output, RuntimeError> {
        (self.callable)(args)
    }
}

/// Case-insensitive name to descriptor map with aliases. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<FunctionDescriptor>>,
    aliases: HashMap<String, String>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-populated with the built-in catalog.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        functions::register_builtins(&mut registry);
        registry
    }

    /// Registers `descriptor` under `name`. Last registration for a name wins.
    pub fn register(&mut self, name: &str, mut descriptor: FunctionDescriptor) {
        let key = name.to_uppercase();
        descriptor.name = key.clone();
        self.aliases.remove(&key);
        self.functions.insert(key, Arc::new(descriptor));
    }

    /// Makes `alias` resolve to the function currently or later registered as `target`.
    pub fn register_alias(&mut self, alias: &str, target: &str) {
        let alias = alias.to_uppercase();
        self.functions.remove(&alias);
        self.aliases.insert(alias, target.to_uppercase());
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<FunctionDescriptor>, RuntimeError> {
        let key = name.to_uppercase();
        let key = self.aliases.get(&key).unwrap_or(&key);
        self.functions
            .get(key)
            .cloned()
            .ok_or_else(|| RuntimeError::UnknownFunction {
                name: name.to_uppercase(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_ok()
    }

    /// Every registered function (aliases excluded), sorted by name.
    pub fn list_all(&self) -> Vec<Arc<FunctionDescriptor>> {
        let mut all: Vec<Arc<FunctionDescriptor>> = self.functions.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    pub fn list_family(&self, family: Family) -> Vec<Arc<FunctionDescriptor>> {
        self.list_all()
            .into_iter()
            .filter(|d| d.family == family)
            .collect()
    }

    /// Aliases pointing at `name`, sorted.
    pub fn aliases_of(&self, name: &str) -> Vec<String> {
        let target = name.to_uppercase();
        let mut found: Vec<String> = self
            .aliases
            .iter()
            .filter(|(_, t)| **t == target)
            .map(|(a, _)| a.clone())
            .collect();
        found.sort();
        found
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

static GLOBAL: LazyLock<RwLock<Arc<FunctionRegistry>>> =
    LazyLock::new(|| RwLock::new(Arc::new(FunctionRegistry::with_builtins())));

/// Snapshot of the process-wide registry.
pub fn registry() -> Arc<FunctionRegistry> {
    GLOBAL
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Adds or replaces a function in the process-wide registry (copy-on-write).
pub fn register_function(name: &str, descriptor: FunctionDescriptor) {
    let mut guard = GLOBAL.write().unwrap_or_else(PoisonError::into_inner);
    Arc::make_mut(&mut *guard).register(name, descriptor);
}
