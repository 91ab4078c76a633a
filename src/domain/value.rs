//! Values flowing through evaluation and the final evaluation output.

use crate::domain::series::{Series, broadcast};

/// Ordered named series produced by a multi-output function.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Lines {
    entries: Vec<(String, Series)>,
}

impl Lines {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a line; names are stored upper case.
    pub fn with(mut self, name: &str, values: Series) -> Self {
        self.entries.push((name.to_uppercase(), values));
        self
    }

    /// Case-insensitive lookup.
    pub fn get(&self, name: &str) -> Option<&Series> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Series)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn map_series(&self, f: impl Fn(&Series) -> Series) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .map(|(n, v)| (n.clone(), f(v)))
                .collect(),
        }
    }
}

/// What a function callable returns and what a formula evaluates to.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    Single(Series),
    Multiple(Lines),
}

impl Output {
    pub fn as_single(&self) -> Option<&Series> {
        match self {
            Output::Single(s) => Some(s),
            Output::Multiple(_) => None,
        }
    }

    pub fn line(&self, name: &str) -> Option<&Series> {
        match self {
            Output::Single(_) => None,
            Output::Multiple(lines) => lines.get(name),
        }
    }

    /// Column names and series in output order; a single series is named `VALUE`.
    pub fn columns(&self) -> Vec<(String, &Series)> {
        match self {
            Output::Single(s) => vec![("VALUE".to_string(), s)],
            Output::Multiple(lines) => lines.iter().map(|(n, v)| (n.to_string(), v)).collect(),
        }
    }
}

/// Intermediate evaluation result. Scalars stay scalar until a series is required.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(f64),
    Series(Series),
    Multiple { function: String, lines: Lines },
}

impl Value {
    pub fn into_output(self, len: usize) -> Output {
        match self {
            Value::Scalar(v) => Output::Single(broadcast(v, len)),
            Value::Series(s) => Output::Single(s),
            Value::Multiple { lines, .. } => Output::Multiple(lines),
        }
    }
}
