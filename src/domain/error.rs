//! Error types for the formula front-end, evaluator and application layer.

use std::process::ExitCode;

/// Renders `input` with a caret under the line and column of `position`.
fn caret_context(input: &str, position: usize, err: &dyn std::fmt::Display) -> String {
    let position = position.min(input.len());
    let line_start = input[..position].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let line_end = input[position..]
        .find('\n')
        .map(|i| position + i)
        .unwrap_or(input.len());
    let line_no = input[..line_start].matches('\n').count() + 1;
    let column = input[line_start..position].chars().count();
    let caret = " ".repeat(column) + "^";
    format!(
        "{line}\n{caret}\n{err} (line {line_no}, column {col})",
        line = &input[line_start..line_end],
        col = column + 1,
    )
}

/// A character or literal the lexer cannot classify.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("lex error at position {position}: {message}")]
pub struct LexError {
    pub message: String,
    pub character: char,
    pub position: usize,
}

impl LexError {
    pub fn unexpected(character: char, position: usize) -> Self {
        Self {
            message: format!("unrecognized character '{character}'"),
            character,
            position,
        }
    }

    pub fn display_with_context(&self, input: &str) -> String {
        caret_context(input, self.position, self)
    }
}

/// A grammar violation with the byte position of the offending token.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("syntax error at position {position}: {message}")]
pub struct SyntaxError {
    pub message: String,
    pub position: usize,
}

impl SyntaxError {
    /// Format the error with a caret pointing at the error position in the input.
    pub fn display_with_context(&self, input: &str) -> String {
        caret_context(input, self.position, self)
    }
}

/// Coarse classification of [`RuntimeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    Name,
    Argument,
    Domain,
    Shape,
    Program,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeError {
    #[error("undefined identifier '{name}'")]
    Name { name: String },

    #[error("unknown function '{name}'")]
    UnknownFunction { name: String },

    #[error("{function} expects {expected} argument(s), got {found}")]
    Arity {
        function: String,
        expected: String,
        found: usize,
    },

    #[error("argument {position} of {function} must be a constant number")]
    NotConstant { function: String, position: usize },

    #[error("argument {position} of {function}: {reason}")]
    ArgumentKind {
        function: String,
        position: usize,
        reason: String,
    },

    #[error("{function}: {reason}")]
    Domain { function: String, reason: String },

    #[error("{function} returns several lines; select one with .NAME")]
    MultiOutput { function: String },

    #[error("cannot select line '{line}' from a single-valued expression")]
    NotMultiOutput { line: String },

    #[error("{function} has no line '{line}' (available: {})", .available.join(", "))]
    UnknownLine {
        function: String,
        line: String,
        available: Vec<String>,
    },

    #[error("{function} is declared to return {expected} but returned {found}")]
    ShapeMismatch {
        function: String,
        expected: String,
        found: String,
    },

    #[error("series '{name}' has length {found}, expected {expected}")]
    LengthMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("statement {index} is a bare expression; only the last statement may be one")]
    MisplacedExpression { index: usize },

    #[error("formula produced no result (empty or ends with an assignment)")]
    NoResult,
}

impl RuntimeError {
    pub fn kind(&self) -> RuntimeErrorKind {
        match self {
            RuntimeError::Name { .. } | RuntimeError::UnknownFunction { .. } => {
                RuntimeErrorKind::Name
            }
            RuntimeError::Arity { .. }
            | RuntimeError::NotConstant { .. }
            | RuntimeError::ArgumentKind { .. } => RuntimeErrorKind::Argument,
            RuntimeError::Domain { .. } => RuntimeErrorKind::Domain,
            RuntimeError::MultiOutput { .. }
            | RuntimeError::NotMultiOutput { .. }
            | RuntimeError::UnknownLine { .. }
            | RuntimeError::ShapeMismatch { .. }
            | RuntimeError::LengthMismatch { .. } => RuntimeErrorKind::Shape,
            RuntimeError::MisplacedExpression { .. } | RuntimeError::NoResult => {
                RuntimeErrorKind::Program
            }
        }
    }
}

/// Any failure between formula text and a result.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FormulaError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl FormulaError {
    /// Caret diagnostic for front-end errors, plain message for runtime errors.
    pub fn display_with_context(&self, input: &str) -> String {
        match self {
            FormulaError::Lex(e) => e.display_with_context(input),
            FormulaError::Syntax(e) => e.display_with_context(input),
            FormulaError::Runtime(e) => e.to_string(),
        }
    }
}

/// Top-level error type for the tdxformula application.
#[derive(Debug, thiserror::Error)]
pub enum TdxError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("no data for {code}")]
    NoData { code: String },

    #[error(transparent)]
    Formula(#[from] FormulaError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&TdxError> for ExitCode {
    fn from(err: &TdxError) -> Self {
        let code: u8 = match err {
            TdxError::Io(_) => 1,
            TdxError::ConfigParse { .. }
            | TdxError::ConfigMissing { .. }
            | TdxError::ConfigInvalid { .. } => 2,
            TdxError::Data { .. } | TdxError::NoData { .. } => 3,
            TdxError::Formula(_) => 4,
        };
        ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caret_points_at_column_on_second_line() {
        let input = "A:=1;\nB:=A+$;";
        let err = LexError::unexpected('$', 11);
        let rendered = err.display_with_context(input);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "B:=A+$;");
        assert_eq!(lines[1], "     ^");
        assert!(lines[2].contains("line 2, column 6"));
    }

    #[test]
    fn caret_at_end_of_input() {
        let err = SyntaxError {
            message: "expected expression, found end of input".into(),
            position: 9,
        };
        let rendered = err.display_with_context("MA(CLOSE,");
        assert!(rendered.starts_with("MA(CLOSE,\n         ^\n"));
    }

    #[test]
    fn runtime_error_kinds() {
        assert_eq!(
            RuntimeError::Name { name: "FOO".into() }.kind(),
            RuntimeErrorKind::Name
        );
        assert_eq!(
            RuntimeError::UnknownFunction { name: "FOO".into() }.kind(),
            RuntimeErrorKind::Name
        );
        assert_eq!(
            RuntimeError::NotConstant {
                function: "MA".into(),
                position: 2
            }
            .kind(),
            RuntimeErrorKind::Argument
        );
        assert_eq!(
            RuntimeError::Domain {
                function: "MA".into(),
                reason: "period must be >= 1".into()
            }
            .kind(),
            RuntimeErrorKind::Domain
        );
        assert_eq!(RuntimeError::NoResult.kind(), RuntimeErrorKind::Program);
    }

    #[test]
    fn unknown_line_lists_available() {
        let err = RuntimeError::UnknownLine {
            function: "MACD".into(),
            line: "FOO".into(),
            available: vec!["DIF".into(), "DEA".into(), "HIST".into()],
        };
        assert_eq!(
            err.to_string(),
            "MACD has no line 'FOO' (available: DIF, DEA, HIST)"
        );
    }

    #[test]
    fn exit_codes_by_category() {
        let cases: Vec<(TdxError, ExitCode)> = vec![
            (
                TdxError::Io(std::io::Error::other("boom")),
                ExitCode::from(1),
            ),
            (
                TdxError::ConfigMissing {
                    section: "data".into(),
                    key: "dir".into(),
                },
                ExitCode::from(2),
            ),
            (
                TdxError::NoData {
                    code: "600519".into(),
                },
                ExitCode::from(3),
            ),
            (
                TdxError::Formula(FormulaError::Runtime(RuntimeError::NoResult)),
                ExitCode::from(4),
            ),
        ];
        for (err, expected) in &cases {
            assert_eq!(ExitCode::from(err), *expected, "{err}");
        }
    }

    #[test]
    fn formula_error_wraps_transparently() {
        let err: FormulaError = SyntaxError {
            message: "unexpected ')'".into(),
            position: 3,
        }
        .into();
        assert_eq!(err.to_string(), "syntax error at position 3: unexpected ')'");
    }
}
