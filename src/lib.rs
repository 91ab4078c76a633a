//! tdxformula: interpreter for TDX-style technical-analysis formulas.
//!
//! Hexagonal architecture: the formula language in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`].
//!
//! ```no_run
//! use tdxformula::{Context, evaluate_formula};
//!
//! let context = Context::new(5)
//!     .with_field("CLOSE", vec![10.0, 11.0, 12.0, 13.0, 14.0])
//!     .unwrap();
//! let output = evaluate_formula("MA(CLOSE,5)", &context).unwrap();
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod ports;

pub use domain::ast::Program;
pub use domain::context::Context;
pub use domain::error::{FormulaError, LexError, RuntimeError, RuntimeErrorKind, SyntaxError};
pub use domain::eval::{evaluate, evaluate_with};
pub use domain::interpreter::Interpreter;
pub use domain::lexer::{Token, TokenKind, tokenize};
pub use domain::parser::{parse, validate};
pub use domain::registry::{
    Args, Family, FunctionDescriptor, FunctionRegistry, Param, ParamKind, register_function,
    registry,
};
pub use domain::value::{Lines, Output};

/// Parses and evaluates `text` against the process-wide registry.
pub fn evaluate_formula(text: &str, context: &Context) -> Result<Output, FormulaError> {
    let program = parse(text)?;
    Ok(evaluate(&program, context)?)
}
