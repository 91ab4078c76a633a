//! Core domain types and logic: the formula language and its evaluation.

pub mod ast;
pub mod config_validation;
pub mod context;
pub mod error;
pub mod eval;
pub mod functions;
pub mod indicator;
pub mod interpreter;
pub mod lexer;
pub mod ohlcv;
pub mod parser;
pub mod registry;
pub mod series;
pub mod value;
