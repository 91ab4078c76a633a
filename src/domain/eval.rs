//! Tree-walking evaluator.
//!
//! A program is evaluated statement by statement against one [`Context`]. Assignments bind
//! into a per-call scope, and the trailing expression is the result. Scalars are kept as
//! scalars until an operation needs a series, which is what lets `N:=5; MA(C,N)` pass `N`
//! as a constant period. Function calls are dispatched only through the registry
//! descriptors.

use crate::domain::ast::{BinaryOp, Expr, Program, Statement, UnaryOp};
use crate::domain::context::Context;
use crate::domain::error::RuntimeError;
use crate::domain::registry::{self, FunctionRegistry, Shape};
use crate::domain::series::{
    EPSILON, Series, bool_value, broadcast, finite_or_nan, map, safe_div, shift, truthy, zip_map,
};
use crate::domain::value::{Output, Value};
use std::collections::HashMap;

/// Evaluates against the process-wide registry.
pub fn evaluate(program: &Program, context: &Context) -> Result<Output, RuntimeError> {
    let registry = registry::registry();
    evaluate_with(program, context, &registry)
}

pub fn evaluate_with(
    program: &Program,
    context: &Context,
    registry: &FunctionRegistry,
) -> Result<Output, RuntimeError> {
    Evaluator::new(context, registry).run(program)
}

struct Evaluator<'a> {
    context: &'a Context,
    registry: &'a FunctionRegistry,
    scope: HashMap<String, Value>,
}

impl<'a> Evaluator<'a> {
    fn new(context: &'a Context, registry: &'a FunctionRegistry) -> Self {
        Self {
            context,
            registry,
            scope: HashMap::new(),
        }
    }

    fn run(mut self, program: &Program) -> Result<Output, RuntimeError> {
        let last = program.statements.len().checked_sub(1);
        let mut result = None;

        for (index, statement) in program.statements.iter().enumerate() {
            match statement {
                Statement::Assign { name, expr } => {
                    let value = self.eval(expr)?;
                    self.scope.insert(name.to_uppercase(), value);
                }
                Statement::Expr(expr) if Some(index) == last => {
                    result = Some(self.eval(expr)?);
                }
                Statement::Expr(_) => {
                    return Err(RuntimeError::MisplacedExpression { index: index + 1 });
                }
            }
        }

        result
            .map(|value| value.into_output(self.context.len()))
            .ok_or(RuntimeError::NoResult)
    }

    fn eval(&self, expr: &Expr) -> Result<Value, RuntimeError> {
        match expr {
            Expr::Number(n) => Ok(Value::Scalar(*n)),
            Expr::Identifier(name) => self.resolve(name),
            Expr::HistoricalRef { expr, offset } => self.eval_reference(expr, *offset),
            Expr::Unary { op, operand } => {
                let value = self.eval(operand)?;
                self.eval_unary(*op, value)
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                self.eval_binary(*op, left, right)
            }
            Expr::Call { name, args } => self.eval_call(name, args),
            Expr::Member { target, line } => match self.eval(target)? {
                Value::Multiple { function, lines } => match lines.get(line) {
                    Some(series) => Ok(Value::Series(series.clone())),
                    None => Err(RuntimeError::UnknownLine {
                        function,
                        line: line.to_uppercase(),
                        available: lines.names(),
                    }),
                },
                _ => Err(RuntimeError::NotMultiOutput {
                    line: line.to_uppercase(),
                }),
            },
        }
    }

    fn resolve(&self, name: &str) -> Result<Value, RuntimeError> {
        let key = name.to_uppercase();
        if let Some(value) = self.scope.get(&key) {
            return Ok(value.clone());
        }
        self.context
            .get(&key)
            .map(|series| Value::Series(series.clone()))
            .ok_or(RuntimeError::Name { name: key })
    }

    fn eval_reference(&self, expr: &Expr, offset: usize) -> Result<Value, RuntimeError> {
        let len = self.context.len();
        Ok(match self.eval(expr)? {
            Value::Scalar(v) => Value::Series(shift(&broadcast(v, len), offset)),
            Value::Series(s) => Value::Series(shift(&s, offset)),
            Value::Multiple { function, lines } => Value::Multiple {
                function,
                lines: lines.map_series(|s| shift(s, offset)),
            },
        })
    }

    fn eval_unary(&self, op: UnaryOp, value: Value) -> Result<Value, RuntimeError> {
        let f = |x: f64| match op {
            UnaryOp::Neg => -x,
            UnaryOp::Plus => x,
            UnaryOp::Not => bool_value(!truthy(x)),
        };
        match value {
            Value::Scalar(v) => Ok(Value::Scalar(f(v))),
            Value::Series(s) => Ok(Value::Series(map(&s, f))),
            Value::Multiple { function, .. } => Err(RuntimeError::MultiOutput { function }),
        }
    }

    fn eval_binary(&self, op: BinaryOp, left: Value, right: Value) -> Result<Value, RuntimeError> {
        let len = self.context.len();
        let f = |a: f64, b: f64| apply_binary(op, a, b);
        match (left, right) {
            (Value::Multiple { function, .. }, _) | (_, Value::Multiple { function, .. }) => {
                Err(RuntimeError::MultiOutput { function })
            }
            (Value::Scalar(a), Value::Scalar(b)) => Ok(Value::Scalar(f(a, b))),
            (Value::Series(a), Value::Scalar(b)) => Ok(Value::Series(zip_map(&a, &broadcast(b, len), f))),
            (Value::Scalar(a), Value::Series(b)) => Ok(Value::Series(zip_map(&broadcast(a, len), &b, f))),
            (Value::Series(a), Value::Series(b)) => Ok(Value::Series(zip_map(&a, &b, f))),
        }
    }

    fn eval_call(&self, name: &str, args: &[Expr]) -> Result<Value, RuntimeError> {
        let descriptor = self.registry.lookup(name)?;
        descriptor.check_arity(args.len())?;

        let values = args
            .iter()
            .map(|arg| self.eval(arg))
            .collect::<Result<Vec<_>, _>>()?;
        let len = self.context.len();
        let bound = descriptor.bind(values, len)?;

        let output = descriptor.call(&bound)?;
        let found = Shape::of(&output);
        if found != descriptor.shape {
            return Err(RuntimeError::ShapeMismatch {
                function: descriptor.name.clone(),
                expected: descriptor.shape.to_string(),
                found: found.to_string(),
            });
        }

        match output {
            Output::Single(series) => {
                check_len(&descriptor.name, &series, len)?;
                Ok(Value::Series(series))
            }
            Output::Multiple(lines) => {
                for (line, series) in lines.iter() {
                    check_len(&format!("{}.{line}", descriptor.name), series, len)?;
                }
                Ok(Value::Multiple {
                    function: descriptor.name.clone(),
                    lines,
                })
            }
        }
    }
}

fn check_len(name: &str, series: &Series, expected: usize) -> Result<(), RuntimeError> {
    if series.len() == expected {
        return Ok(());
    }
    Err(RuntimeError::LengthMismatch {
        name: name.to_string(),
        expected,
        found: series.len(),
    })
}

/// Elementwise semantics of every binary operator.
pub fn apply_binary(op: BinaryOp, a: f64, b: f64) -> f64 {
    if op.is_comparison() && (a.is_nan() || b.is_nan()) {
        return 0.0;
    }
    let equal = (a - b).abs() < EPSILON;
    match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => safe_div(a, b),
        BinaryOp::Mod => {
            if b == 0.0 {
                f64::NAN
            } else {
                finite_or_nan(a - b * (a / b).floor())
            }
        }
        BinaryOp::Pow => finite_or_nan(a.powf(b)),
        BinaryOp::Gt => bool_value(a > b && !equal),
        BinaryOp::Lt => bool_value(a < b && !equal),
        BinaryOp::Ge => bool_value(a > b || equal),
        BinaryOp::Le => bool_value(a < b || equal),
        BinaryOp::Eq => bool_value(equal),
        BinaryOp::Ne => bool_value(!equal),
        BinaryOp::And => bool_value(truthy(a) && truthy(b)),
        BinaryOp::Or => bool_value(truthy(a) || truthy(b)),
    }
}
