//! Syntax tree produced by the parser.
//!
//! Nodes are immutable once built and safe to share read-only across threads. `Display`
//! renders normalised, fully parenthesised formula text that parses back to an equal tree.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "^",
            BinaryOp::Gt => ">",
            BinaryOp::Lt => "<",
            BinaryOp::Ge => ">=",
            BinaryOp::Le => "<=",
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Gt | BinaryOp::Lt | BinaryOp::Ge | BinaryOp::Le | BinaryOp::Eq | BinaryOp::Ne
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Identifier(String),
    /// Value of `expr` as of `offset` bars before the current one.
    HistoricalRef {
        expr: Box<Expr>,
        offset: usize,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
    /// Selects one named line of a multi-output value, e.g. `MACD(C).DEA`.
    Member {
        target: Box<Expr>,
        line: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Assign { name: String, expr: Expr },
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub statements: Vec<Statement>,
}

impl Program {
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Names assigned by the program, in statement order.
    pub fn assigned_names(&self) -> Vec<&str> {
        self.statements
            .iter()
            .filter_map(|s| match s {
                Statement::Assign { name, .. } => Some(name.as_str()),
                Statement::Expr(_) => None,
            })
            .collect()
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(n) => write!(f, "{n}"),
            Expr::Identifier(name) => f.write_str(name),
            Expr::HistoricalRef { expr, offset } => write!(f, "{expr}[{offset}]"),
            Expr::Unary { op, operand } => match op {
                UnaryOp::Neg => write!(f, "(-{operand})"),
                UnaryOp::Plus => write!(f, "(+{operand})"),
                // NOT( parses as a call, so the operand always goes inside the parentheses.
                UnaryOp::Not => write!(f, "NOT({operand})"),
            },
            Expr::Binary { op, left, right } => {
                write!(f, "({left} {} {right})", op.symbol())
            }
            Expr::Call { name, args } => {
                write!(f, "{name}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
            Expr::Member { target, line } => match target.as_ref() {
                Expr::Number(_) => write!(f, "({target}).{line}"),
                _ => write!(f, "{target}.{line}"),
            },
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Assign { name, expr } => write!(f, "{name} := {expr}"),
            Statement::Expr(expr) => write!(f, "{expr}"),
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, statement) in self.statements.iter().enumerate() {
            if i > 0 {
                f.write_str(";\n")?;
            }
            write!(f, "{statement}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> Box<Expr> {
        Box::new(Expr::Number(n))
    }

    #[test]
    fn display_parenthesises_operations() {
        let expr = Expr::Binary {
            op: BinaryOp::Mul,
            left: Box::new(Expr::Binary {
                op: BinaryOp::Add,
                left: num(1.0),
                right: num(2.0),
            }),
            right: Box::new(Expr::Unary {
                op: UnaryOp::Neg,
                operand: num(3.5),
            }),
        };
        assert_eq!(expr.to_string(), "((1 + 2) * (-3.5))");
    }

    #[test]
    fn display_call_member_and_reference() {
        let call = Expr::Call {
            name: "MACD".into(),
            args: vec![Expr::Identifier("CLOSE".into())],
        };
        let member = Expr::Member {
            target: Box::new(call),
            line: "DEA".into(),
        };
        let reference = Expr::HistoricalRef {
            expr: Box::new(member),
            offset: 2,
        };
        assert_eq!(reference.to_string(), "MACD(CLOSE).DEA[2]");
    }

    #[test]
    fn display_program_statements() {
        let program = Program {
            statements: vec![
                Statement::Assign {
                    name: "N".into(),
                    expr: Expr::Number(5.0),
                },
                Statement::Expr(Expr::Call {
                    name: "MA".into(),
                    args: vec![Expr::Identifier("C".into()), Expr::Identifier("N".into())],
                }),
            ],
        };
        assert_eq!(program.to_string(), "N := 5;\nMA(C, N)");
        assert_eq!(program.assigned_names(), vec!["N"]);
    }

    #[test]
    fn comparison_classification() {
        assert!(BinaryOp::Ge.is_comparison());
        assert!(!BinaryOp::And.is_comparison());
    }
}
