//! Formula parser.
//!
//! Recursive descent over the token stream, one function per precedence level
//! (loosest first): OR, AND, comparison, additive, multiplicative, unary, power, postfix.
//! All binary operators associate to the left, `^` included: `2^3^2` is `(2^3)^2 = 64`.
//! Classic TDX tooling treats `^` as right-associative (512); formulas relying on that need
//! explicit parentheses here. Power binds tighter than a leading unary minus, so `-2^2` is
//! `-(2^2)`, while the right operand of `^` may carry its own sign.
//!
//! Trees deeper than [`MAX_DEPTH`] and parentheses nested deeper than it are syntax errors,
//! which keeps the parser and every later tree walk within a bounded stack.
//!
//! Only the final statement of a program may be a bare expression.

use crate::domain::ast::{BinaryOp, Expr, Program, Statement, UnaryOp};
use crate::domain::error::{FormulaError, SyntaxError};
use crate::domain::lexer::{Token, TokenKind, tokenize};

/// Deepest expression tree, and deepest parenthesis or call nesting, the parser accepts.
pub const MAX_DEPTH: usize = 128;

/// An expression and the depth of its tree.
struct Node {
    expr: Expr,
    depth: usize,
}

impl Node {
    fn leaf(expr: Expr) -> Self {
        Self { expr, depth: 1 }
    }
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    nesting: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            nesting: 0,
        }
    }

    fn peek(&self) -> &TokenKind {
        self.tokens
            .get(self.pos)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    fn peek_at(&self, offset: usize) -> &TokenKind {
        self.tokens
            .get(self.pos + offset)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    fn position(&self) -> usize {
        match self.tokens.get(self.pos) {
            Some(t) => t.position,
            None => self.tokens.last().map(|t| t.position).unwrap_or(0),
        }
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        kind
    }

    fn consume(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error(&self, message: String) -> SyntaxError {
        SyntaxError {
            message,
            position: self.position(),
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), SyntaxError> {
        if self.consume(&kind) {
            Ok(())
        } else {
            Err(self.error(format!("expected {}, found {}", kind, self.peek())))
        }
    }

    fn parse_program(&mut self) -> Result<Program, SyntaxError> {
        let mut statements = Vec::new();
        let mut pending_bare: Option<usize> = None;

        loop {
            while self.consume(&TokenKind::Semicolon) {}
            if *self.peek() == TokenKind::Eof {
                break;
            }
            if let Some(position) = pending_bare {
                return Err(SyntaxError {
                    message: "only the last statement may be a bare expression; \
                              assign it with ':=' or remove it"
                        .into(),
                    position,
                });
            }

            let start = self.position();
            let statement = self.parse_statement()?;
            if matches!(statement, Statement::Expr(_)) {
                pending_bare = Some(start);
            }
            statements.push(statement);

            match self.peek() {
                TokenKind::Semicolon => {}
                TokenKind::Eof => break,
                other => {
                    return Err(self.error(format!("expected ';' or end of input, found {other}")));
                }
            }
        }

        Ok(Program { statements })
    }

    fn parse_statement(&mut self) -> Result<Statement, SyntaxError> {
        if let TokenKind::Ident(name) = self.peek() {
            if matches!(self.peek_at(1), TokenKind::Assign | TokenKind::Colon) {
                let name = name.clone();
                self.advance();
                self.advance();
                let expr = self.parse_expression()?.expr;
                return Ok(Statement::Assign { name, expr });
            }
        }
        Ok(Statement::Expr(self.parse_expression()?.expr))
    }

    /// Every recursive descent passes through here, so this is where nesting is bounded.
    fn parse_expression(&mut self) -> Result<Node, SyntaxError> {
        if self.nesting >= MAX_DEPTH {
            return Err(self.too_deep());
        }
        self.nesting += 1;
        let result = self.parse_or();
        self.nesting -= 1;
        result
    }

    fn too_deep(&self) -> SyntaxError {
        self.error(format!("expression nested deeper than {MAX_DEPTH} levels"))
    }

    /// Wraps `expr` one level above its deepest child.
    fn node(&self, expr: Expr, child_depth: usize) -> Result<Node, SyntaxError> {
        let depth = child_depth + 1;
        if depth > MAX_DEPTH {
            return Err(self.too_deep());
        }
        Ok(Node { expr, depth })
    }

    fn binary(&self, op: BinaryOp, left: Node, right: Node) -> Result<Node, SyntaxError> {
        let child_depth = left.depth.max(right.depth);
        self.node(
            Expr::Binary {
                op,
                left: Box::new(left.expr),
                right: Box::new(right.expr),
            },
            child_depth,
        )
    }

    fn unary(&self, op: UnaryOp, operand: Node) -> Result<Node, SyntaxError> {
        let child_depth = operand.depth;
        self.node(
            Expr::Unary {
                op,
                operand: Box::new(operand.expr),
            },
            child_depth,
        )
    }

    fn parse_or(&mut self) -> Result<Node, SyntaxError> {
        let mut left = self.parse_and()?;
        while self.consume(&TokenKind::Or) {
            let right = self.parse_and()?;
            left = self.binary(BinaryOp::Or, left, right)?;
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Node, SyntaxError> {
        let mut left = self.parse_comparison()?;
        while self.consume(&TokenKind::And) {
            let right = self.parse_comparison()?;
            left = self.binary(BinaryOp::And, left, right)?;
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Node, SyntaxError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::Ge => BinaryOp::Ge,
                TokenKind::Le => BinaryOp::Le,
                TokenKind::Eq => BinaryOp::Eq,
                TokenKind::Ne => BinaryOp::Ne,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_additive()?;
            left = self.binary(op, left, right)?;
        }
    }

    fn parse_additive(&mut self) -> Result<Node, SyntaxError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = self.binary(op, left, right)?;
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Node, SyntaxError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_unary()?;
            left = self.binary(op, left, right)?;
        }
    }

    fn unary_op(&self) -> Option<UnaryOp> {
        match self.peek() {
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Plus => Some(UnaryOp::Plus),
            // NOT( is handled by parse_primary so that postfix operators bind to it.
            TokenKind::Not if *self.peek_at(1) != TokenKind::LParen => Some(UnaryOp::Not),
            _ => None,
        }
    }

    /// Prefix operators are collected first and applied innermost-last.
    fn parse_unary(&mut self) -> Result<Node, SyntaxError> {
        let mut ops = Vec::new();
        while let Some(op) = self.unary_op() {
            self.advance();
            ops.push(op);
        }
        let mut operand = self.parse_power()?;
        for op in ops.into_iter().rev() {
            operand = self.unary(op, operand)?;
        }
        Ok(operand)
    }

    fn parse_power(&mut self) -> Result<Node, SyntaxError> {
        let mut left = self.parse_postfix()?;
        while self.consume(&TokenKind::Caret) {
            let right = self.parse_power_operand()?;
            left = self.binary(BinaryOp::Pow, left, right)?;
        }
        Ok(left)
    }

    fn parse_power_operand(&mut self) -> Result<Node, SyntaxError> {
        let mut signs = Vec::new();
        loop {
            let op = match self.peek() {
                TokenKind::Minus => UnaryOp::Neg,
                TokenKind::Plus => UnaryOp::Plus,
                _ => break,
            };
            self.advance();
            signs.push(op);
        }
        let mut operand = self.parse_postfix()?;
        for op in signs.into_iter().rev() {
            operand = self.unary(op, operand)?;
        }
        Ok(operand)
    }

    fn parse_postfix(&mut self) -> Result<Node, SyntaxError> {
        let mut node = self.parse_primary()?;
        loop {
            if self.consume(&TokenKind::LBracket) {
                let offset = self.parse_offset()?;
                self.expect(TokenKind::RBracket)?;
                node = self.node(
                    Expr::HistoricalRef {
                        expr: Box::new(node.expr),
                        offset,
                    },
                    node.depth,
                )?;
            } else if self.consume(&TokenKind::Dot) {
                match self.advance() {
                    TokenKind::Ident(line) => {
                        node = self.node(
                            Expr::Member {
                                target: Box::new(node.expr),
                                line,
                            },
                            node.depth,
                        )?;
                    }
                    other => {
                        self.pos -= 1;
                        return Err(self.error(format!("expected line name after '.', found {other}")));
                    }
                }
            } else {
                return Ok(node);
            }
        }
    }

    fn parse_offset(&mut self) -> Result<usize, SyntaxError> {
        match self.peek().clone() {
            TokenKind::Number(n) if n >= 0.0 && n.fract() == 0.0 && n <= u32::MAX as f64 => {
                self.advance();
                Ok(n as usize)
            }
            other => Err(self.error(format!(
                "historical offset must be a non-negative integer literal, found {other}"
            ))),
        }
    }

    fn parse_primary(&mut self) -> Result<Node, SyntaxError> {
        let position = self.position();
        match self.advance() {
            TokenKind::Number(n) => Ok(Node::leaf(Expr::Number(n))),
            TokenKind::Ident(name) => {
                if *self.peek() == TokenKind::LParen {
                    self.parse_call(name)
                } else {
                    Ok(Node::leaf(Expr::Identifier(name)))
                }
            }
            TokenKind::And if *self.peek() == TokenKind::LParen => self.parse_call("AND".into()),
            TokenKind::Or if *self.peek() == TokenKind::LParen => self.parse_call("OR".into()),
            TokenKind::Not if *self.peek() == TokenKind::LParen => {
                // NOT(x) is the unary operator; other arities go to the NOT function.
                let Node { expr, depth } = self.parse_call("NOT".into())?;
                let expr = match expr {
                    Expr::Call { mut args, .. } if args.len() == 1 => Expr::Unary {
                        op: UnaryOp::Not,
                        operand: Box::new(args.remove(0)),
                    },
                    call => call,
                };
                Ok(Node { expr, depth })
            }
            TokenKind::LParen => {
                let node = self.parse_expression()?;
                self.expect(TokenKind::RParen)?;
                Ok(node)
            }
            other => Err(SyntaxError {
                message: format!("expected expression, found {other}"),
                position,
            }),
        }
    }

    fn parse_call(&mut self, name: String) -> Result<Node, SyntaxError> {
        self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();
        let mut deepest = 0;
        if !self.consume(&TokenKind::RParen) {
            loop {
                let arg = self.parse_expression()?;
                deepest = deepest.max(arg.depth);
                args.push(arg.expr);
                if self.consume(&TokenKind::Comma) {
                    continue;
                }
                if self.consume(&TokenKind::RParen) {
                    break;
                }
                return Err(self.error(format!(
                    "expected ',' or ')' in call to {name}, found {}",
                    self.peek()
                )));
            }
        }
        self.node(Expr::Call { name, args }, deepest)
    }
}

/// Parses an already tokenized formula.
pub fn parse_tokens(tokens: &[Token]) -> Result<Program, SyntaxError> {
    Parser::new(tokens).parse_program()
}

/// Tokenizes and parses formula text.
pub fn parse(input: &str) -> Result<Program, FormulaError> {
    let tokens = tokenize(input)?;
    Ok(parse_tokens(&tokens)?)
}

/// True iff `input` lexes and parses. Performs no evaluation.
pub fn validate(input: &str) -> bool {
    parse(input).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(input: &str) -> Expr {
        let program = parse(input).unwrap();
        match program.statements.last() {
            Some(Statement::Expr(e)) => e.clone(),
            other => panic!("expected trailing expression, got {:?}", other),
        }
    }

    fn syntax_err(input: &str) -> SyntaxError {
        match parse(input) {
            Err(FormulaError::Syntax(e)) => e,
            other => panic!("expected syntax error for {input:?}, got {other:?}"),
        }
    }

    fn ident(name: &str) -> Box<Expr> {
        Box::new(Expr::Identifier(name.into()))
    }

    fn num(n: f64) -> Box<Expr> {
        Box::new(Expr::Number(n))
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        assert_eq!(
            expr("1 + 2 * 3"),
            Expr::Binary {
                op: BinaryOp::Add,
                left: num(1.0),
                right: Box::new(Expr::Binary {
                    op: BinaryOp::Mul,
                    left: num(2.0),
                    right: num(3.0),
                }),
            }
        );
    }

    #[test]
    fn subtraction_is_left_associative() {
        assert_eq!(expr("10 - 4 - 3").to_string(), "((10 - 4) - 3)");
    }

    #[test]
    fn power_is_left_associative() {
        assert_eq!(expr("2 ^ 3 ^ 2").to_string(), "((2 ^ 3) ^ 2)");
    }

    #[test]
    fn unary_minus_is_looser_than_power() {
        assert_eq!(
            expr("-2^2"),
            Expr::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(Expr::Binary {
                    op: BinaryOp::Pow,
                    left: num(2.0),
                    right: num(2.0),
                }),
            }
        );
    }

    #[test]
    fn power_operand_may_be_negated() {
        assert_eq!(expr("2^-1").to_string(), "(2 ^ (-1))");
    }

    #[test]
    fn logical_precedence() {
        assert_eq!(
            expr("A > 1 AND B < 2 OR C").to_string(),
            "(((A > 1) AND (B < 2)) OR C)"
        );
    }

    #[test]
    fn not_is_unary_prefix() {
        assert_eq!(expr("NOT A AND B").to_string(), "(NOT(A) AND B)");
    }

    #[test]
    fn keyword_calls_in_prefix_position() {
        assert_eq!(
            expr("NOT(C > O)"),
            Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(Expr::Binary {
                    op: BinaryOp::Gt,
                    left: ident("C"),
                    right: ident("O"),
                }),
            }
        );
        assert_eq!(expr("NOT(A, B)").to_string(), "NOT(A, B)");
        assert_eq!(expr("AND(A, B)").to_string(), "AND(A, B)");
        assert_eq!(expr("OR(A, B)").to_string(), "OR(A, B)");
    }

    #[test]
    fn equality_spellings() {
        assert_eq!(expr("A = B"), expr("A == B"));
        assert_eq!(expr("A <> B"), expr("A != B"));
    }

    #[test]
    fn historical_reference() {
        assert_eq!(
            expr("CLOSE[1]"),
            Expr::HistoricalRef {
                expr: ident("CLOSE"),
                offset: 1,
            }
        );
        assert_eq!(expr("MA(C,5)[2]").to_string(), "MA(C, 5)[2]");
    }

    #[test]
    fn historical_offset_must_be_non_negative_integer_literal() {
        assert!(syntax_err("C[-1]").message.contains("non-negative integer"));
        assert!(syntax_err("C[1.5]").message.contains("non-negative integer"));
        let err = syntax_err("C[N]");
        assert_eq!(err.position, 2);
    }

    #[test]
    fn member_access_on_call() {
        assert_eq!(
            expr("MACD(C).dea * 2").to_string(),
            "(MACD(C).DEA * 2)"
        );
    }

    #[test]
    fn assignments_with_both_markers() {
        let program = parse("A := C; B : A + 1; B").unwrap();
        assert_eq!(program.assigned_names(), vec!["A", "B"]);
        assert_eq!(program.statements.len(), 3);
    }

    #[test]
    fn trailing_semicolon_optional() {
        assert_eq!(parse("C;").unwrap(), parse("C").unwrap());
        assert_eq!(parse("A:=1;;").unwrap().statements.len(), 1);
    }

    #[test]
    fn empty_program() {
        assert!(parse("").unwrap().is_empty());
        assert!(parse(" ; // nothing\n").unwrap().is_empty());
    }

    #[test]
    fn bare_expression_before_last_statement_is_rejected() {
        let err = syntax_err("C + 1; A := 2; A");
        assert_eq!(err.position, 0);
        assert!(err.message.contains("only the last statement"));
    }

    #[test]
    fn missing_separator() {
        let err = syntax_err("A := 1 B");
        assert!(err.message.contains("expected ';'"));
        assert_eq!(err.position, 7);
    }

    #[test]
    fn unfinished_call() {
        let err = syntax_err("MA(CLOSE,");
        assert_eq!(err.position, 9);
        assert!(err.message.contains("end of input"));
        assert!(!validate("MA(CLOSE,"));
    }

    #[test]
    fn unmatched_parenthesis() {
        assert!(syntax_err("(C + O").message.contains("expected ')'"));
        assert!(syntax_err("C + O)").message.contains("found ')'"));
    }

    #[test]
    fn lex_errors_surface_through_parse() {
        assert!(matches!(parse("C @ O"), Err(FormulaError::Lex(_))));
        assert!(!validate("C @ O"));
    }

    #[test]
    fn unknown_identifier_still_parses() {
        assert!(validate("FOO + 1"));
    }

    fn parenthesised(levels: usize) -> String {
        format!("{}C{}", "(".repeat(levels), ")".repeat(levels))
    }

    fn sum_chain(terms: usize) -> String {
        format!("C{}", "+C".repeat(terms - 1))
    }

    #[test]
    fn parenthesis_nesting_is_bounded() {
        assert_eq!(expr(&parenthesised(MAX_DEPTH - 1)), Expr::Identifier("C".into()));

        let err = syntax_err(&parenthesised(MAX_DEPTH));
        assert!(err.message.contains("nested deeper than"), "{}", err.message);

        assert!(!validate(&parenthesised(20_000)));
    }

    #[test]
    fn prefix_operator_runs_are_bounded() {
        assert!(validate(&format!("{}C", "-".repeat(MAX_DEPTH - 1))));
        assert!(validate(&format!("{}C", "NOT ".repeat(MAX_DEPTH - 1))));

        let err = syntax_err(&format!("{}C", "-".repeat(MAX_DEPTH)));
        assert!(err.message.contains("nested deeper than"), "{}", err.message);

        assert!(!validate(&format!("{}C", "-".repeat(20_000))));
        assert!(!validate(&format!("2^{}C", "-".repeat(20_000))));
    }

    #[test]
    fn operator_chains_are_bounded() {
        assert!(validate(&sum_chain(MAX_DEPTH)));
        assert!(!validate(&sum_chain(MAX_DEPTH + 1)));
        assert!(!validate(&sum_chain(20_000)));
        assert!(!validate(&format!("C{}", "[1]".repeat(MAX_DEPTH))));
        assert!(!validate(&format!("{}C{}", "MAX(".repeat(MAX_DEPTH), ",1)".repeat(MAX_DEPTH))));
    }

    #[test]
    fn deepest_accepted_tree_round_trips() {
        let program = parse(&sum_chain(MAX_DEPTH)).unwrap();
        assert_eq!(parse(&program.to_string()).unwrap(), program);
    }

    #[test]
    fn display_round_trips() {
        let source = "DIF:=EMA(C,12)-EMA(C,26);\nDEA:=EMA(DIF,9);\n-(DIF-DEA)*2^2 >= REF(C,1) OR NOT (C[1] <> 0)";
        let program = parse(source).unwrap();
        assert_eq!(parse(&program.to_string()).unwrap(), program);
    }
}
