//! Recursive-descent parser for objectives and constraints.
//!
//! Precedence, highest to lowest:
//!
//! | level | syntax |
//! |---|---|
//! | postfix | `f(args)`, `x[slices]` |
//! | power | `x ** NUMBER` (exponent may carry a leading `-`) |
//! | unary | prefix `-`, right-associative |
//! | matmul | `@`, left-associative |
//! | term | `*` `/`, left-associative |
//! | expr | `+` `-`, left-associative |
//! | constraint | exactly one of `==` `<=` `>=` |
//!
//! `x ** p` is represented as a `power(x, p)` call.

use tracing::{debug, warn};

use super::lexer::{Delimiter, Lexeme, Lexer, Operator, Token};
use crate::atoms::{ArgRole, Atom, AtomSpec};
use crate::constraints::{Constraint, Relation};
use crate::error::{CvxError, Result, Span};
use crate::expr::{BinaryOp, Bound, Expr, ExprKind, Slice, Symbol};
use crate::problem::Sense;
use crate::settings::Settings;

/// Single-lookahead parser over one fragment.
pub struct Parser<'src> {
    lexer: Lexer<'src>,
    peeked: Option<Lexeme>,
    allow_aliases: bool,
}

impl<'src> Parser<'src> {
    pub fn new(source: &'src str, settings: &Settings) -> Self {
        Parser {
            lexer: Lexer::new(source),
            peeked: None,
            allow_aliases: settings.allow_aliases,
        }
    }

    fn peek(&mut self) -> Result<&Lexeme> {
        if self.peeked.is_none() {
            let next = match self.lexer.next() {
                Some(lexeme) => lexeme?,
                None => {
                    let end = self.lexer.source().len();
                    Lexeme {
                        token: Token::End,
                        span: Span::new(end, end),
                    }
                }
            };
            self.peeked = Some(next);
        }
        self.peeked
            .as_ref()
            .ok_or_else(|| CvxError::parse(Span::default(), "token stream exhausted"))
    }

    fn advance(&mut self) -> Result<Lexeme> {
        self.peek()?;
        self.peeked
            .take()
            .ok_or_else(|| CvxError::parse(Span::default(), "token stream exhausted"))
    }

    fn peek_op(&mut self) -> Result<Option<Operator>> {
        Ok(match self.peek()?.token {
            Token::Op(op) => Some(op),
            _ => None,
        })
    }

    fn at_delim(&mut self, delim: Delimiter) -> Result<bool> {
        Ok(self.peek()?.token == Token::Delim(delim))
    }

    fn expect_delim(&mut self, delim: Delimiter) -> Result<Span> {
        let lexeme = self.advance()?;
        if lexeme.token == Token::Delim(delim) {
            Ok(lexeme.span)
        } else {
            Err(unexpected(&lexeme, &format!("`{}`", delim.as_str())))
        }
    }

    fn expect_end(&mut self) -> Result<()> {
        let lexeme = self.advance()?;
        match lexeme.token {
            Token::End => Ok(()),
            Token::Op(op) if op.is_relational() => Err(CvxError::parse(
                lexeme.span,
                format!(
                    "unexpected `{}`: only one relational operator is allowed",
                    op.as_str()
                ),
            )),
            _ => Err(unexpected(&lexeme, "end of input")),
        }
    }

    /// Parse a whole fragment as a single expression.
    pub fn parse_expression(&mut self) -> Result<Expr> {
        let expr = self.expr()?;
        self.expect_end()?;
        Ok(expr)
    }

    /// Parse a whole fragment as `expr relop expr`.
    pub fn parse_constraint(&mut self) -> Result<Constraint> {
        let lhs = self.expr()?;
        let lexeme = self.advance()?;
        let relation = match lexeme.token {
            Token::Op(Operator::EqEq) => Relation::Eq,
            Token::Op(Operator::Le) => Relation::Le,
            Token::Op(Operator::Ge) => Relation::Ge,
            Token::Op(op @ (Operator::Lt | Operator::Gt)) => {
                return Err(CvxError::parse(
                    lexeme.span,
                    format!(
                        "strict inequality `{}` is not supported, use `{}=`",
                        op.as_str(),
                        op.as_str()
                    ),
                ))
            }
            _ => return Err(unexpected(&lexeme, "`==`, `<=` or `>=`")),
        };
        let rhs = self.expr()?;
        self.expect_end()?;
        debug!(%relation, "parsed constraint");
        Ok(Constraint::new(lhs, relation, rhs))
    }

    /// Parse an objective, optionally prefixed by `minimize` or `maximize`.
    pub fn parse_objective(&mut self) -> Result<(Option<Sense>, Expr)> {
        let sense = match &self.peek()?.token {
            Token::Ident(word) if word == "minimize" => Some(Sense::Minimize),
            Token::Ident(word) if word == "maximize" => Some(Sense::Maximize),
            _ => None,
        };
        if sense.is_some() {
            self.advance()?;
        }
        let expr = self.parse_expression()?;
        debug!(?sense, "parsed objective");
        Ok((sense, expr))
    }

    // expr = term (('+' | '-') term)*
    fn expr(&mut self) -> Result<Expr> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek_op()? {
                Some(Operator::Plus) => BinaryOp::Add,
                Some(Operator::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.advance()?;
            let rhs = self.term()?;
            let span = lhs.span().join(rhs.span());
            lhs = Expr::binary(op, lhs, rhs, span);
        }
    }

    // term = matmul (('*' | '/') matmul)*
    fn term(&mut self) -> Result<Expr> {
        let mut lhs = self.matmul()?;
        loop {
            let op = match self.peek_op()? {
                Some(Operator::Star) => BinaryOp::Mul,
                Some(Operator::Slash) => BinaryOp::Div,
                _ => return Ok(lhs),
            };
            self.advance()?;
            let rhs = self.matmul()?;
            let span = lhs.span().join(rhs.span());
            lhs = Expr::binary(op, lhs, rhs, span);
        }
    }

    // matmul = unary ('@' unary)*
    fn matmul(&mut self) -> Result<Expr> {
        let mut lhs = self.unary()?;
        while self.peek_op()? == Some(Operator::At) {
            self.advance()?;
            let rhs = self.unary()?;
            let span = lhs.span().join(rhs.span());
            lhs = Expr::binary(BinaryOp::MatMul, lhs, rhs, span);
        }
        Ok(lhs)
    }

    // unary = '-' unary | power
    fn unary(&mut self) -> Result<Expr> {
        if self.peek_op()? == Some(Operator::Minus) {
            let minus = self.advance()?;
            let operand = self.unary()?;
            let span = minus.span.join(operand.span());
            return Ok(Expr::neg(operand, span));
        }
        self.power()
    }

    // power = postfix ('**' '-'? NUMBER)?
    fn power(&mut self) -> Result<Expr> {
        let base = self.postfix()?;
        if self.peek_op()? != Some(Operator::Pow) {
            return Ok(base);
        }
        self.advance()?;
        let mut negate = false;
        if self.peek_op()? == Some(Operator::Minus) {
            self.advance()?;
            negate = true;
        }
        let lexeme = self.advance()?;
        let Token::Number(value) = lexeme.token else {
            return Err(CvxError::parse(
                lexeme.span,
                format!("exponent must be a numeric literal, found {}", lexeme.token),
            ));
        };
        let exponent = if negate { -value } else { value };
        let span = base.span().join(lexeme.span);
        Ok(Expr::call(
            Atom::Power,
            vec![base, Expr::number(exponent, lexeme.span)],
            span,
        ))
    }

    // postfix = primary ('[' slices ']')*
    fn postfix(&mut self) -> Result<Expr> {
        let mut expr = self.primary()?;
        while self.at_delim(Delimiter::LBracket)? {
            self.advance()?;
            let mut slices = vec![self.slice()?];
            while self.at_delim(Delimiter::Comma)? {
                self.advance()?;
                slices.push(self.slice()?);
            }
            let close = self.expect_delim(Delimiter::RBracket)?;
            let span = expr.span().join(close);
            expr = Expr::index(expr, slices, span);
        }
        Ok(expr)
    }

    // slice = bound | bound? ':' bound?
    fn slice(&mut self) -> Result<Slice> {
        let next = self.peek()?;
        if matches!(next.token, Token::Delim(Delimiter::RBracket | Delimiter::Comma)) {
            return Err(CvxError::parse(next.span, "empty slice"));
        }
        let start = if self.at_delim(Delimiter::Colon)? {
            None
        } else {
            let bound = self.bound()?;
            if !self.at_delim(Delimiter::Colon)? {
                return Ok(Slice::Single(bound));
            }
            Some(bound)
        };
        self.advance()?;
        let stop = if self.at_delim(Delimiter::Comma)? || self.at_delim(Delimiter::RBracket)? {
            None
        } else {
            Some(self.bound()?)
        };
        Ok(match (start, stop) {
            (None, None) => Slice::All,
            (start, stop) => Slice::Range { start, stop },
        })
    }

    fn bound(&mut self) -> Result<Bound> {
        let lexeme = self.advance()?;
        match lexeme.token {
            Token::Number(v) if v >= 0.0 && v.fract() == 0.0 => Ok(Bound::Literal(v as usize)),
            Token::Number(v) => Err(CvxError::parse(
                lexeme.span,
                format!("index `{v}` is not a non-negative integer"),
            )),
            Token::Ident(name) => Ok(Bound::Symbol(Symbol::new(name))),
            _ => Err(unexpected(&lexeme, "an index")),
        }
    }

    // primary = NUMBER | IDENT | IDENT '(' args ')' | '(' expr ')'
    fn primary(&mut self) -> Result<Expr> {
        let lexeme = self.advance()?;
        match lexeme.token {
            Token::Number(v) => Ok(Expr::number(v, lexeme.span)),
            Token::Ident(name) => {
                if self.at_delim(Delimiter::LParen)? {
                    self.call(name, lexeme.span)
                } else {
                    Ok(Expr::leaf(name, lexeme.span))
                }
            }
            Token::Delim(Delimiter::LParen) => {
                let inner = self.expr()?;
                self.expect_delim(Delimiter::RParen)?;
                Ok(inner)
            }
            _ => Err(unexpected(&lexeme, "an expression")),
        }
    }

    fn call(&mut self, name: String, name_span: Span) -> Result<Expr> {
        let atom = self.resolve_atom(&name, name_span)?;
        self.expect_delim(Delimiter::LParen)?;
        let mut args = Vec::new();
        if !self.at_delim(Delimiter::RParen)? {
            args.push(self.expr()?);
            while self.at_delim(Delimiter::Comma)? {
                self.advance()?;
                args.push(self.expr()?);
            }
        }
        let close = self.expect_delim(Delimiter::RParen)?;
        let span = name_span.join(close);

        let spec = atom.spec();
        if !spec.arity.accepts(args.len()) {
            return Err(CvxError::parse(
                span,
                format!(
                    "`{}` takes {}, found {}",
                    atom.name(),
                    spec.arity,
                    args.len()
                ),
            ));
        }
        let args = fold_literal_args(spec, args)?;
        Ok(Expr::call(atom, args, span))
    }

    fn resolve_atom(&self, name: &str, span: Span) -> Result<Atom> {
        let resolved = Atom::lookup(name)
            .ok_or_else(|| CvxError::parse(span, format!("unknown atom `{name}`")))?;
        if let Some(alias) = resolved.alias {
            if !self.allow_aliases {
                return Err(CvxError::parse(
                    span,
                    format!(
                        "`{name}` is an alias of `{}` and aliases are disabled",
                        alias.atom.name()
                    ),
                ));
            }
            if alias.ambiguous {
                warn!(alias = name, atom = alias.atom.name(), "ambiguous atom alias");
            }
        }
        Ok(resolved.atom)
    }
}

/// Replace literal-only arguments by plain numbers, rejecting anything else.
fn fold_literal_args(spec: &AtomSpec, args: Vec<Expr>) -> Result<Vec<Expr>> {
    args.into_iter()
        .enumerate()
        .map(|(i, arg)| {
            if spec.arg(i).role != ArgRole::Literal || matches!(arg.kind(), ExprKind::Number(_)) {
                return Ok(arg);
            }
            match arg.literal_value() {
                Some(value) => Ok(Expr::number(value, arg.span())),
                None => Err(CvxError::parse(
                    arg.span(),
                    format!(
                        "argument {} (`{}`) of `{}` must be a numeric literal",
                        i + 1,
                        spec.arg(i).name,
                        spec.atom.name()
                    ),
                )),
            }
        })
        .collect()
}

fn unexpected(lexeme: &Lexeme, expected: &str) -> CvxError {
    CvxError::parse(
        lexeme.span,
        format!("expected {expected}, found {}", lexeme.token),
    )
}

/// Parse a standalone expression with default settings.
pub fn parse_expression(source: &str) -> Result<Expr> {
    Parser::new(source, &Settings::default()).parse_expression()
}

/// Parse a constraint with default settings.
pub fn parse_constraint(source: &str) -> Result<Constraint> {
    Parser::new(source, &Settings::default()).parse_constraint()
}

/// Parse an objective with default settings.
pub fn parse_objective(source: &str) -> Result<(Option<Sense>, Expr)> {
    Parser::new(source, &Settings::default()).parse_objective()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn render(source: &str) -> String {
        parse_expression(source).unwrap().to_string()
    }

    #[test]
    fn test_precedence() {
        assert_eq!(render("a + b * c"), "a + (b * c)");
        assert_eq!(render("a - b - c"), "(a - b) - c");
        assert_eq!(render("a * b @ c"), "a * (b @ c)");
        assert_eq!(render("-a @ b"), "(-a) @ b");
        assert_eq!(render("-x ** 2"), "-power(x, 2)");
        assert_eq!(render("--x"), "-(-x)");
        assert_eq!(render("(a + b) * c"), "(a + b) * c");
    }

    #[test]
    fn test_power_with_negative_exponent() {
        let e = parse_expression("x ** -1").unwrap();
        match e.kind() {
            ExprKind::Call(Atom::Power, args) => assert_eq!(args[1].literal_value(), Some(-1.0)),
            other => panic!("expected power call, got {other:?}"),
        }
    }

    #[test]
    fn test_power_rejects_symbolic_exponent() {
        let err = parse_expression("x ** y").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[test]
    fn test_index_forms() {
        assert_eq!(render("x[0:10]"), "x[0:10]");
        assert_eq!(render("X[:, 2]"), "X[:, 2]");
        assert_eq!(render("x[3:]"), "x[3:]");
        assert_eq!(render("x[:k]"), "x[:k]");
        assert_eq!(render("x[i]"), "x[i]");
        assert!(parse_expression("x[1.5]").is_err());
        assert!(parse_expression("x[]").is_err());
    }

    #[test]
    fn test_empty_slice_points_at_token() {
        let err = parse_expression("x[]").unwrap_err();
        assert!(err.to_string().contains("empty slice"), "{err}");
        assert_eq!(err.span(), Some(Span::new(2, 3)));
        let err = parse_expression("X[1, ]").unwrap_err();
        assert_eq!(err.span(), Some(Span::new(5, 6)));
    }

    #[test]
    fn test_range_slice_length() {
        let e = parse_expression("x[0:10]").unwrap();
        let ExprKind::Index(_, slices) = e.kind() else {
            panic!("expected index");
        };
        assert_eq!(slices, &[Slice::range(0, 10)]);
    }

    #[test]
    fn test_atom_calls() {
        assert_eq!(render("norm2(A @ x - b)"), "norm2((A @ x) - b)");
        assert_eq!(render("sum(X, 1)"), "sum(X, 1)");
        assert_eq!(render("maximum(x, 0, y)"), "maximum(x, 0, y)");
    }

    #[test]
    fn test_unknown_atom() {
        let err = parse_expression("frobenius(x)").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert!(err.to_string().contains("unknown atom `frobenius`"));
    }

    #[test]
    fn test_arity_checked() {
        assert!(parse_expression("norm2(x, y)").is_err());
        assert!(parse_expression("maximum(x)").is_err());
        assert!(parse_expression("reshape(x, 2)").is_err());
    }

    #[test]
    fn test_literal_arguments() {
        assert!(parse_expression("reshape(x, m, 2)").is_err());
        let e = parse_expression("power(x, -1)").unwrap();
        let ExprKind::Call(_, args) = e.kind() else {
            panic!("expected call");
        };
        assert!(matches!(args[1].kind(), ExprKind::Number(v) if *v == -1.0));
    }

    #[test]
    fn test_aliases() {
        assert_eq!(render("normInf(x)"), "norm_inf(x)");
        assert_eq!(render("neg(x)"), "neg_part(x)");

        let strict = Settings {
            allow_aliases: false,
            ..Settings::default()
        };
        assert!(Parser::new("normInf(x)", &strict).parse_expression().is_err());
    }

    #[test]
    fn test_constraint() {
        let c = parse_constraint("sum(x) == 1").unwrap();
        assert_eq!(c.relation(), Relation::Eq);
        assert_eq!(c.to_string(), "sum(x) == 1");
    }

    #[test]
    fn test_malformed_constraints() {
        for source in ["x >= <= 3", "x <= 1 <= 2", "x < 3", "x", "x == ", "== 1"] {
            let err = parse_constraint(source).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Parse, "{source}");
        }
    }

    #[test]
    fn test_relational_operator_in_expression() {
        let err = parse_expression("x <= 1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[test]
    fn test_lex_error_propagates() {
        let err = parse_constraint("x <= 1 $").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Lex);
    }

    #[test]
    fn test_objective_sense() {
        let (sense, e) = parse_objective("maximize mu @ w - gamma * quad_form(w, Sigma)").unwrap();
        assert_eq!(sense, Some(Sense::Maximize));
        assert_eq!(e.to_string(), "(mu @ w) - (gamma * quad_form(w, Sigma))");

        let (sense, _) = parse_objective("norm1(x)").unwrap();
        assert_eq!(sense, None);
    }

    #[test]
    fn test_spans() {
        let e = parse_expression("a + norm2(x)").unwrap();
        assert_eq!(e.span(), Span::new(0, 12));
        let ExprKind::Binary(_, _, rhs) = e.kind() else {
            panic!("expected binary");
        };
        assert_eq!(rhs.span(), Span::new(4, 12));
    }
}
