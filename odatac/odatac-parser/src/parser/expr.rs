use super::pr::*;
use super::{Parser, Resolver};
use crate::error::{Error, ErrorSource, WithErrorInfo};
use crate::lexer::lr::TokenKind;
use crate::span::Span;

/// Name of the implicit range variable, stripped from member paths.
const IT: &str = "$it";

impl<R: Resolver> Parser<R> {
    /// Parses one complete expression, failing on trailing tokens.
    pub fn parse_expression(&mut self) -> Result<Expr, Error> {
        let expr = self.parse_common()?;
        self.expect_end()?;
        Ok(expr)
    }

    /// Parses an expression up to the next token that cannot continue it.
    ///
    /// `or` binds loosest, then `and`, then comparisons, then additive and
    /// multiplicative arithmetic.
    pub fn parse_common(&mut self) -> Result<Expr, Error> {
        self.parse_logical(LogicalOp::Or)
    }

    fn parse_logical(&mut self, op: LogicalOp) -> Result<Expr, Error> {
        let mut left = self.parse_logical_operand(op)?;

        while self.peek_is_ident(&op.to_string()) {
            self.next();
            let right = self.parse_logical_operand(op)?;
            left = append_logical(left, op, right);
        }
        Ok(left)
    }

    fn parse_logical_operand(&mut self, op: LogicalOp) -> Result<Expr, Error> {
        match op {
            LogicalOp::Or => self.parse_logical(LogicalOp::And),
            _ => self.parse_binary(0),
        }
    }

    /// Precedence climbing over arithmetic and comparison operators.
    fn parse_binary(&mut self, min_strength: u8) -> Result<Expr, Error> {
        let mut left = self.parse_unary()?;

        loop {
            let Some(op) = self.peek_infix() else {
                break;
            };
            let strength = op.binding_strength();
            if strength < min_strength {
                break;
            }
            self.next();

            left = match op {
                InfixOp::Comparison(ComparisonOp::In) => {
                    let right = self.parse_in_list()?;
                    new_comparison(left, ComparisonOp::In, right)
                }
                InfixOp::Comparison(op) => {
                    let right = self.parse_binary(strength + 1)?;
                    new_comparison(left, op, right)
                }
                InfixOp::Arithmetic(op) => {
                    let right = self.parse_binary(strength + 1)?;
                    new_arithmetic(left, op, right)
                }
            };
        }
        Ok(left)
    }

    fn peek_infix(&self) -> Option<InfixOp> {
        match &self.peek()?.kind {
            TokenKind::Ident(keyword) => InfixOp::from_keyword(keyword),
            _ => None,
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, Error> {
        if self.peek_is_ident("not") {
            self.next();
            let start = self.last_span();
            let operand = self.parse_unary()?;
            let span = Span::merge_opt(Some(start), operand.span);
            return Ok(Expr::new(LogicalExpr {
                op: LogicalOp::Not,
                args: vec![operand],
            })
            .with_span(span));
        }
        self.parse_operand()
    }

    /// A literal, a parenthesized expression, a method call or a member path.
    fn parse_operand(&mut self) -> Result<Expr, Error> {
        let Some(token) = self.peek().cloned() else {
            return Err(self.expected(None, "an expression"));
        };
        let span = Span::from(token.span.clone());

        match token.kind {
            TokenKind::Literal(literal) => {
                self.next();
                Ok(Expr::new(literal).with_span(Some(span)))
            }
            TokenKind::Syntax('(') => {
                self.next();
                let mut inner = self.parse_common()?;
                let end = self.expect_syntax(')', "parenthesized expression")?;
                inner.span = Some(Span::merge(span, end));
                Ok(inner)
            }
            TokenKind::Ident(name) => {
                if self.peek_nth(1).is_some_and(|t| t.is_syntax('(')) {
                    self.parse_method_call(name, span)
                } else {
                    self.parse_member()
                }
            }
            TokenKind::Syntax(_) => Err(self.expected(None, "an expression")),
        }
    }

    /// Slash separated identifiers, such as `$it/customer/name`.
    fn parse_member(&mut self) -> Result<Expr, Error> {
        let (first, start) = self.expect_ident("member")?;
        let mut segments = vec![first];

        while self.peek_is_syntax('/') {
            self.next();
            let (segment, _) = self.expect_ident("member path")?;
            segments.push(segment);
        }
        if segments.len() > 1 && segments[0] == IT {
            segments.remove(0);
        }
        let span = Span::merge(start, self.last_span());

        // A leading minus negates the member
        let negated = segments[0].starts_with('-');
        if negated {
            segments[0].remove(0);
        }

        let member = self.resolver.resolve_member(segments.join("."), span)?;
        if !negated {
            return Ok(member);
        }
        Ok(Expr::new(ArithmeticExpr {
            left: Box::new(Expr::literal(0_i64)),
            op: ArithmeticOp::Sub,
            right: Box::new(member),
        })
        .with_span(Some(span)))
    }

    fn parse_method_call(&mut self, name: String, start: Span) -> Result<Expr, Error> {
        // name and open paren
        self.next();
        self.next();

        if name == "case" {
            return self.parse_switch(start);
        }

        let mut args = Vec::new();
        if !self.peek_is_syntax(')') {
            loop {
                args.push(self.parse_common()?);
                if self.peek_is_syntax(',') {
                    self.next();
                    continue;
                }
                break;
            }
        }
        let end = self.expect_syntax(')', &format!("arguments of `{name}`"))?;

        self.resolver
            .resolve_method(name, args, Span::merge(start, end))
    }

    /// `case(cond: value, ..., true: default)`; the open paren is consumed.
    fn parse_switch(&mut self, start: Span) -> Result<Expr, Error> {
        let mut branches = Vec::new();
        let mut default = None;

        while !self.peek_is_syntax(')') {
            let case = self.parse_common()?;
            self.expect_syntax(':', "case branch")?;
            let then = self.parse_common()?;

            if matches!(case.kind, ExprKind::Literal(Literal::Boolean(true))) {
                default = Some(Box::new(then));
                break;
            }
            branches.push(SwitchCase { case, then });

            if !self.peek_is_syntax(',') {
                break;
            }
            self.next();
        }
        let end = self.expect_syntax(')', "case")?;

        if branches.is_empty() {
            return Err(Error::new_simple("`case` requires at least one branch")
                .with_span(Some(Span::merge(start, end)))
                .with_source(ErrorSource::Parser));
        }

        Ok(Expr::new(Switch { branches, default }).with_span(Some(Span::merge(start, end))))
    }

    /// The parenthesized list on the right of `in`.
    fn parse_in_list(&mut self) -> Result<Expr, Error> {
        let start = self.expect_syntax('(', "in")?;

        let mut items = Vec::new();
        while !self.peek_is_syntax(')') {
            items.push(self.parse_common()?);
            if !self.peek_is_syntax(',') {
                break;
            }
            self.next();
        }
        let end = self.expect_syntax(')', "in")?;

        Ok(Expr::new(ExprKind::Sequence(items)).with_span(Some(Span::merge(start, end))))
    }
}

/// Runs of the same logical operator extend one node; a different operator
/// wraps what came before.
fn append_logical(left: Expr, op: LogicalOp, right: Expr) -> Expr {
    let span = Span::merge_opt(left.span, right.span);

    match left.kind {
        ExprKind::Logical(mut logical) if logical.op == op => {
            logical.args.push(right);
            Expr::new(logical).with_span(span)
        }
        kind => {
            let left = Expr {
                kind,
                span: left.span,
            };
            Expr::new(LogicalExpr {
                op,
                args: vec![left, right],
            })
            .with_span(span)
        }
    }
}

fn new_comparison(left: Expr, op: ComparisonOp, right: Expr) -> Expr {
    let span = Span::merge_opt(left.span, right.span);
    Expr::new(ComparisonExpr {
        left: Box::new(left),
        op,
        right: Box::new(right),
    })
    .with_span(span)
}

/// Builds an arithmetic node, folding it when both operands are numeric
/// literals.
fn new_arithmetic(left: Expr, op: ArithmeticOp, right: Expr) -> Expr {
    let span = Span::merge_opt(left.span, right.span);

    if let (ExprKind::Literal(a), ExprKind::Literal(b)) = (&left.kind, &right.kind) {
        if let Some(folded) = fold_constants(a, op, b) {
            log::trace!("folded {a} {op} {b} into {folded}");
            return Expr::new(folded).with_span(span);
        }
    }

    Expr::new(ArithmeticExpr {
        left: Box::new(left),
        op,
        right: Box::new(right),
    })
    .with_span(span)
}

/// Integer arithmetic stays integral where exact. Overflow and division by
/// zero are left for the database to report.
pub fn fold_constants(a: &Literal, op: ArithmeticOp, b: &Literal) -> Option<Literal> {
    match (a, b) {
        (Literal::Integer(a), Literal::Integer(b)) => {
            let (a, b) = (*a, *b);
            match op {
                ArithmeticOp::Add => a.checked_add(b).map(Literal::Integer),
                ArithmeticOp::Sub => a.checked_sub(b).map(Literal::Integer),
                ArithmeticOp::Mul => a.checked_mul(b).map(Literal::Integer),
                ArithmeticOp::Mod => a.checked_rem(b).map(Literal::Integer),
                ArithmeticOp::Div if b == 0 => None,
                ArithmeticOp::Div => match a.checked_rem(b) {
                    Some(0) => a.checked_div(b).map(Literal::Integer),
                    _ => Some(Literal::Float(a as f64 / b as f64)),
                },
            }
        }
        _ => {
            let (a, b) = (a.as_f64()?, b.as_f64()?);
            let res = match op {
                ArithmeticOp::Add => a + b,
                ArithmeticOp::Sub => a - b,
                ArithmeticOp::Mul => a * b,
                ArithmeticOp::Div | ArithmeticOp::Mod if b == 0.0 => return None,
                ArithmeticOp::Div => a / b,
                ArithmeticOp::Mod => a % b,
            };
            res.is_finite().then_some(Literal::Float(res))
        }
    }
}
