/*
 * parser.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Recursive-descent parser for the expression language.
//!
//! Precedence, lowest first:
//!
//! ```text
//! conditional   a if c else b
//! or            a or b
//! and           a and b
//! not           not a
//! comparison    == != < <= > >= in, not in, is, is not
//! additive      + -
//! multiplicative * / %
//! unary         -a
//! postfix       a.b  a[i]  a.f(x)  f(x)
//! ```

use super::ast::{BinaryOp, Expr, UnaryOp};
use super::lexer::{SpannedToken, Token, lex};
use crate::context::PodValue;

/// Parse a complete expression.
pub fn parse(source: &str) -> Result<Expr, String> {
    let tokens = lex(source)?;
    if tokens.is_empty() {
        return Err("empty expression".to_string());
    }
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
    };
    let expr = parser.parse_conditional()?;
    match parser.peek() {
        None => Ok(expr),
        Some((token, span)) => Err(format!(
            "unexpected {} at offset {}",
            describe(token),
            span.start
        )),
    }
}

struct Parser<'t, 'src> {
    tokens: &'t [SpannedToken<'src>],
    pos: usize,
}

impl<'t, 'src> Parser<'t, 'src> {
    fn parse_conditional(&mut self) -> Result<Expr, String> {
        let then = self.parse_or()?;
        if !self.match_token(&Token::If) {
            return Ok(then);
        }
        let condition = self.parse_or()?;
        self.expect(&Token::Else)?;
        let otherwise = self.parse_conditional()?;
        Ok(Expr::Conditional {
            then: Box::new(then),
            condition: Box::new(condition),
            otherwise: Box::new(otherwise),
        })
    }

    fn parse_or(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_and()?;
        while self.match_token(&Token::Or) {
            let right = self.parse_and()?;
            left = Expr::Binary(Box::new(left), BinaryOp::Or, Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_not()?;
        while self.match_token(&Token::And) {
            let right = self.parse_not()?;
            left = Expr::Binary(Box::new(left), BinaryOp::And, Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, String> {
        if self.match_token(&Token::Not) {
            let operand = self.parse_not()?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(operand)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_additive()?;
        while let Some(op) = self.match_comparison_op() {
            let right = self.parse_additive()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_token() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_multiplicative()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek_token() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Mod,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, String> {
        if self.match_token(&Token::Minus) {
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(operand)));
        }
        let primary = self.parse_primary()?;
        self.parse_postfix(primary)
    }

    fn parse_postfix(&mut self, mut expr: Expr) -> Result<Expr, String> {
        loop {
            if self.match_token(&Token::Dot) {
                let name = self.expect_ident()?;
                if self.match_token(&Token::LParen) {
                    let mut args = vec![expr];
                    args.extend(self.parse_arguments()?);
                    expr = Expr::Call(name, args);
                } else {
                    expr = Expr::Attribute(Box::new(expr), name);
                }
            } else if self.match_token(&Token::LBracket) {
                let index = self.parse_conditional()?;
                self.expect(&Token::RBracket)?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, String> {
        let Some((token, span)) = self.advance() else {
            return Err("unexpected end of expression".to_string());
        };
        match token {
            Token::NoneLit => Ok(Expr::Literal(PodValue::None)),
            Token::True => Ok(Expr::Literal(PodValue::Bool(true))),
            Token::False => Ok(Expr::Literal(PodValue::Bool(false))),
            Token::Int(i) => Ok(Expr::Literal(PodValue::Int(*i))),
            Token::Float(f) => Ok(Expr::Literal(PodValue::Float(*f))),
            Token::Str(s) => Ok(Expr::Literal(PodValue::Str(unescape(s)))),
            Token::Ident(name) => {
                let name = (*name).to_string();
                if self.match_token(&Token::LParen) {
                    let args = self.parse_arguments()?;
                    Ok(Expr::Call(name, args))
                } else {
                    Ok(Expr::Name(name))
                }
            }
            Token::LParen => {
                let inner = self.parse_conditional()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Token::LBracket => {
                let mut items = Vec::new();
                if !self.match_token(&Token::RBracket) {
                    loop {
                        items.push(self.parse_conditional()?);
                        if self.match_token(&Token::RBracket) {
                            break;
                        }
                        self.expect(&Token::Comma)?;
                        // Trailing comma
                        if self.match_token(&Token::RBracket) {
                            break;
                        }
                    }
                }
                Ok(Expr::List(items))
            }
            other => Err(format!(
                "unexpected {} at offset {}",
                describe(other),
                span.start
            )),
        }
    }

    /// Arguments after an opening parenthesis, including the closing one.
    fn parse_arguments(&mut self) -> Result<Vec<Expr>, String> {
        let mut args = Vec::new();
        if self.match_token(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_conditional()?);
            if self.match_token(&Token::RParen) {
                return Ok(args);
            }
            self.expect(&Token::Comma)?;
        }
    }

    fn match_comparison_op(&mut self) -> Option<BinaryOp> {
        let op = match self.peek_token()? {
            Token::EqEq => BinaryOp::Eq,
            Token::NotEq => BinaryOp::NotEq,
            Token::Lt => BinaryOp::Lt,
            Token::Lte => BinaryOp::Lte,
            Token::Gt => BinaryOp::Gt,
            Token::Gte => BinaryOp::Gte,
            Token::In => BinaryOp::In,
            Token::Not if self.peek_token_at(1) == Some(&Token::In) => {
                self.pos += 2;
                return Some(BinaryOp::NotIn);
            }
            Token::Is if self.peek_token_at(1) == Some(&Token::Not) => {
                self.pos += 2;
                return Some(BinaryOp::IsNot);
            }
            Token::Is => BinaryOp::Is,
            _ => return None,
        };
        self.pos += 1;
        Some(op)
    }

    fn peek(&self) -> Option<&'t SpannedToken<'src>> {
        self.tokens.get(self.pos)
    }

    fn peek_token(&self) -> Option<&'t Token<'src>> {
        self.peek_token_at(0)
    }

    fn peek_token_at(&self, offset: usize) -> Option<&'t Token<'src>> {
        self.tokens.get(self.pos + offset).map(|(t, _)| t)
    }

    fn advance(&mut self) -> Option<&'t SpannedToken<'src>> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn match_token(&mut self, expected: &Token<'_>) -> bool {
        if self.peek_token() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token<'_>) -> Result<(), String> {
        if self.match_token(expected) {
            return Ok(());
        }
        match self.peek() {
            Some((found, span)) => Err(format!(
                "expected {}, found {} at offset {}",
                describe(expected),
                describe(found),
                span.start
            )),
            None => Err(format!(
                "expected {}, found end of expression",
                describe(expected)
            )),
        }
    }

    fn expect_ident(&mut self) -> Result<String, String> {
        match self.advance() {
            Some((Token::Ident(name), _)) => Ok((*name).to_string()),
            Some((other, span)) => Err(format!(
                "expected a name, found {} at offset {}",
                describe(other),
                span.start
            )),
            None => Err("expected a name, found end of expression".to_string()),
        }
    }
}

fn describe(token: &Token<'_>) -> String {
    match token {
        Token::Ident(name) => format!("name `{name}`"),
        Token::Int(i) => format!("number `{i}`"),
        Token::Float(f) => format!("number `{f}`"),
        Token::Str(s) => format!("string '{s}'"),
        Token::And => "`and`".into(),
        Token::Or => "`or`".into(),
        Token::Not => "`not`".into(),
        Token::In => "`in`".into(),
        Token::Is => "`is`".into(),
        Token::If => "`if`".into(),
        Token::Else => "`else`".into(),
        Token::NoneLit => "`None`".into(),
        Token::True => "`True`".into(),
        Token::False => "`False`".into(),
        Token::EqEq => "`==`".into(),
        Token::NotEq => "`!=`".into(),
        Token::Lte => "`<=`".into(),
        Token::Gte => "`>=`".into(),
        Token::Lt => "`<`".into(),
        Token::Gt => "`>`".into(),
        Token::Plus => "`+`".into(),
        Token::Minus => "`-`".into(),
        Token::Star => "`*`".into(),
        Token::Slash => "`/`".into(),
        Token::Percent => "`%`".into(),
        Token::LParen => "`(`".into(),
        Token::RParen => "`)`".into(),
        Token::LBracket => "`[`".into(),
        Token::RBracket => "`]`".into(),
        Token::Comma => "`,`".into(),
        Token::Dot => "`.`".into(),
    }
}

/// Resolve backslash escapes inside a string literal.
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
