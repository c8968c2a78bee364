//! Recursive-descent expression parser.
//!
//! Precedence, lowest first: `;` sequences, assignment and arrows, `?:`,
//! `||`, `&&`, equality, relational, additive, multiplicative, unary,
//! postfix update, member access and calls.

use std::sync::Arc;

use super::ast::{AssignOp, BinaryOp, Expr, Literal, LogicalOp, UnaryOp};
use super::lexer::{tokenize, Lexeme, Punct, Token};
use super::EvalError;
use crate::value::format_number;

type ParseResult<T> = Result<T, EvalError>;

/// Binary operator tiers, loosest first.
const BINARY_LEVELS: &[&[(Punct, BinaryOp)]] = &[
    &[
        (Punct::Eq, BinaryOp::Eq),
        (Punct::Ne, BinaryOp::Ne),
        (Punct::StrictEq, BinaryOp::StrictEq),
        (Punct::StrictNe, BinaryOp::StrictNe),
    ],
    &[
        (Punct::Lt, BinaryOp::Lt),
        (Punct::Le, BinaryOp::Le),
        (Punct::Gt, BinaryOp::Gt),
        (Punct::Ge, BinaryOp::Ge),
    ],
    &[(Punct::Plus, BinaryOp::Add), (Punct::Minus, BinaryOp::Sub)],
    &[
        (Punct::Star, BinaryOp::Mul),
        (Punct::Slash, BinaryOp::Div),
        (Punct::Percent, BinaryOp::Mod),
    ],
];

/// Parse a whole expression source.
pub fn parse(source: &str) -> ParseResult<Expr> {
    let lexemes = tokenize(source)?;
    Parser { lexemes, pos: 0 }.program()
}

struct Parser {
    lexemes: Vec<Lexeme>,
    pos: usize,
}

impl Parser {
    fn program(&mut self) -> ParseResult<Expr> {
        let mut statements = Vec::new();

        while !self.at_end() {
            if self.eat(Punct::Semi) {
                continue;
            }
            statements.push(self.assignment()?);
            if !self.at_end() {
                self.expect(Punct::Semi, "`;` or end of expression")?;
            }
        }

        if statements.len() == 1 {
            if let Some(only) = statements.pop() {
                return Ok(only);
            }
        }
        Ok(Expr::Sequence(statements))
    }

    fn assignment(&mut self) -> ParseResult<Expr> {
        if let Some(params) = self.arrow_params() {
            let body = self.assignment()?;
            return Ok(Expr::Arrow {
                params: params.into(),
                body: Arc::new(body),
            });
        }

        let target = self.conditional()?;

        let op = match self.peek_punct() {
            Some(Punct::Assign) => AssignOp::Assign,
            Some(Punct::PlusAssign) => AssignOp::Compound(BinaryOp::Add),
            Some(Punct::MinusAssign) => AssignOp::Compound(BinaryOp::Sub),
            Some(Punct::StarAssign) => AssignOp::Compound(BinaryOp::Mul),
            Some(Punct::SlashAssign) => AssignOp::Compound(BinaryOp::Div),
            _ => return Ok(target),
        };
        if !target.is_assignable() {
            return Err(EvalError::InvalidAssignmentTarget);
        }
        self.pos += 1;

        let value = self.assignment()?;
        Ok(Expr::Assign {
            op,
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    /// If an arrow function head starts here, consume it and return the
    /// parameter names. Otherwise leave the position untouched.
    fn arrow_params(&mut self) -> Option<Vec<String>> {
        let token_at = |i: usize| self.lexemes.get(i).map(|l| &l.token);
        let is_punct = |i: usize, p: Punct| token_at(i) == Some(&Token::Punct(p));

        if let Some(Token::Ident(name)) = token_at(self.pos) {
            if is_punct(self.pos + 1, Punct::Arrow) && !is_keyword(name) {
                let params = vec![name.clone()];
                self.pos += 2;
                return Some(params);
            }
            return None;
        }

        if !is_punct(self.pos, Punct::LParen) {
            return None;
        }

        let mut params = Vec::new();
        let mut i = self.pos + 1;
        if !is_punct(i, Punct::RParen) {
            loop {
                match token_at(i) {
                    Some(Token::Ident(name)) if !is_keyword(name) => params.push(name.clone()),
                    _ => return None,
                }
                i += 1;
                if is_punct(i, Punct::Comma) {
                    i += 1;
                } else {
                    break;
                }
            }
        }
        if !is_punct(i, Punct::RParen) || !is_punct(i + 1, Punct::Arrow) {
            return None;
        }

        self.pos = i + 2;
        Some(params)
    }

    fn conditional(&mut self) -> ParseResult<Expr> {
        let test = self.logical(LogicalOp::Or)?;
        if !self.eat(Punct::Question) {
            return Ok(test);
        }
        let consequent = self.assignment()?;
        self.expect(Punct::Colon, "`:`")?;
        let alternate = self.assignment()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    fn logical(&mut self, op: LogicalOp) -> ParseResult<Expr> {
        let (punct, next) = match op {
            LogicalOp::Or => (Punct::OrOr, Some(LogicalOp::And)),
            LogicalOp::And => (Punct::AndAnd, None),
        };
        let operand = |parser: &mut Self| match next {
            Some(next) => parser.logical(next),
            None => parser.binary(0),
        };

        let mut left = operand(&mut *self)?;
        while self.eat(punct) {
            let right = operand(&mut *self)?;
            left = Expr::Logical {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn binary(&mut self, level: usize) -> ParseResult<Expr> {
        let Some(operators) = BINARY_LEVELS.get(level) else {
            return self.unary();
        };

        let mut left = self.binary(level + 1)?;
        while let Some(op) = self
            .peek_punct()
            .and_then(|p| operators.iter().find(|(q, _)| *q == p).map(|(_, op)| *op))
        {
            self.pos += 1;
            let right = self.binary(level + 1)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        let op = match self.peek_punct() {
            Some(Punct::Bang) => UnaryOp::Not,
            Some(Punct::Minus) => UnaryOp::Neg,
            Some(Punct::Plus) => UnaryOp::Plus,
            Some(p @ (Punct::PlusPlus | Punct::MinusMinus)) => {
                self.pos += 1;
                let target = self.unary()?;
                return update(target, p, true);
            }
            _ => return self.postfix(),
        };
        self.pos += 1;
        let operand = self.unary()?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn postfix(&mut self) -> ParseResult<Expr> {
        let expr = self.call_or_member()?;
        match self.peek_punct() {
            Some(p @ (Punct::PlusPlus | Punct::MinusMinus)) => {
                self.pos += 1;
                update(expr, p, false)
            }
            _ => Ok(expr),
        }
    }

    fn call_or_member(&mut self) -> ParseResult<Expr> {
        let mut expr = self.primary()?;

        loop {
            if self.eat(Punct::Dot) {
                let property = match self.next_token() {
                    Some(Token::Ident(name)) => name,
                    _ => return Err(self.unexpected_previous("property name")),
                };
                expr = Expr::Member {
                    object: Box::new(expr),
                    property,
                };
            } else if self.eat(Punct::LBracket) {
                let index = self.assignment()?;
                self.expect(Punct::RBracket, "`]`")?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                };
            } else if self.eat(Punct::LParen) {
                let args = self.list(Punct::RParen, Self::assignment)?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        let Some(token) = self.next_token() else {
            return Err(EvalError::UnexpectedEnd);
        };

        match token {
            Token::Number(n) => Ok(Expr::Literal(Literal::Number(n))),
            Token::Str(s) => Ok(Expr::Literal(Literal::Str(s))),
            Token::Ident(name) => Ok(match name.as_str() {
                "true" => Expr::Literal(Literal::Bool(true)),
                "false" => Expr::Literal(Literal::Bool(false)),
                "null" => Expr::Literal(Literal::Null),
                "undefined" => Expr::Literal(Literal::Undefined),
                _ => Expr::Ident(name),
            }),
            Token::Punct(Punct::LParen) => {
                let inner = self.assignment()?;
                self.expect(Punct::RParen, "`)`")?;
                Ok(inner)
            }
            Token::Punct(Punct::LBracket) => {
                Ok(Expr::Array(self.list(Punct::RBracket, Self::assignment)?))
            }
            Token::Punct(Punct::LBrace) => Ok(Expr::Object(self.list(Punct::RBrace, Self::property)?)),
            _ => Err(self.unexpected_previous("an expression")),
        }
    }

    /// `key: value` or shorthand `key` inside an object literal.
    fn property(&mut self) -> ParseResult<(String, Expr)> {
        let (key, shorthand) = match self.next_token() {
            Some(Token::Ident(name)) => (name, true),
            Some(Token::Str(s)) => (s, false),
            Some(Token::Number(n)) => (format_number(n), false),
            Some(_) => return Err(self.unexpected_previous("property key")),
            None => return Err(EvalError::UnexpectedEnd),
        };

        if self.eat(Punct::Colon) {
            let value = self.assignment()?;
            Ok((key, value))
        } else if shorthand {
            Ok((key.clone(), Expr::Ident(key)))
        } else {
            Err(self.unexpected("`:`"))
        }
    }

    /// Comma-separated items up to `close`, allowing a trailing comma.
    fn list<T>(
        &mut self,
        close: Punct,
        mut item: impl FnMut(&mut Self) -> ParseResult<T>,
    ) -> ParseResult<Vec<T>> {
        let mut items = Vec::new();
        loop {
            if self.eat(close) {
                return Ok(items);
            }
            items.push(item(&mut *self)?);
            if !self.eat(Punct::Comma) {
                self.expect(close, "`,` or closing bracket")?;
                return Ok(items);
            }
        }
    }

    // ------------------------------------------------------------------
    // Token helpers
    // ------------------------------------------------------------------

    fn at_end(&self) -> bool {
        self.pos >= self.lexemes.len()
    }

    fn peek_punct(&self) -> Option<Punct> {
        match self.lexemes.get(self.pos).map(|l| &l.token) {
            Some(Token::Punct(p)) => Some(*p),
            _ => None,
        }
    }

    fn next_token(&mut self) -> Option<Token> {
        let token = self.lexemes.get(self.pos).map(|l| l.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, punct: Punct) -> bool {
        if self.peek_punct() == Some(punct) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, punct: Punct, expected: &str) -> ParseResult<()> {
        if self.eat(punct) {
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn unexpected(&self, expected: &str) -> EvalError {
        match self.lexemes.get(self.pos) {
            Some(lexeme) => EvalError::Syntax {
                offset: lexeme.offset,
                message: format!("expected {}, found {}", expected, describe(&lexeme.token)),
            },
            None => EvalError::UnexpectedEnd,
        }
    }

    /// Like `unexpected`, for a token that was already consumed.
    fn unexpected_previous(&mut self, expected: &str) -> EvalError {
        if self.pos == 0 || self.lexemes.get(self.pos - 1).is_none() {
            return EvalError::UnexpectedEnd;
        }
        self.pos -= 1;
        self.unexpected(expected)
    }
}

fn update(target: Expr, punct: Punct, prefix: bool) -> ParseResult<Expr> {
    if !target.is_assignable() {
        return Err(EvalError::InvalidAssignmentTarget);
    }
    Ok(Expr::Update {
        delta: if punct == Punct::PlusPlus { 1.0 } else { -1.0 },
        prefix,
        target: Box::new(target),
    })
}

fn is_keyword(name: &str) -> bool {
    matches!(name, "true" | "false" | "null" | "undefined")
}

fn describe(token: &Token) -> String {
    match token {
        Token::Number(n) => format!("number `{}`", format_number(*n)),
        Token::Str(s) => format!("string {:?}", s),
        Token::Ident(name) => format!("`{}`", name),
        Token::Punct(p) => format!("{:?}", p),
    }
}
