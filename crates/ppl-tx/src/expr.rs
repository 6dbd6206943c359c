//! Arithmetic expression parser for `add`.
//!
//! A small recursive-descent grammar over `+ - * / ( )`, numeric
//! literals, and bare identifiers (column references). Expressions are
//! compiled directly into DataFusion [`Expr`] trees; there is no host
//! evaluation and no function-call syntax.

use datafusion::prelude::{ident, lit, Expr};

use ppl_core::error::{PplError, Result};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' => {
                chars.next();
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '/' => {
                chars.next();
                tokens.push(Token::Slash);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '0'..='9' | '.' => {
                let mut number = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        number.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value = number.parse::<f64>().map_err(|_| {
                    PplError::Value(format!("invalid number '{number}' in expression '{input}'"))
                })?;
                tokens.push(Token::Number(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut name = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_alphanumeric() || d == '_' {
                        name.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(name));
            }
            other => {
                return Err(PplError::Value(format!(
                    "unexpected character '{other}' in expression '{input}'"
                )))
            }
        }
    }
    Ok(tokens)
}

struct ExprParser {
    tokens: Vec<Token>,
    pos: usize,
    columns: Vec<String>,
}

impl ExprParser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    // expr := term (('+' | '-') term)*
    fn expression(&mut self) -> Result<Expr> {
        let mut left = self.term()?;
        while let Some(token) = self.peek() {
            match token {
                Token::Plus => {
                    self.next();
                    left = left + self.term()?;
                }
                Token::Minus => {
                    self.next();
                    left = left - self.term()?;
                }
                _ => break,
            }
        }
        Ok(left)
    }

    // term := unary (('*' | '/') unary)*
    fn term(&mut self) -> Result<Expr> {
        let mut left = self.unary()?;
        while let Some(token) = self.peek() {
            match token {
                Token::Star => {
                    self.next();
                    left = left * self.unary()?;
                }
                Token::Slash => {
                    self.next();
                    left = left / self.unary()?;
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr> {
        if matches!(self.peek(), Some(Token::Minus)) {
            self.next();
            return Ok(-self.unary()?);
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr> {
        match self.next() {
            Some(Token::Number(n)) => Ok(lit(n)),
            Some(Token::Ident(name)) => {
                self.columns.push(name.clone());
                Ok(ident(name))
            }
            Some(Token::LParen) => {
                let inner = self.expression()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(PplError::Value("expected ')' in expression".to_string())),
                }
            }
            other => Err(PplError::Value(format!(
                "unexpected token {other:?} in expression"
            ))),
        }
    }
}

/// Parse an arithmetic expression into a DataFusion [`Expr`].
///
/// Returns the expression and the bare identifiers it references, so the
/// caller can verify them against the table schema before planning.
pub fn parse_arithmetic(input: &str) -> Result<(Expr, Vec<String>)> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(PplError::Value("empty expression".to_string()));
    }
    let mut parser = ExprParser {
        tokens,
        pos: 0,
        columns: Vec::new(),
    };
    let expr = parser.expression()?;
    if parser.pos != parser.tokens.len() {
        return Err(PplError::Value(format!(
            "could not parse expression '{input}'"
        )));
    }
    Ok((expr, parser.columns))
}
