//! Arithmetic formula evaluation for task quantities.
//!
//! Task formulas come from administrator-entered catalog configuration,
//! so they are parsed into an expression tree and evaluated over the
//! bound variable map — never interpolated into executable code. The
//! grammar is deliberately small: numeric literals, variable names, the
//! four arithmetic operators, unary minus, and parentheses.

use std::collections::BTreeMap;

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum FormulaError {
    #[error("unresolved variable: {0}")]
    UnknownVariable(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("unexpected character '{0}'")]
    InvalidCharacter(char),
    #[error("malformed number '{0}'")]
    InvalidNumber(String),
    #[error("unexpected token '{0}'")]
    UnexpectedToken(String),
    #[error("formula ends unexpectedly")]
    UnexpectedEnd,
    #[error("unbalanced parentheses")]
    UnbalancedParens,
}

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

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(n) => n.to_string(),
            Token::Ident(name) => name.clone(),
            Token::Plus => "+".into(),
            Token::Minus => "-".into(),
            Token::Star => "*".into(),
            Token::Slash => "/".into(),
            Token::LParen => "(".into(),
            Token::RParen => ")".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// Parsed formula, ready for evaluation against any variable bindings.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Variable(String),
    Negate(Box<Expr>),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

/// Evaluate a formula against variable bindings.
///
/// The result is rounded to 3 decimal places, the domain convention for
/// physical quantities (m3, m2, kg).
pub fn evaluate(formula: &str, variables: &BTreeMap<String, f64>) -> Result<f64, FormulaError> {
    let expr = parse(formula)?;
    let value = eval_expr(&expr, variables)?;
    if !value.is_finite() {
        return Err(FormulaError::DivisionByZero);
    }
    Ok(round3(value))
}

/// Parse a formula into its expression tree.
pub fn parse(formula: &str) -> Result<Expr, FormulaError> {
    let tokens = tokenize(formula)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.expression()?;
    match parser.peek() {
        None => Ok(expr),
        // A dangling ')' is the only token expression() can leave behind.
        Some(Token::RParen) => Err(FormulaError::UnbalancedParens),
        Some(token) => Err(FormulaError::UnexpectedToken(token.describe())),
    }
}

pub(crate) fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

fn tokenize(formula: &str) -> Result<Vec<Token>, FormulaError> {
    let mut tokens = Vec::new();
    let mut chars = formula.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                chars.next();
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            // U+2212 is the typographic minus; catalog text may use it.
            '-' | '\u{2212}' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '*' | '\u{00d7}' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '/' | '\u{00f7}' => {
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
                let mut text = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_digit() || c == '.' {
                        text.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value = text
                    .parse::<f64>()
                    .map_err(|_| FormulaError::InvalidNumber(text.clone()))?;
                tokens.push(Token::Number(value));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(name));
            }
            c => return Err(FormulaError::InvalidCharacter(c)),
        }
    }

    Ok(tokens)
}

/// Recursive-descent parser.
///
/// Grammar:
/// ```text
/// expression := term (('+' | '-') term)*
/// term       := unary (('*' | '/') unary)*
/// unary      := '-' unary | primary
/// primary    := NUMBER | IDENT | '(' expression ')'
/// ```
struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
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

    fn expression(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.term()?;
        while let Some(op) = match self.peek() {
            Some(Token::Plus) => Some(BinOp::Add),
            Some(Token::Minus) => Some(BinOp::Sub),
            _ => None,
        } {
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.unary()?;
        while let Some(op) = match self.peek() {
            Some(Token::Star) => Some(BinOp::Mul),
            Some(Token::Slash) => Some(BinOp::Div),
            _ => None,
        } {
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, FormulaError> {
        if matches!(self.peek(), Some(Token::Minus)) {
            self.pos += 1;
            return Ok(Expr::Negate(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, FormulaError> {
        match self.next() {
            Some(Token::Number(value)) => Ok(Expr::Number(value)),
            Some(Token::Ident(name)) => Ok(Expr::Variable(name)),
            Some(Token::LParen) => {
                let inner = self.expression()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    Some(token) => Err(FormulaError::UnexpectedToken(token.describe())),
                    None => Err(FormulaError::UnbalancedParens),
                }
            }
            Some(token) => Err(FormulaError::UnexpectedToken(token.describe())),
            None => Err(FormulaError::UnexpectedEnd),
        }
    }
}

fn eval_expr(expr: &Expr, variables: &BTreeMap<String, f64>) -> Result<f64, FormulaError> {
    match expr {
        Expr::Number(value) => Ok(*value),
        Expr::Variable(name) => variables
            .get(name)
            .copied()
            .ok_or_else(|| FormulaError::UnknownVariable(name.clone())),
        Expr::Negate(inner) => Ok(-eval_expr(inner, variables)?),
        Expr::Binary { op, lhs, rhs } => {
            let lhs = eval_expr(lhs, variables)?;
            let rhs = eval_expr(rhs, variables)?;
            match op {
                BinOp::Add => Ok(lhs + rhs),
                BinOp::Sub => Ok(lhs - rhs),
                BinOp::Mul => Ok(lhs * rhs),
                BinOp::Div => {
                    if rhs == 0.0 {
                        Err(FormulaError::DivisionByZero)
                    } else {
                        Ok(lhs / rhs)
                    }
                }
            }
        }
    }
}
