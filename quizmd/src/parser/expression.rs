use std::fmt;

use crate::expr::{BinaryOp, Expr, FUNCTIONS, UnaryOp};

// ---------------------------------------------------------------------------
// Token types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Token {
    Number(f64),
    Ident(String),

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Comma,

    LParen,
    RParen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Number,
    Ident,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Comma,
    LParen,
    RParen,
}

fn token_kind(token: &Token) -> TokenKind {
    match token {
        Token::Number(_) => TokenKind::Number,
        Token::Ident(_) => TokenKind::Ident,
        Token::Plus => TokenKind::Plus,
        Token::Minus => TokenKind::Minus,
        Token::Star => TokenKind::Star,
        Token::Slash => TokenKind::Slash,
        Token::Percent => TokenKind::Percent,
        Token::Caret => TokenKind::Caret,
        Token::Comma => TokenKind::Comma,
        Token::LParen => TokenKind::LParen,
        Token::RParen => TokenKind::RParen,
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure to read an arithmetic expression. Expression sources are short
/// single-line strings, so the message alone locates the problem.
#[derive(Debug, Clone, PartialEq)]
pub struct ExprError {
    pub message: String,
}

impl ExprError {
    fn new(message: impl Into<String>) -> Self {
        ExprError {
            message: message.into(),
        }
    }
}

impl fmt::Display for ExprError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ExprError {}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parse an arithmetic expression string into a tree.
pub fn parse_expression(source: &str) -> Result<Expr, ExprError> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(ExprError::new("empty expression"));
    }
    let mut parser = ExprParser::new(tokens);
    let expr = parser.parse_expr(0)?;
    if !parser.at_end() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(expr)
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

fn tokenize(source: &str) -> Result<Vec<Token>, ExprError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = source.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '%' => {
                tokens.push(Token::Percent);
                i += 1;
            }
            '^' => {
                tokens.push(Token::Caret);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let value: f64 = text
                    .parse()
                    .map_err(|_| ExprError::new(format!("malformed number '{}'", text)))?;
                tokens.push(Token::Number(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_alphanumeric() || chars[i] == '_')
                {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            // Anything outside the grammar is a hard tokenize failure.
            other => return Err(ExprError::new(format!("unexpected character '{}'", other))),
        }
    }

    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Pratt parser
// ---------------------------------------------------------------------------

struct ExprParser {
    tokens: Vec<Token>,
    pos: usize,
}

// Binding powers (precedence). Higher = tighter binding.
// Left bp, right bp. For left-assoc: right = left + 1. For right-assoc: right = left.
const BP_ADDITIVE: u8 = 12; // + -
const BP_MULTIPLICATIVE: u8 = 14; // * / %
const BP_UNARY: u8 = 16; // -
const BP_POWER: u8 = 18; // ^

impl ExprParser {
    fn new(tokens: Vec<Token>) -> Self {
        ExprParser { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(token_kind)
    }

    fn advance(&mut self) -> Option<Token> {
        if self.pos < self.tokens.len() {
            let t = self.tokens[self.pos].clone();
            self.pos += 1;
            Some(t)
        } else {
            None
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn error(&self, msg: impl Into<String>) -> ExprError {
        ExprError::new(msg)
    }

    fn expect_token_kind(&mut self, kind: TokenKind) -> Result<Token, ExprError> {
        match self.advance() {
            Some(t) if token_kind(&t) == kind => Ok(t),
            _ => Err(self.error(format!("expected {:?}", kind))),
        }
    }

    fn parse_expr(&mut self, min_bp: u8) -> Result<Expr, ExprError> {
        let mut left = self.parse_prefix()?;

        loop {
            let Some(kind) = self.peek_kind() else { break };

            // Adjacency of two operands (2x, 3(x+1), x y) reads as
            // multiplication at multiplicative precedence.
            if starts_operand(kind) {
                if BP_MULTIPLICATIVE < min_bp {
                    break;
                }
                let right = self.parse_expr(BP_MULTIPLICATIVE + 1)?;
                left = Expr::Binary {
                    op: BinaryOp::Mul,
                    left: Box::new(left),
                    right: Box::new(right),
                };
                continue;
            }

            let Some((l_bp, r_bp)) = infix_bp(kind) else { break };
            if l_bp < min_bp {
                break;
            }

            let op = self.advance().unwrap();
            let right = self.parse_expr(r_bp)?;

            let op = match token_kind(&op) {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Rem,
                TokenKind::Caret => BinaryOp::Pow,
                _ => return Err(self.error("unexpected infix operator")),
            };

            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_prefix(&mut self) -> Result<Expr, ExprError> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),

            Some(Token::Ident(name)) => {
                if FUNCTIONS.contains(&name.as_str())
                    && self.peek_kind() == Some(TokenKind::LParen)
                {
                    self.advance();
                    let args = self.parse_call_args()?;
                    Ok(Expr::Call {
                        function: name,
                        args,
                    })
                } else {
                    Ok(Expr::Name(name))
                }
            }

            Some(Token::Minus) => {
                let operand = self.parse_expr(BP_UNARY)?;
                Ok(Expr::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(operand),
                })
            }

            // Unary plus is accepted and discarded.
            Some(Token::Plus) => self.parse_expr(BP_UNARY),

            Some(Token::LParen) => {
                let inner = self.parse_expr(0)?;
                self.expect_token_kind(TokenKind::RParen)?;
                Ok(inner)
            }

            Some(other) => Err(self.error(format!(
                "expected an operand, found {:?}",
                token_kind(&other)
            ))),
            None => Err(self.error("expected an operand, found end of input")),
        }
    }

    fn parse_call_args(&mut self) -> Result<Vec<Expr>, ExprError> {
        let mut args = Vec::new();
        if self.peek_kind() == Some(TokenKind::RParen) {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr(0)?);
            match self.advance() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => return Ok(args),
                _ => return Err(self.error("expected ',' or ')' in argument list")),
            }
        }
    }
}

fn infix_bp(kind: TokenKind) -> Option<(u8, u8)> {
    match kind {
        TokenKind::Plus | TokenKind::Minus => Some((BP_ADDITIVE, BP_ADDITIVE + 1)),
        TokenKind::Star | TokenKind::Slash | TokenKind::Percent => {
            Some((BP_MULTIPLICATIVE, BP_MULTIPLICATIVE + 1))
        }
        TokenKind::Caret => Some((BP_POWER, BP_POWER)),
        _ => None,
    }
}

/// Tokens that can begin an operand, for implicit multiplication.
fn starts_operand(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Number | TokenKind::Ident | TokenKind::LParen
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
