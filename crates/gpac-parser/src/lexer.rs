//! Lexer for the circuit specification format.

use crate::error::{Error, Result};

/// Token types for circuit files.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identifier or keyword (`Circuit`, `int`, `d`, `max`, `select` are
    /// recognized contextually by the parser).
    Ident(String),
    /// Numeric literal. Negative values are produced by the parser from a
    /// `-` token followed by a literal.
    Value(f64),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Colon,
    Semicolon,
    Comma,
    Pipe,
    Equals,
    Plus,
    Minus,
    Star,
    Slash,
    At,
    Eof,
}

/// A token with its source location.
#[derive(Debug, Clone)]
pub struct SpannedToken {
    pub token: Token,
    pub line: usize,
    pub column: usize,
}

/// Lexer for circuit specification files.
pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    /// Tokenize the whole input, ending with an `Eof` token.
    pub fn tokenize(mut self) -> Result<Vec<SpannedToken>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.token == Token::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(&c) = self.chars.peek() {
            if c == '#' {
                // comment to end of line
                while let Some(&c) = self.chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.advance();
                }
            } else if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn next_token(&mut self) -> Result<SpannedToken> {
        self.skip_whitespace_and_comments();
        let line = self.line;
        let column = self.column;
        let spanned = |token| SpannedToken {
            token,
            line,
            column,
        };

        let Some(&c) = self.chars.peek() else {
            return Ok(spanned(Token::Eof));
        };

        let simple = match c {
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            '[' => Some(Token::LBracket),
            ']' => Some(Token::RBracket),
            ':' => Some(Token::Colon),
            ';' => Some(Token::Semicolon),
            ',' => Some(Token::Comma),
            '|' => Some(Token::Pipe),
            '=' => Some(Token::Equals),
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '*' => Some(Token::Star),
            '/' => Some(Token::Slash),
            '@' => Some(Token::At),
            _ => None,
        };
        if let Some(token) = simple {
            self.advance();
            return Ok(spanned(token));
        }

        if c.is_ascii_digit() || c == '.' {
            let literal = self.read_number();
            return match literal.parse::<f64>() {
                Ok(v) => Ok(spanned(Token::Value(v))),
                Err(_) => Err(Error::LexError {
                    line,
                    column,
                    message: format!("invalid numeric literal {:?}", literal),
                }),
            };
        }

        if c.is_ascii_alphabetic() || c == '_' {
            let ident = self.read_identifier();
            return Ok(spanned(Token::Ident(ident)));
        }

        Err(Error::LexError {
            line,
            column,
            message: format!("unexpected character {:?}", c),
        })
    }

    fn read_number(&mut self) -> String {
        let mut literal = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_digit() || c == '.' {
                literal.push(c);
                self.advance();
            } else if c == 'e' || c == 'E' {
                // exponent, optionally signed
                let mut lookahead = self.chars.clone();
                lookahead.next();
                match lookahead.peek() {
                    Some(&n) if n.is_ascii_digit() || n == '+' || n == '-' => {
                        literal.push(c);
                        self.advance();
                        if let Some(&sign) = self.chars.peek() {
                            if sign == '+' || sign == '-' {
                                literal.push(sign);
                                self.advance();
                            }
                        }
                    }
                    _ => break,
                }
            } else {
                break;
            }
        }
        literal
    }

    fn read_identifier(&mut self) -> String {
        let mut ident = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                ident.push(c);
                self.advance();
            } else {
                break;
            }
        }
        ident
    }
}
