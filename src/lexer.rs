//! Hand-written scanner for Patito source text.

use crate::position::Position;
use crate::token::{keyword_or_ident, Token, TokenKind};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum LexError {
    UnterminatedString(Position),
    UnexpectedChar(char, Position),
    MalformedNumber(String, Position),
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexError::UnterminatedString(pos) => {
                write!(f, "{pos}: unterminated string literal")
            }
            LexError::UnexpectedChar(c, pos) => {
                write!(f, "{pos}: unexpected character '{c}'")
            }
            LexError::MalformedNumber(text, pos) => {
                write!(f, "{pos}: malformed number literal '{text}'")
            }
        }
    }
}

impl std::error::Error for LexError {}

pub struct Lexer<'a> {
    source: &'a [u8],
    pos: usize,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer {
            source: source.as_bytes(),
            pos: 0,
            line: 0,
            column: 0,
        }
    }

    /// Scans the entire source into a token stream, always terminated by `Eof`.
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            let start = self.current_position();
            let Some(c) = self.peek() else {
                tokens.push(Token::new(TokenKind::Eof, start));
                break;
            };

            let kind = if c.is_ascii_digit() {
                self.scan_number(start)?
            } else if c == '"' {
                self.scan_string(start)?
            } else if c.is_ascii_alphabetic() || c == '_' {
                self.scan_ident()
            } else {
                self.scan_symbol(c, start)?
            };

            tokens.push(Token::new(kind, start));
        }
        Ok(tokens)
    }

    fn current_position(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn peek(&self) -> Option<char> {
        self.source.get(self.pos).map(|&b| b as char)
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.source.get(self.pos + offset).map(|&b| b as char)
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn scan_number(&mut self, start: Position) -> Result<TokenKind, LexError> {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            text.push('.');
            self.advance();
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    text.push(c);
                    self.advance();
                } else {
                    break;
                }
            }
            let value: f64 = text
                .parse()
                .map_err(|_| LexError::MalformedNumber(text.clone(), start))?;
            Ok(TokenKind::FloatLiteral(value))
        } else {
            let value: i64 = text
                .parse()
                .map_err(|_| LexError::MalformedNumber(text.clone(), start))?;
            Ok(TokenKind::IntLiteral(value))
        }
    }

    fn scan_string(&mut self, start: Position) -> Result<TokenKind, LexError> {
        self.advance(); // opening quote
        let mut text = String::new();
        loop {
            match self.advance() {
                None | Some('\n') => return Err(LexError::UnterminatedString(start)),
                Some('"') => break,
                Some('\\') => match self.advance() {
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some('"') => text.push('"'),
                    Some('\\') => text.push('\\'),
                    Some(other) => text.push(other),
                    None => return Err(LexError::UnterminatedString(start)),
                },
                Some(c) => text.push(c),
            }
        }
        Ok(TokenKind::StringLiteral(text))
    }

    fn scan_ident(&mut self) -> TokenKind {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }
        keyword_or_ident(&text)
    }

    fn scan_symbol(&mut self, c: char, pos: Position) -> Result<TokenKind, LexError> {
        self.advance();
        let kind = match c {
            ';' => TokenKind::Semicolon,
            ':' => TokenKind::Colon,
            ',' => TokenKind::Comma,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '>' => TokenKind::Gt,
            '<' => TokenKind::Lt,
            '=' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::Eq
                } else {
                    TokenKind::Assign
                }
            }
            '!' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::Neq
                } else {
                    return Err(LexError::UnexpectedChar(c, pos));
                }
            }
            _ => return Err(LexError::UnexpectedChar(c, pos)),
        };
        Ok(kind)
    }
}
