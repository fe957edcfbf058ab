use std::str::Chars;

use thiserror::Error;

#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum LexError {
    #[error("unexpected character")]
    UnexpectedChar,
    #[error("invalid identifier")]
    InvalidIdentifier,
    #[error("integer constant does not fit in 32 bits")]
    ConstantOutOfRange,
    #[error("unterminated comment")]
    UnterminatedComment,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenType,
    pub start: usize,
    pub end: usize,
    pub value: TokenValue,
    pub line: i32,
    pub col: i32,
}

impl Token {
    fn new(
        kind: TokenType,
        start: usize,
        end: usize,
        value: TokenValue,
        line: i32,
        col: i32,
    ) -> Self {
        Self {
            kind,
            start,
            end,
            value,
            line,
            col,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.value, TokenValue::Error(_))
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum TokenValue {
    None,
    Integer(i32),
    Ident(String),
    Error(LexError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenType {
    // Single-character tokens
    OpenParen,
    CloseParen,
    OpenBrace,
    CloseBrace,
    Semicolon,
    Comma,
    Tilde,
    Plus,
    Minus,
    Star,
    Slash,
    Xor,

    // One or two character tokens
    Bang,
    BangEqual,
    Equal,
    EqualEqual,
    Amp,
    AmpAmp,
    Pipe,
    PipePipe,
    Less,
    LessEqual,
    LessLess,
    Greater,
    GreaterEqual,
    GreaterGreater,

    // Literals
    Identifier,
    Constant,

    // Keywords
    Int,
    Void,
    If,
    Else,
    While,
    Return,

    // Informational
    Whitespace,
    Comment,
    Eof,
    InvalidIdent,
    Unknown,
}

const EOF: char = '\0';

pub struct Lexer<'a> {
    /// Source Text
    source: &'a str,

    /// Remaining source characters
    chars: Chars<'a>,
    line: i32,
    col: i32,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars(),
            line: 1,
            col: 1,
        }
    }

    /// Every token up to end of file, with whitespace and comments dropped.
    /// Problems are reported in-band as tokens carrying a `TokenValue::Error`.
    /// The lexer moves into the iterator, which only borrows the source text.
    pub fn tokenize(mut self) -> impl Iterator<Item = Token> + 'a {
        std::iter::from_fn(move || {
            let token = self.scan_token();
            if token.kind != TokenType::Eof {
                Some(token)
            } else {
                None
            }
        })
        .filter(|t| t.is_error() || !matches!(t.kind, TokenType::Whitespace | TokenType::Comment))
    }

    fn scan_token(&mut self) -> Token {
        let start = self.offset();
        let line = self.line;
        let col = self.col;

        let c = match self.advance() {
            Some(c) => c,
            None => {
                return Token::new(
                    TokenType::Eof,
                    start,
                    self.offset(),
                    TokenValue::None,
                    self.line,
                    self.col,
                )
            }
        };

        let mut error = None;

        let token_type = match c {
            '(' => TokenType::OpenParen,
            ')' => TokenType::CloseParen,
            '{' => TokenType::OpenBrace,
            '}' => TokenType::CloseBrace,
            ';' => TokenType::Semicolon,
            ',' => TokenType::Comma,
            '~' => TokenType::Tilde,
            '+' => TokenType::Plus,
            '-' => TokenType::Minus,
            '*' => TokenType::Star,
            '^' => TokenType::Xor,
            '/' => match self.peek() {
                '/' => {
                    self.line_comment();
                    TokenType::Comment
                }
                '*' => {
                    self.advance();
                    if !self.block_comment() {
                        error = Some(LexError::UnterminatedComment);
                    }
                    TokenType::Comment
                }
                _ => TokenType::Slash,
            },
            '!' => self.either('=', TokenType::BangEqual, TokenType::Bang),
            '=' => self.either('=', TokenType::EqualEqual, TokenType::Equal),
            '&' => self.either('&', TokenType::AmpAmp, TokenType::Amp),
            '|' => self.either('|', TokenType::PipePipe, TokenType::Pipe),
            '<' => match self.peek() {
                '<' => {
                    self.advance();
                    TokenType::LessLess
                }
                '=' => {
                    self.advance();
                    TokenType::LessEqual
                }
                _ => TokenType::Less,
            },
            '>' => match self.peek() {
                '>' => {
                    self.advance();
                    TokenType::GreaterGreater
                }
                '=' => {
                    self.advance();
                    TokenType::GreaterEqual
                }
                _ => TokenType::Greater,
            },
            '0'..='9' => self.number(),
            'a'..='z' | 'A'..='Z' | '_' => self.identifier(start),
            ' ' | '\r' | '\t' => TokenType::Whitespace,
            '\n' => {
                self.new_line();
                TokenType::Whitespace
            }
            _ => TokenType::Unknown,
        };

        let end = self.offset();

        let token_value = match token_type {
            TokenType::Constant => match self.source[start..end].parse::<i32>() {
                Ok(val) => TokenValue::Integer(val),
                Err(_) => TokenValue::Error(LexError::ConstantOutOfRange),
            },
            TokenType::Identifier => TokenValue::Ident(self.source[start..end].to_string()),
            TokenType::Unknown => TokenValue::Error(LexError::UnexpectedChar),
            TokenType::InvalidIdent => TokenValue::Error(LexError::InvalidIdentifier),
            _ => match error {
                Some(err) => TokenValue::Error(err),
                None => TokenValue::None,
            },
        };

        Token::new(token_type, start, end, token_value, line, col)
    }

    /// Consume `next` if it follows, picking between the two and one character forms
    fn either(&mut self, next: char, double: TokenType, single: TokenType) -> TokenType {
        if self.peek() == next {
            self.advance();
            double
        } else {
            single
        }
    }

    fn number(&mut self) -> TokenType {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        // digits running straight into letters, e.g. `1foo`
        if self.peek().is_alphabetic() || self.peek() == '_' {
            while self.peek().is_alphanumeric() || self.peek() == '_' {
                self.advance();
            }
            return TokenType::InvalidIdent;
        }

        TokenType::Constant
    }

    fn identifier(&mut self, start: usize) -> TokenType {
        while self.peek().is_alphanumeric() || self.peek() == '_' {
            self.advance();
        }

        match &self.source[start..self.offset()] {
            "int" => TokenType::Int,
            "void" => TokenType::Void,
            "if" => TokenType::If,
            "else" => TokenType::Else,
            "while" => TokenType::While,
            "return" => TokenType::Return,
            _ => TokenType::Identifier,
        }
    }

    fn line_comment(&mut self) {
        while self.peek() != '\n' && self.advance().is_some() {}
    }

    /// Skip to the closing `*/`; false if the file ends first
    fn block_comment(&mut self) -> bool {
        while let Some(c) = self.advance() {
            match c {
                '*' if self.peek() == '/' => {
                    self.advance();
                    return true;
                }
                '\n' => self.new_line(),
                _ => {}
            }
        }

        false
    }

    fn new_line(&mut self) {
        self.line += 1;
        self.col = 1;
    }

    /// Get offset into source text
    fn offset(&self) -> usize {
        self.source.len() - self.chars.as_str().len()
    }

    fn peek(&self) -> char {
        self.chars.clone().next().unwrap_or(EOF)
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.col += 1;

        Some(c)
    }
}
