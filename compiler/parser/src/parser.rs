use std::fmt::{Display, Formatter};
use std::iter::Peekable;

use itertools::Itertools;
use thiserror::Error;

use ast::*;
use lexer::*;

#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub struct ParseError {
    message: String,
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl ParseError {
    fn new(message: String) -> Self {
        Self { message }
    }

    fn unexpected(expected: &str, found: Option<&Token>) -> Self {
        match found {
            Some(t) => Self::new(format!(
                "Expected {}, but found {:?} at {}:{}",
                expected, t.kind, t.line, t.col
            )),
            None => Self::new(format!(
                "Expected {}, but found end of file instead",
                expected
            )),
        }
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

macro_rules! match_token_types {
    ($( $token:pat ),+ ) => {
        $(
        Some(Token{ kind: $token, ..})
        )|+
    };
}

pub struct Parser {
    tokens: Peekable<std::vec::IntoIter<Token>>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens: tokens.into_iter().peekable(),
        }
    }

    pub fn parse(&mut self) -> ParseResult<TranslationUnit> {
        let mut decls = vec![];

        while self.tokens.peek().is_some() {
            decls.push(self.parse_top_level()?);
        }

        self.expect_empty()?;
        Ok(TranslationUnit { decls })
    }

    /// `int name` followed by either a parameter list or a global initializer
    fn parse_top_level(&mut self) -> ParseResult<Decl> {
        self.expect(TokenType::Int)?;
        let name = self.parse_ident()?;

        match self.tokens.peek() {
            match_token_types!(TokenType::OpenParen) => Ok(Decl::Func(self.parse_func(name)?)),
            _ => Ok(Decl::Var(self.parse_var_rest(name)?)),
        }
    }

    fn parse_func(&mut self, name: String) -> ParseResult<FuncDecl> {
        self.expect(TokenType::OpenParen)?;
        let params = self.parse_params()?;
        self.expect(TokenType::CloseParen)?;

        let body = self.parse_block()?;

        Ok(FuncDecl { name, params, body })
    }

    fn parse_params(&mut self) -> ParseResult<Vec<String>> {
        match self.tokens.peek() {
            match_token_types!(TokenType::Void) => {
                self.tokens.next();
                Ok(vec![])
            }
            match_token_types!(TokenType::CloseParen) => Ok(vec![]),
            _ => {
                let mut params = vec![];

                loop {
                    self.expect(TokenType::Int)?;
                    params.push(self.parse_ident()?);

                    match self.tokens.peek() {
                        match_token_types!(TokenType::Comma) => {
                            self.tokens.next();
                        }
                        _ => break,
                    }
                }

                Ok(params)
            }
        }
    }

    fn parse_block(&mut self) -> ParseResult<Block> {
        self.expect(TokenType::OpenBrace)?;

        let mut items = vec![];

        while self
            .tokens
            .peek()
            .is_some_and(|t| t.kind != TokenType::CloseBrace)
        {
            items.push(self.parse_block_item()?);
        }

        self.expect(TokenType::CloseBrace)?;

        Ok(Block { items })
    }

    fn parse_block_item(&mut self) -> ParseResult<BlockItem> {
        match self.tokens.peek() {
            match_token_types!(TokenType::Int) => Ok(BlockItem::D(self.parse_decl()?)),
            Some(_) => Ok(BlockItem::S(self.parse_stmt()?)),
            None => Err(ParseError::unexpected("a block item", None)),
        }
    }

    fn parse_decl(&mut self) -> ParseResult<VarDecl> {
        self.expect(TokenType::Int)?;
        let name = self.parse_ident()?;
        self.parse_var_rest(name)
    }

    fn parse_var_rest(&mut self, name: String) -> ParseResult<VarDecl> {
        let init = match self.tokens.peek() {
            match_token_types!(TokenType::Equal) => {
                self.tokens.next();
                Some(self.parse_expr(0)?)
            }
            match_token_types!(TokenType::Semicolon) => None,
            t => {
                return Err(ParseError::unexpected(
                    &expected_any(&[TokenType::Equal, TokenType::Semicolon]),
                    t,
                ))
            }
        };

        self.expect(TokenType::Semicolon)?;

        Ok(VarDecl { name, init })
    }

    fn parse_ident(&mut self) -> ParseResult<String> {
        match self.tokens.next() {
            Some(Token {
                kind: TokenType::Identifier,
                value: TokenValue::Ident(ident),
                ..
            }) => Ok(ident),
            t => Err(ParseError::unexpected("an identifier", t.as_ref())),
        }
    }

    fn parse_stmt(&mut self) -> ParseResult<Stmt> {
        match self.tokens.peek() {
            match_token_types!(TokenType::Return) => {
                self.tokens.next();
                let expr = self.parse_expr(0)?;
                self.expect(TokenType::Semicolon)?;

                Ok(Stmt::Return { expr })
            }
            match_token_types!(TokenType::If) => {
                self.tokens.next();
                let condition = self.parse_condition()?;
                let then = Box::new(self.parse_stmt()?);

                // a dangling else binds to the nearest if
                let otherwise = match self.tokens.peek() {
                    match_token_types!(TokenType::Else) => {
                        self.tokens.next();
                        Some(Box::new(self.parse_stmt()?))
                    }
                    _ => None,
                };

                Ok(Stmt::If {
                    condition,
                    then,
                    otherwise,
                })
            }
            match_token_types!(TokenType::While) => {
                self.tokens.next();
                let condition = self.parse_condition()?;
                let body = Box::new(self.parse_stmt()?);

                Ok(Stmt::While { condition, body })
            }
            match_token_types!(TokenType::OpenBrace) => Ok(Stmt::Compound {
                block: self.parse_block()?,
            }),
            match_token_types!(TokenType::Semicolon) => {
                self.tokens.next();
                Ok(Stmt::Null)
            }
            _ => {
                let expr = self.parse_expr(0)?;
                self.expect(TokenType::Semicolon)?;
                Ok(Stmt::Expression { expr })
            }
        }
    }

    fn parse_condition(&mut self) -> ParseResult<Expr> {
        self.expect(TokenType::OpenParen)?;
        let condition = self.parse_expr(0)?;
        self.expect(TokenType::CloseParen)?;
        Ok(condition)
    }

    /// Precedence climbing; only operators binding at least as tight as `min_prec` are consumed
    pub fn parse_expr(&mut self, min_prec: i32) -> ParseResult<Expr> {
        let mut left = self.parse_factor()?;

        while let Some(next) = self.tokens.peek() {
            let Some(prec) = get_precedence(next.kind) else {
                break;
            };

            if prec < min_prec {
                break;
            }

            if next.kind == TokenType::Equal {
                let target = match left {
                    Expr::Var(name) => name,
                    other => {
                        return Err(ParseError::new(format!(
                            "Invalid assignment target: {:?}",
                            other
                        )))
                    }
                };

                self.tokens.next();
                // right associative
                let value = self.parse_expr(prec)?;
                left = Expr::assign(target, value);
            } else {
                let op = self.parse_binop()?;
                let right = self.parse_expr(prec + 1)?;
                left = Expr::binary(op, left, right);
            }
        }

        Ok(left)
    }

    fn parse_factor(&mut self) -> ParseResult<Expr> {
        match self.tokens.peek() {
            match_token_types!(TokenType::Minus) => {
                self.tokens.next();
                let operand = self.parse_factor()?;

                Ok(Expr::binary(
                    BinaryOp::Subtract,
                    Expr::Constant(0),
                    operand,
                ))
            }
            match_token_types!(TokenType::Bang, TokenType::Tilde) => {
                let op = self.parse_unop()?;
                let operand = self.parse_factor()?;

                Ok(Expr::unary(op, operand))
            }
            _ => self.parse_primary_expr(),
        }
    }

    fn parse_primary_expr(&mut self) -> ParseResult<Expr> {
        match self.tokens.next() {
            Some(Token {
                kind: TokenType::OpenParen,
                ..
            }) => {
                let expr = self.parse_expr(0)?;
                self.expect(TokenType::CloseParen)?;

                Ok(expr)
            }
            Some(Token {
                kind: TokenType::Constant,
                value: TokenValue::Integer(val),
                ..
            }) => Ok(Expr::Constant(val)),
            Some(Token {
                kind: TokenType::Identifier,
                value: TokenValue::Ident(name),
                ..
            }) => match self.tokens.peek() {
                match_token_types!(TokenType::OpenParen) => {
                    self.tokens.next();
                    let args = self.parse_args()?;
                    self.expect(TokenType::CloseParen)?;

                    Ok(Expr::FunctionCall { name, args })
                }
                _ => Ok(Expr::Var(name)),
            },
            t => Err(ParseError::unexpected("a factor", t.as_ref())),
        }
    }

    fn parse_args(&mut self) -> ParseResult<Vec<Expr>> {
        let mut args = vec![];

        if let match_token_types!(TokenType::CloseParen) = self.tokens.peek() {
            return Ok(args);
        }

        loop {
            args.push(self.parse_expr(0)?);

            match self.tokens.peek() {
                match_token_types!(TokenType::Comma) => {
                    self.tokens.next();
                }
                _ => return Ok(args),
            }
        }
    }

    fn parse_unop(&mut self) -> ParseResult<UnaryOp> {
        match self.tokens.next() {
            match_token_types!(TokenType::Bang) => Ok(UnaryOp::Not),
            match_token_types!(TokenType::Tilde) => Ok(UnaryOp::BitwiseNot),
            t => Err(ParseError::unexpected("a unary operator", t.as_ref())),
        }
    }

    fn parse_binop(&mut self) -> ParseResult<BinaryOp> {
        let t = self.tokens.next();

        let op = match t.as_ref().map(|t| t.kind) {
            Some(TokenType::Plus) => BinaryOp::Add,
            Some(TokenType::Minus) => BinaryOp::Subtract,
            Some(TokenType::Star) => BinaryOp::Multiply,
            Some(TokenType::Slash) => BinaryOp::Divide,

            Some(TokenType::Less) => BinaryOp::Less,
            Some(TokenType::LessEqual) => BinaryOp::LessEqual,
            Some(TokenType::Greater) => BinaryOp::Greater,
            Some(TokenType::GreaterEqual) => BinaryOp::GreaterEqual,
            Some(TokenType::EqualEqual) => BinaryOp::Equal,
            Some(TokenType::BangEqual) => BinaryOp::NotEqual,
            Some(TokenType::AmpAmp) => BinaryOp::And,
            Some(TokenType::PipePipe) => BinaryOp::Or,

            // Bitwise
            Some(TokenType::Amp) => BinaryOp::BitwiseAnd,
            Some(TokenType::Pipe) => BinaryOp::BitwiseOr,
            Some(TokenType::Xor) => BinaryOp::BitwiseXor,
            Some(TokenType::LessLess) => BinaryOp::ShiftLeft,
            Some(TokenType::GreaterGreater) => BinaryOp::ShiftRight,

            _ => return Err(ParseError::unexpected("a binary operator", t.as_ref())),
        };

        Ok(op)
    }

    /// Checks if next token is of correct expected type
    fn expect(&mut self, expected: TokenType) -> ParseResult<Token> {
        match self.tokens.next() {
            Some(t) if t.kind == expected => Ok(t),
            t => Err(ParseError::unexpected(&format!("{:?}", expected), t.as_ref())),
        }
    }

    fn expect_empty(&mut self) -> ParseResult<()> {
        match self.tokens.next() {
            Some(t) => Err(ParseError::unexpected("end of file", Some(&t))),
            None => Ok(()),
        }
    }
}

fn expected_any(kinds: &[TokenType]) -> String {
    kinds.iter().map(|kind| format!("{:?}", kind)).join(" or ")
}

fn get_precedence(token: TokenType) -> Option<i32> {
    match token {
        TokenType::Star | TokenType::Slash => Some(50),
        TokenType::Plus | TokenType::Minus => Some(45),
        TokenType::LessLess | TokenType::GreaterGreater => Some(40),
        TokenType::Less | TokenType::LessEqual | TokenType::Greater | TokenType::GreaterEqual => {
            Some(35)
        }
        TokenType::EqualEqual | TokenType::BangEqual => Some(30),
        TokenType::Amp => Some(25),
        TokenType::Xor => Some(20),
        TokenType::Pipe => Some(15),
        TokenType::AmpAmp => Some(10),
        TokenType::PipePipe => Some(5),
        TokenType::Equal => Some(1),
        _ => None,
    }
}
