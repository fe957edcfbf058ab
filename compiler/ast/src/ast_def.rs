use std::fmt::{Display, Formatter};

/// Defines AST datatypes

#[derive(Debug, Eq, PartialEq, Clone)]
pub struct TranslationUnit {
    pub decls: Vec<Decl>,
}

#[derive(Debug, Eq, PartialEq, Clone)]
pub enum Decl {
    Func(FuncDecl),
    Var(VarDecl),
}

#[derive(Debug, Eq, PartialEq, Clone)]
pub struct FuncDecl {
    pub name: String,
    pub params: Vec<String>,
    pub body: Block,
}

#[derive(Debug, Eq, PartialEq, Clone)]
pub struct VarDecl {
    pub name: String,
    pub init: Option<Expr>,
}

#[derive(Debug, Eq, PartialEq, Clone, Default)]
pub struct Block {
    pub items: Vec<BlockItem>,
}

#[derive(Debug, Eq, PartialEq, Clone)]
pub enum BlockItem {
    S(Stmt),
    D(VarDecl),
}

#[derive(Debug, Eq, PartialEq, Clone)]
pub enum Stmt {
    Expression {
        expr: Expr,
    },
    Return {
        expr: Expr,
    },
    If {
        condition: Expr,
        then: Box<Stmt>,
        otherwise: Option<Box<Stmt>>,
    },
    While {
        condition: Expr,
        body: Box<Stmt>,
    },
    Compound {
        block: Block,
    },
    Null,
}

#[derive(Debug, Eq, PartialEq, Clone)]
pub enum Expr {
    Constant(i32),
    Var(String),
    Assignment {
        target: String,
        value: Box<Expr>,
    },
    FunctionCall {
        name: String,
        args: Vec<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
}

impl Expr {
    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn assign<S: Into<String>>(target: S, value: Expr) -> Self {
        Expr::Assignment {
            target: target.into(),
            value: Box::new(value),
        }
    }

    pub fn var<S: Into<String>>(name: S) -> Self {
        Expr::Var(name.into())
    }
}

#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum UnaryOp {
    Not,
    BitwiseNot,
}

#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,

    // Logical and Relational Operators
    And,
    Or,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,

    // Bitwise Operators
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    ShiftLeft,
    ShiftRight,
}

/// C spelling of the operator
impl Display for BinaryOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let op = match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::BitwiseAnd => "&",
            BinaryOp::BitwiseOr => "|",
            BinaryOp::BitwiseXor => "^",
            BinaryOp::ShiftLeft => "<<",
            BinaryOp::ShiftRight => ">>",
        };

        write!(f, "{}", op)
    }
}

impl Display for UnaryOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            UnaryOp::Not => write!(f, "!"),
            UnaryOp::BitwiseNot => write!(f, "~"),
        }
    }
}
