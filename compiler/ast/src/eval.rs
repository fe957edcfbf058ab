use std::collections::HashMap;

use thiserror::Error;

use crate::{BinaryOp, Expr, UnaryOp};

#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum EvalErr {
    #[error("variable '{0}' has no binding")]
    Unbound(String),
    #[error("{0} cannot be evaluated")]
    Unsupported(&'static str),
    #[error("division by zero")]
    DivideByZero,
}

pub type EvalResult = Result<f64, EvalErr>;

pub type Bindings = HashMap<String, f64>;

impl Expr {
    /// Evaluate an arithmetic/logical/bitwise expression against a set of variable bindings.
    ///
    /// Results follow the compiled code: every operator works on 32 bit words and wraps on
    /// overflow, comparisons and logical operators give exactly 1 or 0, and division truncates
    /// toward zero.
    pub fn evaluate(&self, bindings: &Bindings) -> EvalResult {
        match self {
            Expr::Constant(val) => Ok(*val as f64),
            Expr::Var(name) => bindings
                .get(name)
                .copied()
                .ok_or_else(|| EvalErr::Unbound(name.clone())),
            Expr::Assignment { .. } => Err(EvalErr::Unsupported("assignment")),
            Expr::FunctionCall { .. } => Err(EvalErr::Unsupported("function call")),
            Expr::Unary { op, operand } => {
                let val = operand.evaluate(bindings)?;

                Ok(match op {
                    UnaryOp::Not => truth(to_word(val) == 0),
                    UnaryOp::BitwiseNot => !to_word(val) as f64,
                })
            }
            Expr::Binary { op, left, right } => {
                let left = left.evaluate(bindings)?;
                let right = right.evaluate(bindings)?;

                eval_binary(*op, left, right)
            }
        }
    }
}

fn eval_binary(op: BinaryOp, left: f64, right: f64) -> EvalResult {
    // everything happens on machine words, so overflow wraps exactly like addu/sub/mult
    let (left, right) = (to_word(left), to_word(right));

    let val = match op {
        BinaryOp::Add => left.wrapping_add(right),
        BinaryOp::Subtract => left.wrapping_sub(right),
        BinaryOp::Multiply => left.wrapping_mul(right),
        BinaryOp::Divide => {
            if right == 0 {
                return Err(EvalErr::DivideByZero);
            }
            left.wrapping_div(right)
        }

        BinaryOp::And => (left != 0 && right != 0) as i32,
        BinaryOp::Or => (left != 0 || right != 0) as i32,
        BinaryOp::Equal => (left == right) as i32,
        BinaryOp::NotEqual => (left != right) as i32,
        BinaryOp::Less => (left < right) as i32,
        BinaryOp::LessEqual => (left <= right) as i32,
        BinaryOp::Greater => (left > right) as i32,
        BinaryOp::GreaterEqual => (left >= right) as i32,

        BinaryOp::BitwiseAnd => left & right,
        BinaryOp::BitwiseOr => left | right,
        BinaryOp::BitwiseXor => left ^ right,
        // shift amounts only use the low five bits, like sllv/srav
        BinaryOp::ShiftLeft => left.wrapping_shl(right as u32),
        BinaryOp::ShiftRight => left.wrapping_shr(right as u32),
    };

    Ok(val as f64)
}

fn truth(cond: bool) -> f64 {
    if cond {
        1.0
    } else {
        0.0
    }
}

/// Truncate to a 32 bit machine word, wrapping like the target does
fn to_word(val: f64) -> i32 {
    val as i64 as i32
}
