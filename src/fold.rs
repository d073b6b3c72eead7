//! Compile-time evaluation of global initializers.

use crate::ast::{BinOp, Expr, ExprPayload, UnOp};
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldError {
    #[error("Cannot assign non constant")]
    NonConstant,
    #[error("Division by zero in constant expression")]
    DivisionByZero,
}

/// Evaluate an expression built only from integer literals and operators.
/// Arithmetic wraps at 64 bits, matching what the generated code computes.
pub fn fold(expr: &Expr) -> Result<i64, FoldError> {
    match &expr.payload {
        ExprPayload::IntLit(value) => Ok(*value),
        ExprPayload::UnOp(x) => {
            let value = fold(&x.expr)?;
            Ok(match x.op {
                UnOp::Neg => value.wrapping_neg(),
                UnOp::Not => (value == 0) as i64,
                UnOp::BitNot => !value,
            })
        }
        ExprPayload::BinOp(x) => {
            let lhs = fold(&x.lhs)?;
            let rhs = fold(&x.rhs)?;
            binop(x.op, lhs, rhs)
        }
        ExprPayload::Name(_)
        | ExprPayload::Call(_)
        | ExprPayload::Assign(_)
        | ExprPayload::Invalid => Err(FoldError::NonConstant),
    }
}

fn binop(op: BinOp, lhs: i64, rhs: i64) -> Result<i64, FoldError> {
    use BinOp::*;
    let value = match op {
        Add => lhs.wrapping_add(rhs),
        Sub => lhs.wrapping_sub(rhs),
        Mul => lhs.wrapping_mul(rhs),
        Div | Mod if rhs == 0 => return Err(FoldError::DivisionByZero),
        Div => lhs.wrapping_div(rhs),
        Mod => lhs.wrapping_rem(rhs),
        Eq => (lhs == rhs) as i64,
        Ne => (lhs != rhs) as i64,
        Lt => (lhs < rhs) as i64,
        Le => (lhs <= rhs) as i64,
        Gt => (lhs > rhs) as i64,
        Ge => (lhs >= rhs) as i64,
        And => (lhs != 0 && rhs != 0) as i64,
        Or => (lhs != 0 || rhs != 0) as i64,
    };
    Ok(value)
}
