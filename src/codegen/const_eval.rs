//! Compile-time evaluation of constant expressions
//!
//! Used for `case` labels and global initializers, the two places where a value
//! has to be known before any code runs.

use crate::ast::{ArithOp, EqOp, Expr, ExprKind, LogicalOp, Name, RelOp, Type, UnaryOp};
use crate::codegen::error::{CodegenError, CodegenResult};

/// A folded constant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstValue {
    Int(i32),
    Float(f32),
    Bool(bool),
}

/// Fold `expr` to a constant, or `None` if it depends on anything known only at run time.
pub fn eval_const_expr(expr: &Expr) -> Option<ConstValue> {
    match &expr.kind {
        ExprKind::IntConstant(val) => Some(ConstValue::Int(*val)),
        ExprKind::FloatConstant(val) => Some(ConstValue::Float(*val)),
        ExprKind::BoolConstant(val) => Some(ConstValue::Bool(*val)),
        ExprKind::Unary(UnaryOp::Plus, operand) => match eval_const_expr(operand)? {
            ConstValue::Bool(_) => None,
            val => Some(val),
        },
        ExprKind::Unary(UnaryOp::Minus, operand) => match eval_const_expr(operand)? {
            ConstValue::Int(val) => Some(ConstValue::Int(val.wrapping_neg())),
            ConstValue::Float(val) => Some(ConstValue::Float(-val)),
            ConstValue::Bool(_) => None,
        },
        ExprKind::Arithmetic(op, lhs, rhs) => {
            let lhs = eval_const_expr(lhs)?;
            let rhs = eval_const_expr(rhs)?;
            fold_arith(*op, lhs, rhs)
        }
        ExprKind::Relational(op, lhs, rhs) => {
            let ordering = compare(eval_const_expr(lhs)?, eval_const_expr(rhs)?)?;
            let result = match op {
                RelOp::Less => ordering.is_lt(),
                RelOp::Greater => ordering.is_gt(),
                RelOp::LessEqual => ordering.is_le(),
                RelOp::GreaterEqual => ordering.is_ge(),
            };
            Some(ConstValue::Bool(result))
        }
        ExprKind::Equality(op, lhs, rhs) => {
            let equal = match (eval_const_expr(lhs)?, eval_const_expr(rhs)?) {
                (ConstValue::Bool(l), ConstValue::Bool(r)) => l == r,
                (l, r) => compare(l, r)?.is_eq(),
            };
            Some(ConstValue::Bool(if *op == EqOp::Equal { equal } else { !equal }))
        }
        ExprKind::Logical(op, lhs, rhs) => {
            let (ConstValue::Bool(l), ConstValue::Bool(r)) = (eval_const_expr(lhs)?, eval_const_expr(rhs)?) else {
                return None;
            };
            Some(ConstValue::Bool(match op {
                LogicalOp::And => l && r,
                LogicalOp::Or => l || r,
            }))
        }
        ExprKind::Conditional(cond, then_expr, else_expr) => match eval_const_expr(cond)? {
            ConstValue::Bool(true) => eval_const_expr(then_expr),
            ConstValue::Bool(false) => eval_const_expr(else_expr),
            _ => None,
        },
        _ => None,
    }
}

fn fold_arith(op: ArithOp, lhs: ConstValue, rhs: ConstValue) -> Option<ConstValue> {
    match (lhs, rhs) {
        (ConstValue::Int(l), ConstValue::Int(r)) => {
            let val = match op {
                ArithOp::Add => l.wrapping_add(r),
                ArithOp::Sub => l.wrapping_sub(r),
                ArithOp::Mul => l.wrapping_mul(r),
                // division by zero is left for run time
                ArithOp::Div => l.checked_div(r)?,
            };
            Some(ConstValue::Int(val))
        }
        (ConstValue::Float(l), ConstValue::Float(r)) => {
            let val = match op {
                ArithOp::Add => l + r,
                ArithOp::Sub => l - r,
                ArithOp::Mul => l * r,
                ArithOp::Div => l / r,
            };
            Some(ConstValue::Float(val))
        }
        _ => None,
    }
}

fn compare(lhs: ConstValue, rhs: ConstValue) -> Option<std::cmp::Ordering> {
    match (lhs, rhs) {
        (ConstValue::Int(l), ConstValue::Int(r)) => Some(l.cmp(&r)),
        (ConstValue::Float(l), ConstValue::Float(r)) => l.partial_cmp(&r),
        _ => None,
    }
}

/// Value of a `case` label.
pub(crate) fn case_label(label: &Expr) -> CodegenResult<i32> {
    match eval_const_expr(label) {
        Some(ConstValue::Int(val)) => Ok(val),
        _ => Err(CodegenError::NonConstantCaseLabel),
    }
}

/// Little-endian image of a global's initial value.
pub(crate) fn initializer_bytes(name: Name, init: &Expr, ty: &Type) -> CodegenResult<Vec<u8>> {
    let bytes = match (ty, eval_const_expr(init)) {
        (Type::Int, Some(ConstValue::Int(val))) => val.to_le_bytes().to_vec(),
        (Type::Float, Some(ConstValue::Float(val))) => val.to_le_bytes().to_vec(),
        (Type::Bool, Some(ConstValue::Bool(val))) => vec![val as u8],
        _ => return Err(CodegenError::NonConstantInitializer(name)),
    };
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_negative_label() {
        let label = Expr::unary(UnaryOp::Minus, Expr::int(1));
        assert_eq!(case_label(&label).unwrap(), -1);
    }

    #[test]
    fn test_fold_arithmetic_label() {
        let label = Expr::arith(ArithOp::Add, Expr::int(2), Expr::int(3));
        assert_eq!(case_label(&label).unwrap(), 5);
    }

    #[test]
    fn test_variable_label_is_rejected() {
        let label = Expr::var("n", Type::Int);
        assert!(matches!(case_label(&label), Err(CodegenError::NonConstantCaseLabel)));
    }

    #[test]
    fn test_float_label_is_rejected() {
        assert!(matches!(case_label(&Expr::float(1.0)), Err(CodegenError::NonConstantCaseLabel)));
    }

    #[test]
    fn test_division_by_zero_does_not_fold() {
        let expr = Expr::arith(ArithOp::Div, Expr::int(1), Expr::int(0));
        assert_eq!(eval_const_expr(&expr), None);
    }

    #[test]
    fn test_comparisons_fold_to_bool() {
        let expr = Expr::relational(RelOp::Less, Expr::float(1.0), Expr::float(2.5));
        assert_eq!(eval_const_expr(&expr), Some(ConstValue::Bool(true)));
        let expr = Expr::equality(EqOp::NotEqual, Expr::bool(true), Expr::bool(true));
        assert_eq!(eval_const_expr(&expr), Some(ConstValue::Bool(false)));
    }

    #[test]
    fn test_initializer_bytes() {
        let name = Name::from("g");
        let init = Expr::arith(ArithOp::Mul, Expr::int(6), Expr::int(7));
        assert_eq!(initializer_bytes(name, &init, &Type::Int).unwrap(), 42i32.to_le_bytes().to_vec());
        let init = Expr::unary(UnaryOp::Minus, Expr::float(0.5));
        assert_eq!(initializer_bytes(name, &init, &Type::Float).unwrap(), (-0.5f32).to_le_bytes().to_vec());
        assert_eq!(initializer_bytes(name, &Expr::bool(true), &Type::Bool).unwrap(), vec![1]);
    }

    #[test]
    fn test_initializer_reading_a_variable_is_rejected() {
        let name = Name::from("g");
        let init = Expr::arith(ArithOp::Add, Expr::var("h", Type::Int), Expr::int(1));
        assert!(matches!(
            initializer_bytes(name, &init, &Type::Int),
            Err(CodegenError::NonConstantInitializer(_))
        ));
    }
}
