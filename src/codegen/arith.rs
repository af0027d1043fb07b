//! Arithmetic operator lowering.
//!
//! The four operators are lowered through a table keyed by the shapes of the two
//! operands. A pair with no entry is a lowering bug, never silently coerced.

use cranelift::prelude::{FunctionBuilder, InstBuilder, Value};

use crate::ast::{ArithOp, Type};
use crate::codegen::emit::TypedValue;
use crate::codegen::error::{CodegenError, CodegenResult};
use crate::codegen::swizzle::VECTOR_TYPE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Int,
    Float,
    Vector,
}

fn shape_of(ty: &Type) -> Option<Shape> {
    match ty {
        Type::Int => Some(Shape::Int),
        Type::Float => Some(Shape::Float),
        Type::Vec2 | Type::Vec3 | Type::Vec4 => Some(Shape::Vector),
        _ => None,
    }
}

type LowerFn = fn(&mut FunctionBuilder, ArithOp, Value, Value) -> Value;

struct ArithRule {
    lhs: Shape,
    rhs: Shape,
    lower: LowerFn,
}

static ARITH_RULES: &[ArithRule] = &[
    ArithRule {
        lhs: Shape::Int,
        rhs: Shape::Int,
        lower: int_op,
    },
    ArithRule {
        lhs: Shape::Float,
        rhs: Shape::Float,
        lower: float_op,
    },
    // f32x4 float ops are lane-wise
    ArithRule {
        lhs: Shape::Vector,
        rhs: Shape::Vector,
        lower: float_op,
    },
    ArithRule {
        lhs: Shape::Vector,
        rhs: Shape::Float,
        lower: vector_scalar_op,
    },
    ArithRule {
        lhs: Shape::Float,
        rhs: Shape::Vector,
        lower: scalar_vector_op,
    },
];

fn int_op(builder: &mut FunctionBuilder, op: ArithOp, lhs: Value, rhs: Value) -> Value {
    match op {
        ArithOp::Add => builder.ins().iadd(lhs, rhs),
        ArithOp::Sub => builder.ins().isub(lhs, rhs),
        ArithOp::Mul => builder.ins().imul(lhs, rhs),
        ArithOp::Div => builder.ins().sdiv(lhs, rhs),
    }
}

fn float_op(builder: &mut FunctionBuilder, op: ArithOp, lhs: Value, rhs: Value) -> Value {
    match op {
        ArithOp::Add => builder.ins().fadd(lhs, rhs),
        ArithOp::Sub => builder.ins().fsub(lhs, rhs),
        ArithOp::Mul => builder.ins().fmul(lhs, rhs),
        ArithOp::Div => builder.ins().fdiv(lhs, rhs),
    }
}

fn vector_scalar_op(builder: &mut FunctionBuilder, op: ArithOp, lhs: Value, rhs: Value) -> Value {
    let rhs = builder.ins().splat(VECTOR_TYPE, rhs);
    float_op(builder, op, lhs, rhs)
}

fn scalar_vector_op(builder: &mut FunctionBuilder, op: ArithOp, lhs: Value, rhs: Value) -> Value {
    let lhs = builder.ins().splat(VECTOR_TYPE, lhs);
    float_op(builder, op, lhs, rhs)
}

pub(crate) fn op_symbol(op: ArithOp) -> &'static str {
    match op {
        ArithOp::Add => "+",
        ArithOp::Sub => "-",
        ArithOp::Mul => "*",
        ArithOp::Div => "/",
    }
}

fn lookup(lhs: &Type, rhs: &Type) -> Option<&'static ArithRule> {
    let (l, r) = (shape_of(lhs)?, shape_of(rhs)?);
    if l == Shape::Vector && r == Shape::Vector && lhs != rhs {
        return None;
    }
    ARITH_RULES.iter().find(|rule| rule.lhs == l && rule.rhs == r)
}

/// Result type of `lhs op rhs`: the vector operand's type if there is one.
fn result_type(lhs: &Type, rhs: &Type) -> Type {
    if rhs.is_vector() { rhs.clone() } else { lhs.clone() }
}

/// Lower `lhs op rhs`, keeping operand order for the non-commutative operators.
pub(crate) fn lower_arith(
    builder: &mut FunctionBuilder,
    op: ArithOp,
    lhs: &TypedValue,
    rhs: &TypedValue,
) -> CodegenResult<TypedValue> {
    let rule = lookup(&lhs.ty, &rhs.ty).ok_or_else(|| CodegenError::UnsupportedOperands {
        op: op_symbol(op),
        lhs: lhs.ty.clone(),
        rhs: rhs.ty.clone(),
    })?;
    let value = (rule.lower)(builder, op, lhs.value, rhs.value);
    Ok(TypedValue::new(value, result_type(&lhs.ty, &rhs.ty)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule_shapes(lhs: &Type, rhs: &Type) -> Option<(Shape, Shape)> {
        lookup(lhs, rhs).map(|rule| (rule.lhs, rule.rhs))
    }

    #[test]
    fn test_scalar_rules() {
        assert_eq!(rule_shapes(&Type::Int, &Type::Int), Some((Shape::Int, Shape::Int)));
        assert_eq!(rule_shapes(&Type::Float, &Type::Float), Some((Shape::Float, Shape::Float)));
    }

    #[test]
    fn test_broadcast_rules_keep_order() {
        assert_eq!(rule_shapes(&Type::Vec3, &Type::Float), Some((Shape::Vector, Shape::Float)));
        assert_eq!(rule_shapes(&Type::Float, &Type::Vec3), Some((Shape::Float, Shape::Vector)));
    }

    #[test]
    fn test_vector_arity_must_match() {
        assert!(lookup(&Type::Vec4, &Type::Vec4).is_some());
        assert!(lookup(&Type::Vec2, &Type::Vec3).is_none());
    }

    #[test]
    fn test_no_implicit_conversions() {
        assert!(lookup(&Type::Int, &Type::Float).is_none());
        assert!(lookup(&Type::Int, &Type::Vec2).is_none());
        assert!(lookup(&Type::Bool, &Type::Bool).is_none());
    }

    #[test]
    fn test_result_type() {
        assert_eq!(result_type(&Type::Float, &Type::Vec2), Type::Vec2);
        assert_eq!(result_type(&Type::Vec4, &Type::Float), Type::Vec4);
        assert_eq!(result_type(&Type::Int, &Type::Int), Type::Int);
    }
}
