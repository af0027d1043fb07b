//! The emission protocol shared by every AST node.
//!
//! Statements and declarations emit side effects only. Expressions yield an
//! [`Emitted`] value whose classification says how it may be used: only
//! [`Emitted::RValue`] is a ready operand, everything else has to be
//! materialized through the lowering context first.

use cranelift::prelude::Value;
use log::trace;

use crate::ast::{Decl, Expr, Program, Stmt, Type};
use crate::codegen::CodeGen;
use crate::codegen::context::FunctionLowering;
use crate::codegen::error::{CodegenError, CodegenResult};
use crate::codegen::swizzle::Lanes;
use crate::codegen::symtab::element_type_of;

/// A backend value together with its source type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedValue {
    pub value: Value,
    pub ty: Type,
}

impl TypedValue {
    pub fn new(value: Value, ty: Type) -> Self {
        TypedValue { value, ty }
    }
}

/// A storage cell: the address of a variable, global or array element.
#[derive(Debug, Clone, PartialEq)]
pub struct Place {
    pub addr: Value,
    pub ty: Type,
}

/// Lanes selected out of a vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Swizzle {
    /// The base vector, already loaded.
    pub vector: TypedValue,
    pub lanes: Lanes,
    /// Where the base vector lives, if it lives anywhere. Only swizzles of
    /// storage can be assigned to.
    pub target: Option<Place>,
}

/// Classification of everything an expression can produce.
#[derive(Debug, Clone, PartialEq)]
pub enum Emitted {
    /// Result of a call to a `void` function.
    Void,
    RValue(TypedValue),
    Address(Place),
    /// Single-lane swizzle, a scalar once materialized.
    SwizzleExtract(Swizzle),
    /// Multi-lane swizzle, a vector once materialized.
    SwizzleShuffle(Swizzle),
}

impl Emitted {
    pub fn rvalue(value: Value, ty: Type) -> Self {
        Emitted::RValue(TypedValue::new(value, ty))
    }
}

/// Uniform entry point for lowering an AST node.
///
/// `Cx` is the module-level [`CodeGen`] for programs and declarations, and the
/// per-function [`FunctionLowering`] for statements and expressions. Emission
/// appends instructions, so each node must be emitted exactly once.
pub trait Emit<Cx> {
    type Output;

    fn emit(&self, cx: &mut Cx) -> CodegenResult<Self::Output>;
}

impl Emit<CodeGen> for Program {
    type Output = ();

    fn emit(&self, cx: &mut CodeGen) -> CodegenResult<()> {
        for decl in &self.decls {
            decl.emit(cx)?;
        }
        Ok(())
    }
}

impl Emit<CodeGen> for Decl {
    type Output = ();

    fn emit(&self, cx: &mut CodeGen) -> CodegenResult<()> {
        match self {
            Decl::Var(var) => cx.emit_global(var),
            Decl::Fn(func) => cx.emit_function(func),
        }
    }
}

impl Emit<FunctionLowering<'_, '_>> for Stmt {
    type Output = ();

    fn emit(&self, cx: &mut FunctionLowering<'_, '_>) -> CodegenResult<()> {
        cx.lower_stmt(self)
    }
}

impl Emit<FunctionLowering<'_, '_>> for Expr {
    type Output = Emitted;

    fn emit(&self, cx: &mut FunctionLowering<'_, '_>) -> CodegenResult<Emitted> {
        let emitted = cx.lower_expr(self)?;
        let found = element_type_of(&emitted);
        if found != self.ty {
            return Err(CodegenError::TypeDivergence {
                expected: self.ty.clone(),
                found,
            });
        }
        trace!("emitted {} as {}", self.kind_name(), found);
        Ok(emitted)
    }
}

impl Expr {
    /// Short label for logging.
    fn kind_name(&self) -> &'static str {
        use crate::ast::ExprKind::*;
        match &self.kind {
            IntConstant(_) | FloatConstant(_) | BoolConstant(_) => "constant",
            Var(_) => "var",
            Arithmetic(..) => "arithmetic",
            Unary(..) => "unary",
            Relational(..) => "relational",
            Equality(..) => "equality",
            Logical(..) => "logical",
            Assign(..) => "assign",
            Postfix(..) => "postfix",
            Conditional(..) => "conditional",
            ArrayAccess(..) => "array access",
            FieldAccess(..) => "field access",
            Call(..) => "call",
        }
    }
}
