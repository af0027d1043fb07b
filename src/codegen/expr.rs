//! Expression and assignment lowering.

use cranelift::prelude::{FloatCC, InstBuilder, IntCC, TrapCode, Value, types};
use log::trace;

use crate::ast::{ArithOp, AssignOp, EqOp, Expr, ExprKind, LogicalOp, Name, PostfixOp, RelOp, Type, UnaryOp};
use crate::codegen::arith::lower_arith;
use crate::codegen::const_eval::{ConstValue, eval_const_expr};
use crate::codegen::context::FunctionLowering;
use crate::codegen::emit::{Emit, Emitted, Place, Swizzle, TypedValue};
use crate::codegen::error::{CodegenError, CodegenResult};
use crate::codegen::swizzle::{self, Lanes};
use crate::codegen::symtab::{Storage, SymbolKind, element_type_of};

impl FunctionLowering<'_, '_> {
    /// Lower one expression. Callers go through [`Emit::emit`], which also checks
    /// the result against the expression's type.
    pub(crate) fn lower_expr(&mut self, expr: &Expr) -> CodegenResult<Emitted> {
        match &expr.kind {
            ExprKind::IntConstant(val) => {
                let value = self.builder.ins().iconst(types::I32, i64::from(*val));
                Ok(Emitted::rvalue(value, Type::Int))
            }
            ExprKind::FloatConstant(val) => {
                let value = self.builder.ins().f32const(*val);
                Ok(Emitted::rvalue(value, Type::Float))
            }
            ExprKind::BoolConstant(val) => {
                let value = self.builder.ins().iconst(types::I8, i64::from(*val));
                Ok(Emitted::rvalue(value, Type::Bool))
            }
            ExprKind::Var(name) => self.lower_var(*name),
            ExprKind::Arithmetic(op, lhs, rhs) => {
                let lhs = self.operand(lhs)?;
                let rhs = self.operand(rhs)?;
                let result = lower_arith(&mut self.builder, *op, &lhs, &rhs)?;
                Ok(Emitted::RValue(result))
            }
            ExprKind::Unary(op, operand) => self.lower_unary(*op, operand),
            ExprKind::Postfix(op, operand) => {
                let target = operand.emit(self)?;
                let old = self.materialize(target.clone())?;
                let step = match op {
                    PostfixOp::Inc => ArithOp::Add,
                    PostfixOp::Dec => ArithOp::Sub,
                };
                let updated = self.step_by_one(step, &old)?;
                self.write_target(target, updated)?;
                Ok(Emitted::RValue(old))
            }
            ExprKind::Relational(op, lhs, rhs) => {
                let lhs = self.operand(lhs)?;
                let rhs = self.operand(rhs)?;
                self.lower_relational(*op, lhs, rhs)
            }
            ExprKind::Equality(op, lhs, rhs) => {
                let lhs = self.operand(lhs)?;
                let rhs = self.operand(rhs)?;
                self.lower_equality(*op, lhs, rhs)
            }
            ExprKind::Logical(op, lhs, rhs) => {
                // no short circuit: both sides always run
                let lhs = self.operand(lhs)?;
                let rhs = self.operand(rhs)?;
                let value = match op {
                    LogicalOp::And => self.builder.ins().band(lhs.value, rhs.value),
                    LogicalOp::Or => self.builder.ins().bor(lhs.value, rhs.value),
                };
                Ok(Emitted::rvalue(value, Type::Bool))
            }
            ExprKind::Assign(op, target, value) => self.lower_assign(*op, target, value),
            ExprKind::Conditional(cond, then_expr, else_expr) => {
                let cond = self.operand(cond)?;
                let then_val = self.operand(then_expr)?;
                let else_val = self.operand(else_expr)?;
                let value = self.builder.ins().select(cond.value, then_val.value, else_val.value);
                Ok(Emitted::rvalue(value, then_val.ty))
            }
            ExprKind::ArrayAccess(base, index) => self.lower_index(base, index),
            ExprKind::FieldAccess(base, field) => self.lower_field(base, *field),
            ExprKind::Call(callee, args) => self.lower_call(*callee, args),
        }
    }

    /// Emit `expr` and materialize it.
    fn operand(&mut self, expr: &Expr) -> CodegenResult<TypedValue> {
        let emitted = expr.emit(self)?;
        self.materialize(emitted)
    }

    fn lower_var(&mut self, name: Name) -> CodegenResult<Emitted> {
        let symbol = self.symbols.find(name).ok_or(CodegenError::UnknownSymbol(name))?;
        if symbol.is_function() {
            return Err(CodegenError::UnknownSymbol(name));
        }
        let (storage, ty) = (symbol.storage, symbol.ty.clone());
        let addr = self.address_of(storage);
        Ok(Emitted::Address(Place { addr, ty }))
    }

    /// `value + 1` or `value - 1`; vectors step every lane.
    fn step_by_one(&mut self, op: ArithOp, value: &TypedValue) -> CodegenResult<TypedValue> {
        let one = match value.ty {
            Type::Int => TypedValue::new(self.builder.ins().iconst(types::I32, 1), Type::Int),
            Type::Float | Type::Vec2 | Type::Vec3 | Type::Vec4 => {
                TypedValue::new(self.builder.ins().f32const(1.0), Type::Float)
            }
            _ => return Err(CodegenError::NotMaterializable(value.ty.clone())),
        };
        lower_arith(&mut self.builder, op, value, &one)
    }

    fn lower_unary(&mut self, op: UnaryOp, operand: &Expr) -> CodegenResult<Emitted> {
        match op {
            UnaryOp::Plus => Ok(Emitted::RValue(self.operand(operand)?)),
            UnaryOp::Minus => {
                let value = self.operand(operand)?;
                let zero = TypedValue::new(self.zero_value(&value.ty)?, value.ty.clone());
                Ok(Emitted::RValue(lower_arith(&mut self.builder, ArithOp::Sub, &zero, &value)?))
            }
            UnaryOp::PreInc | UnaryOp::PreDec => {
                let target = operand.emit(self)?;
                let old = self.materialize(target.clone())?;
                let step = if op == UnaryOp::PreInc { ArithOp::Add } else { ArithOp::Sub };
                let updated = self.step_by_one(step, &old)?;
                Ok(Emitted::RValue(self.write_target(target, updated)?))
            }
        }
    }

    fn lower_relational(&mut self, op: RelOp, lhs: TypedValue, rhs: TypedValue) -> CodegenResult<Emitted> {
        let value = match (&lhs.ty, &rhs.ty) {
            (Type::Int, Type::Int) => {
                let cc = match op {
                    RelOp::Less => IntCC::SignedLessThan,
                    RelOp::Greater => IntCC::SignedGreaterThan,
                    RelOp::LessEqual => IntCC::SignedLessThanOrEqual,
                    RelOp::GreaterEqual => IntCC::SignedGreaterThanOrEqual,
                };
                self.builder.ins().icmp(cc, lhs.value, rhs.value)
            }
            (Type::Float, Type::Float) => {
                let cc = match op {
                    RelOp::Less => FloatCC::LessThan,
                    RelOp::Greater => FloatCC::GreaterThan,
                    RelOp::LessEqual => FloatCC::LessThanOrEqual,
                    RelOp::GreaterEqual => FloatCC::GreaterThanOrEqual,
                };
                self.builder.ins().fcmp(cc, lhs.value, rhs.value)
            }
            _ => {
                return Err(CodegenError::UnsupportedOperands {
                    op: relational_symbol(op),
                    lhs: lhs.ty.clone(),
                    rhs: rhs.ty.clone(),
                });
            }
        };
        Ok(Emitted::rvalue(value, Type::Bool))
    }

    fn lower_equality(&mut self, op: EqOp, lhs: TypedValue, rhs: TypedValue) -> CodegenResult<Emitted> {
        let equal = op == EqOp::Equal;
        let value = match (&lhs.ty, &rhs.ty) {
            (Type::Int, Type::Int) | (Type::Bool, Type::Bool) => {
                let cc = if equal { IntCC::Equal } else { IntCC::NotEqual };
                self.builder.ins().icmp(cc, lhs.value, rhs.value)
            }
            (Type::Float, Type::Float) => {
                let cc = if equal { FloatCC::Equal } else { FloatCC::OrderedNotEqual };
                self.builder.ins().fcmp(cc, lhs.value, rhs.value)
            }
            (l, r) if l.is_vector() && l == r => {
                let all_equal = self.vector_equal(lhs.value, rhs.value, l.lanes().unwrap_or(0));
                if equal {
                    all_equal
                } else {
                    self.builder.ins().bxor_imm(all_equal, 1)
                }
            }
            _ => {
                return Err(CodegenError::UnsupportedOperands {
                    op: if equal { "==" } else { "!=" },
                    lhs: lhs.ty.clone(),
                    rhs: rhs.ty.clone(),
                });
            }
        };
        Ok(Emitted::rvalue(value, Type::Bool))
    }

    /// 1 when the first `arity` lanes of both vectors compare equal.
    fn vector_equal(&mut self, lhs: Value, rhs: Value, arity: u8) -> Value {
        let mut result = self.builder.ins().iconst(types::I8, 1);
        for lane in 0..arity {
            let l = swizzle::extract(&mut self.builder, lhs, lane);
            let r = swizzle::extract(&mut self.builder, rhs, lane);
            let eq = self.builder.ins().fcmp(FloatCC::Equal, l, r);
            result = self.builder.ins().band(result, eq);
        }
        result
    }

    fn lower_assign(&mut self, op: AssignOp, target: &Expr, value: &Expr) -> CodegenResult<Emitted> {
        // right-hand side first, then the cell it goes into
        let rhs = self.operand(value)?;
        let target = target.emit(self)?;
        let result = match op.arith() {
            None => rhs,
            Some(arith) => {
                let current = self.materialize(target.clone())?;
                lower_arith(&mut self.builder, arith, &current, &rhs)?
            }
        };
        trace!("{}: assign {:?} of {}", self.function, op, result.ty);
        Ok(Emitted::RValue(self.write_target(target, result)?))
    }

    fn lower_index(&mut self, base: &Expr, index: &Expr) -> CodegenResult<Emitted> {
        let (base_addr, elem, len) = match base.emit(self)? {
            Emitted::Address(Place {
                addr,
                ty: Type::Array(elem, len),
            }) => (addr, *elem, len),
            other => return Err(CodegenError::NotMaterializable(element_type_of(&other))),
        };
        let elem_size = i64::from(elem.storage_size());

        if let Some(ConstValue::Int(index)) = eval_const_expr(index) {
            if index < 0 || index as u32 >= len {
                return Err(CodegenError::IndexOutOfBounds {
                    index: i64::from(index),
                    len,
                });
            }
            let addr = self.builder.ins().iadd_imm(base_addr, i64::from(index) * elem_size);
            return Ok(Emitted::Address(Place { addr, ty: elem }));
        }

        let index = self.operand(index)?;
        if index.ty != Type::Int {
            return Err(CodegenError::UnsupportedOperands {
                op: "[]",
                lhs: Type::array(elem, len),
                rhs: index.ty,
            });
        }
        if self.options.bounds_checks {
            // a negative index is a huge unsigned one
            let out_of_range = self
                .builder
                .ins()
                .icmp_imm(IntCC::UnsignedGreaterThanOrEqual, index.value, i64::from(len));
            self.builder.ins().trapnz(out_of_range, TrapCode::HEAP_OUT_OF_BOUNDS);
        }
        let wide = if self.pointer_type == types::I32 {
            index.value
        } else {
            self.builder.ins().sextend(self.pointer_type, index.value)
        };
        let offset = self.builder.ins().imul_imm(wide, elem_size);
        let addr = self.builder.ins().iadd(base_addr, offset);
        Ok(Emitted::Address(Place { addr, ty: elem }))
    }

    fn lower_field(&mut self, base: &Expr, field: Name) -> CodegenResult<Emitted> {
        let base = base.emit(self)?;
        let target = match &base {
            Emitted::Address(place) => Some(place.clone()),
            _ => None,
        };
        let vector = self.materialize(base)?;
        let lanes = vector
            .ty
            .lanes()
            .and_then(|arity| Lanes::parse(field.as_str()).filter(|lanes| lanes.fits(arity)))
            .ok_or_else(|| CodegenError::InvalidSwizzle {
                field,
                base: vector.ty.clone(),
            })?;
        let swizzle = Swizzle { vector, lanes, target };
        if lanes.is_single() {
            Ok(Emitted::SwizzleExtract(swizzle))
        } else {
            Ok(Emitted::SwizzleShuffle(swizzle))
        }
    }

    fn lower_call(&mut self, callee: Name, args: &[Expr]) -> CodegenResult<Emitted> {
        let symbol = self
            .symbols
            .find_function(callee)
            .ok_or(CodegenError::UnknownFunction(callee))?;
        let SymbolKind::Function { params, .. } = &symbol.kind else {
            return Err(CodegenError::UnknownFunction(callee));
        };
        if params.len() != args.len() {
            return Err(CodegenError::ArityMismatch {
                callee,
                expected: params.len(),
                found: args.len(),
            });
        }
        let Storage::Function(id) = symbol.storage else {
            return Err(CodegenError::UnknownFunction(callee));
        };
        let return_type = symbol.ty.clone();

        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.operand(arg)?.value);
        }
        let func_ref = self.func_ref(id);
        let call = self.builder.ins().call(func_ref, &values);
        match self.builder.inst_results(call).first() {
            Some(&value) if !return_type.is_void() => Ok(Emitted::rvalue(value, return_type)),
            _ => Ok(Emitted::Void),
        }
    }
}

fn relational_symbol(op: RelOp) -> &'static str {
    match op {
        RelOp::Less => "<",
        RelOp::Greater => ">",
        RelOp::LessEqual => "<=",
        RelOp::GreaterEqual => ">=",
    }
}
