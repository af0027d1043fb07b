//! Per-function lowering state.
//!
//! [`FunctionLowering`] owns the Cranelift function builder for one function and
//! borrows the module-wide state from [`CodeGen`](crate::codegen::CodeGen). All
//! terminators go through it so that a block never receives a second one.

use cranelift::prelude::{
    Block, FunctionBuilder, InstBuilder, MemFlags, StackSlotData, StackSlotKind, Value, types,
};
use cranelift_codegen::ir::{FuncRef, GlobalValue, StackSlot, Type as ClifType};
use cranelift_frontend::Switch;
use cranelift_module::{DataId, FuncId, Module};
use cranelift_object::ObjectModule;
use hashbrown::HashMap;
use log::trace;

use crate::ast::{Name, Type};
use crate::codegen::emit::{Emitted, Place, TypedValue};
use crate::codegen::error::{CodegenError, CodegenResult, TargetKind};
use crate::codegen::options::CodegenOptions;
use crate::codegen::swizzle::{self, VECTOR_TYPE};
use crate::codegen::symtab::{Storage, SymbolTable};

/// Backend type of a first-class source type.
pub(crate) fn lower_type(ty: &Type) -> Option<ClifType> {
    match ty {
        Type::Bool => Some(types::I8),
        Type::Int => Some(types::I32),
        Type::Float => Some(types::F32),
        Type::Vec2 | Type::Vec3 | Type::Vec4 => Some(VECTOR_TYPE),
        Type::Void | Type::Array(..) => None,
    }
}

/// The state of the current block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlockState {
    /// No terminator yet.
    Empty,
    /// Ends in a terminator; nothing more may be appended.
    Filled,
}

#[derive(Debug, Clone, Copy)]
struct Construct {
    footer: Block,
    breaks: bool,
    continues: bool,
}

/// Footer, break and continue targets of the enclosing structured constructs.
///
/// Every construct pushes one footer; loops also push a break and a continue
/// target, a switch only a break target.
#[derive(Debug, Default)]
pub struct TargetStacks {
    footers: Vec<Construct>,
    break_targets: Vec<Block>,
    continue_targets: Vec<Block>,
}

impl TargetStacks {
    pub fn enter(&mut self, footer: Block, break_to: Option<Block>, continue_to: Option<Block>) {
        if let Some(block) = break_to {
            self.break_targets.push(block);
        }
        if let Some(block) = continue_to {
            self.continue_targets.push(block);
        }
        self.footers.push(Construct {
            footer,
            breaks: break_to.is_some(),
            continues: continue_to.is_some(),
        });
    }

    /// Close the innermost construct, which must be the one ending at `footer`.
    pub fn leave(&mut self, footer: Block) -> CodegenResult<()> {
        let top = self
            .footers
            .pop()
            .ok_or(CodegenError::EmptyTargetStack(TargetKind::Footer))?;
        if top.footer != footer {
            return Err(CodegenError::UnbalancedConstruct);
        }
        if top.breaks {
            self.break_targets.pop();
        }
        if top.continues {
            self.continue_targets.pop();
        }
        Ok(())
    }

    pub fn break_target(&self) -> CodegenResult<Block> {
        self.break_targets
            .last()
            .copied()
            .ok_or(CodegenError::EmptyTargetStack(TargetKind::Break))
    }

    pub fn continue_target(&self) -> CodegenResult<Block> {
        self.continue_targets
            .last()
            .copied()
            .ok_or(CodegenError::EmptyTargetStack(TargetKind::Continue))
    }

    pub fn footer(&self) -> CodegenResult<Block> {
        self.footers
            .last()
            .map(|construct| construct.footer)
            .ok_or(CodegenError::EmptyTargetStack(TargetKind::Footer))
    }

    pub fn is_empty(&self) -> bool {
        self.footers.is_empty() && self.break_targets.is_empty() && self.continue_targets.is_empty()
    }
}

/// Lowers the body of one function.
pub struct FunctionLowering<'a, 'm> {
    pub(crate) builder: FunctionBuilder<'a>,
    pub(crate) module: &'m mut ObjectModule,
    pub(crate) symbols: &'m mut SymbolTable,
    pub(crate) options: &'m CodegenOptions,
    pub(crate) pointer_type: ClifType,
    pub(crate) function: Name,
    pub(crate) return_type: Type,
    pub(crate) targets: TargetStacks,
    block_state: BlockState,
    data_refs: HashMap<DataId, GlobalValue>,
    func_refs: HashMap<FuncId, FuncRef>,
}

impl<'a, 'm> FunctionLowering<'a, 'm> {
    pub(crate) fn new(
        builder: FunctionBuilder<'a>,
        module: &'m mut ObjectModule,
        symbols: &'m mut SymbolTable,
        options: &'m CodegenOptions,
        function: Name,
        return_type: Type,
    ) -> Self {
        let pointer_type = module.target_config().pointer_type();
        FunctionLowering {
            builder,
            module,
            symbols,
            options,
            pointer_type,
            function,
            return_type,
            targets: TargetStacks::default(),
            block_state: BlockState::Empty,
            data_refs: HashMap::new(),
            func_refs: HashMap::new(),
        }
    }

    pub(crate) fn is_filled(&self) -> bool {
        self.block_state == BlockState::Filled
    }

    /// Switches to a new block.
    pub(crate) fn switch_to_block(&mut self, block: Block) {
        self.builder.switch_to_block(block);
        self.block_state = BlockState::Empty;
    }

    /// Structural fallthrough: jumps to `block` only if the current block is still open.
    pub(crate) fn jump_to_block(&mut self, block: Block) {
        if self.block_state != BlockState::Filled {
            self.builder.ins().jump(block, &[]);
            self.block_state = BlockState::Filled;
        }
    }

    /// Continue in a fresh block if the current one is already terminated.
    ///
    /// The new block has no predecessors; code placed there is unreachable.
    pub(crate) fn ensure_open_block(&mut self) {
        if self.is_filled() {
            let dead = self.builder.create_block();
            trace!("{}: opening unreachable block {}", self.function, dead);
            self.switch_to_block(dead);
        }
    }

    fn mark_filled(&mut self) -> CodegenResult<()> {
        if self.is_filled() {
            return Err(CodegenError::DoubleTerminator {
                function: self.function,
            });
        }
        self.block_state = BlockState::Filled;
        Ok(())
    }

    pub(crate) fn jump(&mut self, block: Block) -> CodegenResult<()> {
        self.mark_filled()?;
        self.builder.ins().jump(block, &[]);
        Ok(())
    }

    pub(crate) fn brif(&mut self, cond: Value, then_block: Block, else_block: Block) -> CodegenResult<()> {
        self.mark_filled()?;
        self.builder.ins().brif(cond, then_block, &[], else_block, &[]);
        Ok(())
    }

    pub(crate) fn ret(&mut self, values: &[Value]) -> CodegenResult<()> {
        self.mark_filled()?;
        self.builder.ins().return_(values);
        Ok(())
    }

    /// Emit the multi-way branch; `fallback` receives every unmatched value.
    pub(crate) fn branch_table(&mut self, table: Switch, scrutinee: Value, fallback: Block) -> CodegenResult<()> {
        self.mark_filled()?;
        table.emit(&mut self.builder, scrutinee, fallback);
        Ok(())
    }

    /// Return the zero value of the declared return type, or nothing for `void`.
    pub(crate) fn synthesize_return(&mut self) -> CodegenResult<()> {
        if self.return_type.is_void() {
            return self.ret(&[]);
        }
        let ty = self.return_type.clone();
        let zero = self.zero_value(&ty)?;
        self.ret(&[zero])
    }

    pub(crate) fn create_slot(&mut self, ty: &Type) -> StackSlot {
        self.builder.create_sized_stack_slot(StackSlotData::new(
            StackSlotKind::ExplicitSlot,
            ty.storage_size(),
            ty.align_shift(),
        ))
    }

    /// Address of a variable's storage cell.
    pub(crate) fn address_of(&mut self, storage: Storage) -> Value {
        match storage {
            Storage::Stack(slot) => self.builder.ins().stack_addr(self.pointer_type, slot, 0),
            Storage::Global(id) => {
                let gv = match self.data_refs.get(&id) {
                    Some(gv) => *gv,
                    None => {
                        let gv = self.module.declare_data_in_func(id, self.builder.func);
                        self.data_refs.insert(id, gv);
                        gv
                    }
                };
                self.builder.ins().global_value(self.pointer_type, gv)
            }
            Storage::Function(id) => {
                let func_ref = self.func_ref(id);
                self.builder.ins().func_addr(self.pointer_type, func_ref)
            }
        }
    }

    pub(crate) fn func_ref(&mut self, id: FuncId) -> FuncRef {
        if let Some(func_ref) = self.func_refs.get(&id) {
            return *func_ref;
        }
        let func_ref = self.module.declare_func_in_func(id, self.builder.func);
        self.func_refs.insert(id, func_ref);
        func_ref
    }

    pub(crate) fn zero_value(&mut self, ty: &Type) -> CodegenResult<Value> {
        let zero = match ty {
            Type::Bool => self.builder.ins().iconst(types::I8, 0),
            Type::Int => self.builder.ins().iconst(types::I32, 0),
            Type::Float => self.builder.ins().f32const(0.0),
            Type::Vec2 | Type::Vec3 | Type::Vec4 => {
                let lane = self.builder.ins().f32const(0.0);
                self.builder.ins().splat(VECTOR_TYPE, lane)
            }
            Type::Void | Type::Array(..) => return Err(CodegenError::NotMaterializable(ty.clone())),
        };
        Ok(zero)
    }

    pub(crate) fn load(&mut self, place: &Place) -> CodegenResult<TypedValue> {
        let clif_ty = lower_type(&place.ty).ok_or_else(|| CodegenError::NotMaterializable(place.ty.clone()))?;
        let value = self.builder.ins().load(clif_ty, MemFlags::new(), place.addr, 0);
        Ok(TypedValue::new(value, place.ty.clone()))
    }

    pub(crate) fn store(&mut self, place: &Place, value: Value) {
        self.builder.ins().store(MemFlags::new(), value, place.addr, 0);
    }

    /// Turn any classification into a ready operand.
    pub(crate) fn materialize(&mut self, emitted: Emitted) -> CodegenResult<TypedValue> {
        match emitted {
            Emitted::RValue(value) => Ok(value),
            Emitted::Address(place) => self.load(&place),
            Emitted::SwizzleExtract(swizzle) => {
                let value = swizzle::extract(&mut self.builder, swizzle.vector.value, swizzle.lanes.first());
                Ok(TypedValue::new(value, Type::Float))
            }
            Emitted::SwizzleShuffle(swizzle) => {
                let ty = Type::vector(swizzle.lanes.len()).unwrap_or(Type::Void);
                let value = swizzle::shuffle(&mut self.builder, swizzle.vector.value, swizzle.lanes);
                Ok(TypedValue::new(value, ty))
            }
            Emitted::Void => Err(CodegenError::NotMaterializable(Type::Void)),
        }
    }

    /// Store `value` through an assignable classification and yield it.
    pub(crate) fn write_target(&mut self, target: Emitted, value: TypedValue) -> CodegenResult<TypedValue> {
        match target {
            Emitted::Address(place) => {
                self.store(&place, value.value);
                Ok(value)
            }
            Emitted::SwizzleExtract(swizzle) | Emitted::SwizzleShuffle(swizzle) => {
                let place = swizzle.target.ok_or(CodegenError::NotAssignable)?;
                let updated = swizzle::write_lanes(&mut self.builder, swizzle.vector.value, value.value, swizzle.lanes);
                self.store(&place, updated);
                Ok(value)
            }
            Emitted::RValue(_) | Emitted::Void => Err(CodegenError::NotAssignable),
        }
    }

    /// Seal and finalize the function.
    pub(crate) fn finish(mut self) -> CodegenResult<()> {
        if !self.targets.is_empty() {
            return Err(CodegenError::UnbalancedConstruct);
        }
        self.builder.seal_all_blocks();
        self.builder.finalize();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cranelift_codegen::entity::EntityRef;

    #[test]
    fn test_loop_targets_nest() {
        let mut targets = TargetStacks::default();
        let (outer_step, outer_exit) = (Block::new(0), Block::new(1));
        let (inner_test, inner_exit) = (Block::new(2), Block::new(3));
        targets.enter(outer_exit, Some(outer_exit), Some(outer_step));
        targets.enter(inner_exit, Some(inner_exit), Some(inner_test));
        assert_eq!(targets.break_target().unwrap(), inner_exit);
        assert_eq!(targets.continue_target().unwrap(), inner_test);
        targets.leave(inner_exit).unwrap();
        assert_eq!(targets.break_target().unwrap(), outer_exit);
        assert_eq!(targets.continue_target().unwrap(), outer_step);
        targets.leave(outer_exit).unwrap();
        assert!(targets.is_empty());
    }

    #[test]
    fn test_switch_inside_loop_keeps_continue_target() {
        let mut targets = TargetStacks::default();
        let (step, exit, switch_exit) = (Block::new(0), Block::new(1), Block::new(2));
        targets.enter(exit, Some(exit), Some(step));
        targets.enter(switch_exit, Some(switch_exit), None);
        assert_eq!(targets.break_target().unwrap(), switch_exit);
        assert_eq!(targets.continue_target().unwrap(), step);
        targets.leave(switch_exit).unwrap();
        targets.leave(exit).unwrap();
    }

    #[test]
    fn test_if_has_no_break_target() {
        let mut targets = TargetStacks::default();
        let footer = Block::new(0);
        targets.enter(footer, None, None);
        assert_eq!(targets.footer().unwrap(), footer);
        assert!(matches!(
            targets.break_target(),
            Err(CodegenError::EmptyTargetStack(TargetKind::Break))
        ));
        assert!(matches!(
            targets.continue_target(),
            Err(CodegenError::EmptyTargetStack(TargetKind::Continue))
        ));
    }

    #[test]
    fn test_leave_out_of_order() {
        let mut targets = TargetStacks::default();
        targets.enter(Block::new(0), None, None);
        targets.enter(Block::new(1), None, None);
        assert!(matches!(targets.leave(Block::new(0)), Err(CodegenError::UnbalancedConstruct)));
    }

    #[test]
    fn test_leave_without_construct() {
        let mut targets = TargetStacks::default();
        assert!(matches!(
            targets.leave(Block::new(0)),
            Err(CodegenError::EmptyTargetStack(TargetKind::Footer))
        ));
    }

    #[test]
    fn test_lower_type() {
        assert_eq!(lower_type(&Type::Bool), Some(types::I8));
        assert_eq!(lower_type(&Type::Int), Some(types::I32));
        assert_eq!(lower_type(&Type::Vec2), Some(types::F32X4));
        assert_eq!(lower_type(&Type::array(Type::Int, 3)), None);
        assert_eq!(lower_type(&Type::Void), None);
    }
}
