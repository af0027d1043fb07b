//! Declarations: globals, locals and functions.

use cranelift::prelude::{AbiParam, FunctionBuilder, MemFlags, Signature};
use cranelift_codegen::ir::UserFuncName;
use cranelift_module::{DataDescription, Linkage, Module};
use log::debug;
use thin_vec::ThinVec;

use crate::ast::{FnDecl, Type, VarDecl};
use crate::codegen::CodeGen;
use crate::codegen::const_eval::initializer_bytes;
use crate::codegen::context::{FunctionLowering, lower_type};
use crate::codegen::emit::{Emit, Place};
use crate::codegen::error::{CodegenError, CodegenResult};
use crate::codegen::options::EmitKind;
use crate::codegen::symtab::{Storage, Symbol, SymbolKind};

impl FunctionLowering<'_, '_> {
    /// Local variable: a slot of its own, initialized where it is declared.
    pub(crate) fn emit_local(&mut self, var: &VarDecl) -> CodegenResult<()> {
        let init = match &var.init {
            Some(init) => {
                let emitted = init.emit(self)?;
                Some(self.materialize(emitted)?)
            }
            None => None,
        };

        let slot = self.create_slot(&var.ty);
        let addr = self.address_of(Storage::Stack(slot));
        let place = Place {
            addr,
            ty: var.ty.clone(),
        };
        match init {
            Some(value) => self.store(&place, value.value),
            None if var.ty.is_first_class() => {
                let zero = self.zero_value(&var.ty)?;
                self.store(&place, zero);
            }
            None => {
                let config = self.module.target_config();
                self.builder.emit_small_memset(
                    config,
                    addr,
                    0,
                    u64::from(var.ty.storage_size()),
                    1 << var.ty.align_shift(),
                    MemFlags::new(),
                );
            }
        }

        let symbol = Symbol::variable(var.name, Storage::Stack(slot), var.ty.clone());
        if self.symbols.insert(var.name, symbol).is_some() {
            return Err(CodegenError::Redefinition { name: var.name });
        }
        Ok(())
    }

    /// Entry block, parameter spills and the body of a defined function.
    pub(crate) fn lower_function_body(&mut self, func: &FnDecl) -> CodegenResult<()> {
        let Some(body) = &func.body else {
            return Ok(());
        };
        let entry = self.builder.create_block();
        let body_start = self.builder.create_block();
        self.builder.append_block_params_for_function_params(entry);
        self.switch_to_block(entry);

        self.symbols.push();
        let values = self.builder.block_params(entry).to_vec();
        for (param, value) in func.params.iter().zip(values) {
            let slot = self.create_slot(&param.ty);
            let place = Place {
                addr: self.address_of(Storage::Stack(slot)),
                ty: param.ty.clone(),
            };
            self.store(&place, value);
            let symbol = Symbol::variable(param.name, Storage::Stack(slot), param.ty.clone());
            if self.symbols.insert(param.name, symbol).is_some() {
                return Err(CodegenError::Redefinition { name: param.name });
            }
        }
        self.jump(body_start)?;

        self.switch_to_block(body_start);
        self.lower_block(body)?;
        if !self.is_filled() {
            debug!("{}: falling off the end, synthesizing return", self.function);
            self.synthesize_return()?;
        }
        self.symbols.pop()
    }
}

impl CodeGen {
    fn signature_for(&self, func: &FnDecl) -> CodegenResult<Signature> {
        let mut sig = self.module.make_signature();
        for param in &func.params {
            let ty = lower_type(&param.ty).ok_or_else(|| CodegenError::NotMaterializable(param.ty.clone()))?;
            sig.params.push(AbiParam::new(ty));
        }
        if !func.return_type.is_void() {
            let ty = lower_type(&func.return_type)
                .ok_or_else(|| CodegenError::NotMaterializable(func.return_type.clone()))?;
            sig.returns.push(AbiParam::new(ty));
        }
        Ok(sig)
    }

    /// Global variable: a data object, zero-filled unless it has a constant initializer.
    pub(crate) fn emit_global(&mut self, var: &VarDecl) -> CodegenResult<()> {
        if self.symbols.find_in_current_scope(var.name).is_some() {
            return Err(CodegenError::Redefinition { name: var.name });
        }
        let id = self.module.declare_data(var.name.as_str(), Linkage::Export, true, false)?;
        let mut desc = DataDescription::new();
        match &var.init {
            Some(init) => desc.define(initializer_bytes(var.name, init, &var.ty)?.into_boxed_slice()),
            None => desc.define_zeroinit(var.ty.storage_size() as usize),
        }
        desc.set_align(1 << var.ty.align_shift());
        self.module.define_data(id, &desc)?;
        debug!("global '{}': {} ({} bytes)", var.name, var.ty, var.ty.storage_size());

        let symbol = Symbol::variable(var.name, Storage::Global(id), var.ty.clone());
        self.symbols.insert(var.name, symbol);
        Ok(())
    }

    /// Function definition or prototype.
    pub(crate) fn emit_function(&mut self, func: &FnDecl) -> CodegenResult<()> {
        // a prototype may be followed by exactly one definition
        let already_defined = match self.symbols.find_in_current_scope(func.name) {
            None => false,
            Some(Symbol {
                kind: SymbolKind::Function { is_defined, .. },
                ..
            }) => {
                if *is_defined && !func.is_prototype() {
                    return Err(CodegenError::Redefinition { name: func.name });
                }
                *is_defined
            }
            Some(_) => return Err(CodegenError::Redefinition { name: func.name }),
        };

        let signature = self.signature_for(func)?;
        let linkage = if func.is_prototype() {
            Linkage::Import
        } else {
            Linkage::Export
        };
        let id = self.module.declare_function(func.name.as_str(), linkage, &signature)?;
        let params: ThinVec<Type> = func.params.iter().map(|param| param.ty.clone()).collect();
        let symbol = Symbol::function(
            func.name,
            id,
            params,
            func.return_type.clone(),
            already_defined || !func.is_prototype(),
        );
        // registered before the body so that recursive calls resolve
        self.symbols.insert(func.name, symbol);

        if func.is_prototype() {
            debug!("prototype '{}'", func.name);
            return Ok(());
        }
        debug!("function '{}' -> {}", func.name, func.return_type);

        let mut ctx = self.module.make_context();
        ctx.func.signature = signature;
        ctx.func.name = UserFuncName::testcase(func.name.as_str());
        {
            let builder = FunctionBuilder::new(&mut ctx.func, &mut self.builder_context);
            let mut lowering = FunctionLowering::new(
                builder,
                &mut self.module,
                &mut self.symbols,
                &self.options,
                func.name,
                func.return_type.clone(),
            );
            lowering.lower_function_body(func)?;
            lowering.finish()?;
        }
        if self.symbols.depth() != 1 {
            return Err(CodegenError::ScopeImbalance {
                function: func.name,
                depth: self.symbols.depth(),
            });
        }

        if self.options.emit == EmitKind::Clif {
            self.compiled_functions
                .insert(func.name.to_string(), ctx.func.display().to_string());
        }
        self.module.define_function(id, &mut ctx)?;
        self.module.clear_context(&mut ctx);
        Ok(())
    }
}
