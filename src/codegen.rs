//! Code generation.
//!
//! Lowers a validated, fully typed [`Program`] to Cranelift IR and from there to
//! a relocatable object file or a textual CLIF dump:
//! - `emit`: the [`Emit`] protocol every AST node implements
//! - `decl`, `control_flow`, `expr`: the lowering itself
//! - `symtab`: scoped symbols and source types of lowered values
//! - `context`: per-function builder and block state

pub mod arith;
pub mod const_eval;
pub mod context;
pub mod control_flow;
pub mod decl;
pub mod emit;
pub mod error;
pub mod expr;
pub mod options;
pub mod swizzle;
pub mod symtab;

use cranelift::prelude::FunctionBuilderContext;
use cranelift_module::Module;
use cranelift_object::{ObjectBuilder, ObjectModule};
use indexmap::IndexMap;
use log::debug;

use crate::ast::Program;

pub use emit::{Emit, Emitted};
pub use error::{CodegenError, CodegenResult};
pub use options::{CodegenOptions, EmitKind};
pub use symtab::{SymbolTable, element_type_of};

/// What a compile produced.
#[derive(Debug)]
pub enum CodegenOutput {
    Object(Vec<u8>),
    /// CLIF text of every defined function, in definition order.
    Clif(String),
}

/// Module-level code generator: owns the Cranelift module and the symbol table
/// for one translation unit.
pub struct CodeGen {
    pub(crate) module: ObjectModule,
    pub(crate) symbols: SymbolTable,
    pub(crate) builder_context: FunctionBuilderContext,
    pub(crate) options: CodegenOptions,
    // function name -> CLIF text, filled only for EmitKind::Clif
    pub(crate) compiled_functions: IndexMap<String, String>,
}

impl CodeGen {
    pub fn new(options: CodegenOptions) -> CodegenResult<Self> {
        let isa = options.build_isa()?;
        let builder = ObjectBuilder::new(
            isa,
            options.module_name.as_bytes().to_vec(),
            cranelift_module::default_libcall_names(),
        )?;
        Ok(CodeGen {
            module: ObjectModule::new(builder),
            symbols: SymbolTable::new(),
            builder_context: FunctionBuilderContext::new(),
            options,
            compiled_functions: IndexMap::new(),
        })
    }

    /// Lower the whole program and produce the requested output.
    pub fn compile(mut self, program: &Program) -> CodegenResult<CodegenOutput> {
        debug!(
            "compiling {} declarations for {}",
            program.decls.len(),
            self.module.isa().triple()
        );
        program.emit(&mut self)?;

        match self.options.emit {
            EmitKind::Object => {
                let product = self.module.finish();
                let bytes = product
                    .object
                    .write()
                    .map_err(|e| CodegenError::Object(e.to_string()))?;
                Ok(CodegenOutput::Object(bytes))
            }
            EmitKind::Clif => {
                let mut dump = String::new();
                for (name, clif) in &self.compiled_functions {
                    dump.push_str(&format!("; Function: {}\n{}\n", name, clif));
                }
                Ok(CodegenOutput::Clif(dump))
            }
        }
    }
}

/// Compile `program` for the host into object file bytes.
pub fn compile_to_object(program: &Program) -> CodegenResult<Vec<u8>> {
    match CodeGen::new(CodegenOptions::default())?.compile(program)? {
        CodegenOutput::Object(bytes) => Ok(bytes),
        CodegenOutput::Clif(_) => unreachable!("object options produce an object"),
    }
}

/// Compile `program` for the host and return the CLIF text of its functions.
pub fn compile_to_clif(program: &Program) -> CodegenResult<String> {
    match CodeGen::new(CodegenOptions::clif())?.compile(program)? {
        CodegenOutput::Clif(dump) => Ok(dump),
        CodegenOutput::Object(_) => unreachable!("clif options produce a dump"),
    }
}
