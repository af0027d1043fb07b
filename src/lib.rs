//! Code generation backend for a small vector-typed shading-style language.
//!
//! The input is a validated, fully typed [`ast::Program`]; the output is a
//! relocatable object file or a CLIF dump, produced with Cranelift.

/// The typed syntax tree consumed by code generation.
pub mod ast;
/// Contains the code generation components.
pub mod codegen;
/// Contains the error types for the application.
pub mod error;

pub mod test_utils;


pub use codegen::{CodeGen, CodegenError, CodegenOptions, CodegenOutput, EmitKind, compile_to_clif, compile_to_object};
pub use error::Error;
