//! Abstract Syntax Tree for the shading language.
//!
//! The AST is an owned tree built by the parser and annotated with resolved
//! types by the analysis phase. Code generation reads it and never mutates it.
//!
//! - [`nodes`]: declarations, statements, expressions and their constructors
//! - [`types`]: source-level types

/// Represents an interned identifier.
/// Alias for GlobalSymbol from symbol_table crate with global feature.
pub type Name = symbol_table::GlobalSymbol;

pub mod nodes;
pub mod types;

pub use nodes::*;
pub use types::Type;
