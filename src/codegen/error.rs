use thiserror::Error;

use cranelift_codegen::CodegenError as CraneliftCodegenError;

use crate::ast::{Name, Type};

/// Which control-flow target stack was consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Footer,
    Break,
    Continue,
}

/// An error that can occur during code generation.
///
/// Apart from the wrapped Cranelift errors, every variant is an internal
/// invariant violation: the input AST was supposed to be validated, so these
/// point at a defect in an earlier phase or in the lowering itself.
#[derive(Error, Debug)]
pub enum CodegenError {
    /// An error from the Cranelift code generator.
    #[error("Cranelift error: {0}")]
    Cranelift(#[from] CraneliftCodegenError),
    /// An error from the Cranelift module.
    #[error("Module error: {0}")]
    Module(#[from] cranelift_module::ModuleError),
    #[error("Invalid codegen setting: {0}")]
    Settings(#[from] cranelift_codegen::settings::SetError),
    #[error("Unsupported target: {0}")]
    Isa(String),
    #[error("Failed to write object file: {0}")]
    Object(String),

    #[error("block already has a terminator in function '{function}'")]
    DoubleTerminator { function: Name },
    #[error("symbol '{0}' not found")]
    UnknownSymbol(Name),
    #[error("function '{0}' called before it was declared")]
    UnknownFunction(Name),
    #[error("'{name}' redefined in the same scope")]
    Redefinition { name: Name },
    #[error("{0:?} target stack is empty")]
    EmptyTargetStack(TargetKind),
    #[error("structured construct closed out of order")]
    UnbalancedConstruct,
    #[error("attempted to pop the global scope")]
    ScopeUnderflow,
    #[error("scope depth {depth} after function '{function}', expected 1")]
    ScopeImbalance { function: Name, depth: usize },
    #[error("case label is not an integer constant")]
    NonConstantCaseLabel,
    #[error("duplicate case label {0}")]
    DuplicateCaseLabel(i64),
    #[error("switch has more than one default label")]
    DuplicateDefault,
    #[error("initializer of global '{0}' is not a constant")]
    NonConstantInitializer(Name),
    #[error("expression is not assignable")]
    NotAssignable,
    #[error("value of type {0} cannot be used as an operand")]
    NotMaterializable(Type),
    #[error("no lowering for {op} on operands {lhs} and {rhs}")]
    UnsupportedOperands { op: &'static str, lhs: Type, rhs: Type },
    #[error("invalid swizzle '{field}' on {base}")]
    InvalidSwizzle { field: Name, base: Type },
    #[error("index {index} out of bounds for array of length {len}")]
    IndexOutOfBounds { index: i64, len: u32 },
    #[error("lowered value has type {found}, expression was typed {expected}")]
    TypeDivergence { expected: Type, found: Type },
    #[error("'{callee}' takes {expected} arguments, {found} given")]
    ArityMismatch {
        callee: Name,
        expected: usize,
        found: usize,
    },
}

pub type CodegenResult<T> = Result<T, CodegenError>;
