use thiserror::Error;

use crate::codegen::error::CodegenError;

/// Errors surfaced by the crate's entry points.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Codegen(#[from] CodegenError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("linking failed: {0}")]
    Link(String),
}
