//! Code generation options.

use std::str::FromStr;

use cranelift::prelude::{Configurable, settings};
use cranelift_codegen::isa::{self, OwnedTargetIsa};
use target_lexicon::Triple;

use crate::codegen::error::{CodegenError, CodegenResult};

/// What `CodeGen::compile` produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmitKind {
    /// A relocatable object file.
    #[default]
    Object,
    /// Textual Cranelift IR of every defined function.
    Clif,
}

/// Options affecting code generation
#[derive(Debug, Clone)]
pub struct CodegenOptions {
    /// Target triple such as `x86_64-unknown-linux-gnu`; `None` means the host.
    pub target: Option<String>,
    pub emit: EmitKind,
    pub pic: bool,
    /// Run the Cranelift verifier on every function before it is compiled.
    pub verify: bool,
    /// Trap on out-of-range dynamic array indices instead of leaving them unchecked.
    pub bounds_checks: bool,
    /// Name recorded in the object file.
    pub module_name: String,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        CodegenOptions {
            target: None,
            emit: EmitKind::Object,
            pic: true,
            verify: true,
            bounds_checks: false,
            module_name: "glint".to_string(),
        }
    }
}

impl CodegenOptions {
    pub fn clif() -> Self {
        CodegenOptions {
            emit: EmitKind::Clif,
            ..Default::default()
        }
    }

    /// Build the target ISA described by these options.
    pub(crate) fn build_isa(&self) -> CodegenResult<OwnedTargetIsa> {
        let mut flag_builder = settings::builder();
        flag_builder.set("opt_level", "none")?;
        flag_builder.set("is_pic", if self.pic { "true" } else { "false" })?;
        flag_builder.set("enable_verifier", if self.verify { "true" } else { "false" })?;
        let flags = settings::Flags::new(flag_builder);

        let isa_builder = match &self.target {
            // the native builder also turns on the host's SIMD extensions
            None => cranelift_native::builder().map_err(|msg| CodegenError::Isa(msg.to_string()))?,
            Some(target) => {
                let triple = Triple::from_str(target).map_err(|e| CodegenError::Isa(e.to_string()))?;
                isa::lookup(triple).map_err(|e| CodegenError::Isa(e.to_string()))?
            }
        };
        Ok(isa_builder.finish(flags)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = CodegenOptions::default();
        assert_eq!(options.emit, EmitKind::Object);
        assert!(options.verify);
        assert!(!options.bounds_checks);
    }

    #[test]
    fn test_host_isa() {
        let isa = CodegenOptions::default().build_isa().unwrap();
        assert_eq!(isa.triple(), &Triple::host());
    }

    #[test]
    fn test_unknown_target_is_rejected() {
        let options = CodegenOptions {
            target: Some("not-a-real-target".to_string()),
            ..Default::default()
        };
        assert!(matches!(options.build_isa(), Err(CodegenError::Isa(_))));
    }
}
