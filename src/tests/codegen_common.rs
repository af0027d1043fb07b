use crate::ast::Program;
use crate::codegen::{CodeGen, CodegenOptions, CodegenOutput, compile_to_clif};
use crate::test_utils::init_logger;

/// setup test with output is cranelift ir
pub(crate) fn setup_clif(program: &Program) -> String {
    init_logger();
    compile_to_clif(program).unwrap()
}

/// Like [`setup_clif`] with extra options; the emit kind is forced to CLIF.
pub(crate) fn setup_clif_with(program: &Program, options: CodegenOptions) -> String {
    init_logger();
    let options = CodegenOptions {
        emit: crate::codegen::EmitKind::Clif,
        ..options
    };
    match CodeGen::new(options).unwrap().compile(program).unwrap() {
        CodegenOutput::Clif(dump) => dump,
        CodegenOutput::Object(_) => panic!("expected a CLIF dump"),
    }
}

/// The CLIF text of one function out of a full dump.
pub(crate) fn function_clif<'a>(dump: &'a str, name: &str) -> &'a str {
    let header = format!("; Function: {}\n", name);
    let start = dump.find(&header).unwrap_or_else(|| panic!("no function '{}' in dump", name)) + header.len();
    let rest = &dump[start..];
    let end = rest.find("; Function: ").unwrap_or(rest.len());
    &rest[..end]
}
