//! Helpers shared by the unit and integration tests: AST shorthands and a
//! compile, link and run round trip through the system C compiler.

use std::fs;
use std::process::Command;

use tempfile::tempdir;

use crate::ast::{AssignOp, Decl, Expr, FnDecl, Program, Stmt, StmtBlock, Type, VarDecl};
use crate::codegen::{CodeGen, CodegenOptions, CodegenOutput};
use crate::error::Error;

/// Driver used to link test objects against the C runtime.
pub const LINKER: &str = "cc";

/// Route `log` output through the test harness; safe to call from every test.
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Compiles `program`, links it and runs it, returning the exit code.
pub fn compile_and_run(program: &Program, test_name: &str) -> Result<i32, Error> {
    compile_and_run_with(program, CodegenOptions::default(), test_name)
}

/// Like [`compile_and_run`] with explicit options. A process killed by a signal
/// reports -1.
pub fn compile_and_run_with(program: &Program, options: CodegenOptions, test_name: &str) -> Result<i32, Error> {
    init_logger();
    let object = match CodeGen::new(options)?.compile(program)? {
        CodegenOutput::Object(bytes) => bytes,
        CodegenOutput::Clif(_) => return Err(Error::Link("expected an object file".to_string())),
    };

    let scratch = tempdir()?;
    let exe_path = scratch.path().join(test_name);
    let object_path = exe_path.with_extension("o");
    fs::write(&object_path, object)?;

    let link = Command::new(LINKER).arg(&object_path).arg("-o").arg(&exe_path).output()?;
    if !link.status.success() {
        return Err(Error::Link(String::from_utf8_lossy(&link.stderr).into_owned()));
    }

    let status = Command::new(&exe_path).status()?;
    Ok(status.code().unwrap_or(-1))
}

/// `int main() { body }`, preceded by `decls`.
pub fn program_with_main(decls: impl IntoIterator<Item = Decl>, body: impl IntoIterator<Item = Stmt>) -> Program {
    let mut program = Program::new(decls);
    program.decls.push(function("main", Type::Int, [], body));
    program
}

/// A program made of `int main() { body }` alone.
pub fn main_only(body: impl IntoIterator<Item = Stmt>) -> Program {
    program_with_main([], body)
}

pub fn function(
    name: &str,
    return_type: Type,
    params: impl IntoIterator<Item = VarDecl>,
    body: impl IntoIterator<Item = Stmt>,
) -> Decl {
    Decl::Fn(FnDecl::new(name, return_type, params, Some(StmtBlock::new(body))))
}

pub fn param(name: &str, ty: Type) -> VarDecl {
    VarDecl::new(name, ty, None)
}

pub fn global(name: &str, ty: Type, init: Option<Expr>) -> Decl {
    Decl::Var(VarDecl::new(name, ty, init))
}

pub fn int_var(name: &str) -> Expr {
    Expr::var(name, Type::Int)
}

pub fn float_var(name: &str) -> Expr {
    Expr::var(name, Type::Float)
}

/// `target = value;`
pub fn assign(target: Expr, value: Expr) -> Stmt {
    Expr::assign(AssignOp::Assign, target, value).stmt()
}

/// `return value;`
pub fn ret(value: Expr) -> Stmt {
    Stmt::ret(Some(value))
}
