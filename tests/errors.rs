use glint::ast::{ArithOp, Expr, ExprKind, FnDecl, Decl, Stmt, SwitchCase, Type};
use glint::codegen::error::TargetKind;
use glint::test_utils::{assign, function, global, int_var, main_only, param, program_with_main, ret};
use glint::{CodegenError, compile_to_object};

fn compile_error(program: &glint::ast::Program) -> CodegenError {
    compile_to_object(program).expect_err("program should be rejected")
}

fn switch_on_zero(cases: Vec<SwitchCase>) -> glint::ast::Program {
    main_only([
        Stmt::decl("x", Type::Int, Some(Expr::int(0))),
        Stmt::switch(int_var("x"), cases),
        ret(Expr::int(0)),
    ])
}

#[test]
fn test_non_constant_case_label() {
    let program = switch_on_zero(vec![SwitchCase::case(int_var("x"), [Stmt::Break])]);
    assert!(matches!(compile_error(&program), CodegenError::NonConstantCaseLabel));
}

#[test]
fn test_duplicate_case_label_after_folding() {
    let program = switch_on_zero(vec![
        SwitchCase::case(Expr::int(3), [Stmt::Break]),
        SwitchCase::case(Expr::arith(ArithOp::Add, Expr::int(1), Expr::int(2)), [Stmt::Break]),
    ]);
    assert!(matches!(compile_error(&program), CodegenError::DuplicateCaseLabel(3)));
}

#[test]
fn test_duplicate_default() {
    let program = switch_on_zero(vec![SwitchCase::default([]), SwitchCase::default([])]);
    assert!(matches!(compile_error(&program), CodegenError::DuplicateDefault));
}

#[test]
fn test_break_outside_loop() {
    let program = main_only([Stmt::Break, ret(Expr::int(0))]);
    assert!(matches!(
        compile_error(&program),
        CodegenError::EmptyTargetStack(TargetKind::Break)
    ));
}

#[test]
fn test_continue_in_switch_without_loop() {
    let program = switch_on_zero(vec![SwitchCase::case(Expr::int(0), [Stmt::Continue])]);
    assert!(matches!(
        compile_error(&program),
        CodegenError::EmptyTargetStack(TargetKind::Continue)
    ));
}

#[test]
fn test_unknown_symbol() {
    let program = main_only([ret(int_var("missing"))]);
    assert!(matches!(
        compile_error(&program),
        CodegenError::UnknownSymbol(name) if name.as_str() == "missing"
    ));
}

#[test]
fn test_variable_out_of_scope() {
    // { int inner = 1; } return inner;
    let program = main_only([
        Stmt::block([Stmt::decl("inner", Type::Int, Some(Expr::int(1)))]),
        ret(int_var("inner")),
    ]);
    assert!(matches!(compile_error(&program), CodegenError::UnknownSymbol(_)));
}

#[test]
fn test_call_before_declaration() {
    let program = main_only([ret(Expr::call("later", [], Type::Int))]);
    assert!(matches!(
        compile_error(&program),
        CodegenError::UnknownFunction(name) if name.as_str() == "later"
    ));
}

#[test]
fn test_arity_mismatch() {
    let id = function("id", Type::Int, [param("v", Type::Int)], [ret(int_var("v"))]);
    let program = program_with_main([id], [ret(Expr::call("id", [], Type::Int))]);
    assert!(matches!(
        compile_error(&program),
        CodegenError::ArityMismatch {
            expected: 1,
            found: 0,
            ..
        }
    ));
}

#[test]
fn test_constant_index_out_of_bounds() {
    let a = || Expr::var("a", Type::array(Type::Int, 5));
    let program = main_only([
        Stmt::decl("a", Type::array(Type::Int, 5), None),
        assign(Expr::index(a(), Expr::int(5)), Expr::int(1)),
        ret(Expr::int(0)),
    ]);
    assert!(matches!(
        compile_error(&program),
        CodegenError::IndexOutOfBounds { index: 5, len: 5 }
    ));
}

#[test]
fn test_swizzle_lane_beyond_arity() {
    // vec2 v; float f = v.z;
    let program = main_only([
        Stmt::decl("v", Type::Vec2, None),
        Stmt::decl("f", Type::Float, Some(Expr::field(Expr::var("v", Type::Vec2), "z"))),
        ret(Expr::int(0)),
    ]);
    assert!(matches!(
        compile_error(&program),
        CodegenError::InvalidSwizzle { base: Type::Vec2, .. }
    ));
}

#[test]
fn test_non_constant_global_initializer() {
    let program = program_with_main(
        [
            global("a", Type::Int, Some(Expr::int(1))),
            global("b", Type::Int, Some(int_var("a"))),
        ],
        [ret(Expr::int(0))],
    );
    assert!(matches!(
        compile_error(&program),
        CodegenError::NonConstantInitializer(name) if name.as_str() == "b"
    ));
}

#[test]
fn test_local_redefinition() {
    let program = main_only([
        Stmt::decl("x", Type::Int, None),
        Stmt::decl("x", Type::Float, None),
        ret(Expr::int(0)),
    ]);
    assert!(matches!(compile_error(&program), CodegenError::Redefinition { .. }));
}

#[test]
fn test_global_redefinition() {
    let program = program_with_main(
        [global("g", Type::Int, None), global("g", Type::Int, None)],
        [ret(Expr::int(0))],
    );
    assert!(matches!(compile_error(&program), CodegenError::Redefinition { .. }));
}

#[test]
fn test_function_defined_twice() {
    let body = || [ret(Expr::int(1))];
    let program = program_with_main(
        [function("f", Type::Int, [], body()), function("f", Type::Int, [], body())],
        [ret(Expr::int(0))],
    );
    assert!(matches!(compile_error(&program), CodegenError::Redefinition { .. }));
}

#[test]
fn test_prototype_after_definition_is_accepted() {
    let program = program_with_main(
        [
            function("f", Type::Int, [], [ret(Expr::int(1))]),
            Decl::Fn(FnDecl::new("f", Type::Int, [], None)),
        ],
        [ret(Expr::call("f", [], Type::Int))],
    );
    assert!(compile_to_object(&program).is_ok());
}

#[test]
fn test_mistyped_expression_is_reported() {
    // an int constant annotated as float
    let bogus = Expr::new(ExprKind::IntConstant(1), Type::Float);
    let program = main_only([Stmt::decl("f", Type::Float, Some(bogus)), ret(Expr::int(0))]);
    assert!(matches!(
        compile_error(&program),
        CodegenError::TypeDivergence {
            expected: Type::Float,
            found: Type::Int,
        }
    ));
}
