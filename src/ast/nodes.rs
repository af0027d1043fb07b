//! AST node definitions and constructors.
//!
//! The tree is produced by the parser and annotated by the analysis phase; code
//! generation only reads it. Every [`Expr`] carries its resolved [`Type`], and the
//! constructors below compute that type the same way analysis would for
//! well-typed input.

use thin_vec::ThinVec;

use crate::ast::{Name, Type};

/// A whole translation unit.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub decls: ThinVec<Decl>,
}

impl Program {
    pub fn new(decls: impl IntoIterator<Item = Decl>) -> Self {
        Program {
            decls: decls.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Decl {
    Var(VarDecl),
    Fn(FnDecl),
}

impl Decl {
    pub fn name(&self) -> Name {
        match self {
            Decl::Var(var) => var.name,
            Decl::Fn(func) => func.name,
        }
    }
}

/// Variable declaration, also used for function parameters.
#[derive(Debug, Clone)]
pub struct VarDecl {
    pub name: Name,
    pub ty: Type,
    pub init: Option<Expr>,
}

impl VarDecl {
    pub fn new(name: &str, ty: Type, init: Option<Expr>) -> Self {
        VarDecl {
            name: Name::from(name),
            ty,
            init,
        }
    }
}

/// Function declaration. A declaration without a body is a prototype.
#[derive(Debug, Clone)]
pub struct FnDecl {
    pub name: Name,
    pub return_type: Type,
    pub params: ThinVec<VarDecl>,
    pub body: Option<StmtBlock>,
}

impl FnDecl {
    pub fn new(
        name: &str,
        return_type: Type,
        params: impl IntoIterator<Item = VarDecl>,
        body: Option<StmtBlock>,
    ) -> Self {
        FnDecl {
            name: Name::from(name),
            return_type,
            params: params.into_iter().collect(),
            body,
        }
    }

    pub fn is_prototype(&self) -> bool {
        self.body.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct StmtBlock {
    pub stmts: ThinVec<Stmt>,
}

impl StmtBlock {
    pub fn new(stmts: impl IntoIterator<Item = Stmt>) -> Self {
        StmtBlock {
            stmts: stmts.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Block(StmtBlock),
    Decl(VarDecl),
    Expr(Expr),
    If(IfStmt),
    While(WhileStmt),
    For(ForStmt),
    Switch(SwitchStmt),
    Break,
    Continue,
    Return(Option<Expr>),
}

#[derive(Debug, Clone)]
pub struct IfStmt {
    pub test: Expr,
    pub then_body: Box<Stmt>,
    pub else_body: Option<Box<Stmt>>,
}

#[derive(Debug, Clone)]
pub struct WhileStmt {
    pub test: Expr,
    pub body: Box<Stmt>,
}

#[derive(Debug, Clone)]
pub enum ForInit {
    Decl(VarDecl),
    Expr(Expr),
}

#[derive(Debug, Clone)]
pub struct ForStmt {
    pub init: Option<ForInit>,
    pub test: Option<Expr>,
    pub step: Option<Expr>,
    pub body: Box<Stmt>,
}

#[derive(Debug, Clone)]
pub struct SwitchStmt {
    pub expr: Expr,
    pub cases: ThinVec<SwitchCase>,
}

/// One `case label:` or `default:` arm together with the statements under it.
#[derive(Debug, Clone)]
pub struct SwitchCase {
    /// `None` marks the default arm.
    pub label: Option<Expr>,
    pub body: ThinVec<Stmt>,
}

impl SwitchCase {
    pub fn case(label: Expr, body: impl IntoIterator<Item = Stmt>) -> Self {
        SwitchCase {
            label: Some(label),
            body: body.into_iter().collect(),
        }
    }

    pub fn default(body: impl IntoIterator<Item = Stmt>) -> Self {
        SwitchCase {
            label: None,
            body: body.into_iter().collect(),
        }
    }

    pub fn is_default(&self) -> bool {
        self.label.is_none()
    }
}

impl Stmt {
    pub fn block(stmts: impl IntoIterator<Item = Stmt>) -> Stmt {
        Stmt::Block(StmtBlock::new(stmts))
    }

    pub fn decl(name: &str, ty: Type, init: Option<Expr>) -> Stmt {
        Stmt::Decl(VarDecl::new(name, ty, init))
    }

    pub fn if_(test: Expr, then_body: Stmt, else_body: Option<Stmt>) -> Stmt {
        Stmt::If(IfStmt {
            test,
            then_body: Box::new(then_body),
            else_body: else_body.map(Box::new),
        })
    }

    pub fn while_(test: Expr, body: Stmt) -> Stmt {
        Stmt::While(WhileStmt {
            test,
            body: Box::new(body),
        })
    }

    pub fn for_(init: Option<ForInit>, test: Option<Expr>, step: Option<Expr>, body: Stmt) -> Stmt {
        Stmt::For(ForStmt {
            init,
            test,
            step,
            body: Box::new(body),
        })
    }

    pub fn switch(expr: Expr, cases: impl IntoIterator<Item = SwitchCase>) -> Stmt {
        Stmt::Switch(SwitchStmt {
            expr,
            cases: cases.into_iter().collect(),
        })
    }

    pub fn ret(value: Option<Expr>) -> Stmt {
        Stmt::Return(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// Prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
    PreInc,
    PreDec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostfixOp {
    Inc,
    Dec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelOp {
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EqOp {
    Equal,
    NotEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    MulAssign,
    DivAssign,
    AddAssign,
    SubAssign,
}

impl AssignOp {
    /// The arithmetic operator a compound assignment applies.
    pub fn arith(self) -> Option<ArithOp> {
        match self {
            AssignOp::Assign => None,
            AssignOp::MulAssign => Some(ArithOp::Mul),
            AssignOp::DivAssign => Some(ArithOp::Div),
            AssignOp::AddAssign => Some(ArithOp::Add),
            AssignOp::SubAssign => Some(ArithOp::Sub),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Type,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    IntConstant(i32),
    FloatConstant(f32),
    BoolConstant(bool),
    Var(Name),
    Arithmetic(ArithOp, Box<Expr>, Box<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Relational(RelOp, Box<Expr>, Box<Expr>),
    Equality(EqOp, Box<Expr>, Box<Expr>),
    Logical(LogicalOp, Box<Expr>, Box<Expr>),
    Assign(AssignOp, Box<Expr> /* target */, Box<Expr> /* value */),
    Postfix(PostfixOp, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
    ArrayAccess(Box<Expr> /* base */, Box<Expr> /* index */),
    FieldAccess(Box<Expr>, Name),
    Call(Name, ThinVec<Expr>),
}

/// Result type of an arithmetic operator: a vector operand wins over a scalar.
fn arith_result_type(lhs: &Type, rhs: &Type) -> Type {
    if rhs.is_vector() && !lhs.is_vector() {
        rhs.clone()
    } else {
        lhs.clone()
    }
}

impl Expr {
    pub fn new(kind: ExprKind, ty: Type) -> Self {
        Expr { kind, ty }
    }

    pub fn int(value: i32) -> Expr {
        Expr::new(ExprKind::IntConstant(value), Type::Int)
    }

    pub fn float(value: f32) -> Expr {
        Expr::new(ExprKind::FloatConstant(value), Type::Float)
    }

    pub fn bool(value: bool) -> Expr {
        Expr::new(ExprKind::BoolConstant(value), Type::Bool)
    }

    pub fn var(name: &str, ty: Type) -> Expr {
        Expr::new(ExprKind::Var(Name::from(name)), ty)
    }

    pub fn arith(op: ArithOp, lhs: Expr, rhs: Expr) -> Expr {
        let ty = arith_result_type(&lhs.ty, &rhs.ty);
        Expr::new(ExprKind::Arithmetic(op, Box::new(lhs), Box::new(rhs)), ty)
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Expr {
        let ty = operand.ty.clone();
        Expr::new(ExprKind::Unary(op, Box::new(operand)), ty)
    }

    pub fn postfix(op: PostfixOp, operand: Expr) -> Expr {
        let ty = operand.ty.clone();
        Expr::new(ExprKind::Postfix(op, Box::new(operand)), ty)
    }

    pub fn relational(op: RelOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::new(ExprKind::Relational(op, Box::new(lhs), Box::new(rhs)), Type::Bool)
    }

    pub fn equality(op: EqOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::new(ExprKind::Equality(op, Box::new(lhs), Box::new(rhs)), Type::Bool)
    }

    pub fn logical(op: LogicalOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::new(ExprKind::Logical(op, Box::new(lhs), Box::new(rhs)), Type::Bool)
    }

    pub fn assign(op: AssignOp, target: Expr, value: Expr) -> Expr {
        let ty = match op {
            AssignOp::Assign => target.ty.clone(),
            _ => arith_result_type(&target.ty, &value.ty),
        };
        Expr::new(ExprKind::Assign(op, Box::new(target), Box::new(value)), ty)
    }

    pub fn conditional(cond: Expr, then_expr: Expr, else_expr: Expr) -> Expr {
        let ty = then_expr.ty.clone();
        Expr::new(
            ExprKind::Conditional(Box::new(cond), Box::new(then_expr), Box::new(else_expr)),
            ty,
        )
    }

    pub fn index(base: Expr, index: Expr) -> Expr {
        let ty = match &base.ty {
            Type::Array(elem, _) => (**elem).clone(),
            other => other.clone(),
        };
        Expr::new(ExprKind::ArrayAccess(Box::new(base), Box::new(index)), ty)
    }

    pub fn field(base: Expr, field: &str) -> Expr {
        let ty = match field.len() {
            1 => Type::Float,
            n => Type::vector(n).unwrap_or(Type::Void),
        };
        Expr::new(ExprKind::FieldAccess(Box::new(base), Name::from(field)), ty)
    }

    pub fn call(callee: &str, args: impl IntoIterator<Item = Expr>, return_type: Type) -> Expr {
        Expr::new(
            ExprKind::Call(Name::from(callee), args.into_iter().collect()),
            return_type,
        )
    }

    pub fn stmt(self) -> Stmt {
        Stmt::Expr(self)
    }
}
