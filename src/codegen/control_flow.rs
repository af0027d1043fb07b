//! Statement and control-flow lowering.
//!
//! Every construct creates all of its blocks up front, registers its footer on
//! the target stacks, and only adds a fallthrough branch out of a sub-body when
//! that body left its last block open.

use cranelift_frontend::Switch;
use hashbrown::HashSet;
use log::debug;

use crate::ast::{ForInit, ForStmt, IfStmt, Stmt, StmtBlock, SwitchStmt, Type, WhileStmt};
use crate::codegen::const_eval::case_label;
use crate::codegen::context::FunctionLowering;
use crate::codegen::emit::Emit;
use crate::codegen::error::{CodegenError, CodegenResult};

impl FunctionLowering<'_, '_> {
    pub(crate) fn lower_stmt(&mut self, stmt: &Stmt) -> CodegenResult<()> {
        self.ensure_open_block();
        match stmt {
            Stmt::Block(block) => self.lower_block(block),
            Stmt::Decl(var) => self.emit_local(var),
            Stmt::Expr(expr) => {
                expr.emit(self)?;
                Ok(())
            }
            Stmt::If(if_stmt) => self.lower_if(if_stmt),
            Stmt::While(while_stmt) => self.lower_while(while_stmt),
            Stmt::For(for_stmt) => self.lower_for(for_stmt),
            Stmt::Switch(switch_stmt) => self.lower_switch(switch_stmt),
            Stmt::Break => {
                let target = self.targets.break_target()?;
                self.jump(target)
            }
            Stmt::Continue => {
                let target = self.targets.continue_target()?;
                self.jump(target)
            }
            Stmt::Return(value) => match value {
                Some(expr) => {
                    let emitted = expr.emit(self)?;
                    let value = self.materialize(emitted)?;
                    self.ret(&[value.value])
                }
                None => self.ret(&[]),
            },
        }
    }

    /// A braced block opens its own scope.
    pub(crate) fn lower_block(&mut self, block: &StmtBlock) -> CodegenResult<()> {
        self.symbols.push();
        for stmt in &block.stmts {
            stmt.emit(self)?;
        }
        self.symbols.pop()
    }

    fn lower_if(&mut self, stmt: &IfStmt) -> CodegenResult<()> {
        let then_block = self.builder.create_block();
        let else_block = stmt.else_body.as_ref().map(|_| self.builder.create_block());
        let footer = self.builder.create_block();
        self.targets.enter(footer, None, None);

        let cond = stmt.test.emit(self)?;
        let cond = self.materialize(cond)?;
        self.brif(cond.value, then_block, else_block.unwrap_or(footer))?;

        self.switch_to_block(then_block);
        stmt.then_body.emit(self)?;
        self.jump_to_block(footer);

        if let (Some(else_block), Some(else_body)) = (else_block, &stmt.else_body) {
            self.switch_to_block(else_block);
            else_body.emit(self)?;
            self.jump_to_block(footer);
        }

        self.targets.leave(footer)?;
        self.switch_to_block(footer);
        Ok(())
    }

    fn lower_while(&mut self, stmt: &WhileStmt) -> CodegenResult<()> {
        let test_block = self.builder.create_block();
        let body_block = self.builder.create_block();
        let footer = self.builder.create_block();
        self.targets.enter(footer, Some(footer), Some(test_block));
        debug!("{}: while loop, test {} footer {}", self.function, test_block, footer);

        self.jump_to_block(test_block);
        self.switch_to_block(test_block);
        let cond = stmt.test.emit(self)?;
        let cond = self.materialize(cond)?;
        self.brif(cond.value, body_block, footer)?;

        self.switch_to_block(body_block);
        stmt.body.emit(self)?;
        self.jump_to_block(test_block);

        self.targets.leave(footer)?;
        self.switch_to_block(footer);
        Ok(())
    }

    fn lower_for(&mut self, stmt: &ForStmt) -> CodegenResult<()> {
        let header_block = self.builder.create_block();
        let body_block = self.builder.create_block();
        let step_block = self.builder.create_block();
        let footer = self.builder.create_block();
        debug!("{}: for loop, header {} footer {}", self.function, header_block, footer);

        // a declaration in the initializer is visible in the whole loop only
        self.symbols.push();
        match &stmt.init {
            Some(ForInit::Decl(var)) => self.emit_local(var)?,
            Some(ForInit::Expr(expr)) => {
                expr.emit(self)?;
            }
            None => {}
        }
        self.targets.enter(footer, Some(footer), Some(step_block));

        self.jump_to_block(header_block);
        self.switch_to_block(header_block);
        match &stmt.test {
            Some(test) => {
                let cond = test.emit(self)?;
                let cond = self.materialize(cond)?;
                self.brif(cond.value, body_block, footer)?;
            }
            None => self.jump(body_block)?,
        }

        self.switch_to_block(body_block);
        stmt.body.emit(self)?;
        self.jump_to_block(step_block);

        self.switch_to_block(step_block);
        if let Some(step) = &stmt.step {
            step.emit(self)?;
        }
        self.jump_to_block(header_block);

        self.targets.leave(footer)?;
        self.switch_to_block(footer);
        self.symbols.pop()
    }

    fn lower_switch(&mut self, stmt: &SwitchStmt) -> CodegenResult<()> {
        let case_blocks: Vec<_> = stmt.cases.iter().map(|_| self.builder.create_block()).collect();
        let exit_block = self.builder.create_block();

        let scrutinee = stmt.expr.emit(self)?;
        let scrutinee = self.materialize(scrutinee)?;
        if scrutinee.ty != Type::Int {
            return Err(CodegenError::TypeDivergence {
                expected: Type::Int,
                found: scrutinee.ty,
            });
        }

        let mut table = Switch::new();
        let mut seen = HashSet::new();
        let mut default_block = None;
        for (case, &block) in stmt.cases.iter().zip(&case_blocks) {
            match &case.label {
                None => {
                    if default_block.replace(block).is_some() {
                        return Err(CodegenError::DuplicateDefault);
                    }
                }
                Some(label) => {
                    let label = case_label(label)?;
                    if !seen.insert(label) {
                        return Err(CodegenError::DuplicateCaseLabel(i64::from(label)));
                    }
                    // entries are keyed on the raw bits of the i32 scrutinee
                    table.set_entry(u128::from(label as u32), block);
                }
            }
        }
        debug!(
            "{}: switch with {} cases, default {}",
            self.function,
            seen.len(),
            default_block.is_some()
        );
        self.branch_table(table, scrutinee.value, default_block.unwrap_or(exit_block))?;

        self.targets.enter(exit_block, Some(exit_block), None);
        self.symbols.push();
        for (index, case) in stmt.cases.iter().enumerate() {
            self.switch_to_block(case_blocks[index]);
            for stmt in &case.body {
                stmt.emit(self)?;
            }
            // unterminated cases fall into the next one
            let next = case_blocks.get(index + 1).copied().unwrap_or(exit_block);
            self.jump_to_block(next);
        }
        self.symbols.pop()?;
        self.targets.leave(exit_block)?;
        self.switch_to_block(exit_block);
        Ok(())
    }
}
