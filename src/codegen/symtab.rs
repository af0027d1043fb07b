//! Scoped symbol table and shadow type reconstruction.
//!
//! The table is a stack of scopes, innermost last. Scope 0 holds globals and
//! functions and is never popped; blocks, loop headers and function parameter
//! lists each get their own scope.
//!
//! Backend values do not say what source type they carry (every vector is an
//! `f32x4`, and an address is just a pointer-sized integer), so
//! [`element_type_of`] recovers the source type from the value classification.

use cranelift_codegen::ir::StackSlot;
use cranelift_module::{DataId, FuncId};
use hashbrown::HashMap;
use log::trace;
use thin_vec::ThinVec;

use crate::ast::{Name, Type};
use crate::codegen::emit::Emitted;
use crate::codegen::error::{CodegenError, CodegenResult};

/// Backend handle behind a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    Stack(StackSlot),
    Global(DataId),
    Function(FuncId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Function {
        params: ThinVec<Type>,
        /// false while only a prototype has been seen
        is_defined: bool,
    },
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: Name,
    pub kind: SymbolKind,
    pub storage: Storage,
    /// Declared type of a variable, return type of a function.
    pub ty: Type,
}

impl Symbol {
    pub fn variable(name: Name, storage: Storage, ty: Type) -> Self {
        Symbol {
            name,
            kind: SymbolKind::Variable,
            storage,
            ty,
        }
    }

    pub fn function(name: Name, id: FuncId, params: ThinVec<Type>, return_type: Type, is_defined: bool) -> Self {
        Symbol {
            name,
            kind: SymbolKind::Function { params, is_defined },
            storage: Storage::Function(id),
            ty: return_type,
        }
    }

    pub fn is_function(&self) -> bool {
        matches!(self.kind, SymbolKind::Function { .. })
    }
}

#[derive(Debug, Default)]
struct Scope {
    symbols: HashMap<Name, Symbol>,
}

#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            scopes: vec![Scope::default()],
        }
    }

    pub fn push(&mut self) {
        self.scopes.push(Scope::default());
        trace!("SymbolTable: pushed scope, depth {}", self.scopes.len());
    }

    pub fn pop(&mut self) -> CodegenResult<()> {
        if self.scopes.len() == 1 {
            return Err(CodegenError::ScopeUnderflow);
        }
        self.scopes.pop();
        trace!("SymbolTable: popped scope, depth {}", self.scopes.len());
        Ok(())
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_global_scope(&self) -> bool {
        self.scopes.len() == 1
    }

    /// Bind `name` in the innermost scope. An existing binding of the same name in
    /// that scope is replaced and handed back; deciding whether that is legal is
    /// left to the caller.
    pub fn insert(&mut self, name: Name, symbol: Symbol) -> Option<Symbol> {
        self.innermost_mut().symbols.insert(name, symbol)
    }

    /// Search innermost to outermost.
    pub fn find(&self, name: Name) -> Option<&Symbol> {
        self.scopes.iter().rev().find_map(|scope| scope.symbols.get(&name))
    }

    pub fn find_in_current_scope(&self, name: Name) -> Option<&Symbol> {
        self.scopes.last().and_then(|scope| scope.symbols.get(&name))
    }

    /// Functions live in the global scope; local variables never hide them.
    pub fn find_function(&self, name: Name) -> Option<&Symbol> {
        self.scopes[0].symbols.get(&name).filter(|symbol| symbol.is_function())
    }

    fn innermost_mut(&mut self) -> &mut Scope {
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }
}

/// Source type carried by a lowered value.
///
/// Storage cells report their declared type, extracts are always `float`, and
/// shuffles are vectors of their own lane count. RValues (literals included)
/// record their type when they are created.
pub fn element_type_of(emitted: &Emitted) -> Type {
    match emitted {
        Emitted::Void => Type::Void,
        Emitted::Address(place) => place.ty.clone(),
        Emitted::SwizzleExtract(_) => Type::Float,
        Emitted::SwizzleShuffle(swizzle) => {
            Type::vector(swizzle.lanes.len()).unwrap_or(Type::Void)
        }
        Emitted::RValue(value) => value.ty.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cranelift_codegen::entity::EntityRef;

    fn var(name: &str, slot: usize, ty: Type) -> Symbol {
        Symbol::variable(Name::from(name), Storage::Stack(StackSlot::new(slot)), ty)
    }

    #[test]
    fn test_inner_scope_shadows_outer() {
        let mut table = SymbolTable::new();
        let x = Name::from("x");
        table.insert(x, var("x", 0, Type::Int));
        table.push();
        table.insert(x, var("x", 1, Type::Float));
        assert_eq!(table.find(x).unwrap().ty, Type::Float);
        table.pop().unwrap();
        assert_eq!(table.find(x).unwrap().ty, Type::Int);
    }

    #[test]
    fn test_inner_name_unreachable_after_pop() {
        let mut table = SymbolTable::new();
        let y = Name::from("y");
        table.push();
        table.insert(y, var("y", 0, Type::Int));
        assert!(table.find(y).is_some());
        table.pop().unwrap();
        assert!(table.find(y).is_none());
    }

    #[test]
    fn test_sibling_scopes_do_not_collide() {
        let mut table = SymbolTable::new();
        let t = Name::from("t");
        table.push();
        table.insert(t, var("t", 0, Type::Int));
        table.pop().unwrap();
        table.push();
        assert!(table.find(t).is_none());
        table.insert(t, var("t", 1, Type::Vec2));
        assert_eq!(table.find(t).unwrap().ty, Type::Vec2);
        table.pop().unwrap();
    }

    #[test]
    fn test_same_scope_insert_returns_previous() {
        let mut table = SymbolTable::new();
        let z = Name::from("z");
        assert!(table.insert(z, var("z", 0, Type::Int)).is_none());
        let previous = table.insert(z, var("z", 1, Type::Bool)).unwrap();
        assert_eq!(previous.ty, Type::Int);
        assert_eq!(table.find(z).unwrap().ty, Type::Bool);
    }

    #[test]
    fn test_find_in_current_scope_ignores_outer() {
        let mut table = SymbolTable::new();
        let g = Name::from("g");
        table.insert(g, var("g", 0, Type::Int));
        table.push();
        assert!(table.find_in_current_scope(g).is_none());
        assert!(table.find(g).is_some());
    }

    #[test]
    fn test_global_scope_cannot_be_popped() {
        let mut table = SymbolTable::new();
        assert!(table.is_global_scope());
        assert!(matches!(table.pop(), Err(CodegenError::ScopeUnderflow)));
        assert_eq!(table.depth(), 1);
    }

    #[test]
    fn test_find_function_skips_variables() {
        let mut table = SymbolTable::new();
        let f = Name::from("f");
        table.insert(
            f,
            Symbol::function(f, FuncId::new(0), ThinVec::new(), Type::Int, true),
        );
        table.push();
        table.insert(f, var("f", 0, Type::Float));
        assert!(!table.find(f).unwrap().is_function());
        assert!(table.find_function(f).is_some());
        assert!(table.find_function(Name::from("missing")).is_none());
    }
}
