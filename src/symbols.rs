//! Variable scopes and the function directory.

use crate::address::{Address, VirtualAddressManager};
use crate::errors::SemanticError;
use crate::position::Position;
use crate::types::Type;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    Local,
    Param,
}

impl ScopeKind {
    fn label(self) -> &'static str {
        match self {
            ScopeKind::Global => "global",
            ScopeKind::Local => "local",
            ScopeKind::Param => "parameter",
        }
    }
}

#[derive(Debug, Clone)]
pub struct VariableEntry {
    pub name: String,
    pub ty: Type,
    pub scope: ScopeKind,
    pub declared_at: Position,
    pub address: Address,
}

/// A single scope's variables, insertion-ordered for deterministic output.
#[derive(Debug, Default)]
pub struct VariableTable {
    entries: HashMap<String, VariableEntry>,
    order: Vec<String>,
}

impl VariableTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&VariableEntry> {
        self.entries.get(name)
    }

    pub fn add(&mut self, entry: VariableEntry) -> Result<(), SemanticError> {
        if let Some(existing) = self.entries.get(&entry.name) {
            return Err(SemanticError::DuplicateSymbol {
                name: entry.name.clone(),
                scope: entry.scope.label().to_string(),
                first: existing.declared_at,
                second: entry.declared_at,
            });
        }
        self.order.push(entry.name.clone());
        self.entries.insert(entry.name.clone(), entry);
        Ok(())
    }

    pub fn entries(&self) -> Vec<&VariableEntry> {
        self.order.iter().map(|n| &self.entries[n]).collect()
    }
}

#[derive(Debug)]
pub struct FunctionEntry {
    pub name: String,
    pub return_type: Type,
    pub declared_at: Position,
    pub params: Vec<VariableEntry>,
    pub locals: VariableTable,
    /// The quadruple index execution jumps to when this function is called.
    pub start_quad: Option<usize>,
}

impl FunctionEntry {
    fn new(name: String, return_type: Type, declared_at: Position) -> Self {
        FunctionEntry {
            name,
            return_type,
            declared_at,
            params: Vec::new(),
            locals: VariableTable::new(),
            start_quad: None,
        }
    }
}

/// The whole-program symbol table: globals plus one entry per function.
/// Functions are stored in insertion order (not a hash map's iteration order)
/// so `.patitoc` serialization is deterministic byte-for-byte.
#[derive(Debug, Default)]
pub struct FunctionDirectory {
    pub program_name: Option<String>,
    program_pos: Option<Position>,
    pub globals: VariableTable,
    functions: HashMap<String, FunctionEntry>,
    function_order: Vec<String>,
    active: Vec<String>,
}

impl FunctionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_program_name(&mut self, name: String, pos: Position) -> Result<(), SemanticError> {
        if let Some(existing) = &self.program_name {
            return Err(SemanticError::ProgramRedefinition {
                existing: existing.clone(),
                existing_pos: self.program_pos.unwrap_or(pos),
                redeclared_at: pos,
            });
        }
        self.program_name = Some(name);
        self.program_pos = Some(pos);
        Ok(())
    }

    pub fn declare_global(
        &mut self,
        name: String,
        ty: Type,
        pos: Position,
        addresses: &mut VirtualAddressManager,
    ) -> Result<Address, SemanticError> {
        let addr = addresses.next_global()?;
        self.globals.add(VariableEntry {
            name,
            ty,
            scope: ScopeKind::Global,
            declared_at: pos,
            address: addr,
        })?;
        Ok(addr)
    }

    /// Opens a new function scope, registering it in the directory and
    /// resetting the local address counter. The scope stays "active" (the top
    /// of `self.active`) until `close_function` is called.
    pub fn open_function(
        &mut self,
        name: String,
        return_type: Type,
        pos: Position,
        addresses: &mut VirtualAddressManager,
    ) -> Result<(), SemanticError> {
        if let Some(existing) = self.functions.get(&name) {
            return Err(SemanticError::FunctionRedefinition {
                name,
                existing: existing.declared_at,
                redeclared_at: pos,
            });
        }
        addresses.reset_locals();
        let entry = FunctionEntry::new(name.clone(), return_type, pos);
        self.function_order.push(name.clone());
        self.functions.insert(name.clone(), entry);
        self.active.push(name);
        Ok(())
    }

    pub fn declare_param(
        &mut self,
        name: String,
        ty: Type,
        pos: Position,
        addresses: &mut VirtualAddressManager,
    ) -> Result<Address, SemanticError> {
        let addr = addresses.next_local()?;
        let func_name = self.active_name().to_string();
        let func = self.functions.get_mut(&func_name).expect("active function must exist");
        let entry = VariableEntry {
            name,
            ty,
            scope: ScopeKind::Param,
            declared_at: pos,
            address: addr,
        };
        func.params.push(entry.clone());
        func.locals.add(entry)?;
        Ok(addr)
    }

    pub fn declare_local(
        &mut self,
        name: String,
        ty: Type,
        pos: Position,
        addresses: &mut VirtualAddressManager,
    ) -> Result<Address, SemanticError> {
        let addr = addresses.next_local()?;
        let func_name = self.active_name().to_string();
        let func = self.functions.get_mut(&func_name).expect("active function must exist");
        func.locals.add(VariableEntry {
            name,
            ty,
            scope: ScopeKind::Local,
            declared_at: pos,
            address: addr,
        })?;
        Ok(addr)
    }

    pub fn set_start_quad(&mut self, index: usize) {
        let func_name = self.active_name().to_string();
        self.functions.get_mut(&func_name).unwrap().start_quad = Some(index);
    }

    pub fn close_function(&mut self) {
        self.active.pop();
    }

    pub fn active_name(&self) -> &str {
        self.active.last().expect("no function scope is open")
    }

    pub fn active_function(&self) -> &FunctionEntry {
        &self.functions[self.active_name()]
    }

    /// `main`'s body is parsed with no function scope open (it declares no
    /// params/locals of its own and is implicitly void-returning); these two
    /// accessors fall back to that implicit identity instead of panicking so
    /// `return` inside `main` resolves against `Type::Void`.
    pub fn active_label(&self) -> &str {
        self.active.last().map(String::as_str).unwrap_or("main")
    }

    pub fn active_return_type(&self) -> Type {
        match self.active.last() {
            Some(name) => self.functions[name].return_type,
            None => Type::Void,
        }
    }

    pub fn get(&self, name: &str) -> Option<&FunctionEntry> {
        self.functions.get(name)
    }

    /// All functions in declaration order, for deterministic serialization.
    pub fn functions_in_order(&self) -> Vec<&FunctionEntry> {
        self.function_order.iter().map(|n| &self.functions[n]).collect()
    }

    /// Resolves an identifier's type against the active function's locals
    /// first, then globals. Replaces the original implementation's hardcoded
    /// lookup through a fixed `"main"` function entry with a real active-scope
    /// handle (see DESIGN.md).
    pub fn resolve_type(&self, name: &str) -> Option<Type> {
        if let Some(active) = self.active.last() {
            if let Some(entry) = self.functions[active].locals.get(name) {
                return Some(entry.ty);
            }
        }
        self.globals.get(name).map(|e| e.ty)
    }

    pub fn resolve_address(&self, name: &str) -> Option<Address> {
        if let Some(active) = self.active.last() {
            if let Some(entry) = self.functions[active].locals.get(name) {
                return Some(entry.address);
            }
        }
        self.globals.get(name).map(|e| e.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos() -> Position {
        Position::start()
    }

    #[test]
    fn redeclaring_a_global_is_an_error() {
        let mut dir = FunctionDirectory::new();
        let mut addrs = VirtualAddressManager::new();
        dir.declare_global("x".into(), Type::Int, pos(), &mut addrs).unwrap();
        let err = dir
            .declare_global("x".into(), Type::Float, pos(), &mut addrs)
            .unwrap_err();
        assert!(matches!(err, SemanticError::DuplicateSymbol { .. }));
    }

    #[test]
    fn redeclaring_a_function_is_an_error() {
        let mut dir = FunctionDirectory::new();
        let mut addrs = VirtualAddressManager::new();
        dir.open_function("f".into(), Type::Void, pos(), &mut addrs).unwrap();
        dir.close_function();
        let err = dir
            .open_function("f".into(), Type::Int, pos(), &mut addrs)
            .unwrap_err();
        assert!(matches!(err, SemanticError::FunctionRedefinition { .. }));
    }

    #[test]
    fn locals_resolve_over_globals_in_the_active_function() {
        let mut dir = FunctionDirectory::new();
        let mut addrs = VirtualAddressManager::new();
        dir.declare_global("x".into(), Type::Int, pos(), &mut addrs).unwrap();
        dir.open_function("f".into(), Type::Void, pos(), &mut addrs).unwrap();
        dir.declare_local("x".into(), Type::Float, pos(), &mut addrs).unwrap();
        assert_eq!(dir.resolve_type("x"), Some(Type::Float));
        dir.close_function();
        assert_eq!(dir.resolve_type("x"), Some(Type::Int));
    }

    #[test]
    fn function_order_is_insertion_order_not_hash_order() {
        let mut dir = FunctionDirectory::new();
        let mut addrs = VirtualAddressManager::new();
        for name in ["zeta", "alpha", "mid"] {
            dir.open_function(name.into(), Type::Void, pos(), &mut addrs).unwrap();
            dir.close_function();
        }
        let names: Vec<&str> = dir.functions_in_order().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }
}
