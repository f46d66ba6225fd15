use std::collections::HashMap;

use super::CodegenError;
use crate::{ast, ir};

/// Where a symbol's cell lives. Both variants hold a pointer-typed value;
/// the distinction tracks whether the cell is a module global (promoted
/// main-block declaration) or a stack slot.
#[derive(Clone, Debug)]
pub enum Storage {
    Global(ir::Value),
    Local(ir::Value),
}

impl Storage {
    pub fn ptr(&self) -> &ir::Value {
        match self {
            Storage::Global(ptr) => ptr,
            Storage::Local(ptr) => ptr,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Symbol {
    pub name: String,
    pub ty: ast::Type,
    pub storage: Storage,
    /// Set for `const` definitions; assignment is rejected.
    pub immutable: bool,
}

/// Name to symbol mapping for the scope currently being lowered.
///
/// Scoping works by snapshotting the whole table on entry to a routine or
/// block body and restoring the snapshot on exit, so inner declarations and
/// shadows simply vanish. Within one scope a name may be bound only once.
#[derive(Clone, Default)]
pub struct SymbolTable {
    symbols: HashMap<String, Symbol>,
}

impl SymbolTable {
    pub fn insert(&mut self, symbol: Symbol) -> Result<(), CodegenError> {
        if self.symbols.contains_key(&symbol.name) {
            return Err(CodegenError::new(format!(
                "Failed to add new symbol - symbol already exists: {}",
                symbol.name
            )));
        }
        self.symbols.insert(symbol.name.clone(), symbol);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    pub fn snapshot(&self) -> SymbolTable {
        self.clone()
    }
}
