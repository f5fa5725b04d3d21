//! Arena-indexed scopes and symbols, with free-variable promotion.
//!
//! Scopes and symbols live in flat `Vec`s indexed by newtype ids
//! (`ScopeId`, `SymbolId`) rather than as a graph of real pointers/`Rc`s —
//! the same "typed index into a `Vec`" idiom the value arena uses for
//! `HeapId`.

use ahash::AHashMap;

use crate::ast::ExportScope;
use crate::error::BindError;
use crate::intern::StringId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(u32);

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: StringId,
    pub owning_scope: ScopeId,
    pub index: u32,
    pub is_defined: bool,
    pub usages: Vec<()>,
    pub errors: Vec<BindError>,
    pub child_table: Option<ScopeId>,
    /// Set when this symbol is a free capture resolved from a parent scope;
    /// holds the originating symbol and this function's free-slot ordinal.
    pub free_of: Option<(SymbolId, u32)>,
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub parent: Option<ScopeId>,
    pub export_level: ExportScope,
    pub symbols: AHashMap<StringId, SymbolId>,
    pub free_symbols: Vec<SymbolId>,
    next_index: u32,
}

impl Scope {
    fn new(parent: Option<ScopeId>, export_level: ExportScope) -> Self {
        Self {
            parent,
            export_level,
            symbols: AHashMap::new(),
            free_symbols: Vec::new(),
            next_index: 0,
        }
    }
}

/// Owns every scope and symbol created during binding.
#[derive(Debug, Default)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    symbols: Vec<Symbol>,
}

impl SymbolTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_scope(&mut self, parent: Option<ScopeId>, export_level: ExportScope) -> ScopeId {
        self.scopes.push(Scope::new(parent, export_level));
        ScopeId((self.scopes.len() - 1) as u32)
    }

    #[must_use]
    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    #[must_use]
    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0 as usize]
    }

    /// Every symbol ever inserted or looked up, in creation order. Used by
    /// the binder to sweep up recorded `BindError`s once a whole file has
    /// been walked.
    pub fn all_symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }

    /// Walks `from` up to the scope whose `export_level` promotion applies,
    /// per the promotion rule: a declaration promotes to the nearest
    /// ancestor scope whose `export_level` is at least as permissive as the
    /// declaration's own export scope (`Public` ≥ `Internal` ≥ `Local`).
    fn target_scope(&self, from: ScopeId, export: ExportScope) -> ScopeId {
        let rank = |e: ExportScope| match e {
            ExportScope::Public => 2,
            ExportScope::Internal => 1,
            ExportScope::Local => 0,
        };
        let want = rank(export);
        let mut current = from;
        loop {
            if rank(self.scope(current).export_level) <= want {
                return current;
            }
            match self.scope(current).parent {
                Some(parent) => current = parent,
                None => return current,
            }
        }
    }

    /// Inserts a declaration's name, applying scope promotion. If the name
    /// already exists in the target scope, records an already-defined error
    /// on the existing symbol and returns its id unchanged.
    pub fn insert(&mut self, from: ScopeId, export: ExportScope, name: StringId) -> SymbolId {
        let target = self.target_scope(from, export);
        if let Some(&existing) = self.scope(target).symbols.get(&name) {
            self.symbols[existing.0 as usize].errors.push(BindError::SymbolAlreadyDefined);
            return existing;
        }
        let index = self.scopes[target.0 as usize].next_index;
        self.scopes[target.0 as usize].next_index += 1;
        self.symbols.push(Symbol {
            name,
            owning_scope: target,
            index,
            is_defined: true,
            usages: Vec::new(),
            errors: Vec::new(),
            child_table: None,
            free_of: None,
        });
        let id = SymbolId((self.symbols.len() - 1) as u32);
        self.scopes[target.0 as usize].symbols.insert(name, id);
        id
    }

    pub fn set_child_table(&mut self, symbol: SymbolId, child: ScopeId) {
        self.symbols[symbol.0 as usize].child_table = Some(child);
    }

    /// Resolves `name` starting at `from`, walking parent scopes. A hit found
    /// in a strict ancestor of `from` (i.e. outside the current function's
    /// own scope) is re-registered in `from` as a free capture. A miss
    /// creates an undefined placeholder symbol with an unresolved-reference
    /// error so callers always get a `SymbolId` to attach further errors to.
    pub fn lookup(&mut self, from: ScopeId, name: StringId) -> SymbolId {
        let mut current = Some(from);
        while let Some(scope_id) = current {
            if let Some(&found) = self.scope(scope_id).symbols.get(&name) {
                if scope_id == from {
                    self.symbols[found.0 as usize].usages.push(());
                    return found;
                }
                return self.capture_as_free(from, found, name);
            }
            current = self.scope(scope_id).parent;
        }
        self.symbols.push(Symbol {
            name,
            owning_scope: from,
            index: u32::MAX,
            is_defined: false,
            usages: vec![()],
            errors: vec![BindError::UnresolvedReference],
            child_table: None,
            free_of: None,
        });
        SymbolId((self.symbols.len() - 1) as u32)
    }

    fn capture_as_free(&mut self, into_scope: ScopeId, parent_symbol: SymbolId, name: StringId) -> SymbolId {
        if let Some(&existing) = self.scope(into_scope).symbols.get(&name) {
            self.symbols[existing.0 as usize].usages.push(());
            return existing;
        }
        let free_index = self.scope(into_scope).free_symbols.len() as u32;
        self.symbols.push(Symbol {
            name,
            owning_scope: into_scope,
            index: u32::MAX,
            is_defined: true,
            usages: vec![()],
            errors: Vec::new(),
            child_table: None,
            free_of: Some((parent_symbol, free_index)),
        });
        let id = SymbolId((self.symbols.len() - 1) as u32);
        self.scopes[into_scope.0 as usize].symbols.insert(name, id);
        self.scopes[into_scope.0 as usize].free_symbols.push(id);
        id
    }

    /// Resolves a dotted reference `a.b.c` by resolving `a` then descending
    /// into each subsequent segment's owner's `child_table`.
    pub fn lookup_path(&mut self, from: ScopeId, segments: &[StringId]) -> Result<SymbolId, BindError> {
        let mut iter = segments.iter();
        let Some(&first) = iter.next() else {
            return Err(BindError::UnresolvedReference);
        };
        let mut current = self.lookup(from, first);
        for &segment in iter {
            let Some(child) = self.symbol(current).child_table else {
                return Err(BindError::ExpectedMemberOn);
            };
            current = self.lookup(child, segment);
        }
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intern::Interner;

    #[test]
    fn duplicate_insert_in_same_scope_records_error() {
        let mut table = SymbolTable::new();
        let mut interner = Interner::new();
        let scope = table.new_scope(None, ExportScope::Public);
        let name = interner.intern("x");
        let first = table.insert(scope, ExportScope::Local, name);
        let second = table.insert(scope, ExportScope::Local, name);
        assert_eq!(first, second);
        assert!(!table.symbol(first).errors.is_empty());
    }

    #[test]
    fn local_promotion_stops_at_innermost_scope() {
        let mut table = SymbolTable::new();
        let mut interner = Interner::new();
        let module = table.new_scope(None, ExportScope::Public);
        let file = table.new_scope(Some(module), ExportScope::Internal);
        let block = table.new_scope(Some(file), ExportScope::Local);
        let name = interner.intern("y");
        let sym = table.insert(block, ExportScope::Local, name);
        assert_eq!(table.symbol(sym).owning_scope, block);
    }

    #[test]
    fn public_promotes_to_module_scope() {
        let mut table = SymbolTable::new();
        let mut interner = Interner::new();
        let module = table.new_scope(None, ExportScope::Public);
        let file = table.new_scope(Some(module), ExportScope::Internal);
        let name = interner.intern("z");
        let sym = table.insert(file, ExportScope::Public, name);
        assert_eq!(table.symbol(sym).owning_scope, module);
    }

    #[test]
    fn lookup_across_scope_registers_free_capture() {
        let mut table = SymbolTable::new();
        let mut interner = Interner::new();
        let outer = table.new_scope(None, ExportScope::Public);
        let name = interner.intern("captured");
        let outer_sym = table.insert(outer, ExportScope::Local, name);
        let inner = table.new_scope(Some(outer), ExportScope::Local);
        let found = table.lookup(inner, name);
        assert_ne!(found, outer_sym);
        assert!(table.symbol(found).free_of.is_some());
        assert_eq!(table.scope(inner).free_symbols.len(), 1);
    }

    #[test]
    fn lookup_miss_creates_unresolved_placeholder() {
        let mut table = SymbolTable::new();
        let mut interner = Interner::new();
        let scope = table.new_scope(None, ExportScope::Public);
        let name = interner.intern("missing");
        let sym = table.lookup(scope, name);
        assert!(!table.symbol(sym).is_defined);
        assert!(matches!(table.symbol(sym).errors[0], BindError::UnresolvedReference));
    }
}
