//! Walks a parsed [`SourceFile`], populating a [`SymbolTable`] and collecting
//! the `BindError`s it records along the way.
//!
//! Mirrors the flattened scoping the compiler itself uses: a function gets
//! exactly one scope for its whole body, regardless of how deeply `let`s are
//! nested inside `if` blocks, so a name bound under one branch is visible
//! (and duplicate-checked) the same way the compiler's own flat locals list
//! treats it. The compiler does not consult this table when assigning slots
//! (see `compiler::Compiler`'s own `globals`/`locals` bookkeeping) — binding
//! is a separate, purely diagnostic pass run ahead of compilation.

use crate::ast::{Decl, ElseIf, EnumCase, EnumCaseBody, Expr, ExportScope, Field, SourceFile, Stmt};
use crate::error::{member_path, BindError, Diagnostic};
use crate::intern::{Interner, StringId};
use crate::symtab::{ScopeId, SymbolId, SymbolTable};

/// Binds `file`, returning the populated table and every diagnostic produced
/// along the way: every `BindError` recorded on a symbol (rendered without a
/// source position — the arena does not carry one, see `symtab::Symbol`),
/// plus a dotted-path diagnostic for each member reference that doesn't
/// resolve. `interner` is only read, to render the path in those messages.
#[must_use]
pub fn bind(file: &SourceFile, interner: &Interner) -> (SymbolTable, Vec<Diagnostic>) {
    let mut binder = Binder { table: SymbolTable::new(), interner, diagnostics: Vec::new() };
    let module = binder.table.new_scope(None, ExportScope::Public);

    // Top-level let/func names are reserved before any body is walked, so a
    // function can reference a global declared later in the file — mirroring
    // the compiler's own `predeclare_global` pass (§4.H: "forward references
    // among globals are permitted because binding precedes lowering").
    let predeclared: Vec<Option<SymbolId>> = file
        .decls
        .iter()
        .map(|decl| match decl {
            Decl::Let { export, name, .. } | Decl::Func { export, name, .. } => Some(binder.table.insert(module, *export, *name)),
            _ => None,
        })
        .collect();

    for (decl, sym) in file.decls.iter().zip(predeclared) {
        binder.bind_decl(module, decl, sym);
    }
    for stmt in &file.stmts {
        binder.bind_stmt(module, stmt);
    }
    binder.diagnostics.extend(collect_symbol_diagnostics(&binder.table));
    (binder.table, binder.diagnostics)
}

fn collect_symbol_diagnostics(table: &SymbolTable) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    for symbol in table.all_symbols() {
        for err in &symbol.errors {
            out.push(Diagnostic::error(err.to_string(), None));
        }
    }
    out
}

/// Owns the in-progress table and the diagnostics collected so far; methods
/// mirror the free functions a struct-less binder would need, but bundling
/// them avoids threading `&Interner` and a diagnostics accumulator through
/// every call (the same reason `parser::Parser` bundles its own state).
struct Binder<'a> {
    table: SymbolTable,
    interner: &'a Interner,
    diagnostics: Vec<Diagnostic>,
}

impl Binder<'_> {
    /// Resolves a dotted reference, reporting an `ExpectedMemberOn` or
    /// `UnresolvedReference` diagnostic with the full dotted path rendered
    /// in its details if it doesn't resolve.
    fn resolve_path(&mut self, from: ScopeId, segments: &[StringId]) {
        if let Err(err) = self.table.lookup_path(from, segments) {
            let path = member_path(self.interner, segments);
            self.diagnostics.push(Diagnostic::error(err.to_string(), None).with_details(format!("in `{path}`")));
        }
    }

    /// `predeclared` is `Some` when `decl` is a top-level let/func whose name
    /// was already reserved by `bind`'s forward-declaration pass; nested
    /// decls (e.g. a `let` inside a function body) are never
    /// forward-referenceable and are inserted here instead, the same way the
    /// original code always did.
    fn bind_decl(&mut self, scope: ScopeId, decl: &Decl, predeclared: Option<SymbolId>) {
        match decl {
            Decl::Let { export, name, value, .. } => {
                self.bind_expr(scope, value);
                if predeclared.is_none() {
                    self.table.insert(scope, *export, *name);
                }
            }
            Decl::Func { export, name, params, body, .. } => {
                let sym = predeclared.unwrap_or_else(|| self.table.insert(scope, *export, *name));
                let fn_scope = self.table.new_scope(Some(scope), ExportScope::Local);
                self.table.set_child_table(sym, fn_scope);
                for param in params {
                    self.table.insert(fn_scope, ExportScope::Local, param.name);
                }
                for stmt in body {
                    self.bind_stmt(fn_scope, stmt);
                }
            }
            Decl::Data { export, name, fields, .. } => {
                let sym = predeclared.unwrap_or_else(|| self.table.insert(scope, *export, *name));
                self.bind_fields(scope, sym, fields);
            }
            Decl::Enum { export, name, cases, .. } => {
                let sym = predeclared.unwrap_or_else(|| self.table.insert(scope, *export, *name));
                let child_scope = self.table.new_scope(Some(scope), ExportScope::Local);
                self.table.set_child_table(sym, child_scope);
                for case in cases {
                    self.bind_enum_case(scope, child_scope, case);
                }
            }
            Decl::Extern { export, name, fields, .. } => {
                let sym = predeclared.unwrap_or_else(|| self.table.insert(scope, *export, *name));
                if let Some(fields) = fields {
                    self.bind_fields(scope, sym, fields);
                }
            }
            Decl::Annotation { export, name, fields, .. } => {
                let sym = predeclared.unwrap_or_else(|| self.table.insert(scope, *export, *name));
                self.bind_fields(scope, sym, fields);
            }
            Decl::Import { reference, .. } => {
                let name = reference.alias.unwrap_or(*reference.segments.first().expect("import always has a segment"));
                self.table.insert(scope, ExportScope::Public, name);
            }
            Decl::Module { name, .. } => {
                self.table.insert(scope, ExportScope::Public, *name);
            }
        }
    }

    /// Opens `sym`'s child scope and inserts each field's name into it, so a
    /// dotted reference can later resolve `sym.field` via `lookup_path`. A
    /// field's default value is bound in `parent_scope` (it runs before the
    /// field exists), except that a field carrying its own `params` gets one
    /// more nested scope those params are visible in, the same shape a
    /// `Decl::Func` body gets for its own parameters.
    fn bind_fields(&mut self, parent_scope: ScopeId, sym: SymbolId, fields: &[Field]) {
        let child_scope = self.table.new_scope(Some(parent_scope), ExportScope::Local);
        self.table.set_child_table(sym, child_scope);
        for field in fields {
            self.table.insert(child_scope, ExportScope::Local, field.name);
            if let Some(default) = &field.default {
                match &field.params {
                    Some(params) => {
                        let field_scope = self.table.new_scope(Some(child_scope), ExportScope::Local);
                        for param in params {
                            self.table.insert(field_scope, ExportScope::Local, param.name);
                        }
                        self.bind_expr(field_scope, default);
                    }
                    None => self.bind_expr(child_scope, default),
                }
            }
        }
    }

    /// Binds one enum case. The case's own name goes into `case_scope` (the
    /// enum's child table), so `Enum.CaseName` resolves by dotted reference;
    /// a `Reference` case's path is resolved starting at `outer_scope` (the
    /// scope the enum itself lives in), since it names a *sibling*
    /// declaration, not something nested under the enum. An `Inline` case is
    /// a nested `data`/`enum` declaration, inserted with `Local` export
    /// scope and bound like any other declaration, reusing the case's own
    /// symbol as its `predeclared` one.
    fn bind_enum_case(&mut self, outer_scope: ScopeId, case_scope: ScopeId, case: &EnumCase) {
        let sym = self.table.insert(case_scope, ExportScope::Local, case.name);
        match &case.body {
            EnumCaseBody::Reference(segments) => self.resolve_path(outer_scope, segments),
            EnumCaseBody::Inline(decl) => self.bind_decl(case_scope, decl, Some(sym)),
        }
    }

    fn bind_stmt(&mut self, scope: ScopeId, stmt: &Stmt) {
        match stmt {
            Stmt::Expr { expr, .. } => self.bind_expr(scope, expr),
            Stmt::Return { value, .. } => {
                if let Some(expr) = value {
                    self.bind_expr(scope, expr);
                }
            }
            Stmt::If { condition, then_branch, else_ifs, else_branch, .. } => {
                self.bind_expr(scope, condition);
                for s in then_branch {
                    self.bind_stmt(scope, s);
                }
                for (cond, body) in else_ifs {
                    self.bind_expr(scope, cond);
                    for s in body {
                        self.bind_stmt(scope, s);
                    }
                }
                if let Some(body) = else_branch {
                    for s in body {
                        self.bind_stmt(scope, s);
                    }
                }
            }
            Stmt::Decl(decl) => self.bind_decl(scope, decl, None),
        }
    }

    fn bind_expr(&mut self, scope: ScopeId, expr: &Expr) {
        match expr {
            Expr::Ident { name, .. } => {
                self.table.lookup(scope, *name);
            }
            Expr::Int { .. } | Expr::Float { .. } | Expr::Bool { .. } | Expr::Null { .. } | Expr::Str { .. } | Expr::Char { .. } => {}
            Expr::Array { elements, .. } => {
                for element in elements {
                    self.bind_expr(scope, element);
                }
            }
            Expr::Dict { entries, .. } => {
                for (key, value) in entries {
                    self.bind_expr(scope, key);
                    self.bind_expr(scope, value);
                }
            }
            Expr::Group { inner, .. } | Expr::Unary { operand: inner, .. } => self.bind_expr(scope, inner),
            Expr::Binary { left, right, .. } => {
                self.bind_expr(scope, left);
                self.bind_expr(scope, right);
            }
            Expr::Call { callee, args, .. } => {
                self.bind_expr(scope, callee);
                for arg in args {
                    self.bind_expr(scope, arg);
                }
            }
            // A dotted member chain (`a.b.c`) is resolved whole, against
            // `a`'s child table then `a.b`'s, instead of just binding
            // `target` and throwing `name` away. A target that isn't itself
            // a pure ident/member chain (a call result, an index) has no
            // statically known symbol for `name` to resolve against, so it
            // only gets the ordinary expression walk.
            Expr::Member { target, name, .. } => match member_segments(target) {
                Some(mut segments) => {
                    segments.push(*name);
                    self.resolve_path(scope, &segments);
                }
                None => self.bind_expr(scope, target),
            },
            Expr::Index { target, index, .. } => {
                self.bind_expr(scope, target);
                self.bind_expr(scope, index);
            }
            Expr::If { condition, then_branch, else_ifs, else_branch, .. } => {
                self.bind_expr(scope, condition);
                self.bind_expr(scope, then_branch);
                for ElseIf { condition, body } in else_ifs {
                    self.bind_expr(scope, condition);
                    self.bind_expr(scope, body);
                }
                self.bind_expr(scope, else_branch);
            }
            Expr::Func { params, body, .. } => {
                let fn_scope = self.table.new_scope(Some(scope), ExportScope::Local);
                for param in params {
                    self.table.insert(fn_scope, ExportScope::Local, param.name);
                }
                for stmt in body {
                    self.bind_stmt(fn_scope, stmt);
                }
            }
        }
    }
}

/// Collects the dotted segments of a pure `Ident`/`Member` chain (`a.b.c`),
/// so the whole chain can be resolved in one `lookup_path` call. Returns
/// `None` for anything else (a call result, an indexed value, …) — those
/// have no statically known symbol for a later segment to resolve against.
fn member_segments(expr: &Expr) -> Option<Vec<StringId>> {
    match expr {
        Expr::Ident { name, .. } => Some(vec![*name]),
        Expr::Member { target, name, .. } => {
            let mut segments = member_segments(target)?;
            segments.push(*name);
            Some(segments)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Node;
    use crate::source::{LogicalUri, SourcePos};

    fn node() -> Node {
        Node { source: SourcePos::new(LogicalUri::new("t"), 0) }
    }

    #[test]
    fn undefined_identifier_is_reported() {
        let mut interner = Interner::new();
        let name = interner.intern("missing");
        let file = SourceFile {
            decls: Vec::new(),
            stmts: vec![Stmt::Expr { node: node(), expr: Expr::Ident { node: node(), name } }],
        };
        let (_, diagnostics) = bind(&file, &interner);
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn duplicate_top_level_let_is_reported() {
        let mut interner = Interner::new();
        let name = interner.intern("x");
        let file = SourceFile {
            decls: vec![
                Decl::Let { node: node(), export: ExportScope::Public, annotations: Vec::new(), name, value: Expr::Int { node: node(), value: 1 } },
                Decl::Let { node: node(), export: ExportScope::Public, annotations: Vec::new(), name, value: Expr::Int { node: node(), value: 2 } },
            ],
            stmts: Vec::new(),
        };
        let (_, diagnostics) = bind(&file, &interner);
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn let_nested_inside_if_is_visible_after_the_block_like_the_compiler_sees_it() {
        let mut interner = Interner::new();
        let x = interner.intern("x");
        let file = SourceFile {
            decls: Vec::new(),
            stmts: vec![
                Stmt::If {
                    node: node(),
                    condition: Expr::Bool { node: node(), value: true },
                    then_branch: vec![Stmt::Decl(Decl::Let {
                        node: node(),
                        export: ExportScope::Public,
                        annotations: Vec::new(),
                        name: x,
                        value: Expr::Int { node: node(), value: 1 },
                    })],
                    else_ifs: Vec::new(),
                    else_branch: None,
                },
                Stmt::Expr { node: node(), expr: Expr::Ident { node: node(), name: x } },
            ],
        };
        let (_, diagnostics) = bind(&file, &interner);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn a_function_may_forward_reference_a_global_declared_later_in_the_file() {
        let mut interner = Interner::new();
        let first = interner.intern("first");
        let second = interner.intern("second");
        let file = SourceFile {
            decls: vec![
                Decl::Func {
                    node: node(),
                    export: ExportScope::Public,
                    annotations: Vec::new(),
                    name: first,
                    params: Vec::new(),
                    body: vec![Stmt::Return { node: node(), value: Some(Expr::Ident { node: node(), name: second }) }],
                },
                Decl::Let { node: node(), export: ExportScope::Public, annotations: Vec::new(), name: second, value: Expr::Int { node: node(), value: 41 } },
            ],
            stmts: Vec::new(),
        };
        let (_, diagnostics) = bind(&file, &interner);
        assert!(diagnostics.is_empty(), "forward reference to a later global should not be unresolved: {diagnostics:?}");
    }

    #[test]
    fn data_field_is_resolvable_via_dotted_member_reference() {
        let mut interner = Interner::new();
        let point = interner.intern("Point");
        let x = interner.intern("x");
        let file = SourceFile {
            decls: vec![Decl::Data {
                node: node(),
                export: ExportScope::Public,
                annotations: Vec::new(),
                name: point,
                fields: vec![Field { node: node(), name: x, params: None, default: None }],
            }],
            stmts: vec![Stmt::Expr {
                node: node(),
                expr: Expr::Member { node: node(), target: Box::new(Expr::Ident { node: node(), name: point }), name: x },
            }],
        };
        let (_, diagnostics) = bind(&file, &interner);
        assert!(diagnostics.is_empty(), "Point.x should resolve through the data type's child table: {diagnostics:?}");
    }

    #[test]
    fn member_access_on_a_symbol_without_a_child_table_is_reported_with_the_dotted_path() {
        let mut interner = Interner::new();
        let value = interner.intern("value");
        let field = interner.intern("field");
        let file = SourceFile {
            decls: vec![Decl::Let { node: node(), export: ExportScope::Public, annotations: Vec::new(), name: value, value: Expr::Int { node: node(), value: 1 } }],
            stmts: vec![Stmt::Expr {
                node: node(),
                expr: Expr::Member { node: node(), target: Box::new(Expr::Ident { node: node(), name: value }), name: field },
            }],
        };
        let (_, diagnostics) = bind(&file, &interner);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].details.as_deref(), Some("in `value.field`"));
    }

    #[test]
    fn enum_inline_case_and_reference_case_both_resolve_through_the_enum_child_table() {
        let mut interner = Interner::new();
        let shape = interner.intern("Shape");
        let circle = interner.intern("Circle");
        let radius = interner.intern("radius");
        let alias = interner.intern("Alias");
        let file = SourceFile {
            decls: vec![Decl::Enum {
                node: node(),
                export: ExportScope::Public,
                annotations: Vec::new(),
                name: shape,
                cases: vec![
                    EnumCase {
                        node: node(),
                        name: circle,
                        body: EnumCaseBody::Inline(Box::new(Decl::Data {
                            node: node(),
                            export: ExportScope::Local,
                            annotations: Vec::new(),
                            name: circle,
                            fields: vec![Field { node: node(), name: radius, params: None, default: None }],
                        })),
                    },
                    EnumCase { node: node(), name: alias, body: EnumCaseBody::Reference(vec![shape, circle]) },
                ],
            }],
            stmts: Vec::new(),
        };
        let (_, diagnostics) = bind(&file, &interner);
        assert!(diagnostics.is_empty(), "inline case and reference case should both resolve cleanly: {diagnostics:?}");
    }

    #[test]
    fn enum_reference_case_to_a_missing_sibling_is_reported() {
        let mut interner = Interner::new();
        let shape = interner.intern("Shape");
        let missing = interner.intern("Missing");
        let file = SourceFile {
            decls: vec![Decl::Enum {
                node: node(),
                export: ExportScope::Public,
                annotations: Vec::new(),
                name: shape,
                cases: vec![EnumCase { node: node(), name: interner.intern("Alias"), body: EnumCaseBody::Reference(vec![missing]) }],
            }],
            stmts: Vec::new(),
        };
        let (_, diagnostics) = bind(&file, &interner);
        assert_eq!(diagnostics.len(), 1);
    }
}
