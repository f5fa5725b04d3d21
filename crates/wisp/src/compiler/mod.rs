//! AST → bytecode lowering.
//!
//! One pass over the [`SourceFile`]: top-level declarations are pre-scanned
//! for their names (so mutually referencing globals compile regardless of
//! textual order), then declarations and statements are lowered in source
//! order into a single instruction stream plus a shared constant pool.
//!
//! Scoping is intentionally shallow: a name is either a slot in the
//! innermost enclosing function's locals (assigned on first `let`/parameter,
//! in declaration order) or a slot in the module's globals (assigned on
//! first sight, independent of the binder's own symbol indices — see
//! `globals` below). There is no separate scope per `if` block; a `let`
//! inside a nested block still lands in the owning function's (or module's)
//! flat local/global slot list. Capturing a local from an *enclosing*
//! function is recognized but not lowered: the bytecode format has no
//! opcode for loading a free variable, so it surfaces as a
//! [`CompileError::UnsupportedFeature`], the same way dynamic member/index
//! access does.

mod builder;

use indexmap::IndexMap;

use crate::ast::{BinaryOp, Decl, ElseIf, Expr, Param, SourceFile, Stmt, UnaryOp};
use crate::error::{CompileError, Diagnostic};
use crate::heap::{Closure, CompiledFunction, FreeVars, Heap, HeapObject};
use crate::intern::{Interner, StringId};
use crate::opcode::Opcode;
use crate::value::{RuntimeValue, TYPE_ID_BOOL};
use builder::BytecodeBuilder;

/// The compiler's complete output: a module's top-level instructions, the
/// constant pool every function's `Const` indexes into, the heap those
/// constants (and later, runtime allocations) live in, and how many global
/// slots to reserve in the VM.
#[derive(Debug)]
pub struct Bytecode {
    pub instructions: Vec<u8>,
    pub constants: Vec<RuntimeValue>,
    pub heap: Heap,
    pub global_count: u16,
}

/// The locals of one function body being compiled, indexed by declaration
/// order: parameters first, then each `let` encountered in the body.
struct FunctionScope {
    locals: Vec<StringId>,
}

enum Resolution {
    Local(u16),
    Global(u16),
    /// Found in an enclosing function's locals: a legitimate free variable,
    /// but there is no opcode to load one yet.
    Free,
    Unknown,
}

pub struct Compiler<'a> {
    interner: &'a mut Interner,
    builder: BytecodeBuilder,
    heap: Heap,
    globals: IndexMap<StringId, u16>,
    scopes: Vec<FunctionScope>,
}

impl<'a> Compiler<'a> {
    #[must_use]
    pub fn new(interner: &'a mut Interner) -> Self {
        Self {
            interner,
            builder: BytecodeBuilder::new(),
            heap: Heap::new(),
            globals: IndexMap::new(),
            scopes: Vec::new(),
        }
    }

    pub fn compile(mut self, file: &SourceFile) -> Result<Bytecode, Diagnostic> {
        for decl in &file.decls {
            self.predeclare_global(decl);
        }
        for decl in &file.decls {
            self.compile_decl(decl)?;
        }
        for stmt in &file.stmts {
            self.compile_stmt(stmt)?;
        }
        let global_count = u16::try_from(self.globals.len()).expect("too many globals; program too large");
        let (instructions, constants) = self.builder.finish();
        Ok(Bytecode { instructions, constants, heap: self.heap, global_count })
    }

    /// Reserves a global slot for every top-level `let`/`func` up front, in
    /// source order, so a declaration compiled earlier can still reference
    /// one compiled later.
    fn predeclare_global(&mut self, decl: &Decl) {
        if let Decl::Let { name, .. } | Decl::Func { name, .. } = decl {
            let next = u16::try_from(self.globals.len()).expect("too many globals; program too large");
            self.globals.entry(*name).or_insert(next);
        }
    }

    fn compile_decl(&mut self, decl: &Decl) -> Result<(), Diagnostic> {
        match decl {
            Decl::Let { name, value, .. } => {
                self.compile_expr(value)?;
                self.emit_store(*name);
                Ok(())
            }
            Decl::Func { name, params, body, .. } => {
                let const_idx = self.compile_function(params, body)?;
                self.builder.emit_u16(Opcode::Const, const_idx);
                self.emit_store(*name);
                Ok(())
            }
            // `data`/`enum`/`extern`/`annotation`/`import`/`module` register
            // names and types at binding time; none of them have a lowering
            // rule in the bytecode format (no opcode constructs a DataType
            // or resolves an import), so they compile to no instructions.
            Decl::Data { .. }
            | Decl::Enum { .. }
            | Decl::Extern { .. }
            | Decl::Annotation { .. }
            | Decl::Import { .. }
            | Decl::Module { .. } => Ok(()),
        }
    }

    /// Stores whatever is on top of the operand stack into a fresh slot for
    /// `name`: a new local slot if compiling inside a function, otherwise a
    /// (possibly newly-registered) global slot.
    fn emit_store(&mut self, name: StringId) {
        if let Some(scope) = self.scopes.last_mut() {
            let slot = u16::try_from(scope.locals.len()).expect("too many locals; function too large");
            scope.locals.push(name);
            self.builder.emit_u16(Opcode::SetLocal, slot);
        } else {
            let next = u16::try_from(self.globals.len()).expect("too many globals; program too large");
            let slot = *self.globals.entry(name).or_insert(next);
            self.builder.emit_u16(Opcode::SetGlobal, slot);
        }
    }

    fn resolve(&self, name: StringId) -> Resolution {
        if let Some(scope) = self.scopes.last() {
            if let Some(slot) = scope.locals.iter().position(|&n| n == name) {
                return Resolution::Local(u16::try_from(slot).expect("too many locals; function too large"));
            }
            if self.scopes[..self.scopes.len() - 1].iter().any(|s| s.locals.contains(&name)) {
                return Resolution::Free;
            }
        }
        match self.globals.get(&name) {
            Some(&slot) => Resolution::Global(slot),
            None => Resolution::Unknown,
        }
    }

    /// Returns `true` if the statement's last emitted instruction was a
    /// `Return`, so callers compiling a function body know whether an
    /// implicit null-return still needs inserting.
    fn compile_stmt(&mut self, stmt: &Stmt) -> Result<bool, Diagnostic> {
        match stmt {
            Stmt::Expr { expr, .. } => {
                self.compile_expr(expr)?;
                self.builder.emit(Opcode::Pop);
                Ok(false)
            }
            Stmt::Return { value, .. } => {
                match value {
                    Some(expr) => self.compile_expr(expr)?,
                    None => {
                        self.builder.emit(Opcode::ConstNull);
                    }
                }
                self.builder.emit(Opcode::Return);
                Ok(true)
            }
            Stmt::If { condition, then_branch, else_ifs, else_branch, .. } => {
                self.compile_if_stmt(condition, then_branch, else_ifs, else_branch)?;
                Ok(false)
            }
            Stmt::Decl(decl) => {
                self.compile_decl(decl)?;
                Ok(false)
            }
        }
    }

    /// Each branch's body is a block of statements; the construct leaves
    /// nothing on the stack. A branch without a following branch (the last
    /// one, when no final `else` is present) skips its trailing `Jump`
    /// entirely since there is nothing after it to jump past.
    fn compile_if_stmt(
        &mut self,
        condition: &Expr,
        then_branch: &[Stmt],
        else_ifs: &[(Expr, Vec<Stmt>)],
        else_branch: &Option<Vec<Stmt>>,
    ) -> Result<(), Diagnostic> {
        let mut branches: Vec<(&Expr, &[Stmt])> = vec![(condition, then_branch)];
        for (cond, body) in else_ifs {
            branches.push((cond, body.as_slice()));
        }
        let has_final_else = else_branch.is_some();
        let last = branches.len() - 1;
        let mut end_jumps = Vec::new();
        for (i, (cond, body)) in branches.into_iter().enumerate() {
            self.compile_expr(cond)?;
            let skip = self.builder.emit_jump(Opcode::JumpFalse);
            for stmt in body {
                self.compile_stmt(stmt)?;
            }
            if has_final_else || i != last {
                end_jumps.push(self.builder.emit_jump(Opcode::Jump));
            }
            self.builder.patch_jump(skip);
        }
        if let Some(body) = else_branch {
            for stmt in body {
                self.compile_stmt(stmt)?;
            }
        }
        for label in end_jumps {
            self.builder.patch_jump(label);
        }
        Ok(())
    }

    /// Mirrors [`Self::compile_if_stmt`] but every branch is a single
    /// expression whose value is left on the stack, and the mandatory final
    /// `else` means every guarded branch always jumps past the rest once
    /// taken.
    fn compile_if_expr(
        &mut self,
        condition: &Expr,
        then_branch: &Expr,
        else_ifs: &[ElseIf],
        else_branch: &Expr,
    ) -> Result<(), Diagnostic> {
        let mut branches: Vec<(&Expr, &Expr)> = vec![(condition, then_branch)];
        for else_if in else_ifs {
            branches.push((&else_if.condition, else_if.body.as_ref()));
        }
        let mut end_jumps = Vec::new();
        for (cond, body) in branches {
            self.compile_expr(cond)?;
            let skip = self.builder.emit_jump(Opcode::JumpFalse);
            self.compile_expr(body)?;
            end_jumps.push(self.builder.emit_jump(Opcode::Jump));
            self.builder.patch_jump(skip);
        }
        self.compile_expr(else_branch)?;
        for label in end_jumps {
            self.builder.patch_jump(label);
        }
        Ok(())
    }

    fn compile_expr(&mut self, expr: &Expr) -> Result<(), Diagnostic> {
        match expr {
            Expr::Int { value, .. } => {
                let idx = self.builder.add_const(RuntimeValue::Int(*value));
                self.builder.emit_u16(Opcode::Const, idx);
            }
            Expr::Float { value, .. } => {
                let idx = self.builder.add_const(RuntimeValue::Float(*value));
                self.builder.emit_u16(Opcode::Const, idx);
            }
            Expr::Char { value, .. } => {
                let idx = self.builder.add_const(RuntimeValue::Char(*value));
                self.builder.emit_u16(Opcode::Const, idx);
            }
            Expr::Str { value, .. } => {
                let text = self.interner.resolve(*value).to_string();
                let heap_id = self.heap.alloc(HeapObject::Str(text));
                let idx = self.builder.add_const(RuntimeValue::String(heap_id));
                self.builder.emit_u16(Opcode::Const, idx);
            }
            Expr::Bool { value: true, .. } => {
                self.builder.emit(Opcode::ConstTrue);
            }
            Expr::Bool { value: false, .. } => {
                self.builder.emit(Opcode::ConstFalse);
            }
            Expr::Null { .. } => {
                self.builder.emit(Opcode::ConstNull);
            }
            Expr::Ident { node, name } => match self.resolve(*name) {
                Resolution::Local(slot) => {
                    self.builder.emit_u16(Opcode::GetLocal, slot);
                }
                Resolution::Global(slot) => {
                    self.builder.emit_u16(Opcode::GetGlobal, slot);
                }
                Resolution::Free => {
                    return Err(self.err(CompileError::UnsupportedFeature { what: "closures capturing an outer local" }, node));
                }
                Resolution::Unknown => {
                    return Err(self.err(CompileError::UnknownIdentifier, node));
                }
            },
            Expr::Array { elements, .. } => {
                for element in elements {
                    self.compile_expr(element)?;
                }
                let count = self.builder.add_const(RuntimeValue::Int(elements.len() as i64));
                self.builder.emit_u16(Opcode::Const, count);
                self.builder.emit(Opcode::Array);
            }
            Expr::Dict { entries, .. } => {
                for (key, value) in entries {
                    self.compile_expr(key)?;
                    self.compile_expr(value)?;
                }
                let count = self.builder.add_const(RuntimeValue::Int(entries.len() as i64));
                self.builder.emit_u16(Opcode::Const, count);
                self.builder.emit(Opcode::Dict);
            }
            Expr::Group { inner, .. } => self.compile_expr(inner)?,
            Expr::Unary { node, op, operand } => {
                self.compile_expr(operand)?;
                match op {
                    UnaryOp::Neg => self.builder.emit(Opcode::Negate),
                    UnaryOp::Not => self.builder.emit(Opcode::Invert),
                };
                let _ = node;
            }
            Expr::Binary { node, op, left, right } => self.compile_binary(node, *op, left, right)?,
            Expr::Call { callee, args, .. } => {
                self.compile_expr(callee)?;
                for arg in args {
                    self.compile_expr(arg)?;
                }
                let arg_count = u16::try_from(args.len()).expect("too many call arguments");
                self.builder.emit_u16(Opcode::Call, arg_count);
            }
            Expr::Member { node, .. } => {
                return Err(self.err(CompileError::UnsupportedFeature { what: "member access" }, node));
            }
            Expr::Index { node, .. } => {
                return Err(self.err(CompileError::UnsupportedFeature { what: "index access" }, node));
            }
            Expr::If { condition, then_branch, else_ifs, else_branch, .. } => {
                self.compile_if_expr(condition, then_branch, else_ifs, else_branch)?;
            }
            Expr::Func { params, body, .. } => {
                let const_idx = self.compile_function(params, body)?;
                self.builder.emit_u16(Opcode::Const, const_idx);
            }
        }
        Ok(())
    }

    fn compile_binary(&mut self, node: &crate::ast::Node, op: BinaryOp, left: &Expr, right: &Expr) -> Result<(), Diagnostic> {
        match op {
            BinaryOp::And => {
                self.compile_expr(left)?;
                let skip = self.builder.emit_jump(Opcode::JumpFalse);
                self.compile_expr(right)?;
                self.builder.emit_u16(Opcode::AssertType, u16::try_from(TYPE_ID_BOOL).expect("type id fits u16"));
                let end = self.builder.emit_jump(Opcode::Jump);
                self.builder.patch_jump(skip);
                self.builder.emit(Opcode::ConstFalse);
                self.builder.patch_jump(end);
            }
            BinaryOp::Or => {
                self.compile_expr(left)?;
                let skip = self.builder.emit_jump(Opcode::JumpTrue);
                self.compile_expr(right)?;
                self.builder.emit_u16(Opcode::AssertType, u16::try_from(TYPE_ID_BOOL).expect("type id fits u16"));
                let end = self.builder.emit_jump(Opcode::Jump);
                self.builder.patch_jump(skip);
                self.builder.emit(Opcode::ConstTrue);
                self.builder.patch_jump(end);
            }
            _ => {
                self.compile_expr(left)?;
                self.compile_expr(right)?;
                let opcode = match op {
                    BinaryOp::Add => Opcode::Add,
                    BinaryOp::Sub => Opcode::Sub,
                    BinaryOp::Mul => Opcode::Mul,
                    BinaryOp::Div => Opcode::Div,
                    BinaryOp::Mod => Opcode::Mod,
                    BinaryOp::Eq => Opcode::Equal,
                    BinaryOp::Ne => Opcode::NotEqual,
                    BinaryOp::Lt => Opcode::Lt,
                    BinaryOp::Le => Opcode::Lte,
                    BinaryOp::Gt => Opcode::Gt,
                    BinaryOp::Ge => Opcode::Gte,
                    BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
                };
                self.builder.emit(opcode);
            }
        }
        let _ = node;
        Ok(())
    }

    /// Compiles a function body into its own instruction scope, ensures it
    /// ends in `Return` (inserting an implicit `null` return if the body
    /// fell off the end), and packages the result as a `CompiledFunction`
    /// wrapped in a `Closure` (its `free` list is always empty: there is no
    /// opcode to populate one with captured values yet). Returns the
    /// constant pool index of the pushed closure.
    fn compile_function(&mut self, params: &[Param], body: &[Stmt]) -> Result<u16, Diagnostic> {
        self.builder.enter_scope();
        self.scopes.push(FunctionScope { locals: params.iter().map(|p| p.name).collect() });
        let mut ends_in_return = false;
        for stmt in body {
            ends_in_return = self.compile_stmt(stmt)?;
        }
        if !ends_in_return {
            self.builder.emit(Opcode::ConstNull);
            self.builder.emit(Opcode::Return);
        }
        let instructions = self.builder.leave_scope();
        let scope = self.scopes.pop().expect("function scope pushed above");
        let arity = u16::try_from(params.len()).expect("too many parameters");
        let local_count = u16::try_from(scope.locals.len()).expect("too many locals; function too large");
        let function_id = self.heap.alloc(HeapObject::Function(CompiledFunction { name: None, instructions, local_count, arity }));
        let closure_id = self.heap.alloc(HeapObject::Closure(Closure { function: function_id, free: FreeVars::new() }));
        Ok(self.builder.add_const(RuntimeValue::Closure(closure_id)))
    }

    fn err(&self, e: CompileError, node: &crate::ast::Node) -> Diagnostic {
        Diagnostic::error(e.to_string(), Some(node.source.clone()))
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

    fn compile_expr_only(expr: Expr) -> Bytecode {
        let mut interner = Interner::new();
        let file = SourceFile { decls: Vec::new(), stmts: vec![Stmt::Expr { node: node(), expr }] };
        Compiler::new(&mut interner).compile(&file).expect("compiles")
    }

    #[test]
    fn int_literal_emits_const_and_pop() {
        let bc = compile_expr_only(Expr::Int { node: node(), value: 5 });
        assert_eq!(bc.instructions, vec![Opcode::Const.as_byte(), 0, 0, Opcode::Pop.as_byte()]);
        assert_eq!(bc.constants, vec![RuntimeValue::Int(5)]);
    }

    #[test]
    fn array_literal_pushes_count_then_array_opcode() {
        let bc = compile_expr_only(Expr::Array {
            node: node(),
            elements: vec![Expr::Int { node: node(), value: 1 }, Expr::Int { node: node(), value: 2 }],
        });
        let last_three = &bc.instructions[bc.instructions.len() - 4..];
        assert_eq!(last_three[0], Opcode::Const.as_byte());
        assert_eq!(last_three[3], Opcode::Array.as_byte());
    }

    #[test]
    fn if_statement_matches_scenario_six_bytecode_shape() {
        let mut interner = Interner::new();
        let stmt = Stmt::If {
            node: node(),
            condition: Expr::Int { node: node(), value: 0 },
            then_branch: vec![Stmt::Expr { node: node(), expr: Expr::Int { node: node(), value: 1 } }],
            else_ifs: vec![(
                Expr::Int { node: node(), value: 2 },
                vec![Stmt::Expr { node: node(), expr: Expr::Int { node: node(), value: 3 } }],
            )],
            else_branch: Some(vec![Stmt::Expr { node: node(), expr: Expr::Int { node: node(), value: 4 } }]),
        };
        let file = SourceFile { decls: Vec::new(), stmts: vec![stmt] };
        let bc = Compiler::new(&mut interner).compile(&file).expect("compiles");
        let expected = vec![
            Opcode::Const.as_byte(), 0, 0,
            Opcode::JumpFalse.as_byte(), 0, 13,
            Opcode::Const.as_byte(), 0, 1,
            Opcode::Pop.as_byte(),
            Opcode::Jump.as_byte(), 0, 30,
            Opcode::Const.as_byte(), 0, 2,
            Opcode::JumpFalse.as_byte(), 0, 26,
            Opcode::Const.as_byte(), 0, 3,
            Opcode::Pop.as_byte(),
            Opcode::Jump.as_byte(), 0, 30,
            Opcode::Const.as_byte(), 0, 4,
            Opcode::Pop.as_byte(),
        ];
        assert_eq!(bc.instructions, expected);
    }

    #[test]
    fn and_short_circuits_with_type_assertion() {
        let bc = compile_expr_only(Expr::Binary {
            node: node(),
            op: BinaryOp::And,
            left: Box::new(Expr::Bool { node: node(), value: true }),
            right: Box::new(Expr::Int { node: node(), value: 3 }),
        });
        assert!(bc.instructions.contains(&Opcode::AssertType.as_byte()));
    }

    #[test]
    fn undefined_identifier_is_a_compile_error() {
        let mut interner = Interner::new();
        let name = interner.intern("missing");
        let file = SourceFile {
            decls: Vec::new(),
            stmts: vec![Stmt::Expr { node: node(), expr: Expr::Ident { node: node(), name } }],
        };
        assert!(Compiler::new(&mut interner).compile(&file).is_err());
    }

    #[test]
    fn forward_referenced_global_function_compiles() {
        let mut interner = Interner::new();
        let a = interner.intern("a");
        let b = interner.intern("b");
        let file = SourceFile {
            decls: vec![
                Decl::Func {
                    node: node(),
                    export: crate::ast::ExportScope::Public,
                    annotations: Vec::new(),
                    name: a,
                    params: Vec::new(),
                    body: vec![Stmt::Return { node: node(), value: Some(Expr::Ident { node: node(), name: b }) }],
                },
                Decl::Let { node: node(), export: crate::ast::ExportScope::Public, annotations: Vec::new(), name: b, value: Expr::Int { node: node(), value: 1 } },
            ],
            stmts: Vec::new(),
        };
        assert!(Compiler::new(&mut interner).compile(&file).is_ok());
    }
}
