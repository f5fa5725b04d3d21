//! Instruction/constant emission for the compiler.
//!
//! Mirrors the teacher's `CodeBuilder`: an append-only instruction buffer
//! plus a constant pool, with jump targets patched once known. Two
//! simplifications versus the teacher: operands are fixed-width 16-bit
//! big-endian (no peephole fusion, no variable-width encodings), and jump
//! operands are absolute instruction pointers rather than relative offsets,
//! so nested function bodies can be compiled into their own scope and
//! spliced out without renumbering jumps that target positions before the
//! splice.
//!
//! The constant pool is shared across every function compiled in one
//! [`BytecodeBuilder`] (module and all nested function literals), matching
//! the single append-only `constants` list in the bytecode format; only the
//! instruction buffer is pushed/popped per function scope.

use crate::opcode::Opcode;
use crate::value::RuntimeValue;

/// Position of a not-yet-patched jump's operand, returned by
/// [`BytecodeBuilder::emit_jump`].
#[derive(Debug, Clone, Copy)]
pub struct JumpLabel(usize);

#[derive(Debug, Default)]
pub struct BytecodeBuilder {
    constants: Vec<RuntimeValue>,
    scopes: Vec<Vec<u8>>,
}

impl BytecodeBuilder {
    #[must_use]
    pub fn new() -> Self {
        let mut builder = Self::default();
        builder.scopes.push(Vec::new());
        builder
    }

    /// Pushes a fresh, empty instruction buffer, used when compiling a
    /// nested function literal's body.
    pub fn enter_scope(&mut self) {
        self.scopes.push(Vec::new());
    }

    /// Pops and returns the current instruction buffer.
    ///
    /// # Panics
    ///
    /// Panics if called on the outermost (module) scope.
    pub fn leave_scope(&mut self) -> Vec<u8> {
        assert!(self.scopes.len() > 1, "cannot leave the outermost compilation scope");
        self.scopes.pop().expect("scope stack is non-empty")
    }

    fn instructions(&mut self) -> &mut Vec<u8> {
        self.scopes.last_mut().expect("scope stack is never empty")
    }

    #[must_use]
    pub fn current_ip(&self) -> usize {
        self.scopes.last().expect("scope stack is never empty").len()
    }

    /// Emits a no-operand instruction, returning its instruction pointer.
    pub fn emit(&mut self, op: Opcode) -> usize {
        debug_assert_eq!(op.operand_width(), 0, "{op} requires an operand");
        let pos = self.current_ip();
        self.instructions().push(op.as_byte());
        pos
    }

    /// Emits an instruction with a big-endian 16-bit operand, returning its
    /// instruction pointer.
    pub fn emit_u16(&mut self, op: Opcode, operand: u16) -> usize {
        debug_assert_eq!(op.operand_width(), 2, "{op} takes no operand");
        let pos = self.current_ip();
        let bytes = self.instructions();
        bytes.push(op.as_byte());
        bytes.extend_from_slice(&operand.to_be_bytes());
        pos
    }

    /// Emits a jump with a placeholder operand, to be filled in by
    /// [`Self::patch_jump`] once the target is known.
    #[must_use]
    pub fn emit_jump(&mut self, op: Opcode) -> JumpLabel {
        JumpLabel(self.emit_u16(op, 0))
    }

    /// Patches `label`'s operand to the current instruction pointer.
    pub fn patch_jump(&mut self, label: JumpLabel) {
        let target = self.current_ip();
        self.patch_jump_to(label, target);
    }

    /// Patches `label`'s operand to an explicit target instruction pointer,
    /// for jumps whose destination was recorded before the jump itself was
    /// emitted (e.g. a loop-back edge).
    pub fn patch_jump_to(&mut self, label: JumpLabel, target: usize) {
        let target = u16::try_from(target).expect("bytecode offset exceeds u16 range; program too large");
        let bytes = target.to_be_bytes();
        let scope = self.scopes.last_mut().expect("scope stack is never empty");
        scope[label.0 + 1] = bytes[0];
        scope[label.0 + 2] = bytes[1];
    }

    /// Adds a constant to the shared pool, returning its index.
    ///
    /// # Panics
    ///
    /// Panics if the pool exceeds 65535 entries.
    pub fn add_const(&mut self, value: RuntimeValue) -> u16 {
        let idx = self.constants.len();
        self.constants.push(value);
        u16::try_from(idx).expect("constant pool exceeds u16 range; too many constants")
    }

    /// Finishes compilation, returning the module's top-level instructions
    /// and the completed constant pool.
    ///
    /// # Panics
    ///
    /// Panics if any nested scope was left unclosed (a compiler bug: every
    /// `enter_scope` must be paired with a `leave_scope`).
    pub fn finish(mut self) -> (Vec<u8>, Vec<RuntimeValue>) {
        assert_eq!(self.scopes.len(), 1, "nested compilation scope left unclosed");
        (self.scopes.pop().expect("module scope is present"), self.constants)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_fixed_width_instructions() {
        let mut b = BytecodeBuilder::new();
        b.emit(Opcode::Pop);
        b.emit_u16(Opcode::Const, 5);
        let (instructions, _) = b.finish();
        assert_eq!(instructions, vec![Opcode::Pop.as_byte(), Opcode::Const.as_byte(), 0, 5]);
    }

    #[test]
    fn patch_jump_writes_absolute_target() {
        let mut b = BytecodeBuilder::new();
        let label = b.emit_jump(Opcode::Jump);
        b.emit(Opcode::Pop);
        b.emit(Opcode::Pop);
        b.patch_jump(label);
        let (instructions, _) = b.finish();
        assert_eq!(instructions[1..3], 5u16.to_be_bytes());
    }

    #[test]
    fn nested_scope_is_isolated_from_outer_instructions() {
        let mut b = BytecodeBuilder::new();
        b.emit(Opcode::ConstNull);
        b.enter_scope();
        b.emit(Opcode::ConstTrue);
        let inner = b.leave_scope();
        assert_eq!(inner, vec![Opcode::ConstTrue.as_byte()]);
        let (outer, _) = b.finish();
        assert_eq!(outer, vec![Opcode::ConstNull.as_byte()]);
    }

    #[test]
    fn add_const_returns_sequential_indices() {
        let mut b = BytecodeBuilder::new();
        let a = b.add_const(RuntimeValue::Int(1));
        let c = b.add_const(RuntimeValue::Int(2));
        assert_eq!(a, 0);
        assert_eq!(c, 1);
    }
}
