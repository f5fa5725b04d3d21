//! Optional per-instruction execution hook.
//!
//! Mirrors the teacher's `VmTracer` trait: a monomorphized, default-no-op
//! callback so a production VM (`NoopTracer`) pays nothing for it, while a
//! debug build or test can swap in a tracer that records or prints every
//! dispatched instruction. The `Debug` opcode itself does nothing to
//! execution state; it exists purely to give this hook something to stop on.

use crate::opcode::Opcode;

pub trait VmTracer: std::fmt::Debug {
    /// Called just before `opcode` is dispatched at `ip`.
    fn on_instruction(&mut self, _ip: usize, _opcode: Opcode, _stack_depth: usize, _frame_depth: usize) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracer;

impl VmTracer for NoopTracer {}

/// Writes one line per dispatched instruction to stderr; useful when
/// debugging a miscompiled program by hand.
#[derive(Debug, Default)]
pub struct StderrTracer;

impl VmTracer for StderrTracer {
    fn on_instruction(&mut self, ip: usize, opcode: Opcode, stack_depth: usize, frame_depth: usize) {
        eprintln!("{ip:04} {opcode} (stack={stack_depth}, frames={frame_depth})");
    }
}
