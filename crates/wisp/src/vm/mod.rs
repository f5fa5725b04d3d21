//! Frame-stack bytecode interpreter.
//!
//! One operand stack shared by every frame, one frame per active function
//! call. Grounded on the teacher's `bytecode/vm/mod.rs` dispatch-loop shape
//! (cached instruction pointer, big match over opcodes) and `resource.rs`'s
//! fixed resource-limit idiom, with everything Python-specific (exceptions as
//! control flow, async tasks, class bodies) dropped: this VM only ever
//! returns `Ok`/`Err`, never unwinds through user-catchable exceptions.

mod frame;
pub mod tracer;

use indexmap::IndexMap;

use crate::compiler::Bytecode;
use crate::error::RunError;
use crate::heap::{Closure, CompiledFunction, FreeVars, Heap, HeapObject};
use crate::opcode::Opcode;
use crate::value::{RuntimeValue, TYPE_ID_BOOL};
use frame::Frame;
pub use tracer::{NoopTracer, StderrTracer, VmTracer};

/// Maximum live operand-stack slots (§4.I).
pub const MAX_STACK: usize = 2048;
/// Maximum simultaneously active call frames (§4.I).
pub const MAX_FRAMES: usize = 1024;

pub struct Vm<Tr: VmTracer = NoopTracer> {
    heap: Heap,
    constants: Vec<RuntimeValue>,
    globals: Vec<RuntimeValue>,
    stack: Vec<RuntimeValue>,
    last_popped: RuntimeValue,
    frames: Vec<Frame>,
    tracer: Tr,
}

impl Vm<NoopTracer> {
    #[must_use]
    pub fn new(bytecode: Bytecode) -> Self {
        Self::with_tracer(bytecode, NoopTracer)
    }
}

impl<Tr: VmTracer> Vm<Tr> {
    /// Builds a VM ready to run `bytecode`'s module body, wrapping the
    /// top-level instructions in a synthetic closure so the dispatch loop
    /// only ever has to deal with one kind of frame.
    #[must_use]
    pub fn with_tracer(bytecode: Bytecode, tracer: Tr) -> Self {
        let mut heap = bytecode.heap;
        let module_fn = heap.alloc(HeapObject::Function(CompiledFunction {
            name: None,
            instructions: bytecode.instructions,
            local_count: 0,
            arity: 0,
        }));
        let module_closure = heap.alloc(HeapObject::Closure(Closure { function: module_fn, free: FreeVars::new() }));
        Self {
            heap,
            constants: bytecode.constants,
            globals: vec![RuntimeValue::Null; bytecode.global_count as usize],
            stack: Vec::new(),
            last_popped: RuntimeValue::Null,
            frames: vec![Frame::new(module_closure, 0)],
            tracer,
        }
    }

    #[must_use]
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Reclaims the VM's heap, e.g. so a caller can `inspect()` the returned
    /// value after `run()` without keeping the whole `Vm` alive.
    #[must_use]
    pub fn into_heap(self) -> Heap {
        self.heap
    }

    fn push(&mut self, value: RuntimeValue) -> Result<(), RunError> {
        if self.stack.len() >= MAX_STACK {
            return Err(RunError::StackOverflow);
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> RuntimeValue {
        let value = self.stack.pop().expect("compiler never emits an instruction that underflows the stack");
        self.last_popped = value;
        value
    }

    fn peek(&self) -> RuntimeValue {
        *self.stack.last().expect("compiler never emits an instruction that underflows the stack")
    }

    /// Runs until the module frame's instructions are exhausted or a
    /// top-level `return` pops the last frame, returning whatever was last
    /// popped off the operand stack.
    pub fn run(&mut self) -> Result<RuntimeValue, RunError> {
        loop {
            let frame_idx = self.frames.len() - 1;
            let ip = self.frames[frame_idx].ip;
            let instruction_count = self.frames[frame_idx].function(&self.heap).instructions.len();
            if ip >= instruction_count {
                if frame_idx == 0 {
                    return Ok(self.last_popped);
                }
                unreachable!("non-module frame must end in an explicit Return");
            }

            let byte = self.frames[frame_idx].function(&self.heap).instructions[ip];
            let opcode = Opcode::from_byte(byte).ok_or(RunError::UnknownOpcode { byte })?;
            self.frames[frame_idx].ip += 1;
            self.tracer.on_instruction(ip, opcode, self.stack.len(), self.frames.len());

            if let Some(result) = self.dispatch(opcode)? {
                return Ok(result);
            }
        }
    }

    fn read_u16(&mut self) -> u16 {
        let frame_idx = self.frames.len() - 1;
        let ip = self.frames[frame_idx].ip;
        let bytes = &self.frames[frame_idx].function(&self.heap).instructions;
        let operand = u16::from_be_bytes([bytes[ip], bytes[ip + 1]]);
        self.frames[frame_idx].ip += 2;
        operand
    }

    /// Executes one opcode. Returns `Some(value)` only when execution is
    /// over (a top-level `return` popped the last frame).
    fn dispatch(&mut self, opcode: Opcode) -> Result<Option<RuntimeValue>, RunError> {
        match opcode {
            Opcode::Const => {
                let idx = self.read_u16();
                self.push(self.constants[idx as usize])?;
            }
            Opcode::ConstNull => self.push(RuntimeValue::Null)?,
            Opcode::ConstTrue => self.push(RuntimeValue::Bool(true))?,
            Opcode::ConstFalse => self.push(RuntimeValue::Bool(false))?,
            Opcode::Pop => {
                self.pop();
            }
            Opcode::Array => self.exec_array()?,
            Opcode::Dict => self.exec_dict()?,
            Opcode::AssertType => {
                let type_id = u32::from(self.read_u16());
                let value = self.peek();
                if value.type_id(&self.heap) != type_id {
                    return Err(RunError::UnexpectedType {
                        expected: type_name_for_id(type_id),
                        got: type_name(value),
                    });
                }
            }
            Opcode::Jump => {
                let target = self.read_u16();
                self.frames[self.frames.len() - 1].ip = target as usize;
            }
            Opcode::JumpTrue => {
                let target = self.read_u16();
                if self.pop().is_truthy() {
                    self.frames[self.frames.len() - 1].ip = target as usize;
                }
            }
            Opcode::JumpFalse => {
                let target = self.read_u16();
                if !self.pop().is_truthy() {
                    self.frames[self.frames.len() - 1].ip = target as usize;
                }
            }
            Opcode::Negate => {
                let value = self.pop();
                let negated = match value {
                    RuntimeValue::Int(i) => RuntimeValue::Int(i.wrapping_neg()),
                    RuntimeValue::Float(f) => RuntimeValue::Float(-f),
                    other => return Err(RunError::UnexpectedType { expected: "int or float", got: type_name(other) }),
                };
                self.push(negated)?;
            }
            Opcode::Invert => {
                let value = self.pop();
                let RuntimeValue::Bool(b) = value else {
                    return Err(RunError::UnexpectedType { expected: "bool", got: type_name(value) });
                };
                self.push(RuntimeValue::Bool(!b))?;
            }
            Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div => {
                let rhs = self.pop();
                let lhs = self.pop();
                self.push(exec_arith(opcode, lhs, rhs)?)?;
            }
            Opcode::Mod => {
                let rhs = self.pop();
                let lhs = self.pop();
                self.push(exec_mod(lhs, rhs)?)?;
            }
            Opcode::Equal => {
                let rhs = self.pop();
                let lhs = self.pop();
                self.push(RuntimeValue::Bool(lhs.structural_eq(rhs, &self.heap)))?;
            }
            Opcode::NotEqual => {
                let rhs = self.pop();
                let lhs = self.pop();
                self.push(RuntimeValue::Bool(!lhs.structural_eq(rhs, &self.heap)))?;
            }
            Opcode::Gt | Opcode::Gte | Opcode::Lt | Opcode::Lte => {
                let rhs = self.pop();
                let lhs = self.pop();
                self.push(exec_compare(opcode, lhs, rhs)?)?;
            }
            Opcode::Call => self.exec_call()?,
            Opcode::Return => {
                let return_value = self.pop();
                let frame = self.frames.pop().expect("Return always has a frame to pop");
                if self.frames.is_empty() {
                    return Ok(Some(return_value));
                }
                self.stack.truncate(frame.base_pointer);
                self.push(return_value)?;
            }
            Opcode::GetGlobal => {
                let idx = self.read_u16();
                self.push(self.globals[idx as usize])?;
            }
            Opcode::SetGlobal => {
                let idx = self.read_u16();
                let value = self.pop();
                self.globals[idx as usize] = value;
            }
            Opcode::GetLocal => {
                let idx = self.read_u16();
                let base = self.frames[self.frames.len() - 1].base_pointer;
                self.push(self.stack[base + idx as usize])?;
            }
            Opcode::SetLocal => {
                let idx = self.read_u16();
                let base = self.frames[self.frames.len() - 1].base_pointer;
                let value = self.pop();
                self.stack[base + idx as usize] = value;
            }
            Opcode::Debug => {}
        }
        Ok(None)
    }

    /// `Array`: pop a count, then that many values; the first value pushed
    /// by the compiler is the first array element, so the popped values
    /// (last-pushed-first) are reversed before allocating.
    fn exec_array(&mut self) -> Result<(), RunError> {
        let count = self.pop_count()?;
        let mut elements = Vec::with_capacity(count);
        for _ in 0..count {
            elements.push(self.pop());
        }
        elements.reverse();
        let id = self.heap.alloc(HeapObject::Array(elements));
        self.push(RuntimeValue::Array(id))
    }

    /// `Dict`: pop a count, then that many (value, key) pairs (value was
    /// pushed last within each entry). Entries are collected in reverse
    /// source order and then replayed in source order so a later duplicate
    /// key overwrites an earlier one's value while keeping its first
    /// insertion position, matching `§4.H`'s "duplicate keys: last wins".
    fn exec_dict(&mut self) -> Result<(), RunError> {
        let count = self.pop_count()?;
        let mut pairs = Vec::with_capacity(count);
        for _ in 0..count {
            let value = self.pop();
            let key = self.pop();
            pairs.push((key, value));
        }
        pairs.reverse();
        let mut map = IndexMap::with_capacity(count);
        for (key, value) in pairs {
            map.insert(key, value);
        }
        let id = self.heap.alloc(HeapObject::Dict(map));
        self.push(RuntimeValue::Dict(id))
    }

    fn pop_count(&mut self) -> Result<usize, RunError> {
        let RuntimeValue::Int(count) = self.pop() else {
            unreachable!("compiler always pushes an Int count ahead of Array/Dict");
        };
        usize::try_from(count).map_err(|_| RunError::UnexpectedType { expected: "non-negative count", got: "negative int" })
    }

    fn exec_call(&mut self) -> Result<(), RunError> {
        let arg_count = self.read_u16() as usize;
        let callee_index = self.stack.len() - arg_count - 1;
        let callee = self.stack.remove(callee_index);
        let arity = callee.arity(&self.heap).ok_or(RunError::UnexpectedType { expected: "function", got: type_name(callee) })?;
        let arg_count_u16 = u16::try_from(arg_count).expect("call arity fits u16");
        if arity != arg_count_u16 {
            return Err(RunError::WrongArity { wanted: arity as usize, got: arg_count });
        }
        if self.frames.len() >= MAX_FRAMES {
            return Err(RunError::FrameOverflow);
        }
        let RuntimeValue::Closure(closure_id) = callee else {
            return Err(RunError::UnexpectedType { expected: "function", got: type_name(callee) });
        };
        let base_pointer = self.stack.len() - arg_count;
        self.frames.push(Frame::new(closure_id, base_pointer));
        Ok(())
    }
}

fn exec_arith(op: Opcode, lhs: RuntimeValue, rhs: RuntimeValue) -> Result<RuntimeValue, RunError> {
    use RuntimeValue::{Float, Int};
    match (lhs, rhs) {
        (Int(a), Int(b)) => match op {
            Opcode::Add => Ok(Int(a.wrapping_add(b))),
            Opcode::Sub => Ok(Int(a.wrapping_sub(b))),
            Opcode::Mul => Ok(Int(a.wrapping_mul(b))),
            Opcode::Div => {
                if b == 0 {
                    Err(RunError::DivisionByZero)
                } else {
                    Ok(Int(a / b))
                }
            }
            _ => unreachable!("exec_arith only called for Add/Sub/Mul/Div"),
        },
        (a, b) if is_numeric(a) && is_numeric(b) => {
            let (x, y) = (as_f64(a), as_f64(b));
            match op {
                Opcode::Add => Ok(Float(x + y)),
                Opcode::Sub => Ok(Float(x - y)),
                Opcode::Mul => Ok(Float(x * y)),
                Opcode::Div => {
                    if y == 0.0 {
                        Err(RunError::DivisionByZero)
                    } else {
                        Ok(Float(x / y))
                    }
                }
                _ => unreachable!("exec_arith only called for Add/Sub/Mul/Div"),
            }
        }
        (a, b) => Err(RunError::UnexpectedType { expected: "number", got: type_name(if is_numeric(a) { b } else { a }) }),
    }
}

fn exec_mod(lhs: RuntimeValue, rhs: RuntimeValue) -> Result<RuntimeValue, RunError> {
    match (lhs, rhs) {
        (RuntimeValue::Int(a), RuntimeValue::Int(b)) => {
            if b == 0 {
                Err(RunError::DivisionByZero)
            } else {
                Ok(RuntimeValue::Int(a % b))
            }
        }
        (a, b) => Err(RunError::UnexpectedType { expected: "int", got: type_name(if matches!(a, RuntimeValue::Int(_)) { b } else { a }) }),
    }
}

fn exec_compare(op: Opcode, lhs: RuntimeValue, rhs: RuntimeValue) -> Result<RuntimeValue, RunError> {
    if !is_numeric(lhs) || !is_numeric(rhs) {
        let offender = if is_numeric(lhs) { rhs } else { lhs };
        return Err(RunError::UnexpectedType { expected: "number", got: type_name(offender) });
    }
    let (a, b) = (as_f64(lhs), as_f64(rhs));
    let result = match op {
        Opcode::Gt => a > b,
        Opcode::Gte => a >= b,
        Opcode::Lt => a < b,
        Opcode::Lte => a <= b,
        _ => unreachable!("exec_compare only called for Gt/Gte/Lt/Lte"),
    };
    Ok(RuntimeValue::Bool(result))
}

fn is_numeric(value: RuntimeValue) -> bool {
    matches!(value, RuntimeValue::Int(_) | RuntimeValue::Float(_))
}

fn as_f64(value: RuntimeValue) -> f64 {
    match value {
        RuntimeValue::Int(i) => i as f64,
        RuntimeValue::Float(f) => f,
        _ => unreachable!("as_f64 only called on numeric values"),
    }
}

fn type_name(value: RuntimeValue) -> &'static str {
    match value {
        RuntimeValue::Null => "null",
        RuntimeValue::Bool(_) => "bool",
        RuntimeValue::Int(_) => "int",
        RuntimeValue::Float(_) => "float",
        RuntimeValue::Char(_) => "char",
        RuntimeValue::String(_) => "string",
        RuntimeValue::Array(_) => "array",
        RuntimeValue::Dict(_) => "dict",
        RuntimeValue::DataType(_) => "data type",
        RuntimeValue::DataValue(_) => "data value",
        RuntimeValue::CompiledFunction(_) | RuntimeValue::Closure(_) => "function",
        RuntimeValue::SimpleType(_) | RuntimeValue::AnyType => "type",
    }
}

fn type_name_for_id(type_id: u32) -> &'static str {
    if type_id == TYPE_ID_BOOL { "bool" } else { "value" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::Heap;

    fn run_instructions(instructions: Vec<u8>, constants: Vec<RuntimeValue>) -> RuntimeValue {
        let bytecode = Bytecode { instructions, constants, heap: Heap::new(), global_count: 0 };
        Vm::new(bytecode).run().expect("program runs without error")
    }

    #[test]
    fn const_then_pop_leaves_last_popped_elem() {
        let mut instructions = vec![Opcode::Const.as_byte(), 0, 0];
        instructions.push(Opcode::Pop.as_byte());
        let result = run_instructions(instructions, vec![RuntimeValue::Int(7)]);
        assert!(matches!(result, RuntimeValue::Int(7)));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let instructions = vec![
            Opcode::Const.as_byte(), 0, 0,
            Opcode::Const.as_byte(), 0, 1,
            Opcode::Div.as_byte(),
        ];
        let bytecode = Bytecode {
            instructions,
            constants: vec![RuntimeValue::Int(1), RuntimeValue::Int(0)],
            heap: Heap::new(),
            global_count: 0,
        };
        let err = Vm::new(bytecode).run().unwrap_err();
        assert!(matches!(err, RunError::DivisionByZero));
    }

    #[test]
    fn mixed_int_float_add_promotes_to_float() {
        let instructions = vec![
            Opcode::Const.as_byte(), 0, 0,
            Opcode::Const.as_byte(), 0, 1,
            Opcode::Add.as_byte(),
            Opcode::Pop.as_byte(),
        ];
        let result = run_instructions(instructions, vec![RuntimeValue::Int(1), RuntimeValue::Float(2.5)]);
        assert!(matches!(result, RuntimeValue::Float(f) if f == 3.5));
    }

    #[test]
    fn jump_false_skips_the_then_branch() {
        // if false { 1 } else { 2 } as a statement: Const false, JumpFalse 11, Const 1, Pop, Jump 15, Const 2, Pop
        let instructions = vec![
            Opcode::ConstFalse.as_byte(),
            Opcode::JumpFalse.as_byte(), 0, 11,
            Opcode::Const.as_byte(), 0, 0,
            Opcode::Pop.as_byte(),
            Opcode::Jump.as_byte(), 0, 15,
            Opcode::Const.as_byte(), 0, 1,
            Opcode::Pop.as_byte(),
        ];
        let result = run_instructions(instructions, vec![RuntimeValue::Int(1), RuntimeValue::Int(2)]);
        assert!(matches!(result, RuntimeValue::Int(2)));
    }

    #[test]
    fn array_literal_preserves_source_order() {
        let instructions = vec![
            Opcode::Const.as_byte(), 0, 0,
            Opcode::Const.as_byte(), 0, 1,
            Opcode::Array.as_byte(),
            Opcode::Pop.as_byte(),
        ];
        let bytecode = Bytecode {
            instructions,
            constants: vec![RuntimeValue::Int(10), RuntimeValue::Int(20)],
            heap: Heap::new(),
            global_count: 0,
        };
        let mut vm = Vm::new(bytecode);
        let result = vm.run().expect("runs");
        let RuntimeValue::Array(arr_id) = result else { panic!("expected array") };
        let HeapObject::Array(items) = vm.heap().get(arr_id) else { panic!("expected array object") };
        assert_eq!(items, &vec![RuntimeValue::Int(10), RuntimeValue::Int(20)]);
    }

    #[test]
    fn call_with_wrong_arity_errors() {
        // A zero-arity function constant, called with one argument.
        let mut heap = Heap::new();
        let function = heap.alloc(HeapObject::Function(CompiledFunction {
            name: None,
            instructions: vec![Opcode::ConstNull.as_byte(), Opcode::Return.as_byte()],
            local_count: 0,
            arity: 0,
        }));
        let closure = heap.alloc(HeapObject::Closure(Closure { function, free: FreeVars::new() }));
        let instructions = vec![
            Opcode::Const.as_byte(), 0, 0,
            Opcode::Const.as_byte(), 0, 1,
            Opcode::Call.as_byte(), 0, 1,
        ];
        let bytecode = Bytecode {
            instructions,
            constants: vec![RuntimeValue::Closure(closure), RuntimeValue::Int(1)],
            heap,
            global_count: 0,
        };
        let err = Vm::new(bytecode).run().unwrap_err();
        assert!(matches!(err, RunError::WrongArity { wanted: 0, got: 1 }));
    }
}
