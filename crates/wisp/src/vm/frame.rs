//! One call frame: the closure being executed, its instruction pointer, and
//! where its locals begin on the shared operand stack.

use crate::heap::{CompiledFunction, Heap, HeapId, HeapObject};

#[derive(Debug, Clone, Copy)]
pub struct Frame {
    pub closure: HeapId,
    pub ip: usize,
    pub base_pointer: usize,
}

impl Frame {
    #[must_use]
    pub fn new(closure: HeapId, base_pointer: usize) -> Self {
        Self { closure, ip: 0, base_pointer }
    }

    /// Resolves this frame's instructions through its closure's function.
    ///
    /// # Panics
    ///
    /// Panics if `closure` does not point to a `Closure` object, or its
    /// `function` does not point to a `Function` object — a VM invariant,
    /// since only the compiler constructs these heap entries.
    #[must_use]
    pub fn function<'h>(&self, heap: &'h Heap) -> &'h CompiledFunction {
        let HeapObject::Closure(closure) = heap.get(self.closure) else {
            unreachable!("Frame.closure must point to a Closure object");
        };
        let HeapObject::Function(function) = heap.get(closure.function) else {
            unreachable!("Closure.function must point to a Function object");
        };
        function
    }
}
