//! The embedding entry point: `lex → parse → bind → compile → vm::run`,
//! composed into a single free function so a host never touches the phases
//! individually.

use crate::binder;
use crate::compiler::Compiler;
use crate::error::Diagnostic;
use crate::heap::Heap;
use crate::intern::Interner;
use crate::parser::Parser;
use crate::source::Source;
use crate::value::RuntimeValue;
use crate::vm::Vm;

/// What a program run produced: its last-popped value, plus the heap and
/// interner needed to render it (an aggregate `RuntimeValue` is only a
/// `HeapId` until paired back up with the arena it was allocated in).
pub struct RunOutput {
    pub value: RuntimeValue,
    heap: Heap,
    interner: Interner,
}

impl RunOutput {
    #[must_use]
    pub fn inspect(&self) -> String {
        self.value.inspect(&self.heap, &self.interner)
    }
}

/// Runs a complete program read from `source`, returning the value of its
/// last popped statement (§4.I's `LastPoppedStackElem`) or every diagnostic
/// collected by the first phase that failed.
///
/// Phases never run past the first one that produces diagnostics: a file
/// with a parse error is never bound, a file that fails to bind is never
/// compiled, and so on.
pub fn run_source(source: &dyn Source) -> Result<RunOutput, Vec<Diagnostic>> {
    let bytes = source.read().map_err(|e| vec![Diagnostic::error(e.to_string(), None)])?;
    let mut interner = Interner::new();

    let (file, parse_errors) = Parser::new(bytes, source.uri().clone(), &mut interner).parse_source_file();
    if !parse_errors.is_empty() {
        return Err(parse_errors);
    }

    let (_table, bind_errors) = binder::bind(&file, &interner);
    if !bind_errors.is_empty() {
        return Err(bind_errors);
    }

    let bytecode = Compiler::new(&mut interner).compile(&file).map_err(|d| vec![d])?;

    let mut vm = Vm::new(bytecode);
    let value = vm.run().map_err(|e| vec![Diagnostic::error(e.to_string(), None)])?;
    Ok(RunOutput { value, heap: vm.into_heap(), interner })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemorySource;

    #[test]
    fn runs_a_trivial_expression_statement() {
        let source = InMemorySource::new("t", "1 + 2");
        let result = run_source(&source).expect("runs");
        assert_eq!(result.value, RuntimeValue::Int(3));
        assert_eq!(result.inspect(), "3");
    }

    #[test]
    fn parse_errors_short_circuit_the_pipeline() {
        let source = InMemorySource::new("t", "let");
        assert!(run_source(&source).is_err());
    }

    #[test]
    fn unresolved_reference_is_reported_before_compiling() {
        let source = InMemorySource::new("t", "missing");
        let diagnostics = run_source(&source).expect_err("unresolved reference should fail binding");
        assert!(diagnostics.iter().any(|d| d.summary.contains("unresolved reference")));
    }
}
