#![doc = include_str!("../../../README.md")]
#![expect(clippy::cast_possible_truncation, reason = "arena/slot indices are checked with try_from at the point of growth")]
#![expect(clippy::module_name_repetitions, reason = "HeapId/HeapObject and friends mirror the phase they belong to")]

mod ast;
mod binder;
mod compiler;
mod error;
mod heap;
mod intern;
mod lexer;
mod opcode;
mod parser;
mod pipeline;
mod source;
mod symtab;
mod token;
mod value;
mod vm;

pub use crate::{
    ast::{BinaryOp, Decl, Expr, ExportScope, SourceFile, Stmt, UnaryOp},
    error::{BindError, CompileError, Diagnostic, ParseError, RunError, render},
    heap::{Heap, HeapId, HeapObject},
    intern::{Interner, StringId},
    opcode::Opcode,
    pipeline::{run_source, RunOutput},
    source::{InMemorySource, LogicalUri, ReadError, Source},
    value::RuntimeValue,
    vm::{NoopTracer, StderrTracer, Vm, VmTracer, MAX_FRAMES, MAX_STACK},
};
