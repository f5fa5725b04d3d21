//! Runtime values: a hybrid design where small immediate values are stored
//! inline and aggregates are stored in the [`Heap`] and referenced by
//! [`HeapId`].
//!
//! Every value exposes `{type_id, inspect, lookup}`; callables additionally
//! expose `{arity, function}` (actual invocation is the VM's job — see
//! `vm::mod`).

use std::hash::{Hash, Hasher};

use crate::heap::{Heap, HeapId, HeapObject};
use crate::intern::{Interner, StringId};

/// Reserved type ids for prelude primitives; user `data`/`enum` declarations
/// are assigned ids starting at [`FIRST_USER_TYPE_ID`].
pub const TYPE_ID_NULL: u32 = 0;
pub const TYPE_ID_BOOL: u32 = 1;
pub const TYPE_ID_INT: u32 = 2;
pub const TYPE_ID_FLOAT: u32 = 3;
pub const TYPE_ID_CHAR: u32 = 4;
pub const TYPE_ID_STRING: u32 = 5;
pub const TYPE_ID_ARRAY: u32 = 6;
pub const TYPE_ID_DICT: u32 = 7;
pub const TYPE_ID_FUNC: u32 = 8;
pub const TYPE_ID_MODULE: u32 = 9;
pub const TYPE_ID_ANY: u32 = 10;
pub const FIRST_USER_TYPE_ID: u32 = 1000;

/// A runtime value. Immediate variants (`Null`, `Bool`, `Int`, `Float`,
/// `Char`) never touch the heap; everything else is a `HeapId` into whatever
/// [`Heap`] the VM is currently running against.
#[derive(Debug, Clone, Copy)]
pub enum RuntimeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    String(HeapId),
    Array(HeapId),
    Dict(HeapId),
    DataType(HeapId),
    DataValue(HeapId),
    CompiledFunction(HeapId),
    Closure(HeapId),
    /// An opaque type token, e.g. produced by `extern` declarations.
    SimpleType(u32),
    AnyType,
}

impl RuntimeValue {
    #[must_use]
    pub fn type_id(self, heap: &Heap) -> u32 {
        match self {
            Self::Null => TYPE_ID_NULL,
            Self::Bool(_) => TYPE_ID_BOOL,
            Self::Int(_) => TYPE_ID_INT,
            Self::Float(_) => TYPE_ID_FLOAT,
            Self::Char(_) => TYPE_ID_CHAR,
            Self::String(_) => TYPE_ID_STRING,
            Self::Array(_) => TYPE_ID_ARRAY,
            Self::Dict(_) => TYPE_ID_DICT,
            Self::CompiledFunction(_) | Self::Closure(_) => TYPE_ID_FUNC,
            Self::DataType(id) => match heap.get(id) {
                HeapObject::DataType(dt) => dt.type_id,
                _ => unreachable!("DataType HeapId must point to a DataType object"),
            },
            Self::DataValue(id) => match heap.get(id) {
                HeapObject::DataValue(dv) => dv.type_id,
                _ => unreachable!("DataValue HeapId must point to a DataValue object"),
            },
            Self::SimpleType(id) => id,
            Self::AnyType => TYPE_ID_ANY,
        }
    }

    /// Only `Bool(false)` is falsy; every other value is truthy, fixed for
    /// reproducibility (§4.I).
    #[must_use]
    pub fn is_truthy(self) -> bool {
        !matches!(self, Self::Bool(false))
    }

    #[must_use]
    pub fn arity(self, heap: &Heap) -> Option<u16> {
        match self {
            Self::CompiledFunction(id) => match heap.get(id) {
                HeapObject::Function(f) => Some(f.arity),
                _ => None,
            },
            Self::Closure(id) => match heap.get(id) {
                HeapObject::Closure(c) => match heap.get(c.function) {
                    HeapObject::Function(f) => Some(f.arity),
                    _ => None,
                },
                _ => None,
            },
            _ => None,
        }
    }

    /// A human-readable rendering, used by tests and the demonstration CLI.
    #[must_use]
    pub fn inspect(self, heap: &Heap, interner: &Interner) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Char(c) => format!("'{c}'"),
            Self::String(id) => match heap.get(id) {
                HeapObject::Str(s) => format!("\"{s}\""),
                _ => unreachable!("String HeapId must point to a Str object"),
            },
            Self::Array(id) => match heap.get(id) {
                HeapObject::Array(items) => {
                    let rendered: Vec<_> = items.iter().map(|v| v.inspect(heap, interner)).collect();
                    format!("[{}]", rendered.join(", "))
                }
                _ => unreachable!("Array HeapId must point to an Array object"),
            },
            Self::Dict(id) => match heap.get(id) {
                HeapObject::Dict(entries) => {
                    let rendered: Vec<_> = entries
                        .iter()
                        .map(|(k, v)| format!("{}: {}", k.inspect(heap, interner), v.inspect(heap, interner)))
                        .collect();
                    format!("{{{}}}", rendered.join(", "))
                }
                _ => unreachable!("Dict HeapId must point to a Dict object"),
            },
            Self::DataType(id) => match heap.get(id) {
                HeapObject::DataType(dt) => interner.resolve(dt.name).to_string(),
                _ => unreachable!("DataType HeapId must point to a DataType object"),
            },
            Self::DataValue(id) => match heap.get(id) {
                HeapObject::DataValue(dv) => {
                    let name = match heap.get(dv.data_type) {
                        HeapObject::DataType(dt) => interner.resolve(dt.name),
                        _ => unreachable!("DataValue.data_type must point to a DataType object"),
                    };
                    let fields: Vec<_> = dv
                        .fields
                        .iter()
                        .map(|(k, v)| format!("{}: {}", interner.resolve(*k), v.inspect(heap, interner)))
                        .collect();
                    format!("{name} {{ {} }}", fields.join(", "))
                }
                _ => unreachable!("DataValue HeapId must point to a DataValue object"),
            },
            Self::CompiledFunction(_) | Self::Closure(_) => "<function>".to_string(),
            Self::SimpleType(_) | Self::AnyType => "<type>".to_string(),
        }
    }

    /// Runtime member lookup: the only mechanism member access ever lowers
    /// to (§9 resolved — no dedicated member-access opcode exists).
    #[must_use]
    pub fn lookup(self, heap: &Heap, name: StringId) -> Option<Self> {
        match self {
            Self::DataValue(id) => match heap.get(id) {
                HeapObject::DataValue(dv) => dv.fields.get(&name).copied(),
                _ => None,
            },
            _ => None,
        }
    }

    /// Structural equality matching the VM's `Equal` opcode: unequal type ids
    /// are never equal; `DataValue`s compare by type id and field values.
    #[must_use]
    pub fn structural_eq(self, other: Self, heap: &Heap) -> bool {
        if self.type_id(heap) != other.type_id(heap) {
            return false;
        }
        match (self, other) {
            (Self::Null, Self::Null) | (Self::AnyType, Self::AnyType) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Char(a), Self::Char(b)) => a == b,
            (Self::SimpleType(a), Self::SimpleType(b)) => a == b,
            (Self::String(a), Self::String(b)) => match (heap.get(a), heap.get(b)) {
                (HeapObject::Str(x), HeapObject::Str(y)) => x == y,
                _ => false,
            },
            (Self::Array(a), Self::Array(b)) => match (heap.get(a), heap.get(b)) {
                (HeapObject::Array(x), HeapObject::Array(y)) => {
                    x.len() == y.len() && x.iter().zip(y.iter()).all(|(l, r)| l.structural_eq(*r, heap))
                }
                _ => false,
            },
            (Self::DataValue(a), Self::DataValue(b)) => match (heap.get(a), heap.get(b)) {
                (HeapObject::DataValue(x), HeapObject::DataValue(y)) => {
                    x.type_id == y.type_id
                        && x.fields.len() == y.fields.len()
                        && x.fields.iter().all(|(k, v)| y.fields.get(k).is_some_and(|ov| v.structural_eq(*ov, heap)))
                }
                _ => false,
            },
            _ => matches!((self, other), (Self::CompiledFunction(a), Self::CompiledFunction(b)) if a == b)
                || matches!((self, other), (Self::Closure(a), Self::Closure(b)) if a == b)
                || matches!((self, other), (Self::DataType(a), Self::DataType(b)) if a == b)
                || matches!((self, other), (Self::Dict(a), Self::Dict(b)) if a == b),
        }
    }
}

/// A key usable in the runtime `Dict` representation. Equality and hashing
/// are by immediate bit pattern for scalars and by heap identity for
/// aggregates — sufficient because key collisions across heap allocations
/// are resolved by the `Equal`-opcode semantics at the call site, not inside
/// the map itself (dict literals only dedupe by `==` among keys already
/// pushed in the same literal, per §4.H "duplicate keys: last wins").
impl PartialEq for RuntimeValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) | (Self::AnyType, Self::AnyType) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Char(a), Self::Char(b)) => a == b,
            (Self::SimpleType(a), Self::SimpleType(b)) => a == b,
            (Self::String(a), Self::Array(b))
            | (Self::Array(a), Self::String(b)) => a == b && false, // distinct variants never equal
            (Self::String(a), Self::String(b))
            | (Self::Array(a), Self::Array(b))
            | (Self::Dict(a), Self::Dict(b))
            | (Self::DataType(a), Self::DataType(b))
            | (Self::DataValue(a), Self::DataValue(b))
            | (Self::CompiledFunction(a), Self::CompiledFunction(b))
            | (Self::Closure(a), Self::Closure(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for RuntimeValue {}

impl Hash for RuntimeValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Null | Self::AnyType => {}
            Self::Bool(b) => b.hash(state),
            Self::Int(i) => i.hash(state),
            Self::Float(f) => f.to_bits().hash(state),
            Self::Char(c) => c.hash(state),
            Self::SimpleType(id) => id.hash(state),
            Self::String(id)
            | Self::Array(id)
            | Self::Dict(id)
            | Self::DataType(id)
            | Self::DataValue(id)
            | Self::CompiledFunction(id)
            | Self::Closure(id) => id.hash(state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::HeapObject;

    #[test]
    fn immediates_report_reserved_type_ids() {
        let heap = Heap::new();
        assert_eq!(RuntimeValue::Int(1).type_id(&heap), TYPE_ID_INT);
        assert_eq!(RuntimeValue::Bool(true).type_id(&heap), TYPE_ID_BOOL);
        assert_eq!(RuntimeValue::Null.type_id(&heap), TYPE_ID_NULL);
    }

    #[test]
    fn only_false_is_falsy() {
        assert!(!RuntimeValue::Bool(false).is_truthy());
        assert!(RuntimeValue::Bool(true).is_truthy());
        assert!(RuntimeValue::Int(0).is_truthy());
        assert!(RuntimeValue::Null.is_truthy());
    }

    #[test]
    fn arrays_compare_structurally() {
        let mut heap = Heap::new();
        let a = heap.alloc(HeapObject::Array(vec![RuntimeValue::Int(1), RuntimeValue::Int(2)]));
        let b = heap.alloc(HeapObject::Array(vec![RuntimeValue::Int(1), RuntimeValue::Int(2)]));
        assert!(RuntimeValue::Array(a).structural_eq(RuntimeValue::Array(b), &heap));
    }

    #[test]
    fn inspect_renders_array_literal_shape() {
        let mut heap = Heap::new();
        let interner = Interner::new();
        let id = heap.alloc(HeapObject::Array(vec![RuntimeValue::Int(1), RuntimeValue::Int(2), RuntimeValue::Int(3)]));
        assert_eq!(RuntimeValue::Array(id).inspect(&heap, &interner), "[1, 2, 3]");
    }
}
