//! Algebraic AST: one tagged union per node family, sharing a `Node` metadata
//! record instead of a virtual-method tree.

use crate::intern::StringId;
use crate::source::SourcePos;

/// Metadata every AST node carries, regardless of family.
#[derive(Debug, Clone)]
pub struct Node {
    pub source: SourcePos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportScope {
    #[default]
    Public,
    Internal,
    Local,
}

/// `@ref(arg*)` attached to the following declaration.
#[derive(Debug, Clone)]
pub struct Annotation {
    pub node: Node,
    pub reference: StringId,
    pub arguments: Vec<Expr>,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub node: Node,
    pub name: StringId,
}

#[derive(Debug, Clone)]
pub struct Field {
    pub node: Node,
    pub name: StringId,
    pub params: Option<Vec<Param>>,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone)]
pub enum EnumCaseBody {
    /// A dotted reference to a sibling declaration.
    Reference(Vec<StringId>),
    /// An inline `data`/`enum` block, materialized as its own declaration.
    Inline(Box<Decl>),
}

#[derive(Debug, Clone)]
pub struct EnumCase {
    pub node: Node,
    pub name: StringId,
    pub body: EnumCaseBody,
}

#[derive(Debug, Clone)]
pub struct ImportRef {
    pub segments: Vec<StringId>,
    pub alias: Option<StringId>,
    pub members: Vec<StringId>,
}

/// A declaration; also usable as a statement in block position.
#[derive(Debug, Clone)]
pub enum Decl {
    Let {
        node: Node,
        export: ExportScope,
        annotations: Vec<Annotation>,
        name: StringId,
        value: Expr,
    },
    Func {
        node: Node,
        export: ExportScope,
        annotations: Vec<Annotation>,
        name: StringId,
        params: Vec<Param>,
        body: Vec<Stmt>,
    },
    Data {
        node: Node,
        export: ExportScope,
        annotations: Vec<Annotation>,
        name: StringId,
        fields: Vec<Field>,
    },
    Enum {
        node: Node,
        export: ExportScope,
        annotations: Vec<Annotation>,
        name: StringId,
        cases: Vec<EnumCase>,
    },
    Extern {
        node: Node,
        export: ExportScope,
        name: StringId,
        params: Option<Vec<Param>>,
        fields: Option<Vec<Field>>,
    },
    Annotation {
        node: Node,
        export: ExportScope,
        name: StringId,
        fields: Vec<Field>,
    },
    Import {
        node: Node,
        reference: ImportRef,
    },
    Module {
        node: Node,
        name: StringId,
    },
}

impl Decl {
    #[must_use]
    pub fn node(&self) -> &Node {
        match self {
            Self::Let { node, .. }
            | Self::Func { node, .. }
            | Self::Data { node, .. }
            | Self::Enum { node, .. }
            | Self::Extern { node, .. }
            | Self::Annotation { node, .. }
            | Self::Import { node, .. }
            | Self::Module { node, .. } => node,
        }
    }

    #[must_use]
    pub fn name(&self) -> Option<StringId> {
        match self {
            Self::Let { name, .. }
            | Self::Func { name, .. }
            | Self::Data { name, .. }
            | Self::Enum { name, .. }
            | Self::Extern { name, .. }
            | Self::Annotation { name, .. }
            | Self::Module { name, .. } => Some(*name),
            Self::Import { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ElseIf {
    pub condition: Expr,
    pub body: Box<Expr>,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Ident {
        node: Node,
        name: StringId,
    },
    Int {
        node: Node,
        value: i64,
    },
    Float {
        node: Node,
        value: f64,
    },
    Bool {
        node: Node,
        value: bool,
    },
    Null {
        node: Node,
    },
    Str {
        node: Node,
        value: StringId,
    },
    Char {
        node: Node,
        value: char,
    },
    Array {
        node: Node,
        elements: Vec<Expr>,
    },
    Dict {
        node: Node,
        entries: Vec<(Expr, Expr)>,
    },
    Group {
        node: Node,
        inner: Box<Expr>,
    },
    Unary {
        node: Node,
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        node: Node,
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        node: Node,
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Member {
        node: Node,
        target: Box<Expr>,
        name: StringId,
    },
    Index {
        node: Node,
        target: Box<Expr>,
        index: Box<Expr>,
    },
    If {
        node: Node,
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_ifs: Vec<ElseIf>,
        else_branch: Box<Expr>,
    },
    Func {
        node: Node,
        params: Vec<Param>,
        body: Vec<Stmt>,
    },
}

impl Expr {
    #[must_use]
    pub fn node(&self) -> &Node {
        match self {
            Self::Ident { node, .. }
            | Self::Int { node, .. }
            | Self::Float { node, .. }
            | Self::Bool { node, .. }
            | Self::Null { node }
            | Self::Str { node, .. }
            | Self::Char { node, .. }
            | Self::Array { node, .. }
            | Self::Dict { node, .. }
            | Self::Group { node, .. }
            | Self::Unary { node, .. }
            | Self::Binary { node, .. }
            | Self::Call { node, .. }
            | Self::Member { node, .. }
            | Self::Index { node, .. }
            | Self::If { node, .. }
            | Self::Func { node, .. } => node,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Expr {
        node: Node,
        expr: Expr,
    },
    Return {
        node: Node,
        value: Option<Expr>,
    },
    If {
        node: Node,
        condition: Expr,
        then_branch: Vec<Stmt>,
        else_ifs: Vec<(Expr, Vec<Stmt>)>,
        else_branch: Option<Vec<Stmt>>,
    },
    Decl(Decl),
}

#[derive(Debug, Clone, Default)]
pub struct SourceFile {
    pub decls: Vec<Decl>,
    pub stmts: Vec<Stmt>,
}
