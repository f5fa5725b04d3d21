//! Declaration parsing: `let`, `func`, `data`, `enum`, `extern`, `annotation`,
//! `import`, `module`, plus the annotation chains (`@ref(arg*)`) that attach
//! to whichever of these follows.

use super::{Context, Parser};
use crate::ast::{Annotation, Decl, EnumCase, EnumCaseBody, ExportScope, Field, ImportRef, Node, Param};
use crate::error::ParseError;
use crate::token::TokenKind;

impl<'a> Parser<'a> {
    pub(super) fn parse_module_decl(&mut self) -> Decl {
        let node = Node { source: self.cur.source.clone() };
        self.bump(); // module
        let name = self.expect_ident();
        Decl::Module { node, name }
    }

    /// Parses zero or more `@ref(args)` annotations, then dispatches on the
    /// following keyword. `import`/`extern` are rejected inside `Block`
    /// context; annotating an `import` is always an error.
    pub(super) fn parse_decl(&mut self, context: Context) -> Decl {
        let annotations = self.parse_annotation_chain();
        let export = ExportScope::Public;
        match self.cur.kind {
            TokenKind::Let => self.parse_let_decl(export, annotations),
            TokenKind::Func => self.parse_func_decl(export, annotations),
            TokenKind::Data => self.parse_data_decl(export, annotations),
            TokenKind::Enum => self.parse_enum_decl(export, annotations),
            TokenKind::Extern => {
                if context == Context::Block {
                    self.push_error(ParseError::MisplacedStatement);
                }
                self.parse_extern_decl(export)
            }
            TokenKind::Annotation => self.parse_annotation_def(export),
            TokenKind::Import => {
                if context == Context::Block {
                    self.push_error(ParseError::MisplacedStatement);
                }
                if !annotations.is_empty() {
                    self.push_error(ParseError::CannotBeAnnotated);
                }
                self.parse_import_decl()
            }
            _ => {
                let node = Node { source: self.cur.source.clone() };
                self.push_error(ParseError::UnexpectedToken {
                    got: self.cur.kind,
                    expected: vec![TokenKind::Let, TokenKind::Func, TokenKind::Data, TokenKind::Enum],
                });
                self.bump();
                Decl::Let {
                    node: node.clone(),
                    export,
                    annotations,
                    name: self.interner.intern(""),
                    value: crate::ast::Expr::Null { node },
                }
            }
        }
    }

    fn parse_annotation_chain(&mut self) -> Vec<Annotation> {
        let mut annotations = Vec::new();
        while self.at(TokenKind::At) {
            let node = Node { source: self.cur.source.clone() };
            self.bump(); // @
            let reference = self.expect_ident();
            let mut arguments = Vec::new();
            if self.eat(TokenKind::LParen) {
                if !self.at(TokenKind::RParen) {
                    arguments.push(self.parse_expr());
                    while self.eat(TokenKind::Comma) {
                        if self.at(TokenKind::RParen) {
                            break;
                        }
                        arguments.push(self.parse_expr());
                    }
                }
                self.expect(TokenKind::RParen);
            }
            annotations.push(Annotation { node, reference, arguments });
        }
        annotations
    }

    fn expect_ident(&mut self) -> crate::intern::StringId {
        if self.at(TokenKind::Ident) {
            let id = self.intern_cur();
            self.bump();
            id
        } else {
            self.push_error(ParseError::UnexpectedToken {
                got: self.cur.kind,
                expected: vec![TokenKind::Ident],
            });
            self.interner.intern("")
        }
    }

    fn parse_let_decl(&mut self, export: ExportScope, annotations: Vec<Annotation>) -> Decl {
        let node = Node { source: self.cur.source.clone() };
        self.bump(); // let
        let name = self.expect_ident();
        self.expect(TokenKind::Eq);
        let value = self.parse_expr();
        Decl::Let { node, export, annotations, name, value }
    }

    fn parse_func_decl(&mut self, export: ExportScope, annotations: Vec<Annotation>) -> Decl {
        let node = Node { source: self.cur.source.clone() };
        self.bump(); // func
        let name = self.expect_ident();
        let params = self.parse_param_list();
        self.expect(TokenKind::LBrace);
        let body = self.parse_block_stmts();
        self.expect(TokenKind::RBrace);
        Decl::Func { node, export, annotations, name, params, body }
    }

    fn parse_param_list(&mut self) -> Vec<Param> {
        let mut params = Vec::new();
        if !self.eat(TokenKind::LParen) {
            return params;
        }
        if !self.at(TokenKind::RParen) {
            params.push(self.parse_param());
            while self.eat(TokenKind::Comma) {
                if self.at(TokenKind::RParen) {
                    break;
                }
                params.push(self.parse_param());
            }
        }
        self.expect(TokenKind::RParen);
        params
    }

    fn parse_param(&mut self) -> Param {
        let node = Node { source: self.cur.source.clone() };
        let name = self.expect_ident();
        Param { node, name }
    }

    fn parse_data_decl(&mut self, export: ExportScope, annotations: Vec<Annotation>) -> Decl {
        let node = Node { source: self.cur.source.clone() };
        self.bump(); // data
        let name = self.expect_ident();
        let mut fields = Vec::new();
        if self.eat(TokenKind::LBrace) {
            while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
                fields.push(self.parse_field());
                self.eat(TokenKind::Comma);
            }
            self.expect(TokenKind::RBrace);
        }
        Decl::Data { node, export, annotations, name, fields }
    }

    /// `annotations? IDENT ('(' param_list ')')? ('=' expr)?`
    fn parse_field(&mut self) -> Field {
        let _field_annotations = self.parse_annotation_chain();
        let node = Node { source: self.cur.source.clone() };
        let name = self.expect_ident();
        let params = if self.at(TokenKind::LParen) { Some(self.parse_param_list()) } else { None };
        let default = if self.eat(TokenKind::Eq) { Some(self.parse_expr()) } else { None };
        Field { node, name, params, default }
    }

    fn parse_enum_decl(&mut self, export: ExportScope, annotations: Vec<Annotation>) -> Decl {
        let node = Node { source: self.cur.source.clone() };
        self.bump(); // enum
        let name = self.expect_ident();
        let mut cases = Vec::new();
        if self.eat(TokenKind::LBrace) {
            while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
                cases.push(self.parse_enum_case());
                self.eat(TokenKind::Comma);
            }
            self.expect(TokenKind::RBrace);
        }
        Decl::Enum { node, export, annotations, name, cases }
    }

    /// A case is either a dotted static reference, or an inline `data`/
    /// `enum` declaration (materialized as its own `Local`-scoped decl, per
    /// the "enum cases referencing inline declarations" design note).
    fn parse_enum_case(&mut self) -> EnumCase {
        let node = Node { source: self.cur.source.clone() };
        let name = self.expect_ident();
        let body = match self.cur.kind {
            TokenKind::Data => EnumCaseBody::Inline(Box::new(self.parse_data_decl(ExportScope::Local, Vec::new()))),
            TokenKind::Enum => EnumCaseBody::Inline(Box::new(self.parse_enum_decl(ExportScope::Local, Vec::new()))),
            _ => {
                let mut segments = vec![name];
                while self.eat(TokenKind::Dot) {
                    segments.push(self.expect_ident());
                }
                EnumCaseBody::Reference(segments)
            }
        };
        EnumCase { node, name, body }
    }

    /// `extern NAME` (opaque), `extern NAME(params)` (function), or
    /// `extern NAME { field* }` (opaque type with members).
    fn parse_extern_decl(&mut self, export: ExportScope) -> Decl {
        let node = Node { source: self.cur.source.clone() };
        self.bump(); // extern
        let name = self.expect_ident();
        let params = if self.at(TokenKind::LParen) { Some(self.parse_param_list()) } else { None };
        let fields = if self.eat(TokenKind::LBrace) {
            let mut fields = Vec::new();
            while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
                fields.push(self.parse_field());
                self.eat(TokenKind::Comma);
            }
            self.expect(TokenKind::RBrace);
            Some(fields)
        } else {
            None
        };
        Decl::Extern { node, export, name, params, fields }
    }

    fn parse_annotation_def(&mut self, export: ExportScope) -> Decl {
        let node = Node { source: self.cur.source.clone() };
        self.bump(); // annotation
        let name = self.expect_ident();
        let mut fields = Vec::new();
        if self.eat(TokenKind::LBrace) {
            while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
                fields.push(self.parse_field());
                self.eat(TokenKind::Comma);
            }
            self.expect(TokenKind::RBrace);
        }
        Decl::Annotation { node, export, name, fields }
    }

    /// `import ref`, `import alias = ref`, either optionally followed by
    /// `{ IDENT (, IDENT)* }` for explicit member imports.
    fn parse_import_decl(&mut self) -> Decl {
        let node = Node { source: self.cur.source.clone() };
        self.bump(); // import
        let first = self.expect_ident();
        let alias = if self.eat(TokenKind::Eq) { Some(first) } else { None };
        let mut segments = if alias.is_some() { vec![self.expect_ident()] } else { vec![first] };
        while self.eat(TokenKind::Dot) {
            segments.push(self.expect_ident());
        }
        let mut members = Vec::new();
        if self.eat(TokenKind::LBrace) {
            if !self.at(TokenKind::RBrace) {
                members.push(self.expect_ident());
                while self.eat(TokenKind::Comma) {
                    if self.at(TokenKind::RBrace) {
                        break;
                    }
                    members.push(self.expect_ident());
                }
            }
            self.expect(TokenKind::RBrace);
        }
        Decl::Import {
            node,
            reference: ImportRef { segments, alias, members },
        }
    }
}
