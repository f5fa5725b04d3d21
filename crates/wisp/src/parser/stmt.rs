//! Statement parsing: expression-statement, `return`, if-statement (same
//! shape as if-expression but `else` is optional), and declarations reused
//! as statements inside block position.

use super::{Context, Parser};
use crate::ast::{Node, Stmt};
use crate::token::TokenKind;

impl<'a> Parser<'a> {
    pub(super) fn parse_stmt(&mut self) -> Stmt {
        if self.starts_decl() {
            return Stmt::Decl(self.parse_decl(Context::Block));
        }
        match self.cur.kind {
            TokenKind::Return => self.parse_return_stmt(),
            TokenKind::If => self.parse_if_stmt(),
            _ => self.parse_expr_stmt(),
        }
    }

    fn parse_return_stmt(&mut self) -> Stmt {
        let node = Node { source: self.cur.source.clone() };
        self.bump(); // return
        let value = if self.at_stmt_boundary() { None } else { Some(self.parse_expr()) };
        Stmt::Return { node, value }
    }

    /// A bare `return`/expression-statement ends where the next token could
    /// not possibly continue an expression: end of block, end of file, or
    /// the start of another statement.
    fn at_stmt_boundary(&self) -> bool {
        matches!(self.cur.kind, TokenKind::RBrace | TokenKind::Eof) || self.starts_decl() || self.at(TokenKind::Return) || self.at(TokenKind::If)
    }

    /// Same grammar as if-expression but each branch is a block of
    /// statements and the final `else` is optional; leaves nothing on the
    /// operand stack once compiled.
    fn parse_if_stmt(&mut self) -> Stmt {
        let node = Node { source: self.cur.source.clone() };
        self.bump(); // if
        let condition = self.parse_expr();
        self.expect(TokenKind::LBrace);
        let then_branch = self.parse_block_stmts();
        self.expect(TokenKind::RBrace);
        let mut else_ifs = Vec::new();
        let mut else_branch = None;
        loop {
            if !self.at(TokenKind::Else) {
                break;
            }
            if self.peek_at(TokenKind::If) {
                self.bump(); // else
                self.bump(); // if
                let cond = self.parse_expr();
                self.expect(TokenKind::LBrace);
                let body = self.parse_block_stmts();
                self.expect(TokenKind::RBrace);
                else_ifs.push((cond, body));
            } else {
                self.bump(); // else
                self.expect(TokenKind::LBrace);
                else_branch = Some(self.parse_block_stmts());
                self.expect(TokenKind::RBrace);
                break;
            }
        }
        Stmt::If { node, condition, then_branch, else_ifs, else_branch }
    }

    fn parse_expr_stmt(&mut self) -> Stmt {
        let node = Node { source: self.cur.source.clone() };
        let expr = self.parse_expr();
        Stmt::Expr { node, expr }
    }
}
