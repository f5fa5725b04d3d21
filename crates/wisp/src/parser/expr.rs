//! Expression parsing: one recursive function per precedence level (low to
//! high: Or, And, Comparison, Sum, Product, Unary, Postfix/Primary), the
//! shape a hand-written precedence-climbing parser naturally takes when a
//! level (`Comparison`) is explicitly non-associative.

use super::{unescape, Parser};
use crate::ast::{BinaryOp, ElseIf, Expr, Node, Param, Stmt, UnaryOp};
use crate::error::ParseError;
use crate::token::TokenKind;

impl<'a> Parser<'a> {
    pub(super) fn parse_expr(&mut self) -> Expr {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Expr {
        let mut left = self.parse_and();
        while self.at(TokenKind::PipePipe) {
            let node = Node { source: self.cur.source.clone() };
            self.bump();
            let right = self.parse_and();
            left = Expr::Binary {
                node,
                op: BinaryOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        left
    }

    fn parse_and(&mut self) -> Expr {
        let mut left = self.parse_comparison();
        while self.at(TokenKind::AmpAmp) {
            let node = Node { source: self.cur.source.clone() };
            self.bump();
            let right = self.parse_comparison();
            left = Expr::Binary {
                node,
                op: BinaryOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        left
    }

    /// Non-associative: at most one comparison operator is consumed here —
    /// `a == b == c` must parse as a syntax error from the caller's
    /// perspective (the second `==` is simply left unconsumed at this level).
    fn parse_comparison(&mut self) -> Expr {
        let left = self.parse_sum();
        let op = match self.cur.kind {
            TokenKind::EqEq => BinaryOp::Eq,
            TokenKind::BangEq => BinaryOp::Ne,
            TokenKind::Lt => BinaryOp::Lt,
            TokenKind::LtEq => BinaryOp::Le,
            TokenKind::Gt => BinaryOp::Gt,
            TokenKind::GtEq => BinaryOp::Ge,
            _ => return left,
        };
        let node = Node { source: self.cur.source.clone() };
        self.bump();
        let right = self.parse_sum();
        Expr::Binary {
            node,
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    fn parse_sum(&mut self) -> Expr {
        let mut left = self.parse_product();
        loop {
            let op = match self.cur.kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            let node = Node { source: self.cur.source.clone() };
            self.bump();
            let right = self.parse_product();
            left = Expr::Binary {
                node,
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        left
    }

    fn parse_product(&mut self) -> Expr {
        let mut left = self.parse_unary();
        loop {
            let op = match self.cur.kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            let node = Node { source: self.cur.source.clone() };
            self.bump();
            let right = self.parse_unary();
            left = Expr::Binary {
                node,
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        left
    }

    fn parse_unary(&mut self) -> Expr {
        let op = match self.cur.kind {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Bang => UnaryOp::Not,
            _ => return self.parse_postfix(),
        };
        let node = Node { source: self.cur.source.clone() };
        self.bump();
        let operand = self.parse_unary();
        Expr::Unary {
            node,
            op,
            operand: Box::new(operand),
        }
    }

    /// Postfix chain binds tighter than any binary operator: call, member,
    /// index may all stack (`f(x).y[0]`).
    fn parse_postfix(&mut self) -> Expr {
        let mut target = self.parse_primary();
        loop {
            target = match self.cur.kind {
                TokenKind::LParen => self.parse_call(target),
                TokenKind::Dot => self.parse_member(target),
                TokenKind::LBracket => self.parse_index(target),
                _ => break,
            };
        }
        target
    }

    fn parse_call(&mut self, callee: Expr) -> Expr {
        let node = Node { source: self.cur.source.clone() };
        self.bump(); // (
        let mut args = Vec::new();
        if !self.at(TokenKind::RParen) {
            args.push(self.parse_expr());
            while self.eat(TokenKind::Comma) {
                if self.at(TokenKind::RParen) {
                    break;
                }
                args.push(self.parse_expr());
            }
        }
        self.expect(TokenKind::RParen);
        Expr::Call {
            node,
            callee: Box::new(callee),
            args,
        }
    }

    fn parse_member(&mut self, target: Expr) -> Expr {
        let node = Node { source: self.cur.source.clone() };
        self.bump(); // .
        let name = if self.at(TokenKind::Ident) {
            self.intern_cur()
        } else {
            self.push_error(ParseError::UnexpectedToken {
                got: self.cur.kind,
                expected: vec![TokenKind::Ident],
            });
            self.intern_cur()
        };
        self.bump();
        Expr::Member {
            node,
            target: Box::new(target),
            name,
        }
    }

    fn parse_index(&mut self, target: Expr) -> Expr {
        let node = Node { source: self.cur.source.clone() };
        self.bump(); // [
        let index = self.parse_expr();
        self.expect(TokenKind::RBracket);
        Expr::Index {
            node,
            target: Box::new(target),
            index: Box::new(index),
        }
    }

    fn parse_primary(&mut self) -> Expr {
        let node = Node { source: self.cur.source.clone() };
        match self.cur.kind {
            TokenKind::Int => {
                let text = self.cur.literal.clone();
                self.bump();
                match text.parse::<i64>() {
                    Ok(value) => Expr::Int { node, value },
                    Err(e) => {
                        self.push_error_at(ParseError::UnderlyingError { cause: e.to_string() }, node.source.clone());
                        Expr::Int { node, value: 0 }
                    }
                }
            }
            TokenKind::Float => {
                let text = self.cur.literal.clone();
                self.bump();
                match text.parse::<f64>() {
                    Ok(value) => Expr::Float { node, value },
                    Err(e) => {
                        self.push_error_at(ParseError::UnderlyingError { cause: e.to_string() }, node.source.clone());
                        Expr::Float { node, value: 0.0 }
                    }
                }
            }
            TokenKind::String => {
                let text = unescape(&self.cur.literal);
                self.bump();
                let value = self.interner.intern(&text);
                Expr::Str { node, value }
            }
            TokenKind::Char => {
                let text = unescape(&self.cur.literal);
                self.bump();
                let value = text.chars().next().unwrap_or('\0');
                Expr::Char { node, value }
            }
            TokenKind::True => {
                self.bump();
                Expr::Bool { node, value: true }
            }
            TokenKind::False => {
                self.bump();
                Expr::Bool { node, value: false }
            }
            TokenKind::Null => {
                self.bump();
                Expr::Null { node }
            }
            TokenKind::Ident | TokenKind::Blank => {
                let name = self.intern_cur();
                self.bump();
                Expr::Ident { node, name }
            }
            TokenKind::LParen => self.parse_group(),
            TokenKind::LBracket => self.parse_array_or_dict(),
            TokenKind::LBrace => self.parse_func_literal(node),
            TokenKind::If => self.parse_if_expr(),
            _ => {
                self.push_error(ParseError::UnexpectedToken {
                    got: self.cur.kind,
                    expected: vec![TokenKind::Int, TokenKind::Ident, TokenKind::LParen],
                });
                self.bump();
                Expr::Ident {
                    node,
                    name: self.interner.intern(""),
                }
            }
        }
    }

    fn parse_group(&mut self) -> Expr {
        let node = Node { source: self.cur.source.clone() };
        self.bump(); // (
        let inner = self.parse_expr();
        self.expect(TokenKind::RParen);
        Expr::Group { node, inner: Box::new(inner) }
    }

    /// `[]`/`[:]` disambiguate array vs dict by the first separator seen: a
    /// `:` after the first element means dict, `,` or an immediate `]` means
    /// array.
    fn parse_array_or_dict(&mut self) -> Expr {
        let node = Node { source: self.cur.source.clone() };
        self.bump(); // [
        if self.eat(TokenKind::RBracket) {
            return Expr::Array { node, elements: Vec::new() };
        }
        let first = self.parse_expr();
        if self.eat(TokenKind::Colon) {
            let mut entries = vec![(first, self.parse_expr())];
            while self.eat(TokenKind::Comma) {
                if self.at(TokenKind::RBracket) {
                    break;
                }
                let key = self.parse_expr();
                self.expect(TokenKind::Colon);
                let value = self.parse_expr();
                entries.push((key, value));
            }
            self.expect(TokenKind::RBracket);
            return Expr::Dict { node, entries };
        }
        let mut elements = vec![first];
        while self.eat(TokenKind::Comma) {
            if self.at(TokenKind::RBracket) {
                break;
            }
            elements.push(self.parse_expr());
        }
        self.expect(TokenKind::RBracket);
        Expr::Array { node, elements }
    }

    /// `{ params => body }` or `{ body }` (empty parameter list).
    pub(super) fn parse_func_literal(&mut self, node: Node) -> Expr {
        self.bump(); // {
        let params = self.try_parse_param_list_with_arrow();
        let body = self.parse_block_stmts();
        self.expect(TokenKind::RBrace);
        Expr::Func { node, params, body }
    }

    /// Looks ahead for `IDENT (, IDENT)* =>` immediately inside `{`; if not
    /// present, the block has no parameters.
    fn try_parse_param_list_with_arrow(&mut self) -> Vec<Param> {
        if !self.at(TokenKind::Ident) && !self.at(TokenKind::Blank) {
            return Vec::new();
        }
        let checkpoint_is_single_param_arrow = self.peek_at(TokenKind::FatArrow) || self.peek_at(TokenKind::Comma);
        if !checkpoint_is_single_param_arrow {
            return Vec::new();
        }
        let mut params = Vec::new();
        loop {
            let pnode = Node { source: self.cur.source.clone() };
            let name = self.intern_cur();
            self.bump();
            params.push(Param { node: pnode, name });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::FatArrow);
        params
    }

    pub(super) fn parse_block_stmts(&mut self) -> Vec<Stmt> {
        let mut stmts = Vec::new();
        while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
            stmts.push(self.parse_stmt());
        }
        stmts
    }

    /// `if cond { then } (else if cond { .. })* else { else }`, producing an
    /// expression with exactly one expression per branch and a mandatory
    /// final `else`.
    fn parse_if_expr(&mut self) -> Expr {
        let node = Node { source: self.cur.source.clone() };
        self.bump(); // if
        let condition = self.parse_expr();
        let then_branch = self.parse_brace_expr();
        let mut else_ifs = Vec::new();
        loop {
            if !self.at(TokenKind::Else) {
                break;
            }
            if !self.peek_at(TokenKind::If) {
                break;
            }
            self.bump(); // else
            self.bump(); // if
            let cond = self.parse_expr();
            let body = self.parse_brace_expr();
            else_ifs.push(ElseIf { condition: cond, body: Box::new(body) });
        }
        self.expect(TokenKind::Else);
        let else_branch = self.parse_brace_expr();
        Expr::If {
            node,
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_ifs,
            else_branch: Box::new(else_branch),
        }
    }

    /// A `{ expr }` block used in expression-if branches: exactly one
    /// expression, no statements.
    fn parse_brace_expr(&mut self) -> Expr {
        self.expect(TokenKind::LBrace);
        let expr = self.parse_expr();
        self.expect(TokenKind::RBrace);
        expr
    }
}
