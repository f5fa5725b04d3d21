//! Streaming lexer: bytes → token stream with leading trivia.
//!
//! A byte-cursor scanner, never holding a `chars()` iterator across calls,
//! since [`crate::source::SourcePos`] offsets are byte offsets. Every input
//! byte maps to exactly one token or trivia entry; invalid bytes become
//! `Illegal` tokens rather than aborting the scan.

use crate::source::LogicalUri;
use crate::token::{Token, TokenKind, Trivia, TriviaKind};

/// A byte-cursor over the source text.
struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<u8> {
        self.bytes.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Streaming lexer over a single source file.
pub struct Lexer<'a> {
    cursor: Cursor<'a>,
    file: LogicalUri,
}

impl<'a> Lexer<'a> {
    #[must_use]
    pub fn new(bytes: &'a [u8], file: LogicalUri) -> Self {
        Self {
            cursor: Cursor::new(bytes),
            file,
        }
    }

    /// Returns the next token, absorbing any leading trivia first.
    ///
    /// Once the cursor reaches end of input, returns a single `Eof` token
    /// (repeatedly, on further calls) whose `leading` carries any trailing
    /// comments/whitespace.
    pub fn next_token(&mut self) -> Token {
        let leading = self.absorb_trivia();
        let start = self.cursor.pos as u32;

        if self.cursor.is_at_end() {
            return Token {
                kind: TokenKind::Eof,
                literal: String::new(),
                source: self.pos(start),
                leading,
            };
        }

        let (kind, literal) = self.scan_one();
        Token {
            kind,
            literal,
            source: self.pos(start),
            leading,
        }
    }

    fn pos(&self, offset: u32) -> crate::source::SourcePos {
        crate::source::SourcePos::new(self.file.clone(), offset)
    }

    /// Greedily absorbs a run of comments and whitespace, recording each as
    /// a distinct [`Trivia`] entry in source order.
    fn absorb_trivia(&mut self) -> Vec<Trivia> {
        let mut trivia = Vec::new();
        loop {
            match self.cursor.peek() {
                Some(b'#') => trivia.push(self.scan_line_comment()),
                Some(b'/') if self.cursor.peek2() == Some(b'/') => trivia.push(self.scan_line_comment()),
                Some(b) if b.is_ascii_whitespace() => trivia.push(self.scan_whitespace_run()),
                _ => break,
            }
        }
        trivia
    }

    fn scan_line_comment(&mut self) -> Trivia {
        let start = self.cursor.pos;
        while let Some(b) = self.cursor.peek() {
            if b == b'\n' {
                break;
            }
            self.cursor.advance();
        }
        Trivia {
            kind: TriviaKind::Comment,
            text: String::from_utf8_lossy(&self.cursor.bytes[start..self.cursor.pos]).into_owned(),
        }
    }

    /// A whitespace run is classified `MultiWhitespace` if it contains a
    /// newline, else `InlineWhitespace`; this lets later passes distinguish
    /// same-line trivia from line breaks without re-scanning.
    fn scan_whitespace_run(&mut self) -> Trivia {
        let start = self.cursor.pos;
        let mut saw_newline = false;
        while let Some(b) = self.cursor.peek() {
            if !b.is_ascii_whitespace() {
                break;
            }
            saw_newline |= b == b'\n';
            self.cursor.advance();
        }
        Trivia {
            kind: if saw_newline {
                TriviaKind::MultiWhitespace
            } else {
                TriviaKind::InlineWhitespace
            },
            text: String::from_utf8_lossy(&self.cursor.bytes[start..self.cursor.pos]).into_owned(),
        }
    }

    fn scan_one(&mut self) -> (TokenKind, String) {
        let b = self.cursor.advance().expect("checked not at end");
        match b {
            b'(' => (TokenKind::LParen, "(".into()),
            b')' => (TokenKind::RParen, ")".into()),
            b'{' => (TokenKind::LBrace, "{".into()),
            b'}' => (TokenKind::RBrace, "}".into()),
            b'[' => (TokenKind::LBracket, "[".into()),
            b']' => (TokenKind::RBracket, "]".into()),
            b',' => (TokenKind::Comma, ",".into()),
            b':' => (TokenKind::Colon, ":".into()),
            b'@' => (TokenKind::At, "@".into()),
            b'+' => (TokenKind::Plus, "+".into()),
            b'*' => (TokenKind::Star, "*".into()),
            b'%' => (TokenKind::Percent, "%".into()),
            b'-' => self.two_byte(b'>', TokenKind::Arrow, "->", TokenKind::Minus, "-"),
            b'!' => self.two_byte(b'=', TokenKind::BangEq, "!=", TokenKind::Bang, "!"),
            b'<' => self.two_byte(b'=', TokenKind::LtEq, "<=", TokenKind::Lt, "<"),
            b'>' => self.two_byte(b'=', TokenKind::GtEq, ">=", TokenKind::Gt, ">"),
            b'/' => self.two_byte(b'/', TokenKind::Slash, "//", TokenKind::Slash, "/"),
            b'=' => self.scan_eq(),
            b'&' => self.scan_amp(),
            b'|' => self.scan_pipe(),
            b'.' => self.scan_dot(),
            b'"' => self.scan_string(),
            b'\'' => self.scan_char(),
            b if b.is_ascii_digit() => self.scan_number(b),
            b if is_ident_start(b) => self.scan_ident(b),
            _ => (TokenKind::Illegal, (b as char).to_string()),
        }
    }

    /// Resolves a one-or-two-byte operator: if the next byte is `second`,
    /// consume it and return `(two_kind, two_lit)`; otherwise leave it alone
    /// and return `(one_kind, one_lit)`.
    fn two_byte(
        &mut self,
        second: u8,
        two_kind: TokenKind,
        two_lit: &str,
        one_kind: TokenKind,
        one_lit: &str,
    ) -> (TokenKind, String) {
        if self.cursor.peek() == Some(second) {
            self.cursor.advance();
            (two_kind, two_lit.into())
        } else {
            (one_kind, one_lit.into())
        }
    }

    fn scan_eq(&mut self) -> (TokenKind, String) {
        match self.cursor.peek() {
            Some(b'=') => {
                self.cursor.advance();
                (TokenKind::EqEq, "==".into())
            }
            Some(b'>') => {
                self.cursor.advance();
                (TokenKind::FatArrow, "=>".into())
            }
            _ => (TokenKind::Eq, "=".into()),
        }
    }

    /// `&&` is legal; a stray `&` is `ILLEGAL` (there is no bitwise-and opcode
    /// in this language, per the opcode table).
    fn scan_amp(&mut self) -> (TokenKind, String) {
        if self.cursor.peek() == Some(b'&') {
            self.cursor.advance();
            (TokenKind::AmpAmp, "&&".into())
        } else {
            (TokenKind::Illegal, "&".into())
        }
    }

    fn scan_pipe(&mut self) -> (TokenKind, String) {
        if self.cursor.peek() == Some(b'|') {
            self.cursor.advance();
            (TokenKind::PipePipe, "||".into())
        } else {
            (TokenKind::Illegal, "|".into())
        }
    }

    /// A `.` followed immediately by a digit is ambiguous only when a prior
    /// digit run already consumed the leading digits in `scan_number`; a
    /// standalone `.` is just the member-access/dotted-reference operator.
    fn scan_dot(&mut self) -> (TokenKind, String) {
        (TokenKind::Dot, ".".into())
    }

    fn scan_string(&mut self) -> (TokenKind, String) {
        let start = self.cursor.pos;
        loop {
            match self.cursor.peek() {
                None | Some(b'\n') => {
                    // Unterminated string.
                    let text = String::from_utf8_lossy(&self.cursor.bytes[start..self.cursor.pos]).into_owned();
                    return (TokenKind::Illegal, text);
                }
                Some(b'"') => {
                    let text = String::from_utf8_lossy(&self.cursor.bytes[start..self.cursor.pos]).into_owned();
                    self.cursor.advance();
                    return (TokenKind::String, text);
                }
                Some(b'\\') => {
                    self.cursor.advance();
                    self.cursor.advance();
                }
                Some(_) => {
                    self.cursor.advance();
                }
            }
        }
    }

    /// A char literal is `'x'` honoring a single backslash escape; anything
    /// else (empty, multi-char, unterminated, a literal newline) is
    /// `ILLEGAL`.
    fn scan_char(&mut self) -> (TokenKind, String) {
        let start = self.cursor.pos;
        match self.cursor.peek() {
            Some(b'\\') => {
                self.cursor.advance();
                self.cursor.advance();
            }
            Some(b'\n') | None => {
                let text = String::from_utf8_lossy(&self.cursor.bytes[start..self.cursor.pos]).into_owned();
                return (TokenKind::Illegal, text);
            }
            Some(_) => {
                self.cursor.advance();
            }
        }
        if self.cursor.peek() == Some(b'\'') {
            let text = String::from_utf8_lossy(&self.cursor.bytes[start..self.cursor.pos]).into_owned();
            self.cursor.advance();
            (TokenKind::Char, text)
        } else {
            let text = String::from_utf8_lossy(&self.cursor.bytes[start..self.cursor.pos]).into_owned();
            (TokenKind::Illegal, text)
        }
    }

    /// A digit run; if followed by `.` and another digit run, the result is
    /// `FLOAT` and both runs (plus the dot) are consumed as one literal.
    /// Otherwise the result is `INT` and the `.`, if present, is left as a
    /// separate token (so `1.method()`-style member access still lexes).
    fn scan_number(&mut self, first: u8) -> (TokenKind, String) {
        let start = self.cursor.pos - 1;
        debug_assert!(first.is_ascii_digit());
        while matches!(self.cursor.peek(), Some(b) if b.is_ascii_digit()) {
            self.cursor.advance();
        }
        if self.cursor.peek() == Some(b'.') && matches!(self.cursor.peek2(), Some(b) if b.is_ascii_digit()) {
            self.cursor.advance(); // consume '.'
            while matches!(self.cursor.peek(), Some(b) if b.is_ascii_digit()) {
                self.cursor.advance();
            }
            let text = String::from_utf8_lossy(&self.cursor.bytes[start..self.cursor.pos]).into_owned();
            (TokenKind::Float, text)
        } else {
            let text = String::from_utf8_lossy(&self.cursor.bytes[start..self.cursor.pos]).into_owned();
            (TokenKind::Int, text)
        }
    }

    fn scan_ident(&mut self, first: u8) -> (TokenKind, String) {
        let start = self.cursor.pos - 1;
        debug_assert!(is_ident_start(first));
        while matches!(self.cursor.peek(), Some(b) if is_ident_continue(b)) {
            self.cursor.advance();
        }
        let text = String::from_utf8_lossy(&self.cursor.bytes[start..self.cursor.pos]).into_owned();
        let kind = TokenKind::keyword_from_str(&text).unwrap_or(TokenKind::Ident);
        (kind, text)
    }
}

/// Lexes `text` fully into a `Vec<Token>` ending with `Eof`, used by tests and
/// by callers that want the whole stream up front rather than pulling
/// [`Lexer::next_token`] incrementally.
#[must_use]
pub fn lex_all(text: &[u8], file: LogicalUri) -> Vec<Token> {
    let mut lexer = Lexer::new(text, file);
    let mut tokens = Vec::new();
    loop {
        let is_eof = {
            let tok = lexer.next_token();
            let is_eof = tok.is_eof();
            tokens.push(tok);
            is_eof
        };
        if is_eof {
            break;
        }
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        lex_all(text.as_bytes(), LogicalUri::new("test"))
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_arithmetic() {
        assert_eq!(
            kinds("1 + 2"),
            vec![TokenKind::Int, TokenKind::Plus, TokenKind::Int, TokenKind::Eof]
        );
    }

    #[test]
    fn lexes_float_vs_int_dot() {
        assert_eq!(kinds("1.5"), vec![TokenKind::Float, TokenKind::Eof]);
        assert_eq!(kinds("1.x"), vec![TokenKind::Int, TokenKind::Dot, TokenKind::Ident, TokenKind::Eof]);
    }

    #[test]
    fn lexes_keywords_and_identifiers() {
        assert_eq!(kinds("let x"), vec![TokenKind::Let, TokenKind::Ident, TokenKind::Eof]);
        assert_eq!(kinds("_"), vec![TokenKind::Blank, TokenKind::Eof]);
    }

    #[test]
    fn multi_byte_operators_resolve_by_lookahead() {
        assert_eq!(kinds("!="), vec![TokenKind::BangEq, TokenKind::Eof]);
        assert_eq!(kinds("!"), vec![TokenKind::Bang, TokenKind::Eof]);
        assert_eq!(kinds("=>"), vec![TokenKind::FatArrow, TokenKind::Eof]);
        assert_eq!(kinds("->"), vec![TokenKind::Arrow, TokenKind::Eof]);
        assert_eq!(kinds("&&"), vec![TokenKind::AmpAmp, TokenKind::Eof]);
        assert_eq!(kinds("||"), vec![TokenKind::PipePipe, TokenKind::Eof]);
    }

    #[test]
    fn stray_amp_or_pipe_is_illegal() {
        assert_eq!(kinds("&"), vec![TokenKind::Illegal, TokenKind::Eof]);
        assert_eq!(kinds("|"), vec![TokenKind::Illegal, TokenKind::Eof]);
    }

    #[test]
    fn string_and_char_literals() {
        assert_eq!(kinds(r#""hi""#), vec![TokenKind::String, TokenKind::Eof]);
        assert_eq!(kinds(r"'a'"), vec![TokenKind::Char, TokenKind::Eof]);
        assert_eq!(kinds(r"'\n'"), vec![TokenKind::Char, TokenKind::Eof]);
    }

    #[test]
    fn unterminated_string_is_illegal() {
        assert_eq!(kinds("\"unterminated"), vec![TokenKind::Illegal, TokenKind::Eof]);
    }

    #[test]
    fn comments_and_whitespace_attach_as_leading_trivia() {
        let tokens = lex_all(b"# hi\nlet x", LogicalUri::new("test"));
        assert_eq!(tokens[0].kind, TokenKind::Let);
        assert_eq!(tokens[0].leading.len(), 2);
        assert_eq!(tokens[0].leading[0].kind, TriviaKind::Comment);
        assert_eq!(tokens[0].leading[0].text, "# hi");
        assert_eq!(tokens[0].leading[1].kind, TriviaKind::MultiWhitespace);
    }

    #[test]
    fn trivia_reconstructs_original_source() {
        let src = "  # leading\n  let   x = 1 // trailing\n";
        let tokens = lex_all(src.as_bytes(), LogicalUri::new("test"));
        let mut rebuilt = String::new();
        for tok in &tokens {
            for trivia in &tok.leading {
                rebuilt.push_str(&trivia.text);
            }
            rebuilt.push_str(&tok.literal);
        }
        assert_eq!(rebuilt, src);
    }

    #[test]
    fn eof_carries_trailing_trivia() {
        let tokens = lex_all(b"1 # trailing comment", LogicalUri::new("test"));
        let eof = tokens.last().unwrap();
        assert!(eof.is_eof());
        assert_eq!(eof.leading.len(), 2);
    }
}
