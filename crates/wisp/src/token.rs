//! Token kinds, source-attached tokens, and leading trivia.

use std::fmt;

use crate::source::SourcePos;

/// Closed enum of token kinds.
///
/// Comments and whitespace are never syntactic — they never appear here, only
/// as [`Trivia`] attached to the following token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Literals
    Int,
    Float,
    String,
    Char,
    Ident,

    // Keywords
    Module,
    Import,
    Enum,
    Data,
    Annotation,
    Extern,
    Func,
    Let,
    Type,
    Switch,
    Case,
    Return,
    If,
    Else,
    For,
    True,
    False,
    Null,
    Blank, // `_`

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    BangEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Eq,
    EqEq,
    FatArrow,
    Arrow,
    Amp,
    AmpAmp,
    Pipe,
    PipePipe,
    Dot,
    Comma,
    Colon,
    At,

    // Delimiters
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,

    Illegal,
    Eof,
}

impl TokenKind {
    /// The reserved-word table. Identifiers that match one of these entries
    /// lex as the corresponding keyword kind instead of `Ident`.
    #[must_use]
    pub fn keyword_from_str(word: &str) -> Option<Self> {
        Some(match word {
            "module" => Self::Module,
            "import" => Self::Import,
            "enum" => Self::Enum,
            "data" => Self::Data,
            "annotation" => Self::Annotation,
            "extern" => Self::Extern,
            "func" => Self::Func,
            "let" => Self::Let,
            "type" => Self::Type,
            "switch" => Self::Switch,
            "case" => Self::Case,
            "return" => Self::Return,
            "if" => Self::If,
            "else" => Self::Else,
            "for" => Self::For,
            "true" => Self::True,
            "false" => Self::False,
            "null" => Self::Null,
            "_" => Self::Blank,
            _ => return None,
        })
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A trivia entry: a comment or a whitespace run, preceding some token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trivia {
    pub kind: TriviaKind,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriviaKind {
    Comment,
    /// A whitespace run containing no newline.
    InlineWhitespace,
    /// A whitespace run spanning one or more newlines.
    MultiWhitespace,
}

/// A token: its kind, literal text, source position, and leading trivia.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub literal: String,
    pub source: SourcePos,
    pub leading: Vec<Trivia>,
}

impl Token {
    #[must_use]
    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", self.kind, self.literal)
    }
}
