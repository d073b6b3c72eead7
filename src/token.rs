use crate::loc::{Loc, Locatable};
use derive_more::Display;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub payload: TokenPayload,
    pub text: String,
    pub loc: Loc,
}

impl Token {
    pub fn new(payload: TokenPayload, text: impl Into<String>, loc: Loc) -> Token {
        Token {
            payload,
            text: text.into(),
            loc,
        }
    }

    pub fn is(&self, payload: TokenPayload) -> bool {
        self.payload == payload
    }
}

impl Locatable for Token {
    fn loc(&self) -> &Loc {
        &self.loc
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use TokenPayload::*;
        match self.payload {
            Ident | Int | Float => write!(f, "{} `{}` at {}", self.payload, self.text, self.loc),
            Str => write!(f, "{} {:?} at {}", self.payload, self.text, self.loc),
            _ => write!(f, "`{}` at {}", self.payload, self.loc),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Keyword {
    #[display(fmt = "fn")]
    Fn,
    #[display(fmt = "let")]
    Let,
    #[display(fmt = "return")]
    Return,
    #[display(fmt = "if")]
    If,
    #[display(fmt = "else")]
    Else,
    #[display(fmt = "while")]
    While,
    #[display(fmt = "do")]
    Do,
    #[display(fmt = "for")]
    For,
    #[display(fmt = "break")]
    Break,
    #[display(fmt = "continue")]
    Continue,
}

impl Keyword {
    pub fn from_ident(ident: &str) -> Option<Keyword> {
        use Keyword::*;
        let keyword = match ident {
            "fn" => Fn,
            "let" => Let,
            "return" => Return,
            "if" => If,
            "else" => Else,
            "while" => While,
            "do" => Do,
            "for" => For,
            "break" => Break,
            "continue" => Continue,
            _ => return None,
        };
        Some(keyword)
    }

    /// Keywords that may begin a statement; the parser resynchronizes on them.
    pub fn starts_statement(self) -> bool {
        !matches!(self, Keyword::Else)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum TypeName {
    #[display(fmt = "isize")]
    Isize,
    #[display(fmt = "void")]
    Void,
}

impl TypeName {
    pub fn from_ident(ident: &str) -> Option<TypeName> {
        match ident {
            "isize" => Some(TypeName::Isize),
            "void" => Some(TypeName::Void),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum TokenPayload {
    #[display(fmt = "(")]
    LParen,
    #[display(fmt = ")")]
    RParen,
    #[display(fmt = "{{")]
    LBrace,
    #[display(fmt = "}}")]
    RBrace,
    #[display(fmt = "[")]
    LBracket,
    #[display(fmt = "]")]
    RBracket,
    #[display(fmt = ",")]
    Comma,
    #[display(fmt = ".")]
    Dot,
    #[display(fmt = ";")]
    Semicolon,
    #[display(fmt = "^")]
    Caret,
    #[display(fmt = "&")]
    Ampersand,
    #[display(fmt = "~")]
    Tilde,
    #[display(fmt = "+")]
    Plus,
    #[display(fmt = "-")]
    Minus,
    #[display(fmt = "*")]
    Star,
    #[display(fmt = "/")]
    Slash,
    #[display(fmt = "%")]
    Percent,
    #[display(fmt = "+=")]
    PlusEqual,
    #[display(fmt = "-=")]
    MinusEqual,
    #[display(fmt = "*=")]
    StarEqual,
    #[display(fmt = "/=")]
    SlashEqual,
    #[display(fmt = "%=")]
    PercentEqual,
    #[display(fmt = "++")]
    PlusPlus,
    #[display(fmt = "--")]
    MinusMinus,
    #[display(fmt = "->")]
    Arrow,
    #[display(fmt = "!")]
    Bang,
    #[display(fmt = "!=")]
    BangEqual,
    #[display(fmt = "=")]
    Equal,
    #[display(fmt = "==")]
    EqualEqual,
    #[display(fmt = "<")]
    Less,
    #[display(fmt = "<=")]
    LessEqual,
    #[display(fmt = "<<")]
    LessLess,
    #[display(fmt = ">")]
    Greater,
    #[display(fmt = ">=")]
    GreaterEqual,
    #[display(fmt = ">>")]
    GreaterGreater,
    #[display(fmt = "and")]
    And,
    #[display(fmt = "or")]
    Or,
    #[display(fmt = "identifier")]
    Ident,
    #[display(fmt = "{}", _0)]
    Keyword(Keyword),
    #[display(fmt = "{}", _0)]
    Type(TypeName),
    #[display(fmt = "integer literal")]
    Int,
    #[display(fmt = "float literal")]
    Float,
    #[display(fmt = "string literal")]
    Str,
    #[display(fmt = "invalid token")]
    Error,
    #[display(fmt = "end of file")]
    Eof,
}
