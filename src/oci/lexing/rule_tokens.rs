//! Token definitions for dynamic-group matching rules

use logos::Logos;

use super::{TokenClass, TokenKind};

#[derive(Logos, Debug, PartialEq, Eq, Hash, Clone)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum RuleToken {
    #[token("all", ignore(ascii_case))]
    All,
    #[token("any", ignore(ascii_case))]
    Any,

    #[token("!=")]
    Neq,
    #[token("=")]
    Eq,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,

    /// Single-quoted, backslash escapes allowed, may span lines.
    #[regex(r"'([^'\\]|\\.)*'", |lex| lex.slice().to_string())]
    String(String),

    #[regex(r"[A-Za-z_][A-Za-z0-9_\-]*", |lex| lex.slice().to_string(), priority = 1)]
    Ident(String),

    Unknown(String),
}

impl TokenClass for RuleToken {
    fn kind(&self) -> TokenKind {
        match self {
            Self::All | Self::Any => TokenKind::Keyword,
            Self::String(_) => TokenKind::String,
            Self::Ident(_) => TokenKind::Identifier,
            Self::Unknown(_) => TokenKind::Unknown,
            _ => TokenKind::Punctuation,
        }
    }

    fn display_name(&self) -> &'static str {
        match self {
            Self::All => "ALL",
            Self::Any => "ANY",
            Self::Neq => "'!='",
            Self::Eq => "'='",
            Self::LBrace => "'{'",
            Self::RBrace => "'}'",
            Self::Comma => "','",
            Self::Dot => "'.'",
            Self::String(_) => "STRING",
            Self::Ident(_) => "IDENT",
            Self::Unknown(_) => "UNKNOWN",
        }
    }
}
