//! Token definitions for policy statements
//!
//! Keywords match case-insensitively. A `Word` may carry one embedded `/` so
//! that `Domain/Name` principals lex as a single token, and may start with a
//! digit so bare numbers (`between 9 and 17`) are words too.

use logos::Logos;

use super::{TokenClass, TokenKind};

#[derive(Logos, Debug, PartialEq, Eq, Hash, Clone)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum PolicyToken {
    // Statement starters
    #[token("allow", ignore(ascii_case))]
    Allow,
    #[token("deny", ignore(ascii_case))]
    Deny,
    #[token("define", ignore(ascii_case))]
    Define,
    #[token("admit", ignore(ascii_case))]
    Admit,
    #[token("endorse", ignore(ascii_case))]
    Endorse,

    // Statement body
    #[token("to", ignore(ascii_case))]
    To,
    #[token("in", ignore(ascii_case))]
    In,
    #[token("where", ignore(ascii_case))]
    Where,
    #[token("as", ignore(ascii_case))]
    As,
    #[token("of", ignore(ascii_case))]
    Of,
    #[token("id", ignore(ascii_case))]
    Id,
    #[token("associate", ignore(ascii_case))]
    Associate,

    // Subjects and scopes
    #[token("any-user", ignore(ascii_case))]
    AnyUser,
    #[token("any-group", ignore(ascii_case))]
    AnyGroup,
    #[token("service", ignore(ascii_case))]
    Service,
    #[token("group", ignore(ascii_case))]
    Group,
    #[token("dynamic-group", ignore(ascii_case))]
    DynamicGroup,
    #[token("tenancy", ignore(ascii_case))]
    Tenancy,
    #[token("any-tenancy", ignore(ascii_case))]
    AnyTenancy,
    #[token("compartment", ignore(ascii_case))]
    Compartment,

    // Conditions
    #[token("all", ignore(ascii_case))]
    All,
    #[token("any", ignore(ascii_case))]
    Any,
    #[token("before", ignore(ascii_case))]
    Before,
    #[token("after", ignore(ascii_case))]
    After,
    #[token("between", ignore(ascii_case))]
    Between,
    #[token("and", ignore(ascii_case))]
    And,

    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,
    #[token("=")]
    Eq,
    #[token("!=")]
    Neq,
    #[token(":")]
    Colon,
    #[token("/")]
    Slash,

    #[regex(r"'[oO][cC][iI][dD]1\.[^'\r\n]*'", |lex| lex.slice().to_string(), priority = 10)]
    QuotedOcid(String),

    #[regex(r"'[^'\r\n]*'", |lex| lex.slice().to_string(), priority = 5)]
    Quoted(String),

    #[regex(r"[oO][cC][iI][dD]1\.[A-Za-z0-9_\-\.]+", |lex| lex.slice().to_string(), priority = 10)]
    Ocid(String),

    #[regex(r"/[^/\s]+/", |lex| lex.slice().to_string())]
    Pattern(String),

    #[regex(
        r"[A-Za-z0-9_][A-Za-z0-9_\-\.]*(/[A-Za-z0-9_][A-Za-z0-9_\-\.]*)?",
        |lex| lex.slice().to_string(),
        priority = 1
    )]
    Word(String),

    /// Input no other token accepts.
    Unknown(String),
}

impl PolicyToken {
    /// Keywords that open a statement. `ADMIT`/`ENDORSE` directly after
    /// `DENY` continue the `DENY` statement instead.
    pub fn starts_statement(&self, previous: Option<&PolicyToken>) -> bool {
        match self {
            Self::Allow | Self::Define | Self::Deny => true,
            Self::Admit | Self::Endorse => previous != Some(&Self::Deny),
            _ => false,
        }
    }

    /// Source text of payload-bearing tokens.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::QuotedOcid(s)
            | Self::Quoted(s)
            | Self::Ocid(s)
            | Self::Pattern(s)
            | Self::Word(s)
            | Self::Unknown(s) => Some(s),
            _ => None,
        }
    }
}

impl TokenClass for PolicyToken {
    fn kind(&self) -> TokenKind {
        match self {
            Self::QuotedOcid(_) | Self::Ocid(_) => TokenKind::Ocid,
            Self::Quoted(_) => TokenKind::String,
            Self::Pattern(_) => TokenKind::Regex,
            Self::Word(_) => TokenKind::Identifier,
            Self::Unknown(_) => TokenKind::Unknown,
            Self::LBrace
            | Self::RBrace
            | Self::LParen
            | Self::RParen
            | Self::Comma
            | Self::Eq
            | Self::Neq
            | Self::Colon
            | Self::Slash => TokenKind::Punctuation,
            _ => TokenKind::Keyword,
        }
    }

    fn display_name(&self) -> &'static str {
        match self {
            Self::Allow => "ALLOW",
            Self::Deny => "DENY",
            Self::Define => "DEFINE",
            Self::Admit => "ADMIT",
            Self::Endorse => "ENDORSE",
            Self::To => "TO",
            Self::In => "IN",
            Self::Where => "WHERE",
            Self::As => "AS",
            Self::Of => "OF",
            Self::Id => "ID",
            Self::Associate => "ASSOCIATE",
            Self::AnyUser => "ANY_USER",
            Self::AnyGroup => "ANY_GROUP",
            Self::Service => "SERVICE",
            Self::Group => "GROUP",
            Self::DynamicGroup => "DYNAMIC_GROUP",
            Self::Tenancy => "TENANCY",
            Self::AnyTenancy => "ANY_TENANCY",
            Self::Compartment => "COMPARTMENT",
            Self::All => "ALL",
            Self::Any => "ANY",
            Self::Before => "BEFORE",
            Self::After => "AFTER",
            Self::Between => "BETWEEN",
            Self::And => "AND",
            Self::LBrace => "'{'",
            Self::RBrace => "'}'",
            Self::LParen => "'('",
            Self::RParen => "')'",
            Self::Comma => "','",
            Self::Eq => "'='",
            Self::Neq => "'!='",
            Self::Colon => "':'",
            Self::Slash => "'/'",
            Self::QuotedOcid(_) => "QUOTED_OCID",
            Self::Quoted(_) => "QUOTED",
            Self::Ocid(_) => "OCID",
            Self::Pattern(_) => "PATTERN",
            Self::Word(_) => "WORD",
            Self::Unknown(_) => "UNKNOWN",
        }
    }
}
