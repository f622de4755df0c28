//! Token definitions for Manaknight

use logos::Logos;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")] // Skip whitespace
#[logos(skip r"//[^\n]*")] // Skip line comments; block comments do not exist
pub enum TokenKind {
    // === Keywords ===
    #[token("module")]
    Module,
    #[token("import")]
    Import,
    #[token("as")]
    As,
    #[token("export")]
    Export,
    #[token("type")]
    Type,
    #[token("effect")]
    Effect,
    #[token("fn")]
    Fn,
    #[token("function")]
    Function,
    #[token("uses")]
    Uses,
    #[token("api")]
    Api,
    #[token("let")]
    Let,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("match")]
    Match,
    #[token("true")]
    True,
    #[token("false")]
    False,

    // === Operators ===
    #[token("==")]
    EqEq,
    #[token("!=")]
    Ne,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("=>")]
    FatArrow,
    #[token("->")]
    Arrow,
    #[token("|>")]
    PipeRight,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("=")]
    Eq,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("!")]
    Bang,
    #[token("|")]
    Pipe,

    // === Delimiters ===
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,

    // === Punctuation ===
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
    #[token(".")]
    Dot,

    // === Literals ===
    // The callback rejects values that do not fit i64; the wrapper maps
    // the resulting error token to E1002.
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().map(|_| ()).map_err(|_| ()))]
    Int,

    // Strings are single-line; `\"` and `\\` are the only escapes.
    #[regex(r#""([^"\\\n]|\\.)*""#)]
    String,

    // === Identifiers ===
    // Keywords win by lookup order, so reserved words never lex as idents.
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Ident,

    // === Special ===
    Error,
    Eof,
}

impl TokenKind {
    pub fn describe(&self) -> &'static str {
        match self {
            TokenKind::Module => "'module'",
            TokenKind::Import => "'import'",
            TokenKind::As => "'as'",
            TokenKind::Export => "'export'",
            TokenKind::Type => "'type'",
            TokenKind::Effect => "'effect'",
            TokenKind::Fn => "'fn'",
            TokenKind::Function => "'function'",
            TokenKind::Uses => "'uses'",
            TokenKind::Api => "'api'",
            TokenKind::Let => "'let'",
            TokenKind::If => "'if'",
            TokenKind::Else => "'else'",
            TokenKind::Match => "'match'",
            TokenKind::True => "'true'",
            TokenKind::False => "'false'",
            TokenKind::EqEq => "'=='",
            TokenKind::Ne => "'!='",
            TokenKind::Le => "'<='",
            TokenKind::Ge => "'>='",
            TokenKind::Lt => "'<'",
            TokenKind::Gt => "'>'",
            TokenKind::FatArrow => "'=>'",
            TokenKind::Arrow => "'->'",
            TokenKind::PipeRight => "'|>'",
            TokenKind::AndAnd => "'&&'",
            TokenKind::OrOr => "'||'",
            TokenKind::Eq => "'='",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Star => "'*'",
            TokenKind::Slash => "'/'",
            TokenKind::Percent => "'%'",
            TokenKind::Bang => "'!'",
            TokenKind::Pipe => "'|'",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::LBrace => "'{'",
            TokenKind::RBrace => "'}'",
            TokenKind::Comma => "','",
            TokenKind::Colon => "':'",
            TokenKind::Semicolon => "';'",
            TokenKind::Dot => "'.'",
            TokenKind::Int => "integer",
            TokenKind::String => "string",
            TokenKind::Ident => "identifier",
            TokenKind::Error => "error",
            TokenKind::Eof => "end of file",
        }
    }
}
