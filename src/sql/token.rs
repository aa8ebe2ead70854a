//! SQL Tokens - the atomic units of SQL output.
//!
//! The compiler never concatenates SQL text directly; it pushes tokens onto
//! a [`TokenStream`] and serializes the stream once at the end. Identifiers
//! are emitted verbatim (the engine resolves their case), labels are quoted
//! only when they are not plain identifiers, and string literals are always
//! single-quoted with embedded quotes doubled.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::spec::{Aggregate, FilterOperator, JoinKind};

static PLAIN_IDENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
});

/// SQL Token - every element the compiler can emit.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // === Keywords ===
    Select,
    From,
    Where,
    And,
    As,
    On,
    Join(JoinKind),
    OrderBy,
    Asc,
    Desc,

    // === Punctuation ===
    Comma,
    Dot,
    LParen,
    RParen,

    // === Operators ===
    Operator(FilterOperator),

    // === Whitespace / Formatting ===
    Space,
    Newline,
    Indent(usize),

    // === Dynamic Content ===
    /// Table, column or alias name, rendered as written.
    Ident(String),
    /// Table name with an optional catalog qualifier.
    QualifiedIdent {
        database: Option<String>,
        name: String,
    },
    /// Output label; double-quoted unless it is a plain identifier.
    Label(String),
    /// Aggregate function name.
    Function(Aggregate),
    /// String literal
    LitString(String),
    /// Numeric literal, rendered exactly as parsed.
    LitNumber(serde_json::Number),
    /// Boolean literal
    LitBool(bool),
}

impl Token {
    /// Serialize this token to SQL text.
    pub fn serialize(&self) -> String {
        match self {
            Token::Select => "SELECT".into(),
            Token::From => "FROM".into(),
            Token::Where => "WHERE".into(),
            Token::And => "AND".into(),
            Token::As => "AS".into(),
            Token::On => "ON".into(),
            Token::Join(kind) => format!("{} JOIN", kind.as_sql()),
            Token::OrderBy => "ORDER BY".into(),
            Token::Asc => "ASC".into(),
            Token::Desc => "DESC".into(),

            Token::Comma => ",".into(),
            Token::Dot => ".".into(),
            Token::LParen => "(".into(),
            Token::RParen => ")".into(),

            Token::Operator(op) => match op {
                FilterOperator::Eq => "=",
                FilterOperator::Ne => "<>",
                FilterOperator::Lt => "<",
                FilterOperator::Lte => "<=",
                FilterOperator::Gt => ">",
                FilterOperator::Gte => ">=",
                FilterOperator::Like => "LIKE",
                FilterOperator::NotLike => "NOT LIKE",
            }
            .into(),

            Token::Space => " ".into(),
            Token::Newline => "\n".into(),
            Token::Indent(n) => "  ".repeat(*n),

            Token::Ident(name) => name.clone(),
            Token::QualifiedIdent { database, name } => match database {
                Some(db) if !db.is_empty() => format!("{}.{}", db, name),
                _ => name.clone(),
            },
            Token::Label(label) => quote_label(label),
            Token::Function(agg) => agg.as_sql().into(),
            Token::LitString(s) => format!("'{}'", s.replace('\'', "''")),
            Token::LitNumber(n) => n.to_string(),
            Token::LitBool(b) => b.to_string(),
        }
    }
}

/// Quote an output label unless it is a plain identifier.
pub fn quote_label(label: &str) -> String {
    if PLAIN_IDENT.is_match(label) {
        label.to_string()
    } else {
        format!("\"{}\"", label.replace('"', "\"\""))
    }
}

/// A stream of tokens that can be serialized to SQL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenStream {
    tokens: Vec<Token>,
}

impl TokenStream {
    pub fn new() -> Self {
        Self { tokens: vec![] }
    }

    /// Push a single token.
    pub fn push(&mut self, token: Token) -> &mut Self {
        self.tokens.push(token);
        self
    }

    pub fn serialize(&self) -> String {
        self.tokens.iter().map(Token::serialize).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    // Convenience methods for common tokens
    pub fn space(&mut self) -> &mut Self {
        self.push(Token::Space)
    }
    pub fn newline(&mut self) -> &mut Self {
        self.push(Token::Newline)
    }
    pub fn indent(&mut self, n: usize) -> &mut Self {
        if n > 0 {
            self.push(Token::Indent(n));
        }
        self
    }
    pub fn comma(&mut self) -> &mut Self {
        self.push(Token::Comma)
    }
    pub fn lparen(&mut self) -> &mut Self {
        self.push(Token::LParen)
    }
    pub fn rparen(&mut self) -> &mut Self {
        self.push(Token::RParen)
    }

    /// Start a new line at the given indent level.
    pub fn line(&mut self, indent: usize) -> &mut Self {
        self.newline().indent(indent)
    }

    /// `alias.column`
    pub fn column_ref(&mut self, alias: &str, column: &str) -> &mut Self {
        self.push(Token::Ident(alias.into()))
            .push(Token::Dot)
            .push(Token::Ident(column.into()))
    }
}
