/// Token types for the jsql lexer
use phf::phf_map;

// Perfect hash map for O(1) keyword lookup
static KEYWORDS: phf::Map<&'static str, TokenType> = phf_map! {
    "select" => TokenType::Select,
    "from" => TokenType::From,
    "where" => TokenType::Where,
    "set" => TokenType::Set,
    "values" => TokenType::Values,
    "order" => TokenType::Order,
    "group" => TokenType::Group,
    "by" => TokenType::By,
    "limit" => TokenType::Limit,
    "offset" => TokenType::Offset,
    "insert" => TokenType::Insert,
    "into" => TokenType::Into,
    "update" => TokenType::Update,
    "delete" => TokenType::Delete,
    "reset" => TokenType::Reset,
    "union" => TokenType::Union,
    "having" => TokenType::Having,
    "join" => TokenType::Join,
    "and" => TokenType::And,
    "or" => TokenType::Or,
    "as" => TokenType::As,
    "asc" => TokenType::Asc,
    "desc" => TokenType::Desc,
    "distinct" => TokenType::Distinct,
    "unique" => TokenType::Unique,
    "like" => TokenType::Like,
    "includes" => TokenType::Includes,
    "excludes" => TokenType::Excludes,
    "in" => TokenType::In,
    "null" => TokenType::Null,
    "true" => TokenType::True,
    "false" => TokenType::False,
};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenType {
    // Clause keywords
    Select,
    From,
    Where,
    Set,
    Values,
    Order,
    Group,
    By,
    Limit,
    Offset,
    Insert,
    Into,
    Update,
    Delete,
    Reset,
    Union,
    Having, // rejected
    Join,   // rejected

    // Other keywords
    And,
    Or,
    As,
    Asc,
    Desc,
    Distinct,
    Unique,
    Like,
    Includes,
    Excludes,
    In,
    Null,
    True,
    False,

    // Comparison operators
    Eq,       // =
    StrictEq, // ==
    Ne,       // !=
    StrictNe, // !==
    Lt,       // <
    Gt,       // >
    Le,       // <=
    Ge,       // >=
    NotLt,    // !<
    NotGt,    // !>
    NotLe,    // !<=
    NotGe,    // !>=
    NotIn,    // !IN

    // Arithmetic (only `*` as wildcard and `-` as sign are accepted)
    Plus,
    Minus,
    Star,
    Slash,
    Percent,

    // Bitwise (always rejected)
    Ampersand,
    Pipe,
    Caret,

    // Delimiters
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Semicolon,

    // Literals
    /// Raw numeric text, parsed by the consumer
    Number(String),
    String(String),
    /// Possibly dotted (`a.b.c`)
    Identifier(String),
    /// `$name`
    Param(String),

    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(token_type: TokenType, line: usize, column: usize) -> Self {
        Self { token_type, line, column }
    }
}

impl TokenType {
    /// Case-insensitive keyword lookup
    pub fn from_keyword(s: &str) -> Option<Self> {
        let lowercase = s.to_lowercase();
        KEYWORDS.get(lowercase.as_str()).cloned()
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(self, TokenType::Plus | TokenType::Slash | TokenType::Percent)
    }

    pub fn is_bitwise(&self) -> bool {
        matches!(self, TokenType::Ampersand | TokenType::Pipe | TokenType::Caret)
    }

    /// Source-like rendering, used in error messages
    pub fn text(&self) -> String {
        let s = match self {
            TokenType::Number(n) => return n.clone(),
            TokenType::String(s) => return format!("'{}'", s),
            TokenType::Identifier(s) => return s.clone(),
            TokenType::Param(s) => return format!("${}", s),
            TokenType::Select => "SELECT",
            TokenType::From => "FROM",
            TokenType::Where => "WHERE",
            TokenType::Set => "SET",
            TokenType::Values => "VALUES",
            TokenType::Order => "ORDER",
            TokenType::Group => "GROUP",
            TokenType::By => "BY",
            TokenType::Limit => "LIMIT",
            TokenType::Offset => "OFFSET",
            TokenType::Insert => "INSERT",
            TokenType::Into => "INTO",
            TokenType::Update => "UPDATE",
            TokenType::Delete => "DELETE",
            TokenType::Reset => "RESET",
            TokenType::Union => "UNION",
            TokenType::Having => "HAVING",
            TokenType::Join => "JOIN",
            TokenType::And => "AND",
            TokenType::Or => "OR",
            TokenType::As => "AS",
            TokenType::Asc => "ASC",
            TokenType::Desc => "DESC",
            TokenType::Distinct => "DISTINCT",
            TokenType::Unique => "UNIQUE",
            TokenType::Like => "LIKE",
            TokenType::Includes => "INCLUDES",
            TokenType::Excludes => "EXCLUDES",
            TokenType::In => "IN",
            TokenType::Null => "NULL",
            TokenType::True => "TRUE",
            TokenType::False => "FALSE",
            TokenType::Eq => "=",
            TokenType::StrictEq => "==",
            TokenType::Ne => "!=",
            TokenType::StrictNe => "!==",
            TokenType::Lt => "<",
            TokenType::Gt => ">",
            TokenType::Le => "<=",
            TokenType::Ge => ">=",
            TokenType::NotLt => "!<",
            TokenType::NotGt => "!>",
            TokenType::NotLe => "!<=",
            TokenType::NotGe => "!>=",
            TokenType::NotIn => "!IN",
            TokenType::Plus => "+",
            TokenType::Minus => "-",
            TokenType::Star => "*",
            TokenType::Slash => "/",
            TokenType::Percent => "%",
            TokenType::Ampersand => "&",
            TokenType::Pipe => "|",
            TokenType::Caret => "^",
            TokenType::LParen => "(",
            TokenType::RParen => ")",
            TokenType::LBracket => "[",
            TokenType::RBracket => "]",
            TokenType::Comma => ",",
            TokenType::Semicolon => ";",
            TokenType::Eof => "<end>",
        };
        s.to_string()
    }
}

/// Render a token run back to text, for error messages
pub fn render(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(|t| t.token_type.text())
        .collect::<Vec<_>>()
        .join(" ")
}
