/// SQL Lexer - converts a statement into tokens

use super::token::{Token, TokenType};
use crate::error::{Error, Result};

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token()?;
            let is_eof = matches!(token.token_type, TokenType::Eof);
            tokens.push(token);
            if is_eof {
                break;
            }
        }

        Ok(tokens)
    }

    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_whitespace();

        let line = self.line;
        let column = self.column;

        if self.is_eof() {
            return Ok(Token::new(TokenType::Eof, line, column));
        }

        let ch = self.current_char();

        // Skip comments
        if ch == '-' && self.peek_char() == Some('-') {
            self.skip_line_comment();
            return self.next_token();
        }

        if ch == '/' && self.peek_char() == Some('*') {
            self.skip_block_comment()?;
            return self.next_token();
        }

        let token_type = match ch {
            '\'' | '"' | '`' => self.read_string(ch)?,

            '0'..='9' => self.read_number(),
            '.' if self.peek_char().map_or(false, |c| c.is_ascii_digit()) => self.read_number(),

            c if c.is_alphabetic() || c == '_' => self.read_identifier(),

            '$' => {
                self.advance();
                let name = self.read_word();
                if name.is_empty() {
                    return Err(self.error("Expected parameter name after '$'", line, column));
                }
                TokenType::Param(name)
            }

            '=' => {
                self.advance();
                if self.eat('=') {
                    TokenType::StrictEq
                } else {
                    TokenType::Eq
                }
            }
            '!' => {
                self.advance();
                if self.eat('=') {
                    if self.eat('=') {
                        TokenType::StrictNe
                    } else {
                        TokenType::Ne
                    }
                } else if self.eat('>') {
                    if self.eat('=') {
                        TokenType::NotGe
                    } else {
                        TokenType::NotGt
                    }
                } else if self.eat('<') {
                    if self.eat('=') {
                        TokenType::NotLe
                    } else {
                        TokenType::NotLt
                    }
                } else if self.read_word().eq_ignore_ascii_case("in") {
                    TokenType::NotIn
                } else {
                    return Err(self.error("Unexpected character '!'", line, column));
                }
            }
            '<' => {
                self.advance();
                if self.eat('=') {
                    TokenType::Le
                } else {
                    TokenType::Lt
                }
            }
            '>' => {
                self.advance();
                if self.eat('=') {
                    TokenType::Ge
                } else {
                    TokenType::Gt
                }
            }
            _ => {
                let token_type = match ch {
                    '+' => TokenType::Plus,
                    '-' => TokenType::Minus,
                    '*' => TokenType::Star,
                    '/' => TokenType::Slash,
                    '%' => TokenType::Percent,
                    '&' => TokenType::Ampersand,
                    '|' => TokenType::Pipe,
                    '^' => TokenType::Caret,
                    '(' => TokenType::LParen,
                    ')' => TokenType::RParen,
                    '[' => TokenType::LBracket,
                    ']' => TokenType::RBracket,
                    ',' => TokenType::Comma,
                    ';' => TokenType::Semicolon,
                    _ => {
                        return Err(self.error(&format!("Unexpected character '{}'", ch), line, column));
                    }
                };
                self.advance();
                token_type
            }
        };

        Ok(Token::new(token_type, line, column))
    }

    fn error(&self, message: &str, line: usize, column: usize) -> Error {
        Error::Syntax(format!("{} at line {} column {}", message, line, column))
    }

    fn current_char(&self) -> char {
        if self.is_eof() {
            '\0'
        } else {
            self.input[self.position]
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn advance(&mut self) {
        if !self.is_eof() {
            if self.input[self.position] == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
            self.position += 1;
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        if !self.is_eof() && self.current_char() == expected {
            self.advance();
            true
        } else {
            false
        }
    }

    fn is_eof(&self) -> bool {
        self.position >= self.input.len()
    }

    fn skip_whitespace(&mut self) {
        while !self.is_eof() && self.current_char().is_whitespace() {
            self.advance();
        }
    }

    fn skip_line_comment(&mut self) {
        while !self.is_eof() && self.current_char() != '\n' {
            self.advance();
        }
        if !self.is_eof() {
            self.advance(); // skip newline
        }
    }

    fn skip_block_comment(&mut self) -> Result<()> {
        let (line, column) = (self.line, self.column);
        self.advance(); // skip '/'
        self.advance(); // skip '*'

        while !self.is_eof() {
            if self.current_char() == '*' && self.peek_char() == Some('/') {
                self.advance();
                self.advance();
                return Ok(());
            }
            self.advance();
        }

        Err(self.error("Unterminated block comment", line, column))
    }

    fn read_string(&mut self, quote: char) -> Result<TokenType> {
        let (line, column) = (self.line, self.column);
        self.advance(); // skip opening quote
        let mut value = String::new();

        while !self.is_eof() && self.current_char() != quote {
            if self.current_char() == '\\' {
                self.advance();
                if self.is_eof() {
                    break;
                }
                let escaped = match self.current_char() {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    c => c,
                };
                value.push(escaped);
            } else {
                value.push(self.current_char());
            }
            self.advance();
        }

        if self.is_eof() {
            return Err(self.error("Unterminated string", line, column));
        }

        self.advance(); // skip closing quote
        // Backticks quote identifiers
        if quote == '`' {
            Ok(TokenType::Identifier(value))
        } else {
            Ok(TokenType::String(value))
        }
    }

    fn read_number(&mut self) -> TokenType {
        let mut value = String::new();

        while !self.is_eof() && (self.current_char().is_ascii_digit() || self.current_char() == '.') {
            value.push(self.current_char());
            self.advance();
        }

        // Scientific notation (e.g., 1.5e10)
        if !self.is_eof() && (self.current_char() == 'e' || self.current_char() == 'E') {
            let digits_follow = match self.peek_char() {
                Some(c) if c.is_ascii_digit() => true,
                Some('+') | Some('-') => self
                    .input
                    .get(self.position + 2)
                    .map_or(false, |c| c.is_ascii_digit()),
                _ => false,
            };
            if digits_follow {
                value.push(self.current_char());
                self.advance();
                if self.current_char() == '+' || self.current_char() == '-' {
                    value.push(self.current_char());
                    self.advance();
                }
                while !self.is_eof() && self.current_char().is_ascii_digit() {
                    value.push(self.current_char());
                    self.advance();
                }
            }
        }

        TokenType::Number(value)
    }

    fn read_word(&mut self) -> String {
        let mut value = String::new();
        while !self.is_eof() {
            let ch = self.current_char();
            if ch.is_alphanumeric() || ch == '_' {
                value.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        value
    }

    /// Identifier or keyword; dotted paths (`a.b.c`) stay one identifier
    fn read_identifier(&mut self) -> TokenType {
        let mut value = self.read_word();

        while self.current_char() == '.'
            && self
                .peek_char()
                .map_or(false, |c| c.is_alphanumeric() || c == '_')
        {
            self.advance();
            value.push('.');
            value.push_str(&self.read_word());
        }

        if value.contains('.') {
            return TokenType::Identifier(value);
        }
        TokenType::from_keyword(&value).unwrap_or(TokenType::Identifier(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(sql: &str) -> Vec<TokenType> {
        Lexer::new(sql)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.token_type)
            .collect()
    }

    #[test]
    fn test_lexer_simple_select() {
        let tokens = types("SELECT * FROM users");
        assert_eq!(tokens.len(), 5); // SELECT, *, FROM, users, EOF
        assert_eq!(tokens[0], TokenType::Select);
        assert_eq!(tokens[1], TokenType::Star);
        assert_eq!(tokens[2], TokenType::From);
        assert_eq!(tokens[3], TokenType::Identifier("users".into()));
        assert_eq!(tokens[4], TokenType::Eof);
    }

    #[test]
    fn test_lexer_operators() {
        let tokens = types("= == != !== < > <= >= !< !> !<= !>= !IN");
        assert_eq!(
            &tokens[..13],
            &[
                TokenType::Eq,
                TokenType::StrictEq,
                TokenType::Ne,
                TokenType::StrictNe,
                TokenType::Lt,
                TokenType::Gt,
                TokenType::Le,
                TokenType::Ge,
                TokenType::NotLt,
                TokenType::NotGt,
                TokenType::NotLe,
                TokenType::NotGe,
                TokenType::NotIn,
            ]
        );
    }

    #[test]
    fn test_lexer_params_paths_and_strings() {
        let tokens = types("WHERE a.b.c = $value AND name = \"Ann\"");
        assert_eq!(tokens[1], TokenType::Identifier("a.b.c".into()));
        assert_eq!(tokens[3], TokenType::Param("value".into()));
        assert_eq!(tokens[7], TokenType::String("Ann".into()));
    }

    #[test]
    fn test_lexer_numbers() {
        let tokens = types("LIMIT 10 OFFSET 2.5e3");
        assert_eq!(tokens[1], TokenType::Number("10".into()));
        assert_eq!(tokens[3], TokenType::Number("2.5e3".into()));
    }

    #[test]
    fn test_lexer_comment() {
        let tokens = types("SELECT * -- this is a comment\nFROM users");
        assert_eq!(tokens.len(), 5);
        assert_eq!(tokens[2], TokenType::From);
    }

    #[test]
    fn test_lexer_keywords_are_case_insensitive() {
        let tokens = types("select Distinct name from users union SELECT * from t");
        assert_eq!(tokens[0], TokenType::Select);
        assert_eq!(tokens[1], TokenType::Distinct);
        assert_eq!(tokens[5], TokenType::Union);
    }

    #[test]
    fn test_lexer_errors_carry_position() {
        let err = Lexer::new("SELECT * FROM users WHERE name = 'Ann").tokenize().unwrap_err();
        assert!(err.to_string().contains("Unterminated string at line 1 column 34"));
        assert!(Lexer::new("SELECT # FROM t").tokenize().is_err());
    }
}
