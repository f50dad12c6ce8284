// Lumen Lexer: tokenizes .lm source files

use std::fmt;

use crate::error::LexError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Literals
    Int,
    Float,
    Str,
    Ident,

    // Keywords
    Let,
    Const,
    Func,
    Return,
    If,
    Else,
    While,
    For,
    In,
    Repeat,
    Break,
    Continue,
    Try,
    Catch,
    Finally,
    Throw,
    Class,
    Extends,
    Import,
    From,
    As,
    Export,
    Match,
    Assert,
    True,
    False,
    Null,

    // Operators
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    Percent,
    Eq,
    EqEq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    AndAnd,
    OrOr,
    Bang,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    PercentEq,
    FatArrow,
    Pipe,

    // Delimiters
    Dot,
    Comma,
    Colon,
    Semicolon,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,

    // Special
    Eof,
}

impl TokenKind {
    /// Human-readable description used in parse error messages.
    pub fn describe(self) -> &'static str {
        match self {
            TokenKind::Int => "integer",
            TokenKind::Float => "float",
            TokenKind::Str => "string",
            TokenKind::Ident => "identifier",
            TokenKind::Let => "'let'",
            TokenKind::Const => "'const'",
            TokenKind::Func => "'func'",
            TokenKind::Return => "'return'",
            TokenKind::If => "'if'",
            TokenKind::Else => "'else'",
            TokenKind::While => "'while'",
            TokenKind::For => "'for'",
            TokenKind::In => "'in'",
            TokenKind::Repeat => "'repeat'",
            TokenKind::Break => "'break'",
            TokenKind::Continue => "'continue'",
            TokenKind::Try => "'try'",
            TokenKind::Catch => "'catch'",
            TokenKind::Finally => "'finally'",
            TokenKind::Throw => "'throw'",
            TokenKind::Class => "'class'",
            TokenKind::Extends => "'extends'",
            TokenKind::Import => "'import'",
            TokenKind::From => "'from'",
            TokenKind::As => "'as'",
            TokenKind::Export => "'export'",
            TokenKind::Match => "'match'",
            TokenKind::Assert => "'assert'",
            TokenKind::True => "'true'",
            TokenKind::False => "'false'",
            TokenKind::Null => "'null'",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Star => "'*'",
            TokenKind::StarStar => "'**'",
            TokenKind::Slash => "'/'",
            TokenKind::Percent => "'%'",
            TokenKind::Eq => "'='",
            TokenKind::EqEq => "'=='",
            TokenKind::NotEq => "'!='",
            TokenKind::Lt => "'<'",
            TokenKind::LtEq => "'<='",
            TokenKind::Gt => "'>'",
            TokenKind::GtEq => "'>='",
            TokenKind::AndAnd => "'&&'",
            TokenKind::OrOr => "'||'",
            TokenKind::Bang => "'!'",
            TokenKind::PlusEq => "'+='",
            TokenKind::MinusEq => "'-='",
            TokenKind::StarEq => "'*='",
            TokenKind::SlashEq => "'/='",
            TokenKind::PercentEq => "'%='",
            TokenKind::FatArrow => "'=>'",
            TokenKind::Pipe => "'|'",
            TokenKind::Dot => "'.'",
            TokenKind::Comma => "','",
            TokenKind::Colon => "':'",
            TokenKind::Semicolon => "';'",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::LBrace => "'{'",
            TokenKind::RBrace => "'}'",
            TokenKind::LBracket => "'['",
            TokenKind::RBracket => "']'",
            TokenKind::Eof => "end of input",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// Source position (1-based line and column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub fn new(line: u32, column: u32) -> Self {
        Span { line, column }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: u32,
    pub column: u32,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, line: u32, column: u32) -> Self {
        Token { kind, text: text.into(), line, column }
    }

    pub fn span(&self) -> Span {
        Span::new(self.line, self.column)
    }
}

/// Tokenize a whole source text.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source).tokenize()
}

pub struct Lexer {
    source: Vec<char>,
    pos: usize,
    line: u32,
    col: u32,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            source: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<char> {
        self.source.get(self.pos + 1).copied()
    }

    fn peek3(&self) -> Option<char> {
        self.source.get(self.pos + 2).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.source.get(self.pos).copied();
        if let Some(c) = ch {
            self.pos += 1;
            if c == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
        }
        ch
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_escape(&mut self, line: u32, column: u32) -> Result<char, LexError> {
        let esc_line = self.line;
        let esc_col = self.col - 1;
        match self.advance() {
            Some('n') => Ok('\n'),
            Some('t') => Ok('\t'),
            Some('r') => Ok('\r'),
            Some('0') => Ok('\0'),
            Some('\\') => Ok('\\'),
            Some('"') => Ok('"'),
            Some('\'') => Ok('\''),
            Some('u') => {
                if self.advance() != Some('{') {
                    return Err(LexError::new("expected '{' after \\u", esc_line, esc_col));
                }
                let mut hex = String::new();
                loop {
                    match self.advance() {
                        Some('}') => break,
                        Some(c) if c.is_ascii_hexdigit() && hex.len() < 6 => hex.push(c),
                        _ => return Err(LexError::new("malformed unicode escape", esc_line, esc_col)),
                    }
                }
                u32::from_str_radix(&hex, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| LexError::new(format!("invalid unicode escape '\\u{{{}}}'", hex), esc_line, esc_col))
            }
            Some(c) => Err(LexError::new(format!("unknown escape sequence '\\{}'", c), esc_line, esc_col)),
            None => Err(LexError::new("unterminated string literal", line, column)),
        }
    }

    fn read_string(&mut self, quote: char, line: u32, column: u32) -> Result<Token, LexError> {
        if quote == '"' && self.peek() == Some('"') && self.peek2() == Some('"') {
            self.advance();
            self.advance();
            return self.read_triple_string(line, column);
        }
        let mut result = String::new();
        loop {
            match self.advance() {
                None | Some('\n') => return Err(LexError::new("unterminated string literal", line, column)),
                Some(c) if c == quote => break,
                Some('\\') => result.push(self.read_escape(line, column)?),
                Some(c) => result.push(c),
            }
        }
        Ok(Token::new(TokenKind::Str, result, line, column))
    }

    fn read_triple_string(&mut self, line: u32, column: u32) -> Result<Token, LexError> {
        let mut result = String::new();
        loop {
            if self.peek() == Some('"') && self.peek2() == Some('"') && self.peek3() == Some('"') {
                self.advance();
                self.advance();
                self.advance();
                break;
            }
            match self.advance() {
                None => return Err(LexError::new("unterminated triple-quoted string", line, column)),
                Some('\\') => result.push(self.read_escape(line, column)?),
                Some(c) => result.push(c),
            }
        }
        Ok(Token::new(TokenKind::Str, result, line, column))
    }

    fn read_number(&mut self, first: char, line: u32, column: u32) -> Result<Token, LexError> {
        let mut s = String::new();
        s.push(first);
        let mut is_float = false;

        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                s.push(c);
                self.advance();
            } else if c == '_' && self.peek2().map_or(false, |x| x.is_ascii_digit()) {
                self.advance();
            } else if c == '.' && !is_float && self.peek2().map_or(false, |x| x.is_ascii_digit()) {
                is_float = true;
                s.push(c);
                self.advance();
            } else if (c == 'e' || c == 'E') && self.exponent_follows() {
                is_float = true;
                s.push('e');
                self.advance();
                if let Some(sign @ ('+' | '-')) = self.peek() {
                    s.push(sign);
                    self.advance();
                }
                while let Some(d) = self.peek() {
                    if !d.is_ascii_digit() { break; }
                    s.push(d);
                    self.advance();
                }
                break;
            } else {
                break;
            }
        }

        if is_float {
            if s.parse::<f64>().is_err() {
                return Err(LexError::new(format!("invalid float literal '{}'", s), line, column));
            }
            Ok(Token::new(TokenKind::Float, s, line, column))
        } else {
            if s.parse::<i64>().is_err() {
                return Err(LexError::new(format!("integer literal '{}' is too large", s), line, column));
            }
            Ok(Token::new(TokenKind::Int, s, line, column))
        }
    }

    fn exponent_follows(&self) -> bool {
        match self.peek2() {
            Some(d) if d.is_ascii_digit() => true,
            Some('+' | '-') => self.peek3().map_or(false, |d| d.is_ascii_digit()),
            _ => false,
        }
    }

    fn read_ident(&mut self, first: char, line: u32, column: u32) -> Token {
        let mut s = String::new();
        s.push(first);
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                s.push(c);
                self.advance();
            } else {
                break;
            }
        }
        let kind = match s.as_str() {
            "let"      => TokenKind::Let,
            "const"    => TokenKind::Const,
            "func"     => TokenKind::Func,
            "return"   => TokenKind::Return,
            "if"       => TokenKind::If,
            "else"     => TokenKind::Else,
            "while"    => TokenKind::While,
            "for"      => TokenKind::For,
            "in"       => TokenKind::In,
            "repeat"   => TokenKind::Repeat,
            "break"    => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "try"      => TokenKind::Try,
            "catch"    => TokenKind::Catch,
            "finally"  => TokenKind::Finally,
            "throw"    => TokenKind::Throw,
            "class"    => TokenKind::Class,
            "extends"  => TokenKind::Extends,
            "import"   => TokenKind::Import,
            "from"     => TokenKind::From,
            "as"       => TokenKind::As,
            "export"   => TokenKind::Export,
            "match"    => TokenKind::Match,
            "assert"   => TokenKind::Assert,
            "true"     => TokenKind::True,
            "false"    => TokenKind::False,
            "null"     => TokenKind::Null,
            "and"      => TokenKind::AndAnd,
            "or"       => TokenKind::OrOr,
            "not"      => TokenKind::Bang,
            _          => TokenKind::Ident,
        };
        Token::new(kind, s, line, column)
    }

    /// Consume a second character if it matches, picking the two-char kind.
    fn pair(&mut self, next: char, double: TokenKind, single: TokenKind) -> TokenKind {
        if self.peek() == Some(next) {
            self.advance();
            double
        } else {
            single
        }
    }

    fn read_operator(&mut self, ch: char, line: u32, column: u32) -> Result<TokenKind, LexError> {
        let kind = match ch {
            '+' => self.pair('=', TokenKind::PlusEq, TokenKind::Plus),
            '-' => self.pair('=', TokenKind::MinusEq, TokenKind::Minus),
            '*' => {
                if self.peek() == Some('*') {
                    self.advance();
                    TokenKind::StarStar
                } else {
                    self.pair('=', TokenKind::StarEq, TokenKind::Star)
                }
            }
            '/' => self.pair('=', TokenKind::SlashEq, TokenKind::Slash),
            '%' => self.pair('=', TokenKind::PercentEq, TokenKind::Percent),
            '=' => {
                if self.peek() == Some('>') {
                    self.advance();
                    TokenKind::FatArrow
                } else {
                    self.pair('=', TokenKind::EqEq, TokenKind::Eq)
                }
            }
            '!' => self.pair('=', TokenKind::NotEq, TokenKind::Bang),
            '<' => self.pair('=', TokenKind::LtEq, TokenKind::Lt),
            '>' => self.pair('=', TokenKind::GtEq, TokenKind::Gt),
            '&' => {
                if self.peek() == Some('&') {
                    self.advance();
                    TokenKind::AndAnd
                } else {
                    return Err(LexError::new("unexpected character '&' (did you mean '&&'?)", line, column));
                }
            }
            '|' => self.pair('|', TokenKind::OrOr, TokenKind::Pipe),
            '.' => TokenKind::Dot,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            ';' => TokenKind::Semicolon,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            _ => return Err(LexError::new(format!("unexpected character '{}'", ch), line, column)),
        };
        Ok(kind)
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace();
            let (line, column) = (self.line, self.col);

            let ch = match self.peek() {
                None => {
                    tokens.push(Token::new(TokenKind::Eof, "", line, column));
                    break;
                }
                Some(c) => c,
            };

            // Comments
            if ch == '/' && self.peek2() == Some('/') {
                while let Some(c) = self.peek() {
                    if c == '\n' { break; }
                    self.advance();
                }
                continue;
            }

            // Multi-line comments
            if ch == '/' && self.peek2() == Some('*') {
                self.advance();
                self.advance();
                loop {
                    match self.advance() {
                        None => return Err(LexError::new("unterminated block comment", line, column)),
                        Some('*') if self.peek() == Some('/') => {
                            self.advance();
                            break;
                        }
                        _ => {}
                    }
                }
                continue;
            }

            let start = self.pos;
            self.advance();

            let token = match ch {
                '"' | '\'' => self.read_string(ch, line, column)?,
                c if c.is_ascii_digit() => self.read_number(c, line, column)?,
                c if c.is_alphabetic() || c == '_' => self.read_ident(c, line, column),
                _ => {
                    let kind = self.read_operator(ch, line, column)?;
                    let text: String = self.source[start..self.pos].iter().collect();
                    Token::new(kind, text, line, column)
                }
            };

            tokens.push(token);
        }

        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn keywords_and_identifiers() {
        assert_eq!(
            kinds("let const func foo repeat"),
            vec![
                TokenKind::Let,
                TokenKind::Const,
                TokenKind::Func,
                TokenKind::Ident,
                TokenKind::Repeat,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn word_and_symbol_logic_share_kinds() {
        let toks = tokenize("a and b && c or d || not e !f").unwrap();
        let ks: Vec<_> = toks.iter().map(|t| t.kind).collect();
        assert_eq!(ks[1], TokenKind::AndAnd);
        assert_eq!(ks[3], TokenKind::AndAnd);
        assert_eq!(ks[5], TokenKind::OrOr);
        assert_eq!(ks[7], TokenKind::OrOr);
        assert_eq!(ks[8], TokenKind::Bang);
        assert_eq!(ks[10], TokenKind::Bang);
        assert_eq!(toks[1].text, "and");
        assert_eq!(toks[3].text, "&&");
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            kinds("1 // line\n/* block\n comment */ 2"),
            vec![TokenKind::Int, TokenKind::Int, TokenKind::Eof]
        );
    }

    #[test]
    fn string_escapes() {
        let toks = tokenize(r#""a\n\t\"b\" \u{41}" 'it\'s'"#).unwrap();
        assert_eq!(toks[0].text, "a\n\t\"b\" A");
        assert_eq!(toks[1].text, "it's");
    }

    #[test]
    fn triple_quoted_strings_span_lines() {
        let toks = tokenize("\"\"\"one\ntwo \"quoted\" end\"\"\" x").unwrap();
        assert_eq!(toks[0].kind, TokenKind::Str);
        assert_eq!(toks[0].text, "one\ntwo \"quoted\" end");
        assert_eq!(toks[1].kind, TokenKind::Ident);
        assert_eq!(toks[1].line, 2);
    }

    #[test]
    fn numbers() {
        let toks = tokenize("42 1_000 3.25 2e3 1.5e-2 7.method").unwrap();
        let texts: Vec<_> = toks.iter().map(|t| (t.kind, t.text.as_str())).collect();
        assert_eq!(texts[0], (TokenKind::Int, "42"));
        assert_eq!(texts[1], (TokenKind::Int, "1000"));
        assert_eq!(texts[2], (TokenKind::Float, "3.25"));
        assert_eq!(texts[3], (TokenKind::Float, "2e3"));
        assert_eq!(texts[4], (TokenKind::Float, "1.5e-2"));
        assert_eq!(texts[5], (TokenKind::Int, "7"));
        assert_eq!(texts[6], (TokenKind::Dot, "."));
    }

    #[test]
    fn compound_operators() {
        assert_eq!(
            kinds("** *= += == => != <= >= |"),
            vec![
                TokenKind::StarStar,
                TokenKind::StarEq,
                TokenKind::PlusEq,
                TokenKind::EqEq,
                TokenKind::FatArrow,
                TokenKind::NotEq,
                TokenKind::LtEq,
                TokenKind::GtEq,
                TokenKind::Pipe,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn positions_are_tracked() {
        let toks = tokenize("let x\n  = 5;").unwrap();
        assert_eq!((toks[0].line, toks[0].column), (1, 1));
        assert_eq!((toks[1].line, toks[1].column), (1, 5));
        assert_eq!((toks[2].line, toks[2].column), (2, 3));
        assert_eq!(toks[2].text, "=");
        assert_eq!((toks[3].line, toks[3].column), (2, 5));
    }

    #[test]
    fn unterminated_string_reports_start() {
        let err = tokenize("let s = \"abc").unwrap_err();
        assert_eq!((err.line, err.column), (1, 9));
        assert!(err.message.contains("unterminated string"));
    }

    #[test]
    fn unterminated_block_comment() {
        let err = tokenize("1 /* never closed").unwrap_err();
        assert_eq!((err.line, err.column), (1, 3));
    }

    #[test]
    fn invalid_character() {
        let err = tokenize("let a = 1 @ 2").unwrap_err();
        assert_eq!(err.column, 11);
        assert!(err.message.contains('@'));
    }

    #[test]
    fn integer_overflow_is_a_lex_error() {
        assert!(tokenize("99999999999999999999").is_err());
    }
}
