#[derive(Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, PartialEq, Clone)]
pub enum TokenKind {
    Namespace,
    Message,
    Service,
    Rpc,
    Returns,
    Stream,
    Repeated,
    Option,

    Int32,
    Int64,
    Float,
    Double,
    Bool,
    StringTy,
    Bytes,
    DateTime,
    Vector3,

    True,
    False,

    Identifier(String),
    Number(u64),
    StringLit(String),

    LeftBrace,
    RightBrace,
    LeftParen,
    RightParen,
    Equal,
    Semicolon,

    Eof,
}

pub struct Scanner<'src> {
    chars: std::iter::Peekable<std::str::CharIndices<'src>>,
    line: usize,
    column: usize,
    start_column: usize,
}

impl<'src> Scanner<'src> {
    pub fn new(source: &str) -> Scanner<'_> {
        Scanner {
            chars: source.char_indices().peekable(),
            line: 1,
            column: 1,
            start_column: 1,
        }
    }

    pub fn next(&mut self) -> Token {
        self.skip_whitespace_and_comments();
        self.start_column = self.column;

        let kind = match self.advance() {
            Some(ch) => match ch {
                '{' => TokenKind::LeftBrace,
                '}' => TokenKind::RightBrace,
                '(' => TokenKind::LeftParen,
                ')' => TokenKind::RightParen,
                '=' => TokenKind::Equal,
                ';' => TokenKind::Semicolon,
                '"' => self.string_literal(),
                ch if ch.is_ascii_digit() => self.number(ch),
                ch if ch.is_alphabetic() || ch == '_' => self.keyword_or_identifier(ch),
                ch => TokenKind::Identifier(ch.to_string()),
            },
            None => TokenKind::Eof,
        };

        Token {
            kind,
            line: self.line,
            column: self.start_column,
        }
    }

    fn advance(&mut self) -> Option<char> {
        match self.chars.next() {
            Some((_, ch)) => {
                self.column += 1;
                Some(ch)
            }
            None => None,
        }
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, ch)| *ch)
    }

    fn keyword_or_identifier(&mut self, first: char) -> TokenKind {
        let mut ident = String::new();
        ident.push(first);
        while let Some(ch) = self.peek_char() {
            if ch.is_alphanumeric() || ch == '_' || ch == '.' {
                ident.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        match ident.as_str() {
            "namespace" => TokenKind::Namespace,
            "message" => TokenKind::Message,
            "service" => TokenKind::Service,
            "rpc" => TokenKind::Rpc,
            "returns" => TokenKind::Returns,
            "stream" => TokenKind::Stream,
            "repeated" => TokenKind::Repeated,
            "option" => TokenKind::Option,
            "int32" => TokenKind::Int32,
            "int64" => TokenKind::Int64,
            "float" => TokenKind::Float,
            "double" => TokenKind::Double,
            "bool" => TokenKind::Bool,
            "string" => TokenKind::StringTy,
            "bytes" => TokenKind::Bytes,
            "DateTime" => TokenKind::DateTime,
            "Vector3" => TokenKind::Vector3,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            _ => TokenKind::Identifier(ident),
        }
    }

    fn number(&mut self, first: char) -> TokenKind {
        let mut digits = String::new();
        digits.push(first);
        while let Some(ch) = self.peek_char() {
            if ch.is_ascii_digit() {
                digits.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        TokenKind::Number(digits.parse().expect("digit-only string parses as u64"))
    }

    fn string_literal(&mut self) -> TokenKind {
        let mut s = String::new();
        loop {
            match self.advance() {
                Some('"') => break,
                Some('\n') => {
                    self.line += 1;
                    self.column = 1;
                    s.push('\n');
                }
                Some(ch) => s.push(ch),
                None => break,
            }
        }
        TokenKind::StringLit(s)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek_char() {
                Some('\n') => {
                    self.advance();
                    self.line += 1;
                    self.column = 1;
                }
                Some(ch) if ch.is_whitespace() => {
                    self.advance();
                }
                Some('/') => {
                    let mut lookahead = self.chars.clone();
                    lookahead.next();
                    if matches!(lookahead.peek(), Some((_, '/'))) {
                        self.advance();
                        self.advance();
                        while !matches!(self.peek_char(), Some('\n') | None) {
                            self.advance();
                        }
                    } else {
                        break;
                    }
                }
                _ => break,
            }
        }
    }
}
