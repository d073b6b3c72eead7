use crate::diagnostic::Diagnostics;
use crate::loc::Loc;
use crate::token::{Keyword, Token, TokenPayload, TypeName};

#[derive(Debug)]
pub struct Lexer<'a> {
    input: Vec<char>,
    pos: usize,
    line: usize,
    diagnostics: &'a mut Diagnostics,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &str, diagnostics: &'a mut Diagnostics) -> Lexer<'a> {
        Lexer {
            input: input.chars().collect(),
            pos: 0,
            line: 1,
            diagnostics,
        }
    }

    fn inc_pos(&mut self) {
        if self.input[self.pos] == '\n' {
            self.line += 1;
        }
        self.pos += 1;
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.input.get(self.pos + 1).copied()
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.inc_pos();
            true
        } else {
            false
        }
    }

    fn skip_trivia(&mut self) {
        while let Some(c) = self.peek() {
            match (c, self.peek_next()) {
                (' ' | '\t' | '\r' | '\n', _) => self.inc_pos(),
                ('/', Some('/')) => {
                    while !matches!(self.peek(), None | Some('\n')) {
                        self.inc_pos();
                    }
                }
                ('/', Some('*')) => {
                    self.inc_pos();
                    self.inc_pos();
                    // an unterminated comment runs to the end of input
                    while self.peek().is_some() {
                        if self.peek() == Some('*') && self.peek_next() == Some('/') {
                            self.inc_pos();
                            self.inc_pos();
                            break;
                        }
                        self.inc_pos();
                    }
                }
                _ => break,
            }
        }
    }

    fn text(&self, begin: usize) -> String {
        self.input[begin..self.pos].iter().collect()
    }

    fn loc(&self, line: usize, begin: usize) -> Loc {
        Loc::new(line, begin, self.pos.saturating_sub(1).max(begin))
    }

    fn error(&mut self, message: String, loc: Loc) -> Token {
        self.diagnostics.report_at(message, loc);
        Token::new(TokenPayload::Error, "", loc)
    }

    fn number(&mut self, line: usize, begin: usize) -> Token {
        let mut digits = String::new();
        let mut is_float = false;
        let mut extra_dot = None;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' => digits.push(c),
                '_' => {}
                '.' => {
                    if is_float {
                        extra_dot.get_or_insert(self.pos);
                    }
                    is_float = true;
                    digits.push(c);
                }
                _ => break,
            }
            self.inc_pos();
        }

        if let Some(dot) = extra_dot {
            return self.error("Unexpected '.'".to_string(), Loc::new(line, dot, dot));
        }
        let payload = if is_float {
            TokenPayload::Float
        } else {
            TokenPayload::Int
        };
        Token::new(payload, digits, self.loc(line, begin))
    }

    fn identifier(&mut self, line: usize, begin: usize) -> Token {
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.inc_pos();
        }
        let text = self.text(begin);
        let payload = if let Some(keyword) = Keyword::from_ident(&text) {
            TokenPayload::Keyword(keyword)
        } else if let Some(typ) = TypeName::from_ident(&text) {
            TokenPayload::Type(typ)
        } else if text == "and" {
            TokenPayload::And
        } else if text == "or" {
            TokenPayload::Or
        } else {
            TokenPayload::Ident
        };
        Token::new(payload, text, self.loc(line, begin))
    }

    fn string(&mut self, line: usize, begin: usize) -> Token {
        self.inc_pos();
        let mut body = String::new();
        loop {
            match self.peek() {
                None => {
                    let loc = self.loc(line, begin);
                    return self.error("Unterminated string".to_string(), loc);
                }
                Some('"') => {
                    self.inc_pos();
                    break;
                }
                Some(c) => {
                    body.push(c);
                    self.inc_pos();
                }
            }
        }
        Token::new(TokenPayload::Str, body, self.loc(line, begin))
    }

    fn operator(&mut self, line: usize, begin: usize, c: char) -> Token {
        use TokenPayload::*;
        self.inc_pos();
        let payload = match c {
            '(' => LParen,
            ')' => RParen,
            '{' => LBrace,
            '}' => RBrace,
            '[' => LBracket,
            ']' => RBracket,
            ',' => Comma,
            '.' => Dot,
            ';' => Semicolon,
            '^' => Caret,
            '~' => Tilde,
            '-' if self.eat('=') => MinusEqual,
            '-' if self.eat('>') => Arrow,
            '-' if self.eat('-') => MinusMinus,
            '-' => Minus,
            '+' if self.eat('=') => PlusEqual,
            '+' if self.eat('+') => PlusPlus,
            '+' => Plus,
            '*' if self.eat('=') => StarEqual,
            '*' => Star,
            '/' if self.eat('=') => SlashEqual,
            '/' => Slash,
            '%' if self.eat('=') => PercentEqual,
            '%' => Percent,
            '!' if self.eat('=') => BangEqual,
            '!' => Bang,
            '=' if self.eat('=') => EqualEqual,
            '=' => Equal,
            '<' if self.eat('=') => LessEqual,
            '<' if self.eat('<') => LessLess,
            '<' => Less,
            '>' if self.eat('=') => GreaterEqual,
            '>' if self.eat('>') => GreaterGreater,
            '>' => Greater,
            '&' if self.eat('&') => And,
            '&' => Ampersand,
            '|' if self.eat('|') => Or,
            _ => {
                let loc = self.loc(line, begin);
                return self.error(format!("Unexpected character '{}'", c), loc);
            }
        };
        Token::new(payload, self.text(begin), self.loc(line, begin))
    }

    fn next_token(&mut self) -> Token {
        self.skip_trivia();
        let begin = self.pos;
        let line = self.line;
        let Some(c) = self.peek() else {
            return Token::new(TokenPayload::Eof, "", Loc::new(line, begin, begin));
        };

        match c {
            '0'..='9' => self.number(line, begin),
            'a'..='z' | 'A'..='Z' | '_' => self.identifier(line, begin),
            '"' => self.string(line, begin),
            _ => self.operator(line, begin, c),
        }
    }

    pub fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let is_eof = token.is(TokenPayload::Eof);
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        tokens
    }
}

/// Scan `source` into tokens. Never fails: lexical errors are recorded in
/// `diagnostics` and leave an `Error` token in the stream, and the result
/// always ends with a single `Eof`.
pub fn tokenize(source: &str, diagnostics: &mut Diagnostics) -> Vec<Token> {
    let tokens = Lexer::new(source, diagnostics).tokenize();
    tracing::debug!(tokens = tokens.len(), "tokenized");
    tokens
}
