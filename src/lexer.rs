//! Lexer (C7): source text → token stream, spec.md §4.7.

use crate::error::LexError;
use crate::token::{Keyword, Pos, Token, TokenKind};

pub struct Lexer<'a> {
    source: &'a [u8],
    pos: usize,
    line: usize,
    col: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source: source.as_bytes(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    pub fn tokenize(source: &'a str) -> Result<Vec<Token>, LexError> {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        loop {
            let tok = lexer.next_token()?;
            let done = tok.kind == TokenKind::Eof;
            tokens.push(tok);
            if done {
                break;
            }
        }
        Ok(tokens)
    }

    fn here(&self) -> Pos {
        Pos::new(self.line, self.col)
    }

    fn peek(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.source.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        if c == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn skip_non_newline_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(b' ') | Some(b'\t') | Some(b'\r') => {
                    self.advance();
                }
                Some(b'#') => {
                    while let Some(c) = self.peek() {
                        if c == b'\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_non_newline_whitespace_and_comments();

        let start = self.here();
        let Some(c) = self.peek() else {
            return Ok(Token::new(TokenKind::Eof, start));
        };

        if c == b'\n' {
            self.advance();
            return Ok(Token::new(TokenKind::Newline, start));
        }

        if c == b'"' || c == b'\'' {
            return self.lex_string(c, start);
        }

        if c.is_ascii_digit() {
            return self.lex_number(start);
        }

        if c.is_ascii_alphabetic() || c == b'_' {
            return Ok(self.lex_identifier(start));
        }

        self.lex_operator(start)
    }

    fn lex_string(&mut self, quote: u8, start: Pos) -> Result<Token, LexError> {
        self.advance(); // opening quote
        let mut out = String::new();
        loop {
            match self.peek() {
                Option::None => {
                    return Err(LexError {
                        pos: start,
                        message: "unterminated string".to_string(),
                    })
                }
                Some(c) if c == quote => {
                    self.advance();
                    break;
                }
                Some(b'\\') => {
                    self.advance();
                    match self.advance() {
                        Some(b'n') => out.push('\n'),
                        Some(b't') => out.push('\t'),
                        Some(b'\\') => out.push('\\'),
                        Some(b'"') => out.push('"'),
                        Some(b'\'') => out.push('\''),
                        Some(other) => out.push(other as char),
                        Option::None => {
                            return Err(LexError {
                                pos: start,
                                message: "unterminated string".to_string(),
                            })
                        }
                    }
                }
                Some(c) => {
                    self.advance();
                    out.push(c as char);
                }
            }
        }
        Ok(Token::new(TokenKind::String(out), start))
    }

    fn lex_number(&mut self, start: Pos) -> Result<Token, LexError> {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c as char);
                self.advance();
            } else {
                break;
            }
        }
        let is_float = self.peek() == Some(b'.')
            && self
                .peek_at(1)
                .map(|c| c.is_ascii_digit())
                .unwrap_or(false);
        if is_float {
            text.push('.');
            self.advance();
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    text.push(c as char);
                    self.advance();
                } else {
                    break;
                }
            }
            let value: f64 = text.parse().map_err(|_| LexError {
                pos: start,
                message: format!("malformed number '{text}'"),
            })?;
            return Ok(Token::new(TokenKind::Float(value), start));
        }
        let value: i64 = text.parse().map_err(|_| LexError {
            pos: start,
            message: format!("malformed number '{text}'"),
        })?;
        Ok(Token::new(TokenKind::Integer(value), start))
    }

    fn lex_identifier(&mut self, start: Pos) -> Token {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == b'_' {
                text.push(c as char);
                self.advance();
            } else {
                break;
            }
        }
        if let Some(kw) = Keyword::lookup(&text) {
            Token::new(TokenKind::Keyword(kw), start)
        } else {
            Token::new(TokenKind::Identifier(text), start)
        }
    }

    fn lex_operator(&mut self, start: Pos) -> Result<Token, LexError> {
        let c = self.advance().unwrap();
        let two_char = |this: &mut Self, expect: u8, kind: TokenKind| -> Option<TokenKind> {
            if this.peek() == Some(expect) {
                this.advance();
                Some(kind)
            } else {
                Option::None
            }
        };

        let kind = match c {
            b'=' => two_char(self, b'=', TokenKind::EqEq).unwrap_or(TokenKind::Eq),
            b'!' => match two_char(self, b'=', TokenKind::NotEq) {
                Some(k) => k,
                Option::None => {
                    return Err(LexError {
                        pos: start,
                        message: "unexpected character '!'".to_string(),
                    })
                }
            },
            b'<' => two_char(self, b'=', TokenKind::LtEq).unwrap_or(TokenKind::Lt),
            b'>' => two_char(self, b'=', TokenKind::GtEq).unwrap_or(TokenKind::Gt),
            b'-' => two_char(self, b'>', TokenKind::Arrow).unwrap_or(TokenKind::Minus),
            b'+' => TokenKind::Plus,
            b'*' => TokenKind::Star,
            b'/' => TokenKind::Slash,
            b'%' => TokenKind::Percent,
            b'.' => TokenKind::Dot,
            b',' => TokenKind::Comma,
            b':' => TokenKind::Colon,
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'{' => TokenKind::LBrace,
            b'}' => TokenKind::RBrace,
            b'[' => TokenKind::LBracket,
            b']' => TokenKind::RBracket,
            other => {
                return Err(LexError {
                    pos: start,
                    message: format!("unexpected character '{}'", other as char),
                })
            }
        };
        Ok(Token::new(kind, start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::tokenize(src)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn two_char_operators_win_over_one_char() {
        let k = kinds("a == b != c <= d >= e -> f");
        assert!(k.contains(&TokenKind::EqEq));
        assert!(k.contains(&TokenKind::NotEq));
        assert!(k.contains(&TokenKind::LtEq));
        assert!(k.contains(&TokenKind::GtEq));
        assert!(k.contains(&TokenKind::Arrow));
    }

    #[test]
    fn comments_run_to_newline() {
        let k = kinds("let x = 1 # trailing comment\nlet y = 2");
        assert_eq!(k.iter().filter(|t| **t == TokenKind::Newline).count(), 1);
    }

    #[test]
    fn string_escapes() {
        let toks = Lexer::tokenize("\"a\\nb\"").unwrap();
        assert_eq!(toks[0].kind, TokenKind::String("a\nb".to_string()));
    }

    #[test]
    fn unterminated_string_reports_position() {
        let err = Lexer::tokenize("\"abc").unwrap_err();
        assert_eq!(err.pos, Pos::new(1, 1));
    }

    #[test]
    fn number_kinds() {
        let toks = Lexer::tokenize("42 3.14").unwrap();
        assert_eq!(toks[0].kind, TokenKind::Integer(42));
        assert_eq!(toks[1].kind, TokenKind::Float(3.14));
    }

    #[test]
    fn keyword_reclassification() {
        let toks = Lexer::tokenize("speaker when otherwise").unwrap();
        assert_eq!(toks[0].kind, TokenKind::Keyword(Keyword::Speaker));
        assert_eq!(toks[1].kind, TokenKind::Keyword(Keyword::When));
        assert_eq!(toks[2].kind, TokenKind::Keyword(Keyword::Otherwise));
    }
}
