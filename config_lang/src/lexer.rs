use crate::tokens::{Loc, Token, TokenKind};
use std::iter::Peekable;
use std::str::Chars;

/// Tokenizes the brace/semicolon config grammar (see crate docs). Whitespace
/// is insignificant; `#` starts a line comment.
pub struct Lexer<'a> {
    input: Peekable<Chars<'a>>,
    line: usize,
    col: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input: input.chars().peekable(),
            line: 1,
            col: 1,
        }
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.input.next();
        if let Some(c) = c {
            if c == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
        }
        c
    }

    fn peek(&mut self) -> Option<&char> {
        self.input.peek()
    }

    fn current_loc(&self) -> Loc {
        Loc {
            line: self.line,
            col: self.col,
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>, String> {
        let mut tokens = Vec::new();

        while let Some(&c) = self.peek() {
            match c {
                '#' => self.skip_comment(),
                w if w.is_whitespace() => {
                    self.advance();
                }
                '{' => {
                    let loc = self.current_loc();
                    self.advance();
                    tokens.push(Token {
                        kind: TokenKind::LBrace,
                        loc,
                    });
                }
                '}' => {
                    let loc = self.current_loc();
                    self.advance();
                    tokens.push(Token {
                        kind: TokenKind::RBrace,
                        loc,
                    });
                }
                ';' => {
                    let loc = self.current_loc();
                    self.advance();
                    tokens.push(Token {
                        kind: TokenKind::Semicolon,
                        loc,
                    });
                }
                q if q == '"' || q == '\'' => {
                    let tok = self.read_quoted(q)?;
                    tokens.push(tok);
                }
                _ => {
                    let tok = self.read_word()?;
                    tokens.push(tok);
                }
            }
        }

        Ok(tokens)
    }

    fn skip_comment(&mut self) {
        while let Some(&c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.advance();
        }
    }

    fn read_quoted(&mut self, quote: char) -> Result<Token, String> {
        let loc = self.current_loc();
        self.advance(); // opening quote
        let mut val = String::new();
        loop {
            match self.advance() {
                Some(c) if c == quote => break,
                Some(c) => val.push(c),
                None => return Err(format!("unterminated string starting at {loc}")),
            }
        }
        Ok(Token {
            kind: TokenKind::StringLit(val),
            loc,
        })
    }

    fn read_word(&mut self) -> Result<Token, String> {
        let loc = self.current_loc();
        let mut val = String::new();
        while let Some(&c) = self.peek() {
            if c.is_whitespace() || c == '{' || c == '}' || c == ';' || c == '#' {
                break;
            }
            val.push(c);
            self.advance();
        }
        if val.is_empty() {
            let c = *self.peek().unwrap();
            return Err(format!("unexpected character '{c}' at {loc}"));
        }
        Ok(Token {
            kind: TokenKind::Word(val),
            loc,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_a_minimal_server_block() {
        let src = "server {\n  listen 8080;\n}\n";
        let tokens = Lexer::new(src).tokenize().unwrap();
        assert_eq!(tokens.len(), 6);
        assert!(matches!(tokens[0].kind, TokenKind::Word(ref w) if w == "server"));
        assert!(matches!(tokens[1].kind, TokenKind::LBrace));
        assert!(matches!(tokens[5].kind, TokenKind::RBrace));
    }

    #[test]
    fn skips_comments() {
        let src = "# a comment\nserver { } # trailing\n";
        let tokens = Lexer::new(src).tokenize().unwrap();
        assert_eq!(tokens.len(), 3);
    }

    #[test]
    fn reads_quoted_strings_with_spaces() {
        let src = "return \"/new path\";";
        let tokens = Lexer::new(src).tokenize().unwrap();
        assert!(matches!(tokens[1].kind, TokenKind::StringLit(ref s) if s == "/new path"));
    }
}
