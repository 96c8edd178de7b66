// src/parser.rs
use crate::errors::{EvalError, Result};
use serde_json::Value;

/// Character cursor shared by the expression and key-path parsers.
pub struct Parser<'a> {
    s: &'a str,
    i: usize,
}

impl<'a> Parser<'a> {
    pub fn new(s: &'a str) -> Self {
        Self { s, i: 0 }
    }

    pub fn parse_identifier(&mut self) -> Result<String> {
        let start = self.i;
        while let Some(c) = self.peek_char() {
            if is_ident_char(c) {
                self.i += c.len_utf8();
            } else {
                break;
            }
        }
        if self.i == start {
            return Err(self.error("identifier expected"));
        }
        Ok(self.s[start..self.i].to_string())
    }

    /// Unsigned decimal literal; the sign belongs to the unary operator.
    pub fn parse_number_literal(&mut self) -> Result<Value> {
        let start = self.i;
        self.skip_digits();
        if self.peek_char() == Some('.') && self.s[self.i + 1..].starts_with(|c: char| c.is_ascii_digit()) {
            self.i += 1;
            self.skip_digits();
        }
        let s = &self.s[start..self.i];
        if s.is_empty() {
            return Err(self.error("number expected"));
        }
        if s.contains('.') {
            let f: f64 = s.parse().map_err(|_| self.error("bad float"))?;
            Ok(Value::from(f))
        } else {
            match s.parse::<i64>() {
                Ok(i) => Ok(Value::from(i)),
                Err(_) => {
                    let f: f64 = s.parse().map_err(|_| self.error("bad int"))?;
                    Ok(Value::from(f))
                }
            }
        }
    }

    pub fn parse_quoted_string(&mut self) -> Result<String> {
        let quote = self.peek_char().ok_or_else(|| self.error("string expected"))?;
        if quote != '\'' && quote != '"' {
            return Err(self.error("expected quoted string"));
        }
        self.i += 1;
        let mut out = String::new();
        while let Some(c) = self.peek_char() {
            self.i += c.len_utf8();
            if c == quote {
                return Ok(out);
            }
            if c == '\\' {
                if let Some(nc) = self.peek_char() {
                    self.i += nc.len_utf8();
                    match nc {
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        'r' => out.push('\r'),
                        '\\' => out.push('\\'),
                        '"' => out.push('"'),
                        '\'' => out.push('\''),
                        _ => {
                            out.push('\\');
                            out.push(nc);
                        }
                    }
                } else {
                    break;
                }
            } else {
                out.push(c);
            }
        }
        Err(self.error("unterminated string"))
    }

    /// Consume everything up to (not including) the first char in `stops`.
    pub fn capture_until_any(&mut self, stops: &[char]) -> &'a str {
        let start = self.i;
        while let Some(c) = self.peek_char() {
            if stops.contains(&c) {
                break;
            }
            self.i += c.len_utf8();
        }
        &self.s[start..self.i]
    }

    pub fn expect(&mut self, c: char) -> Result<()> {
        if self.consume_char(c) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{c}'")))
        }
    }

    pub fn consume_char(&mut self, c: char) -> bool {
        if self.peek_char() == Some(c) {
            self.i += c.len_utf8();
            true
        } else {
            false
        }
    }

    pub fn consume_str(&mut self, lit: &str) -> bool {
        if self.peek_str(lit) {
            self.i += lit.len();
            true
        } else {
            false
        }
    }

    pub fn peek_char(&self) -> Option<char> {
        self.s[self.i..].chars().next()
    }

    pub fn peek_nth(&self, n: usize) -> Option<char> {
        self.s[self.i..].chars().nth(n)
    }

    pub fn peek_str(&self, lit: &str) -> bool {
        self.s[self.i..].starts_with(lit)
    }

    pub fn skip_ws(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() {
                self.i += c.len_utf8();
            } else {
                break;
            }
        }
    }

    pub fn eof(&self) -> bool {
        self.i >= self.s.len()
    }

    pub fn error(&self, msg: &str) -> EvalError {
        EvalError::Parse(format!("{msg} at offset {}", self.i))
    }

    fn skip_digits(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                self.i += 1;
            } else {
                break;
            }
        }
    }
}

pub fn is_ident_start(c: char) -> bool {
    c == '_' || c == '$' || c.is_alphabetic()
}

pub fn is_ident_char(c: char) -> bool {
    is_ident_start(c) || c.is_ascii_digit()
}
