// src/parser.rs
use crate::errors::{Result, VerifyError};

/// Character cursor over one template action.
///
/// `base` is the byte offset of the action inside the whole template so that
/// syntax errors point at the right place in the source document.
pub struct Parser<'a> {
    s: &'a str,
    i: usize,
    base: usize,
}

impl<'a> Parser<'a> {
    pub fn with_base(s: &'a str, base: usize) -> Self {
        Self { s, i: 0, base }
    }

    pub fn offset(&self) -> usize {
        self.base + self.i
    }

    pub fn error(&self, message: impl Into<String>) -> VerifyError {
        VerifyError::syntax(self.offset(), message)
    }

    pub fn parse_identifier(&mut self) -> Result<String> {
        let start = self.i;
        while let Some(c) = self.peek_char() {
            if c == '_' || c.is_ascii_alphanumeric() {
                self.i += 1;
            } else {
                break;
            }
        }
        if self.i == start {
            return Err(self.error("identifier expected"));
        }
        Ok(self.s[start..self.i].to_string())
    }

    pub fn parse_int(&mut self) -> Result<i64> {
        let start = self.i;
        if self.peek_char() == Some('-') || self.peek_char() == Some('+') {
            self.i += 1;
        }
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                self.i += 1;
            } else {
                break;
            }
        }
        let digits = &self.s[start..self.i];
        if digits.is_empty() || digits == "-" || digits == "+" {
            return Err(self.error("expected integer"));
        }
        digits
            .parse::<i64>()
            .map_err(|e| VerifyError::syntax(self.base + start, format!("bad integer {digits:?}: {e}")))
    }

    pub fn parse_quoted_string(&mut self) -> Result<String> {
        let start = self.offset();
        let quote = self.peek_char().ok_or_else(|| self.error("string expected"))?;
        if quote == '`' {
            return self.parse_raw_string();
        }
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
        Err(VerifyError::syntax(start, "unterminated string"))
    }

    // Back-tick strings take their content verbatim, escapes included.
    fn parse_raw_string(&mut self) -> Result<String> {
        let start = self.offset();
        self.i += 1;
        let content_start = self.i;
        while let Some(c) = self.peek_char() {
            if c == '`' {
                let out = self.s[content_start..self.i].to_string();
                self.i += 1;
                return Ok(out);
            }
            self.i += c.len_utf8();
        }
        Err(VerifyError::syntax(start, "unterminated raw string"))
    }

    pub fn expect(&mut self, c: char) -> Result<()> {
        if self.consume_char(c) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{c}'")))
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

    /// Consume `word` only when it is not the prefix of a longer identifier.
    pub fn consume_keyword(&mut self, word: &str) -> bool {
        if !self.peek_str(word) {
            return false;
        }
        let next = self.s[self.i + word.len()..].chars().next();
        if next.is_some_and(|c| c == '_' || c.is_ascii_alphanumeric()) {
            return false;
        }
        self.i += word.len();
        true
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn quoted_strings_unescape() {
        let mut p = Parser::with_base(r#""a\"b\n" rest"#, 0);
        assert_eq!(p.parse_quoted_string().unwrap(), "a\"b\n");
        p.skip_ws();
        assert!(p.peek_str("rest"));
    }

    #[test]
    fn raw_strings_keep_backslashes() {
        let mut p = Parser::with_base(r"`^\d+$`", 0);
        assert_eq!(p.parse_quoted_string().unwrap(), r"^\d+$");
        assert!(p.eof());
    }

    #[test]
    fn errors_carry_absolute_offset() {
        let mut p = Parser::with_base("\"open", 10);
        let err = p.parse_quoted_string().unwrap_err();
        assert_eq!(
            err,
            VerifyError::Syntax {
                offset: 10,
                message: "unterminated string".into()
            }
        );
    }

    #[test]
    fn keywords_respect_identifier_boundaries() {
        let mut p = Parser::with_base("nilly", 0);
        assert!(!p.consume_keyword("nil"));
        let mut p = Parser::with_base("nil)", 0);
        assert!(p.consume_keyword("nil"));
        assert_eq!(p.peek_char(), Some(')'));
    }

    #[test]
    fn signed_integers() {
        assert_eq!(Parser::with_base("-42", 0).parse_int().unwrap(), -42);
        assert!(Parser::with_base("-", 0).parse_int().is_err());
    }
}
