//! Filter tokenizer
//!
//! Splits filter text into tokens with byte offsets. Keywords are not
//! distinguished here; the parser matches identifiers case-insensitively.

use std::iter::Peekable;
use std::str::CharIndices;

use super::errors::{FilterError, FilterResult};

/// Filter tokens
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Bare word: column name or keyword
    Ident(String),
    /// `"double quoted"` column name, never a keyword
    QuotedIdent(String),
    /// `'single quoted'` string literal
    Str(String),
    Integer(i64),
    Float(f64),
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    LParen,
    RParen,
    Comma,
}

impl Token {
    /// Short description for error details
    pub fn describe(&self) -> String {
        match self {
            Token::Ident(s) => format!("'{}'", s),
            Token::QuotedIdent(s) => format!("\"{}\"", s),
            Token::Str(_) => "string literal".to_string(),
            Token::Integer(i) => i.to_string(),
            Token::Float(f) => f.to_string(),
            Token::Eq => "'='".to_string(),
            Token::NotEq => "'<>'".to_string(),
            Token::Lt => "'<'".to_string(),
            Token::LtEq => "'<='".to_string(),
            Token::Gt => "'>'".to_string(),
            Token::GtEq => "'>='".to_string(),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::Comma => "','".to_string(),
        }
    }
}

/// A token and the byte offset it starts at
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

/// Tokenize filter text
pub fn tokenize(input: &str) -> FilterResult<Vec<Spanned>> {
    let mut lexer = Lexer {
        input,
        chars: input.char_indices().peekable(),
    };

    let mut tokens = Vec::new();
    while let Some(spanned) = lexer.next_token()? {
        tokens.push(spanned);
    }
    Ok(tokens)
}

struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    fn next_token(&mut self) -> FilterResult<Option<Spanned>> {
        while matches!(self.chars.peek(), Some((_, c)) if c.is_whitespace()) {
            self.chars.next();
        }

        let (offset, c) = match self.chars.next() {
            Some(pair) => pair,
            None => return Ok(None),
        };

        let token = match c {
            '(' => Token::LParen,
            ')' => Token::RParen,
            ',' => Token::Comma,
            '=' => Token::Eq,
            '<' => match self.peek_char() {
                Some('=') => {
                    self.chars.next();
                    Token::LtEq
                }
                Some('>') => {
                    self.chars.next();
                    Token::NotEq
                }
                _ => Token::Lt,
            },
            '>' => {
                if self.peek_char() == Some('=') {
                    self.chars.next();
                    Token::GtEq
                } else {
                    Token::Gt
                }
            }
            '!' => {
                if self.peek_char() == Some('=') {
                    self.chars.next();
                    Token::NotEq
                } else {
                    return Err(FilterError::syntax(offset, "unexpected '!'"));
                }
            }
            '\'' => Token::Str(self.quoted(offset, '\'')?),
            '"' => {
                let ident = self.quoted(offset, '"')?;
                if ident.is_empty() {
                    return Err(FilterError::syntax(offset, "empty quoted identifier"));
                }
                Token::QuotedIdent(ident)
            }
            c if c.is_ascii_digit() => self.number(offset)?,
            '-' | '+' | '.' if self.peek_char().is_some_and(|n| n.is_ascii_digit()) => {
                self.number(offset)?
            }
            c if c.is_alphabetic() || c == '_' => {
                let end = self.consume_while(|c| c.is_alphanumeric() || c == '_');
                Token::Ident(self.input[offset..end].to_string())
            }
            other => {
                return Err(FilterError::syntax(
                    offset,
                    format!("unexpected character '{}'", other),
                ))
            }
        };

        Ok(Some(Spanned { token, offset }))
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    /// Consume while `pred` holds; returns the end byte offset
    fn consume_while(&mut self, pred: impl Fn(char) -> bool) -> usize {
        while let Some(&(i, c)) = self.chars.peek() {
            if !pred(c) {
                return i;
            }
            self.chars.next();
        }
        self.input.len()
    }

    /// Read a quoted run; a doubled quote escapes itself
    fn quoted(&mut self, start: usize, quote: char) -> FilterResult<String> {
        let mut out = String::new();
        loop {
            match self.chars.next() {
                Some((_, c)) if c == quote => {
                    if self.peek_char() == Some(quote) {
                        self.chars.next();
                        out.push(quote);
                    } else {
                        return Ok(out);
                    }
                }
                Some((_, c)) => out.push(c),
                None => return Err(FilterError::syntax(start, "unterminated quoted literal")),
            }
        }
    }

    /// Numeric literal; the first character has already been consumed
    fn number(&mut self, start: usize) -> FilterResult<Token> {
        let mut end = self.consume_while(|c| c.is_ascii_digit() || c == '.');

        if matches!(self.peek_char(), Some('e') | Some('E')) {
            self.chars.next();
            if matches!(self.peek_char(), Some('+') | Some('-')) {
                self.chars.next();
            }
            end = self.consume_while(|c| c.is_ascii_digit());
        }

        if self.peek_char().is_some_and(|c| c.is_alphabetic() || c == '_') {
            return Err(FilterError::syntax(start, "malformed numeric literal"));
        }

        let text = &self.input[start..end];
        let is_float = text.contains(['.', 'e', 'E']);

        if !is_float {
            if let Ok(i) = text.parse::<i64>() {
                return Ok(Token::Integer(i));
            }
        }

        match text.parse::<f64>() {
            Ok(f) if f.is_finite() => Ok(Token::Float(f)),
            _ => Err(FilterError::syntax(
                start,
                format!("malformed numeric literal '{}'", text),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        tokenize(input).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn test_comparison_tokens() {
        assert_eq!(
            tokens("state_name='New York'"),
            vec![
                Token::Ident("state_name".into()),
                Token::Eq,
                Token::Str("New York".into()),
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            tokens("< <= > >= <> != ="),
            vec![
                Token::Lt,
                Token::LtEq,
                Token::Gt,
                Token::GtEq,
                Token::NotEq,
                Token::NotEq,
                Token::Eq,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            tokens("42 -7 3.5 .5 1e3"),
            vec![
                Token::Integer(42),
                Token::Integer(-7),
                Token::Float(3.5),
                Token::Float(0.5),
                Token::Float(1000.0),
            ]
        );
    }

    #[test]
    fn test_escaped_quotes() {
        assert_eq!(tokens("'O''Brien'"), vec![Token::Str("O'Brien".into())]);
        assert_eq!(
            tokens("\"my \"\"col\"\"\""),
            vec![Token::QuotedIdent("my \"col\"".into())]
        );
    }

    #[test]
    fn test_offsets() {
        let spanned = tokenize("a = 1").unwrap();
        let offsets: Vec<usize> = spanned.iter().map(|s| s.offset).collect();
        assert_eq!(offsets, vec![0, 2, 4]);
    }

    #[test]
    fn test_lexer_errors() {
        assert!(tokenize("name = 'open").is_err());
        assert!(tokenize("a ! b").is_err());
        assert!(tokenize("a ; b").is_err());
        assert!(tokenize("12abc").is_err());
        assert!(tokenize("1.2.3").is_err());
    }
}
