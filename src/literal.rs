//! Literal decoder for metadata, hints and serialized parameter values
//!
//! Accepts a closed grammar: `None`, `True`, `False`, integers, floats
//! (including `inf`/`nan`), single or double quoted strings, and lists or
//! tuples of these. Nothing is ever evaluated.

use crate::value::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LiteralError {
    #[error("unexpected end of literal")]
    UnexpectedEnd,
    #[error("unexpected character '{ch}' at {pos}")]
    UnexpectedChar { ch: char, pos: usize },
    #[error("trailing input at {0}")]
    TrailingInput(usize),
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
}

/// Parse a complete literal
pub fn parse(text: &str) -> Result<Value, LiteralError> {
    let mut parser = Parser {
        chars: text.chars().collect(),
        pos: 0,
    };
    parser.skip_ws();
    let value = parser.value()?;
    parser.skip_ws();
    if parser.pos < parser.chars.len() {
        return Err(LiteralError::TrailingInput(parser.pos));
    }
    Ok(value)
}

/// Parse a literal, falling back to the raw text when it is not one
pub fn interpret(text: &str) -> Value {
    parse(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_ws(&mut self) {
        while self.peek().map_or(false, char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn unexpected(&self) -> LiteralError {
        match self.peek() {
            Some(ch) => LiteralError::UnexpectedChar { ch, pos: self.pos },
            None => LiteralError::UnexpectedEnd,
        }
    }

    fn value(&mut self) -> Result<Value, LiteralError> {
        match self.peek() {
            None => Err(LiteralError::UnexpectedEnd),
            Some('[') => self.sequence(']'),
            Some('(') => self.sequence(')'),
            Some(q @ ('\'' | '"')) => self.string(q),
            Some(c) if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => self.number(),
            Some(c) if c.is_alphabetic() => self.word(),
            Some(_) => Err(self.unexpected()),
        }
    }

    fn word(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        while self.peek().map_or(false, |c| c.is_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        match word.as_str() {
            "None" => Ok(Value::None),
            "True" => Ok(Value::Bool(true)),
            "False" => Ok(Value::Bool(false)),
            "inf" => Ok(Value::Float(f64::INFINITY)),
            "nan" => Ok(Value::Float(f64::NAN)),
            _ => Err(LiteralError::UnexpectedChar {
                ch: self.chars[start],
                pos: start,
            }),
        }
    }

    fn number(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        if matches!(self.peek(), Some('-' | '+')) {
            self.pos += 1;
        }
        if self.peek().map_or(false, char::is_alphabetic) {
            let negative = self.chars[start] == '-';
            return match self.word()? {
                Value::Float(f) if negative => Ok(Value::Float(-f)),
                Value::Float(f) => Ok(Value::Float(f)),
                _ => Err(LiteralError::InvalidNumber(
                    self.chars[start..self.pos].iter().collect(),
                )),
            };
        }
        let mut is_float = false;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' | '_' => {}
                '.' => is_float = true,
                'e' | 'E' => {
                    is_float = true;
                    if matches!(self.chars.get(self.pos + 1), Some('-' | '+')) {
                        self.pos += 1;
                    }
                }
                _ => break,
            }
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos]
            .iter()
            .filter(|c| **c != '_')
            .collect();
        if is_float {
            text.parse::<f64>()
                .map(Value::Float)
                .map_err(|_| LiteralError::InvalidNumber(text))
        } else {
            text.parse::<i64>()
                .map(Value::Int)
                .map_err(|_| LiteralError::InvalidNumber(text))
        }
    }

    fn string(&mut self, quote: char) -> Result<Value, LiteralError> {
        self.pos += 1;
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(LiteralError::UnexpectedEnd),
                Some(c) if c == quote => return Ok(Value::String(out)),
                Some('\\') => match self.bump() {
                    None => return Err(LiteralError::UnexpectedEnd),
                    Some('n') => out.push('\n'),
                    Some('r') => out.push('\r'),
                    Some('t') => out.push('\t'),
                    Some('0') => out.push('\0'),
                    Some('\\') => out.push('\\'),
                    Some('\'') => out.push('\''),
                    Some('"') => out.push('"'),
                    Some('x') => out.push(self.hex_escape(2)?),
                    Some('u') => out.push(self.hex_escape(4)?),
                    Some(other) => {
                        out.push('\\');
                        out.push(other);
                    }
                },
                Some(c) => out.push(c),
            }
        }
    }

    fn hex_escape(&mut self, digits: usize) -> Result<char, LiteralError> {
        let start = self.pos;
        let end = start + digits;
        if end > self.chars.len() {
            return Err(LiteralError::UnexpectedEnd);
        }
        let hex: String = self.chars[start..end].iter().collect();
        self.pos = end;
        u32::from_str_radix(&hex, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or(LiteralError::InvalidNumber(hex))
    }

    fn sequence(&mut self, close: char) -> Result<Value, LiteralError> {
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                self.pos += 1;
                return Ok(Value::List(items));
            }
            items.push(self.value()?);
            self.skip_ws();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some(c) if c == close => {}
                _ => return Err(self.unexpected()),
            }
        }
    }
}
