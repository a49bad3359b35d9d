//! Python literal reader and writer.
//!
//! The hub prints results with `print(...)` and stores the slot table with
//! `str(dict)`, so everything that comes back is a Python literal. Literals
//! are read into [`serde_json::Value`] and then deserialized into typed
//! structs; dictionary keys become strings.

use serde_json::{Map, Number, Value};

use crate::error::DeviceError;

/// Parses a single Python literal (surrounding whitespace allowed).
pub fn parse(input: &str) -> Result<Value, DeviceError> {
    let mut reader = Reader {
        chars: input.chars().collect(),
        pos: 0,
    };
    let value = reader.value()?;
    reader.skip_ws();
    if reader.pos != reader.chars.len() {
        return Err(reader.error("trailing characters"));
    }
    Ok(value)
}

/// Quotes `s` as a single-quoted Python string literal.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Renders a value as a Python literal.
pub fn to_literal(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote(s),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(to_literal).collect();
            format!("[{}]", parts.join(", "))
        }
        Value::Object(map) => {
            let parts: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", quote(k), to_literal(v)))
                .collect();
            format!("{{{}}}", parts.join(", "))
        }
    }
}

struct Reader {
    chars: Vec<char>,
    pos: usize,
}

impl Reader {
    fn error(&self, what: &str) -> DeviceError {
        DeviceError::Protocol(format!("malformed literal ({what} at offset {})", self.pos))
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_ws();
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn value(&mut self) -> Result<Value, DeviceError> {
        self.skip_ws();
        match self.peek() {
            Some('{') => self.dict(),
            Some('[') => self.sequence(']'),
            Some('(') => self.sequence(')'),
            Some('\'') | Some('"') => self.string().map(Value::String),
            Some('b') if matches!(self.chars.get(self.pos + 1), Some(&'\'') | Some(&'"')) => {
                self.pos += 1;
                self.string().map(Value::String)
            }
            Some(c) if c == '-' || c == '+' || c.is_ascii_digit() => self.number(),
            Some(c) if c.is_ascii_alphabetic() => self.keyword(),
            Some(_) => Err(self.error("unexpected character")),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn dict(&mut self) -> Result<Value, DeviceError> {
        self.pos += 1;
        let mut map = Map::new();
        loop {
            if self.eat('}') {
                return Ok(Value::Object(map));
            }
            let key = match self.value()? {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => (if b { "True" } else { "False" }).to_string(),
                _ => return Err(self.error("unsupported dictionary key")),
            };
            if !self.eat(':') {
                return Err(self.error("expected ':'"));
            }
            let value = self.value()?;
            map.insert(key, value);
            if !self.eat(',') {
                if self.eat('}') {
                    return Ok(Value::Object(map));
                }
                return Err(self.error("expected ',' or '}'"));
            }
        }
    }

    fn sequence(&mut self, close: char) -> Result<Value, DeviceError> {
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            if self.eat(close) {
                return Ok(Value::Array(items));
            }
            items.push(self.value()?);
            if !self.eat(',') {
                if self.eat(close) {
                    return Ok(Value::Array(items));
                }
                return Err(self.error("expected separator"));
            }
        }
    }

    fn string(&mut self) -> Result<String, DeviceError> {
        let quote = self.bump().ok_or_else(|| self.error("expected quote"))?;
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => {
                    let escaped = self.bump().ok_or_else(|| self.error("dangling escape"))?;
                    match escaped {
                        'n' => out.push('\n'),
                        'r' => out.push('\r'),
                        't' => out.push('\t'),
                        '0' => out.push('\0'),
                        'x' => out.push(self.hex_char(2)?),
                        'u' => out.push(self.hex_char(4)?),
                        other => out.push(other),
                    }
                }
                Some(c) => out.push(c),
            }
        }
    }

    fn hex_char(&mut self, digits: usize) -> Result<char, DeviceError> {
        let end = self.pos + digits;
        if end > self.chars.len() {
            return Err(self.error("short escape"));
        }
        let text: String = self.chars[self.pos..end].iter().collect();
        self.pos = end;
        u32::from_str_radix(&text, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| self.error("bad escape"))
    }

    fn number(&mut self) -> Result<Value, DeviceError> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E'))
        {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        if let Ok(int) = text.parse::<i64>() {
            return Ok(Value::Number(int.into()));
        }
        text.parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| self.error("bad number"))
    }

    fn keyword(&mut self) -> Result<Value, DeviceError> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        match word.as_str() {
            "True" => Ok(Value::Bool(true)),
            "False" => Ok(Value::Bool(false)),
            "None" => Ok(Value::Null),
            _ => Err(self.error("unknown identifier")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_stat_tuple() {
        let value = parse("(32768, 0, 0, 0, 0, 0, 120, 0, 1600000000, 1600000000)\r\n").unwrap();
        assert_eq!(value, json!([32768, 0, 0, 0, 0, 0, 120, 0, 1600000000, 1600000000]));
    }

    #[test]
    fn parses_nested_lists_with_strings() {
        let value = parse("[['/a b', 16384], [\"it's\", -1]]").unwrap();
        assert_eq!(value, json!([["/a b", 16384], ["it's", -1]]));
    }

    #[test]
    fn parses_slot_dictionary_with_int_keys() {
        let value = parse(
            "{0: {'name': 'bWFpbi5weQ==', 'id': 10000, 'type': 'python', 'ok': True, 'x': None}}",
        )
        .unwrap();
        assert_eq!(value["0"]["id"], json!(10000));
        assert_eq!(value["0"]["ok"], json!(true));
        assert_eq!(value["0"]["x"], Value::Null);
    }

    #[test]
    fn parses_escapes_and_single_tuples() {
        assert_eq!(parse(r"'a\'b\n\x41'").unwrap(), json!("a'b\nA"));
        assert_eq!(parse("(1,)").unwrap(), json!([1]));
        assert_eq!(parse("{}").unwrap(), json!({}));
        assert_eq!(parse("1.5").unwrap(), json!(1.5));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse("").is_err());
        assert!(parse("[1, 2").is_err());
        assert!(parse("'open").is_err());
        assert!(parse("os.stat").is_err());
        assert!(parse("1 2").is_err());
    }

    #[test]
    fn writes_literals_python_can_read() {
        let value = json!({"name": "it's", "n": [1, true, null]});
        let literal = to_literal(&value);
        assert_eq!(literal, "{'n': [1, True, None], 'name': 'it\\'s'}");
        assert_eq!(parse(&literal).unwrap(), value);
    }
}
