//! In-memory token streams.

use super::ReplayError;
use crate::ir::TokenKind;
use serde_json::{Map, Number, Value as Json};

/// One token of the streaming format.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    BeginObject,
    EndObject,
    BeginArray,
    EndArray,
    Name(String),
    Str(String),
    Number(Number),
    Bool(bool),
    Null,
}

impl Token {
    pub fn kind(&self) -> TokenKind {
        match self {
            Token::BeginObject => TokenKind::BeginObject,
            Token::EndObject => TokenKind::EndObject,
            Token::BeginArray => TokenKind::BeginArray,
            Token::EndArray => TokenKind::EndArray,
            Token::Name(_) => TokenKind::Name,
            Token::Str(_) => TokenKind::String,
            Token::Number(_) => TokenKind::Number,
            Token::Bool(_) => TokenKind::Boolean,
            Token::Null => TokenKind::Null,
        }
    }
}

/// Collects tokens written by a codec.
#[derive(Debug, Clone, Default)]
pub struct TokenWriter {
    tokens: Vec<Token>,
}

impl TokenWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_object(&mut self) {
        self.tokens.push(Token::BeginObject);
    }

    pub fn end_object(&mut self) {
        self.tokens.push(Token::EndObject);
    }

    pub fn begin_array(&mut self) {
        self.tokens.push(Token::BeginArray);
    }

    pub fn end_array(&mut self) {
        self.tokens.push(Token::EndArray);
    }

    pub fn name(&mut self, name: &str) {
        self.tokens.push(Token::Name(name.to_string()));
    }

    pub fn string(&mut self, value: &str) {
        self.tokens.push(Token::Str(value.to_string()));
    }

    pub fn number(&mut self, value: Number) {
        self.tokens.push(Token::Number(value));
    }

    pub fn bool(&mut self, value: bool) {
        self.tokens.push(Token::Bool(value));
    }

    pub fn null(&mut self) {
        self.tokens.push(Token::Null);
    }

    /// Write a whole JSON tree.
    pub fn tree(&mut self, value: &Json) {
        flatten(value, &mut self.tokens);
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn into_tokens(self) -> Vec<Token> {
        self.tokens
    }

    /// Compact JSON text for the written tokens.
    pub fn to_json(&self) -> String {
        let mut out = String::new();
        // Per open container: has an element been written yet?
        let mut started = vec![false];
        let mut after_name = false;
        for token in &self.tokens {
            let closes = matches!(token, Token::EndObject | Token::EndArray);
            if !closes && !after_name {
                if let Some(started) = started.last_mut() {
                    if *started {
                        out.push(',');
                    }
                    *started = true;
                }
            }
            after_name = false;
            match token {
                Token::BeginObject => {
                    out.push('{');
                    started.push(false);
                }
                Token::BeginArray => {
                    out.push('[');
                    started.push(false);
                }
                Token::EndObject => {
                    out.push('}');
                    started.pop();
                }
                Token::EndArray => {
                    out.push(']');
                    started.pop();
                }
                Token::Name(name) => {
                    out.push_str(&Json::String(name.clone()).to_string());
                    out.push(':');
                    after_name = true;
                }
                Token::Str(s) => out.push_str(&Json::String(s.clone()).to_string()),
                Token::Number(n) => out.push_str(&n.to_string()),
                Token::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
                Token::Null => out.push_str("null"),
            }
        }
        out
    }
}

fn flatten(value: &Json, out: &mut Vec<Token>) {
    match value {
        Json::Null => out.push(Token::Null),
        Json::Bool(b) => out.push(Token::Bool(*b)),
        Json::Number(n) => out.push(Token::Number(n.clone())),
        Json::String(s) => out.push(Token::Str(s.clone())),
        Json::Array(items) => {
            out.push(Token::BeginArray);
            for item in items {
                flatten(item, out);
            }
            out.push(Token::EndArray);
        }
        Json::Object(members) => {
            out.push(Token::BeginObject);
            for (name, member) in members {
                out.push(Token::Name(name.clone()));
                flatten(member, out);
            }
            out.push(Token::EndObject);
        }
    }
}

/// Pull reader over a token sequence.
#[derive(Debug, Clone)]
pub struct TokenReader {
    tokens: Vec<Token>,
    pos: usize,
}

impl TokenReader {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    /// Tokenize JSON text; member order is preserved.
    pub fn from_json(text: &str) -> Result<Self, ReplayError> {
        let value: Json = serde_json::from_str(text)?;
        let mut tokens = Vec::new();
        flatten(&value, &mut tokens);
        Ok(Self::new(tokens))
    }

    pub fn peek(&self) -> TokenKind {
        self.tokens
            .get(self.pos)
            .map(Token::kind)
            .unwrap_or(TokenKind::End)
    }

    /// Whether the current object or array has more elements.
    pub fn has_next(&self) -> bool {
        !matches!(
            self.peek(),
            TokenKind::EndObject | TokenKind::EndArray | TokenKind::End
        )
    }

    pub fn is_done(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn next(&mut self) -> Result<Token, ReplayError> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or(ReplayError::Eof)?;
        self.pos += 1;
        Ok(token)
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, ReplayError> {
        let found = self.peek();
        if found != kind {
            return Err(ReplayError::UnexpectedToken {
                expected: kind.as_str().to_string(),
                found: found.as_str().to_string(),
            });
        }
        self.next()
    }

    fn unexpected(&self, expected: &str) -> ReplayError {
        ReplayError::UnexpectedToken {
            expected: expected.to_string(),
            found: self.peek().as_str().to_string(),
        }
    }

    pub fn begin_object(&mut self) -> Result<(), ReplayError> {
        self.expect(TokenKind::BeginObject).map(drop)
    }

    pub fn end_object(&mut self) -> Result<(), ReplayError> {
        self.expect(TokenKind::EndObject).map(drop)
    }

    pub fn begin_array(&mut self) -> Result<(), ReplayError> {
        self.expect(TokenKind::BeginArray).map(drop)
    }

    pub fn end_array(&mut self) -> Result<(), ReplayError> {
        self.expect(TokenKind::EndArray).map(drop)
    }

    pub fn next_null(&mut self) -> Result<(), ReplayError> {
        self.expect(TokenKind::Null).map(drop)
    }

    pub fn next_name(&mut self) -> Result<String, ReplayError> {
        match self.expect(TokenKind::Name)? {
            Token::Name(name) => Ok(name),
            _ => Err(self.unexpected("Name")),
        }
    }

    /// A string; numbers are accepted in their textual form.
    pub fn next_string(&mut self) -> Result<String, ReplayError> {
        match self.peek() {
            TokenKind::String | TokenKind::Number => match self.next()? {
                Token::Str(s) => Ok(s),
                Token::Number(n) => Ok(n.to_string()),
                _ => Err(self.unexpected("String")),
            },
            _ => Err(self.unexpected("String")),
        }
    }

    /// A number; numeric strings are accepted.
    pub fn next_number(&mut self) -> Result<Number, ReplayError> {
        match self.peek() {
            TokenKind::Number | TokenKind::String => match self.next()? {
                Token::Number(n) => Ok(n),
                Token::Str(s) => s.trim().parse::<Number>().map_err(|_| {
                    ReplayError::UnexpectedToken {
                        expected: "Number".into(),
                        found: format!("String({:?})", s),
                    }
                }),
                _ => Err(self.unexpected("Number")),
            },
            _ => Err(self.unexpected("Number")),
        }
    }

    pub fn next_bool(&mut self) -> Result<bool, ReplayError> {
        match self.expect(TokenKind::Boolean)? {
            Token::Bool(b) => Ok(b),
            _ => Err(self.unexpected("Boolean")),
        }
    }

    /// Skip the next value, including nested objects and arrays.
    pub fn skip_value(&mut self) -> Result<(), ReplayError> {
        match self.next()? {
            Token::Name(_) => self.skip_value(),
            Token::BeginObject | Token::BeginArray => {
                let mut depth = 1usize;
                while depth > 0 {
                    match self.next()? {
                        Token::BeginObject | Token::BeginArray => depth += 1,
                        Token::EndObject | Token::EndArray => depth -= 1,
                        _ => {}
                    }
                }
                Ok(())
            }
            Token::EndObject | Token::EndArray => {
                self.pos -= 1;
                Err(self.unexpected("a value"))
            }
            _ => Ok(()),
        }
    }

    /// Read the next value as a JSON tree.
    pub fn next_tree(&mut self) -> Result<Json, ReplayError> {
        match self.next()? {
            Token::Null => Ok(Json::Null),
            Token::Bool(b) => Ok(Json::Bool(b)),
            Token::Number(n) => Ok(Json::Number(n)),
            Token::Str(s) => Ok(Json::String(s)),
            Token::BeginArray => {
                let mut items = Vec::new();
                while self.has_next() {
                    items.push(self.next_tree()?);
                }
                self.end_array()?;
                Ok(Json::Array(items))
            }
            Token::BeginObject => {
                let mut members = Map::new();
                while self.has_next() {
                    let name = self.next_name()?;
                    members.insert(name, self.next_tree()?);
                }
                self.end_object()?;
                Ok(Json::Object(members))
            }
            Token::Name(_) | Token::EndObject | Token::EndArray => {
                self.pos -= 1;
                Err(self.unexpected("a value"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact_json_rendering() {
        let mut w = TokenWriter::new();
        w.begin_object();
        w.name("name");
        w.string("te\"st");
        w.name("tags");
        w.begin_array();
        w.number(1.into());
        w.null();
        w.begin_object();
        w.end_object();
        w.end_array();
        w.name("ok");
        w.bool(true);
        w.end_object();
        assert_eq!(w.to_json(), r#"{"name":"te\"st","tags":[1,null,{}],"ok":true}"#);
    }

    #[test]
    fn test_reader_preserves_member_order() {
        let mut r = TokenReader::from_json(r#"{"b": 1, "a": [true, {"x": null}]}"#).unwrap();
        r.begin_object().unwrap();
        assert_eq!(r.next_name().unwrap(), "b");
        r.skip_value().unwrap();
        assert_eq!(r.next_name().unwrap(), "a");
        r.skip_value().unwrap();
        assert!(!r.has_next());
        r.end_object().unwrap();
        assert!(r.is_done());
    }

    #[test]
    fn test_lenient_scalars() {
        let mut r = TokenReader::from_json(r#"["42", 7]"#).unwrap();
        r.begin_array().unwrap();
        assert_eq!(r.next_number().unwrap().as_i64(), Some(42));
        assert_eq!(r.next_string().unwrap(), "7");
        r.end_array().unwrap();
    }

    #[test]
    fn test_unexpected_token() {
        let mut r = TokenReader::from_json("[1]").unwrap();
        let err = r.begin_object().unwrap_err();
        assert_eq!(err.to_string(), "expected BeginObject, found BeginArray");
    }
}
