//! Type expressions, concrete types and their canonical keys.
//!
//! A [`TypeRef`] is what a declaration writes down (`Map<String, T>`, `Item[]`).
//! Once every variable has been substituted it becomes a [`ConcreteType`], whose
//! canonical text is the [`TypeKey`] used for codec caching and registry lookup.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error produced when a type expression cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid type expression `{input}`: {reason}")]
pub struct TypeParseError {
    pub input: String,
    pub reason: String,
}

/// A possibly generic type expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TypeRef {
    /// A type variable bound by the enclosing declaration.
    Var(String),
    /// A named type, optionally parameterized.
    Named { name: String, args: Vec<TypeRef> },
    /// An array of the element type.
    Array(Box<TypeRef>),
}

impl TypeRef {
    /// A named type without arguments.
    pub fn named(name: impl Into<String>) -> Self {
        TypeRef::Named {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// A parameterized named type.
    pub fn generic(name: impl Into<String>, args: Vec<TypeRef>) -> Self {
        TypeRef::Named {
            name: name.into(),
            args,
        }
    }

    /// Parse a type expression such as `Map<String, List<T>>` or `int[]`.
    ///
    /// Every name parses as [`TypeRef::Named`]; use [`TypeRef::bind_params`] to turn
    /// the names of a declaration's type parameters into variables.
    pub fn parse(input: &str) -> Result<Self, TypeParseError> {
        let mut parser = Parser {
            input,
            chars: input.char_indices().peekable(),
        };
        let ty = parser.parse_type()?;
        parser.skip_ws();
        if let Some(&(_, c)) = parser.chars.peek() {
            return Err(parser.error(format!("unexpected `{}`", c)));
        }
        Ok(ty)
    }

    /// Replace argument-less names that match `params` with type variables.
    pub fn bind_params(self, params: &[String]) -> Self {
        match self {
            TypeRef::Named { name, args } if args.is_empty() && params.contains(&name) => {
                TypeRef::Var(name)
            }
            TypeRef::Named { name, args } => TypeRef::Named {
                name,
                args: args.into_iter().map(|a| a.bind_params(params)).collect(),
            },
            TypeRef::Array(elem) => TypeRef::Array(Box::new(elem.bind_params(params))),
            var @ TypeRef::Var(_) => var,
        }
    }

    /// Substitute the formal `params` of a declaration with `args`.
    ///
    /// Concrete types come back unchanged, parameterized types are substituted
    /// argument by argument, and a bare variable is replaced by the argument at
    /// its position in `params`. Variables without a matching argument stay put.
    pub fn substitute(&self, params: &[String], args: &[TypeRef]) -> TypeRef {
        match self {
            TypeRef::Var(var) => params
                .iter()
                .position(|p| p == var)
                .and_then(|i| args.get(i))
                .cloned()
                .unwrap_or_else(|| self.clone()),
            TypeRef::Named { name, args: own } if !own.is_empty() => TypeRef::Named {
                name: name.clone(),
                args: own.iter().map(|a| a.substitute(params, args)).collect(),
            },
            TypeRef::Named { .. } => self.clone(),
            TypeRef::Array(elem) => TypeRef::Array(Box::new(elem.substitute(params, args))),
        }
    }

    /// The first type variable found, depth first.
    pub fn first_var(&self) -> Option<&str> {
        match self {
            TypeRef::Var(var) => Some(var),
            TypeRef::Named { args, .. } => args.iter().find_map(|a| a.first_var()),
            TypeRef::Array(elem) => elem.first_var(),
        }
    }

    /// Name of a named type, `None` for variables and arrays.
    pub fn base_name(&self) -> Option<&str> {
        match self {
            TypeRef::Named { name, .. } => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Var(var) => f.write_str(var),
            TypeRef::Named { name, args } => {
                f.write_str(name)?;
                if !args.is_empty() {
                    f.write_str("<")?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{}", arg)?;
                    }
                    f.write_str(">")?;
                }
                Ok(())
            }
            TypeRef::Array(elem) => write!(f, "{}[]", elem),
        }
    }
}

impl TryFrom<String> for TypeRef {
    type Error = TypeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TypeRef::parse(&value)
    }
}

impl From<TypeRef> for String {
    fn from(value: TypeRef) -> Self {
        value.to_string()
    }
}

struct Parser<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl Parser<'_> {
    fn error(&self, reason: impl Into<String>) -> TypeParseError {
        TypeParseError {
            input: self.input.to_string(),
            reason: reason.into(),
        }
    }

    fn skip_ws(&mut self) {
        while self.chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_ws();
        self.chars.next_if(|(_, c)| *c == expected).is_some()
    }

    fn parse_type(&mut self) -> Result<TypeRef, TypeParseError> {
        let name = self.parse_name()?;
        let mut args = Vec::new();
        if self.eat('<') {
            loop {
                args.push(self.parse_type()?);
                if self.eat(',') {
                    continue;
                }
                if self.eat('>') {
                    break;
                }
                return Err(self.error("expected `,` or `>`"));
            }
            if args.is_empty() {
                return Err(self.error("empty type argument list"));
            }
        }
        let mut ty = TypeRef::Named { name, args };
        while self.eat('[') {
            if !self.eat(']') {
                return Err(self.error("expected `]`"));
            }
            ty = TypeRef::Array(Box::new(ty));
        }
        Ok(ty)
    }

    fn parse_name(&mut self) -> Result<String, TypeParseError> {
        self.skip_ws();
        let mut name = String::new();
        while let Some((_, c)) = self
            .chars
            .next_if(|(_, c)| c.is_alphanumeric() || matches!(*c, '_' | '$' | '.'))
        {
            name.push(c);
        }
        if name.is_empty() {
            return match self.chars.peek().map(|&(_, c)| c) {
                Some('?') => Err(self.error("wildcard types are not supported")),
                Some(c) => Err(self.error(format!("expected a type name, found `{}`", c))),
                None => Err(self.error("expected a type name")),
            };
        }
        if name.starts_with('.') || name.ends_with('.') || name.contains("..") {
            return Err(self.error(format!("malformed qualified name `{}`", name)));
        }
        Ok(name)
    }
}

/// A type expression with every variable substituted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub struct ConcreteType(TypeRef);

impl ConcreteType {
    /// Canonical cache and registry key.
    pub fn key(&self) -> TypeKey {
        TypeKey(self.0.to_string())
    }

    pub fn as_type(&self) -> &TypeRef {
        &self.0
    }

    pub fn base_name(&self) -> Option<&str> {
        self.0.base_name()
    }

    /// Type arguments of a named type.
    pub fn args(&self) -> Vec<ConcreteType> {
        match &self.0 {
            TypeRef::Named { args, .. } => args.iter().cloned().map(ConcreteType).collect(),
            _ => Vec::new(),
        }
    }

    /// Element type of an array.
    pub fn element(&self) -> Option<ConcreteType> {
        match &self.0 {
            TypeRef::Array(elem) => Some(ConcreteType((**elem).clone())),
            _ => None,
        }
    }
}

impl TryFrom<TypeRef> for ConcreteType {
    /// The name of the variable that is still unresolved.
    type Error = String;

    fn try_from(value: TypeRef) -> Result<Self, Self::Error> {
        match value.first_var() {
            Some(var) => Err(var.to_string()),
            None => Ok(ConcreteType(value)),
        }
    }
}

impl fmt::Display for ConcreteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<ConcreteType> for String {
    fn from(value: ConcreteType) -> Self {
        value.0.to_string()
    }
}

/// Canonical textual form of a [`ConcreteType`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeKey(String);

impl TypeKey {
    /// Wrap an already canonical key, e.g. one read back from a manifest.
    ///
    /// The text is re-parsed and re-printed when possible so that spacing
    /// differences do not produce distinct keys.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        match TypeRef::parse(&text) {
            Ok(ty) => TypeKey(ty.to_string()),
            Err(_) => TypeKey(text),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Declared name the key is an instantiation of.
    pub fn base_name(&self) -> Option<String> {
        TypeRef::parse(&self.0)
            .ok()
            .and_then(|ty| ty.base_name().map(str::to_string))
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
