//! Executes codec IR over in-memory token streams.
//!
//! Replay interprets the same [`CodecUnit`]s the Rust writer renders, so the
//! wire behavior of a pass can be checked without compiling its output. Values
//! are dynamic ([`Value`]); declared classes are [`Object`]s keyed by field name.

mod stream;
mod value;

pub use stream::{Token, TokenReader, TokenWriter};
pub use value::{Object, Value};

use crate::classify::{KnownAdapter, PrimitiveKind};
use crate::ir::{
    AdapterSpec, Block, CodecBody, CodecUnit, Cond, Consume, Emit, EnumCodec, Failure,
    FieldValue, ObjectCodec, Returned, Stmt, TokenKind,
};
use crate::types::TypeKey;
use serde_json::Number;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("{ty}.{field} must not be null")]
    NullField { ty: String, field: String },
    #[error("required field {ty}.{field} is missing")]
    MissingField { ty: String, field: String },
    #[error("{value:?} is not a constant of {ty}")]
    UnknownConstant { ty: String, value: String },
    #[error("expected {expected}, found {found}")]
    UnexpectedToken { expected: String, found: String },
    #[error("no codec registered for {0}")]
    UnknownCodec(String),
    #[error("no custom adapter registered at {0}")]
    UnknownCustomAdapter(String),
    #[error("{ty} cannot hold a {found} value")]
    TypeMismatch { ty: String, found: String },
    #[error("{0:?} is not a valid map key")]
    InvalidMapKey(String),
    #[error("statement not valid in a {0} procedure")]
    Procedure(&'static str),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("unexpected end of input")]
    Eof,
}

/// Hand-written codec standing in for a per-field adapter override.
pub trait CustomCodec {
    fn write(&self, writer: &mut TokenWriter, value: Option<&Value>) -> Result<(), ReplayError>;
    fn read(&self, reader: &mut TokenReader) -> Result<Option<Value>, ReplayError>;
}

/// Control flow out of a block.
enum Flow {
    Next,
    Return,
}

struct WriteFrame<'v> {
    incoming: Option<&'v Value>,
    bound: Option<&'v Object>,
}

#[derive(Default)]
struct ReadFrame {
    object: Option<Object>,
    name: Option<String>,
    result: Option<Value>,
}

/// Interpreter over one or more passes' codec units.
#[derive(Default)]
pub struct Replay<'a> {
    units: HashMap<TypeKey, &'a CodecUnit>,
    custom: HashMap<String, Box<dyn CustomCodec + 'a>>,
}

impl<'a> Replay<'a> {
    pub fn new(units: impl IntoIterator<Item = &'a CodecUnit>) -> Self {
        Self {
            units: units.into_iter().map(|u| (u.key.clone(), u)).collect(),
            custom: HashMap::new(),
        }
    }

    /// Register the codec used for fields overridden with adapter `path`.
    pub fn with_custom(mut self, path: &str, codec: impl CustomCodec + 'a) -> Self {
        self.custom.insert(path.to_string(), Box::new(codec));
        self
    }

    fn unit(&self, key: &TypeKey) -> Result<&'a CodecUnit, ReplayError> {
        self.units
            .get(key)
            .copied()
            .ok_or_else(|| ReplayError::UnknownCodec(key.to_string()))
    }

    /// Write `value` with the codec for `descriptor` and return compact JSON.
    pub fn to_json(&self, descriptor: &str, value: Option<&Value>) -> Result<String, ReplayError> {
        let mut writer = TokenWriter::new();
        self.write(&TypeKey::new(descriptor), &mut writer, value)?;
        Ok(writer.to_json())
    }

    /// Read JSON text with the codec for `descriptor`.
    pub fn from_json(&self, descriptor: &str, json: &str) -> Result<Option<Value>, ReplayError> {
        let mut reader = TokenReader::from_json(json)?;
        self.read(&TypeKey::new(descriptor), &mut reader)
    }

    pub fn write(
        &self,
        key: &TypeKey,
        writer: &mut TokenWriter,
        value: Option<&Value>,
    ) -> Result<(), ReplayError> {
        let unit = self.unit(key)?;
        match &unit.body {
            CodecBody::Object(codec) => {
                let mut frame = WriteFrame {
                    incoming: value,
                    bound: None,
                };
                self.exec_write(unit, codec, &codec.write, writer, &mut frame)?;
                Ok(())
            }
            CodecBody::Enum(codec) => write_enum(unit, codec, writer, value),
        }
    }

    pub fn read(
        &self,
        key: &TypeKey,
        reader: &mut TokenReader,
    ) -> Result<Option<Value>, ReplayError> {
        let unit = self.unit(key)?;
        match &unit.body {
            CodecBody::Object(codec) => {
                let mut frame = ReadFrame::default();
                self.exec_read(unit, codec, &codec.read, reader, &mut frame)?;
                Ok(frame.result)
            }
            CodecBody::Enum(codec) => read_enum(unit, codec, reader),
        }
    }

    fn exec_write<'v>(
        &self,
        unit: &CodecUnit,
        codec: &ObjectCodec,
        block: &Block,
        w: &mut TokenWriter,
        frame: &mut WriteFrame<'v>,
    ) -> Result<Flow, ReplayError> {
        for stmt in block {
            let incoming = frame.incoming;
            let flow = match stmt {
                Stmt::BindValue { absent } => match incoming {
                    None | Some(Value::Null) => self.exec_write(unit, codec, absent, w, frame)?,
                    Some(Value::Object(object)) => {
                        frame.bound = Some(object);
                        Flow::Next
                    }
                    Some(other) => {
                        return Err(ReplayError::TypeMismatch {
                            ty: unit.key.to_string(),
                            found: other.describe().to_string(),
                        });
                    }
                },
                Stmt::Emit { emit } => {
                    match emit {
                        Emit::BeginObject => w.begin_object(),
                        Emit::EndObject => w.end_object(),
                        Emit::Name(name) => w.name(name),
                        Emit::Null => w.null(),
                    }
                    Flow::Next
                }
                Stmt::If {
                    cond,
                    then,
                    otherwise,
                } => {
                    let branch = if bound_holds(codec, cond, frame.bound) {
                        then
                    } else {
                        otherwise
                    };
                    self.exec_write(unit, codec, branch, w, frame)?
                }
                Stmt::WriteField { field } => {
                    let slot = codec.field(*field);
                    let value = frame
                        .bound
                        .and_then(|o| o.get(&slot.name))
                        .filter(|v| !v.is_null());
                    match slot.value {
                        FieldValue::Literal { primitive } => write_literal(w, primitive, value)?,
                        FieldValue::Adapter { slot: id } => {
                            let zero = slot.primitive().map(Value::zero);
                            let value = value.or(zero.as_ref());
                            self.write_spec(&codec.adapter(id).spec, w, value)?
                        }
                    }
                    Flow::Next
                }
                Stmt::Fail { failure } => return Err(failure_error(unit, codec, failure)),
                Stmt::Return { .. } => Flow::Return,
                _ => return Err(ReplayError::Procedure("write")),
            };
            if let Flow::Return = flow {
                return Ok(Flow::Return);
            }
        }
        Ok(Flow::Next)
    }

    fn exec_read(
        &self,
        unit: &CodecUnit,
        codec: &ObjectCodec,
        block: &Block,
        r: &mut TokenReader,
        frame: &mut ReadFrame,
    ) -> Result<Flow, ReplayError> {
        for stmt in block {
            let flow = match stmt {
                Stmt::Consume { consume } => {
                    match consume {
                        Consume::BeginObject => r.begin_object()?,
                        Consume::EndObject => r.end_object()?,
                        Consume::Null => r.next_null()?,
                        Consume::Skip => r.skip_value()?,
                    }
                    Flow::Next
                }
                Stmt::If {
                    cond,
                    then,
                    otherwise,
                } => {
                    let holds = match cond {
                        Cond::Peek { kind } => r.peek() == *kind,
                        Cond::NotPeek { kind } => r.peek() != *kind,
                        _ => bound_holds(codec, cond, frame.object.as_ref()),
                    };
                    let branch = if holds { then } else { otherwise };
                    self.exec_read(unit, codec, branch, r, frame)?
                }
                Stmt::Instantiate => {
                    frame.object = Some(instantiate(unit, codec));
                    Flow::Next
                }
                Stmt::EachMember { body } => {
                    let mut flow = Flow::Next;
                    while r.has_next() {
                        frame.name = Some(r.next_name()?);
                        flow = self.exec_read(unit, codec, body, r, frame)?;
                        if let Flow::Return = flow {
                            break;
                        }
                    }
                    flow
                }
                Stmt::Dispatch { arms, fallback } => {
                    let name = frame.name.clone().unwrap_or_default();
                    let body = arms
                        .iter()
                        .find(|arm| arm.names.iter().any(|n| *n == name))
                        .map(|arm| &arm.body)
                        .unwrap_or(fallback);
                    self.exec_read(unit, codec, body, r, frame)?
                }
                Stmt::ReadField { field } => {
                    let slot = codec.field(*field);
                    let value = match slot.value {
                        FieldValue::Literal { primitive } => Some(read_literal(r, primitive)?),
                        FieldValue::Adapter { slot: id } => {
                            self.read_spec(&codec.adapter(id).spec, r)?
                        }
                    };
                    let value = value
                        .or_else(|| slot.primitive().map(Value::zero))
                        .unwrap_or(Value::Null);
                    if let Some(object) = frame.object.as_mut() {
                        object.set(&slot.name, value);
                    }
                    Flow::Next
                }
                Stmt::Fail { failure } => return Err(failure_error(unit, codec, failure)),
                Stmt::Return { returned } => {
                    frame.result = match returned {
                        Returned::Object => frame.object.take().map(Value::Object),
                        Returned::Absent | Returned::Done => None,
                    };
                    Flow::Return
                }
                _ => return Err(ReplayError::Procedure("read")),
            };
            if let Flow::Return = flow {
                return Ok(Flow::Return);
            }
        }
        Ok(Flow::Next)
    }

    fn write_spec(
        &self,
        spec: &AdapterSpec,
        w: &mut TokenWriter,
        value: Option<&Value>,
    ) -> Result<(), ReplayError> {
        let value = value.filter(|v| !v.is_null());
        match spec {
            AdapterSpec::Primitive { primitive } => write_literal(w, *primitive, value),
            AdapterSpec::Known { known } => match value {
                None => {
                    w.null();
                    Ok(())
                }
                Some(v) => write_known(w, *known, v),
            },
            AdapterSpec::List { element, .. } | AdapterSpec::Array { element } => match value {
                None => {
                    w.null();
                    Ok(())
                }
                Some(Value::List(items)) => {
                    w.begin_array();
                    for item in items {
                        self.write_spec(element, w, Some(item))?;
                    }
                    w.end_array();
                    Ok(())
                }
                Some(other) => Err(mismatch("list", other)),
            },
            AdapterSpec::Map { key, value: vspec, .. } => match value {
                None => {
                    w.null();
                    Ok(())
                }
                Some(Value::Map(entries)) => {
                    w.begin_object();
                    for (k, v) in entries {
                        w.name(&self.key_name(key, k)?);
                        self.write_spec(vspec, w, Some(v))?;
                    }
                    w.end_object();
                    Ok(())
                }
                Some(other) => Err(mismatch("map", other)),
            },
            AdapterSpec::Generated { key } | AdapterSpec::External { key } => {
                self.write(key, w, value)
            }
            AdapterSpec::Dynamic { key } => match value {
                None => {
                    w.null();
                    Ok(())
                }
                Some(Value::Json(tree)) => {
                    w.tree(tree);
                    Ok(())
                }
                Some(_) if self.units.contains_key(key) => self.write(key, w, value),
                Some(_) => Err(ReplayError::UnknownCodec(key.to_string())),
            },
            AdapterSpec::Custom {
                path, null_safe, ..
            } => {
                if *null_safe && value.is_none() {
                    w.null();
                    return Ok(());
                }
                self.custom_codec(path)?.write(w, value)
            }
        }
    }

    fn read_spec(
        &self,
        spec: &AdapterSpec,
        r: &mut TokenReader,
    ) -> Result<Option<Value>, ReplayError> {
        let nullable = !matches!(
            spec,
            AdapterSpec::Primitive { .. } | AdapterSpec::Custom { null_safe: false, .. }
        );
        if nullable && r.peek() == TokenKind::Null {
            r.next_null()?;
            return Ok(None);
        }
        Ok(match spec {
            AdapterSpec::Primitive { primitive } => Some(read_literal(r, *primitive)?),
            AdapterSpec::Known { known } => Some(read_known(r, *known)?),
            AdapterSpec::List { element, .. } | AdapterSpec::Array { element } => {
                r.begin_array()?;
                let mut items = Vec::new();
                while r.has_next() {
                    items.push(self.read_spec(element, r)?.unwrap_or(Value::Null));
                }
                r.end_array()?;
                Some(Value::List(items))
            }
            AdapterSpec::Map { key, value, .. } => {
                r.begin_object()?;
                let mut entries = Vec::new();
                while r.has_next() {
                    let name = r.next_name()?;
                    let k = self.key_value(key, &name)?;
                    let v = self.read_spec(value, r)?.unwrap_or(Value::Null);
                    entries.push((k, v));
                }
                r.end_object()?;
                Some(Value::Map(entries))
            }
            AdapterSpec::Generated { key } | AdapterSpec::External { key } => self.read(key, r)?,
            AdapterSpec::Dynamic { key } => {
                if self.units.contains_key(key) {
                    self.read(key, r)?
                } else {
                    Some(Value::Json(r.next_tree()?))
                }
            }
            AdapterSpec::Custom { path, .. } => self.custom_codec(path)?.read(r)?,
        })
    }

    fn custom_codec(&self, path: &str) -> Result<&dyn CustomCodec, ReplayError> {
        self.custom
            .get(path)
            .map(|codec| codec.as_ref())
            .ok_or_else(|| ReplayError::UnknownCustomAdapter(path.to_string()))
    }

    /// Wire name of a map key.
    fn key_name(&self, spec: &AdapterSpec, key: &Value) -> Result<String, ReplayError> {
        match (spec, key) {
            (AdapterSpec::Generated { key: ty } | AdapterSpec::External { key: ty }, Value::Enum(c)) => {
                match &self.unit(ty)?.body {
                    CodecBody::Enum(codec) => codec
                        .constant_to_name()
                        .get(c.as_str())
                        .map(|name| name.to_string())
                        .ok_or_else(|| ReplayError::UnknownConstant {
                            ty: ty.to_string(),
                            value: c.clone(),
                        }),
                    CodecBody::Object(_) => Err(ReplayError::InvalidMapKey(c.clone())),
                }
            }
            (_, Value::Str(s)) => Ok(s.clone()),
            (_, Value::Int(i)) => Ok(i.to_string()),
            (_, Value::Float(f)) => Ok(f.to_string()),
            (_, Value::Bool(b)) => Ok(b.to_string()),
            (_, Value::Char(c)) => Ok(c.to_string()),
            (_, other) => Err(ReplayError::InvalidMapKey(other.describe().to_string())),
        }
    }

    /// Map key value for a member name.
    fn key_value(&self, spec: &AdapterSpec, name: &str) -> Result<Value, ReplayError> {
        let invalid = || ReplayError::InvalidMapKey(name.to_string());
        let primitive = match spec {
            AdapterSpec::Primitive { primitive } => Some(*primitive),
            AdapterSpec::Known { known } => known.unboxed(),
            AdapterSpec::Generated { key } | AdapterSpec::External { key } => {
                return match &self.unit(key)?.body {
                    CodecBody::Enum(codec) => codec
                        .name_to_constant()
                        .get(name)
                        .map(|c| Value::Enum(c.to_string()))
                        .ok_or_else(|| ReplayError::UnknownConstant {
                            ty: key.to_string(),
                            value: name.to_string(),
                        }),
                    CodecBody::Object(_) => Err(invalid()),
                };
            }
            _ => None,
        };
        match primitive {
            None => Ok(Value::Str(name.to_string())),
            Some(PrimitiveKind::Boolean) => name.parse().map(Value::Bool).map_err(|_| invalid()),
            Some(PrimitiveKind::Char) => single_char(name).map(Value::Char).ok_or_else(invalid),
            Some(kind) if kind.is_floating() => {
                name.parse().map(Value::Float).map_err(|_| invalid())
            }
            Some(_) => name.parse().map(Value::Int).map_err(|_| invalid()),
        }
    }
}

fn bound_holds(codec: &ObjectCodec, cond: &Cond, object: Option<&Object>) -> bool {
    let present = |field| object.is_some_and(|o| o.is_present(&codec.field(field).name));
    match *cond {
        Cond::Present { field, .. } => present(field),
        Cond::Absent { field, .. } => !present(field),
        Cond::Peek { .. } | Cond::NotPeek { .. } => false,
    }
}

fn instantiate(unit: &CodecUnit, codec: &ObjectCodec) -> Object {
    let mut object = Object::new(unit.key.as_str());
    for field in &codec.fields {
        if let Some(kind) = field.primitive() {
            object.set(&field.name, Value::zero(kind));
        }
    }
    object
}

fn failure_error(unit: &CodecUnit, codec: &ObjectCodec, failure: &Failure) -> ReplayError {
    let (field, missing) = match *failure {
        Failure::NullField { field } => (field, false),
        Failure::MissingField { field } => (field, true),
    };
    let slot = codec.field(field);
    let ty = unit.key.to_string();
    let field = slot.name.clone();
    if missing {
        ReplayError::MissingField { ty, field }
    } else {
        ReplayError::NullField { ty, field }
    }
}

fn mismatch(ty: &str, found: &Value) -> ReplayError {
    ReplayError::TypeMismatch {
        ty: ty.to_string(),
        found: found.describe().to_string(),
    }
}

fn single_char(s: &str) -> Option<char> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

fn write_literal(
    w: &mut TokenWriter,
    kind: PrimitiveKind,
    value: Option<&Value>,
) -> Result<(), ReplayError> {
    let zero = Value::zero(kind);
    let value = value.filter(|v| !v.is_null()).unwrap_or(&zero);
    match (kind, value) {
        (PrimitiveKind::Boolean, Value::Bool(b)) => w.bool(*b),
        (PrimitiveKind::Char, Value::Char(c)) => w.string(&c.to_string()),
        (k, Value::Int(i)) if k.is_integral() || k.is_floating() => w.number((*i).into()),
        (k, Value::Float(f)) if k.is_floating() => {
            let n = Number::from_f64(*f).ok_or_else(|| mismatch(k.as_str(), value))?;
            w.number(n)
        }
        (k, other) => return Err(mismatch(k.as_str(), other)),
    }
    Ok(())
}

fn read_literal(r: &mut TokenReader, kind: PrimitiveKind) -> Result<Value, ReplayError> {
    Ok(match kind {
        PrimitiveKind::Boolean => Value::Bool(r.next_bool()?),
        PrimitiveKind::Char => {
            let s = r.next_string()?;
            Value::Char(single_char(&s).ok_or_else(|| mismatch("char", &Value::Str(s.clone())))?)
        }
        k if k.is_floating() => {
            let n = r.next_number()?;
            Value::Float(n.as_f64().ok_or_else(|| mismatch("double", &Value::Json(n.into())))?)
        }
        _ => {
            let n = r.next_number()?;
            Value::Int(n.as_i64().ok_or_else(|| mismatch("long", &Value::Json(n.into())))?)
        }
    })
}

fn write_known(w: &mut TokenWriter, known: KnownAdapter, value: &Value) -> Result<(), ReplayError> {
    if let Some(kind) = known.unboxed() {
        return write_literal(w, kind, Some(value));
    }
    match (known, value) {
        (KnownAdapter::String, Value::Str(s)) => w.string(s),
        (KnownAdapter::Number, Value::Int(i)) => w.number((*i).into()),
        (KnownAdapter::Number, Value::Float(f)) => match Number::from_f64(*f) {
            Some(n) => w.number(n),
            None => return Err(mismatch("Number", value)),
        },
        (KnownAdapter::JsonTree, Value::Json(tree)) => w.tree(tree),
        (_, other) => return Err(mismatch(&format!("{:?}", known), other)),
    }
    Ok(())
}

fn read_known(r: &mut TokenReader, known: KnownAdapter) -> Result<Value, ReplayError> {
    if let Some(kind) = known.unboxed() {
        return read_literal(r, kind);
    }
    Ok(match known {
        KnownAdapter::String => Value::Str(r.next_string()?),
        KnownAdapter::Number => {
            let n = r.next_number()?;
            match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or_default()),
            }
        }
        _ => Value::Json(r.next_tree()?),
    })
}

fn write_enum(
    unit: &CodecUnit,
    codec: &EnumCodec,
    w: &mut TokenWriter,
    value: Option<&Value>,
) -> Result<(), ReplayError> {
    let constant = match value {
        None | Some(Value::Null) => {
            w.null();
            return Ok(());
        }
        Some(Value::Enum(c)) | Some(Value::Str(c)) => c,
        Some(other) => return Err(mismatch(unit.key.as_str(), other)),
    };
    let table = codec.constant_to_name();
    let name = table
        .get(constant.as_str())
        .ok_or_else(|| ReplayError::UnknownConstant {
            ty: unit.key.to_string(),
            value: constant.clone(),
        })?;
    w.string(name);
    Ok(())
}

fn read_enum(
    unit: &CodecUnit,
    codec: &EnumCodec,
    r: &mut TokenReader,
) -> Result<Option<Value>, ReplayError> {
    if r.peek() == TokenKind::Null {
        r.next_null()?;
        return Ok(None);
    }
    let name = r.next_string()?;
    match codec.name_to_constant().get(name.as_str()) {
        Some(constant) => Ok(Some(Value::Enum(constant.to_string()))),
        None => Err(ReplayError::UnknownConstant {
            ty: unit.key.to_string(),
            value: name,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::Notation;
    use crate::decl::{DeclarationSet, InputFormat};
    use crate::discovery::DiscoveryContext;
    use crate::registry::KnownTypes;
    use crate::synth::{synthesize, SynthOptions};

    fn units(json: &str, serialize_nulls: bool) -> Vec<CodecUnit> {
        let set = DeclarationSet::parse(json, InputFormat::Json).unwrap();
        let universe = DiscoveryContext::new(&set, Notation::Standard)
            .discover()
            .unwrap();
        let options = SynthOptions {
            serialize_nulls,
            parallel: false,
        };
        synthesize(&universe, &KnownTypes::default(), options).unwrap()
    }

    const PERSON: &str = r#"{"declarations": [{"name": "a.Person", "marker": {}, "fields": [
        {"name": "name", "type": "String"},
        {"name": "age", "type": "int"},
        {"name": "tags", "type": "List<String>"}
    ]}]}"#;

    #[test]
    fn test_round_trip() {
        let units = units(PERSON, false);
        let replay = Replay::new(&units);
        let person = Value::from(Object::new("a.Person").with("name", "test").with("age", 2));
        let json = replay.to_json("a.Person", Some(&person)).unwrap();
        assert_eq!(json, r#"{"name":"test","age":2}"#);
        assert_eq!(replay.from_json("a.Person", &json).unwrap(), Some(person));
    }

    #[test]
    fn test_null_object_short_circuits() {
        let units = units(PERSON, false);
        let replay = Replay::new(&units);
        assert_eq!(replay.to_json("a.Person", None).unwrap(), "null");
        assert_eq!(replay.from_json("a.Person", "null").unwrap(), None);
        assert_eq!(replay.from_json("a.Person", "[1, 2]").unwrap(), None);
    }

    #[test]
    fn test_unknown_codec() {
        let replay = Replay::default();
        let err = replay.to_json("a.Nope", None).unwrap_err();
        assert_eq!(err.to_string(), "no codec registered for a.Nope");
    }
}
