//! Codec IR: what a generated read/write pair does, independent of how it is
//! rendered.
//!
//! Object codecs are small statement trees over a streaming writer and reader;
//! enum codecs are a pair of lookup tables. The Rust writer renders this IR and
//! the replay module executes it.

use crate::accessor::FieldAccessor;
use crate::classify::{shape, CollectionKind, KnownAdapter, MapKind, PrimitiveKind, Shape};
use crate::decl::AdapterKind;
use crate::types::{ConcreteType, TypeKey};
use serde::Serialize;
use std::collections::BTreeMap;

/// The generated read/write pair for one concrete type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodecUnit {
    pub key: TypeKey,
    /// Identifier of the generated codec type, unique within the pass.
    pub ident: String,
    pub target: ConcreteType,
    pub body: CodecBody,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum CodecBody {
    Object(ObjectCodec),
    Enum(EnumCodec),
}

/// Read/write procedures for a class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectCodec {
    /// Serialized fields, ancestors first.
    pub fields: Vec<FieldSlot>,
    /// Nested adapters bound once per unit, shared by fields of the same type.
    pub adapters: Vec<AdapterSlot>,
    pub write: Block,
    pub read: Block,
}

impl ObjectCodec {
    pub fn field(&self, id: FieldId) -> &FieldSlot {
        &self.fields[id.0]
    }

    pub fn adapter(&self, id: SlotId) -> &AdapterSlot {
        &self.adapters[id.0]
    }
}

/// Index into [`ObjectCodec::fields`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct FieldId(pub usize);

/// Index into [`ObjectCodec::adapters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SlotId(pub usize);

/// One serialized field of an object codec.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSlot {
    pub name: String,
    pub owner: String,
    pub ty: ConcreteType,
    pub accessor: FieldAccessor,
    pub wire_name: String,
    pub alternates: Vec<String>,
    pub not_null: bool,
    pub value: FieldValue,
}

impl FieldSlot {
    /// Canonical key followed by alternates.
    pub fn read_names(&self) -> Vec<&str> {
        std::iter::once(self.wire_name.as_str())
            .chain(self.alternates.iter().map(String::as_str))
            .collect()
    }

    /// Primitive kind of the field type. Such a field is never absent, even
    /// when a custom adapter carries its value.
    pub fn primitive(&self) -> Option<PrimitiveKind> {
        match self.value {
            FieldValue::Literal { primitive } => Some(primitive),
            FieldValue::Adapter { .. } => match shape(&self.ty) {
                Ok(Shape::Primitive(kind)) => Some(kind),
                _ => None,
            },
        }
    }
}

/// How a field's value crosses the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldValue {
    /// Primitive written and read inline; never absent.
    Literal { primitive: PrimitiveKind },
    /// Delegated to a nested adapter.
    Adapter { slot: SlotId },
}

/// A nested adapter binding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdapterSlot {
    pub id: SlotId,
    pub ty: ConcreteType,
    pub spec: AdapterSpec,
}

/// Where a nested adapter comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdapterSpec {
    /// Primitive element of an array.
    Primitive { primitive: PrimitiveKind },
    Known { known: KnownAdapter },
    List {
        collection: CollectionKind,
        element: Box<AdapterSpec>,
    },
    Array { element: Box<AdapterSpec> },
    Map {
        map: MapKind,
        key: Box<AdapterSpec>,
        value: Box<AdapterSpec>,
    },
    /// A codec emitted in this pass.
    Generated { key: TypeKey },
    /// A codec emitted by another module or an earlier pass.
    External { key: TypeKey },
    /// No codec is known; the runtime resolves one at call time.
    Dynamic { key: TypeKey },
    /// A per-field override.
    Custom {
        path: String,
        adapter: AdapterKind,
        null_safe: bool,
    },
}

pub type Block = Vec<Stmt>;

/// Token kinds the procedures branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    BeginObject,
    EndObject,
    BeginArray,
    EndArray,
    Name,
    String,
    Number,
    Boolean,
    Null,
    End,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::BeginObject => "BeginObject",
            TokenKind::EndObject => "EndObject",
            TokenKind::BeginArray => "BeginArray",
            TokenKind::EndArray => "EndArray",
            TokenKind::Name => "Name",
            TokenKind::String => "String",
            TokenKind::Number => "Number",
            TokenKind::Boolean => "Boolean",
            TokenKind::Null => "Null",
            TokenKind::End => "End",
        }
    }
}

/// The value a procedure is working on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    /// The value passed to `write`.
    Value,
    /// The instance being filled by `read`.
    Object,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", content = "arg", rename_all = "snake_case")]
pub enum Emit {
    BeginObject,
    EndObject,
    Name(String),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Consume {
    BeginObject,
    EndObject,
    Null,
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "test", rename_all = "snake_case")]
pub enum Cond {
    Peek { kind: TokenKind },
    NotPeek { kind: TokenKind },
    Present { subject: Subject, field: FieldId },
    Absent { subject: Subject, field: FieldId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum Failure {
    /// A not-null field was absent while writing.
    NullField { field: FieldId },
    /// A not-null field was still absent after reading.
    MissingField { field: FieldId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Returned {
    /// End of `write`.
    Done,
    /// `read` produced no value.
    Absent,
    /// `read` produced the filled instance.
    Object,
}

/// One step of a codec procedure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "stmt", rename_all = "snake_case")]
pub enum Stmt {
    /// Bind the incoming value, running `absent` when there is none.
    BindValue { absent: Block },
    Emit { emit: Emit },
    Consume { consume: Consume },
    If {
        cond: Cond,
        then: Block,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        otherwise: Block,
    },
    /// Create a fresh instance: primitives zeroed, references absent.
    Instantiate,
    /// For each remaining member of the current object, read its name and run
    /// the body.
    EachMember { body: Block },
    /// Branch on the current member name.
    Dispatch { arms: Vec<Arm>, fallback: Block },
    /// Write a field's value (not its name) from the bound value.
    WriteField { field: FieldId },
    /// Read the current member's value into a field of the instance.
    ReadField { field: FieldId },
    Fail { failure: Failure },
    Return { returned: Returned },
}

/// A dispatch arm: every name routes to the same body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Arm {
    pub names: Vec<String>,
    pub body: Block,
}

/// Bidirectional constant/name tables of an enum codec.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnumCodec {
    pub constants: Vec<EnumEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnumEntry {
    pub constant: String,
    pub wire_name: String,
    pub alternates: Vec<String>,
}

impl EnumCodec {
    /// Constant name to its single written name.
    pub fn constant_to_name(&self) -> BTreeMap<&str, &str> {
        self.constants
            .iter()
            .map(|e| (e.constant.as_str(), e.wire_name.as_str()))
            .collect()
    }

    /// Every accepted name, alternates included, to its constant.
    pub fn name_to_constant(&self) -> BTreeMap<&str, &str> {
        let mut table = BTreeMap::new();
        for entry in &self.constants {
            for name in std::iter::once(&entry.wire_name).chain(&entry.alternates) {
                table.entry(name.as_str()).or_insert(entry.constant.as_str());
            }
        }
        table
    }
}
