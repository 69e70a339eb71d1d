//! Declaration model consumed by the generator.
//!
//! This is the language-neutral view of the data classes a front-end hands us:
//! names, fields, modifiers, annotations and accessor methods. Type expressions
//! are kept as text here and parsed during discovery so that a malformed type can
//! be reported against the element that declared it.

use crate::error::{Error, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A batch of declarations processed in one generation pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct DeclarationSet {
    #[serde(default)]
    pub declarations: Vec<TypeDecl>,
}

/// Supported input formats for declaration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Json,
    Yaml,
}

impl InputFormat {
    /// Guess the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "json" => Some(InputFormat::Json),
            "yaml" | "yml" => Some(InputFormat::Yaml),
            _ => None,
        }
    }
}

impl DeclarationSet {
    pub fn parse(text: &str, format: InputFormat) -> std::result::Result<Self, String> {
        match format {
            InputFormat::Json => serde_json::from_str(text).map_err(|e| e.to_string()),
            InputFormat::Yaml => serde_yaml::from_str(text).map_err(|e| e.to_string()),
        }
    }

    /// Load declarations from a `.json`, `.yaml` or `.yml` file.
    pub fn load(path: &Path) -> Result<Self> {
        let format = InputFormat::from_path(path)
            .ok_or_else(|| Error::Format(path.display().to_string()))?;
        let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, format).map_err(|message| Error::Input {
            path: path.to_path_buf(),
            message,
        })
    }

    pub fn get(&self, name: &str) -> Option<&TypeDecl> {
        self.declarations.iter().find(|d| d.name == name)
    }
}

/// Kind of a declared type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    #[default]
    Class,
    Interface,
    Enum,
}

/// Which fields of a marked type are serialized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FieldOption {
    /// Every instance field.
    #[default]
    All,
    /// No fields.
    None,
    /// Only fields carrying a serialized-name or key annotation.
    SerializedName,
}

impl FieldOption {
    pub fn includes(&self, field: &FieldDecl) -> bool {
        match self {
            FieldOption::All => true,
            FieldOption::None => false,
            FieldOption::SerializedName => field.serialized_name.is_some() || field.key.is_some(),
        }
    }
}

/// The opt-in marker placed on a type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Marker {
    #[serde(default)]
    pub fields: FieldOption,
}

/// A declared class, interface or enum.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct TypeDecl {
    /// Fully qualified name, e.g. `com.example.Outer.Inner`.
    pub name: String,
    #[serde(default)]
    pub kind: TypeKind,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    /// Formal type parameter names, in order.
    #[serde(default)]
    pub type_params: Vec<String>,
    /// Qualified name of the enclosing type for nested declarations.
    #[serde(default)]
    pub enclosing: Option<String>,
    /// Supertype expression, possibly parameterized (`Base<Paging, List<T>>`).
    #[serde(default)]
    pub superclass: Option<String>,
    #[serde(default)]
    pub marker: Option<Marker>,
    #[serde(default)]
    pub fields: Vec<FieldDecl>,
    #[serde(default)]
    pub methods: Vec<MethodDecl>,
    /// Enum constants, in declaration order.
    #[serde(default)]
    pub constants: Vec<EnumConstant>,
}

impl TypeDecl {
    /// Simple name: the last segment of the qualified name.
    pub fn simple_name(&self) -> &str {
        simple_name(&self.name)
    }
}

pub(crate) fn simple_name(qualified: &str) -> &str {
    qualified
        .rsplit(['.', '$'])
        .next()
        .unwrap_or(qualified)
}

/// Member visibility as seen from generated code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Protected,
    #[default]
    Package,
    Private,
}

impl Visibility {
    /// Generated code lives beside the model, so only private members are hidden.
    pub fn is_visible(&self) -> bool {
        !matches!(self, Visibility::Private)
    }
}

/// A field declared directly on a type.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct FieldDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default, rename = "final")]
    pub is_final: bool,
    #[serde(default, rename = "static")]
    pub is_static: bool,
    #[serde(default, rename = "transient")]
    pub is_transient: bool,
    /// Absence is a hard failure on read and on write.
    #[serde(default)]
    pub not_null: bool,
    #[serde(default)]
    pub serialized_name: Option<SerializedName>,
    /// Field-level opt-in; a non-empty value is also the wire name.
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub adapter: Option<AdapterOverride>,
}

impl FieldDecl {
    /// Static and transient members never take part in serialization.
    pub fn is_instance_data(&self) -> bool {
        !self.is_static && !self.is_transient
    }

    /// Carries the field-level opt-in marker.
    pub fn is_marked(&self) -> bool {
        self.key.is_some()
    }
}

/// General serialized-name annotation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SerializedName {
    #[serde(default)]
    pub value: String,
    /// Names accepted on read and never written.
    #[serde(default)]
    pub alternate: Vec<String>,
}

/// What kind of object a custom adapter path names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AdapterKind {
    /// A full read/write adapter.
    #[default]
    TypeAdapter,
    /// A factory producing the adapter for the field type.
    Factory,
    /// A serializer/deserializer pair working on JSON trees.
    Tree,
}

/// Per-field custom adapter override.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct AdapterOverride {
    /// Path of the adapter type, e.g. `crate::adapters::DateAdapter`.
    pub path: String,
    #[serde(default)]
    pub kind: AdapterKind,
    #[serde(default = "default_true")]
    pub null_safe: bool,
}

fn default_true() -> bool {
    true
}

/// A method signature, used only to find accessors.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct MethodDecl {
    pub name: String,
    #[serde(default)]
    pub params: Vec<String>,
    /// Return type; `None` means the method returns nothing.
    #[serde(default)]
    pub returns: Option<String>,
}

/// One constant of an enum declaration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct EnumConstant {
    pub name: String,
    #[serde(default)]
    pub serialized_name: Option<SerializedName>,
}

impl EnumConstant {
    pub fn wire_name(&self) -> &str {
        match &self.serialized_name {
            Some(sn) if !sn.value.is_empty() => &sn.value,
            _ => &self.name,
        }
    }

    pub fn alternates(&self) -> &[String] {
        self.serialized_name
            .as_ref()
            .map(|sn| sn.alternate.as_slice())
            .unwrap_or_default()
    }
}
