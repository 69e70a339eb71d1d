//! How generated code reaches a field.
//!
//! A visible field is read and assigned directly. A private one goes through a
//! getter/setter pair found among the owner's methods. Both strategies expose the
//! same getter/setter contract and the same wire metadata.

use crate::decl::{AdapterOverride, FieldDecl, MethodDecl};
use crate::diagnostics::{AccessorRole, Violation};
use crate::output::rust::escape;
use crate::types::TypeRef;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Naming convention used to derive accessor names from field names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Notation {
    /// `name` -> `getName` / `setName`.
    #[default]
    Standard,
    /// `mName` -> `getName` / `setName`; the one-character prefix is dropped.
    Hungarian,
}

impl Notation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Notation::Standard => "standard",
            Notation::Hungarian => "hungarian",
        }
    }

    /// Capitalized name component used after `get`/`set`/`is`.
    pub fn component(&self, field: &str) -> String {
        let stem = match self {
            Notation::Standard => field,
            Notation::Hungarian => {
                let mut chars = field.chars();
                chars.next();
                chars.as_str()
            }
        };
        capitalize(stem)
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn decapitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `IsActive` style components, where `is` is part of the name.
fn has_is_prefix(component: &str) -> bool {
    component
        .strip_prefix("Is")
        .and_then(|rest| rest.chars().next())
        .is_some_and(char::is_uppercase)
}

/// Access strategy for one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldAccessor {
    Direct {
        field: String,
    },
    Method {
        field: String,
        getter: String,
        setter: String,
    },
}

impl FieldAccessor {
    /// Pick the strategy for `field`, searching `methods` when it is private.
    pub fn select(
        field: &FieldDecl,
        field_ty: &TypeRef,
        methods: &[MethodDecl],
        notation: Notation,
    ) -> Result<Self, Violation> {
        if field.visibility.is_visible() {
            return Ok(FieldAccessor::Direct {
                field: field.name.clone(),
            });
        }
        let component = notation.component(&field.name);
        let is_boolean = matches!(field_ty, TypeRef::Named { name, args } if name == "boolean" && args.is_empty());

        let setter = find_setter(&component, field_ty, methods).ok_or_else(|| {
            Violation::MissingAccessor {
                role: AccessorRole::Setter,
                expected: format!("set{}", component),
            }
        })?;
        let getter = find_getter(&component, field_ty, is_boolean, methods).ok_or_else(|| {
            Violation::MissingAccessor {
                role: AccessorRole::Getter,
                expected: if is_boolean && has_is_prefix(&component) {
                    decapitalize(&component)
                } else {
                    format!("get{}", component)
                },
            }
        })?;
        Ok(FieldAccessor::Method {
            field: field.name.clone(),
            getter,
            setter,
        })
    }

    /// Expression reading the field from `target`.
    pub fn getter_expr(&self, target: &str) -> String {
        match self {
            FieldAccessor::Direct { field } => format!("{}.{}", target, escape(field)),
            FieldAccessor::Method { getter, .. } => format!("{}.{}()", target, escape(getter)),
        }
    }

    /// Statement assigning `value` to the field of `target`.
    pub fn setter_stmt(&self, target: &str, value: &str) -> String {
        match self {
            FieldAccessor::Direct { field } => {
                format!("{}.{} = {};", target, escape(field), value)
            }
            FieldAccessor::Method { setter, .. } => {
                format!("{}.{}({});", target, escape(setter), value)
            }
        }
    }
}

fn same_type(text: &str, ty: &TypeRef) -> bool {
    TypeRef::parse(text).is_ok_and(|parsed| {
        // Accessor signatures spell type variables as plain names.
        parsed.to_string() == ty.to_string()
    })
}

fn find_setter(component: &str, field_ty: &TypeRef, methods: &[MethodDecl]) -> Option<String> {
    let mut names = vec![format!("set{}", component)];
    if has_is_prefix(component) {
        names.push(format!("set{}", &component[2..]));
    }
    methods
        .iter()
        .find(|m| {
            names.contains(&m.name)
                && m.returns.is_none()
                && m.params.len() == 1
                && same_type(&m.params[0], field_ty)
        })
        .map(|m| m.name.clone())
}

fn find_getter(
    component: &str,
    field_ty: &TypeRef,
    is_boolean: bool,
    methods: &[MethodDecl],
) -> Option<String> {
    let mut names = vec![format!("get{}", component)];
    if is_boolean {
        if has_is_prefix(component) {
            names.push(decapitalize(component));
        } else {
            names.push(format!("is{}", component));
        }
    }
    methods
        .iter()
        .find(|m| {
            names.contains(&m.name)
                && m.params.is_empty()
                && m.returns.as_deref().is_some_and(|r| same_type(r, field_ty))
        })
        .map(|m| m.name.clone())
}

/// Wire-level metadata of a field, shared by both access strategies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldMeta {
    /// The single key written for the field.
    pub wire_name: String,
    /// Keys accepted on read in addition to `wire_name`.
    pub alternates: Vec<String>,
    pub not_null: bool,
    pub adapter: Option<AdapterOverride>,
}

impl FieldMeta {
    /// An explicit key annotation wins over a serialized-name annotation, and
    /// empty values fall back to the field name.
    pub fn of(field: &FieldDecl) -> Self {
        let from_key = field.key.as_deref().filter(|k| !k.is_empty());
        let from_serialized = field
            .serialized_name
            .as_ref()
            .map(|sn| sn.value.as_str())
            .filter(|v| !v.is_empty());
        let wire_name = from_key
            .or(from_serialized)
            .unwrap_or(&field.name)
            .to_string();
        let alternates = field
            .serialized_name
            .as_ref()
            .map(|sn| {
                sn.alternate
                    .iter()
                    .filter(|alt| **alt != wire_name)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        FieldMeta {
            wire_name,
            alternates,
            not_null: field.not_null,
            adapter: field.adapter.clone(),
        }
    }

    /// Canonical key followed by the alternates.
    pub fn read_names(&self) -> Vec<String> {
        std::iter::once(self.wire_name.clone())
            .chain(self.alternates.iter().cloned())
            .collect()
    }
}
