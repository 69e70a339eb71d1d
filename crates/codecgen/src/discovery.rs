//! Schema discovery: which declared types are in the universe.
//!
//! A type is a member when it carries the marker itself or directly declares a
//! marked field. Nesting and inheritance never pull a type in on their own.
//! Abstract types and interfaces are kept as field contributors but never get a
//! codec.

use crate::accessor::Notation;
use crate::decl::{simple_name, DeclarationSet, FieldDecl, FieldOption, TypeDecl, TypeKind};
use crate::diagnostics::{Diagnostics, Violation};
use crate::resolve;
use crate::types::{ConcreteType, TypeRef};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// A field with its declared type parsed and bound to the owner's parameters.
#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub decl: FieldDecl,
    pub ty: TypeRef,
}

/// A declared type as seen by the rest of the pipeline.
#[derive(Debug, Clone)]
pub struct TypeInfo {
    pub decl: TypeDecl,
    pub superclass: Option<TypeRef>,
    /// Instance fields in declaration order; static and transient ones are gone.
    pub fields: Vec<FieldInfo>,
    /// Field policy for members, `None` for types outside the universe.
    pub policy: Option<FieldOption>,
    /// Identifier stem for generated names (`OuterInner` for nested types).
    pub ident: String,
}

impl TypeInfo {
    pub fn name(&self) -> &str {
        &self.decl.name
    }

    pub fn params(&self) -> &[String] {
        &self.decl.type_params
    }

    pub fn is_member(&self) -> bool {
        self.policy.is_some()
    }

    pub fn is_enum(&self) -> bool {
        self.decl.kind == TypeKind::Enum
    }

    pub fn is_generic(&self) -> bool {
        !self.decl.type_params.is_empty()
    }

    /// Concrete classes and enums may carry a codec; interfaces and abstract
    /// classes only contribute fields.
    pub fn can_have_codec(&self) -> bool {
        self.decl.kind != TypeKind::Interface && !self.decl.is_abstract
    }

    /// Members that get a codec in this pass.
    pub fn has_codec(&self) -> bool {
        self.is_member() && self.can_have_codec()
    }
}

/// Every declared type, indexed by qualified name.
#[derive(Debug, Clone, Default)]
pub struct Universe {
    types: BTreeMap<String, TypeInfo>,
    notation: Notation,
}

impl Universe {
    pub fn get(&self, name: &str) -> Option<&TypeInfo> {
        self.types.get(name)
    }

    pub fn notation(&self) -> Notation {
        self.notation
    }

    /// All declared types, sorted by name.
    pub fn types(&self) -> impl Iterator<Item = &TypeInfo> {
        self.types.values()
    }

    /// Types in the universe, sorted by name.
    pub fn members(&self) -> impl Iterator<Item = &TypeInfo> {
        self.types.values().filter(|t| t.is_member())
    }

    /// Non-generic members that get a codec; the synthesizer starts here.
    pub fn codec_roots(&self) -> impl Iterator<Item = ConcreteType> + '_ {
        self.types
            .values()
            .filter(|t| t.has_codec() && !t.is_generic())
            .filter_map(|t| ConcreteType::try_from(TypeRef::named(t.name())).ok())
    }

    pub fn is_enum(&self, name: &str) -> bool {
        self.get(name).is_some_and(TypeInfo::is_enum)
    }
}

/// Inputs of a discovery run. There is no process-wide state; everything the
/// run needs is held here.
pub struct DiscoveryContext<'a> {
    set: &'a DeclarationSet,
    notation: Notation,
}

impl<'a> DiscoveryContext<'a> {
    pub fn new(set: &'a DeclarationSet, notation: Notation) -> Self {
        Self { set, notation }
    }

    /// Build the universe and validate every member against the schema rules.
    pub fn discover(&self) -> Result<Universe, Diagnostics> {
        let mut diags = Diagnostics::new();
        let mut types = BTreeMap::new();
        for decl in &self.set.declarations {
            if types.contains_key(&decl.name) {
                warn!(name = %decl.name, "duplicate declaration ignored");
                continue;
            }
            let info = self.type_info(decl, &mut diags);
            if info.is_member() {
                debug!(
                    name = %decl.name,
                    policy = ?info.policy,
                    codec = info.can_have_codec(),
                    "discovered member"
                );
            }
            types.insert(decl.name.clone(), info);
        }
        assign_idents(&mut types);

        let universe = Universe {
            types,
            notation: self.notation,
        };
        validate(&universe, &mut diags);
        diags.into_result().map(|()| universe)
    }

    fn type_info(&self, decl: &TypeDecl, diags: &mut Diagnostics) -> TypeInfo {
        let params = &decl.type_params;
        let superclass = decl.superclass.as_deref().and_then(|text| {
            parse_bound(text, params)
                .map_err(|v| diags.push(decl.name.clone(), v))
                .ok()
        });
        let fields = decl
            .fields
            .iter()
            .filter(|f| f.is_instance_data())
            .filter_map(|f| match parse_bound(&f.ty, params) {
                Ok(ty) => Some(FieldInfo {
                    decl: f.clone(),
                    ty,
                }),
                Err(v) => {
                    diags.push(format!("{}.{}", decl.name, f.name), v);
                    None
                }
            })
            .collect::<Vec<_>>();
        let policy = match decl.marker {
            Some(marker) => Some(marker.fields),
            None if fields.iter().any(|f| f.decl.is_marked()) => Some(FieldOption::All),
            None => None,
        };
        TypeInfo {
            decl: decl.clone(),
            superclass,
            fields,
            policy,
            ident: String::new(),
        }
    }
}

fn parse_bound(text: &str, params: &[String]) -> Result<TypeRef, Violation> {
    TypeRef::parse(text)
        .map(|ty| ty.bind_params(params))
        .map_err(|e| Violation::InvalidType {
            input: e.input,
            reason: e.reason,
        })
}

/// Identifier stems: the simple name, prefixed by enclosing types' stems.
fn assign_idents(types: &mut BTreeMap<String, TypeInfo>) {
    let enclosing: HashMap<String, Option<String>> = types
        .iter()
        .map(|(name, info)| (name.clone(), info.decl.enclosing.clone()))
        .collect();
    for (name, info) in types.iter_mut() {
        let mut parts = vec![sanitize(simple_name(name))];
        let mut current = enclosing.get(name).cloned().flatten();
        let mut depth = 0;
        while let Some(outer) = current {
            parts.push(sanitize(simple_name(&outer)));
            current = enclosing.get(&outer).cloned().flatten();
            depth += 1;
            if depth > enclosing.len() {
                break;
            }
        }
        parts.reverse();
        info.ident = parts.concat();
    }
}

pub(crate) fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    let mut chars = cleaned.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => "Type".to_string(),
    }
}

fn validate(universe: &Universe, diags: &mut Diagnostics) {
    for info in universe.members() {
        if info.is_enum() {
            check_enum_names(info, diags);
            continue;
        }
        if info.has_codec() && !info.is_generic() {
            if let Err(found) = resolve::resolve_fields(universe, info.name(), &[]) {
                diags.extend(found);
            }
        } else {
            diags.extend(resolve::check_template(universe, info.name()));
        }
    }
}

fn check_enum_names(info: &TypeInfo, diags: &mut Diagnostics) {
    let mut seen: HashMap<&str, &str> = HashMap::new();
    for constant in &info.decl.constants {
        let names = std::iter::once(constant.wire_name())
            .chain(constant.alternates().iter().map(String::as_str));
        for name in names {
            match seen.get(name) {
                Some(other) if *other != constant.name => diags.push(
                    format!("{}.{}", info.name(), constant.name),
                    Violation::DuplicateWireName {
                        name: name.to_string(),
                        other: format!("{}.{}", info.name(), other),
                    },
                ),
                Some(_) => {}
                None => {
                    seen.insert(name, &constant.name);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::{InputFormat, Marker};

    fn universe(json: &str) -> Result<Universe, Diagnostics> {
        let set = DeclarationSet::parse(json, InputFormat::Json).unwrap();
        DiscoveryContext::new(&set, Notation::Standard).discover()
    }

    #[test]
    fn test_marker_or_marked_field_makes_member() {
        let u = universe(
            r#"{"declarations": [
                {"name": "a.Marked", "marker": {}},
                {"name": "a.KeyOnly", "fields": [{"name": "id", "type": "int", "key": ""}]},
                {"name": "a.NameOnly", "fields": [
                    {"name": "id", "type": "int", "serialized_name": {"value": "ID"}}
                ]},
                {"name": "a.Plain", "fields": [{"name": "id", "type": "int"}]}
            ]}"#,
        )
        .unwrap();
        assert!(u.get("a.Marked").unwrap().is_member());
        assert_eq!(u.get("a.KeyOnly").unwrap().policy, Some(FieldOption::All));
        assert!(!u.get("a.NameOnly").unwrap().is_member());
        assert!(!u.get("a.Plain").unwrap().is_member());
    }

    #[test]
    fn test_nesting_and_inheritance_do_not_imply_membership() {
        let u = universe(
            r#"{"declarations": [
                {"name": "a.Outer", "marker": {}},
                {"name": "a.Outer.Inner", "enclosing": "a.Outer",
                 "fields": [{"name": "x", "type": "int"}]},
                {"name": "a.Outer.Inner.Deep", "enclosing": "a.Outer.Inner", "marker": {}},
                {"name": "a.Child", "superclass": "a.Outer"}
            ]}"#,
        )
        .unwrap();
        assert!(!u.get("a.Outer.Inner").unwrap().is_member());
        assert!(u.get("a.Outer.Inner.Deep").unwrap().is_member());
        assert!(!u.get("a.Child").unwrap().is_member());
        assert_eq!(u.get("a.Outer.Inner.Deep").unwrap().ident, "OuterInnerDeep");
    }

    #[test]
    fn test_abstract_and_interface_are_contributors() {
        let u = universe(
            r#"{"declarations": [
                {"name": "a.Base", "abstract": true, "marker": {}},
                {"name": "a.Shape", "kind": "interface", "marker": {}},
                {"name": "a.Leaf", "superclass": "a.Base", "marker": {}}
            ]}"#,
        )
        .unwrap();
        let roots: Vec<_> = u.codec_roots().map(|t| t.to_string()).collect();
        assert_eq!(roots, ["a.Leaf"]);
    }

    #[test]
    fn test_static_and_transient_fields_are_dropped() {
        let u = universe(
            r#"{"declarations": [{"name": "a.T", "marker": {}, "fields": [
                {"name": "CONST", "type": "int", "static": true, "final": true},
                {"name": "cache", "type": "String", "transient": true},
                {"name": "kept", "type": "String"}
            ]}]}"#,
        )
        .unwrap();
        let fields: Vec<_> = u
            .get("a.T")
            .unwrap()
            .fields
            .iter()
            .map(|f| f.decl.name.as_str())
            .collect();
        assert_eq!(fields, ["kept"]);
    }

    #[test]
    fn test_violations_are_collected_together() {
        let err = universe(
            r#"{"declarations": [
                {"name": "a.A", "marker": {}, "fields": [
                    {"name": "id", "type": "int", "final": true},
                    {"name": "secret", "type": "String", "visibility": "private"},
                    {"name": "bad", "type": "List<"}
                ]}
            ]}"#,
        )
        .unwrap_err();
        let elements: Vec<_> = err.iter().map(|d| d.element.as_str()).collect();
        assert_eq!(elements, ["a.A.bad", "a.A.id", "a.A.secret"]);
    }

    #[test]
    fn test_unmarked_type_fields_are_not_validated() {
        let set = DeclarationSet {
            declarations: vec![TypeDecl {
                name: "a.Loose".into(),
                fields: vec![FieldDecl {
                    name: "x".into(),
                    ty: "int".into(),
                    is_final: true,
                    ..Default::default()
                }],
                ..Default::default()
            }],
        };
        assert!(
            DiscoveryContext::new(&set, Notation::Standard)
                .discover()
                .is_ok()
        );
        let mut marked = set.clone();
        marked.declarations[0].marker = Some(Marker::default());
        assert!(
            DiscoveryContext::new(&marked, Notation::Standard)
                .discover()
                .is_err()
        );
    }

    #[test]
    fn test_duplicate_enum_wire_names() {
        let err = universe(
            r#"{"declarations": [{"name": "a.E", "kind": "enum", "marker": {}, "constants": [
                {"name": "ON", "serialized_name": {"value": "on"}},
                {"name": "OFF", "serialized_name": {"value": "off", "alternate": ["on"]}}
            ]}]}"#,
        )
        .unwrap_err();
        assert_eq!(err.len(), 1);
        assert_eq!(err.iter().next().unwrap().element, "a.E.OFF");
    }
}
