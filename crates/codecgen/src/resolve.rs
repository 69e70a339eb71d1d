//! Type resolution: the ordered, fully concrete field list of an instantiation.
//!
//! Supertype fields are collected first, with the parent's formal parameters
//! substituted by the arguments written at the inheritance site, so a field
//! declared as `V items` in `Base<K, V>` becomes `ArrayList<Video> items` in
//! `Page extends Base<Paging, ArrayList<Video>>`. Any variable left over once the
//! chain is walked is an error.

use crate::accessor::{FieldAccessor, FieldMeta};
use crate::decl::FieldOption;
use crate::diagnostics::{Diagnostics, Violation};
use crate::discovery::{FieldInfo, TypeInfo, Universe};
use crate::types::{ConcreteType, TypeRef};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, trace};

/// A field ready for codec synthesis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedField {
    /// Qualified name of the declaring type.
    pub owner: String,
    pub name: String,
    pub ty: ConcreteType,
    pub accessor: FieldAccessor,
    pub meta: FieldMeta,
}

struct Collected<'u> {
    owner: &'u TypeInfo,
    field: &'u FieldInfo,
    ty: TypeRef,
}

/// Resolve the fields of `name` instantiated with `args`, ancestors first.
///
/// Types that are not declared resolve to no fields.
pub fn resolve_fields(
    universe: &Universe,
    name: &str,
    args: &[ConcreteType],
) -> Result<Vec<ResolvedField>, Diagnostics> {
    let Some(info) = universe.get(name) else {
        return Ok(Vec::new());
    };
    let args: Vec<TypeRef> = args.iter().map(|a| a.as_type().clone()).collect();
    let instance = if args.is_empty() {
        TypeRef::named(name)
    } else {
        TypeRef::generic(name, args.clone())
    };
    let mut diags = Diagnostics::new();
    if args.len() != info.params().len() {
        diags.push(
            instance.to_string(),
            Violation::ArityMismatch {
                ty: name.to_string(),
                expected: info.params().len(),
                found: args.len(),
            },
        );
        return Err(diags);
    }

    let collected = collect_chain(universe, info, &args, &mut diags);
    let mut fields = Vec::with_capacity(collected.len());
    for c in collected {
        let Some((accessor, meta)) = check_field(universe, &c, &mut diags) else {
            continue;
        };
        match ConcreteType::try_from(c.ty.clone()) {
            Ok(ty) => fields.push(ResolvedField {
                owner: c.owner.name().to_string(),
                name: c.field.decl.name.clone(),
                ty,
                accessor,
                meta,
            }),
            Err(var) => diags.push(
                format!("{}.{}", instance, c.field.decl.name),
                Violation::UnresolvedTypeVariable {
                    var,
                    ty: c.ty.to_string(),
                },
            ),
        }
    }
    check_wire_names(
        fields.iter().map(|f| (element(&f.owner, &f.name), &f.meta)),
        &mut diags,
    );
    diags.into_result()?;
    debug!(instance = %instance, fields = fields.len(), "resolved fields");
    Ok(fields)
}

/// Validate a generic or non-codec member without instantiating it.
///
/// Runs every field rule except variable resolution, which only makes sense
/// for a concrete instantiation.
pub fn check_template(universe: &Universe, name: &str) -> Diagnostics {
    let mut diags = Diagnostics::new();
    let Some(info) = universe.get(name) else {
        return diags;
    };
    let params: Vec<TypeRef> = info.params().iter().cloned().map(TypeRef::Var).collect();
    let collected = collect_chain(universe, info, &params, &mut diags);
    let mut checked = Vec::new();
    for c in &collected {
        if let Some((_, meta)) = check_field(universe, c, &mut diags) {
            checked.push((element(c.owner.name(), &c.field.decl.name), meta));
        }
    }
    check_wire_names(checked.iter().map(|(e, m)| (e.clone(), m)), &mut diags);
    diags
}

fn element(owner: &str, field: &str) -> String {
    format!("{}.{}", owner, field)
}

fn collect_chain<'u>(
    universe: &'u Universe,
    info: &'u TypeInfo,
    args: &[TypeRef],
    diags: &mut Diagnostics,
) -> Vec<Collected<'u>> {
    let policy = info.policy.unwrap_or_default();
    let mut out = Vec::new();
    let mut chain = Vec::new();
    collect(universe, info, args, policy, &mut chain, &mut out, diags);
    out
}

fn collect<'u>(
    universe: &'u Universe,
    info: &'u TypeInfo,
    args: &[TypeRef],
    policy: FieldOption,
    chain: &mut Vec<&'u str>,
    out: &mut Vec<Collected<'u>>,
    diags: &mut Diagnostics,
) {
    if chain.contains(&info.name()) {
        diags.push(
            info.name(),
            Violation::InheritanceCycle {
                ty: info.name().to_string(),
            },
        );
        return;
    }
    chain.push(info.name());

    if let Some(superclass) = &info.superclass {
        let bound = superclass.substitute(info.params(), args);
        let parent = match &bound {
            TypeRef::Named { name, args } => universe.get(name).map(|p| (p, args)),
            _ => None,
        };
        if let Some((parent_info, parent_args)) = parent {
            if !parent_args.is_empty() && parent_args.len() != parent_info.params().len() {
                diags.push(
                    info.name(),
                    Violation::ArityMismatch {
                        ty: parent_info.name().to_string(),
                        expected: parent_info.params().len(),
                        found: parent_args.len(),
                    },
                );
            } else {
                trace!(child = info.name(), parent = %bound, "inheriting fields");
                // A marked parent keeps its own policy; an unmarked one serializes
                // under the child's.
                let parent_policy = parent_info.policy.unwrap_or(policy);
                collect(
                    universe,
                    parent_info,
                    parent_args,
                    parent_policy,
                    chain,
                    out,
                    diags,
                );
            }
        }
    }

    chain.pop();
    for field in &info.fields {
        if policy.includes(&field.decl) {
            out.push(Collected {
                owner: info,
                field,
                ty: field.ty.substitute(info.params(), args),
            });
        }
    }
}

fn check_field(
    universe: &Universe,
    c: &Collected<'_>,
    diags: &mut Diagnostics,
) -> Option<(FieldAccessor, FieldMeta)> {
    let element = element(c.owner.name(), &c.field.decl.name);
    if c.field.decl.is_final {
        diags.push(element, Violation::FinalField);
        return None;
    }
    let accessor = FieldAccessor::select(
        &c.field.decl,
        &c.field.ty,
        &c.owner.decl.methods,
        universe.notation(),
    )
    .map_err(|v| diags.push(element, v))
    .ok()?;
    Some((accessor, FieldMeta::of(&c.field.decl)))
}

/// Every read name (canonical and alternate) must route to exactly one field.
fn check_wire_names<'m>(
    fields: impl Iterator<Item = (String, &'m FieldMeta)>,
    diags: &mut Diagnostics,
) {
    let mut seen: HashMap<String, String> = HashMap::new();
    for (element, meta) in fields {
        for name in meta.read_names() {
            match seen.get(&name) {
                Some(other) if *other != element => diags.push(
                    element.clone(),
                    Violation::DuplicateWireName {
                        name,
                        other: other.clone(),
                    },
                ),
                Some(_) => {}
                None => {
                    seen.insert(name, element.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::Notation;
    use crate::decl::{DeclarationSet, InputFormat};
    use crate::discovery::DiscoveryContext;

    fn universe(json: &str) -> Universe {
        let set = DeclarationSet::parse(json, InputFormat::Json).unwrap();
        DiscoveryContext::new(&set, Notation::Standard)
            .discover()
            .unwrap()
    }

    fn concrete(text: &str) -> ConcreteType {
        ConcreteType::try_from(TypeRef::parse(text).unwrap()).unwrap()
    }

    fn summary(fields: &[ResolvedField]) -> Vec<String> {
        fields
            .iter()
            .map(|f| format!("{}: {}", f.name, f.ty))
            .collect()
    }

    const PAGING: &str = r#"{"declarations": [
        {"name": "a.SuperList", "abstract": true, "type_params": ["K", "V"],
         "fields": [{"name": "paging", "type": "K", "key": ""}, {"name": "items", "type": "V"}]},
        {"name": "a.DataList", "abstract": true, "type_params": ["T"],
         "superclass": "a.SuperList<a.Paging, java.util.ArrayList<T>>",
         "fields": [{"name": "count", "type": "int", "key": ""}]},
        {"name": "a.VideoList", "superclass": "a.DataList<a.Video>", "marker": {},
         "fields": [{"name": "title", "type": "String"}]},
        {"name": "a.Paging", "marker": {}},
        {"name": "a.Video", "marker": {}}
    ]}"#;

    #[test]
    fn test_inherited_variables_resolve_through_chain() {
        let u = universe(PAGING);
        let fields = resolve_fields(&u, "a.VideoList", &[]).unwrap();
        assert_eq!(
            summary(&fields),
            [
                "paging: a.Paging",
                "items: java.util.ArrayList<a.Video>",
                "count: int",
                "title: String",
            ]
        );
        assert_eq!(fields[0].owner, "a.SuperList");
    }

    #[test]
    fn test_generic_member_instantiated_per_usage() {
        let u = universe(
            r#"{"declarations": [
                {"name": "a.Box", "type_params": ["T"], "marker": {},
                 "fields": [{"name": "value", "type": "T"}, {"name": "all", "type": "List<T>"}]}
            ]}"#,
        );
        let fields = resolve_fields(&u, "a.Box", &[concrete("a.Video")]).unwrap();
        assert_eq!(summary(&fields), ["value: a.Video", "all: List<a.Video>"]);
    }

    #[test]
    fn test_raw_inheritance_leaves_variable_unresolved() {
        let set = DeclarationSet::parse(
            r#"{"declarations": [
                {"name": "a.Base", "type_params": ["T"], "fields": [{"name": "value", "type": "T"}]},
                {"name": "a.Raw", "superclass": "a.Base", "marker": {}}
            ]}"#,
            InputFormat::Json,
        )
        .unwrap();
        let err = DiscoveryContext::new(&set, Notation::Standard)
            .discover()
            .unwrap_err();
        let diagnostic = err.iter().next().unwrap();
        assert_eq!(diagnostic.element, "a.Raw.value");
        assert!(matches!(
            diagnostic.violation,
            Violation::UnresolvedTypeVariable { ref var, .. } if var == "T"
        ));
    }

    #[test]
    fn test_unmarked_parent_uses_child_policy() {
        let u = universe(
            r#"{"declarations": [
                {"name": "a.Parent", "fields": [
                    {"name": "tagged", "type": "String", "serialized_name": {"value": "t"}},
                    {"name": "plain", "type": "String"}
                ]},
                {"name": "a.Child", "superclass": "a.Parent",
                 "marker": {"fields": "serialized_name"},
                 "fields": [{"name": "own", "type": "String", "serialized_name": {"value": "o"}}]}
            ]}"#,
        );
        let fields = resolve_fields(&u, "a.Child", &[]).unwrap();
        assert_eq!(summary(&fields), ["tagged: String", "own: String"]);
    }

    #[test]
    fn test_marked_parent_keeps_own_policy() {
        let u = universe(
            r#"{"declarations": [
                {"name": "a.Parent", "marker": {"fields": "none"},
                 "fields": [{"name": "hidden", "type": "String"}]},
                {"name": "a.Child", "superclass": "a.Parent", "marker": {},
                 "fields": [{"name": "shown", "type": "String"}]}
            ]}"#,
        );
        let fields = resolve_fields(&u, "a.Child", &[]).unwrap();
        assert_eq!(summary(&fields), ["shown: String"]);
    }

    #[test]
    fn test_duplicate_wire_name_across_hierarchy() {
        let set = DeclarationSet::parse(
            r#"{"declarations": [
                {"name": "a.Parent", "fields": [{"name": "id", "type": "int"}]},
                {"name": "a.Child", "superclass": "a.Parent", "marker": {},
                 "fields": [{"name": "ident", "type": "int", "serialized_name": {"value": "id"}}]}
            ]}"#,
            InputFormat::Json,
        )
        .unwrap();
        let err = DiscoveryContext::new(&set, Notation::Standard)
            .discover()
            .unwrap_err();
        let diagnostic = err.iter().next().unwrap();
        assert_eq!(diagnostic.element, "a.Child.ident");
        assert_eq!(
            diagnostic.violation,
            Violation::DuplicateWireName {
                name: "id".into(),
                other: "a.Parent.id".into()
            }
        );
    }

    #[test]
    fn test_wrong_argument_count() {
        let u = universe(r#"{"declarations": [{"name": "a.Box", "type_params": ["T"], "marker": {}}]}"#);
        let err = resolve_fields(&u, "a.Box", &[]).unwrap_err();
        assert!(matches!(
            err.iter().next().unwrap().violation,
            Violation::ArityMismatch { expected: 1, found: 0, .. }
        ));
    }
}
