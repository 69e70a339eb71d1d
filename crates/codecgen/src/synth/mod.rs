//! Codec synthesis.
//!
//! Planning walks the reachable concrete types from the universe's roots with a
//! worklist and a visited set, so self- and mutually-referential graphs terminate
//! and each distinct instantiation is planned once. Building the per-unit IR is
//! independent per key and runs on the rayon pool when enabled.

mod enums;
mod read;
mod write;

use crate::classify::{is_string_like_key, shape, PrimitiveKind, Shape};
use crate::decl::simple_name;
use crate::diagnostics::{Diagnostics, Violation};
use crate::discovery::{sanitize, Universe};
use crate::ir::{
    AdapterSlot, AdapterSpec, CodecBody, CodecUnit, FieldId, FieldSlot, FieldValue, ObjectCodec,
    SlotId,
};
use crate::registry::KnownTypes;
use crate::resolve::{resolve_fields, ResolvedField};
use crate::types::{ConcreteType, TypeKey, TypeRef};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use tracing::{debug, info, trace};

/// Knobs that change the synthesized procedures.
#[derive(Debug, Clone, Copy, Default)]
pub struct SynthOptions {
    /// Write absent fields as explicit nulls instead of omitting them.
    pub serialize_nulls: bool,
    /// Build units on the rayon pool.
    pub parallel: bool,
}

/// Synthesize one codec unit per reachable concrete type, sorted by key.
pub fn synthesize(
    universe: &Universe,
    known: &KnownTypes,
    options: SynthOptions,
) -> Result<Vec<CodecUnit>, Diagnostics> {
    let mut planner = Planner::new(universe, known);
    for root in universe.codec_roots() {
        planner.enqueue_root(root);
    }
    for key in known.prior.iter() {
        planner.enqueue_carried(key);
    }
    planner.run();
    let Planner { plans, diags, .. } = planner;
    diags.into_result()?;

    let idents = assign_idents(universe, plans.values().map(|p| &p.target));
    let jobs: Vec<(&Plan, &str)> = plans
        .values()
        .map(|plan| {
            let ident = idents
                .get(&plan.target.key())
                .map(String::as_str)
                .unwrap_or_default();
            (plan, ident)
        })
        .collect();
    let build = |(plan, ident): &(&Plan, &str)| build_unit(universe, plan, ident, options);

    #[cfg(feature = "parallel")]
    let units: Vec<CodecUnit> = if options.parallel {
        jobs.par_iter().map(build).collect()
    } else {
        jobs.iter().map(build).collect()
    };
    #[cfg(not(feature = "parallel"))]
    let units: Vec<CodecUnit> = jobs.iter().map(build).collect();

    info!(units = units.len(), "synthesized codecs");
    Ok(units)
}

/// What was learned about one concrete type during planning.
struct Plan {
    target: ConcreteType,
    kind: PlanKind,
}

enum PlanKind {
    Enum,
    Object(Vec<PlannedField>),
}

struct PlannedField {
    field: ResolvedField,
    value: PlannedValue,
}

enum PlannedValue {
    Literal(PrimitiveKind),
    Adapter(AdapterSpec),
}

struct Planner<'u> {
    universe: &'u Universe,
    known: &'u KnownTypes,
    queue: VecDeque<ConcreteType>,
    seen: HashSet<TypeKey>,
    plans: BTreeMap<TypeKey, Plan>,
    diags: Diagnostics,
}

impl<'u> Planner<'u> {
    fn new(universe: &'u Universe, known: &'u KnownTypes) -> Self {
        Self {
            universe,
            known,
            queue: VecDeque::new(),
            seen: HashSet::new(),
            plans: BTreeMap::new(),
            diags: Diagnostics::new(),
        }
    }

    fn enqueue(&mut self, ty: ConcreteType) {
        if self.seen.insert(ty.key()) {
            trace!(key = %ty, "queued");
            self.queue.push_back(ty);
        }
    }

    fn enqueue_root(&mut self, root: ConcreteType) {
        if self.known.is_external(&root.key()) {
            debug!(key = %root, "owned by an external module");
            return;
        }
        self.enqueue(root);
    }

    /// Regenerate a carried key when its declaration still gets a codec.
    fn enqueue_carried(&mut self, key: &TypeKey) {
        if self.known.is_external(key) {
            return;
        }
        let Ok(ty) = TypeRef::parse(key.as_str()) else {
            return;
        };
        let Ok(ty) = ConcreteType::try_from(ty) else {
            return;
        };
        let matches_declaration = ty
            .base_name()
            .and_then(|name| self.universe.get(name))
            .is_some_and(|info| info.has_codec() && info.params().len() == ty.args().len());
        if matches_declaration {
            self.enqueue(ty);
        }
    }

    fn run(&mut self) {
        while let Some(ty) = self.queue.pop_front() {
            if let Some(plan) = self.plan(&ty) {
                self.plans.insert(ty.key(), plan);
            }
        }
    }

    fn plan(&mut self, ty: &ConcreteType) -> Option<Plan> {
        let universe = self.universe;
        let info = universe.get(ty.base_name()?)?;
        if info.is_enum() {
            return Some(Plan {
                target: ty.clone(),
                kind: PlanKind::Enum,
            });
        }
        let fields = match resolve_fields(universe, info.name(), &ty.args()) {
            Ok(fields) => fields,
            Err(found) => {
                self.diags.extend(found);
                return None;
            }
        };
        let mut planned = Vec::with_capacity(fields.len());
        for field in fields {
            let element = format!("{}.{}", field.owner, field.name);
            let value = if let Some(custom) = &field.meta.adapter {
                PlannedValue::Adapter(AdapterSpec::Custom {
                    path: custom.path.clone(),
                    adapter: custom.kind,
                    null_safe: custom.null_safe,
                })
            } else if let Ok(Shape::Primitive(kind)) = shape(&field.ty) {
                PlannedValue::Literal(kind)
            } else {
                match self.spec_for(&field.ty, &element) {
                    Some(spec) => PlannedValue::Adapter(spec),
                    None => continue,
                }
            };
            planned.push(PlannedField { field, value });
        }
        Some(Plan {
            target: ty.clone(),
            kind: PlanKind::Object(planned),
        })
    }

    fn unsupported(&mut self, element: &str, ty: &ConcreteType, reason: String) {
        self.diags.push(
            element,
            Violation::UnsupportedShape {
                ty: ty.to_string(),
                reason,
            },
        );
    }

    /// The adapter for a nested value of type `ty`, queueing generated targets.
    fn spec_for(&mut self, ty: &ConcreteType, element: &str) -> Option<AdapterSpec> {
        let shape = match shape(ty) {
            Ok(shape) => shape,
            Err(reason) => {
                self.unsupported(element, ty, reason);
                return None;
            }
        };
        Some(match shape {
            Shape::Primitive(primitive) => AdapterSpec::Primitive { primitive },
            Shape::Known(known) => AdapterSpec::Known { known },
            Shape::List(collection, elem) => AdapterSpec::List {
                collection,
                element: Box::new(self.spec_for(&elem, element)?),
            },
            Shape::Array(elem) => AdapterSpec::Array {
                element: Box::new(self.spec_for(&elem, element)?),
            },
            Shape::Map(map, key, value) => {
                if !self.is_valid_map_key(&key) {
                    self.unsupported(
                        element,
                        ty,
                        format!("map key `{}` must be a string, primitive or enum", key),
                    );
                    return None;
                }
                AdapterSpec::Map {
                    map,
                    key: Box::new(self.spec_for(&key, element)?),
                    value: Box::new(self.spec_for(&value, element)?),
                }
            }
            Shape::Declared(declared) => self.declared(declared, element)?,
        })
    }

    fn is_valid_map_key(&self, key: &ConcreteType) -> bool {
        match shape(key) {
            Ok(Shape::Declared(declared)) => declared
                .base_name()
                .and_then(|name| self.universe.get(name))
                .is_some_and(|info| info.is_enum() && info.has_codec()),
            Ok(other) => is_string_like_key(&other),
            Err(_) => false,
        }
    }

    fn declared(&mut self, ty: ConcreteType, element: &str) -> Option<AdapterSpec> {
        let key = ty.key();
        if self.known.is_external(&key) {
            return Some(AdapterSpec::External { key });
        }
        let info = ty.base_name().and_then(|name| self.universe.get(name));
        match info {
            Some(info) if info.has_codec() => {
                let found = ty.args().len();
                if found != info.params().len() {
                    self.diags.push(
                        element,
                        Violation::ArityMismatch {
                            ty: info.name().to_string(),
                            expected: info.params().len(),
                            found,
                        },
                    );
                    return None;
                }
                self.enqueue(ty);
                Some(AdapterSpec::Generated { key })
            }
            _ if self.known.is_carried(&key) => Some(AdapterSpec::External { key }),
            _ => Some(AdapterSpec::Dynamic { key }),
        }
    }
}

/// Unique codec identifiers, assigned in key order so they are stable.
fn assign_idents<'a>(
    universe: &Universe,
    targets: impl Iterator<Item = &'a ConcreteType>,
) -> HashMap<TypeKey, String> {
    let mut used: HashSet<String> = HashSet::new();
    let mut idents = HashMap::new();
    for target in targets {
        let stem = format!("{}Codec", ident_stem(universe, target.as_type()));
        let mut ident = stem.clone();
        let mut n = 2;
        while !used.insert(ident.clone()) {
            ident = format!("{}{}", stem, n);
            n += 1;
        }
        idents.insert(target.key(), ident);
    }
    idents
}

fn ident_stem(universe: &Universe, ty: &TypeRef) -> String {
    match ty {
        TypeRef::Named { name, args } => {
            let base = universe
                .get(name)
                .map(|info| info.ident.clone())
                .unwrap_or_else(|| sanitize(simple_name(name)));
            args.iter()
                .fold(base, |acc, arg| acc + &ident_stem(universe, arg))
        }
        TypeRef::Array(elem) => ident_stem(universe, elem) + "Array",
        TypeRef::Var(var) => sanitize(var),
    }
}

fn build_unit(universe: &Universe, plan: &Plan, ident: &str, options: SynthOptions) -> CodecUnit {
    let body = match &plan.kind {
        PlanKind::Enum => {
            let constants = plan
                .target
                .base_name()
                .and_then(|name| universe.get(name))
                .map(|info| info.decl.constants.as_slice())
                .unwrap_or_default();
            CodecBody::Enum(enums::enum_codec(constants))
        }
        PlanKind::Object(planned) => CodecBody::Object(object_codec(planned, options)),
    };
    CodecUnit {
        key: plan.target.key(),
        ident: ident.to_string(),
        target: plan.target.clone(),
        body,
    }
}

fn object_codec(planned: &[PlannedField], options: SynthOptions) -> ObjectCodec {
    let mut adapters: Vec<AdapterSlot> = Vec::new();
    let mut by_type: HashMap<TypeKey, SlotId> = HashMap::new();
    let mut fields = Vec::with_capacity(planned.len());

    for PlannedField { field, value } in planned {
        let value = match value {
            PlannedValue::Literal(primitive) => FieldValue::Literal {
                primitive: *primitive,
            },
            PlannedValue::Adapter(spec) => {
                let custom = matches!(spec, AdapterSpec::Custom { .. });
                let shared = (!custom).then(|| by_type.get(&field.ty.key()).copied()).flatten();
                let slot = match shared {
                    Some(slot) => slot,
                    None => {
                        let slot = SlotId(adapters.len());
                        adapters.push(AdapterSlot {
                            id: slot,
                            ty: field.ty.clone(),
                            spec: spec.clone(),
                        });
                        if !custom {
                            by_type.insert(field.ty.key(), slot);
                        }
                        slot
                    }
                };
                FieldValue::Adapter { slot }
            }
        };
        fields.push(FieldSlot {
            name: field.name.clone(),
            owner: field.owner.clone(),
            ty: field.ty.clone(),
            accessor: field.accessor.clone(),
            wire_name: field.meta.wire_name.clone(),
            alternates: field.meta.alternates.clone(),
            not_null: field.meta.not_null,
            value,
        });
    }

    let write = write::write_block(&fields, options.serialize_nulls);
    let read = read::read_block(&fields);
    ObjectCodec {
        fields,
        adapters,
        write,
        read,
    }
}

/// Field ids in declaration order.
fn field_ids(fields: &[FieldSlot]) -> impl Iterator<Item = (FieldId, &FieldSlot)> {
    fields.iter().enumerate().map(|(i, f)| (FieldId(i), f))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::Notation;
    use crate::decl::{DeclarationSet, InputFormat};
    use crate::discovery::DiscoveryContext;
    use crate::manifest::Manifest;

    fn universe(json: &str) -> Universe {
        let set = DeclarationSet::parse(json, InputFormat::Json).unwrap();
        DiscoveryContext::new(&set, Notation::Standard)
            .discover()
            .unwrap()
    }

    fn keys(units: &[CodecUnit]) -> Vec<String> {
        units.iter().map(|u| u.key.to_string()).collect()
    }

    fn object(unit: &CodecUnit) -> &ObjectCodec {
        match &unit.body {
            CodecBody::Object(codec) => codec,
            CodecBody::Enum(_) => panic!("expected object codec"),
        }
    }

    #[test]
    fn test_instantiations_are_planned_once() {
        let u = universe(
            r#"{"declarations": [
                {"name": "a.Data", "type_params": ["T"], "marker": {},
                 "fields": [{"name": "value", "type": "T"}]},
                {"name": "a.Video", "marker": {}},
                {"name": "a.Feed", "marker": {}, "fields": [
                    {"name": "first", "type": "a.Data<a.Video>"},
                    {"name": "second", "type": "a.Data<a.Video>"},
                    {"name": "more", "type": "List<a.Data<a.Video>>"}
                ]}
            ]}"#,
        );
        let units = synthesize(&u, &KnownTypes::default(), SynthOptions::default()).unwrap();
        assert_eq!(keys(&units), ["a.Data<a.Video>", "a.Feed", "a.Video"]);

        let feed = object(&units[1]);
        assert_eq!(feed.adapters.len(), 2);
        assert_eq!(feed.fields[0].value, feed.fields[1].value);
        assert_eq!(units[0].ident, "DataVideoCodec");
    }

    #[test]
    fn test_cycles_terminate() {
        let u = universe(
            r#"{"declarations": [
                {"name": "a.Node", "marker": {}, "fields": [
                    {"name": "next", "type": "a.Node"},
                    {"name": "children", "type": "List<a.Node>"},
                    {"name": "owner", "type": "a.Tree"}
                ]},
                {"name": "a.Tree", "marker": {}, "fields": [{"name": "root", "type": "a.Node"}]}
            ]}"#,
        );
        let units = synthesize(&u, &KnownTypes::default(), SynthOptions::default()).unwrap();
        assert_eq!(keys(&units), ["a.Node", "a.Tree"]);
    }

    #[test]
    fn test_strategies_for_unmarked_and_external_types() {
        let u = universe(
            r#"{"declarations": [
                {"name": "a.Loose"},
                {"name": "a.Shared", "marker": {}},
                {"name": "a.Holder", "marker": {}, "fields": [
                    {"name": "loose", "type": "a.Loose"},
                    {"name": "shared", "type": "a.Shared"},
                    {"name": "unknown", "type": "org.lib.Thing"}
                ]}
            ]}"#,
        );
        let known = KnownTypes::new(
            Manifest::new(),
            [TypeKey::new("a.Shared")].into_iter().collect(),
        );
        let units = synthesize(&u, &known, SynthOptions::default()).unwrap();
        assert_eq!(keys(&units), ["a.Holder"]);
        let specs: Vec<_> = object(&units[0])
            .adapters
            .iter()
            .map(|a| &a.spec)
            .collect();
        assert!(matches!(specs[0], AdapterSpec::Dynamic { .. }));
        assert!(matches!(specs[1], AdapterSpec::External { .. }));
        assert!(matches!(specs[2], AdapterSpec::Dynamic { .. }));
    }

    #[test]
    fn test_invalid_map_key_is_reported() {
        let u = universe(
            r#"{"declarations": [
                {"name": "a.Key", "marker": {}},
                {"name": "a.M", "marker": {}, "fields": [
                    {"name": "bad", "type": "Map<a.Key, String>"},
                    {"name": "raw", "type": "List"}
                ]}
            ]}"#,
        );
        let err = synthesize(&u, &KnownTypes::default(), SynthOptions::default()).unwrap_err();
        let elements: Vec<_> = err.iter().map(|d| d.element.as_str()).collect();
        assert_eq!(elements, ["a.M.bad", "a.M.raw"]);
    }

    #[test]
    fn test_custom_adapter_gets_own_slot() {
        let u = universe(
            r#"{"declarations": [{"name": "a.T", "marker": {}, "fields": [
                {"name": "plain", "type": "String"},
                {"name": "upper", "type": "String", "adapter": {"path": "crate::Upper"}},
                {"name": "other", "type": "String"}
            ]}]}"#,
        );
        let units = synthesize(&u, &KnownTypes::default(), SynthOptions::default()).unwrap();
        let codec = object(&units[0]);
        assert_eq!(codec.adapters.len(), 2);
        assert_eq!(codec.fields[0].value, codec.fields[2].value);
        assert_ne!(codec.fields[0].value, codec.fields[1].value);
    }

    #[test]
    fn test_ident_collisions_get_suffixes() {
        let u = universe(
            r#"{"declarations": [
                {"name": "a.User", "marker": {}},
                {"name": "b.User", "marker": {}}
            ]}"#,
        );
        let units = synthesize(&u, &KnownTypes::default(), SynthOptions::default()).unwrap();
        let idents: Vec<_> = units.iter().map(|u| u.ident.as_str()).collect();
        assert_eq!(idents, ["UserCodec", "UserCodec2"]);
    }
}
