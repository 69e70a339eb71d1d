//! The adapter registry: type key to codec dispatch.
//!
//! Built from the units of the current pass plus the keys carried over from the
//! previous pass's manifest. Keys owned by external modules are recorded so the
//! persisted manifest stays complete, but they are never emitted or looked up.

use crate::discovery::Universe;
use crate::error::Result;
use crate::ir::CodecUnit;
use crate::manifest::Manifest;
use crate::types::TypeKey;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Keys known from outside the current pass.
#[derive(Debug, Clone, Default)]
pub struct KnownTypes {
    /// Keys this module emitted in an earlier pass.
    pub prior: Manifest,
    /// Keys emitted by other modules.
    pub external: Manifest,
}

impl KnownTypes {
    pub fn new(prior: Manifest, external: Manifest) -> Self {
        Self { prior, external }
    }

    /// Read the prior manifest (if any) and every external manifest.
    pub fn load(prior: Option<&Path>, external: &[PathBuf]) -> Result<Self> {
        let prior = match prior {
            Some(path) => Manifest::read(path)?.unwrap_or_default(),
            None => Manifest::new(),
        };
        let mut merged = Manifest::new();
        for path in external {
            match Manifest::read(path)? {
                Some(manifest) => merged.union(&manifest),
                None => debug!(path = %path.display(), "external manifest not found"),
            }
        }
        Ok(Self::new(prior, merged))
    }

    pub fn is_external(&self, key: &TypeKey) -> bool {
        self.external.contains(key)
    }

    pub fn is_carried(&self, key: &TypeKey) -> bool {
        self.prior.contains(key)
    }

    /// Drop carried keys whose type no longer gets a codec here, and keys that
    /// an external module now owns.
    pub fn prune(&mut self, universe: &Universe) {
        let external = &self.external;
        self.prior.retain(|key| {
            let codec_bearing = key
                .base_name()
                .and_then(|name| universe.get(&name))
                .is_some_and(|info| info.has_codec());
            if !codec_bearing {
                debug!(key = %key, "dropping stale manifest entry");
            }
            codec_bearing && !external.contains(key)
        });
    }
}

/// Where a registry entry's codec comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Entry {
    /// Emitted in this pass under `ident`.
    Generated { ident: String },
    /// Emitted by an earlier pass and kept for the manifest.
    Carried,
    /// Owned by another module. Persisted so later modules skip it, never emitted.
    External,
}

/// Ordered key to codec table. Keys are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AdapterRegistry {
    entries: BTreeMap<TypeKey, Entry>,
}

impl AdapterRegistry {
    pub fn build(units: &[CodecUnit], known: &KnownTypes) -> Self {
        let mut entries = BTreeMap::new();
        for unit in units {
            entries.insert(
                unit.key.clone(),
                Entry::Generated {
                    ident: unit.ident.clone(),
                },
            );
        }
        for key in known.prior.iter() {
            if !known.is_external(key) {
                entries.entry(key.clone()).or_insert(Entry::Carried);
            }
        }
        for key in known.external.iter() {
            entries.entry(key.clone()).or_insert(Entry::External);
        }
        Self { entries }
    }

    /// Find the entry for a descriptor; spacing in the descriptor is normalized.
    pub fn lookup(&self, descriptor: &str) -> Option<&Entry> {
        self.entries.get(&TypeKey::new(descriptor))
    }

    /// Identifier of the codec generated for `key` in this pass.
    pub fn ident(&self, key: &TypeKey) -> Option<&str> {
        match self.entries.get(key) {
            Some(Entry::Generated { ident }) => Some(ident),
            _ => None,
        }
    }

    /// Entries emitted in this pass, in key order.
    pub fn generated(&self) -> impl Iterator<Item = (&TypeKey, &str)> {
        self.entries.iter().filter_map(|(key, entry)| match entry {
            Entry::Generated { ident } => Some((key, ident.as_str())),
            Entry::Carried | Entry::External => None,
        })
    }

    pub fn keys(&self) -> impl Iterator<Item = &TypeKey> {
        self.entries.keys()
    }

    /// The manifest to persist: every key with a codec in this module or in
    /// one it builds on.
    pub fn manifest(&self) -> Manifest {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::Notation;
    use crate::decl::{DeclarationSet, InputFormat};
    use crate::discovery::DiscoveryContext;
    use crate::synth::{synthesize, SynthOptions};

    fn manifest(keys: &[&str]) -> Manifest {
        keys.iter().copied().map(TypeKey::new).collect()
    }

    fn pass(known: &mut KnownTypes) -> AdapterRegistry {
        let set = DeclarationSet::parse(
            r#"{"declarations": [
                {"name": "a.User", "marker": {}},
                {"name": "a.Page", "type_params": ["T"], "marker": {},
                 "fields": [{"name": "items", "type": "List<T>"}]},
                {"name": "a.Feed", "marker": {}, "fields": [{"name": "page", "type": "a.Page<a.User>"}]}
            ]}"#,
            InputFormat::Json,
        )
        .unwrap();
        let universe = DiscoveryContext::new(&set, Notation::Standard)
            .discover()
            .unwrap();
        known.prune(&universe);
        let units = synthesize(&universe, known, SynthOptions::default()).unwrap();
        AdapterRegistry::build(&units, known)
    }

    #[test]
    fn test_prune_drops_stale_and_external_keys() {
        let mut known = KnownTypes::new(
            manifest(&["a.Gone", "a.User", "b.Other<a.User>"]),
            manifest(&["a.User"]),
        );
        let registry = pass(&mut known);
        assert!(known.prior.is_empty());
        let keys: Vec<_> = registry.generated().map(|(key, _)| key.as_str()).collect();
        assert_eq!(keys, ["a.Feed", "a.Page<a.User>"]);
        assert_eq!(registry.lookup("a.User"), Some(&Entry::External));
    }

    #[test]
    fn test_prune_drops_keys_that_lost_their_codec() {
        let set = DeclarationSet::parse(
            r#"{"declarations": [
                {"name": "a.Kept", "marker": {}},
                {"name": "a.Unmarked"},
                {"name": "a.Base", "abstract": true, "marker": {}}
            ]}"#,
            InputFormat::Json,
        )
        .unwrap();
        let universe = DiscoveryContext::new(&set, Notation::Standard)
            .discover()
            .unwrap();
        let mut known = KnownTypes::new(
            manifest(&["a.Base", "a.Kept", "a.Unmarked"]),
            Manifest::new(),
        );
        known.prune(&universe);
        let kept: Vec<_> = known.prior.iter().map(TypeKey::as_str).collect();
        assert_eq!(kept, ["a.Kept"]);
    }

    #[test]
    fn test_manifest_carries_external_keys() {
        let mut known = KnownTypes::new(Manifest::new(), manifest(&["a.User", "z.Elsewhere"]));
        let registry = pass(&mut known);
        let persisted: Vec<_> = registry
            .manifest()
            .iter()
            .map(|key| key.as_str().to_string())
            .collect();
        assert_eq!(
            persisted,
            ["a.Feed", "a.Page<a.User>", "a.User", "z.Elsewhere"]
        );
        assert_eq!(registry.ident(&TypeKey::new("a.User")), None);
        assert_eq!(registry.generated().count(), 2);
    }

    #[test]
    fn test_manifest_merge_is_idempotent() {
        let mut first = KnownTypes::default();
        let written = pass(&mut first).manifest();

        let mut second = KnownTypes::new(written.clone(), Manifest::new());
        let again = pass(&mut second).manifest();
        assert_eq!(written, again);
        assert_eq!(again.len(), 3);
    }

    #[test]
    fn test_lookup_normalizes_descriptors() {
        let registry = pass(&mut KnownTypes::default());
        assert_eq!(
            registry.lookup("a.Page< a.User >"),
            Some(&Entry::Generated {
                ident: "PageUserCodec".into()
            })
        );
        assert_eq!(registry.lookup("a.Missing"), None);
        assert_eq!(registry.ident(&TypeKey::new("a.User")), Some("UserCodec"));
    }

    #[test]
    fn test_carried_instantiation_is_regenerated() {
        let mut known = KnownTypes::new(manifest(&["a.Page<String>"]), Manifest::new());
        let registry = pass(&mut known);
        assert_eq!(
            registry.lookup("a.Page<String>"),
            Some(&Entry::Generated {
                ident: "PageStringCodec".into()
            })
        );
        assert_eq!(registry.generated().count(), 4);
    }
}
