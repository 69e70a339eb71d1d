//! Compile-time JSON codec generation from declared data types.
//!
//! `codecgen` reads a declaration model (classes, enums, fields, accessors and
//! their annotations), decides which types take part in serialization, resolves
//! every generic instantiation they reach, and emits one streaming read/write
//! codec per concrete type plus a registry that dispatches on type keys.
//!
//! # Architecture
//!
//! ```text
//! Declarations        Pipeline                          Output
//! ────────────     ─────────────────────────────     ──────────────────
//! .json / .yaml ─> discovery ─> resolve ─> synth ─┬─> Rust sources (output::rust)
//!                   (Universe)    (fields)  (IR)  ├─> mod.rs + lookup
//! manifests ──────────────────────────> registry ─┴─> codecgen.types
//!                                                  └─> replay (tests, inspection)
//! ```
//!
//! # Example
//!
//! ```
//! use codecgen::{generate, DeclarationSet, InputFormat, KnownTypes, Options};
//! use codecgen::replay::{Object, Value};
//!
//! let set = DeclarationSet::parse(
//!     r#"{"declarations": [{"name": "a.Person", "marker": {}, "fields": [
//!         {"name": "name", "type": "String"},
//!         {"name": "age", "type": "int"}
//!     ]}]}"#,
//!     InputFormat::Json,
//! )
//! .unwrap();
//! let generation = generate(&set, &Options::default(), KnownTypes::default()).unwrap();
//!
//! let person = Value::from(Object::new("a.Person").with("name", "test").with("age", 2));
//! let json = generation.replay().to_json("a.Person", Some(&person)).unwrap();
//! assert_eq!(json, r#"{"name":"test","age":2}"#);
//! ```
//!
//! # Feature Flags
//!
//! - `parallel` (default) - build and render codec units on the rayon pool

pub mod accessor;
pub mod classify;
pub mod config;
pub mod decl;
pub mod diagnostics;
pub mod discovery;
pub mod error;
pub mod ir;
pub mod manifest;
pub mod merge;
pub mod output;
pub mod registry;
pub mod replay;
pub mod resolve;
pub mod synth;
pub mod types;

pub use accessor::Notation;
pub use config::CodecgenConfig;
pub use decl::{DeclarationSet, InputFormat};
pub use diagnostics::{Diagnostic, Diagnostics, Violation};
pub use error::{Error, Result};
pub use ir::CodecUnit;
pub use manifest::Manifest;
pub use output::{Emitted, RenderContext, Writer, RUST_WRITER};
pub use registry::{AdapterRegistry, KnownTypes};
pub use types::{ConcreteType, TypeKey, TypeRef};

use config::CodegenConfig;
use discovery::{DiscoveryContext, Universe};
use replay::Replay;
use std::path::Path;
use synth::{synthesize, SynthOptions};
use tracing::info;

/// Knobs of one generation pass.
#[derive(Debug, Clone, Copy)]
pub struct Options {
    pub notation: Notation,
    pub serialize_nulls: bool,
    pub parallel: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self::from_config(&CodegenConfig::default())
    }
}

impl Options {
    pub fn from_config(config: &CodegenConfig) -> Self {
        Self {
            notation: config.notation(),
            serialize_nulls: config.serialize_nulls(),
            parallel: config.parallel(),
        }
    }
}

/// Everything a pass produced before anything is written.
#[derive(Debug, Clone)]
pub struct Generation {
    pub universe: Universe,
    /// Codec units sorted by key.
    pub units: Vec<CodecUnit>,
    pub registry: AdapterRegistry,
    /// Manifests the pass ran against, after pruning.
    pub known: KnownTypes,
}

impl Generation {
    pub fn unit(&self, descriptor: &str) -> Option<&CodecUnit> {
        let key = TypeKey::new(descriptor);
        self.units.iter().find(|u| u.key == key)
    }

    /// Interpreter over this pass's units.
    pub fn replay(&self) -> Replay<'_> {
        Replay::new(&self.units)
    }

    /// Render the units with `writer` and write them into `dir`.
    pub fn emit(
        &self,
        writer: &dyn Writer,
        ctx: &RenderContext,
        dir: &Path,
        manifest_file: &str,
        parallel: bool,
    ) -> Result<Emitted> {
        output::emit(
            writer,
            &self.units,
            &self.registry,
            ctx,
            dir,
            manifest_file,
            parallel,
        )
    }
}

/// Run discovery, resolution and synthesis over `set`.
///
/// Schema violations abort the pass with [`Error::Schema`] carrying every
/// diagnostic found.
pub fn generate(set: &DeclarationSet, options: &Options, mut known: KnownTypes) -> Result<Generation> {
    let universe = DiscoveryContext::new(set, options.notation).discover()?;
    known.prune(&universe);
    let synth_options = SynthOptions {
        serialize_nulls: options.serialize_nulls,
        parallel: options.parallel,
    };
    let units = synthesize(&universe, &known, synth_options)?;
    let registry = AdapterRegistry::build(&units, &known);
    info!(
        declarations = set.declarations.len(),
        members = universe.members().count(),
        units = units.len(),
        registered = registry.len(),
        "generation pass complete"
    );
    Ok(Generation {
        universe,
        units,
        registry,
        known,
    })
}

/// A full pass from a declaration file to `out_dir/<module>`.
///
/// The module's previous manifest in that directory is carried into the new one.
pub fn run(input: &Path, out_dir: &Path, config: &CodecgenConfig) -> Result<(Generation, Emitted)> {
    let set = DeclarationSet::load(input)?;
    let dir = out_dir.join(config.codegen.module());
    let prior = dir.join(config.manifest.file());
    let known = KnownTypes::load(Some(&prior), config.manifest.external())?;
    let generation = generate(&set, &Options::from_config(&config.codegen), known)?;
    let emitted = generation.emit(
        &RUST_WRITER,
        &config.render_context(),
        &dir,
        config.manifest.file(),
        config.codegen.parallel(),
    )?;
    Ok((generation, emitted))
}
