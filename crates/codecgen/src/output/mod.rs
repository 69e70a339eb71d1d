//! Output writers - render codec IR as source code.

pub mod files;
pub mod rust;

pub use files::{emit, write_atomic, Emitted};
pub use rust::{RustWriter, RUST_WRITER};

use crate::ir::CodecUnit;
use crate::registry::AdapterRegistry;

/// Names the rendered code refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderContext {
    /// Crate providing readers, writers and the known adapters.
    pub runtime_crate: String,
    /// Path under which declared model types live.
    pub model_root: String,
    /// Name of the generated module, used in headers.
    pub module: String,
}

impl Default for RenderContext {
    fn default() -> Self {
        Self {
            runtime_crate: "codec_runtime".into(),
            model_root: "crate".into(),
            module: "codecs".into(),
        }
    }
}

/// A writer emits codec units as source code in a target language.
pub trait Writer: Send + Sync {
    /// Language identifier (e.g., "rust").
    fn language(&self) -> &'static str;

    /// File extension for output (e.g., "rs").
    fn extension(&self) -> &'static str;

    /// File name, without extension, of a unit's source file.
    fn file_stem(&self, unit: &CodecUnit) -> String;

    /// File name of the module index.
    fn index_file(&self) -> &'static str;

    /// Whether `contents` is a unit file this writer produced.
    fn is_generated_unit(&self, contents: &str) -> bool;

    /// Render one codec unit.
    fn write_unit(&self, unit: &CodecUnit, registry: &AdapterRegistry, ctx: &RenderContext)
    -> String;

    /// Render the module index: unit declarations and the registry lookup.
    fn write_index(
        &self,
        units: &[CodecUnit],
        registry: &AdapterRegistry,
        ctx: &RenderContext,
    ) -> String;
}
