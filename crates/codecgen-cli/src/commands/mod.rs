//! CLI command implementations - one module per command group.

pub mod generate;
pub mod inspect;

use clap::ValueEnum;
use codecgen::{CodecgenConfig, Notation};
use std::path::PathBuf;

/// Accessor naming convention, as a flag value.
#[derive(Clone, Copy, ValueEnum)]
pub enum NotationArg {
    /// `name` -> `getName` / `setName`
    Standard,
    /// `mName` -> `getName` / `setName`
    Hungarian,
}

impl From<NotationArg> for Notation {
    fn from(arg: NotationArg) -> Self {
        match arg {
            NotationArg::Standard => Notation::Standard,
            NotationArg::Hungarian => Notation::Hungarian,
        }
    }
}

/// Flags shared by every command that runs the pipeline.
#[derive(clap::Args)]
pub struct PipelineArgs {
    /// Declaration file (.json, .yaml or .yml)
    pub input: PathBuf,

    /// Accessor naming convention for private fields
    #[arg(long, value_enum)]
    pub notation: Option<NotationArg>,

    /// Manifest of another module whose codecs are referenced, not generated
    #[arg(long = "external", value_name = "MANIFEST")]
    pub external: Vec<PathBuf>,
}

impl PipelineArgs {
    /// These flags as the topmost config layer.
    pub fn overrides(&self) -> CodecgenConfig {
        let mut layer = CodecgenConfig::default();
        layer.codegen.notation = self.notation.map(Notation::from);
        if !self.external.is_empty() {
            layer.manifest.external = Some(self.external.clone());
        }
        layer
    }
}
