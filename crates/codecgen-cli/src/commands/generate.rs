//! Generate command - write codec sources and the manifest.

use super::PipelineArgs;
use codecgen::merge::Merge;
use codecgen::{CodecgenConfig, Error};
use std::path::PathBuf;

/// Generate command arguments
#[derive(clap::Args)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,

    /// Output directory; the module directory is created inside it
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,

    /// Write absent fields as explicit nulls instead of omitting them
    #[arg(long)]
    pub serialize_nulls: bool,

    /// Name of the generated module
    #[arg(long)]
    pub module: Option<String>,

    /// Build and render codecs on a single thread
    #[arg(long)]
    pub no_parallel: bool,
}

impl GenerateArgs {
    fn overrides(&self) -> CodecgenConfig {
        let mut layer = self.pipeline.overrides();
        layer.codegen.module = self.module.clone();
        layer.codegen.serialize_nulls = self.serialize_nulls.then_some(true);
        layer.codegen.parallel = self.no_parallel.then_some(false);
        layer
    }
}

/// Run the generate command
pub fn run(args: GenerateArgs, config: CodecgenConfig) -> anyhow::Result<i32> {
    let config = config.merge(args.overrides());
    match codecgen::run(&args.pipeline.input, &args.output, &config) {
        Ok((generation, emitted)) => {
            for path in &emitted.sources {
                println!("{}", path.display());
            }
            println!("{}", emitted.manifest.display());
            for path in &emitted.removed {
                eprintln!("Removed {}", path.display());
            }
            eprintln!(
                "Generated {} codecs ({} registered keys)",
                generation.units.len(),
                generation.registry.len()
            );
            Ok(0)
        }
        Err(Error::Schema(diagnostics)) => {
            eprintln!("{}", diagnostics);
            Ok(1)
        }
        Err(e) => Err(e.into()),
    }
}
