//! Commands that run the pipeline without writing anything.

use super::PipelineArgs;
use codecgen::merge::Merge;
use codecgen::{
    generate, CodecgenConfig, DeclarationSet, Error, Generation, KnownTypes, Options,
};

/// Check command arguments
#[derive(clap::Args)]
pub struct CheckArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

/// IR command arguments
#[derive(clap::Args)]
pub struct IrArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,

    /// Only print the unit for this type key
    #[arg(long)]
    pub key: Option<String>,
}

fn run_pipeline(args: &PipelineArgs, config: CodecgenConfig) -> codecgen::Result<Generation> {
    let config = config.merge(args.overrides());
    let set = DeclarationSet::load(&args.input)?;
    let known = KnownTypes::load(None, config.manifest.external())?;
    generate(&set, &Options::from_config(&config.codegen), known)
}

/// Run the check command
pub fn check(args: CheckArgs, config: CodecgenConfig) -> anyhow::Result<i32> {
    match run_pipeline(&args.pipeline, config) {
        Ok(generation) => {
            println!(
                "ok: {} types in the universe, {} codecs",
                generation.universe.members().count(),
                generation.units.len()
            );
            Ok(0)
        }
        Err(Error::Schema(diagnostics)) => {
            eprintln!("{}", diagnostics);
            eprintln!("{} violation(s)", diagnostics.len());
            Ok(1)
        }
        Err(e) => Err(e.into()),
    }
}

/// Run the ir command
pub fn ir(args: IrArgs, config: CodecgenConfig) -> anyhow::Result<i32> {
    let generation = match run_pipeline(&args.pipeline, config) {
        Ok(generation) => generation,
        Err(Error::Schema(diagnostics)) => {
            eprintln!("{}", diagnostics);
            return Ok(1);
        }
        Err(e) => return Err(e.into()),
    };
    let json = match &args.key {
        Some(key) => match generation.unit(key) {
            Some(unit) => serde_json::to_string_pretty(unit)?,
            None => {
                eprintln!("no codec unit for `{}`", key);
                return Ok(1);
            }
        },
        None => serde_json::to_string_pretty(&generation.units)?,
    };
    println!("{}", json);
    Ok(0)
}

/// Run the schema command
pub fn schema() -> anyhow::Result<i32> {
    let schema = schemars::schema_for!(DeclarationSet);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(0)
}
