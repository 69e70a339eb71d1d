//! `codecgen` - generate streaming JSON codecs from declared data types.

mod commands;

use anyhow::Context;
use clap::{Parser, Subcommand};
use codecgen::CodecgenConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "codecgen",
    version,
    about = "Generate streaming JSON codecs from declared data types"
)]
struct Cli {
    /// Log at debug level (overrides RUST_LOG)
    #[arg(long, global = true)]
    debug: bool,

    /// Config file applied over the global and project config
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate codec sources, the module index and the known-types manifest
    Generate(commands::generate::GenerateArgs),
    /// Check declarations and report every schema violation
    Check(commands::inspect::CheckArgs),
    /// Print the synthesized codec IR as JSON
    Ir(commands::inspect::IrArgs),
    /// Print the JSON Schema of the declaration format
    Schema,
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(explicit: Option<&std::path::Path>) -> anyhow::Result<CodecgenConfig> {
    let root = std::env::current_dir().context("cannot determine the working directory")?;
    let config = CodecgenConfig::load(&root, explicit)?;
    tracing::debug!(root = %root.display(), module = config.codegen.module(), "loaded config");
    Ok(config)
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    // `schema` runs without loading any config.
    let config = || load_config(cli.config.as_deref());
    match cli.command {
        Command::Generate(args) => commands::generate::run(args, config()?),
        Command::Check(args) => commands::inspect::check(args, config()?),
        Command::Ir(args) => commands::inspect::ir(args, config()?),
        Command::Schema => commands::inspect::schema(),
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.debug);
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {:#}", e);
            std::process::exit(1);
        }
    }
}
