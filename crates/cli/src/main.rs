mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::{Settings, cmd_expand, cmd_generate, cmd_live};
use output::print_error;

/// ninjagen - generate ninja files containing only what the build uses
#[derive(Parser)]
#[command(name = "ninjagen")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// TOML file of configuration values entities resolve against
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Set a configuration value, overriding --config
  #[arg(long = "set", value_name = "KEY=VALUE", global = true)]
  set: Vec<String>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Generate a ninja file from a manifest
  Generate {
    /// Path to the manifest
    manifest: PathBuf,

    /// Where to write the ninja file
    #[arg(short, long, default_value = "build.ninja")]
    output: PathBuf,

    /// Print the generation report as JSON
    #[arg(long)]
    json: bool,
  },

  /// Show the variables, rules and pools the manifest's builds reach
  Live {
    /// Path to the manifest
    manifest: PathBuf,

    /// Output as JSON
    #[arg(long)]
    json: bool,
  },

  /// Expand a template against the manifest's live variables
  Expand {
    /// Path to the manifest
    manifest: PathBuf,

    /// Template text, e.g. '$cc $cflags'
    template: String,
  },
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let default_filter = if cli.verbose { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let settings = Settings {
    config: cli.config,
    set: cli.set,
  };

  let result = match cli.command {
    Commands::Generate { manifest, output, json } => cmd_generate(&settings, &manifest, &output, json),
    Commands::Live { manifest, json } => cmd_live(&settings, &manifest, json),
    Commands::Expand { manifest, template } => cmd_expand(&settings, &manifest, &template),
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      print_error(&format!("{:#}", e));
      ExitCode::FAILURE
    }
  }
}
