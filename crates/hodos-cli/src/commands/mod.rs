//! CLI commands and argument parsing.

pub mod characteristics;
pub mod compile;
pub mod generate;
pub mod status;

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use hodos_builder::HodosConfig;
use hodos_core::{PolicyGroupSnapshot, Validate};

/// Hodos - compiler for logical integration policies
#[derive(Parser)]
#[command(name = "hodos")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Tag a policy group snapshot, build it and deploy the output
    Compile(compile::CompileArgs),

    /// Print the generated routing configuration for one policy
    Generate(generate::GenerateArgs),

    /// List the supported characteristic types
    Characteristics(characteristics::CharacteristicsArgs),

    /// Show deployed tags of a policy group
    Status(status::StatusArgs),

    /// Print version information
    Version,
}

/// Output format shared by the reporting commands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Loads the configuration file if one was given.
pub fn load_config(path: Option<&Path>) -> Result<HodosConfig> {
    match path {
        Some(path) => HodosConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(HodosConfig::default()),
    }
}

/// Loads a policy group snapshot file and checks it is well-formed.
pub fn load_snapshot(path: &Path) -> Result<PolicyGroupSnapshot> {
    let snapshot = PolicyGroupSnapshot::from_file(path)
        .with_context(|| format!("Failed to load snapshot from {}", path.display()))?;
    if let Err(errors) = snapshot.validate() {
        bail!("Snapshot {} is invalid: {errors}", path.display());
    }
    Ok(snapshot)
}
