//! Generate command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use hodos_generator::Generator;
use tracing::info;

use super::{load_config, load_snapshot, OutputFormat};

/// Arguments for the generate command.
#[derive(Args)]
pub struct GenerateArgs {
    /// Policy group snapshot file (YAML or JSON)
    pub snapshot: PathBuf,

    /// Policy to generate
    #[arg(short, long)]
    pub policy: String,

    /// Configuration file (YAML or JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Skip probing the local package repository for component versions
    #[arg(long)]
    pub no_probe: bool,

    /// Output format (text, json)
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

/// Runs the generate command.
pub fn run(args: &GenerateArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if args.no_probe {
        config.generator.probe = None;
    }

    let snapshot = load_snapshot(&args.snapshot)?;
    snapshot.check_consistency()?;
    let policy = snapshot.policy(&args.policy).with_context(|| {
        format!(
            "Policy '{}' not found in {}",
            args.policy,
            args.snapshot.display()
        )
    })?;
    let definition = snapshot
        .definition(&policy.name)
        .with_context(|| format!("Policy '{}' has no definition", policy.name))?;

    info!(policy = %policy.name, "Generating policy");
    let generator = Generator::new(&config.generator).context("Failed to initialize generator")?;
    let generated = generator.generate(&snapshot, policy, definition)?;

    match args.format {
        OutputFormat::Text => {
            print!("{}", generated.definition);
            println!();
            println!("Dependencies:");
            for dependency in &generated.dependencies {
                println!("  {dependency}");
            }
            for issue in &generated.issues {
                eprintln!("{issue}");
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&generated)?),
    }

    Ok(())
}
