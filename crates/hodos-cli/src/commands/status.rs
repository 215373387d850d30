//! Status command implementation.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use hodos_builder::{DeploymentManifest, FilesystemDeployer};
use hodos_core::TagKey;
use tracing::info;

use super::OutputFormat;

/// Arguments for the status command.
#[derive(Args)]
pub struct StatusArgs {
    /// Organization owning the group
    #[arg(long)]
    pub org: String,

    /// Policy group name
    #[arg(short, long)]
    pub group: String,

    /// Root directory of deployed output
    #[arg(long, env = "HODOS_DEPLOY_ROOT")]
    pub deploy_root: Option<PathBuf>,

    /// Output format (text, json)
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Show per-policy details
    #[arg(short, long)]
    pub verbose: bool,
}

/// Runs the status command.
pub async fn run(args: &StatusArgs) -> Result<()> {
    let deployer = FilesystemDeployer::new(
        args.deploy_root
            .clone()
            .unwrap_or_else(FilesystemDeployer::default_root),
    );
    info!(
        org = %args.org,
        group = %args.group,
        root = %deployer.root().display(),
        "Reading deployments"
    );

    let mut manifests = Vec::new();
    for tag in deployer.list_deployed(&args.org, &args.group).await? {
        if let Some(manifest) = deployer
            .read_manifest(&TagKey::new(&args.org, &args.group, tag))
            .await?
        {
            manifests.push(manifest);
        }
    }

    match args.format {
        OutputFormat::Text => print_text_status(args, &manifests),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&manifests)?),
    }
    Ok(())
}

fn print_text_status(args: &StatusArgs, manifests: &[DeploymentManifest]) {
    if manifests.is_empty() {
        println!("No deployments found for {}/{}.", args.org, args.group);
        println!();
        println!("Run 'hodos compile' to build and deploy a tag.");
        return;
    }

    for manifest in manifests {
        println!(
            "✓ {}/{}/{} deployed {}",
            manifest.org,
            manifest.group,
            manifest.tag,
            manifest.deployed_at.to_rfc3339()
        );
        println!("  Build: {}", manifest.build_id);

        if args.verbose {
            for policy in &manifest.policies {
                println!(
                    "    {} sha256:{} ({} dependencies)",
                    policy.name, policy.sha256, policy.dependencies
                );
                for resource in &policy.resources {
                    println!("      resource: {resource}");
                }
            }
        } else {
            println!("  Policies: {}", manifest.policies.len());
        }
        println!();
    }
}
