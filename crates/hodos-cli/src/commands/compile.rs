//! Compile command implementation.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use hodos_builder::{
    BuildInfo, BuildServer, DesignRepository, FilesystemDeployer, InMemoryRepository,
};
use hodos_core::{BuildStatus, Tag, TagKey};
use hodos_generator::Generator;
use serde::Serialize;
use tracing::info;

use super::{load_config, load_snapshot, OutputFormat};

/// Arguments for the compile command.
#[derive(Args)]
pub struct CompileArgs {
    /// Policy group snapshot file (YAML or JSON)
    pub snapshot: PathBuf,

    /// Organization owning the group
    #[arg(long)]
    pub org: String,

    /// Tag to create for this build
    #[arg(short, long)]
    pub tag: String,

    /// Root directory for deployed output
    #[arg(short, long, env = "HODOS_DEPLOY_ROOT")]
    pub output: Option<PathBuf>,

    /// Configuration file (YAML or JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Number of build workers
    #[arg(long, env = "HODOS_POOL_SIZE")]
    pub pool_size: Option<usize>,

    /// Output format (text, json)
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

/// Final report of a compile run.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompileReport {
    key: TagKey,
    build: BuildInfo,
    tag: Tag,
    output: PathBuf,
}

/// Runs the compile command.
///
/// Exits with a failure code when the build fails.
pub async fn run(args: CompileArgs) -> Result<ExitCode> {
    let format = args.format;
    let report = compile(args).await?;

    match format {
        OutputFormat::Text => print_text_report(&report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    Ok(if report.tag.status == BuildStatus::Failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

async fn compile(args: CompileArgs) -> Result<CompileReport> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(pool_size) = args.pool_size {
        config.builder.scheduler.pool_size = pool_size;
    }
    let root = args
        .output
        .or(config.deploy_root)
        .unwrap_or_else(FilesystemDeployer::default_root);

    let snapshot = load_snapshot(&args.snapshot)?;
    let group = snapshot.group.name.clone();
    let key = TagKey::new(&args.org, &group, &args.tag);
    info!(snapshot = %args.snapshot.display(), %key, "Compiling policy group");

    let repository = Arc::new(InMemoryRepository::new());
    repository.put_group(&args.org, snapshot);
    repository.create_tag(
        &args.org,
        &group,
        Tag::new(&args.tag)
            .with_description(format!("compiled from {}", args.snapshot.display())),
    )?;

    let generator = Generator::new(&config.generator).context("Failed to initialize generator")?;
    let deployer = Arc::new(FilesystemDeployer::new(&root));
    let server = BuildServer::start(&config.builder, generator, repository.clone(), deployer)?;

    let build_id = server.submit(&key).await?;
    let build = server.wait(&build_id).await;
    server.shutdown().await;
    let build = build?;

    let tag = repository
        .get_tag(&key)
        .await?
        .with_context(|| format!("Tag {key} disappeared during the build"))?;

    Ok(CompileReport {
        output: root.join(&key.org).join(&key.group).join(&key.tag),
        key,
        build,
        tag,
    })
}

fn print_text_report(report: &CompileReport) {
    let icon = match report.tag.status {
        BuildStatus::Successful => "✓",
        BuildStatus::Failed => "✗",
        _ => "?",
    };

    println!("{icon} {} [{}]", report.key, report.tag.status);
    println!("  Build: {}", report.build.id);
    if let (Some(started), Some(ended)) = (report.build.started_at, report.build.ended_at) {
        println!("  Duration: {}ms", (ended - started).num_milliseconds());
    }
    if report.tag.status == BuildStatus::Successful {
        println!("  Output: {}", report.output.display());
    }

    if !report.tag.issues.is_empty() {
        println!();
        println!("Issues:");
        for issue in &report.tag.issues {
            println!("  {issue}");
        }
    }
}
