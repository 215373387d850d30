//! Hodos CLI - compiles integration policy groups offline.

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hodos=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Compile(args) => commands::compile::run(args).await,
        Commands::Generate(args) => commands::generate::run(&args).map(|()| ExitCode::SUCCESS),
        Commands::Characteristics(args) => {
            commands::characteristics::run(&args).map(|()| ExitCode::SUCCESS)
        }
        Commands::Status(args) => commands::status::run(&args).await.map(|()| ExitCode::SUCCESS),
        Commands::Version => {
            println!("hodos {}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }
    }
}
