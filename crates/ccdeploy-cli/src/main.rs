//! ccdeploy - chaincode deployment coordinator
//!
//! Usage:
//!   ccdeploy serve                                   # Run the HTTP coordinator
//!   ccdeploy deploy <channel> <chaincode>            # Deploy across all organizations
//!   ccdeploy install <chaincode>                     # Install on the local peer
//!   ccdeploy approve <channel> <cc> <seq> <ccid>     # Approve for the local organization
//!   ccdeploy installed <channel> <chaincode>         # Print the installed package id

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ccdeploy_core::api::{AppState, create_router, serve};
use ccdeploy_core::prelude::*;

#[derive(Parser)]
#[command(name = "ccdeploy")]
#[command(about = "Multi-organization chaincode deployment coordinator", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ~/.config/ccdeploy/ccdeploy.toml)
    #[arg(long, short, global = true, env = "CCDEPLOY_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP coordinator
    Serve {
        /// Listen address, overrides server.listen_addr
        #[arg(long)]
        listen: Option<SocketAddr>,
    },

    /// Deploy a chaincode on every organization of a channel
    Deploy { channel: String, chaincode: String },

    /// Install a chaincode on the local peer
    Install { chaincode: String },

    /// Approve a chaincode definition for the local organization
    Approve {
        channel: String,
        chaincode: String,
        sequence: u64,
        /// Package id to approve
        package_id: String,
    },

    /// Print the package id installed for a channel
    Installed { channel: String, chaincode: String },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    init_tracing(&cli);

    let loader = ConfigLoader::new(cli.config.as_deref());
    match loader.path() {
        Some(path) => tracing::debug!(path = %path.display(), "Loading configuration"),
        None => tracing::debug!("No config file location, using defaults and environment"),
    }
    let config = loader.load().context("Failed to load configuration")?;
    let coordinator = Coordinator::from_config(config)?;

    match cli.command {
        Commands::Serve { listen } => {
            let addr = listen.unwrap_or(coordinator.config().server.listen_addr);
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("Failed to bind {}", addr))?;

            let router = create_router(AppState::new(Arc::new(coordinator)));
            serve(listener, router).await.context("Server error")?;
        }
        Commands::Deploy { channel, chaincode } => {
            let report = coordinator.deploy(&channel, &chaincode).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Install { chaincode } => {
            let package_id = coordinator.install(&chaincode).await?;
            println!("{}", package_id.unwrap_or_default());
        }
        Commands::Approve {
            channel,
            chaincode,
            sequence,
            package_id,
        } => {
            let request = ApproveRequest {
                channel,
                chaincode,
                sequence,
                package_id,
            };
            match coordinator.approve(&request).await? {
                ApproveOutcome::Approved => println!("approved"),
                ApproveOutcome::AlreadyApproved => println!("already approved"),
            }
        }
        Commands::Installed { channel, chaincode } => {
            match coordinator.installed(&channel, &chaincode).await? {
                Some(package_id) => println!("{}", package_id),
                None => {
                    eprintln!("{} is not installed for channel {}", chaincode, channel);
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn init_tracing(cli: &Cli) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| cli.log_level.clone().into());

    // stdout carries command results
    if cli.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
