//! Tollgate command-line tool
//!
//! Checks activation codes offline and exercises the entitlement service
//! against several replicas sharing an in-memory store.
//!
//! Usage:
//!   tollgate verify <CODE> [--public-key key.pem]
//!   tollgate simulate <CODE> --replicas 3 [--expires 2030-01-01T00:00:00Z]

use std::path::PathBuf;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tollgate_cli::{load_config, load_validator, simulate};
use tollgate_entitlement::ActivateRequest;
use tracing::{info, Level};
use tracing_subscriber::{filter::LevelFilter, EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "tollgate")]
#[command(about = "Tollgate activation code verifier and replica simulator")]
struct Args {
    /// PEM file with the RSA public key to trust instead of the built-in one
    #[arg(long, global = true)]
    public_key: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate an activation code and print its expiry
    Verify {
        /// The base64 activation code
        code: String,
    },
    /// Activate and deactivate across replicas sharing one store
    Simulate {
        /// The base64 activation code
        code: String,

        /// Number of replicas to start
        #[arg(long, default_value = "3")]
        replicas: usize,

        /// Cap the stored expiry (RFC 3339)
        #[arg(long)]
        expires: Option<DateTime<Utc>>,

        /// JSON file with service configuration
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::from_level(log_level).into())
                .from_env_lossy(),
        )
        .with_target(false)
        .compact()
        .init();

    let validator = load_validator(args.public_key.as_deref())?;

    match args.command {
        Command::Verify { code } => {
            let expires = validator
                .validate(&code)
                .context("Activation code rejected")?;
            println!("valid until {}", expires.to_rfc3339());
        }
        Command::Simulate {
            code,
            replicas,
            expires,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            let mut request = ActivateRequest::new(code);
            if let Some(expires) = expires {
                request = request.with_expires(expires);
            }

            info!(replicas, "starting simulation");
            let report = simulate(validator, request, replicas, config).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
