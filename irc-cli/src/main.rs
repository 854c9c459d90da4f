//! IRC metadata CLI
//!
//! Runs the metadata API and checks local metadata documents against the
//! IRC27/IRC30 schemas.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use irc_api::{ApiConfig, ApiServer, AppState};
use irc_core::constants::SHUTDOWN_TIMEOUT_SECONDS;
use irc_schema::{SchemaValidator, Violation};

/// Schema-validating metadata cache for IRC27 NFTs and IRC30 native tokens
#[derive(Parser)]
#[command(name = "inx-irc-metadata")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the API server (default)
    Serve(ServeArgs),

    /// Validate a local metadata document
    Check {
        /// Metadata standard to check against
        #[arg(short, long, value_enum)]
        standard: Standard,
        /// Schema location overriding the configured one
        #[arg(long)]
        schema: Option<String>,
        /// Metadata document (JSON)
        file: PathBuf,
    },
}

/// Overrides applied on top of the environment configuration.
#[derive(clap::Args, Default)]
struct ServeArgs {
    /// Address to listen on
    #[arg(short, long, env = "IRC_BIND_ADDRESS")]
    bind_address: Option<String>,
    /// Address announced to clients
    #[arg(long, env = "IRC_ADVERTISE_ADDRESS")]
    advertise_address: Option<String>,
    /// Cached outcomes per metadata standard
    #[arg(long, env = "IRC_METADATA_CACHE_SIZE")]
    cache_size: Option<usize>,
    /// Node REST API URL
    #[arg(long, env = "IRC_NODE_URL")]
    node_url: Option<String>,
    /// Log every request at INFO
    #[arg(long, env = "IRC_DEBUG_REQUEST_LOGGER")]
    debug_request_logger: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Standard {
    Irc27,
    Irc30,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve(ServeArgs::default())) {
        Commands::Serve(args) => {
            let config = apply_overrides(ApiConfig::from_env()?, args);
            init_logging(cli.verbose, config.debug_request_logger, cli.json_logs);
            cmd_serve(config).await.map(|_| ExitCode::SUCCESS)
        }
        Commands::Check {
            standard,
            schema,
            file,
        } => {
            init_logging(cli.verbose, false, cli.json_logs);
            cmd_check(standard, schema, &file).await
        }
    }
}

/// Default filter directives. HTTP request events only pass when the
/// request logger raises them to INFO.
fn log_filter(verbose: bool, debug_request_logger: bool) -> String {
    let mut directives = String::from(if verbose {
        "irc=debug,info"
    } else {
        "irc=info,warn"
    });
    if debug_request_logger {
        directives.push_str(",tower_http=info");
    }
    directives
}

fn init_logging(verbose: bool, debug_request_logger: bool, json: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_filter(verbose, debug_request_logger)));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Run API server
async fn cmd_serve(config: ApiConfig) -> Result<()> {
    config.validate()?;

    println!("{}", "Starting IRC metadata API...".cyan().bold());
    println!("   {} {}", "Node:".dimmed(), config.node_url);
    println!("   {} {}", "Advertised as:".dimmed(), config.advertised_address());

    let state = AppState::bootstrap(&config)
        .await
        .context("Failed to prepare metadata validators")?;

    let server = ApiServer::new(state).with_debug_request_logger(config.debug_request_logger);
    let running = server
        .start(config.bind_address.as_str())
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;

    println!(
        "   {} http://{}/health",
        "Health check:".green(),
        running.local_addr()
    );
    println!("\n   Press Ctrl+C to stop.\n");

    shutdown_signal().await;
    info!("Shutdown signal received");

    running
        .stop(Duration::from_secs(SHUTDOWN_TIMEOUT_SECONDS))
        .await
        .context("Server terminated with an error")?;

    Ok(())
}

fn apply_overrides(mut config: ApiConfig, args: ServeArgs) -> ApiConfig {
    if let Some(bind_address) = args.bind_address {
        config.bind_address = bind_address;
    }
    if let Some(advertise_address) = args.advertise_address {
        config.advertise_address = Some(advertise_address);
    }
    if let Some(cache_size) = args.cache_size {
        config.metadata_cache_size = cache_size;
    }
    if let Some(node_url) = args.node_url {
        config.node_url = node_url;
    }
    config.debug_request_logger |= args.debug_request_logger;
    config
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Check a metadata document against its schema
async fn cmd_check(standard: Standard, schema: Option<String>, file: &Path) -> Result<ExitCode> {
    let location = match schema {
        Some(location) => location,
        None => {
            let config = ApiConfig::from_env()?;
            match standard {
                Standard::Irc27 => config.irc27_schema,
                Standard::Irc30 => config.irc30_schema,
            }
        }
    };

    let validator = SchemaValidator::compile(&location)
        .await
        .with_context(|| format!("Failed to compile schema {location}"))?;

    let violations = check_document(&validator, file)?;
    if violations.is_empty() {
        println!("{} {}", "Valid:".green().bold(), file.display());
        return Ok(ExitCode::SUCCESS);
    }

    println!("{} {}", "Invalid:".red().bold(), file.display());
    for violation in &violations {
        println!("   {} {}", "-".red(), violation);
    }
    Ok(ExitCode::FAILURE)
}

/// Every violation of the document at `path`; a file that is not JSON at
/// all yields a single root violation.
fn check_document(validator: &SchemaValidator, path: &Path) -> Result<Vec<Violation>> {
    let raw = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

    let document: serde_json::Value = match serde_json::from_slice(&raw) {
        Ok(document) => document,
        Err(e) => {
            return Ok(vec![Violation {
                instance_path: String::new(),
                message: format!("not valid JSON: {e}"),
            }])
        }
    };

    Ok(match validator.validate(&document) {
        Ok(()) => Vec::new(),
        Err(violation) => violation.violations,
    })
}
