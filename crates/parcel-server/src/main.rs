use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use parcel_config::{init_tracing, ParcelConfig, StorageBackend};
use parcel_server::{serve, AppState};

/// Config file picked up from the working directory when `--config` is absent.
const DEFAULT_CONFIG_FILE: &str = "parcel.toml";

#[derive(Parser)]
#[command(name = "parcel", version, about = "Private Python package index")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server until interrupted
    Serve(ServeArgs),
    /// Load and validate the configuration, then print a summary
    CheckConfig(CheckConfigArgs),
}

#[derive(Args)]
struct ServeArgs {
    /// Path to `parcel.toml` (defaults to ./parcel.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Listen address, overriding the config file and PARCEL_LISTEN
    #[arg(long)]
    listen: Option<SocketAddr>,
}

#[derive(Args)]
struct CheckConfigArgs {
    /// Path to `parcel.toml` (defaults to ./parcel.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            2
        }
    };

    std::process::exit(exit_code);
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Serve(args) => {
            let mut config = load_config(args.config.as_deref())?;
            if let Some(listen) = args.listen {
                config.listen = listen;
            }
            init_tracing(&config.logging);

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("failed to start the tokio runtime")?;
            runtime.block_on(run_server(config))?;
            Ok(0)
        }
        Command::CheckConfig(args) => {
            let config = load_config(args.config.as_deref())?;
            print_summary(&config);
            Ok(0)
        }
    }
}

fn load_config(explicit: Option<&Path>) -> Result<ParcelConfig> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let candidate = PathBuf::from(DEFAULT_CONFIG_FILE);
            candidate.is_file().then_some(candidate)
        }
    };
    let config = ParcelConfig::load(path.as_deref()).with_context(|| match &path {
        Some(path) => format!("invalid configuration in {}", path.display()),
        None => "invalid configuration (no config file, defaults and environment only)".to_owned(),
    })?;
    Ok(config)
}

async fn run_server(config: ParcelConfig) -> Result<()> {
    let state = AppState::from_config(&config).context("failed to open the package store")?;

    let listener = std::net::TcpListener::bind(config.listen)
        .with_context(|| format!("failed to bind {}", config.listen))?;
    listener
        .set_nonblocking(true)
        .context("failed to make the listener non-blocking")?;
    let local_addr = listener.local_addr().context("listener has no local address")?;

    tracing::info!(
        target: "parcel.server",
        addr = %local_addr,
        backend = %config.storage.backend,
        "listening"
    );

    serve(Arc::new(state), listener, async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(target: "parcel.server", error = %err, "failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
        tracing::info!(target: "parcel.server", "shutting down");
    })
    .await
    .context("server error")?;
    Ok(())
}

fn print_summary(config: &ParcelConfig) {
    println!("listen: {}", config.listen);
    println!("realm: {}", config.realm);
    match config.storage.backend {
        StorageBackend::Fs => println!("storage: fs ({})", config.storage.root.display()),
        StorageBackend::Memory => println!("storage: memory"),
    }
    println!("download user: {}", config.auth.download.user);
    println!("upload user: {}", config.auth.upload.user);
    println!("max upload bytes: {}", config.limits.max_upload_bytes);
    println!("log level: {}", config.logging.level);
}
