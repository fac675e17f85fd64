//! Solo RPC Server - exclusive WebSocket JSON-RPC access to one instrument.
//!
//! Serves the demo instrument to whichever client is granted the resource.

use anyhow::Result;
use clap::Parser;
use solo_core::ServerConfig;
use solo_rpc::{demo, start_server, Credentials, ServerOptions, TlsFiles};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "solo-rpc")]
#[command(about = "WebSocket JSON-RPC server granting one client at a time")]
struct Args {
    /// Port to listen on (0 = auto-assign)
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// PEM certificate chain; enables TLS and the /wss channel
    #[arg(long)]
    cert: Option<PathBuf>,

    /// PEM private key (defaults to the certificate file)
    #[arg(long, requires = "cert")]
    key: Option<PathBuf>,

    /// Upper bound on a single method call, in seconds
    #[arg(long, default_value = "5")]
    call_timeout_secs: f64,

    /// Inactivity allowed before the resource is reclaimed, in seconds
    #[arg(long, default_value = "5")]
    lease_secs: f64,

    /// Lease lapses a connected holder may recover from (unlimited if unset)
    #[arg(long)]
    reacquire_limit: Option<u32>,

    /// Idle time after which a browser session is forgotten, in seconds
    #[arg(long, default_value = "3600")]
    session_ttl_secs: f64,

    /// JSON file mapping each login to its password
    #[arg(long)]
    credentials: Option<PathBuf>,

    /// Accept JSON-RPC batches
    #[arg(long)]
    batch: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

fn seconds(value: f64, flag: &str) -> Result<Duration> {
    Duration::try_from_secs_f64(value).map_err(|e| anyhow::anyhow!("invalid --{flag} {value}: {e}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging; RUST_LOG wins over --debug
    let default_level = if args.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false);
    if args.log_json {
        builder.json().init();
    } else {
        builder.compact().init();
    }

    info!("Starting Solo RPC Server");

    let config = ServerConfig::default()
        .with_call_timeout(seconds(args.call_timeout_secs, "call-timeout-secs")?)
        .with_lease_duration(seconds(args.lease_secs, "lease-secs")?)
        .with_reacquire_limit(args.reacquire_limit)
        .with_batch_support(args.batch);

    let credentials = match &args.credentials {
        Some(path) => {
            let credentials = Credentials::from_file(path)?;
            info!("Loaded {} credential(s) from {}", credentials.len(), path.display());
            credentials
        }
        None => Credentials::default(),
    };

    let mut options = ServerOptions::new(args.host.clone(), args.port, demo::instrument())
        .with_config(config)
        .with_credentials(credentials)
        .with_session_ttl(seconds(args.session_ttl_secs, "session-ttl-secs")?);
    if let Some(cert) = args.cert.clone() {
        let key = args.key.clone().unwrap_or_else(|| cert.clone());
        options = options.with_tls(TlsFiles { cert, key });
    }

    let server = start_server(options).await?;

    // Print port for launchers to read (intentional stdout for IPC)
    println!("SOLO_PORT={}", server.addr.port());

    info!("RPC server running on {}{}", server.addr, server.channel_path);

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, exiting");
    server.shutdown();

    Ok(())
}
