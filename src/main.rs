//! OpenAPI Mock Server - CLI Entry Point

use anyhow::Result;
use clap::Parser;
use openapi_mock_server::loader::{load_document, load_into, LogObserver};
use openapi_mock_server::{MockEngine, Settings};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "openapi-mock-server",
    about = "Mock HTTP server for OpenAPI/Swagger documents - responds with documented examples",
    version
)]
struct Args {
    /// OpenAPI or Swagger document (.yaml, .yml or .json)
    document: Option<PathBuf>,

    /// Path to configuration file
    #[arg(short, long, default_value = "mock-server.yaml")]
    config: PathBuf,

    /// Interface to listen on (overrides the configuration file)
    #[arg(long)]
    host: Option<IpAddr>,

    /// Listener port (overrides the configuration file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: Level,

    /// Print default configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Validate the document and exit
    #[arg(long)]
    validate: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if args.print_config {
        print!("{}", serde_yaml::to_string(&Settings::default())?);
        return Ok(());
    }

    let Some(document_path) = args.document.clone() else {
        anyhow::bail!("No document given; pass the path of an OpenAPI or Swagger file");
    };

    if args.validate {
        let document = load_document(&document_path)?;
        println!(
            "Document is valid (version {}, {} paths)",
            document.version().unwrap_or_default(),
            document.path_count()
        );
        return Ok(());
    }

    let settings = load_settings(&args)?;

    // Requests and reloads share one cooperative event loop.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(settings, document_path))
}

fn load_settings(args: &Args) -> Result<Settings> {
    let mut settings = if args.config.exists() {
        info!(path = ?args.config, "Loading configuration");
        Settings::from_file(&args.config)?
    } else {
        Settings::default()
    };

    if let Some(host) = args.host {
        settings.host = host;
    }
    if let Some(port) = args.port {
        settings.port = port;
    }
    settings.validate()?;
    Ok(settings)
}

async fn run(settings: Settings, document_path: PathBuf) -> Result<()> {
    let mut engine = MockEngine::new(settings);
    let observer = LogObserver;

    load_into(&mut engine, &document_path, &observer).await?;

    wait_for_signals(&mut engine, &document_path, &observer).await?;

    engine.stop().await;
    Ok(())
}

/// Reload on SIGHUP until Ctrl-C.
#[cfg(unix)]
async fn wait_for_signals(
    engine: &mut MockEngine,
    document_path: &Path,
    observer: &LogObserver,
) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup())?;
    info!("Send SIGHUP to reload the document, Ctrl-C to stop");

    loop {
        tokio::select! {
            _ = hangup.recv() => {
                info!(path = %document_path.display(), "Reloading document");
                // Failures are reported by the observer; keep serving.
                if let Err(e) = load_into(engine, document_path, observer).await {
                    debug!(error = %e, "Reload failed");
                }
            }
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("Shutting down");
                return Ok(());
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signals(
    _engine: &mut MockEngine,
    _document_path: &Path,
    _observer: &LogObserver,
) -> Result<()> {
    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    Ok(())
}
