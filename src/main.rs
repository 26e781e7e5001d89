//! PowerMax Provider
//!
//! Serves the provider protocol over HTTP against the configured array
//! backend, or prints the resource schemas and exits.

use clap::Parser;
use prometheus::Registry;
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use powermax_provider::{
    ApiServer, BackendFactory, Error, LoggingConfig, Provider, ProviderConfig, Result,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// PowerMax Provider - declarative reconciliation of PowerMax resources
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML configuration file
    #[arg(long, env = "POWERMAX_CONFIG")]
    config: Option<PathBuf>,

    /// Provider API bind address
    #[arg(long, env = "API_ADDR")]
    api_addr: Option<String>,

    /// Array backend
    #[arg(long, env = "POWERMAX_BACKEND")]
    backend: Option<String>,

    /// Array serial number
    #[arg(long, env = "POWERMAX_SERIAL")]
    serial: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    /// Print the resource schemas as JSON and exit
    #[arg(long)]
    print_schema: bool,
}

impl Args {
    /// File configuration with command line values on top
    fn resolve(&self) -> Result<ProviderConfig> {
        let mut config = match &self.config {
            Some(path) => ProviderConfig::load(path)?,
            None => ProviderConfig::default(),
        };
        if let Some(addr) = &self.api_addr {
            config.api.bind_addr = addr.clone();
        }
        if let Some(backend) = &self.backend {
            config.array.backend = backend.clone();
        }
        if let Some(serial) = &self.serial {
            config.array.memory.serial = serial.clone();
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if self.log_json {
            config.logging.json = true;
        }
        config.validate()?;
        Ok(config)
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_schema {
        let schema = Provider::schema()?;
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }

    let config = args.resolve()?;
    init_logging(&config.logging)?;

    info!("Starting PowerMax Provider");
    info!("  Version: {}", powermax_provider::VERSION);
    info!("  API: {}", config.api.bind_addr);
    info!("  Backend: {}", config.array.backend);
    info!("  Endpoint: {}", config.array.endpoint);

    let registry = Registry::new();
    let client = BackendFactory::create(&config.array, &registry)?;
    let server = ApiServer::new(&config.api, Provider::new(client), registry)?;

    let shutdown = server.shutdown_token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received interrupt, shutting down"),
            Err(e) => warn!("Cannot listen for interrupt: {}", e),
        }
        shutdown.cancel();
    });

    server.run().await?;

    info!("Provider shutdown complete");
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(config: &LoggingConfig) -> Result<()> {
    let level = match config.level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive(directive("hyper=warn")?)
        .add_directive(directive("tower_http=info")?)
        .add_directive(directive("axum=info")?);

    if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
    Ok(())
}

fn directive(raw: &str) -> Result<tracing_subscriber::filter::Directive> {
    raw.parse()
        .map_err(|e| Error::Configuration(format!("Invalid log directive {}: {}", raw, e)))
}
