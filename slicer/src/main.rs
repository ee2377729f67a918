mod authorization;
mod config;
mod model;

use authorization::RightsAuthorizer;
use clap::{Args, Parser, Subcommand};
use config::{Config, ConfigError, LoggingConfig, MetricsConfig};
use metrics_exporter_statsd::StatsdBuilder;
use model::{ModelError, StaticWorkspace};
use slicer_server::config::{ConfigurationError, Listener, ServerOptions};
use slicer_server::metrics_defs::ALL_METRICS;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(name = "slicer", version, about = "OLAP slicer HTTP server")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Serve the slicer API
    Serve(ConfigArgs),
    /// Check the configuration file and exit
    Validate(ConfigArgs),
}

#[derive(Args)]
struct ConfigArgs {
    #[arg(long, short)]
    config: PathBuf,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("invalid model: {0}")]
    Model(#[from] ModelError),
    #[error("could not initialize metrics: {0}")]
    Metrics(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Server(#[from] slicer_server::ServerError),
}

/// Everything `serve` needs, validated.
struct Prepared {
    listener: Listener,
    options: ServerOptions,
    workspace: StaticWorkspace,
}

fn prepare(config: Config) -> Result<Prepared, CliError> {
    config.listener.validate()?;
    let options = ServerOptions::from_source(&config.server)?;
    let authorizer = config.authorization.map(RightsAuthorizer::new);
    let workspace = StaticWorkspace::new(config.model, authorizer)?;

    Ok(Prepared {
        listener: config.listener,
        options,
        workspace,
    })
}

fn init_logging(logging: &LoggingConfig) -> Option<sentry::ClientInitGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let guard = logging.sentry_dsn.as_deref().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });
    let sentry_layer = guard
        .as_ref()
        .map(|_| sentry::integrations::tracing::layer());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(sentry_layer)
        .init();

    guard
}

fn init_metrics(metrics_config: &MetricsConfig) -> Result<(), CliError> {
    let recorder = StatsdBuilder::from(&metrics_config.statsd_host, metrics_config.statsd_port)
        .build(Some("slicer"))
        .map_err(|e| CliError::Metrics(e.to_string()))?;
    metrics::set_global_recorder(recorder).map_err(|e| CliError::Metrics(e.to_string()))?;
    shared::metrics_defs::describe_all(ALL_METRICS);

    tracing::info!(
        host = %metrics_config.statsd_host,
        port = metrics_config.statsd_port,
        "Sending metrics to statsd"
    );
    Ok(())
}

fn serve(config: Config) -> Result<(), CliError> {
    let _sentry = init_logging(&config.logging);
    if let Some(metrics_config) = &config.metrics {
        init_metrics(metrics_config)?;
    }

    let prepared = prepare(config)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %prepared.listener.host,
        port = prepared.listener.port,
        "Starting slicer"
    );

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(slicer_server::run(
        &prepared.listener,
        prepared.options,
        Arc::new(prepared.workspace),
    ))?;
    Ok(())
}

fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    match cli.command {
        CliCommand::Serve(args) => serve(Config::from_file(&args.config)?),
        CliCommand::Validate(args) => {
            let prepared = prepare(Config::from_file(&args.config)?)?;
            println!(
                "Configuration is valid: listening on {}:{}",
                prepared.listener.host, prepared.listener.port
            );
            Ok(())
        }
    }
}
