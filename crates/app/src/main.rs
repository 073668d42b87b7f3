//! FleetFlow server
//!
//! Serves the invitation and account-provisioning backend over TCP, and
//! bootstraps companies from the command line.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use fleetflow_core::{config, Backend, FleetConfig};
use fleetflow_net::Server;

mod cli;

use cli::{Cli, Command};

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error(transparent)]
    Core(#[from] fleetflow_core::Error),

    #[error(transparent)]
    Net(#[from] fleetflow_net::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid bind address '{0}'")]
    InvalidBind(String),
}

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), AppError> {
    let config = load_config(&cli)?;

    match cli.command {
        Command::Serve { bind } => {
            let addr = match bind {
                Some(addr) => addr,
                None => parse_bind(&config.server.bind)?,
            };
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(serve(addr, &config))
        }
        Command::Bootstrap {
            company,
            email,
            display_name,
            password,
        } => {
            let backend = Backend::open(&config)?;
            let admin = backend.bootstrap_company(&company, &email, &password, &display_name)?;
            info!(
                company_id = %admin.company_id,
                account_id = %admin.account_id,
                "Company '{}' ready; sign in as {}",
                admin.company_name,
                admin.email
            );
            Ok(())
        }
    }
}

/// Config file from `--config` or the platform default, with CLI overrides
fn load_config(cli: &Cli) -> Result<FleetConfig, AppError> {
    let mut config = match &cli.config {
        Some(path) => FleetConfig::load(path)?,
        None => FleetConfig::load_or_default(config::default_config_path()?)?,
    };

    if let Some(database) = &cli.database {
        config.storage.database = Some(database.clone());
    }

    Ok(config)
}

fn parse_bind(bind: &str) -> Result<SocketAddr, AppError> {
    bind.parse()
        .map_err(|_| AppError::InvalidBind(bind.to_string()))
}

async fn serve(addr: SocketAddr, config: &FleetConfig) -> Result<(), AppError> {
    info!("Starting FleetFlow");

    let backend = Arc::new(Backend::open(config)?);
    let server = Server::start(addr, backend).await?;

    tokio::signal::ctrl_c().await?;
    info!("Interrupt received");
    server.shutdown();

    Ok(())
}
