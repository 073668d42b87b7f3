use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "fleetflow-server")]
#[command(about = "FleetFlow invitation and account-provisioning server")]
pub struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "FLEETFLOW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Database file, overriding [storage] database
    #[arg(long, env = "FLEETFLOW_DATABASE", global = true)]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the server until interrupted
    Serve {
        /// Listen address, overriding [server] bind
        #[arg(long, env = "FLEETFLOW_BIND")]
        bind: Option<SocketAddr>,
    },
    /// Create a company and its first admin account
    Bootstrap {
        /// Company name
        company: String,

        /// Admin email
        email: String,

        /// Admin display name
        #[arg(long, default_value = "Admin")]
        display_name: String,

        /// Admin password
        #[arg(long, env = "FLEETFLOW_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve() {
        let cli = Cli::try_parse_from([
            "fleetflow-server",
            "--database",
            "/tmp/fleet.db",
            "serve",
            "--bind",
            "0.0.0.0:9000",
        ])
        .unwrap();

        assert_eq!(cli.database, Some(PathBuf::from("/tmp/fleet.db")));
        match cli.command {
            Command::Serve { bind } => assert_eq!(bind, Some("0.0.0.0:9000".parse().unwrap())),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_bootstrap() {
        let cli = Cli::try_parse_from([
            "fleetflow-server",
            "bootstrap",
            "Acme",
            "boss@acme.com",
            "--password",
            "correct horse battery",
        ])
        .unwrap();

        match cli.command {
            Command::Bootstrap {
                company,
                email,
                display_name,
                password,
            } => {
                assert_eq!(company, "Acme");
                assert_eq!(email, "boss@acme.com");
                assert_eq!(display_name, "Admin");
                assert_eq!(password, "correct horse battery");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_bad_bind_rejected() {
        let result = Cli::try_parse_from(["fleetflow-server", "serve", "--bind", "not-an-addr"]);
        assert!(result.is_err());
    }
}
