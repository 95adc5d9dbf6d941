// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Handoff - routes conversations between end users, a bot and human agents.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod queue;
mod shell;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::Colorize;

use handoff_config::model::{HandoffConfig, RoutingMode};
use handoff_config::ConfigError;
use handoff_core::{Clock, HandoffError, SystemClock};
use handoff_router::RoutingStores;

/// Handoff - routes conversations between end users, a bot and human agents.
#[derive(Parser, Debug)]
#[command(name = "handoff", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Drive the relay from an interactive console.
    Shell,
    /// Show who is waiting for an agent and who is connected.
    Queue {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Manage handoff configuration.
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Validate the merged configuration and print a summary.
    Check,
}

fn load_config(path: Option<&PathBuf>) -> Result<HandoffConfig, Vec<ConfigError>> {
    match path {
        Some(path) => handoff_config::load_and_validate_path(path),
        None => handoff_config::load_and_validate(),
    }
}

/// Open the store family for the configured routing mode.
pub(crate) async fn open_stores(config: &HandoffConfig) -> Result<RoutingStores, HandoffError> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    Ok(match config.routing.mode {
        RoutingMode::Queue => {
            RoutingStores::Queue(handoff_storage::open_handoff_store(config, clock).await?)
        }
        RoutingMode::Connect => {
            RoutingStores::Connect(handoff_storage::open_connection_store(config, clock).await?)
        }
    })
}

fn print_summary(config: &HandoffConfig) {
    println!("{}", "config ok".green());
    println!("  routing.mode        = {:?}", config.routing.mode);
    println!("  storage.backend     = {:?}", config.storage.backend);
    println!("  storage.path        = {}", config.storage.database_path);
    match &config.roles.agent_name_prefix {
        Some(prefix) => println!("  roles.agent_prefix  = {prefix}"),
        None => println!("  roles.agent_prefix  = (none)"),
    }
    println!("  roles.agent_ids     = {}", config.roles.agent_user_ids.len());
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(errors) => {
            handoff_config::render_errors(&errors);
            std::process::exit(1);
        }
    };
    init_tracing(&config.service.log_level);
    handoff_router::recording::register_metrics();

    let result = match cli.command {
        Some(Commands::Shell) => shell::run_shell(config).await,
        Some(Commands::Queue { json }) => queue::run_queue(&config, json).await,
        Some(Commands::Config {
            action: ConfigCommands::Check,
        }) => {
            print_summary(&config);
            Ok(())
        }
        None => {
            println!("handoff: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {e}", "error".red());
        std::process::exit(1);
    }
}

/// Logs go to stderr so the shell's stdout stays readable.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("handoff={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_config_check_with_path() {
        let cli = Cli::parse_from(["handoff", "--config", "/tmp/h.toml", "config", "check"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/h.toml")));
        assert!(matches!(
            cli.command,
            Some(Commands::Config {
                action: ConfigCommands::Check
            })
        ));
    }

    #[test]
    fn explicit_config_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handoff.toml");
        std::fs::write(&path, "[routing]\nmode = \"connect\"\n").unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.routing.mode, RoutingMode::Connect);
    }

    #[tokio::test]
    async fn memory_stores_follow_mode() {
        let mut config = HandoffConfig::default();
        config.storage.backend = handoff_config::model::StorageBackend::Memory;
        let stores = open_stores(&config).await.unwrap();
        assert_eq!(stores.mode(), RoutingMode::Queue);

        config.routing.mode = RoutingMode::Connect;
        let stores = open_stores(&config).await.unwrap();
        assert_eq!(stores.mode(), RoutingMode::Connect);
        stores.shutdown().await.unwrap();
    }
}
