//! CLI entry point for operator-desk

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use dialoguer::{Confirm, Input};
use operator_desk_core::config::{Config, ConfigLoader};
use operator_desk_core::logging::init_logging;
use operator_desk_manager::Manager;
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "operator-desk")]
#[command(about = "Relay end-user chats on Telegram to a human operator dashboard")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration directory
    #[arg(short, long, global = true)]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Write an initial configuration file
    Onboard {
        /// Accept defaults without prompting
        #[arg(short, long)]
        yes: bool,
    },
    /// Run the relay: Telegram channel, operator API and event stream
    Serve,
    /// Show the effective configuration
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let config_loader = if let Some(dir) = cli.config_dir {
        ConfigLoader::with_dir(dir)
    } else {
        ConfigLoader::new()
    };

    match cli.command {
        Commands::Onboard { yes } => run_onboard(&config_loader, yes)?,
        Commands::Serve => run_serve(&config_loader).await?,
        Commands::Status => run_status(&config_loader)?,
    }

    Ok(())
}

/// Relative log directories live under the config directory
fn resolve_log_dir(config_dir: &Path, dir: &str) -> PathBuf {
    let path = Path::new(dir);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        config_dir.join(path)
    }
}

fn run_onboard(loader: &ConfigLoader, assume_defaults: bool) -> Result<()> {
    println!("{}", style("Welcome to operator-desk!").bold().cyan());

    let config_path = loader.config_path();
    if config_path.exists() && !assume_defaults {
        let overwrite = Confirm::new()
            .with_prompt("Configuration already exists. Overwrite?")
            .default(false)
            .interact()?;
        if !overwrite {
            println!("Onboard cancelled.");
            return Ok(());
        }
    }

    let mut config = Config::default();
    if !assume_defaults {
        let token: String = Input::new()
            .with_prompt("Telegram bot token (leave empty to set TELEGRAM_BOT_TOKEN later)")
            .allow_empty(true)
            .interact_text()?;
        let port: u16 = Input::new()
            .with_prompt("HTTP port")
            .default(config.server.port)
            .interact_text()?;
        let end_notice: String = Input::new()
            .with_prompt("Message sent to users when a chat is ended")
            .default(config.relay.end_notice.clone())
            .interact_text()?;
        apply_onboard_answers(&mut config, token, port, end_notice);
    }

    loader.save(&config)?;
    println!(
        "{} {}",
        style("Configuration written to").green(),
        config_path.display()
    );
    println!("Run {} to start relaying.", style("operator-desk serve").bold());
    Ok(())
}

fn apply_onboard_answers(config: &mut Config, token: String, port: u16, end_notice: String) {
    let token = token.trim().to_string();
    config.channels.telegram.enabled = !token.is_empty();
    config.channels.telegram.token = token;
    config.server.port = port;
    config.relay.end_notice = end_notice;
}

async fn run_serve(loader: &ConfigLoader) -> Result<()> {
    let mut config = loader.load()?;
    config.logging.dir = resolve_log_dir(loader.config_dir(), &config.logging.dir)
        .to_string_lossy()
        .into_owned();
    let _log_guard = init_logging(&config.logging);

    println!("{}", style("Starting operator-desk...").bold().cyan());
    println!("Listening on {}:{}", config.server.host, config.server.port);
    if !config.channels.telegram.enabled {
        println!(
            "{}",
            style("Telegram is disabled; operator replies cannot be delivered.").yellow()
        );
    }

    let manager = Manager::new(config).await?;
    let (shutdown_tx, _) = broadcast::channel(4);

    let run = tokio::spawn(manager.run(shutdown_tx.clone()));

    println!("\n{}", style("Relay is running. Press Ctrl+C to stop.").green());

    tokio::signal::ctrl_c().await?;
    println!("\n{}", style("Shutting down...").yellow());
    info!("Ctrl+C received, shutting down");
    let _ = shutdown_tx.send(());

    match run.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Manager error: {}", e),
        Err(e) => error!("Manager task failed: {}", e),
    }

    println!("{}", style("Relay stopped.").green());
    Ok(())
}

fn run_status(loader: &ConfigLoader) -> Result<()> {
    let config = loader.load()?;

    println!("{}", style("operator-desk status").bold().cyan());
    println!("Version: {}\n", env!("CARGO_PKG_VERSION"));

    println!("{}", style("Configuration:").bold());
    println!("  Config file: {}", loader.config_path().display());
    println!("  Relay channel: {}", config.relay.channel);
    println!("  End notice: {}", config.relay.end_notice);
    println!();

    println!("{}", style("Channels:").bold());
    let telegram = &config.channels.telegram;
    let status = if !telegram.enabled {
        style("disabled").dim()
    } else if telegram.token.is_empty() {
        style("enabled, no token").red()
    } else {
        style("enabled").green()
    };
    println!("  Telegram: {}", status);
    if !telegram.allow_from.is_empty() {
        println!("  Allowed senders: {}", telegram.allow_from.join(", "));
    }
    println!();

    println!("{}", style("Server:").bold());
    println!("  Address: {}:{}", config.server.host, config.server.port);
    match &config.server.static_dir {
        Some(dir) => println!("  Dashboard: {}", dir),
        None => println!("  Dashboard: {}", style("not served").dim()),
    }
    println!();

    println!("{}", style("Keep-alive:").bold());
    if config.keepalive.enabled {
        println!(
            "  {} every {}s",
            config.keepalive_url(),
            config.keepalive.interval_secs
        );
    } else {
        println!("  {}", style("disabled").dim());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_commands() {
        let cli = Cli::try_parse_from(["operator-desk", "serve"]).unwrap();
        assert_eq!(cli.command, Commands::Serve);
        assert!(cli.config_dir.is_none());

        let cli =
            Cli::try_parse_from(["operator-desk", "status", "--config-dir", "/tmp/desk"]).unwrap();
        assert_eq!(cli.command, Commands::Status);
        assert_eq!(cli.config_dir, Some(PathBuf::from("/tmp/desk")));

        let cli = Cli::try_parse_from(["operator-desk", "onboard", "--yes"]).unwrap();
        assert_eq!(cli.command, Commands::Onboard { yes: true });
    }

    #[test]
    fn test_unknown_command_is_rejected() {
        assert!(Cli::try_parse_from(["operator-desk", "gateway"]).is_err());
    }

    #[test]
    fn test_resolve_log_dir() {
        let base = Path::new("/etc/desk");
        assert_eq!(resolve_log_dir(base, "logs"), PathBuf::from("/etc/desk/logs"));
        assert_eq!(resolve_log_dir(base, "/var/log/desk"), PathBuf::from("/var/log/desk"));
    }

    #[test]
    fn test_onboard_answers_enable_telegram_only_with_token() {
        let mut config = Config::default();
        apply_onboard_answers(&mut config, "  ".to_string(), 8080, "Bye".to_string());
        assert!(!config.channels.telegram.enabled);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.relay.end_notice, "Bye");

        apply_onboard_answers(&mut config, "123:abc".to_string(), 8080, "Bye".to_string());
        assert!(config.channels.telegram.enabled);
        assert_eq!(config.channels.telegram.token, "123:abc");
    }

    #[test]
    fn test_onboard_with_defaults_writes_loadable_config() {
        let temp_dir = TempDir::new().unwrap();
        let loader = ConfigLoader::with_dir(temp_dir.path());

        run_onboard(&loader, true).unwrap();

        assert!(loader.config_path().exists());
        let config = loader.load().unwrap();
        assert_eq!(config.relay.end_notice, Config::default().relay.end_notice);
    }
}
