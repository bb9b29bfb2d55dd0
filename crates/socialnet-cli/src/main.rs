//! Interactive socialnet client.
//!
//! Run:
//!   socialnet --username alice
//!   socialnet --config socialnet.toml --command-url ws://server:5555
//!
//! Diagnostics go to stderr, filtered by `RUST_LOG`. Each user's actions are
//! also appended to `<log_dir>/<username>.log`.

mod config;
mod console;

use anyhow::Context;
use clap::Parser;
use config::Config;
use console::Console;
use socialnet_client::{FileAuditLog, SessionBuilder, WsRequestChannel, WsSubscribeChannel};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Command endpoint
    #[arg(long, env = "SOCIALNET_COMMAND_URL")]
    command_url: Option<String>,

    /// Notification endpoint
    #[arg(long, env = "SOCIALNET_NOTIFY_URL")]
    notify_url: Option<String>,

    /// Directory for per-user audit logs
    #[arg(long, env = "SOCIALNET_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Username to register; asked for when absent
    #[arg(short, long)]
    username: Option<String>,
}

impl Cli {
    fn config(&self) -> anyhow::Result<Config> {
        let mut config = Config::load(self.config.as_deref())?;
        if let Some(url) = &self.command_url {
            config.command_url = url.clone();
        }
        if let Some(url) = &self.notify_url {
            config.notify_url = url.clone();
        }
        if let Some(dir) = &self.log_dir {
            config.log_dir = dir.clone();
        }
        Ok(config)
    }
}

/// `base` plus the `socialnet=info` default and the configured directives.
fn env_filter(base: EnvFilter, config: &Config) -> anyhow::Result<EnvFilter> {
    let mut filter = base.add_directive("socialnet=info".parse()?);
    if let Some(directives) = &config.log_filter {
        for directive in directives.split(',').filter(|d| !d.trim().is_empty()) {
            filter = filter.add_directive(
                directive
                    .trim()
                    .parse::<Directive>()
                    .with_context(|| format!("invalid log filter '{directive}'"))?,
            );
        }
    }
    Ok(filter)
}

fn init_tracing(config: &Config) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(EnvFilter::from_default_env(), config)?)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.config()?;
    init_tracing(&config)?;

    let mut console = Console::new();
    let username = match cli.username {
        Some(username) => username,
        None => console
            .ask_non_empty("Username: ")
            .await?
            .context("no username given")?,
    };

    let audit = FileAuditLog::for_user(&config.log_dir, &username)
        .with_context(|| format!("opening audit log in {}", config.log_dir.display()))?;
    tracing::debug!("Audit log at {}", audit.path().display());

    let channel = WsRequestChannel::connect(&config.command_url).await?;
    let subscriber = WsSubscribeChannel::connect(&config.notify_url).await?;
    let server = channel.url().to_string();

    let session = SessionBuilder::new(Arc::new(audit))
        .notification_capacity(config.notification_capacity)
        .register(channel, subscriber, username, &mut console)
        .await?;
    let registration = session.registration();
    println!(
        "Registered as {} (id {}).",
        registration.username, registration.id
    );
    tracing::info!("Connected to {} as {}", server, registration.username);

    console::run(&mut console, session).await
}
