use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn};
use serde_json::{json, Value as JsonValue};
use shh_filter::{FilterHandlers, Shh, ShhConfig};
use std::io::Write;
use std::path::PathBuf;

/// Joins public chats on a shh node and prints incoming messages as JSON lines.
#[derive(Parser, Debug)]
#[command(name = "shh-watch")]
struct Args {
    /// TOML file with `endpoint`, `rpc_path`, `poll_interval_ms` and `request_timeout_ms`.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Overrides the configured `host:port`.
    #[arg(long)]
    endpoint: Option<String>,
    #[arg(long = "chat", required = true)]
    chats: Vec<String>,
    /// Raise log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    fn resolve_config(&self) -> Result<ShhConfig> {
        let mut config = match &self.config {
            Some(path) => ShhConfig::load(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => ShhConfig::default(),
        };
        if let Some(endpoint) = &self.endpoint {
            config.set_endpoint(endpoint.clone());
        }
        config.validate().context("invalid config")?;
        Ok(config)
    }
}

fn message_line(chat: &str, message: JsonValue) -> String {
    json!({ "chat": chat, "message": message }).to_string()
}

/// Join failures are returned from `main`, so no install error callback is set.
fn output_handlers() -> FilterHandlers {
    FilterHandlers::new().on_chat_message(|chat, message| {
        let mut stdout = std::io::stdout().lock();
        if let Err(err) = writeln!(stdout, "{}", message_line(chat, message)) {
            warn!("failed to write message: {err}");
        }
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(args.log_filter()))
        .init();

    let config = args.resolve_config()?;
    if args.chats.iter().any(|chat| chat.trim().is_empty()) {
        bail!("chat names must not be empty");
    }

    let shh = Shh::connect(&config)?;
    let filters = shh
        .join_public_chats(args.chats.iter().cloned(), output_handlers())
        .await
        .with_context(|| format!("joining public chats via {}", config.endpoint))?;
    info!("watching {} chat(s) on {}", filters.len(), config.endpoint);

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    info!("leaving {} chat(s)", filters.len());
    shh.leave_public_chats(&filters).await.context("leaving public chats")?;
    Ok(())
}
