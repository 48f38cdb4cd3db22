//! # Callhook: call notification dispatch and retention sweeps
//!
//! Usage:
//!   callhook serve                       # Gateway + in-process reaper timers
//!   callhook serve --no-timers           # Gateway only (sweeps triggered over HTTP)
//!   callhook sweep signaling             # One sweep, then exit
//!   callhook dispatch event.json         # Run the dispatcher on one event file
//!   callhook config                      # Print the effective config

use anyhow::{Context, Result};
use callhook_core::auth::TokenSource;
use callhook_core::config::{CallhookConfig, PushBackend};
use callhook_gateway::AppState;
use callhook_gateway::event::parse_created_event;
use callhook_scheduler::{NotificationDispatcher, ReaperEngine, reapers, spawn_reapers};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "callhook",
    version,
    about = "📞 Callhook: call push dispatch and retention sweeps"
)]
struct Cli {
    /// Config file (default: ~/.callhook/config.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Log pushes instead of sending them
    #[arg(long, global = true)]
    dry_run: bool,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP gateway
    Serve {
        /// Do not run the reapers on in-process timers
        #[arg(long)]
        no_timers: bool,

        /// Override gateway.port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run one retention sweep now
    Sweep {
        /// Policy name: signaling or calls
        name: String,
    },
    /// Run the notification dispatcher on a document event read from a file
    Dispatch {
        /// Event JSON; `-` reads stdin
        event: String,
    },
    /// Print the effective configuration (secrets redacted)
    Config,
}

fn init_logging(cli: &Cli) {
    let filter = if cli.verbose {
        "callhook=debug,callhook_core=debug,callhook_store=debug,callhook_push=debug,callhook_scheduler=debug,callhook_gateway=debug,tower_http=debug"
    } else {
        "callhook=info,callhook_core=info,callhook_store=info,callhook_push=info,callhook_scheduler=info,callhook_gateway=info"
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    if cli.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }
}

fn load_config(cli: &Cli) -> Result<CallhookConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let path = PathBuf::from(shellexpand::tilde(path).to_string());
            let mut config = CallhookConfig::load_from(&path)
                .with_context(|| format!("loading {}", path.display()))?;
            config.apply_env();
            config
        }
        None => CallhookConfig::load()?,
    };
    if cli.dry_run {
        config.push.backend = PushBackend::DryRun;
    }
    Ok(config)
}

/// Everything the handlers need, wired from config.
struct Runtime {
    dispatcher: Arc<NotificationDispatcher>,
    engine: Arc<ReaperEngine>,
}

fn build_runtime(config: &CallhookConfig) -> Result<Runtime> {
    config.validate()?;

    // Emulator endpoints take no credentials
    let anonymous = config.store.endpoint.is_some();
    let tokens = Arc::new(TokenSource::from_config(&config.auth, anonymous));

    let store = callhook_store::open_store(config, tokens.clone())?;
    let transport = callhook_push::open_transport(config, tokens);

    let dispatcher = Arc::new(NotificationDispatcher::new(
        store.clone(),
        transport,
        config.dispatch.clone(),
    ));
    let engine = Arc::new(ReaperEngine::new(store, reapers::policies(&config.retention)?));
    Ok(Runtime { dispatcher, engine })
}

fn read_event(source: &str) -> Result<serde_json::Value> {
    let text = if source == "-" {
        std::io::read_to_string(std::io::stdin()).context("reading event from stdin")?
    } else {
        let path = shellexpand::tilde(source).to_string();
        std::fs::read_to_string(&path).with_context(|| format!("reading event {path}"))?
    };
    serde_json::from_str(&text).context("event is not valid JSON")
}

fn redacted(config: &CallhookConfig) -> CallhookConfig {
    let mut shown = config.clone();
    if !shown.auth.access_token.is_empty() {
        shown.auth.access_token = "***".into();
    }
    if shown.gateway.auth_token.is_some() {
        shown.gateway.auth_token = Some("***".into());
    }
    shown
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let mut config = load_config(&cli)?;

    match &cli.command {
        Command::Config => {
            println!("{}", toml::to_string_pretty(&redacted(&config))?);
        }

        Command::Sweep { name } => {
            let runtime = build_runtime(&config)?;
            let report = runtime
                .engine
                .run_once(name, chrono::Utc::now())
                .await
                .with_context(|| format!("sweep '{name}'"))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Command::Dispatch { event } => {
            let runtime = build_runtime(&config)?;
            let record = parse_created_event(&read_event(event)?)?;
            let outcome = runtime.dispatcher.handle(&record).await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }

        Command::Serve { no_timers, port } => {
            if let Some(port) = port {
                config.gateway.port = *port;
            }
            let runtime = build_runtime(&config)?;

            let timers = if *no_timers {
                tracing::info!("⏸️ In-process reapers disabled; expecting external sweep triggers");
                Vec::new()
            } else {
                spawn_reapers(runtime.engine.clone())
            };

            let state = AppState::new(
                runtime.dispatcher,
                runtime.engine,
                config.gateway.auth_token.clone(),
            );
            let result = callhook_gateway::serve(&config.gateway, state).await;
            for handle in timers {
                handle.abort();
            }
            result?;
        }
    }

    Ok(())
}
