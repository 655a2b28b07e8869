use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;
use clap::{Parser, Subcommand};
use fleetwire_coordinator::AgentRegistry;
use fleetwire_observability::{init_process_logging, ProcessKind};
use fleetwire_runtime::initialize;
use fleetwire_types::{Event, EventType};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "fleetwire-runtimed")]
#[command(about = "Multi-agent workflow observability and orchestration runtime")]
struct Cli {
    /// Path to the runtime's JSON configuration file.
    #[arg(long, env = "FLEETWIRE_CONFIG", default_value = "fleetwire.json")]
    config: PathBuf,

    /// Directory the persistent event log (JSONL) is appended into. Omit
    /// to disable persistent logging.
    #[arg(long, env = "FLEETWIRE_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Directory process logs (structured tracing output) are written to.
    #[arg(long, env = "FLEETWIRE_LOGS_DIR", default_value = "./logs")]
    logs_dir: PathBuf,

    /// Days of rotated process log files to retain.
    #[arg(long, default_value_t = 14)]
    log_retention_days: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Starts the streaming server and keeps the Event Bus wiring alive.
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 8787)]
        port: u16,
    },
    /// Subscribes to the Event Bus and prints every event as it happens.
    /// Never returns; stop with Ctrl-C.
    Events {
        /// Restrict output to one event type (e.g. `agent.invoked`).
        #[arg(long)]
        event_type: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let (_guard, _logging_info) =
        init_process_logging(ProcessKind::Runtime, &cli.logs_dir, cli.log_retention_days)
            .context("failed to initialize process logging")?;
    // The standalone CLI ships no agent implementations of its own — a host
    // embedding this runtime as a library registers its own agents here
    // before handing the registry to `initialize`.
    let registry = AgentRegistry::new();
    let components = initialize(&cli.config, cli.log_dir.as_deref(), registry)
        .await
        .with_context(|| format!("failed to initialize runtime from {}", cli.config.display()))?;

    match cli.command {
        Command::Serve { host, port } => {
            let addr: SocketAddr = format!("{host}:{port}")
                .parse()
                .context("invalid host or port")?;
            if let Some(path) = &components.log_path {
                info!(log_path = %path.display(), "persistent event log enabled");
            }
            fleetwire_server::serve(addr, components.streaming.clone()).await?;
        }
        Command::Events { event_type } => {
            run_events_debug(&components.bus, event_type).await;
        }
    }

    Ok(())
}

async fn run_events_debug(bus: &fleetwire_core::EventBus, filter: Option<String>) {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Event>();
    let sink = std::sync::Arc::new(DebugSink { tx });

    let subscribe_types: Vec<EventType> = match &filter {
        Some(raw) => EventType::from_str(raw).into_iter().collect(),
        None => EventType::ALL.to_vec(),
    };
    if subscribe_types.is_empty() {
        eprintln!("unknown event type: {}", filter.unwrap_or_default());
        return;
    }
    for event_type in subscribe_types {
        bus.subscribe(event_type, "fleetwire-runtimed::events-debug", sink.clone());
    }

    println!("listening for events (ctrl-c to stop)...");
    while let Some(event) = rx.recv().await {
        match serde_json::to_string(&event) {
            Ok(line) => println!("{line}"),
            Err(err) => eprintln!("failed to encode event: {err}"),
        }
    }
}

struct DebugSink {
    tx: tokio::sync::mpsc::UnboundedSender<Event>,
}

#[async_trait::async_trait]
impl fleetwire_core::event_bus::EventHandler for DebugSink {
    async fn handle(&self, event: Event) -> Result<(), String> {
        let _ = self.tx.send(event);
        Ok(())
    }
}
