//! Collaborative session gateway.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin cohost-server
//! cargo run --bin cohost-server -- --host 0.0.0.0 --port 3000
//! COHOST_ICE_SERVERS='[{"urls":["stun:stun.example.org"]}]' cargo run --bin cohost-server
//! ```

use std::{sync::Arc, time::Duration};

use clap::Parser;
use cohost_server::{
    domain::{EventEmitter, SessionId},
    infrastructure::{
        event_emitter::{ChannelEventEmitter, FanoutEventEmitter, TracingEventEmitter},
        ice::StaticIceServerProvider,
        repository::InMemorySessionStore,
    },
    ui::{GatewayObservers, Server},
    usecase::{DEFAULT_SWEEP_INTERVAL, SessionOrchestrator, Sweeper},
};
use cohost_shared::{logger::setup_logger, time::SystemClock};

#[derive(Parser, Debug)]
#[command(name = "cohost-server")]
#[command(about = "Collaborative session orchestrator with an HTTP gateway", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "8080")]
    port: u16,

    /// Seconds between background sweeps
    #[arg(long, default_value_t = DEFAULT_SWEEP_INTERVAL.as_secs())]
    sweep_interval_secs: u64,

    /// ICE servers as a JSON array of {urls, username?, credential?}
    #[arg(long, env = "COHOST_ICE_SERVERS")]
    ice_servers: Option<String>,

    /// Log every session notification on the in-process event bus
    #[arg(long)]
    event_bus: bool,

    /// Skip loading saved session snapshots at startup
    #[arg(long)]
    no_restore: bool,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();

    // Initialize dependencies in order:
    // 1. ICE provider
    // 2. Event sinks
    // 3. Session store + orchestrator
    // 4. Sweeper
    // 5. Server

    // 1. ICE provider
    let ice_servers = match args.ice_servers.as_deref() {
        Some(json) => match StaticIceServerProvider::from_json(json) {
            Ok(provider) => provider,
            Err(e) => {
                tracing::error!("Invalid --ice-servers value: {}", e);
                std::process::exit(2);
            }
        },
        None => StaticIceServerProvider::default(),
    };

    // 2. Event sinks: always log, optionally feed an in-process bus
    let mut emitter = FanoutEventEmitter::default().with(Arc::new(TracingEventEmitter));
    if args.event_bus {
        let (channel, mut events) = ChannelEventEmitter::new();
        emitter = emitter.with(Arc::new(channel));
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                tracing::debug!(event = %event.name, "Event bus delivery");
            }
        });
    }
    let emitter: Arc<dyn EventEmitter> = Arc::new(emitter);

    // 3. Orchestrator with snapshot persistence
    //
    // InMemorySessionStore lives only as long as this process, so a fresh
    // start has nothing to restore and restore() reports 0. Sessions survive
    // a restart only when a durable SessionStore is wired in here.
    let store = Arc::new(InMemorySessionStore::new());
    let orchestrator = Arc::new(
        SessionOrchestrator::new(emitter, Arc::new(SystemClock)).with_store(store),
    );
    if args.no_restore {
        tracing::info!("Snapshot restore skipped (--no-restore)");
    } else {
        let restored = orchestrator.restore().await;
        tracing::info!("{} session(s) restored", restored);
    }

    // 4. Sweeper
    let sweeper = Sweeper::new(
        orchestrator.clone(),
        Duration::from_secs(args.sweep_interval_secs.max(1)),
    )
    .spawn();

    // 5. Server
    let observers = GatewayObservers {
        on_session_changed: Some(Arc::new(|session_id: &SessionId| {
            tracing::debug!(session_id = %session_id, "Session changed");
        })),
        on_session_deleted: Some(Arc::new(|session_id: &SessionId| {
            tracing::debug!(session_id = %session_id, "Session deleted");
        })),
    };
    let server = Server::new(orchestrator, Arc::new(ice_servers)).with_observers(observers);
    let result = server.run(args.host, args.port).await;

    sweeper.abort();
    if let Err(e) = result {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
