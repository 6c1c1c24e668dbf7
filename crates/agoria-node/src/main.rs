//! agoria-node — the Agoria marketplace runtime binary.
//!
//! Startup sequence:
//!   1. Load or generate the node's signing key
//!   2. Open the card store (sled, durable across restarts)
//!   3. Start the overlay network (libp2p gossipsub + Kademlia)
//!   4. Start the metrics endpoint
//!   5. Start the orchestrator worker pool
//!   6. Run the main loop: pipe overlay gossip into local components until
//!      asked to shut down, then stop everything in reverse order
//!
//! Guild formation and payment channel lifecycle are library APIs
//! (`agoria-guild`, `agoria-channels`) for an embedding application to
//! drive directly; this binary does not expose an RPC surface for them
//! (there is no network-facing transport server other than the overlay).

mod config;
mod executor;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use agoria_cards::store::{CardStore, SledCardStore};
use agoria_core::{Did, DidType};
use agoria_crypto::KeyPair;
use agoria_embeddings::CapabilityIndex;
use agoria_orchestrator::{AgentSelector, Orchestrator, OrchestratorConfig};
use agoria_overlay::{OverlayConfig, OverlayNetwork};
use agoria_queue::{TaskQueue, TaskQueueConfig};
use agoria_reputation::{ReputationConfig, ReputationManager};
use agoria_telemetry::metrics as telemetry;

use config::NodeConfig;
use executor::HttpExecutor;

#[derive(Parser, Debug)]
#[command(
    name = "agoria-node",
    version,
    about = "Agoria node — decentralized agent marketplace runtime"
)]
struct Args {
    /// Path to a JSON config file overlaying the built-in defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for the persistent card store.
    #[arg(long, env = "AGORIA_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Path to the node's Ed25519 signing key seed (32 raw bytes). A fresh
    /// ephemeral key is generated if omitted — fine for development, but it
    /// will not be reproducible across restarts.
    #[arg(long, env = "AGORIA_KEY_PATH")]
    key_path: Option<PathBuf>,

    /// Overlay network listen multiaddr.
    #[arg(long)]
    p2p_listen: Option<String>,

    /// Bootstrap peer multiaddresses (comma-separated).
    #[arg(long, env = "AGORIA_BOOTSTRAP_PEERS", value_delimiter = ',')]
    bootstrap: Vec<String>,

    /// Prometheus exporter bind address.
    #[arg(long, env = "AGORIA_METRICS_ADDR")]
    metrics_addr: Option<SocketAddr>,

    /// Number of orchestrator worker loops.
    #[arg(long)]
    worker_count: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,agoria=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    let mut node_config = NodeConfig::load(args.config.as_deref()).context("loading node config")?;
    if let Some(data_dir) = args.data_dir {
        node_config.data_dir = config::expand_tilde(&data_dir);
    }
    if let Some(listen) = args.p2p_listen {
        node_config.p2p_listen = listen;
    }
    if !args.bootstrap.is_empty() {
        node_config.bootstrap = args.bootstrap;
    }
    if let Some(metrics_addr) = args.metrics_addr {
        node_config.metrics_addr = metrics_addr;
    }
    if let Some(worker_count) = args.worker_count {
        node_config.worker_count = worker_count;
    }

    info!("Agoria node starting");

    // ── Identity ───────────────────────────────────────────────────────────
    let keypair = load_or_generate_key(args.key_path.as_deref())?;
    let local_did = Did::new("agoria", DidType::Agent, &keypair.public_key.to_hex()[..16]);
    info!(did = %local_did, "node identity");

    // ── Telemetry ──────────────────────────────────────────────────────────
    agoria_telemetry::prometheus::install().context("installing telemetry collectors")?;
    tokio::spawn(agoria_telemetry::http::run_server(node_config.metrics_addr));

    // ── Durable card store ─────────────────────────────────────────────────
    std::fs::create_dir_all(&node_config.data_dir)
        .with_context(|| format!("creating data dir {}", node_config.data_dir.display()))?;
    let card_store: Arc<dyn CardStore> =
        Arc::new(SledCardStore::open(node_config.data_dir.join("cards")).context("opening card store")?);

    // ── In-memory components ───────────────────────────────────────────────
    let capability_index = Arc::new(CapabilityIndex::new());
    let reputation = Arc::new(ReputationManager::new(ReputationConfig {
        min_tasks_for_score: node_config.min_tasks_for_score,
        ..ReputationConfig::default()
    }));
    let queue = Arc::new(TaskQueue::new(TaskQueueConfig::default()));

    // ── Orchestrator ───────────────────────────────────────────────────────
    let selector = Arc::new(AgentSelector::new(
        Arc::clone(&capability_index),
        Arc::clone(&card_store),
        Arc::clone(&reputation),
    ));
    let orchestrator = Arc::new(Orchestrator::new(
        OrchestratorConfig {
            worker_count: node_config.worker_count,
            ..OrchestratorConfig::default()
        },
        Arc::clone(&queue),
        selector,
        Arc::new(HttpExecutor::new()),
        Arc::clone(&reputation),
    ));
    orchestrator.start();

    // ── Overlay network ────────────────────────────────────────────────────
    let overlay_config = OverlayConfig {
        listen_addr: node_config.p2p_listen.clone(),
        bootstrap_peers: node_config.bootstrap.clone(),
        ..OverlayConfig::default()
    };
    let (overlay_network, mut overlay_handle) =
        OverlayNetwork::new(&overlay_config).map_err(|e| anyhow::anyhow!("building overlay network: {e}"))?;
    info!(peer_id = %overlay_handle.local_peer_id, "overlay identity");

    tokio::spawn(async move { overlay_network.run().await });

    // Pipe gossiped card updates into the local card store.
    let card_store_for_gossip = Arc::clone(&card_store);
    tokio::spawn(async move {
        while let Some(msg) = overlay_handle.card_rx.recv().await {
            match bincode::deserialize::<(
                agoria_cards::card::AgentCard,
                agoria_cards::clock::VectorClock,
                String,
                chrono::DateTime<chrono::Utc>,
            )>(&msg.payload)
            {
                Ok((card, clock, updater_id, timestamp)) => match card_store_for_gossip
                    .apply_update(card, clock, updater_id, timestamp)
                {
                    Ok(true) => telemetry().inc_cards_issued(),
                    Ok(false) => {}
                    Err(e) => {
                        warn!(error = %e, "rejected stale card update");
                        telemetry().inc_error("cards", "stale_update");
                    }
                },
                Err(e) => warn!(error = %e, "failed to decode inbound card update"),
            }
        }
    });

    // Guild and channel gossip planes are counted and logged here; the
    // manager calls that actually mutate guild/channel state are driven by
    // the embedding application through `agoria-guild`/`agoria-channels`
    // directly, not replayed generically off the wire by this binary.
    tokio::spawn(async move {
        while let Some(msg) = overlay_handle.guild_rx.recv().await {
            telemetry().inc_gossip_messages("guild");
            tracing::debug!(bytes = msg.payload.len(), trace = ?msg.trace, "guild gossip received");
        }
    });
    tokio::spawn(async move {
        while let Some(msg) = overlay_handle.channel_rx.recv().await {
            telemetry().inc_gossip_messages("channel");
            tracing::debug!(bytes = msg.payload.len(), trace = ?msg.trace, "channel gossip received");
        }
    });

    info!("node ready");

    // ── Main loop: run until asked to stop, then drain in reverse order ────
    tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;
    info!("shutting down");
    orchestrator.stop().await;

    Ok(())
}

/// Loads a 32-byte seed from `path`, or generates and warns about an
/// ephemeral key if none is given.
fn load_or_generate_key(path: Option<&std::path::Path>) -> anyhow::Result<KeyPair> {
    let Some(path) = path else {
        warn!("No --key-path/AGORIA_KEY_PATH provided. Generating an ephemeral identity — DO NOT USE IN PRODUCTION.");
        return Ok(KeyPair::generate());
    };
    let bytes = std::fs::read(path).with_context(|| format!("reading signing key from {}", path.display()))?;
    let seed: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| anyhow::anyhow!("key file {} must contain exactly 32 bytes", path.display()))?;
    Ok(KeyPair::from_seed(seed))
}
