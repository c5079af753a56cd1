//! # wirefly
//!
//! Command-line peer for wirefly tick synchronization.
//!
//! Every peer ticks on its own 2.5 second cycle and broadcasts each tick on
//! a topic. Hearing another peer's tick nudges the local cycle forward, so
//! peers on the same topic drift into step with each other.
//!
//! ## Example
//!
//! ```bash
//! # First peer
//! wirefly --pname alice --listen 0.0.0.0:4747
//!
//! # Second peer, bootstrapping from the first
//! wirefly --pname bob --listen 0.0.0.0:4748 --peer 127.0.0.1:4747
//!
//! # Five simulated peers in one process
//! wirefly --mock --peers 5
//! ```
//!
//! Logs go to stderr and are filtered with `RUST_LOG` (default
//! `wirefly_node=info,wirefly_cli=info`).

use anyhow::{bail, Context, Result};
use clap::Parser;
use rand::Rng;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use wirefly_node::{display_channel, Config, DisplayStream, MemoryHub, Node, UdpTransport};
use wirefly_types::PeerId;

mod render;

use render::Renderer;

/// How often the peer list is checked for changes.
const PEER_REFRESH: Duration = Duration::from_secs(1);

/// Command-line peer for wirefly tick synchronization.
#[derive(Parser, Debug)]
#[command(name = "wirefly")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Display name shown to other peers (default: $USER-<peer id suffix>)
    #[arg(long)]
    pname: Option<String>,

    /// Topic to join (default: tick-primary)
    #[arg(long)]
    topic: Option<String>,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// UDP bind address (default: 0.0.0.0:4747)
    #[arg(long)]
    listen: Option<String>,

    /// Bootstrap peer address, may be repeated
    #[arg(long = "peer", value_name = "ADDR")]
    peer: Vec<String>,

    /// Run simulated peers on an in-memory hub instead of UDP
    #[arg(long)]
    mock: bool,

    /// Number of simulated peers with --mock
    #[arg(long, default_value_t = 3)]
    peers: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let config = load_config(&cli)?;

    if cli.mock {
        run_mock(&config, cli.peers).await
    } else {
        run_udp(&config).await
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("wirefly_node=info,wirefly_cli=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Read the config file (if any), apply command-line overrides, validate.
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path).context("failed to load configuration")?,
        None => Config::default(),
    };

    if let Some(topic) = &cli.topic {
        config.network.topic = topic.clone();
    }
    if let Some(name) = &cli.pname {
        config.network.peer_name = Some(name.clone());
    }
    if let Some(listen) = &cli.listen {
        config.network.listen = listen.clone();
    }
    config.network.peers.extend(cli.peer.iter().cloned());

    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// `$USER-<last 8 chars of the peer id>`
fn default_peer_name(id: &PeerId) -> String {
    let user = std::env::var("USER").unwrap_or_else(|_| "peer".to_string());
    format!("{}-{}", user, id.short())
}

async fn run_udp(config: &Config) -> Result<()> {
    let id = PeerId::random();
    let name = config
        .network
        .peer_name
        .clone()
        .unwrap_or_else(|| default_peer_name(&id));

    let transport = UdpTransport::bind(id, config.udp_config()?)
        .await
        .context("failed to bind UDP socket")?;
    let mut node = Node::start(&transport, config.node_options(name.as_str()))
        .await
        .context("failed to start node")?;

    println!(
        "{} on topic '{}' at {} (peer {})",
        name,
        config.network.topic,
        transport.local_addr(),
        id.short()
    );

    let display = node.take_display().context("display stream already taken")?;
    render_until_stopped(display, || node.list_peers()).await?;

    let report = node.shutdown().await.context("engine did not stop cleanly")?;
    transport.shutdown();
    info!(
        exit = ?report.exit,
        cycles = report.stats.cycles,
        external_ticks = report.stats.external_ticks,
        publish_failures = report.stats.publish_failures,
        "stopped"
    );
    Ok(())
}

async fn run_mock(config: &Config, count: usize) -> Result<()> {
    if count == 0 {
        bail!("--peers must be at least 1 with --mock");
    }

    let hub = MemoryHub::new();
    let subticks = config.engine.subticks_per_cycle;
    let starts: Vec<u32> = {
        let mut rng = rand::thread_rng();
        (0..count).map(|_| rng.gen_range(0..subticks)).collect()
    };
    // Every simulated peer feeds one shared stream
    let (sink, merged) = display_channel(
        config.buffers.display_capacity,
        config.buffers.display_overflow,
    );
    let mut nodes = Vec::with_capacity(count);

    for (n, start) in starts.into_iter().enumerate() {
        let transport = hub.transport(PeerId::random());
        let name = format!("sim-{}", n + 1);
        let mut options = config.node_options(name.as_str());
        options.start_subtick = start;

        let mut node = Node::start(&transport, options)
            .await
            .with_context(|| format!("failed to start simulated peer {}", name))?;
        let display = node.take_display().context("display stream already taken")?;
        tokio::spawn(render::forward(display, sink.clone()));

        info!(%name, start, "simulated peer started");
        nodes.push(node);
    }
    drop(sink);

    println!("{} simulated peers on topic '{}'", count, config.network.topic);

    let observer = &nodes[0];
    render_until_stopped(merged, || observer.list_peers()).await?;

    for node in nodes {
        let name = node.local_peer().name.clone();
        let report = node.shutdown().await?;
        info!(
            %name,
            cycles = report.stats.cycles,
            external_ticks = report.stats.external_ticks,
            "simulated peer stopped"
        );
    }
    Ok(())
}

/// Print events and peer changes until Ctrl-C or until every engine is gone.
async fn render_until_stopped<F>(mut events: DisplayStream, peers: F) -> Result<()>
where
    F: Fn() -> Vec<PeerId>,
{
    let mut renderer = Renderer::new(std::io::stdout());
    let mut refresh = tokio::time::interval(PEER_REFRESH);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                result.context("failed to listen for Ctrl-C")?;
                info!("interrupted, shutting down");
                break;
            }
            event = events.recv() => match event {
                Some(event) => renderer.event(&event).context("failed to write output")?,
                None => {
                    warn!("tick engine stopped");
                    break;
                }
            },
            _ = refresh.tick() => {
                renderer.peers(peers()).context("failed to write output")?;
            }
        }
    }

    Ok(())
}
