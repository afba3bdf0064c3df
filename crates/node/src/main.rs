mod cli;
mod errors;

use std::net::SocketAddr;
use std::str::FromStr;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use keyraft_common::{parse_peer_list, DirLock, PeerId};
use keyraft_raftglue::RaftNode;
use keyraft_router::AppState;

use errors::*;

/// Builds the `tracing` subscriber the way the rest of this workspace
/// expects it: `VPR_TRACE=1` wins over `VPR_DEBUG=1`, which wins over the
/// default `info` level (spec §6.3's CLI section).
fn init_logging() {
    let filter = if std::env::var("VPR_TRACE").is_ok() {
        EnvFilter::new("trace")
    } else if std::env::var("VPR_DEBUG").is_ok() {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

#[tokio::main]
async fn main() {
    init_logging();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "fatal startup error");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = cli::Cli::parse();

    let self_peer = PeerId::from_str(&cli.peer_id)?;
    let join_peers = parse_peer_list(&cli.join)?;

    // Held for the life of the process: two nodes can never share a
    // `--data` directory (spec §6.2).
    let _lock = DirLock::open(&cli.data)?;

    let node = RaftNode::start(self_peer.clone(), join_peers, &cli.data).await?;
    let state = AppState::new(node);

    let http_addr: SocketAddr = format!("0.0.0.0:{}", self_peer.http_port)
        .parse()
        .map_err(|e| Error::from(format!("invalid http bind address: {e}")))?;

    keyraft_router::serve(state, http_addr).await?;

    Ok(())
}
