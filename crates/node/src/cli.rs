use std::path::PathBuf;

use clap::Parser;

/// A replicated key-value store peer.
///
/// Brings up one node of the cluster: opens (or creates) its data
/// directory, starts the consensus runtime, and serves the client HTTP
/// surface on the peerId's http port.
#[derive(Debug, Parser)]
#[command(name = "keyraft-node", version)]
pub struct Cli {
    /// This node's identity, `host:consensusPort:httpPort`.
    #[arg(long = "peerId")]
    pub peer_id: String,

    /// Data storage directory.
    #[arg(long = "data")]
    pub data: PathBuf,

    /// Comma-separated list of host:raftPort:httpPort cluster nodes to
    /// bootstrap with, in addition to this node.
    #[arg(long = "join", default_value = "")]
    pub join: String,
}
