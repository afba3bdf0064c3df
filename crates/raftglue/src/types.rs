use serde::{Deserialize, Serialize};

/// The consensus runtime's own identity for a peer. `openraft` is
/// transport-agnostic — it just needs something `Ord + Hash + Display`
/// to key its membership map by — so this workspace keeps it as a plain
/// `u64` derived from the peer's full `peerId` string
/// (`keyraft_common::PeerId::node_id`), and carries the peer's raft
/// address (`host:consensusPort`) in the paired `BasicNode`.
pub type NodeId = u64;

/// A command proposed through consensus. Mirrors
/// `keyraft_store::Command` but as openraft's native app-data type `D`,
/// so the log storage bridge can translate to/from the store crate's
/// JSON wire format at the edges without coupling openraft's `Entry<_>`
/// type to it directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum KvRequest {
    Set { key: String, value: Vec<u8> },
    Delete { key: String },
}

impl KvRequest {
    pub fn into_command(self) -> keyraft_store::Command {
        match self {
            KvRequest::Set { key, value } => keyraft_store::Command::set(key, value),
            KvRequest::Delete { key } => keyraft_store::Command::del(key),
        }
    }
}

/// openraft's app response type `R`: what applying one `KvRequest`
/// produced, per spec's "opaque success with the value echoed" / "opaque
/// success" outcomes for SET / DEL respectively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KvResponse {
    pub value: Option<Vec<u8>>,
}

openraft::declare_raft_types!(
    pub TypeConfig:
        D = KvRequest,
        R = KvResponse,
        NodeId = NodeId,
        Node = openraft::BasicNode,
        Entry = openraft::Entry<TypeConfig>,
        SnapshotData = std::io::Cursor<Vec<u8>>,
);
