//! The concrete consensus runtime: `openraft::Raft<TypeConfig>` wired to
//! a sled-backed log/stable store, a key-value state machine, and an
//! HTTP network transport. Everything outside this crate only ever
//! touches consensus through [`RaftNode`] — it is the sole place that
//! knows both `keyraft_store`'s contract and openraft's types.

pub mod errors;
pub mod log_storage;
pub mod network;
pub mod state_machine;
pub mod types;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use keyraft_common::PeerId;
use keyraft_store::{Backend, LogStore, StableStore};
use openraft::error::{ClientWriteError, RaftError};
use openraft::{BasicNode, Config, Raft};

pub use errors::*;
pub use types::{KvRequest, KvResponse, NodeId, TypeConfig};

use log_storage::SledLogStorage;
use network::HttpNetworkFactory;
use state_machine::KvStateMachine;

/// How long a write waits for its proposal to commit before the caller
/// gives up and reports a timeout (spec §5, §7).
pub const PROPOSE_TIMEOUT: Duration = Duration::from_secs(10);

const ELECTION_TIMEOUT_MIN_MS: u64 = 400;
const ELECTION_TIMEOUT_MAX_MS: u64 = 800;
const HEARTBEAT_INTERVAL_MS: u64 = 150;

/// Owns the running consensus instance for this process: the openraft
/// handle, its node id, and the state machine's backend handle (so the
/// router can serve local reads without going through consensus).
#[derive(Clone)]
pub struct RaftNode {
    pub raft: Raft<TypeConfig>,
    pub node_id: NodeId,
    pub self_peer: PeerId,
    pub state_machine: KvStateMachine,
}

impl RaftNode {
    /// Opens the backend at `data_dir/badger`, wires up the log/stable
    /// adapter and state machine, and brings up `openraft::Raft`. On a
    /// genuinely fresh data directory, initializes the cluster with the
    /// union of `self_peer` and `join_peers`, deduplicated (spec §3);
    /// on a restart this is a harmless no-op (openraft refuses to
    /// re-initialize a non-empty log).
    pub async fn start(
        self_peer: PeerId,
        join_peers: Vec<PeerId>,
        data_dir: &Path,
    ) -> Result<Self> {
        let backend = Backend::open(&data_dir.join("badger"))?;
        let log_store = SledLogStorage::new(LogStore::new(backend.clone()), StableStore::new(backend.clone()))
            .map_err(|e| Error::from(e.to_string()))?;
        let state_machine = KvStateMachine::new(backend);

        let config = Arc::new(
            Config {
                heartbeat_interval: HEARTBEAT_INTERVAL_MS,
                election_timeout_min: ELECTION_TIMEOUT_MIN_MS,
                election_timeout_max: ELECTION_TIMEOUT_MAX_MS,
                ..Default::default()
            }
            .validate()
            .map_err(|e| Error::from(e.to_string()))?,
        );

        let node_id = self_peer.node_id();
        let network = HttpNetworkFactory::new();

        let raft = Raft::new(node_id, config, network, log_store, state_machine.clone())
            .await
            .map_err(|e| Error::from(e.to_string()))?;

        // `BasicNode::addr` carries the *full* peerId string, not just the
        // raft half: the router needs the http half to derive a leader's
        // HTTP endpoint (spec §4.5), and this is the one place every
        // component agrees on a peer's identity. `network::HttpNetwork`
        // parses the raft half back out before dialing.
        let mut members: BTreeMap<NodeId, BasicNode> = BTreeMap::new();
        members.insert(node_id, BasicNode::new(self_peer.to_string()));
        for peer in &join_peers {
            members.insert(peer.node_id(), BasicNode::new(peer.to_string()));
        }

        match raft.initialize(members).await {
            Ok(()) => tracing::info!(%self_peer, "cluster initialized"),
            Err(e) => tracing::debug!(error = %e, "skipping initialize (already initialized)"),
        }

        // Bind on all interfaces rather than `self_peer.raft_addr()`
        // verbatim: `peerId`'s host half may be a DNS name other peers
        // dial us by, which `SocketAddr` can't parse as a bind address.
        let rpc_addr: std::net::SocketAddr = format!("0.0.0.0:{}", self_peer.raft_port)
            .parse()
            .map_err(|e| Error::from(format!("invalid consensus bind address: {e}")))?;
        let rpc_raft = Arc::new(raft.clone());
        tokio::spawn(async move {
            if let Err(e) = network::serve(rpc_raft, rpc_addr).await {
                tracing::error!(error = %e, "raft rpc listener exited");
            }
        });

        Ok(RaftNode {
            raft,
            node_id,
            self_peer,
            state_machine,
        })
    }

    pub fn backend(&self) -> &Backend {
        self.state_machine.backend()
    }

    /// Proposes a command and waits (bounded by [`PROPOSE_TIMEOUT`]) for
    /// it to commit. `NotLeader` carries the current leader hint so the
    /// router can forward without a second round trip to discover it.
    pub async fn propose(&self, request: KvRequest) -> Result<KvResponse> {
        let fut = self.raft.client_write(request);
        match tokio::time::timeout(PROPOSE_TIMEOUT, fut).await {
            Err(_elapsed) => Err(ErrorKind::ProposalTimedOut.into()),
            Ok(Err(RaftError::APIError(ClientWriteError::ForwardToLeader(forward)))) => {
                Err(ErrorKind::NotLeader(forward.leader_id).into())
            }
            Ok(Err(e)) => Err(Error::from(e.to_string())),
            Ok(Ok(resp)) => Ok(resp.data),
        }
    }

    /// The node id the consensus runtime currently believes is leader,
    /// if any.
    pub async fn current_leader(&self) -> Option<NodeId> {
        self.raft.current_leader().await
    }

    pub async fn is_leader(&self) -> bool {
        self.current_leader().await == Some(self.node_id)
    }

    /// `NodeId` → full `peerId` string for every voter/learner currently
    /// in the cluster configuration, used by the router to resolve the
    /// leader's HTTP endpoint.
    pub async fn membership_addrs(&self) -> BTreeMap<NodeId, String> {
        let metrics = self.raft.metrics().borrow().clone();
        metrics
            .membership_config
            .nodes()
            .map(|(id, node)| (*id, node.addr.clone()))
            .collect()
    }

    pub async fn add_learner(&self, peer: &PeerId) -> Result<()> {
        self.raft
            .add_learner(peer.node_id(), BasicNode::new(peer.to_string()), true)
            .await
            .map_err(|e| Error::from(e.to_string()))?;
        Ok(())
    }

    pub async fn promote_voter(&self, peer: &PeerId) -> Result<()> {
        let mut ids: std::collections::BTreeSet<NodeId> = self
            .raft
            .metrics()
            .borrow()
            .membership_config
            .voter_ids()
            .collect();
        ids.insert(peer.node_id());
        self.raft
            .change_membership(ids, false)
            .await
            .map_err(|e| Error::from(e.to_string()))?;
        Ok(())
    }

    pub async fn remove_member(&self, peer: &PeerId) -> Result<()> {
        let mut ids: std::collections::BTreeSet<NodeId> = self
            .raft
            .metrics()
            .borrow()
            .membership_config
            .voter_ids()
            .collect();
        ids.remove(&peer.node_id());
        self.raft
            .change_membership(ids, false)
            .await
            .map_err(|e| Error::from(e.to_string()))?;
        Ok(())
    }

    /// Raw telemetry snapshot for the `/raft/status` endpoint.
    pub fn metrics_json(&self) -> serde_json::Value {
        serde_json::to_value(&*self.raft.metrics().borrow()).unwrap_or(serde_json::Value::Null)
    }
}
