use std::sync::Arc;
use std::time::Duration;

use hyper::{Body, Request, Response, Server, StatusCode};
use hyper::service::{make_service_fn, service_fn};
use keyraft_common::PeerId;
use openraft::error::{InstallSnapshotError, NetworkError, RPCError, RaftError, Unreachable};
use openraft::network::{RaftNetwork, RaftNetworkFactory, RPCOption};
use openraft::raft::{
    AppendEntriesRequest, AppendEntriesResponse, InstallSnapshotRequest, InstallSnapshotResponse,
    VoteRequest, VoteResponse,
};
use openraft::{BasicNode, Raft};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::types::{NodeId, TypeConfig};

const APPEND_ENTRIES_PATH: &str = "/raft/rpc/append-entries";
const INSTALL_SNAPSHOT_PATH: &str = "/raft/rpc/install-snapshot";
const VOTE_PATH: &str = "/raft/rpc/vote";

/// openraft is transport-agnostic; this is the wire plumbing the
/// original owned via `raft.NewTCPTransport`, reimplemented as plain
/// HTTP+JSON over each peer's consensus port (`peerId`'s middle field).
#[derive(Clone)]
pub struct HttpNetworkFactory {
    client: reqwest::Client,
}

impl HttpNetworkFactory {
    pub fn new() -> Self {
        HttpNetworkFactory {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("reqwest client"),
        }
    }
}

impl Default for HttpNetworkFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl RaftNetworkFactory<TypeConfig> for HttpNetworkFactory {
    type Network = HttpNetwork;

    async fn new_client(&mut self, target: NodeId, node: &BasicNode) -> Self::Network {
        // `node.addr` is the peer's full `peerId` (host:raftPort:httpPort);
        // only the raft half is a dial target for this channel.
        let addr = match node.addr.parse::<PeerId>() {
            Ok(peer) => peer.raft_addr(),
            Err(_) => node.addr.clone(),
        };
        HttpNetwork {
            client: self.client.clone(),
            target,
            addr,
        }
    }
}

pub struct HttpNetwork {
    client: reqwest::Client,
    target: NodeId,
    addr: String,
}

impl HttpNetwork {
    async fn post<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        path: &str,
        rpc: &Req,
    ) -> Result<Resp, RPCError<NodeId, BasicNode, RaftError<NodeId>>> {
        let url = format!("http://{}{}", self.addr, path);
        let resp = self
            .client
            .post(&url)
            .json(rpc)
            .send()
            .await
            .map_err(|e| RPCError::Unreachable(Unreachable::new(&e)))?;

        resp.json::<Resp>()
            .await
            .map_err(|e| RPCError::Network(NetworkError::new(&e)))
    }
}

impl RaftNetwork<TypeConfig> for HttpNetwork {
    async fn append_entries(
        &mut self,
        rpc: AppendEntriesRequest<TypeConfig>,
        _option: RPCOption,
    ) -> Result<AppendEntriesResponse<NodeId>, RPCError<NodeId, BasicNode, RaftError<NodeId>>> {
        self.post(APPEND_ENTRIES_PATH, &rpc).await
    }

    async fn install_snapshot(
        &mut self,
        rpc: InstallSnapshotRequest<TypeConfig>,
        _option: RPCOption,
    ) -> Result<
        InstallSnapshotResponse<NodeId>,
        RPCError<NodeId, BasicNode, RaftError<NodeId, InstallSnapshotError>>,
    > {
        let url = format!("http://{}{}", self.addr, INSTALL_SNAPSHOT_PATH);
        let resp = self
            .client
            .post(&url)
            .json(&rpc)
            .send()
            .await
            .map_err(|e| RPCError::Unreachable(Unreachable::new(&e)))?;
        resp.json()
            .await
            .map_err(|e| RPCError::Network(NetworkError::new(&e)))
    }

    async fn vote(
        &mut self,
        rpc: VoteRequest<NodeId>,
        _option: RPCOption,
    ) -> Result<VoteResponse<NodeId>, RPCError<NodeId, BasicNode, RaftError<NodeId>>> {
        self.post(VOTE_PATH, &rpc).await
    }
}

type KvRaft = Raft<TypeConfig>;

async fn rpc_handler(raft: Arc<KvRaft>, req: Request<Body>) -> Response<Body> {
    let path = req.uri().path().to_string();
    let body = match hyper::body::to_bytes(req.into_body()).await {
        Ok(b) => b,
        Err(e) => return json_error(&e),
    };

    match path.as_str() {
        APPEND_ENTRIES_PATH => match serde_json::from_slice(&body) {
            Ok(rpc) => match raft.append_entries(rpc).await {
                Ok(resp) => json_ok(&resp),
                Err(e) => json_error(&e),
            },
            Err(e) => json_error(&e),
        },
        INSTALL_SNAPSHOT_PATH => match serde_json::from_slice(&body) {
            Ok(rpc) => match raft.install_snapshot(rpc).await {
                Ok(resp) => json_ok(&resp),
                Err(e) => json_error(&e),
            },
            Err(e) => json_error(&e),
        },
        VOTE_PATH => match serde_json::from_slice(&body) {
            Ok(rpc) => match raft.vote(rpc).await {
                Ok(resp) => json_ok(&resp),
                Err(e) => json_error(&e),
            },
            Err(e) => json_error(&e),
        },
        _ => Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Body::empty())
            .unwrap(),
    }
}

fn json_ok<T: Serialize>(value: &T) -> Response<Body> {
    let body = serde_json::to_vec(value).unwrap_or_default();
    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

fn json_error(e: &impl std::fmt::Debug) -> Response<Body> {
    tracing::warn!(error = ?e, "raft rpc handler error");
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .body(Body::empty())
        .unwrap()
}

/// Serves the three internal Raft RPCs (`append_entries`/
/// `install_snapshot`/`vote`) on the node's consensus port. This is a
/// separate listener from the client-facing request router, which binds
/// the `httpPort` half of `peerId` instead.
pub async fn serve(raft: Arc<KvRaft>, addr: std::net::SocketAddr) -> std::io::Result<()> {
    let make_svc = make_service_fn(move |_conn| {
        let raft = raft.clone();
        async move {
            Ok::<_, std::convert::Infallible>(service_fn(move |req| {
                let raft = raft.clone();
                async move { Ok::<_, std::convert::Infallible>(rpc_handler(raft, req).await) }
            }))
        }
    });

    tracing::info!(%addr, "raft rpc listener starting");
    Server::bind(&addr)
        .serve(make_svc)
        .await
        .map_err(|e| std::io::Error::other(e.to_string()))
}
