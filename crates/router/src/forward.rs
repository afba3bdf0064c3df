use hyper::{Body, Method, Response};
use keyraft_common::PeerId;

use crate::errors::{Error, ErrorKind, Result};
use crate::state::AppState;

/// Looks up the current leader's `peerId` in the cluster configuration
/// consensus reports, returning its HTTP endpoint. `LeaderNotFound` when
/// no leader is known or the reported leader is absent from the
/// configuration the local node can see (spec §4.5).
pub async fn leader_http_addr(state: &AppState) -> Result<String> {
    let leader_id = state
        .node
        .current_leader()
        .await
        .ok_or(ErrorKind::LeaderNotFound)?;

    let addrs = state.node.membership_addrs().await;
    let peer_id_str = addrs.get(&leader_id).ok_or(ErrorKind::LeaderNotFound)?;
    let peer: PeerId = peer_id_str
        .parse()
        .map_err(|_| Error::from(ErrorKind::LeaderNotFound))?;
    Ok(peer.http_addr())
}

/// Re-issues the client's request (same method, same body, same
/// content type) against the leader at `path_and_query`, relaying its
/// status and body verbatim — the `Upstream` outcome of spec §7's error
/// taxonomy.
pub async fn forward(
    state: &AppState,
    method: Method,
    path_and_query: &str,
    content_type: Option<&str>,
    body: bytes::Bytes,
) -> Result<Response<Body>> {
    let leader_addr = leader_http_addr(state).await?;
    let url = format!("http://{leader_addr}{path_and_query}");

    tracing::debug!(%url, %method, "forwarding write to leader");

    let mut req = state.http.request(method, &url);
    if let Some(ct) = content_type {
        req = req.header(reqwest::header::CONTENT_TYPE, ct);
    }

    let resp = req
        .body(body)
        .send()
        .await
        .map_err(|e| Error::from(ErrorKind::Upstream(502, e.to_string())))?;

    let status = resp.status();
    let content_type = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    let bytes = resp
        .bytes()
        .await
        .map_err(|e| Error::from(ErrorKind::Upstream(502, e.to_string())))?;

    Ok(Response::builder()
        .status(status.as_u16())
        .header("Content-Type", content_type)
        .body(Body::from(bytes))
        .unwrap())
}
