//! End-to-end coverage of spec scenarios 1, 3 and 4: a lone peer is
//! always its own leader, so these exercise the full HTTP surface
//! without needing a multi-process cluster.

use std::net::{SocketAddr, TcpListener};
use std::str::FromStr;
use std::time::Duration;

use keyraft_common::PeerId;
use keyraft_raftglue::RaftNode;
use keyraft_router::AppState;

/// Reserves two OS-assigned ports (raft + http) without holding them
/// open, the way a single-node test harness picks unused ports when it
/// has no fixed port plan to work from.
fn reserve_two_ports() -> (u16, u16) {
    let a = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
    let b = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
    (a, b)
}

async fn start_single_node() -> (tempfile::TempDir, SocketAddr, String) {
    let (raft_port, http_port) = reserve_two_ports();
    let peer_id = format!("127.0.0.1:{raft_port}:{http_port}");
    let self_peer = PeerId::from_str(&peer_id).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let node = RaftNode::start(self_peer, Vec::new(), dir.path()).await.unwrap();

    // A freshly initialized single-voter cluster elects itself leader
    // almost immediately; poll rather than assume a fixed delay.
    for _ in 0..100 {
        if node.is_leader().await {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(node.is_leader().await, "single-node cluster never became leader");

    let state = AppState::new(node);
    let http_addr: SocketAddr = format!("127.0.0.1:{http_port}").parse().unwrap();
    tokio::spawn(keyraft_router::serve(state, http_addr));

    // Give the listener a moment to bind before the first request lands.
    tokio::time::sleep(Duration::from_millis(100)).await;

    (dir, http_addr, format!("http://127.0.0.1:{http_port}"))
}

#[tokio::test]
async fn set_then_get_round_trips() {
    let (_dir, _addr, base) = start_single_node().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{base}/kv/set?key=alpha&value=one"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client.get(format!("{base}/kv/get?key=alpha")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "one");
}

#[tokio::test]
async fn del_then_get_is_404() {
    let (_dir, _addr, base) = start_single_node().await;
    let client = reqwest::Client::new();

    client
        .get(format!("{base}/kv/set?key=x&value=1"))
        .send()
        .await
        .unwrap();
    let resp = client.get(format!("{base}/kv/del?key=x")).send().await.unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client.get(format!("{base}/kv/get?key=x")).send().await.unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn get_of_missing_key_is_404() {
    let (_dir, _addr, base) = start_single_node().await;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{base}/kv/get?key=never-set")).send().await.unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn pagination_walks_the_full_key_set() {
    let (_dir, _addr, base) = start_single_node().await;
    let client = reqwest::Client::new();

    for i in 0..25 {
        let key = format!("k{i}");
        client
            .get(format!("{base}/kv/set?key={key}&value=v"))
            .send()
            .await
            .unwrap();
    }

    let mut seen = Vec::new();
    let mut offset = String::new();
    loop {
        let resp = client
            .get(format!("{base}/kv/list?prefix=k&pageSize=7&offset={offset}"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        let data = &body["Data"];
        let keys = data["Keys"].as_array().unwrap();
        seen.extend(keys.iter().map(|k| k.as_str().unwrap().to_string()));

        let next = data["NextKey"].as_str().unwrap_or("").to_string();
        if next.is_empty() {
            break;
        }
        offset = next;
    }

    assert_eq!(seen.len(), 25);
    let mut sorted = seen.clone();
    sorted.sort();
    assert_eq!(seen, sorted, "pagination should walk keys in lexicographic order");
}

#[tokio::test]
async fn oversize_upload_is_rejected() {
    let (_dir, _addr, base) = start_single_node().await;
    let client = reqwest::Client::new();

    let oversized = vec![b'a'; 9 * 1024 * 1024];
    let resp = client
        .post(format!("{base}/kv/set?key=big"))
        .header("Content-Length", oversized.len().to_string())
        .body(oversized)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn status_endpoint_reports_self_as_leader() {
    let (_dir, _addr, base) = start_single_node().await;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{base}/raft/status")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["Data"]["current_leader"].is_number());
}
