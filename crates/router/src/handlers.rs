use std::collections::HashMap;

use hyper::{Body, Method, Response, StatusCode};
use keyraft_common::PeerId;
use keyraft_raftglue::KvRequest;

use crate::errors::{from_raft_error, Error, ErrorKind, Result};
use crate::envelope::{json_ok, raw_response};
use crate::forward;
use crate::state::AppState;

const KEY_PARAM: &str = "key";
const VALUE_PARAM: &str = "value";
const PEER_ID_PARAM: &str = "peerId";
const PREFIX_PARAM: &str = "prefix";
const OFFSET_PARAM: &str = "offset";
const PAGE_SIZE_PARAM: &str = "pageSize";

pub fn parse_query(uri: &hyper::Uri) -> HashMap<String, String> {
    url::form_urlencoded::parse(uri.query().unwrap_or("").as_bytes())
        .into_owned()
        .collect()
}

fn parse_form_body(body: &[u8]) -> HashMap<String, String> {
    url::form_urlencoded::parse(body).into_owned().collect()
}

/// `GET /kv/list` — local only, never forwarded (spec §4.5).
pub async fn kv_list(state: &AppState, uri: &hyper::Uri) -> Result<Response<Body>> {
    let params = parse_query(uri);
    let prefix = params.get(PREFIX_PARAM).cloned().unwrap_or_default();
    let offset = params.get(OFFSET_PARAM).cloned().unwrap_or_default();

    let page_size: i64 = match params.get(PAGE_SIZE_PARAM) {
        Some(raw) => raw
            .parse()
            .map_err(|_| ErrorKind::Malformed(format!("pageSize {raw:?} is not an integer")))?,
        None => 0,
    };
    let page_size: u32 = if page_size < 0 { 0 } else { page_size as u32 };

    let page = keyraft_store::keys_of(
        state.node.backend(),
        prefix.as_bytes(),
        offset.as_bytes(),
        page_size,
    )?;

    #[derive(serde::Serialize)]
    struct ListData {
        #[serde(rename = "Keys")]
        keys: Vec<String>,
        #[serde(rename = "NextKey")]
        next_key: String,
        #[serde(rename = "PageSize")]
        page_size: u32,
    }

    let data = ListData {
        keys: page.keys.into_iter().map(|k| String::from_utf8_lossy(&k).into_owned()).collect(),
        next_key: String::from_utf8_lossy(&page.next_key).into_owned(),
        page_size: page.page_size,
    };

    Ok(json_ok(StatusCode::OK, data))
}

/// `GET /kv/get` — local only, never forwarded: a stale local read is
/// part of the spec's deliberate non-linearizable read model (§5).
pub async fn kv_get(state: &AppState, uri: &hyper::Uri) -> Result<Response<Body>> {
    let params = parse_query(uri);
    let key = params.get(KEY_PARAM).cloned().unwrap_or_default();

    let data_key = keyraft_store::keys::data_key(key.as_bytes());
    let value = state.node.backend().get_raw_opt(&data_key)?;

    match value {
        Some(bytes) => Ok(raw_response(StatusCode::OK, bytes)),
        None => Err(ErrorKind::NotFound.into()),
    }
}

async fn value_from_request(
    state: &AppState,
    method: &Method,
    uri: &hyper::Uri,
    content_type: Option<&str>,
    body: bytes::Bytes,
) -> Result<(String, Vec<u8>)> {
    let params = parse_query(uri);
    let key = params.get(KEY_PARAM).cloned().unwrap_or_default();

    if *method == Method::GET {
        let value = params.get(VALUE_PARAM).cloned().unwrap_or_default();
        return Ok((key, value.into_bytes()));
    }

    if body.len() > state.upload_limit {
        return Err(ErrorKind::Malformed(format!(
            "body of {} bytes exceeds the {}-byte upload limit",
            body.len(),
            state.upload_limit
        ))
        .into());
    }

    let is_multipart = content_type
        .map(|ct| ct.contains("multipart/form-data"))
        .unwrap_or(false);

    if is_multipart {
        let boundary = content_type
            .and_then(|ct| multer::parse_boundary(ct).ok())
            .ok_or_else(|| ErrorKind::Malformed("missing multipart boundary".into()))?;
        let mut multipart = multer::Multipart::new(futures::stream::once(async { Ok::<_, std::io::Error>(body) }), boundary);

        while let Some(field) = multipart.next_field().await? {
            if field.name() == Some(VALUE_PARAM) {
                let bytes = field.bytes().await?;
                if bytes.len() > state.upload_limit {
                    return Err(ErrorKind::Malformed(format!(
                        "value part of {} bytes exceeds the {}-byte upload limit",
                        bytes.len(),
                        state.upload_limit
                    ))
                    .into());
                }
                return Ok((key, bytes.to_vec()));
            }
        }
        Err(ErrorKind::Malformed("multipart body has no \"value\" part".into()).into())
    } else {
        let form = parse_form_body(&body);
        if let Some(value) = form.get(VALUE_PARAM) {
            Ok((key, value.clone().into_bytes()))
        } else {
            Ok((key, body.to_vec()))
        }
    }
}

/// `GET|POST /kv/set` — leader-only; forwarded to the leader otherwise
/// (spec §4.5).
pub async fn kv_set(
    state: &AppState,
    method: Method,
    uri: &hyper::Uri,
    content_type: Option<&str>,
    body: bytes::Bytes,
) -> Result<Response<Body>> {
    if !state.node.is_leader().await {
        let path_and_query = uri.path_and_query().map(|p| p.as_str()).unwrap_or(uri.path());
        return forward::forward(state, method, path_and_query, content_type, body).await;
    }

    let (key, value) = value_from_request(state, &method, uri, content_type, body).await?;

    state
        .node
        .propose(KvRequest::Set { key: key.clone(), value })
        .await
        .map_err(from_raft_error)?;

    Ok(json_ok(StatusCode::OK, key))
}

/// `GET /kv/del` — leader-only; forwarded otherwise.
pub async fn kv_del(
    state: &AppState,
    method: Method,
    uri: &hyper::Uri,
    body: bytes::Bytes,
) -> Result<Response<Body>> {
    if !state.node.is_leader().await {
        let path_and_query = uri.path_and_query().map(|p| p.as_str()).unwrap_or(uri.path());
        return forward::forward(state, method, path_and_query, None, body).await;
    }

    let params = parse_query(uri);
    let key = params.get(KEY_PARAM).cloned().unwrap_or_default();

    state
        .node
        .propose(KvRequest::Delete { key: key.clone() })
        .await
        .map_err(from_raft_error)?;

    Ok(json_ok(StatusCode::OK, key))
}

/// `GET /raft/status` — the consensus runtime's telemetry snapshot,
/// served locally regardless of leadership.
pub async fn raft_status(state: &AppState) -> Result<Response<Body>> {
    Ok(json_ok(StatusCode::OK, state.node.metrics_json()))
}

fn peer_param(params: &HashMap<String, String>) -> Result<PeerId> {
    let raw = params
        .get(PEER_ID_PARAM)
        .ok_or_else(|| ErrorKind::Malformed("missing peerId parameter".into()))?;
    raw.parse()
        .map_err(|_| Error::from(ErrorKind::Malformed(format!("invalid peerId {raw:?}"))))
}

/// `POST /raft/join` — leader-only; 201 + stats on success (spec §6.3).
pub async fn raft_join(state: &AppState, body: bytes::Bytes) -> Result<Response<Body>> {
    if !state.node.is_leader().await {
        return Err(ErrorKind::NotLeader.into());
    }

    let params = parse_form_body(&body);
    let peer = peer_param(&params)?;

    state.node.add_learner(&peer).await.map_err(from_raft_error)?;
    state.node.promote_voter(&peer).await.map_err(from_raft_error)?;

    Ok(json_ok(StatusCode::CREATED, state.node.metrics_json()))
}

/// `POST /raft/leave` — leader-only; 410 + stats on success.
pub async fn raft_leave(state: &AppState, body: bytes::Bytes) -> Result<Response<Body>> {
    if !state.node.is_leader().await {
        return Err(ErrorKind::NotLeader.into());
    }

    let params = parse_form_body(&body);
    let peer = peer_param(&params)?;

    state.node.remove_member(&peer).await.map_err(from_raft_error)?;

    Ok(json_ok(StatusCode::GONE, state.node.metrics_json()))
}
