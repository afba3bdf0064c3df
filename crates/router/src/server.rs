use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};

use crate::envelope::{json_err, text_response};
use crate::errors::Error;
use crate::handlers;
use crate::state::AppState;
use crate::ui;

async fn route(state: Arc<AppState>, req: Request<Body>) -> Response<Body> {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let path = uri.path().to_string();
    let content_type = req
        .headers()
        .get(hyper::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let result = dispatch(&state, method.clone(), &uri, &path, content_type.as_deref(), req).await;

    match result {
        Ok(resp) => resp,
        Err(e) => {
            tracing::warn!(%method, %path, error = %e, "request failed");
            json_err(&e)
        }
    }
}

async fn dispatch(
    state: &AppState,
    method: Method,
    uri: &hyper::Uri,
    path: &str,
    content_type: Option<&str>,
    req: Request<Body>,
) -> Result<Response<Body>, Error> {
    match (method.clone(), path) {
        (Method::GET, "/kv/list") => handlers::kv_list(state, uri).await,
        (Method::GET, "/kv/get") => handlers::kv_get(state, uri).await,
        (Method::GET, "/kv/set") | (Method::POST, "/kv/set") => {
            let body = body_bytes(req, state.upload_limit).await?;
            handlers::kv_set(state, method, uri, content_type, body).await
        }
        (Method::GET, "/kv/del") => {
            let body = body_bytes(req, state.upload_limit).await?;
            handlers::kv_del(state, method, uri, body).await
        }
        (Method::POST, "/raft/join") => {
            let body = body_bytes(req, state.upload_limit).await?;
            handlers::raft_join(state, body).await
        }
        (Method::POST, "/raft/leave") => {
            let body = body_bytes(req, state.upload_limit).await?;
            handlers::raft_leave(state, body).await
        }
        (Method::GET, "/raft/status") => handlers::raft_status(state).await,
        (Method::GET, "/") => Ok(ui::redirect_to_ui()),
        (Method::GET, p) => Ok(ui::resource(p)),
        _ => Ok(text_response(StatusCode::METHOD_NOT_ALLOWED, "method not allowed")),
    }
}

async fn body_bytes(req: Request<Body>, limit: usize) -> Result<bytes::Bytes, Error> {
    use crate::errors::ErrorKind;

    if let Some(len) = req.headers().get(hyper::header::CONTENT_LENGTH) {
        if let Ok(len) = len.to_str().unwrap_or("").parse::<usize>() {
            if len > limit {
                return Err(ErrorKind::Malformed(format!(
                    "content-length {len} exceeds the {limit}-byte upload limit"
                ))
                .into());
            }
        }
    }

    let bytes = hyper::body::to_bytes(req.into_body()).await?;
    if bytes.len() > limit {
        return Err(ErrorKind::Malformed(format!(
            "body of {} bytes exceeds the {}-byte upload limit",
            bytes.len(),
            limit
        ))
        .into());
    }
    Ok(bytes)
}

/// Binds `addr` and serves the client-facing HTTP surface (spec §6.3)
/// until ctrl-c, mirroring the teacher's graceful-shutdown pattern
/// updated to hyper 0.14's async server builder.
pub async fn serve(state: AppState, addr: SocketAddr) -> std::io::Result<()> {
    let state = Arc::new(state);

    let make_svc = make_service_fn(move |_conn| {
        let state = state.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                let state = state.clone();
                async move { Ok::<_, Infallible>(route(state, req).await) }
            }))
        }
    });

    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let tx = Arc::new(Mutex::new(Some(tx)));
    ctrlc::set_handler(move || {
        if let Some(tx) = tx.lock().unwrap().take() {
            let _ = tx.send(());
        }
    })
    .expect("failed to install ctrl-c handler");

    tracing::info!(%addr, "request router listening");
    Server::bind(&addr)
        .serve(make_svc)
        .with_graceful_shutdown(async {
            rx.await.ok();
        })
        .await
        .map_err(|e| std::io::Error::other(e.to_string()))?;

    tracing::info!("request router shut down");
    Ok(())
}
