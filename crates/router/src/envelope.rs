use hyper::{Body, Response, StatusCode};
use serde::Serialize;

use crate::errors::Error;

/// The JSON envelope every handler returns through (spec §6.3):
/// `{"Data": <payload>, "Error": <string|omitted>}`.
#[derive(Serialize)]
struct Envelope<T: Serialize> {
    #[serde(rename = "Data", skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(rename = "Error", skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub fn json_ok<T: Serialize>(code: StatusCode, data: T) -> Response<Body> {
    let envelope = Envelope {
        data: Some(data),
        error: None,
    };
    json_response(code, &envelope)
}

pub fn json_err(err: &Error) -> Response<Body> {
    let envelope: Envelope<()> = Envelope {
        data: None,
        error: Some(err.to_string()),
    };
    json_response(err.status(), &envelope)
}

fn json_response<T: Serialize>(code: StatusCode, envelope: &T) -> Response<Body> {
    match serde_json::to_vec(envelope) {
        Ok(body) => Response::builder()
            .status(code)
            .header("Content-Type", "application/json")
            .body(Body::from(body))
            .unwrap(),
        Err(e) => text_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to encode response: {e}"),
        ),
    }
}

pub fn text_response(code: StatusCode, text: impl Into<String>) -> Response<Body> {
    Response::builder()
        .status(code)
        .header("Content-Type", "text/plain; charset=utf-8")
        .body(Body::from(text.into()))
        .unwrap()
}

pub fn raw_response(code: StatusCode, body: Vec<u8>) -> Response<Body> {
    Response::builder()
        .status(code)
        .body(Body::from(body))
        .unwrap()
}
