use hyper::{Body, Response, StatusCode};

use crate::envelope::raw_response;

pub const UI_PATH: &str = "/ui";
const INDEX_JS_PATH: &str = "/ui/vephar.js";
const INDEX_CSS_PATH: &str = "/ui/vephar.css";
const FAVICON_PATH: &str = "/favicon.ico";

const ROOT_HTML: &str = r#"<!DOCTYPE html>
<html>
	<head>
		<base href="/" />
		<meta charset="utf-8" />
		<meta name="viewport" content="width=device-width, initial-scale=1.0">
		<link rel="stylesheet" href="/ui/vephar.css" />
	</head>
	<body class="dark">
		<div id="root"></div>
		<script src="/ui/vephar.js"></script>
	</body>
</html>
"#;

fn ui_root() -> Response<Body> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "text/html; charset=utf-8")
        .body(Body::from(ROOT_HTML))
        .unwrap()
}

/// Serves the handful of static assets the router fronts (spec calls
/// this peripheral — no bundler output ships with this workspace, so
/// the script/stylesheet are empty rather than fabricated).
pub fn resource(path: &str) -> Response<Body> {
    match path {
        UI_PATH => ui_root(),
        INDEX_JS_PATH => text_asset(Vec::new(), "text/javascript"),
        INDEX_CSS_PATH => text_asset(Vec::new(), "text/css"),
        FAVICON_PATH => text_asset(Vec::new(), "image/x-icon"),
        _ if path.starts_with(UI_PATH) => ui_root(),
        _ => raw_response(StatusCode::NOT_FOUND, Vec::new()),
    }
}

fn text_asset(bytes: Vec<u8>, content_type: &'static str) -> Response<Body> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", content_type)
        .body(Body::from(bytes))
        .unwrap()
}

/// `GET /` — 301 to `/ui`.
pub fn redirect_to_ui() -> Response<Body> {
    Response::builder()
        .status(StatusCode::MOVED_PERMANENTLY)
        .header("Location", UI_PATH)
        .body(Body::empty())
        .unwrap()
}
