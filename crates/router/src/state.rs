use keyraft_raftglue::RaftNode;

/// Default cap on POST bodies and multipart value parts (spec §6.3).
pub const DEFAULT_UPLOAD_LIMIT: usize = 8 * 1024 * 1024;

/// Everything a handler needs: the running consensus node (and through
/// it, the shared backend for local reads) plus the HTTP client used to
/// forward a write to the current leader.
#[derive(Clone)]
pub struct AppState {
    pub node: RaftNode,
    pub http: reqwest::Client,
    pub upload_limit: usize,
}

impl AppState {
    pub fn new(node: RaftNode) -> Self {
        AppState {
            node,
            http: reqwest::Client::new(),
            upload_limit: DEFAULT_UPLOAD_LIMIT,
        }
    }

    pub fn with_upload_limit(mut self, limit: usize) -> Self {
        self.upload_limit = limit;
        self
    }
}
