use hyper::StatusCode;

error_chain::error_chain! {
    foreign_links {
        Io(std::io::Error);
        Json(serde_json::Error);
        Store(keyraft_store::Error);
        Raft(keyraft_raftglue::Error);
        Peer(keyraft_common::errors::Error);
        Reqwest(reqwest::Error);
        Multipart(multer::Error);
        Hyper(hyper::Error);
    }

    errors {
        /// Key absent in the FSM (spec §7 NotFound, kv path).
        NotFound {
            description("key not found")
            display("key not found")
        }
        /// A write or admin op has nowhere to go: not leader, and no
        /// leader known to forward to.
        NotLeader {
            description("not the leader")
            display("not the leader")
        }
        LeaderNotFound {
            description("leader not found")
            display("leader not found")
        }
        ProposalTimedOut {
            description("proposal did not commit before the deadline")
            display("proposal did not commit within the configured timeout")
        }
        /// Bad form parameters, bad body, oversize upload.
        Malformed(reason: String) {
            description("malformed request")
            display("malformed request: {}", reason)
        }
        /// A forwarded request's own failure, distinct from this node
        /// failing to reach the leader at all.
        Upstream(status: u16, body: String) {
            description("upstream error")
            display("upstream returned {}: {}", status, body)
        }
    }
}

impl ErrorKind {
    /// Maps the error taxonomy (spec §7) onto the HTTP status the
    /// handler returns.
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::NotLeader => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::LeaderNotFound => StatusCode::BAD_GATEWAY,
            ErrorKind::ProposalTimedOut => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::Malformed(_) => StatusCode::BAD_REQUEST,
            ErrorKind::Upstream(status, _) => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            ErrorKind::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::Raft(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::Peer(_) => StatusCode::BAD_REQUEST,
            ErrorKind::Reqwest(_) => StatusCode::BAD_GATEWAY,
            ErrorKind::Multipart(_) => StatusCode::BAD_REQUEST,
            ErrorKind::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::Hyper(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::Msg(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl Error {
    pub fn status(&self) -> StatusCode {
        self.0.status()
    }
}

/// Translates a `keyraft_raftglue::Error` raised by a proposal into this
/// crate's taxonomy, keeping the leader hint on `NotLeader` accessible to
/// the forwarding path rather than collapsing it into a string.
pub fn from_raft_error(e: keyraft_raftglue::Error) -> Error {
    match e.0 {
        keyraft_raftglue::ErrorKind::NotLeader(_) => ErrorKind::NotLeader.into(),
        keyraft_raftglue::ErrorKind::ProposalTimedOut => ErrorKind::ProposalTimedOut.into(),
        _ => Error::from(e),
    }
}
