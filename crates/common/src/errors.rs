//! Shared error type for the plumbing bits every other crate in the
//! workspace leans on (directory locking, peer-id parsing).

error_chain::error_chain! {
    foreign_links {
        Io(std::io::Error);
    }

    errors {
        InvalidPeerId(raw: String) {
            description("malformed peerId")
            display("malformed peerId '{}', expected host:consensusPort:httpPort", raw)
        }
        AlreadyLocked(path: std::path::PathBuf) {
            description("data directory is locked by another process")
            display("data directory '{}' is locked by another process", path.display())
        }
    }
}
