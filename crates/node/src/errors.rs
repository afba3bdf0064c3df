error_chain::error_chain! {
    foreign_links {
        Io(std::io::Error);
        Peer(keyraft_common::errors::Error);
        Raft(keyraft_raftglue::Error);
    }
}
