error_chain::error_chain! {
    foreign_links {
        Io(std::io::Error);
        Json(serde_json::Error);
        Store(keyraft_store::Error);
        Reqwest(reqwest::Error);
        Peer(keyraft_common::errors::Error);
    }

    errors {
        NotLeader(leader_hint: Option<u64>) {
            description("not the leader")
            display("not the leader (hint: {:?})", leader_hint)
        }
        ProposalTimedOut {
            description("proposal did not commit before the deadline")
            display("proposal did not commit within the configured timeout")
        }
    }
}
