error_chain::error_chain! {
    foreign_links {
        Io(std::io::Error);
        Sled(sled::Error);
        Json(serde_json::Error);
        MsgpackEncode(rmp_serde::encode::Error);
        MsgpackDecode(rmp_serde::decode::Error);
    }

    errors {
        /// Sentinel: key absent in the backend. Not an I/O failure.
        NotFound {
            description("key not found")
            display("key not found")
        }
        /// Sentinel distinct from NotFound: asked for a log index that
        /// either never existed or was truncated away.
        LogNotFound(index: u64) {
            description("log entry not found")
            display("log entry {} not found", index)
        }
    }
}
