use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::errors::*;

/// A cluster member's identifier, `host:consensusPort:httpPort`.
///
/// The consensus runtime only ever sees `host:consensusPort`
/// (`PeerId::raft_addr`); the request router derives the peer's HTTP
/// endpoint (`PeerId::http_addr`) from the very same string, so the two
/// subsystems never need a side channel to agree on where a peer lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerId {
    pub host: String,
    pub raft_port: u16,
    pub http_port: u16,
}

impl PeerId {
    pub fn raft_addr(&self) -> String {
        format!("{}:{}", self.host, self.raft_port)
    }

    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.host, self.http_port)
    }

    /// A stable numeric id derived from the full peerId string.
    ///
    /// `DefaultHasher` uses a fixed (not per-process-randomized) key, so
    /// this is deterministic across every peer in the cluster, which is
    /// what lets openraft's `NodeId` be a plain `u64` instead of forcing
    /// the whole stack to carry the string around.
    pub fn node_id(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.to_string().hash(&mut hasher);
        hasher.finish()
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.host, self.raft_port, self.http_port)
    }
}

impl FromStr for PeerId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.rsplitn(3, ':');
        let http_port = parts
            .next()
            .ok_or_else(|| ErrorKind::InvalidPeerId(s.to_string()))?;
        let raft_port = parts
            .next()
            .ok_or_else(|| ErrorKind::InvalidPeerId(s.to_string()))?;
        let host = parts
            .next()
            .ok_or_else(|| ErrorKind::InvalidPeerId(s.to_string()))?;

        if parts.next().is_some() {
            return Err(ErrorKind::InvalidPeerId(s.to_string()).into());
        }

        let raft_port: u16 = raft_port
            .parse()
            .map_err(|_| ErrorKind::InvalidPeerId(s.to_string()))?;
        let http_port: u16 = http_port
            .parse()
            .map_err(|_| ErrorKind::InvalidPeerId(s.to_string()))?;

        Ok(PeerId {
            host: host.to_string(),
            raft_port,
            http_port,
        })
    }
}

/// Parses a comma-separated `--join host:p:h,host:p:h` list.
pub fn parse_peer_list(raw: &str) -> Result<Vec<PeerId>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PeerId::from_str)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_display() {
        let p: PeerId = "127.0.0.1:9000:8000".parse().unwrap();
        assert_eq!(p.raft_addr(), "127.0.0.1:9000");
        assert_eq!(p.http_addr(), "127.0.0.1:8000");
        assert_eq!(p.to_string(), "127.0.0.1:9000:8000");
    }

    #[test]
    fn node_id_is_deterministic() {
        let a: PeerId = "127.0.0.1:9000:8000".parse().unwrap();
        let b: PeerId = "127.0.0.1:9000:8000".parse().unwrap();
        assert_eq!(a.node_id(), b.node_id());
    }

    #[test]
    fn rejects_malformed() {
        assert!("127.0.0.1:9000".parse::<PeerId>().is_err());
        assert!("not-a-peer".parse::<PeerId>().is_err());
    }

    #[test]
    fn parses_join_list() {
        let peers = parse_peer_list("a:1:2, b:3:4").unwrap();
        assert_eq!(peers.len(), 2);
        assert_eq!(peers[1].host, "b");
    }
}
