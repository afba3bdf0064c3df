pub mod dirlock;
pub mod errors;
pub mod peer;

pub use dirlock::DirLock;
pub use peer::{parse_peer_list, PeerId};
