//! The client-facing HTTP surface (spec §4.5, §6.3): local reads,
//! leader-only writes with same-method/same-body forwarding, and the
//! admin join/leave/status surface, all proxied to a [`keyraft_raftglue::RaftNode`].

pub mod envelope;
pub mod errors;
pub mod forward;
pub mod handlers;
pub mod server;
pub mod state;
pub mod ui;

pub use errors::{Error, ErrorKind, Result};
pub use server::serve;
pub use state::AppState;
