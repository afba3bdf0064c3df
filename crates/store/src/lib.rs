//! The embedded durable backend: an ordered key-value engine (`sled`)
//! holding four disjoint namespaces (`rft:`, `sst:`, `u64:`, `dat:`) —
//! the log, consensus-stable metadata, stable counters, and the user key
//! space — plus the deterministic state-machine logic that applies
//! committed commands to `dat:` and the paginated enumeration used by
//! the request router's key listing.

pub mod backend;
pub mod errors;
pub mod fsm;
pub mod keys;
pub mod log;
pub mod pagination;
pub mod stable;

pub use backend::{Backend, WriteOp};
pub use errors::{Error, ErrorKind};
pub use fsm::{apply_command, restore_data, snapshot_data, ApplyOutcome, Command, Op};
pub use log::{EntryType, LogRecord, LogStore};
pub use pagination::{keys_of, KeyPage};
pub use stable::StableStore;
