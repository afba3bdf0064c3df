use std::fmt::Debug;
use std::ops::RangeBounds;

use keyraft_store::{EntryType, LogRecord, LogStore as StoreLog, StableStore};
use openraft::storage::{LogState, RaftLogReader, RaftLogStorage};
use openraft::{Entry, EntryPayload, ErrorSubject, ErrorVerb, LogId, OptionalSend, StorageError, Vote};
use std::sync::RwLock;

use crate::types::{NodeId, TypeConfig};

const VOTE_KEY: &[u8] = b"vote";
const LAST_PURGED_KEY: &[u8] = b"last_purged";

fn io_err(
    subject: ErrorSubject<NodeId>,
    verb: ErrorVerb,
    e: impl std::error::Error + Send + Sync + 'static,
) -> StorageError<NodeId> {
    StorageError::from_io_error(subject, verb, std::io::Error::other(e.to_string()))
}

fn entry_type_of(entry: &Entry<TypeConfig>) -> EntryType {
    match &entry.payload {
        EntryPayload::Blank => EntryType::Blank,
        EntryPayload::Normal(_) => EntryType::Command,
        EntryPayload::Membership(_) => EntryType::Config,
    }
}

/// Bridges `keyraft_store::LogStore`/`StableStore` (which only know
/// index/term/type/payload bytes) onto openraft's `RaftLogStorage` and
/// `RaftLogReader` contracts. The store crate itself stays ignorant of
/// openraft's types — this is the only place `openraft::Entry<TypeConfig>`
/// gets serialized into a `LogRecord` payload and back.
#[derive(Clone)]
pub struct SledLogStorage {
    log: StoreLog,
    stable: StableStore,
    last_log_id: std::sync::Arc<RwLock<Option<LogId<NodeId>>>>,
    last_purged: std::sync::Arc<RwLock<Option<LogId<NodeId>>>>,
}

impl SledLogStorage {
    pub fn new(log: StoreLog, stable: StableStore) -> Result<Self, StorageError<NodeId>> {
        let store = SledLogStorage {
            log,
            stable,
            last_log_id: std::sync::Arc::new(RwLock::new(None)),
            last_purged: std::sync::Arc::new(RwLock::new(None)),
        };
        store.load_cached()?;
        Ok(store)
    }

    fn load_cached(&self) -> Result<(), StorageError<NodeId>> {
        let last_purged = self
            .stable
            .get(LAST_PURGED_KEY)
            .map_err(|e| io_err(ErrorSubject::Logs, ErrorVerb::Read, e))?
            .map(|bytes| serde_json::from_slice(&bytes))
            .transpose()
            .map_err(|e| io_err(ErrorSubject::Logs, ErrorVerb::Read, e))?;
        *self.last_purged.write().unwrap() = last_purged;

        let last_index = self
            .log
            .last_index()
            .map_err(|e| io_err(ErrorSubject::Logs, ErrorVerb::Read, e))?;
        let last_log_id = if last_index == 0 {
            None
        } else {
            let record = self
                .log
                .get_log(last_index)
                .map_err(|e| io_err(ErrorSubject::Logs, ErrorVerb::Read, e))?;
            let entry = decode_entry(&record)?;
            Some(entry.log_id)
        };
        *self.last_log_id.write().unwrap() = last_log_id;

        Ok(())
    }
}

fn encode_entry(entry: &Entry<TypeConfig>) -> Result<LogRecord, StorageError<NodeId>> {
    let payload = serde_json::to_vec(entry).map_err(|e| io_err(ErrorSubject::Logs, ErrorVerb::Write, e))?;
    Ok(LogRecord::new(
        entry.log_id.index,
        0,
        entry_type_of(entry),
        payload,
    ))
}

fn decode_entry(record: &LogRecord) -> Result<Entry<TypeConfig>, StorageError<NodeId>> {
    serde_json::from_slice(&record.payload).map_err(|e| io_err(ErrorSubject::Logs, ErrorVerb::Read, e))
}

impl RaftLogReader<TypeConfig> for SledLogStorage {
    async fn try_get_log_entries<RB: RangeBounds<u64> + Clone + Debug + OptionalSend>(
        &mut self,
        range: RB,
    ) -> Result<Vec<Entry<TypeConfig>>, StorageError<NodeId>> {
        let start = match range.start_bound() {
            std::ops::Bound::Included(&n) => n,
            std::ops::Bound::Excluded(&n) => n + 1,
            std::ops::Bound::Unbounded => 1,
        };
        let end = match range.end_bound() {
            std::ops::Bound::Included(&n) => n,
            std::ops::Bound::Excluded(&n) => n.saturating_sub(1),
            std::ops::Bound::Unbounded => self
                .log
                .last_index()
                .map_err(|e| io_err(ErrorSubject::Logs, ErrorVerb::Read, e))?,
        };

        if end < start {
            return Ok(Vec::new());
        }

        let records = self
            .log
            .get_log_range(start, end)
            .map_err(|e| io_err(ErrorSubject::Logs, ErrorVerb::Read, e))?;

        records.iter().map(decode_entry).collect()
    }
}

impl RaftLogStorage<TypeConfig> for SledLogStorage {
    type LogReader = Self;

    async fn get_log_state(&mut self) -> Result<LogState<TypeConfig>, StorageError<NodeId>> {
        Ok(LogState {
            last_purged_log_id: *self.last_purged.read().unwrap(),
            last_log_id: *self.last_log_id.read().unwrap(),
        })
    }

    async fn save_vote(&mut self, vote: &Vote<NodeId>) -> Result<(), StorageError<NodeId>> {
        let bytes = serde_json::to_vec(vote).map_err(|e| io_err(ErrorSubject::Vote, ErrorVerb::Write, e))?;
        self.stable
            .set(VOTE_KEY, &bytes)
            .map_err(|e| io_err(ErrorSubject::Vote, ErrorVerb::Write, e))?;
        Ok(())
    }

    async fn read_vote(&mut self) -> Result<Option<Vote<NodeId>>, StorageError<NodeId>> {
        let bytes = self
            .stable
            .get(VOTE_KEY)
            .map_err(|e| io_err(ErrorSubject::Vote, ErrorVerb::Read, e))?;
        bytes
            .map(|b| serde_json::from_slice(&b))
            .transpose()
            .map_err(|e| io_err(ErrorSubject::Vote, ErrorVerb::Read, e))
    }

    async fn get_log_reader(&mut self) -> Self::LogReader {
        self.clone()
    }

    async fn append<I>(
        &mut self,
        entries: I,
        callback: openraft::storage::LogFlushed<TypeConfig>,
    ) -> Result<(), StorageError<NodeId>>
    where
        I: IntoIterator<Item = Entry<TypeConfig>> + OptionalSend,
        I::IntoIter: OptionalSend,
    {
        let entries: Vec<_> = entries.into_iter().collect();
        if entries.is_empty() {
            callback.log_io_completed(Ok(()));
            return Ok(());
        }

        let mut last_log_id = None;
        let mut records = Vec::with_capacity(entries.len());
        for entry in &entries {
            last_log_id = Some(entry.log_id);
            records.push(encode_entry(entry)?);
        }

        self.log
            .store_logs(&records)
            .map_err(|e| io_err(ErrorSubject::Logs, ErrorVerb::Write, e))?;

        if let Some(log_id) = last_log_id {
            *self.last_log_id.write().unwrap() = Some(log_id);
        }

        callback.log_io_completed(Ok(()));
        Ok(())
    }

    /// Removes every entry strictly after `log_id` (a leader overwriting
    /// a follower's conflicting suffix).
    async fn truncate(&mut self, log_id: LogId<NodeId>) -> Result<(), StorageError<NodeId>> {
        let last = self
            .log
            .last_index()
            .map_err(|e| io_err(ErrorSubject::Logs, ErrorVerb::Write, e))?;
        if last > log_id.index {
            self.log
                .delete_range(log_id.index + 1, last)
                .map_err(|e| io_err(ErrorSubject::Logs, ErrorVerb::Write, e))?;
        }
        *self.last_log_id.write().unwrap() = Some(log_id);
        Ok(())
    }

    /// Removes every entry up to and including `log_id` (post-snapshot
    /// compaction).
    async fn purge(&mut self, log_id: LogId<NodeId>) -> Result<(), StorageError<NodeId>> {
        let first = self
            .log
            .first_index()
            .map_err(|e| io_err(ErrorSubject::Logs, ErrorVerb::Write, e))?;
        if first != 0 && first <= log_id.index {
            self.log
                .delete_range(first, log_id.index)
                .map_err(|e| io_err(ErrorSubject::Logs, ErrorVerb::Write, e))?;
        }

        let bytes = serde_json::to_vec(&log_id).map_err(|e| io_err(ErrorSubject::Logs, ErrorVerb::Write, e))?;
        self.stable
            .set(LAST_PURGED_KEY, &bytes)
            .map_err(|e| io_err(ErrorSubject::Logs, ErrorVerb::Write, e))?;
        *self.last_purged.write().unwrap() = Some(log_id);
        Ok(())
    }
}
