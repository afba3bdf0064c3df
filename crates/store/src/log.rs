use serde::{Deserialize, Serialize};

use crate::backend::{generate_index_ranges, Backend, WriteOp};
use crate::errors::*;
use crate::keys;

/// Distinguishes a normal state-machine command from a membership-change
/// entry. Anything that isn't a command never reaches the FSM's `Apply`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EntryType {
    Command = 0,
    Config = 1,
    Blank = 2,
}

impl EntryType {
    fn from_u8(v: u8) -> Result<Self> {
        match v {
            0 => Ok(EntryType::Command),
            1 => Ok(EntryType::Config),
            2 => Ok(EntryType::Blank),
            _ => Err(format!("unknown log entry type {v}").into()),
        }
    }
}

/// A single durable, totally ordered record. The on-disk encoding is
/// MessagePack (self-describing, no out-of-band schema needed to decode)
/// over this exact field order; changing the order is a format-version
/// bump, not specified here (spec §4.2, §9).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub index: u64,
    pub term: u64,
    pub entry_type: u8,
    pub payload: Vec<u8>,
}

impl LogRecord {
    pub fn new(index: u64, term: u64, entry_type: EntryType, payload: Vec<u8>) -> Self {
        LogRecord {
            index,
            term,
            entry_type: entry_type as u8,
            payload,
        }
    }

    pub fn entry_type(&self) -> Result<EntryType> {
        EntryType::from_u8(self.entry_type)
    }

    fn encode(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec(self)?)
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

/// Bridges the consensus module's log-entry and stable-metadata
/// contracts onto the shared `Backend`, under the `rft:` namespace.
#[derive(Clone)]
pub struct LogStore {
    backend: Backend,
}

impl LogStore {
    pub fn new(backend: Backend) -> Self {
        LogStore { backend }
    }

    /// Forward-scans `rft:`; 0 if the log is empty.
    pub fn first_index(&self) -> Result<u64> {
        match self.backend.scan_forward(keys::LOG_PREFIX, keys::LOG_PREFIX).next() {
            Some(entry) => {
                let (k, _) = entry?;
                Ok(keys::parse_log_index(&k).unwrap_or(0))
            }
            None => Ok(0),
        }
    }

    /// Reverse-scans from `rft:` + sentinel byte `0xFF`; 0 if the log is
    /// empty.
    pub fn last_index(&self) -> Result<u64> {
        let seek = keys::log_prefix_upper_bound();
        match self.backend.scan_reverse(keys::LOG_PREFIX, &seek).next() {
            Some(entry) => {
                let (k, _) = entry?;
                Ok(keys::parse_log_index(&k).unwrap_or(0))
            }
            None => Ok(0),
        }
    }

    pub fn get_log(&self, index: u64) -> Result<LogRecord> {
        let raw = self
            .backend
            .get_raw_opt(&keys::log_key(index))?
            .ok_or_else(|| ErrorKind::LogNotFound(index))?;
        LogRecord::decode(&raw)
    }

    pub fn get_log_opt(&self, index: u64) -> Result<Option<LogRecord>> {
        match self.backend.get_raw_opt(&keys::log_key(index))? {
            Some(raw) => Ok(Some(LogRecord::decode(&raw)?)),
            None => Ok(None),
        }
    }

    /// Returns every record with `first <= index <= last`, in order.
    /// Missing indices inside the range are simply absent from the
    /// result (callers that need contiguity enforce it themselves).
    pub fn get_log_range(&self, first: u64, last: u64) -> Result<Vec<LogRecord>> {
        let mut out = Vec::new();
        for (k, v) in self
            .backend
            .scan_forward(keys::LOG_PREFIX, &keys::log_key(first))
        {
            let (k, v) = (k, v);
            let idx = match keys::parse_log_index(&k) {
                Some(i) => i,
                None => continue,
            };
            if idx > last {
                break;
            }
            out.push(LogRecord::decode(&v)?);
        }
        Ok(out)
    }

    pub fn store_log(&self, record: &LogRecord) -> Result<()> {
        self.store_logs(std::slice::from_ref(record))
    }

    /// Batch-encodes each entry and writes it under its own index key,
    /// partitioned via the backend's batch-size limit.
    pub fn store_logs(&self, records: &[LogRecord]) -> Result<()> {
        let mut ops = Vec::with_capacity(records.len());
        for record in records {
            ops.push(WriteOp::set(keys::log_key(record.index), record.encode()?));
        }
        self.backend.batch_write(ops)
    }

    /// Deletes every entry with index in `[min, max]`, inclusive,
    /// partitioned into backend-batch-sized segments. `min > last_index`
    /// is a no-op.
    pub fn delete_range(&self, min: u64, max: u64) -> Result<()> {
        let batch_size = self.backend.max_batch_size() as u64;
        for (seg_min, seg_max) in generate_index_ranges(min, max, batch_size) {
            let mut ops = Vec::new();
            for (k, _) in self
                .backend
                .scan_forward(keys::LOG_PREFIX, &keys::log_key(seg_min))
            {
                let idx = match keys::parse_log_index(&k) {
                    Some(i) => i,
                    None => continue,
                };
                if idx > seg_max {
                    break;
                }
                ops.push(WriteOp::delete(k));
            }
            self.backend.batch_write(ops)?;
        }
        Ok(())
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_store() -> (tempfile::TempDir, LogStore) {
        let dir = tempfile::tempdir().unwrap();
        let backend = Backend::open_with_batch_size(dir.path(), 4).unwrap();
        (dir, LogStore::new(backend))
    }

    #[test]
    fn empty_log_boundaries() {
        let (_dir, store) = open_store();
        assert_eq!(store.first_index().unwrap(), 0);
        assert_eq!(store.last_index().unwrap(), 0);
    }

    #[test]
    fn contiguity_holds_after_store_logs() {
        let (_dir, store) = open_store();
        let records: Vec<_> = (1..=12)
            .map(|i| LogRecord::new(i, 1, EntryType::Command, vec![i as u8]))
            .collect();
        store.store_logs(&records).unwrap();

        assert_eq!(store.first_index().unwrap(), 1);
        assert_eq!(store.last_index().unwrap(), 12);
        for i in 1..=12 {
            assert!(store.get_log(i).is_ok());
        }
    }

    #[test]
    fn delete_range_removes_inclusive_bounds() {
        let (_dir, store) = open_store();
        let records: Vec<_> = (1..=10)
            .map(|i| LogRecord::new(i, 1, EntryType::Command, vec![]))
            .collect();
        store.store_logs(&records).unwrap();

        store.delete_range(1, 5).unwrap();
        for i in 1..=5 {
            assert!(matches!(
                store.get_log(i).unwrap_err().0,
                ErrorKind::LogNotFound(_)
            ));
        }
        for i in 6..=10 {
            assert!(store.get_log(i).is_ok());
        }
    }

    #[test]
    fn delete_range_past_last_index_is_noop() {
        let (_dir, store) = open_store();
        let records: Vec<_> = (1..=3)
            .map(|i| LogRecord::new(i, 1, EntryType::Command, vec![]))
            .collect();
        store.store_logs(&records).unwrap();

        store.delete_range(100, 200).unwrap();
        assert_eq!(store.last_index().unwrap(), 3);
    }
}
