use std::path::Path;

use crate::errors::*;

/// Default ceiling on how many keys a single `batch_write` commits at
/// once. sled does not impose Badger's hard per-transaction cap, so this
/// is a conservative, configurable choice rather than a backend-forced
/// one — see DESIGN.md.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 1000;

pub enum WriteOp {
    Set(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
}

impl WriteOp {
    pub fn set(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        WriteOp::Set(key.into(), value.into())
    }

    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        WriteOp::Delete(key.into())
    }
}

/// Wraps the embedded ordered key-value engine (`sled`) behind the
/// contract consensus bookkeeping and the user key space both need:
/// atomic point/batch writes, point gets, and bidirectional prefix scans.
#[derive(Clone)]
pub struct Backend {
    db: sled::Db,
    max_batch_size: usize,
}

impl Backend {
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_batch_size(path, DEFAULT_MAX_BATCH_SIZE)
    }

    pub fn open_with_batch_size(path: &Path, max_batch_size: usize) -> Result<Self> {
        let db = sled::open(path)?;
        Ok(Backend { db, max_batch_size })
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    pub fn get_raw(&self, key: &[u8]) -> Result<Vec<u8>> {
        match self.db.get(key)? {
            Some(v) => Ok(v.to_vec()),
            None => Err(ErrorKind::NotFound.into()),
        }
    }

    pub fn get_raw_opt(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.db.get(key)?.map(|v| v.to_vec()))
    }

    pub fn set_raw(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.db.insert(key, value)?;
        Ok(())
    }

    pub fn delete_raw(&self, key: &[u8]) -> Result<()> {
        self.db.remove(key)?;
        Ok(())
    }

    /// Applies `ops` atomically, auto-splitting into commits of at most
    /// `max_batch_size` operations each. Segments commit in order; a
    /// mid-batch failure surfaces the error with earlier segments
    /// already durable — callers that retry must be idempotent in
    /// whatever key they're writing (true of `store_logs`, keyed by
    /// `log.Index`).
    pub fn batch_write(&self, ops: Vec<WriteOp>) -> Result<()> {
        for chunk in ops.chunks(self.max_batch_size.max(1)) {
            let mut batch = sled::Batch::default();
            for op in chunk {
                match op {
                    WriteOp::Set(k, v) => batch.insert(k.as_slice(), v.as_slice()),
                    WriteOp::Delete(k) => batch.remove(k.as_slice()),
                }
            }
            self.db.apply_batch(batch)?;
        }
        Ok(())
    }

    /// Forward iterator over all keys with `prefix`, first yielding the
    /// key at or after `start`.
    pub fn scan_forward<'a>(
        &'a self,
        prefix: &'a [u8],
        start: &[u8],
    ) -> impl Iterator<Item = Result<(Vec<u8>, Vec<u8>)>> + 'a {
        self.db
            .range(start.to_vec()..)
            .take_while(move |r| match r {
                Ok((k, _)) => k.starts_with(prefix),
                Err(_) => true,
            })
            .map(|r| r.map(|(k, v)| (k.to_vec(), v.to_vec())).map_err(Error::from))
    }

    /// Reverse iterator over all keys with `prefix`, starting at the
    /// last key at or before `seek`.
    pub fn scan_reverse<'a>(
        &'a self,
        prefix: &'a [u8],
        seek: &[u8],
    ) -> impl Iterator<Item = Result<(Vec<u8>, Vec<u8>)>> + 'a {
        self.db
            .range(..=seek.to_vec())
            .rev()
            .take_while(move |r| match r {
                Ok((k, _)) => k.starts_with(prefix),
                Err(_) => true,
            })
            .map(|r| r.map(|(k, v)| (k.to_vec(), v.to_vec())).map_err(Error::from))
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

/// Partitions `[min, max]` (inclusive, as `DeleteRange` treats it) into
/// contiguous segments of at most `batch_size` indices, mirroring the
/// original adapter's `generateRanges`: `[min, min+B]`,
/// `[min+B+1, min+2B+1]`, ..., with the final segment ending at `max`.
pub fn generate_index_ranges(min: u64, max: u64, batch_size: u64) -> Vec<(u64, u64)> {
    let batch_size = batch_size.max(1);
    if max <= min || max - min <= batch_size {
        return vec![(min, max)];
    }

    let mut segments = Vec::new();
    let mut cur = min;
    while max - cur > batch_size {
        let next_min = cur + batch_size;
        segments.push((cur, next_min));
        cur = next_min + 1;
    }
    segments.push((cur, max));
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_tmp() -> (tempfile::TempDir, Backend) {
        let dir = tempfile::tempdir().unwrap();
        let backend = Backend::open_with_batch_size(dir.path(), 4).unwrap();
        (dir, backend)
    }

    #[test]
    fn set_get_delete_round_trip() {
        let (_dir, backend) = open_tmp();
        backend.set_raw(b"k1", b"v1").unwrap();
        assert_eq!(backend.get_raw(b"k1").unwrap(), b"v1");
        backend.delete_raw(b"k1").unwrap();
        assert!(matches!(
            backend.get_raw(b"k1").unwrap_err().0,
            ErrorKind::NotFound
        ));
    }

    #[test]
    fn batch_write_splits_large_batches() {
        let (_dir, backend) = open_tmp();
        let ops: Vec<_> = (0..10)
            .map(|i| WriteOp::set(format!("k{i}").into_bytes(), b"v".to_vec()))
            .collect();
        backend.batch_write(ops).unwrap();
        for i in 0..10 {
            assert_eq!(backend.get_raw(format!("k{i}").as_bytes()).unwrap(), b"v");
        }
    }

    #[test]
    fn forward_and_reverse_scan_agree_on_order() {
        let (_dir, backend) = open_tmp();
        for i in 0..5u8 {
            backend.set_raw(&[b'p', i], b"v").unwrap();
        }
        let fwd: Vec<_> = backend
            .scan_forward(b"p", b"p")
            .map(|r| r.unwrap().0)
            .collect();
        let mut rev: Vec<_> = backend
            .scan_reverse(b"p", &[b'p', 0xFF])
            .map(|r| r.unwrap().0)
            .collect();
        rev.reverse();
        assert_eq!(fwd, rev);
    }

    #[test]
    fn index_ranges_cover_small_span_in_one_segment() {
        assert_eq!(generate_index_ranges(1, 3, 100), vec![(1, 3)]);
    }

    #[test]
    fn index_ranges_split_large_span() {
        let segments = generate_index_ranges(1, 25, 10);
        assert_eq!(segments.first(), Some(&(1, 11)));
        assert_eq!(segments.last(), Some(&(22, 25)));
    }
}
