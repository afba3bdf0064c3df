use byteorder::{BigEndian, ByteOrder};

use crate::backend::Backend;
use crate::errors::*;
use crate::keys;

/// Durable storage for consensus bookkeeping (current term, voted-for,
/// ...) under the `sst:`/`u64:` namespaces.
#[derive(Clone)]
pub struct StableStore {
    backend: Backend,
}

impl StableStore {
    pub fn new(backend: Backend) -> Self {
        StableStore { backend }
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.backend.get_raw_opt(&keys::stable_key(key))
    }

    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.backend.set_raw(&keys::stable_key(key), value)
    }

    pub fn get_u64(&self, key: &[u8]) -> Result<Option<u64>> {
        match self.backend.get_raw_opt(&keys::u64_key(key))? {
            Some(bytes) if bytes.len() == 8 => Ok(Some(BigEndian::read_u64(&bytes))),
            Some(_) => Err("corrupt u64 stable value".into()),
            None => Ok(None),
        }
    }

    pub fn set_u64(&self, key: &[u8], value: u64) -> Result<()> {
        let mut buf = [0u8; 8];
        BigEndian::write_u64(&mut buf, value);
        self.backend.set_raw(&keys::u64_key(key), &buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_store() -> (tempfile::TempDir, StableStore) {
        let dir = tempfile::tempdir().unwrap();
        let backend = Backend::open(dir.path()).unwrap();
        (dir, StableStore::new(backend))
    }

    #[test]
    fn u64_round_trips_full_range() {
        let (_dir, store) = open_store();
        for n in [0u64, 1, 255, u32::MAX as u64, u64::MAX] {
            store.set_u64(b"counter", n).unwrap();
            assert_eq!(store.get_u64(b"counter").unwrap(), Some(n));
        }
    }

    #[test]
    fn get_missing_key_is_none() {
        let (_dir, store) = open_store();
        assert_eq!(store.get(b"nope").unwrap(), None);
        assert_eq!(store.get_u64(b"nope").unwrap(), None);
    }
}
