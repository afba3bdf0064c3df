use crate::backend::Backend;
use crate::errors::*;
use crate::keys;

/// Result of a `keys_of` call: ordering is the backend's byte order over
/// encoded keys, which hex-encoding makes identical to raw-byte
/// lexicographic order over the user's keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPage {
    pub keys: Vec<Vec<u8>>,
    /// Empty when the scan exhausted the prefix.
    pub next_key: Vec<u8>,
    pub page_size: u32,
}

/// Paginated enumeration over the `dat:` keyspace under `prefix`,
/// starting at `offset` (defaults to `prefix` when empty).
///
/// `page_size == 0` is a legal probe: it returns no keys and sets
/// `next_key` to the first matching raw key, if any.
pub fn keys_of(backend: &Backend, prefix: &[u8], offset: &[u8], page_size: u32) -> Result<KeyPage> {
    let offset = if offset.is_empty() { prefix } else { offset };

    let dat_prefix = keys::data_key(prefix);
    let dat_offset = keys::data_key(offset);

    let mut matched = Vec::new();
    let mut next_key = Vec::new();
    let mut count = 0u32;

    for entry in backend.scan_forward(&dat_prefix, &dat_offset) {
        let (key, _) = entry?;
        let raw = match keys::decode_data_key(&key) {
            Some(raw) => raw,
            None => continue,
        };

        if count < page_size {
            matched.push(raw);
            count += 1;
        } else {
            next_key = raw;
            break;
        }
    }

    Ok(KeyPage {
        keys: matched,
        next_key,
        page_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Backend;

    fn seeded(n: usize) -> (tempfile::TempDir, Backend) {
        let dir = tempfile::tempdir().unwrap();
        let backend = Backend::open(dir.path()).unwrap();
        for i in 0..n {
            let raw_key = format!("k{i}").into_bytes();
            backend.set_raw(&keys::data_key(&raw_key), b"v").unwrap();
        }
        (dir, backend)
    }

    #[test]
    fn page_size_zero_is_a_probe() {
        let (_dir, backend) = seeded(5);
        let page = keys_of(&backend, b"k", b"", 0).unwrap();
        assert!(page.keys.is_empty());
        assert_eq!(page.next_key, b"k0");
    }

    #[test]
    fn pagination_concatenates_to_full_scan() {
        let (_dir, backend) = seeded(25);

        let full = keys_of(&backend, b"k", b"", 1000).unwrap();
        assert_eq!(full.keys.len(), 25);
        assert!(full.next_key.is_empty());

        let mut paged = Vec::new();
        let mut offset = Vec::new();
        loop {
            let page = keys_of(&backend, b"k", &offset, 7).unwrap();
            paged.extend(page.keys.clone());
            if page.next_key.is_empty() {
                break;
            }
            offset = page.next_key;
        }

        assert_eq!(paged, full.keys);
    }

    #[test]
    fn empty_prefix_yields_empty_page() {
        let (_dir, backend) = seeded(3);
        let page = keys_of(&backend, b"zzz", b"", 10).unwrap();
        assert!(page.keys.is_empty());
        assert!(page.next_key.is_empty());
    }
}
