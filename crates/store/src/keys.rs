//! Encodes the four disjoint namespaces (`rft:`, `sst:`, `u64:`, `dat:`)
//! that share the one ordered backend. Hex-encoding user/log/stable keys
//! guarantees two distinct raw keys never collide once prefixed, and that
//! a `dat:` prefix scan never bleeds into the other three namespaces.

pub const LOG_PREFIX: &[u8] = b"rft:";
pub const STABLE_PREFIX: &[u8] = b"sst:";
pub const U64_PREFIX: &[u8] = b"u64:";
pub const DATA_PREFIX: &[u8] = b"dat:";

/// Width of the zero-padded decimal suffix below: `u64::MAX` is
/// `18446744073709551615`, 20 digits.
const LOG_INDEX_WIDTH: usize = 20;

/// `rft:<decimal-index>`, zero-padded to [`LOG_INDEX_WIDTH`] digits so
/// that sled's byte-lexicographic key order matches numeric index order
/// — `first_index`/`last_index`/`delete_range` all depend on a forward
/// or reverse scan landing on the numerically first/last entry, which an
/// un-padded decimal suffix does not guarantee (`"rft:10"` sorts before
/// `"rft:2"`).
pub fn log_key(index: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(LOG_PREFIX.len() + LOG_INDEX_WIDTH);
    key.extend_from_slice(LOG_PREFIX);
    key.extend_from_slice(format!("{index:0width$}", width = LOG_INDEX_WIDTH).as_bytes());
    key
}

/// Parses the decimal suffix of a `rft:`-prefixed key. Returns `None` if
/// `key` does not start with the prefix or the suffix is not a decimal
/// integer.
pub fn parse_log_index(key: &[u8]) -> Option<u64> {
    let suffix = key.strip_prefix(LOG_PREFIX)?;
    std::str::from_utf8(suffix).ok()?.parse().ok()
}

/// A seek key guaranteed to sort after every real `rft:` key, used to
/// anchor a reverse scan at "the end of the log namespace".
pub fn log_prefix_upper_bound() -> Vec<u8> {
    let mut key = LOG_PREFIX.to_vec();
    key.push(0xFF);
    key
}

pub fn stable_key(raw: &[u8]) -> Vec<u8> {
    hex_keyed(STABLE_PREFIX, raw)
}

pub fn u64_key(raw: &[u8]) -> Vec<u8> {
    hex_keyed(U64_PREFIX, raw)
}

pub fn data_key(raw: &[u8]) -> Vec<u8> {
    hex_keyed(DATA_PREFIX, raw)
}

/// Decodes a `dat:<hex>` key back to the caller's raw key bytes. Returns
/// `None` if `key` isn't under the `dat:` namespace or its suffix isn't
/// valid hex.
pub fn decode_data_key(key: &[u8]) -> Option<Vec<u8>> {
    let suffix = key.strip_prefix(DATA_PREFIX)?;
    hex::decode(suffix).ok()
}

fn hex_keyed(prefix: &[u8], raw: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + raw.len() * 2);
    key.extend_from_slice(prefix);
    key.extend_from_slice(hex::encode(raw).as_bytes());
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_key_round_trips() {
        let raw = b"hello world";
        let encoded = data_key(raw);
        assert!(encoded.starts_with(DATA_PREFIX));
        assert_eq!(decode_data_key(&encoded).unwrap(), raw);
    }

    #[test]
    fn distinct_raw_keys_never_collide() {
        let a = data_key(b"\x00");
        let b = data_key(b"\x00\x00");
        assert_ne!(a, b);
    }

    #[test]
    fn log_key_parses_back() {
        let key = log_key(42);
        assert_eq!(parse_log_index(&key), Some(42));
        assert_eq!(parse_log_index(b"dat:2a"), None);
    }

    #[test]
    fn log_key_byte_order_matches_numeric_order() {
        // Zero-padding is what makes `first_index`/`last_index`'s scans
        // land on the numerically first/last entry rather than on
        // whichever key happens to sort first lexicographically.
        assert!(log_key(2) < log_key(10));
        assert!(log_key(10) < log_key(100));
        assert!(log_key(9) < log_key(12));
    }
}
