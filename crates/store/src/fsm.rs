use std::io::{Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

use crate::backend::{Backend, WriteOp};
use crate::errors::*;
use crate::keys;

/// `Op ∈ {SET, DEL}`. `#[serde(other)]` absorbs anything else into
/// `Unknown` so a forward-incompatible op name degrades to "ignore" the
/// same way a fully malformed payload does, rather than tripping a
/// deserialize error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    #[serde(rename = "SET")]
    Set,
    #[serde(rename = "DEL")]
    Del,
    #[serde(other)]
    Unknown,
}

mod opt_b64 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match v {
            Some(bytes) => s.serialize_str(&base64::encode(bytes)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        let opt = Option::<String>::deserialize(d)?;
        match opt {
            Some(s) => base64::decode(&s)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

/// The wire payload of a normal-command log entry: `{Op, Key, Value}`.
/// `Value` round-trips as base64 text, mirroring Go's default `[]byte`
/// JSON marshaling that the original implementation relies on. This JSON
/// shape is a persistence contract (spec §9) — it must stay stable
/// independent of the outer MessagePack log-record envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    #[serde(rename = "Op")]
    pub op: Op,
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Value", default, with = "opt_b64", skip_serializing_if = "Option::is_none")]
    pub value: Option<Vec<u8>>,
}

impl Command {
    pub fn set(key: impl Into<String>, value: Vec<u8>) -> Self {
        Command {
            op: Op::Set,
            key: key.into(),
            value: Some(value),
        }
    }

    pub fn del(key: impl Into<String>) -> Self {
        Command {
            op: Op::Del,
            key: key.into(),
            value: None,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// What applying one committed command entry produced. Modeled as the
/// tagged variant spec §9 calls for (`Ok(bytes) | Err(kind) | None`),
/// collapsed here to what the FSM itself can observe: a successful
/// mutation with its echoed value, or a no-op because the entry was
/// unrecognized or malformed. The FSM never aborts the process on either.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// SET: echoes the stored value. DEL: `None`.
    Applied(Option<Vec<u8>>),
    /// Unknown op or malformed payload — logged, no state change.
    Ignored,
}

/// Applies one committed command payload to the `dat:` keyspace.
/// Deterministic: a pure function of `(payload, current backend state)` —
/// no wall clock, no randomness, no peer identity.
pub fn apply_command(backend: &Backend, payload: &[u8]) -> Result<ApplyOutcome> {
    let command: Command = match serde_json::from_slice(payload) {
        Ok(c) => c,
        Err(err) => {
            tracing::warn!(error = %err, "malformed log command payload, ignoring");
            return Ok(ApplyOutcome::Ignored);
        }
    };

    match command.op {
        Op::Set => {
            let value = command.value.unwrap_or_default();
            backend.set_raw(&keys::data_key(command.key.as_bytes()), &value)?;
            Ok(ApplyOutcome::Applied(Some(value)))
        }
        Op::Del => {
            backend.delete_raw(&keys::data_key(command.key.as_bytes()))?;
            Ok(ApplyOutcome::Applied(None))
        }
        Op::Unknown => {
            tracing::warn!("unrecognized log command op, ignoring");
            Ok(ApplyOutcome::Ignored)
        }
    }
}

/// Streams every `dat:` key/value pair to `sink` as
/// `(u32 key_len, key, u32 value_len, value)` records. The stream carries
/// the full encoded key (including the `dat:` prefix), so `restore_data`
/// never needs to re-derive the hex encoding.
pub fn snapshot_data(backend: &Backend, sink: &mut impl Write) -> Result<()> {
    for entry in backend.scan_forward(keys::DATA_PREFIX, keys::DATA_PREFIX) {
        let (key, value) = entry?;
        sink.write_u32::<BigEndian>(key.len() as u32)?;
        sink.write_all(&key)?;
        sink.write_u32::<BigEndian>(value.len() as u32)?;
        sink.write_all(&value)?;
    }
    Ok(())
}

/// Replaces the current `dat:` content with what `reader` encodes,
/// atomically from the reader's perspective: the whole namespace is
/// cleared and rewritten as a single batch. An empty stream is a no-op
/// restore (valid when the snapshot itself was empty).
pub fn restore_data(backend: &Backend, reader: &mut impl Read) -> Result<()> {
    let mut ops = Vec::new();
    for entry in backend.scan_forward(keys::DATA_PREFIX, keys::DATA_PREFIX) {
        let (key, _) = entry?;
        ops.push(WriteOp::delete(key));
    }

    loop {
        let key_len = match reader.read_u32::<BigEndian>() {
            Ok(n) => n as usize,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        };
        let mut key = vec![0u8; key_len];
        reader.read_exact(&mut key)?;

        let value_len = reader.read_u32::<BigEndian>()? as usize;
        let mut value = vec![0u8; value_len];
        reader.read_exact(&mut value)?;

        ops.push(WriteOp::set(key, value));
    }

    backend.batch_write(ops)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open() -> (tempfile::TempDir, Backend) {
        let dir = tempfile::tempdir().unwrap();
        (dir, Backend::open(dir.path()).unwrap())
    }

    #[test]
    fn set_then_get_then_del() {
        let (_dir, backend) = open();

        let set = Command::set("alpha", b"one".to_vec()).encode().unwrap();
        let outcome = apply_command(&backend, &set).unwrap();
        assert_eq!(outcome, ApplyOutcome::Applied(Some(b"one".to_vec())));
        assert_eq!(backend.get_raw(&keys::data_key(b"alpha")).unwrap(), b"one");

        let del = Command::del("alpha").encode().unwrap();
        let outcome = apply_command(&backend, &del).unwrap();
        assert_eq!(outcome, ApplyOutcome::Applied(None));
        assert!(backend.get_raw(&keys::data_key(b"alpha")).is_err());
    }

    #[test]
    fn unknown_op_is_ignored_not_fatal() {
        let (_dir, backend) = open();
        let payload = br#"{"Op":"BOGUS","Key":"x"}"#;
        assert_eq!(apply_command(&backend, payload).unwrap(), ApplyOutcome::Ignored);
    }

    #[test]
    fn malformed_payload_is_ignored_not_fatal() {
        let (_dir, backend) = open();
        assert_eq!(apply_command(&backend, b"not json").unwrap(), ApplyOutcome::Ignored);
    }

    #[test]
    fn determinism_same_prefix_same_map() {
        let (_dir, a) = open();
        let (_dir2, b) = open();

        let ops = vec![
            Command::set("k1", b"v1".to_vec()).encode().unwrap(),
            Command::set("k2", b"v2".to_vec()).encode().unwrap(),
            Command::del("k1").encode().unwrap(),
        ];
        for op in &ops {
            apply_command(&a, op).unwrap();
            apply_command(&b, op).unwrap();
        }

        assert!(a.get_raw(&keys::data_key(b"k1")).is_err());
        assert!(b.get_raw(&keys::data_key(b"k1")).is_err());
        assert_eq!(
            a.get_raw(&keys::data_key(b"k2")).unwrap(),
            b.get_raw(&keys::data_key(b"k2")).unwrap()
        );
    }

    #[test]
    fn snapshot_restore_round_trips() {
        let (_dir, backend) = open();
        for i in 0..20 {
            backend
                .set_raw(&keys::data_key(format!("k{i}").as_bytes()), b"v")
                .unwrap();
        }

        let mut buf = Vec::new();
        snapshot_data(&backend, &mut buf).unwrap();

        let (_dir2, restored) = open();
        restore_data(&restored, &mut &buf[..]).unwrap();

        for i in 0..20 {
            assert_eq!(
                restored.get_raw(&keys::data_key(format!("k{i}").as_bytes())).unwrap(),
                b"v"
            );
        }
    }

    #[test]
    fn restoring_a_genuinely_empty_snapshot_clears_state() {
        // Unlike the no-op snapshot option spec §9 also allows (where an
        // empty stream means "I captured nothing, leave the backend
        // alone"), this workspace's serializing snapshot makes an empty
        // stream mean "the state really was empty" — so restore replaces
        // whatever was there with nothing.
        let (_dir, backend) = open();
        backend.set_raw(&keys::data_key(b"existing"), b"v").unwrap();

        let empty: Vec<u8> = Vec::new();
        restore_data(&backend, &mut &empty[..]).unwrap();

        assert!(backend.get_raw(&keys::data_key(b"existing")).is_err());
    }
}
