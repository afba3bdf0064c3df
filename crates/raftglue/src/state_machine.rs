use std::io::Cursor;
use std::sync::Arc;

use keyraft_store::{apply_command, restore_data, snapshot_data, ApplyOutcome, Backend};
use openraft::storage::{RaftStateMachine, Snapshot};
use openraft::{
    Entry, EntryPayload, LogId, OptionalSend, RaftSnapshotBuilder, SnapshotMeta, StorageError,
    StoredMembership,
};
use tokio::sync::Mutex;

use crate::types::{KvResponse, NodeId, TypeConfig};

fn io_err(e: impl std::error::Error + Send + Sync + 'static) -> StorageError<NodeId> {
    StorageError::from_io_error(
        openraft::ErrorSubject::StateMachine,
        openraft::ErrorVerb::Write,
        std::io::Error::other(e.to_string()),
    )
}

struct Inner {
    last_applied: Option<LogId<NodeId>>,
    last_membership: StoredMembership<TypeConfig>,
}

/// Bridges `keyraft_store`'s SET/DEL dispatch over the `dat:` keyspace
/// onto openraft's `RaftStateMachine`. Holds the same `Backend` handle
/// the HTTP router reads from for local `/kv/get`/`/kv/list`, so a
/// just-applied write is visible to a local read the instant `apply`
/// returns.
///
/// `inner` is guarded by a mutex held only across `apply`/
/// `install_snapshot`, never across network I/O — per spec §5's shared
/// resource rule.
#[derive(Clone)]
pub struct KvStateMachine {
    backend: Backend,
    inner: Arc<Mutex<Inner>>,
}

impl KvStateMachine {
    pub fn new(backend: Backend) -> Self {
        KvStateMachine {
            backend,
            inner: Arc::new(Mutex::new(Inner {
                last_applied: None,
                last_membership: StoredMembership::default(),
            })),
        }
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }
}

impl RaftSnapshotBuilder<TypeConfig> for KvStateMachine {
    async fn build_snapshot(&mut self) -> Result<Snapshot<TypeConfig>, StorageError<NodeId>> {
        let (last_applied, last_membership) = {
            let inner = self.inner.lock().await;
            (inner.last_applied, inner.last_membership.clone())
        };

        let mut buf = Vec::new();
        snapshot_data(&self.backend, &mut buf).map_err(io_err)?;

        let snapshot_id = match last_applied {
            Some(id) => format!("{}-{}", id.leader_id, id.index),
            None => "empty".to_string(),
        };

        Ok(Snapshot {
            meta: SnapshotMeta {
                last_log_id: last_applied,
                last_membership,
                snapshot_id,
            },
            snapshot: Box::new(Cursor::new(buf)),
        })
    }
}

impl RaftStateMachine<TypeConfig> for KvStateMachine {
    type SnapshotBuilder = Self;

    async fn applied_state(
        &mut self,
    ) -> Result<(Option<LogId<NodeId>>, StoredMembership<TypeConfig>), StorageError<NodeId>> {
        let inner = self.inner.lock().await;
        Ok((inner.last_applied, inner.last_membership.clone()))
    }

    async fn apply<I>(&mut self, entries: I) -> Result<Vec<KvResponse>, StorageError<NodeId>>
    where
        I: IntoIterator<Item = Entry<TypeConfig>> + OptionalSend,
    {
        let mut responses = Vec::new();
        let mut inner = self.inner.lock().await;

        for entry in entries {
            inner.last_applied = Some(entry.log_id);

            match entry.payload {
                EntryPayload::Blank => {
                    responses.push(KvResponse { value: None });
                }
                EntryPayload::Membership(membership) => {
                    inner.last_membership = StoredMembership::new(Some(entry.log_id), membership);
                    responses.push(KvResponse { value: None });
                }
                EntryPayload::Normal(request) => {
                    let command = request.into_command();
                    let payload = command.encode().map_err(io_err)?;
                    let outcome = apply_command(&self.backend, &payload).map_err(io_err)?;
                    let value = match outcome {
                        ApplyOutcome::Applied(value) => value,
                        ApplyOutcome::Ignored => None,
                    };
                    responses.push(KvResponse { value });
                }
            }
        }

        Ok(responses)
    }

    async fn get_snapshot_builder(&mut self) -> Self::SnapshotBuilder {
        self.clone()
    }

    async fn begin_receiving_snapshot(&mut self) -> Result<Box<Cursor<Vec<u8>>>, StorageError<NodeId>> {
        Ok(Box::new(Cursor::new(Vec::new())))
    }

    async fn install_snapshot(
        &mut self,
        meta: &SnapshotMeta<TypeConfig>,
        snapshot: Box<Cursor<Vec<u8>>>,
    ) -> Result<(), StorageError<NodeId>> {
        let mut cursor = *snapshot;
        cursor.set_position(0);
        restore_data(&self.backend, &mut cursor).map_err(io_err)?;

        let mut inner = self.inner.lock().await;
        inner.last_applied = meta.last_log_id;
        inner.last_membership = meta.last_membership.clone();
        Ok(())
    }

    async fn get_current_snapshot(&mut self) -> Result<Option<Snapshot<TypeConfig>>, StorageError<NodeId>> {
        let inner = self.inner.lock().await;
        if inner.last_applied.is_none() {
            return Ok(None);
        }
        drop(inner);
        Ok(Some(self.build_snapshot().await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::KvRequest;
    use openraft::{CommittedLeaderId, EntryPayload};

    fn blank_log_id(index: u64) -> LogId<NodeId> {
        LogId::new(CommittedLeaderId::new(1, 0), index)
    }

    #[tokio::test]
    async fn apply_set_then_del_is_visible_via_shared_backend() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Backend::open(dir.path()).unwrap();
        let mut sm = KvStateMachine::new(backend.clone());

        let set_entry = Entry {
            log_id: blank_log_id(1),
            payload: EntryPayload::Normal(KvRequest::Set {
                key: "alpha".into(),
                value: b"one".to_vec(),
            }),
        };
        let responses = sm.apply(vec![set_entry]).await.unwrap();
        assert_eq!(responses[0].value, Some(b"one".to_vec()));
        assert_eq!(
            backend.get_raw(&keyraft_store::keys::data_key(b"alpha")).unwrap(),
            b"one"
        );

        let del_entry = Entry {
            log_id: blank_log_id(2),
            payload: EntryPayload::Normal(KvRequest::Delete { key: "alpha".into() }),
        };
        sm.apply(vec![del_entry]).await.unwrap();
        assert!(backend.get_raw(&keyraft_store::keys::data_key(b"alpha")).is_err());
    }

    #[tokio::test]
    async fn snapshot_then_restore_round_trips_through_install() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Backend::open(dir.path()).unwrap();
        let mut sm = KvStateMachine::new(backend.clone());

        sm.apply(vec![Entry {
            log_id: blank_log_id(1),
            payload: EntryPayload::Normal(KvRequest::Set {
                key: "k".into(),
                value: b"v".to_vec(),
            }),
        }])
        .await
        .unwrap();

        let snapshot = sm.build_snapshot().await.unwrap();

        let dir2 = tempfile::tempdir().unwrap();
        let backend2 = Backend::open(dir2.path()).unwrap();
        let mut sm2 = KvStateMachine::new(backend2.clone());
        sm2.install_snapshot(&snapshot.meta, snapshot.snapshot)
            .await
            .unwrap();

        assert_eq!(backend2.get_raw(&keyraft_store::keys::data_key(b"k")).unwrap(), b"v");
    }
}
