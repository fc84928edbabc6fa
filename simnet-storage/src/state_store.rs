use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

use crate::delta::{DeltaOp, StateDelta};
use crate::error::StorageError;
use crate::memory::{Snapshot, StoreData};
use crate::traits::{namespace_not_found, Namespace};

/// The authoritative state of a session.
///
/// Readers take a [`Snapshot`]; writers hand in a [`StateDelta`] that is
/// validated in full before any of it becomes visible.
pub struct StateStore {
    current: RwLock<Arc<StoreData>>,
}

impl StateStore {
    /// Create a store holding only the (empty) accounts namespace.
    pub fn new() -> Self {
        let mut data = StoreData::default();
        data.namespaces.insert(Namespace::Accounts, Default::default());
        Self {
            current: RwLock::new(Arc::new(data)),
        }
    }

    /// A consistent view of the latest committed state.
    pub fn snapshot(&self) -> Result<Snapshot, StorageError> {
        let current = self.current.read().map_err(|e| StorageError::LockPoisoned {
            reason: e.to_string(),
        })?;
        Ok(Snapshot(Arc::clone(&current)))
    }

    /// Apply a delta atomically. Either every operation takes effect or none
    /// does. Returns the new version.
    pub fn apply(&self, delta: StateDelta) -> Result<u64, StorageError> {
        let mut current = self.current.write().map_err(|e| StorageError::LockPoisoned {
            reason: e.to_string(),
        })?;

        validate(&current, &delta)?;

        let data = Arc::make_mut(&mut *current);
        for op in delta.into_ops() {
            match op {
                DeltaOp::CreateNamespace { namespace } => {
                    data.namespaces.insert(namespace, Default::default());
                }
                DeltaOp::Put {
                    namespace,
                    key,
                    value,
                } => {
                    if let Some(entries) = data.namespaces.get_mut(&namespace) {
                        entries.insert(key, value);
                    }
                }
                DeltaOp::Delete { namespace, key } => {
                    if let Some(entries) = data.namespaces.get_mut(&namespace) {
                        entries.remove(&key);
                    }
                }
            }
        }
        data.version += 1;
        Ok(data.version)
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Check every operation against the current state plus the namespaces the
/// delta itself creates earlier on.
fn validate(data: &StoreData, delta: &StateDelta) -> Result<(), StorageError> {
    let mut created: BTreeSet<&Namespace> = BTreeSet::new();
    for op in delta.ops() {
        let namespace = op.namespace();
        let present = data.namespaces.contains_key(namespace) || created.contains(namespace);
        match op {
            DeltaOp::CreateNamespace { .. } => {
                if present {
                    return Err(StorageError::NamespaceExists {
                        namespace: namespace.to_string(),
                    });
                }
                created.insert(namespace);
            }
            DeltaOp::Put { .. } | DeltaOp::Delete { .. } => {
                if !present {
                    return Err(namespace_not_found(namespace));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::StateReader;

    fn put(ns: &Namespace, key: &[u8], value: &[u8]) -> DeltaOp {
        DeltaOp::Put {
            namespace: ns.clone(),
            key: key.to_vec(),
            value: value.to_vec(),
        }
    }

    #[test]
    fn test_new_store_has_accounts() {
        let store = StateStore::new();
        let snap = store.snapshot().unwrap();
        assert!(snap.has_namespace(&Namespace::Accounts));
    }

    #[test]
    fn test_apply_create_and_put() {
        let store = StateStore::new();
        let ns = Namespace::program("counter");
        let delta: StateDelta = vec![
            DeltaOp::CreateNamespace {
                namespace: ns.clone(),
            },
            put(&ns, b"count", b"\x01"),
        ]
        .into_iter()
        .collect();
        assert_eq!(store.apply(delta).unwrap(), 1);
        let snap = store.snapshot().unwrap();
        assert_eq!(snap.get(&ns, b"count").unwrap(), Some(vec![1]));
    }

    #[test]
    fn test_apply_is_all_or_nothing() {
        let store = StateStore::new();
        let ghost = Namespace::program("ghost");
        let delta: StateDelta = vec![
            put(&Namespace::Accounts, b"a", b"1"),
            put(&ghost, b"k", b"v"),
        ]
        .into_iter()
        .collect();
        let err = store.apply(delta).unwrap_err();
        assert!(matches!(err, StorageError::NamespaceNotFound { .. }));
        let snap = store.snapshot().unwrap();
        assert_eq!(snap.get(&Namespace::Accounts, b"a").unwrap(), None);
        // The failed delta did not consume a version.
        let delta: StateDelta = vec![put(&Namespace::Accounts, b"a", b"1")].into_iter().collect();
        assert_eq!(store.apply(delta).unwrap(), 1);
    }

    #[test]
    fn test_create_existing_namespace_fails() {
        let store = StateStore::new();
        let delta: StateDelta = vec![DeltaOp::CreateNamespace {
            namespace: Namespace::Accounts,
        }]
        .into_iter()
        .collect();
        assert!(matches!(
            store.apply(delta),
            Err(StorageError::NamespaceExists { .. })
        ));
    }

    #[test]
    fn test_snapshot_isolation() {
        let store = StateStore::new();
        let before = store.snapshot().unwrap();
        let delta: StateDelta = vec![put(&Namespace::Accounts, b"k", b"v")]
            .into_iter()
            .collect();
        store.apply(delta).unwrap();
        assert_eq!(before.get(&Namespace::Accounts, b"k").unwrap(), None);
        let after = store.snapshot().unwrap();
        assert_eq!(after.get(&Namespace::Accounts, b"k").unwrap(), Some(b"v".to_vec()));
        assert_ne!(before.state_root(), after.state_root());
    }

    #[test]
    fn test_delete() {
        let store = StateStore::new();
        store
            .apply(vec![put(&Namespace::Accounts, b"k", b"v")].into_iter().collect())
            .unwrap();
        store
            .apply(
                vec![DeltaOp::Delete {
                    namespace: Namespace::Accounts,
                    key: b"k".to_vec(),
                }]
                .into_iter()
                .collect(),
            )
            .unwrap();
        let snap = store.snapshot().unwrap();
        assert!(!snap.exists(&Namespace::Accounts, b"k").unwrap());
    }
}
