use std::collections::BTreeMap;
use std::sync::Arc;

use simnet_crypto::hash::FramedHasher;
use simnet_types::primitives::Hash;

use crate::error::StorageError;
use crate::traits::{namespace_not_found, KvPairs, Namespace, StateReader};

/// Ordered key/value map of one namespace.
pub(crate) type Entries = BTreeMap<Vec<u8>, Vec<u8>>;

/// The full contents of the store at one version.
/// Uses BTreeMap throughout so that iteration and hashing are deterministic.
#[derive(Debug, Clone, Default)]
pub struct StoreData {
    pub(crate) namespaces: BTreeMap<Namespace, Entries>,
    pub(crate) version: u64,
}

/// An immutable, cheaply cloneable view of the store at one version.
///
/// Later commits never change a snapshot that has already been taken.
#[derive(Debug, Clone, Default)]
pub struct Snapshot(pub(crate) Arc<StoreData>);

impl Snapshot {
    /// All entries of a namespace in key order.
    pub fn scan(&self, namespace: &Namespace) -> Result<KvPairs, StorageError> {
        let entries = self.entries(namespace)?;
        Ok(entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    /// Entries of a namespace whose key starts with `prefix`.
    pub fn prefix_scan(&self, namespace: &Namespace, prefix: &[u8]) -> Result<KvPairs, StorageError> {
        let entries = self.entries(namespace)?;
        let results: KvPairs = entries
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(results)
    }

    /// Commitment to the whole state: every namespace, key and value in
    /// order, each length-prefixed.
    pub fn state_root(&self) -> Hash {
        let mut hasher = FramedHasher::new("simnet state root v1");
        for (namespace, entries) in &self.0.namespaces {
            hasher
                .field(&borsh::to_vec(namespace).unwrap_or_default())
                .u64(entries.len() as u64);
            for (key, value) in entries {
                hasher.field(key).field(value);
            }
        }
        hasher.finish()
    }

    fn entries(&self, namespace: &Namespace) -> Result<&Entries, StorageError> {
        self.0
            .namespaces
            .get(namespace)
            .ok_or_else(|| namespace_not_found(namespace))
    }
}

impl StateReader for Snapshot {
    fn get(&self, namespace: &Namespace, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.entries(namespace)?.get(key).cloned())
    }

    fn has_namespace(&self, namespace: &Namespace) -> bool {
        self.0.namespaces.contains_key(namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_with(entries: &[(&[u8], &[u8])]) -> Snapshot {
        let mut data = StoreData::default();
        let ns = data.namespaces.entry(Namespace::Accounts).or_default();
        for (k, v) in entries {
            ns.insert(k.to_vec(), v.to_vec());
        }
        Snapshot(Arc::new(data))
    }

    #[test]
    fn test_get_and_exists() {
        let snap = snapshot_with(&[(b"k", b"v")]);
        assert_eq!(snap.get(&Namespace::Accounts, b"k").unwrap(), Some(b"v".to_vec()));
        assert!(snap.exists(&Namespace::Accounts, b"k").unwrap());
        assert!(!snap.exists(&Namespace::Accounts, b"nope").unwrap());
    }

    #[test]
    fn test_missing_namespace() {
        let snap = snapshot_with(&[]);
        let ns = Namespace::program("ghost");
        assert!(!snap.has_namespace(&ns));
        assert!(matches!(
            snap.get(&ns, b"k"),
            Err(StorageError::NamespaceNotFound { .. })
        ));
    }

    #[test]
    fn test_prefix_scan() {
        let snap = snapshot_with(&[
            (b"prefix:a", b"1"),
            (b"prefix:b", b"2"),
            (b"prefix:c", b"3"),
            (b"other:d", b"4"),
        ]);
        let results = snap.prefix_scan(&Namespace::Accounts, b"prefix:").unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].0, b"prefix:a".to_vec());
        assert_eq!(results[2].0, b"prefix:c".to_vec());
        assert_eq!(snap.scan(&Namespace::Accounts).unwrap().len(), 4);
    }

    #[test]
    fn test_state_root_is_content_addressed() {
        let a = snapshot_with(&[(b"k1", b"v1"), (b"k2", b"v2")]);
        let b = snapshot_with(&[(b"k2", b"v2"), (b"k1", b"v1")]);
        let c = snapshot_with(&[(b"k1", b"v1"), (b"k2", b"v3")]);
        assert_eq!(a.state_root(), b.state_root());
        assert_ne!(a.state_root(), c.state_root());
    }

    #[test]
    fn test_state_root_framing() {
        // ("ab", "c") and ("a", "bc") must not collide.
        let a = snapshot_with(&[(b"ab", b"c")]);
        let b = snapshot_with(&[(b"a", b"bc")]);
        assert_ne!(a.state_root(), b.state_root());
    }
}
