use std::collections::BTreeMap;

use crate::delta::{DeltaOp, StateDelta};
use crate::error::StorageError;
use crate::memory::Snapshot;
use crate::traits::{namespace_not_found, Namespace, StateReader};

/// Buffered writes for one namespace; `None` marks a deletion.
type PendingWrites = BTreeMap<Vec<u8>, Option<Vec<u8>>>;

/// Undo record for [`Transaction::rollback`].
#[derive(Debug)]
enum JournalEntry {
    Created(Namespace),
    Wrote {
        namespace: Namespace,
        key: Vec<u8>,
        /// The pending write this one replaced, if any.
        previous: Option<Option<Vec<u8>>>,
    },
}

/// Position in a transaction's journal that can be rolled back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint(usize);

/// A write buffer layered over a [`Snapshot`].
///
/// Reads observe the transaction's own writes. Nothing reaches the store
/// until the caller turns the transaction into a [`StateDelta`] and applies
/// it.
#[derive(Debug)]
pub struct Transaction {
    base: Snapshot,
    created: Vec<Namespace>,
    writes: BTreeMap<Namespace, PendingWrites>,
    journal: Vec<JournalEntry>,
}

impl Transaction {
    pub fn new(base: Snapshot) -> Self {
        Self {
            base,
            created: Vec::new(),
            writes: BTreeMap::new(),
            journal: Vec::new(),
        }
    }

    /// The snapshot this transaction reads through to.
    pub fn base(&self) -> &Snapshot {
        &self.base
    }

    /// Create a new empty namespace.
    pub fn create_namespace(&mut self, namespace: Namespace) -> Result<(), StorageError> {
        if self.has_namespace(&namespace) {
            return Err(StorageError::NamespaceExists {
                namespace: namespace.to_string(),
            });
        }
        self.created.push(namespace.clone());
        self.journal.push(JournalEntry::Created(namespace));
        Ok(())
    }

    pub fn put(&mut self, namespace: &Namespace, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        self.write(namespace, key, Some(value.to_vec()))
    }

    pub fn delete(&mut self, namespace: &Namespace, key: &[u8]) -> Result<(), StorageError> {
        self.write(namespace, key, None)
    }

    fn write(&mut self, namespace: &Namespace, key: &[u8], value: Option<Vec<u8>>) -> Result<(), StorageError> {
        if !self.has_namespace(namespace) {
            return Err(namespace_not_found(namespace));
        }
        let previous = self
            .writes
            .entry(namespace.clone())
            .or_default()
            .insert(key.to_vec(), value);
        self.journal.push(JournalEntry::Wrote {
            namespace: namespace.clone(),
            key: key.to_vec(),
            previous,
        });
        Ok(())
    }

    /// Mark the current position so later writes can be undone.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.journal.len())
    }

    /// Undo every write and namespace creation made after `checkpoint`.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        while self.journal.len() > checkpoint.0 {
            let Some(entry) = self.journal.pop() else {
                break;
            };
            match entry {
                JournalEntry::Created(namespace) => {
                    self.created.retain(|ns| ns != &namespace);
                    self.writes.remove(&namespace);
                }
                JournalEntry::Wrote {
                    namespace,
                    key,
                    previous,
                } => {
                    let Some(pending) = self.writes.get_mut(&namespace) else {
                        continue;
                    };
                    match previous {
                        Some(prev) => {
                            pending.insert(key, prev);
                        }
                        None => {
                            pending.remove(&key);
                        }
                    }
                    if pending.is_empty() {
                        self.writes.remove(&namespace);
                    }
                }
            }
        }
    }

    /// Whether any write or creation is buffered.
    pub fn is_dirty(&self) -> bool {
        !self.journal.is_empty()
    }

    /// Turn the buffered changes into a delta: namespace creations first,
    /// then the final value of every touched key in key order.
    pub fn into_delta(self) -> StateDelta {
        let mut delta: StateDelta = self
            .created
            .into_iter()
            .map(|namespace| DeltaOp::CreateNamespace { namespace })
            .collect();
        for (namespace, pending) in self.writes {
            for (key, value) in pending {
                delta.push(match value {
                    Some(value) => DeltaOp::Put {
                        namespace: namespace.clone(),
                        key,
                        value,
                    },
                    None => DeltaOp::Delete {
                        namespace: namespace.clone(),
                        key,
                    },
                });
            }
        }
        delta
    }
}

impl StateReader for Transaction {
    fn get(&self, namespace: &Namespace, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        if let Some(pending) = self.writes.get(namespace).and_then(|p| p.get(key)) {
            return Ok(pending.clone());
        }
        if self.created.contains(namespace) {
            return Ok(None);
        }
        self.base.get(namespace, key)
    }

    fn has_namespace(&self, namespace: &Namespace) -> bool {
        self.created.contains(namespace) || self.base.has_namespace(namespace)
    }
}
