//! State storage for the simnet local network simulator.
//!
//! Provides an in-memory [`StateStore`](state_store::StateStore) partitioned
//! into namespaces, immutable [`Snapshot`](memory::Snapshot)s for readers,
//! buffered [`Transaction`](transaction::Transaction)s for writers, and
//! [`StateDelta`](delta::StateDelta)s that are committed all-or-nothing.

pub mod delta;
pub mod error;
pub mod memory;
pub mod state_store;
pub mod traits;
pub mod transaction;

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use proptest::prelude::*;

    use crate::state_store::StateStore;
    use crate::traits::{Namespace, StateReader};
    use crate::transaction::Transaction;

    #[derive(Debug, Clone)]
    enum Op {
        Put(u8, u8),
        Delete(u8),
        Checkpoint,
        Rollback,
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            4 => (0u8..8, any::<u8>()).prop_map(|(k, v)| Op::Put(k, v)),
            2 => (0u8..8).prop_map(Op::Delete),
            1 => Just(Op::Checkpoint),
            1 => Just(Op::Rollback),
        ]
    }

    proptest! {
        /// Committing a transaction's delta yields exactly the state a plain
        /// map would hold after the same writes and rollbacks.
        #[test]
        fn prop_transaction_matches_model(ops in proptest::collection::vec(arb_op(), 0..40)) {
            let store = StateStore::new();
            let ns = Namespace::Accounts;
            let mut tx = Transaction::new(store.snapshot().unwrap());
            let mut model: BTreeMap<u8, u8> = BTreeMap::new();
            let mut saved = vec![(tx.checkpoint(), model.clone())];

            for op in ops {
                match op {
                    Op::Put(k, v) => {
                        tx.put(&ns, &[k], &[v]).unwrap();
                        model.insert(k, v);
                    }
                    Op::Delete(k) => {
                        tx.delete(&ns, &[k]).unwrap();
                        model.remove(&k);
                    }
                    Op::Checkpoint => saved.push((tx.checkpoint(), model.clone())),
                    Op::Rollback => {
                        if let Some((cp, m)) = saved.pop() {
                            tx.rollback(cp);
                            model = m;
                        }
                        if saved.is_empty() {
                            saved.push((tx.checkpoint(), model.clone()));
                        }
                    }
                }
            }

            store.apply(tx.into_delta()).unwrap();
            let snap = store.snapshot().unwrap();
            for k in 0u8..8 {
                let expected = model.get(&k).map(|v| vec![*v]);
                prop_assert_eq!(snap.get(&ns, &[k]).unwrap(), expected);
            }
        }
    }
}
