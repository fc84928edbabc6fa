//! Shared type definitions for the simnet local network simulator.
//!
//! Values, type signatures, principals and accounts used by the storage,
//! execution and session crates.

pub mod account;
pub mod constants;
pub mod error;
pub mod genesis;
pub mod primitives;
pub mod principal;
pub mod signature;
pub mod value;

#[cfg(test)]
mod tests {
    use borsh::{BorshDeserialize, BorshSerialize};
    use proptest::prelude::*;

    use crate::account::Account;
    use crate::primitives::Address;
    use crate::principal::{Principal, ProgramId};
    use crate::value::Value;

    /// Helper: borsh round-trip test.
    fn borsh_roundtrip<T: BorshSerialize + BorshDeserialize + PartialEq + std::fmt::Debug>(
        value: &T,
    ) {
        let encoded = borsh::to_vec(value).expect("borsh serialize failed");
        let decoded = T::try_from_slice(&encoded).expect("borsh deserialize failed");
        assert_eq!(*value, decoded);
    }

    #[test]
    fn test_account_roundtrip() {
        let account = Account {
            principal: Principal::Contract(ProgramId::new(Address::new([9u8; 20]), "vault")),
            balance: 1_000_000,
            nonce: 3,
        };
        borsh_roundtrip(&account);
    }

    fn arb_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            any::<u128>().prop_map(Value::UInt),
            any::<i128>().prop_map(Value::Int),
            any::<bool>().prop_map(Value::Bool),
            proptest::collection::vec(any::<u8>(), 0..8).prop_map(Value::Buffer),
            "[a-z]{0,8}".prop_map(Value::StringAscii),
            any::<[u8; 20]>().prop_map(|b| Value::Principal(Principal::Standard(Address::new(b)))),
        ];
        leaf.prop_recursive(3, 16, 4, |inner| {
            prop_oneof![
                inner.clone().prop_map(Value::some),
                inner.clone().prop_map(Value::okay),
                inner.clone().prop_map(Value::error),
                proptest::collection::vec(inner.clone(), 0..4).prop_map(Value::List),
                proptest::collection::btree_map("[a-z]{1,4}", inner, 0..4).prop_map(Value::Tuple),
            ]
        })
    }

    proptest! {
        #[test]
        fn prop_value_encoding_is_injective(a in arb_value(), b in arb_value()) {
            prop_assert_eq!(a == b, a.to_bytes() == b.to_bytes());
        }
    }
}
