use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::error::TypesError;
use crate::primitives::{Amount, Nonce};
use crate::principal::Principal;

/// A simulated account: a principal with a balance and a replay nonce.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Account {
    /// Owner of the account.
    pub principal: Principal,
    /// Balance in micro-units.
    pub balance: Amount,
    /// Number of committed calls sent by this account.
    pub nonce: Nonce,
}

impl Account {
    /// Create an account with the given opening balance.
    pub fn new(principal: Principal, balance: Amount) -> Self {
        Self {
            principal,
            balance,
            nonce: 0,
        }
    }

    /// Credit micro-units to this account. Returns error on overflow.
    pub fn credit(&mut self, amount: Amount) -> Result<(), TypesError> {
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or(TypesError::BalanceOverflow)?;
        Ok(())
    }

    /// Debit micro-units from this account.
    pub fn debit(&mut self, amount: Amount) -> Result<(), TypesError> {
        if self.balance < amount {
            return Err(TypesError::InsufficientBalance {
                available: self.balance,
                required: amount,
            });
        }
        self.balance -= amount;
        Ok(())
    }

    /// Advance the replay nonce by one.
    pub fn bump_nonce(&mut self) -> Result<(), TypesError> {
        self.nonce = self.nonce.checked_add(1).ok_or(TypesError::NonceOverflow)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::Address;

    fn account(balance: Amount) -> Account {
        Account::new(Principal::Standard(Address::new([1u8; 20])), balance)
    }

    #[test]
    fn test_credit_and_debit() {
        let mut acc = account(100);
        acc.credit(50).unwrap();
        assert_eq!(acc.balance, 150);
        acc.debit(150).unwrap();
        assert_eq!(acc.balance, 0);
    }

    #[test]
    fn test_debit_insufficient() {
        let mut acc = account(10);
        let err = acc.debit(11).unwrap_err();
        assert_eq!(
            err,
            TypesError::InsufficientBalance {
                available: 10,
                required: 11
            }
        );
        assert_eq!(acc.balance, 10);
    }

    #[test]
    fn test_credit_overflow() {
        let mut acc = account(u128::MAX);
        assert_eq!(acc.credit(1), Err(TypesError::BalanceOverflow));
    }

    #[test]
    fn test_bump_nonce() {
        let mut acc = account(0);
        acc.bump_nonce().unwrap();
        acc.bump_nonce().unwrap();
        assert_eq!(acc.nonce, 2);
    }
}
