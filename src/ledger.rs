//! Account balances consulted by validation and charged by execution.

use crate::error::{ChainError, Result};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    TokenDeposit,
    TokenWithdraw,
    /// Emitted by scripts; the code is opaque to the core.
    Custom(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventPayload {
    Token { symbol: String, value: BigUint },
    Raw(#[serde(with = "serde_bytes")] Vec<u8>),
}

/// Notification handed to observers (indexers, P2P) when state changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    #[serde(with = "serde_bytes")]
    pub public_key: Vec<u8>,
    pub payload: EventPayload,
}

impl Event {
    pub fn token(kind: EventKind, public_key: &[u8], symbol: &str, value: BigUint) -> Self {
        Event {
            kind,
            public_key: public_key.to_vec(),
            payload: EventPayload::Token {
                symbol: symbol.to_string(),
                value,
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    #[serde(with = "serde_bytes")]
    pub public_key: Vec<u8>,
    pub balances: BTreeMap<String, BigUint>,
}

impl Account {
    pub fn new(public_key: &[u8]) -> Self {
        Account {
            public_key: public_key.to_vec(),
            balances: BTreeMap::new(),
        }
    }

    pub fn balance(&self, token: &str) -> BigUint {
        self.balances.get(token).cloned().unwrap_or_default()
    }
}

/// Ledger state the core reads and charges. Implemented by the chain store.
pub trait Ledger {
    fn get_account(&self, public_key: &[u8]) -> Option<&Account>;

    fn get_balance(&self, account: &Account, token: &str) -> BigUint {
        account.balance(token)
    }

    /// Removes `amount` of `token` from the account. Either the whole amount
    /// is withdrawn and `on_event` observes it, or nothing changes.
    fn withdraw(
        &mut self,
        public_key: &[u8],
        token: &str,
        amount: &BigUint,
        on_event: &mut dyn FnMut(Event),
    ) -> Result<()>;
}

/// Hash-map backed ledger for tests, tooling and single-process nodes.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    accounts: HashMap<Vec<u8>, Account>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the account for `public_key`, creating an empty one if needed.
    pub fn open_account(&mut self, public_key: &[u8]) -> &mut Account {
        self.accounts
            .entry(public_key.to_vec())
            .or_insert_with(|| Account::new(public_key))
    }

    pub fn deposit(
        &mut self,
        public_key: &[u8],
        token: &str,
        amount: BigUint,
        on_event: &mut dyn FnMut(Event),
    ) {
        if amount.bits() == 0 {
            return;
        }
        let account = self.open_account(public_key);
        *account.balances.entry(token.to_string()).or_default() += &amount;
        on_event(Event::token(
            EventKind::TokenDeposit,
            public_key,
            token,
            amount,
        ));
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

impl Ledger for InMemoryLedger {
    fn get_account(&self, public_key: &[u8]) -> Option<&Account> {
        self.accounts.get(public_key)
    }

    fn withdraw(
        &mut self,
        public_key: &[u8],
        token: &str,
        amount: &BigUint,
        on_event: &mut dyn FnMut(Event),
    ) -> Result<()> {
        let account = self
            .accounts
            .get_mut(public_key)
            .ok_or_else(|| ChainError::AccountNotFound(hex::encode(public_key)))?;

        let available = account.balance(token);
        if &available < amount {
            return Err(ChainError::InsufficientBalance {
                account: hex::encode(public_key),
                token: token.to_string(),
                available: available.to_string(),
                required: amount.to_string(),
            });
        }

        let remaining = available - amount;
        if remaining.bits() == 0 {
            account.balances.remove(token);
        } else {
            account.balances.insert(token.to_string(), remaining);
        }
        debug!(
            "Withdrew {} {} from {}",
            amount,
            token,
            hex::encode(public_key)
        );

        on_event(Event::token(
            EventKind::TokenWithdraw,
            public_key,
            token,
            amount.clone(),
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "SOUL";

    #[test]
    fn test_deposit_and_balance() {
        let mut ledger = InMemoryLedger::new();
        let mut events = Vec::new();
        ledger.deposit(b"alice", TOKEN, BigUint::from(100u32), &mut |e| events.push(e));

        let account = ledger.get_account(b"alice").unwrap();
        assert_eq!(ledger.get_balance(account, TOKEN), BigUint::from(100u32));
        assert_eq!(ledger.get_balance(account, "OTHER"), BigUint::from(0u32));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::TokenDeposit);
    }

    #[test]
    fn test_zero_deposit_opens_nothing() {
        let mut ledger = InMemoryLedger::new();
        let mut events = Vec::new();
        ledger.deposit(b"alice", TOKEN, BigUint::from(0u32), &mut |e| events.push(e));
        assert!(ledger.is_empty());
        assert!(events.is_empty());

        ledger.deposit(b"alice", TOKEN, BigUint::from(1u32), &mut |e| events.push(e));
        ledger.deposit(b"bob", TOKEN, BigUint::from(1u32), &mut |e| events.push(e));
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_withdraw_emits_event() {
        let mut ledger = InMemoryLedger::new();
        ledger.deposit(b"alice", TOKEN, BigUint::from(100u32), &mut |_| {});

        let mut events = Vec::new();
        ledger
            .withdraw(b"alice", TOKEN, &BigUint::from(40u32), &mut |e| events.push(e))
            .unwrap();

        let account = ledger.get_account(b"alice").unwrap();
        assert_eq!(account.balance(TOKEN), BigUint::from(60u32));
        assert_eq!(
            events,
            vec![Event::token(
                EventKind::TokenWithdraw,
                b"alice",
                TOKEN,
                BigUint::from(40u32)
            )]
        );
    }

    #[test]
    fn test_withdraw_insufficient_leaves_balance() {
        let mut ledger = InMemoryLedger::new();
        ledger.deposit(b"alice", TOKEN, BigUint::from(10u32), &mut |_| {});

        let mut events = Vec::new();
        let result = ledger.withdraw(b"alice", TOKEN, &BigUint::from(11u32), &mut |e| {
            events.push(e)
        });

        assert!(matches!(result, Err(ChainError::InsufficientBalance { .. })));
        assert_eq!(
            ledger.get_account(b"alice").unwrap().balance(TOKEN),
            BigUint::from(10u32)
        );
        assert!(events.is_empty());
    }

    #[test]
    fn test_withdraw_unknown_account() {
        let mut ledger = InMemoryLedger::new();
        let result = ledger.withdraw(b"nobody", TOKEN, &BigUint::from(1u32), &mut |_| {});
        assert!(matches!(result, Err(ChainError::AccountNotFound(_))));
    }
}
