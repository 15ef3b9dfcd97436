/// Admission checks for transaction records, separated from the type definitions
use crate::blockchain::ChainState;
use crate::crypto::{CryptoProvider, Secp256k1Sha256};
use crate::error::{ChainError, Result};
use crate::ledger::Ledger;
use crate::transaction::types::TransactionRecord;
use num_bigint::BigUint;
use tracing::debug;

/// Stateless predicate deciding whether a record is authentic and
/// affordable against the ledger as it is right now.
///
/// The answer is only good for the ledger snapshot it was computed on;
/// callers re-run it after any ledger mutation.
#[derive(Debug, Clone, Default)]
pub struct Validator<C = Secp256k1Sha256> {
    crypto: C,
}

impl<C: CryptoProvider> Validator<C> {
    pub fn new(crypto: C) -> Self {
        Validator { crypto }
    }

    /// Cost the record declares before it has run.
    ///
    /// Gas is only known after execution, so this is always zero and the
    /// fee check below only guards against an external minimum.
    pub fn declared_cost<L: Ledger>(
        &self,
        _record: &TransactionRecord,
        _chain: &ChainState<L>,
    ) -> Result<BigUint> {
        Ok(BigUint::default())
    }

    /// Runs every admission check in order and stops at the first failure.
    pub fn validate<L: Ledger>(
        &self,
        record: &TransactionRecord,
        chain: &ChainState<L>,
    ) -> Result<()> {
        let signature = record.signature().ok_or_else(|| {
            ChainError::InvalidTransaction("Transaction not signed".to_string())
        })?;

        if !self.crypto.verify(
            &record.signable_message(),
            signature,
            record.sender_public_key(),
        ) {
            return Err(ChainError::CryptoError(
                "Signature verification failed".to_string(),
            ));
        }

        let cost = self.declared_cost(record, chain)?;

        if let Some(token) = chain.native_token() {
            if record.fee() < &cost {
                return Err(ChainError::InvalidTransaction(format!(
                    "Fee {} is below declared cost {}",
                    record.fee(),
                    cost
                )));
            }

            let ledger = chain.ledger();
            let account = ledger.get_account(record.sender_public_key()).ok_or_else(|| {
                ChainError::AccountNotFound(hex::encode(record.sender_public_key()))
            })?;

            let balance = ledger.get_balance(account, token);
            if &balance < record.fee() {
                return Err(ChainError::InsufficientBalance {
                    account: hex::encode(record.sender_public_key()),
                    token: token.to_string(),
                    available: balance.to_string(),
                    required: record.fee().to_string(),
                });
            }
        }

        Ok(())
    }

    pub fn is_valid<L: Ledger>(&self, record: &TransactionRecord, chain: &ChainState<L>) -> bool {
        match self.validate(record, chain) {
            Ok(()) => true,
            Err(e) => {
                debug!("Rejected transaction {}: {}", record.hash_str(), e);
                false
            }
        }
    }
}

impl TransactionRecord {
    /// Checks the record with the default secp256k1 provider.
    pub fn is_valid<L: Ledger>(&self, chain: &ChainState<L>) -> bool {
        Validator::<Secp256k1Sha256>::default().is_valid(self, chain)
    }
}
