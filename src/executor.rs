//! Applies validated transaction records to the ledger.

use crate::blockchain::{Block, ChainState};
use crate::crypto::{CryptoProvider, Hash};
use crate::ledger::{Event, Ledger};
use crate::transaction::{TransactionRecord, Validator};
use crate::vm::ScriptExecutor;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionOutcome {
    /// Script halted and the fee was charged.
    Success,
    /// Script did not halt, or the fee could not be charged. Ledger untouched.
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxOutcome {
    /// Failed admission against the ledger at its turn in the block.
    Rejected,
    Executed(ExecutionOutcome),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: Hash,
    pub outcome: TxOutcome,
    /// Gas reported by the script run; `None` when the record never ran.
    pub gas_used: Option<BigUint>,
}

impl TxReceipt {
    pub fn is_success(&self) -> bool {
        self.outcome == TxOutcome::Executed(ExecutionOutcome::Success)
    }
}

/// Runs scripts and charges their cost in the native token.
///
/// Executing the same record twice charges twice; the caller applies each
/// accepted record at most once.
#[derive(Debug, Clone)]
pub struct Executor<S> {
    scripts: S,
}

impl<S: ScriptExecutor> Executor<S> {
    pub fn new(scripts: S) -> Self {
        Executor { scripts }
    }

    /// Returns `true` when the script halted and its cost was charged.
    pub fn execute<L: Ledger>(
        &self,
        record: &TransactionRecord,
        chain: &mut ChainState<L>,
        on_event: &mut dyn FnMut(Event),
    ) -> bool {
        self.run(record, chain, on_event).0 == ExecutionOutcome::Success
    }

    fn run<L: Ledger>(
        &self,
        record: &TransactionRecord,
        chain: &mut ChainState<L>,
        on_event: &mut dyn FnMut(Event),
    ) -> (ExecutionOutcome, BigUint) {
        let report = self.scripts.run(record.script());
        if !report.is_halted() {
            debug!(
                "Transaction {} ended in {:?}; ledger left untouched",
                record.hash_str(),
                report.state
            );
            return (ExecutionOutcome::Failure, report.gas_used);
        }

        let gas_used = report.gas_used;
        if let Some(token) = chain.native_token().map(str::to_string) {
            if gas_used.bits() > 0 {
                if &gas_used > record.fee() {
                    // charged in full: no cap is applied at execution time
                    warn!(
                        "Transaction {} used {} gas, above its fee of {}",
                        record.hash_str(),
                        gas_used,
                        record.fee()
                    );
                }

                if let Err(e) = chain.ledger_mut().withdraw(
                    record.sender_public_key(),
                    &token,
                    &gas_used,
                    on_event,
                ) {
                    warn!(
                        "Could not charge {} {} for transaction {}: {}",
                        gas_used,
                        token,
                        record.hash_str(),
                        e
                    );
                    return (ExecutionOutcome::Failure, gas_used);
                }
            }
        }

        for event in report.events {
            on_event(event);
        }
        self.scripts.apply_storage_changes(record);

        (ExecutionOutcome::Success, gas_used)
    }

    /// Validates then executes each record strictly in order, so every
    /// admission check sees the ledger as left by the record before it.
    pub fn apply_transactions<L: Ledger, C: CryptoProvider>(
        &self,
        transactions: &[TransactionRecord],
        validator: &Validator<C>,
        chain: &mut ChainState<L>,
        on_event: &mut dyn FnMut(Event),
    ) -> Vec<TxReceipt> {
        let mut receipts = Vec::with_capacity(transactions.len());
        for record in transactions {
            let receipt = if validator.is_valid(record, chain) {
                let (outcome, gas_used) = self.run(record, chain, on_event);
                TxReceipt {
                    tx_hash: record.hash(),
                    outcome: TxOutcome::Executed(outcome),
                    gas_used: Some(gas_used),
                }
            } else {
                TxReceipt {
                    tx_hash: record.hash(),
                    outcome: TxOutcome::Rejected,
                    gas_used: None,
                }
            };
            receipts.push(receipt);
        }
        receipts
    }

    pub fn apply_block<L: Ledger, C: CryptoProvider>(
        &self,
        block: &Block,
        validator: &Validator<C>,
        chain: &mut ChainState<L>,
        on_event: &mut dyn FnMut(Event),
    ) -> Vec<TxReceipt> {
        self.apply_transactions(block.transactions(), validator, chain, on_event)
    }
}
