//! Interface to the script virtual machine.
//!
//! The instruction set and gas rules live outside this crate; the core only
//! needs the terminal state, the gas consumed and the events emitted.

use crate::ledger::Event;
use crate::transaction::TransactionRecord;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

/// Outcome classification of one script run. Only `Halted` is success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerminalState {
    Halted,
    Faulted,
    /// Aborted by the VM itself, e.g. on timeout.
    Broken,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    pub state: TerminalState,
    pub gas_used: BigUint,
    pub events: Vec<Event>,
}

impl ExecutionReport {
    pub fn halted(gas_used: impl Into<BigUint>, events: Vec<Event>) -> Self {
        ExecutionReport {
            state: TerminalState::Halted,
            gas_used: gas_used.into(),
            events,
        }
    }

    pub fn failed(state: TerminalState, gas_used: impl Into<BigUint>) -> Self {
        ExecutionReport {
            state,
            gas_used: gas_used.into(),
            events: Vec::new(),
        }
    }

    pub fn is_halted(&self) -> bool {
        self.state == TerminalState::Halted
    }
}

pub trait ScriptExecutor {
    fn run(&self, script: &[u8]) -> ExecutionReport;

    /// Commits storage writes made by a successful run of `record`.
    ///
    /// The core has no storage model of its own, so this does nothing unless
    /// the VM integration supplies it.
    fn apply_storage_changes(&self, _record: &TransactionRecord) {}
}

impl<F> ScriptExecutor for F
where
    F: Fn(&[u8]) -> ExecutionReport,
{
    fn run(&self, script: &[u8]) -> ExecutionReport {
        self(script)
    }
}
