use crate::ledger::Ledger;

/// What validation and execution see of the chain: the ledger and the
/// optional native fee token.
#[derive(Debug, Clone)]
pub struct ChainState<L> {
    native_token: Option<String>,
    ledger: L,
}

impl<L: Ledger> ChainState<L> {
    pub fn new(ledger: L, native_token: Option<String>) -> Self {
        ChainState {
            native_token,
            ledger,
        }
    }

    /// Symbol fees are paid in. `None` disables fee checks and charging.
    pub fn native_token(&self) -> Option<&str> {
        self.native_token.as_deref()
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut L {
        &mut self.ledger
    }
}
