use crate::ledger::EscrowReference;
use std::time::Duration;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("The ledger rejected the action: {0}")]
    Rejected(String),
    #[error("The ledger could not be reached: {0}")]
    Unreachable(String),
    #[error("No escrow with id {0} exists on the ledger")]
    UnknownEscrow(EscrowReference),
    #[error("Escrow {0} has expired")]
    EscrowExpired(EscrowReference),
    #[error("Gave up waiting for the ledger after {0:?}")]
    Timeout(Duration),
    #[error("Account derivation failed: {0}")]
    KeyDerivation(String),
}

impl LedgerError {
    pub fn rejected(reason: impl Into<String>) -> Self {
        LedgerError::Rejected(reason.into())
    }

    /// Transient failures worth retrying with the same inputs.
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::Unreachable(_) | LedgerError::Timeout(_))
    }
}
