use crate::cryptography::keys::KeyError;
use crate::cryptography::schnorr::Signature;
use crate::error::ReadError;
use crate::ledger::{EscrowReference, LedgerError};
use crate::swap_protocol::channel::ChannelError;
use crate::swap_protocol::stage::{SwapRole, SwapStage};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SwapError {
    #[error("Could not decode {0}")]
    Decoding(String),
    #[error("Verification failed: {0}")]
    VerificationFailure(String),
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
    #[error("Channel error: {0}")]
    Channel(ChannelError),
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),
    #[error("The counterparty aborted the swap: {0}")]
    CounterpartyAborted(String),
    #[error("Escrow terms do not match: {0}")]
    EscrowTermsMismatch(String),
    #[error("Invalid swap configuration: {0}")]
    InvalidConfig(String),
    #[error("Invalid state transition: cannot {action} from {state} state")]
    InvalidStateTransition { state: String, action: &'static str },
}

impl SwapError {
    pub fn verification(what: impl Into<String>) -> Self {
        SwapError::VerificationFailure(what.into())
    }

    pub fn violation(what: impl Into<String>) -> Self {
        SwapError::ProtocolViolation(what.into())
    }

    pub fn terms(what: impl Into<String>) -> Self {
        SwapError::EscrowTermsMismatch(what.into())
    }
}

impl From<ChannelError> for SwapError {
    fn from(e: ChannelError) -> Self {
        match e {
            ChannelError::Decode(e) => SwapError::Decoding(e.to_string()),
            e => SwapError::Channel(e),
        }
    }
}

impl From<ReadError> for SwapError {
    fn from(e: ReadError) -> Self {
        SwapError::Decoding(e.to_string())
    }
}

impl From<KeyError> for SwapError {
    fn from(e: KeyError) -> Self {
        SwapError::Decoding(e.to_string())
    }
}

/// How bad an abort is for the party that aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Nothing was revealed. The party's own escrow, if any, is refunded when it expires.
    Safe,
    /// A valid claim signature exists but submitting it failed. Retry with the pending claim; unlock is idempotent.
    Retryable,
    /// The counterparty may be able to claim, or already has, and this party could not complete. Needs attention.
    Alert,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Safe => write!(f, "Safe"),
            Severity::Retryable => write!(f, "Retryable"),
            Severity::Alert => write!(f, "Alert"),
        }
    }
}

/// A valid claim signature that has not made it onto the ledger yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingClaim {
    pub escrow: EscrowReference,
    pub signature: Signature,
}

/// Everything an orchestrator needs to know about a failed swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbortRecord {
    pub role: SwapRole,
    /// The last stage reached before the failure.
    pub stage: SwapStage,
    pub error: SwapError,
    pub severity: Severity,
    pub pending_claim: Option<PendingClaim>,
}

impl fmt::Display for AbortRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} aborted at {} ({}): {}", self.role, self.stage, self.severity, self.error)?;
        if let Some(claim) = &self.pending_claim {
            write!(f, ". Pending claim on escrow {}", claim.escrow)?;
        }
        Ok(())
    }
}
