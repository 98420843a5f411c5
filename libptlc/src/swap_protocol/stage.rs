use crate::error::ReadError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Types that play one side of a swap.
pub trait HasRole {
    fn role(&self) -> SwapRole;
}

/// The two sides of a swap. The initiator generates the adaptor secret and is the first to claim.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwapRole {
    Initiator,
    Responder,
}

impl fmt::Display for SwapRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwapRole::Initiator => write!(f, "Initiator"),
            SwapRole::Responder => write!(f, "Responder"),
        }
    }
}

impl SwapRole {
    pub const fn other(&self) -> Self {
        match self {
            SwapRole::Initiator => SwapRole::Responder,
            SwapRole::Responder => SwapRole::Initiator,
        }
    }

    pub const fn is_initiator(&self) -> bool {
        matches!(self, SwapRole::Initiator)
    }

    pub const fn as_u8(&self) -> u8 {
        match self {
            SwapRole::Initiator => 0,
            SwapRole::Responder => 1,
        }
    }
}

impl TryFrom<u8> for SwapRole {
    type Error = ReadError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SwapRole::Initiator),
            1 => Ok(SwapRole::Responder),
            _ => Err(ReadError::new("SwapRole", format!("Invalid representation for SwapRole: {value}"))),
        }
    }
}

/// Where a party is in the swap. Both roles pass through every stage in order, except that the responder observes
/// the initiator's escrow before funding its own, so for the responder `RemoteEscrowObserved` comes first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SwapStage {
    /// Ephemeral keys generated, nothing exchanged yet.
    Init,
    /// Both parties' public keys received and proven.
    KeysExchanged,
    /// This party's escrow is active on the ledger.
    LocalEscrowFunded,
    /// The counterparty's escrow is active and its terms check out.
    RemoteEscrowObserved,
    /// Partial signatures exchanged and verified.
    ChallengesExchanged,
    /// The initiator holds a verified pre-signature for leg 1.
    AdaptorPreSigExchanged,
    /// The responder's escrow has been claimed, which reveals the adaptor secret.
    CounterpartUnlocked,
    /// This party holds a valid signature for the escrow it claims.
    LocalCompleted,
    /// Swap finished.
    Done,
    /// Swap failed.
    Aborted,
}

impl SwapStage {
    pub const fn is_terminal(&self) -> bool {
        matches!(self, SwapStage::Done | SwapStage::Aborted)
    }
}

impl fmt::Display for SwapStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "Init"),
            Self::KeysExchanged => write!(f, "KeysExchanged"),
            Self::LocalEscrowFunded => write!(f, "LocalEscrowFunded"),
            Self::RemoteEscrowObserved => write!(f, "RemoteEscrowObserved"),
            Self::ChallengesExchanged => write!(f, "ChallengesExchanged"),
            Self::AdaptorPreSigExchanged => write!(f, "AdaptorPreSigExchanged"),
            Self::CounterpartUnlocked => write!(f, "CounterpartUnlocked"),
            Self::LocalCompleted => write!(f, "LocalCompleted"),
            Self::Done => write!(f, "Done"),
            Self::Aborted => write!(f, "Aborted"),
        }
    }
}
