//! The two-party PTLC swap
//!
//! Two parties each lock an asset in a ledger escrow that releases to whoever presents a valid Ed25519 signature
//! under an aggregated key. The initiator's claim of the responder's escrow reveals the adaptor secret `t`, which
//! the responder then uses to complete its own claim. Either both claims can happen or neither can.
//!
//! - [`initiator`] and [`responder`]: the two state machines. Both implement [`SwapParty`].
//! - [`messages`]: the wire messages and their binary encoding.
//! - [`channel`]: the transport abstraction and an in-memory implementation.
//! - [`swap_keys`]: per-swap ephemeral keys and the per-leg signing context.
//! - [`config`]: swap parameters and their validation.
//! - [`error`]: swap errors and the record a party leaves behind when it aborts.

pub mod channel;
pub mod config;
pub mod error;
pub mod initiator;
pub mod messages;
pub mod responder;
mod session;
pub mod stage;
pub mod swap_keys;
pub mod utils;

pub use channel::{ChannelError, InMemoryChannel, MessageChannel};
pub use config::{EscrowOffer, SwapConfig};
pub use error::{AbortRecord, PendingClaim, Severity, SwapError};
pub use initiator::InitiatorSwap;
pub use messages::{SwapMessage, PROTOCOL_VERSION};
pub use responder::ResponderSwap;
pub use session::{submit_claim, PublicSwapKeys, SwapOutcome, SwapParty};
pub use stage::{HasRole, SwapRole, SwapStage};

#[cfg(all(test, feature = "dummy_ledger"))]
mod tests;
