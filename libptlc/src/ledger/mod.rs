//! The ledger the escrows live on, seen from the swap protocol.
//!
//! The protocol only needs four things from a ledger: its clock, escrow creation, escrow unlock and escrow lookup.
//! Accounts sign the actions they submit through a [`Signer`]. The `dummy_ledger` feature provides an in-memory
//! implementation of all of these for tests and simulations.

mod data_objects;
#[cfg(feature = "dummy_ledger")]
pub mod dummy_impl;
pub mod error;
mod traits;
pub mod watcher;

pub use data_objects::{
    AccountAddress, AssetId, Confirmation, EscrowRecord, EscrowReference, EscrowStatus, EscrowTerms, LedgerAction,
    SignedAction,
};
pub use error::LedgerError;
pub use traits::{EscrowService, KeyStore, Ledger, LedgerTimeSource, Signer};
