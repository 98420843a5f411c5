//! Point time-locked contract (PTLC) atomic swaps over Ed25519 escrows.
//!
//! [`cryptography`] holds the curve, Schnorr and adaptor signature maths. [`ledger`] describes the escrow ledger the
//! swap runs against. [`swap_protocol`] is the two-party protocol itself.

pub mod cryptography;
pub mod error;
pub mod helpers;
pub mod ledger;
pub mod swap_protocol;
