//! Cryptographic primitives
//!
//! Ed25519 scalar and point algebra, Schnorr challenge derivation and verification, proofs of knowledge and the
//! 2-of-2 adaptor signature maths the swap protocol is built on. Nothing in here knows about escrows or ledgers.

pub mod adapter_signature;
pub mod hashes;
pub mod keys;
pub mod pok;
pub mod schnorr;
