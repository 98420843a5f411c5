//! Hash-to-scalar and message hashing.
//!
//! The challenge hash is the RFC 8032 one, `SHA-512(R || A || M)` reduced mod L, so that signatures completed by the
//! swap verify under any standard Ed25519 verifier. The byte order is part of the wire contract.

use crate::cryptography::keys::{reduce_wide, Curve25519PublicKey};
use curve25519_dalek::Scalar;
use sha2::{Digest, Sha512};
use sha3::Sha3_256;

/// The Schnorr challenge `reduce(SHA-512(nonce || key || message))`.
pub fn challenge(nonce: &Curve25519PublicKey, key: &Curve25519PublicKey, message: &[u8]) -> Scalar {
    let mut hasher = Sha512::new();
    hasher.update(nonce.as_bytes());
    hasher.update(key.as_bytes());
    hasher.update(message);
    let digest: [u8; 64] = hasher.finalize().into();
    reduce_wide(&digest)
}

/// The 32-byte message a leg's claim signature signs: `SHA3-256(escrow_id || claimant_address)`.
///
/// Binding the escrow id and the claimant stops a signature from being replayed against another escrow or by another
/// account.
pub fn leg_message(escrow_id: &[u8], claimant_address: &[u8]) -> [u8; 32] {
    let mut hasher = Sha3_256::new();
    hasher.update(escrow_id);
    hasher.update(claimant_address);
    hasher.finalize().into()
}

/// Domain-separated challenge for proofs of knowledge. The tag keeps these from ever colliding with a ledger
/// signature challenge.
pub(crate) fn pok_challenge(nonce: &Curve25519PublicKey, key: &Curve25519PublicKey, context: &[u8]) -> Scalar {
    let mut hasher = Sha512::new();
    hasher.update(b"PTLC-SchnorrPoK");
    hasher.update(nonce.as_bytes());
    hasher.update(key.as_bytes());
    hasher.update((context.len() as u64).to_le_bytes());
    hasher.update(context);
    let digest: [u8; 64] = hasher.finalize().into();
    reduce_wide(&digest)
}
