use crate::cryptography::hashes::pok_challenge;
use crate::cryptography::keys::{Curve25519PublicKey, Curve25519Secret, PublicKey};
use crate::error::ReadError;
use crate::swap_protocol::utils::{read_scalar, write_scalar, Readable, Writable};
use curve25519_dalek::Scalar;
use log::*;
use rand::{CryptoRng, RngCore};
use std::io::{Read, Write};

/// A Schnorr proof of knowledge of the discrete log of a public point.
///
/// Every point a party contributes to an aggregate carries one of these, so the counterparty cannot pick its key as
/// a function of ours and end up knowing the whole aggregate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchnorrPoK {
    pub_nonce: Curve25519PublicKey,
    s: Scalar,
}

impl SchnorrPoK {
    /// Prove knowledge of `secret`, bound to `context`.
    pub fn prove<R: RngCore + CryptoRng>(rng: &mut R, secret: &Curve25519Secret, context: &[u8]) -> Self {
        let (nonce, pub_nonce) = Curve25519PublicKey::keypair(rng);
        let pub_key = Curve25519PublicKey::from_secret(secret);
        let e = pok_challenge(&pub_nonce, &pub_key, context);
        let s = &nonce + &(secret * &e);
        Self { pub_nonce, s: *s.as_scalar() }
    }

    pub fn verify(&self, public_key: &Curve25519PublicKey, context: &[u8]) -> bool {
        let e = pok_challenge(&self.pub_nonce, public_key, context);
        let lhs = Curve25519PublicKey::from_scalar(&self.s);
        let rhs = &self.pub_nonce + &public_key.scalar_mul(&e);
        let valid = lhs == rhs;
        if !valid {
            warn!("Proof of knowledge failed for {}", public_key.as_hex());
        }
        valid
    }
}

impl Writable for SchnorrPoK {
    fn write<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        self.pub_nonce.write(writer)?;
        write_scalar(writer, &self.s)
    }
}

impl Readable for SchnorrPoK {
    fn read<R: Read>(reader: &mut R) -> Result<Self, ReadError> {
        let pub_nonce = Curve25519PublicKey::read(reader)
            .map_err(|e| ReadError::new("SchnorrPoK.pub_nonce", e.to_string()))?;
        if pub_nonce.is_small_order() {
            return Err(ReadError::new("SchnorrPoK.pub_nonce", "public nonce cannot be a small-order point"));
        }
        let s = read_scalar(reader, "SchnorrPoK.s")?;
        Ok(Self { pub_nonce, s })
    }
}
