use crate::cryptography::hashes::challenge;
use crate::cryptography::keys::{Curve25519PublicKey, Curve25519Secret, KeyPair};
use crate::error::ReadError;
use crate::swap_protocol::utils::{read_array, Readable, Writable};
use curve25519_dalek::scalar::clamp_integer;
use curve25519_dalek::{EdwardsPoint, Scalar};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha512};
use std::fmt::{Debug, Formatter};
use std::io::{Read, Write};
use zeroize::Zeroizing;

pub const SIGNATURE_SIZE: usize = 64;

/// Derives a keypair from 32 bytes of randomness the way RFC 8032 derives a signing scalar: hash the seed with
/// SHA-512 and clamp the low half (clear the low 3 bits, clear the top bit, set the second-highest bit).
pub fn keygen(seed: &[u8; 32]) -> KeyPair {
    let digest = Zeroizing::new(<[u8; 64]>::from(Sha512::digest(seed)));
    let mut low = Zeroizing::new([0u8; 32]);
    low.copy_from_slice(&digest[..32]);
    let clamped = Zeroizing::new(clamp_integer(*low));
    let secret = Curve25519Secret::from(Scalar::from_bytes_mod_order(*clamped));
    KeyPair::from_secret(secret)
}

/// A 64-byte Ed25519 signature `R || s`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; SIGNATURE_SIZE]);

impl Signature {
    pub fn new(nonce: &Curve25519PublicKey, s: &Scalar) -> Self {
        let mut bytes = [0u8; SIGNATURE_SIZE];
        bytes[..32].copy_from_slice(nonce.as_bytes());
        bytes[32..].copy_from_slice(s.as_bytes());
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; SIGNATURE_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn to_bytes(&self) -> [u8; SIGNATURE_SIZE] {
        self.0
    }

    pub fn as_bytes(&self) -> &[u8; SIGNATURE_SIZE] {
        &self.0
    }

    pub fn r_bytes(&self) -> [u8; 32] {
        let mut r = [0u8; 32];
        r.copy_from_slice(&self.0[..32]);
        r
    }

    pub fn s_bytes(&self) -> [u8; 32] {
        let mut s = [0u8; 32];
        s.copy_from_slice(&self.0[32..]);
        s
    }

    /// The `s` half, if it is canonical (`s < L`, which implies the top three bits are clear).
    pub fn s(&self) -> Option<Scalar> {
        if self.0[63] & 0xe0 != 0 {
            return None;
        }
        Option::<Scalar>::from(Scalar::from_canonical_bytes(self.s_bytes()))
    }

    pub fn as_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(hex: &str) -> Result<Self, hex::FromHexError> {
        let mut bytes = [0u8; SIGNATURE_SIZE];
        hex::decode_to_slice(hex, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl Debug for Signature {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signature({})", self.as_hex())
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_hex())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Signature::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

impl Writable for Signature {
    fn write<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&self.0)
    }
}

impl Readable for Signature {
    fn read<R: Read>(reader: &mut R) -> Result<Self, ReadError> {
        read_array::<SIGNATURE_SIZE, _>(reader, "Signature").map(Signature)
    }
}

/// Ed25519 verification: `s·B == R + c·A` with `c = challenge(R, A, message)`.
///
/// Rejects signatures whose `s` is not canonical and public keys or nonces that do not decode canonically.
pub fn verify(public_key: &Curve25519PublicKey, message: &[u8], signature: &Signature) -> bool {
    let Some(s) = signature.s() else {
        return false;
    };
    let Ok(nonce) = Curve25519PublicKey::from_bytes(signature.r_bytes()) else {
        return false;
    };
    let c = challenge(&nonce, public_key, message);
    // R' = s·B - c·A. Only public values are involved, so the variable-time routine is fine.
    let expected_r = EdwardsPoint::vartime_double_scalar_mul_basepoint(&(-c), &public_key.as_point(), &s);
    expected_r.compress().as_bytes() == nonce.as_bytes()
}

/// Convenience for the byte-oriented collaborators: decodes the key first.
pub fn verify_bytes(public_key: &[u8; 32], message: &[u8], signature: &Signature) -> bool {
    match Curve25519PublicKey::from_bytes(*public_key) {
        Ok(key) => verify(&key, message, signature),
        Err(_) => false,
    }
}
