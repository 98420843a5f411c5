//! 2-of-2 adaptor signatures over Ed25519.
//!
//! For a leg with aggregated key $X = X_1 + X_2$, aggregated nonce $R = R_1 + R_2$ and adaptor point $T = t\cdot G$,
//! each party contributes a partial signature $s_i = r_i + c\cdot x_i$ where $c = H(R + T \| X \| m)$. The sum
//! $s' = s_1 + s_2$ is the pre-signature. It satisfies $s'\cdot G = R + c\cdot X$ but is not a valid signature: the
//! signature nonce is $R + T$, so only $s = s' + t$ verifies. Whoever holds $s'$ and later sees $s$ learns
//! $t = s - s'$.

use crate::cryptography::keys::{Curve25519PublicKey, Curve25519Secret};
use crate::cryptography::schnorr::Signature;
use crate::error::ReadError;
use crate::swap_protocol::utils::{read_scalar, write_scalar, Readable, Writable};
use curve25519_dalek::Scalar;
use std::io::{Read, Write};

/// One party's share of a leg signature, `r_i + c·x_i`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PartialSignature(Scalar);

impl PartialSignature {
    /// Create this party's share for a leg. `nonce` must be fresh for every swap attempt.
    pub fn create(nonce: &Curve25519Secret, secret: &Curve25519Secret, challenge: &Scalar) -> Self {
        let s = nonce.as_scalar() + challenge * secret.as_scalar();
        Self(s)
    }

    /// Checks `s_i·G == R_i + c·X_i` for the counterparty's share.
    pub fn verify(&self, nonce: &Curve25519PublicKey, public_key: &Curve25519PublicKey, challenge: &Scalar) -> bool {
        Curve25519PublicKey::from_scalar(&self.0) == nonce + &public_key.scalar_mul(challenge)
    }

    pub fn as_scalar(&self) -> &Scalar {
        &self.0
    }
}

impl From<Scalar> for PartialSignature {
    fn from(value: Scalar) -> Self {
        Self(value)
    }
}

/// The sum of both parties' shares for a leg: a signature still missing the adaptor secret.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PreSignature(Scalar);

impl PreSignature {
    pub fn combine(mine: &PartialSignature, theirs: &PartialSignature) -> Self {
        Self(mine.0 + theirs.0)
    }

    /// Checks `s'·G == R + c·X` where `R` is the aggregate nonce *without* the adaptor point.
    ///
    /// This must pass before anything else is sent to the counterparty.
    pub fn verify(
        &self,
        aggregate_nonce: &Curve25519PublicKey,
        aggregate_key: &Curve25519PublicKey,
        challenge: &Scalar,
    ) -> bool {
        Curve25519PublicKey::from_scalar(&self.0) == aggregate_nonce + &aggregate_key.scalar_mul(challenge)
    }

    /// `s = s' + t`.
    pub fn complete(&self, adaptor_secret: &Curve25519Secret) -> Scalar {
        self.0 + adaptor_secret.as_scalar()
    }

    /// The full Ed25519 signature `(R + T) || (s' + t)`.
    pub fn complete_signature(
        &self,
        adapted_nonce: &Curve25519PublicKey,
        adaptor_secret: &Curve25519Secret,
    ) -> Signature {
        Signature::new(adapted_nonce, &self.complete(adaptor_secret))
    }

    pub fn as_scalar(&self) -> &Scalar {
        &self.0
    }
}

impl From<Scalar> for PreSignature {
    fn from(value: Scalar) -> Self {
        Self(value)
    }
}

/// Recover `t = s - s'` from a completed signature scalar and the matching pre-signature.
pub fn extract_adaptor_secret(completed: &Scalar, pre_signature: &PreSignature) -> Curve25519Secret {
    Curve25519Secret::from(completed - pre_signature.0)
}

impl Writable for PartialSignature {
    fn write<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        write_scalar(writer, &self.0)
    }
}

impl Readable for PartialSignature {
    fn read<R: Read>(reader: &mut R) -> Result<Self, ReadError> {
        read_scalar(reader, "PartialSignature").map(Self)
    }
}

impl Writable for PreSignature {
    fn write<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        write_scalar(writer, &self.0)
    }
}

impl Readable for PreSignature {
    fn read<R: Read>(reader: &mut R) -> Result<Self, ReadError> {
        read_scalar(reader, "PreSignature").map(Self)
    }
}
