//! Per-swap key material and the per-leg signing context derived from it.
//!
//! Leg 1 releases the responder's escrow to the initiator; leg 2 releases the initiator's escrow to the responder.
//! For each leg both parties hold a signing key and a nonce, and the leg's lock key and nonce are the sums of the
//! two parties' points. Both legs sign with the adaptor point `T` folded into the nonce.

use crate::cryptography::adapter_signature::{PartialSignature, PreSignature};
use crate::cryptography::hashes::{challenge, leg_message};
use crate::cryptography::keys::{Curve25519PublicKey, KeyPair};
use crate::cryptography::pok::SchnorrPoK;
use crate::cryptography::schnorr::{verify, Signature};
use crate::ledger::{AccountAddress, EscrowReference};
use crate::swap_protocol::error::SwapError;
use crate::swap_protocol::messages::{InitiatorKeys, LegKeys, ProvenPoint, ResponderKeys};
use crate::swap_protocol::stage::SwapRole;
use curve25519_dalek::Scalar;
use rand::{CryptoRng, RngCore};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Leg {
    /// The initiator claims the responder's escrow.
    One,
    /// The responder claims the initiator's escrow.
    Two,
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Leg::One => write!(f, "leg1"),
            Leg::Two => write!(f, "leg2"),
        }
    }
}

/// The context a proof of knowledge is bound to: who proves, for which point, and from which account.
pub fn proof_context(role: SwapRole, label: &str, address: &AccountAddress) -> Vec<u8> {
    let mut context = format!("ptlc/{role}/{label}/").into_bytes();
    context.extend_from_slice(address.as_bytes());
    context
}

fn prove<R: RngCore + CryptoRng>(rng: &mut R, keypair: &KeyPair, context: &[u8]) -> ProvenPoint {
    ProvenPoint { point: keypair.public().clone(), proof: SchnorrPoK::prove(rng, keypair.secret(), context) }
}

/// Accept a counterparty point only if it is not of small order and its proof of knowledge verifies.
pub fn verify_point(point: &ProvenPoint, context: &[u8], what: &str) -> Result<Curve25519PublicKey, SwapError> {
    if point.point.is_small_order() {
        return Err(SwapError::verification(format!("{what} is a small-order point")));
    }
    if !point.proof.verify(&point.point, context) {
        return Err(SwapError::verification(format!("proof of knowledge for {what} is invalid")));
    }
    Ok(point.point.clone())
}

/// One party's public points for one leg.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegPublic {
    pub signing: Curve25519PublicKey,
    pub nonce: Curve25519PublicKey,
}

impl LegPublic {
    /// Verify a counterparty's leg keys.
    pub fn verify(keys: &LegKeys, role: SwapRole, leg: Leg, address: &AccountAddress) -> Result<Self, SwapError> {
        let signing = verify_point(
            &keys.signing,
            &proof_context(role, &format!("{leg}/signing"), address),
            &format!("{role} {leg} signing key"),
        )?;
        let nonce = verify_point(
            &keys.nonce,
            &proof_context(role, &format!("{leg}/nonce"), address),
            &format!("{role} {leg} nonce"),
        )?;
        Ok(Self { signing, nonce })
    }
}

/// One party's secrets for one leg.
#[derive(Debug, Clone)]
pub struct LegSecrets {
    signing: KeyPair,
    nonce: KeyPair,
}

impl LegSecrets {
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self { signing: KeyPair::random(rng), nonce: KeyPair::random(rng) }
    }

    pub fn public(&self) -> LegPublic {
        LegPublic { signing: self.signing.public().clone(), nonce: self.nonce.public().clone() }
    }

    fn proven<R: RngCore + CryptoRng>(&self, rng: &mut R, role: SwapRole, leg: Leg, address: &AccountAddress) -> LegKeys {
        LegKeys {
            signing: prove(rng, &self.signing, &proof_context(role, &format!("{leg}/signing"), address)),
            nonce: prove(rng, &self.nonce, &proof_context(role, &format!("{leg}/nonce"), address)),
        }
    }
}

/// All the ephemeral secrets one party uses in a single swap attempt. Never reuse across attempts.
#[derive(Debug, Clone)]
pub struct SwapKeys {
    role: SwapRole,
    leg1: LegSecrets,
    leg2: LegSecrets,
    adaptor: Option<KeyPair>,
}

impl SwapKeys {
    /// Fresh keys for `role`. Only the initiator gets an adaptor secret.
    pub fn generate<R: RngCore + CryptoRng>(role: SwapRole, rng: &mut R) -> Self {
        let leg1 = LegSecrets::random(rng);
        let leg2 = LegSecrets::random(rng);
        let adaptor = role.is_initiator().then(|| KeyPair::random(rng));
        Self { role, leg1, leg2, adaptor }
    }

    pub fn role(&self) -> SwapRole {
        self.role
    }

    pub fn leg(&self, leg: Leg) -> &LegSecrets {
        match leg {
            Leg::One => &self.leg1,
            Leg::Two => &self.leg2,
        }
    }

    pub fn adaptor(&self) -> Option<&KeyPair> {
        self.adaptor.as_ref()
    }

    /// The initiator's key announcement, with proofs bound to `address`.
    pub fn initiator_keys<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        address: &AccountAddress,
    ) -> Result<InitiatorKeys, SwapError> {
        let adaptor = self
            .adaptor
            .as_ref()
            .ok_or_else(|| SwapError::InvalidConfig("only the initiator holds an adaptor secret".into()))?;
        Ok(InitiatorKeys {
            leg1: self.leg1.proven(rng, self.role, Leg::One, address),
            leg2: self.leg2.proven(rng, self.role, Leg::Two, address),
            adaptor: prove(rng, adaptor, &proof_context(self.role, "adaptor", address)),
        })
    }

    pub fn responder_keys<R: RngCore + CryptoRng>(&self, rng: &mut R, address: &AccountAddress) -> ResponderKeys {
        ResponderKeys {
            leg1: self.leg1.proven(rng, self.role, Leg::One, address),
            leg2: self.leg2.proven(rng, self.role, Leg::Two, address),
        }
    }
}

/// Everything both parties agree on for one leg once keys and escrow ids are known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegContext {
    pub leg: Leg,
    /// `X = X_i + X_r`, the escrow's lock key.
    pub key: Curve25519PublicKey,
    /// `R = R_i + R_r`.
    pub nonce: Curve25519PublicKey,
    /// `R + T`, the nonce of the final signature.
    pub adapted_nonce: Curve25519PublicKey,
    pub escrow: EscrowReference,
    pub message: [u8; 32],
    pub challenge: Scalar,
}

impl LegContext {
    pub fn new(
        leg: Leg,
        initiator: &LegPublic,
        responder: &LegPublic,
        adaptor: &Curve25519PublicKey,
        escrow: EscrowReference,
        claimant: &AccountAddress,
    ) -> Self {
        let key = Curve25519PublicKey::aggregate([&initiator.signing, &responder.signing]);
        let nonce = Curve25519PublicKey::aggregate([&initiator.nonce, &responder.nonce]);
        let adapted_nonce = &nonce + adaptor;
        let message = leg_message(escrow.as_bytes(), claimant.as_bytes());
        let challenge = challenge(&adapted_nonce, &key, &message);
        Self { leg, key, nonce, adapted_nonce, escrow, message, challenge }
    }

    /// This party's share of the leg signature.
    pub fn partial_signature(&self, secrets: &LegSecrets) -> PartialSignature {
        PartialSignature::create(secrets.nonce.secret(), secrets.signing.secret(), &self.challenge)
    }

    pub fn share_is_valid(&self, share: &PartialSignature, signer: &LegPublic) -> bool {
        share.verify(&signer.nonce, &signer.signing, &self.challenge)
    }

    pub fn pre_signature_is_valid(&self, pre_signature: &PreSignature) -> bool {
        pre_signature.verify(&self.nonce, &self.key, &self.challenge)
    }

    /// A signature is the one this leg expects if it verifies under the lock key and uses the adapted nonce.
    pub fn signature_is_valid(&self, signature: &Signature) -> bool {
        signature.r_bytes() == *self.adapted_nonce.as_bytes() && verify(&self.key, &self.message, signature)
    }
}
