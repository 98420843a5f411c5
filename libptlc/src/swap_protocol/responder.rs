use crate::cryptography::adapter_signature::{extract_adaptor_secret, PartialSignature, PreSignature};
use crate::cryptography::keys::KeyPair;
use crate::cryptography::schnorr::Signature;
use crate::ledger::{EscrowRecord, Ledger, Signer};
use crate::swap_protocol::channel::MessageChannel;
use crate::swap_protocol::config::SwapConfig;
use crate::swap_protocol::error::{AbortRecord, SwapError};
use crate::swap_protocol::messages::{ResponderKeys, SwapMessage};
use crate::swap_protocol::session::{unexpected, PublicSwapKeys, SwapOutcome, SwapParty, SwapSession};
use crate::swap_protocol::stage::{HasRole, SwapRole, SwapStage};
use crate::swap_protocol::swap_keys::{proof_context, verify_point, Leg, LegContext, LegPublic, SwapKeys};
use log::*;
use rand::{CryptoRng, RngCore};

/// The responder's side of a swap.
///
/// The responder never holds `t`. It funds only after it has checked the initiator's escrow, hands over the leg 1
/// pre-signature `s'1`, and then learns `t` from the initiator's claim.
///
/// Flow:
/// 1. `Hello` and key exchange: `Init -> KeysExchanged`
/// 2. Check the initiator escrow under `X2`: `-> RemoteEscrowObserved`
/// 3. Fund the responder escrow under `X1`: `-> LocalEscrowFunded`
/// 4. Verify the initiator's partial signatures: `-> ChallengesExchanged`
/// 5. Send `s'1`: `-> AdaptorPreSigExchanged`
/// 6. Learn `s1` from the channel or the ledger: `-> CounterpartUnlocked`
/// 7. Extract `t` and complete `s2`: `-> LocalCompleted`
/// 8. Claim the initiator escrow: `-> Done`
pub struct ResponderSwap<L, S, C> {
    session: SwapSession<L, S, C>,
    announcement: ResponderKeys,
}

/// Both pre-signatures the responder holds after step 5.
struct PreSignatures {
    leg1: PreSignature,
    leg2: PreSignature,
}

impl<L, S, C> ResponderSwap<L, S, C>
where
    L: Ledger,
    S: Signer,
    C: MessageChannel,
{
    /// Set up a new swap attempt with fresh keys drawn from `rng`.
    pub fn new<R: RngCore + CryptoRng>(
        config: SwapConfig,
        ledger: L,
        signer: S,
        channel: C,
        rng: &mut R,
    ) -> Result<Self, SwapError> {
        if config.role != SwapRole::Responder {
            return Err(SwapError::InvalidConfig("ResponderSwap needs a responder configuration".into()));
        }
        let keys = SwapKeys::generate(SwapRole::Responder, rng);
        let announcement = keys.responder_keys(rng, &signer.address());
        let session = SwapSession::new(config, ledger, signer, channel, keys)?;
        Ok(Self { session, announcement })
    }

    async fn execute(&mut self) -> Result<SwapOutcome, SwapError> {
        let keys = self.exchange_keys().await?;
        let remote = self.observe_initiator_escrow(&keys).await?;
        let own = self.fund_escrow(&keys, &remote).await?;
        let leg1 = keys.leg(Leg::One, own.id);
        let leg2 = keys.leg(Leg::Two, remote.id);
        let shares = self.receive_partial_signatures(&keys, &leg1, &leg2).await?;
        let pre_signatures = self.send_pre_signature(&leg1, &leg2, shares).await?;
        let s1 = self.learn_claim_signature(&leg1).await?;
        let s2 = self.complete_leg2(&keys, &leg2, &s1, &pre_signatures)?;
        let confirmation = self.session.claim(&leg2, s2).await?;
        self.session.transition(SwapStage::Done);
        Ok(SwapOutcome {
            role: SwapRole::Responder,
            local_escrow: own.id,
            claimed_escrow: remote.id,
            claim_signature: s2,
            confirmation,
        })
    }

    /// `Init -> KeysExchanged`
    async fn exchange_keys(&mut self) -> Result<PublicSwapKeys, SwapError> {
        let initiator_address = self.session.exchange_hello().await?;
        let theirs = match self.session.receive().await? {
            SwapMessage::InitiatorKeys(keys) => keys,
            other => return Err(unexpected("InitiatorKeys", &other)),
        };
        let initiator_leg1 = LegPublic::verify(&theirs.leg1, SwapRole::Initiator, Leg::One, &initiator_address)?;
        let initiator_leg2 = LegPublic::verify(&theirs.leg2, SwapRole::Initiator, Leg::Two, &initiator_address)?;
        let adaptor = verify_point(
            &theirs.adaptor,
            &proof_context(SwapRole::Initiator, "adaptor", &initiator_address),
            "initiator adaptor point",
        )?;
        self.session.send(SwapMessage::ResponderKeys(self.announcement.clone())).await?;
        let own = &self.session.keys;
        let keys = PublicSwapKeys {
            initiator_address,
            responder_address: self.session.address.clone(),
            initiator_leg1,
            initiator_leg2,
            responder_leg1: own.leg(Leg::One).public(),
            responder_leg2: own.leg(Leg::Two).public(),
            adaptor,
        };
        self.session.transition(SwapStage::KeysExchanged);
        Ok(keys)
    }

    /// The initiator's escrow must be locked to `X2` and still be open long enough for us to fund, wait out our own
    /// window, and claim with room to spare.
    /// `KeysExchanged -> RemoteEscrowObserved`
    async fn observe_initiator_escrow(&mut self, keys: &PublicSwapKeys) -> Result<EscrowRecord, SwapError> {
        let id = match self.session.receive().await? {
            SwapMessage::EscrowCreated(id) => id,
            other => return Err(unexpected("EscrowCreated", &other)),
        };
        let record = self.session.observe_escrow(&id, &keys.initiator_address, &keys.lock_key(Leg::Two)).await?;
        let now = self.session.ledger.current_time().await?;
        let config = &self.session.config;
        let required = now.after(config.responder_lock_window).after(config.safety_margin);
        if record.terms.expiration < required {
            return Err(SwapError::terms(format!(
                "initiator escrow {id} expires at {}, but must stay open until at least {required}",
                record.terms.expiration
            )));
        }
        self.session.transition(SwapStage::RemoteEscrowObserved);
        Ok(record)
    }

    /// Lock our offer under `X1`, which the initiator can only complete by revealing `t`.
    /// `RemoteEscrowObserved -> LocalEscrowFunded`
    async fn fund_escrow(&mut self, keys: &PublicSwapKeys, remote: &EscrowRecord) -> Result<EscrowRecord, SwapError> {
        let record = self.session.fund_escrow(keys.lock_key(Leg::One)).await?;
        // Ledger time moved while we waited for our escrow to activate.
        let margin = remote.terms.expiration.since(record.terms.expiration);
        if margin.map_or(true, |m| m < self.session.config.safety_margin) {
            return Err(SwapError::terms(format!(
                "our escrow {} expires at {}, too close to the initiator escrow expiring at {}",
                record.id, record.terms.expiration, remote.terms.expiration
            )));
        }
        self.session.send(SwapMessage::EscrowCreated(record.id)).await?;
        self.session.transition(SwapStage::LocalEscrowFunded);
        Ok(record)
    }

    /// `LocalEscrowFunded -> ChallengesExchanged`
    async fn receive_partial_signatures(
        &mut self,
        keys: &PublicSwapKeys,
        leg1: &LegContext,
        leg2: &LegContext,
    ) -> Result<(PartialSignature, PartialSignature), SwapError> {
        let (share1, share2) = match self.session.receive().await? {
            SwapMessage::PartialSignatures { leg1, leg2 } => (leg1, leg2),
            other => return Err(unexpected("PartialSignatures", &other)),
        };
        if !leg1.share_is_valid(&share1, &keys.initiator_leg1) {
            return Err(SwapError::verification("initiator partial signature for leg1 does not verify"));
        }
        if !leg2.share_is_valid(&share2, &keys.initiator_leg2) {
            return Err(SwapError::verification("initiator partial signature for leg2 does not verify"));
        }
        self.session.transition(SwapStage::ChallengesExchanged);
        Ok((share1, share2))
    }

    /// Combine both shares on both legs and hand `s'1` to the initiator. `s'2` stays with us until we learn `t`.
    /// `ChallengesExchanged -> AdaptorPreSigExchanged`
    async fn send_pre_signature(
        &mut self,
        leg1: &LegContext,
        leg2: &LegContext,
        theirs: (PartialSignature, PartialSignature),
    ) -> Result<PreSignatures, SwapError> {
        let keys = &self.session.keys;
        let mine1 = leg1.partial_signature(keys.leg(Leg::One));
        let mine2 = leg2.partial_signature(keys.leg(Leg::Two));
        let pre_signatures =
            PreSignatures { leg1: PreSignature::combine(&mine1, &theirs.0), leg2: PreSignature::combine(&mine2, &theirs.1) };
        if !leg1.pre_signature_is_valid(&pre_signatures.leg1) || !leg2.pre_signature_is_valid(&pre_signatures.leg2) {
            return Err(SwapError::verification("combined pre-signatures do not verify"));
        }
        self.session.send(SwapMessage::PreSignature(pre_signatures.leg1)).await?;
        self.session.transition(SwapStage::AdaptorPreSigExchanged);
        Ok(pre_signatures)
    }

    /// Get the initiator's leg 1 signature. It is authoritative once it is on the ledger, so the channel is only a
    /// shortcut: if the initiator goes quiet, aborts, or sends garbage, we keep watching our own escrow until it is
    /// unlocked or expires. A claim that lands late, for instance after the initiator retried a failed submission,
    /// is still picked up.
    /// `AdaptorPreSigExchanged -> CounterpartUnlocked`
    async fn learn_claim_signature(&mut self, leg1: &LegContext) -> Result<Signature, SwapError> {
        let listen = !self.session.config.observe_on_ledger;
        let signature = self.session.learn_unlock(&leg1.escrow, listen, |sig| leg1.signature_is_valid(sig)).await?;
        if !leg1.signature_is_valid(&signature) {
            return Err(SwapError::verification(format!(
                "escrow {} was unlocked with a signature that is not the leg1 signature",
                leg1.escrow
            )));
        }
        self.session.transition(SwapStage::CounterpartUnlocked);
        Ok(signature)
    }

    /// `t = s1 - s'1`, then `s2 = s'2 + t`.
    /// `CounterpartUnlocked -> LocalCompleted`
    fn complete_leg2(
        &mut self,
        keys: &PublicSwapKeys,
        leg2: &LegContext,
        s1: &Signature,
        pre_signatures: &PreSignatures,
    ) -> Result<Signature, SwapError> {
        let s = s1.s().ok_or_else(|| SwapError::verification("leg1 signature scalar is not canonical"))?;
        let adaptor = KeyPair::from_secret(extract_adaptor_secret(&s, &pre_signatures.leg1));
        if adaptor.public() != &keys.adaptor {
            return Err(SwapError::verification("extracted adaptor secret does not match T"));
        }
        info!("Responder: recovered the adaptor secret from the leg1 claim. Completing leg2");
        let signature = pre_signatures.leg2.complete_signature(&leg2.adapted_nonce, adaptor.secret());
        if !leg2.signature_is_valid(&signature) {
            return Err(SwapError::verification("completed leg2 signature does not verify"));
        }
        self.session.transition(SwapStage::LocalCompleted);
        Ok(signature)
    }
}

impl<L, S, C> HasRole for ResponderSwap<L, S, C> {
    fn role(&self) -> SwapRole {
        SwapRole::Responder
    }
}

impl<L, S, C> SwapParty for ResponderSwap<L, S, C>
where
    L: Ledger,
    S: Signer,
    C: MessageChannel,
{
    fn stage(&self) -> SwapStage {
        self.session.stage()
    }

    fn abort_record(&self) -> Option<&AbortRecord> {
        self.session.abort_record()
    }

    async fn run(&mut self) -> Result<SwapOutcome, AbortRecord> {
        if let Err(e) = self.session.require_stage(SwapStage::Init, "run") {
            return Err(self.session.refuse(e));
        }
        match self.execute().await {
            Ok(outcome) => Ok(outcome),
            Err(e) => Err(self.session.fail(e).await),
        }
    }
}
