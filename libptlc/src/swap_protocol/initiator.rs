use crate::cryptography::adapter_signature::PreSignature;
use crate::cryptography::keys::Curve25519PublicKey;
use crate::ledger::{EscrowRecord, Ledger, Signer};
use crate::swap_protocol::channel::MessageChannel;
use crate::swap_protocol::config::SwapConfig;
use crate::swap_protocol::error::{AbortRecord, SwapError};
use crate::swap_protocol::messages::{InitiatorKeys, SwapMessage};
use crate::swap_protocol::session::{unexpected, PublicSwapKeys, SwapOutcome, SwapParty, SwapSession};
use crate::swap_protocol::stage::{HasRole, SwapRole, SwapStage};
use crate::swap_protocol::swap_keys::{Leg, LegContext, LegPublic, SwapKeys};
use log::*;
use rand::{CryptoRng, RngCore};

/// The initiator's side of a swap.
///
/// The initiator holds the adaptor secret `t`. It funds first, with the longer lock window, and claims first. Its
/// claim of the responder's escrow publishes `s1 = s'1 + t`, from which the responder learns `t`.
///
/// Flow:
/// 1. `Hello` and key exchange: `Init -> KeysExchanged`
/// 2. Fund the initiator escrow under `X2`: `-> LocalEscrowFunded`
/// 3. Check the responder escrow under `X1`: `-> RemoteEscrowObserved`
/// 4. Send partial signatures for both legs: `-> ChallengesExchanged`
/// 5. Receive and verify `s'1`: `-> AdaptorPreSigExchanged`
/// 6. Complete `s1` and claim the responder escrow: `-> CounterpartUnlocked`
/// 7. Send `s1` to the responder: `-> LocalCompleted -> Done`
pub struct InitiatorSwap<L, S, C> {
    session: SwapSession<L, S, C>,
    announcement: InitiatorKeys,
}

impl<L, S, C> InitiatorSwap<L, S, C>
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
        if config.role != SwapRole::Initiator {
            return Err(SwapError::InvalidConfig("InitiatorSwap needs an initiator configuration".into()));
        }
        let keys = SwapKeys::generate(SwapRole::Initiator, rng);
        let announcement = keys.initiator_keys(rng, &signer.address())?;
        let session = SwapSession::new(config, ledger, signer, channel, keys)?;
        Ok(Self { session, announcement })
    }

    /// `T`, the public image of the adaptor secret.
    pub fn adaptor_point(&self) -> &Curve25519PublicKey {
        &self.announcement.adaptor.point
    }

    async fn execute(&mut self) -> Result<SwapOutcome, SwapError> {
        let keys = self.exchange_keys().await?;
        let own = self.fund_escrow(&keys).await?;
        let remote = self.observe_responder_escrow(&keys, &own).await?;
        let leg1 = keys.leg(Leg::One, remote.id);
        let leg2 = keys.leg(Leg::Two, own.id);
        self.send_partial_signatures(&leg1, &leg2).await?;
        let pre_signature = self.receive_pre_signature(&leg1).await?;
        self.claim(own, leg1, pre_signature).await
    }

    /// `Init -> KeysExchanged`
    async fn exchange_keys(&mut self) -> Result<PublicSwapKeys, SwapError> {
        let responder_address = self.session.exchange_hello().await?;
        self.session.send(SwapMessage::InitiatorKeys(self.announcement.clone())).await?;
        let theirs = match self.session.receive().await? {
            SwapMessage::ResponderKeys(keys) => keys,
            other => return Err(unexpected("ResponderKeys", &other)),
        };
        let responder_leg1 = LegPublic::verify(&theirs.leg1, SwapRole::Responder, Leg::One, &responder_address)?;
        let responder_leg2 = LegPublic::verify(&theirs.leg2, SwapRole::Responder, Leg::Two, &responder_address)?;
        let own = &self.session.keys;
        let adaptor = own
            .adaptor()
            .ok_or_else(|| SwapError::InvalidConfig("initiator keys have no adaptor secret".into()))?
            .public()
            .clone();
        let keys = PublicSwapKeys {
            initiator_address: self.session.address.clone(),
            responder_address,
            initiator_leg1: own.leg(Leg::One).public(),
            initiator_leg2: own.leg(Leg::Two).public(),
            responder_leg1,
            responder_leg2,
            adaptor,
        };
        self.session.transition(SwapStage::KeysExchanged);
        Ok(keys)
    }

    /// Lock our offer under `X2`, which only the responder can complete a signature for once it learns `t`.
    /// `KeysExchanged -> LocalEscrowFunded`
    async fn fund_escrow(&mut self, keys: &PublicSwapKeys) -> Result<EscrowRecord, SwapError> {
        let record = self.session.fund_escrow(keys.lock_key(Leg::Two)).await?;
        self.session.send(SwapMessage::EscrowCreated(record.id)).await?;
        self.session.transition(SwapStage::LocalEscrowFunded);
        Ok(record)
    }

    /// The responder's escrow must hold what we expect, be locked to `X1`, and expire at least `safety_margin` before
    /// ours. Otherwise the responder could let its escrow expire, refund it, and still claim ours with `t`.
    /// `LocalEscrowFunded -> RemoteEscrowObserved`
    async fn observe_responder_escrow(
        &mut self,
        keys: &PublicSwapKeys,
        own: &EscrowRecord,
    ) -> Result<EscrowRecord, SwapError> {
        let id = match self.session.receive().await? {
            SwapMessage::EscrowCreated(id) => id,
            other => return Err(unexpected("EscrowCreated", &other)),
        };
        let record = self.session.observe_escrow(&id, &keys.responder_address, &keys.lock_key(Leg::One)).await?;
        let margin = own.terms.expiration.since(record.terms.expiration);
        if margin.map_or(true, |m| m < self.session.config.safety_margin) {
            return Err(SwapError::terms(format!(
                "responder escrow expires at {}, less than the safety margin before ours at {}",
                record.terms.expiration, own.terms.expiration
            )));
        }
        let now = self.session.ledger.current_time().await?;
        if record.terms.expiration <= now {
            return Err(SwapError::terms(format!("responder escrow {id} has already expired")));
        }
        self.session.transition(SwapStage::RemoteEscrowObserved);
        Ok(record)
    }

    /// `RemoteEscrowObserved -> ChallengesExchanged`
    async fn send_partial_signatures(&mut self, leg1: &LegContext, leg2: &LegContext) -> Result<(), SwapError> {
        let keys = &self.session.keys;
        let message = SwapMessage::PartialSignatures {
            leg1: leg1.partial_signature(keys.leg(Leg::One)),
            leg2: leg2.partial_signature(keys.leg(Leg::Two)),
        };
        self.session.send(message).await?;
        self.session.transition(SwapStage::ChallengesExchanged);
        Ok(())
    }

    /// `s'1` must satisfy `s'1·G = Ra1 + Rb1 + c1·X1` before we do anything with it. A bad pre-signature aborts
    /// with nothing revealed.
    /// `ChallengesExchanged -> AdaptorPreSigExchanged`
    async fn receive_pre_signature(&mut self, leg1: &LegContext) -> Result<PreSignature, SwapError> {
        let pre_signature = match self.session.receive().await? {
            SwapMessage::PreSignature(pre) => pre,
            other => return Err(unexpected("PreSignature", &other)),
        };
        if !leg1.pre_signature_is_valid(&pre_signature) {
            return Err(SwapError::verification("responder pre-signature for leg1 does not verify"));
        }
        self.session.transition(SwapStage::AdaptorPreSigExchanged);
        Ok(pre_signature)
    }

    /// Complete and publish `s1`. This is the step that reveals `t`.
    /// `AdaptorPreSigExchanged -> CounterpartUnlocked -> LocalCompleted -> Done`
    async fn claim(
        &mut self,
        own: EscrowRecord,
        leg1: LegContext,
        pre_signature: PreSignature,
    ) -> Result<SwapOutcome, SwapError> {
        let adaptor = self
            .session
            .keys
            .adaptor()
            .ok_or_else(|| SwapError::InvalidConfig("initiator keys have no adaptor secret".into()))?;
        let signature = pre_signature.complete_signature(&leg1.adapted_nonce, adaptor.secret());
        if !leg1.signature_is_valid(&signature) {
            return Err(SwapError::verification("completed leg1 signature does not verify"));
        }
        let confirmation = self.session.claim(&leg1, signature).await?;
        self.session.transition(SwapStage::CounterpartUnlocked);
        // The signature is on the ledger now, so the responder can finish even if this message never arrives.
        if let Err(e) = self.session.send(SwapMessage::CompletedSignature(signature)).await {
            warn!("Initiator: could not send the completed signature to the responder: {e}");
        }
        self.session.transition(SwapStage::LocalCompleted);
        self.session.transition(SwapStage::Done);
        Ok(SwapOutcome {
            role: SwapRole::Initiator,
            local_escrow: own.id,
            claimed_escrow: leg1.escrow,
            claim_signature: signature,
            confirmation,
        })
    }
}

impl<L, S, C> HasRole for InitiatorSwap<L, S, C> {
    fn role(&self) -> SwapRole {
        SwapRole::Initiator
    }
}

impl<L, S, C> SwapParty for InitiatorSwap<L, S, C>
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

