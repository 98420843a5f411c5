//! State and ledger plumbing shared by both sides of a swap.

use crate::cryptography::keys::Curve25519PublicKey;
use crate::cryptography::schnorr::Signature;
use crate::ledger::watcher::EscrowWatcher;
use crate::ledger::{
    AccountAddress, Confirmation, EscrowRecord, EscrowReference, EscrowService, EscrowTerms, Ledger, LedgerAction,
    LedgerError, Signer,
};
use crate::swap_protocol::channel::{ChannelError, MessageChannel};
use crate::swap_protocol::config::SwapConfig;
use crate::swap_protocol::error::{AbortRecord, PendingClaim, Severity, SwapError};
use crate::swap_protocol::messages::{Hello, SwapMessage, PROTOCOL_VERSION};
use crate::swap_protocol::stage::{HasRole, SwapRole, SwapStage};
use crate::swap_protocol::swap_keys::{Leg, LegContext, LegPublic, SwapKeys};
use crate::swap_protocol::utils::MAX_FIELD_LEN;
use log::*;
use std::future::Future;

const MAX_ABORT_REASON: usize = 256;

/// Common interface of the initiator and responder state machines.
pub trait SwapParty: HasRole {
    fn stage(&self) -> SwapStage;

    fn has_aborted(&self) -> bool {
        self.stage() == SwapStage::Aborted
    }

    fn abort_record(&self) -> Option<&AbortRecord>;

    /// Drive the swap to `Done` or `Aborted`. A party can only be run once.
    fn run(&mut self) -> impl Future<Output = Result<SwapOutcome, AbortRecord>> + Send;
}

/// The result of a completed swap, from one party's point of view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapOutcome {
    pub role: SwapRole,
    /// The escrow this party funded, which the counterparty claimed or will claim.
    pub local_escrow: EscrowReference,
    /// The escrow this party claimed.
    pub claimed_escrow: EscrowReference,
    pub claim_signature: Signature,
    pub confirmation: Confirmation,
}

/// The public keys of both parties once the key exchange is done.
#[derive(Debug, Clone)]
pub struct PublicSwapKeys {
    pub initiator_address: AccountAddress,
    pub responder_address: AccountAddress,
    pub initiator_leg1: LegPublic,
    pub initiator_leg2: LegPublic,
    pub responder_leg1: LegPublic,
    pub responder_leg2: LegPublic,
    pub adaptor: Curve25519PublicKey,
}

impl PublicSwapKeys {
    /// The aggregated key that locks the escrow claimed on `leg`.
    pub fn lock_key(&self, leg: Leg) -> Curve25519PublicKey {
        match leg {
            Leg::One => Curve25519PublicKey::aggregate([&self.initiator_leg1.signing, &self.responder_leg1.signing]),
            Leg::Two => Curve25519PublicKey::aggregate([&self.initiator_leg2.signing, &self.responder_leg2.signing]),
        }
    }

    /// The signing context for `leg`, claiming `escrow`.
    pub fn leg(&self, leg: Leg, escrow: EscrowReference) -> LegContext {
        match leg {
            Leg::One => LegContext::new(
                leg,
                &self.initiator_leg1,
                &self.responder_leg1,
                &self.adaptor,
                escrow,
                &self.initiator_address,
            ),
            Leg::Two => LegContext::new(
                leg,
                &self.initiator_leg2,
                &self.responder_leg2,
                &self.adaptor,
                escrow,
                &self.responder_address,
            ),
        }
    }
}

/// Submit a claim signature to the ledger. Safe to repeat after a failure: a ledger treats a repeated unlock with
/// the same signature as a no-op.
pub async fn submit_claim<L, S>(ledger: &L, signer: &S, claim: &PendingClaim) -> Result<Confirmation, LedgerError>
where
    L: EscrowService,
    S: Signer,
{
    let action = signer.sign(LedgerAction::Unlock { escrow: claim.escrow, signature: claim.signature })?;
    ledger.unlock(action).await
}

/// Whichever source reports an unlock first.
enum FirstSeen {
    Ledger(Result<(Signature, AccountAddress), LedgerError>),
    Channel(Result<SwapMessage, ChannelError>),
}

pub(crate) fn unexpected(expected: &str, got: &SwapMessage) -> SwapError {
    SwapError::violation(format!("expected {expected}, got {got}"))
}

pub(crate) struct SwapSession<L, S, C> {
    pub(crate) config: SwapConfig,
    pub(crate) ledger: L,
    pub(crate) signer: S,
    pub(crate) keys: SwapKeys,
    pub(crate) address: AccountAddress,
    channel: C,
    watcher: EscrowWatcher,
    stage: SwapStage,
    abort: Option<AbortRecord>,
    pending_claim: Option<PendingClaim>,
}

impl<L, S, C> SwapSession<L, S, C>
where
    L: Ledger,
    S: Signer,
    C: MessageChannel,
{
    pub(crate) fn new(config: SwapConfig, ledger: L, signer: S, channel: C, keys: SwapKeys) -> Result<Self, SwapError> {
        config.validate()?;
        if config.role != keys.role() {
            return Err(SwapError::InvalidConfig(format!(
                "configuration is for the {} but the keys are for the {}",
                config.role,
                keys.role()
            )));
        }
        let watcher = EscrowWatcher::new(config.poll_interval, config.confirmation_timeout);
        let address = signer.address();
        if address.as_bytes().is_empty() || address.as_bytes().len() > MAX_FIELD_LEN {
            return Err(SwapError::InvalidConfig(format!(
                "account address must be between 1 and {MAX_FIELD_LEN} bytes, got {}",
                address.as_bytes().len()
            )));
        }
        Ok(Self {
            config,
            ledger,
            signer,
            keys,
            address,
            channel,
            watcher,
            stage: SwapStage::Init,
            abort: None,
            pending_claim: None,
        })
    }

    pub(crate) fn role(&self) -> SwapRole {
        self.config.role
    }

    pub(crate) fn stage(&self) -> SwapStage {
        self.stage
    }

    pub(crate) fn abort_record(&self) -> Option<&AbortRecord> {
        self.abort.as_ref()
    }

    pub(crate) fn transition(&mut self, next: SwapStage) {
        info!("{}: {} -> {}", self.role(), self.stage, next);
        self.stage = next;
    }

    pub(crate) fn require_stage(&self, expected: SwapStage, action: &'static str) -> Result<(), SwapError> {
        if self.stage == expected {
            Ok(())
        } else {
            Err(SwapError::InvalidStateTransition { state: self.stage.to_string(), action })
        }
    }

    pub(crate) async fn send(&mut self, message: SwapMessage) -> Result<(), SwapError> {
        debug!("{}: sending {message}", self.role());
        self.channel.send(message).await.map_err(SwapError::from)
    }

    pub(crate) async fn receive(&mut self) -> Result<SwapMessage, SwapError> {
        match self.channel.recv_timeout(self.config.recv_timeout).await? {
            SwapMessage::Abort { reason } => Err(SwapError::CounterpartyAborted(reason)),
            message => {
                debug!("{}: received {message}", self.role());
                Ok(message)
            }
        }
    }

    /// The initiator speaks first. Returns the counterparty's address.
    pub(crate) async fn exchange_hello(&mut self) -> Result<AccountAddress, SwapError> {
        let hello = SwapMessage::Hello(Hello { version: PROTOCOL_VERSION, address: self.address.clone() });
        if self.role().is_initiator() {
            self.send(hello).await?;
            self.receive_hello().await
        } else {
            let address = self.receive_hello().await?;
            self.send(hello).await?;
            Ok(address)
        }
    }

    async fn receive_hello(&mut self) -> Result<AccountAddress, SwapError> {
        let hello = match self.receive().await? {
            SwapMessage::Hello(hello) => hello,
            other => return Err(unexpected("Hello", &other)),
        };
        if hello.version != PROTOCOL_VERSION {
            return Err(SwapError::violation(format!(
                "counterparty speaks protocol version {}, we speak {PROTOCOL_VERSION}",
                hello.version
            )));
        }
        if hello.address == self.address {
            return Err(SwapError::violation("counterparty claims to use our own address"));
        }
        Ok(hello.address)
    }

    /// Lock this party's offer in a new escrow under `lock_key` and wait for the ledger to report it active.
    pub(crate) async fn fund_escrow(&mut self, lock_key: Curve25519PublicKey) -> Result<EscrowRecord, SwapError> {
        let now = self.ledger.current_time().await?;
        let terms = EscrowTerms {
            asset: self.config.offer.asset.clone(),
            amount: self.config.offer.amount,
            expiration: now.after(self.config.own_lock_window()),
            lock_key,
        };
        let action = self.signer.sign(LedgerAction::CreateEscrow(terms))?;
        let id = self.ledger.create(action).await?;
        info!("{}: created escrow {id}. Waiting for it to become active", self.role());
        let record = self.watcher.wait_for_active(&self.ledger, &id).await?;
        info!(
            "{}: escrow {id} is active: {} {} until {}",
            self.role(),
            record.terms.amount,
            record.terms.asset,
            record.terms.expiration
        );
        Ok(record)
    }

    /// Wait for the counterparty's escrow to be active and check that it holds what we expect, for the right key.
    /// Expiration checks are left to the caller since they differ per role.
    pub(crate) async fn observe_escrow(
        &mut self,
        id: &EscrowReference,
        owner: &AccountAddress,
        lock_key: &Curve25519PublicKey,
    ) -> Result<EscrowRecord, SwapError> {
        let record = self.watcher.wait_for_active(&self.ledger, id).await?;
        if record.owner != *owner {
            return Err(SwapError::terms(format!("escrow {id} belongs to {}, not {owner}", record.owner)));
        }
        let expect = &self.config.expect;
        if record.terms.asset != expect.asset || record.terms.amount != expect.amount {
            return Err(SwapError::terms(format!(
                "escrow {id} holds {} {}, expected {} {}",
                record.terms.amount, record.terms.asset, expect.amount, expect.asset
            )));
        }
        if record.terms.lock_key != *lock_key {
            return Err(SwapError::terms(format!("escrow {id} is not locked to the aggregated leg key")));
        }
        Ok(record)
    }

    /// Learn the signature that unlocks `id`. The counterparty's `CompletedSignature` is taken if it passes
    /// `is_valid`; anything else from the channel is ignored and the ledger decides. The ledger watch only ends
    /// when the escrow is unlocked or expires.
    pub(crate) async fn learn_unlock<F>(
        &mut self,
        id: &EscrowReference,
        listen: bool,
        is_valid: F,
    ) -> Result<Signature, SwapError>
    where
        F: Fn(&Signature) -> bool,
    {
        let role = self.role();
        let on_ledger = self.watcher.wait_for_unlock(&self.ledger, id);
        tokio::pin!(on_ledger);
        if listen {
            let first = tokio::select! {
                unlocked = &mut on_ledger => FirstSeen::Ledger(unlocked),
                received = self.channel.recv() => FirstSeen::Channel(received),
            };
            match first {
                FirstSeen::Ledger(unlocked) => {
                    let (signature, by) = unlocked?;
                    info!("{role}: escrow {id} was unlocked by {by}");
                    return Ok(signature);
                }
                FirstSeen::Channel(Ok(SwapMessage::CompletedSignature(sig))) if is_valid(&sig) => return Ok(sig),
                FirstSeen::Channel(Ok(SwapMessage::CompletedSignature(_))) => {
                    warn!("{role}: the completed signature from the counterparty does not verify. Watching the ledger")
                }
                FirstSeen::Channel(Ok(SwapMessage::Abort { reason })) => {
                    warn!("{role}: the counterparty aborted ({reason}). Watching the ledger")
                }
                FirstSeen::Channel(Ok(other)) => {
                    warn!("{role}: expected CompletedSignature, got {other}. Watching the ledger")
                }
                FirstSeen::Channel(Err(e)) => {
                    warn!("{role}: no completed signature from the counterparty ({e}). Watching the ledger")
                }
            }
        }
        let (signature, by) = on_ledger.await?;
        info!("{role}: escrow {id} was unlocked by {by}");
        Ok(signature)
    }

    /// Unlock the escrow of `leg` with `signature`. Until the ledger confirms, the claim is recorded as pending so that
    /// an abort hands it to the caller.
    pub(crate) async fn claim(&mut self, leg: &LegContext, signature: Signature) -> Result<Confirmation, SwapError> {
        let claim = PendingClaim { escrow: leg.escrow, signature };
        self.pending_claim = Some(claim);
        info!("{}: claiming escrow {} on {}", self.role(), leg.escrow, leg.leg);
        let confirmation = submit_claim(&self.ledger, &self.signer, &claim).await?;
        self.pending_claim = None;
        info!("{}: claim of escrow {} confirmed at {}", self.role(), leg.escrow, confirmation.confirmed_at);
        Ok(confirmation)
    }

    fn severity(&self, error: &SwapError) -> Severity {
        if self.pending_claim.is_some() {
            return match error {
                SwapError::Ledger(e) if e.is_transient() => Severity::Retryable,
                _ => Severity::Alert,
            };
        }
        let exposed = match self.role() {
            // Nothing the initiator sends before its claim lets the responder complete anything.
            SwapRole::Initiator => self.stage >= SwapStage::CounterpartUnlocked,
            // Once s'1 is out, the initiator can claim at any time.
            SwapRole::Responder => {
                self.stage >= SwapStage::AdaptorPreSigExchanged
                    && !matches!(error, SwapError::Ledger(LedgerError::EscrowExpired(_)))
            }
        };
        if exposed {
            Severity::Alert
        } else {
            Severity::Safe
        }
    }

    /// Report an error without touching the swap, for calls that are not valid in the current stage.
    pub(crate) fn refuse(&self, error: SwapError) -> AbortRecord {
        warn!("{}: refusing request in stage {}: {error}", self.role(), self.stage);
        AbortRecord { role: self.role(), stage: self.stage, error, severity: Severity::Safe, pending_claim: None }
    }

    /// Move to `Aborted`, record why, and tell the counterparty if the channel still works.
    pub(crate) async fn fail(&mut self, error: SwapError) -> AbortRecord {
        let severity = self.severity(&error);
        let record = AbortRecord {
            role: self.role(),
            stage: self.stage,
            error: error.clone(),
            severity,
            pending_claim: self.pending_claim,
        };
        match severity {
            Severity::Safe => warn!("{record}"),
            Severity::Retryable | Severity::Alert => error!("{record}"),
        }
        // A retryable claim is not the end of the swap for the counterparty, which is still waiting for it.
        let notify = severity != Severity::Retryable
            && !matches!(error, SwapError::Channel(ChannelError::Closed) | SwapError::CounterpartyAborted(_));
        if notify {
            let mut reason = error.to_string();
            if reason.len() > MAX_ABORT_REASON {
                let mut end = MAX_ABORT_REASON;
                while !reason.is_char_boundary(end) {
                    end -= 1;
                }
                reason.truncate(end);
            }
            if let Err(e) = self.channel.send(SwapMessage::Abort { reason }).await {
                debug!("{}: could not notify the counterparty of the abort: {e}", self.role());
            }
        }
        self.stage = SwapStage::Aborted;
        self.abort = Some(record.clone());
        record
    }
}
