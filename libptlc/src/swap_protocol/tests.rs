//! End-to-end swaps between an initiator and a responder over an in-memory channel and ledger.
//!
//! These tests cover:
//! - The happy path, with the responder learning `s1` from the channel or from the ledger
//! - Tampered pre-signatures, partial signatures and completed signatures
//! - Escrow terms and expiration checks before the responder funds
//! - Escrows locked to the wrong key, expired, or too close to the counterparty's expiration
//! - Hello version and address checks
//! - Failed claim submission and a late retry, which the responder still follows
//! - Liveness timeouts, stage enforcement and oversized addresses

use crate::cryptography::adapter_signature::{PartialSignature, PreSignature};
use crate::cryptography::hashes::leg_message;
use crate::cryptography::schnorr::{verify, Signature};
use crate::helpers::Timestamp;
use crate::cryptography::keys::{Curve25519PublicKey, PublicKey};
use crate::ledger::dummy_impl::{AccountSigner, InMemoryLedger, SeedKeyStore};
use crate::ledger::{
    AccountAddress, AssetId, EscrowRecord, EscrowReference, EscrowService, EscrowStatus, EscrowTerms, LedgerAction,
    LedgerError, LedgerTimeSource, SignedAction, Signer,
};
use crate::swap_protocol::messages::Hello;
use crate::swap_protocol::utils::MAX_FIELD_LEN;
use crate::swap_protocol::{
    submit_claim, AbortRecord, ChannelError, EscrowOffer, InMemoryChannel, InitiatorSwap, MessageChannel,
    ResponderSwap, Severity, SwapConfig, SwapError, SwapMessage, SwapOutcome, SwapParty, SwapRole, SwapStage,
    PROTOCOL_VERSION,
};
use curve25519_dalek::Scalar;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;
use tokio::task::JoinHandle;

const ALICE_SEED: [u8; 32] = [0xa1; 32];
const BOB_SEED: [u8; 32] = [0xb0; 32];
const ZNN_AMOUNT: u64 = 1_000;
const QSR_AMOUNT: u64 = 5_000;

fn znn() -> AssetId {
    AssetId::from("ZNN")
}

fn qsr() -> AssetId {
    AssetId::from("QSR")
}

fn alice() -> AccountSigner {
    SeedKeyStore::new(ALICE_SEED).signer(0).unwrap()
}

fn bob() -> AccountSigner {
    SeedKeyStore::new(BOB_SEED).signer(0).unwrap()
}

fn funded_ledger() -> InMemoryLedger {
    let ledger = InMemoryLedger::new(Timestamp::new(1_700_000_000));
    ledger.fund(&alice().address(), &znn(), ZNN_AMOUNT);
    ledger.fund(&bob().address(), &qsr(), QSR_AMOUNT);
    ledger
}

fn fast(mut config: SwapConfig) -> SwapConfig {
    config.poll_interval = Duration::from_millis(5);
    config.confirmation_timeout = Duration::from_millis(300);
    config
}

/// Alice offers ZNN for Bob's QSR.
fn configs() -> (SwapConfig, SwapConfig) {
    let initiator = SwapConfig::new(
        SwapRole::Initiator,
        EscrowOffer::new("ZNN", ZNN_AMOUNT),
        EscrowOffer::new("QSR", QSR_AMOUNT),
    );
    let responder = SwapConfig::new(
        SwapRole::Responder,
        EscrowOffer::new("QSR", QSR_AMOUNT),
        EscrowOffer::new("ZNN", ZNN_AMOUNT),
    );
    (fast(initiator), fast(responder))
}

type SwapResult = Result<SwapOutcome, AbortRecord>;
type Initiator<C> = InitiatorSwap<InMemoryLedger, AccountSigner, C>;
type Responder<C> = ResponderSwap<InMemoryLedger, AccountSigner, C>;

fn parties<CI, CR>(
    ledger: &InMemoryLedger,
    initiator_config: SwapConfig,
    responder_config: SwapConfig,
    initiator_channel: CI,
    responder_channel: CR,
) -> (Initiator<CI>, Responder<CR>)
where
    CI: MessageChannel,
    CR: MessageChannel,
{
    let mut rng_a = StdRng::from_seed([1u8; 32]);
    let mut rng_b = StdRng::from_seed([2u8; 32]);
    let initiator =
        InitiatorSwap::new(initiator_config, ledger.clone(), alice(), initiator_channel, &mut rng_a).unwrap();
    let responder =
        ResponderSwap::new(responder_config, ledger.clone(), bob(), responder_channel, &mut rng_b).unwrap();
    (initiator, responder)
}

/// Runs a party on its own task, so the test can act on the ledger while the party waits on it.
fn spawn_party<P: SwapParty + Send + 'static>(mut party: P) -> JoinHandle<(P, SwapResult)> {
    tokio::spawn(async move {
        let result = party.run().await;
        (party, result)
    })
}

async fn run_swap<CI, CR>(
    ledger: &InMemoryLedger,
    initiator_config: SwapConfig,
    responder_config: SwapConfig,
    initiator_channel: CI,
    responder_channel: CR,
) -> (SwapResult, SwapResult)
where
    CI: MessageChannel,
    CR: MessageChannel,
{
    let (mut initiator, mut responder) =
        parties(ledger, initiator_config, responder_config, initiator_channel, responder_channel);
    let (a, b) = tokio::join!(initiator.run(), responder.run());
    match &a {
        Ok(_) => assert_eq!(initiator.stage(), SwapStage::Done),
        Err(record) => {
            assert!(initiator.has_aborted());
            assert_eq!(initiator.abort_record(), Some(record));
        }
    }
    match &b {
        Ok(_) => assert_eq!(responder.stage(), SwapStage::Done),
        Err(record) => {
            assert!(responder.has_aborted());
            assert_eq!(responder.abort_record(), Some(record));
        }
    }
    (a, b)
}

/// Rewrites outgoing messages before they hit the wire.
struct Tamper<C> {
    inner: C,
    rewrite: Box<dyn FnMut(SwapMessage) -> SwapMessage + Send>,
}

impl<C> Tamper<C> {
    fn new(inner: C, rewrite: impl FnMut(SwapMessage) -> SwapMessage + Send + 'static) -> Self {
        Self { inner, rewrite: Box::new(rewrite) }
    }
}

impl<C: MessageChannel> MessageChannel for Tamper<C> {
    async fn send(&mut self, message: SwapMessage) -> Result<(), ChannelError> {
        self.inner.send((self.rewrite)(message)).await
    }

    async fn recv(&mut self) -> Result<SwapMessage, ChannelError> {
        self.inner.recv().await
    }
}

/// An escrow funded outside the swap, for handing to the counterparty in place of the real one.
async fn decoy_escrow(
    ledger: &InMemoryLedger,
    owner: &AccountSigner,
    asset: &AssetId,
    amount: u64,
    lifetime: Duration,
) -> EscrowReference {
    ledger.fund(&owner.address(), asset, amount);
    let (_, lock_key) = Curve25519PublicKey::keypair(&mut StdRng::from_seed([9u8; 32]));
    let expiration = ledger.current_time().await.unwrap().after(lifetime);
    let terms = EscrowTerms { asset: asset.clone(), amount, expiration, lock_key };
    ledger.create(owner.sign(LedgerAction::CreateEscrow(terms)).unwrap()).await.unwrap()
}

fn escrow_of(ledger: &InMemoryLedger, owner: &AccountAddress) -> Option<EscrowRecord> {
    ledger.escrows().into_iter().find(|r| &r.owner == owner)
}

fn assert_unlocked_by(record: &EscrowRecord, claimant: &AccountAddress) {
    match &record.status {
        EscrowStatus::Unlocked { signature, by } => {
            assert_eq!(by, claimant);
            let message = leg_message(record.id.as_bytes(), by.as_bytes());
            assert!(verify(&record.terms.lock_key, &message, signature));
        }
        other => panic!("escrow {} should be unlocked, but is {other}", record.id),
    }
}

#[tokio::test]
async fn swap_completes() {
    env_logger::try_init().ok();
    let ledger = funded_ledger();
    let (ci, cr) = InMemoryChannel::pair(16);
    let (initiator_config, responder_config) = configs();
    let (a, b) = run_swap(&ledger, initiator_config, responder_config, ci, cr).await;
    let a = a.expect("initiator should complete");
    let b = b.expect("responder should complete");

    assert_eq!(a.claimed_escrow, b.local_escrow);
    assert_eq!(b.claimed_escrow, a.local_escrow);
    assert_eq!(ledger.balance(&alice().address(), &qsr()), QSR_AMOUNT);
    assert_eq!(ledger.balance(&alice().address(), &znn()), 0);
    assert_eq!(ledger.balance(&bob().address(), &znn()), ZNN_AMOUNT);
    assert_eq!(ledger.balance(&bob().address(), &qsr()), 0);

    let alice_escrow = escrow_of(&ledger, &alice().address()).unwrap();
    let bob_escrow = escrow_of(&ledger, &bob().address()).unwrap();
    assert_unlocked_by(&bob_escrow, &alice().address());
    assert_unlocked_by(&alice_escrow, &bob().address());
    assert!(alice_escrow.terms.expiration.since(bob_escrow.terms.expiration).unwrap() >= Duration::from_secs(6 * 3600));
    // Both claims share the adaptor point in their nonce but are distinct signatures.
    assert_ne!(a.claim_signature, b.claim_signature);
}

#[tokio::test]
async fn responder_can_learn_the_claim_from_the_ledger() {
    env_logger::try_init().ok();
    let ledger = funded_ledger();
    let (ci, cr) = InMemoryChannel::pair(16);
    let (initiator_config, mut responder_config) = configs();
    responder_config.observe_on_ledger = true;
    let (a, b) = run_swap(&ledger, initiator_config, responder_config, ci, cr).await;
    assert!(a.is_ok());
    assert!(b.is_ok());
    assert_eq!(ledger.balance(&bob().address(), &znn()), ZNN_AMOUNT);
}

#[tokio::test]
async fn garbled_completed_signature_falls_back_to_the_ledger() {
    env_logger::try_init().ok();
    let ledger = funded_ledger();
    let (ci, cr) = InMemoryChannel::pair(16);
    let ci = Tamper::new(ci, |m| match m {
        SwapMessage::CompletedSignature(_) => SwapMessage::CompletedSignature(Signature::from_bytes([7u8; 64])),
        other => other,
    });
    let (initiator_config, responder_config) = configs();
    let (a, b) = run_swap(&ledger, initiator_config, responder_config, ci, cr).await;
    assert!(a.is_ok());
    let b = b.expect("responder should finish from the ledger");
    assert_unlocked_by(&escrow_of(&ledger, &alice().address()).unwrap(), &bob().address());
    assert_eq!(b.role, SwapRole::Responder);
}

#[tokio::test]
async fn bad_pre_signature_is_caught_before_anything_is_revealed() {
    env_logger::try_init().ok();
    let ledger = funded_ledger();
    let (ci, cr) = InMemoryChannel::pair(16);
    let cr = Tamper::new(cr, |m| match m {
        SwapMessage::PreSignature(pre) => SwapMessage::PreSignature(PreSignature::from(pre.as_scalar() + Scalar::ONE)),
        other => other,
    });
    let (initiator_config, responder_config) = configs();
    let (mut initiator, responder) = parties(&ledger, initiator_config, responder_config, ci, cr);
    let responder = spawn_party(responder);

    let a = initiator.run().await.unwrap_err();
    assert_eq!(a.stage, SwapStage::ChallengesExchanged);
    assert!(matches!(a.error, SwapError::VerificationFailure(_)));
    assert_eq!(a.severity, Severity::Safe);
    assert!(a.pending_claim.is_none());

    // The responder handed out s'1, so it keeps watching its escrow until it is claimed or expires.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(!responder.is_finished());
    assert!(ledger.escrows().iter().all(|r| r.is_active()));

    ledger.advance_time(Duration::from_secs(25 * 3600));
    let (responder, b) = responder.await.unwrap();
    let b = b.unwrap_err();
    let bob_escrow = escrow_of(&ledger, &bob().address()).unwrap();
    assert_eq!(b.stage, SwapStage::AdaptorPreSigExchanged);
    assert_eq!(b.severity, Severity::Safe);
    assert!(matches!(b.error, SwapError::Ledger(LedgerError::EscrowExpired(id)) if id == bob_escrow.id));
    assert_eq!(responder.abort_record(), Some(&b));

    assert!(ledger.escrows().iter().all(|r| r.status == EscrowStatus::Expired));
    assert_eq!(ledger.balance(&alice().address(), &znn()), ZNN_AMOUNT);
    assert_eq!(ledger.balance(&bob().address(), &qsr()), QSR_AMOUNT);
}

#[tokio::test]
async fn bad_partial_signature_is_rejected_by_the_responder() {
    env_logger::try_init().ok();
    let ledger = funded_ledger();
    let (ci, cr) = InMemoryChannel::pair(16);
    let ci = Tamper::new(ci, |m| match m {
        SwapMessage::PartialSignatures { leg1, leg2 } => SwapMessage::PartialSignatures {
            leg1: PartialSignature::from(leg1.as_scalar() + Scalar::ONE),
            leg2,
        },
        other => other,
    });
    let (initiator_config, responder_config) = configs();
    let (a, b) = run_swap(&ledger, initiator_config, responder_config, ci, cr).await;

    let b = b.unwrap_err();
    assert_eq!(b.stage, SwapStage::LocalEscrowFunded);
    assert!(matches!(b.error, SwapError::VerificationFailure(_)));
    assert_eq!(b.severity, Severity::Safe);

    let a = a.unwrap_err();
    assert_eq!(a.stage, SwapStage::ChallengesExchanged);
    assert!(matches!(a.error, SwapError::CounterpartyAborted(_)));
    assert_eq!(a.severity, Severity::Safe);
    assert!(ledger.escrows().iter().all(|r| r.is_active()));
}

#[tokio::test]
async fn responder_refuses_an_escrow_with_the_wrong_amount() {
    env_logger::try_init().ok();
    let ledger = funded_ledger();
    let (ci, cr) = InMemoryChannel::pair(16);
    let (initiator_config, mut responder_config) = configs();
    responder_config.expect.amount = 2 * ZNN_AMOUNT;
    let (a, b) = run_swap(&ledger, initiator_config, responder_config, ci, cr).await;

    let b = b.unwrap_err();
    assert_eq!(b.stage, SwapStage::KeysExchanged);
    assert!(matches!(b.error, SwapError::EscrowTermsMismatch(_)));
    assert_eq!(b.severity, Severity::Safe);
    let a = a.unwrap_err();
    assert_eq!(a.stage, SwapStage::LocalEscrowFunded);
    assert!(matches!(a.error, SwapError::CounterpartyAborted(_)));
    // The responder never funded.
    assert!(escrow_of(&ledger, &bob().address()).is_none());
    assert_eq!(ledger.balance(&bob().address(), &qsr()), QSR_AMOUNT);
}

#[tokio::test]
async fn responder_refuses_an_escrow_that_expires_too_soon() {
    env_logger::try_init().ok();
    let ledger = funded_ledger();
    let (ci, cr) = InMemoryChannel::pair(16);
    let (mut initiator_config, mut responder_config) = configs();
    initiator_config.initiator_lock_window = Duration::from_secs(20 * 3600);
    initiator_config.responder_lock_window = Duration::from_secs(14 * 3600);
    responder_config.responder_lock_window = Duration::from_secs(16 * 3600);
    let (a, b) = run_swap(&ledger, initiator_config, responder_config, ci, cr).await;

    let b = b.unwrap_err();
    assert_eq!(b.stage, SwapStage::KeysExchanged);
    assert!(matches!(b.error, SwapError::EscrowTermsMismatch(_)));
    assert!(a.is_err());
    assert!(escrow_of(&ledger, &bob().address()).is_none());
}

#[tokio::test]
async fn failed_claim_submission_can_be_retried() {
    env_logger::try_init().ok();
    let ledger = funded_ledger();
    ledger.fail_next_unlocks(1);
    let (ci, cr) = InMemoryChannel::pair(16);
    let (initiator_config, responder_config) = configs();
    let (mut initiator, responder) = parties(&ledger, initiator_config, responder_config, ci, cr);
    let responder = spawn_party(responder);

    let a = initiator.run().await.unwrap_err();
    assert_eq!(a.stage, SwapStage::AdaptorPreSigExchanged);
    assert_eq!(a.severity, Severity::Retryable);
    let pending = a.pending_claim.expect("the claim signature is kept for a retry");

    // The retry lands well after the confirmation timeout. The responder must still be watching.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(!responder.is_finished());

    let confirmation = submit_claim(&ledger, &alice(), &pending).await.expect("retry succeeds");
    assert_eq!(confirmation.escrow, pending.escrow);
    let bob_escrow = escrow_of(&ledger, &bob().address()).unwrap();
    assert_eq!(bob_escrow.id, pending.escrow);
    assert_unlocked_by(&bob_escrow, &alice().address());

    let (responder, b) = responder.await.unwrap();
    let b = b.expect("responder completes from the late claim");
    assert_eq!(responder.stage(), SwapStage::Done);
    assert_eq!(b.claimed_escrow, escrow_of(&ledger, &alice().address()).unwrap().id);
    assert_eq!(ledger.balance(&bob().address(), &znn()), ZNN_AMOUNT);

    // Nothing is refunded once both escrows are claimed.
    ledger.advance_time(Duration::from_secs(25 * 3600));
    assert_eq!(ledger.balance(&alice().address(), &znn()), 0);
    assert_eq!(ledger.balance(&alice().address(), &qsr()), QSR_AMOUNT);
    assert_eq!(ledger.balance(&bob().address(), &znn()), ZNN_AMOUNT);
    assert_eq!(ledger.balance(&bob().address(), &qsr()), 0);
    // Repeating the same claim is harmless.
    assert_eq!(submit_claim(&ledger, &alice(), &pending).await.unwrap(), confirmation);
}

#[tokio::test]
async fn initiator_refuses_a_responder_escrow_too_close_to_its_own() {
    env_logger::try_init().ok();
    let ledger = funded_ledger();
    let (ci, cr) = InMemoryChannel::pair(16);
    let (mut initiator_config, mut responder_config) = configs();
    initiator_config.safety_margin = Duration::from_secs(10 * 3600);
    // The responder is happy with a 2h margin and locks for 16h against the initiator's 24h.
    responder_config.responder_lock_window = Duration::from_secs(16 * 3600);
    responder_config.safety_margin = Duration::from_secs(2 * 3600);
    let (a, b) = run_swap(&ledger, initiator_config, responder_config, ci, cr).await;

    let a = a.unwrap_err();
    assert_eq!(a.stage, SwapStage::LocalEscrowFunded);
    assert!(matches!(a.error, SwapError::EscrowTermsMismatch(_)));
    assert_eq!(a.severity, Severity::Safe);
    let b = b.unwrap_err();
    assert_eq!(b.stage, SwapStage::LocalEscrowFunded);
    assert!(matches!(b.error, SwapError::CounterpartyAborted(_)));
    assert_eq!(b.severity, Severity::Safe);
}

#[tokio::test]
async fn initiator_refuses_an_escrow_locked_to_another_key() {
    env_logger::try_init().ok();
    let ledger = funded_ledger();
    let decoy = decoy_escrow(&ledger, &bob(), &qsr(), QSR_AMOUNT, Duration::from_secs(12 * 3600)).await;
    let (ci, cr) = InMemoryChannel::pair(16);
    let cr = Tamper::new(cr, move |m| match m {
        SwapMessage::EscrowCreated(_) => SwapMessage::EscrowCreated(decoy),
        other => other,
    });
    let (initiator_config, responder_config) = configs();
    let (a, b) = run_swap(&ledger, initiator_config, responder_config, ci, cr).await;

    let a = a.unwrap_err();
    assert_eq!(a.stage, SwapStage::LocalEscrowFunded);
    assert!(matches!(a.error, SwapError::EscrowTermsMismatch(_)));
    assert_eq!(a.severity, Severity::Safe);
    assert!(matches!(b.unwrap_err().error, SwapError::CounterpartyAborted(_)));
    assert!(ledger.escrows().iter().all(|r| r.is_active()));
}

#[tokio::test]
async fn responder_refuses_an_escrow_locked_to_another_key() {
    env_logger::try_init().ok();
    let ledger = funded_ledger();
    let decoy = decoy_escrow(&ledger, &alice(), &znn(), ZNN_AMOUNT, Duration::from_secs(24 * 3600)).await;
    let (ci, cr) = InMemoryChannel::pair(16);
    let ci = Tamper::new(ci, move |m| match m {
        SwapMessage::EscrowCreated(_) => SwapMessage::EscrowCreated(decoy),
        other => other,
    });
    let (initiator_config, responder_config) = configs();
    let (a, b) = run_swap(&ledger, initiator_config, responder_config, ci, cr).await;

    let b = b.unwrap_err();
    assert_eq!(b.stage, SwapStage::KeysExchanged);
    assert!(matches!(b.error, SwapError::EscrowTermsMismatch(_)));
    assert_eq!(b.severity, Severity::Safe);
    assert!(matches!(a.unwrap_err().error, SwapError::CounterpartyAborted(_)));
    assert!(escrow_of(&ledger, &bob().address()).is_none());
    assert_eq!(ledger.balance(&bob().address(), &qsr()), QSR_AMOUNT);
}

#[tokio::test]
async fn initiator_refuses_an_expired_escrow() {
    env_logger::try_init().ok();
    let ledger = funded_ledger();
    let decoy = decoy_escrow(&ledger, &bob(), &qsr(), QSR_AMOUNT, Duration::from_secs(3600)).await;
    ledger.advance_time(Duration::from_secs(2 * 3600));
    let (ci, cr) = InMemoryChannel::pair(16);
    let cr = Tamper::new(cr, move |m| match m {
        SwapMessage::EscrowCreated(_) => SwapMessage::EscrowCreated(decoy),
        other => other,
    });
    let (initiator_config, responder_config) = configs();
    let (a, b) = run_swap(&ledger, initiator_config, responder_config, ci, cr).await;

    let a = a.unwrap_err();
    assert_eq!(a.stage, SwapStage::LocalEscrowFunded);
    assert!(matches!(a.error, SwapError::Ledger(LedgerError::EscrowExpired(id)) if id == decoy));
    assert_eq!(a.severity, Severity::Safe);
    assert!(matches!(b.unwrap_err().error, SwapError::CounterpartyAborted(_)));
}

#[tokio::test]
async fn hello_with_another_protocol_version_is_refused() {
    env_logger::try_init().ok();
    let ledger = funded_ledger();
    let (ci, cr) = InMemoryChannel::pair(16);
    let ci = Tamper::new(ci, |m| match m {
        SwapMessage::Hello(hello) => SwapMessage::Hello(Hello { version: PROTOCOL_VERSION + 1, ..hello }),
        other => other,
    });
    let (initiator_config, responder_config) = configs();
    let (a, b) = run_swap(&ledger, initiator_config, responder_config, ci, cr).await;

    let b = b.unwrap_err();
    assert_eq!(b.stage, SwapStage::Init);
    assert!(matches!(b.error, SwapError::ProtocolViolation(_)));
    let a = a.unwrap_err();
    assert_eq!(a.stage, SwapStage::Init);
    assert!(matches!(a.error, SwapError::CounterpartyAborted(_)));
    assert!(ledger.escrows().is_empty());
}

#[tokio::test]
async fn counterparty_using_our_address_is_refused() {
    env_logger::try_init().ok();
    let ledger = funded_ledger();
    let (ci, cr) = InMemoryChannel::pair(16);
    let impostor = alice().address();
    let cr = Tamper::new(cr, move |m| match m {
        SwapMessage::Hello(hello) => SwapMessage::Hello(Hello { address: impostor.clone(), ..hello }),
        other => other,
    });
    let (initiator_config, responder_config) = configs();
    let (a, b) = run_swap(&ledger, initiator_config, responder_config, ci, cr).await;

    let a = a.unwrap_err();
    assert_eq!(a.stage, SwapStage::Init);
    assert!(matches!(a.error, SwapError::ProtocolViolation(_)));
    assert!(matches!(b.unwrap_err().error, SwapError::CounterpartyAborted(_)));
    assert!(ledger.escrows().is_empty());
}

#[tokio::test]
async fn silent_counterparty_times_out() {
    env_logger::try_init().ok();
    let ledger = funded_ledger();
    let (mut peer, cr) = InMemoryChannel::pair(16);
    let (_, mut responder_config) = configs();
    responder_config.recv_timeout = Some(Duration::from_millis(20));
    let mut rng = StdRng::from_seed([3u8; 32]);
    let mut responder = ResponderSwap::new(responder_config, ledger.clone(), bob(), cr, &mut rng).unwrap();
    let record = responder.run().await.unwrap_err();
    assert_eq!(record.stage, SwapStage::Init);
    assert_eq!(record.severity, Severity::Safe);
    assert!(matches!(record.error, SwapError::Channel(ChannelError::Timeout(_))));
    assert!(matches!(peer.recv().await.unwrap(), SwapMessage::Abort { .. }));
}

#[tokio::test]
async fn a_swap_runs_only_once() {
    env_logger::try_init().ok();
    let ledger = funded_ledger();
    let (ci, _cr) = InMemoryChannel::pair(16);
    let (mut initiator_config, _) = configs();
    initiator_config.recv_timeout = Some(Duration::from_millis(20));
    let mut rng = StdRng::from_seed([4u8; 32]);
    let mut initiator = InitiatorSwap::new(initiator_config, ledger, alice(), ci, &mut rng).unwrap();
    assert!(initiator.run().await.is_err());
    assert_eq!(initiator.stage(), SwapStage::Aborted);
    let again = initiator.run().await.unwrap_err();
    assert!(matches!(again.error, SwapError::InvalidStateTransition { .. }));
    assert_eq!(initiator.stage(), SwapStage::Aborted);
}

#[test]
fn roles_must_match_the_configuration() {
    let ledger = funded_ledger();
    let (ci, cr) = InMemoryChannel::pair(1);
    let (initiator_config, responder_config) = configs();
    let mut rng = StdRng::from_seed([5u8; 32]);
    assert!(matches!(
        InitiatorSwap::new(responder_config, ledger.clone(), alice(), ci, &mut rng),
        Err(SwapError::InvalidConfig(_))
    ));
    assert!(matches!(
        ResponderSwap::new(initiator_config, ledger, bob(), cr, &mut rng),
        Err(SwapError::InvalidConfig(_))
    ));
}

/// Signs like the wrapped account but reports an address too long to put on the wire.
struct OversizedAddress(AccountSigner);

impl Signer for OversizedAddress {
    fn address(&self) -> AccountAddress {
        AccountAddress::new(vec![0xab; MAX_FIELD_LEN + 1])
    }

    fn sign(&self, action: LedgerAction) -> Result<SignedAction, LedgerError> {
        self.0.sign(action)
    }
}

#[test]
fn oversized_addresses_are_refused() {
    let ledger = funded_ledger();
    let (ci, cr) = InMemoryChannel::pair(1);
    let (initiator_config, responder_config) = configs();
    let mut rng = StdRng::from_seed([6u8; 32]);
    assert!(matches!(
        InitiatorSwap::new(initiator_config, ledger.clone(), OversizedAddress(alice()), ci, &mut rng),
        Err(SwapError::InvalidConfig(_))
    ));
    assert!(matches!(
        ResponderSwap::new(responder_config, ledger, OversizedAddress(bob()), cr, &mut rng),
        Err(SwapError::InvalidConfig(_))
    ));
}
