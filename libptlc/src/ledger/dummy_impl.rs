//! An in-memory ledger for tests and simulations.
//!
//! It enforces the same rules a real escrow ledger would: actions must be signed by the sending account, funds must
//! be available, and an escrow only unlocks for a valid Ed25519 signature under its lock key over
//! `SHA3-256(escrow id || unlocker address)` before it expires. Time only moves when told to.

use crate::cryptography::hashes::{challenge, leg_message};
use crate::cryptography::keys::{reduce_wide, Curve25519Secret, KeyPair};
use crate::cryptography::schnorr::{keygen, verify, Signature};
use crate::helpers::Timestamp;
use crate::ledger::{
    AccountAddress, AssetId, Confirmation, EscrowRecord, EscrowReference, EscrowService, EscrowStatus, EscrowTerms,
    KeyStore, LedgerAction, LedgerError, LedgerTimeSource, SignedAction, Signer,
};
use crate::swap_protocol::utils::Writable;
use log::*;
use sha2::{Digest, Sha512};
use sha3::Sha3_256;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use zeroize::Zeroizing;

#[derive(Default)]
struct LedgerState {
    now: Timestamp,
    escrows: HashMap<EscrowReference, EscrowRecord>,
    confirmations: HashMap<EscrowReference, Confirmation>,
    balances: HashMap<(AccountAddress, AssetId), u64>,
    created: u64,
    unlock_failures: u32,
}

impl LedgerState {
    fn balance_mut(&mut self, account: &AccountAddress, asset: &AssetId) -> &mut u64 {
        self.balances.entry((account.clone(), asset.clone())).or_insert(0)
    }

    /// Expire every active escrow whose expiration has passed and refund its owner.
    fn expire_escrows(&mut self) {
        let now = self.now;
        let mut refunds = Vec::new();
        for record in self.escrows.values_mut() {
            if record.is_active() && record.terms.expiration <= now {
                info!("Escrow {} expired at {now}. Refunding {}", record.id, record.owner);
                record.status = EscrowStatus::Expired;
                refunds.push((record.owner.clone(), record.terms.asset.clone(), record.terms.amount));
            }
        }
        for (owner, asset, amount) in refunds {
            *self.balance_mut(&owner, &asset) += amount;
        }
    }
}

/// A shared in-memory ledger. Clones refer to the same ledger.
#[derive(Clone, Default)]
pub struct InMemoryLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl InMemoryLedger {
    pub fn new(now: Timestamp) -> Self {
        let state = LedgerState { now, ..Default::default() };
        Self { state: Arc::new(Mutex::new(state)) }
    }

    fn lock(&self) -> Result<MutexGuard<'_, LedgerState>, LedgerError> {
        self.state.lock().map_err(|_| LedgerError::Unreachable("ledger state lock is poisoned".into()))
    }

    /// Credit an account out of thin air.
    pub fn fund(&self, account: &AccountAddress, asset: &AssetId, amount: u64) {
        if let Ok(mut state) = self.lock() {
            *state.balance_mut(account, asset) += amount;
        }
    }

    pub fn balance(&self, account: &AccountAddress, asset: &AssetId) -> u64 {
        self.lock().map(|s| s.balances.get(&(account.clone(), asset.clone())).copied().unwrap_or(0)).unwrap_or(0)
    }

    pub fn set_time(&self, now: Timestamp) {
        if let Ok(mut state) = self.lock() {
            state.now = now;
            state.expire_escrows();
        }
    }

    pub fn advance_time(&self, duration: Duration) {
        if let Ok(mut state) = self.lock() {
            state.now = state.now.after(duration);
            state.expire_escrows();
        }
    }

    /// The next `count` unlock submissions fail as if the ledger were unreachable.
    pub fn fail_next_unlocks(&self, count: u32) {
        if let Ok(mut state) = self.lock() {
            state.unlock_failures = count;
        }
    }

    pub fn escrows(&self) -> Vec<EscrowRecord> {
        self.lock().map(|s| s.escrows.values().cloned().collect()).unwrap_or_default()
    }
}

impl LedgerTimeSource for InMemoryLedger {
    async fn current_time(&self) -> Result<Timestamp, LedgerError> {
        Ok(self.lock()?.now)
    }
}

impl EscrowService for InMemoryLedger {
    async fn create(&self, action: SignedAction) -> Result<EscrowReference, LedgerError> {
        if !action.verify() {
            return Err(LedgerError::rejected("invalid account signature"));
        }
        let LedgerAction::CreateEscrow(terms) = &action.action else {
            return Err(LedgerError::rejected("expected a CreateEscrow action"));
        };
        let mut state = self.lock()?;
        if terms.amount == 0 {
            return Err(LedgerError::rejected("escrow amount must be positive"));
        }
        if terms.expiration <= state.now {
            return Err(LedgerError::rejected(format!("expiration {} is not in the future", terms.expiration)));
        }
        let balance = state.balance_mut(&action.sender, &terms.asset);
        if *balance < terms.amount {
            return Err(LedgerError::rejected(format!(
                "insufficient {} balance: have {}, need {}",
                terms.asset, balance, terms.amount
            )));
        }
        *balance -= terms.amount;
        state.created += 1;
        let id = escrow_id(&action.sender, state.created, terms);
        let record =
            EscrowRecord { id, owner: action.sender.clone(), terms: terms.clone(), status: EscrowStatus::Active };
        info!("Escrow {id} created by {}: {} {} until {}", action.sender, terms.amount, terms.asset, terms.expiration);
        state.escrows.insert(id, record);
        Ok(id)
    }

    async fn unlock(&self, action: SignedAction) -> Result<Confirmation, LedgerError> {
        if !action.verify() {
            return Err(LedgerError::rejected("invalid account signature"));
        }
        let LedgerAction::Unlock { escrow, signature } = &action.action else {
            return Err(LedgerError::rejected("expected an Unlock action"));
        };
        let mut guard = self.lock()?;
        let state = &mut *guard;
        if state.unlock_failures > 0 {
            state.unlock_failures -= 1;
            return Err(LedgerError::Unreachable("simulated outage".into()));
        }
        let now = state.now;
        let record = state.escrows.get_mut(escrow).ok_or(LedgerError::UnknownEscrow(*escrow))?;
        match &record.status {
            EscrowStatus::Active => {}
            EscrowStatus::Expired => return Err(LedgerError::EscrowExpired(*escrow)),
            EscrowStatus::Unlocked { signature: used, by } => {
                if used == signature && *by == action.sender {
                    debug!("Repeated unlock of escrow {escrow}");
                    return state.confirmations.get(escrow).cloned().ok_or(LedgerError::UnknownEscrow(*escrow));
                }
                return Err(LedgerError::rejected(format!("escrow {escrow} is already unlocked")));
            }
        }
        if record.terms.expiration <= now {
            return Err(LedgerError::EscrowExpired(*escrow));
        }
        let message = leg_message(escrow.as_bytes(), action.sender.as_bytes());
        if !verify(&record.terms.lock_key, &message, signature) {
            warn!("Rejected unlock of escrow {escrow} by {}: bad signature", action.sender);
            return Err(LedgerError::rejected("signature does not verify under the escrow lock key"));
        }
        record.status = EscrowStatus::Unlocked { signature: *signature, by: action.sender.clone() };
        let asset = record.terms.asset.clone();
        let amount = record.terms.amount;
        *state.balance_mut(&action.sender, &asset) += amount;
        let confirmation = Confirmation { escrow: *escrow, confirmed_at: now };
        state.confirmations.insert(*escrow, confirmation.clone());
        info!("Escrow {escrow} unlocked by {}: {amount} {asset}", action.sender);
        Ok(confirmation)
    }

    async fn escrow(&self, id: &EscrowReference) -> Result<EscrowRecord, LedgerError> {
        self.lock()?.escrows.get(id).cloned().ok_or(LedgerError::UnknownEscrow(*id))
    }
}

fn escrow_id(owner: &AccountAddress, counter: u64, terms: &EscrowTerms) -> EscrowReference {
    let mut hasher = Sha3_256::new();
    hasher.update(owner.as_bytes());
    hasher.update(counter.to_le_bytes());
    hasher.update(terms.serialize());
    EscrowReference::new(hasher.finalize().into())
}

/// Derives account keys from a 32-byte seed: account `i` is `keygen(SHA3-256(seed || i))`.
pub struct SeedKeyStore {
    seed: Zeroizing<[u8; 32]>,
}

impl SeedKeyStore {
    pub fn new(seed: [u8; 32]) -> Self {
        Self { seed: Zeroizing::new(seed) }
    }

    pub fn signer(&self, index: u32) -> Result<AccountSigner, LedgerError> {
        let (keypair, _) = self.derive_account(index)?;
        Ok(AccountSigner::new(keypair))
    }
}

impl KeyStore for SeedKeyStore {
    fn derive_account(&self, index: u32) -> Result<(KeyPair, AccountAddress), LedgerError> {
        let mut hasher = Sha3_256::new();
        hasher.update(&self.seed[..]);
        hasher.update(index.to_le_bytes());
        let account_seed = Zeroizing::new(<[u8; 32]>::from(hasher.finalize()));
        let keypair = keygen(&account_seed);
        let address = AccountAddress::from_public_key(keypair.public());
        trace!("Derived account {index}: {address}");
        Ok((keypair, address))
    }
}

/// Signs ledger actions with an account key.
pub struct AccountSigner {
    keypair: KeyPair,
    address: AccountAddress,
}

impl AccountSigner {
    pub fn new(keypair: KeyPair) -> Self {
        let address = AccountAddress::from_public_key(keypair.public());
        Self { keypair, address }
    }
}

impl Signer for AccountSigner {
    fn address(&self) -> AccountAddress {
        self.address.clone()
    }

    fn sign(&self, action: LedgerAction) -> Result<SignedAction, LedgerError> {
        let digest = action.digest();
        // Deterministic nonce from the secret and the digest, so a retried submission carries the same signature.
        let mut hasher = Sha512::new();
        hasher.update(b"ptlc-account-nonce");
        hasher.update(self.keypair.secret().as_scalar().as_bytes());
        hasher.update(digest);
        let wide = Zeroizing::new(<[u8; 64]>::from(hasher.finalize()));
        let nonce = KeyPair::from_secret(Curve25519Secret::from(reduce_wide(&wide)));
        let c = challenge(nonce.public(), self.keypair.public(), &digest);
        let s = nonce.secret().as_scalar() + c * self.keypair.secret().as_scalar();
        let signature = Signature::new(nonce.public(), &s);
        Ok(SignedAction { action, sender: self.address.clone(), sender_key: self.keypair.public().clone(), signature })
    }
}
