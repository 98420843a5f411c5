use crate::cryptography::keys::KeyPair;
use crate::helpers::Timestamp;
use crate::ledger::error::LedgerError;
use crate::ledger::{AccountAddress, Confirmation, EscrowRecord, EscrowReference, LedgerAction, SignedAction};
use std::future::Future;

/// The ledger's notion of "now". Escrow expirations are measured against this clock, never the local one.
pub trait LedgerTimeSource: Send + Sync {
    fn current_time(&self) -> impl Future<Output = Result<Timestamp, LedgerError>> + Send;
}

/// Escrow contracts that release their funds to whoever presents a valid Ed25519 signature under the lock key.
pub trait EscrowService: Send + Sync {
    /// Submit a signed `CreateEscrow` action. The funds are debited from the sender.
    fn create(&self, action: SignedAction) -> impl Future<Output = Result<EscrowReference, LedgerError>> + Send;

    /// Submit a signed `Unlock` action. The ledger checks the unlock signature against the escrow's lock key and the
    /// message `SHA3-256(escrow id || sender address)`. Repeating an unlock that already succeeded with the same
    /// signature returns the original confirmation.
    fn unlock(&self, action: SignedAction) -> impl Future<Output = Result<Confirmation, LedgerError>> + Send;

    /// Look up the current state of an escrow.
    fn escrow(&self, id: &EscrowReference) -> impl Future<Output = Result<EscrowRecord, LedgerError>> + Send;
}

/// Anything the swap protocol needs from the ledger.
pub trait Ledger: LedgerTimeSource + EscrowService {}

impl<T: LedgerTimeSource + EscrowService> Ledger for T {}

/// Authorizes ledger actions on behalf of one account.
pub trait Signer: Send + Sync {
    fn address(&self) -> AccountAddress;

    fn sign(&self, action: LedgerAction) -> Result<SignedAction, LedgerError>;
}

/// Derives ledger accounts from some root secret.
pub trait KeyStore {
    fn derive_account(&self, index: u32) -> Result<(KeyPair, AccountAddress), LedgerError>;
}
