use crate::cryptography::schnorr::Signature;
use crate::ledger::{AccountAddress, EscrowRecord, EscrowReference, EscrowService, EscrowStatus, LedgerError};
use log::*;
use std::time::Duration;

/// Polls the ledger for escrow state changes.
#[derive(Debug, Clone, Copy)]
pub struct EscrowWatcher {
    poll_interval: Duration,
    timeout: Duration,
}

impl EscrowWatcher {
    pub fn new(poll_interval: Duration, timeout: Duration) -> Self {
        Self { poll_interval, timeout }
    }

    /// Poll until `ready` returns `Some` for the escrow record. There is no time limit.
    ///
    /// Transient lookup failures are logged and retried. Any other ledger error ends the wait.
    async fn poll_until<L, F, T>(&self, ledger: &L, id: &EscrowReference, ready: F) -> Result<T, LedgerError>
    where
        L: EscrowService,
        F: Fn(&EscrowRecord) -> Result<Option<T>, LedgerError>,
    {
        loop {
            match ledger.escrow(id).await {
                Ok(record) => {
                    if let Some(result) = ready(&record)? {
                        return Ok(result);
                    }
                    trace!("Escrow {id} is {}. Polling again in {:?}", record.status, self.poll_interval);
                }
                Err(e) if e.is_transient() => debug!("Transient error polling escrow {id}: {e}"),
                Err(e) => return Err(e),
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Poll until `ready` returns `Some` for the escrow record, or the timeout passes.
    pub async fn wait_for<L, F, T>(&self, ledger: &L, id: &EscrowReference, ready: F) -> Result<T, LedgerError>
    where
        L: EscrowService,
        F: Fn(&EscrowRecord) -> Result<Option<T>, LedgerError>,
    {
        tokio::time::timeout(self.timeout, self.poll_until(ledger, id, ready))
            .await
            .map_err(|_| LedgerError::Timeout(self.timeout))?
    }

    /// Wait until the escrow exists and is active.
    pub async fn wait_for_active<L: EscrowService>(
        &self,
        ledger: &L,
        id: &EscrowReference,
    ) -> Result<EscrowRecord, LedgerError> {
        self.wait_for(ledger, id, |record| match &record.status {
            EscrowStatus::Active => Ok(Some(record.clone())),
            EscrowStatus::Expired => Err(LedgerError::EscrowExpired(*id)),
            EscrowStatus::Unlocked { .. } => Err(LedgerError::rejected(format!("escrow {id} was already unlocked"))),
        })
        .await
    }

    /// Wait until someone unlocks the escrow and return the signature they used.
    ///
    /// Only the escrow itself ends this wait: it returns once the escrow is unlocked, or fails with
    /// [`LedgerError::EscrowExpired`] once it has expired. The watcher timeout does not apply.
    pub async fn wait_for_unlock<L: EscrowService>(
        &self,
        ledger: &L,
        id: &EscrowReference,
    ) -> Result<(Signature, AccountAddress), LedgerError> {
        self.poll_until(ledger, id, |record| match &record.status {
            EscrowStatus::Active => Ok(None),
            EscrowStatus::Expired => Err(LedgerError::EscrowExpired(*id)),
            EscrowStatus::Unlocked { signature, by } => Ok(Some((*signature, by.clone()))),
        })
        .await
    }
}

#[cfg(all(test, feature = "dummy_ledger"))]
mod tests {
    use super::*;
    use crate::cryptography::keys::Curve25519PublicKey;
    use crate::helpers::Timestamp;
    use crate::ledger::dummy_impl::{InMemoryLedger, SeedKeyStore};
    use crate::ledger::{EscrowTerms, LedgerAction, Signer};
    use curve25519_dalek::Scalar;

    fn watcher() -> EscrowWatcher {
        EscrowWatcher::new(Duration::from_millis(5), Duration::from_millis(200))
    }

    #[tokio::test]
    async fn active_escrow_is_seen_immediately() {
        env_logger::try_init().ok();
        let ledger = InMemoryLedger::new(Timestamp::new(1_000));
        let signer = SeedKeyStore::new([1u8; 32]).signer(0).unwrap();
        ledger.fund(&signer.address(), &"ZNN".into(), 100);
        let terms = EscrowTerms {
            asset: "ZNN".into(),
            amount: 50,
            expiration: Timestamp::new(2_000),
            lock_key: Curve25519PublicKey::from_scalar(&Scalar::from(3u64)),
        };
        let id = ledger.create(signer.sign(LedgerAction::CreateEscrow(terms.clone())).unwrap()).await.unwrap();
        let record = watcher().wait_for_active(&ledger, &id).await.unwrap();
        assert_eq!(record.terms, terms);
    }

    #[tokio::test]
    async fn waiting_for_unlock_outlasts_the_timeout() {
        env_logger::try_init().ok();
        let ledger = InMemoryLedger::new(Timestamp::new(1_000));
        let signer = SeedKeyStore::new([2u8; 32]).signer(0).unwrap();
        ledger.fund(&signer.address(), &"QSR".into(), 100);
        let terms = EscrowTerms {
            asset: "QSR".into(),
            amount: 50,
            expiration: Timestamp::new(2_000),
            lock_key: Curve25519PublicKey::from_scalar(&Scalar::from(3u64)),
        };
        let id = ledger.create(signer.sign(LedgerAction::CreateEscrow(terms)).unwrap()).await.unwrap();

        let err = watcher().wait_for(&ledger, &id, |_| Ok(None::<()>)).await.unwrap_err();
        assert_eq!(err, LedgerError::Timeout(Duration::from_millis(200)));
        assert!(err.to_string().contains("200ms"));

        let clock = ledger.clone();
        let expire = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(400)).await;
            clock.set_time(Timestamp::new(2_000));
        });
        let started = std::time::Instant::now();
        let err = watcher().wait_for_unlock(&ledger, &id).await.unwrap_err();
        assert!(started.elapsed() >= Duration::from_millis(400));
        assert_eq!(err, LedgerError::EscrowExpired(id));
        expire.await.unwrap();
    }

    #[tokio::test]
    async fn unknown_escrow_fails_fast() {
        let ledger = InMemoryLedger::new(Timestamp::new(1_000));
        let id = EscrowReference::new([9u8; 32]);
        let err = watcher().wait_for_active(&ledger, &id).await.unwrap_err();
        assert_eq!(err, LedgerError::UnknownEscrow(id));
    }
}
