use crate::ledger::AssetId;
use crate::swap_protocol::error::SwapError;
use crate::swap_protocol::stage::SwapRole;
use crate::swap_protocol::utils::MAX_FIELD_LEN;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_INITIATOR_LOCK_WINDOW: Duration = Duration::from_secs(24 * 3600);
pub const DEFAULT_RESPONDER_LOCK_WINDOW: Duration = Duration::from_secs(12 * 3600);
pub const DEFAULT_SAFETY_MARGIN: Duration = Duration::from_secs(6 * 3600);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(120);

/// An amount of some asset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowOffer {
    pub asset: AssetId,
    pub amount: u64,
}

impl EscrowOffer {
    pub fn new(asset: impl Into<String>, amount: u64) -> Self {
        Self { asset: AssetId::new(asset), amount }
    }
}

/// One party's parameters for a swap.
///
/// The initiator's escrow must outlive the responder's by at least `safety_margin`. Otherwise the initiator could
/// wait for the responder's escrow to expire and still claim it after refunding its own.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapConfig {
    pub role: SwapRole,
    /// What this party locks in its escrow.
    pub offer: EscrowOffer,
    /// What the counterparty must lock for this party to proceed.
    pub expect: EscrowOffer,
    #[serde(with = "crate::helpers::duration_secs")]
    pub initiator_lock_window: Duration,
    #[serde(with = "crate::helpers::duration_secs")]
    pub responder_lock_window: Duration,
    #[serde(with = "crate::helpers::duration_secs")]
    pub safety_margin: Duration,
    #[serde(with = "crate::helpers::duration_millis")]
    pub poll_interval: Duration,
    /// How long to wait for the ledger to confirm an escrow or an unlock.
    #[serde(with = "crate::helpers::duration_secs")]
    pub confirmation_timeout: Duration,
    /// Abort if the counterparty is silent for this long. `None` waits until the escrows expire.
    #[serde(default, with = "crate::helpers::option_duration_millis")]
    pub recv_timeout: Option<Duration>,
    /// Responder only: learn the initiator's claim signature from the ledger instead of the channel.
    #[serde(default)]
    pub observe_on_ledger: bool,
}

impl SwapConfig {
    pub fn new(role: SwapRole, offer: EscrowOffer, expect: EscrowOffer) -> Self {
        Self {
            role,
            offer,
            expect,
            initiator_lock_window: DEFAULT_INITIATOR_LOCK_WINDOW,
            responder_lock_window: DEFAULT_RESPONDER_LOCK_WINDOW,
            safety_margin: DEFAULT_SAFETY_MARGIN,
            poll_interval: DEFAULT_POLL_INTERVAL,
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
            recv_timeout: None,
            observe_on_ledger: false,
        }
    }

    /// The lock window for this party's own escrow.
    pub fn own_lock_window(&self) -> Duration {
        match self.role {
            SwapRole::Initiator => self.initiator_lock_window,
            SwapRole::Responder => self.responder_lock_window,
        }
    }

    pub fn validate(&self) -> Result<(), SwapError> {
        for (label, offer) in [("offer", &self.offer), ("expect", &self.expect)] {
            if offer.amount == 0 {
                return Err(SwapError::InvalidConfig(format!("{label} amount must be positive")));
            }
            if offer.asset.as_str().is_empty() || offer.asset.as_str().len() > MAX_FIELD_LEN {
                return Err(SwapError::InvalidConfig(format!(
                    "{label} asset must be between 1 and {MAX_FIELD_LEN} bytes long"
                )));
            }
        }
        if self.responder_lock_window.is_zero() || self.safety_margin.is_zero() {
            return Err(SwapError::InvalidConfig("lock windows and the safety margin must be positive".into()));
        }
        let required = self
            .responder_lock_window
            .checked_add(self.safety_margin)
            .ok_or_else(|| SwapError::InvalidConfig("lock window overflow".into()))?;
        if self.initiator_lock_window < required {
            return Err(SwapError::InvalidConfig(format!(
                "initiator lock window ({}s) must be at least the responder lock window plus the safety margin ({}s)",
                self.initiator_lock_window.as_secs(),
                required.as_secs()
            )));
        }
        if self.poll_interval.is_zero() || self.poll_interval > self.confirmation_timeout {
            return Err(SwapError::InvalidConfig(
                "poll interval must be positive and no longer than the confirmation timeout".into(),
            ));
        }
        if self.observe_on_ledger && self.role.is_initiator() {
            return Err(SwapError::InvalidConfig("observe_on_ledger only applies to the responder".into()));
        }
        Ok(())
    }
}
