use crate::error::CliError;
use libptlc::helpers::Timestamp;
use libptlc::ledger::dummy_impl::{AccountSigner, InMemoryLedger, SeedKeyStore};
use libptlc::ledger::{AccountAddress, AssetId, Signer};
use libptlc::swap_protocol::{
    AbortRecord, EscrowOffer, InMemoryChannel, InitiatorSwap, ResponderSwap, SwapConfig, SwapOutcome, SwapParty,
    SwapError, SwapRole,
};
use log::*;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One party's ledger account in a simulation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PartyConfig {
    pub name: String,
    #[serde(serialize_with = "libptlc::helpers::to_hex", deserialize_with = "libptlc::helpers::array_from_hex")]
    pub seed: [u8; 32],
    #[serde(default)]
    pub account_index: u32,
    /// Credited to the account in the asset it offers before the swap starts.
    pub balance: u64,
}

impl PartyConfig {
    pub fn random(name: impl Into<String>, balance: u64) -> Self {
        let mut seed = [0u8; 32];
        rand::rng().fill_bytes(&mut seed);
        Self { name: name.into(), seed, account_index: 0, balance }
    }

    pub fn signer(&self) -> Result<AccountSigner, CliError> {
        Ok(SeedKeyStore::new(self.seed).signer(self.account_index)?)
    }
}

/// Both parties of a swap and the ledger they meet on.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SimulationConfig {
    /// Ledger time at the start of the simulation. Defaults to the local clock.
    #[serde(default)]
    pub start_time: Option<Timestamp>,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    pub initiator: PartyConfig,
    pub responder: PartyConfig,
    pub initiator_swap: SwapConfig,
    pub responder_swap: SwapConfig,
}

fn default_channel_capacity() -> usize {
    16
}

impl SimulationConfig {
    /// Alice offers `1000 ZNN` for Bob's `5000 QSR`, with fresh account seeds.
    pub fn random() -> Self {
        let znn = EscrowOffer::new("ZNN", 1_000);
        let qsr = EscrowOffer::new("QSR", 5_000);
        Self {
            start_time: None,
            channel_capacity: default_channel_capacity(),
            initiator: PartyConfig::random("alice", znn.amount),
            responder: PartyConfig::random("bob", qsr.amount),
            initiator_swap: SwapConfig::new(SwapRole::Initiator, znn.clone(), qsr.clone()),
            responder_swap: SwapConfig::new(SwapRole::Responder, qsr, znn),
        }
    }

    pub fn validate(&self) -> Result<(), CliError> {
        self.initiator_swap.validate()?;
        self.responder_swap.validate()?;
        if self.initiator_swap.role != SwapRole::Initiator || self.responder_swap.role != SwapRole::Responder {
            return Err(CliError::Setup(SwapError::InvalidConfig(
                "initiator_swap and responder_swap must have the initiator and responder roles".into(),
            )));
        }
        if self.channel_capacity == 0 {
            return Err(CliError::Setup(SwapError::InvalidConfig(
                "channel_capacity must be positive".into(),
            )));
        }
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CliError> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let config = serde_yml::from_reader(reader)?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), CliError> {
        // Create directory path if required
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_yml::to_writer(writer, self)?;
        Ok(())
    }
}

pub fn default_config_path() -> PathBuf {
    let mut home = std::env::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.push(".ptlc");
    home.push("simulation.yml");
    home
}

/// A party's holdings after the simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Holding {
    pub party: String,
    pub address: AccountAddress,
    pub asset: AssetId,
    pub amount: u64,
}

#[derive(Debug)]
pub struct SimulationReport {
    pub initiator: Result<SwapOutcome, AbortRecord>,
    pub responder: Result<SwapOutcome, AbortRecord>,
    pub holdings: Vec<Holding>,
}

impl SimulationReport {
    pub fn succeeded(&self) -> bool {
        self.initiator.is_ok() && self.responder.is_ok()
    }
}

/// Run both parties as concurrent tasks over an in-memory channel and ledger.
pub async fn run_simulation(config: &SimulationConfig) -> Result<SimulationReport, CliError> {
    config.validate()?;
    let now = config.start_time.unwrap_or_else(Timestamp::now);
    let ledger = InMemoryLedger::new(now);
    let alice = config.initiator.signer()?;
    let bob = config.responder.signer()?;
    let alice_address = alice.address();
    let bob_address = bob.address();
    if alice_address == bob_address {
        return Err(CliError::InvalidSeed("both parties derive the same account".into()));
    }
    let offered = &config.initiator_swap.offer.asset;
    let expected = &config.initiator_swap.expect.asset;
    ledger.fund(&alice_address, offered, config.initiator.balance);
    ledger.fund(&bob_address, &config.responder_swap.offer.asset, config.responder.balance);
    info!("{} is {alice_address}, {} is {bob_address}. Ledger time is {now}", config.initiator.name, config.responder.name);

    let (initiator_channel, responder_channel) = InMemoryChannel::pair(config.channel_capacity);
    let mut initiator =
        InitiatorSwap::new(config.initiator_swap.clone(), ledger.clone(), alice, initiator_channel, &mut rand::rng())?;
    let mut responder =
        ResponderSwap::new(config.responder_swap.clone(), ledger.clone(), bob, responder_channel, &mut rand::rng())?;
    debug!("Adaptor point: {}", initiator.adaptor_point().as_hex());

    let initiator_task = tokio::spawn(async move { initiator.run().await });
    let responder_task = tokio::spawn(async move { responder.run().await });
    let (initiator_result, responder_result) = tokio::join!(initiator_task, responder_task);

    let mut holdings = Vec::new();
    for (party, address) in [(&config.initiator.name, &alice_address), (&config.responder.name, &bob_address)] {
        for asset in [offered, expected] {
            let amount = ledger.balance(address, asset);
            holdings.push(Holding { party: party.clone(), address: address.clone(), asset: asset.clone(), amount });
        }
    }
    Ok(SimulationReport { initiator: initiator_result?, responder: responder_result?, holdings })
}
