use libptlc::ledger::LedgerError;
use libptlc::swap_protocol::SwapError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("IO Error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Invalid configuration file: {0}")]
    InvalidConfig(#[from] serde_yml::Error),
    #[error("Invalid seed: {0}")]
    InvalidSeed(String),
    #[error("Could not set up the swap: {0}")]
    Setup(#[from] SwapError),
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
    #[error("A swap task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
