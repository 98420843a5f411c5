use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// PTLC atomic swaps.
///
/// Runs both sides of a swap against an in-memory ledger and reports what each party ended up with.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Config {
    /// Path to the simulation file. The default is `$HOME/.ptlc/simulation.yml`.
    #[arg(long = "config-file", short = 'c', env = "PTLC_CONFIG")]
    pub config_file: Option<PathBuf>,
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Write a simulation file with fresh account seeds and default swap parameters.
    #[command(name = "init", alias = "init-config")]
    Init(InitCommand),
    /// Run both parties of the configured swap to completion.
    #[command(name = "simulate", alias = "run")]
    Simulate,
    /// Show the ledger account derived from a seed.
    #[command(name = "account")]
    Account(AccountCommand),
}

#[derive(Debug, Args)]
pub struct InitCommand {
    /// Overwrite an existing file.
    #[arg(long = "force", short = 'f', default_value_t = false)]
    pub force: bool,
}

#[derive(Debug, Args)]
pub struct AccountCommand {
    /// The 32-byte account seed, hex encoded.
    #[arg(long = "seed")]
    pub seed: String,
    /// The account index to derive.
    #[arg(long = "index", short = 'i', default_value_t = 0)]
    pub index: u32,
}

pub struct GlobalOptions {
    pub config_file: Option<PathBuf>,
}

impl Config {
    pub fn to_parts(self) -> (GlobalOptions, CliCommand) {
        let global = GlobalOptions { config_file: self.config_file };
        (global, self.command)
    }
}
