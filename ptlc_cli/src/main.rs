use anyhow::anyhow;
use clap::Parser;
use libptlc::ledger::dummy_impl::SeedKeyStore;
use libptlc::ledger::KeyStore;
use log::*;
use ptlc_cli::config::{AccountCommand, CliCommand, Config, GlobalOptions, InitCommand};
use ptlc_cli::simulation::{default_config_path, run_simulation, SimulationConfig, SimulationReport};

#[tokio::main]
async fn main() {
    env_logger::init();
    let config: Config = Config::parse();
    let (global_options, command) = config.to_parts();

    let result = match command {
        CliCommand::Init(cmd) => exec_init(cmd, global_options),
        CliCommand::Simulate => exec_simulate(global_options).await,
        CliCommand::Account(cmd) => exec_account(cmd),
    };

    match result {
        Ok(()) => {
            println!("Bye :)")
        }
        Err(err) => {
            eprintln!("** Error ** \n {err}");
            std::process::exit(1);
        }
    }
}

fn exec_init(cmd: InitCommand, options: GlobalOptions) -> Result<(), anyhow::Error> {
    let path = options.config_file.unwrap_or_else(default_config_path);
    if path.exists() && !cmd.force {
        return Err(anyhow!("{} already exists. Use --force to overwrite it.", path.display()));
    }
    let config = SimulationConfig::random();
    config.save(&path)?;
    println!("Simulation written to {}", path.display());
    Ok(())
}

async fn exec_simulate(options: GlobalOptions) -> Result<(), anyhow::Error> {
    let path = options.config_file.unwrap_or_else(default_config_path);
    info!("Loading simulation from {}", path.display());
    let config = SimulationConfig::load(&path)?;
    let report = run_simulation(&config).await?;
    print_report(&config, &report);
    if report.succeeded() {
        Ok(())
    } else {
        Err(anyhow!("The swap did not complete"))
    }
}

fn print_report(config: &SimulationConfig, report: &SimulationReport) {
    for (name, result) in [(&config.initiator.name, &report.initiator), (&config.responder.name, &report.responder)] {
        match result {
            Ok(outcome) => println!(
                "{name} ({}) claimed escrow {} at {}",
                outcome.role, outcome.claimed_escrow, outcome.confirmation.confirmed_at
            ),
            Err(record) => {
                println!("{name}: {record}");
                if let Some(claim) = &record.pending_claim {
                    println!("  pending claim on {}: {}", claim.escrow, claim.signature.as_hex());
                }
            }
        }
    }
    println!("Final holdings:");
    for holding in &report.holdings {
        println!("  {:<10} {:>12} {}", holding.party, holding.amount, holding.asset);
    }
}

fn exec_account(cmd: AccountCommand) -> Result<(), anyhow::Error> {
    let mut seed = [0u8; 32];
    hex::decode_to_slice(cmd.seed.trim(), &mut seed).map_err(|e| anyhow!("Invalid seed: {e}"))?;
    let (keypair, address) = SeedKeyStore::new(seed).derive_account(cmd.index)?;
    println!("Account {}: {address}", cmd.index);
    println!("Public key: {}", keypair.public().as_hex());
    Ok(())
}
