use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use stellar_raffle_deployment_scripts::{DeployPlan, NetworkTable, Result};

#[derive(Parser)]
#[command(name = "raffle-deploy", about = "Plan raffle deployments per network")]
struct Cli {
    /// Network table to use instead of the builtin one.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the deployment plan for a network as JSON.
    Plan {
        #[arg(long)]
        network: String,
    },
    /// List the known networks.
    Networks,
}

fn run(cli: Cli) -> Result<()> {
    let table = match &cli.config {
        Some(path) => NetworkTable::load(path)?,
        None => NetworkTable::builtin(),
    };

    match cli.command {
        Command::Plan { network } => {
            let plan = DeployPlan::for_network(&table, &network)?;
            println!("{}", plan.to_json()?);
        }
        Command::Networks => {
            for name in table.names() {
                let config = table.get(name)?;
                let kind = if config.is_development() { "development" } else { "live" };
                println!("{name}\t{kind}");
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
