//! `solstice`: drive the seasonal repaint engine against a generated world,
//! restore backups, and inspect backup files.

mod demo;
mod inspect;
mod restore;
mod simulate;
mod watch;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "solstice", about = "Seasonal biome repaint engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the engine over a noise-generated world through several seasons
    Simulate(simulate::SimulateArgs),
    /// Write every backup under a root back into a regenerated world
    Restore(restore::RestoreArgs),
    /// Print the header and palette of a backup file
    Inspect(inspect::InspectArgs),
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    let result = match cli.command {
        Command::Simulate(args) => simulate::run(args),
        Command::Restore(args) => restore::run(args),
        Command::Inspect(args) => inspect::run(args),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
