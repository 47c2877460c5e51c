//! ash CLI.

use clap::Parser;

fn main() {
    let cli = ash::cli::Cli::parse();
    if let Err(e) = ash::cli::dispatch(cli.command) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
