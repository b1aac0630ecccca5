use std::process::ExitCode;

use clap::Parser;

use tetherd::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match tetherd::run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            // Telemetry may not be installed yet; report directly.
            eprintln!("tetherd: {error}");
            ExitCode::FAILURE
        }
    }
}
