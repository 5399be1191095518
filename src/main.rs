//! kingraph command-line entry point.

use std::process::ExitCode;

use clap::Parser;
use kingraph::cli::{run, Cli};
use kingraph::observability::init_logging;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("Error: {e}");
            ExitCode::from(2)
        }
    }
}
