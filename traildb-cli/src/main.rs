//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

use traildb_cli::CliError;

fn main() {
    match traildb_cli::run() {
        Ok(()) => {}
        Err(CliError::ArgumentParsing(err)) => err.exit(),
        Err(err) => {
            eprintln!("traildb: {err}");
            std::process::exit(1);
        }
    }
}
