use umd_core::logging;

mod cli;

use crate::cli::CliCommand;

fn main() {
    // Chapter status goes to stdout; logs go to the state dir, or stderr if that fails.
    if let Err(err) = logging::init_logging() {
        logging::init_logging_stderr();
        tracing::warn!("file logging unavailable: {:#}", err);
    }

    if let Err(err) = CliCommand::run_from_args() {
        eprintln!("umd error: {:#}", err);
        std::process::exit(1);
    }
}
