use clap::Parser;
use extsort::cli::{Cli, run_cli};
use extsort::output::OutputFormatter;
use extsort::signal::setup_cancel_signal;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cancel_flag = match setup_cancel_signal() {
        Ok(flag) => Some(flag),
        Err(e) => {
            log::warn!("Could not install Ctrl-C handler: {e}");
            None
        }
    };

    match run_cli(&cli, cancel_flag) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            OutputFormatter::error(&e);
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` wins over `-v` flags.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}
