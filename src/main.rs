//! gwflasher - Gowin FPGA programmer
//!
//! Loads bitstreams into the configuration SRAM of Gowin FPGAs, writes them
//! to the embedded flash, or to an external SPI flash reached through JTAG
//! boundary-scan.
//!
//! # Architecture
//!
//! The protocol lives in `gwflasher-core` and only needs a `JtagCable`. The
//! binary resolves a programmer string to a cable, builds a `ProgramConfig`
//! from the command line and hands both to `Gowin::open`.

mod cli;
mod commands;
mod programmers;

use clap::Parser;
use cli::{Cli, Commands};

/// Log filter for a `-v` count, used when `RUST_LOG` is unset
fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

fn log_builder(verbose: u8) -> env_logger::Builder {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_filter(verbose)))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    log_builder(cli.verbose).init();

    match cli.command {
        Commands::Program {
            programmer,
            input,
            target,
            offset,
            mcufw,
            verify,
            unprotect_flash,
            raw,
            headers,
        } => {
            let opts = commands::ProgramOptions {
                offset,
                mcufw: mcufw.as_deref(),
                verify,
                unprotect: unprotect_flash,
                raw,
                headers: &headers,
            };
            commands::run_program(&programmer, &input, &target, &opts)
        }
        Commands::Erase { programmer, target } => commands::run_erase(&programmer, &target),
        Commands::Reset { programmer } => commands::run_reset(&programmer),
        Commands::Idcode { programmer } => commands::run_idcode(&programmer),
        Commands::Status { programmer } => commands::run_status(&programmer),
        Commands::ListProgrammers => {
            commands::list_programmers();
            Ok(())
        }
        Commands::ListDevices => {
            commands::list_devices();
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::{Level, LevelFilter, Log, Metadata};

    fn logger(verbose: u8) -> env_logger::Logger {
        env_logger::Builder::new()
            .parse_filters(log_filter(verbose))
            .build()
    }

    fn enabled(logger: &env_logger::Logger, level: Level) -> bool {
        let metadata = Metadata::builder()
            .level(level)
            .target("gwflasher_core::gowin")
            .build();
        logger.enabled(&metadata)
    }

    #[test]
    fn test_log_filter() {
        assert_eq!(log_filter(0), "info");
        assert_eq!(log_filter(1), "debug");
        assert_eq!(log_filter(2), "trace");
        assert_eq!(log_filter(5), "trace");
    }

    #[test]
    fn test_verbosity_reaches_logger() {
        let quiet = logger(0);
        assert_eq!(quiet.filter(), LevelFilter::Info);
        assert!(enabled(&quiet, Level::Info));
        assert!(!enabled(&quiet, Level::Debug));

        let debug = logger(1);
        assert_eq!(debug.filter(), LevelFilter::Debug);
        assert!(enabled(&debug, Level::Debug));
        assert!(!enabled(&debug, Level::Trace));

        let trace = logger(2);
        assert_eq!(trace.filter(), LevelFilter::Trace);
        assert!(enabled(&trace, Level::Trace));
    }
}
