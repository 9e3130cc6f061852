//! CLI argument parsing

use crate::programmers;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse a `key=value` bitstream header field
fn parse_header(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("Expected key=value, got '{}'", s)),
    }
}

/// Generate dynamic help text for the programmer argument
fn programmer_help() -> String {
    format!(
        "Programmer to use [available: {}]",
        programmers::programmer_names_short()
    )
}

#[derive(Parser)]
#[command(name = "gwflasher")]
#[command(author, version, about = "Gowin FPGA programmer", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where a bitstream goes
#[derive(clap::Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Write to flash instead of loading SRAM
    #[arg(short, long)]
    pub flash: bool,

    /// Use the external SPI flash (implies --flash). Needs an SPI flash chip
    /// driver, none is built into this binary, so the command fails with
    /// "no external SPI flash driver available"
    #[arg(long)]
    pub external_flash: bool,
}

impl TargetArgs {
    /// Whether the flash is targeted at all
    pub fn is_flash(&self) -> bool {
        self.flash || self.external_flash
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load a bitstream into SRAM or write it to flash
    Program {
        /// Programmer to use
        #[arg(short, long, help = programmer_help())]
        programmer: String,

        /// Bitstream payload (binary)
        #[arg(short, long)]
        input: PathBuf,

        #[command(flatten)]
        target: TargetArgs,

        /// Byte offset in external flash (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
        offset: u32,

        /// GW1NSR-4C MCU firmware written after the bitstream
        #[arg(long)]
        mcufw: Option<PathBuf>,

        /// Read back external flash after writing
        #[arg(long)]
        verify: bool,

        /// Clear the external flash block protection before writing
        #[arg(long)]
        unprotect_flash: bool,

        /// Treat the input as a raw blob without header (external flash only)
        #[arg(long)]
        raw: bool,

        /// Bitstream header field, e.g. --header idcode=0x0900281B (repeatable)
        #[arg(long = "header", value_parser = parse_header)]
        headers: Vec<(String, String)>,
    },

    /// Erase SRAM or embedded flash
    Erase {
        /// Programmer to use
        #[arg(short, long, help = programmer_help())]
        programmer: String,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Reload the configuration
    Reset {
        /// Programmer to use
        #[arg(short, long, help = programmer_help())]
        programmer: String,
    },

    /// Show the idcode and the device family
    Idcode {
        /// Programmer to use
        #[arg(short, long, help = programmer_help())]
        programmer: String,
    },

    /// Show the status register and usercode
    Status {
        /// Programmer to use
        #[arg(short, long, help = programmer_help())]
        programmer: String,
    },

    /// List supported programmers
    ListProgrammers,

    /// List known devices and their quirks
    ListDevices,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_external_flash_help_names_missing_driver() {
        let cmd = Cli::command();
        let program = cmd.find_subcommand("program").unwrap();
        let help = program
            .get_arguments()
            .find(|arg| arg.get_id() == "external_flash")
            .and_then(|arg| arg.get_help())
            .map(|help| help.to_string())
            .unwrap();
        assert!(help.contains("no external SPI flash driver available"));
    }

    #[test]
    fn test_parse_program() {
        let cli = Cli::try_parse_from([
            "gwflasher",
            "-vv",
            "program",
            "-p",
            "dummy",
            "-i",
            "top.bin",
            "--flash",
            "--offset",
            "0x1000",
            "--unprotect-flash",
            "--header",
            "idcode=0x0900281B",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Program {
                target,
                offset,
                unprotect_flash,
                headers,
                ..
            } => {
                assert!(target.is_flash() && !target.external_flash);
                assert_eq!(offset, 0x1000);
                assert!(unprotect_flash);
                assert_eq!(headers, [("idcode".to_string(), "0x0900281B".to_string())]);
            }
            _ => panic!("expected program"),
        }
    }
}
