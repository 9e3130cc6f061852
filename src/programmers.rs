//! Programmer registration and dispatch
//!
//! This module provides a centralized registry for all JTAG cables, with
//! support for feature-gated inclusion and dynamic help text generation.

use gwflasher_core::jtag::JtagCable;
use thiserror::Error;

/// Information about a programmer
pub struct ProgrammerInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// Errors opening a programmer
#[derive(Debug, Error)]
pub enum ProgrammerError {
    /// Name matches no compiled-in programmer
    #[error("Unknown programmer: {name}\n\n{help}\nUse 'gwflasher list-programmers' for more details")]
    Unknown {
        /// Name as given on the command line
        name: String,
        /// Programmer listing
        help: String,
    },

    /// Programmer options could not be parsed
    #[error("Invalid {name} parameters: {reason}")]
    InvalidOptions {
        /// Canonical programmer name
        name: &'static str,
        /// Parser message
        reason: String,
    },
}

/// Get information about all available programmers (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_programmers() -> Vec<ProgrammerInfo> {
    let mut programmers = Vec::new();

    #[cfg(feature = "dummy")]
    programmers.push(ProgrammerInfo {
        name: "dummy",
        aliases: &["sim"],
        description:
            "Simulated Gowin FPGA (idcode=<hex>,usercode=<hex>,flash_size=<bytes>,erase_latency=<n>)",
    });

    programmers
}

/// Generate help text listing all available programmers
pub fn programmer_help() -> String {
    let programmers = available_programmers();

    if programmers.is_empty() {
        return "No programmers available (recompile with programmer features enabled)".to_string();
    }

    let mut help = String::from("Available programmers:\n");

    for p in &programmers {
        help.push_str(&format!("  {:12} - {}\n", p.name, p.description));
        if !p.aliases.is_empty() {
            help.push_str(&format!("  {:12}   aliases: {}\n", "", p.aliases.join(", ")));
        }
    }

    help
}

/// Generate a short list of programmer names for CLI help
pub fn programmer_names_short() -> String {
    let programmers = available_programmers();
    let names: Vec<&str> = programmers.iter().map(|p| p.name).collect();
    names.join(", ")
}

/// Resolve a programmer name or alias to its canonical name
pub fn find_programmer(name: &str) -> Option<&'static str> {
    available_programmers()
        .into_iter()
        .find(|p| p.name == name || p.aliases.contains(&name))
        .map(|p| p.name)
}

/// Open the JTAG cable named by `programmer`
///
/// The programmer string can be just the name (e.g., "dummy") or include
/// parameters (e.g., "dummy:idcode=0x0100381B").
pub fn open_cable(programmer: &str) -> Result<Box<dyn JtagCable + Send>, ProgrammerError> {
    let (name, options) = parse_programmer_string(programmer);

    let Some(canonical_name) = find_programmer(name) else {
        return Err(ProgrammerError::Unknown {
            name: name.to_string(),
            help: programmer_help(),
        });
    };

    match canonical_name {
        #[cfg(feature = "dummy")]
        "dummy" => {
            let config = gwflasher_dummy::parse_options(&options).map_err(|e| {
                ProgrammerError::InvalidOptions {
                    name: "dummy",
                    reason: e.to_string(),
                }
            })?;
            log::info!("Opening simulated device (idcode 0x{:08x})", config.idcode);
            Ok(Box::new(gwflasher_dummy::DummyGowin::new(config)))
        }

        _ => {
            let _ = options;
            Err(ProgrammerError::Unknown {
                name: name.to_string(),
                help: programmer_help(),
            })
        }
    }
}

/// Parse a programmer string into name and options
///
/// Format: "name" or "name:option1=value1,option2=value2"
pub fn parse_programmer_string(s: &str) -> (&str, Vec<(&str, &str)>) {
    if let Some((name, opts)) = s.split_once(':') {
        let options: Vec<_> = opts
            .split(',')
            .filter_map(|opt| opt.split_once('='))
            .collect();
        (name, options)
    } else {
        (s, Vec::new())
    }
}
