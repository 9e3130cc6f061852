//! List commands implementation

use gwflasher_core::gowin::Quirks;

use super::device::{flash_target, spi_access};
use crate::programmers;

/// List all supported programmers
pub fn list_programmers() {
    print!("{}", programmers::programmer_help());
}

/// List all devices with a quirk table entry
pub fn list_devices() {
    println!("Known devices:");
    println!();
    println!(
        "{:<12} {:<12} {:>6} {:<12} {:<22}",
        "Idcode", "Family", "Pulses", "Flash", "SPI access"
    );
    println!("{}", "-".repeat(68));

    for (idcode, quirks) in Quirks::known() {
        println!(
            "0x{:08X}   {:<12} {:>6} {:<12} {:<22}",
            idcode,
            quirks.family.name(),
            quirks.erase_pulses,
            flash_target(quirks),
            spi_access(quirks)
        );
    }
}
