//! Device query and maintenance commands

use gwflasher_core::gowin::{Gowin, ProgramConfig, ProgramMode, Programmable, Quirks};
use gwflasher_core::jtag::JtagCable;

use super::program::IndicatifProgress;
use crate::cli::TargetArgs;
use crate::programmers;

fn open_device(
    programmer: &str,
    config: ProgramConfig,
) -> Result<Gowin<Box<dyn JtagCable + Send>>, Box<dyn std::error::Error>> {
    let cable = programmers::open_cable(programmer)?;
    Ok(Gowin::open(cable, config)?)
}

/// Erase SRAM or embedded flash
pub fn run_erase(programmer: &str, target: &TargetArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mode = if target.is_flash() {
        ProgramMode::Flash
    } else {
        ProgramMode::Sram
    };
    let config = ProgramConfig::new(mode)
        .external_flash(target.external_flash)
        .progress(Box::new(IndicatifProgress::new()));

    let mut device = open_device(programmer, config)?;
    device.erase()?;
    println!("Erase complete");
    Ok(())
}

/// Reload the configuration from flash
pub fn run_reset(programmer: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut device = open_device(programmer, ProgramConfig::new(ProgramMode::Sram))?;
    device.reset()?;
    println!("Configuration reloaded");
    Ok(())
}

/// Print the idcode and what is known about the family
pub fn run_idcode(programmer: &str) -> Result<(), Box<dyn std::error::Error>> {
    let device = open_device(programmer, ProgramConfig::new(ProgramMode::Sram))?;
    let quirks = device.quirks();

    println!("Device Information");
    println!("==================");
    println!();
    println!("Idcode:          0x{:08X}", device.idcode());
    println!("Family:          {}", quirks.family);
    print_quirks(quirks);
    Ok(())
}

fn print_quirks(quirks: &Quirks) {
    println!("Erase pulses:    {}", quirks.erase_pulses);
    println!("Flash target:    {}", flash_target(quirks));
    println!("SPI access:      {}", spi_access(quirks));
    println!(
        "Checksum:        {}",
        if quirks.skip_checksum {
            "not reported"
        } else {
            "usercode"
        }
    );
    if quirks.mcu_firmware {
        println!("MCU firmware:    supported");
    }
}

/// Where flash programming goes for a family
pub(crate) fn flash_target(quirks: &Quirks) -> &'static str {
    if quirks.flash_write_unsupported {
        "unsupported"
    } else if quirks.external_flash_only {
        "external"
    } else {
        "embedded"
    }
}

/// How the external SPI flash is reached
pub(crate) fn spi_access(quirks: &Quirks) -> &'static str {
    if quirks.spi.is_passthrough() {
        "shift register"
    } else {
        "boundary-scan bitbang"
    }
}

/// Print the status register flags and the usercode
pub fn run_status(programmer: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut device = open_device(programmer, ProgramConfig::new(ProgramMode::Sram))?;
    let status = device.read_status()?;
    let usercode = device.read_usercode()?;

    println!("Status:   0x{:08X}", status.bits());
    for name in status.describe() {
        println!("  {}", name);
    }
    println!("Usercode: 0x{:08X}", usercode);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flash_target() {
        let gw1n = Quirks::for_idcode(0x0900_281B);
        assert_eq!(flash_target(&gw1n), "embedded");
        assert_eq!(spi_access(&gw1n), "boundary-scan bitbang");

        let gw2a = Quirks::for_idcode(0x0000_081B);
        assert_eq!(flash_target(&gw2a), "external");
        assert_eq!(spi_access(&gw2a), "shift register");

        assert_eq!(flash_target(&Quirks::for_idcode(0x0001_281B)), "unsupported");
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_erase_on_dummy() {
        let sram = TargetArgs::default();
        assert!(run_erase("dummy", &sram).is_ok());

        let flash = TargetArgs {
            flash: true,
            external_flash: false,
        };
        assert!(run_erase("dummy", &flash).is_ok());

        let external = TargetArgs {
            flash: false,
            external_flash: true,
        };
        assert!(run_erase("dummy", &external).is_err());
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_queries_on_dummy() {
        assert!(run_idcode("dummy:idcode=0x0000081B").is_ok());
        assert!(run_status("dummy").is_ok());
        assert!(run_reset("dummy").is_ok());
    }
}
