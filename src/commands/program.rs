//! Program command implementation

use gwflasher_core::gowin::{CrcCheck, Gowin, ProgramConfig, ProgramMode, Programmable};
use gwflasher_core::image::{Bitstream, Image, RawImage};
use gwflasher_core::progress::{Progress, Stage};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::Path;

use crate::cli::TargetArgs;
use crate::programmers;

/// Progress reporter using indicatif progress bars
#[derive(Default)]
pub struct IndicatifProgress {
    current_bar: Option<ProgressBar>,
    stage: Option<Stage>,
}

impl IndicatifProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn template(stage: Stage) -> String {
        let counter = match stage {
            Stage::LoadSram => "{pos}/{len} bits",
            Stage::EraseFlash => "{pos}/{len} attempts",
            Stage::WriteFlash => "{bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
        };
        format!(
            "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {} {}",
            counter,
            stage.label()
        )
    }
}

impl Progress for IndicatifProgress {
    fn start(&mut self, stage: Stage, total: usize) {
        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(&Self::template(stage))
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        self.current_bar = Some(pb);
        self.stage = Some(stage);
    }

    fn advance(&mut self, done: usize) {
        if let Some(pb) = &self.current_bar {
            pb.set_position(done as u64);
        }
    }

    fn finish(&mut self, ok: bool) {
        let label = self.stage.take().map_or("", |s| s.label());
        if let Some(pb) = self.current_bar.take() {
            if ok {
                pb.finish_with_message(format!("{} done", label));
            } else {
                pb.abandon_with_message(format!("{} failed", label));
            }
        }
    }
}

/// Options of the program command besides programmer and target
pub struct ProgramOptions<'a> {
    pub offset: u32,
    pub mcufw: Option<&'a Path>,
    pub verify: bool,
    pub unprotect: bool,
    pub raw: bool,
    pub headers: &'a [(String, String)],
}

/// Build an image from a file and the header fields given on the command line
pub fn load_image(
    path: &Path,
    raw: bool,
    headers: &[(String, String)],
) -> Result<Box<dyn Image>, Box<dyn std::error::Error>> {
    let data = fs::read(path).map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    log::info!("Loaded {} bytes from {}", data.len(), path.display());

    if raw {
        if !headers.is_empty() {
            log::warn!("Ignoring --header for a raw image");
        }
        return Ok(Box::new(RawImage::new(data)));
    }

    let bitstream = headers
        .iter()
        .fold(Bitstream::new(data), |bs, (key, value)| bs.with_header(key, value));
    Ok(Box::new(bitstream))
}

fn report_crc(crc: CrcCheck) -> Result<(), Box<dyn std::error::Error>> {
    match crc {
        CrcCheck::Match => {
            println!("CRC check: Success");
            Ok(())
        }
        CrcCheck::Skipped => {
            println!("CRC check: skipped");
            Ok(())
        }
        CrcCheck::Mismatch { usercode, checksum } => Err(format!(
            "CRC check failed: usercode 0x{:08x}, image checksum 0x{:04x}",
            usercode, checksum
        )
        .into()),
    }
}

/// Load SRAM or write flash
pub fn run_program(
    programmer: &str,
    input: &Path,
    target: &TargetArgs,
    opts: &ProgramOptions<'_>,
) -> Result<(), Box<dyn std::error::Error>> {
    let image = load_image(input, opts.raw, opts.headers)?;

    let mode = if target.is_flash() {
        ProgramMode::Flash
    } else {
        ProgramMode::Sram
    };

    let mut config = ProgramConfig::new(mode)
        .image(image)
        .external_flash(target.external_flash)
        .verify(opts.verify)
        .unprotect_flash(opts.unprotect)
        .progress(Box::new(IndicatifProgress::new()));

    if let Some(path) = opts.mcufw {
        let firmware = load_image(path, true, &[])?;
        config = config.mcu_firmware(firmware);
    }

    let cable = programmers::open_cable(programmer)?;
    let mut device = Gowin::open(cable, config)?;

    if device.uses_external_flash() && !target.external_flash && mode == ProgramMode::Flash {
        log::info!("{} only boots from external flash", device.quirks().family);
    }

    let crc = device.program(opts.offset)?;
    report_crc(crc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_file(name: &str, data: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("gwflasher-{}-{}", std::process::id(), name));
        fs::write(&path, data).unwrap();
        path
    }

    #[test]
    fn test_load_bitstream_with_headers() {
        let path = temp_file("bitstream.bin", &[0x12, 0x34, 0x56, 0x78]);
        let headers = vec![("idcode".to_string(), "0x0900281B".to_string())];
        let image = load_image(&path, false, &headers).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(image.header("idcode"), Some("0x0900281B"));
        assert_eq!(image.bit_len(), 32);
        assert_eq!(image.checksum(), 0x1234u16.wrapping_add(0x5678));
    }

    #[test]
    fn test_load_raw_image() {
        let path = temp_file("raw.bin", &[0xAA; 3]);
        let image = load_image(&path, true, &[]).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(image.data(), [0xAA; 3]);
        assert_eq!(image.header("idcode"), None);
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_image(Path::new("/nonexistent/gwflasher.bin"), false, &[])
            .err()
            .map(|e| e.to_string());
        assert!(err.is_some_and(|msg| msg.starts_with("Failed to read")));
    }

    #[test]
    fn test_report_crc() {
        assert!(report_crc(CrcCheck::Match).is_ok());
        assert!(report_crc(CrcCheck::Skipped).is_ok());
        assert!(report_crc(CrcCheck::Mismatch {
            usercode: 1,
            checksum: 2
        })
        .is_err());
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_program_sram_on_dummy() {
        let path = temp_file("sram.bin", &[0x5A; 64]);
        let headers = vec![("idcode".to_string(), "0x0900281B".to_string())];
        let target = TargetArgs::default();
        let opts = ProgramOptions {
            offset: 0,
            mcufw: None,
            verify: false,
            unprotect: false,
            raw: false,
            headers: &headers,
        };
        let result = run_program("dummy", &path, &target, &opts);
        fs::remove_file(&path).unwrap();
        assert!(result.is_ok());
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_program_idcode_mismatch_on_dummy() {
        let path = temp_file("mismatch.bin", &[0x5A; 64]);
        let headers = vec![("idcode".to_string(), "0x0100381B".to_string())];
        let target = TargetArgs::default();
        let opts = ProgramOptions {
            offset: 0,
            mcufw: None,
            verify: false,
            unprotect: false,
            raw: false,
            headers: &headers,
        };
        let result = run_program("dummy", &path, &target, &opts);
        fs::remove_file(&path).unwrap();
        assert!(result.is_err());
    }
}
