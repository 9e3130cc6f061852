//! Man page generator for gwflasher
//!
//! Usage: cargo run --bin gen-manpage -- [output-dir]
//!
//! Writes `gwflasher.1` plus one `gwflasher-<command>.1` per subcommand.

use clap::CommandFactory;
use std::fs;
use std::path::{Path, PathBuf};

#[path = "../cli.rs"]
#[allow(dead_code)]
mod cli;
#[path = "../programmers.rs"]
#[allow(dead_code)]
mod programmers;

fn render(cmd: clap::Command, path: &Path) -> std::io::Result<()> {
    let mut buffer = Vec::new();
    clap_mangen::Man::new(cmd).render(&mut buffer)?;
    fs::write(path, buffer)?;
    println!("  {}", path.display());
    Ok(())
}

fn main() -> std::io::Result<()> {
    // Default to ./man directory
    let output_dir = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from("man"), PathBuf::from);

    fs::create_dir_all(&output_dir)?;

    let cmd = cli::Cli::command();
    println!("Man pages generated:");

    for sub in cmd.get_subcommands() {
        let path = output_dir.join(format!("gwflasher-{}.1", sub.get_name()));
        render(sub.clone(), &path)?;
    }

    let main_page = output_dir.join("gwflasher.1");
    render(cmd, &main_page)?;

    println!("\nTo view the man page:");
    println!("  man -l {}", main_page.display());

    Ok(())
}
