//! `kvm8-asm` - the two-pass `.kasm` assembler, standalone from the CPU it
//! targets (spec.md §4.G). Grounded on `original_source/kasmCompiler.cpp`'s
//! `main()`, which reads a source file and writes the assembled bytes out.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use kvm8::assembler;

#[derive(Parser, Debug)]
#[command(name = "kvm8-asm", about = "Assembles .kasm source into a ROM image")]
struct Cli {
    /// .kasm source file
    #[arg(long, default_value = "program.kasm")]
    input: PathBuf,

    /// Output ROM image
    #[arg(long, default_value = "ROM.bin")]
    output: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let source = fs::read_to_string(&cli.input)
        .with_context(|| format!("failed to read source at {}", cli.input.display()))?;

    let rom = assembler::assemble(&source)?;

    fs::write(&cli.output, &rom)
        .with_context(|| format!("failed to write ROM to {}", cli.output.display()))?;

    info!("assembled {} bytes to {}", rom.len(), cli.output.display());
    Ok(())
}
