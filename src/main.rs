//! `kvm8` - runs a compiled `ROM.bin` against the SDL2-backed console.
//!
//! The host loop mirrors `vm_run.cpp`'s per-frame driver (spec.md §4.F, §5):
//! each iteration drains pending window events first. If a window-close
//! event shows up, the loop drains the program's window-close and ending
//! procedures to completion right there and stops -- no tick runs for that
//! frame. Otherwise it runs exactly one CPU tick; if that tick halted the
//! program on its own, it drains the ending procedure before presenting and
//! stopping. The frame is presented every iteration that doesn't end in a
//! window close, regardless of whether the tick halted.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use kvm8::console::Console;
use kvm8::ram::DEFAULT_RAM_SIZE;
use kvm8::renderer::{HostEvent, Sdl2Renderer};
use kvm8::rom::Rom;

#[derive(Parser, Debug)]
#[command(name = "kvm8", about = "An 8-bit fantasy console")]
struct Cli {
    /// ROM image to run
    #[arg(long, default_value = "ROM.bin")]
    rom: PathBuf,

    /// RAM size in bytes
    #[arg(long, default_value_t = DEFAULT_RAM_SIZE)]
    ram_size: usize,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.verbose {
        std::env::set_var("RUST_LOG", "debug");
    }
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let bytes = fs::read(&cli.rom).with_context(|| format!("failed to read ROM at {}", cli.rom.display()))?;
    let rom = Rom::from_bytes(bytes);

    let mut console = Console::new(rom, cli.ram_size, Sdl2Renderer::new());
    console.init("kvm8")?;

    loop {
        let events = console.ppu.poll_events();
        if events.iter().any(|e| *e == HostEvent::WindowClose) {
            info!("window closed, running window-close and ending procedures");
            console.window_closed()?;
            break;
        }

        let result = console.execute_tick(&events)?;
        if result.program_end {
            console.end()?;
            console.ppu.present();
            break;
        }
        console.ppu.present();
    }

    Ok(())
}
