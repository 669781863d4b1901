//! Error types for the VM and the assembler.
//!
//! Only process-terminating conditions are modeled as `Result` error values
//! here. Recoverable conditions (invalid SYS/GFX sub-ops, an out-of-range
//! texture id at draw time) are not errors in this sense: they are logged
//! via `log::error!` and execution continues at the next instruction.
//!
//! The assembler is stricter than `kasmCompiler.cpp` on exactly one point: a
//! malformed hex literal and an opcode-table entry with no variant for the
//! given operand count are both fatal here (`InvalidHexLength`,
//! `BadOpcodeArity`), even though the original only aborts on the former and
//! merely logs-and-emits-`0xFF` on the latter. An unknown mnemonic or an
//! unresolved label keep the original's lenient fallback (opcode `0x00`,
//! address `0x0000`) rather than becoming errors.

use thiserror::Error;

/// Fatal errors raised by the VM core (RAM and PPU).
#[derive(Error, Debug)]
pub enum VmError {
    #[error("address 0x{address:04X} out of range (RAM size {size})")]
    AddressOutOfRange { address: u16, size: usize },

    #[error("invalid texture color format: {0}")]
    InvalidTextureFormat(u8),
}

/// Fatal errors raised by the two-pass assembler.
#[derive(Error, Debug)]
pub enum AssemblerError {
    #[error("invalid hex literal length in token '{0}'")]
    InvalidHexLength(String),

    #[error("no opcode variant for '{mnemonic}' with {arg_count} argument word(s)")]
    BadOpcodeArity { mnemonic: String, arg_count: i32 },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
