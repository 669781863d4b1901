//! The CPU: register file, decode/dispatch loop, stack discipline, and the
//! SYS/GFX system-call tables.
//!
//! Grounded on `original_source/VM_CPU.hpp`'s `K_CPU::executeProgramTick`.
//! Every opcode byte below corresponds to a `case` in that `switch`; where
//! the original has a documented or accidental quirk (the `STRC`/`STCS`
//! I/O crossover, the `ADC` absolute fallthrough into `SBCC`, the missing
//! flag updates on `INC`/`DEC`) this implementation reproduces it rather
//! than correcting it. See DESIGN.md for the trace backing each one.

use std::io::{self, Write};
use std::time::Duration;

use log::{error, trace, warn};

use crate::error::VmError;
use crate::ppu::Ppu;
use crate::ram::{Ram, IO_CONSOLE_BUFFERED_OUT, IO_CONSOLE_OUT, STACK_PAGE};
use crate::renderer::{HostEvent, Renderer};
use crate::rom::Rom;

/// Z flag: bit 6. Set means "zero" / "equal".
const FLAG_Z: u8 = 0b0100_0000;
/// N flag: bit 0. Set means "negative" / "less than".
const FLAG_N: u8 = 0b0000_0001;
/// Mask that clears both flags before every arithmetic/compare op.
const FLAG_CLEAR_MASK: u8 = 0b1011_1110;

/// "No procedure" sentinel for `ending_proc`/`window_proc`.
pub const NO_PROC: u16 = 0xFFFF;

/// The outcome of running the CPU until it yields or halts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickResult {
    pub program_end: bool,
    pub return_value: i32,
}

impl TickResult {
    fn yielded() -> Self {
        TickResult { program_end: false, return_value: -1 }
    }

    fn halted(return_value: i32) -> Self {
        TickResult { program_end: true, return_value }
    }
}

/// Register file and control state for one CPU core.
pub struct Cpu {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub p: u8,
    pub s: u8,
    pub pc: u16,
    pub abh: u8,
    pub ending_proc: u16,
    pub window_proc: u16,
}

impl Default for Cpu {
    fn default() -> Self {
        Cpu {
            a: 0,
            x: 0,
            y: 0,
            p: 0,
            s: 0xFF,
            pc: 0,
            abh: 0,
            ending_proc: NO_PROC,
            window_proc: NO_PROC,
        }
    }
}

impl Cpu {
    pub fn new() -> Self {
        Self::default()
    }

    fn push8(&mut self, ram: &mut Ram, value: u8) -> Result<(), VmError> {
        ram.write_page_offset(STACK_PAGE, self.s, value)?;
        self.s = self.s.wrapping_sub(1);
        Ok(())
    }

    fn pop8(&mut self, ram: &Ram) -> u8 {
        self.s = self.s.wrapping_add(1);
        ram.read_page_offset(STACK_PAGE, self.s)
    }

    /// 16-bit pushes write the low byte first, at `S`, then the high byte
    /// at `S-1` (spec.md §4.E, §9): `((uint8_t*)&x)[0]` on a little-endian
    /// host is the low byte.
    fn push16(&mut self, ram: &mut Ram, value: u16) -> Result<(), VmError> {
        let [hi, lo] = value.to_be_bytes();
        self.push8(ram, lo)?;
        self.push8(ram, hi)
    }

    fn pop16(&mut self, ram: &Ram) -> u16 {
        self.s = self.s.wrapping_add(2);
        let hi = ram.read_page_offset(STACK_PAGE, self.s.wrapping_sub(1));
        let lo = ram.read_page_offset(STACK_PAGE, self.s);
        u16::from_be_bytes([hi, lo])
    }

    /// Read the byte at `self.pc + 1` and advance `self.pc` onto it. This is
    /// `GET_NEXT_CHARI` in the original: pre-increment, then read.
    fn fetch(&mut self, rom: &Rom) -> u8 {
        self.pc = self.pc.wrapping_add(1);
        rom.read(self.pc)
    }

    fn fetch_word_be(&mut self, rom: &Rom) -> u16 {
        let hi = self.fetch(rom);
        let lo = self.fetch(rom);
        u16::from_be_bytes([hi, lo])
    }

    /// `P &= 0b10111110` then set `N` (result < 0, clamped to 0) or `Z`
    /// (result == 0) or neither; returns the value to store back (`A`
    /// unchanged on a compare, since callers that don't write back simply
    /// discard it).
    fn apply_flags(&mut self, result: i32) -> u8 {
        self.p &= FLAG_CLEAR_MASK;
        if result < 0 {
            self.p |= FLAG_N;
            0
        } else {
            if result == 0 {
                self.p |= FLAG_Z;
            }
            (result & 0xFF) as u8
        }
    }

    /// `STRC`/`STCS`: write `Y` to `addr` via the RAM write policy, but
    /// divert `b1`/`b2` to the console or the out-buffer when `addr` is one
    /// of the two I/O addresses (spec.md §4.E, §9). Ported from
    /// `K_CPU::executeProgramTick`'s two independent `if`s (not
    /// `if`/`else if`): when `addr == 0xFFFF`, `b1`/`b2` are printed *and*
    /// the RAM write policy still runs against `Y`, which for that same
    /// address also prints `Y` as a character -- a real behavior of the
    /// source, preserved here rather than tidied up.
    fn store_crossed(&mut self, ram: &mut Ram, addr: u16, b1: u8, b2: u8) -> Result<(), VmError> {
        if addr == IO_CONSOLE_OUT {
            let _ = io::stdout().write_all(&[b1, b2]);
        }
        if addr == IO_CONSOLE_BUFFERED_OUT {
            ram.out_buffer_push(b1);
            ram.out_buffer_push(b2);
        } else {
            ram.write(addr, self.y)?;
        }
        Ok(())
    }

    /// Run instructions until a yield (`SYS PRESENT`), a halt (`BRK` or an
    /// invalid opcode), or a fatal RAM error.
    pub fn execute_tick<R: Renderer>(
        &mut self,
        ram: &mut Ram,
        rom: &Rom,
        ppu: &mut Ppu<R>,
        events: &[HostEvent],
    ) -> Result<TickResult, VmError> {
        loop {
            let opcode = rom.read(self.pc);
            trace!("CPU: ${:04X}: opcode 0x{:02X}", self.pc, opcode);
            match opcode {
                // SYS
                0xE2 => {
                    let sub = self.fetch(rom);
                    if let Some(result) = self.dispatch_sys(sub, ram, rom, ppu, events)? {
                        return Ok(result);
                    }
                }
                // SAL
                0x1A => self.s = self.s.wrapping_sub(self.fetch(rom)),
                // DAL
                0x3A => self.s = self.s.wrapping_add(self.fetch(rom)),

                // STRC page, off, b1, b2
                0x89 => {
                    let page = self.fetch(rom);
                    let off = self.fetch(rom);
                    let b1 = self.fetch(rom);
                    let b2 = self.fetch(rom);
                    let addr = u16::from_be_bytes([page, off]);
                    self.store_crossed(ram, addr, b1, b2)?;
                }
                // STCS off, b1, b2
                0xC2 => {
                    let off = self.fetch(rom);
                    let b1 = self.fetch(rom);
                    let b2 = self.fetch(rom);
                    let addr = u16::from_be_bytes([STACK_PAGE, self.s.wrapping_add(off)]);
                    self.store_crossed(ram, addr, b1, b2)?;
                }

                // STY
                0x80 => {
                    let off = self.fetch(rom);
                    ram.write_page_offset(self.abh, off, self.y)?;
                }
                0x8C => {
                    let page = self.fetch(rom);
                    let off = self.fetch(rom);
                    ram.write_page_offset(page, off, self.y)?;
                }
                0xFC => {
                    let off = self.fetch(rom);
                    ram.write_page_offset(STACK_PAGE, self.s.wrapping_add(off), self.y)?;
                }
                // STA
                0x81 => {
                    let off = self.fetch(rom);
                    ram.write_page_offset(self.abh, off, self.a)?;
                }
                0x8D => {
                    let page = self.fetch(rom);
                    let off = self.fetch(rom);
                    ram.write_page_offset(page, off, self.a)?;
                }
                0x1C => {
                    let off = self.fetch(rom);
                    ram.write_page_offset(STACK_PAGE, self.s.wrapping_add(off), self.a)?;
                }
                // STX
                0x82 => {
                    let off = self.fetch(rom);
                    ram.write_page_offset(self.abh, off, self.x)?;
                }
                0x8E => {
                    let page = self.fetch(rom);
                    let off = self.fetch(rom);
                    ram.write_page_offset(page, off, self.x)?;
                }
                0x3C => {
                    let off = self.fetch(rom);
                    ram.write_page_offset(STACK_PAGE, self.s.wrapping_add(off), self.x)?;
                }

                // LDY
                0xB4 => {
                    let off = self.fetch(rom);
                    self.y = ram.read_page_offset(self.abh, off);
                }
                0xAC => {
                    let page = self.fetch(rom);
                    let off = self.fetch(rom);
                    self.y = ram.read_page_offset(page, off);
                }
                0xA0 => self.y = self.fetch(rom),
                0x5C => {
                    let off = self.fetch(rom);
                    self.y = ram.read_page_offset(STACK_PAGE, self.s.wrapping_add(off));
                }
                // LDA
                0xA1 => {
                    let off = self.fetch(rom);
                    self.a = ram.read_page_offset(self.abh, off);
                }
                0xAD => {
                    let page = self.fetch(rom);
                    let off = self.fetch(rom);
                    self.a = ram.read_page_offset(page, off);
                }
                0xA9 => self.a = self.fetch(rom),
                0x7C => {
                    let off = self.fetch(rom);
                    self.a = ram.read_page_offset(STACK_PAGE, self.s.wrapping_add(off));
                }
                // LDX
                0xA2 => {
                    let off = self.fetch(rom);
                    self.x = ram.read_page_offset(self.abh, off);
                }
                0xAE => {
                    let page = self.fetch(rom);
                    let off = self.fetch(rom);
                    self.x = ram.read_page_offset(page, off);
                }
                0xA6 => self.x = self.fetch(rom),
                0xDC => {
                    let off = self.fetch(rom);
                    self.x = ram.read_page_offset(STACK_PAGE, self.s.wrapping_add(off));
                }

                // Transfers
                0xAA => self.x = self.a, // TAX
                0x8A => self.a = self.x, // TXA
                0xA8 => self.y = self.a, // TAY
                0x98 => self.a = self.y, // TYA
                0xBA => self.x = self.s, // TSX
                0x9A => self.s = self.x, // TXS

                // ADCC
                0x69 => {
                    let operand = self.fetch(rom);
                    let result = self.a as i32 + operand as i32;
                    self.a = self.apply_flags(result);
                }
                // ADC abs -- falls through into SBCC in the source (no
                // `break` between the two cases); preserved: every `ADC`
                // also performs a trailing `SBCC` against the byte right
                // after its operand pair.
                0x6D => {
                    let page = self.fetch(rom);
                    let off = self.fetch(rom);
                    let operand = ram.read_page_offset(page, off);
                    let result = self.a as i32 + operand as i32;
                    self.a = self.apply_flags(result);

                    let sbcc_operand = self.fetch(rom);
                    let sbcc_result = self.a as i32 - sbcc_operand as i32;
                    self.a = self.apply_flags(sbcc_result);
                }
                // SBCC
                0xE9 => {
                    let operand = self.fetch(rom);
                    let result = self.a as i32 - operand as i32;
                    self.a = self.apply_flags(result);
                }

                // DEC/INC -- no flags touched (known omission, spec.md §9)
                0xCE => {
                    let page = self.fetch(rom);
                    let off = self.fetch(rom);
                    let value = ram.read_page_offset(page, off).wrapping_sub(1);
                    ram.write_page_offset(page, off, value)?;
                }
                0xCA => self.x = self.x.wrapping_sub(1),
                0x88 => self.y = self.y.wrapping_sub(1),
                0xEE => {
                    let page = self.fetch(rom);
                    let off = self.fetch(rom);
                    let value = ram.read_page_offset(page, off).wrapping_add(1);
                    ram.write_page_offset(page, off, value)?;
                }
                0xE8 => self.x = self.x.wrapping_add(1),
                0xC8 => self.y = self.y.wrapping_add(1),

                // JMPA
                0x4C => {
                    let addr = self.fetch_word_be(rom);
                    self.pc = addr.wrapping_sub(1);
                }
                // JSR
                0x20 => {
                    let addr = self.fetch_word_be(rom);
                    let ret_addr = self.pc.wrapping_add(1);
                    self.push16(ram, ret_addr)?;
                    self.pc = addr.wrapping_sub(1);
                }
                // RTS
                0x60 => {
                    self.pc = self.pop16(ram).wrapping_sub(1);
                }

                // Compares
                0xE0 => {
                    let operand = self.fetch(rom);
                    self.apply_flags(self.x as i32 - operand as i32);
                }
                0xEC => {
                    let page = self.fetch(rom);
                    let off = self.fetch(rom);
                    let operand = ram.read_page_offset(page, off);
                    self.apply_flags(self.x as i32 - operand as i32);
                }
                0xC0 => {
                    let operand = self.fetch(rom);
                    self.apply_flags(self.y as i32 - operand as i32);
                }
                0xCC => {
                    let page = self.fetch(rom);
                    let off = self.fetch(rom);
                    let operand = ram.read_page_offset(page, off);
                    self.apply_flags(self.y as i32 - operand as i32);
                }
                0xC9 => {
                    let operand = self.fetch(rom);
                    self.apply_flags(self.a as i32 - operand as i32);
                }
                0xCD => {
                    let page = self.fetch(rom);
                    let off = self.fetch(rom);
                    let operand = ram.read_page_offset(page, off);
                    self.apply_flags(self.a as i32 - operand as i32);
                }

                // Branches: displacement is consumed, then added to PC,
                // which already points at the displacement byte -- the
                // outer `PC += 1` below lands it one past that byte, i.e.
                // relative to the start of the next instruction.
                0xF0 => {
                    // BEQ
                    let disp = self.fetch(rom) as i8;
                    if self.p & FLAG_Z != 0 {
                        self.pc = self.pc.wrapping_add_signed(disp as i16);
                    }
                }
                0xD0 => {
                    // BNE
                    let disp = self.fetch(rom) as i8;
                    if self.p & FLAG_Z == 0 {
                        self.pc = self.pc.wrapping_add_signed(disp as i16);
                    }
                }
                0x30 => {
                    // BMI
                    let disp = self.fetch(rom) as i8;
                    if self.p & FLAG_N != 0 {
                        self.pc = self.pc.wrapping_add_signed(disp as i16);
                    }
                }
                0x10 => {
                    // BPL
                    let disp = self.fetch(rom) as i8;
                    if self.p & FLAG_N == 0 {
                        self.pc = self.pc.wrapping_add_signed(disp as i16);
                    }
                }

                // BRK
                0x04 => {
                    println!("Program returned with: {}", self.a);
                    return Ok(TickResult::halted(self.a as i32));
                }

                other => {
                    warn!("invalid opcode 0x{:02X} at ${:04X}", other, self.pc);
                    return Ok(TickResult::halted(-1));
                }
            }
            self.pc = self.pc.wrapping_add(1);
        }
    }

    /// Returns `Some(result)` when the tick should end (yield or halt),
    /// `None` to keep running the decode loop.
    #[allow(clippy::too_many_arguments)]
    fn dispatch_sys<R: Renderer>(
        &mut self,
        sub: u8,
        ram: &mut Ram,
        rom: &Rom,
        ppu: &mut Ppu<R>,
        events: &[HostEvent],
    ) -> Result<Option<TickResult>, VmError> {
        match sub {
            // DUMP
            0x01 => {
                let buf = ram.out_buffer_take();
                let _ = io::stdout().write_all(&buf);
            }
            // WAIT
            0x02 => {
                let buf = ram.out_buffer_take();
                let mut bytes = [0u8; 4];
                let n = buf.len().min(4);
                bytes[..n].copy_from_slice(&buf[..n]);
                let millis = i32::from_le_bytes(bytes).max(0) as u64;
                std::thread::sleep(Duration::from_millis(millis));
            }
            // PRESENT -- the cooperative yield point.
            0x07 => {
                self.pc = self.pc.wrapping_add(1);
                return Ok(Some(TickResult::yielded()));
            }
            // GFX
            0x08 => {
                let buf = ram.out_buffer_take();
                self.dispatch_gfx(&buf, rom, ppu)?;
            }
            // SET_END_PROC
            0x09 => {
                let buf = ram.out_buffer_take();
                if buf.len() >= 2 {
                    self.ending_proc = u16::from_be_bytes([buf[0], buf[1]]);
                }
            }
            // SET_WINDOW_PROC
            0x0D => {
                let buf = ram.out_buffer_take();
                if buf.len() >= 2 {
                    self.window_proc = u16::from_be_bytes([buf[0], buf[1]]);
                }
            }
            // PRINT_ROM_STRING
            0x0A => {
                let buf = ram.out_buffer_take();
                if buf.len() >= 2 {
                    let mut addr = u16::from_be_bytes([buf[0], buf[1]]);
                    loop {
                        let byte = rom.read(addr);
                        if byte == 0 {
                            break;
                        }
                        let _ = io::stdout().write_all(&[byte]);
                        addr = addr.wrapping_add(1);
                    }
                }
            }
            // PRINT_STACK_STRING
            0x0C => {
                let buf = ram.out_buffer_take();
                if buf.len() >= 2 {
                    let page = buf[0];
                    let mut addr = (page as u16) << 8;
                    addr = addr.wrapping_add(self.s as u16 + buf[1] as u16);
                    loop {
                        let byte = ram.read(addr);
                        if byte == 0 {
                            break;
                        }
                        let _ = io::stdout().write_all(&[byte]);
                        addr = addr.wrapping_sub(1);
                    }
                }
            }
            // KEY_QUERY
            0x0B => {
                let buf = ram.out_buffer_take();
                let key = buf.first().copied().unwrap_or(0);
                let scancode = match key {
                    b'a'..=b'z' => key.wrapping_sub(93),
                    b'A'..=b'Z' => key.wrapping_sub(61),
                    other => other,
                };
                let pressed = events
                    .iter()
                    .any(|e| matches!(e, HostEvent::KeyDown(s) if *s == scancode));
                self.a = pressed as u8;
            }
            other => {
                error!("Invalid System Call: 0x{other:02X}");
            }
        }
        Ok(None)
    }

    /// `Err` here is fatal: an unsupported LOAD_TEX color mode must
    /// propagate all the way out through `dispatch_sys`/`execute_tick` to
    /// terminate the process, matching `VM_CPU.hpp`'s `exit(-1)` on the same
    /// branch -- unlike every other GFX sub-op fault here, which is only
    /// logged.
    fn dispatch_gfx<R: Renderer>(&mut self, buf: &[u8], rom: &Rom, ppu: &mut Ppu<R>) -> Result<(), VmError> {
        let Some(&sub) = buf.first() else { return Ok(()) };
        match sub {
            // BG_COLOR
            0x01 if buf.len() >= 4 => ppu.color_background(buf[1], buf[2], buf[3]),
            // TILE_RGB
            0x02 if buf.len() >= 6 => ppu.draw_tile(buf[1], buf[2], buf[3], buf[4], buf[5]),
            // PIXEL_RGB
            0x03 if buf.len() >= 6 => ppu.draw_pixel(buf[1], buf[2], buf[3], buf[4], buf[5]),
            // LOAD_TEX
            0x04 if buf.len() >= 3 => {
                let addr = u16::from_be_bytes([buf[1], buf[2]]);
                let w = rom.read(addr);
                let h = rom.read(addr.wrapping_add(1));
                let size = rom.read(addr.wrapping_add(2));
                let color_format = rom.read(addr.wrapping_add(3));
                let packed_len = (w as usize * h as usize) / 4;
                let raw: Vec<u8> = (0..packed_len)
                    .map(|i| rom.read(addr.wrapping_add(4 + i as u16)))
                    .collect();
                ppu.load_texture(w, h, size, color_format, &raw)?;
            }
            // DRAW_TEX
            0x05 if buf.len() >= 5 => ppu.draw_texture(buf[1], buf[2], buf[3], buf[4]),
            // LOAD_PAL
            0x06 if buf.len() >= 3 => {
                let addr = u16::from_be_bytes([buf[1], buf[2]]);
                let count = rom.read(addr);
                let data: Vec<u8> = (0..3 * count as usize)
                    .map(|i| rom.read(addr.wrapping_add(1 + i as u16)))
                    .collect();
                match ppu.load_palette(count, &data) {
                    Ok(id) => self.a = id as u8,
                    Err(e) => error!("Invalid Graphics Call: {e}"),
                }
            }
            _ => {
                error!("Invalid Graphics Call: 0x{sub:02X}");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::TestRenderer;

    fn harness() -> (Cpu, Ram, Ppu<TestRenderer>) {
        (Cpu::new(), Ram::new(0x10000), Ppu::new(TestRenderer::new()))
    }

    fn run(cpu: &mut Cpu, ram: &mut Ram, rom: &Rom, ppu: &mut Ppu<TestRenderer>) -> TickResult {
        cpu.execute_tick(ram, rom, ppu, &[]).unwrap()
    }

    #[test]
    fn hello_world_scenario_s1() {
        let (mut cpu, mut ram, mut ppu) = harness();
        // LDAC 72; STRC 0xFF 0xFE 'e' 'l'; STRC 0xFF 0xFE 'l' 'o'; SYS 0x01; BRK;
        let rom = Rom::from_bytes(vec![
            0xA9, 72, 0x89, 0xFF, 0xFE, b'e', b'l', 0x89, 0xFF, 0xFE, b'l', b'o', 0xE2, 0x01,
            0x04,
        ]);
        let result = run(&mut cpu, &mut ram, &rom, &mut ppu);
        assert_eq!(result, TickResult::halted(72));
    }

    #[test]
    fn loop_count_scenario_s2() {
        let (mut cpu, mut ram, mut ppu) = harness();
        // LDXC 0; LABEL loop: INX; CPXC 5; BNE -5 (back to INX); BRK
        let rom = Rom::from_bytes(vec![
            0xA6, 0x00, // 0: LDXC 0
            0xE8, // 2: INX
            0xE0, 0x05, // 3: CPXC 5
            0xD0, (-5i8) as u8, // 5: BNE -5, back to INX at offset 2
            0x04, // 7: BRK
        ]);
        let result = run(&mut cpu, &mut ram, &rom, &mut ppu);
        assert_eq!(result, TickResult::halted(0));
        assert_eq!(cpu.x, 5);
    }

    #[test]
    fn subroutine_scenario_s3() {
        let (mut cpu, mut ram, mut ppu) = harness();
        // JSR sub; BRK; LABEL sub: LDAC 7; RTS
        let rom = Rom::from_bytes(vec![
            0x20, 0x00, 0x05, // 0: JSR 0x0005
            0x04, // 3: BRK
            0xFF, // 4: padding (never reached directly)
            0xA9, 7, // 5: LDAC 7
            0x60, // 7: RTS
        ]);
        let result = run(&mut cpu, &mut ram, &rom, &mut ppu);
        assert_eq!(result, TickResult::halted(7));
    }

    #[test]
    fn background_fill_scenario_s4() {
        let (mut cpu, mut ram, mut ppu) = harness();
        ram.out_buffer_push(0x01);
        ram.out_buffer_push(10);
        ram.out_buffer_push(20);
        ram.out_buffer_push(30);
        // SYS 0x08 (GFX); SYS 0x07 (PRESENT); BRK
        let rom = Rom::from_bytes(vec![0xE2, 0x08, 0xE2, 0x07, 0x04]);
        let result = run(&mut cpu, &mut ram, &rom, &mut ppu);
        assert_eq!(result, TickResult::yielded());
        assert_eq!(ppu.renderer.cleared, vec![crate::renderer::Rgb { r: 10, g: 20, b: 30 }]);
    }

    #[test]
    fn invalid_texture_color_format_is_fatal() {
        let (mut cpu, mut ram, mut ppu) = harness();
        ram.out_buffer_push(0x04); // LOAD_TEX
        ram.out_buffer_push(0x00);
        ram.out_buffer_push(0x05); // texture header at ROM address 5
        // SYS 0x08 (GFX); header: w=2 h=2 size=1 color_format=99 (invalid)
        let rom = Rom::from_bytes(vec![0xE2, 0x08, 0x00, 0xFF, 0xFF, 2, 2, 1, 99, 0xFF]);
        let err = cpu.execute_tick(&mut ram, &rom, &mut ppu, &[]).unwrap_err();
        assert!(matches!(err, VmError::InvalidTextureFormat(99)));
    }

    #[test]
    fn keypress_scenario_s6() {
        let (mut cpu, mut ram, mut ppu) = harness();
        ram.out_buffer_push(b'a');
        let rom = Rom::from_bytes(vec![0xE2, 0x0B]);
        cpu.execute_tick(&mut ram, &rom, &mut ppu, &[HostEvent::KeyDown(4)]).unwrap();
        assert_eq!(cpu.a, 1);

        let mut cpu2 = Cpu::new();
        let mut ram2 = Ram::new(0x10000);
        ram2.out_buffer_push(b'a');
        cpu2.execute_tick(&mut ram2, &rom, &mut ppu, &[]).unwrap();
        assert_eq!(cpu2.a, 0);
    }

    #[test]
    fn jsr_rts_returns_past_the_three_byte_instruction() {
        let (mut cpu, mut ram, mut ppu) = harness();
        let rom = Rom::from_bytes(vec![
            0x20, 0x00, 0x04, // 0: JSR 0x0004
            0x04, // 3: BRK (never reached this way if RTS lands right)
            0x60, // 4: RTS
        ]);
        let _ = run(&mut cpu, &mut ram, &rom, &mut ppu);
        // RTS at 4 pops ret_addr=3, sets PC=3-1=2, outer PC++ -> 3 (BRK).
        // Running again from pc 0 already consumed BRK in `run`; instead
        // verify pc lands on the BRK byte by checking the halted return.
        assert_eq!(cpu.pc, 3);
    }

    #[test]
    fn cmpc_flag_law() {
        let (mut cpu, mut ram, mut ppu) = harness();
        cpu.a = 5;
        let rom = Rom::from_bytes(vec![0xC9, 5, 0x04]);
        run(&mut cpu, &mut ram, &rom, &mut ppu);
        assert_ne!(cpu.p & FLAG_Z, 0);
        assert_eq!(cpu.p & FLAG_N, 0);
    }

    #[test]
    fn adcc_zero_sets_z_never_n_and_leaves_a_unchanged() {
        let (mut cpu, mut ram, mut ppu) = harness();
        cpu.a = 0;
        let rom = Rom::from_bytes(vec![0x69, 0, 0x04]);
        run(&mut cpu, &mut ram, &rom, &mut ppu);
        assert_ne!(cpu.p & FLAG_Z, 0);
        assert_eq!(cpu.p & FLAG_N, 0);
        assert_eq!(cpu.a, 0);
    }

    #[test]
    fn stack_round_trip_8_and_16_bit() {
        let (mut cpu, mut ram, _ppu) = harness();
        cpu.push8(&mut ram, 0x42).unwrap();
        assert_eq!(cpu.pop8(&ram), 0x42);
        assert_eq!(cpu.s, 0xFF);

        cpu.push16(&mut ram, 0xBEEF).unwrap();
        assert_eq!(cpu.pop16(&ram), 0xBEEF);
        assert_eq!(cpu.s, 0xFF);
    }

    #[test]
    fn strc_to_console_out_prints_literals_and_then_y_via_ram_policy() {
        let (mut cpu, mut ram, mut ppu) = harness();
        cpu.y = b'Z';
        // STRC 0xFF 0xFF b1 b2; BRK
        let rom = Rom::from_bytes(vec![0x89, 0xFF, 0xFF, b'X', b'Y', 0x04]);
        run(&mut cpu, &mut ram, &rom, &mut ppu);
        // Nothing observable through RAM (0xFFFF is never backing memory);
        // this mainly documents that the call does not error.
        assert_eq!(ram.read(0xFFFF), 0);
    }

    #[test]
    fn invalid_opcode_halts_with_negative_one() {
        let (mut cpu, mut ram, mut ppu) = harness();
        let rom = Rom::from_bytes(vec![0xFF]);
        let result = run(&mut cpu, &mut ram, &rom, &mut ppu);
        assert_eq!(result, TickResult::halted(-1));
    }
}
