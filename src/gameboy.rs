//! Composition root: one CPU, one bus full of devices, and the entry
//! points a frontend drives.

use std::collections::HashSet;
use std::io;
use std::path::Path;

use crate::bus::{BootRomError, Bus};
use crate::cartridge::{Cartridge, CartridgeError};
use crate::cpu::Cpu;
use crate::input::Button;
use crate::isa::{self, Instruction};
use crate::ppu::{SCREEN_HEIGHT, SCREEN_WIDTH};
use crate::registers::Registers;

// 154 lines of 456 dots.
const FRAME_CYCLES: u32 = 70_224;

pub struct GameBoy {
    pub cpu: Cpu,
    pub bus: Bus,
    breakpoints: HashSet<u16>,
}

impl GameBoy {
    pub fn new() -> Self {
        let mut gb = Self {
            cpu: Cpu::new(),
            bus: Bus::new(),
            breakpoints: HashSet::new(),
        };
        gb.reset();
        gb
    }

    /// Replace the cartridge image wholesale and restart the machine.
    pub fn load_cartridge(&mut self, data: Vec<u8>) -> Result<(), CartridgeError> {
        let cart = Cartridge::load(data)?;
        self.bus.load_cartridge(cart);
        self.reset();
        Ok(())
    }

    /// Load a cartridge from disk, picking up battery-backed sidecar files.
    pub fn load_cartridge_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), CartridgeError> {
        let cart = Cartridge::from_file(path)?;
        self.bus.load_cartridge(cart);
        self.reset();
        Ok(())
    }

    pub fn load_boot_rom(&mut self, image: &[u8]) -> Result<(), BootRomError> {
        self.bus.load_boot_rom(image.to_vec())
    }

    /// Return to power-on state, keeping the loaded cartridge and boot
    /// image. Without a boot overlay the CPU and pipeline are seeded with
    /// the state the boot ROM would have left behind.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.bus.reset();
        if !self.bus.boot.is_mapped() {
            self.cpu.apply_post_boot_state();
            self.bus.ppu.apply_boot_state();
        }
    }

    /// Run one instruction (or interrupt entry) and advance every device
    /// by its cycle cost.
    pub fn step(&mut self) -> u32 {
        let cycles = self.cpu.execute(&mut self.bus);
        self.bus.tick(cycles);
        cycles
    }

    /// Step until the pipeline publishes a frame, or until a frame's
    /// worth of cycles has passed when it cannot (LCD switched off), so
    /// frontends keep their pacing and audio keeps flowing. Returns false
    /// if a breakpoint was hit first; the breakpoint check happens before
    /// each step, so `step` can be used to move past it.
    pub fn run_frame(&mut self) -> bool {
        self.bus.ppu.clear_frame_flag();
        let mut elapsed = 0;
        while !self.bus.ppu.frame_ready() {
            if self.breakpoints.contains(&self.cpu.regs.pc) {
                return false;
            }
            elapsed += self.step();
            if elapsed >= FRAME_CYCLES {
                break;
            }
        }
        true
    }

    pub fn button_down(&mut self, button: Button) {
        self.bus.joypad.press(button, &mut self.bus.interrupts);
        // A button press is the only way out of STOP short of a reset.
        self.cpu.stopped = false;
    }

    pub fn button_up(&mut self, button: Button) {
        self.bus.joypad.release(button);
    }

    pub fn is_pressed(&self, button: Button) -> bool {
        self.bus.joypad.is_pressed(button)
    }

    pub fn add_breakpoint(&mut self, addr: u16) {
        self.breakpoints.insert(addr);
    }

    pub fn remove_breakpoint(&mut self, addr: u16) {
        self.breakpoints.remove(&addr);
    }

    pub fn breakpoints(&self) -> &HashSet<u16> {
        &self.breakpoints
    }

    /// Raw bus read for inspection tooling. Device reads are pure, so this
    /// never perturbs emulation state.
    pub fn read_byte(&self, addr: u16) -> u8 {
        self.bus.read(addr)
    }

    pub fn write_byte(&mut self, addr: u16, val: u8) {
        self.bus.write(addr, val);
    }

    pub fn registers(&self) -> Registers {
        self.cpu.regs
    }

    /// Decode the instruction at PC along with the raw bytes under it.
    pub fn current_instruction(&self) -> (Instruction, [u8; 3]) {
        let pc = self.cpu.regs.pc;
        let bytes = [
            self.bus.read(pc),
            self.bus.read(pc.wrapping_add(1)),
            self.bus.read(pc.wrapping_add(2)),
        ];
        let inst = if bytes[0] == 0xCB {
            isa::decode_extended(bytes[1])
        } else {
            isa::decode(bytes[0])
        };
        (inst, bytes)
    }

    pub fn frame(&self) -> &[u32; SCREEN_WIDTH * SCREEN_HEIGHT] {
        self.bus.ppu.framebuffer()
    }

    pub fn frame_count(&self) -> u64 {
        self.bus.ppu.frames()
    }

    /// Read-and-clear the frame flag, for frontends that drive `step`
    /// directly instead of `run_frame`.
    pub fn take_frame(&mut self) -> bool {
        let ready = self.bus.ppu.frame_ready();
        self.bus.ppu.clear_frame_flag();
        ready
    }

    pub fn set_sample_rate(&mut self, rate: u32) {
        self.bus.apu.set_sample_rate(rate);
    }

    /// Drain queued stereo samples into `out` (interleaved L/R); any
    /// shortfall is zero-filled. Returns the frames actually produced.
    pub fn drain_audio(&mut self, out: &mut [f32]) -> usize {
        self.bus.apu.drain_samples(out)
    }

    pub fn take_serial_output(&mut self) -> Vec<u8> {
        self.bus.serial.take_output()
    }

    /// Flush battery-backed RAM (and RTC state) to the sidecar files, when
    /// the cartridge was loaded from disk.
    pub fn save_ram(&mut self) -> io::Result<()> {
        self.bus.cart.save_ram()
    }
}

impl Default for GameBoy {
    fn default() -> Self {
        Self::new()
    }
}
