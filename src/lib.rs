//! Cycle-granular Game Boy (DMG) emulation core.
//!
//! This crate contains the platform-agnostic emulator logic (CPU, bus,
//! cartridge mappers, PPU, APU, timer and friends). Frontends drive it
//! through the [`gameboy`] facade: load a cartridge, pump frames, drain
//! audio, feed input.

/// Audio engine: four channel state machines, frame sequencer, mixer.
pub mod apu;

/// Bounded stereo sample queue between the audio engine and the host.
pub mod audio_queue;

/// Address-space dispatch, boot overlay, work/high RAM, OAM DMA.
pub mod bus;

/// Cartridge mappers (MBC) and ROM/RAM/RTC handling.
pub mod cartridge;

/// SM83 CPU core.
pub mod cpu;

/// High-level facade that wires the CPU and bus into a single machine.
pub mod gameboy;

/// Joypad input register and edge-triggered interrupt behavior.
pub mod input;

/// IF/IE interrupt pair and dispatch priority.
pub mod interrupts;

/// Instruction descriptors and opcode decoding.
pub mod isa;

/// Pixel pipeline: scanline state machine and compositor.
pub mod ppu;

/// CPU register file.
pub mod registers;

/// Serial unit and link cable plumbing.
pub mod serial;

/// Divider/timer unit.
pub mod timer;
