//! Whole-machine scenarios: small programs run from cartridge ROM with the
//! results observed through the debug surface.

use std::fs;

use dotboy_core::gameboy::GameBoy;
use dotboy_core::input::Button;
use tempfile::tempdir;

/// Flat 32KB image with `program` placed at the entry point.
fn rom_with_program(program: &[u8]) -> Vec<u8> {
    let mut rom = vec![0u8; 0x8000];
    rom[0x0100..0x0100 + program.len()].copy_from_slice(program);
    rom
}

#[test]
fn timer_interrupt_lands_on_its_vector() {
    let program = [
        0x3E, 0x04, // LD A,0x04
        0xE0, 0xFF, // LDH (IE),A
        0x3E, 0x05, // LD A,0x05
        0xE0, 0x07, // LDH (TAC),A
        0xFB, // EI
        0x76, // HALT
        0x18, 0xFE, // JR -2
    ];
    let mut gb = GameBoy::new();
    gb.load_cartridge(rom_with_program(&program)).unwrap();
    gb.add_breakpoint(0x0050);

    assert!(!gb.run_frame());
    let regs = gb.registers();
    assert_eq!(regs.pc, 0x0050);
    assert_eq!(regs.sp, 0xFFFC);

    // The address after HALT was stacked for the eventual RETI.
    let stacked = gb.read_byte(0xFFFC) as u16 | (gb.read_byte(0xFFFD) as u16) << 8;
    assert_eq!(stacked, 0x010A);

    // Dispatch consumed the pending bit but left the enable mask alone.
    assert_eq!(gb.read_byte(0xFF0F) & 0x04, 0);
    assert_eq!(gb.read_byte(0xFFFF), 0x04);
}

#[test]
fn vblank_interrupt_lands_on_its_vector() {
    let program = [
        0x3E, 0x01, // LD A,0x01
        0xE0, 0xFF, // LDH (IE),A
        0xFB, // EI
        0x18, 0xFE, // JR -2
    ];
    let mut gb = GameBoy::new();
    gb.load_cartridge(rom_with_program(&program)).unwrap();
    gb.add_breakpoint(0x0040);

    assert!(!gb.run_frame());
    assert_eq!(gb.registers().pc, 0x0040);
    assert_eq!(gb.frame_count(), 0);
}

#[test]
fn serial_transfer_completes_and_is_captured() {
    let program = [
        0x3E, 0x47, // LD A,'G'
        0xE0, 0x01, // LDH (SB),A
        0x3E, 0x81, // LD A,0x81
        0xE0, 0x02, // LDH (SC),A
        0x18, 0xFE, // JR -2
    ];
    let mut gb = GameBoy::new();
    gb.load_cartridge(rom_with_program(&program)).unwrap();

    assert!(gb.run_frame());
    assert_eq!(gb.take_serial_output(), vec![0x47]);
    assert!(gb.take_serial_output().is_empty());
    assert_eq!(gb.read_byte(0xFF02), 0x7F);
    assert_ne!(gb.read_byte(0xFF0F) & 0x08, 0);
}

#[test]
fn buttons_read_back_through_the_matrix() {
    let mut gb = GameBoy::new();
    gb.button_down(Button::Start);
    assert!(gb.is_pressed(Button::Start));

    gb.write_byte(0xFF00, 0x10); // select the button group
    assert_eq!(gb.read_byte(0xFF00), 0xD7);

    gb.button_up(Button::Start);
    assert!(!gb.is_pressed(Button::Start));
    assert_eq!(gb.read_byte(0xFF00), 0xDF);
}

#[test]
fn audio_accumulates_at_the_requested_rate() {
    let mut gb = GameBoy::new();
    gb.load_cartridge(rom_with_program(&[0x18, 0xFE])).unwrap();
    gb.set_sample_rate(32768);

    assert!(gb.run_frame());

    // One sample every 128 cycles over a 70224-cycle frame.
    let mut out = [0.0f32; 1600];
    assert_eq!(gb.drain_audio(&mut out), 548);
}

#[test]
fn battery_save_flows_through_the_facade() {
    let dir = tempdir().unwrap();
    let rom_path = dir.path().join("save.gb");
    let mut rom = vec![0u8; 0x8000];
    rom[0x0147] = 0x03; // MBC1 + RAM + Battery
    rom[0x0149] = 0x03; // 32KB RAM
    fs::write(&rom_path, &rom).unwrap();

    let mut gb = GameBoy::new();
    gb.load_cartridge_file(&rom_path).unwrap();
    gb.write_byte(0x0000, 0x0A); // enable RAM
    gb.write_byte(0xA000, 0x5A);
    gb.save_ram().unwrap();

    let data = fs::read(rom_path.with_extension("sav")).unwrap();
    assert_eq!(data[0], 0x5A);
}
