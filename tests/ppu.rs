//! Scanline machine and renderer checks driven through the register file.

use dotboy_core::bus::BusDevice;
use dotboy_core::interrupts::{Interrupt, InterruptController};
use dotboy_core::ppu::{
    DMG_PALETTE, MODE_HBLANK, MODE_OAM, MODE_TRANSFER, MODE_VBLANK, Ppu, SCREEN_WIDTH,
};

const LINE_CYCLES: u32 = 456;

/// LCD switched on with the given LCDC value and an identity background
/// palette (color N maps to shade N).
fn ppu_on(lcdc: u8) -> (Ppu, InterruptController) {
    let mut ppu = Ppu::new();
    ppu.write(0xFF40, lcdc);
    ppu.write(0xFF47, 0xE4);
    (ppu, InterruptController::new())
}

fn fill_tile(ppu: &mut Ppu, tile: u16, byte: u8) {
    for i in 0..16 {
        ppu.write(0x8000 + tile * 16 + i, byte);
    }
}

#[test]
fn scanline_steps_through_the_three_visible_modes() {
    let (mut ppu, mut ic) = ppu_on(0x91);
    assert_eq!(ppu.read(0xFF41), 0x86); // OAM scan, LY == LYC == 0

    ppu.tick(80, &mut ic);
    assert_eq!(ppu.mode, MODE_TRANSFER);

    ppu.tick(172, &mut ic);
    assert_eq!(ppu.mode, MODE_HBLANK);

    ppu.tick(204, &mut ic);
    assert_eq!(ppu.mode, MODE_OAM);
    assert_eq!(ppu.read(0xFF44), 1);

    // LY is read-only.
    ppu.write(0xFF44, 0x55);
    assert_eq!(ppu.read(0xFF44), 1);
}

#[test]
fn vblank_begins_at_line_144() {
    let (mut ppu, mut ic) = ppu_on(0x91);
    ppu.tick(LINE_CYCLES * 144, &mut ic);

    assert_eq!(ppu.read(0xFF44), 144);
    assert_eq!(ppu.mode, MODE_VBLANK);
    assert_ne!(ic.if_reg & Interrupt::VBlank.mask(), 0);
    assert!(!ppu.frame_ready());
}

#[test]
fn frame_flag_rises_at_the_wrap_to_line_zero() {
    let (mut ppu, mut ic) = ppu_on(0x91);
    ppu.tick(LINE_CYCLES * 154, &mut ic);

    assert_eq!(ppu.read(0xFF44), 0);
    assert_eq!(ppu.mode, MODE_OAM);
    assert!(ppu.frame_ready());
    assert_eq!(ppu.frames(), 1);

    ppu.clear_frame_flag();
    assert!(!ppu.frame_ready());
    assert_eq!(ppu.frames(), 1);
}

#[test]
fn lyc_match_requests_a_stat_interrupt() {
    let (mut ppu, mut ic) = ppu_on(0x91);
    ppu.write(0xFF45, 40);
    ppu.write(0xFF41, 0x40); // coincidence source only

    ppu.tick(LINE_CYCLES * 39, &mut ic);
    assert_eq!(ic.if_reg & Interrupt::Stat.mask(), 0);

    ppu.tick(LINE_CYCLES, &mut ic);
    assert_eq!(ppu.read(0xFF44), 40);
    assert_ne!(ppu.read(0xFF41) & 0x04, 0);
    assert_ne!(ic.if_reg & Interrupt::Stat.mask(), 0);

    // The line stays high for the rest of the scanline; no retrigger.
    ic.if_reg = 0;
    ppu.tick(200, &mut ic);
    assert_eq!(ic.if_reg & Interrupt::Stat.mask(), 0);
}

#[test]
fn hblank_mode_source_requests_stat() {
    let (mut ppu, mut ic) = ppu_on(0x91);
    ppu.write(0xFF41, 0x08);

    ppu.tick(80 + 172, &mut ic);
    assert_eq!(ppu.mode, MODE_HBLANK);
    assert_ne!(ic.if_reg & Interrupt::Stat.mask(), 0);
}

#[test]
fn disabling_the_lcd_blanks_and_holds_line_zero() {
    let (mut ppu, mut ic) = ppu_on(0x91);
    fill_tile(&mut ppu, 0, 0xFF);
    ppu.tick(LINE_CYCLES * 154, &mut ic);
    assert_eq!(ppu.framebuffer()[0], DMG_PALETTE[3]);

    ppu.write(0xFF40, 0x11);
    assert_eq!(ppu.framebuffer()[0], DMG_PALETTE[0]);
    assert_eq!(ppu.framebuffer()[SCREEN_WIDTH * 80 + 80], DMG_PALETTE[0]);
    assert_eq!(ppu.read(0xFF44), 0);

    ppu.tick(10_000, &mut ic);
    assert_eq!(ppu.read(0xFF44), 0);
    assert_eq!(ppu.read(0xFF41) & 0x03, 0);
}

#[test]
fn solid_background_tile_floods_the_framebuffer() {
    let (mut ppu, mut ic) = ppu_on(0x91);
    // Map 0 is all zeroes, so every cell names tile 0. Make it solid
    // color 3.
    fill_tile(&mut ppu, 0, 0xFF);

    ppu.tick(LINE_CYCLES * 154, &mut ic);

    let fb = ppu.framebuffer();
    assert_eq!(fb[0], DMG_PALETTE[3]);
    assert_eq!(fb[SCREEN_WIDTH * 72 + 80], DMG_PALETTE[3]);
    assert_eq!(fb[SCREEN_WIDTH * 144 - 1], DMG_PALETTE[3]);
}

#[test]
fn sprites_cover_color_zero_background() {
    let (mut ppu, mut ic) = ppu_on(0x93);
    fill_tile(&mut ppu, 1, 0xFF);
    ppu.write(0xFF48, 0xE4);

    // One sprite in the top-left corner.
    ppu.write(0xFE00, 16);
    ppu.write(0xFE01, 8);
    ppu.write(0xFE02, 1);
    ppu.write(0xFE03, 0);

    ppu.tick(LINE_CYCLES, &mut ic);

    let fb = ppu.framebuffer();
    assert_eq!(fb[0], DMG_PALETTE[3]);
    assert_eq!(fb[7], DMG_PALETTE[3]);
    assert_eq!(fb[8], DMG_PALETTE[0]);
}

#[test]
fn behind_flag_yields_to_opaque_background() {
    let (mut ppu, mut ic) = ppu_on(0x93);
    fill_tile(&mut ppu, 0, 0xFF); // background is solid color 3
    fill_tile(&mut ppu, 1, 0xFF);
    ppu.write(0xFF47, 0xFF); // background renders darkest
    ppu.write(0xFF48, 0x00); // a drawn sprite renders lightest

    // Behind-background sprite at column 0, normal sprite at column 16.
    for (slot, x, flags) in [(0u16, 8u8, 0x80u8), (1, 24, 0x00)] {
        let base = 0xFE00 + slot * 4;
        ppu.write(base, 16);
        ppu.write(base + 1, x);
        ppu.write(base + 2, 1);
        ppu.write(base + 3, flags);
    }

    ppu.tick(LINE_CYCLES, &mut ic);

    let fb = ppu.framebuffer();
    assert_eq!(fb[0], DMG_PALETTE[3]);
    assert_eq!(fb[16], DMG_PALETTE[0]);
}

#[test]
fn window_tracks_its_own_line_counter() {
    let (mut ppu, mut ic) = ppu_on(0xF1);
    fill_tile(&mut ppu, 1, 0xFF);
    ppu.write(0x9C00, 0x01); // window map cell 0 names the solid tile
    ppu.write(0xFF4B, 7); // WX: window starts at column 0

    ppu.tick(LINE_CYCLES * 10, &mut ic);

    assert_eq!(ppu.window_line_counter(), 10);
    let fb = ppu.framebuffer();
    assert_eq!(fb[0], DMG_PALETTE[3]);
    assert_eq!(fb[8], DMG_PALETTE[0]);
}

#[test]
fn per_line_sprite_limit_drops_the_eleventh() {
    let (mut ppu, mut ic) = ppu_on(0x93);
    fill_tile(&mut ppu, 1, 0xFF);
    ppu.write(0xFF48, 0xE4);

    // Eleven sprites on line 0, eight pixels apart.
    for i in 0..11u16 {
        let base = 0xFE00 + i * 4;
        ppu.write(base, 16);
        ppu.write(base + 1, 8 + 8 * i as u8);
        ppu.write(base + 2, 1);
        ppu.write(base + 3, 0);
    }

    ppu.tick(LINE_CYCLES, &mut ic);

    let fb = ppu.framebuffer();
    assert_eq!(fb[40], DMG_PALETTE[3]);
    assert_eq!(fb[72], DMG_PALETTE[3]);
    // The eleventh sprite lost the scan and its columns stay background.
    assert_eq!(fb[80], DMG_PALETTE[0]);
}
