use std::fs;

use dotboy_core::bus::BusDevice;
use dotboy_core::cartridge::{Cartridge, MapperKind, ROM_BANK_SIZE};
use tempfile::tempdir;

const CYCLES_PER_SECOND: u32 = 4_194_304;

/// ROM image with a marker byte at the start of every bank.
fn rom_image(cart_type: u8, ram_code: u8, banks: usize) -> Vec<u8> {
    let mut rom = vec![0u8; banks * ROM_BANK_SIZE];
    rom[0x0147] = cart_type;
    rom[0x0148] = match banks {
        2 => 0x00,
        4 => 0x01,
        _ => 0x02,
    };
    rom[0x0149] = ram_code;
    for bank in 0..banks {
        rom[bank * ROM_BANK_SIZE] = bank as u8;
    }
    rom
}

#[test]
fn mbc1_moves_the_switchable_window() {
    let mut cart = Cartridge::load(rom_image(0x01, 0x00, 35)).unwrap();
    assert_eq!(cart.mapper, MapperKind::Mbc1);

    assert_eq!(cart.read(0x4000), 1);

    cart.write(0x2000, 0x02);
    assert_eq!(cart.read(0x4000), 2);

    cart.write(0x4000, 0x01); // secondary register: high bits -> bank 0x22
    assert_eq!(cart.read(0x4000), 34);

    cart.write(0x6000, 0x01); // advanced mode re-banks the fixed window too
    assert_eq!(cart.read(0x0000), 32);
}

#[test]
fn mbc1_never_maps_bank_zero_in_the_switchable_window() {
    let mut cart = Cartridge::load(rom_image(0x01, 0x00, 4)).unwrap();

    cart.write(0x2000, 0x00);
    assert_eq!(cart.read(0x4000), 1);

    // 0x20 masks down to zero in the 5-bit register and snaps to one.
    cart.write(0x2000, 0x20);
    assert_eq!(cart.read(0x4000), 1);
}

#[test]
fn mbc1_ram_gate_requires_the_magic_nibble() {
    let mut cart = Cartridge::load(rom_image(0x03, 0x03, 2)).unwrap();

    cart.write(0xA000, 0x55);
    assert_eq!(cart.read(0xA000), 0xFF);

    cart.write(0x0000, 0x0A);
    cart.write(0xA000, 0x55);
    assert_eq!(cart.read(0xA000), 0x55);

    // Only the low nibble is compared.
    cart.write(0x0000, 0x1A);
    assert_eq!(cart.read(0xA000), 0x55);

    cart.write(0x0000, 0x0B);
    assert_eq!(cart.read(0xA000), 0xFF);
}

#[test]
fn mbc1_advanced_mode_banks_the_ram_window() {
    let mut cart = Cartridge::load(rom_image(0x03, 0x03, 2)).unwrap();
    cart.write(0x0000, 0x0A);
    cart.write(0xA000, 0x11);

    cart.write(0x6000, 0x01);
    cart.write(0x4000, 0x01); // RAM bank 1
    assert_eq!(cart.read(0xA000), 0x00);
    cart.write(0xA000, 0x22);

    cart.write(0x4000, 0x00);
    assert_eq!(cart.read(0xA000), 0x11);

    // Simple mode pins the window to bank 0 whatever the register holds.
    cart.write(0x4000, 0x01);
    cart.write(0x6000, 0x00);
    assert_eq!(cart.read(0xA000), 0x11);
}

#[test]
fn multicart_narrows_the_primary_register() {
    let mut rom = rom_image(0x01, 0x00, 64);
    rom[0x0104] = 0xCE;
    rom[0x0105] = 0xED;

    // Without the mirrored probe this is an ordinary MBC1.
    let mut plain = Cartridge::load(rom.clone()).unwrap();
    plain.write(0x2000, 0x1F);
    assert_eq!(plain.read(0x4000), 31);

    rom[15 * ROM_BANK_SIZE + 0x0104] = 0xCE;
    rom[15 * ROM_BANK_SIZE + 0x0105] = 0xED;
    let mut cart = Cartridge::load(rom).unwrap();

    // The primary register is wired 4 bits wide on compilation boards.
    cart.write(0x2000, 0x1F);
    assert_eq!(cart.read(0x4000), 15);

    cart.write(0x4000, 0x01); // secondary register shifts by 4, not 5
    assert_eq!(cart.read(0x4000), 31);

    cart.write(0x6000, 0x01);
    assert_eq!(cart.read(0x0000), 16);
}

#[test]
fn mbc2_ram_reads_mirror_half_bytes() {
    let mut cart = Cartridge::load(rom_image(0x05, 0x00, 4)).unwrap();
    assert_eq!(cart.mapper, MapperKind::Mbc2);

    cart.write(0x0000, 0x0A);
    cart.write(0xA000, 0x35);
    assert_eq!(cart.read(0xA000), 0xF5); // top nibble is not driven

    // 512 half-bytes mirrored across the whole window.
    assert_eq!(cart.read(0xA200), 0xF5);
    cart.write(0xA1FF, 0x0C);
    assert_eq!(cart.read(0xA3FF), 0xFC);
}

#[test]
fn mbc2_register_select_rides_address_bit_8() {
    let mut cart = Cartridge::load(rom_image(0x05, 0x00, 4)).unwrap();

    cart.write(0x2100, 0x03); // bit 8 set: ROM bank register
    assert_eq!(cart.read(0x4000), 3);

    cart.write(0x2000, 0x02); // bit 8 clear: RAM gate, bank untouched
    assert_eq!(cart.read(0x4000), 3);

    cart.write(0x2100, 0x00);
    assert_eq!(cart.read(0x4000), 1);
}

#[test]
fn mbc3_rtc_registers_alias_the_ram_window() {
    let mut cart = Cartridge::load(rom_image(0x0F, 0x00, 2)).unwrap();
    assert_eq!(cart.mapper, MapperKind::Mbc3);

    cart.write(0x0000, 0x0A);
    cart.write(0x4000, 0x08); // seconds
    cart.write(0xA000, 45);
    assert_eq!(cart.read(0xA000), 45);

    cart.write(0x4000, 0x0C); // control
    cart.write(0xA000, 0x40); // halt
    cart.tick(CYCLES_PER_SECOND * 2);
    cart.write(0x6000, 0x00);
    cart.write(0x6000, 0x01);
    cart.write(0x4000, 0x08);
    assert_eq!(cart.read(0xA000), 45);

    cart.write(0x4000, 0x0C);
    cart.write(0xA000, 0x00);
    cart.tick(CYCLES_PER_SECOND);
    cart.write(0x6000, 0x00);
    cart.write(0x6000, 0x01);
    cart.write(0x4000, 0x08);
    assert_eq!(cart.read(0xA000), 46);
}

#[test]
fn mbc3_latch_snapshots_until_the_next_latch() {
    let mut cart = Cartridge::load(rom_image(0x10, 0x03, 2)).unwrap();
    cart.write(0x0000, 0x0A);
    cart.write(0x4000, 0x08);
    cart.write(0xA000, 10);

    cart.tick(CYCLES_PER_SECOND * 3);
    assert_eq!(cart.read(0xA000), 10); // still the latched snapshot

    cart.write(0x6000, 0x00);
    cart.write(0x6000, 0x01);
    assert_eq!(cart.read(0xA000), 13);
}

#[test]
fn mbc5_rom_bank_spans_nine_bits() {
    let mut rom = vec![0u8; 512 * ROM_BANK_SIZE];
    rom[0x0147] = 0x19;
    rom[0x0148] = 0x08;
    for bank in 0..512 {
        rom[bank * ROM_BANK_SIZE] = bank as u8;
        rom[bank * ROM_BANK_SIZE + 1] = (bank >> 8) as u8;
    }

    let mut cart = Cartridge::load(rom).unwrap();
    assert_eq!(cart.mapper, MapperKind::Mbc5);
    assert_eq!((cart.read(0x4000), cart.read(0x4001)), (0x01, 0x00));

    cart.write(0x2000, 0x02);
    cart.write(0x3000, 0x01);
    assert_eq!((cart.read(0x4000), cart.read(0x4001)), (0x02, 0x01));

    cart.write(0x2000, 0x00);
    assert_eq!((cart.read(0x4000), cart.read(0x4001)), (0x00, 0x01));

    // Unlike MBC1, bank 0 is a legal target here.
    cart.write(0x3000, 0x00);
    assert_eq!((cart.read(0x4000), cart.read(0x4001)), (0x00, 0x00));
}

#[test]
fn mbc5_banks_ram_across_sixteen_slots() {
    let mut cart = Cartridge::load(rom_image(0x1B, 0x04, 8)).unwrap();
    cart.write(0x0000, 0x0A);
    cart.write(0xA000, 0xAA);

    cart.write(0x4000, 0x0F);
    assert_eq!(cart.read(0xA000), 0x00);
    cart.write(0xA000, 0xBB);

    cart.write(0x4000, 0x00);
    assert_eq!(cart.read(0xA000), 0xAA);

    cart.write(0x4000, 0x0F);
    assert_eq!(cart.read(0xA000), 0xBB);
}

#[test]
fn battery_ram_round_trips_through_the_sidecar() {
    let dir = tempdir().unwrap();
    let rom_path = dir.path().join("game.gb");
    fs::write(&rom_path, rom_image(0x03, 0x03, 2)).unwrap();

    let mut cart = Cartridge::from_file(&rom_path).unwrap();
    cart.ram[0] = 0xAA;
    cart.ram[0x7FFF] = 0xBB;
    cart.save_ram().unwrap();

    let data = fs::read(rom_path.with_extension("sav")).unwrap();
    assert_eq!(data.len(), 0x8000);
    assert_eq!(data[0], 0xAA);
    assert_eq!(data[0x7FFF], 0xBB);

    let mut cart = Cartridge::from_file(&rom_path).unwrap();
    cart.write(0x0000, 0x0A);
    assert_eq!(cart.read(0xA000), 0xAA);
}

#[test]
fn rtc_state_round_trips_through_the_sidecar() {
    let dir = tempdir().unwrap();
    let rom_path = dir.path().join("rtc.gb");
    fs::write(&rom_path, rom_image(0x10, 0x03, 2)).unwrap();

    let mut cart = Cartridge::from_file(&rom_path).unwrap();
    cart.write(0x0000, 0x0A);
    cart.write(0x4000, 0x08); // seconds
    cart.write(0xA000, 12);
    cart.write(0x4000, 0x09); // minutes
    cart.write(0xA000, 34);
    cart.write(0x4000, 0x0C); // control
    cart.write(0xA000, 0x40); // halt so it doesn't advance between saves
    cart.save_ram().unwrap();

    let mut cart = Cartridge::from_file(&rom_path).unwrap();
    cart.write(0x0000, 0x0A);
    cart.write(0x6000, 0x00);
    cart.write(0x6000, 0x01); // latch

    cart.write(0x4000, 0x08);
    let seconds = cart.read(0xA000);
    cart.write(0x4000, 0x09);
    let minutes = cart.read(0xA000);
    cart.write(0x4000, 0x0C);
    let control = cart.read(0xA000);

    assert_eq!(seconds, 12);
    assert_eq!(minutes, 34);
    assert_eq!(control & 0x40, 0x40);
}
