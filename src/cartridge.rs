//! Cartridge image handling: header parsing, battery-backed RAM and RTC
//! persistence, and the bank-controller variants.
//!
//! The CPU-visible windows are small (two 16KB ROM windows plus an 8KB RAM
//! window); a [`BankController`] remaps them onto the full ROM/RAM buffers
//! and absorbs the register writes that pick banks, toggle RAM access and
//! switch banking modes. Each controller family has its own addressing
//! quirks, reproduced here bit for bit.

use std::{
    error, fmt, fs, io,
    path::{Path, PathBuf},
};

use crate::bus::BusDevice;

pub const ROM_BANK_SIZE: usize = 0x4000;
pub const RAM_BANK_SIZE: usize = 0x2000;
const HEADER_END: usize = 0x0150;

/// RTC seconds are derived from CPU cycles, not wall time, so identical
/// inputs replay identically.
const RTC_CYCLES_PER_SECOND: u32 = 4_194_304;

/// Sidecar layout: five live registers, then five latched registers, each
/// a little-endian u32 word, then the sub-second cycle remainder as a u64.
const RTC_STATE_LEN: usize = 48;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapperKind {
    RomOnly,
    Mbc1,
    Mbc2,
    Mbc3,
    Mbc5,
}

/// Load-time cartridge failures. Always recoverable: the caller keeps
/// whatever image was previously loaded.
#[derive(Debug)]
pub enum CartridgeError {
    /// Image too small to contain the 0x150-byte header area.
    TooShort { len: usize },
    /// Controller-type byte (0x0147) names a mapper this core does not model.
    UnknownMapper(u8),
    /// Header ROM-size code promises more data than the image contains.
    RomSizeMismatch { expected: usize, actual: usize },
    Io(io::Error),
}

impl fmt::Display for CartridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CartridgeError::TooShort { len } => {
                write!(f, "image is {len} bytes, smaller than the cartridge header")
            }
            CartridgeError::UnknownMapper(byte) => {
                write!(f, "unrecognized controller type {byte:#04X}")
            }
            CartridgeError::RomSizeMismatch { expected, actual } => {
                write!(f, "header promises {expected} ROM bytes, image has {actual}")
            }
            CartridgeError::Io(err) => write!(f, "{err}"),
        }
    }
}

impl error::Error for CartridgeError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            CartridgeError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for CartridgeError {
    fn from(err: io::Error) -> Self {
        CartridgeError::Io(err)
    }
}

/// Per-variant banking behavior. Controllers own only their registers; the
/// ROM/RAM buffers are handed in by the [`Cartridge`] on every access.
pub trait BankController: fmt::Debug {
    /// Read through the fixed window (0x0000-0x3FFF).
    fn read_bank0(&self, rom: &[u8], addr: u16) -> u8;
    /// Read through the switchable window (0x4000-0x7FFF).
    fn read_bank1(&self, rom: &[u8], addr: u16) -> u8;
    /// Read through the external-RAM window (0xA000-0xBFFF).
    fn read_ram(&self, ram: &[u8], addr: u16) -> u8;
    /// Register write anywhere in 0x0000-0x7FFF.
    fn write_control(&mut self, addr: u16, val: u8);
    /// Data write through the external-RAM window.
    fn write_ram(&mut self, ram: &mut [u8], addr: u16, val: u8);
    /// Back to power-on register state. Does not touch RAM contents.
    fn reset(&mut self);
    /// Advance controller-internal clocks (MBC3 RTC).
    fn tick(&mut self, _cycles: u32) {}

    fn rtc(&self) -> Option<&Rtc> {
        None
    }

    fn rtc_mut(&mut self) -> Option<&mut Rtc> {
        None
    }
}

fn rom_bank_count(rom: &[u8]) -> usize {
    (rom.len() / ROM_BANK_SIZE).max(1)
}

fn ram_bank_count(ram: &[u8]) -> usize {
    ram.len().div_ceil(RAM_BANK_SIZE).max(1)
}

/// RAM gating pattern shared by every controller: the enable register must
/// hold exactly 0x0A in its low nibble, not merely be non-zero.
fn ram_enable_value(val: u8) -> bool {
    val & 0x0F == 0x0A
}

// ---------------------------------------------------------------------------
// ROM only

#[derive(Debug, Default)]
struct RomOnly;

impl BankController for RomOnly {
    fn read_bank0(&self, rom: &[u8], addr: u16) -> u8 {
        rom.get(addr as usize).copied().unwrap_or(0xFF)
    }

    fn read_bank1(&self, rom: &[u8], addr: u16) -> u8 {
        rom.get(addr as usize).copied().unwrap_or(0xFF)
    }

    fn read_ram(&self, ram: &[u8], addr: u16) -> u8 {
        ram.get(addr as usize - 0xA000).copied().unwrap_or(0xFF)
    }

    fn write_control(&mut self, _addr: u16, _val: u8) {}

    fn write_ram(&mut self, ram: &mut [u8], addr: u16, val: u8) {
        if let Some(b) = ram.get_mut(addr as usize - 0xA000) {
            *b = val;
        }
    }

    fn reset(&mut self) {}
}

// ---------------------------------------------------------------------------
// MBC1

#[derive(Debug)]
struct Mbc1 {
    ram_enable: bool,
    /// 5-bit primary ROM bank register (never 0 after a write).
    bank1: u8,
    /// 2-bit secondary register: ROM high bits or RAM bank.
    bank2: u8,
    /// Banking mode: 0 = simple, 1 = advanced (bank2 also re-banks the
    /// fixed window and the RAM window).
    mode: u8,
    /// Multi-game compilation wiring: bank1 narrows to 4 bits and bank2
    /// shifts by 4 instead of 5.
    multicart: bool,
}

impl Mbc1 {
    fn new(multicart: bool) -> Self {
        Self {
            ram_enable: false,
            bank1: 1,
            bank2: 0,
            mode: 0,
            multicart,
        }
    }

    fn ram_index(&self, ram: &[u8], addr: u16) -> usize {
        if self.mode == 0 {
            addr as usize - 0xA000
        } else {
            let bank = (self.bank2 as usize) % ram_bank_count(ram);
            bank * RAM_BANK_SIZE + addr as usize - 0xA000
        }
    }
}

impl BankController for Mbc1 {
    fn read_bank0(&self, rom: &[u8], addr: u16) -> u8 {
        let offset = if self.mode == 0 {
            addr as usize
        } else if self.multicart {
            // Composed multicart banks are not folded; past-the-end banks
            // read like an unconnected bus.
            ((self.bank2 as usize) << 4) * ROM_BANK_SIZE + addr as usize
        } else {
            let bank = ((self.bank2 as usize) << 5) % rom_bank_count(rom);
            bank * ROM_BANK_SIZE + addr as usize
        };
        rom.get(offset).copied().unwrap_or(0xFF)
    }

    fn read_bank1(&self, rom: &[u8], addr: u16) -> u8 {
        let bank = if self.multicart {
            ((self.bank2 as usize) << 4) | (self.bank1 as usize & 0x0F)
        } else {
            let bank = ((self.bank2 as usize) << 5) | (self.bank1 as usize & 0x1F);
            bank % rom_bank_count(rom)
        };
        let offset = bank * ROM_BANK_SIZE + (addr as usize - 0x4000);
        rom.get(offset).copied().unwrap_or(0xFF)
    }

    fn read_ram(&self, ram: &[u8], addr: u16) -> u8 {
        if !self.ram_enable {
            return 0xFF;
        }
        ram.get(self.ram_index(ram, addr)).copied().unwrap_or(0xFF)
    }

    fn write_control(&mut self, addr: u16, val: u8) {
        match addr {
            0x0000..=0x1FFF => self.ram_enable = ram_enable_value(val),
            0x2000..=0x3FFF => {
                self.bank1 = val & 0x1F;
                if self.bank1 == 0 {
                    self.bank1 = 1;
                }
            }
            0x4000..=0x5FFF => self.bank2 = val & 0x03,
            _ => self.mode = val & 0x01,
        }
    }

    fn write_ram(&mut self, ram: &mut [u8], addr: u16, val: u8) {
        if !self.ram_enable {
            return;
        }
        let idx = self.ram_index(ram, addr);
        if let Some(b) = ram.get_mut(idx) {
            *b = val;
        }
    }

    fn reset(&mut self) {
        let multicart = self.multicart;
        *self = Self::new(multicart);
    }
}

// ---------------------------------------------------------------------------
// MBC2

#[derive(Debug)]
struct Mbc2 {
    ram_enable: bool,
    rom_bank: u8,
}

impl Mbc2 {
    fn new() -> Self {
        Self {
            ram_enable: false,
            rom_bank: 1,
        }
    }
}

impl BankController for Mbc2 {
    fn read_bank0(&self, rom: &[u8], addr: u16) -> u8 {
        rom.get(addr as usize).copied().unwrap_or(0xFF)
    }

    fn read_bank1(&self, rom: &[u8], addr: u16) -> u8 {
        let bank = (self.rom_bank as usize) % rom_bank_count(rom);
        let offset = bank * ROM_BANK_SIZE + (addr as usize - 0x4000);
        rom.get(offset).copied().unwrap_or(0xFF)
    }

    fn read_ram(&self, ram: &[u8], addr: u16) -> u8 {
        if !self.ram_enable {
            return 0xFF;
        }
        // 512 half-bytes mirrored across the whole window; the top nibble
        // is not driven and reads all-ones.
        let idx = (addr as usize - 0xA000) & 0x01FF;
        0xF0 | (ram.get(idx).copied().unwrap_or(0x0F) & 0x0F)
    }

    fn write_control(&mut self, addr: u16, val: u8) {
        if addr > 0x3FFF {
            return;
        }
        // Address bit 8 picks the register: clear = RAM gate, set = ROM bank.
        if addr & 0x0100 == 0 {
            self.ram_enable = ram_enable_value(val);
        } else {
            self.rom_bank = val & 0x0F;
            if self.rom_bank == 0 {
                self.rom_bank = 1;
            }
        }
    }

    fn write_ram(&mut self, ram: &mut [u8], addr: u16, val: u8) {
        if !self.ram_enable {
            return;
        }
        let idx = (addr as usize - 0xA000) & 0x01FF;
        if let Some(b) = ram.get_mut(idx) {
            *b = val & 0x0F;
        }
    }

    fn reset(&mut self) {
        *self = Self::new();
    }
}

// ---------------------------------------------------------------------------
// MBC3 + RTC

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct RtcRegisters {
    seconds: u8,
    minutes: u8,
    hours: u8,
    days: u16,
    halt: bool,
    carry: bool,
}

impl RtcRegisters {
    fn control_byte(&self) -> u8 {
        let mut out = ((self.days >> 8) as u8) & 0x01;
        if self.halt {
            out |= 0x40;
        }
        if self.carry {
            out |= 0x80;
        }
        out
    }
}

/// MBC3 real-time clock. Runs off emulated CPU cycles; the halt bit (day
/// register bit 6) freezes it. The day counter is 9 bits with a sticky
/// carry flag on overflow.
#[derive(Debug, Default)]
pub struct Rtc {
    regs: RtcRegisters,
    latched: RtcRegisters,
    subsecond_cycles: u32,
}

impl Rtc {
    fn latch(&mut self) {
        self.latched = self.regs;
    }

    fn read_latched(&self, reg: u8) -> u8 {
        match reg {
            0x08 => self.latched.seconds & 0x3F,
            0x09 => self.latched.minutes & 0x3F,
            0x0A => self.latched.hours & 0x1F,
            0x0B => (self.latched.days & 0x00FF) as u8,
            0x0C => self.latched.control_byte(),
            _ => 0xFF,
        }
    }

    fn write_register(&mut self, reg: u8, val: u8) {
        match reg {
            0x08 => {
                self.regs.seconds = val & 0x3F;
                self.subsecond_cycles = 0;
            }
            0x09 => self.regs.minutes = val & 0x3F,
            0x0A => self.regs.hours = val & 0x1F,
            0x0B => self.regs.days = (self.regs.days & 0x0100) | val as u16,
            0x0C => {
                self.regs.days = (self.regs.days & 0x00FF) | (((val & 0x01) as u16) << 8);
                self.regs.halt = val & 0x40 != 0;
                self.regs.carry = val & 0x80 != 0;
            }
            _ => {}
        }
        self.latch();
    }

    fn step(&mut self, cycles: u32) {
        if self.regs.halt {
            return;
        }
        let mut sub = self.subsecond_cycles + cycles;
        let mut seconds = 0u64;
        while sub >= RTC_CYCLES_PER_SECOND {
            sub -= RTC_CYCLES_PER_SECOND;
            seconds += 1;
        }
        self.subsecond_cycles = sub;
        if seconds > 0 {
            self.advance_seconds(seconds);
        }
    }

    fn advance_seconds(&mut self, mut seconds: u64) {
        while seconds > 0 {
            let until_minute = self.seconds_until_minute_tick();
            if seconds < until_minute {
                self.regs.seconds = ((self.regs.seconds as u64 + seconds) & 0x3F) as u8;
                return;
            }
            seconds -= until_minute;
            self.regs.seconds = 0;
            self.minute_tick();
        }
    }

    // The 6-bit seconds register can be written to 60..63; those values
    // tick up to 63, wrap to 0 and only then carry into minutes.
    fn seconds_until_minute_tick(&self) -> u64 {
        let sec = self.regs.seconds as u64;
        if sec <= 59 { 60 - sec } else { 64 - sec + 60 }
    }

    fn minute_tick(&mut self) {
        let carry = self.regs.minutes == 59;
        self.regs.minutes = (self.regs.minutes + 1) & 0x3F;
        if carry {
            self.regs.minutes = 0;
            self.hour_tick();
        }
    }

    fn hour_tick(&mut self) {
        let carry = self.regs.hours == 23;
        self.regs.hours = (self.regs.hours + 1) & 0x1F;
        if carry {
            self.regs.hours = 0;
            self.day_tick();
        }
    }

    fn day_tick(&mut self) {
        if self.regs.days >= 0x01FF {
            self.regs.days = 0;
            self.regs.carry = true;
        } else {
            self.regs.days += 1;
        }
    }

    fn serialize(&self) -> [u8; RTC_STATE_LEN] {
        let words = [
            self.regs.seconds as u32,
            self.regs.minutes as u32,
            self.regs.hours as u32,
            (self.regs.days & 0xFF) as u32,
            self.regs.control_byte() as u32,
            self.latched.seconds as u32,
            self.latched.minutes as u32,
            self.latched.hours as u32,
            (self.latched.days & 0xFF) as u32,
            self.latched.control_byte() as u32,
        ];
        let mut out = [0u8; RTC_STATE_LEN];
        for (chunk, word) in out.chunks_exact_mut(4).zip(words) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        out[40..48].copy_from_slice(&(self.subsecond_cycles as u64).to_le_bytes());
        out
    }

    fn deserialize(&mut self, data: &[u8]) -> bool {
        if data.len() < RTC_STATE_LEN {
            return false;
        }
        let word = |i: usize| {
            let at = i * 4;
            u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
        };
        let load = |base: usize| {
            let ctrl = word(base + 4);
            RtcRegisters {
                seconds: word(base) as u8 & 0x3F,
                minutes: word(base + 1) as u8 & 0x3F,
                hours: word(base + 2) as u8 & 0x1F,
                days: (word(base + 3) as u16 & 0x00FF) | ((ctrl as u16 & 0x01) << 8),
                halt: ctrl & 0x40 != 0,
                carry: ctrl & 0x80 != 0,
            }
        };
        self.regs = load(0);
        self.latched = load(5);
        let rem = u64::from_le_bytes([
            data[40], data[41], data[42], data[43], data[44], data[45], data[46], data[47],
        ]);
        self.subsecond_cycles = rem.min((RTC_CYCLES_PER_SECOND - 1) as u64) as u32;
        true
    }
}

#[derive(Debug)]
struct Mbc3 {
    ram_enable: bool,
    rom_bank: u8,
    /// 0x00-0x07 select a RAM bank; 0x08-0x0C alias an RTC register over
    /// the whole RAM window.
    ram_bank: u8,
    latch_pending: bool,
    rtc: Option<Rtc>,
}

impl Mbc3 {
    fn new(has_rtc: bool) -> Self {
        Self {
            ram_enable: false,
            rom_bank: 1,
            ram_bank: 0,
            latch_pending: false,
            rtc: has_rtc.then(Rtc::default),
        }
    }
}

impl BankController for Mbc3 {
    fn read_bank0(&self, rom: &[u8], addr: u16) -> u8 {
        rom.get(addr as usize).copied().unwrap_or(0xFF)
    }

    fn read_bank1(&self, rom: &[u8], addr: u16) -> u8 {
        let bank = (self.rom_bank as usize) % rom_bank_count(rom);
        let offset = bank * ROM_BANK_SIZE + (addr as usize - 0x4000);
        rom.get(offset).copied().unwrap_or(0xFF)
    }

    fn read_ram(&self, ram: &[u8], addr: u16) -> u8 {
        if !self.ram_enable {
            return 0xFF;
        }
        match self.ram_bank {
            0x00..=0x07 => {
                let idx = (self.ram_bank as usize) * RAM_BANK_SIZE + addr as usize - 0xA000;
                ram.get(idx).copied().unwrap_or(0xFF)
            }
            0x08..=0x0C => self
                .rtc
                .as_ref()
                .map(|rtc| rtc.read_latched(self.ram_bank))
                .unwrap_or(0xFF),
            _ => 0xFF,
        }
    }

    fn write_control(&mut self, addr: u16, val: u8) {
        match addr {
            0x0000..=0x1FFF => self.ram_enable = ram_enable_value(val),
            0x2000..=0x3FFF => {
                self.rom_bank = val & 0x7F;
                if self.rom_bank == 0 {
                    self.rom_bank = 1;
                }
            }
            0x4000..=0x5FFF => self.ram_bank = val,
            _ => {
                // 0x00 then 0x01 latches the live clock.
                if val == 0 {
                    self.latch_pending = true;
                } else {
                    if val == 1
                        && self.latch_pending
                        && let Some(rtc) = self.rtc.as_mut()
                    {
                        rtc.latch();
                    }
                    self.latch_pending = false;
                }
            }
        }
    }

    fn write_ram(&mut self, ram: &mut [u8], addr: u16, val: u8) {
        if !self.ram_enable {
            return;
        }
        match self.ram_bank {
            0x00..=0x07 => {
                let idx = (self.ram_bank as usize) * RAM_BANK_SIZE + addr as usize - 0xA000;
                if let Some(b) = ram.get_mut(idx) {
                    *b = val;
                }
            }
            0x08..=0x0C => {
                if let Some(rtc) = self.rtc.as_mut() {
                    rtc.write_register(self.ram_bank, val);
                }
            }
            _ => {}
        }
    }

    fn reset(&mut self) {
        self.ram_enable = false;
        self.rom_bank = 1;
        self.ram_bank = 0;
        self.latch_pending = false;
    }

    fn tick(&mut self, cycles: u32) {
        if let Some(rtc) = self.rtc.as_mut() {
            rtc.step(cycles);
        }
    }

    fn rtc(&self) -> Option<&Rtc> {
        self.rtc.as_ref()
    }

    fn rtc_mut(&mut self) -> Option<&mut Rtc> {
        self.rtc.as_mut()
    }
}

// ---------------------------------------------------------------------------
// MBC5

#[derive(Debug)]
struct Mbc5 {
    ram_enable: bool,
    /// 9-bit ROM bank: low byte plus a 1-bit extension. Bank 0 is
    /// selectable here, unlike the earlier controllers.
    rom_bank: u16,
    ram_bank: u8,
}

impl Mbc5 {
    fn new() -> Self {
        Self {
            ram_enable: false,
            rom_bank: 1,
            ram_bank: 0,
        }
    }
}

impl BankController for Mbc5 {
    fn read_bank0(&self, rom: &[u8], addr: u16) -> u8 {
        rom.get(addr as usize).copied().unwrap_or(0xFF)
    }

    fn read_bank1(&self, rom: &[u8], addr: u16) -> u8 {
        let bank = (self.rom_bank as usize) % rom_bank_count(rom);
        let offset = bank * ROM_BANK_SIZE + (addr as usize - 0x4000);
        rom.get(offset).copied().unwrap_or(0xFF)
    }

    fn read_ram(&self, ram: &[u8], addr: u16) -> u8 {
        if !self.ram_enable {
            return 0xFF;
        }
        let idx = (self.ram_bank as usize) * RAM_BANK_SIZE + addr as usize - 0xA000;
        ram.get(idx).copied().unwrap_or(0xFF)
    }

    fn write_control(&mut self, addr: u16, val: u8) {
        match addr {
            0x0000..=0x1FFF => self.ram_enable = ram_enable_value(val),
            0x2000..=0x2FFF => self.rom_bank = (self.rom_bank & 0x100) | val as u16,
            0x3000..=0x3FFF => self.rom_bank = (self.rom_bank & 0xFF) | (((val & 0x01) as u16) << 8),
            0x4000..=0x5FFF => self.ram_bank = val & 0x0F,
            _ => {}
        }
    }

    fn write_ram(&mut self, ram: &mut [u8], addr: u16, val: u8) {
        if !self.ram_enable {
            return;
        }
        let idx = (self.ram_bank as usize) * RAM_BANK_SIZE + addr as usize - 0xA000;
        if let Some(b) = ram.get_mut(idx) {
            *b = val;
        }
    }

    fn reset(&mut self) {
        *self = Self::new();
    }
}

// ---------------------------------------------------------------------------
// Cartridge

#[derive(Debug)]
pub struct Cartridge {
    pub rom: Vec<u8>,
    pub ram: Vec<u8>,
    pub title: String,
    pub mapper: MapperKind,
    cart_type: u8,
    save_path: Option<PathBuf>,
    rtc_path: Option<PathBuf>,
    controller: Box<dyn BankController>,
}

impl Cartridge {
    /// A slot with nothing in it: every read is open bus, every write is
    /// swallowed.
    pub fn empty() -> Self {
        Self {
            rom: Vec::new(),
            ram: Vec::new(),
            title: String::new(),
            mapper: MapperKind::RomOnly,
            cart_type: 0,
            save_path: None,
            rtc_path: None,
            controller: Box::new(RomOnly),
        }
    }

    pub fn load(data: Vec<u8>) -> Result<Self, CartridgeError> {
        if data.len() < HEADER_END {
            return Err(CartridgeError::TooShort { len: data.len() });
        }

        let header = Header::parse(&data);
        let mapper = header.mapper()?;
        if let Some(expected) = header.rom_size()
            && data.len() < expected
        {
            return Err(CartridgeError::RomSizeMismatch {
                expected,
                actual: data.len(),
            });
        }

        let controller: Box<dyn BankController> = match mapper {
            MapperKind::RomOnly => Box::new(RomOnly),
            MapperKind::Mbc1 => Box::new(Mbc1::new(detect_mbc1_multicart(&data))),
            MapperKind::Mbc2 => Box::new(Mbc2::new()),
            MapperKind::Mbc3 => Box::new(Mbc3::new(header.has_rtc())),
            MapperKind::Mbc5 => Box::new(Mbc5::new()),
        };

        Ok(Self {
            ram: vec![0; header.ram_size()],
            title: header.title(),
            mapper,
            cart_type: header.cart_type(),
            save_path: None,
            rtc_path: None,
            controller,
            rom: data,
        })
    }

    /// Load from disk, picking up `.sav` (battery RAM) and `.rtc` (clock
    /// state) sidecars when the cartridge persists them.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CartridgeError> {
        let data = fs::read(&path)?;
        let mut cart = Self::load(data)?;

        if cart.has_battery() {
            let save = PathBuf::from(path.as_ref()).with_extension("sav");
            if let Ok(bytes) = fs::read(&save) {
                for (d, s) in cart.ram.iter_mut().zip(bytes.iter()) {
                    *d = *s;
                }
            }
            cart.save_path = Some(save);
        }

        if cart.has_rtc() {
            let rtc_path = PathBuf::from(path.as_ref()).with_extension("rtc");
            if let Ok(bytes) = fs::read(&rtc_path)
                && let Some(rtc) = cart.controller.rtc_mut()
                && !rtc.deserialize(&bytes)
            {
                log::warn!("ignoring malformed RTC state in {}", rtc_path.display());
            }
            cart.rtc_path = Some(rtc_path);
        }

        log::info!("loaded {:?} ({:?})", cart.title, cart.mapper);
        Ok(cart)
    }

    /// Write battery RAM (and RTC state) back beside the ROM.
    pub fn save_ram(&mut self) -> io::Result<()> {
        if let (true, Some(path)) = (self.has_battery(), &self.save_path)
            && !self.ram.is_empty()
        {
            fs::write(path, &self.ram)?;
        }
        if let (Some(path), Some(rtc)) = (&self.rtc_path, self.controller.rtc()) {
            fs::write(path, rtc.serialize())?;
        }
        Ok(())
    }

    pub fn tick(&mut self, cycles: u32) {
        self.controller.tick(cycles);
    }

    /// Populated extent of external RAM, for the OAM DMA source clamp.
    pub fn ram_len(&self) -> usize {
        self.ram.len()
    }

    fn has_battery(&self) -> bool {
        matches!(
            self.cart_type,
            0x03 | 0x06 | 0x09 | 0x0F | 0x10 | 0x13 | 0x1B | 0x1E
        )
    }

    fn has_rtc(&self) -> bool {
        matches!(self.cart_type, 0x0F | 0x10)
    }
}

impl BusDevice for Cartridge {
    fn claims(&self, addr: u16) -> bool {
        matches!(addr, 0x0000..=0x7FFF | 0xA000..=0xBFFF)
    }

    fn read(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x3FFF => self.controller.read_bank0(&self.rom, addr),
            0x4000..=0x7FFF => self.controller.read_bank1(&self.rom, addr),
            _ => self.controller.read_ram(&self.ram, addr),
        }
    }

    fn write(&mut self, addr: u16, val: u8) {
        match addr {
            0x0000..=0x7FFF => self.controller.write_control(addr, val),
            _ => self.controller.write_ram(&mut self.ram, addr, val),
        }
    }

    /// Power-on register state; ROM/RAM contents survive (battery carts
    /// keep their saves across resets).
    fn reset(&mut self) {
        self.controller.reset();
    }
}

/// Multi-game compilation boards mirror the header logo into the bank the
/// secondary register exposes at index 15; a matching 2-byte probe there
/// flips the MBC1 into its 4-bit wiring.
fn detect_mbc1_multicart(rom: &[u8]) -> bool {
    let banks = rom.len() / ROM_BANK_SIZE;
    if banks < 2 {
        return false;
    }
    let mirror_bank = 15 % banks;
    if mirror_bank == 0 {
        return false;
    }

    let probe = match rom.get(0x0104..0x0106) {
        Some(p) if p != [0, 0] => p,
        _ => return false,
    };
    let mirror = mirror_bank * ROM_BANK_SIZE + 0x0104;
    rom.get(mirror..mirror + 2) == Some(probe)
}

struct Header<'a> {
    data: &'a [u8],
}

impl<'a> Header<'a> {
    fn parse(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn title(&self) -> String {
        let mut slice = &self.data[0x0134..0x0144];
        if let Some(pos) = slice.iter().position(|&b| b == 0) {
            slice = &slice[..pos];
        }
        String::from_utf8_lossy(slice).trim().to_string()
    }

    fn cart_type(&self) -> u8 {
        self.data[0x0147]
    }

    fn mapper(&self) -> Result<MapperKind, CartridgeError> {
        match self.cart_type() {
            0x00 | 0x08 | 0x09 => Ok(MapperKind::RomOnly),
            0x01..=0x03 => Ok(MapperKind::Mbc1),
            0x05 | 0x06 => Ok(MapperKind::Mbc2),
            0x0F..=0x13 => Ok(MapperKind::Mbc3),
            0x19..=0x1E => Ok(MapperKind::Mbc5),
            byte => Err(CartridgeError::UnknownMapper(byte)),
        }
    }

    fn has_rtc(&self) -> bool {
        matches!(self.cart_type(), 0x0F | 0x10)
    }

    /// Expected image length from the ROM-size code, when the code is one
    /// the header layout defines.
    fn rom_size(&self) -> Option<usize> {
        let code = self.data[0x0148];
        (code <= 0x08).then(|| 0x8000 << code)
    }

    fn ram_size(&self) -> usize {
        // MBC2 RAM is on-die: 512 half-bytes regardless of the header code.
        if matches!(self.cart_type(), 0x05 | 0x06) {
            return 0x200;
        }
        match self.data[0x0149] {
            0x00 => 0,
            0x01 => 0x800,
            0x02 => 0x2000,
            0x03 => 0x8000,
            0x04 => 0x20000,
            0x05 => 0x10000,
            code => {
                log::warn!("unknown RAM size code {code:#04X}, assuming one bank");
                0x2000
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rom_with_type(cart_type: u8, banks: usize) -> Vec<u8> {
        let mut rom = vec![0u8; banks * ROM_BANK_SIZE];
        rom[0x0147] = cart_type;
        rom[0x0148] = match banks {
            2 => 0x00,
            4 => 0x01,
            _ => 0x02,
        };
        rom
    }

    #[test]
    fn unknown_mapper_is_a_recoverable_error() {
        let rom = rom_with_type(0xFC, 2); // pocket camera
        match Cartridge::load(rom) {
            Err(CartridgeError::UnknownMapper(0xFC)) => {}
            other => panic!("expected UnknownMapper, got {other:?}"),
        }
    }

    #[test]
    fn undersized_image_is_rejected() {
        assert!(matches!(
            Cartridge::load(vec![0; 0x100]),
            Err(CartridgeError::TooShort { len: 0x100 })
        ));

        let mut rom = vec![0u8; ROM_BANK_SIZE];
        rom[0x0148] = 0x02; // promises 128KB
        assert!(matches!(
            Cartridge::load(rom),
            Err(CartridgeError::RomSizeMismatch { .. })
        ));
    }

    #[test]
    fn multicart_probe_compares_bank_0_against_bank_15() {
        // Dual-bank image: 15 % 2 folds the probe onto bank 1.
        let mut rom = rom_with_type(0x01, 2);
        rom[0x0104] = 0xCE;
        rom[0x0105] = 0xED;
        assert!(!detect_mbc1_multicart(&rom));

        rom[ROM_BANK_SIZE + 0x0104] = 0xCE;
        rom[ROM_BANK_SIZE + 0x0105] = 0xED;
        assert!(detect_mbc1_multicart(&rom));
    }

    #[test]
    fn rtc_ticks_through_out_of_range_values() {
        let mut rtc = Rtc::default();
        rtc.regs.seconds = 59;
        rtc.regs.minutes = 60;
        rtc.advance_seconds(1);
        assert_eq!(rtc.regs.seconds, 0);
        assert_eq!(rtc.regs.minutes, 61);

        rtc.regs.seconds = 63;
        rtc.regs.minutes = 5;
        rtc.advance_seconds(1);
        assert_eq!(rtc.regs.seconds, 0);
        assert_eq!(rtc.regs.minutes, 5);
    }

    #[test]
    fn rtc_day_overflow_sets_sticky_carry() {
        let mut rtc = Rtc::default();
        rtc.regs.seconds = 59;
        rtc.regs.minutes = 59;
        rtc.regs.hours = 23;
        rtc.regs.days = 0x01FF;
        rtc.advance_seconds(1);
        assert_eq!(rtc.regs.days, 0);
        assert!(rtc.regs.carry);
    }

    #[test]
    fn rtc_halt_freezes_the_counter() {
        let mut rtc = Rtc::default();
        rtc.subsecond_cycles = RTC_CYCLES_PER_SECOND - 1;
        rtc.write_register(0x0C, 0x40);
        rtc.step(RTC_CYCLES_PER_SECOND * 3);
        assert_eq!(rtc.regs.seconds, 0);

        rtc.write_register(0x0C, 0x00);
        rtc.step(1);
        assert_eq!(rtc.regs.seconds, 1);
    }

    #[test]
    fn rtc_state_survives_serialization() {
        let mut rtc = Rtc::default();
        rtc.write_register(0x08, 12);
        rtc.write_register(0x09, 34);
        rtc.write_register(0x0C, 0x41);
        rtc.subsecond_cycles = 1234;

        let mut restored = Rtc::default();
        assert!(restored.deserialize(&rtc.serialize()));
        assert_eq!(restored.regs, rtc.regs);
        assert_eq!(restored.latched, rtc.latched);
        assert_eq!(restored.subsecond_cycles, 1234);
    }

    #[test]
    fn rtc_serialization_packs_word_registers() {
        let mut rtc = Rtc::default();
        rtc.write_register(0x08, 12);
        rtc.write_register(0x0C, 0x41); // day bit 8 + halt
        rtc.subsecond_cycles = 1234;

        let bytes = rtc.serialize();
        assert_eq!(bytes.len(), 48);
        assert_eq!(bytes[0..4], [12, 0, 0, 0]); // live seconds word
        assert_eq!(bytes[16], 0x41); // live day-high/halt/carry word
        assert_eq!(bytes[20], 12); // latched block starts at byte 20
        assert_eq!(bytes[36], 0x41);
        assert_eq!(bytes[40..48], 1234u64.to_le_bytes());

        // A truncated sidecar is rejected outright.
        let mut restored = Rtc::default();
        assert!(!restored.deserialize(&bytes[..40]));
    }
}
