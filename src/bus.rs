//! System bus: routes every CPU-visible read and write to the device that
//! owns the address.
//!
//! Devices register in a fixed order and the first whose `claims` accepts
//! the address wins, which is how the boot overlay shadows the cartridge
//! window until it is switched out. Reads nobody claims come back as the
//! open-bus value 0xFF; writes nobody claims are dropped.

use std::error::Error;
use std::fmt;

use crate::apu::Apu;
use crate::cartridge::Cartridge;
use crate::input::Joypad;
use crate::interrupts::InterruptController;
use crate::ppu::Ppu;
use crate::serial::Serial;
use crate::timer::Timer;

pub const BOOT_ROM_SIZE: usize = 0x100;
pub const BOOT_UNMAP_ADDR: u16 = 0xFF50;
pub const WRAM_SIZE: usize = 0x2000;
pub const HRAM_SIZE: usize = 0x7F;
pub const OPEN_BUS: u8 = 0xFF;

const OAM_DMA_LEN: u16 = 160;

/// Capability contract shared by every bus-mapped piece of hardware.
///
/// `claims` decides ownership of an address, `read`/`write` move one byte,
/// and `reset` returns the device to power-on state. `read` takes `&self`:
/// no device may mutate observable state on a read.
pub trait BusDevice {
    fn claims(&self, addr: u16) -> bool;
    fn read(&self, addr: u16) -> u8;
    fn write(&mut self, addr: u16, val: u8);
    fn reset(&mut self);
}

#[derive(Debug)]
pub enum BootRomError {
    /// Boot images are exactly 256 bytes.
    WrongSize { len: usize },
}

impl fmt::Display for BootRomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootRomError::WrongSize { len } => {
                write!(f, "boot ROM must be {BOOT_ROM_SIZE} bytes, got {len}")
            }
        }
    }
}

impl Error for BootRomError {}

/// Boot ROM overlay over 0x0000-0x00FF.
///
/// While mapped it shadows the cartridge; any write to 0xFF50 switches it
/// out for good (until reset). Reading 0xFF50 back gives open bus.
#[derive(Debug)]
pub struct BootRom {
    data: Option<Vec<u8>>,
    mapped: bool,
}

impl BootRom {
    pub fn new() -> Self {
        Self {
            data: None,
            mapped: false,
        }
    }

    pub fn load(&mut self, image: Vec<u8>) -> Result<(), BootRomError> {
        if image.len() != BOOT_ROM_SIZE {
            return Err(BootRomError::WrongSize { len: image.len() });
        }
        self.data = Some(image);
        self.mapped = true;
        Ok(())
    }

    pub fn is_mapped(&self) -> bool {
        self.mapped
    }
}

impl BusDevice for BootRom {
    fn claims(&self, addr: u16) -> bool {
        (self.mapped && addr <= 0x00FF) || addr == BOOT_UNMAP_ADDR
    }

    fn read(&self, addr: u16) -> u8 {
        if addr <= 0x00FF {
            self.data
                .as_ref()
                .and_then(|b| b.get(addr as usize).copied())
                .unwrap_or(OPEN_BUS)
        } else {
            OPEN_BUS
        }
    }

    fn write(&mut self, addr: u16, _val: u8) {
        if addr == BOOT_UNMAP_ADDR {
            self.mapped = false;
        }
    }

    fn reset(&mut self) {
        self.mapped = self.data.is_some();
    }
}

impl Default for BootRom {
    fn default() -> Self {
        Self::new()
    }
}

/// 8 KiB of work RAM at 0xC000-0xDFFF, mirrored at 0xE000-0xFDFF.
pub struct WorkRam {
    data: [u8; WRAM_SIZE],
}

impl WorkRam {
    pub fn new() -> Self {
        Self {
            data: [0; WRAM_SIZE],
        }
    }
}

impl BusDevice for WorkRam {
    fn claims(&self, addr: u16) -> bool {
        matches!(addr, 0xC000..=0xFDFF)
    }

    fn read(&self, addr: u16) -> u8 {
        // Echo RAM folds back onto the base region.
        self.data[(addr as usize - 0xC000) & (WRAM_SIZE - 1)]
    }

    fn write(&mut self, addr: u16, val: u8) {
        self.data[(addr as usize - 0xC000) & (WRAM_SIZE - 1)] = val;
    }

    fn reset(&mut self) {
        self.data = [0; WRAM_SIZE];
    }
}

impl Default for WorkRam {
    fn default() -> Self {
        Self::new()
    }
}

/// 127 bytes of high RAM at 0xFF80-0xFFFE.
pub struct HighRam {
    data: [u8; HRAM_SIZE],
}

impl HighRam {
    pub fn new() -> Self {
        Self {
            data: [0; HRAM_SIZE],
        }
    }
}

impl BusDevice for HighRam {
    fn claims(&self, addr: u16) -> bool {
        matches!(addr, 0xFF80..=0xFFFE)
    }

    fn read(&self, addr: u16) -> u8 {
        self.data[addr as usize - 0xFF80]
    }

    fn write(&mut self, addr: u16, val: u8) {
        self.data[addr as usize - 0xFF80] = val;
    }

    fn reset(&mut self) {
        self.data = [0; HRAM_SIZE];
    }
}

impl Default for HighRam {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeviceId {
    Boot,
    Cartridge,
    WorkRam,
    HighRam,
    Timer,
    Interrupts,
    Joypad,
    Serial,
    Apu,
    Ppu,
}

/// Dispatch order. The boot overlay comes first so it shadows the cartridge
/// while mapped; everything else owns disjoint ranges.
const DEVICE_ORDER: [DeviceId; 10] = [
    DeviceId::Boot,
    DeviceId::Cartridge,
    DeviceId::WorkRam,
    DeviceId::HighRam,
    DeviceId::Timer,
    DeviceId::Interrupts,
    DeviceId::Joypad,
    DeviceId::Serial,
    DeviceId::Apu,
    DeviceId::Ppu,
];

pub struct Bus {
    pub boot: BootRom,
    pub cart: Cartridge,
    pub wram: WorkRam,
    pub hram: HighRam,
    pub timer: Timer,
    pub interrupts: InterruptController,
    pub joypad: Joypad,
    pub serial: Serial,
    pub apu: Apu,
    pub ppu: Ppu,
}

impl Bus {
    pub fn new() -> Self {
        Self {
            boot: BootRom::new(),
            cart: Cartridge::empty(),
            wram: WorkRam::new(),
            hram: HighRam::new(),
            timer: Timer::new(),
            interrupts: InterruptController::new(),
            joypad: Joypad::new(),
            serial: Serial::new(),
            apu: Apu::new(),
            ppu: Ppu::new(),
        }
    }

    fn device(&self, id: DeviceId) -> &dyn BusDevice {
        match id {
            DeviceId::Boot => &self.boot,
            DeviceId::Cartridge => &self.cart,
            DeviceId::WorkRam => &self.wram,
            DeviceId::HighRam => &self.hram,
            DeviceId::Timer => &self.timer,
            DeviceId::Interrupts => &self.interrupts,
            DeviceId::Joypad => &self.joypad,
            DeviceId::Serial => &self.serial,
            DeviceId::Apu => &self.apu,
            DeviceId::Ppu => &self.ppu,
        }
    }

    fn device_mut(&mut self, id: DeviceId) -> &mut dyn BusDevice {
        match id {
            DeviceId::Boot => &mut self.boot,
            DeviceId::Cartridge => &mut self.cart,
            DeviceId::WorkRam => &mut self.wram,
            DeviceId::HighRam => &mut self.hram,
            DeviceId::Timer => &mut self.timer,
            DeviceId::Interrupts => &mut self.interrupts,
            DeviceId::Joypad => &mut self.joypad,
            DeviceId::Serial => &mut self.serial,
            DeviceId::Apu => &mut self.apu,
            DeviceId::Ppu => &mut self.ppu,
        }
    }

    pub fn load_cartridge(&mut self, cart: Cartridge) {
        self.cart = cart;
    }

    pub fn load_boot_rom(&mut self, image: Vec<u8>) -> Result<(), BootRomError> {
        self.boot.load(image)
    }

    pub fn read(&self, addr: u16) -> u8 {
        for id in DEVICE_ORDER {
            let dev = self.device(id);
            if dev.claims(addr) {
                return dev.read(addr);
            }
        }
        OPEN_BUS
    }

    pub fn write(&mut self, addr: u16, val: u8) {
        for id in DEVICE_ORDER {
            if self.device(id).claims(addr) {
                self.device_mut(id).write(addr, val);
                if let Some(src) = self.ppu.take_dma_request() {
                    self.run_dma(src);
                }
                return;
            }
        }
        log::warn!("unmapped write {addr:#06X} <- {val:#04X}");
    }

    pub fn read_word(&self, addr: u16) -> u16 {
        let lo = self.read(addr) as u16;
        let hi = self.read(addr.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }

    pub fn write_word(&mut self, addr: u16, val: u16) {
        self.write(addr, (val & 0xFF) as u8);
        self.write(addr.wrapping_add(1), (val >> 8) as u8);
    }

    /// OAM DMA: copy 160 bytes from `src << 8` into the sprite table.
    ///
    /// Pages at 0xFE00 and up alias echo RAM, and a page inside the
    /// cartridge RAM window folds onto the span that is actually populated
    /// before the copy starts.
    fn run_dma(&mut self, src: u8) {
        let mut base = (src as u16) << 8;
        if base >= 0xFE00 {
            base = base.wrapping_sub(0x2000);
        }
        if (0xA000..=0xBFFF).contains(&base) {
            let span = self.cart.ram_len();
            if span > 0 {
                base = 0xA000 + ((base as usize - 0xA000) % span) as u16;
            }
        }

        #[cfg(feature = "ppu-trace")]
        {
            let region = if base < 0x8000 {
                "ROM"
            } else if (0xA000..=0xBFFF).contains(&base) {
                "CARTRAM"
            } else if (0xC000..=0xFDFF).contains(&base) {
                "WRAM"
            } else {
                "OTHER"
            };
            eprintln!("[DMA] OAM DMA src={base:04X} region={region}");
        }

        for idx in 0..OAM_DMA_LEN {
            let byte = self.read(base.wrapping_add(idx));
            self.ppu.oam[idx as usize] = byte;
        }
    }

    /// Advance every clocked device by `cycles` T-cycles.
    pub fn tick(&mut self, cycles: u32) {
        self.timer.tick(cycles, &mut self.interrupts);
        self.ppu.tick(cycles, &mut self.interrupts);
        self.apu.tick(cycles);
        self.serial.tick(cycles, &mut self.interrupts);
        self.cart.tick(cycles);
    }

    pub fn reset(&mut self) {
        for id in DEVICE_ORDER {
            self.device_mut(id).reset();
        }
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}
