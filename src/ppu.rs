//! Pixel processing unit: the per-scanline mode machine, the background,
//! window and sprite renderers, and the LCD register file.

use crate::bus::BusDevice;
use crate::interrupts::{Interrupt, InterruptController};

pub const SCREEN_WIDTH: usize = 160;
pub const SCREEN_HEIGHT: usize = 144;

// Timing per LCD mode in T-cycles
const MODE0_CYCLES: u16 = 204; // HBlank
const MODE1_CYCLES: u16 = 456; // One line during VBlank
const MODE2_CYCLES: u16 = 80; // OAM scan
const MODE3_CYCLES: u16 = 172; // Pixel transfer

// Number of lines spent in VBlank
const VBLANK_LINES: u8 = 10;

// Sprite limits
const MAX_SPRITES_PER_LINE: usize = 10;
const TOTAL_SPRITES: usize = 40;

const VRAM_SIZE: usize = 0x2000;
const OAM_SIZE: usize = 0xA0;

// Window X position is clipped if greater than this value
const WINDOW_X_MAX: u8 = 166;

// VRAM layout constants
const BG_MAP_0_BASE: usize = 0x1800;
const BG_MAP_1_BASE: usize = 0x1C00;
const TILE_DATA_0_BASE: usize = 0x0000;
const TILE_DATA_1_BASE: usize = 0x0800;

// LCD modes used in the `mode` field
pub const MODE_HBLANK: u8 = 0;
pub const MODE_VBLANK: u8 = 1;
pub const MODE_OAM: u8 = 2;
pub const MODE_TRANSFER: u8 = 3;

/// Classic pea-green shades in 0x00RRGGBB order, lightest first.
pub const DMG_PALETTE: [u32; 4] = [0x009BBC0F, 0x008BAC0F, 0x00306230, 0x000F380F];

pub struct Ppu {
    pub vram: [u8; VRAM_SIZE],
    pub oam: [u8; OAM_SIZE],

    lcdc: u8,
    stat: u8,
    scy: u8,
    scx: u8,
    ly: u8,
    lyc: u8,
    lyc_eq_ly: bool,
    pub dma: u8,
    bgp: u8,
    obp0: u8,
    obp1: u8,
    wy: u8,
    wx: u8,

    /// Internal window line counter
    win_line_counter: u8,

    mode_clock: u16,
    pub mode: u8,

    pub framebuffer: [u32; SCREEN_WIDTH * SCREEN_HEIGHT],
    line_color_zero: [bool; SCREEN_WIDTH],
    /// Latched sprites for the current scanline
    line_sprites: [Sprite; MAX_SPRITES_PER_LINE],
    sprite_count: usize,
    /// Indicates a completed frame is available in `framebuffer`
    frame_ready: bool,
    stat_irq_line: bool,
    mode2_vblank_irq_pending: bool,
    dma_request: Option<u8>,
    frame_counter: u64,
}

#[derive(Copy, Clone, Default)]
struct Sprite {
    x: i16,
    y: i16,
    tile: u8,
    flags: u8,
    oam_index: usize,
}

impl Ppu {
    pub fn new() -> Self {
        Self {
            vram: [0; VRAM_SIZE],
            oam: [0; OAM_SIZE],
            lcdc: 0,
            stat: 0,
            scy: 0,
            scx: 0,
            ly: 0,
            lyc: 0,
            lyc_eq_ly: false,
            dma: 0,
            bgp: 0,
            obp0: 0,
            obp1: 0,
            wy: 0,
            wx: 0,
            win_line_counter: 0,
            mode_clock: 0,
            mode: MODE_OAM,
            framebuffer: [0; SCREEN_WIDTH * SCREEN_HEIGHT],
            line_color_zero: [false; SCREEN_WIDTH],
            line_sprites: [Sprite::default(); MAX_SPRITES_PER_LINE],
            sprite_count: 0,
            frame_ready: false,
            stat_irq_line: false,
            mode2_vblank_irq_pending: false,
            dma_request: None,
            frame_counter: 0,
        }
    }

    /// Register state at the handoff point after the boot ROM.
    pub fn apply_boot_state(&mut self) {
        self.lcdc = 0x91;
        self.dma = 0xFF;
        self.bgp = 0xFC;
        self.obp0 = 0xFF;
        self.obp1 = 0xFF;
        self.win_line_counter = 0;
        self.ly = 0;
        self.mode = MODE_OAM;
        self.mode_clock = 0;
        self.lyc_eq_ly = self.ly == self.lyc;
        self.stat_irq_line = false;
        self.mode2_vblank_irq_pending = false;
    }

    /// Collect up to 10 sprites visible on the current scanline, ordered by
    /// X position and then OAM slot.
    fn oam_scan(&mut self) {
        let sprite_height: i16 = if self.lcdc & 0x04 != 0 { 16 } else { 8 };
        self.sprite_count = 0;
        for i in 0..TOTAL_SPRITES {
            if self.sprite_count >= MAX_SPRITES_PER_LINE {
                break;
            }
            let base = i * 4;
            let y = self.oam[base] as i16 - 16;
            if self.ly as i16 >= y && (self.ly as i16) < y + sprite_height {
                self.line_sprites[self.sprite_count] = Sprite {
                    x: self.oam[base + 1] as i16 - 8,
                    y,
                    tile: self.oam[base + 2],
                    flags: self.oam[base + 3],
                    oam_index: i,
                };
                self.sprite_count += 1;
            }
        }
        self.line_sprites[..self.sprite_count].sort_by_key(|s| (s.x, s.oam_index));
    }

    /// Returns true if a full frame has been rendered and is ready to display.
    pub fn frame_ready(&self) -> bool {
        self.frame_ready
    }

    /// Clears the frame ready flag after a frame has been consumed.
    pub fn clear_frame_flag(&mut self) {
        self.frame_ready = false;
    }

    /// Returns the current value of the internal window line counter.
    pub fn window_line_counter(&self) -> u8 {
        self.win_line_counter
    }

    /// Returns the current framebuffer. Call `frame_ready()` to check if a
    /// frame is complete. After presenting, call `clear_frame_flag()`.
    pub fn framebuffer(&self) -> &[u32; SCREEN_WIDTH * SCREEN_HEIGHT] {
        &self.framebuffer
    }

    /// Returns the number of frames that have been completed since power on.
    pub fn frames(&self) -> u64 {
        self.frame_counter
    }

    pub fn ly(&self) -> u8 {
        self.ly
    }

    /// Source page latched by the last DMA register write, if a transfer
    /// has not been carried out yet.
    pub fn take_dma_request(&mut self) -> Option<u8> {
        self.dma_request.take()
    }

    fn update_lyc_compare(&mut self) {
        if self.lcdc & 0x80 != 0 {
            self.lyc_eq_ly = self.ly == self.lyc;
        }
    }

    #[inline(always)]
    fn dmg_shade(palette: u8, color_id: u8) -> u8 {
        (palette >> (color_id * 2)) & 0x03
    }

    fn render_scanline(&mut self) {
        if self.lcdc & 0x80 == 0 || self.ly as usize >= SCREEN_HEIGHT {
            return;
        }

        self.line_color_zero.fill(false);

        let bg_enabled = self.lcdc & 0x01 != 0;

        // Pre-fill the scanline. When the background is disabled via LCDC
        // bit 0, every pixel outputs color 0 and sprites treat the line as
        // having color 0 underneath them.
        let bg_color = DMG_PALETTE[Self::dmg_shade(self.bgp, 0) as usize];
        for x in 0..SCREEN_WIDTH {
            let idx = self.ly as usize * SCREEN_WIDTH + x;
            self.framebuffer[idx] = bg_color;
            self.line_color_zero[x] = true;
        }

        if bg_enabled {
            let tile_map_base = if self.lcdc & 0x08 != 0 {
                BG_MAP_1_BASE
            } else {
                BG_MAP_0_BASE
            };
            let tile_data_base = if self.lcdc & 0x10 != 0 {
                TILE_DATA_0_BASE
            } else {
                TILE_DATA_1_BASE
            };

            // draw background
            for x in 0..SCREEN_WIDTH as u16 {
                let px = x.wrapping_add(self.scx as u16) & 0xFF;
                let tile_col = (px / 8) as usize;
                let tile_row = (((self.ly as u16 + self.scy as u16) & 0xFF) / 8) as usize;
                let tile_y = (((self.ly as u16 + self.scy as u16) & 0xFF) % 8) as usize;

                let tile_index = self.vram[tile_map_base + tile_row * 32 + tile_col];
                let addr = if self.lcdc & 0x10 != 0 {
                    tile_data_base + tile_index as usize * 16
                } else {
                    tile_data_base + ((tile_index as i8 as i16 + 128) as usize) * 16
                };
                let bit = 7 - (px % 8) as usize;
                let lo = self.vram[addr + tile_y * 2];
                let hi = self.vram[addr + tile_y * 2 + 1];
                let color_id = ((hi >> bit) & 1) << 1 | ((lo >> bit) & 1);
                let shade = Self::dmg_shade(self.bgp, color_id);
                let idx = self.ly as usize * SCREEN_WIDTH + x as usize;
                self.framebuffer[idx] = DMG_PALETTE[shade as usize];
                self.line_color_zero[x as usize] = color_id == 0;
            }

            // window
            let mut window_drawn = false;
            if self.lcdc & 0x20 != 0 && self.ly >= self.wy && self.wx <= WINDOW_X_MAX {
                let wx = self.wx.wrapping_sub(7) as u16;
                let window_map_base = if self.lcdc & 0x40 != 0 {
                    BG_MAP_1_BASE
                } else {
                    BG_MAP_0_BASE
                };
                let window_y = self.win_line_counter as usize;
                for x in wx..SCREEN_WIDTH as u16 {
                    let window_x = (x - wx) as usize;
                    let tile_col = window_x / 8;
                    let tile_row = window_y / 8;
                    let tile_y = window_y % 8;
                    let tile_x = window_x % 8;
                    let tile_index = self.vram[window_map_base + tile_row * 32 + tile_col];
                    let addr = if self.lcdc & 0x10 != 0 {
                        tile_data_base + tile_index as usize * 16
                    } else {
                        tile_data_base + ((tile_index as i8 as i16 + 128) as usize) * 16
                    };
                    let bit = 7 - tile_x;
                    let lo = self.vram[addr + tile_y * 2];
                    let hi = self.vram[addr + tile_y * 2 + 1];
                    let color_id = ((hi >> bit) & 1) << 1 | ((lo >> bit) & 1);
                    let shade = Self::dmg_shade(self.bgp, color_id);
                    let idx = self.ly as usize * SCREEN_WIDTH + x as usize;
                    self.framebuffer[idx] = DMG_PALETTE[shade as usize];
                    self.line_color_zero[x as usize] = color_id == 0;
                }
                window_drawn = true;
            }
            if window_drawn {
                self.win_line_counter = self.win_line_counter.wrapping_add(1);
            }
        }

        // sprites
        if self.lcdc & 0x02 != 0 {
            let sprite_height: i16 = if self.lcdc & 0x04 != 0 { 16 } else { 8 };
            let mut drawn = [false; SCREEN_WIDTH];
            for s in &self.line_sprites[..self.sprite_count] {
                let mut tile = s.tile;
                if sprite_height == 16 {
                    tile &= 0xFE;
                }
                let mut line_idx = self.ly as i16 - s.y;
                if s.flags & 0x40 != 0 {
                    line_idx = sprite_height - 1 - line_idx;
                }
                for px in 0..8 {
                    let bit = if s.flags & 0x20 != 0 { px } else { 7 - px };
                    let addr = (tile + ((line_idx as usize) >> 3) as u8) as usize * 16
                        + (line_idx as usize & 7) * 2;
                    let lo = self.vram[addr];
                    let hi = self.vram[addr + 1];
                    let color_id = ((hi >> bit) & 1) << 1 | ((lo >> bit) & 1);
                    if color_id == 0 {
                        continue;
                    }
                    let sx = s.x + px as i16;
                    if !(0i16..SCREEN_WIDTH as i16).contains(&sx) || drawn[sx as usize] {
                        continue;
                    }
                    let bg_zero = !bg_enabled || self.line_color_zero[sx as usize];
                    if s.flags & 0x80 != 0 && !bg_zero {
                        continue;
                    }
                    let shade = if s.flags & 0x10 != 0 {
                        Self::dmg_shade(self.obp1, color_id)
                    } else {
                        Self::dmg_shade(self.obp0, color_id)
                    };
                    let idx = self.ly as usize * SCREEN_WIDTH + sx as usize;
                    self.framebuffer[idx] = DMG_PALETTE[shade as usize];
                    drawn[sx as usize] = true;
                }
            }
        }
    }

    pub fn tick(&mut self, cycles: u32, interrupts: &mut InterruptController) {
        let mut remaining = cycles;
        while remaining > 0 {
            let increment = remaining.min(4);
            remaining -= increment;
            if self.lcdc & 0x80 == 0 {
                self.mode = MODE_HBLANK;
                self.ly = 0;
                self.mode_clock = 0;
                self.win_line_counter = 0;
                self.mode2_vblank_irq_pending = false;
                continue;
            }

            self.update_lyc_compare();

            self.mode_clock += increment as u16;

            match self.mode {
                MODE_HBLANK => {
                    if self.mode_clock >= MODE0_CYCLES {
                        self.mode_clock -= MODE0_CYCLES;
                        self.ly += 1;
                        self.update_lyc_compare();
                        if self.ly == SCREEN_HEIGHT as u8 {
                            self.mode = MODE_VBLANK;
                            self.mode2_vblank_irq_pending = true;
                            interrupts.request(Interrupt::VBlank);
                        } else {
                            self.mode = MODE_OAM;
                        }
                    }
                }
                MODE_VBLANK => {
                    if self.mode_clock >= MODE1_CYCLES {
                        self.mode_clock -= MODE1_CYCLES;
                        self.ly += 1;
                        self.update_lyc_compare();
                        if self.ly > SCREEN_HEIGHT as u8 + VBLANK_LINES - 1 {
                            self.ly = 0;
                            self.frame_ready = true;
                            self.win_line_counter = 0;
                            self.frame_counter = self.frame_counter.wrapping_add(1);
                            self.mode = MODE_OAM;
                            self.update_lyc_compare();
                        }
                    }
                }
                MODE_OAM => {
                    if self.mode_clock >= MODE2_CYCLES {
                        self.mode_clock -= MODE2_CYCLES;
                        self.oam_scan();
                        self.mode = MODE_TRANSFER;
                    }
                }
                MODE_TRANSFER => {
                    if self.mode_clock >= MODE3_CYCLES {
                        self.mode_clock -= MODE3_CYCLES;
                        self.render_scanline();
                        self.mode = MODE_HBLANK;
                    }
                }
                _ => {}
            }

            self.update_stat_irq(interrupts);
        }
    }

    fn update_stat_irq(&mut self, interrupts: &mut InterruptController) {
        let coincidence = self.lyc_eq_ly && self.stat & 0x40 != 0;
        let mode_signal = match self.mode {
            MODE_HBLANK => self.stat & 0x08 != 0,
            MODE_VBLANK => self.stat & 0x10 != 0,
            MODE_OAM => self.stat & 0x20 != 0,
            _ => false,
        };
        // The OAM-scan select bit also fires once at VBlank entry.
        let glitch = self.mode2_vblank_irq_pending && self.stat & 0x20 != 0;
        self.mode2_vblank_irq_pending = false;
        let current = coincidence || mode_signal;
        if (current && !self.stat_irq_line) || glitch {
            interrupts.request(Interrupt::Stat);
        }
        self.stat_irq_line = current || glitch;
    }
}

impl BusDevice for Ppu {
    fn claims(&self, addr: u16) -> bool {
        matches!(addr, 0x8000..=0x9FFF | 0xFE00..=0xFE9F | 0xFF40..=0xFF4B)
    }

    fn read(&self, addr: u16) -> u8 {
        match addr {
            0x8000..=0x9FFF => self.vram[addr as usize - 0x8000],
            0xFE00..=0xFE9F => self.oam[addr as usize - 0xFE00],
            0xFF40 => self.lcdc,
            0xFF41 => {
                0x80 | (self.stat & 0x78)
                    | (self.mode & 0x03)
                    | if self.lyc_eq_ly { 0x04 } else { 0 }
            }
            0xFF42 => self.scy,
            0xFF43 => self.scx,
            0xFF44 => self.ly,
            0xFF45 => self.lyc,
            0xFF46 => self.dma,
            0xFF47 => self.bgp,
            0xFF48 => self.obp0,
            0xFF49 => self.obp1,
            0xFF4A => self.wy,
            0xFF4B => self.wx,
            _ => 0xFF,
        }
    }

    fn write(&mut self, addr: u16, val: u8) {
        match addr {
            0x8000..=0x9FFF => self.vram[addr as usize - 0x8000] = val,
            0xFE00..=0xFE9F => self.oam[addr as usize - 0xFE00] = val,
            0xFF40 => {
                let was_on = self.lcdc & 0x80 != 0;
                self.lcdc = val;
                if was_on && self.lcdc & 0x80 == 0 {
                    self.mode = MODE_HBLANK;
                    self.mode_clock = 0;
                    self.win_line_counter = 0;
                    self.ly = 0;
                    // A disabled LCD shows a blank panel.
                    self.framebuffer.fill(DMG_PALETTE[0]);
                }
                if self.lcdc & 0x80 != 0 {
                    self.update_lyc_compare();
                }
            }
            0xFF41 => self.stat = val & 0x78,
            0xFF42 => self.scy = val,
            0xFF43 => self.scx = val,
            0xFF44 => {}
            0xFF45 => {
                self.lyc = val;
                self.update_lyc_compare();
            }
            0xFF46 => {
                self.dma = val;
                self.dma_request = Some(val);
            }
            0xFF47 => self.bgp = val,
            0xFF48 => self.obp0 = val,
            0xFF49 => self.obp1 = val,
            0xFF4A => self.wy = val,
            0xFF4B => self.wx = val,
            _ => {}
        }
    }

    fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for Ppu {
    fn default() -> Self {
        Self::new()
    }
}
