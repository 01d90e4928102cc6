//! Audio engine: two pulse channels, the wave-table channel, the noise
//! channel, the shared frame sequencer and the stereo mixer.
//!
//! Register reads go through a raw register file ORed with per-address
//! masks, so unreadable bits come back as ones exactly like the hardware.

use crate::audio_queue::SampleQueue;
use crate::bus::BusDevice;

#[cfg(feature = "apu-trace")]
macro_rules! apu_trace {
    ($($arg:tt)*) => {
        println!($($arg)*);
    };
}
#[cfg(not(feature = "apu-trace"))]
macro_rules! apu_trace {
    ($($arg:tt)*) => {};
}

const CPU_CLOCK_HZ: u32 = 4_194_304;
// 512 Hz frame sequencer tick
const FRAME_SEQUENCER_PERIOD: u32 = 8192;
const DEFAULT_SAMPLE_RATE: u32 = 44_100;

const POWER_ON_REGS: [u8; 0x30] = [
    0x80, 0xBF, 0xF3, 0xFF, 0xBF, 0xFF, 0x3F, 0x00, 0xFF, 0xBF, 0x7F, 0xFF, 0x9F, 0xFF, 0xBF, 0xFF,
    0xFF, 0x00, 0x00, 0xBF, 0x77, 0xF3, 0xF1, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

// Duty table for pulse channels (CH1, CH2). Each entry is an 8-step
// waveform. Index (0..3) corresponds to duty selector in NRx1:
// 0 -> 00000001 (12.5%)
// 1 -> 10000001 (25%)
// 2 -> 10000111 (50%)
// 3 -> 01111110 (75%)
const DUTY_TABLE: [[u8; 8]; 4] = [
    [0, 0, 0, 0, 0, 0, 0, 1], // 12.5% -> 00000001
    [1, 0, 0, 0, 0, 0, 0, 1], // 25%   -> 10000001
    [1, 0, 0, 0, 0, 1, 1, 1], // 50%   -> 10000111
    [0, 1, 1, 1, 1, 1, 1, 0], // 75%   -> 01111110
];

#[derive(Default, Clone, Copy)]
struct Envelope {
    initial: u8,
    period: u8,
    add: bool,
    volume: u8,
    timer: u8,
}

impl Envelope {
    fn clock(&mut self) {
        if self.timer > 0 {
            self.timer -= 1;
        }
        if self.timer == 0 {
            self.timer = if self.period == 0 { 8 } else { self.period };
            // A pace of 0 leaves the volume frozen.
            if self.period != 0 {
                if self.add && self.volume < 15 {
                    self.volume += 1;
                } else if !self.add && self.volume > 0 {
                    self.volume -= 1;
                }
            }
        }
    }

    fn reset(&mut self, val: u8) {
        self.initial = val >> 4;
        self.volume = self.initial;
        self.period = val & 0x07;
        self.add = val & 0x08 != 0;
        self.timer = if self.period == 0 { 8 } else { self.period };
    }
}

#[derive(Default)]
struct Sweep {
    period: u8,
    negate: bool,
    shift: u8,
    timer: u8,
    shadow: u16,
    enabled: bool,
    /// True if a subtraction sweep calculation has occurred since the last
    /// trigger.
    neg_used: bool,
}

impl Sweep {
    fn calculate(&self) -> u16 {
        let delta = self.shadow >> self.shift;
        if self.negate {
            self.shadow.wrapping_sub(delta)
        } else {
            self.shadow.wrapping_add(delta)
        }
    }

    /// Absorb an NR10 write. Returns true when the channel must shut off
    /// (leaving negate mode after a subtraction calculation).
    fn set_params(&mut self, val: u8) -> bool {
        let new_period = (val >> 4) & 0x07;
        let old_negate = self.negate;
        self.negate = val & 0x08 != 0;
        self.shift = val & 0x07;

        // Writing a pace of 0 disables further sweep iterations immediately.
        // A 0 to non-zero change reloads the timer so iterations resume
        // without waiting for the next trigger.
        if new_period == 0 {
            self.enabled = false;
        } else if self.period == 0 {
            self.timer = new_period;
            self.enabled = true;
        }

        self.period = new_period;
        if old_negate && !self.negate && self.neg_used {
            self.enabled = false;
            return true;
        }
        false
    }

    fn reload(&mut self, freq: u16) {
        self.shadow = freq;
        self.timer = if self.period == 0 { 8 } else { self.period };
        self.enabled = self.period != 0 || self.shift != 0;
        self.neg_used = false;
    }
}

#[derive(Default)]
struct SquareChannel {
    enabled: bool,
    dac_enabled: bool,
    length: u8,
    length_enable: bool,
    duty: u8,
    duty_pos: u8,
    frequency: u16,
    timer: i32,
    envelope: Envelope,
    sweep: Option<Sweep>,
}

impl SquareChannel {
    fn new(with_sweep: bool) -> Self {
        Self {
            sweep: with_sweep.then(Sweep::default),
            ..Default::default()
        }
    }

    fn period(&self) -> i32 {
        ((2048 - self.frequency) * 4) as i32
    }

    fn step(&mut self, cycles: u32) {
        if !self.enabled || !self.dac_enabled {
            return;
        }
        let mut cycles = cycles as i32;
        while self.timer <= cycles {
            cycles -= self.timer;
            self.timer = self.period();
            self.duty_pos = (self.duty_pos + 1) & 7;
        }
        self.timer -= cycles;
    }

    fn output(&self) -> u8 {
        if !self.enabled || !self.dac_enabled {
            return 0;
        }
        DUTY_TABLE[self.duty as usize][self.duty_pos as usize] * self.envelope.volume
    }

    fn clock_length(&mut self) {
        if self.length_enable && self.length > 0 {
            self.length -= 1;
            if self.length == 0 {
                self.enabled = false;
            }
        }
    }

    fn clock_sweep(&mut self) {
        let Some(sweep) = self.sweep.as_mut() else {
            return;
        };
        if !sweep.enabled {
            return;
        }
        if sweep.timer > 0 {
            sweep.timer -= 1;
        }
        if sweep.timer == 0 {
            sweep.timer = if sweep.period == 0 { 8 } else { sweep.period };
            let mut new_freq = sweep.calculate();
            if new_freq > 2047 {
                self.enabled = false;
                sweep.enabled = false;
            } else if sweep.shift != 0 {
                if sweep.negate {
                    sweep.neg_used = true;
                }
                sweep.shadow = new_freq;
                self.frequency = new_freq;
                // The second calculation is only an overflow check.
                new_freq = sweep.calculate();
                if new_freq > 2047 {
                    self.enabled = false;
                    sweep.enabled = false;
                }
            }
        }
    }
}

#[derive(Default)]
struct WaveChannel {
    enabled: bool,
    dac_enabled: bool,
    length: u16,
    length_enable: bool,
    volume: u8,
    position: u8,
    last_sample: u8,
    frequency: u16,
    timer: i32,
}

impl WaveChannel {
    fn period(&self) -> i32 {
        ((2048 - self.frequency) * 2) as i32
    }

    fn step(&mut self, cycles: u32, wave_ram: &[u8; 0x10]) {
        if !self.enabled || !self.dac_enabled {
            return;
        }
        let mut cycles = cycles as i32;
        while self.timer <= cycles {
            cycles -= self.timer;
            self.timer = self.period();
            self.position = (self.position + 1) & 0x1F;
            let byte = wave_ram[(self.position / 2) as usize];
            self.last_sample = if self.position & 1 == 0 {
                byte >> 4
            } else {
                byte & 0x0F
            };
        }
        self.timer -= cycles;
    }

    fn output(&self) -> u8 {
        if !self.enabled || !self.dac_enabled {
            return 0;
        }
        match self.volume {
            0 => 0,
            1 => self.last_sample,
            2 => self.last_sample >> 1,
            3 => self.last_sample >> 2,
            _ => 0,
        }
    }

    fn clock_length(&mut self) {
        if self.length_enable && self.length > 0 {
            self.length -= 1;
            if self.length == 0 {
                self.enabled = false;
            }
        }
    }
}

#[derive(Default)]
struct NoiseChannel {
    enabled: bool,
    dac_enabled: bool,
    length: u8,
    length_enable: bool,
    envelope: Envelope,
    clock_shift: u8,
    divisor: u8,
    width7: bool,
    lfsr: u16,
    timer: i32,
}

impl NoiseChannel {
    fn period(&self) -> i32 {
        let r = match self.divisor {
            0 => 8,
            _ => (self.divisor as i32) * 16,
        };
        r << self.clock_shift
    }

    fn step(&mut self, cycles: u32) {
        if !self.enabled || !self.dac_enabled {
            return;
        }
        if self.clock_shift >= 14 {
            return;
        }
        let mut cycles = cycles as i32;
        while self.timer <= cycles {
            cycles -= self.timer;
            self.timer = self.period();
            let bit0 = self.lfsr & 1;
            let bit1 = (self.lfsr >> 1) & 1;
            // Feedback is the XNOR of bits 0 and 1: 1 when they match.
            let bit = (!(bit0 ^ bit1)) & 1;
            self.lfsr >>= 1;
            self.lfsr |= bit << 14;
            if self.width7 {
                self.lfsr = (self.lfsr & !0x40) | (bit << 6);
            }
        }
        self.timer -= cycles;
    }

    fn output(&self) -> u8 {
        if !self.enabled || !self.dac_enabled {
            return 0;
        }
        if self.lfsr & 1 == 0 {
            self.envelope.volume
        } else {
            0
        }
    }

    fn clock_length(&mut self) {
        if self.length_enable && self.length > 0 {
            self.length -= 1;
            if self.length == 0 {
                self.enabled = false;
            }
        }
    }
}

struct FrameSequencer {
    step: u8,
}

impl FrameSequencer {
    fn new() -> Self {
        Self { step: 0 }
    }

    fn advance(&mut self) -> u8 {
        let s = self.step;
        self.step = (self.step + 1) & 7;
        s
    }
}

pub struct Apu {
    ch1: SquareChannel,
    ch2: SquareChannel,
    ch3: WaveChannel,
    ch4: NoiseChannel,
    wave_ram: [u8; 0x10],
    nr50: u8,
    nr51: u8,
    nr52: u8,
    regs: [u8; 0x30],
    sequencer: FrameSequencer,
    frame_timer: u32,
    sample_timer: u32,
    sample_rate: u32,
    samples: SampleQueue,
}

impl Apu {
    pub fn new() -> Self {
        let mut apu = Self {
            ch1: SquareChannel::new(true),
            ch2: SquareChannel::new(false),
            ch3: WaveChannel::default(),
            ch4: NoiseChannel::default(),
            wave_ram: [0; 0x10],
            nr50: 0x77,
            nr51: 0xF3,
            nr52: 0xF1,
            regs: POWER_ON_REGS,
            sequencer: FrameSequencer::new(),
            frame_timer: 0,
            sample_timer: 0,
            sample_rate: DEFAULT_SAMPLE_RATE,
            samples: SampleQueue::default(),
        };

        // Channel 1 comes out of the boot ROM still playing its chime.
        apu.ch1.duty = 2;
        apu.ch1.length = 0x3F;
        apu.ch1.envelope.initial = 0xF;
        apu.ch1.envelope.volume = 0xF;
        apu.ch1.envelope.period = 3;
        apu.ch1.frequency = 0x03FF;
        apu.ch1.dac_enabled = true;

        apu.ch2.length = 0x3F;
        apu.ch2.frequency = 0x03FF;

        apu.ch3.length = 0xFF;
        apu.ch3.dac_enabled = true;

        apu.ch4.length = 0xFF;

        apu
    }

    fn read_mask(addr: u16) -> u8 {
        match addr {
            0xFF10 => 0x80,
            0xFF11 => 0x3F,
            0xFF12 => 0x00,
            0xFF13 => 0xFF,
            0xFF14 => 0xBF,
            0xFF16 => 0x3F,
            0xFF17 => 0x00,
            0xFF18 => 0xFF,
            0xFF19 => 0xBF,
            0xFF1A => 0x7F,
            0xFF1B => 0xFF,
            0xFF1C => 0x9F,
            0xFF1D => 0xFF,
            0xFF1E => 0xBF,
            0xFF20 => 0xFF,
            0xFF21 => 0x00,
            0xFF22 => 0x00,
            0xFF23 => 0xBF,
            0xFF24 => 0x00,
            0xFF25 => 0x00,
            0xFF26 => 0x70,
            0xFF15 | 0xFF1F => 0xFF,
            0xFF30..=0xFF3F => 0x00,
            _ => 0xFF,
        }
    }

    fn power_off(&mut self) {
        self.ch1 = SquareChannel::new(true);
        self.ch2 = SquareChannel::new(false);
        self.ch3 = WaveChannel::default();
        self.ch4 = NoiseChannel::default();
        self.regs.fill(0);
        self.nr50 = 0;
        self.nr51 = 0;
        self.frame_timer = 0;
        self.sequencer.step = 0;
    }

    fn trigger_square(&mut self, idx: u8) {
        let reg_idx = if idx == 1 { 0x04 } else { 0x09 };
        let value = self.regs[reg_idx];
        let length_enable = value & 0x40 != 0;
        let seq_step = self.sequencer.step;

        let mut freq_updated = false;
        {
            let ch = if idx == 1 {
                &mut self.ch1
            } else {
                &mut self.ch2
            };

            apu_trace!(
                "sq{} trigger freq={} duty_pos={} length={}",
                idx,
                ch.frequency,
                ch.duty_pos,
                ch.length
            );

            ch.enabled = ch.dac_enabled;
            ch.timer = ch.period();
            ch.envelope.volume = ch.envelope.initial;
            let mut env_timer = if ch.envelope.period == 0 {
                8
            } else {
                ch.envelope.period
            };
            if (seq_step + 1) & 7 == 7 {
                env_timer = env_timer.wrapping_add(1);
            }
            ch.envelope.timer = env_timer;
            ch.length_enable = length_enable;

            if idx == 1
                && let Some(s) = ch.sweep.as_mut()
            {
                s.reload(ch.frequency);
                if s.shift != 0 {
                    let new_freq = s.calculate();
                    if new_freq > 2047 {
                        ch.enabled = false;
                        s.enabled = false;
                    } else {
                        if s.negate {
                            s.neg_used = true;
                        }
                        s.shadow = new_freq;
                        ch.frequency = new_freq;
                        freq_updated = true;
                    }
                }
            }

            if ch.length == 0 {
                ch.length = 64;
            }
            if ch.length == 64 && length_enable && matches!(seq_step, 0 | 2 | 4 | 6) {
                ch.length = 63;
            }
        }

        if idx == 1 && freq_updated {
            self.update_ch1_freq_regs();
        }
    }

    fn trigger_wave(&mut self) {
        // Retriggering a playing channel corrupts the start of wave RAM
        // with whatever 4-byte block is currently being read.
        if self.ch3.enabled {
            let byte_index = (self.ch3.position / 2) as usize;
            if byte_index < 4 {
                self.wave_ram[0] = self.wave_ram[byte_index];
            } else {
                let base = byte_index & !0x03;
                for i in 0..4 {
                    self.wave_ram[i] = self.wave_ram[base + i];
                }
            }
        }
        self.ch3.enabled = self.ch3.dac_enabled;
        self.ch3.position = 0;
        self.ch3.timer = self.ch3.period();
        if self.ch3.length == 0 {
            self.ch3.length = 256;
        }
        if self.ch3.length == 256
            && self.ch3.length_enable
            && matches!(self.sequencer.step, 0 | 2 | 4 | 6)
        {
            self.ch3.length = 255;
        }
    }

    fn trigger_noise(&mut self) {
        apu_trace!(
            "noise trigger shift={} divisor={} width7={}",
            self.ch4.clock_shift,
            self.ch4.divisor,
            self.ch4.width7
        );
        self.ch4.enabled = self.ch4.dac_enabled;
        self.ch4.lfsr = 0;
        self.ch4.timer = self.ch4.period();
        self.ch4.envelope.volume = self.ch4.envelope.initial;
        let mut env_timer = if self.ch4.envelope.period == 0 {
            8
        } else {
            self.ch4.envelope.period
        };
        if (self.sequencer.step + 1) & 7 == 7 {
            env_timer = env_timer.wrapping_add(1);
        }
        self.ch4.envelope.timer = env_timer;
        if self.ch4.length == 0 {
            self.ch4.length = 64;
        }
        if self.ch4.length == 64
            && self.ch4.length_enable
            && matches!(self.sequencer.step, 0 | 2 | 4 | 6)
        {
            self.ch4.length = 63;
        }
    }

    /// A length-enable rising edge clocks the counter once more when the
    /// sequencer is in the half of its cycle that skips length steps.
    fn extra_length_clock(upcoming_step: u8) -> bool {
        !matches!(upcoming_step, 0 | 2 | 4 | 6)
    }

    fn clock_frame_sequencer(&mut self, step: u8) {
        if matches!(step, 0 | 2 | 4 | 6) {
            self.ch1.clock_length();
            self.ch2.clock_length();
            self.ch3.clock_length();
            self.ch4.clock_length();
        }
        if step == 2 || step == 6 {
            self.ch1.clock_sweep();
            self.update_ch1_freq_regs();
        }
        if step == 7 {
            self.ch1.envelope.clock();
            self.ch2.envelope.clock();
            self.ch4.envelope.clock();
        }
    }

    /// Mirror the current channel 1 frequency into NR13/NR14.
    fn update_ch1_freq_regs(&mut self) {
        let freq = self.ch1.frequency;
        self.regs[0x03] = (freq & 0xFF) as u8;
        self.regs[0x04] = (self.regs[0x04] & !0x07) | ((freq >> 8) as u8 & 0x07);
    }

    pub fn tick(&mut self, cycles: u32) {
        let cps = CPU_CLOCK_HZ / self.sample_rate;
        for _ in 0..cycles {
            if self.nr52 & 0x80 != 0 {
                self.frame_timer += 1;
                if self.frame_timer >= FRAME_SEQUENCER_PERIOD {
                    self.frame_timer -= FRAME_SEQUENCER_PERIOD;
                    let step = self.sequencer.advance();
                    self.clock_frame_sequencer(step);
                }
                self.ch1.step(1);
                self.ch2.step(1);
                self.ch3.step(1, &self.wave_ram);
                self.ch4.step(1);
            }
            self.sample_timer += 1;
            if self.sample_timer >= cps {
                self.sample_timer -= cps;
                let [left, right] = self.mix_output();
                self.samples.push(left, right);
            }
        }
    }

    fn mix_output(&self) -> [f32; 2] {
        fn dac(sample: u8, dac_enabled: bool) -> f32 {
            if dac_enabled {
                (sample as f32 / 7.5) - 1.0
            } else {
                0.0
            }
        }

        let ch = [
            dac(self.ch1.output(), self.ch1.dac_enabled),
            dac(self.ch2.output(), self.ch2.dac_enabled),
            dac(self.ch3.output(), self.ch3.dac_enabled),
            dac(self.ch4.output(), self.ch4.dac_enabled),
        ];

        let mut left = 0.0;
        let mut right = 0.0;
        for (i, sample) in ch.iter().enumerate() {
            if self.nr51 & (0x10 << i) != 0 {
                left += sample;
            }
            if self.nr51 & (0x01 << i) != 0 {
                right += sample;
            }
        }

        let left_vol = ((self.nr50 >> 4) & 0x07) + 1;
        let right_vol = (self.nr50 & 0x07) + 1;
        [
            (left / 4.0) * (left_vol as f32 / 8.0),
            (right / 4.0) * (right_vol as f32 / 8.0),
        ]
    }

    pub fn set_sample_rate(&mut self, rate: u32) {
        self.sample_rate = rate.max(1);
    }

    /// Drain queued stereo frames into `out`, padding any shortfall with
    /// silence. Returns the number of frames that carried real samples.
    pub fn drain_samples(&mut self, out: &mut [f32]) -> usize {
        self.samples.drain_into(out)
    }

    pub fn queued_frames(&self) -> usize {
        self.samples.len()
    }

    pub fn sequencer_step(&self) -> u8 {
        self.sequencer.step
    }

    pub fn ch1_frequency(&self) -> u16 {
        self.ch1.frequency
    }

    pub fn ch1_volume(&self) -> u8 {
        self.ch1.envelope.volume
    }

    pub fn ch1_length(&self) -> u8 {
        self.ch1.length
    }

    pub fn ch4_lfsr(&self) -> u16 {
        self.ch4.lfsr
    }
}

impl BusDevice for Apu {
    fn claims(&self, addr: u16) -> bool {
        matches!(addr, 0xFF10..=0xFF3F)
    }

    fn read(&self, addr: u16) -> u8 {
        if addr == 0xFF26 {
            let mut val = self.nr52 & 0x80;
            if self.ch1.enabled {
                val |= 0x01;
            }
            if self.ch2.enabled {
                val |= 0x02;
            }
            if self.ch3.enabled {
                val |= 0x04;
            }
            if self.ch4.enabled {
                val |= 0x08;
            }
            return val | Self::read_mask(addr);
        }

        if (0xFF30..=0xFF3F).contains(&addr) {
            // Wave RAM is only reachable while the channel is idle.
            if self.ch3.enabled && self.ch3.dac_enabled {
                return 0xFF;
            }
            return self.wave_ram[(addr - 0xFF30) as usize];
        }

        let idx = (addr - 0xFF10) as usize;
        self.regs[idx] | Self::read_mask(addr)
    }

    fn write(&mut self, addr: u16, val: u8) {
        // Power off gates every register except NR52 and wave RAM.
        if self.nr52 & 0x80 == 0 && addr != 0xFF26 && !(0xFF30..=0xFF3F).contains(&addr) {
            return;
        }

        if addr != 0xFF26 {
            self.regs[(addr - 0xFF10) as usize] = val;
        }

        match addr {
            0xFF10 => {
                if let Some(s) = self.ch1.sweep.as_mut()
                    && s.set_params(val)
                {
                    self.ch1.enabled = false;
                }
            }
            0xFF11 => {
                self.ch1.duty = val >> 6;
                self.ch1.length = 64 - (val & 0x3F);
            }
            0xFF12 => {
                if self.ch1.enabled {
                    self.ch1.envelope.initial = val >> 4;
                    self.ch1.envelope.period = val & 0x07;
                    self.ch1.envelope.add = val & 0x08 != 0;
                } else {
                    self.ch1.envelope.reset(val);
                }
                self.ch1.dac_enabled = val & 0xF8 != 0;
                if !self.ch1.dac_enabled {
                    self.ch1.enabled = false;
                }
            }
            0xFF13 => self.ch1.frequency = (self.ch1.frequency & 0x700) | val as u16,
            0xFF14 => {
                let prev = self.ch1.length_enable;
                self.ch1.length_enable = val & 0x40 != 0;
                if !prev
                    && self.ch1.length_enable
                    && Self::extra_length_clock((self.sequencer.step + 1) & 7)
                {
                    self.ch1.clock_length();
                }
                self.ch1.frequency = (self.ch1.frequency & 0xFF) | (((val & 0x07) as u16) << 8);
                if val & 0x80 != 0 {
                    self.trigger_square(1);
                }
            }
            0xFF16 => {
                self.ch2.duty = val >> 6;
                self.ch2.length = 64 - (val & 0x3F);
            }
            0xFF17 => {
                if self.ch2.enabled {
                    self.ch2.envelope.initial = val >> 4;
                    self.ch2.envelope.period = val & 0x07;
                    self.ch2.envelope.add = val & 0x08 != 0;
                } else {
                    self.ch2.envelope.reset(val);
                }
                self.ch2.dac_enabled = val & 0xF8 != 0;
                if !self.ch2.dac_enabled {
                    self.ch2.enabled = false;
                }
            }
            0xFF18 => self.ch2.frequency = (self.ch2.frequency & 0x700) | val as u16,
            0xFF19 => {
                let prev = self.ch2.length_enable;
                self.ch2.length_enable = val & 0x40 != 0;
                if !prev
                    && self.ch2.length_enable
                    && Self::extra_length_clock((self.sequencer.step + 1) & 7)
                {
                    self.ch2.clock_length();
                }
                self.ch2.frequency = (self.ch2.frequency & 0xFF) | (((val & 0x07) as u16) << 8);
                if val & 0x80 != 0 {
                    self.trigger_square(2);
                }
            }
            0xFF1A => {
                self.ch3.dac_enabled = val & 0x80 != 0;
                if !self.ch3.dac_enabled {
                    self.ch3.enabled = false;
                }
            }
            0xFF1B => self.ch3.length = 256 - val as u16,
            0xFF1C => self.ch3.volume = (val >> 5) & 0x03,
            0xFF1D => self.ch3.frequency = (self.ch3.frequency & 0x700) | val as u16,
            0xFF1E => {
                let prev = self.ch3.length_enable;
                self.ch3.length_enable = val & 0x40 != 0;
                if !prev
                    && self.ch3.length_enable
                    && Self::extra_length_clock((self.sequencer.step + 1) & 7)
                    && self.ch3.length > 0
                {
                    self.ch3.clock_length();
                }
                self.ch3.frequency = (self.ch3.frequency & 0xFF) | (((val & 0x07) as u16) << 8);
                if val & 0x80 != 0 {
                    self.trigger_wave();
                }
            }
            0xFF20 => self.ch4.length = 64 - (val & 0x3F),
            0xFF21 => {
                if self.ch4.enabled {
                    self.ch4.envelope.initial = val >> 4;
                    self.ch4.envelope.period = val & 0x07;
                    self.ch4.envelope.add = val & 0x08 != 0;
                } else {
                    self.ch4.envelope.reset(val);
                }
                self.ch4.dac_enabled = val & 0xF8 != 0;
                if !self.ch4.dac_enabled {
                    self.ch4.enabled = false;
                }
            }
            0xFF22 => {
                let new_width7 = val & 0x08 != 0;
                if !self.ch4.width7 && new_width7 && (self.ch4.lfsr & 0x7F) == 0x7F {
                    self.ch4.enabled = false;
                }
                self.ch4.clock_shift = val >> 4;
                self.ch4.width7 = new_width7;
                self.ch4.divisor = val & 0x07;
            }
            0xFF23 => {
                let prev = self.ch4.length_enable;
                self.ch4.length_enable = val & 0x40 != 0;
                if !prev
                    && self.ch4.length_enable
                    && Self::extra_length_clock((self.sequencer.step + 1) & 7)
                    && self.ch4.length > 0
                {
                    self.ch4.clock_length();
                }
                if val & 0x80 != 0 {
                    self.trigger_noise();
                }
            }
            0xFF24 => self.nr50 = val,
            0xFF25 => self.nr51 = val,
            0xFF26 => {
                if val & 0x80 == 0 {
                    self.nr52 &= !0x80;
                    self.power_off();
                } else {
                    if self.nr52 & 0x80 == 0 {
                        self.sequencer.step = 0;
                        self.frame_timer = 0;
                    }
                    self.nr52 |= 0x80;
                }
                self.regs[(addr - 0xFF10) as usize] = 0x70 | (self.nr52 & 0x80);
            }
            0xFF30..=0xFF3F => {
                if !(self.ch3.enabled && self.ch3.dac_enabled) {
                    self.wave_ram[(addr - 0xFF30) as usize] = val;
                }
            }
            _ => {}
        }
    }

    fn reset(&mut self) {
        let rate = self.sample_rate;
        *self = Self::new();
        self.sample_rate = rate;
    }
}

impl Default for Apu {
    fn default() -> Self {
        Self::new()
    }
}
