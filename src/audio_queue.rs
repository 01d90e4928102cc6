//! Bounded stereo sample queue between the audio engine and the frontend.
//!
//! The engine pushes one `[left, right]` frame per sample period; the
//! frontend drains whenever it wants. The queue is bounded so a stalled
//! consumer costs memory-fixed latency rather than unbounded growth: on
//! overflow the oldest frames are dropped.

use std::collections::VecDeque;

/// Roughly a quarter second at 44.1 kHz.
pub const DEFAULT_CAPACITY: usize = 11025;

#[derive(Debug)]
pub struct SampleQueue {
    frames: VecDeque<[f32; 2]>,
    capacity: usize,
}

impl SampleQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, left: f32, right: f32) {
        while self.frames.len() >= self.capacity {
            self.frames.pop_front();
        }
        self.frames.push_back([left, right]);
    }

    /// Fill `out` with interleaved left/right samples. Any shortfall beyond
    /// what has been produced is zero-filled (silence). Returns the number
    /// of frames actually copied.
    pub fn drain_into(&mut self, out: &mut [f32]) -> usize {
        let mut copied = 0;
        for chunk in out.chunks_mut(2) {
            match self.frames.pop_front() {
                Some([l, r]) => {
                    chunk[0] = l;
                    if chunk.len() > 1 {
                        chunk[1] = r;
                    }
                    copied += 1;
                }
                None => chunk.fill(0.0),
            }
        }
        copied
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

impl Default for SampleQueue {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
