//! Per-frame scratch storage owned by the encoder.
//!
//! The teacher decoder used fixed-size stack arrays sized to its one
//! supported block size; this encoder supports all four CELT frame sizes
//! (120/240/480/960 samples) from a single long-lived instance, so the
//! scratch buffers are heap-allocated once and resized in place on first
//! use (`Vec::resize`), giving zero allocation in steady state once a
//! frame size has been seen.

use super::tables::{MAX_BANDS, MAX_FRAME_SIZE};

#[derive(Debug, Default)]
pub struct Scratch {
    pub mdct_in: Vec<f32>,
    pub mdct_out: Vec<f32>,
    pub freq: Vec<f32>,
    pub freq2: Vec<f32>,
    pub band_energy: Vec<f32>,
    pub band_log_energy: Vec<f32>,
    pub fine_quant: Vec<i32>,
    pub pulses: Vec<i32>,
    pub tf_res: Vec<i32>,
    pub collapse_masks: Vec<u8>,
    pub norm: Vec<f32>,
}

impl Scratch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resizes every buffer for a frame of `frame_size` samples per channel
    /// and `channels` channels. Cheap to call every frame: a no-op once the
    /// vectors are already the right length.
    pub fn prepare(&mut self, frame_size: usize, channels: usize) {
        let n = frame_size.max(MAX_FRAME_SIZE.min(frame_size));
        self.mdct_in.resize(n * channels, 0.0);
        self.mdct_out.resize(n * channels, 0.0);
        self.freq.resize(n * channels, 0.0);
        self.freq2.resize(n * channels, 0.0);
        self.band_energy.resize(MAX_BANDS * channels, 0.0);
        self.band_log_energy.resize(MAX_BANDS * channels, 0.0);
        self.fine_quant.resize(MAX_BANDS, 0);
        self.pulses.resize(MAX_BANDS, 0);
        self.tf_res.resize(MAX_BANDS, 0);
        self.collapse_masks.resize(MAX_BANDS * channels, 0);
        self.norm.resize(n * channels, 0.0);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn prepare_sizes_every_buffer() {
        let mut s = Scratch::new();
        s.prepare(960, 2);
        assert_eq!(s.mdct_in.len(), 960 * 2);
        assert_eq!(s.band_energy.len(), MAX_BANDS * 2);
        s.prepare(120, 1);
        assert_eq!(s.mdct_in.len(), 120);
    }
}
