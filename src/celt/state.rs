//! Persistent, cross-frame encoder state (component C12 in `spec.md`
//! section 4.12), carried between calls to `encode_frame` the way the
//! teacher's `CeltFrameDecoder` carries its own `prev_energy`/postfilter
//! memory between decodes.

use super::tables::{MAX_BANDS, MAX_PITCH_PERIOD, OVERLAP};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpreadDecision {
    None,
    Light,
    Normal,
    Aggressive,
}

impl Default for SpreadDecision {
    fn default() -> Self {
        Self::Normal
    }
}

#[derive(Debug, Clone)]
pub struct ChannelState {
    pub preemph_mem: f32,
    pub dc_hp_mem: [f32; 2],
    pub overlap_mem: Vec<f32>,
    pub prefilter_mem: Vec<f32>,
    pub transient_hp_mem: f32,
    pub peak_energy: f32,
}

impl ChannelState {
    fn new() -> Self {
        Self {
            preemph_mem: 0.0,
            dc_hp_mem: [0.0, 0.0],
            overlap_mem: vec![0.0; OVERLAP],
            prefilter_mem: vec![0.0; MAX_PITCH_PERIOD],
            transient_hp_mem: 0.0,
            peak_energy: 0.0,
        }
    }

    fn reset(&mut self) {
        *self = Self::new();
    }
}

/// Everything the encoder remembers between frames.
#[derive(Debug, Clone)]
pub struct EncoderState {
    pub channels: Vec<ChannelState>,

    /// Previous two frames' per-band log-energy, for coarse-energy
    /// inter-frame prediction (`spec.md` section 4.7). One entry per
    /// channel, matching the `prev_log_energy[C*21]` ownership table in
    /// `spec.md` section 3 (mono/stereo are the only shapes the encoder's
    /// lifetime-fixed channel count ever takes).
    pub prev_log_energy: Vec<[f32; MAX_BANDS]>,
    pub prev_log_energy_2: Vec<[f32; MAX_BANDS]>,
    /// Running quantization error per band, fed back into fine-energy
    /// allocation the way the teacher's `CoarseEnergy::decode` tracked it.
    pub energy_error: Vec<[f32; MAX_BANDS]>,

    pub prefilter_period: usize,
    pub prefilter_gain: f32,
    pub prefilter_tapset: usize,

    pub spread_decision: SpreadDecision,
    pub tapset_decision: usize,
    pub intensity: usize,
    pub dual_stereo: bool,

    /// Previous frame's `Allocation::coded_bands`, fed back into the
    /// allocator's skip loop as both the depth-hysteresis reference and
    /// the signal-bandwidth gate (`spec.md` section 4.8; see
    /// `bit_alloc::compute`'s doc comment for why these two inputs are
    /// folded into one field here).
    pub last_coded_bands: usize,

    pub consec_transient: usize,
    pub attack_duration: usize,

    /// VBR running-average bitrate tracker used by the target-bit loop.
    pub vbr_reservoir: i32,
    pub vbr_count: u32,

    pub rng_state: u32,
}

impl EncoderState {
    pub fn new(channels: usize) -> Self {
        Self {
            channels: (0..channels).map(|_| ChannelState::new()).collect(),
            prev_log_energy: vec![[0.0; MAX_BANDS]; channels],
            prev_log_energy_2: vec![[0.0; MAX_BANDS]; channels],
            energy_error: vec![[0.0; MAX_BANDS]; channels],
            prefilter_period: 0,
            prefilter_gain: 0.0,
            prefilter_tapset: 0,
            spread_decision: SpreadDecision::default(),
            tapset_decision: 0,
            intensity: 0,
            dual_stereo: false,
            last_coded_bands: MAX_BANDS,
            consec_transient: 0,
            attack_duration: 0,
            vbr_reservoir: 0,
            vbr_count: 0,
            rng_state: 0,
        }
    }

    pub fn reset(&mut self) {
        for ch in &mut self.channels {
            ch.reset();
        }
        for e in self.prev_log_energy.iter_mut() {
            *e = [0.0; MAX_BANDS];
        }
        for e in self.prev_log_energy_2.iter_mut() {
            *e = [0.0; MAX_BANDS];
        }
        for e in self.energy_error.iter_mut() {
            *e = [0.0; MAX_BANDS];
        }
        self.prefilter_period = 0;
        self.prefilter_gain = 0.0;
        self.prefilter_tapset = 0;
        self.spread_decision = SpreadDecision::default();
        self.tapset_decision = 0;
        self.intensity = 0;
        self.dual_stereo = false;
        self.last_coded_bands = MAX_BANDS;
        self.consec_transient = 0;
        self.attack_duration = 0;
        self.vbr_reservoir = 0;
        self.vbr_count = 0;
        self.rng_state = 0;
    }

    /// Deterministic PRNG used for anti-collapse dithering, matching the
    /// teacher's `tell`-adjacent `rand` use in `CeltFrameDecoder::decode`.
    pub fn next_rand(&mut self) -> u32 {
        step_rand(&mut self.rng_state)
    }
}

/// Free-standing LCG step, shared by `EncoderState::next_rand` and
/// `pvq::fold`'s band-folding dither (which only has a `&mut u32`, not a
/// whole `EncoderState`, to avoid borrowing the state and a band's norm
/// slice at once).
pub fn step_rand(rng: &mut u32) -> u32 {
    *rng = rng.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
    *rng
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn reset_restores_defaults() {
        let mut st = EncoderState::new(2);
        st.prev_log_energy[0][0] = 5.0;
        st.next_rand();
        st.reset();
        assert_eq!(st.prev_log_energy[0][0], 0.0);
        assert_eq!(st.rng_state, 0);
        assert_eq!(st.channels.len(), 2);
    }

    #[test]
    fn rand_sequence_is_deterministic() {
        let mut a = EncoderState::new(1);
        let mut b = EncoderState::new(1);
        for _ in 0..5 {
            assert_eq!(a.next_rand(), b.next_rand());
        }
    }
}
