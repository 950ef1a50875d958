//! Top-level encoder (component C13): owns persistent state and scratch
//! storage, and drives the per-frame pipeline in the exact range-coder
//! write order section 4.12 specifies. The decoder reads in this same
//! order; nothing here may reorder a write relative to another.

use log::{debug, trace};

use crate::celt::bit_alloc::{self, Allocation};
use crate::celt::state::{step_rand, EncoderState, SpreadDecision};
use crate::celt::tables::{self, MAX_BANDS};
use crate::celt::{bands, coarse_energy, dynalloc, fine_energy, mdct, preemphasis, prefilter, pvq, scratch::Scratch, spread, tf, transient, vbr};
use crate::config::{Channels, EncoderConfig};
use crate::entropy::{ICDFContext, RangeCodingEncoder};
use crate::error::{EncoderError, Result, VALID_FRAME_SIZES};

const SAMPLE_RATE: u32 = 48_000;
const SILENCE_THRESHOLD: f64 = 1e-10;
const MAX_PACKET_BYTES: i32 = 1275;

fn log_energy_at_lm(frame_size: usize) -> Option<usize> {
    match frame_size {
        120 => Some(0),
        240 => Some(1),
        480 => Some(2),
        960 => Some(3),
        _ => None,
    }
}

/// A fully coded CELT frame, ready to be sent as an Opus payload by an
/// outer (out-of-scope) packetization layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    pub data: Vec<u8>,
    /// The range coder's state at finalize, the `OPUS_GET_FINAL_RANGE`
    /// equivalent consumers diff across encoder versions to catch drift.
    pub final_range: u32,
}

/// Shifts `mem` left by `new.len()` (discarding the oldest samples) and
/// appends `new`, keeping `mem`'s length fixed. Used for the prefilter's
/// rolling pitch-period history, which (unlike MDCT overlap) is never
/// resized to the current frame size.
fn push_history(mem: &mut [f32], new: &[f32]) {
    if new.len() >= mem.len() {
        let start = new.len() - mem.len();
        mem.copy_from_slice(&new[start..]);
    } else {
        let keep = mem.len() - new.len();
        mem.copy_within(new.len().., 0);
        mem[keep..].copy_from_slice(new);
    }
}

/// Codes one shape vector with `k` pulses, or folds it from `prev` when `k`
/// is zero (`spec.md` section 4.10 step 8). Returns the pulse vector coded
/// (all zero for a fold) so the caller can derive a collapse mask.
fn code_or_fold(
    range: &mut RangeCodingEncoder,
    shape: &mut [f32],
    k: usize,
    spread: SpreadDecision,
    lm: usize,
    rng: &mut u32,
    prev: &Option<Vec<f32>>,
) -> Vec<i32> {
    if k == 0 {
        pvq::fold(shape, prev.as_deref(), rng);
        vec![0i32; shape.len()]
    } else {
        pvq::encode_band(range, shape, k, spread, lm)
    }
}

pub struct Encoder {
    config: EncoderConfig,
    channels: Channels,
    state: EncoderState,
    scratch: Scratch,
    /// Smoothed cross-frame tonality estimate, read by the VBR target loop
    /// before this frame's own tonality is known (the loop runs ahead of
    /// band-energy computation, per section 4.12's step order).
    tonality: f32,
    tonal_average: f32,
    delayed_intra: f32,
    has_prior_frame: bool,
}

impl Encoder {
    pub fn new(channels: Channels) -> Self {
        Self {
            config: EncoderConfig::default(),
            channels,
            state: EncoderState::new(channels.count()),
            scratch: Scratch::new(),
            tonality: 0.5,
            tonal_average: 256.0,
            delayed_intra: 1.0,
            has_prior_frame: false,
        }
    }

    pub fn with_config(mut self, config: EncoderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut EncoderConfig {
        &mut self.config
    }

    pub fn channels(&self) -> Channels {
        self.channels
    }

    /// Restores every persistent buffer to its construction-time defaults,
    /// per section 5's reset semantics.
    pub fn reset(&mut self) {
        self.state.reset();
        self.tonality = 0.5;
        self.tonal_average = 256.0;
        self.delayed_intra = 1.0;
        self.has_prior_frame = false;
    }

    /// Encodes one frame of `frame_size` samples per channel, interleaved
    /// for stereo. Returns the coded bytes and the final range-coder state.
    pub fn encode_frame(&mut self, pcm: &[f64], frame_size: usize) -> Result<EncodedFrame> {
        if !VALID_FRAME_SIZES.contains(&frame_size) {
            return Err(EncoderError::InvalidFrameSize(frame_size));
        }
        let channels_n = self.channels.count();
        let expected = frame_size * channels_n;
        if pcm.len() != expected {
            return Err(EncoderError::InvalidInputLength { got: pcm.len(), expected });
        }
        let lm = log_energy_at_lm(frame_size).expect("frame size already validated");

        self.scratch.prepare(frame_size, channels_n);

        let mut channel_pcm: Vec<Vec<f32>> = vec![vec![0.0f32; frame_size]; channels_n];
        for (i, &sample) in pcm.iter().enumerate() {
            let ch = i % channels_n;
            let idx = i / channels_n;
            channel_pcm[ch][idx] = sample as f32;
        }

        let silent = pcm.iter().all(|&s| s.abs() < SILENCE_THRESHOLD);

        for ch in 0..channels_n {
            preemphasis::dc_reject(
                &mut channel_pcm[ch],
                &mut self.state.channels[ch].dc_hp_mem,
                self.config.dc_reject_enabled(),
            );
            preemphasis::pre_emphasis(&mut channel_pcm[ch], &mut self.state.channels[ch].preemph_mem);
        }

        let mut is_transient = self.config.force_transient();
        let mut tf_estimate = 0.0f32;
        for ch in 0..channels_n {
            let result = transient::analyze(
                &channel_pcm[ch],
                &mut self.state.channels[ch].transient_hp_mem,
                self.config.allow_weak_transients(),
            );
            is_transient |= result.is_transient;
            tf_estimate = tf_estimate.max(result.tf_estimate);
        }
        trace!(target: "celt_encoder::transient", "is_transient={is_transient} tf_estimate={tf_estimate}");

        let bitrate = self.config.effective_bitrate_bps(self.channels);
        let nominal_bits_q3 =
            ((bitrate as u64 * frame_size as u64 * 8) / SAMPLE_RATE as u64) as i32;
        let vbr_target = vbr::compute_target(
            nominal_bits_q3,
            is_transient,
            self.tonality,
            self.state.vbr_reservoir,
            self.config.constrained_vbr(),
        );
        let total_bits_q3 = if self.config.vbr() { vbr_target.bits } else { nominal_bits_q3 };
        let target_bytes = ((total_bits_q3 / 64).clamp(2, MAX_PACKET_BYTES)) as usize;
        debug!(target: "celt_encoder::vbr", "target_bytes={target_bytes} vbr={}", self.config.vbr());

        let mut range = RangeCodingEncoder::new(target_bytes);
        if !self.config.vbr() {
            range.shrink(target_bytes);
        }
        let total_bits = (target_bytes as i32) * 64;

        if silent {
            range.encode_bit_logp(true, 15);
            range.to_end();
            let final_range = range.final_range();
            let data = range.done();
            self.has_prior_frame = true;
            return Ok(EncodedFrame { data, final_range });
        }
        range.encode_bit_logp(false, 15);

        // Postfilter (prefilter) search and signaling (C5).
        let mut postfilter_applied = false;
        if !self.config.hybrid() && range.tell_frac() as i32 + 16 * 8 <= total_bits {
            let search_signal: Vec<f32> = if channels_n == 2 {
                channel_pcm[0].iter().zip(channel_pcm[1].iter()).map(|(&a, &b)| 0.5 * (a + b)).collect()
            } else {
                channel_pcm[0].clone()
            };
            let decision = prefilter::search(&search_signal, &self.state.channels[0]);
            let accept = decision.enabled && decision.gain > 0.0;
            range.encode_bit_logp(accept, 1);
            if accept {
                let octave = (((decision.period.max(16) as f32) / 16.0).log2().floor() as i32)
                    .clamp(0, 5) as usize;
                let base = 16usize << octave;
                let residual_bits = 4 + octave;
                let pitch_residual =
                    decision.period.saturating_sub(base).min((1usize << residual_bits) - 1);
                let qg = ((decision.gain / (3.0 / 32.0)).round() as i32).clamp(0, 7) as u32;

                range.encode_uniform(octave, 6);
                range.encode_raw_bits(pitch_residual as u32, residual_bits);
                range.encode_raw_bits(qg, 3);
                let tapset_icdf =
                    ICDFContext { total: tables::TAPSET_MODEL_DICT[2], dist: &tables::TAPSET_MODEL_DICT[..] };
                range.encode_icdf(decision.tapset, &tapset_icdf);

                for ch in 0..channels_n {
                    prefilter::apply(&mut channel_pcm[ch], &self.state.channels[ch].prefilter_mem, &decision);
                }
                self.state.prefilter_period = decision.period;
                self.state.prefilter_gain = decision.gain;
                self.state.prefilter_tapset = decision.tapset;
                self.state.tapset_decision = decision.tapset;
                postfilter_applied = true;
                debug!(target: "celt_encoder::prefilter", "accepted period={} gain={} tapset={}", decision.period, decision.gain, decision.tapset);
            } else {
                trace!(target: "celt_encoder::prefilter", "rejected gain={}", decision.gain);
            }
        }
        for ch in 0..channels_n {
            let history_source = channel_pcm[ch].clone();
            push_history(&mut self.state.channels[ch].prefilter_mem, &history_source);
        }
        let _ = postfilter_applied;

        // Transient flag (step 5).
        if lm > 0 && range.tell_frac() as i32 + 3 * 8 <= total_bits {
            range.encode_bit_logp(is_transient, 3);
        } else {
            is_transient = false;
        }

        // Intra flag (step 6). A full two-pass cost comparison is out of
        // scope for this core; intra is forced on the first frame (no
        // prior energy to predict from) or when the caller asks for it.
        let mut intra = self.config.force_intra() || !self.has_prior_frame;
        if range.tell_frac() as i32 + 3 * 8 <= total_bits {
            range.encode_bit_logp(intra, 3);
        } else {
            intra = false;
        }

        let start = 0usize;
        let end = self.config.bandwidth().band_count().min(MAX_BANDS);
        let num_blocks = if is_transient { 1usize << lm } else { 1 };
        let _ = num_blocks;

        // MDCT (C2).
        for ch in 0..channels_n {
            if self.state.channels[ch].overlap_mem.len() != frame_size {
                self.state.channels[ch].overlap_mem.resize(frame_size, 0.0);
            }
            let freq_slice = &mut self.scratch.freq[ch * frame_size..(ch + 1) * frame_size];
            mdct::analyze(&channel_pcm[ch], &mut self.state.channels[ch].overlap_mem, freq_slice, lm);
        }

        // Band energy and normalization (C6).
        let mut energy = vec![[0.0f32; MAX_BANDS]; channels_n];
        let mut log_energy = vec![[0.0f32; MAX_BANDS]; channels_n];
        for ch in 0..channels_n {
            let freq_slice = &self.scratch.freq[ch * frame_size..(ch + 1) * frame_size];
            let norm_slice = &mut self.scratch.norm[ch * frame_size..(ch + 1) * frame_size];
            bands::compute(freq_slice, lm, start, end, &mut energy[ch], &mut log_energy[ch], norm_slice);
        }

        // Coarse energy (C7): shift the two-frame history, then encode.
        for ch in 0..channels_n {
            self.state.prev_log_energy_2[ch] = self.state.prev_log_energy[ch];
        }
        for ch in 0..channels_n {
            coarse_energy::encode(
                &mut range,
                &log_energy[ch],
                &mut self.state.prev_log_energy[ch],
                &mut self.state.energy_error[ch],
                start,
                end,
                lm,
                intra,
            );
        }

        // TF analysis and encode (part of C10).
        let tf_res = tf::analyze(tf_estimate, start, end);
        tf::encode(&mut range, &tf_res, start, end, lm, is_transient);

        // Tonality + spread decision.
        let mut combined_energy = [0.0f32; MAX_BANDS];
        for b in 0..MAX_BANDS {
            let sum: f32 = (0..channels_n).map(|ch| energy[ch][b]).sum();
            combined_energy[b] = sum / channels_n as f32;
        }
        let tone_metric = transient::tone_metric(&combined_energy[start..end]);
        self.tonality = dynalloc::smooth_tonality(self.tonality, tone_metric);
        self.tonal_average = dynalloc::smooth_tonality(self.tonal_average / 256.0, tone_metric) * 256.0;

        let spread = spread::decide(tone_metric, self.config.complexity());
        spread::encode(&mut range, spread);
        self.state.spread_decision = spread;

        // Dynalloc (C10). `trim_symbol` is derived from the SMR curve's
        // spectral tilt (section 4.9) and then fed to both the boost-run
        // encode below and the `alloc_trim` write/allocator call further
        // down, so every consumer of "trim" this frame agrees on its value.
        let floor = dynalloc::noise_floor(&combined_energy, start, end);
        let smr = dynalloc::smr(&combined_energy, floor, start, end);
        let trim_symbol = dynalloc::trim_symbol(&smr, start, end);
        let trim_adjust = trim_symbol - 5;
        let boosts = dynalloc::encode_boosts(&mut range, &smr, start, end, trim_adjust);
        let tot_boost = dynalloc::boost_bits(&boosts, start, end);

        // alloc_trim (step 11): written only if the remaining budget can
        // afford it once dynalloc's boosts are accounted for.
        if range.tell_frac() as i32 + 6 * 8 <= total_bits - tot_boost {
            let icdf =
                ICDFContext { total: tables::ALLOC_TRIM_MODEL[0], dist: &tables::ALLOC_TRIM_MODEL[1..] };
            range.encode_icdf(trim_symbol as usize, &icdf);
        }

        // Anti-collapse reservation (step 12).
        let anti_collapse_reserved =
            is_transient && lm >= 2 && range.tell_frac() as i32 + 8 <= total_bits;

        // Allocator (C9) — writes skip/intensity/dual-stereo inline.
        let alloc_budget =
            total_bits - range.tell_frac() as i32 - tot_boost - if anti_collapse_reserved { 8 } else { 0 };
        let alloc: Allocation = bit_alloc::compute(
            &mut range,
            alloc_budget.max(0),
            start,
            end,
            lm,
            channels_n,
            &boosts,
            trim_symbol,
            self.state.last_coded_bands,
        );
        self.state.intensity = alloc.intensity;
        self.state.dual_stereo = alloc.dual_stereo;
        self.state.last_coded_bands = alloc.coded_bands;
        debug!(
            target: "celt_encoder::alloc",
            "coded_bands={} intensity={} dual_stereo={} balance={}",
            alloc.coded_bands, alloc.intensity, alloc.dual_stereo, alloc.balance_bits
        );

        // Fine energy (C8).
        let mut leftover = vec![[0.0f32; MAX_BANDS]; channels_n];
        for ch in 0..channels_n {
            leftover[ch] =
                fine_energy::encode(&mut range, &self.state.energy_error[ch], &alloc.fine_bits, start, alloc.coded_bands);
        }

        // Per-band PVQ encoding (C11).
        let mut prev_slot0: Option<Vec<f32>> = None;
        let mut prev_slot1: Option<Vec<f32>> = None;
        let mut collapse_masks = [0xFFu8; MAX_BANDS];

        for b in start..alloc.coded_bands {
            let lo = tables::EBANDS[b] << lm;
            let hi = (tables::EBANDS[b + 1] << lm).min(frame_size);
            if hi <= lo {
                continue;
            }
            let n = hi - lo;
            let k = pvq::bits_to_pulses(n, alloc.pulses[b]);
            let block_count = if is_transient { num_blocks.min(8) } else { 1 };

            if channels_n == 2 && b < alloc.intensity && !alloc.dual_stereo {
                let mut mid: Vec<f32> = (0..n)
                    .map(|i| {
                        (self.scratch.norm[lo + i] + self.scratch.norm[frame_size + lo + i])
                            * std::f32::consts::FRAC_1_SQRT_2
                    })
                    .collect();
                let mut side: Vec<f32> = (0..n)
                    .map(|i| {
                        (self.scratch.norm[lo + i] - self.scratch.norm[frame_size + lo + i])
                            * std::f32::consts::FRAC_1_SQRT_2
                    })
                    .collect();

                let qn = (k.max(1) * 2).min(64);
                let theta = pvq::encode_theta(&mut range, &mid, &side, qn);
                if qn <= 2 {
                    if self.config.phase_inversion_disabled() {
                        range.encode_raw_bits(0, 1);
                    } else {
                        pvq::encode_stereo_inversion(&mut range, &mid, &side);
                    }
                }

                let side_frac = theta.sin().powi(2);
                let k_side = ((k as f32) * side_frac).round().clamp(0.0, k as f32) as usize;
                let k_mid = k - k_side;

                let mut rng = self.state.rng_state;
                let pulses_mid = code_or_fold(&mut range, &mut mid, k_mid, spread, lm, &mut rng, &prev_slot0);
                let pulses_side = code_or_fold(&mut range, &mut side, k_side, spread, lm, &mut rng, &prev_slot1);
                self.state.rng_state = rng;

                for i in 0..n {
                    self.scratch.norm[lo + i] =
                        (mid[i] + side[i]) * std::f32::consts::FRAC_1_SQRT_2;
                    self.scratch.norm[frame_size + lo + i] =
                        (mid[i] - side[i]) * std::f32::consts::FRAC_1_SQRT_2;
                }

                let mask_mid = pvq::collapse_mask(&pulses_mid, block_count);
                let mask_side = pvq::collapse_mask(&pulses_side, block_count);
                collapse_masks[b] = mask_mid | mask_side;
                prev_slot0 = Some(mid);
                prev_slot1 = Some(side);
            } else {
                let mut combined_mask = 0u8;
                for ch in 0..channels_n {
                    let offset = ch * frame_size + lo;
                    let mut shape = self.scratch.norm[offset..offset + n].to_vec();
                    let mut rng = self.state.rng_state;
                    let prev = if ch == 0 { &prev_slot0 } else { &prev_slot1 };
                    let pulses = code_or_fold(&mut range, &mut shape, k, spread, lm, &mut rng, prev);
                    self.state.rng_state = rng;
                    self.scratch.norm[offset..offset + n].copy_from_slice(&shape);
                    combined_mask |= pvq::collapse_mask(&pulses, block_count);
                    if ch == 0 {
                        prev_slot0 = Some(shape);
                    } else {
                        prev_slot1 = Some(shape);
                    }
                }
                collapse_masks[b] = combined_mask;
            }
        }

        // Anti-collapse raw bit (step 16).
        if anti_collapse_reserved {
            let anti_collapse_on = self.state.consec_transient < 2;
            range.encode_raw_bits(anti_collapse_on as u32, 1);
            let _ = collapse_masks.iter().any(|&m| pvq::needs_anti_collapse(m, num_blocks, is_transient));
        }

        // Finalise (C8), spending whatever balance the allocator left.
        let finalise_bits_total = (alloc.balance_bits / 8).max(0) as usize;
        let per_channel_bits = finalise_bits_total / channels_n.max(1);
        for ch in 0..channels_n {
            fine_energy::finalise(&mut range, &mut leftover[ch], start, alloc.coded_bands, per_channel_bits);
        }

        let final_range = range.final_range();
        let data = range.done();

        self.state.consec_transient = if is_transient { self.state.consec_transient + 1 } else { 0 };
        self.state.vbr_reservoir =
            vbr::update_reservoir(self.state.vbr_reservoir, vbr_target.bits, (data.len() as i32) * 64);
        self.has_prior_frame = true;

        debug!(target: "celt_encoder::frame", "frame_size={frame_size} bytes={} final_range={final_range}", data.len());

        Ok(EncodedFrame { data, final_range })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Bandwidth;

    #[test]
    fn silence_encodes_to_a_single_byte() {
        let mut enc = Encoder::new(Channels::Mono).with_config(
            EncoderConfig::default().with_bitrate_bps(64_000).with_vbr(false),
        );
        let pcm = vec![0.0f64; 960];
        let frame = enc.encode_frame(&pcm, 960).unwrap();
        assert_eq!(frame.data.len(), 1);
        assert_eq!(frame.data[0] & 0x80, 0x80);
        assert_ne!(frame.final_range, 0);
    }

    #[test]
    fn sine_tone_encodes_to_nonzero_frame_with_target_length() {
        let mut enc = Encoder::new(Channels::Mono).with_config(
            EncoderConfig::default().with_bitrate_bps(64_000).with_vbr(false),
        );
        let pcm: Vec<f64> =
            (0..960).map(|i| 0.5 * (2.0 * std::f64::consts::PI * 440.0 * i as f64 / 48_000.0).sin()).collect();
        let frame = enc.encode_frame(&pcm, 960).unwrap();
        assert_eq!(frame.data.len(), 64_000 * 20 / 1000 / 8);
        assert!(frame.data[0] & 0x80 == 0);
    }

    #[test]
    fn stereo_noise_round_trips_through_the_pipeline_without_panicking() {
        let mut enc = Encoder::new(Channels::Stereo).with_config(EncoderConfig::default().with_bitrate_bps(96_000));
        let mut rng = 12345u32;
        let pcm: Vec<f64> = (0..960 * 2)
            .map(|_| {
                rng = step_rand(&mut rng);
                ((rng >> 8) as f64 / (1u32 << 24) as f64) * 2.0 - 1.0
            })
            .collect();
        for _ in 0..5 {
            let frame = enc.encode_frame(&pcm, 960).unwrap();
            assert!(!frame.data.is_empty());
        }
    }

    #[test]
    fn narrowband_caps_coded_bandwidth() {
        let mut enc = Encoder::new(Channels::Mono)
            .with_config(EncoderConfig::default().with_bitrate_bps(32_000).with_bandwidth(Bandwidth::Narrow));
        let pcm: Vec<f64> =
            (0..480).map(|i| 0.3 * (2.0 * std::f64::consts::PI * 220.0 * i as f64 / 48_000.0).sin()).collect();
        let frame = enc.encode_frame(&pcm, 480).unwrap();
        assert!(!frame.data.is_empty());
    }

    #[test]
    fn invalid_frame_size_is_rejected() {
        let mut enc = Encoder::new(Channels::Mono);
        let pcm = vec![0.0f64; 100];
        assert_eq!(enc.encode_frame(&pcm, 100), Err(EncoderError::InvalidFrameSize(100)));
    }

    #[test]
    fn mismatched_input_length_is_rejected() {
        let mut enc = Encoder::new(Channels::Stereo);
        let pcm = vec![0.0f64; 960];
        assert_eq!(
            enc.encode_frame(&pcm, 960),
            Err(EncoderError::InvalidInputLength { got: 960, expected: 1920 })
        );
    }

    #[test]
    fn repeated_frames_reuse_scratch_without_growing() {
        let mut enc = Encoder::new(Channels::Mono);
        let pcm = vec![0.01f64; 960];
        for _ in 0..3 {
            enc.encode_frame(&pcm, 960).unwrap();
        }
        assert_eq!(enc.scratch.freq.len(), 960);
    }

    #[test]
    fn reset_clears_prior_frame_flag_so_next_frame_is_intra() {
        let mut enc = Encoder::new(Channels::Mono);
        let pcm: Vec<f64> =
            (0..960).map(|i| 0.4 * (2.0 * std::f64::consts::PI * 300.0 * i as f64 / 48_000.0).sin()).collect();
        enc.encode_frame(&pcm, 960).unwrap();
        assert!(enc.has_prior_frame);
        enc.reset();
        assert!(!enc.has_prior_frame);
    }
}
