//! Pyramid Vector Quantization band coder (component C11): greedy pulse
//! search over a normalized band shape, rank-encoded through `cwrs`, plus
//! the stereo mid/side theta split and collapse/anti-collapse bookkeeping
//! `spec.md` section 4.9 describes.

use crate::entropy::RangeCodingEncoder;

use super::cwrs::{encode as cwrs_encode, PulseCounts};
use super::rotation::exp_rotation;
use super::state::{step_rand, SpreadDecision};

/// Greedy matching-pursuit pulse search: repeatedly adds the
/// unit pulse (sign of the residual) that maximizes the normalized
/// correlation `(x.y)^2 / y.y`, the same objective libopus's
/// `op_pvq_search` chases, run here in a straightforward O(k*n) loop
/// rather than its SIMD-tuned incremental form.
pub fn search(x: &[f32], k: usize) -> Vec<i32> {
    let n = x.len();
    let mut y = vec![0i32; n];
    if k == 0 || n == 0 {
        return y;
    }

    let mut xy = 0.0f32;
    let mut yy = 0.0f32;

    for _ in 0..k {
        let mut best_i = 0usize;
        let mut best_sign = 1.0f32;
        let mut best_score = f32::NEG_INFINITY;

        for (i, &xi) in x.iter().enumerate() {
            for &sign in &[1.0f32, -1.0f32] {
                let new_xy = xy + sign * xi;
                let new_yy = yy + 2.0 * sign * y[i] as f32 + 1.0;
                let score = if new_yy > 0.0 { (new_xy * new_xy) / new_yy } else { 0.0 };
                if score > best_score {
                    best_score = score;
                    best_i = i;
                    best_sign = sign;
                }
            }
        }

        yy += 2.0 * best_sign * y[best_i] as f32 + 1.0;
        xy += best_sign * x[best_i];
        y[best_i] += best_sign as i32;
    }

    y
}

/// Converts a Q3 (eighths-of-a-bit) bit budget for one band into an actual
/// pulse count `K`: the largest `K` whose CWRS index space `V(n,K)` still
/// fits in the whole bits the budget affords. Inverse of the fixed
/// pulse-cache table `spec.md` section 4.10 step 1 names; this crate has no
/// such precomputed cache; deriving `K` on demand from `PulseCounts` gives
/// the same largest-K-that-fits answer without shipping one.
pub fn bits_to_pulses(n: usize, budget_q3: i32) -> usize {
    if n == 0 || budget_q3 <= 0 {
        return 0;
    }
    let whole_bits = (budget_q3 / 8) as usize;
    if whole_bits == 0 {
        return 0;
    }
    let budget: u128 = 1u128 << whole_bits.min(120);
    let max_k = n * 2 + whole_bits;
    let counts = PulseCounts::new(n, max_k);
    let mut k = 0usize;
    while k < max_k && counts.v(n, k + 1) <= budget {
        k += 1;
    }
    k
}

/// A 32-bit range coder's `scale = range / total` underflows once `total`
/// needs more bits than this to represent; `cwrs`'s own doc comment notes
/// `V(n, k)` routinely exceeds `u64::MAX` for full-band, high-bitrate
/// frames. Above this width, `spec.md` section 4.10 step 6 splits the
/// index into a range-coded high part (over the shrunk symbol space) and
/// a raw-bit low part, instead of truncating either half away.
const MAX_UNIFORM_INDEX_BITS: u32 = 24;

fn encode_cwrs_index(range: &mut RangeCodingEncoder, index: u128, total: u128) {
    if total <= 1u128 << MAX_UNIFORM_INDEX_BITS {
        range.encode_uniform(index as usize, total as usize);
        return;
    }

    let total_bits = 128 - (total - 1).leading_zeros();
    let shift = total_bits.saturating_sub(MAX_UNIFORM_INDEX_BITS);
    let scaled_total = (((total - 1) >> shift) + 1) as usize;
    let scaled_index = (index >> shift) as usize;
    range.encode_uniform(scaled_index, scaled_total);

    let mut raw = index & ((1u128 << shift) - 1);
    let mut bits_left = shift;
    while bits_left > 0 {
        let chunk = bits_left.min(24);
        range.encode_raw_bits((raw & ((1u128 << chunk) - 1)) as u32, chunk as usize);
        raw >>= chunk;
        bits_left -= chunk;
    }
}

/// Encodes one band's shape with `k` pulses: spreads, searches, ranks
/// through CWRS, and writes the index as a uniform symbol. Returns the
/// pulse vector actually coded (for the caller to renormalize into
/// `norm` so later bands' stereo/collapse logic sees the quantized
/// shape, not the pre-quantization target).
pub fn encode_band(
    range: &mut RangeCodingEncoder,
    band: &mut [f32],
    k: usize,
    spread: SpreadDecision,
    lm: usize,
) -> Vec<i32> {
    if k == 0 {
        band.iter_mut().for_each(|v| *v = 0.0);
        return vec![0; band.len()];
    }

    let angle = super::rotation::rotation_angle(spread, band.len(), lm);
    exp_rotation(band, angle, 1, 2, false);

    let pulses = search(band, k);
    let counts = PulseCounts::new(pulses.len(), k);
    let (index, total) = cwrs_encode(&pulses, &counts);
    encode_cwrs_index(range, index, total);

    let mut shape: Vec<f32> = pulses.iter().map(|&p| p as f32).collect();
    exp_rotation(&mut shape, angle, 1, 2, true);
    let norm = (shape.iter().map(|v| v * v).sum::<f32>()).sqrt().max(1e-9);
    for (b, s) in band.iter_mut().zip(shape.iter()) {
        *b = s / norm;
    }

    pulses
}

/// Mid/side angle for a stereo pair, quantized to one of `qn + 1` levels
/// in `[0, pi/2]`. `spec.md` section 4.10 step 2: a power-of-two `qn`
/// (the common case once a band has more than a couple of pulses to
/// split) is written uniform over its `qn + 1` levels; anything else
/// falls back to the teacher's triangular (pyramid-shaped) vocabulary,
/// which concentrates probability toward the pure mid/pure side ends.
pub fn encode_theta(range: &mut RangeCodingEncoder, mid: &[f32], side: &[f32], qn: usize) -> f32 {
    let mid_energy: f32 = mid.iter().map(|v| v * v).sum();
    let side_energy: f32 = side.iter().map(|v| v * v).sum();
    let total = (mid_energy + side_energy).max(1e-9);
    let ratio = (side_energy / total).sqrt().clamp(0.0, 1.0);
    let theta = ratio.asin();

    let k = ((theta / std::f32::consts::FRAC_PI_2) * qn as f32).round() as usize;
    let k = k.min(qn);
    if qn.is_power_of_two() {
        range.encode_uniform(k, qn + 1);
    } else {
        range.encode_triangular(k, qn);
    }

    (k as f32 / qn as f32) * std::f32::consts::FRAC_PI_2
}

/// One-bit phase-inversion flag: whether to flip the side channel's sign
/// before mid/side synthesis, based on which orientation better
/// concentrates energy (matches the teacher's decode-side expectation of
/// a raw bit directly ahead of the band data).
pub fn encode_stereo_inversion(range: &mut RangeCodingEncoder, mid: &[f32], side: &[f32]) -> bool {
    let corr: f32 = mid.iter().zip(side.iter()).map(|(&m, &s)| m * s).sum();
    let invert = corr < 0.0;
    range.encode_raw_bits(invert as u32, 1);
    invert
}

/// Fills a band that received zero pulses from a lower coded band's
/// already-quantized shape, with a per-sample RNG sign flip, the
/// "collapse avoidance" fallback `spec.md` section 4.10 step 8 describes.
/// Falls back to a pure-RNG unit vector when there is no lower band to
/// borrow from (e.g. band 0 itself folds to noise).
pub fn fold(dest: &mut [f32], source: Option<&[f32]>, rng: &mut u32) {
    if dest.is_empty() {
        return;
    }
    match source.filter(|s| !s.is_empty()) {
        Some(src) => {
            for (i, d) in dest.iter_mut().enumerate() {
                let sign = if step_rand(rng) & 0x8000_0000 == 0 { 1.0 } else { -1.0 };
                *d = src[i % src.len()] * sign;
            }
        }
        None => {
            for d in dest.iter_mut() {
                *d = if step_rand(rng) & 0x8000_0000 == 0 { 1.0 } else { -1.0 };
            }
        }
    }
    let energy: f32 = dest.iter().map(|v| v * v).sum::<f32>().sqrt().max(1e-9);
    for d in dest.iter_mut() {
        *d /= energy;
    }
}

/// Computes the collapse mask for a short-block band: bit `i` set means
/// sub-block `i` received at least one pulse. Feeds `anti_collapse`.
pub fn collapse_mask(pulses: &[i32], num_blocks: usize) -> u8 {
    if num_blocks <= 1 || pulses.is_empty() {
        return 0xFF;
    }
    let mut mask = 0u8;
    let block_len = (pulses.len() / num_blocks).max(1);
    for b in 0..num_blocks.min(8) {
        let start = b * block_len;
        let end = (start + block_len).min(pulses.len());
        if pulses[start..end].iter().any(|&p| p != 0) {
            mask |= 1 << b;
        }
    }
    mask
}

/// Whether anti-collapse dithering should be signaled: true only when a
/// transient band quantized to all-silent sub-blocks.
pub fn needs_anti_collapse(mask: u8, num_blocks: usize, is_transient: bool) -> bool {
    is_transient && num_blocks > 1 && mask != ((1u16 << num_blocks) - 1) as u8
}
