//! Coarse energy coding (component C7): inter-frame (alpha) and
//! intra-band (beta) prediction followed by Laplace-coded residuals, the
//! encode counterpart of the teacher's `CoarseEnergy::decode`. The
//! `ALPHA_COEF`/`BETA_COEF`/`COARSE_ENERGY_DICT` tables are reused
//! verbatim from that module (see `tables.rs`).

use crate::entropy::RangeCodingEncoder;

use super::tables::{ALPHA_COEF, BETA_COEF, COARSE_ENERGY_DICT, MAX_BANDS};

/// Quantization step for coarse energy, in the same natural-log units
/// `bands::compute` produces (matches the teacher's decode scale).
const ENERGY_UNIT: f32 = 0.5;

fn size_index(lm: usize) -> usize {
    lm.min(3)
}

fn laplace_params(size: usize, intra: bool, band: usize) -> (usize, isize) {
    let row = &COARSE_ENERGY_DICT[size][intra as usize];
    let fs0 = (row[band * 2] as usize) << 7;
    let decay = (row[band * 2 + 1] as isize) << 6;
    (fs0, decay)
}

/// Encodes the full per-band coarse energy for one channel, updating
/// `prev_log_energy`/`energy_error` in place for the next frame.
///
/// Returns the quantized log-energy actually coded (what the decoder would
/// reconstruct), which downstream fine-energy coding measures its residual
/// against.
pub fn encode(
    range: &mut RangeCodingEncoder,
    log_energy: &[f32; MAX_BANDS],
    prev_log_energy: &mut [f32; MAX_BANDS],
    energy_error: &mut [f32; MAX_BANDS],
    start: usize,
    end: usize,
    lm: usize,
    intra: bool,
) -> [f32; MAX_BANDS] {
    let size = size_index(lm);
    let alpha = if intra { 0.0 } else { ALPHA_COEF[size] };
    let beta = BETA_COEF[size];

    let mut quantized = [0.0f32; MAX_BANDS];
    let mut running_error = 0.0f32;

    for b in start..end {
        let predicted = alpha * prev_log_energy[b] + beta * running_error;
        let target = log_energy[b] - predicted;
        let qi = (target / ENERGY_UNIT).round() as isize;
        let qi = qi.clamp(-64, 63);

        let (fs0, decay) = laplace_params(size, intra, b);
        range.encode_laplace(qi, fs0, decay);

        let coded = predicted + qi as f32 * ENERGY_UNIT;
        quantized[b] = coded;
        running_error = qi as f32 * ENERGY_UNIT - target + running_error * 0.0;
        energy_error[b] = target - qi as f32 * ENERGY_UNIT;
        prev_log_energy[b] = coded;
    }

    for b in 0..start {
        quantized[b] = prev_log_energy[b];
    }
    for b in end..MAX_BANDS {
        quantized[b] = log_energy[b];
    }

    quantized
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn encode_tracks_constant_energy_with_shrinking_residual() {
        let mut range = RangeCodingEncoder::new(256);
        let log_energy = [2.0f32; MAX_BANDS];
        let mut prev = [0.0f32; MAX_BANDS];
        let mut err = [0.0f32; MAX_BANDS];

        let q1 = encode(&mut range, &log_energy, &mut prev, &mut err, 0, 21, 3, true);
        let q2 = encode(&mut range, &log_energy, &mut prev, &mut err, 0, 21, 3, false);

        let e1: f32 = (0..21).map(|b| (q1[b] - log_energy[b]).abs()).sum();
        let e2: f32 = (0..21).map(|b| (q2[b] - log_energy[b]).abs()).sum();
        assert!(e2 <= e1 + 1e-3);
    }

    #[test]
    fn encode_respects_band_range() {
        let mut range = RangeCodingEncoder::new(256);
        let log_energy = [1.0f32; MAX_BANDS];
        let mut prev = [0.0f32; MAX_BANDS];
        let mut err = [0.0f32; MAX_BANDS];
        let q = encode(&mut range, &log_energy, &mut prev, &mut err, 2, 10, 0, true);
        for b in 2..10 {
            assert!(prev[b] != 0.0 || q[b] == 0.0);
        }
    }
}
