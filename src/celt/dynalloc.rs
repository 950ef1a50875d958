//! Dynamic allocation boosting (section 4.8's "dynalloc" step): per-band
//! signal-to-masking-ratio estimate feeding a small number of extra
//! boost quanta, each separately flagged so the decoder can tell how many
//! bands got boosted without scanning the whole band range.

use crate::entropy::RangeCodingEncoder;

use super::tables::MAX_BANDS;

pub const BOOST_QUANTUM_BITS: i32 = 6;
const MAX_BOOSTS_PER_BAND: i32 = 4;

/// Crude noise-floor estimate: the band energy a perfectly flat spectrum
/// at the frame's total energy would have, used as the masking reference
/// each band's SMR is measured against.
pub fn noise_floor(band_energy: &[f32; MAX_BANDS], start: usize, end: usize) -> f32 {
    let count = (end - start).max(1) as f32;
    let total: f32 = band_energy[start..end].iter().sum();
    total / count
}

/// Signal-to-masking ratio per band: how far a band's energy sits above
/// the noise floor, in natural-log units, positive meaning worth
/// protecting with extra bits.
pub fn smr(band_energy: &[f32; MAX_BANDS], floor: f32, start: usize, end: usize) -> [f32; MAX_BANDS] {
    let mut out = [0.0f32; MAX_BANDS];
    for b in start..end {
        out[b] = if floor > 1e-9 { (band_energy[b] / floor).max(1e-9).ln() } else { 0.0 };
    }
    out
}

/// Encodes a 0-quantum boost count per band as a run of low-probability
/// "yes" bits, stopping at the first "no" the way the teacher's decode
/// would read a unary-coded boost count, then returns total extra bits
/// reserved, consumed by the allocator's boosted-caps pass.
pub fn encode_boosts(
    range: &mut RangeCodingEncoder,
    smr: &[f32; MAX_BANDS],
    start: usize,
    end: usize,
    trim: i32,
) -> [i32; MAX_BANDS] {
    let mut boosts = [0i32; MAX_BANDS];
    for b in start..end {
        let desired = if smr[b] > 1.0 {
            ((smr[b] - 1.0).min(MAX_BOOSTS_PER_BAND as f32 - 1.0).floor() as i32 + 1)
                .min(MAX_BOOSTS_PER_BAND)
        } else {
            0
        };
        let adjusted = (desired + trim.clamp(-2, 2)).clamp(0, MAX_BOOSTS_PER_BAND);

        for i in 0..MAX_BOOSTS_PER_BAND {
            let take = i < adjusted;
            range.encode_bit_logp(take, 6);
            if !take {
                break;
            }
        }
        boosts[b] = adjusted;
    }
    boosts
}

pub fn boost_bits(boosts: &[i32; MAX_BANDS], start: usize, end: usize) -> i32 {
    boosts[start..end].iter().sum::<i32>() * BOOST_QUANTUM_BITS
}

/// Computes the `alloc_trim` symbol (0..=10, neutral at 5) from the SMR
/// curve's spectral tilt: when the upper half of the coded range carries
/// more signal-above-masking than the lower half, bits should lean toward
/// the high bands, which `bit_alloc::trim_offset` reads as a symbol below
/// neutral (and vice versa for a bass-heavy tilt).
pub fn trim_symbol(smr: &[f32; MAX_BANDS], start: usize, end: usize) -> i32 {
    if end <= start + 1 {
        return 5;
    }
    let mid = start + (end - start) / 2;
    let low: f32 = smr[start..mid].iter().sum::<f32>() / (mid - start).max(1) as f32;
    let high: f32 = smr[mid..end].iter().sum::<f32>() / (end - mid).max(1) as f32;
    let tilt = high - low;
    (5.0 - tilt).round().clamp(0.0, 10.0) as i32
}

/// Exponential smoothing of the frame's tonality metric across calls, the
/// dynalloc-side counterpart of the transient analyzer's own hysteresis,
/// avoiding boost decisions that chatter frame to frame.
pub fn smooth_tonality(prev: f32, current: f32) -> f32 {
    const ALPHA: f32 = 0.2;
    prev * (1.0 - ALPHA) + current * ALPHA
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn flat_energy_has_zero_smr() {
        let energy = [2.0f32; MAX_BANDS];
        let floor = noise_floor(&energy, 0, 21);
        let ratios = smr(&energy, floor, 0, 21);
        for b in 0..21 {
            assert!(ratios[b].abs() < 1e-4);
        }
    }

    #[test]
    fn peaky_band_gets_boosted() {
        let mut energy = [1.0f32; MAX_BANDS];
        energy[5] = 50.0;
        let floor = noise_floor(&energy, 0, 21);
        let ratios = smr(&energy, floor, 0, 21);
        let mut range = RangeCodingEncoder::new(256);
        let boosts = encode_boosts(&mut range, &ratios, 0, 21, 0);
        assert!(boosts[5] > 0);
        assert!(boosts[5] >= boosts[0]);
    }

    #[test]
    fn trim_symbol_is_neutral_for_flat_smr() {
        let smr = [0.0f32; MAX_BANDS];
        assert_eq!(trim_symbol(&smr, 0, 21), 5);
    }

    #[test]
    fn trim_symbol_leans_down_when_high_bands_carry_more_smr() {
        let mut smr = [0.0f32; MAX_BANDS];
        for b in 11..21 {
            smr[b] = 4.0;
        }
        assert!(trim_symbol(&smr, 0, 21) < 5);
    }

    #[test]
    fn smoothing_converges_toward_target() {
        let mut value = 0.0f32;
        for _ in 0..200 {
            value = smooth_tonality(value, 1.0);
        }
        assert!((value - 1.0).abs() < 0.01);
    }
}
