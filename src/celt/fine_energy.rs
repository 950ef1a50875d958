//! Fine and finalise energy coding (component C8): a uniform refinement of
//! the coarse quantization error, plus a last one-bit-per-band pass spent
//! from whatever bits the allocator leaves unused.

use crate::entropy::RangeCodingEncoder;

use super::tables::MAX_BANDS;

const ENERGY_UNIT: f32 = 0.5;

/// Encodes `fine_bits[b]` extra bits of residual for each coded band as a
/// uniform integer, narrowing the coarse quantization error by
/// `2^-fine_bits` of `ENERGY_UNIT`. Returns the total residual still left
/// uncoded per band, consumed by `finalise`.
pub fn encode(
    range: &mut RangeCodingEncoder,
    energy_error: &[f32; MAX_BANDS],
    fine_bits: &[i32; MAX_BANDS],
    start: usize,
    end: usize,
) -> [f32; MAX_BANDS] {
    let mut leftover = *energy_error;
    for b in start..end {
        let bits = fine_bits[b];
        if bits <= 0 {
            continue;
        }
        let levels = 1u32 << bits;
        let frac = (leftover[b] / ENERGY_UNIT + 0.5).clamp(0.0, 1.0);
        let q = ((frac * levels as f32) as u32).min(levels - 1);
        range.encode_raw_bits(q, bits as usize);

        let coded = (q as f32 + 0.5) / levels as f32 - 0.5;
        leftover[b] -= coded * ENERGY_UNIT;
    }
    leftover
}

/// Spends up to `budget_bits` extra one-bit-per-band refinements, priority-1
/// bands first and priority-0 bands after, per `spec.md` section 4.7 (the
/// allocator's `fine_priority` flag, set wherever a band's fine split left
/// the den/offset curve short of its "fair share"). Matches the teacher's
/// single-bit "finalise" pass run once the main allocation is exhausted.
/// Returns the number of bits actually spent.
pub fn finalise(
    range: &mut RangeCodingEncoder,
    leftover: &mut [f32; MAX_BANDS],
    fine_priority: &[bool; MAX_BANDS],
    start: usize,
    end: usize,
    budget_bits: usize,
) -> usize {
    let mut spent = 0;
    'passes: for &priority in &[true, false] {
        for b in start..end {
            if fine_priority[b] != priority {
                continue;
            }
            if spent >= budget_bits {
                break 'passes;
            }
            let bit = leftover[b] > 0.0;
            range.encode_raw_bits(bit as u32, 1);
            let step = ENERGY_UNIT / 2.0;
            leftover[b] -= if bit { step } else { -step };
            spent += 1;
        }
    }
    spent
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn encode_reduces_residual_magnitude() {
        let mut range = RangeCodingEncoder::new(256);
        let mut err = [0.0f32; MAX_BANDS];
        err[3] = 0.2;
        let bits = {
            let mut b = [0i32; MAX_BANDS];
            b[3] = 4;
            b
        };
        let leftover = encode(&mut range, &err, &bits, 0, 21);
        assert!(leftover[3].abs() < err[3].abs());
    }

    #[test]
    fn finalise_spends_exactly_the_budget() {
        let mut range = RangeCodingEncoder::new(256);
        let mut leftover = [0.1f32; MAX_BANDS];
        let priority = [false; MAX_BANDS];
        let spent = finalise(&mut range, &mut leftover, &priority, 0, 21, 5);
        assert_eq!(spent, 5);
    }

    #[test]
    fn finalise_caps_at_available_bands() {
        let mut range = RangeCodingEncoder::new(256);
        let mut leftover = [0.1f32; MAX_BANDS];
        let priority = [false; MAX_BANDS];
        let spent = finalise(&mut range, &mut leftover, &priority, 0, 3, 100);
        assert_eq!(spent, 3);
    }

    #[test]
    fn finalise_spends_priority_one_bands_before_priority_zero() {
        let mut range = RangeCodingEncoder::new(256);
        let mut leftover = [0.1f32; MAX_BANDS];
        let mut priority = [false; MAX_BANDS];
        priority[5] = true;
        priority[0] = false;
        let spent = finalise(&mut range, &mut leftover, &priority, 0, 21, 1);
        assert_eq!(spent, 1);
        // The only bit spent must have gone to the priority band: its
        // residual moved, band 0's did not.
        assert_ne!(leftover[5], 0.1);
        assert_eq!(leftover[0], 0.1);
    }
}
