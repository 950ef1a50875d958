//! VBR target-bit computation (section 4.11): scales the nominal
//! bits-per-frame figure by transient/tonality activity and a running
//! reservoir that keeps long-term average rate near the configured
//! bitrate, constrained (when requested) to never exceed a hard cap.

pub struct VbrTarget {
    pub bits: i32,
    pub constrained_cap: Option<i32>,
}

/// `nominal_bits` is `bitrate * frame_size / sample_rate`, already in Q3
/// (eighths of a bit) the way `RangeCodingEncoder::tell_frac` counts.
pub fn compute_target(
    nominal_bits: i32,
    is_transient: bool,
    tone_metric: f32,
    reservoir: i32,
    constrained: bool,
) -> VbrTarget {
    let activity = if is_transient { 1.15 } else { 1.0 };
    let tonal = 1.0 + (tone_metric - 0.5).clamp(-0.3, 0.3);
    let mut target = (nominal_bits as f32 * activity * tonal).round() as i32;

    // Reservoir nudges the target back toward the configured average: a
    // positive reservoir (we've been spending under budget) allows a
    // bigger frame, a negative one reins the next frame in.
    target += reservoir / 8;

    let constrained_cap = if constrained { Some((nominal_bits as f32 * 1.2) as i32) } else { None };
    if let Some(cap) = constrained_cap {
        target = target.min(cap);
    }

    VbrTarget { bits: target.max(nominal_bits / 4), constrained_cap }
}

/// Updates the running reservoir after a frame actually spent
/// `actual_bits` against a `target_bits` budget.
pub fn update_reservoir(reservoir: i32, target_bits: i32, actual_bits: i32) -> i32 {
    (reservoir + (target_bits - actual_bits)).clamp(-(target_bits * 4), target_bits * 4)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn transients_get_more_bits_than_steady_state() {
        let steady = compute_target(1000, false, 0.5, 0, false);
        let transient = compute_target(1000, true, 0.5, 0, false);
        assert!(transient.bits > steady.bits);
    }

    #[test]
    fn constrained_vbr_respects_cap() {
        let target = compute_target(1000, true, 1.0, 5000, true);
        assert!(target.bits <= target.constrained_cap.unwrap());
    }

    #[test]
    fn reservoir_tracks_over_spend_and_under_spend() {
        let r1 = update_reservoir(0, 1000, 800);
        assert!(r1 > 0);
        let r2 = update_reservoir(0, 1000, 1200);
        assert!(r2 < 0);
    }
}
