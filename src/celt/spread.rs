//! Spread decision (component of section 4.9): picks one of four spread
//! amounts from the frame's tonality, then writes it with the same
//! `SPREAD_MODEL_DICT` icdf the teacher's decode consumes.

use crate::entropy::{ICDFContext, RangeCodingEncoder};

use super::state::SpreadDecision;
use super::tables::SPREAD_MODEL_DICT;

/// Chooses a spread amount: tonal, low-complexity material wants less
/// spreading (coherent energy concentrated in few bins should stay
/// concentrated), noise-like material benefits from aggressive spreading.
pub fn decide(tone_metric: f32, complexity: u8) -> SpreadDecision {
    if complexity < 3 {
        return SpreadDecision::Normal;
    }
    if tone_metric > 0.6 {
        SpreadDecision::Light
    } else if tone_metric > 0.3 {
        SpreadDecision::Normal
    } else {
        SpreadDecision::Aggressive
    }
}

fn spread_symbol(spread: SpreadDecision) -> usize {
    match spread {
        SpreadDecision::None => 0,
        SpreadDecision::Light => 1,
        SpreadDecision::Normal => 2,
        SpreadDecision::Aggressive => 3,
    }
}

pub fn encode(range: &mut RangeCodingEncoder, spread: SpreadDecision) {
    let icdf = ICDFContext { total: SPREAD_MODEL_DICT[0], dist: &SPREAD_MODEL_DICT[1..] };
    range.encode_icdf(spread_symbol(spread), &icdf);
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn tonal_material_prefers_light_spread() {
        assert_eq!(decide(0.8, 10), SpreadDecision::Light);
    }

    #[test]
    fn noisy_material_prefers_aggressive_spread() {
        assert_eq!(decide(0.1, 10), SpreadDecision::Aggressive);
    }

    #[test]
    fn low_complexity_forces_normal() {
        assert_eq!(decide(0.9, 1), SpreadDecision::Normal);
    }

    #[test]
    fn encode_does_not_panic_for_every_decision() {
        for spread in [
            SpreadDecision::None,
            SpreadDecision::Light,
            SpreadDecision::Normal,
            SpreadDecision::Aggressive,
        ] {
            let mut range = RangeCodingEncoder::new(64);
            encode(&mut range, spread);
            assert!(range.tell() > 0);
        }
    }
}
