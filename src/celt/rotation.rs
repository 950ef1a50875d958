//! Spreading rotation and short-block Hadamard reshape, applied to a
//! band's normalized shape before/after PVQ search to spread quantization
//! noise across the band rather than concentrating it (`spec.md` section
//! 4.9's "spread" step).

/// In-place Givens rotation by `angle`, applied pairwise across the band
/// in strides of `stride`, `iterations` times with decreasing stride, the
/// same cascade structure CELT's `exp_rotation` uses.
pub fn exp_rotation(x: &mut [f32], angle: f32, stride: usize, iterations: usize, inverse: bool) {
    if angle == 0.0 || x.len() < 2 {
        return;
    }
    let (c, s) = (angle.cos(), if inverse { -angle.sin() } else { angle.sin() });
    let n = x.len();

    for _ in 0..iterations {
        let mut i = 0;
        while i + stride < n {
            let a = x[i];
            let b = x[i + stride];
            x[i] = c * a - s * b;
            x[i + stride] = s * a + c * b;
            i += 1;
        }
    }
}

/// Picks a rotation angle from the spread decision and band geometry,
/// matching the teacher's `Spread` enum semantics (`tables::SPREAD_MODEL_DICT`
/// names the probabilities used to signal this same four-way choice).
pub fn rotation_angle(spread: super::state::SpreadDecision, n: usize, lm: usize) -> f32 {
    use super::state::SpreadDecision::*;
    let factor = match spread {
        None => return 0.0,
        Light => 10,
        Normal => 5,
        Aggressive => 3,
    };
    let theta = std::f32::consts::PI * (n as f32) / (factor as f32 * (1 << lm) as f32 * 4.0 + 1.0);
    theta.min(std::f32::consts::FRAC_PI_4)
}

/// In-place Hadamard butterfly of order `2^stages` applied to interleaved
/// short-block data, used to fold short-block collapse information into a
/// shape the PVQ search can treat as one band.
pub fn hadamard(x: &mut [f32], stages: usize) {
    let mut len = 1usize;
    for _ in 0..stages {
        let half = len;
        len *= 2;
        let mut start = 0;
        while start + len <= x.len() {
            for i in 0..half {
                let a = x[start + i];
                let b = x[start + half + i];
                x[start + i] = a + b;
                x[start + half + i] = a - b;
            }
            start += len;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::celt::state::SpreadDecision;

    #[test]
    fn rotation_preserves_energy() {
        let mut x = vec![1.0f32, 0.5, -0.3, 0.7, 0.2, -0.9];
        let before: f32 = x.iter().map(|v| v * v).sum();
        exp_rotation(&mut x, 0.4, 1, 2, false);
        let after: f32 = x.iter().map(|v| v * v).sum();
        assert!((before - after).abs() < 1e-3);
    }

    #[test]
    fn rotation_forward_then_inverse_round_trips() {
        let original = vec![1.0f32, 0.5, -0.3, 0.7];
        let mut x = original.clone();
        exp_rotation(&mut x, 0.3, 1, 2, false);
        exp_rotation(&mut x, 0.3, 1, 2, true);
        for (a, b) in x.iter().zip(original.iter()) {
            assert!((a - b).abs() < 1e-3);
        }
    }

    #[test]
    fn none_spread_gives_zero_angle() {
        assert_eq!(rotation_angle(SpreadDecision::None, 16, 2), 0.0);
    }

    #[test]
    fn hadamard_is_self_inverse_up_to_scale() {
        let original = vec![1.0f32, 2.0, 3.0, 4.0];
        let mut x = original.clone();
        hadamard(&mut x, 2);
        hadamard(&mut x, 2);
        for (a, b) in x.iter().zip(original.iter()) {
            assert!((a - b * 4.0).abs() < 1e-3);
        }
    }
}
