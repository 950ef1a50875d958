//! Transient analysis (component C4): forward/backward masking over a
//! highpassed envelope, feeding the transient flag and `tf_estimate` that
//! the TF-resolution and bit-allocation stages consume.

const NUM_SUBBLOCKS: usize = 8;
const TRANSIENT_THRESHOLD: f32 = 3.0;
const WEAK_TRANSIENT_THRESHOLD: f32 = 1.8;

/// Two-pole highpass used only to de-emphasize DC/low-frequency content
/// before the envelope computation, carrying its own one-sample state
/// across frames (`ChannelState::transient_hp_mem`).
fn highpass_envelope(samples: &[f32], mem: &mut f32) -> Vec<f32> {
    const COEF: f32 = 0.3;
    let mut prev = *mem;
    let out = samples
        .iter()
        .map(|&x| {
            let y = x - prev;
            prev = x * COEF + prev * (1.0 - COEF);
            y
        })
        .collect();
    *mem = prev;
    out
}

fn subblock_energies(samples: &[f32]) -> [f32; NUM_SUBBLOCKS] {
    let mut energies = [0.0f32; NUM_SUBBLOCKS];
    let n = samples.len();
    let step = (n / NUM_SUBBLOCKS).max(1);
    for (b, energy) in energies.iter_mut().enumerate() {
        let start = b * step;
        let end = (start + step).min(n);
        *energy = samples[start..end].iter().map(|&s| s * s).sum::<f32>().sqrt() + 1e-9;
    }
    energies
}

pub struct TransientResult {
    pub is_transient: bool,
    /// Normalized forward/backward masking ratio, consumed by the TF
    /// resolution selector as a continuous hint rather than a bare flag.
    pub tf_estimate: f32,
}

/// Runs highpass + sub-block envelope + forward/backward masking on one
/// channel's current frame, in original (pre pre-emphasis) signal domain.
pub fn analyze(samples: &[f32], hp_mem: &mut f32, allow_weak: bool) -> TransientResult {
    let hp = highpass_envelope(samples, hp_mem);
    let energies = subblock_energies(&hp);

    let mut forward_max = 0.0f32;
    let mut running = energies[0];
    for &e in &energies[1..] {
        forward_max = forward_max.max(e / running);
        running = running.max(e);
    }

    let mut backward_max = 0.0f32;
    let mut running = energies[NUM_SUBBLOCKS - 1];
    for &e in energies[..NUM_SUBBLOCKS - 1].iter().rev() {
        backward_max = backward_max.max(e / running);
        running = running.max(e);
    }

    let metric = forward_max.max(backward_max);
    let threshold = if allow_weak { WEAK_TRANSIENT_THRESHOLD } else { TRANSIENT_THRESHOLD };

    TransientResult { is_transient: metric > threshold, tf_estimate: metric }
}

/// Simple tonality indicator from the spectral flatness of the current
/// frame's band energies, used by dynalloc/spread as a continuous hint
/// rather than a binary switch.
pub fn tone_metric(band_energy: &[f32]) -> f32 {
    if band_energy.is_empty() {
        return 0.0;
    }
    let geo_mean = {
        let sum_log: f32 = band_energy.iter().map(|&e| (e.max(1e-9)).ln()).sum();
        (sum_log / band_energy.len() as f32).exp()
    };
    let arith_mean: f32 = band_energy.iter().sum::<f32>() / band_energy.len() as f32;
    if arith_mean <= 0.0 {
        0.0
    } else {
        1.0 - (geo_mean / arith_mean).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn silence_is_not_transient() {
        let mut mem = 0.0;
        let samples = vec![0.0f32; 960];
        let result = analyze(&samples, &mut mem, false);
        assert!(!result.is_transient);
    }

    #[test]
    fn sudden_impulse_is_transient() {
        let mut mem = 0.0;
        let mut samples = vec![0.0f32; 960];
        for s in samples.iter_mut().skip(700) {
            *s = 1.0;
        }
        let result = analyze(&samples, &mut mem, false);
        assert!(result.is_transient);
    }

    #[test]
    fn tone_metric_is_zero_for_flat_spectrum() {
        let flat = vec![1.0f32; 21];
        assert!(tone_metric(&flat) < 1e-4);
    }

    #[test]
    fn tone_metric_is_high_for_peaky_spectrum() {
        let mut peaky = vec![0.01f32; 21];
        peaky[5] = 100.0;
        assert!(tone_metric(&peaky) > 0.3);
    }
}
