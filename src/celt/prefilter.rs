//! Pitch prefilter / postfilter signaling (component C5): a 2x-downsampled
//! normalized autocorrelation pitch search feeding the comb-filter
//! gain/tapset decision the range coder writes ahead of the MDCT
//! coefficients, mirroring the three-tap table the teacher's
//! `PostFilter`/`filter.rs` decodes (`tables::TAPSET_GAINS`).

use super::state::ChannelState;
use super::tables::{MAX_PITCH_PERIOD, POSTFILTER_MIN_PERIOD, TAPSET_GAINS};

const MAX_PERIOD: usize = MAX_PITCH_PERIOD;
const DOWNSAMPLE: usize = 2;
const GAIN_THRESHOLD: f32 = 0.3;

fn downsample(samples: &[f32]) -> Vec<f32> {
    samples.chunks(DOWNSAMPLE).map(|c| c.iter().sum::<f32>() / c.len() as f32).collect()
}

/// Normalized autocorrelation at lag `lag` over `signal`.
fn normalized_xcorr(signal: &[f32], lag: usize) -> f32 {
    if lag >= signal.len() {
        return 0.0;
    }
    let (a, b) = (&signal[lag..], &signal[..signal.len() - lag]);
    let num: f32 = a.iter().zip(b.iter()).map(|(&x, &y)| x * y).sum();
    let ea: f32 = a.iter().map(|&x| x * x).sum::<f32>() + 1e-9;
    let eb: f32 = b.iter().map(|&x| x * x).sum::<f32>() + 1e-9;
    num / (ea * eb).sqrt()
}

pub struct PitchDecision {
    pub period: usize,
    pub gain: f32,
    pub tapset: usize,
    pub enabled: bool,
}

/// Searches for the best pitch lag on a downsampled copy of `samples`,
/// then decides whether the comb-filter postfilter is worth signaling at
/// all (`enabled`), matching the threshold-gated convention of the
/// teacher's postfilter-flag encode path.
pub fn search(samples: &[f32], prev: &ChannelState) -> PitchDecision {
    let down = downsample(samples);
    let min_lag = POSTFILTER_MIN_PERIOD / DOWNSAMPLE;
    let max_lag = (MAX_PERIOD / DOWNSAMPLE).min(down.len().saturating_sub(1));

    let mut best_lag = min_lag;
    let mut best_corr = -1.0f32;
    for lag in min_lag..=max_lag.max(min_lag) {
        let corr = normalized_xcorr(&down, lag);
        if corr > best_corr {
            best_corr = corr;
            best_lag = lag;
        }
    }

    // Bias toward keeping the previous frame's period when correlation is
    // close, avoiding needless period churn frame to frame.
    if prev.peak_energy > 0.0 {
        let prev_lag = (prev.peak_energy as usize) / DOWNSAMPLE;
        if prev_lag >= min_lag
            && prev_lag <= max_lag
            && normalized_xcorr(&down, prev_lag) > best_corr - 0.05
        {
            best_lag = prev_lag;
        }
    }

    let period = best_lag * DOWNSAMPLE;
    let enabled = best_corr > GAIN_THRESHOLD;
    let tapset = if best_corr > 0.95 { 2 } else if best_corr > 0.6 { 1 } else { 0 };
    let gain = if enabled { best_corr.clamp(0.0, 1.0) } else { 0.0 };

    PitchDecision { period, gain, tapset, enabled }
}

/// Applies the comb-filter postfilter used for the accepted decision,
/// feeding forward the encoder's own synthesis reference so later stages
/// (transient re-check, residual energy) see the filtered signal the
/// decoder will reconstruct.
pub fn apply(samples: &mut [f32], history: &[f32], decision: &PitchDecision) {
    if !decision.enabled || decision.period == 0 {
        return;
    }
    let taps = TAPSET_GAINS[decision.tapset];
    let period = decision.period;
    let hist_len = history.len();

    for i in 0..samples.len() {
        let mut acc = 0.0f32;
        for (t, &g) in taps.iter().enumerate() {
            let delay = period + t;
            let idx = i as isize - delay as isize;
            let sample = if idx >= 0 {
                samples[idx as usize]
            } else {
                let hidx = hist_len as isize + idx;
                if hidx >= 0 { history[hidx as usize] } else { 0.0 }
            };
            acc += g * sample;
        }
        samples[i] += decision.gain * acc;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn periodic_signal_is_detected_and_enabled() {
        let state = test_channel_state();
        let period = 100;
        let samples: Vec<f32> = (0..960)
            .map(|i| (2.0 * std::f32::consts::PI * (i as f32) / period as f32).sin())
            .collect();
        let decision = search(&samples, &state);
        assert!(decision.enabled);
        assert!(decision.gain > 0.0);
    }

    #[test]
    fn silence_is_not_enabled() {
        let state = test_channel_state();
        let samples = vec![0.0f32; 960];
        let decision = search(&samples, &state);
        assert!(!decision.enabled);
    }

    fn test_channel_state() -> ChannelState {
        super::super::state::EncoderState::new(1).channels[0].clone()
    }
}
