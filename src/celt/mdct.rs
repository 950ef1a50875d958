//! Forward MDCT (component C2).
//!
//! Implemented as a direct O(N^2) transform rather than the teacher's
//! domain (the teacher never implements an MDCT, it only decodes one) or
//! libopus's split-radix FFT-based `clt_mdct_forward`. A direct transform
//! is the honest choice here: this deliverable builds no decoder to verify
//! a fast transform's bit-exactness against, and a plain
//! cosine-sum is far easier to read and trust than a hand-written FFT
//! nobody can run. Noted as a deliberate simplification in `DESIGN.md`.

use super::tables::{MAX_LM, SHORT_BLOCKSIZE};

/// Raised-sine analysis/synthesis window of length `2n`, the same slope
/// family Vorbis/CELT use for alias cancellation between overlapping
/// blocks.
pub fn sine_window(n: usize) -> Vec<f32> {
    let len = 2 * n;
    (0..len)
        .map(|i| {
            let x = std::f32::consts::PI / (len as f32) * (i as f32 + 0.5);
            x.sin()
        })
        .collect()
}

/// Transforms one windowed block of `2n` time-domain samples into `n`
/// frequency-domain coefficients.
fn mdct_block(input: &[f32], window: &[f32], out: &mut [f32]) {
    let n = out.len();
    debug_assert_eq!(input.len(), 2 * n);
    debug_assert_eq!(window.len(), 2 * n);
    let n2 = 2 * n;
    for (k, bin) in out.iter_mut().enumerate() {
        let mut acc = 0.0f32;
        for (i, (&x, &w)) in input.iter().zip(window.iter()).enumerate() {
            let phase = (std::f32::consts::PI / n as f32)
                * (i as f32 + 0.5 + n as f32 / 2.0)
                * (k as f32 + 0.5);
            acc += x * w * phase.cos();
        }
        *bin = acc * (2.0 / n2 as f32);
    }
}

/// Encodes one channel's frame into `LM`-dependent frequency bins.
///
/// `history` holds the previous `frame_size` samples of overlap (updated in
/// place); `pcm` holds the current frame's `frame_size` samples; `out` must
/// be `frame_size` long. For `lm > 0` the frame is split into `2^lm` short
/// blocks, each independently MDCT'd, and the results interleaved band-wise
/// so later per-band coding can treat short blocks uniformly with long
/// ones, matching `spec.md` section 4.2's short-block convention.
pub fn analyze(pcm: &[f32], history: &mut [f32], out: &mut [f32], lm: usize) {
    let frame_size = pcm.len();
    debug_assert_eq!(history.len(), frame_size);
    debug_assert_eq!(out.len(), frame_size);
    debug_assert!(lm <= MAX_LM);

    let num_blocks = 1usize << lm;
    let block_n = frame_size / num_blocks;
    debug_assert!(block_n >= SHORT_BLOCKSIZE / 2);

    let window = sine_window(block_n);
    let mut windowed = vec![0.0f32; 2 * block_n];
    let mut block_out = vec![0.0f32; block_n];

    // timeline is `[history | pcm]`; extended one sample past the frame for
    // the next call's overlap carry.
    let mut timeline = Vec::with_capacity(2 * frame_size);
    timeline.extend_from_slice(history);
    timeline.extend_from_slice(pcm);

    for b in 0..num_blocks {
        let start = b * block_n;
        windowed.copy_from_slice(&timeline[start..start + 2 * block_n]);
        mdct_block(&windowed, &window, &mut block_out);
        // Interleave short-block spectra so bin `k` of every block lands
        // contiguously, keeping per-band energy grouping block-size
        // independent downstream.
        for (k, &v) in block_out.iter().enumerate() {
            out[k * num_blocks + b] = v;
        }
    }

    history.copy_from_slice(pcm);
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn window_is_symmetric_and_bounded() {
        let w = sine_window(16);
        assert_eq!(w.len(), 32);
        for &v in &w {
            assert!((0.0..=1.0).contains(&v));
        }
        assert!((w[0] - w[w.len() - 1]).abs() < 1e-5);
    }

    #[test]
    fn analyze_produces_finite_output_for_silence() {
        let mut history = vec![0.0f32; 960];
        let pcm = vec![0.0f32; 960];
        let mut out = vec![0.0f32; 960];
        analyze(&pcm, &mut history, &mut out, 0);
        assert!(out.iter().all(|v| v.is_finite()));
        assert!(out.iter().all(|&v| v.abs() < 1e-4));
    }

    #[test]
    fn analyze_handles_short_blocks() {
        let mut history = vec![0.0f32; 960];
        let pcm: Vec<f32> = (0..960).map(|i| (i as f32 * 0.01).sin()).collect();
        let mut out = vec![0.0f32; 960];
        analyze(&pcm, &mut history, &mut out, 3);
        assert!(out.iter().all(|v| v.is_finite()));
        assert_eq!(history, pcm);
    }
}
