//! Time-frequency resolution analysis (part of section 4.9/4.10): a
//! Viterbi search over per-band "change resolution" decisions, balancing
//! the bit cost of signaling a change against how much the transient
//! estimate favors one.

use crate::entropy::RangeCodingEncoder;

use super::tables::{MAX_BANDS, TF_SELECT};

const TF_CHANGE_COST: f32 = 2.0;

/// Runs a two-state (0/1 resolution) Viterbi search over `start..end`
/// bands, favoring resolution `1` where `tf_estimate` is high and
/// penalizing every band-to-band change, the same shape as libopus's
/// `tf_analysis` but over the continuous `tf_estimate` hint rather than a
/// band-energy variance metric (computed upstream in `transient.rs`).
pub fn analyze(tf_estimate: f32, start: usize, end: usize) -> [i32; MAX_BANDS] {
    let mut res = [0i32; MAX_BANDS];
    if end <= start {
        return res;
    }

    let bias: f32 = (tf_estimate / 3.0).clamp(0.0, 1.0);
    let mut cost = [[0.0f32; 2]; MAX_BANDS];
    let mut back = [[0usize; 2]; MAX_BANDS];

    cost[start][0] = 1.0 - bias;
    cost[start][1] = bias;

    for b in (start + 1)..end {
        for s in 0..2 {
            let stay_cost = cost[b - 1][s];
            let switch_cost = cost[b - 1][1 - s] + TF_CHANGE_COST;
            let (best_prev, best_cost) =
                if stay_cost <= switch_cost { (s, stay_cost) } else { (1 - s, switch_cost) };
            let local = if s == 1 { bias } else { 1.0 - bias };
            cost[b][s] = best_cost + local;
            back[b][s] = best_prev;
        }
    }

    let mut state = if cost[end - 1][0] <= cost[end - 1][1] { 0 } else { 1 };
    for b in (start..end).rev() {
        res[b] = state as i32;
        state = back[b][state];
    }

    res
}

/// Whether the per-band `tf_res` differs from the "no change" baseline
/// anywhere, the `tf_select` bit's precondition.
pub fn has_change(tf_res: &[i32], start: usize, end: usize) -> bool {
    tf_res[start..end].windows(2).any(|w| w[0] != w[1])
}

fn remaining_bits(range: &RangeCodingEncoder, total_bits_q3: i32) -> i32 {
    total_bits_q3 - range.tell_frac() as i32
}

/// Encodes `tf_res[start..end]`, mirroring the teacher's
/// `TimeFrequencyChange::parse` run in the encode direction: each band's
/// decision is an XOR against the running `diff` state (so a decoder
/// rebuilds `tf_res[b] = diff` exactly as the teacher's decode does),
/// gated by the same per-band budget check, followed by a `tf_select` bit
/// chosen to minimize a cost against the transient estimate rather than
/// written unconditionally. `tf_res` is mutated in place to hold the
/// values actually representable given the budget and the final
/// `tf_select` remap, since those are what the rest of the frame (anti
/// collapse, band folding) must agree with.
pub fn encode(
    range: &mut RangeCodingEncoder,
    tf_res: &mut [i32; MAX_BANDS],
    start: usize,
    end: usize,
    lm: usize,
    is_transient: bool,
    total_bits_q3: i32,
    tf_estimate: f32,
) {
    if end <= start {
        return;
    }

    let select_bit = lm != 0;
    let mut bits = if is_transient { 2 } else { 4 };
    let mut diff = false;
    let mut change = false;

    for b in start..end {
        if remaining_bits(range, total_bits_q3) > bits + select_bit as i32 {
            let symbol = (tf_res[b] != 0) ^ diff;
            range.encode_bit_logp(symbol, bits as u32);
            diff ^= symbol;
            change |= diff;
        } else {
            tf_res[b] = diff as i32;
        }
        bits = if is_transient { 4 } else { 5 };
    }

    let table = TF_SELECT[lm.min(3)][is_transient as usize];
    let change_idx = change as usize;
    let select = if select_bit && table[0][change_idx] != table[1][change_idx] {
        let target_shift = -3.0 * tf_estimate.clamp(0.0, 1.0);
        let cost = |sel: usize| (table[sel][change_idx] as f32 - target_shift).powi(2);
        let chosen = if cost(0) <= cost(1) { 0 } else { 1 };
        range.encode_bit_logp(chosen != 0, 1);
        chosen
    } else {
        0
    };

    for b in start..end {
        tf_res[b] = table[select][(tf_res[b] != 0) as usize] as i32;
    }
}
