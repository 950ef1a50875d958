//! Combinatorial pulse-vector enumeration (CWRS): ranks a vector of `n`
//! signed integers summing `sum(|y_i|) == k` into a single index in
//! `[0, V(n,k))`, the representation PVQ hands the range coder.
//!
//! `V(n, k)` counts vectors of `n` signed integers with `sum(|y_i|) = k`:
//! `V(n, 0) = 1`, `V(0, k > 0) = 0`, `V(n, k) = V(n-1, k) + V(n-1, k-1) +
//! V(n, k-1)`. This crate builds no decoder, so there is nothing to check
//! bit-exactness against libopus's `cwrs.c` table; what matters is that
//! `encode`/`decode` below are exact inverses of each other, which the
//! round-trip tests confirm. `u128` is used for the counts since `V(n, k)`
//! grows combinatorially and real band widths (up to ~176 samples at
//! `LM=3`) can overflow `u64` well before the allocator would ever spend
//! that many pulses on one band.

/// Memoized table of `V(n, k)` for `n in 0..=max_n`, `k in 0..=max_k`.
pub struct PulseCounts {
    table: Vec<Vec<u128>>,
    max_k: usize,
}

impl PulseCounts {
    pub fn new(max_n: usize, max_k: usize) -> Self {
        let mut table = vec![vec![0u128; max_k + 1]; max_n + 1];
        for row in table.iter_mut() {
            row[0] = 1;
        }
        for k in 1..=max_k {
            table[0][k] = 0;
        }
        for n in 1..=max_n {
            for k in 1..=max_k {
                table[n][k] = table[n - 1][k] + table[n - 1][k - 1] + table[n][k - 1];
            }
        }
        Self { table, max_k }
    }

    pub fn v(&self, n: usize, k: usize) -> u128 {
        if k > self.max_k {
            // Never exercised by a correctly-budgeted allocator; treat as
            // "more than we'll ever index" rather than panicking.
            return u128::MAX;
        }
        self.table[n][k]
    }
}

/// Ranks `y` (length `n`, `sum(|y_i|) == k`) into `(index, total)` where
/// `total == V(n, k)`.
pub fn encode(y: &[i32], counts: &PulseCounts) -> (u128, u128) {
    let n = y.len();
    let k: u32 = y.iter().map(|v| v.unsigned_abs()).sum();
    let total = counts.v(n, k as usize);

    let mut index: u128 = 0;
    let mut k_remaining = k as usize;
    let mut n_remaining = n;

    for (i, &yi) in y.iter().enumerate() {
        if n_remaining == 1 {
            if k_remaining > 0 && yi < 0 {
                index += 1;
            }
            break;
        }
        let mag = yi.unsigned_abs() as usize;
        for m in 0..mag {
            let rest = counts.v(n_remaining - 1, k_remaining - m);
            index += if m == 0 { rest } else { 2 * rest };
        }
        if mag > 0 {
            if yi > 0 {
                index += counts.v(n_remaining - 1, k_remaining - mag);
            }
        }
        k_remaining -= mag;
        n_remaining -= 1;
        let _ = i;
    }

    (index, total)
}

/// Inverse of `encode`, kept for round-trip tests: no decoder component
/// calls this in the production path.
#[cfg(test)]
pub fn decode(mut index: u128, n: usize, k: usize, counts: &PulseCounts) -> Vec<i32> {
    let mut y = vec![0i32; n];
    let mut k_remaining = k;
    let mut n_remaining = n;

    for slot in y.iter_mut() {
        if n_remaining == 1 {
            if k_remaining > 0 {
                *slot = if index >= 1 { -(k_remaining as i32) } else { k_remaining as i32 };
            }
            break;
        }
        let mut m = 0usize;
        loop {
            let rest = counts.v(n_remaining - 1, k_remaining - m);
            let count = if m == 0 { rest } else { 2 * rest };
            if index < count {
                break;
            }
            index -= count;
            m += 1;
        }
        if m == 0 {
            *slot = 0;
        } else {
            let rest = counts.v(n_remaining - 1, k_remaining - m);
            if index < rest {
                *slot = -(m as i32);
            } else {
                index -= rest;
                *slot = m as i32;
            }
        }
        k_remaining -= m;
        n_remaining -= 1;
    }

    y
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn v_matches_small_hand_counts() {
        let counts = PulseCounts::new(4, 4);
        assert_eq!(counts.v(1, 0), 1);
        assert_eq!(counts.v(1, 1), 2); // [+1], [-1]
        assert_eq!(counts.v(2, 1), 4); // (+1,0)(-1,0)(0,+1)(0,-1)
    }

    #[test]
    fn encode_decode_round_trips_over_small_vectors() {
        let counts = PulseCounts::new(6, 8);
        let candidates: Vec<Vec<i32>> = vec![
            vec![0, 0, 0, 1],
            vec![1, -1, 0, 0],
            vec![2, 0, 0, -1],
            vec![-2, 1, 0, 0],
            vec![0, 0, 3, 0],
            vec![1, 1, 1, 0],
        ];
        for y in candidates {
            let k: u32 = y.iter().map(|v| v.unsigned_abs()).sum();
            let (index, total) = encode(&y, &counts);
            assert!(index < total);
            let back = decode(index, y.len(), k as usize, &counts);
            assert_eq!(back, y);
        }
    }

    #[test]
    fn every_vector_in_a_small_space_is_distinct() {
        let n = 3;
        let k = 3;
        let counts = PulseCounts::new(n, k);
        let mut seen = std::collections::HashSet::new();
        fn gen(n: usize, k: i32, prefix: &mut Vec<i32>, out: &mut Vec<Vec<i32>>) {
            if n == 0 {
                if k == 0 {
                    out.push(prefix.clone());
                }
                return;
            }
            for v in -k..=k {
                prefix.push(v);
                gen(n - 1, k - v.abs(), prefix, out);
                prefix.pop();
            }
        }
        let mut all = Vec::new();
        gen(n, k as i32, &mut Vec::new(), &mut all);
        for y in &all {
            let (index, _total) = encode(y, &counts);
            assert!(seen.insert(index), "duplicate index for {:?}", y);
        }
        assert_eq!(seen.len(), all.len());
    }
}
