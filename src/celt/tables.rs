//! Fixed tables shared by every component of the CELT pipeline.
//!
//! `COARSE_ENERGY_DICT`, `ALPHA_COEF`, `BETA_COEF`, `STATIC_CAPS`,
//! `FREQ_RANGE`, `LOG_FREQ_RANGE`, `ALLOC_TRIM_MODEL`, `LOG2_FRAC`,
//! `SPREAD_MODEL_DICT`, `TAPSET_GAINS` and `TF_SELECT` are carried over
//! verbatim from the teacher decoder's `celt::coarse_energy`,
//! `celt::bit_alloc`, `celt::post_filter` (named `filter.rs` on disk) and
//! `celt::time_frequency_change` modules: they are literal RFC 6716
//! constants, identical whichever side of the codec reads them.
//!
//! `EBANDS` and `EMEANS` were not present in the retrieved corpus (the
//! teacher decoder never got far enough to need them); they reproduce the
//! well-known RFC 6716 band-edge and per-band-mean tables from public
//! memory rather than from a corpus file. See `DESIGN.md` for the
//! corpus-grounding ledger and the note on this one exception.
//!
//! The 11-row `band_alloc` "quality grid" the real allocator binary-searches
//! over (`spec.md` section 4.8) is a fitted table that never appears
//! anywhere in the retrieved corpus (the teacher's `bit_alloc.rs` stops
//! right before defining it). Rather than invent specific numbers under a
//! false appearance of RFC fidelity, `band_alloc_row` below derives a
//! monotonic per-band curve from `caps[]` — a table that *is* grounded —
//! preserving the exact bisection/interpolation control flow `spec.md`
//! describes without fabricating provenance for the raw numbers. This is
//! recorded as an explicit Open Question resolution in `DESIGN.md`.

pub const MAX_BANDS: usize = 21;
pub const SHORT_BLOCKSIZE: usize = 120;
pub const MAX_LM: usize = 3;
pub const OVERLAP: usize = 120;
pub const MAX_FRAME_SIZE: usize = SHORT_BLOCKSIZE * (1 << MAX_LM);

/// Band edges in short-block (LM=0) MDCT bins. 22 edges bound 21 bands.
pub const EBANDS: [usize; MAX_BANDS + 1] =
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 10, 12, 14, 16, 20, 24, 28, 34, 40, 48, 60, 78, 100];

/// Per-band log-energy means subtracted before coding (`bandLogE` bias).
pub const EMEANS: [f32; MAX_BANDS] = [
    6.3, 6.3, 9.4, 9.4, 11.3, 11.3, 12.4, 12.4, 13.3, 13.3, 14.0, 14.0, 14.6, 14.6, 15.1, 15.1,
    15.5, 15.5, 15.9, 15.9, 16.2,
];

pub fn band_width(band: usize) -> usize {
    EBANDS[band + 1] - EBANDS[band]
}

/// `logN[b] = round(8 * log2(width))`, the `spec.md` section 4.8 `logN`
/// term, computed rather than hardcoded since it's a pure function of the
/// (grounded) `EBANDS` table.
pub fn log_n(band: usize) -> i32 {
    let width = band_width(band) as f32;
    (width.log2() * 8.0).round() as i32
}

/// Coarse-energy Laplace model: `[size][intra?][band*2 + {fs0, decay}]`.
/// Reused verbatim from the teacher's `celt::coarse_energy::COARSE_ENERGY_DICT`.
pub const COARSE_ENERGY_DICT: [[[u8; 42]; 2]; 4] = [
    [
        [
            72, 127, 65, 129, 66, 128, 65, 128, 64, 128, 62, 128, 64, 128, 64, 128, 92, 78, 92, 79,
            92, 78, 90, 79, 116, 41, 115, 40, 114, 40, 132, 26, 132, 26, 145, 17, 161, 12, 176, 10,
            177, 11,
        ],
        [
            24, 179, 48, 138, 54, 135, 54, 132, 53, 134, 56, 133, 55, 132, 55, 132, 61, 114, 70, 96,
            74, 88, 75, 88, 87, 74, 89, 66, 91, 67, 100, 59, 108, 50, 120, 40, 122, 37, 97, 43, 78,
            50,
        ],
    ],
    [
        [
            83, 78, 84, 81, 88, 75, 86, 74, 87, 71, 90, 73, 93, 74, 93, 74, 109, 40, 114, 36, 117,
            34, 117, 34, 143, 17, 145, 18, 146, 19, 162, 12, 165, 10, 178, 7, 189, 6, 190, 8, 177,
            9,
        ],
        [
            23, 178, 54, 115, 63, 102, 66, 98, 69, 99, 74, 89, 71, 91, 73, 91, 78, 89, 86, 80, 92,
            66, 93, 64, 102, 59, 103, 60, 104, 60, 117, 52, 123, 44, 138, 35, 133, 31, 97, 38, 77,
            45,
        ],
    ],
    [
        [
            61, 90, 93, 60, 105, 42, 107, 41, 110, 45, 116, 38, 113, 38, 112, 38, 124, 26, 132, 27,
            136, 19, 140, 20, 155, 14, 159, 16, 158, 18, 170, 13, 177, 10, 187, 8, 192, 6, 175, 9,
            159, 10,
        ],
        [
            21, 178, 59, 110, 71, 86, 75, 85, 84, 83, 91, 66, 88, 73, 87, 72, 92, 75, 98, 72, 105,
            58, 107, 54, 115, 52, 114, 55, 112, 56, 129, 51, 132, 40, 150, 33, 140, 29, 98, 35, 77,
            42,
        ],
    ],
    [
        [
            42, 121, 96, 66, 108, 43, 111, 40, 117, 44, 123, 32, 120, 36, 119, 33, 127, 33, 134, 34,
            139, 21, 147, 23, 152, 20, 158, 25, 154, 26, 166, 21, 173, 16, 184, 13, 184, 10, 150,
            13, 139, 15,
        ],
        [
            22, 178, 63, 114, 74, 82, 84, 83, 92, 82, 103, 62, 96, 72, 96, 67, 101, 73, 107, 72,
            113, 55, 118, 52, 125, 52, 118, 52, 117, 55, 135, 49, 137, 39, 157, 32, 145, 29, 97,
            33, 77, 40,
        ],
    ],
];

pub const ALPHA_COEF: [f32; 4] = [
    29440.0 / 32768.0,
    26112.0 / 32768.0,
    21248.0 / 32768.0,
    16384.0 / 32768.0,
];

pub const BETA_COEF: [f32; 4] = [
    1.0 - (30147.0 / 32768.0),
    1.0 - (22282.0 / 32768.0),
    1.0 - (12124.0 / 32768.0),
    1.0 - (6554.0 / 32768.0),
];

pub const SPREAD_MODEL_DICT: [usize; 5] = [32, 7, 9, 30, 32];

pub const STATIC_CAPS: [[[i32; 21]; 2]; 4] = [
    [
        [
            224, 224, 224, 224, 224, 224, 224, 224, 160, 160, 160, 160, 185, 185, 185, 178, 178,
            168, 134, 61, 37,
        ],
        [
            224, 224, 224, 224, 224, 224, 224, 224, 240, 240, 240, 240, 207, 207, 207, 198, 198,
            183, 144, 66, 40,
        ],
    ],
    [
        [
            160, 160, 160, 160, 160, 160, 160, 160, 185, 185, 185, 185, 193, 193, 193, 183, 183,
            172, 138, 64, 38,
        ],
        [
            240, 240, 240, 240, 240, 240, 240, 240, 207, 207, 207, 207, 204, 204, 204, 193, 193,
            180, 143, 66, 40,
        ],
    ],
    [
        [
            185, 185, 185, 185, 185, 185, 185, 185, 193, 193, 193, 193, 193, 193, 193, 183, 183,
            172, 138, 65, 39,
        ],
        [
            207, 207, 207, 207, 207, 207, 207, 207, 204, 204, 204, 204, 201, 201, 201, 188, 188,
            176, 141, 66, 40,
        ],
    ],
    [
        [
            193, 193, 193, 193, 193, 193, 193, 193, 193, 193, 193, 193, 194, 194, 194, 184, 184,
            173, 139, 65, 39,
        ],
        [
            204, 204, 204, 204, 204, 204, 204, 204, 201, 201, 201, 201, 198, 198, 198, 187, 187,
            175, 140, 66, 40,
        ],
    ],
];

pub const LOG_FREQ_RANGE: [i32; 21] = [
    0, 0, 0, 0, 0, 0, 0, 0, 8, 8, 8, 8, 16, 16, 16, 21, 21, 24, 29, 34, 36,
];

pub const FREQ_RANGE: [i32; 21] =
    [1, 1, 1, 1, 1, 1, 1, 1, 2, 2, 2, 2, 4, 4, 4, 6, 6, 8, 12, 18, 22];

pub const ALLOC_TRIM_MODEL: [usize; 12] = [128, 2, 4, 9, 19, 41, 87, 109, 119, 124, 126, 128];

pub const LOG2_FRAC: [usize; 24] =
    [0, 8, 13, 16, 19, 21, 23, 24, 26, 27, 28, 29, 30, 31, 32, 32, 33, 34, 34, 35, 36, 36, 37, 37];

/// `log2(n)` in Q3, the bit cost of uniformly signaling one of `n`
/// choices (the allocator's intensity-stereo reservation uses this).
pub fn log2_frac(n: usize) -> usize {
    LOG2_FRAC[n.min(LOG2_FRAC.len() - 1)]
}

/// Tapset FIR coefficients for the postfilter comb filter.
pub const TAPSET_GAINS: [[f32; 3]; 3] = [
    [0.3066406250, 0.2170410156, 0.1296386719],
    [0.4638671875, 0.2680664062, 0.0],
    [0.7998046875, 0.1000976562, 0.0],
];

pub const TAPSET_MODEL_DICT: [usize; 3] = [2, 3, 4];

pub const POSTFILTER_MIN_PERIOD: usize = 15;

/// Longest pitch period the prefilter searches and the comb filter's
/// history buffer must retain, shared by `prefilter.rs` and the
/// per-channel state it reads history from.
pub const MAX_PITCH_PERIOD: usize = 720;

/// `tf_select_table[LM][transient][tf_select][change]`.
pub const TF_SELECT: [[[[i8; 2]; 2]; 2]; 4] = [
    [[[0, -1], [0, -1]], [[0, -1], [0, -1]]],
    [[[0, -1], [0, -2]], [[1, 0], [1, -1]]],
    [[[0, -2], [0, -3]], [[2, 0], [1, -1]]],
    [[[0, -2], [0, -3]], [[3, 0], [1, -1]]],
];

pub const ALLOC_STEPS: usize = 6;
pub const ALLOC_VECTORS: usize = 11;
pub const MAX_FINE_BITS: i32 = 8;
pub const FINE_OFFSET: i32 = 21;

/// Procedurally derived per-band "quality" grid, replacing the fitted
/// 11-row table upstream CELT ships (absent from the corpus). Linear in
/// `row` between 0 (nothing) and `caps[band]` (the ceiling) at
/// `row == ALLOC_VECTORS - 1`, which keeps the allocator's binary search in
/// section 4.8 well-defined: monotonic in `row`, bounded by `caps`.
pub fn band_alloc_row(row: usize, band: usize, caps: &[i32; MAX_BANDS]) -> i32 {
    let row = row.min(ALLOC_VECTORS - 1) as i32;
    (caps[band] * row) / (ALLOC_VECTORS as i32 - 1)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ebands_are_strictly_increasing() {
        for w in EBANDS.windows(2) {
            assert!(w[1] > w[0]);
        }
        assert_eq!(EBANDS.len(), MAX_BANDS + 1);
    }

    #[test]
    fn band_alloc_row_is_monotonic_and_bounded() {
        let caps = STATIC_CAPS[3][1];
        let caps21: [i32; MAX_BANDS] = {
            let mut c = [0i32; MAX_BANDS];
            c.copy_from_slice(&caps);
            c
        };
        for band in 0..MAX_BANDS {
            let mut prev = 0;
            for row in 0..ALLOC_VECTORS {
                let v = band_alloc_row(row, band, &caps21);
                assert!(v >= prev);
                assert!(v <= caps21[band]);
                prev = v;
            }
        }
    }
}
