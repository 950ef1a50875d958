pub mod bits;

use integer_sqrt::IntegerSquareRoot;

use self::bits::RawBitWriter;

/// Probability distribution coding, suitable for audio coding scenarios
/// because audio is all continuously varying data with continuous spectral
/// lines, not drastically varying or random data.
///
/// This is the encode side of a binary range coder: a carryless (Subbotin
/// style) range coder underpins the byte stream, with a `tell`/`tell_frac`
/// bit-accounting layer and a CELT-specific vocabulary (`icdf`, `uniform`,
/// `laplace`, `triangular`, raw bits) built on top, matching the shape of
/// the teacher's `RangeCodingDecoder`.
pub struct RangeCodingEncoder {
    low: u32,
    range: u32,
    out: Vec<u8>,
    raw: RawBitWriter,
    // Total bits accounted for by renormalization, for `tell`/`tell_frac`.
    consumed_bits: usize,
    max_bytes: usize,
}

const TOP: u32 = 1 << 24;
const BOT: u32 = 1 << 16;

impl RangeCodingEncoder {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            low: 0,
            range: 0xFFFF_FFFF,
            out: Vec::with_capacity(max_bytes),
            raw: RawBitWriter::new(),
            consumed_bits: 32,
            max_bytes,
        }
    }

    fn normalize(&mut self) {
        while (self.low ^ self.low.wrapping_add(self.range)) < TOP
            || (self.range < BOT && {
                self.range = self.low.wrapping_neg() & (BOT - 1);
                true
            })
        {
            self.out.push((self.low >> 24) as u8);
            self.low <<= 8;
            self.range <<= 8;
            self.consumed_bits += 8;
        }
    }

    /// Encodes the interval `[low, high)` out of `total`, the general
    /// building block every higher-level encode funnels through.
    fn encode_range(&mut self, low: u32, high: u32, total: u32) {
        debug_assert!(low < high && high <= total);
        let scale = self.range / total;
        self.low = self.low.wrapping_add(scale * low);
        if high == total {
            self.range -= scale * low;
        } else {
            self.range = scale * (high - low);
        }
        self.normalize();
    }

    /// Dichotomous encoding: splits the current interval by `2^logp`. The
    /// `true` branch takes the low (small) sub-interval, mirroring the
    /// teacher's decode convention exactly.
    pub fn encode_bit_logp(&mut self, val: bool, logp: u32) {
        let scale = self.range >> logp;
        if val {
            self.range = scale;
        } else {
            self.low = self.low.wrapping_add(scale);
            self.range -= scale;
        }
        self.normalize();
    }

    /// Encoding based on an iCDF table (Opus method).
    pub fn encode_icdf(&mut self, symbol: usize, icdf: &ICDFContext) {
        let low = if symbol > 0 { icdf.dist[symbol - 1] } else { 0 };
        let high = icdf.dist[symbol];
        self.encode_range(low as u32, high as u32, icdf.total as u32);
    }

    /// Raw bits without probabilistic modeling; these accumulate in the
    /// packet's raw-bit appendix (written back to front at `done()`).
    pub fn encode_raw_bits(&mut self, value: u32, nbits: usize) {
        if nbits == 0 {
            return;
        }
        self.raw.push_bits(value, nbits as u32);
    }

    const UNIFORM_THRESHOLD_BITS: usize = 8;

    /// Encodes a uniformly distributed integer in `[0, ft)`.
    pub fn encode_uniform(&mut self, value: usize, ft: usize) {
        debug_assert!(ft > 1 && value < ft);
        let bits = ((ft - 1).ilog2() as i64 - 1).max(0) as usize;
        if bits > Self::UNIFORM_THRESHOLD_BITS {
            let shift = bits - Self::UNIFORM_THRESHOLD_BITS;
            let total = ((ft - 1) >> shift) + 1;
            let sym = value >> shift;
            self.encode_range(sym as u32, (sym + 1) as u32, total as u32);
            self.encode_raw_bits((value & ((1 << shift) - 1)) as u32, shift);
        } else {
            self.encode_range(value as u32, (value + 1) as u32, ft as u32);
        }
    }

    /// Encodes a signed integer drawn from a discretized Laplace
    /// distribution, the exact algebraic inverse of the teacher's `laplace`
    /// decode (same `fs0`/`decay` walk, run forward to a target magnitude
    /// instead of driven by a decoded `center`).
    pub fn encode_laplace(&mut self, value: isize, fs0: usize, decay: isize) {
        let total: usize = 32768;
        let (low, high) = if value == 0 {
            (0usize, fs0.min(total))
        } else {
            let negative = value < 0;
            let mag = value.unsigned_abs() as usize;

            let mut v = 1usize;
            let mut low = fs0;
            let mut symbol = 1 + (((32768 - 32 - fs0) * (16384 - decay as usize)) >> 15);

            while symbol > 1 && v < mag {
                v += 1;
                symbol *= 2;
                low += symbol;
                symbol = (((symbol - 2) * decay as usize) >> 15) + 1;
            }

            if symbol <= 1 {
                let dist = mag - v;
                low += 2 * dist;
            }

            if negative {
                (low, (low + symbol).min(total))
            } else {
                (low + symbol, (low + 2 * symbol).min(total))
            }
        };

        self.encode_range(low as u32, high as u32, total as u32);
    }

    /// Encodes `k` from a triangular (pyramid-shaped) distribution over
    /// `[0, qn]`, used for small-`qn` theta indices in the PVQ band coder.
    pub fn encode_triangular(&mut self, k: usize, qn: usize) {
        let half_level = qn >> 1;
        let total = (half_level + 1) * (half_level + 1);
        let (low, symbol) = if k <= half_level {
            (k * (k + 1) >> 1, k + 1)
        } else {
            (total - ((qn + 1 - k) * (qn + 2 - k) >> 1), qn + 1 - k)
        };
        self.encode_range(low as u32, (low + symbol) as u32, total as u32);
    }

    /// Returns the number of bits currently consumed (integer).
    pub fn tell(&self) -> usize {
        self.consumed_bits.saturating_sub(self.range.max(1).ilog2() as usize)
    }

    /// Returns the number of bits currently consumed (1/8-bit precision, aka
    /// Q3, the unit the allocator works in).
    pub fn tell_frac(&self) -> usize {
        let mut log2_range = self.range.max(1).ilog2() as i64 - 1;
        if log2_range < 0 {
            log2_range = 0;
        }
        let mut range_q15 = if log2_range >= 16 {
            (self.range >> (log2_range - 16)) as u64
        } else {
            (self.range as u64) << (16 - log2_range)
        };

        let mut log2_range = log2_range as u64;
        for _ in 0..3 {
            range_q15 = (range_q15 * range_q15) >> 15;
            let lastbit = range_q15 >> 16;
            log2_range = log2_range * 2 | lastbit;
            range_q15 >>= lastbit;
        }

        (self.consumed_bits as u64 * 8).saturating_sub(log2_range) as usize
    }

    /// Forces the final payload to exactly `n_bytes` (CBR). If the budget is
    /// exhausted before the frame finishes encoding, the caller must stop
    /// issuing new symbols; the coder itself only refuses to grow past the
    /// cap once flushed.
    pub fn shrink(&mut self, n_bytes: usize) {
        self.max_bytes = n_bytes;
    }

    pub fn bytes_written(&self) -> usize {
        self.out.len()
    }

    /// The coder's internal `range` register, captured right before
    /// `done()` as the `OPUS_GET_FINAL_RANGE`-equivalent checksum named in
    /// `spec.md` section 6.
    pub fn final_range(&self) -> u32 {
        self.range
    }

    pub fn capacity(&self) -> usize {
        self.max_bytes
    }

    /// Advances the decoder-visible position to the end of the data,
    /// patching unused bits. Used right before a silence-only frame ends.
    pub fn to_end(&mut self) {
        let total_bits = self.max_bytes * 8;
        if total_bits > self.tell() {
            self.consumed_bits += total_bits - self.tell();
        }
    }

    /// Flushes the coder and assembles the final packet: forward range bits,
    /// then the raw-bit appendix written back to front, truncated/padded to
    /// `max_bytes` set by `shrink` (or the natural length if never shrunk).
    pub fn done(mut self) -> Vec<u8> {
        for _ in 0..4 {
            self.out.push((self.low >> 24) as u8);
            self.low <<= 8;
        }

        let mut raw_bytes = self.raw.finish();
        raw_bytes.reverse();

        let target = if self.max_bytes > 0 {
            self.max_bytes
        } else {
            self.out.len() + raw_bytes.len()
        };

        // Budget exhausted: truncate the forward stream per RFC's
        // auto-truncation rule and drop the raw appendix entirely.
        if self.out.len() >= target {
            self.out.truncate(target);
            return self.out;
        }

        let room = target - self.out.len();
        let raw_len = raw_bytes.len().min(room);
        let pad = room - raw_len;

        let mut packet = self.out;
        packet.resize(packet.len() + pad, 0);
        packet.extend_from_slice(&raw_bytes[..raw_len]);
        packet
    }
}

#[derive(Debug)]
pub struct ICDFContext {
    pub total: usize,
    pub dist: &'static [usize],
}

/// Integer square root helper shared by the theta quantizer and the
/// transient mean-energy formula, grounded on the same `integer-sqrt`
/// dependency the teacher's triangular decode used.
pub fn isqrt(v: usize) -> usize {
    v.integer_sqrt()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn logp_consumes_roughly_expected_bits() {
        let mut enc = RangeCodingEncoder::new(64);
        let before = enc.tell();
        enc.encode_bit_logp(false, 1);
        let after = enc.tell();
        assert!(after >= before);
    }

    #[test]
    fn icdf_roundtrips_through_range_math() {
        // A 4-symbol uniform-ish ICDF; just check tell() advances and the
        // coder doesn't panic across the whole alphabet.
        let icdf = ICDFContext { total: 8, dist: &[2, 4, 6, 8] };
        let mut enc = RangeCodingEncoder::new(64);
        for sym in 0..4 {
            enc.encode_icdf(sym, &icdf);
        }
        assert!(enc.tell() > 0);
    }

    #[test]
    fn laplace_handles_zero_and_signed_values() {
        let mut enc = RangeCodingEncoder::new(64);
        enc.encode_laplace(0, 9000, 12000);
        enc.encode_laplace(3, 9000, 12000);
        enc.encode_laplace(-3, 9000, 12000);
        assert!(enc.tell() > 0);
    }

    #[test]
    fn done_respects_shrink_target() {
        let mut enc = RangeCodingEncoder::new(64);
        enc.shrink(20);
        for sym in 0..4u8 {
            let icdf = ICDFContext { total: 8, dist: &[2, 4, 6, 8] };
            enc.encode_icdf(sym as usize, &icdf);
        }
        let bytes = enc.done();
        assert_eq!(bytes.len(), 20);
    }
}
