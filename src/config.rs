/// Number of channels the encoder was constructed for.
///
/// Fixed for the encoder's lifetime, mirroring the teacher's
/// `toc::Channels` split but owned by the encoder rather than parsed from a
/// wire byte (TOC framing is out of scope for this core).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channels {
    Mono = 1,
    Stereo = 2,
}

impl Channels {
    pub fn count(self) -> usize {
        self as usize
    }
}

/// Effective bandwidth cap, i.e. the highest coded band ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bandwidth {
    Narrow,
    Medium,
    Wide,
    SuperWide,
    Full,
}

impl Bandwidth {
    /// Highest coded band count (exclusive upper bound on `end`).
    pub fn band_count(self) -> usize {
        match self {
            Self::Narrow => 13,
            Self::Medium => 17,
            Self::Wide => 17,
            Self::SuperWide => 19,
            Self::Full => 21,
        }
    }
}

/// Per-encoder configuration, validated/clamped at set time rather than at
/// encode time so a live `Encoder` can never drift from the table in
/// `spec.md` section 6.
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    bitrate_bps: u32,
    vbr: bool,
    constrained_vbr: bool,
    complexity: u8,
    lsb_depth: u8,
    bandwidth: Bandwidth,
    packet_loss: u8,
    force_intra: bool,
    force_transient: bool,
    phase_inversion_disabled: bool,
    dc_reject_enabled: bool,
    delay_compensation_enabled: bool,
    hybrid: bool,
    allow_weak_transients: bool,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            bitrate_bps: 0,
            vbr: true,
            constrained_vbr: false,
            complexity: 10,
            lsb_depth: 24,
            bandwidth: Bandwidth::Full,
            packet_loss: 0,
            force_intra: false,
            force_transient: false,
            phase_inversion_disabled: false,
            dc_reject_enabled: true,
            delay_compensation_enabled: true,
            hybrid: false,
            allow_weak_transients: false,
        }
    }
}

impl EncoderConfig {
    pub fn with_bitrate_bps(mut self, bps: u32) -> Self {
        self.bitrate_bps = bps.clamp(6000, 510_000);
        if bps == 0 {
            self.bitrate_bps = 0;
        }
        self
    }

    /// Resolves the configured bitrate to an effective value, applying the
    /// per-channel defaults `spec.md` section 6 names for `0`.
    pub fn effective_bitrate_bps(&self, channels: Channels) -> u32 {
        if self.bitrate_bps != 0 {
            return self.bitrate_bps;
        }
        match channels {
            Channels::Mono => 64_000,
            Channels::Stereo => 128_000,
        }
    }

    pub fn with_vbr(mut self, vbr: bool) -> Self {
        self.vbr = vbr;
        self
    }

    pub fn with_constrained_vbr(mut self, constrained: bool) -> Self {
        self.constrained_vbr = constrained;
        self
    }

    pub fn with_complexity(mut self, complexity: u8) -> Self {
        self.complexity = complexity.min(10);
        self
    }

    pub fn with_lsb_depth(mut self, depth: u8) -> Self {
        self.lsb_depth = depth.clamp(8, 24);
        self
    }

    pub fn with_bandwidth(mut self, bandwidth: Bandwidth) -> Self {
        self.bandwidth = bandwidth;
        self
    }

    pub fn with_packet_loss(mut self, percent: u8) -> Self {
        self.packet_loss = percent.min(100);
        self
    }

    pub fn with_force_intra(mut self, force: bool) -> Self {
        self.force_intra = force;
        self
    }

    pub fn with_force_transient(mut self, force: bool) -> Self {
        self.force_transient = force;
        self
    }

    pub fn with_phase_inversion_disabled(mut self, disabled: bool) -> Self {
        self.phase_inversion_disabled = disabled;
        self
    }

    pub fn with_dc_reject_enabled(mut self, enabled: bool) -> Self {
        self.dc_reject_enabled = enabled;
        self
    }

    pub fn with_delay_compensation_enabled(mut self, enabled: bool) -> Self {
        self.delay_compensation_enabled = enabled;
        self
    }

    /// Hook for the hybrid (SILK+CELT) collaborator named in `spec.md`'s
    /// open questions. Skips postfilter-flag encoding per RFC 6716 section
    /// 3.2 when set; hybrid multiplexing itself is out of scope.
    pub fn with_hybrid(mut self, hybrid: bool) -> Self {
        self.hybrid = hybrid;
        self
    }

    pub fn with_allow_weak_transients(mut self, allow: bool) -> Self {
        self.allow_weak_transients = allow;
        self
    }

    pub fn bitrate_bps(&self) -> u32 {
        self.bitrate_bps
    }

    pub fn vbr(&self) -> bool {
        self.vbr
    }

    pub fn constrained_vbr(&self) -> bool {
        self.constrained_vbr
    }

    pub fn complexity(&self) -> u8 {
        self.complexity
    }

    pub fn lsb_depth(&self) -> u8 {
        self.lsb_depth
    }

    pub fn bandwidth(&self) -> Bandwidth {
        self.bandwidth
    }

    pub fn packet_loss(&self) -> u8 {
        self.packet_loss
    }

    pub fn force_intra(&self) -> bool {
        self.force_intra
    }

    pub fn force_transient(&self) -> bool {
        self.force_transient
    }

    pub fn phase_inversion_disabled(&self) -> bool {
        self.phase_inversion_disabled
    }

    pub fn dc_reject_enabled(&self) -> bool {
        self.dc_reject_enabled
    }

    pub fn delay_compensation_enabled(&self) -> bool {
        self.delay_compensation_enabled
    }

    pub fn hybrid(&self) -> bool {
        self.hybrid
    }

    pub fn allow_weak_transients(&self) -> bool {
        self.allow_weak_transients
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bitrate_clamps_to_range() {
        let cfg = EncoderConfig::default().with_bitrate_bps(1);
        assert_eq!(cfg.bitrate_bps(), 6000);

        let cfg = EncoderConfig::default().with_bitrate_bps(1_000_000);
        assert_eq!(cfg.bitrate_bps(), 510_000);
    }

    #[test]
    fn zero_bitrate_resolves_per_channel_default() {
        let cfg = EncoderConfig::default();
        assert_eq!(cfg.effective_bitrate_bps(Channels::Mono), 64_000);
        assert_eq!(cfg.effective_bitrate_bps(Channels::Stereo), 128_000);
    }

    #[test]
    fn complexity_and_lsb_depth_clamp() {
        let cfg = EncoderConfig::default().with_complexity(255).with_lsb_depth(2);
        assert_eq!(cfg.complexity(), 10);
        assert_eq!(cfg.lsb_depth(), 8);
    }
}
