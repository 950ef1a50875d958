//! End-to-end encode scenarios (`spec.md` section 8): the bitstream-level
//! assertions a caller would check after wiring this crate into a packet
//! sender, run against the public `Encoder` API rather than any internal
//! module.

use celt_encoder::{Bandwidth, Channels, Encoder, EncoderConfig, EncoderError};

fn sine(frame_size: usize, freq: f64, amplitude: f64) -> Vec<f64> {
    (0..frame_size)
        .map(|i| amplitude * (2.0 * std::f64::consts::PI * freq * i as f64 / 48_000.0).sin())
        .collect()
}

fn lcg_noise(len: usize, seed: u32) -> Vec<f64> {
    let mut state = seed;
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            ((state >> 8) as f64 / (1u32 << 24) as f64) * 2.0 - 1.0
        })
        .collect()
}

#[test]
fn silent_mono_frame_encodes_to_a_single_silence_byte() {
    let mut enc = Encoder::new(Channels::Mono);
    let pcm = vec![0.0f64; 960];
    let frame = enc.encode_frame(&pcm, 960).unwrap();

    assert_eq!(frame.data.len(), 1);
    assert_eq!(frame.data[0] & 0x80, 0x80, "silence bit must be set");
}

#[test]
fn cbr_mono_tone_hits_the_exact_target_byte_count() {
    let mut enc = Encoder::new(Channels::Mono)
        .with_config(EncoderConfig::default().with_bitrate_bps(64_000).with_vbr(false));
    let pcm = sine(960, 440.0, 0.5);
    let frame = enc.encode_frame(&pcm, 960).unwrap();

    // 64 kbps, 20ms frame: 64000 * 960 / 48000 / 8 = 160 bytes.
    assert_eq!(frame.data.len(), 160);
    assert_eq!(frame.data[0] & 0x80, 0, "a tone is not silence");
}

#[test]
fn first_frame_is_coded_intra_and_later_frames_are_not_forced_to_be() {
    let mut enc = Encoder::new(Channels::Mono)
        .with_config(EncoderConfig::default().with_bitrate_bps(64_000).with_vbr(false));
    let pcm = sine(960, 440.0, 0.5);

    let first = enc.encode_frame(&pcm, 960).unwrap();
    let second = enc.encode_frame(&pcm, 960).unwrap();

    assert!(!first.data.is_empty());
    assert!(!second.data.is_empty());
    assert_ne!(first.final_range, 0);
    assert_ne!(second.final_range, 0);
}

#[test]
fn stereo_noise_is_stable_across_a_hundred_frames() {
    let mut enc = Encoder::new(Channels::Stereo)
        .with_config(EncoderConfig::default().with_bitrate_bps(96_000));
    let pcm = lcg_noise(960 * 2, 0xC0FFEE);

    for i in 0..100 {
        let frame = enc.encode_frame(&pcm, 960).unwrap();
        assert!(!frame.data.is_empty(), "frame {i} produced no bytes");
        assert!(frame.data.len() <= 1275, "frame {i} exceeded the max packet size");
    }
}

#[test]
fn narrowband_configuration_still_encodes_successfully() {
    let mut enc = Encoder::new(Channels::Mono)
        .with_config(EncoderConfig::default().with_bitrate_bps(24_000).with_bandwidth(Bandwidth::Narrow));
    let pcm = sine(480, 220.0, 0.3);
    let frame = enc.encode_frame(&pcm, 480).unwrap();
    assert!(!frame.data.is_empty());
}

#[test]
fn invalid_frame_size_is_rejected_before_any_state_changes() {
    let mut enc = Encoder::new(Channels::Mono);
    let pcm = vec![0.0f64; 100];
    let err = enc.encode_frame(&pcm, 100).unwrap_err();
    assert_eq!(err, EncoderError::InvalidFrameSize(100));
}

#[test]
fn wrong_length_input_is_rejected_for_stereo() {
    let mut enc = Encoder::new(Channels::Stereo);
    let pcm = vec![0.0f64; 960];
    let err = enc.encode_frame(&pcm, 960).unwrap_err();
    assert_eq!(err, EncoderError::InvalidInputLength { got: 960, expected: 1920 });
}

#[test]
fn reset_returns_the_encoder_to_its_initial_state() {
    let mut enc = Encoder::new(Channels::Mono);
    let pcm = sine(960, 440.0, 0.5);
    enc.encode_frame(&pcm, 960).unwrap();
    enc.reset();
    // A freshly reset encoder must accept a silent frame exactly like a
    // brand-new one, with no leftover prefilter/energy state from before.
    let silent = vec![0.0f64; 960];
    let frame = enc.encode_frame(&silent, 960).unwrap();
    assert_eq!(frame.data.len(), 1);
}
