use thiserror::Error;

/// Frame sizes the encoder accepts, in samples per channel at 48 kHz.
pub const VALID_FRAME_SIZES: [usize; 4] = [120, 240, 480, 960];

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderError {
    #[error("frame size {0} is not one of {VALID_FRAME_SIZES:?}")]
    InvalidFrameSize(usize),

    #[error("pcm length {got} does not match frame_size * channels = {expected}")]
    InvalidInputLength { got: usize, expected: usize },
}

pub type Result<T> = std::result::Result<T, EncoderError>;
