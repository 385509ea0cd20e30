//! Construction-time error types. Nothing in this module is ever returned
//! from the realtime `run` path.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    NonPowerOfTwoFftSize(usize),
    FftSizeOutOfRange { size: usize, min: usize, max: usize },
    OverlapDoesNotDivideFftSize { fft_size: usize, overlap_factor: usize },
    NonPositiveSampleRate,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NonPowerOfTwoFftSize(size) => {
                write!(f, "fft_size {size} is not a power of two")
            }
            ConfigError::FftSizeOutOfRange { size, min, max } => {
                write!(f, "fft_size {size} is out of range [{min}, {max}]")
            }
            ConfigError::OverlapDoesNotDivideFftSize { fft_size, overlap_factor } => write!(
                f,
                "overlap_factor {overlap_factor} does not evenly divide fft_size {fft_size}"
            ),
            ConfigError::NonPositiveSampleRate => write!(f, "sample_rate must be positive"),
        }
    }
}

impl std::error::Error for ConfigError {}
